//! Push constant blocks and kernel sources

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use hair_physics::constants::MAX_PARTICLES_PER_STRAND;
use hair_physics::{HairLayout, HairParams};

/// Local work-group size of both kernels; substituted into the WGSL sources
pub const WORKGROUP_SIZE: u32 = 64;

/// Physics stage constants (matches `UpdateConstants` in update.wgsl)
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct UpdateConstants {
    pub gravity: [f32; 3],
    pub separation: f32,

    // x: dt, y: dt², z: 1/dt, w: damping
    pub dt: f32,
    pub dt2: f32,
    pub inv_dt: f32,
    pub damping: f32,

    pub total_particles: u32,
    pub particles_per_strand: u32,
    pub strands: u32,
    pub iterations: u32,

    /// Applied to the rest roots before pinning particle 0
    pub root_transform: [[f32; 4]; 4],
}

impl UpdateConstants {
    pub fn new(params: &HairParams, layout: HairLayout, dt: f32, root_transform: Mat4) -> Self {
        Self {
            gravity: params.gravity.to_array(),
            separation: params.separation,
            dt,
            dt2: dt * dt,
            inv_dt: 1.0 / dt,
            damping: params.damping,
            total_particles: layout.total_particles(),
            particles_per_strand: layout.particles_per_strand,
            strands: layout.strands,
            iterations: params.iterations,
            root_transform: root_transform.to_cols_array_2d(),
        }
    }
}

/// Vertex generation constants (matches `VertexConstants` in vertices.wgsl)
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct VertexConstants {
    pub view_dir: [f32; 3],
    pub radius: f32,
    pub total_particles: u32,
    pub particles_per_strand: u32,
    pub strands: u32,
    pub _padding: u32,
}

impl VertexConstants {
    pub fn new(layout: HairLayout, view_dir: Vec3, radius: f32) -> Self {
        Self {
            view_dir: view_dir.to_array(),
            radius,
            total_particles: layout.total_particles(),
            particles_per_strand: layout.particles_per_strand,
            strands: layout.strands,
            _padding: 0,
        }
    }
}

fn specialize(source: &str) -> String {
    source
        .replace("{{WORKGROUP_SIZE}}", &WORKGROUP_SIZE.to_string())
        .replace(
            "{{MAX_PARTICLES_PER_STRAND}}",
            &MAX_PARTICLES_PER_STRAND.to_string(),
        )
}

pub fn update_shader_source() -> String {
    specialize(include_str!("shaders/update.wgsl"))
}

pub fn vertex_shader_source() -> String {
    specialize(include_str!("shaders/vertices.wgsl"))
}

/// Work groups covering one invocation per particle
pub fn workgroups(total_particles: u32) -> u32 {
    total_particles.div_ceil(WORKGROUP_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_constant_sizes() {
        assert_eq!(std::mem::size_of::<UpdateConstants>(), 112);
        assert_eq!(std::mem::size_of::<VertexConstants>(), 32);
        assert!(std::mem::size_of::<UpdateConstants>() as u32 <= hair_gpu::MAX_PUSH_CONSTANT_SIZE);
    }

    #[test]
    fn sources_are_fully_specialized() {
        for source in [update_shader_source(), vertex_shader_source()] {
            assert!(!source.contains("{{"), "unsubstituted placeholder");
            assert!(source.contains(&format!("@workgroup_size({WORKGROUP_SIZE})")));
        }
        assert!(update_shader_source().contains(&format!("= {MAX_PARTICLES_PER_STRAND}u;")));
    }

    #[test]
    fn last_group_is_covered() {
        assert_eq!(workgroups(0), 0);
        assert_eq!(workgroups(1), 1);
        assert_eq!(workgroups(WORKGROUP_SIZE), 1);
        assert_eq!(workgroups(WORKGROUP_SIZE + 1), 2);
    }

    #[test]
    fn update_constants_derive_timing() {
        let layout = HairLayout::new(3, 8);
        let c = UpdateConstants::new(&HairParams::default(), layout, 0.5, Mat4::IDENTITY);
        assert_eq!((c.dt, c.dt2, c.inv_dt), (0.5, 0.25, 2.0));
        assert_eq!(c.total_particles, 24);
        assert_eq!(c.root_transform[3][3], 1.0);
    }
}
