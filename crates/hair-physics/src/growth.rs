//! Hair growth from a root mesh
//!
//! Particle state is stored structure-of-arrays: all X components, then all Y,
//! then all Z, each plane `total_particles` long. Particle `i` of strand `s`
//! lives at flat index `s * particles_per_strand + i` within every plane.
//! Velocities follow the positions in the same layout on the GPU.

use crate::mesh::RootVertex;
use glam::Vec3;

/// Strand count and length, everything else about the buffers derives from these
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HairLayout {
    pub strands: u32,
    pub particles_per_strand: u32,
}

impl HairLayout {
    pub fn new(strands: u32, particles_per_strand: u32) -> Self {
        Self {
            strands,
            particles_per_strand,
        }
    }

    pub fn total_particles(&self) -> u32 {
        self.strands * self.particles_per_strand
    }

    pub fn flat_index(&self, strand: u32, particle: u32) -> usize {
        (strand * self.particles_per_strand + particle) as usize
    }

    /// Floats in the GPU state buffer: position planes followed by velocity planes
    pub fn state_floats(&self) -> usize {
        self.total_particles() as usize * 6
    }

    /// Two billboard vertices per particle
    pub fn vertex_count(&self) -> u32 {
        self.total_particles() * 2
    }

    /// Triangle list over the billboard vertices, two triangles per strand segment
    pub fn triangle_indices(&self) -> Vec<u32> {
        let segments = self.particles_per_strand.saturating_sub(1);
        let mut indices = Vec::with_capacity((self.strands * segments * 6) as usize);

        for strand in 0..self.strands {
            let base = strand * self.particles_per_strand * 2;
            for segment in 0..segments {
                let a = base + segment * 2;
                indices.extend_from_slice(&[a, a + 1, a + 2, a + 1, a + 3, a + 2]);
            }
        }
        indices
    }
}

/// CPU copy of the particle state buffer
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleState {
    pub layout: HairLayout,
    /// X plane, Y plane, Z plane
    pub positions: Vec<f32>,
    /// Same layout as `positions`
    pub velocities: Vec<f32>,
}

impl ParticleState {
    pub fn zeroed(layout: HairLayout) -> Self {
        let len = layout.total_particles() as usize * 3;
        Self {
            layout,
            positions: vec![0.0; len],
            velocities: vec![0.0; len],
        }
    }

    /// Rebuild from the GPU buffer contents (positions then velocities)
    pub fn from_state_buffer(layout: HairLayout, data: &[f32]) -> Option<Self> {
        if data.len() != layout.state_floats() {
            return None;
        }
        let (positions, velocities) = data.split_at(data.len() / 2);
        Some(Self {
            layout,
            positions: positions.to_vec(),
            velocities: velocities.to_vec(),
        })
    }

    /// Contents for the GPU state buffer
    pub fn to_state_buffer(&self) -> Vec<f32> {
        let mut data = Vec::with_capacity(self.layout.state_floats());
        data.extend_from_slice(&self.positions);
        data.extend_from_slice(&self.velocities);
        data
    }

    fn plane(&self) -> usize {
        self.layout.total_particles() as usize
    }

    pub fn position(&self, strand: u32, particle: u32) -> Vec3 {
        read_soa(&self.positions, self.plane(), self.layout.flat_index(strand, particle))
    }

    pub fn set_position(&mut self, strand: u32, particle: u32, value: Vec3) {
        let (plane, index) = (self.plane(), self.layout.flat_index(strand, particle));
        write_soa(&mut self.positions, plane, index, value);
    }

    pub fn velocity(&self, strand: u32, particle: u32) -> Vec3 {
        read_soa(&self.velocities, self.plane(), self.layout.flat_index(strand, particle))
    }

    pub fn set_velocity(&mut self, strand: u32, particle: u32, value: Vec3) {
        let (plane, index) = (self.plane(), self.layout.flat_index(strand, particle));
        write_soa(&mut self.velocities, plane, index, value);
    }
}

fn read_soa(data: &[f32], plane: usize, index: usize) -> Vec3 {
    Vec3::new(data[index], data[plane + index], data[2 * plane + index])
}

fn write_soa(data: &mut [f32], plane: usize, index: usize, value: Vec3) {
    data[index] = value.x;
    data[plane + index] = value.y;
    data[2 * plane + index] = value.z;
}

/// Grows straight strands along the root normals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HairGrowthModel {
    pub particles_per_strand: u32,
    pub separation: f32,
}

impl HairGrowthModel {
    pub fn new(particles_per_strand: u32, separation: f32) -> Self {
        Self {
            particles_per_strand,
            separation,
        }
    }

    /// One strand per root vertex, particle `i` at `position + normal * (separation * i)`
    pub fn grow(&self, roots: &[RootVertex]) -> ParticleState {
        let layout = HairLayout::new(roots.len() as u32, self.particles_per_strand);
        let mut state = ParticleState::zeroed(layout);

        for (strand, root) in roots.iter().enumerate() {
            let (position, normal) = (root.position(), root.normal());
            for i in 0..self.particles_per_strand {
                let particle = position + normal * (self.separation * i as f32);
                state.set_position(strand as u32, i, particle);
            }
        }

        log::debug!(
            "Grew {} strands x {} particles ({} total)",
            layout.strands,
            layout.particles_per_strand,
            layout.total_particles()
        );
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn root(position: [f32; 3], normal: [f32; 3]) -> RootVertex {
        RootVertex { position, normal }
    }

    #[test]
    fn planes_are_contiguous() {
        let roots = [root([1.0, 2.0, 3.0], [0.0, 1.0, 0.0]), root([4.0, 5.0, 6.0], [1.0, 0.0, 0.0])];
        let state = HairGrowthModel::new(2, 0.5).grow(&roots);

        assert_eq!(state.positions, vec![1.0, 1.0, 4.0, 4.5, 2.0, 2.5, 5.0, 5.0, 3.0, 3.0, 6.0, 6.0]);
        assert!(state.velocities.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn triangle_indices_cover_each_segment() {
        let layout = HairLayout::new(2, 3);
        let indices = layout.triangle_indices();

        assert_eq!(indices.len(), 2 * 2 * 6);
        assert_eq!(&indices[..6], &[0, 1, 2, 1, 3, 2]);
        // second strand starts after the first strand's 6 vertices
        assert_eq!(&indices[12..18], &[6, 7, 8, 7, 9, 8]);
        assert!(indices.iter().all(|&i| i < layout.vertex_count()));
    }

    #[test]
    fn single_particle_strands_have_no_triangles() {
        assert!(HairLayout::new(4, 1).triangle_indices().is_empty());
    }

    #[test]
    fn state_buffer_roundtrip_preserves_layout() {
        let roots = [root([0.0, 0.0, 0.0], [0.0, 0.0, 1.0])];
        let state = HairGrowthModel::new(4, 0.1).grow(&roots);
        let data = state.to_state_buffer();

        assert_eq!(data.len(), state.layout.state_floats());
        assert_eq!(ParticleState::from_state_buffer(state.layout, &data), Some(state.clone()));
        assert_eq!(ParticleState::from_state_buffer(state.layout, &data[1..]), None);
    }

    fn roots() -> impl Strategy<Value = Vec<RootVertex>> {
        let component = -10.0f32..10.0;
        let vertex = ([component.clone(), component.clone(), component.clone()], [component.clone(), component.clone(), component])
            .prop_map(|(p, n)| root(p, n));
        prop::collection::vec(vertex, 0..16)
    }

    proptest! {
        #[test]
        fn particles_sit_along_root_normals(
            roots in roots(),
            particles in 1u32..12,
            separation in 0.001f32..1.0,
        ) {
            let state = HairGrowthModel::new(particles, separation).grow(&roots);

            prop_assert_eq!(state.layout.total_particles() as usize, roots.len() * particles as usize);
            prop_assert_eq!(state.positions.len(), roots.len() * particles as usize * 3);

            for (s, root) in roots.iter().enumerate() {
                prop_assert_eq!(state.position(s as u32, 0), root.position());
                for i in 1..particles {
                    let expected = root.position() + root.normal() * separation * i as f32;
                    let actual = state.position(s as u32, i);
                    assert_relative_eq!(actual.x, expected.x, epsilon = 1e-4);
                    assert_relative_eq!(actual.y, expected.y, epsilon = 1e-4);
                    assert_relative_eq!(actual.z, expected.z, epsilon = 1e-4);
                }
            }
        }
    }
}
