//! CPU versions of the two compute kernels
//!
//! `dftl_step` mirrors `update.wgsl` and `billboard` mirrors `vertices.wgsl`
//! step for step, so the shader maths can be checked without a device.

use crate::constants::EPSILON;
use crate::growth::ParticleState;
use crate::params::HairParams;
use glam::Vec3;

/// Advance every strand by one tick with dynamic follow-the-leader.
///
/// `roots` are the transformed root positions, one per strand. Particle 0 is
/// pinned to its root; every other particle is predicted under gravity, pulled
/// back to `separation` from its predecessor `iterations` times and given the
/// velocity implied by its motion plus the damped correction of its successor.
pub fn dftl_step(state: &mut ParticleState, roots: &[Vec3], params: &HairParams, dt: f32) {
    let layout = state.layout;
    let count = layout.particles_per_strand as usize;
    let inv_dt = 1.0 / dt;

    let mut previous = vec![Vec3::ZERO; count];
    let mut position = vec![Vec3::ZERO; count];
    let mut correction = vec![Vec3::ZERO; count];

    for (strand, &root) in roots.iter().enumerate().take(layout.strands as usize) {
        let s = strand as u32;

        for i in 0..count {
            let p = state.position(s, i as u32);
            let v = state.velocity(s, i as u32);
            previous[i] = p;
            position[i] = if i == 0 {
                root
            } else {
                p + v * dt + params.gravity * dt * dt
            };
            correction[i] = Vec3::ZERO;
        }

        for _ in 0..params.iterations {
            for i in 1..count {
                let target = follow(position[i - 1], position[i], params.separation);
                correction[i] += target - position[i];
                position[i] = target;
            }
        }

        for i in 0..count {
            let velocity = if i == 0 {
                Vec3::ZERO
            } else {
                let mut v = (position[i] - previous[i]) * inv_dt;
                if i + 1 < count {
                    v += correction[i + 1] * params.damping * inv_dt;
                }
                v
            };
            state.set_position(s, i as u32, position[i]);
            state.set_velocity(s, i as u32, velocity);
        }
    }
}

/// Point at `separation` from `leader` in the direction of `follower`
fn follow(leader: Vec3, follower: Vec3, separation: f32) -> Vec3 {
    let dir = follower - leader;
    let len = dir.length();
    if len > EPSILON {
        leader + dir * (separation / len)
    } else {
        // coincident particles hang straight down
        leader - Vec3::Y * separation
    }
}

/// Expand every particle into two vertices either side of the strand.
///
/// Output vertex `2k` is `p - side` and `2k + 1` is `p + side` for flat
/// particle index `k`, where `side` is perpendicular to both the strand
/// direction and `view_dir` with length `radius`.
pub fn billboard(state: &ParticleState, view_dir: Vec3, radius: f32) -> Vec<Vec3> {
    let layout = state.layout;
    let count = layout.particles_per_strand;
    let mut vertices = vec![Vec3::ZERO; layout.vertex_count() as usize];

    for strand in 0..layout.strands {
        for i in 0..count {
            let p = state.position(strand, i);
            let dir = if i + 1 < count {
                state.position(strand, i + 1) - p
            } else if i > 0 {
                p - state.position(strand, i - 1)
            } else {
                Vec3::Y
            };

            let side = side_offset(dir, view_dir, radius);
            let k = layout.flat_index(strand, i);
            vertices[2 * k] = p - side;
            vertices[2 * k + 1] = p + side;
        }
    }
    vertices
}

fn side_offset(dir: Vec3, view_dir: Vec3, radius: f32) -> Vec3 {
    let side = dir.cross(view_dir);
    let len = side.length();
    if len > EPSILON {
        side * (radius / len)
    } else {
        Vec3::new(radius, 0.0, 0.0)
    }
}
