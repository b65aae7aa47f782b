//! Hair growth and physics parameters

use crate::constants::*;
use glam::Vec3;
use thiserror::Error;

/// Rejected hair configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HairConfigError {
    #[error("particles per strand must be at least 1")]
    NoParticles,

    #[error("{requested} particles per strand exceeds the kernel maximum of {max}")]
    TooManyParticles { requested: u32, max: u32 },

    #[error("particle separation must be positive and finite, got {0}")]
    InvalidSeparation(f32),

    #[error("draw radius must be non-negative and finite, got {0}")]
    InvalidRadius(f32),

    #[error("ticks per second must be at least 1")]
    NoTicks,
}

/// Parameters shared by growth, the physics stage and vertex generation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HairParams {
    pub particles_per_strand: u32,
    pub separation: f32,
    pub draw_radius: f32,
    pub gravity: Vec3,
    pub damping: f32,
    pub iterations: u32,
}

impl Default for HairParams {
    fn default() -> Self {
        Self {
            particles_per_strand: PARTICLES_PER_STRAND,
            separation: PARTICLE_SEPARATION,
            draw_radius: DRAW_RADIUS,
            gravity: Vec3::from_array(GRAVITY),
            damping: DAMPING,
            iterations: CONSTRAINT_ITERATIONS,
        }
    }
}

impl HairParams {
    pub fn validate(&self) -> Result<(), HairConfigError> {
        if self.particles_per_strand == 0 {
            return Err(HairConfigError::NoParticles);
        }
        if self.particles_per_strand > MAX_PARTICLES_PER_STRAND {
            return Err(HairConfigError::TooManyParticles {
                requested: self.particles_per_strand,
                max: MAX_PARTICLES_PER_STRAND,
            });
        }
        if !(self.separation.is_finite() && self.separation > 0.0) {
            return Err(HairConfigError::InvalidSeparation(self.separation));
        }
        if !(self.draw_radius.is_finite() && self.draw_radius >= 0.0) {
            return Err(HairConfigError::InvalidRadius(self.draw_radius));
        }
        Ok(())
    }
}

/// Fixed tick duration for a tick rate
pub fn tick_duration(ticks_per_second: u32) -> Result<f64, HairConfigError> {
    if ticks_per_second == 0 {
        return Err(HairConfigError::NoTicks);
    }
    Ok(1.0 / ticks_per_second as f64)
}
