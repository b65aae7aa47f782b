//! Default hair and physics constants
//!
//! These are the values a run starts with unless overridden on the command line.
//! Distances are in scene units (the root mesh is authored at roughly head scale).

/// Particles grown along each strand, root included
pub const PARTICLES_PER_STRAND: u32 = 8;

/// Upper bound on particles per strand.
/// The update kernel keeps a whole strand in private memory, so this must match
/// `MAX_PARTICLES_PER_STRAND` in `update.wgsl`.
pub const MAX_PARTICLES_PER_STRAND: u32 = 32;

/// Rest distance between neighbouring particles of a strand
pub const PARTICLE_SEPARATION: f32 = 0.08;

/// Half width of a strand once billboarded into two vertices
pub const DRAW_RADIUS: f32 = 0.004;

/// External force applied to every free particle (gravity)
pub const GRAVITY: [f32; 3] = [0.0, -9.81, 0.0];

/// Dynamic follow-the-leader velocity correction factor.
/// Negative: the correction of the next particle is subtracted from the velocity.
pub const DAMPING: f32 = -0.9;

/// Follow-the-leader passes per tick
pub const CONSTRAINT_ITERATIONS: u32 = 5;

/// Fixed physics rate
pub const TICKS_PER_SECOND: u32 = 60;

/// Lengths below this are treated as degenerate directions
pub const EPSILON: f32 = 1.0e-6;
