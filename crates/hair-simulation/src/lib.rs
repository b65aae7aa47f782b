//! # Hair Simulation
//!
//! The two compute stages of a physics tick (follow-the-leader update, then
//! billboard vertex generation), the barriers between them and the draw, and
//! the fixed-step loop that drives ticks and frames.

pub mod fixed_step;
pub mod input;
pub mod params;
pub mod simulation;

pub use fixed_step::*;
pub use input::*;
pub use params::*;
pub use simulation::*;
