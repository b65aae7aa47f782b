//! # Hair Renderer
//!
//! First-person camera and the draw pass for the billboarded hair strands.

pub mod camera;
pub mod renderer;

pub use camera::*;
pub use renderer::*;
