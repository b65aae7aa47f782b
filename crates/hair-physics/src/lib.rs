//! Hair strands: root mesh loading, growth and the physics maths
//!
//! Everything here is plain CPU data. The GPU side lives in `hair-simulation`,
//! which uploads a [`ParticleState`] and runs the same maths as [`reference`].

pub mod constants;
pub mod growth;
pub mod mesh;
pub mod params;
pub mod reference;

pub use growth::{HairGrowthModel, HairLayout, ParticleState};
pub use mesh::{load_root_mesh, parse_root_mesh, MeshError, RootMesh, RootVertex};
pub use params::{tick_duration, HairConfigError, HairParams};
