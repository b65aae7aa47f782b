//! GPU Hair Strand Simulation
//!
//! Grows one strand from every vertex of a root mesh, simulates the strands
//! with follow-the-leader constraints in compute shaders at a fixed tick rate
//! and draws them as camera-facing ribbons.

mod app;
mod headless;
mod simulator;

use anyhow::Context;
use clap::Parser;
use hair_gpu::{Extent2d, FrameConfig, WgpuOptions};
use hair_physics::{constants, load_root_mesh, HairParams};
use hair_simulation::LoopConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(version, about = "Real-time GPU hair strand simulation")]
struct Args {
    /// Root mesh (OBJ with normals); one strand grows from each vertex
    #[arg(long, default_value = "data/obj/root.obj")]
    mesh: PathBuf,

    #[arg(long, default_value_t = constants::PARTICLES_PER_STRAND)]
    particles_per_strand: u32,

    /// Rest distance between neighbouring particles
    #[arg(long, default_value_t = constants::PARTICLE_SEPARATION)]
    separation: f32,

    /// Half width of the drawn strands
    #[arg(long, default_value_t = constants::DRAW_RADIUS)]
    radius: f32,

    /// Follow-the-leader velocity correction factor
    #[arg(long, default_value_t = constants::DAMPING, allow_negative_numbers = true)]
    damping: f32,

    /// Constraint passes per tick
    #[arg(long, default_value_t = constants::CONSTRAINT_ITERATIONS)]
    iterations: u32,

    #[arg(long, default_value_t = constants::TICKS_PER_SECOND)]
    ticks_per_second: u32,

    #[arg(long, default_value_t = 2)]
    frames_in_flight: u32,

    /// Fence wait limit in milliseconds, 0 waits forever
    #[arg(long, default_value_t = 5000)]
    fence_timeout_ms: u64,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Present with vsync instead of as fast as possible
    #[arg(long)]
    vsync: bool,

    /// Default log filter; RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Run on the recording backend without a window and report hazards
    #[arg(long)]
    headless: bool,

    /// Frames to run with --headless
    #[arg(long, default_value_t = 600)]
    frames: u64,
}

impl Args {
    fn params(&self) -> HairParams {
        HairParams {
            particles_per_strand: self.particles_per_strand,
            separation: self.separation,
            draw_radius: self.radius,
            damping: self.damping,
            iterations: self.iterations,
            ..HairParams::default()
        }
    }

    fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            frames_in_flight: self.frames_in_flight,
            fence_timeout: match self.fence_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        }
    }

    fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            ticks_per_second: self.ticks_per_second,
        }
    }

    fn wgpu_options(&self) -> WgpuOptions {
        WgpuOptions {
            extent: Extent2d::new(self.width, self.height),
            present_mode: if self.vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            ..WgpuOptions::default()
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let params = args.params();
    params.validate()?;

    let mesh = load_root_mesh(&args.mesh)
        .with_context(|| format!("failed to load root mesh '{}'", args.mesh.display()))?;
    log::info!(
        "✓ Loaded {} roots from '{}'",
        mesh.vertices.len(),
        args.mesh.display()
    );

    if args.headless {
        let report = headless::run(
            &mesh,
            params,
            &args.frame_config(),
            &args.loop_config(),
            args.frames,
        )?;
        anyhow::ensure!(
            report.violations.is_empty(),
            "{} synchronisation violations",
            report.violations.len()
        );
        return Ok(());
    }

    app::run(app::AppSettings {
        mesh,
        params,
        frame_config: args.frame_config(),
        loop_config: args.loop_config(),
        wgpu: args.wgpu_options(),
    })
}

fn main() -> ExitCode {
    let args = Args::parse();

    // RUST_LOG=debug for per-resource output, trace for every fence and submission
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    log::info!("Starting hair simulation...");

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_library() {
        let args = Args::parse_from(["hair"]);
        let params = args.params();
        assert_eq!(params, HairParams::default());
        assert_eq!(args.frame_config(), FrameConfig::default());
        assert_eq!(args.loop_config(), LoopConfig::default());
    }

    #[test]
    fn zero_timeout_waits_forever() {
        let args = Args::parse_from(["hair", "--fence-timeout-ms", "0"]);
        assert_eq!(args.frame_config().fence_timeout, None);
    }

    #[test]
    fn negative_damping_parses() {
        let args = Args::parse_from(["hair", "--damping", "-0.5", "--headless"]);
        assert_eq!(args.params().damping, -0.5);
        assert!(args.headless);
    }

    #[test]
    fn bundled_mesh_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/obj/root.obj");
        let mesh = load_root_mesh(path).unwrap();
        assert!(!mesh.vertices.is_empty());
        assert_eq!(mesh.indices.len() % 3, 0);
    }
}
