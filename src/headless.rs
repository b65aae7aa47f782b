//! Headless run on the recording backend
//!
//! Drives the fixed-step loop with a synthetic clock and a scripted input
//! sequence, then reports what the queue saw and every protocol violation.

use crate::simulator::HairSimulator;
use anyhow::Context;
use hair_gpu::{FrameConfig, HeadlessConfig, HeadlessGpu, Violation};
use hair_physics::{HairParams, RootMesh};
use hair_simulation::{FixedStepLoop, InputSnapshot, Keys, LoopConfig};
use std::time::{Duration, Instant};

/// Synthetic display refresh; deliberately off the default tick rate
pub const FRAME_INTERVAL: Duration = Duration::from_micros(13_333);

#[derive(Debug)]
pub struct HeadlessReport {
    pub frames: u64,
    pub ticks: u64,
    pub submissions: u64,
    pub violations: Vec<Violation>,
}

/// Input for `frame` of `total`: fly and drag the roots early on, pause for
/// the middle third, reset near the end
fn scripted_input(frame: u64, total: u64) -> InputSnapshot {
    let mut keys = Keys::empty();
    if frame < total / 4 {
        keys |= Keys::FORWARD | Keys::ROOT_LEFT | Keys::ROOT_YAW_LEFT;
    }
    if frame == total / 3 || frame == 2 * total / 3 {
        keys |= Keys::PAUSE;
    }
    if frame + 2 == total {
        keys |= Keys::RESET;
    }
    InputSnapshot {
        keys,
        ..Default::default()
    }
}

pub fn run(
    mesh: &RootMesh,
    params: HairParams,
    frame_config: &FrameConfig,
    loop_config: &LoopConfig,
    frames: u64,
) -> anyhow::Result<HeadlessReport> {
    log::info!("Headless run: {frames} frames");

    let gpu = HeadlessGpu::new(HeadlessConfig::default());
    let mut simulator = HairSimulator::new(gpu, mesh, params, frame_config)
        .context("failed to set up the headless simulator")?;

    let start = Instant::now();
    let mut fixed = FixedStepLoop::new(loop_config, start)?;
    let mut now = start;
    for frame in 0..frames {
        now += FRAME_INTERVAL;
        fixed
            .frame(&mut simulator, now, scripted_input(frame, frames))
            .with_context(|| format!("headless frame {frame} failed"))?;
        // violations are kept, the command trace is not
        simulator.gpu_mut().clear_trace();
    }

    let gpu = simulator.shutdown().context("headless shutdown failed")?;
    let report = HeadlessReport {
        frames: fixed.frames(),
        ticks: fixed.total_ticks(),
        submissions: gpu.submission_count(),
        violations: gpu.violations().to_vec(),
    };

    log::info!(
        "Headless run finished: {} frames, {} ticks, {} submissions, {} violations",
        report.frames,
        report.ticks,
        report.submissions,
        report.violations.len()
    );
    for violation in &report.violations {
        log::error!("  {violation}");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hair_physics::parse_root_mesh;

    const PATCH: &str = "\
v 0 1 0
v 0.1 1 0
v 0 1 0.1
v 0.1 1 0.1
vn 0 1 0
f 1//1 2//1 4//1 3//1
";

    #[test]
    fn scripted_run_is_hazard_free() {
        let mesh = parse_root_mesh(PATCH).unwrap();
        let report = run(
            &mesh,
            HairParams::default(),
            &FrameConfig::default(),
            &LoopConfig::default(),
            90,
        )
        .unwrap();

        assert_eq!(report.frames, 90);
        // 90 frames of 13.333 ms at 60 ticks per second
        assert!((71..=73).contains(&report.ticks), "{} ticks", report.ticks);
        assert!(report.violations.is_empty(), "{:?}", report.violations);
        // state, roots and index uploads, one per tick, one per frame, one reset upload
        assert_eq!(report.submissions, 3 + report.ticks + 90 + 1);
    }

    #[test]
    fn script_pauses_and_resumes() {
        let total = 30;
        let presses = (0..total)
            .filter(|f| scripted_input(*f, total).held(Keys::PAUSE))
            .count();
        assert_eq!(presses, 2);
        assert!(scripted_input(total - 2, total).held(Keys::RESET));
    }
}
