//! Fixed-timestep driver
//!
//! Wall-clock time goes into an accumulator; the simulator is ticked in fixed
//! steps of `1 / ticks_per_second` until less than one step is left, then one
//! frame is drawn. There is no cap on ticks per frame: a tick rate the machine
//! cannot sustain makes every frame slower than the last.

use crate::input::InputSnapshot;
use hair_physics::{tick_duration, HairConfigError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    pub ticks_per_second: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: hair_physics::constants::TICKS_PER_SECOND,
        }
    }
}

/// One simulation strategy, chosen at startup
pub trait Simulator {
    type Error;

    /// Called once per frame with the elapsed wall-clock time
    fn process_input(
        &mut self,
        input: &InputSnapshot,
        previous: &InputSnapshot,
        elapsed: f32,
    ) -> Result<(), Self::Error>;

    /// One fixed tick of `dt` seconds
    fn update(&mut self, dt: f32) -> Result<(), Self::Error>;

    /// `interpolation` is the fraction of a tick left in the accumulator
    fn draw(&mut self, interpolation: f32) -> Result<(), Self::Error>;
}

/// What one call to [`FixedStepLoop::frame`] did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub elapsed: f64,
    pub ticks: u32,
    pub interpolation: f32,
}

#[derive(Debug)]
pub struct FixedStepLoop {
    tick: f64,
    accumulator: f64,
    previous_now: Instant,
    previous_input: InputSnapshot,
    total_ticks: u64,
    frames: u64,
}

impl FixedStepLoop {
    pub fn new(config: &LoopConfig, start: Instant) -> Result<Self, HairConfigError> {
        let tick = tick_duration(config.ticks_per_second)?;
        log::info!(
            "✓ Fixed step loop: {} ticks per second ({:.3} ms per tick)",
            config.ticks_per_second,
            tick * 1000.0
        );
        Ok(Self {
            tick,
            accumulator: 0.0,
            previous_now: start,
            previous_input: InputSnapshot::default(),
            total_ticks: 0,
            frames: 0,
        })
    }

    pub fn tick_duration(&self) -> f64 {
        self.tick
    }

    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Run one frame at time `now`: input, the ticks due, then a draw
    pub fn frame<S: Simulator>(
        &mut self,
        simulator: &mut S,
        now: Instant,
        input: InputSnapshot,
    ) -> Result<FrameReport, S::Error> {
        let elapsed = now
            .checked_duration_since(self.previous_now)
            .unwrap_or(Duration::ZERO)
            .as_secs_f64();
        self.previous_now = now;
        self.accumulator += elapsed;

        simulator.process_input(&input, &self.previous_input, elapsed as f32)?;
        self.previous_input = input;

        let mut ticks = 0;
        while self.accumulator >= self.tick {
            simulator.update(self.tick as f32)?;
            self.accumulator -= self.tick;
            ticks += 1;
        }
        self.total_ticks += ticks as u64;

        let interpolation = (self.accumulator / self.tick) as f32;
        simulator.draw(interpolation)?;
        self.frames += 1;

        log::trace!("frame {}: {elapsed:.4}s, {ticks} ticks", self.frames);
        Ok(FrameReport {
            elapsed,
            ticks,
            interpolation,
        })
    }
}
