//! Windowed application on winit
//!
//! The window is fixed-size: the swapchain, depth image and pipelines are
//! built once for its extent, and a resize is reported as surface loss.

use crate::simulator::HairSimulator;
use anyhow::Context;
use glam::Vec2;
use hair_gpu::{Extent2d, FrameConfig, GpuError, WgpuGpu, WgpuOptions};
use hair_physics::{HairParams, RootMesh};
use hair_simulation::{FixedStepLoop, InputState, Keys, LoopConfig};
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

/// Everything needed to start a windowed run
pub struct AppSettings {
    pub mesh: RootMesh,
    pub params: HairParams,
    pub frame_config: FrameConfig,
    pub loop_config: LoopConfig,
    pub wgpu: WgpuOptions,
}

struct Running {
    window: Arc<Window>,
    simulator: HairSimulator<WgpuGpu>,
    fixed: FixedStepLoop,
    extent: Extent2d,

    // FPS in the title, refreshed once a second
    title_frames: u32,
    title_since: Instant,
}

struct App {
    settings: AppSettings,
    running: Option<Running>,
    input: InputState,
    error: Option<anyhow::Error>,
}

fn map_key(code: KeyCode) -> Option<Keys> {
    let keys = match code {
        KeyCode::KeyW => Keys::FORWARD,
        KeyCode::KeyS => Keys::BACK,
        KeyCode::KeyA => Keys::LEFT,
        KeyCode::KeyD => Keys::RIGHT,
        KeyCode::KeyP => Keys::PAUSE,
        KeyCode::KeyR => Keys::RESET,
        KeyCode::ArrowUp => Keys::ROOT_FORWARD,
        KeyCode::ArrowDown => Keys::ROOT_BACK,
        KeyCode::ArrowLeft => Keys::ROOT_LEFT,
        KeyCode::ArrowRight => Keys::ROOT_RIGHT,
        KeyCode::KeyQ => Keys::ROOT_YAW_LEFT,
        KeyCode::KeyE => Keys::ROOT_YAW_RIGHT,
        KeyCode::Escape => Keys::EXIT,
        _ => return None,
    };
    Some(keys)
}

impl App {
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        // the first error is the cause, later ones are fallout
        if self.error.is_none() {
            self.error = Some(error);
        }
        event_loop.exit();
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<Running> {
        let extent = self.settings.wgpu.extent;
        let window_attributes = Window::default_attributes()
            .with_title("Hair Simulation")
            .with_inner_size(winit::dpi::PhysicalSize::new(extent.width, extent.height))
            .with_resizable(false);
        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .context("failed to create the window")?,
        );

        // The compositor may still hand out a different size than requested
        let size = window.inner_size();
        let mut options = self.settings.wgpu.clone();
        options.extent = Extent2d::new(size.width, size.height);

        let gpu = pollster::block_on(WgpuGpu::new(window.clone(), &options))
            .context("failed to initialise the GPU")?;
        let simulator = HairSimulator::new(
            gpu,
            &self.settings.mesh,
            self.settings.params,
            &self.settings.frame_config,
        )?;
        let fixed = FixedStepLoop::new(&self.settings.loop_config, Instant::now())?;

        Ok(Running {
            window,
            simulator,
            fixed,
            extent: options.extent,
            title_frames: 0,
            title_since: Instant::now(),
        })
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(running) = &mut self.running else {
            return;
        };

        let input = self.input.poll();
        let result = running.fixed.frame(&mut running.simulator, Instant::now(), input);
        if let Err(err) = result {
            self.fail(event_loop, anyhow::Error::new(err).context("frame failed"));
            return;
        }

        running.title_frames += 1;
        let since = running.title_since.elapsed();
        if since >= Duration::from_secs(1) {
            let fps = running.title_frames as f64 / since.as_secs_f64();
            let physics = if running.simulator.simulation().physics_enabled() {
                ""
            } else {
                " (paused)"
            };
            running.window.set_title(&format!(
                "Hair Simulation - {fps:.0} FPS - {} strands{physics}",
                running.simulator.simulation().layout().strands
            ));
            running.title_frames = 0;
            running.title_since = Instant::now();
        }

        if running.simulator.exit_requested() {
            event_loop.exit();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() || self.error.is_some() {
            return;
        }
        match self.start(event_loop) {
            Ok(running) => {
                running.window.request_redraw();
                self.running = Some(running);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => {
                if let Some(keys) = map_key(code) {
                    self.input.set(keys, state == ElementState::Pressed);
                }
            }

            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => self.input.set(Keys::LOOK, state == ElementState::Pressed),

            WindowEvent::Resized(size) => {
                let resized = self.running.as_ref().is_some_and(|running| {
                    Extent2d::new(size.width, size.height) != running.extent
                });
                if resized {
                    let lost = GpuError::SurfaceLost(format!(
                        "window resized to {}x{}, resizing is not supported",
                        size.width, size.height
                    ));
                    self.fail(event_loop, anyhow::Error::new(lost));
                }
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.input
                .add_mouse_motion(Vec2::new(delta.0 as f32, delta.1 as f32));
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(running) = &self.running {
            running.window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        let Some(running) = self.running.take() else {
            return;
        };
        log::info!(
            "Exiting after {} frames and {} ticks",
            running.fixed.frames(),
            running.fixed.total_ticks()
        );
        if let Err(err) = running.simulator.shutdown() {
            if self.error.is_none() {
                self.error = Some(anyhow::Error::new(err).context("shutdown failed"));
            }
        }
    }
}

/// Open the window and run until it closes or something fails
pub fn run(settings: AppSettings) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("failed to create the event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App {
        settings,
        running: None,
        input: InputState::default(),
        error: None,
    };
    event_loop.run_app(&mut app)?;

    match app.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
