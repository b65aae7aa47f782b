//! The hair simulator driven by the fixed-step loop
//!
//! Owns the device, the frame ring, the simulation and the renderer. Generic
//! over the backend so the window and the headless driver run the same code.

use glam::{Mat4, Vec2, Vec3};
use hair_gpu::{Device, FrameConfig, FrameScheduler, Presenter};
use hair_physics::{HairParams, RootMesh};
use hair_renderer::{Camera, HairMesh, HairRenderer};
use hair_simulation::{HairSimulation, InputSnapshot, Keys, SimulationError, Simulator};

/// Root translation speed, units per second
pub const ROOT_SPEED: f32 = 0.5;
/// Root yaw speed, radians per second
pub const ROOT_TURN_SPEED: f32 = std::f32::consts::FRAC_PI_2;

/// Where the camera starts, relative to the centre of the roots
const CAMERA_OFFSET: Vec3 = Vec3::new(0.0, 0.0, 1.5);

pub struct HairSimulator<G> {
    gpu: G,
    frames: FrameScheduler,
    simulation: HairSimulation,
    renderer: HairRenderer,
    camera: Camera,

    // Root motion, integrated per tick
    pivot: Vec3,
    root_translation: Vec3,
    root_yaw: f32,
    root_move: Vec2,
    root_turn: f32,

    exit_requested: bool,
}

impl<G: Device + Presenter> HairSimulator<G> {
    pub fn new(
        mut gpu: G,
        mesh: &RootMesh,
        params: HairParams,
        frame_config: &FrameConfig,
    ) -> Result<Self, SimulationError> {
        let simulation =
            HairSimulation::new(&mut gpu, &mesh.vertices, params, frame_config.fence_timeout)?;
        let renderer = HairRenderer::new(&mut gpu)?;
        let frames = FrameScheduler::new(&mut gpu, frame_config)?;

        let pivot = centroid(mesh);
        let camera = Camera::new(pivot + CAMERA_OFFSET, gpu.extent().aspect());

        log::info!(
            "✓ Hair simulator: {} strands, {} frames in flight",
            simulation.layout().strands,
            frames.frames_in_flight()
        );

        Ok(Self {
            gpu,
            frames,
            simulation,
            renderer,
            camera,
            pivot,
            root_translation: Vec3::ZERO,
            root_yaw: 0.0,
            root_move: Vec2::ZERO,
            root_turn: 0.0,
            exit_requested: false,
        })
    }

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    pub fn gpu_mut(&mut self) -> &mut G {
        &mut self.gpu
    }

    pub fn simulation(&self) -> &HairSimulation {
        &self.simulation
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Rotation about the centre of the roots, then translation
    pub fn root_transform(&self) -> Mat4 {
        Mat4::from_translation(self.root_translation + self.pivot)
            * Mat4::from_rotation_y(self.root_yaw)
            * Mat4::from_translation(-self.pivot)
    }

    /// Wait for all GPU work, release every resource and hand the device back
    pub fn shutdown(self) -> Result<G, SimulationError> {
        let Self {
            mut gpu,
            mut frames,
            simulation,
            renderer,
            ..
        } = self;

        frames.wait_all(&mut gpu)?;
        gpu.wait_idle()?;
        renderer.destroy(&mut gpu)?;
        simulation.destroy(&mut gpu)?;
        frames.destroy(&mut gpu)?;
        log::info!("Hair simulator shut down");
        Ok(gpu)
    }
}

impl<G: Device + Presenter> Simulator for HairSimulator<G> {
    type Error = SimulationError;

    fn process_input(
        &mut self,
        input: &InputSnapshot,
        previous: &InputSnapshot,
        elapsed: f32,
    ) -> Result<(), SimulationError> {
        if input.held(Keys::LOOK) {
            self.camera.look(input.mouse_delta);
        }
        self.camera.fly(
            input.axis(Keys::BACK, Keys::FORWARD),
            input.axis(Keys::LEFT, Keys::RIGHT),
            elapsed,
        );

        self.root_move = Vec2::new(
            input.axis(Keys::ROOT_LEFT, Keys::ROOT_RIGHT),
            input.axis(Keys::ROOT_BACK, Keys::ROOT_FORWARD),
        );
        self.root_turn = input.axis(Keys::ROOT_YAW_RIGHT, Keys::ROOT_YAW_LEFT);

        if input.pressed(previous, Keys::PAUSE) {
            let running = self.simulation.toggle_physics();
            log::info!("Physics {}", if running { "resumed" } else { "paused" });
        }
        if input.pressed(previous, Keys::RESET) {
            self.simulation.reset(&mut self.gpu)?;
            self.root_translation = Vec3::ZERO;
            self.root_yaw = 0.0;
        }
        self.exit_requested |= input.held(Keys::EXIT);
        Ok(())
    }

    fn update(&mut self, dt: f32) -> Result<(), SimulationError> {
        // Pinned roots only move while physics runs
        if self.simulation.physics_enabled() {
            self.root_yaw += self.root_turn * ROOT_TURN_SPEED * dt;
            self.root_translation +=
                Vec3::new(self.root_move.x, 0.0, -self.root_move.y) * ROOT_SPEED * dt;
            self.simulation.set_root_transform(self.root_transform());
        }
        self.simulation.tick(&mut self.gpu, dt, self.camera.front())
    }

    fn draw(&mut self, interpolation: f32) -> Result<(), SimulationError> {
        let mesh = HairMesh {
            vertex_buffer: self.simulation.vertex_buffer(),
            index_buffer: self.simulation.index_buffer(),
            index_count: self.simulation.index_count(),
        };
        let view_proj = self.camera.view_projection();

        let slot = self.frames.begin_frame(&mut self.gpu)?;
        self.renderer.record(slot, &mesh, view_proj, interpolation)?;
        self.frames.end_frame(&mut self.gpu)?;
        Ok(())
    }
}

fn centroid(mesh: &RootMesh) -> Vec3 {
    if mesh.vertices.is_empty() {
        return Vec3::ZERO;
    }
    let sum: Vec3 = mesh.vertices.iter().map(|v| v.position()).sum();
    sum / mesh.vertices.len() as f32
}
