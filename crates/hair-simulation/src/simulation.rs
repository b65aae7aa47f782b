//! GPU hair simulation
//!
//! A tick records two dependent dispatches into the simulation's own recorder
//! and submits them with the tick fence:
//!
//! 1. the follow-the-leader update writes the particle state (skipped while paused),
//! 2. vertex generation reads the state and overwrites the vertex buffer,
//!
//! guarded by three barriers. The vertex buffer is shared with the draw, which
//! goes to the same queue, so queue order plus these barriers is all the draw needs.

use crate::params::{
    update_shader_source, vertex_shader_source, workgroups, UpdateConstants, VertexConstants,
};
use glam::{Mat4, Vec3};
use hair_gpu::{
    create_buffer_init, Access, BindingKind, BufferDesc, BufferId, BufferUsage, CommandRecorder,
    ComputePipelineDesc, Consumer, DescriptorLayoutDesc, DescriptorLayoutId, DescriptorSetDesc,
    DescriptorSetId, Device, FenceId, GpuError, MemoryLocation, PipelineBarrier, PipelineId,
    ShaderDesc, Stages, Submission,
};
use hair_physics::{HairConfigError, HairGrowthModel, HairLayout, HairParams, ParticleState, RootVertex};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error(transparent)]
    Config(#[from] HairConfigError),

    #[error("root mesh has no vertices to grow strands from")]
    NoStrands,
}

/// Bytes per generated vertex (xyz)
pub const VERTEX_STRIDE: u64 = 12;

pub struct HairSimulation {
    params: HairParams,
    layout: HairLayout,
    initial: ParticleState,

    // Buffers
    state_buffer: BufferId,
    roots_buffer: BufferId,
    vertex_buffer: BufferId,
    index_buffer: BufferId,
    index_count: u32,

    // Compute pipelines
    update_pipeline: PipelineId,
    vertex_pipeline: PipelineId,

    // Descriptor sets
    update_layout: DescriptorLayoutId,
    vertex_layout: DescriptorLayoutId,
    update_set: DescriptorSetId,
    vertex_set: DescriptorSetId,

    recorder: CommandRecorder,
    fence: FenceId,
    fence_timeout: Option<Duration>,

    physics_enabled: bool,
    root_transform: Mat4,
    ticks: u64,
}

impl HairSimulation {
    pub fn new<D: Device>(
        device: &mut D,
        roots: &[RootVertex],
        params: HairParams,
        fence_timeout: Option<Duration>,
    ) -> Result<Self, SimulationError> {
        log::info!("Initializing HairSimulation...");
        params.validate()?;
        if roots.is_empty() {
            return Err(SimulationError::NoStrands);
        }

        let initial =
            HairGrowthModel::new(params.particles_per_strand, params.separation).grow(roots);
        let layout = initial.layout;

        // Particle state: positions then velocities, each as X/Y/Z planes
        let state = initial.to_state_buffer();
        let state_buffer = create_buffer_init(
            device,
            &BufferDesc {
                label: "Particle State Buffer".into(),
                size: (state.len() * 4) as u64,
                usage: BufferUsage::STORAGE,
                memory: MemoryLocation::DeviceLocal,
            },
            bytemuck::cast_slice(&state),
            Consumer::COMPUTE,
            fence_timeout,
        )?;

        let rest_roots: Vec<f32> = roots.iter().flat_map(|r| r.position).collect();
        let roots_buffer = create_buffer_init(
            device,
            &BufferDesc {
                label: "Root Buffer".into(),
                size: (rest_roots.len() * 4) as u64,
                usage: BufferUsage::STORAGE,
                memory: MemoryLocation::DeviceLocal,
            },
            bytemuck::cast_slice(&rest_roots),
            Consumer {
                stages: Stages::COMPUTE,
                access: Access::SHADER_READ,
            },
            fence_timeout,
        )?;

        // Written by vertex generation, read by the draw's vertex input
        let vertex_buffer = device.create_buffer(&BufferDesc {
            label: "Hair Vertex Buffer".into(),
            size: layout.vertex_count() as u64 * VERTEX_STRIDE,
            usage: BufferUsage::STORAGE | BufferUsage::VERTEX,
            memory: MemoryLocation::DeviceLocal,
        })?;

        let indices = layout.triangle_indices();
        let index_buffer = create_buffer_init(
            device,
            &BufferDesc {
                label: "Hair Index Buffer".into(),
                size: (indices.len() * 4) as u64,
                usage: BufferUsage::INDEX,
                memory: MemoryLocation::DeviceLocal,
            },
            bytemuck::cast_slice(&indices),
            Consumer::INDEX,
            fence_timeout,
        )?;

        let update_layout = device.create_descriptor_layout(&DescriptorLayoutDesc {
            label: "Update Bind Group Layout".into(),
            visibility: Stages::COMPUTE,
            bindings: vec![BindingKind::Storage, BindingKind::StorageRead],
        })?;
        let vertex_layout = device.create_descriptor_layout(&DescriptorLayoutDesc {
            label: "Vertex Bind Group Layout".into(),
            visibility: Stages::COMPUTE,
            bindings: vec![BindingKind::StorageRead, BindingKind::Storage],
        })?;

        let update_set = device.allocate_descriptor_set(&DescriptorSetDesc {
            label: "Update Bind Group".into(),
            layout: update_layout,
            buffers: vec![state_buffer, roots_buffer],
        })?;
        let vertex_set = device.allocate_descriptor_set(&DescriptorSetDesc {
            label: "Vertex Bind Group".into(),
            layout: vertex_layout,
            buffers: vec![state_buffer, vertex_buffer],
        })?;

        let update_pipeline = device.create_compute_pipeline(&ComputePipelineDesc {
            label: "Hair Update Pipeline".into(),
            shader: ShaderDesc {
                label: "Hair Update Shader".into(),
                source: update_shader_source().into(),
            },
            entry_point: "main",
            descriptor_layouts: vec![update_layout],
            push_constant_size: std::mem::size_of::<UpdateConstants>() as u32,
        })?;
        let vertex_pipeline = device.create_compute_pipeline(&ComputePipelineDesc {
            label: "Hair Vertex Pipeline".into(),
            shader: ShaderDesc {
                label: "Hair Vertex Shader".into(),
                source: vertex_shader_source().into(),
            },
            entry_point: "main",
            descriptor_layouts: vec![vertex_layout],
            push_constant_size: std::mem::size_of::<VertexConstants>() as u32,
        })?;

        let recorder = device.create_recorder("Simulation")?;
        // signaled so the first tick does not wait
        let fence = device.create_fence(true)?;

        log::info!(
            "✓ Hair simulation: {} strands x {} particles",
            layout.strands,
            layout.particles_per_strand
        );

        Ok(Self {
            params,
            layout,
            initial,
            state_buffer,
            roots_buffer,
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
            update_pipeline,
            vertex_pipeline,
            update_layout,
            vertex_layout,
            update_set,
            vertex_set,
            recorder,
            fence,
            fence_timeout,
            physics_enabled: true,
            root_transform: Mat4::IDENTITY,
            ticks: 0,
        })
    }

    /// Record and submit one tick of `dt` seconds.
    ///
    /// `view_dir` is the camera's forward direction, used to billboard strands.
    pub fn tick<D: Device>(
        &mut self,
        device: &mut D,
        dt: f32,
        view_dir: Vec3,
    ) -> Result<(), SimulationError> {
        device.wait_fence(self.fence, self.fence_timeout)?;
        device.reset_fence(self.fence)?;
        device.reset_recorder(&mut self.recorder)?;

        let total = self.layout.total_particles();
        let groups = workgroups(total);
        let recorder = &mut self.recorder;
        recorder.begin()?;

        if self.physics_enabled {
            // last tick's vertex generation read the state this dispatch rewrites
            recorder.barrier(PipelineBarrier::new(Stages::COMPUTE, Stages::COMPUTE).buffer(
                self.state_buffer,
                Access::SHADER_READ,
                Access::SHADER_WRITE,
            ));
            recorder.bind_pipeline(self.update_pipeline);
            recorder.bind_descriptor_sets(0, &[self.update_set]);
            recorder.push_constants(
                0,
                &UpdateConstants::new(&self.params, self.layout, dt, self.root_transform),
            );
            recorder.dispatch(groups, 1, 1);
        }

        // The draw must be done reading the vertices, and this tick's state
        // writes must be visible to vertex generation
        let mut barrier = PipelineBarrier::new(Stages::COMPUTE | Stages::VERTEX_INPUT, Stages::COMPUTE)
            .buffer(
                self.vertex_buffer,
                Access::VERTEX_ATTRIBUTE_READ,
                Access::SHADER_WRITE,
            );
        if self.physics_enabled {
            barrier = barrier.buffer(self.state_buffer, Access::SHADER_WRITE, Access::SHADER_READ);
        }
        recorder.barrier(barrier);

        recorder.bind_pipeline(self.vertex_pipeline);
        recorder.bind_descriptor_sets(0, &[self.vertex_set]);
        recorder.push_constants(
            0,
            &VertexConstants::new(self.layout, view_dir, self.params.draw_radius),
        );
        recorder.dispatch(groups, 1, 1);

        recorder.barrier(PipelineBarrier::new(Stages::COMPUTE, Stages::VERTEX_INPUT).buffer(
            self.vertex_buffer,
            Access::SHADER_WRITE,
            Access::VERTEX_ATTRIBUTE_READ,
        ));
        recorder.end()?;

        device.submit(&Submission::new(&self.recorder).fence(self.fence))?;
        self.ticks += 1;
        log::trace!(
            "tick {} submitted (physics {})",
            self.ticks,
            if self.physics_enabled { "on" } else { "off" }
        );
        Ok(())
    }

    /// Put every strand back where it was grown
    pub fn reset<D: Device>(&mut self, device: &mut D) -> Result<(), SimulationError> {
        device.wait_fence(self.fence, self.fence_timeout)?;
        let state = self.initial.to_state_buffer();
        hair_gpu::upload(
            device,
            self.state_buffer,
            bytemuck::cast_slice(&state),
            Consumer::COMPUTE,
            self.fence_timeout,
        )?;
        self.root_transform = Mat4::IDENTITY;
        log::info!("Hair reset");
        Ok(())
    }

    pub fn physics_enabled(&self) -> bool {
        self.physics_enabled
    }

    pub fn set_physics_enabled(&mut self, enabled: bool) {
        self.physics_enabled = enabled;
    }

    /// Flip the physics stage on or off; returns the new state
    pub fn toggle_physics(&mut self) -> bool {
        self.physics_enabled = !self.physics_enabled;
        self.physics_enabled
    }

    pub fn root_transform(&self) -> Mat4 {
        self.root_transform
    }

    /// Transform applied to the rest roots from the next tick on
    pub fn set_root_transform(&mut self, transform: Mat4) {
        self.root_transform = transform;
    }

    pub fn params(&self) -> &HairParams {
        &self.params
    }

    pub fn layout(&self) -> HairLayout {
        self.layout
    }

    pub fn initial_state(&self) -> &ParticleState {
        &self.initial
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn state_buffer(&self) -> BufferId {
        self.state_buffer
    }

    pub fn roots_buffer(&self) -> BufferId {
        self.roots_buffer
    }

    pub fn vertex_buffer(&self) -> BufferId {
        self.vertex_buffer
    }

    pub fn index_buffer(&self) -> BufferId {
        self.index_buffer
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn update_set(&self) -> DescriptorSetId {
        self.update_set
    }

    pub fn vertex_set(&self) -> DescriptorSetId {
        self.vertex_set
    }

    pub fn fence(&self) -> FenceId {
        self.fence
    }

    /// Block until the last tick has finished on the device
    pub fn wait<D: Device>(&mut self, device: &mut D) -> Result<(), SimulationError> {
        device.wait_fence(self.fence, self.fence_timeout)?;
        Ok(())
    }

    pub fn destroy<D: Device>(mut self, device: &mut D) -> Result<(), SimulationError> {
        self.wait(device)?;
        device.destroy_fence(self.fence)?;
        for buffer in [
            self.state_buffer,
            self.roots_buffer,
            self.vertex_buffer,
            self.index_buffer,
        ] {
            device.destroy_buffer(buffer)?;
        }
        device.destroy_pipeline(self.update_pipeline)?;
        device.destroy_pipeline(self.vertex_pipeline)?;
        device.destroy_descriptor_set(self.update_set)?;
        device.destroy_descriptor_set(self.vertex_set)?;
        device.destroy_descriptor_layout(self.update_layout)?;
        device.destroy_descriptor_layout(self.vertex_layout)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hair_gpu::{
        Command, FrameConfig, FrameScheduler, GpuEvent, HazardKind, HazardTracker, HeadlessConfig,
        HeadlessGpu, Presenter, RenderPassDesc, RenderTarget, Violation,
    };
    use hair_physics::reference;
    use proptest::prelude::*;

    fn roots(count: usize) -> Vec<RootVertex> {
        (0..count)
            .map(|i| RootVertex::new(Vec3::new(i as f32 * 0.1, 1.0, 0.0), Vec3::Y))
            .collect()
    }

    fn simulation(gpu: &mut HeadlessGpu, strands: usize) -> HairSimulation {
        HairSimulation::new(gpu, &roots(strands), HairParams::default(), None).unwrap()
    }

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    /// One frame that draws the hair vertices like the renderer does
    fn draw_frame(gpu: &mut HeadlessGpu, frames: &mut FrameScheduler, sim: &HairSimulation) {
        let pass = gpu
            .create_render_pass(&RenderPassDesc {
                label: "pass".into(),
                color_format: gpu.format(),
                depth_format: None,
                clear_color: [0.0; 4],
                clear_depth: 1.0,
            })
            .unwrap();
        let pipeline = gpu
            .create_graphics_pipeline(&hair_gpu::GraphicsPipelineDesc {
                label: "draw".into(),
                shader: ShaderDesc {
                    label: "draw".into(),
                    source: "".into(),
                },
                vertex_entry: "vs_main",
                fragment_entry: "fs_main",
                render_pass: pass,
                vertex_layout: hair_gpu::VertexLayout {
                    stride: VERTEX_STRIDE,
                    attributes: vec![],
                },
                topology: hair_gpu::Topology::TriangleList,
                descriptor_layouts: vec![],
                push_constant_size: 0,
                push_constant_stages: Stages::VERTEX_SHADER,
            })
            .unwrap();

        let slot = frames.begin_frame(gpu).unwrap();
        let image = slot.image_index().unwrap();
        let recorder = slot.recorder();
        recorder.begin_render_pass(pass, RenderTarget::SurfaceImage(image), None);
        recorder.bind_pipeline(pipeline);
        recorder.bind_vertex_buffer(0, sim.vertex_buffer());
        recorder.bind_index_buffer(sim.index_buffer());
        recorder.draw_indexed(sim.index_count());
        recorder.end_render_pass();
        frames.end_frame(gpu).unwrap();
    }

    #[test]
    fn grown_state_is_uploaded() {
        let mut gpu = HeadlessGpu::new(HeadlessConfig::default());
        let sim = simulation(&mut gpu, 4);

        let state = floats(gpu.buffer_contents(sim.state_buffer()).unwrap());
        assert_eq!(state, sim.initial_state().to_state_buffer());
        assert_eq!(sim.index_count(), 4 * 6 * (sim.params().particles_per_strand - 1));
        assert!(gpu.violations().is_empty());
    }

    #[test]
    fn empty_mesh_is_rejected() {
        let mut gpu = HeadlessGpu::new(HeadlessConfig::default());
        let result = HairSimulation::new(&mut gpu, &[], HairParams::default(), None);
        assert!(matches!(result, Err(SimulationError::NoStrands)));
    }

    #[test]
    fn tick_records_barriers_around_both_dispatches() {
        let mut gpu = HeadlessGpu::new(HeadlessConfig::default());
        let mut sim = simulation(&mut gpu, 100);
        gpu.clear_trace();
        sim.tick(&mut gpu, 1.0 / 60.0, Vec3::NEG_Z).unwrap();

        let record = &gpu.submissions()[0];
        let shape: Vec<&str> = record
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::Barrier(_) => Some("barrier"),
                Command::Dispatch { .. } => Some("dispatch"),
                _ => None,
            })
            .collect();
        assert_eq!(shape, ["barrier", "dispatch", "barrier", "dispatch", "barrier"]);

        let groups = (100 * sim.params().particles_per_strand).div_ceil(crate::WORKGROUP_SIZE);
        assert!(record
            .commands
            .contains(&Command::Dispatch { x: groups, y: 1, z: 1 }));

        let barriers: Vec<_> = record
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::Barrier(b) => Some(b),
                _ => None,
            })
            .collect();
        assert!(barriers[1].covers(sim.vertex_buffer()));
        assert!(barriers[1].covers(sim.state_buffer()));
        assert!(barriers[1].src_stages.contains(Stages::VERTEX_INPUT));
        assert_eq!(barriers[2].dst_stages, Stages::VERTEX_INPUT);
        assert_eq!(record.fence, Some(sim.fence()));
    }

    #[test]
    fn paused_tick_only_generates_vertices() {
        let mut gpu = HeadlessGpu::new(HeadlessConfig::default());
        let mut sim = simulation(&mut gpu, 3);
        assert!(!sim.toggle_physics());
        gpu.clear_trace();
        sim.tick(&mut gpu, 1.0 / 60.0, Vec3::NEG_Z).unwrap();

        let commands = &gpu.submissions()[0].commands;
        let dispatches = commands
            .iter()
            .filter(|c| matches!(c, Command::Dispatch { .. }))
            .count();
        assert_eq!(dispatches, 1);
        let Some(Command::Barrier(first)) = commands.first() else {
            panic!("tick must open with a barrier");
        };
        assert!(!first.covers(sim.state_buffer()));
        assert!(gpu.violations().is_empty());
    }

    #[test]
    fn tick_waits_its_fence_before_reusing_the_recorder() {
        let mut gpu = HeadlessGpu::new(HeadlessConfig::default());
        let mut sim = simulation(&mut gpu, 2);
        gpu.clear_trace();
        sim.tick(&mut gpu, 0.01, Vec3::NEG_Z).unwrap();
        sim.tick(&mut gpu, 0.01, Vec3::NEG_Z).unwrap();

        let fence = sim.fence();
        let second_reset = gpu
            .events()
            .iter()
            .rposition(|e| matches!(e, GpuEvent::RecorderReset { .. }))
            .unwrap();
        assert!(gpu.events()[..second_reset]
            .iter()
            .rev()
            .take_while(|e| !matches!(e, GpuEvent::Submit { .. }))
            .any(|e| *e == GpuEvent::FenceWait { fence }));
        assert!(gpu.violations().is_empty());
    }

    #[test]
    fn reset_restores_grown_state() {
        let mut gpu = HeadlessGpu::new(HeadlessConfig::default());
        let mut sim = simulation(&mut gpu, 2);
        sim.set_root_transform(Mat4::from_translation(Vec3::X));
        sim.tick(&mut gpu, 0.01, Vec3::NEG_Z).unwrap();
        sim.reset(&mut gpu).unwrap();

        let state = floats(gpu.buffer_contents(sim.state_buffer()).unwrap());
        assert_eq!(state, sim.initial_state().to_state_buffer());
        assert_eq!(sim.root_transform(), Mat4::IDENTITY);
        assert!(gpu.violations().is_empty());
    }

    #[test]
    fn repeated_resets_reuse_upload_slots() {
        let mut gpu = HeadlessGpu::new(HeadlessConfig::default());
        let mut sim = simulation(&mut gpu, 2);
        sim.reset(&mut gpu).unwrap();
        let slots = gpu.buffer_and_fence_slots();

        for _ in 0..50 {
            sim.tick(&mut gpu, 0.01, Vec3::NEG_Z).unwrap();
            sim.reset(&mut gpu).unwrap();
        }
        assert_eq!(gpu.buffer_and_fence_slots(), slots);
        assert!(gpu.violations().is_empty());
    }

    #[test]
    fn destroy_releases_every_object() {
        let mut gpu = HeadlessGpu::new(HeadlessConfig::default());
        let mut sim = simulation(&mut gpu, 3);
        sim.tick(&mut gpu, 0.01, Vec3::NEG_Z).unwrap();
        sim.destroy(&mut gpu).unwrap();
        assert_eq!(gpu.live_resources(), 0);
    }

    #[test]
    fn update_constants_match_reference_inputs() {
        let mut gpu = HeadlessGpu::new(HeadlessConfig::default());
        let mut sim = simulation(&mut gpu, 2);
        let transform = Mat4::from_rotation_y(0.5);
        sim.set_root_transform(transform);
        gpu.clear_trace();
        sim.tick(&mut gpu, 0.02, Vec3::NEG_Z).unwrap();

        let data = gpu.submissions()[0]
            .commands
            .iter()
            .find_map(|c| match c {
                Command::PushConstants { data, .. } => Some(data.clone()),
                _ => None,
            })
            .unwrap();
        let constants: UpdateConstants = bytemuck::pod_read_unaligned(&data);
        assert_relative_eq!(constants.dt2, 0.0004, epsilon = 1e-9);
        assert_eq!(Mat4::from_cols_array_2d(&constants.root_transform), transform);

        // the kernel pins particle 0 to the transformed rest root
        let mut state = sim.initial_state().clone();
        let pinned: Vec<Vec3> = roots(2)
            .iter()
            .map(|r| transform.transform_point3(r.position()))
            .collect();
        reference::dftl_step(&mut state, &pinned, sim.params(), constants.dt);
        assert_relative_eq!(state.position(1, 0).x, pinned[1].x);
    }

    /// Buffer bindings of the simulation's descriptor sets, for replaying by hand
    fn bindings(sim: &HairSimulation, set: DescriptorSetId) -> Vec<(BufferId, BindingKind)> {
        if set == sim.update_set() {
            vec![
                (sim.state_buffer(), BindingKind::Storage),
                (sim.roots_buffer(), BindingKind::StorageRead),
            ]
        } else if set == sim.vertex_set() {
            vec![
                (sim.state_buffer(), BindingKind::StorageRead),
                (sim.vertex_buffer(), BindingKind::Storage),
            ]
        } else {
            vec![]
        }
    }

    #[test]
    fn missing_vertex_barrier_races_the_draw() {
        let mut gpu = HeadlessGpu::new(HeadlessConfig::default());
        let mut frames = FrameScheduler::new(&mut gpu, &FrameConfig::default()).unwrap();
        let mut sim = simulation(&mut gpu, 3);
        gpu.clear_trace();
        sim.tick(&mut gpu, 0.01, Vec3::NEG_Z).unwrap();
        draw_frame(&mut gpu, &mut frames, &sim);
        assert!(gpu.violations().is_empty(), "{:?}", gpu.violations());

        // the same queue order without the final compute -> vertex input barrier
        let mut tick = gpu.submissions()[0].commands.clone();
        assert!(matches!(tick.pop(), Some(Command::Barrier(_))));
        let draw = gpu.submissions()[1].commands.clone();

        let mut tracker = HazardTracker::new();
        tracker.replay(1, &tick, |set| bindings(&sim, set));
        assert!(tracker.hazards().is_empty());
        tracker.replay(2, &draw, |set| bindings(&sim, set));

        let hazards = tracker.take_hazards();
        assert_eq!(hazards.len(), 1);
        assert_eq!(hazards[0].kind, HazardKind::ReadAfterWrite);
        assert_eq!(hazards[0].buffer, sim.vertex_buffer());
        assert_eq!(hazards[0].stage, Stages::VERTEX_INPUT);
    }

    #[derive(Debug, Clone)]
    enum Step {
        Tick,
        Frame,
        TogglePhysics,
        Reset,
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            4 => Just(Step::Tick),
            4 => Just(Step::Frame),
            1 => Just(Step::TogglePhysics),
            1 => Just(Step::Reset),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn interleaved_ticks_and_frames_are_hazard_free(
            frames_in_flight in 1u32..4,
            image_count in 1u32..4,
            steps in prop::collection::vec(step(), 1..40),
        ) {
            let mut gpu = HeadlessGpu::new(HeadlessConfig {
                image_count,
                ..Default::default()
            });
            let config = FrameConfig {
                frames_in_flight,
                ..Default::default()
            };
            let mut frames = FrameScheduler::new(&mut gpu, &config).unwrap();
            let mut sim = simulation(&mut gpu, 5);

            for step in steps {
                match step {
                    Step::Tick => sim.tick(&mut gpu, 1.0 / 60.0, Vec3::NEG_Z).unwrap(),
                    Step::Frame => draw_frame(&mut gpu, &mut frames, &sim),
                    Step::TogglePhysics => {
                        sim.toggle_physics();
                    }
                    Step::Reset => sim.reset(&mut gpu).unwrap(),
                }
            }

            let violations: Vec<&Violation> = gpu.violations().iter().collect();
            prop_assert!(violations.is_empty(), "{:?}", violations);
        }
    }
}
