//! wgpu implementation of [`Device`] and [`Presenter`]
//!
//! wgpu tracks resource hazards itself, so recorded barriers only split passes
//! here and semaphores have nothing to do: everything goes to one queue in
//! submission order. Fences are backed by submission indices and
//! `on_submitted_work_done` callbacks.

mod convert;
mod encode;

use crate::command::CommandRecorder;
use crate::device::*;
use crate::error::{ensure, GpuError, GpuResult};
use crate::handles::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Largest push constant block any pipeline may declare
pub const MAX_PUSH_CONSTANT_SIZE: u32 = 128;

#[derive(Debug, Clone)]
pub struct WgpuOptions {
    pub backends: wgpu::Backends,
    pub power_preference: wgpu::PowerPreference,
    pub extent: Extent2d,
    pub present_mode: wgpu::PresentMode,
    pub max_frame_latency: u32,
}

impl Default for WgpuOptions {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::VULKAN,
            power_preference: wgpu::PowerPreference::HighPerformance,
            extent: Extent2d::new(1280, 720),
            present_mode: wgpu::PresentMode::AutoNoVsync,
            max_frame_latency: 2,
        }
    }
}

struct WgpuBuffer {
    buffer: wgpu::Buffer,
    desc: BufferDesc,
}

struct WgpuLayout {
    layout: wgpu::BindGroupLayout,
    bindings: Vec<BindingKind>,
}

enum WgpuPipeline {
    Compute(wgpu::ComputePipeline),
    Render {
        pipeline: wgpu::RenderPipeline,
        push_stages: wgpu::ShaderStages,
    },
}

struct WgpuFence {
    signaled: bool,
    pending: Option<wgpu::SubmissionIndex>,
    done: Arc<AtomicBool>,
}

impl WgpuFence {
    fn is_signaled(&self) -> bool {
        self.signaled || self.done.load(Ordering::Acquire)
    }
}

struct AcquiredImage {
    index: u32,
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

pub struct WgpuGpu {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    surface_format: ImageFormat,
    acquired: Option<AcquiredImage>,
    acquire_count: u64,

    buffers: ResourceTable<BufferId, WgpuBuffer>,
    images: ResourceTable<ImageId, wgpu::Texture>,
    views: ResourceTable<ImageViewId, wgpu::TextureView>,
    render_passes: ResourceTable<RenderPassId, RenderPassDesc>,
    layouts: ResourceTable<DescriptorLayoutId, WgpuLayout>,
    sets: ResourceTable<DescriptorSetId, wgpu::BindGroup>,
    pipelines: ResourceTable<PipelineId, WgpuPipeline>,
    fences: ResourceTable<FenceId, WgpuFence>,
    semaphores: ResourceTable<SemaphoreId, ()>,
    next_recorder: u32,
}

impl WgpuGpu {
    pub async fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        options: &WgpuOptions,
    ) -> GpuResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: options.backends,
            ..Default::default()
        });

        let surface = instance
            .create_surface(target)
            .map_err(|e| GpuError::device(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: options.power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| GpuError::device(e.to_string()))?;

        log::info!("✓ Using GPU: {}", adapter.get_info().name);

        ensure(adapter.features().contains(wgpu::Features::PUSH_CONSTANTS), || {
            format!("{} does not support push constants", adapter.get_info().name)
        })?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Device"),
                required_features: wgpu::Features::PUSH_CONSTANTS,
                required_limits: wgpu::Limits {
                    max_push_constant_size: MAX_PUSH_CONSTANT_SIZE,
                    ..wgpu::Limits::default()
                },
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| GpuError::device(e.to_string()))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .filter(|f| convert::image_format(*f).is_some())
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| GpuError::device("surface reports no formats"))?;
        let surface_format = convert::ensure_surface_format(format)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: options.extent.width.max(1),
            height: options.extent.height.max(1),
            present_mode: options.present_mode,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: options.max_frame_latency,
        };
        surface.configure(&device, &config);
        log::info!(
            "✓ Surface configured: {}x{} {:?}",
            config.width,
            config.height,
            format
        );

        Ok(Self {
            device,
            queue,
            surface,
            config,
            surface_format,
            acquired: None,
            acquire_count: 0,
            buffers: ResourceTable::new(),
            images: ResourceTable::new(),
            views: ResourceTable::new(),
            render_passes: ResourceTable::new(),
            layouts: ResourceTable::new(),
            sets: ResourceTable::new(),
            pipelines: ResourceTable::new(),
            fences: ResourceTable::new(),
            semaphores: ResourceTable::new(),
            next_recorder: 0,
        })
    }

    /// Run `f` inside validation and out-of-memory error scopes
    #[track_caller]
    fn scoped<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> GpuResult<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());

        match out_of_memory.or(validation) {
            Some(error) => Err(convert::scope_error(error)),
            None => Ok(value),
        }
    }

    fn shader_module(&self, shader: &ShaderDesc) -> GpuResult<wgpu::ShaderModule> {
        self.scoped(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&shader.label),
                source: wgpu::ShaderSource::Wgsl(shader.source.clone()),
            })
        })
    }

    fn pipeline_layout(
        &self,
        label: &str,
        layouts: &[DescriptorLayoutId],
        push_constant_size: u32,
        push_stages: wgpu::ShaderStages,
    ) -> GpuResult<wgpu::PipelineLayout> {
        ensure(push_constant_size <= MAX_PUSH_CONSTANT_SIZE, || {
            format!("'{label}' declares {push_constant_size} bytes of push constants")
        })?;
        let layouts = layouts
            .iter()
            .map(|id| self.layouts.get(*id).map(|l| &l.layout))
            .collect::<GpuResult<Vec<_>>>()?;
        let ranges = [wgpu::PushConstantRange {
            stages: push_stages,
            range: 0..push_constant_size,
        }];
        let ranges: &[wgpu::PushConstantRange] = if push_constant_size > 0 {
            &ranges
        } else {
            &[]
        };

        self.scoped(|device| {
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &layouts,
                push_constant_ranges: ranges,
            })
        })
    }
}

impl Device for WgpuGpu {
    fn create_buffer(&mut self, desc: &BufferDesc) -> GpuResult<BufferId> {
        let buffer = self.scoped(|device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&desc.label),
                size: convert::aligned(desc.size.max(1)),
                usage: convert::buffer_usage(desc.usage, desc.memory),
                mapped_at_creation: false,
            })
        })?;
        let id = self.buffers.insert(WgpuBuffer {
            buffer,
            desc: desc.clone(),
        });
        log::debug!("Created {id:?} '{}' ({} bytes)", desc.label, desc.size);
        Ok(id)
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> GpuResult<()> {
        let entry = self.buffers.get(buffer)?;
        ensure(entry.desc.memory == MemoryLocation::HostVisible, || {
            format!("host write into device-local '{}'", entry.desc.label)
        })?;
        ensure(offset % wgpu::COPY_BUFFER_ALIGNMENT == 0, || {
            format!("unaligned write at {offset} into '{}'", entry.desc.label)
        })?;
        let end = offset + data.len() as u64;
        ensure(end <= entry.desc.size, || {
            format!("write ends at {end} past '{}' of {} bytes", entry.desc.label, entry.desc.size)
        })?;

        let mut padded;
        let data = if data.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT == 0 {
            data
        } else {
            padded = data.to_vec();
            padded.resize(convert::aligned(data.len() as u64) as usize, 0);
            &padded[..]
        };
        self.queue.write_buffer(&entry.buffer, offset, data);
        Ok(())
    }

    fn read_buffer(&mut self, buffer: BufferId, offset: u64, size: u64) -> GpuResult<Vec<u8>> {
        let entry = self.buffers.get(buffer)?;
        ensure(entry.desc.memory == MemoryLocation::HostVisible, || {
            format!("host read from device-local '{}'", entry.desc.label)
        })?;
        ensure(offset % wgpu::COPY_BUFFER_ALIGNMENT == 0, || {
            format!("unaligned read at {offset} from '{}'", entry.desc.label)
        })?;
        ensure(offset + size <= entry.desc.size, || {
            format!("read ends at {} past '{}'", offset + size, entry.desc.label)
        })?;
        if size == 0 {
            return Ok(Vec::new());
        }

        let copy_size = convert::aligned(size);
        let staging = self.scoped(|device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Readback Staging Buffer"),
                size: copy_size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        })?;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(&entry.buffer, offset, &staging, 0, copy_size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..copy_size);
        slice.map_async(wgpu::MapMode::Read, |_| {});
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|e| GpuError::device(e.to_string()))?;

        let bytes = slice.get_mapped_range()[..size as usize].to_vec();
        staging.unmap();
        Ok(bytes)
    }

    fn buffer_size(&self, buffer: BufferId) -> GpuResult<u64> {
        Ok(self.buffers.get(buffer)?.desc.size)
    }

    fn destroy_buffer(&mut self, buffer: BufferId) -> GpuResult<()> {
        self.buffers.remove(buffer)?.buffer.destroy();
        Ok(())
    }

    fn create_image(&mut self, desc: &ImageDesc) -> GpuResult<ImageId> {
        let texture = self.scoped(|device| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(&desc.label),
                size: wgpu::Extent3d {
                    width: desc.extent.width.max(1),
                    height: desc.extent.height.max(1),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: convert::texture_format(desc.format),
                usage: convert::texture_usage(desc.usage),
                view_formats: &[],
            })
        })?;
        Ok(self.images.insert(texture))
    }

    fn create_image_view(&mut self, desc: &ImageViewDesc) -> GpuResult<ImageViewId> {
        let texture = self.images.get(desc.image)?;
        let view = self.scoped(|_| {
            texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some(&desc.label),
                dimension: Some(convert::view_dimension(desc.kind)),
                aspect: convert::texture_aspect(desc.aspect),
                ..Default::default()
            })
        })?;
        Ok(self.views.insert(view))
    }

    fn destroy_image_view(&mut self, view: ImageViewId) -> GpuResult<()> {
        self.views.remove(view).map(drop)
    }

    fn destroy_image(&mut self, image: ImageId) -> GpuResult<()> {
        self.images.remove(image)?.destroy();
        Ok(())
    }

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> GpuResult<RenderPassId> {
        ensure(!desc.color_format.is_depth(), || {
            format!("render pass '{}' has a depth colour format", desc.label)
        })?;
        Ok(self.render_passes.insert(desc.clone()))
    }

    fn create_descriptor_layout(
        &mut self,
        desc: &DescriptorLayoutDesc,
    ) -> GpuResult<DescriptorLayoutId> {
        let visibility = convert::shader_stages(desc.visibility);
        let entries: Vec<_> = desc
            .bindings
            .iter()
            .enumerate()
            .map(|(binding, kind)| wgpu::BindGroupLayoutEntry {
                binding: binding as u32,
                visibility,
                ty: convert::binding_type(*kind),
                count: None,
            })
            .collect();

        let layout = self.scoped(|device| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&desc.label),
                entries: &entries,
            })
        })?;
        Ok(self.layouts.insert(WgpuLayout {
            layout,
            bindings: desc.bindings.clone(),
        }))
    }

    fn allocate_descriptor_set(&mut self, desc: &DescriptorSetDesc) -> GpuResult<DescriptorSetId> {
        let layout = self.layouts.get(desc.layout)?;
        ensure(layout.bindings.len() == desc.buffers.len(), || {
            format!(
                "set '{}' binds {} buffers, layout has {} bindings",
                desc.label,
                desc.buffers.len(),
                layout.bindings.len()
            )
        })?;

        let buffers = desc
            .buffers
            .iter()
            .map(|id| self.buffers.get(*id).map(|b| &b.buffer))
            .collect::<GpuResult<Vec<_>>>()?;
        let entries: Vec<_> = buffers
            .iter()
            .enumerate()
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();

        let group = self.scoped(|device| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&desc.label),
                layout: &layout.layout,
                entries: &entries,
            })
        })?;
        Ok(self.sets.insert(group))
    }

    fn create_compute_pipeline(&mut self, desc: &ComputePipelineDesc) -> GpuResult<PipelineId> {
        let module = self.shader_module(&desc.shader)?;
        let layout = self.pipeline_layout(
            &desc.label,
            &desc.descriptor_layouts,
            desc.push_constant_size,
            wgpu::ShaderStages::COMPUTE,
        )?;

        let pipeline = self.scoped(|device| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(&desc.label),
                layout: Some(&layout),
                module: &module,
                entry_point: Some(desc.entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
        })?;
        log::info!("✓ Compute pipeline '{}' created", desc.label);
        Ok(self.pipelines.insert(WgpuPipeline::Compute(pipeline)))
    }

    fn create_graphics_pipeline(
        &mut self,
        desc: &GraphicsPipelineDesc,
    ) -> GpuResult<PipelineId> {
        let pass = self.render_passes.get(desc.render_pass)?;
        let module = self.shader_module(&desc.shader)?;
        let push_stages = convert::shader_stages(desc.push_constant_stages);
        let layout = self.pipeline_layout(
            &desc.label,
            &desc.descriptor_layouts,
            desc.push_constant_size,
            push_stages,
        )?;

        let attributes: Vec<_> = desc
            .vertex_layout
            .attributes
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: convert::vertex_format(a.format),
                offset: a.offset,
                shader_location: a.location,
            })
            .collect();
        let buffers = [wgpu::VertexBufferLayout {
            array_stride: desc.vertex_layout.stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &attributes,
        }];
        let buffers: &[wgpu::VertexBufferLayout] = if attributes.is_empty() {
            &[]
        } else {
            &buffers
        };

        let pipeline = self.scoped(|device| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&desc.label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some(desc.vertex_entry),
                    buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some(desc.fragment_entry),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: convert::texture_format(pass.color_format),
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: convert::topology(desc.topology),
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    unclipped_depth: false,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    conservative: false,
                },
                depth_stencil: pass.depth_format.map(|format| wgpu::DepthStencilState {
                    format: convert::texture_format(format),
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })?;
        log::info!("✓ Graphics pipeline '{}' created", desc.label);
        Ok(self.pipelines.insert(WgpuPipeline::Render {
            pipeline,
            push_stages,
        }))
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineId) -> GpuResult<()> {
        self.pipelines.remove(pipeline).map(drop)
    }

    fn destroy_descriptor_set(&mut self, set: DescriptorSetId) -> GpuResult<()> {
        self.sets.remove(set).map(drop)
    }

    fn destroy_descriptor_layout(&mut self, layout: DescriptorLayoutId) -> GpuResult<()> {
        self.layouts.remove(layout).map(drop)
    }

    fn destroy_render_pass(&mut self, pass: RenderPassId) -> GpuResult<()> {
        self.render_passes.remove(pass).map(drop)
    }

    fn create_fence(&mut self, signaled: bool) -> GpuResult<FenceId> {
        Ok(self.fences.insert(WgpuFence {
            signaled,
            pending: None,
            done: Arc::new(AtomicBool::new(false)),
        }))
    }

    fn wait_fence(&mut self, fence: FenceId, timeout: Option<Duration>) -> GpuResult<()> {
        let entry = self.fences.get_mut(fence)?;
        if entry.is_signaled() {
            entry.signaled = true;
            return Ok(());
        }
        let Some(index) = entry.pending.clone() else {
            // nothing was submitted with it, so nothing will signal it
            return Err(GpuError::FenceTimeout { fence, timeout });
        };

        match self.device.poll(wgpu::PollType::Wait {
            submission_index: Some(index),
            timeout,
        }) {
            Ok(_) => {}
            Err(wgpu::PollError::Timeout) => return Err(GpuError::FenceTimeout { fence, timeout }),
            Err(e) => return Err(GpuError::device(e.to_string())),
        }

        let entry = self.fences.get_mut(fence)?;
        entry.signaled = true;
        entry.pending = None;
        Ok(())
    }

    fn reset_fence(&mut self, fence: FenceId) -> GpuResult<()> {
        let entry = self.fences.get_mut(fence)?;
        ensure(entry.pending.is_none() || entry.is_signaled(), || {
            format!("{fence:?} reset while its submission is in flight")
        })?;
        *entry = WgpuFence {
            signaled: false,
            pending: None,
            done: Arc::new(AtomicBool::new(false)),
        };
        Ok(())
    }

    fn fence_signaled(&mut self, fence: FenceId) -> GpuResult<bool> {
        self.device
            .poll(wgpu::PollType::Poll)
            .map_err(|e| GpuError::device(e.to_string()))?;
        Ok(self.fences.get(fence)?.is_signaled())
    }

    fn destroy_fence(&mut self, fence: FenceId) -> GpuResult<()> {
        self.fences.remove(fence).map(drop)
    }

    fn create_semaphore(&mut self) -> GpuResult<SemaphoreId> {
        Ok(self.semaphores.insert(()))
    }

    fn destroy_semaphore(&mut self, semaphore: SemaphoreId) -> GpuResult<()> {
        self.semaphores.remove(semaphore)
    }

    fn create_recorder(&mut self, label: &str) -> GpuResult<CommandRecorder> {
        let id = RecorderId::from_index(self.next_recorder);
        self.next_recorder += 1;
        Ok(CommandRecorder::new(id, label))
    }

    fn reset_recorder(&mut self, recorder: &mut CommandRecorder) -> GpuResult<()> {
        // commands are encoded into a fresh wgpu encoder at every submit
        recorder.reset();
        Ok(())
    }

    fn submit(&mut self, submission: &Submission<'_>) -> GpuResult<()> {
        let recorder = submission.recorder;
        ensure(
            recorder.state() == crate::command::RecorderState::Executable,
            || format!("submitting '{}' in state {:?}", recorder.label(), recorder.state()),
        )?;
        for wait in submission.waits {
            self.semaphores.get(wait.semaphore)?;
        }
        for signal in submission.signals {
            self.semaphores.get(*signal)?;
        }
        if let Some(fence) = submission.fence {
            let entry = self.fences.get(fence)?;
            ensure(!entry.is_signaled() && entry.pending.is_none(), || {
                format!("submitting with {fence:?} that is not reset")
            })?;
        }

        let commands = self.scoped(|_| self.encode(recorder))??;
        let index = self.queue.submit(std::iter::once(commands));

        if let Some(fence) = submission.fence {
            let entry = self.fences.get_mut(fence)?;
            let done = entry.done.clone();
            self.queue
                .on_submitted_work_done(move || done.store(true, Ordering::Release));
            entry.pending = Some(index);
        }
        log::trace!("submitted '{}' ({} commands)", recorder.label(), recorder.commands().len());
        Ok(())
    }

    fn wait_idle(&mut self) -> GpuResult<()> {
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|e| GpuError::device(e.to_string()))?;
        for (_, fence) in self.fences.iter_mut() {
            if fence.pending.take().is_some() {
                fence.signaled = true;
            }
        }
        Ok(())
    }
}

impl Presenter for WgpuGpu {
    fn image_count(&self) -> u32 {
        self.config.desired_maximum_frame_latency + 1
    }

    fn extent(&self) -> Extent2d {
        Extent2d::new(self.config.width, self.config.height)
    }

    fn format(&self) -> ImageFormat {
        self.surface_format
    }

    // get_current_texture takes no timeout; the surface's own limit applies
    fn acquire_next_image(
        &mut self,
        signal: SemaphoreId,
        _timeout: Option<Duration>,
    ) -> GpuResult<u32> {
        self.semaphores.get(signal)?;
        ensure(self.acquired.is_none(), || {
            "surface image acquired before the previous one was presented".to_string()
        })?;

        let texture = self
            .surface
            .get_current_texture()
            .map_err(convert::surface_error)?;
        if texture.suboptimal {
            log::warn!("Surface is suboptimal");
        }
        let view = texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let index = (self.acquire_count % self.image_count() as u64) as u32;
        self.acquire_count += 1;
        self.acquired = Some(AcquiredImage {
            index,
            texture,
            view,
        });
        Ok(index)
    }

    fn present(&mut self, image: u32, waits: &[SemaphoreId]) -> GpuResult<()> {
        for wait in waits {
            self.semaphores.get(*wait)?;
        }
        match self.acquired.take() {
            Some(acquired) if acquired.index == image => {
                acquired.texture.present();
                Ok(())
            }
            other => {
                self.acquired = other;
                Err(GpuError::precondition(format!(
                    "presenting surface image {image} that is not the acquired one"
                )))
            }
        }
    }
}
