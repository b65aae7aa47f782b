//! Recording backend without a device
//!
//! `HeadlessGpu` executes nothing on a GPU. It keeps buffer contents on the
//! host, models fence and semaphore states and a presentable surface, and
//! writes every protocol step into an event trace. Each submission is replayed
//! through a [`HazardTracker`] in queue order. Anything that would be a race or
//! a deadlock on a real device is collected as a [`Violation`] instead of
//! failing the call, so tests can assert on the complete list afterwards.
//!
//! Submitted work completes instantly but the host only learns that through a
//! fence wait, a status query or `wait_idle`, which is what the checks rely on.

use crate::command::{Command, CommandRecorder, RecorderState};
use crate::device::*;
use crate::error::{ensure, GpuError, GpuResult};
use crate::handles::*;
use crate::hazard::{Hazard, HazardTracker};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessConfig {
    pub image_count: u32,
    pub extent: Extent2d,
    pub format: ImageFormat,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            image_count: 3,
            extent: Extent2d::new(1280, 720),
            format: ImageFormat::Bgra8UnormSrgb,
        }
    }
}

/// One protocol step, in the order the host issued it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuEvent {
    FenceWait {
        fence: FenceId,
    },
    FenceReset {
        fence: FenceId,
    },
    RecorderReset {
        recorder: RecorderId,
    },
    Submit {
        recorder: RecorderId,
        submission: u64,
        fence: Option<FenceId>,
    },
    Acquire {
        image: u32,
        semaphore: SemaphoreId,
    },
    Present {
        image: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    Hazard(Hazard),
    /// A fence was reset while its submission had not been observed complete
    FenceResetWhilePending(FenceId),
    /// A recorder was reset while its last submission had not been observed complete
    RecorderResetWhilePending {
        recorder: RecorderId,
        submission: u64,
    },
    /// A wait on a semaphore nothing will signal
    UnsignaledSemaphoreWait(SemaphoreId),
    /// A second signal on a semaphore nobody waited on
    SemaphoreAlreadySignaled(SemaphoreId),
    /// A surface image acquired again before it was presented
    ImageAlreadyAcquired(u32),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hazard(hazard) => write!(f, "hazard: {hazard}"),
            Self::FenceResetWhilePending(fence) => write!(f, "{fence:?} reset while pending"),
            Self::RecorderResetWhilePending {
                recorder,
                submission,
            } => write!(f, "{recorder:?} reset while submission {submission} is pending"),
            Self::UnsignaledSemaphoreWait(s) => write!(f, "wait on unsignaled {s:?}"),
            Self::SemaphoreAlreadySignaled(s) => write!(f, "{s:?} signaled twice"),
            Self::ImageAlreadyAcquired(image) => write!(f, "surface image {image} acquired twice"),
        }
    }
}

/// A submission as the queue saw it
#[derive(Debug, Clone)]
pub struct SubmissionRecord {
    pub index: u64,
    pub recorder: RecorderId,
    pub label: String,
    pub commands: Vec<Command>,
    pub fence: Option<FenceId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FenceState {
    Unsignaled,
    Pending { submission: u64 },
    Signaled,
}

struct HeadlessBuffer {
    desc: BufferDesc,
    data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineKind {
    Compute,
    Graphics,
}

struct HeadlessPipeline {
    kind: PipelineKind,
    push_constant_size: u32,
}

pub struct HeadlessGpu {
    config: HeadlessConfig,

    buffers: ResourceTable<BufferId, HeadlessBuffer>,
    images: ResourceTable<ImageId, ImageDesc>,
    views: ResourceTable<ImageViewId, ImageViewDesc>,
    render_passes: ResourceTable<RenderPassId, RenderPassDesc>,
    layouts: ResourceTable<DescriptorLayoutId, DescriptorLayoutDesc>,
    sets: ResourceTable<DescriptorSetId, Vec<(BufferId, BindingKind)>>,
    pipelines: ResourceTable<PipelineId, HeadlessPipeline>,
    fences: ResourceTable<FenceId, FenceState>,
    semaphores: ResourceTable<SemaphoreId, bool>,

    next_recorder: u32,
    last_submission: HashMap<RecorderId, u64>,
    next_submission: u64,
    completed: Option<u64>,

    tracker: HazardTracker,
    events: Vec<GpuEvent>,
    submissions: Vec<SubmissionRecord>,
    violations: Vec<Violation>,

    scripted_images: VecDeque<u32>,
    next_image: u32,
    acquired: Vec<bool>,
}

impl HeadlessGpu {
    pub fn new(config: HeadlessConfig) -> Self {
        log::info!(
            "✓ Headless GPU: {} surface images at {}x{}",
            config.image_count,
            config.extent.width,
            config.extent.height
        );
        Self {
            config,
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
            last_submission: HashMap::new(),
            next_submission: 1,
            completed: None,
            tracker: HazardTracker::new(),
            events: Vec::new(),
            submissions: Vec::new(),
            violations: Vec::new(),
            scripted_images: VecDeque::new(),
            next_image: 0,
            acquired: vec![false; config.image_count as usize],
        }
    }

    /// Images handed out by the next acquisitions, before falling back to round robin
    pub fn script_acquisitions(&mut self, images: impl IntoIterator<Item = u32>) {
        self.scripted_images.extend(images);
    }

    pub fn events(&self) -> &[GpuEvent] {
        &self.events
    }

    pub fn submissions(&self) -> &[SubmissionRecord] {
        &self.submissions
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn clear_trace(&mut self) {
        self.events.clear();
        self.submissions.clear();
    }

    /// Buffer contents regardless of memory location
    pub fn buffer_contents(&self, buffer: BufferId) -> GpuResult<&[u8]> {
        Ok(&self.buffers.get(buffer)?.data)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Every object not yet destroyed, of any kind
    pub fn live_resources(&self) -> usize {
        self.buffers.len()
            + self.images.len()
            + self.views.len()
            + self.render_passes.len()
            + self.layouts.len()
            + self.sets.len()
            + self.pipelines.len()
            + self.fences.len()
            + self.semaphores.len()
    }

    /// Buffer and fence slots ever allocated, live or free
    pub fn buffer_and_fence_slots(&self) -> usize {
        self.buffers.capacity() + self.fences.capacity()
    }

    /// Submissions issued so far, including any dropped by `clear_trace`
    pub fn submission_count(&self) -> u64 {
        self.next_submission - 1
    }

    fn complete_through(&mut self, submission: u64) {
        self.completed = Some(self.completed.map_or(submission, |c| c.max(submission)));
        self.tracker.host_wait(submission);

        for (_, state) in self.fences.iter_mut() {
            if let FenceState::Pending { submission: s } = *state {
                if s <= submission {
                    *state = FenceState::Signaled;
                }
            }
        }
    }

    fn is_complete(&self, submission: u64) -> bool {
        self.completed.is_some_and(|c| submission <= c)
    }

    fn consume_semaphore(&mut self, semaphore: SemaphoreId) -> GpuResult<()> {
        let signaled = self.semaphores.get_mut(semaphore)?;
        if !*signaled {
            self.violations.push(Violation::UnsignaledSemaphoreWait(semaphore));
        }
        *signaled = false;
        Ok(())
    }

    fn signal_semaphore(&mut self, semaphore: SemaphoreId) -> GpuResult<()> {
        let signaled = self.semaphores.get_mut(semaphore)?;
        if *signaled {
            self.violations.push(Violation::SemaphoreAlreadySignaled(semaphore));
        }
        *signaled = true;
        Ok(())
    }

    /// Check a command list against the resources it names and run its copies
    fn execute(&mut self, commands: &[Command]) -> GpuResult<()> {
        let mut bound: Option<&HeadlessPipeline> = None;
        let mut copies = Vec::new();

        for command in commands {
            match command {
                Command::BindPipeline(pipeline) => bound = Some(self.pipelines.get(*pipeline)?),
                Command::BindDescriptorSets { sets, .. } => {
                    for set in sets {
                        self.sets.get(*set)?;
                    }
                }
                Command::BindVertexBuffer { buffer, .. } | Command::BindIndexBuffer(buffer) => {
                    self.buffers.get(*buffer)?;
                }
                Command::PushConstants { offset, data } => {
                    let limit = bound.map_or(0, |p| p.push_constant_size);
                    let end = *offset as usize + data.len();
                    ensure(end <= limit as usize, || {
                        format!("push constants end at byte {end}, pipeline declares {limit}")
                    })?;
                }
                Command::Dispatch { .. } => {
                    ensure(bound.is_some_and(|p| p.kind == PipelineKind::Compute), || {
                        "dispatch without a compute pipeline".to_string()
                    })?;
                }
                Command::Draw { .. } | Command::DrawIndexed { .. } => {
                    ensure(bound.is_some_and(|p| p.kind == PipelineKind::Graphics), || {
                        "draw without a graphics pipeline".to_string()
                    })?;
                }
                Command::BeginRenderPass { pass, color, depth } => {
                    self.render_passes.get(*pass)?;
                    if let crate::command::RenderTarget::View(view) = color {
                        self.views.get(*view)?;
                    }
                    if let Some(depth) = depth {
                        self.views.get(*depth)?;
                    }
                }
                Command::CopyBuffer { src, dst, size } => {
                    let src_len = self.buffers.get(*src)?.data.len() as u64;
                    let dst_len = self.buffers.get(*dst)?.data.len() as u64;
                    ensure(*size <= src_len && *size <= dst_len, || {
                        format!("copy of {size} bytes from {src_len} into {dst_len}")
                    })?;
                    copies.push((*src, *dst, *size as usize));
                }
                Command::EndRenderPass | Command::Barrier(_) => {}
            }
        }

        for (src, dst, size) in copies {
            let bytes = self.buffers.get(src)?.data[..size].to_vec();
            self.buffers.get_mut(dst)?.data[..size].copy_from_slice(&bytes);
        }
        Ok(())
    }
}

impl Device for HeadlessGpu {
    fn create_buffer(&mut self, desc: &BufferDesc) -> GpuResult<BufferId> {
        let buffer = self.buffers.insert(HeadlessBuffer {
            desc: desc.clone(),
            data: vec![0; desc.size as usize],
        });
        log::debug!("Created {buffer:?} '{}' ({} bytes)", desc.label, desc.size);
        Ok(buffer)
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> GpuResult<()> {
        let entry = self.buffers.get_mut(buffer)?;
        ensure(entry.desc.memory == MemoryLocation::HostVisible, || {
            format!("host write into device-local '{}'", entry.desc.label)
        })?;
        let end = offset as usize + data.len();
        ensure(end <= entry.data.len(), || {
            format!("write ends at {end} past '{}' of {} bytes", entry.desc.label, entry.data.len())
        })?;
        entry.data[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&mut self, buffer: BufferId, offset: u64, size: u64) -> GpuResult<Vec<u8>> {
        let entry = self.buffers.get(buffer)?;
        ensure(entry.desc.memory == MemoryLocation::HostVisible, || {
            format!("host read from device-local '{}'", entry.desc.label)
        })?;
        let (start, end) = (offset as usize, (offset + size) as usize);
        ensure(end <= entry.data.len(), || {
            format!("read ends at {end} past '{}' of {} bytes", entry.desc.label, entry.data.len())
        })?;
        Ok(entry.data[start..end].to_vec())
    }

    fn buffer_size(&self, buffer: BufferId) -> GpuResult<u64> {
        Ok(self.buffers.get(buffer)?.desc.size)
    }

    fn destroy_buffer(&mut self, buffer: BufferId) -> GpuResult<()> {
        self.buffers.remove(buffer)?;
        self.tracker.forget(buffer);
        Ok(())
    }

    fn create_image(&mut self, desc: &ImageDesc) -> GpuResult<ImageId> {
        Ok(self.images.insert(desc.clone()))
    }

    fn create_image_view(&mut self, desc: &ImageViewDesc) -> GpuResult<ImageViewId> {
        let image = self.images.get(desc.image)?;
        let depth_aspect = desc.aspect == ImageAspect::Depth;
        ensure(depth_aspect == image.format.is_depth(), || {
            format!("{:?} view of {:?} image '{}'", desc.aspect, image.format, image.label)
        })?;
        Ok(self.views.insert(desc.clone()))
    }

    fn destroy_image_view(&mut self, view: ImageViewId) -> GpuResult<()> {
        self.views.remove(view).map(drop)
    }

    fn destroy_image(&mut self, image: ImageId) -> GpuResult<()> {
        self.images.remove(image).map(drop)
    }

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> GpuResult<RenderPassId> {
        Ok(self.render_passes.insert(desc.clone()))
    }

    fn create_descriptor_layout(
        &mut self,
        desc: &DescriptorLayoutDesc,
    ) -> GpuResult<DescriptorLayoutId> {
        Ok(self.layouts.insert(desc.clone()))
    }

    fn allocate_descriptor_set(&mut self, desc: &DescriptorSetDesc) -> GpuResult<DescriptorSetId> {
        let layout = self.layouts.get(desc.layout)?;
        ensure(layout.bindings.len() == desc.buffers.len(), || {
            format!(
                "set '{}' binds {} buffers, layout '{}' has {} bindings",
                desc.label,
                desc.buffers.len(),
                layout.label,
                layout.bindings.len()
            )
        })?;
        let bindings: Vec<_> = desc.buffers.iter().copied().zip(layout.bindings.iter().copied()).collect();
        for (buffer, _) in &bindings {
            self.buffers.get(*buffer)?;
        }
        Ok(self.sets.insert(bindings))
    }

    fn create_compute_pipeline(&mut self, desc: &ComputePipelineDesc) -> GpuResult<PipelineId> {
        for layout in &desc.descriptor_layouts {
            self.layouts.get(*layout)?;
        }
        Ok(self.pipelines.insert(HeadlessPipeline {
            kind: PipelineKind::Compute,
            push_constant_size: desc.push_constant_size,
        }))
    }

    fn create_graphics_pipeline(
        &mut self,
        desc: &GraphicsPipelineDesc,
    ) -> GpuResult<PipelineId> {
        self.render_passes.get(desc.render_pass)?;
        Ok(self.pipelines.insert(HeadlessPipeline {
            kind: PipelineKind::Graphics,
            push_constant_size: desc.push_constant_size,
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
        Ok(self.fences.insert(if signaled {
            FenceState::Signaled
        } else {
            FenceState::Unsignaled
        }))
    }

    fn wait_fence(&mut self, fence: FenceId, timeout: Option<Duration>) -> GpuResult<()> {
        self.events.push(GpuEvent::FenceWait { fence });
        log::trace!("wait {fence:?}");

        match *self.fences.get(fence)? {
            FenceState::Signaled => Ok(()),
            FenceState::Pending { submission } => {
                self.complete_through(submission);
                Ok(())
            }
            // nothing will ever signal it
            FenceState::Unsignaled => Err(GpuError::FenceTimeout { fence, timeout }),
        }
    }

    fn reset_fence(&mut self, fence: FenceId) -> GpuResult<()> {
        self.events.push(GpuEvent::FenceReset { fence });
        log::trace!("reset {fence:?}");

        let state = self.fences.get_mut(fence)?;
        if matches!(state, FenceState::Pending { .. }) {
            self.violations.push(Violation::FenceResetWhilePending(fence));
        }
        *state = FenceState::Unsignaled;
        Ok(())
    }

    fn fence_signaled(&mut self, fence: FenceId) -> GpuResult<bool> {
        match *self.fences.get(fence)? {
            FenceState::Signaled => Ok(true),
            FenceState::Pending { submission } => {
                self.complete_through(submission);
                Ok(true)
            }
            FenceState::Unsignaled => Ok(false),
        }
    }

    fn destroy_fence(&mut self, fence: FenceId) -> GpuResult<()> {
        self.fences.remove(fence).map(drop)
    }

    fn create_semaphore(&mut self) -> GpuResult<SemaphoreId> {
        Ok(self.semaphores.insert(false))
    }

    fn destroy_semaphore(&mut self, semaphore: SemaphoreId) -> GpuResult<()> {
        self.semaphores.remove(semaphore).map(drop)
    }

    fn create_recorder(&mut self, label: &str) -> GpuResult<CommandRecorder> {
        let id = RecorderId::from_index(self.next_recorder);
        self.next_recorder += 1;
        Ok(CommandRecorder::new(id, label))
    }

    fn reset_recorder(&mut self, recorder: &mut CommandRecorder) -> GpuResult<()> {
        let id = recorder.id();
        self.events.push(GpuEvent::RecorderReset { recorder: id });
        log::trace!("reset {id:?} '{}'", recorder.label());

        if let Some(&submission) = self.last_submission.get(&id) {
            if !self.is_complete(submission) {
                self.violations.push(Violation::RecorderResetWhilePending {
                    recorder: id,
                    submission,
                });
            }
        }
        recorder.reset();
        Ok(())
    }

    fn submit(&mut self, submission: &Submission<'_>) -> GpuResult<()> {
        let recorder = submission.recorder;
        ensure(recorder.state() == RecorderState::Executable, || {
            format!("submitting '{}' in state {:?}", recorder.label(), recorder.state())
        })?;
        if let Some(fence) = submission.fence {
            let state = *self.fences.get(fence)?;
            ensure(state == FenceState::Unsignaled, || {
                format!("submitting with {fence:?} in state {state:?}")
            })?;
        }

        self.execute(recorder.commands())?;

        for wait in submission.waits {
            self.consume_semaphore(wait.semaphore)?;
        }
        for signal in submission.signals {
            self.signal_semaphore(*signal)?;
        }

        let index = self.next_submission;
        self.next_submission += 1;

        let sets = &self.sets;
        self.tracker.replay(index, recorder.commands(), |set| {
            sets.get(set).map(Clone::clone).unwrap_or_default()
        });
        self.violations
            .extend(self.tracker.take_hazards().into_iter().map(Violation::Hazard));

        if let Some(fence) = submission.fence {
            *self.fences.get_mut(fence)? = FenceState::Pending { submission: index };
        }
        self.last_submission.insert(recorder.id(), index);

        self.events.push(GpuEvent::Submit {
            recorder: recorder.id(),
            submission: index,
            fence: submission.fence,
        });
        self.submissions.push(SubmissionRecord {
            index,
            recorder: recorder.id(),
            label: recorder.label().to_string(),
            commands: recorder.commands().to_vec(),
            fence: submission.fence,
        });
        log::trace!("submit #{index} '{}' ({} commands)", recorder.label(), recorder.commands().len());
        Ok(())
    }

    fn wait_idle(&mut self) -> GpuResult<()> {
        if self.next_submission > 1 {
            self.complete_through(self.next_submission - 1);
        }
        Ok(())
    }
}

impl Presenter for HeadlessGpu {
    fn image_count(&self) -> u32 {
        self.config.image_count
    }

    fn extent(&self) -> Extent2d {
        self.config.extent
    }

    fn format(&self) -> ImageFormat {
        self.config.format
    }

    fn acquire_next_image(
        &mut self,
        signal: SemaphoreId,
        _timeout: Option<Duration>,
    ) -> GpuResult<u32> {
        let image = match self.scripted_images.pop_front() {
            Some(image) => image,
            None => {
                let image = self.next_image;
                self.next_image = (self.next_image + 1) % self.config.image_count;
                image
            }
        };
        ensure(image < self.config.image_count, || {
            format!("scripted surface image {image} of {}", self.config.image_count)
        })?;

        if self.acquired[image as usize] {
            self.violations.push(Violation::ImageAlreadyAcquired(image));
        }
        self.acquired[image as usize] = true;
        self.signal_semaphore(signal)?;

        self.events.push(GpuEvent::Acquire {
            image,
            semaphore: signal,
        });
        log::trace!("acquire surface image {image}");
        Ok(image)
    }

    fn present(&mut self, image: u32, waits: &[SemaphoreId]) -> GpuResult<()> {
        ensure(self.acquired.get(image as usize).copied().unwrap_or(false), || {
            format!("presenting surface image {image} that was not acquired")
        })?;
        for wait in waits {
            self.consume_semaphore(*wait)?;
        }
        self.acquired[image as usize] = false;
        self.events.push(GpuEvent::Present { image });
        log::trace!("present surface image {image}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hazard::HazardKind;
    use crate::sync::{Access, PipelineBarrier, SemaphoreWait, Stages};

    fn host_buffer(gpu: &mut HeadlessGpu, size: u64) -> BufferId {
        gpu.create_buffer(&BufferDesc {
            label: "host".into(),
            size,
            usage: BufferUsage::STORAGE,
            memory: MemoryLocation::HostVisible,
        })
        .unwrap()
    }

    #[test]
    fn host_visible_roundtrip() {
        let mut gpu = HeadlessGpu::new(HeadlessConfig::default());
        let buffer = host_buffer(&mut gpu, 8);
        gpu.write_buffer(buffer, 4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(gpu.read_buffer(buffer, 0, 8).unwrap(), vec![0, 0, 0, 0, 1, 2, 3, 4]);
        assert!(gpu.write_buffer(buffer, 6, &[0; 4]).is_err());
    }

    #[test]
    fn device_local_rejects_host_access() {
        let mut gpu = HeadlessGpu::new(HeadlessConfig::default());
        let buffer = gpu
            .create_buffer(&BufferDesc {
                label: "local".into(),
                size: 4,
                usage: BufferUsage::STORAGE,
                memory: MemoryLocation::DeviceLocal,
            })
            .unwrap();
        assert!(matches!(
            gpu.write_buffer(buffer, 0, &[0; 4]),
            Err(GpuError::Precondition { .. })
        ));
        assert!(gpu.read_buffer(buffer, 0, 4).is_err());
    }

    #[test]
    fn waiting_an_unsubmitted_fence_times_out() {
        let mut gpu = HeadlessGpu::new(HeadlessConfig::default());
        let fence = gpu.create_fence(false).unwrap();
        let timeout = Some(Duration::from_millis(10));
        assert!(matches!(
            gpu.wait_fence(fence, timeout),
            Err(GpuError::FenceTimeout { .. })
        ));
    }

    #[test]
    fn resets_before_completion_are_violations() {
        let mut gpu = HeadlessGpu::new(HeadlessConfig::default());
        let fence = gpu.create_fence(false).unwrap();
        let mut rec = gpu.create_recorder("work").unwrap();
        rec.begin().unwrap();
        rec.end().unwrap();
        gpu.submit(&Submission::new(&rec).fence(fence)).unwrap();

        gpu.reset_recorder(&mut rec).unwrap();
        gpu.reset_fence(fence).unwrap();

        assert_eq!(
            gpu.violations(),
            &[
                Violation::RecorderResetWhilePending {
                    recorder: rec.id(),
                    submission: 1
                },
                Violation::FenceResetWhilePending(fence),
            ]
        );
    }

    #[test]
    fn fence_wait_completes_submission() {
        let mut gpu = HeadlessGpu::new(HeadlessConfig::default());
        let fence = gpu.create_fence(false).unwrap();
        let mut rec = gpu.create_recorder("work").unwrap();
        rec.begin().unwrap();
        rec.end().unwrap();
        gpu.submit(&Submission::new(&rec).fence(fence)).unwrap();

        gpu.wait_fence(fence, None).unwrap();
        gpu.reset_fence(fence).unwrap();
        gpu.reset_recorder(&mut rec).unwrap();

        assert!(gpu.violations().is_empty());
        assert!(!gpu.fence_signaled(fence).unwrap());
    }

    #[test]
    fn submit_requires_unsignaled_fence_and_ended_recorder() {
        let mut gpu = HeadlessGpu::new(HeadlessConfig::default());
        let fence = gpu.create_fence(true).unwrap();
        let mut rec = gpu.create_recorder("work").unwrap();
        rec.begin().unwrap();
        assert!(gpu.submit(&Submission::new(&rec)).is_err());
        rec.end().unwrap();
        assert!(gpu.submit(&Submission::new(&rec).fence(fence)).is_err());
    }

    #[test]
    fn copies_execute_and_check_sizes() {
        let mut gpu = HeadlessGpu::new(HeadlessConfig::default());
        let src = host_buffer(&mut gpu, 4);
        let dst = host_buffer(&mut gpu, 2);
        gpu.write_buffer(src, 0, &[9, 8, 7, 6]).unwrap();

        let mut rec = gpu.create_recorder("copy").unwrap();
        rec.begin().unwrap();
        rec.copy_buffer(src, dst, 2);
        rec.end().unwrap();
        gpu.submit(&Submission::new(&rec)).unwrap();
        assert_eq!(gpu.buffer_contents(dst).unwrap(), &[9, 8]);

        let mut rec = gpu.create_recorder("copy").unwrap();
        rec.begin().unwrap();
        rec.copy_buffer(src, dst, 4);
        rec.end().unwrap();
        assert!(matches!(
            gpu.submit(&Submission::new(&rec)),
            Err(GpuError::Precondition { .. })
        ));
    }

    #[test]
    fn semaphores_pair_signals_with_waits() {
        let mut gpu = HeadlessGpu::new(HeadlessConfig::default());
        let acquired = gpu.create_semaphore().unwrap();
        let image = gpu.acquire_next_image(acquired, None).unwrap();

        let mut rec = gpu.create_recorder("frame").unwrap();
        rec.begin().unwrap();
        rec.end().unwrap();
        let waits = [SemaphoreWait {
            semaphore: acquired,
            stages: Stages::COLOR_ATTACHMENT_OUTPUT,
        }];
        let submission = Submission {
            recorder: &rec,
            waits: &waits,
            signals: &[],
            fence: None,
        };
        gpu.submit(&submission).unwrap();
        // nothing signals the semaphore for the present
        gpu.present(image, &[acquired]).unwrap();

        assert_eq!(gpu.violations(), &[Violation::UnsignaledSemaphoreWait(acquired)]);
    }

    #[test]
    fn scripted_and_round_robin_acquisition() {
        let mut gpu = HeadlessGpu::new(HeadlessConfig {
            image_count: 2,
            ..Default::default()
        });
        gpu.script_acquisitions([1]);
        let s = gpu.create_semaphore().unwrap();

        let mut images = Vec::new();
        for _ in 0..3 {
            let image = gpu.acquire_next_image(s, None).unwrap();
            gpu.present(image, &[s]).unwrap();
            images.push(image);
        }
        assert_eq!(images, vec![1, 0, 1]);
        assert!(gpu.violations().is_empty());
    }

    #[test]
    fn missing_barrier_is_reported_as_hazard() {
        let mut gpu = HeadlessGpu::new(HeadlessConfig::default());
        let buffer = host_buffer(&mut gpu, 16);
        let layout = gpu
            .create_descriptor_layout(&DescriptorLayoutDesc {
                label: "layout".into(),
                visibility: Stages::COMPUTE,
                bindings: vec![BindingKind::Storage],
            })
            .unwrap();
        let set = gpu
            .allocate_descriptor_set(&DescriptorSetDesc {
                label: "set".into(),
                layout,
                buffers: vec![buffer],
            })
            .unwrap();
        let pipeline = gpu
            .create_compute_pipeline(&ComputePipelineDesc {
                label: "kernel".into(),
                shader: ShaderDesc {
                    label: "kernel".into(),
                    source: "".into(),
                },
                entry_point: "main",
                descriptor_layouts: vec![layout],
                push_constant_size: 0,
            })
            .unwrap();

        let mut rec = gpu.create_recorder("twice").unwrap();
        rec.begin().unwrap();
        rec.bind_pipeline(pipeline);
        rec.bind_descriptor_sets(0, &[set]);
        rec.dispatch(1, 1, 1);
        rec.dispatch(1, 1, 1);
        rec.barrier(PipelineBarrier::new(Stages::COMPUTE, Stages::COMPUTE).buffer(
            buffer,
            Access::SHADER_WRITE,
            Access::SHADER_READ | Access::SHADER_WRITE,
        ));
        rec.dispatch(1, 1, 1);
        rec.end().unwrap();
        gpu.submit(&Submission::new(&rec)).unwrap();

        let hazards: Vec<_> = gpu
            .violations()
            .iter()
            .map(|v| match v {
                Violation::Hazard(h) => (h.kind, h.command),
                other => panic!("unexpected {other}"),
            })
            .collect();
        // the second dispatch races the first, the third is behind the barrier
        assert_eq!(
            hazards,
            vec![(HazardKind::ReadAfterWrite, 3), (HazardKind::WriteAfterWrite, 3)]
        );
    }
}
