//! Frames in flight
//!
//! The scheduler owns a ring of frame slots. Each slot has its own recorder,
//! a completion fence and the semaphore pair linking acquisition, rendering and
//! presentation. A slot is reused only after its fence has been waited on, and
//! a surface image is only rendered to again once the fence of the frame that
//! last claimed it has been waited on.

use crate::command::CommandRecorder;
use crate::device::{Device, Presenter, Submission};
use crate::error::{GpuError, GpuResult};
use crate::handles::{FenceId, SemaphoreId};
use crate::sync::{SemaphoreWait, Stages};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    pub frames_in_flight: u32,
    /// `None` waits forever
    pub fence_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            fence_timeout: Some(Duration::from_secs(5)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Acquiring,
    Recording,
    Submitted,
    /// Handed to the presentation engine; free again once its fence is next waited on
    Presenting,
}

pub struct FrameSlot {
    index: usize,
    recorder: CommandRecorder,
    fence: FenceId,
    image_available: SemaphoreId,
    render_finished: SemaphoreId,
    image_index: Option<u32>,
    state: SlotState,
}

impl FrameSlot {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn recorder(&mut self) -> &mut CommandRecorder {
        &mut self.recorder
    }

    pub fn fence(&self) -> FenceId {
        self.fence
    }

    /// Surface image acquired for this frame
    pub fn image_index(&self) -> Option<u32> {
        self.image_index
    }

    pub fn state(&self) -> SlotState {
        self.state
    }
}

pub struct FrameScheduler {
    slots: Vec<FrameSlot>,
    /// Fence of the frame that last claimed each surface image
    image_fences: Vec<Option<FenceId>>,
    current: usize,
    fence_timeout: Option<Duration>,
    frames: u64,
}

impl FrameScheduler {
    pub fn new<G: Device + Presenter>(gpu: &mut G, config: &FrameConfig) -> GpuResult<Self> {
        if config.frames_in_flight == 0 {
            return Err(GpuError::precondition("at least one frame in flight is required"));
        }

        let mut slots = Vec::with_capacity(config.frames_in_flight as usize);
        for index in 0..config.frames_in_flight as usize {
            slots.push(FrameSlot {
                index,
                recorder: gpu.create_recorder(&format!("Frame {index}"))?,
                // signaled so the first wait on each slot returns immediately
                fence: gpu.create_fence(true)?,
                image_available: gpu.create_semaphore()?,
                render_finished: gpu.create_semaphore()?,
                image_index: None,
                state: SlotState::Idle,
            });
        }

        log::info!(
            "✓ Frame scheduler: {} frames in flight, {} surface images",
            config.frames_in_flight,
            gpu.image_count()
        );

        Ok(Self {
            slots,
            image_fences: vec![None; gpu.image_count() as usize],
            current: 0,
            fence_timeout: config.fence_timeout,
            frames: 0,
        })
    }

    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn slot(&self, index: usize) -> &FrameSlot {
        &self.slots[index]
    }

    pub fn image_fences(&self) -> &[Option<FenceId>] {
        &self.image_fences
    }

    /// Frames fully submitted and presented so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Wait for the current slot, claim a surface image and open the slot's recorder
    pub fn begin_frame<G: Device + Presenter>(&mut self, gpu: &mut G) -> GpuResult<&mut FrameSlot> {
        let timeout = self.fence_timeout;
        let slot = &mut self.slots[self.current];
        if !matches!(slot.state, SlotState::Idle | SlotState::Presenting) {
            return Err(GpuError::precondition(format!(
                "begin_frame on slot {} in state {:?}",
                slot.index, slot.state
            )));
        }

        gpu.wait_fence(slot.fence, timeout)?;
        slot.state = SlotState::Acquiring;

        let image = gpu.acquire_next_image(slot.image_available, timeout)?;
        let entry = self
            .image_fences
            .get_mut(image as usize)
            .ok_or_else(|| GpuError::device(format!("surface returned image {image}")))?;

        // an earlier slot may still be rendering into this image
        if let Some(previous) = *entry {
            gpu.wait_fence(previous, timeout)?;
        }
        *entry = Some(slot.fence);
        slot.image_index = Some(image);

        gpu.reset_fence(slot.fence)?;
        gpu.reset_recorder(&mut slot.recorder)?;
        slot.recorder.begin()?;
        slot.state = SlotState::Recording;

        log::trace!("frame {} begun in slot {} on image {image}", self.frames, slot.index);
        Ok(slot)
    }

    /// Submit the current slot's commands, present its image and move to the next slot
    pub fn end_frame<G: Device + Presenter>(&mut self, gpu: &mut G) -> GpuResult<()> {
        let slot = &mut self.slots[self.current];
        let image = match (slot.state, slot.image_index) {
            (SlotState::Recording, Some(image)) => image,
            (state, _) => {
                return Err(GpuError::precondition(format!(
                    "end_frame on slot {} in state {state:?}",
                    slot.index
                )))
            }
        };

        slot.recorder.end()?;
        let waits = [SemaphoreWait {
            semaphore: slot.image_available,
            stages: Stages::COLOR_ATTACHMENT_OUTPUT,
        }];
        let signals = [slot.render_finished];
        gpu.submit(&Submission {
            recorder: &slot.recorder,
            waits: &waits,
            signals: &signals,
            fence: Some(slot.fence),
        })?;
        slot.state = SlotState::Submitted;

        gpu.present(image, &signals)?;
        slot.state = SlotState::Presenting;

        self.current = (self.current + 1) % self.slots.len();
        self.frames += 1;
        Ok(())
    }

    /// Block until every slot's last submission has completed
    pub fn wait_all<G: Device>(&mut self, gpu: &mut G) -> GpuResult<()> {
        for slot in &mut self.slots {
            gpu.wait_fence(slot.fence, self.fence_timeout)?;
            slot.state = SlotState::Idle;
        }
        Ok(())
    }

    pub fn destroy<G: Device>(mut self, gpu: &mut G) -> GpuResult<()> {
        self.wait_all(gpu)?;
        for slot in self.slots {
            gpu.destroy_fence(slot.fence)?;
            gpu.destroy_semaphore(slot.image_available)?;
            gpu.destroy_semaphore(slot.render_finished)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::RenderTarget;
    use crate::device::{ImageFormat, RenderPassDesc};
    use crate::handles::RecorderId;
    use crate::headless::{GpuEvent, HeadlessConfig, HeadlessGpu};
    use proptest::prelude::*;

    fn gpu(image_count: u32) -> HeadlessGpu {
        HeadlessGpu::new(HeadlessConfig {
            image_count,
            ..Default::default()
        })
    }

    fn config(frames_in_flight: u32) -> FrameConfig {
        FrameConfig {
            frames_in_flight,
            ..Default::default()
        }
    }

    fn run_frames(gpu: &mut HeadlessGpu, scheduler: &mut FrameScheduler, count: usize) {
        let pass = gpu
            .create_render_pass(&RenderPassDesc {
                label: "pass".into(),
                color_format: ImageFormat::Bgra8UnormSrgb,
                depth_format: None,
                clear_color: [0.0; 4],
                clear_depth: 1.0,
            })
            .unwrap();

        for _ in 0..count {
            let slot = scheduler.begin_frame(gpu).unwrap();
            let image = slot.image_index().unwrap();
            let recorder = slot.recorder();
            recorder.begin_render_pass(pass, RenderTarget::SurfaceImage(image), None);
            recorder.end_render_pass();
            scheduler.end_frame(gpu).unwrap();
        }
    }

    /// Every recorder reset follows a wait on the fence of that recorder's last submission
    fn assert_waits_before_resets(events: &[GpuEvent]) {
        let mut pending: std::collections::HashMap<RecorderId, FenceId> = Default::default();
        let mut waited_since: std::collections::HashSet<FenceId> = Default::default();

        for event in events {
            match event {
                GpuEvent::Submit {
                    recorder,
                    fence: Some(fence),
                    ..
                } => {
                    pending.insert(*recorder, *fence);
                    waited_since.remove(fence);
                }
                GpuEvent::FenceWait { fence } => {
                    waited_since.insert(*fence);
                }
                GpuEvent::RecorderReset { recorder } => {
                    if let Some(fence) = pending.get(recorder) {
                        assert!(
                            waited_since.contains(fence),
                            "{recorder:?} reset before waiting {fence:?}"
                        );
                    }
                }
                _ => {}
            }
        }
    }

    /// Re-acquiring an image waits on the fence recorded for it before the recorder is reset
    fn assert_image_fence_waits(events: &[GpuEvent]) {
        let mut image_fence: std::collections::HashMap<u32, FenceId> = Default::default();
        let mut expecting: Option<FenceId> = None;
        let mut last_image = None;
        let mut submitted_fence = None;

        for event in events {
            match event {
                GpuEvent::Acquire { image, .. } => {
                    expecting = image_fence.get(image).copied();
                    last_image = Some(*image);
                }
                GpuEvent::FenceWait { fence } if expecting == Some(*fence) => expecting = None,
                GpuEvent::RecorderReset { .. } => {
                    assert_eq!(expecting, None, "image {last_image:?} reused without a wait");
                }
                GpuEvent::Submit { fence, .. } => submitted_fence = *fence,
                GpuEvent::Present { image } => {
                    if let Some(fence) = submitted_fence {
                        image_fence.insert(*image, fence);
                    }
                }
                _ => {}
            }
        }
    }

    #[test]
    fn first_frames_use_fresh_slots() {
        let mut gpu = gpu(3);
        let mut scheduler = FrameScheduler::new(&mut gpu, &config(2)).unwrap();
        run_frames(&mut gpu, &mut scheduler, 5);

        assert_eq!(scheduler.frames(), 5);
        assert_eq!(scheduler.current(), 1);
        assert!(gpu.violations().is_empty(), "{:?}", gpu.violations());
        assert_eq!(gpu.submissions().len(), 5);
    }

    #[test]
    fn reacquired_image_waits_on_previous_fence() {
        let mut gpu = gpu(2);
        let mut scheduler = FrameScheduler::new(&mut gpu, &config(2)).unwrap();
        gpu.script_acquisitions([0, 0]);
        run_frames(&mut gpu, &mut scheduler, 2);

        let slot0_fence = scheduler.slot(0).fence();
        let second_acquire = gpu
            .events()
            .iter()
            .rposition(|e| matches!(e, GpuEvent::Acquire { .. }))
            .unwrap();
        assert_eq!(
            gpu.events()[second_acquire + 1],
            GpuEvent::FenceWait { fence: slot0_fence }
        );
        assert_eq!(scheduler.image_fences()[0], Some(scheduler.slot(1).fence()));
    }

    #[test]
    fn misuse_is_a_precondition_error() {
        let mut gpu = gpu(2);
        let mut scheduler = FrameScheduler::new(&mut gpu, &config(1)).unwrap();
        assert!(matches!(
            scheduler.end_frame(&mut gpu),
            Err(GpuError::Precondition { .. })
        ));

        scheduler.begin_frame(&mut gpu).unwrap();
        assert!(matches!(
            scheduler.begin_frame(&mut gpu),
            Err(GpuError::Precondition { .. })
        ));
        assert!(FrameScheduler::new(&mut gpu, &config(0)).is_err());
    }

    #[test]
    fn shutdown_waits_everything() {
        let mut gpu = gpu(3);
        let mut scheduler = FrameScheduler::new(&mut gpu, &config(2)).unwrap();
        run_frames(&mut gpu, &mut scheduler, 3);
        scheduler.destroy(&mut gpu).unwrap();

        let waits = gpu
            .events()
            .iter()
            .rev()
            .take_while(|e| matches!(e, GpuEvent::FenceWait { .. }))
            .count();
        assert_eq!(waits, 2);
    }

    proptest! {
        #[test]
        fn recorders_reset_only_after_fence_waits(
            frames_in_flight in 1u32..5,
            image_count in 1u32..5,
            script in prop::collection::vec(0u32..5, 0..24),
            frames in 1usize..24,
        ) {
            let mut gpu = gpu(image_count);
            gpu.script_acquisitions(script.into_iter().map(|i| i % image_count));
            let mut scheduler = FrameScheduler::new(&mut gpu, &config(frames_in_flight)).unwrap();
            run_frames(&mut gpu, &mut scheduler, frames);

            prop_assert!(gpu.violations().is_empty(), "{:?}", gpu.violations());
            assert_waits_before_resets(gpu.events());
            prop_assert_eq!(scheduler.frames(), frames as u64);
            prop_assert_eq!(scheduler.current(), frames % frames_in_flight as usize);
        }

        #[test]
        fn reacquired_images_wait_on_their_fence(
            frames_in_flight in 1u32..5,
            image_count in 1u32..5,
            script in prop::collection::vec(0u32..5, 0..24),
            frames in 1usize..24,
        ) {
            let mut gpu = gpu(image_count);
            gpu.script_acquisitions(script.into_iter().map(|i| i % image_count));
            let mut scheduler = FrameScheduler::new(&mut gpu, &config(frames_in_flight)).unwrap();
            run_frames(&mut gpu, &mut scheduler, frames);

            assert_image_fence_waits(gpu.events());
        }
    }
}
