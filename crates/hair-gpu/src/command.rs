//! Backend-neutral command recording
//!
//! A [`CommandRecorder`] is a CPU-side command list. Backends replay it at
//! submission: the wgpu backend encodes it, the headless backend traces it.
//! Recording calls never fail on their own; misuse (recording outside
//! `begin`/`end`, a dispatch inside a render pass, ...) is remembered and
//! reported by [`CommandRecorder::end`].

use crate::error::{GpuError, GpuResult};
use crate::handles::{BufferId, DescriptorSetId, ImageViewId, PipelineId, RecorderId, RenderPassId};
use crate::sync::PipelineBarrier;
use bytemuck::Pod;

/// Colour attachment of a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    /// Presentable surface image by acquired index
    SurfaceImage(u32),
    View(ImageViewId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BindPipeline(PipelineId),
    BindDescriptorSets {
        first: u32,
        sets: Vec<DescriptorSetId>,
    },
    BindVertexBuffer {
        binding: u32,
        buffer: BufferId,
    },
    BindIndexBuffer(BufferId),
    PushConstants {
        offset: u32,
        data: Vec<u8>,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    Draw {
        vertices: u32,
    },
    DrawIndexed {
        indices: u32,
    },
    BeginRenderPass {
        pass: RenderPassId,
        color: RenderTarget,
        depth: Option<ImageViewId>,
    },
    EndRenderPass,
    CopyBuffer {
        src: BufferId,
        dst: BufferId,
        size: u64,
    },
    Barrier(PipelineBarrier),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Initial,
    Recording,
    Executable,
}

pub struct CommandRecorder {
    id: RecorderId,
    label: String,
    state: RecorderState,
    commands: Vec<Command>,
    in_render_pass: bool,
    misuse: Option<String>,
}

impl CommandRecorder {
    pub(crate) fn new(id: RecorderId, label: &str) -> Self {
        Self {
            id,
            label: label.to_string(),
            state: RecorderState::Initial,
            commands: Vec::new(),
            in_render_pass: false,
            misuse: None,
        }
    }

    pub fn id(&self) -> RecorderId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Drop recorded commands. Callers go through `Device::reset_recorder` so the
    /// backend can check the previous submission has finished.
    pub(crate) fn reset(&mut self) {
        self.state = RecorderState::Initial;
        self.commands.clear();
        self.in_render_pass = false;
        self.misuse = None;
    }

    #[track_caller]
    pub fn begin(&mut self) -> GpuResult<()> {
        if self.state != RecorderState::Initial {
            return Err(GpuError::precondition(format!(
                "recorder '{}' begun in state {:?}",
                self.label, self.state
            )));
        }
        self.state = RecorderState::Recording;
        Ok(())
    }

    #[track_caller]
    pub fn end(&mut self) -> GpuResult<()> {
        if let Some(misuse) = self.misuse.take() {
            return Err(GpuError::precondition(format!("recorder '{}': {misuse}", self.label)));
        }
        if self.state != RecorderState::Recording {
            return Err(GpuError::precondition(format!(
                "recorder '{}' ended in state {:?}",
                self.label, self.state
            )));
        }
        if self.in_render_pass {
            return Err(GpuError::precondition(format!(
                "recorder '{}' ended inside a render pass",
                self.label
            )));
        }
        self.state = RecorderState::Executable;
        Ok(())
    }

    fn record(&mut self, command: Command) {
        if self.state != RecorderState::Recording && self.misuse.is_none() {
            self.misuse = Some(format!("{command:?} recorded outside begin/end"));
        }
        self.commands.push(command);
    }

    fn misuse(&mut self, message: impl FnOnce() -> String) {
        if self.misuse.is_none() {
            self.misuse = Some(message());
        }
    }

    pub fn bind_pipeline(&mut self, pipeline: PipelineId) {
        self.record(Command::BindPipeline(pipeline));
    }

    pub fn bind_descriptor_sets(&mut self, first: u32, sets: &[DescriptorSetId]) {
        self.record(Command::BindDescriptorSets {
            first,
            sets: sets.to_vec(),
        });
    }

    pub fn bind_vertex_buffer(&mut self, binding: u32, buffer: BufferId) {
        self.record(Command::BindVertexBuffer { binding, buffer });
    }

    pub fn bind_index_buffer(&mut self, buffer: BufferId) {
        self.record(Command::BindIndexBuffer(buffer));
    }

    pub fn push_constants<T: Pod>(&mut self, offset: u32, constants: &T) {
        self.record(Command::PushConstants {
            offset,
            data: bytemuck::bytes_of(constants).to_vec(),
        });
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        if self.in_render_pass {
            self.misuse(|| "dispatch inside a render pass".to_string());
        }
        self.record(Command::Dispatch { x, y, z });
    }

    pub fn draw(&mut self, vertices: u32) {
        if !self.in_render_pass {
            self.misuse(|| "draw outside a render pass".to_string());
        }
        self.record(Command::Draw { vertices });
    }

    pub fn draw_indexed(&mut self, indices: u32) {
        if !self.in_render_pass {
            self.misuse(|| "indexed draw outside a render pass".to_string());
        }
        self.record(Command::DrawIndexed { indices });
    }

    pub fn begin_render_pass(
        &mut self,
        pass: RenderPassId,
        color: RenderTarget,
        depth: Option<ImageViewId>,
    ) {
        if self.in_render_pass {
            self.misuse(|| "nested render pass".to_string());
        }
        self.in_render_pass = true;
        self.record(Command::BeginRenderPass { pass, color, depth });
    }

    pub fn end_render_pass(&mut self) {
        if !self.in_render_pass {
            self.misuse(|| "render pass ended without being begun".to_string());
        }
        self.in_render_pass = false;
        self.record(Command::EndRenderPass);
    }

    pub fn copy_buffer(&mut self, src: BufferId, dst: BufferId, size: u64) {
        if self.in_render_pass {
            self.misuse(|| "copy inside a render pass".to_string());
        }
        self.record(Command::CopyBuffer { src, dst, size });
    }

    pub fn barrier(&mut self, barrier: PipelineBarrier) {
        if self.in_render_pass {
            self.misuse(|| "barrier inside a render pass".to_string());
        }
        self.record(Command::Barrier(barrier));
    }

    pub fn barriers(&self) -> impl Iterator<Item = &PipelineBarrier> {
        self.commands.iter().filter_map(|command| match command {
            Command::Barrier(barrier) => Some(barrier),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handles::Handle;
    use crate::sync::Stages;

    fn recorder() -> CommandRecorder {
        CommandRecorder::new(RecorderId::from_index(0), "test")
    }

    #[test]
    fn lifecycle() {
        let mut rec = recorder();
        rec.begin().unwrap();
        rec.dispatch(4, 1, 1);
        rec.end().unwrap();

        assert_eq!(rec.state(), RecorderState::Executable);
        assert!(rec.begin().is_err());

        rec.reset();
        assert_eq!(rec.state(), RecorderState::Initial);
        assert!(rec.commands().is_empty());
    }

    #[test]
    fn recording_outside_begin_is_reported() {
        let mut rec = recorder();
        rec.dispatch(1, 1, 1);
        rec.begin().unwrap();
        let err = rec.end().unwrap_err();
        assert!(err.to_string().contains("outside begin/end"));
    }

    #[test]
    fn barrier_inside_render_pass_is_reported() {
        let mut rec = recorder();
        rec.begin().unwrap();
        rec.begin_render_pass(RenderPassId::from_index(0), RenderTarget::SurfaceImage(0), None);
        rec.barrier(PipelineBarrier::new(Stages::COMPUTE, Stages::VERTEX_INPUT));
        rec.end_render_pass();
        assert!(rec.end().unwrap_err().to_string().contains("barrier inside"));
    }

    #[test]
    fn unterminated_render_pass_is_reported() {
        let mut rec = recorder();
        rec.begin().unwrap();
        rec.begin_render_pass(RenderPassId::from_index(0), RenderTarget::SurfaceImage(1), None);
        rec.draw_indexed(6);
        assert!(rec.end().is_err());
    }

    #[test]
    fn push_constants_are_copied_as_bytes() {
        let mut rec = recorder();
        rec.begin().unwrap();
        rec.push_constants(0, &[1.0f32, 2.0]);
        assert_eq!(
            rec.commands(),
            &[Command::PushConstants {
                offset: 0,
                data: bytemuck::bytes_of(&[1.0f32, 2.0]).to_vec()
            }]
        );
    }
}
