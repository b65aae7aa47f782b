//! Replaying a recorded command list into a wgpu encoder
//!
//! Bound state lives on the CPU side and is applied again at every dispatch
//! and draw, since wgpu state does not outlive a pass. Barriers and copies
//! end the current compute pass.

use super::{WgpuGpu, WgpuPipeline};
use crate::command::{Command, CommandRecorder, RenderTarget};
use crate::error::{ensure, GpuError, GpuResult};
use crate::handles::{BufferId, DescriptorSetId, PipelineId};

#[derive(Default)]
struct BoundState {
    pipeline: Option<PipelineId>,
    sets: Vec<Option<DescriptorSetId>>,
    push_constants: Vec<(u32, Vec<u8>)>,
    vertex_buffers: Vec<Option<BufferId>>,
    index_buffer: Option<BufferId>,
}

impl BoundState {
    /// Returns true for state changes, which never need a pass of their own
    fn apply(&mut self, command: &Command) -> bool {
        match command {
            Command::BindPipeline(pipeline) => self.pipeline = Some(*pipeline),
            Command::BindDescriptorSets { first, sets } => {
                let end = *first as usize + sets.len();
                if self.sets.len() < end {
                    self.sets.resize(end, None);
                }
                for (slot, set) in self.sets[*first as usize..end].iter_mut().zip(sets) {
                    *slot = Some(*set);
                }
            }
            Command::BindVertexBuffer { binding, buffer } => {
                let slot = *binding as usize;
                if self.vertex_buffers.len() <= slot {
                    self.vertex_buffers.resize(slot + 1, None);
                }
                self.vertex_buffers[slot] = Some(*buffer);
            }
            Command::BindIndexBuffer(buffer) => self.index_buffer = Some(*buffer),
            Command::PushConstants { offset, data } => {
                self.push_constants.retain(|(o, _)| o != offset);
                self.push_constants.push((*offset, data.clone()));
            }
            _ => return false,
        }
        true
    }
}

fn ends_compute_run(command: &Command) -> bool {
    matches!(
        command,
        Command::Barrier(_)
            | Command::CopyBuffer { .. }
            | Command::BeginRenderPass { .. }
            | Command::EndRenderPass
    )
}

impl WgpuGpu {
    pub(super) fn encode(&self, recorder: &CommandRecorder) -> GpuResult<wgpu::CommandBuffer> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(recorder.label()),
            });
        let commands = recorder.commands();
        let mut state = BoundState::default();
        let mut i = 0;

        while i < commands.len() {
            match &commands[i] {
                Command::BeginRenderPass { pass, color, depth } => {
                    let end = commands[i..]
                        .iter()
                        .position(|c| matches!(c, Command::EndRenderPass))
                        .map(|p| i + p)
                        .ok_or_else(|| GpuError::precondition("render pass is never ended"))?;

                    let desc = self.render_passes.get(*pass)?;
                    let color_view = match color {
                        RenderTarget::SurfaceImage(image) => match &self.acquired {
                            Some(acquired) if acquired.index == *image => &acquired.view,
                            _ => {
                                return Err(GpuError::precondition(format!(
                                    "render pass targets surface image {image} that is not acquired"
                                )))
                            }
                        },
                        RenderTarget::View(view) => self.views.get(*view)?,
                    };
                    let depth_view = depth.map(|d| self.views.get(d)).transpose()?;
                    let [r, g, b, a] = desc.clear_color;

                    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some(&desc.label),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: color_view,
                            depth_slice: None,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: depth_view.map(|view| {
                            wgpu::RenderPassDepthStencilAttachment {
                                view,
                                depth_ops: Some(wgpu::Operations {
                                    load: wgpu::LoadOp::Clear(desc.clear_depth),
                                    store: wgpu::StoreOp::Store,
                                }),
                                stencil_ops: None,
                            }
                        }),
                        timestamp_writes: None,
                        occlusion_query_set: None,
                    });

                    for command in &commands[i + 1..end] {
                        if state.apply(command) {
                            continue;
                        }
                        match command {
                            Command::Draw { vertices } => {
                                self.apply_render_state(&mut pass, &state)?;
                                pass.draw(0..*vertices, 0..1);
                            }
                            Command::DrawIndexed { indices } => {
                                self.apply_render_state(&mut pass, &state)?;
                                let buffer = state
                                    .index_buffer
                                    .ok_or_else(|| GpuError::precondition("indexed draw without an index buffer"))?;
                                pass.set_index_buffer(
                                    self.buffers.get(buffer)?.buffer.slice(..),
                                    wgpu::IndexFormat::Uint32,
                                );
                                pass.draw_indexed(0..*indices, 0, 0..1);
                            }
                            other => {
                                return Err(GpuError::precondition(format!(
                                    "{other:?} inside a render pass"
                                )))
                            }
                        }
                    }
                    i = end + 1;
                }
                Command::CopyBuffer { src, dst, size } => {
                    encoder.copy_buffer_to_buffer(
                        &self.buffers.get(*src)?.buffer,
                        0,
                        &self.buffers.get(*dst)?.buffer,
                        0,
                        super::convert::aligned(*size),
                    );
                    i += 1;
                }
                // wgpu inserts the transitions itself; the pass split is what matters
                Command::Barrier(_) => i += 1,
                Command::EndRenderPass => {
                    return Err(GpuError::precondition("render pass ended without being begun"))
                }
                _ => {
                    let end = commands[i..]
                        .iter()
                        .position(ends_compute_run)
                        .map_or(commands.len(), |p| i + p);
                    let run = &commands[i..end];

                    if run.iter().any(|c| matches!(c, Command::Dispatch { .. })) {
                        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                            label: Some(recorder.label()),
                            timestamp_writes: None,
                        });
                        for command in run {
                            if state.apply(command) {
                                continue;
                            }
                            match command {
                                Command::Dispatch { x, y, z } => {
                                    self.apply_compute_state(&mut pass, &state)?;
                                    pass.dispatch_workgroups(*x, *y, *z);
                                }
                                other => {
                                    return Err(GpuError::precondition(format!(
                                        "{other:?} outside a render pass"
                                    )))
                                }
                            }
                        }
                    } else {
                        for command in run {
                            ensure(state.apply(command), || {
                                format!("{command:?} outside a render pass")
                            })?;
                        }
                    }
                    i = end;
                }
            }
        }

        Ok(encoder.finish())
    }

    fn apply_compute_state(
        &self,
        pass: &mut wgpu::ComputePass<'_>,
        state: &BoundState,
    ) -> GpuResult<()> {
        let id = state
            .pipeline
            .ok_or_else(|| GpuError::precondition("dispatch without a pipeline"))?;
        let WgpuPipeline::Compute(pipeline) = self.pipelines.get(id)? else {
            return Err(GpuError::precondition(format!("dispatch with graphics {id:?}")));
        };
        pass.set_pipeline(pipeline);
        for (index, set) in state.sets.iter().enumerate() {
            if let Some(set) = set {
                pass.set_bind_group(index as u32, self.sets.get(*set)?, &[]);
            }
        }
        for (offset, data) in &state.push_constants {
            pass.set_push_constants(*offset, data);
        }
        Ok(())
    }

    fn apply_render_state(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        state: &BoundState,
    ) -> GpuResult<()> {
        let id = state
            .pipeline
            .ok_or_else(|| GpuError::precondition("draw without a pipeline"))?;
        let WgpuPipeline::Render {
            pipeline,
            push_stages,
        } = self.pipelines.get(id)?
        else {
            return Err(GpuError::precondition(format!("draw with compute {id:?}")));
        };
        pass.set_pipeline(pipeline);
        for (index, set) in state.sets.iter().enumerate() {
            if let Some(set) = set {
                pass.set_bind_group(index as u32, self.sets.get(*set)?, &[]);
            }
        }
        for (offset, data) in &state.push_constants {
            pass.set_push_constants(*push_stages, *offset, data);
        }
        for (slot, buffer) in state.vertex_buffers.iter().enumerate() {
            if let Some(buffer) = buffer {
                pass.set_vertex_buffer(slot as u32, self.buffers.get(*buffer)?.buffer.slice(..));
            }
        }
        Ok(())
    }
}
