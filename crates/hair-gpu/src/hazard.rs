//! Buffer hazard tracking over replayed command lists
//!
//! The tracker follows every buffer access in queue order and checks it
//! against the barriers recorded so far:
//!
//! - a read must see the last write ordered before its stage and made visible to it
//! - a write must be ordered after every read since the last write
//! - a write must be ordered after the last write, which must have been made available
//!
//! Host waits on a fence complete every earlier submission, so accesses from
//! those submissions no longer constrain anything that follows.

use crate::command::Command;
use crate::device::BindingKind;
use crate::handles::{BufferId, DescriptorSetId};
use crate::sync::{Access, PipelineBarrier, Stages};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HazardKind {
    ReadAfterWrite,
    WriteAfterRead,
    WriteAfterWrite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hazard {
    pub kind: HazardKind,
    pub buffer: BufferId,
    /// Stage of the access that raced
    pub stage: Stages,
    /// Stage of the earlier access it raced with
    pub previous_stage: Stages,
    pub submission: u64,
    /// Index of the offending command within its submission
    pub command: usize,
}

impl fmt::Display for Hazard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} on {:?}: {:?} access in submission {} (command {}) races {:?}",
            self.kind, self.buffer, self.stage, self.submission, self.command, self.previous_stage
        )
    }
}

#[derive(Debug, Clone)]
struct WriteRecord {
    stage: Stages,
    access: Access,
    submission: u64,
    /// Stages execution-ordered after the write
    ordered_before: Stages,
    available: bool,
    /// Stages the write is visible to
    visible_to: Stages,
}

#[derive(Debug, Clone)]
struct ReadRecord {
    stage: Stages,
    submission: u64,
    command: usize,
    ordered_before: Stages,
}

#[derive(Debug, Clone, Default)]
struct BufferState {
    last_write: Option<WriteRecord>,
    reads: Vec<ReadRecord>,
}

#[derive(Debug, Default)]
pub struct HazardTracker {
    buffers: HashMap<BufferId, BufferState>,
    /// Every submission up to and including this one has completed
    completed: Option<u64>,
    hazards: Vec<Hazard>,
}

/// Pipeline state that turns draws and dispatches into buffer accesses
#[derive(Default)]
struct Bindings {
    sets: Vec<Option<DescriptorSetId>>,
    vertex_buffers: Vec<Option<BufferId>>,
    index_buffer: Option<BufferId>,
}

impl HazardTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hazards(&self) -> &[Hazard] {
        &self.hazards
    }

    pub fn take_hazards(&mut self) -> Vec<Hazard> {
        std::mem::take(&mut self.hazards)
    }

    /// The host observed `submission` complete.
    ///
    /// Accesses from completed submissions are dropped; they can no longer race.
    pub fn host_wait(&mut self, submission: u64) {
        let completed = self.completed.map_or(submission, |c| c.max(submission));
        self.completed = Some(completed);

        self.buffers.retain(|_, state| {
            state.reads.retain(|r| r.submission > completed);
            if state.last_write.as_ref().is_some_and(|w| w.submission <= completed) {
                state.last_write = None;
            }
            state.last_write.is_some() || !state.reads.is_empty()
        });
    }

    /// The buffer was destroyed; its handle may come back for a new buffer
    pub fn forget(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
    }

    /// Replay one submitted command list.
    ///
    /// `resolve` returns the buffer bindings of a descriptor set.
    pub fn replay<F>(&mut self, submission: u64, commands: &[Command], resolve: F)
    where
        F: Fn(DescriptorSetId) -> Vec<(BufferId, BindingKind)>,
    {
        let mut bindings = Bindings::default();

        for (index, command) in commands.iter().enumerate() {
            match command {
                Command::BindDescriptorSets { first, sets } => {
                    for (i, set) in sets.iter().enumerate() {
                        let slot = *first as usize + i;
                        if bindings.sets.len() <= slot {
                            bindings.sets.resize(slot + 1, None);
                        }
                        bindings.sets[slot] = Some(*set);
                    }
                }
                Command::BindVertexBuffer { binding, buffer } => {
                    let slot = *binding as usize;
                    if bindings.vertex_buffers.len() <= slot {
                        bindings.vertex_buffers.resize(slot + 1, None);
                    }
                    bindings.vertex_buffers[slot] = Some(*buffer);
                }
                Command::BindIndexBuffer(buffer) => bindings.index_buffer = Some(*buffer),
                Command::Dispatch { .. } => {
                    for (buffer, kind) in bindings.sets.iter().flatten().flat_map(|s| resolve(*s)) {
                        self.descriptor_access(submission, index, buffer, kind, Stages::COMPUTE);
                    }
                }
                Command::Draw { .. } | Command::DrawIndexed { .. } => {
                    for buffer in bindings.vertex_buffers.clone().into_iter().flatten() {
                        self.read(submission, index, buffer, Stages::VERTEX_INPUT);
                    }
                    if let (Command::DrawIndexed { .. }, Some(buffer)) = (command, bindings.index_buffer) {
                        self.read(submission, index, buffer, Stages::VERTEX_INPUT);
                    }
                    for (buffer, kind) in bindings.sets.iter().flatten().flat_map(|s| resolve(*s)) {
                        self.descriptor_access(submission, index, buffer, kind, Stages::VERTEX_SHADER);
                    }
                }
                Command::CopyBuffer { src, dst, .. } => {
                    self.read(submission, index, *src, Stages::TRANSFER);
                    self.write(submission, index, *dst, Stages::TRANSFER, Access::TRANSFER_WRITE);
                }
                Command::Barrier(barrier) => self.barrier(barrier),
                Command::BindPipeline(_)
                | Command::PushConstants { .. }
                | Command::BeginRenderPass { .. }
                | Command::EndRenderPass => {}
            }
        }
    }

    fn descriptor_access(
        &mut self,
        submission: u64,
        command: usize,
        buffer: BufferId,
        kind: BindingKind,
        stage: Stages,
    ) {
        self.read(submission, command, buffer, stage);
        if kind == BindingKind::Storage {
            self.write(submission, command, buffer, stage, Access::SHADER_WRITE);
        }
    }

    pub fn read(&mut self, submission: u64, command: usize, buffer: BufferId, stage: Stages) {
        let completed = self.completed;
        let synced = |s: u64| completed.is_some_and(|c| s <= c);
        let state = self.buffers.entry(buffer).or_default();

        if let Some(write) = &state.last_write {
            let exposed = write.ordered_before.contains(stage) && write.visible_to.contains(stage);
            if !synced(write.submission) && !exposed {
                self.hazards.push(Hazard {
                    kind: HazardKind::ReadAfterWrite,
                    buffer,
                    stage,
                    previous_stage: write.stage,
                    submission,
                    command,
                });
            }
        }

        state.reads.push(ReadRecord {
            stage,
            submission,
            command,
            ordered_before: Stages::empty(),
        });
    }

    pub fn write(
        &mut self,
        submission: u64,
        command: usize,
        buffer: BufferId,
        stage: Stages,
        access: Access,
    ) {
        let completed = self.completed;
        let synced = |s: u64| completed.is_some_and(|c| s <= c);
        let state = self.buffers.entry(buffer).or_default();

        // a read by this same command is part of the access itself
        let earlier_reads = state
            .reads
            .iter()
            .filter(|r| !(r.submission == submission && r.command == command));
        for read in earlier_reads {
            if !synced(read.submission) && !read.ordered_before.contains(stage) {
                self.hazards.push(Hazard {
                    kind: HazardKind::WriteAfterRead,
                    buffer,
                    stage,
                    previous_stage: read.stage,
                    submission,
                    command,
                });
                break;
            }
        }

        if let Some(write) = &state.last_write {
            let ordered = write.ordered_before.contains(stage) && write.available;
            if !synced(write.submission) && !ordered {
                self.hazards.push(Hazard {
                    kind: HazardKind::WriteAfterWrite,
                    buffer,
                    stage,
                    previous_stage: write.stage,
                    submission,
                    command,
                });
            }
        }

        state.reads.clear();
        state.last_write = Some(WriteRecord {
            stage,
            access,
            submission,
            ordered_before: Stages::empty(),
            available: false,
            visible_to: Stages::empty(),
        });
    }

    pub fn barrier(&mut self, barrier: &PipelineBarrier) {
        let reaches = |stage: Stages, ordered_before: Stages| {
            barrier.src_stages.contains(stage) || ordered_before.intersects(barrier.src_stages)
        };

        for (buffer, state) in self.buffers.iter_mut() {
            let memory = barrier.buffers.iter().find(|b| b.buffer == *buffer);

            for read in state.reads.iter_mut() {
                if reaches(read.stage, read.ordered_before) {
                    read.ordered_before |= barrier.dst_stages;
                }
            }

            if let Some(write) = state.last_write.as_mut() {
                if reaches(write.stage, write.ordered_before) {
                    write.ordered_before |= barrier.dst_stages;
                    if let Some(memory) = memory {
                        if memory.src_access.contains(write.access) {
                            write.available = true;
                        }
                        if write.available {
                            write.visible_to |= barrier.dst_stages;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handles::Handle;

    const A: u64 = 1;
    const B: u64 = 2;

    fn buf(i: u32) -> BufferId {
        BufferId::from_index(i)
    }

    fn compute_to_vertex(b: BufferId) -> PipelineBarrier {
        PipelineBarrier::new(Stages::COMPUTE, Stages::VERTEX_INPUT).buffer(
            b,
            Access::SHADER_WRITE,
            Access::VERTEX_ATTRIBUTE_READ,
        )
    }

    #[test]
    fn read_after_write_without_barrier() {
        let mut t = HazardTracker::new();
        t.write(A, 0, buf(0), Stages::COMPUTE, Access::SHADER_WRITE);
        t.read(B, 0, buf(0), Stages::VERTEX_INPUT);

        assert_eq!(t.hazards().len(), 1);
        assert_eq!(t.hazards()[0].kind, HazardKind::ReadAfterWrite);
    }

    #[test]
    fn barrier_exposes_write() {
        let mut t = HazardTracker::new();
        t.write(A, 0, buf(0), Stages::COMPUTE, Access::SHADER_WRITE);
        t.barrier(&compute_to_vertex(buf(0)));
        t.read(B, 0, buf(0), Stages::VERTEX_INPUT);
        assert!(t.hazards().is_empty());
    }

    #[test]
    fn execution_only_barrier_is_not_enough() {
        let mut t = HazardTracker::new();
        t.write(A, 0, buf(0), Stages::COMPUTE, Access::SHADER_WRITE);
        t.barrier(&PipelineBarrier::new(Stages::COMPUTE, Stages::VERTEX_INPUT));
        t.read(B, 0, buf(0), Stages::VERTEX_INPUT);
        assert_eq!(t.hazards()[0].kind, HazardKind::ReadAfterWrite);
    }

    #[test]
    fn barrier_for_other_stage_is_not_enough() {
        let mut t = HazardTracker::new();
        t.write(A, 0, buf(0), Stages::COMPUTE, Access::SHADER_WRITE);
        t.barrier(&compute_to_vertex(buf(0)));
        t.read(B, 0, buf(0), Stages::COMPUTE);
        assert_eq!(t.hazards()[0].kind, HazardKind::ReadAfterWrite);
    }

    #[test]
    fn write_after_read_needs_ordering() {
        let mut t = HazardTracker::new();
        t.read(A, 0, buf(0), Stages::VERTEX_INPUT);
        t.write(B, 0, buf(0), Stages::COMPUTE, Access::SHADER_WRITE);
        assert_eq!(t.hazards()[0].kind, HazardKind::WriteAfterRead);

        let mut t = HazardTracker::new();
        t.read(A, 0, buf(0), Stages::VERTEX_INPUT);
        t.barrier(&PipelineBarrier::new(
            Stages::COMPUTE | Stages::VERTEX_INPUT,
            Stages::COMPUTE,
        ));
        t.write(B, 0, buf(0), Stages::COMPUTE, Access::SHADER_WRITE);
        assert!(t.hazards().is_empty());
    }

    #[test]
    fn write_after_write_needs_availability() {
        let mut t = HazardTracker::new();
        t.write(A, 0, buf(0), Stages::COMPUTE, Access::SHADER_WRITE);
        t.barrier(&PipelineBarrier::new(Stages::COMPUTE, Stages::COMPUTE));
        t.write(B, 0, buf(0), Stages::COMPUTE, Access::SHADER_WRITE);
        assert_eq!(t.hazards()[0].kind, HazardKind::WriteAfterWrite);
    }

    #[test]
    fn barriers_chain() {
        let mut t = HazardTracker::new();
        t.write(A, 0, buf(0), Stages::COMPUTE, Access::SHADER_WRITE);
        t.barrier(&compute_to_vertex(buf(0)));
        // second barrier waits on vertex input, which the first one ordered after the write
        t.barrier(&PipelineBarrier::new(Stages::VERTEX_INPUT, Stages::COMPUTE).buffer(
            buf(0),
            Access::VERTEX_ATTRIBUTE_READ,
            Access::SHADER_WRITE,
        ));
        t.write(B, 0, buf(0), Stages::COMPUTE, Access::SHADER_WRITE);
        assert!(t.hazards().is_empty());
    }

    #[test]
    fn host_wait_completes_earlier_submissions() {
        let mut t = HazardTracker::new();
        t.write(A, 0, buf(0), Stages::TRANSFER, Access::TRANSFER_WRITE);
        t.host_wait(A);
        t.read(B, 0, buf(0), Stages::COMPUTE);
        t.write(B, 0, buf(0), Stages::COMPUTE, Access::SHADER_WRITE);
        assert!(t.hazards().is_empty());
    }

    fn retained_reads(t: &HazardTracker, b: BufferId) -> usize {
        t.buffers.get(&b).map_or(0, |state| state.reads.len())
    }

    #[test]
    fn host_wait_drops_completed_reads() {
        let mut t = HazardTracker::new();
        let index = buf(0);
        for submission in 1..=10_000 {
            t.read(submission, 0, index, Stages::VERTEX_INPUT);
            t.host_wait(submission);
            assert!(retained_reads(&t, index) <= 1);
        }
        assert!(t.buffers.is_empty());
        assert!(t.hazards().is_empty());
    }

    #[test]
    fn host_wait_keeps_pending_accesses() {
        let mut t = HazardTracker::new();
        t.read(A, 0, buf(0), Stages::VERTEX_INPUT);
        t.read(B, 0, buf(0), Stages::VERTEX_INPUT);
        t.host_wait(A);
        assert_eq!(retained_reads(&t, buf(0)), 1);

        // the read from B is still in flight
        t.write(B + 1, 0, buf(0), Stages::COMPUTE, Access::SHADER_WRITE);
        assert_eq!(t.hazards()[0].kind, HazardKind::WriteAfterRead);
    }

    #[test]
    fn completed_write_is_forgotten() {
        let mut t = HazardTracker::new();
        t.write(A, 0, buf(0), Stages::COMPUTE, Access::SHADER_WRITE);
        t.host_wait(A);
        assert!(t.buffers.is_empty());
        t.read(B, 0, buf(0), Stages::VERTEX_INPUT);
        assert!(t.hazards().is_empty());
    }

    #[test]
    fn forgotten_buffer_starts_clean() {
        let mut t = HazardTracker::new();
        t.write(A, 0, buf(0), Stages::COMPUTE, Access::SHADER_WRITE);
        t.forget(buf(0));
        t.read(B, 0, buf(0), Stages::VERTEX_INPUT);
        assert!(t.hazards().is_empty());
    }

    #[test]
    fn read_write_binding_is_one_access() {
        let mut t = HazardTracker::new();
        t.read(A, 3, buf(0), Stages::COMPUTE);
        t.write(A, 3, buf(0), Stages::COMPUTE, Access::SHADER_WRITE);
        assert!(t.hazards().is_empty());
    }

    #[test]
    fn replay_derives_accesses_from_commands() {
        let set = DescriptorSetId::from_index(0);
        let (particles, vertices) = (buf(0), buf(1));
        let resolve = |_| vec![(particles, BindingKind::StorageRead), (vertices, BindingKind::Storage)];

        let compute = vec![
            Command::BindDescriptorSets { first: 0, sets: vec![set] },
            Command::Dispatch { x: 1, y: 1, z: 1 },
        ];
        let draw = vec![
            Command::BindVertexBuffer { binding: 0, buffer: vertices },
            Command::Draw { vertices: 3 },
        ];

        let mut t = HazardTracker::new();
        t.replay(A, &compute, resolve);
        t.replay(B, &draw, resolve);
        assert_eq!(t.hazards().len(), 1);
        assert_eq!(t.hazards()[0].buffer, vertices);

        let mut fenced = compute.clone();
        fenced.push(Command::Barrier(compute_to_vertex(vertices)));
        let mut t = HazardTracker::new();
        t.replay(A, &fenced, resolve);
        t.replay(B, &draw, resolve);
        assert!(t.hazards().is_empty());
    }
}
