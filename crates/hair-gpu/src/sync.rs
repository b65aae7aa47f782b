//! Pipeline stages, access masks and barriers

use crate::handles::{BufferId, SemaphoreId};
use bitflags::bitflags;

bitflags! {
    /// Pipeline stages an access or dependency applies to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Stages: u32 {
        const TOP_OF_PIPE = 1 << 0;
        const VERTEX_INPUT = 1 << 1;
        const VERTEX_SHADER = 1 << 2;
        const FRAGMENT_SHADER = 1 << 3;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 4;
        const COMPUTE = 1 << 5;
        const TRANSFER = 1 << 6;
        const HOST = 1 << 7;
        const BOTTOM_OF_PIPE = 1 << 8;
    }
}

bitflags! {
    /// Memory access kinds, per buffer in a barrier
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Access: u32 {
        const INDEX_READ = 1 << 0;
        const VERTEX_ATTRIBUTE_READ = 1 << 1;
        const UNIFORM_READ = 1 << 2;
        const SHADER_READ = 1 << 3;
        const SHADER_WRITE = 1 << 4;
        const TRANSFER_READ = 1 << 5;
        const TRANSFER_WRITE = 1 << 6;
        const HOST_READ = 1 << 7;
        const HOST_WRITE = 1 << 8;
    }
}

impl Access {
    pub const WRITES: Self = Self::SHADER_WRITE
        .union(Self::TRANSFER_WRITE)
        .union(Self::HOST_WRITE);

    pub fn is_write(self) -> bool {
        self.intersects(Self::WRITES)
    }
}

/// Memory dependency for one buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBarrier {
    pub buffer: BufferId,
    pub src_access: Access,
    pub dst_access: Access,
}

/// Execution dependency from `src_stages` to `dst_stages`, plus memory
/// dependencies for the listed buffers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineBarrier {
    pub src_stages: Stages,
    pub dst_stages: Stages,
    pub buffers: Vec<BufferBarrier>,
}

impl PipelineBarrier {
    pub fn new(src_stages: Stages, dst_stages: Stages) -> Self {
        Self {
            src_stages,
            dst_stages,
            buffers: Vec::new(),
        }
    }

    pub fn buffer(mut self, buffer: BufferId, src_access: Access, dst_access: Access) -> Self {
        self.buffers.push(BufferBarrier {
            buffer,
            src_access,
            dst_access,
        });
        self
    }

    pub fn covers(&self, buffer: BufferId) -> bool {
        self.buffers.iter().any(|b| b.buffer == buffer)
    }
}

/// A semaphore a submission waits on before `stages` may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemaphoreWait {
    pub semaphore: SemaphoreId,
    pub stages: Stages,
}
