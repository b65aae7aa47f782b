//! One-shot staging uploads into device-local buffers

use crate::device::{BufferDesc, BufferUsage, Device, MemoryLocation, Submission};
use crate::error::{ensure, GpuResult};
use crate::handles::BufferId;
use crate::sync::{Access, PipelineBarrier, Stages};
use std::time::Duration;

/// First consumer of uploaded data, used for the transfer barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Consumer {
    pub stages: Stages,
    pub access: Access,
}

impl Consumer {
    pub const COMPUTE: Self = Self {
        stages: Stages::COMPUTE,
        access: Access::SHADER_READ.union(Access::SHADER_WRITE),
    };

    pub const INDEX: Self = Self {
        stages: Stages::VERTEX_INPUT,
        access: Access::INDEX_READ,
    };
}

/// Copy `data` into `dst` through a host-visible staging buffer.
///
/// Blocks until the copy has executed, so the staging buffer is gone when this
/// returns and the data is visible to `consumer`.
pub fn upload<D: Device>(
    device: &mut D,
    dst: BufferId,
    data: &[u8],
    consumer: Consumer,
    timeout: Option<Duration>,
) -> GpuResult<()> {
    let size = data.len() as u64;
    let dst_size = device.buffer_size(dst)?;
    ensure(size <= dst_size, || {
        format!("upload of {size} bytes into {dst:?} of {dst_size} bytes")
    })?;
    if size == 0 {
        return Ok(());
    }

    let staging = device.create_buffer(&BufferDesc {
        label: "Staging Buffer".into(),
        size,
        usage: BufferUsage::TRANSFER_SRC,
        memory: MemoryLocation::HostVisible,
    })?;
    device.write_buffer(staging, 0, data)?;

    let mut recorder = device.create_recorder("Upload")?;
    recorder.begin()?;
    recorder.copy_buffer(staging, dst, size);
    recorder.barrier(
        PipelineBarrier::new(Stages::TRANSFER, consumer.stages).buffer(
            dst,
            Access::TRANSFER_WRITE,
            consumer.access,
        ),
    );
    recorder.end()?;

    let fence = device.create_fence(false)?;
    device.submit(&Submission::new(&recorder).fence(fence))?;
    device.wait_fence(fence, timeout)?;

    device.destroy_fence(fence)?;
    device.destroy_buffer(staging)?;
    log::debug!("Uploaded {size} bytes into {dst:?}");
    Ok(())
}

/// Create a buffer holding `data`, uploading through staging when it is device-local
pub fn create_buffer_init<D: Device>(
    device: &mut D,
    desc: &BufferDesc,
    data: &[u8],
    consumer: Consumer,
    timeout: Option<Duration>,
) -> GpuResult<BufferId> {
    let mut desc = desc.clone();
    desc.size = desc.size.max(data.len() as u64);

    match desc.memory {
        MemoryLocation::HostVisible => {
            let buffer = device.create_buffer(&desc)?;
            device.write_buffer(buffer, 0, data)?;
            Ok(buffer)
        }
        MemoryLocation::DeviceLocal => {
            desc.usage |= BufferUsage::TRANSFER_DST;
            let buffer = device.create_buffer(&desc)?;
            upload(device, buffer, data, consumer, timeout)?;
            Ok(buffer)
        }
    }
}
