//! Explicit GPU resource and synchronisation layer
//!
//! Frame and simulation code talk to the device through [`Device`] and
//! [`Presenter`]. [`WgpuGpu`] drives real hardware; [`HeadlessGpu`] records
//! the protocol and reports hazards for tests and the headless runner.

pub mod command;
pub mod device;
pub mod error;
pub mod frame;
pub mod handles;
pub mod hazard;
pub mod headless;
pub mod sync;
pub mod upload;
pub mod wgpu_backend;

pub use command::{Command, CommandRecorder, RecorderState, RenderTarget};
pub use device::{
    BindingKind, BufferDesc, BufferUsage, ComputePipelineDesc, DescriptorLayoutDesc,
    DescriptorSetDesc, Device, Extent2d, GraphicsPipelineDesc, ImageAspect, ImageDesc,
    ImageFormat, ImageUsage, ImageViewDesc, ImageViewKind, MemoryLocation, Presenter,
    RenderPassDesc, ShaderDesc, Submission, Topology, VertexAttribute, VertexFormat,
    VertexLayout,
};
pub use error::{GpuError, GpuResult};
pub use frame::{FrameConfig, FrameScheduler, FrameSlot, SlotState};
pub use handles::{
    BufferId, DescriptorLayoutId, DescriptorSetId, FenceId, Handle, ImageId, ImageViewId,
    PipelineId, RecorderId, RenderPassId, ResourceTable, SemaphoreId,
};
pub use hazard::{Hazard, HazardKind, HazardTracker};
pub use headless::{GpuEvent, HeadlessConfig, HeadlessGpu, SubmissionRecord, Violation};
pub use sync::{Access, BufferBarrier, PipelineBarrier, SemaphoreWait, Stages};
pub use upload::{create_buffer_init, upload, Consumer};
pub use wgpu_backend::{WgpuGpu, WgpuOptions, MAX_PUSH_CONSTANT_SIZE};
