//! Mapping backend-neutral descriptions onto wgpu types

use crate::device::{
    BindingKind, BufferUsage, ImageAspect, ImageFormat, ImageUsage, ImageViewKind, MemoryLocation,
    Topology, VertexFormat,
};
use crate::error::{GpuError, GpuResult};
use crate::sync::Stages;

pub fn buffer_usage(usage: BufferUsage, memory: MemoryLocation) -> wgpu::BufferUsages {
    let mut out = wgpu::BufferUsages::empty();
    for (ours, theirs) in [
        (BufferUsage::VERTEX, wgpu::BufferUsages::VERTEX),
        (BufferUsage::INDEX, wgpu::BufferUsages::INDEX),
        (BufferUsage::STORAGE, wgpu::BufferUsages::STORAGE),
        (BufferUsage::UNIFORM, wgpu::BufferUsages::UNIFORM),
        (BufferUsage::TRANSFER_SRC, wgpu::BufferUsages::COPY_SRC),
        (BufferUsage::TRANSFER_DST, wgpu::BufferUsages::COPY_DST),
    ] {
        if usage.contains(ours) {
            out |= theirs;
        }
    }
    // host access goes through queue writes and staged readback
    if memory == MemoryLocation::HostVisible {
        out |= wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC;
    }
    out
}

pub fn texture_format(format: ImageFormat) -> wgpu::TextureFormat {
    match format {
        ImageFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
        ImageFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
        ImageFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        ImageFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        ImageFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

pub fn image_format(format: wgpu::TextureFormat) -> Option<ImageFormat> {
    Some(match format {
        wgpu::TextureFormat::Bgra8Unorm => ImageFormat::Bgra8Unorm,
        wgpu::TextureFormat::Bgra8UnormSrgb => ImageFormat::Bgra8UnormSrgb,
        wgpu::TextureFormat::Rgba8Unorm => ImageFormat::Rgba8Unorm,
        wgpu::TextureFormat::Rgba8UnormSrgb => ImageFormat::Rgba8UnormSrgb,
        wgpu::TextureFormat::Depth32Float => ImageFormat::Depth32Float,
        _ => return None,
    })
}

pub fn texture_usage(usage: ImageUsage) -> wgpu::TextureUsages {
    let mut out = wgpu::TextureUsages::empty();
    if usage.intersects(ImageUsage::COLOR_ATTACHMENT | ImageUsage::DEPTH_ATTACHMENT) {
        out |= wgpu::TextureUsages::RENDER_ATTACHMENT;
    }
    if usage.contains(ImageUsage::SAMPLED) {
        out |= wgpu::TextureUsages::TEXTURE_BINDING;
    }
    if usage.contains(ImageUsage::TRANSFER_SRC) {
        out |= wgpu::TextureUsages::COPY_SRC;
    }
    out
}

pub fn texture_aspect(aspect: ImageAspect) -> wgpu::TextureAspect {
    match aspect {
        ImageAspect::Color => wgpu::TextureAspect::All,
        ImageAspect::Depth => wgpu::TextureAspect::DepthOnly,
    }
}

pub fn view_dimension(kind: ImageViewKind) -> wgpu::TextureViewDimension {
    match kind {
        ImageViewKind::D2 => wgpu::TextureViewDimension::D2,
        ImageViewKind::D2Array => wgpu::TextureViewDimension::D2Array,
    }
}

pub fn shader_stages(stages: Stages) -> wgpu::ShaderStages {
    let mut out = wgpu::ShaderStages::NONE;
    if stages.intersects(Stages::VERTEX_INPUT | Stages::VERTEX_SHADER) {
        out |= wgpu::ShaderStages::VERTEX;
    }
    if stages.contains(Stages::FRAGMENT_SHADER) {
        out |= wgpu::ShaderStages::FRAGMENT;
    }
    if stages.contains(Stages::COMPUTE) {
        out |= wgpu::ShaderStages::COMPUTE;
    }
    out
}

pub fn binding_type(kind: BindingKind) -> wgpu::BindingType {
    let ty = match kind {
        BindingKind::StorageRead => wgpu::BufferBindingType::Storage { read_only: true },
        BindingKind::Storage => wgpu::BufferBindingType::Storage { read_only: false },
        BindingKind::Uniform => wgpu::BufferBindingType::Uniform,
    };
    wgpu::BindingType::Buffer {
        ty,
        has_dynamic_offset: false,
        min_binding_size: None,
    }
}

pub fn vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
    match format {
        VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
    }
}

pub fn topology(topology: Topology) -> wgpu::PrimitiveTopology {
    match topology {
        Topology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        Topology::LineStrip => wgpu::PrimitiveTopology::LineStrip,
    }
}

#[track_caller]
pub fn surface_error(error: wgpu::SurfaceError) -> GpuError {
    match error {
        wgpu::SurfaceError::Timeout => GpuError::AcquireTimeout,
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
            GpuError::SurfaceLost(error.to_string())
        }
        wgpu::SurfaceError::OutOfMemory => GpuError::OutOfMemory,
        other => GpuError::device(other.to_string()),
    }
}

#[track_caller]
pub fn scope_error(error: wgpu::Error) -> GpuError {
    match error {
        wgpu::Error::OutOfMemory { .. } => GpuError::OutOfMemory,
        other => GpuError::device(other.to_string()),
    }
}

/// Sizes of copies and mapped ranges must be multiples of four bytes
pub fn aligned(size: u64) -> u64 {
    size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT)
}

pub fn ensure_surface_format(format: wgpu::TextureFormat) -> GpuResult<ImageFormat> {
    image_format(format)
        .filter(|f| !f.is_depth())
        .ok_or_else(|| GpuError::device(format!("unsupported surface format {format:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_visible_buffers_can_be_copied_both_ways() {
        let usage = buffer_usage(BufferUsage::STORAGE, MemoryLocation::HostVisible);
        assert!(usage.contains(wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC));
        let usage = buffer_usage(BufferUsage::STORAGE, MemoryLocation::DeviceLocal);
        assert_eq!(usage, wgpu::BufferUsages::STORAGE);
    }

    #[test]
    fn formats_map_back_and_forth() {
        for format in [
            ImageFormat::Bgra8Unorm,
            ImageFormat::Bgra8UnormSrgb,
            ImageFormat::Rgba8Unorm,
            ImageFormat::Rgba8UnormSrgb,
            ImageFormat::Depth32Float,
        ] {
            assert_eq!(image_format(texture_format(format)), Some(format));
        }
        assert!(ensure_surface_format(wgpu::TextureFormat::Depth32Float).is_err());
        assert!(ensure_surface_format(wgpu::TextureFormat::Rgba16Float).is_err());
    }

    #[test]
    fn vertex_input_is_a_vertex_stage() {
        assert_eq!(shader_stages(Stages::VERTEX_INPUT), wgpu::ShaderStages::VERTEX);
        assert_eq!(
            shader_stages(Stages::VERTEX_SHADER | Stages::FRAGMENT_SHADER),
            wgpu::ShaderStages::VERTEX_FRAGMENT
        );
    }

    #[test]
    fn surface_errors_map() {
        assert!(matches!(surface_error(wgpu::SurfaceError::Timeout), GpuError::AcquireTimeout));
        assert!(matches!(surface_error(wgpu::SurfaceError::Outdated), GpuError::SurfaceLost(_)));
        assert_eq!(aligned(13), 16);
    }
}
