//! Draw pass for the hair billboards
//!
//! One render pass into the acquired surface image with a depth buffer,
//! one pipeline reading the vertex buffer the simulation writes.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use hair_gpu::{
    BufferId, Device, Extent2d, FrameSlot, GpuError, GpuResult, GraphicsPipelineDesc, ImageAspect,
    ImageDesc, ImageFormat, ImageId, ImageUsage, ImageViewDesc, ImageViewId, ImageViewKind,
    PipelineId, Presenter, RenderPassDesc, RenderPassId, RenderTarget, ShaderDesc, Stages,
    Topology, VertexAttribute, VertexFormat, VertexLayout,
};

pub const DEPTH_FORMAT: ImageFormat = ImageFormat::Depth32Float;

/// Bytes between consecutive hair vertices (a bare position)
pub const HAIR_VERTEX_STRIDE: u64 = 12;

/// Push constants of hair.wgsl
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct DrawConstants {
    pub view_proj: [[f32; 4]; 4],
    pub colour: [f32; 4],
}

/// Buffers produced by the simulation for one draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HairMesh {
    pub vertex_buffer: BufferId,
    pub index_buffer: BufferId,
    pub index_count: u32,
}

fn srgb_to_linear(channel: u8) -> f64 {
    let c = channel as f64 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear(color: &catppuccin::Color) -> [f64; 4] {
    [
        srgb_to_linear(color.rgb.r),
        srgb_to_linear(color.rgb.g),
        srgb_to_linear(color.rgb.b),
        1.0,
    ]
}

/// Mocha base, linear
pub fn clear_colour() -> [f64; 4] {
    linear(&catppuccin::PALETTE.mocha.colors.base)
}

/// Mocha peach, linear
pub fn hair_colour() -> [f32; 4] {
    linear(&catppuccin::PALETTE.mocha.colors.peach).map(|c| c as f32)
}

pub struct HairRenderer {
    render_pass: RenderPassId,
    pipeline: PipelineId,
    depth_image: ImageId,
    depth_view: ImageViewId,
    extent: Extent2d,
    colour: [f32; 4],
}

impl HairRenderer {
    pub fn new<G: Device + Presenter>(gpu: &mut G) -> GpuResult<Self> {
        let extent = gpu.extent();
        let depth_image = gpu.create_image(&ImageDesc {
            label: "Depth Image".into(),
            format: DEPTH_FORMAT,
            extent,
            usage: ImageUsage::DEPTH_ATTACHMENT,
        })?;
        let depth_view = gpu.create_image_view(&ImageViewDesc {
            label: "Depth View".into(),
            image: depth_image,
            aspect: ImageAspect::Depth,
            kind: ImageViewKind::D2,
        })?;

        let render_pass = gpu.create_render_pass(&RenderPassDesc {
            label: "Hair Pass".into(),
            color_format: gpu.format(),
            depth_format: Some(DEPTH_FORMAT),
            clear_color: clear_colour(),
            clear_depth: 1.0,
        })?;

        let pipeline = gpu.create_graphics_pipeline(&GraphicsPipelineDesc {
            label: "Hair Pipeline".into(),
            shader: ShaderDesc {
                label: "Hair Shader".into(),
                source: include_str!("shaders/hair.wgsl").into(),
            },
            vertex_entry: "vs_main",
            fragment_entry: "fs_main",
            render_pass,
            vertex_layout: VertexLayout {
                stride: HAIR_VERTEX_STRIDE,
                attributes: vec![VertexAttribute {
                    location: 0,
                    format: VertexFormat::Float32x3,
                    offset: 0,
                }],
            },
            topology: Topology::TriangleList,
            descriptor_layouts: vec![],
            push_constant_size: std::mem::size_of::<DrawConstants>() as u32,
            push_constant_stages: Stages::VERTEX_SHADER | Stages::FRAGMENT_SHADER,
        })?;

        log::info!(
            "✓ Hair renderer: {}x{}, depth {:?}",
            extent.width,
            extent.height,
            DEPTH_FORMAT
        );

        Ok(Self {
            render_pass,
            pipeline,
            depth_image,
            depth_view,
            extent,
            colour: hair_colour(),
        })
    }

    pub fn extent(&self) -> Extent2d {
        self.extent
    }

    pub fn render_pass(&self) -> RenderPassId {
        self.render_pass
    }

    pub fn depth_view(&self) -> ImageViewId {
        self.depth_view
    }

    /// Record the hair draw into the slot's recorder.
    ///
    /// The slot must have an acquired image. `_interpolation` is accepted for
    /// the loop contract; the vertex buffer already holds the latest tick.
    pub fn record(
        &self,
        slot: &mut FrameSlot,
        mesh: &HairMesh,
        view_proj: Mat4,
        _interpolation: f32,
    ) -> GpuResult<()> {
        let image = slot
            .image_index()
            .ok_or_else(|| GpuError::precondition("hair draw recorded without an acquired image"))?;

        let constants = DrawConstants {
            view_proj: view_proj.to_cols_array_2d(),
            colour: self.colour,
        };

        let recorder = slot.recorder();
        recorder.begin_render_pass(
            self.render_pass,
            RenderTarget::SurfaceImage(image),
            Some(self.depth_view),
        );
        recorder.bind_pipeline(self.pipeline);
        recorder.push_constants(0, &constants);
        recorder.bind_vertex_buffer(0, mesh.vertex_buffer);
        recorder.bind_index_buffer(mesh.index_buffer);
        recorder.draw_indexed(mesh.index_count);
        recorder.end_render_pass();
        Ok(())
    }

    /// The device must be idle
    pub fn destroy<G: Device>(self, gpu: &mut G) -> GpuResult<()> {
        gpu.destroy_pipeline(self.pipeline)?;
        gpu.destroy_render_pass(self.render_pass)?;
        gpu.destroy_image_view(self.depth_view)?;
        gpu.destroy_image(self.depth_image)
    }
}
