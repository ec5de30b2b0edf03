use crate::handle::TextureHandle;
use crate::types::{ClearValue, LoadOp, Rect2D, StoreOp, TextureLayout};

pub const MAX_COLOR_ATTACHMENTS: usize = 8;

#[derive(Copy, Clone, Debug)]
pub struct AttachmentDescriptor {
    pub texture: TextureHandle,
    pub load: LoadOp,
    pub store: StoreOp,
    pub clear: ClearValue,
    /// 渲染期间 texture 所处的 layout
    pub layout: TextureLayout,
}

impl Default for AttachmentDescriptor {
    fn default() -> Self {
        Self {
            texture: TextureHandle::null(),
            load: LoadOp::DontCare,
            store: StoreOp::Store,
            clear: ClearValue::default(),
            layout: TextureLayout::ColorAttachment,
        }
    }
}

impl AttachmentDescriptor {
    pub fn color(texture: TextureHandle, load: LoadOp, clear: ClearValue) -> Self {
        Self {
            texture,
            load,
            clear,
            ..Default::default()
        }
    }

    pub fn depth_stencil(texture: TextureHandle, load: LoadOp, clear: ClearValue) -> Self {
        Self {
            texture,
            load,
            clear,
            layout: TextureLayout::DepthStencilAttachment,
            ..Default::default()
        }
    }
}

/// dynamic rendering 的参数
///
/// color attachment 超过 `MAX_COLOR_ATTACHMENTS` 的部分会被忽略
#[derive(Clone, Debug)]
pub struct RenderPassDescriptor {
    pub color_attachments: Vec<AttachmentDescriptor>,
    pub depth_attachment: Option<AttachmentDescriptor>,
    pub stencil_attachment: Option<AttachmentDescriptor>,
    pub render_area: Rect2D,
    pub layer_count: u32,
}

impl Default for RenderPassDescriptor {
    fn default() -> Self {
        Self {
            color_attachments: Vec::new(),
            depth_attachment: None,
            stencil_attachment: None,
            render_area: Rect2D::default(),
            layer_count: 1,
        }
    }
}
