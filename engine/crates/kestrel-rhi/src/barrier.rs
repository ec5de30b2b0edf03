use bitflags::bitflags;

use crate::handle::{BufferHandle, TextureHandle};
use crate::types::TextureLayout;

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PipelineStageFlags: u32 {
        const TOP_OF_PIPE = 1 << 0;
        const VERTEX_INPUT = 1 << 1;
        const VERTEX_SHADER = 1 << 2;
        const GEOMETRY_SHADER = 1 << 3;
        const FRAGMENT_SHADER = 1 << 4;
        const EARLY_FRAGMENT_TESTS = 1 << 5;
        const LATE_FRAGMENT_TESTS = 1 << 6;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 7;
        const COMPUTE_SHADER = 1 << 8;
        const TRANSFER = 1 << 9;
        const BOTTOM_OF_PIPE = 1 << 10;
        const HOST = 1 << 11;
        const ALL_GRAPHICS = 1 << 12;
        const ALL_COMMANDS = 1 << 13;
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const INDEX_READ = 1 << 0;
        const VERTEX_ATTRIBUTE_READ = 1 << 1;
        const UNIFORM_READ = 1 << 2;
        const SHADER_READ = 1 << 3;
        const SHADER_WRITE = 1 << 4;
        const COLOR_ATTACHMENT_READ = 1 << 5;
        const COLOR_ATTACHMENT_WRITE = 1 << 6;
        const DEPTH_STENCIL_ATTACHMENT_READ = 1 << 7;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 8;
        const TRANSFER_READ = 1 << 9;
        const TRANSFER_WRITE = 1 << 10;
        const HOST_READ = 1 << 11;
        const HOST_WRITE = 1 << 12;
        const MEMORY_READ = 1 << 13;
        const MEMORY_WRITE = 1 << 14;
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct TextureAspect: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TextureSubresourceRange {
    pub aspect: TextureAspect,
    pub base_mip_level: u32,
    pub level_count: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

impl Default for TextureSubresourceRange {
    fn default() -> Self {
        Self {
            aspect: TextureAspect::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        }
    }
}

/// 资源在两个 queue family 之间转移所有权
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QueueFamilyTransfer {
    pub src_queue_family: u32,
    pub dst_queue_family: u32,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct TextureBarrierDescriptor {
    pub texture: TextureHandle,
    pub old_layout: TextureLayout,
    pub new_layout: TextureLayout,
    pub src_stage: PipelineStageFlags,
    pub dst_stage: PipelineStageFlags,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub subresource_range: TextureSubresourceRange,
    pub queue_family_transfer: Option<QueueFamilyTransfer>,
}

impl TextureBarrierDescriptor {
    /// 根据新旧 layout 推导 stage 和 access 的 layout 转换
    pub fn layout_transition(texture: TextureHandle, old_layout: TextureLayout, new_layout: TextureLayout) -> Self {
        let (src_stage, src_access) = layout_usage_scope(old_layout);
        let (dst_stage, dst_access) = layout_usage_scope(new_layout);
        let aspect = match new_layout {
            TextureLayout::DepthStencilAttachment | TextureLayout::DepthStencilReadOnly => {
                TextureAspect::DEPTH | TextureAspect::STENCIL
            }
            _ => TextureAspect::COLOR,
        };
        Self {
            texture,
            old_layout,
            new_layout,
            src_stage,
            dst_stage,
            src_access,
            dst_access,
            subresource_range: TextureSubresourceRange {
                aspect,
                ..Default::default()
            },
            queue_family_transfer: None,
        }
    }

    /// builder
    pub fn subresource_range(mut self, range: TextureSubresourceRange) -> Self {
        self.subresource_range = range;
        self
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct BufferBarrierDescriptor {
    pub buffer: BufferHandle,
    pub src_stage: PipelineStageFlags,
    pub dst_stage: PipelineStageFlags,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub offset: u64,
    /// None 表示从 offset 到 buffer 末尾
    pub size: Option<u64>,
    pub queue_family_transfer: Option<QueueFamilyTransfer>,
}

/// 处于某个 layout 时，资源通常被哪些 stage 以何种方式访问
pub fn layout_usage_scope(layout: TextureLayout) -> (PipelineStageFlags, AccessFlags) {
    match layout {
        TextureLayout::Undefined => (PipelineStageFlags::TOP_OF_PIPE, AccessFlags::empty()),
        TextureLayout::General => (
            PipelineStageFlags::ALL_COMMANDS,
            AccessFlags::MEMORY_READ | AccessFlags::MEMORY_WRITE,
        ),
        TextureLayout::ColorAttachment => (
            PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            AccessFlags::COLOR_ATTACHMENT_READ | AccessFlags::COLOR_ATTACHMENT_WRITE,
        ),
        TextureLayout::DepthStencilAttachment => (
            PipelineStageFlags::EARLY_FRAGMENT_TESTS | PipelineStageFlags::LATE_FRAGMENT_TESTS,
            AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        TextureLayout::DepthStencilReadOnly => (
            PipelineStageFlags::EARLY_FRAGMENT_TESTS | PipelineStageFlags::FRAGMENT_SHADER,
            AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | AccessFlags::SHADER_READ,
        ),
        TextureLayout::ShaderReadOnly => (PipelineStageFlags::FRAGMENT_SHADER, AccessFlags::SHADER_READ),
        TextureLayout::TransferSrc => (PipelineStageFlags::TRANSFER, AccessFlags::TRANSFER_READ),
        TextureLayout::TransferDst => (PipelineStageFlags::TRANSFER, AccessFlags::TRANSFER_WRITE),
        TextureLayout::Present => (PipelineStageFlags::BOTTOM_OF_PIPE, AccessFlags::empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_layout_has_a_stage() {
        for layout in TextureLayout::ALL {
            let (stage, _) = layout_usage_scope(layout);
            assert!(!stage.is_empty(), "{:?}", layout);
        }
    }

    #[test]
    fn test_layout_transition_to_depth_uses_depth_aspect() {
        let barrier = TextureBarrierDescriptor::layout_transition(
            TextureHandle::null(),
            TextureLayout::Undefined,
            TextureLayout::DepthStencilAttachment,
        );
        assert!(barrier.subresource_range.aspect.contains(TextureAspect::DEPTH));
        assert!(barrier.dst_access.contains(AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
        assert_eq!(barrier.src_access, AccessFlags::empty());
    }

    #[test]
    fn test_layout_transition_to_sampled() {
        let barrier = TextureBarrierDescriptor::layout_transition(
            TextureHandle::null(),
            TextureLayout::ColorAttachment,
            TextureLayout::ShaderReadOnly,
        );
        assert_eq!(barrier.src_stage, PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(barrier.dst_access, AccessFlags::SHADER_READ);
        assert_eq!(barrier.subresource_range.aspect, TextureAspect::COLOR);
    }
}
