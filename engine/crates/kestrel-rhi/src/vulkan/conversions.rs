//! 抽象类型到 `ash::vk` 类型的转换
//!
//! 枚举使用穷尽的 match；位掩码逐位检查后 OR 组合。

use ash::vk;

use crate::barrier::{AccessFlags, PipelineStageFlags, TextureAspect, TextureSubresourceRange};
use crate::buffer::{BufferMemoryAccess, BufferUsage};
use crate::platform::PresentMode;
use crate::shader::{ShaderStage, ShaderStageFlags};
use crate::texture::{TextureFormat, TextureUsage};
use crate::types::{
    ClearValue, ColorComponentFlags, CompareOp, CullMode, FrontFace, LoadOp, PolygonMode, PrimitiveTopology, Rect2D,
    SampleCount, StoreOp, TextureLayout, VertexFormat, VertexInputRate, Viewport,
};

/// 将表中每个被包含的位映射后 OR 起来
fn compose_bits<A, V>(flags: A, table: &[(A, V)]) -> V
where
    A: bitflags::Flags + Copy,
    V: std::ops::BitOr<Output = V> + Copy + Default,
{
    table
        .iter()
        .filter(|(bit, _)| flags.contains(*bit))
        .fold(V::default(), |acc, (_, native)| acc | *native)
}

pub fn texture_layout(layout: TextureLayout) -> vk::ImageLayout {
    match layout {
        TextureLayout::Undefined => vk::ImageLayout::UNDEFINED,
        TextureLayout::General => vk::ImageLayout::GENERAL,
        TextureLayout::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        TextureLayout::DepthStencilAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        TextureLayout::DepthStencilReadOnly => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        TextureLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        TextureLayout::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        TextureLayout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        TextureLayout::Present => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

pub fn pipeline_stages(stages: PipelineStageFlags) -> vk::PipelineStageFlags2 {
    const TABLE: [(PipelineStageFlags, vk::PipelineStageFlags2); 14] = [
        (PipelineStageFlags::TOP_OF_PIPE, vk::PipelineStageFlags2::TOP_OF_PIPE),
        (PipelineStageFlags::VERTEX_INPUT, vk::PipelineStageFlags2::VERTEX_INPUT),
        (PipelineStageFlags::VERTEX_SHADER, vk::PipelineStageFlags2::VERTEX_SHADER),
        (PipelineStageFlags::GEOMETRY_SHADER, vk::PipelineStageFlags2::GEOMETRY_SHADER),
        (PipelineStageFlags::FRAGMENT_SHADER, vk::PipelineStageFlags2::FRAGMENT_SHADER),
        (PipelineStageFlags::EARLY_FRAGMENT_TESTS, vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS),
        (PipelineStageFlags::LATE_FRAGMENT_TESTS, vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS),
        (PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT),
        (PipelineStageFlags::COMPUTE_SHADER, vk::PipelineStageFlags2::COMPUTE_SHADER),
        (PipelineStageFlags::TRANSFER, vk::PipelineStageFlags2::ALL_TRANSFER),
        (PipelineStageFlags::BOTTOM_OF_PIPE, vk::PipelineStageFlags2::BOTTOM_OF_PIPE),
        (PipelineStageFlags::HOST, vk::PipelineStageFlags2::HOST),
        (PipelineStageFlags::ALL_GRAPHICS, vk::PipelineStageFlags2::ALL_GRAPHICS),
        (PipelineStageFlags::ALL_COMMANDS, vk::PipelineStageFlags2::ALL_COMMANDS),
    ];
    compose_bits(stages, &TABLE)
}

pub fn access_flags(access: AccessFlags) -> vk::AccessFlags2 {
    const TABLE: [(AccessFlags, vk::AccessFlags2); 15] = [
        (AccessFlags::INDEX_READ, vk::AccessFlags2::INDEX_READ),
        (AccessFlags::VERTEX_ATTRIBUTE_READ, vk::AccessFlags2::VERTEX_ATTRIBUTE_READ),
        (AccessFlags::UNIFORM_READ, vk::AccessFlags2::UNIFORM_READ),
        (AccessFlags::SHADER_READ, vk::AccessFlags2::SHADER_READ),
        (AccessFlags::SHADER_WRITE, vk::AccessFlags2::SHADER_WRITE),
        (AccessFlags::COLOR_ATTACHMENT_READ, vk::AccessFlags2::COLOR_ATTACHMENT_READ),
        (AccessFlags::COLOR_ATTACHMENT_WRITE, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE),
        (AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ, vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ),
        (AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE, vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE),
        (AccessFlags::TRANSFER_READ, vk::AccessFlags2::TRANSFER_READ),
        (AccessFlags::TRANSFER_WRITE, vk::AccessFlags2::TRANSFER_WRITE),
        (AccessFlags::HOST_READ, vk::AccessFlags2::HOST_READ),
        (AccessFlags::HOST_WRITE, vk::AccessFlags2::HOST_WRITE),
        (AccessFlags::MEMORY_READ, vk::AccessFlags2::MEMORY_READ),
        (AccessFlags::MEMORY_WRITE, vk::AccessFlags2::MEMORY_WRITE),
    ];
    compose_bits(access, &TABLE)
}

pub fn aspect_flags(aspect: TextureAspect) -> vk::ImageAspectFlags {
    const TABLE: [(TextureAspect, vk::ImageAspectFlags); 3] = [
        (TextureAspect::COLOR, vk::ImageAspectFlags::COLOR),
        (TextureAspect::DEPTH, vk::ImageAspectFlags::DEPTH),
        (TextureAspect::STENCIL, vk::ImageAspectFlags::STENCIL),
    ];
    compose_bits(aspect, &TABLE)
}

pub fn subresource_range(range: &TextureSubresourceRange) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: aspect_flags(range.aspect),
        base_mip_level: range.base_mip_level,
        level_count: range.level_count,
        base_array_layer: range.base_array_layer,
        layer_count: range.layer_count,
    }
}

pub fn load_op(op: LoadOp) -> vk::AttachmentLoadOp {
    match op {
        LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

pub fn store_op(op: StoreOp) -> vk::AttachmentStoreOp {
    match op {
        StoreOp::Store => vk::AttachmentStoreOp::STORE,
        StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

pub fn primitive_topology(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
    }
}

pub fn cull_mode(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
        CullMode::FrontAndBack => vk::CullModeFlags::FRONT_AND_BACK,
    }
}

pub fn front_face(face: FrontFace) -> vk::FrontFace {
    match face {
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
    }
}

pub fn polygon_mode(mode: PolygonMode) -> vk::PolygonMode {
    match mode {
        PolygonMode::Fill => vk::PolygonMode::FILL,
        PolygonMode::Line => vk::PolygonMode::LINE,
        PolygonMode::Point => vk::PolygonMode::POINT,
    }
}

pub fn compare_op(op: CompareOp) -> vk::CompareOp {
    match op {
        CompareOp::Never => vk::CompareOp::NEVER,
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::Equal => vk::CompareOp::EQUAL,
        CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Greater => vk::CompareOp::GREATER,
        CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

pub fn sample_count(count: SampleCount) -> vk::SampleCountFlags {
    match count {
        SampleCount::Count1 => vk::SampleCountFlags::TYPE_1,
        SampleCount::Count2 => vk::SampleCountFlags::TYPE_2,
        SampleCount::Count4 => vk::SampleCountFlags::TYPE_4,
        SampleCount::Count8 => vk::SampleCountFlags::TYPE_8,
        SampleCount::Count16 => vk::SampleCountFlags::TYPE_16,
    }
}

pub fn color_components(mask: ColorComponentFlags) -> vk::ColorComponentFlags {
    const TABLE: [(ColorComponentFlags, vk::ColorComponentFlags); 4] = [
        (ColorComponentFlags::R, vk::ColorComponentFlags::R),
        (ColorComponentFlags::G, vk::ColorComponentFlags::G),
        (ColorComponentFlags::B, vk::ColorComponentFlags::B),
        (ColorComponentFlags::A, vk::ColorComponentFlags::A),
    ];
    compose_bits(mask, &TABLE)
}

pub fn vertex_input_rate(rate: VertexInputRate) -> vk::VertexInputRate {
    match rate {
        VertexInputRate::Vertex => vk::VertexInputRate::VERTEX,
        VertexInputRate::Instance => vk::VertexInputRate::INSTANCE,
    }
}

pub fn vertex_format(format: VertexFormat) -> vk::Format {
    match format {
        VertexFormat::Float1 => vk::Format::R32_SFLOAT,
        VertexFormat::Float2 => vk::Format::R32G32_SFLOAT,
        VertexFormat::Float3 => vk::Format::R32G32B32_SFLOAT,
        VertexFormat::Float4 => vk::Format::R32G32B32A32_SFLOAT,
        VertexFormat::Int1 => vk::Format::R32_SINT,
        VertexFormat::Int2 => vk::Format::R32G32_SINT,
        VertexFormat::Int3 => vk::Format::R32G32B32_SINT,
        VertexFormat::Int4 => vk::Format::R32G32B32A32_SINT,
        VertexFormat::UInt1 => vk::Format::R32_UINT,
        VertexFormat::UInt2 => vk::Format::R32G32_UINT,
        VertexFormat::UInt3 => vk::Format::R32G32B32_UINT,
        VertexFormat::UInt4 => vk::Format::R32G32B32A32_UINT,
    }
}

pub fn buffer_usage(usage: BufferUsage) -> vk::BufferUsageFlags {
    const TABLE: [(BufferUsage, vk::BufferUsageFlags); 7] = [
        (BufferUsage::VERTEX_BUFFER, vk::BufferUsageFlags::VERTEX_BUFFER),
        (BufferUsage::INDEX_BUFFER, vk::BufferUsageFlags::INDEX_BUFFER),
        (BufferUsage::UNIFORM_BUFFER, vk::BufferUsageFlags::UNIFORM_BUFFER),
        (BufferUsage::STORAGE_BUFFER, vk::BufferUsageFlags::STORAGE_BUFFER),
        (BufferUsage::TRANSFER_SRC, vk::BufferUsageFlags::TRANSFER_SRC),
        (BufferUsage::TRANSFER_DST, vk::BufferUsageFlags::TRANSFER_DST),
        (BufferUsage::INDIRECT, vk::BufferUsageFlags::INDIRECT_BUFFER),
    ];
    compose_bits(usage, &TABLE)
}

/// 访问策略到 vma 分配参数
pub fn memory_access(access: BufferMemoryAccess) -> vk_mem::AllocationCreateInfo {
    match access {
        BufferMemoryAccess::GpuOnly => vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            ..Default::default()
        },
        BufferMemoryAccess::CpuToGpu => vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
            ..Default::default()
        },
        BufferMemoryAccess::GpuToCpu => vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferHost,
            flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM,
            ..Default::default()
        },
    }
}

pub fn texture_format(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
        TextureFormat::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        TextureFormat::Bgra8Srgb => vk::Format::B8G8R8A8_SRGB,
        TextureFormat::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
        TextureFormat::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
        TextureFormat::R32Float => vk::Format::R32_SFLOAT,
        TextureFormat::D32Float => vk::Format::D32_SFLOAT,
        TextureFormat::D24UnormS8Uint => vk::Format::D24_UNORM_S8_UINT,
        TextureFormat::D32FloatS8Uint => vk::Format::D32_SFLOAT_S8_UINT,
    }
}

/// texture 整体的 aspect，用于创建 view
pub fn texture_format_aspect(format: TextureFormat) -> vk::ImageAspectFlags {
    match (format.has_depth(), format.has_stencil()) {
        (true, true) => vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
        (true, false) => vk::ImageAspectFlags::DEPTH,
        _ => vk::ImageAspectFlags::COLOR,
    }
}

pub fn texture_usage(usage: TextureUsage) -> vk::ImageUsageFlags {
    const TABLE: [(TextureUsage, vk::ImageUsageFlags); 6] = [
        (TextureUsage::SAMPLED, vk::ImageUsageFlags::SAMPLED),
        (TextureUsage::STORAGE, vk::ImageUsageFlags::STORAGE),
        (TextureUsage::COLOR_ATTACHMENT, vk::ImageUsageFlags::COLOR_ATTACHMENT),
        (TextureUsage::DEPTH_STENCIL_ATTACHMENT, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT),
        (TextureUsage::TRANSFER_SRC, vk::ImageUsageFlags::TRANSFER_SRC),
        (TextureUsage::TRANSFER_DST, vk::ImageUsageFlags::TRANSFER_DST),
    ];
    compose_bits(usage, &TABLE)
}

pub fn shader_stage(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStage::Geometry => vk::ShaderStageFlags::GEOMETRY,
        ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
    }
}

pub fn shader_stages(stages: ShaderStageFlags) -> vk::ShaderStageFlags {
    const TABLE: [(ShaderStageFlags, vk::ShaderStageFlags); 3] = [
        (ShaderStageFlags::VERTEX, vk::ShaderStageFlags::VERTEX),
        (ShaderStageFlags::GEOMETRY, vk::ShaderStageFlags::GEOMETRY),
        (ShaderStageFlags::FRAGMENT, vk::ShaderStageFlags::FRAGMENT),
    ];
    compose_bits(stages, &TABLE)
}

pub fn present_mode(mode: PresentMode) -> vk::PresentModeKHR {
    match mode {
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
    }
}

pub fn color_clear_value(clear: &ClearValue) -> vk::ClearValue {
    vk::ClearValue {
        color: vk::ClearColorValue { float32: clear.color },
    }
}

pub fn depth_stencil_clear_value(clear: &ClearValue) -> vk::ClearValue {
    vk::ClearValue {
        depth_stencil: vk::ClearDepthStencilValue {
            depth: clear.depth,
            stencil: clear.stencil,
        },
    }
}

pub fn viewport(viewport: &Viewport) -> vk::Viewport {
    vk::Viewport {
        x: viewport.x,
        y: viewport.y,
        width: viewport.width,
        height: viewport.height,
        min_depth: viewport.min_depth,
        max_depth: viewport.max_depth,
    }
}

pub fn rect_2d(rect: &Rect2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: rect.x, y: rect.y },
        extent: vk::Extent2D {
            width: rect.width,
            height: rect.height,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_enum_conversions_are_injective() {
        let layouts: HashSet<_> = TextureLayout::ALL.into_iter().map(texture_layout).collect();
        assert_eq!(layouts.len(), TextureLayout::ALL.len());

        let topologies: HashSet<_> = PrimitiveTopology::ALL.into_iter().map(primitive_topology).collect();
        assert_eq!(topologies.len(), PrimitiveTopology::ALL.len());

        let formats: HashSet<_> = VertexFormat::ALL.into_iter().map(vertex_format).collect();
        assert_eq!(formats.len(), VertexFormat::ALL.len());

        let texture_formats: HashSet<_> = TextureFormat::ALL.into_iter().map(texture_format).collect();
        assert_eq!(texture_formats.len(), TextureFormat::ALL.len());

        let compare_ops: HashSet<_> = CompareOp::ALL.into_iter().map(compare_op).collect();
        assert_eq!(compare_ops.len(), CompareOp::ALL.len());

        let present_modes: HashSet<_> = PresentMode::ALL.into_iter().map(present_mode).collect();
        assert_eq!(present_modes.len(), PresentMode::ALL.len());
    }

    #[test]
    fn test_enum_conversions_are_total() {
        assert!(LoadOp::ALL.into_iter().map(load_op).all(|op| op.as_raw() >= 0));
        assert!(StoreOp::ALL.into_iter().map(store_op).all(|op| op.as_raw() >= 0));
        assert!(CullMode::ALL.into_iter().map(cull_mode).filter(|m| m.is_empty()).count() == 1);
        assert_eq!(FrontFace::ALL.into_iter().map(front_face).collect::<HashSet<_>>().len(), 2);
        assert_eq!(PolygonMode::ALL.into_iter().map(polygon_mode).collect::<HashSet<_>>().len(), 3);
        assert_eq!(VertexInputRate::ALL.into_iter().map(vertex_input_rate).collect::<HashSet<_>>().len(), 2);
        for count in SampleCount::ALL {
            assert_eq!(sample_count(count).as_raw(), count as u32);
        }
        for stage in ShaderStage::ALL {
            assert_eq!(shader_stages(stage.into()), shader_stage(stage));
        }
        for access in BufferMemoryAccess::ALL {
            let info = memory_access(access);
            assert_eq!(
                info.flags.is_empty(),
                !access.is_host_writable(),
                "{:?} host access mismatch",
                access
            );
        }
    }

    #[test]
    fn test_buffer_usage_bitmask_composition() {
        let usage = BufferUsage::VERTEX_BUFFER | BufferUsage::INDEX_BUFFER | BufferUsage::INDIRECT;
        assert_eq!(
            buffer_usage(usage),
            vk::BufferUsageFlags::VERTEX_BUFFER
                | vk::BufferUsageFlags::INDEX_BUFFER
                | vk::BufferUsageFlags::INDIRECT_BUFFER
        );
        assert_eq!(buffer_usage(BufferUsage::empty()), vk::BufferUsageFlags::empty());
        assert_eq!(buffer_usage(BufferUsage::all()).as_raw().count_ones(), 7);
    }

    #[test]
    fn test_color_write_mask_composition() {
        assert_eq!(
            color_components(ColorComponentFlags::all()),
            vk::ColorComponentFlags::R | vk::ColorComponentFlags::G | vk::ColorComponentFlags::B | vk::ColorComponentFlags::A
        );
        assert_eq!(
            color_components(ColorComponentFlags::R | ColorComponentFlags::A),
            vk::ColorComponentFlags::R | vk::ColorComponentFlags::A
        );
        assert_eq!(color_components(ColorComponentFlags::empty()), vk::ColorComponentFlags::empty());
    }

    #[test]
    fn test_stage_and_access_composition() {
        let stages = PipelineStageFlags::EARLY_FRAGMENT_TESTS | PipelineStageFlags::LATE_FRAGMENT_TESTS;
        assert_eq!(
            pipeline_stages(stages),
            vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS
        );
        assert_eq!(pipeline_stages(PipelineStageFlags::all()).as_raw().count_ones(), 14);
        assert_eq!(access_flags(AccessFlags::all()).as_raw().count_ones(), 15);
        assert_eq!(access_flags(AccessFlags::empty()), vk::AccessFlags2::NONE);
    }

    #[test]
    fn test_depth_format_aspect() {
        assert_eq!(texture_format_aspect(TextureFormat::D32Float), vk::ImageAspectFlags::DEPTH);
        assert_eq!(
            texture_format_aspect(TextureFormat::D24UnormS8Uint),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(texture_format_aspect(TextureFormat::Rgba8Unorm), vk::ImageAspectFlags::COLOR);
        assert_eq!(texture_usage(TextureUsage::all()).as_raw().count_ones(), 6);
    }

    #[test]
    fn test_subresource_range() {
        let range = subresource_range(&TextureSubresourceRange {
            aspect: TextureAspect::DEPTH | TextureAspect::STENCIL,
            base_mip_level: 1,
            level_count: 2,
            base_array_layer: 0,
            layer_count: 1,
        });
        assert_eq!(range.aspect_mask, vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL);
        assert_eq!(range.level_count, 2);
    }
}
