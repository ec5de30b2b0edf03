//! 与后端无关的基础类型

use bitflags::bitflags;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum LoadOp {
    Load,
    Clear,
    #[default]
    DontCare,
}

impl LoadOp {
    pub const ALL: [Self; 3] = [Self::Load, Self::Clear, Self::DontCare];
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum StoreOp {
    #[default]
    Store,
    DontCare,
}

impl StoreOp {
    pub const ALL: [Self; 2] = [Self::Store, Self::DontCare];
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextureLayout {
    #[default]
    Undefined,
    General,
    ColorAttachment,
    DepthStencilAttachment,
    DepthStencilReadOnly,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    Present,
}

impl TextureLayout {
    pub const ALL: [Self; 9] = [
        Self::Undefined,
        Self::General,
        Self::ColorAttachment,
        Self::DepthStencilAttachment,
        Self::DepthStencilReadOnly,
        Self::ShaderReadOnly,
        Self::TransferSrc,
        Self::TransferDst,
        Self::Present,
    ];
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    #[default]
    TriangleList,
    TriangleStrip,
    LineList,
    LineStrip,
    PointList,
}

impl PrimitiveTopology {
    pub const ALL: [Self; 5] =
        [Self::TriangleList, Self::TriangleStrip, Self::LineList, Self::LineStrip, Self::PointList];
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum CullMode {
    #[default]
    None,
    Front,
    Back,
    FrontAndBack,
}

impl CullMode {
    pub const ALL: [Self; 4] = [Self::None, Self::Front, Self::Back, Self::FrontAndBack];
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum FrontFace {
    #[default]
    CounterClockwise,
    Clockwise,
}

impl FrontFace {
    pub const ALL: [Self; 2] = [Self::CounterClockwise, Self::Clockwise];
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum PolygonMode {
    #[default]
    Fill,
    Line,
    Point,
}

impl PolygonMode {
    pub const ALL: [Self; 3] = [Self::Fill, Self::Line, Self::Point];
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Never,
    #[default]
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

impl CompareOp {
    pub const ALL: [Self; 8] = [
        Self::Never,
        Self::Less,
        Self::Equal,
        Self::LessOrEqual,
        Self::Greater,
        Self::NotEqual,
        Self::GreaterOrEqual,
        Self::Always,
    ];
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum SampleCount {
    #[default]
    Count1 = 1,
    Count2 = 2,
    Count4 = 4,
    Count8 = 8,
    Count16 = 16,
}

impl SampleCount {
    pub const ALL: [Self; 5] = [Self::Count1, Self::Count2, Self::Count4, Self::Count8, Self::Count16];
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct ColorComponentFlags: u8 {
        const R = 1 << 0;
        const G = 1 << 1;
        const B = 1 << 2;
        const A = 1 << 3;
    }
}

impl Default for ColorComponentFlags {
    fn default() -> Self {
        Self::all()
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum VertexInputRate {
    #[default]
    Vertex,
    Instance,
}

impl VertexInputRate {
    pub const ALL: [Self; 2] = [Self::Vertex, Self::Instance];
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float1,
    Float2,
    #[default]
    Float3,
    Float4,
    Int1,
    Int2,
    Int3,
    Int4,
    UInt1,
    UInt2,
    UInt3,
    UInt4,
}

impl VertexFormat {
    pub const ALL: [Self; 12] = [
        Self::Float1,
        Self::Float2,
        Self::Float3,
        Self::Float4,
        Self::Int1,
        Self::Int2,
        Self::Int3,
        Self::Int4,
        Self::UInt1,
        Self::UInt2,
        Self::UInt3,
        Self::UInt4,
    ];

    /// 单个顶点属性占用的字节数
    pub fn size_in_bytes(self) -> u32 {
        let components = match self {
            Self::Float1 | Self::Int1 | Self::UInt1 => 1,
            Self::Float2 | Self::Int2 | Self::UInt2 => 2,
            Self::Float3 | Self::Int3 | Self::UInt3 => 3,
            Self::Float4 | Self::Int4 | Self::UInt4 => 4,
        };
        components * 4
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ClearValue {
    pub color: [f32; 4],
    pub depth: f32,
    pub stencil: u32,
}

impl Default for ClearValue {
    fn default() -> Self {
        Self {
            color: [0.0, 0.0, 0.0, 1.0],
            depth: 1.0,
            stencil: 0,
        }
    }
}

impl ClearValue {
    pub fn color(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self {
            color: [r, g, b, a],
            ..Default::default()
        }
    }

    pub fn depth_stencil(depth: f32, stencil: u32) -> Self {
        Self {
            depth,
            stencil,
            ..Default::default()
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

impl Viewport {
    pub fn from_size(width: u32, height: u32) -> Self {
        Self {
            width: width as f32,
            height: height as f32,
            ..Default::default()
        }
    }
}

/// scissor 与 render area 共用
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    pub fn from_size(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

pub type Scissor = Rect2D;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_component_default_is_all() {
        let rgba = ColorComponentFlags::R | ColorComponentFlags::G | ColorComponentFlags::B | ColorComponentFlags::A;
        assert_eq!(ColorComponentFlags::default(), rgba);
        assert_eq!(ColorComponentFlags::from_bits_truncate(0xFF), ColorComponentFlags::all());
    }

    #[test]
    fn test_vertex_format_size() {
        assert_eq!(VertexFormat::Float3.size_in_bytes(), 12);
        assert_eq!(VertexFormat::UInt1.size_in_bytes(), 4);
        assert!(VertexFormat::ALL.iter().all(|f| f.size_in_bytes() % 4 == 0));
    }

    #[test]
    fn test_sample_count_values() {
        let counts: Vec<u32> = SampleCount::ALL.iter().map(|s| *s as u32).collect();
        assert_eq!(counts, vec![1, 2, 4, 8, 16]);
    }
}
