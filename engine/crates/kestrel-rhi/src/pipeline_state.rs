//! shader object 模式下的全部动态图形状态

use crate::types::{
    ColorComponentFlags, CompareOp, CullMode, FrontFace, PolygonMode, PrimitiveTopology, SampleCount, VertexFormat,
    VertexInputRate,
};

pub const MAX_VERTEX_BINDINGS: usize = 16;
pub const MAX_VERTEX_ATTRIBUTES: usize = 16;
pub const MAX_BLEND_ATTACHMENTS: usize = 8;

#[derive(Copy, Clone, Debug, Default)]
pub struct InputAssemblyState {
    pub topology: PrimitiveTopology,
    pub primitive_restart_enable: bool,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct RasterizationState {
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub polygon_mode: PolygonMode,
    pub depth_bias_enable: bool,
    pub rasterizer_discard: bool,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct DepthStencilState {
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: CompareOp,
    pub stencil_test_enable: bool,
}

#[derive(Copy, Clone, Debug)]
pub struct MultisampleState {
    pub samples: SampleCount,
    pub sample_mask: u32,
    pub alpha_to_coverage_enable: bool,
}

impl Default for MultisampleState {
    fn default() -> Self {
        Self {
            samples: SampleCount::Count1,
            sample_mask: u32::MAX,
            alpha_to_coverage_enable: false,
        }
    }
}

/// 开启混合时使用标准的 alpha 混合
#[derive(Copy, Clone, Debug, Default)]
pub struct ColorBlendAttachmentState {
    pub blend_enable: bool,
    pub color_write_mask: ColorComponentFlags,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct VertexInputBindingDescriptor {
    pub binding: u32,
    pub stride: u32,
    pub input_rate: VertexInputRate,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct VertexInputAttributeDescriptor {
    pub location: u32,
    pub binding: u32,
    pub format: VertexFormat,
    pub offset: u32,
}

#[derive(Clone, Debug, Default)]
pub struct VertexInputState {
    pub bindings: Vec<VertexInputBindingDescriptor>,
    pub attributes: Vec<VertexInputAttributeDescriptor>,
}

#[derive(Clone, Debug, Default)]
pub struct GraphicsStateDescriptor {
    pub input_assembly: InputAssemblyState,
    pub rasterization: RasterizationState,
    pub depth_stencil: DepthStencilState,
    pub multisample: MultisampleState,
    /// 为空时按一个默认的 attachment 处理
    pub color_blend: Vec<ColorBlendAttachmentState>,
    pub vertex_input: VertexInputState,
}

impl GraphicsStateDescriptor {
    /// 检查数量上限，以及 attribute 引用的 binding 是否存在
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.vertex_input.bindings.len() > MAX_VERTEX_BINDINGS {
            anyhow::bail!("too many vertex bindings: {}", self.vertex_input.bindings.len());
        }
        if self.vertex_input.attributes.len() > MAX_VERTEX_ATTRIBUTES {
            anyhow::bail!("too many vertex attributes: {}", self.vertex_input.attributes.len());
        }
        if self.color_blend.len() > MAX_BLEND_ATTACHMENTS {
            anyhow::bail!("too many color blend attachments: {}", self.color_blend.len());
        }
        if let Some(attr) = self
            .vertex_input
            .attributes
            .iter()
            .find(|attr| !self.vertex_input.bindings.iter().any(|b| b.binding == attr.binding))
        {
            anyhow::bail!("vertex attribute at location {} uses undeclared binding {}", attr.location, attr.binding);
        }
        Ok(())
    }

    /// 实际需要设置的 blend attachment 状态
    pub fn color_blend_attachments(&self) -> Vec<ColorBlendAttachmentState> {
        if self.color_blend.is_empty() { vec![ColorBlendAttachmentState::default()] } else { self.color_blend.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_state() -> GraphicsStateDescriptor {
        GraphicsStateDescriptor {
            vertex_input: VertexInputState {
                bindings: vec![VertexInputBindingDescriptor {
                    binding: 0,
                    stride: 24,
                    input_rate: VertexInputRate::Vertex,
                }],
                attributes: vec![
                    VertexInputAttributeDescriptor {
                        location: 0,
                        binding: 0,
                        format: VertexFormat::Float3,
                        offset: 0,
                    },
                    VertexInputAttributeDescriptor {
                        location: 1,
                        binding: 0,
                        format: VertexFormat::Float3,
                        offset: 12,
                    },
                ],
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_state() {
        assert!(triangle_state().validate().is_ok());
        assert!(GraphicsStateDescriptor::default().validate().is_ok());
    }

    #[test]
    fn test_attribute_with_unknown_binding() {
        let mut state = triangle_state();
        state.vertex_input.attributes[1].binding = 3;
        let err = state.validate().unwrap_err();
        assert!(err.to_string().contains("binding 3"));
    }

    #[test]
    fn test_blend_attachment_limit() {
        let mut state = triangle_state();
        state.color_blend = vec![ColorBlendAttachmentState::default(); MAX_BLEND_ATTACHMENTS + 1];
        assert!(state.validate().is_err());
    }

    #[test]
    fn test_default_blend_attachment() {
        let attachments = GraphicsStateDescriptor::default().color_blend_attachments();
        assert_eq!(attachments.len(), 1);
        assert!(!attachments[0].blend_enable);
        assert_eq!(attachments[0].color_write_mask, ColorComponentFlags::all());
    }
}
