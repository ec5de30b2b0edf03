use std::rc::Rc;

use anyhow::Context;
use ash::vk;

use crate::foundation::{debug_messenger::DebugType, device::GfxDevice};

/// 所有 shader object 共享的资源绑定布局
///
/// - set 0：`uniform_binding_count` 个 uniform buffer，通过 push descriptor 绑定
/// - 一段覆盖所有图形 stage 的 push constant
pub struct GfxShaderBindingLayout {
    set_layout: vk::DescriptorSetLayout,
    pipeline_layout: vk::PipelineLayout,
    push_constant_range: vk::PushConstantRange,
    device: Rc<GfxDevice>,
}

// 创建与销毁
impl GfxShaderBindingLayout {
    pub fn new(
        device: Rc<GfxDevice>,
        uniform_binding_count: u32,
        push_constant_size: u32,
        debug_name: &str,
    ) -> anyhow::Result<Self> {
        let bindings = uniform_bindings(uniform_binding_count);
        let set_layout_ci = vk::DescriptorSetLayoutCreateInfo::default()
            .flags(vk::DescriptorSetLayoutCreateFlags::PUSH_DESCRIPTOR_KHR)
            .bindings(&bindings);
        let set_layout = unsafe { device.create_descriptor_set_layout(&set_layout_ci, None) }
            .with_context(|| format!("failed to create descriptor set layout {debug_name}"))?;

        let push_constant_range = vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::ALL_GRAPHICS)
            .offset(0)
            .size(push_constant_size);
        let pipeline_layout_ci = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(std::slice::from_ref(&set_layout))
            .push_constant_ranges(std::slice::from_ref(&push_constant_range));
        let pipeline_layout = match unsafe { device.create_pipeline_layout(&pipeline_layout_ci, None) } {
            Ok(layout) => layout,
            Err(e) => {
                unsafe { device.destroy_descriptor_set_layout(set_layout, None) };
                return Err(e).with_context(|| format!("failed to create pipeline layout {debug_name}"));
            }
        };

        device.set_object_debug_name(set_layout, format!("GfxDescriptorSetLayout::{debug_name}"));
        let layout = Self {
            set_layout,
            pipeline_layout,
            push_constant_range,
            device,
        };
        layout.device.set_debug_name(&layout, debug_name);
        Ok(layout)
    }

    pub fn destroy(self) {
        unsafe {
            self.device.destroy_pipeline_layout(self.pipeline_layout, None);
            self.device.destroy_descriptor_set_layout(self.set_layout, None);
        }
    }
}

// getters
impl GfxShaderBindingLayout {
    #[inline]
    pub fn set_layout(&self) -> vk::DescriptorSetLayout {
        self.set_layout
    }

    #[inline]
    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout
    }

    #[inline]
    pub fn push_constant_range(&self) -> vk::PushConstantRange {
        self.push_constant_range
    }
}

impl DebugType for GfxShaderBindingLayout {
    fn debug_type_name() -> &'static str {
        "GfxPipelineLayout"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.pipeline_layout
    }
}

/// binding 0..count，每个都是单个 uniform buffer
fn uniform_bindings(count: u32) -> Vec<vk::DescriptorSetLayoutBinding<'static>> {
    (0..count)
        .map(|binding| {
            vk::DescriptorSetLayoutBinding::default()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::ALL_GRAPHICS)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_bindings_are_contiguous() {
        let bindings = uniform_bindings(8);
        assert_eq!(bindings.len(), 8);
        for (idx, binding) in bindings.iter().enumerate() {
            assert_eq!(binding.binding, idx as u32);
            assert_eq!(binding.descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
            assert!(binding.stage_flags.contains(vk::ShaderStageFlags::FRAGMENT));
        }
        assert!(uniform_bindings(0).is_empty());
    }
}
