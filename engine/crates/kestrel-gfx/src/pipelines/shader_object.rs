use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use crate::{commands::command_buffer::GfxCommandBuffer, foundation::device::GfxDevice};

/// 一组互相链接的 shader object（VK_EXT_shader_object）
///
/// 没有 geometry shader 时，bind 会显式地在 geometry stage 上绑定 null
pub struct GfxShaderObjects {
    stages: Vec<vk::ShaderStageFlags>,
    shaders: Vec<vk::ShaderEXT>,
    device: Rc<GfxDevice>,
}

// 创建与销毁
impl GfxShaderObjects {
    /// # param
    /// * stages - (stage, spirv)，按管线顺序排列
    pub fn new_linked(
        device: Rc<GfxDevice>,
        stages: &[(vk::ShaderStageFlags, &[u32])],
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
        debug_name: &str,
    ) -> anyhow::Result<Self> {
        if stages.is_empty() {
            anyhow::bail!("shader {debug_name} has no stage");
        }

        let stage_flags = stages.iter().map(|(stage, _)| *stage).collect_vec();
        let create_infos = stages
            .iter()
            .map(|(stage, spirv)| {
                vk::ShaderCreateInfoEXT::default()
                    .flags(if stages.len() > 1 { vk::ShaderCreateFlagsEXT::LINK_STAGE } else { Default::default() })
                    .stage(*stage)
                    .next_stage(next_stage(*stage, &stage_flags))
                    .code_type(vk::ShaderCodeTypeEXT::SPIRV)
                    .code(bytemuck::cast_slice(spirv))
                    .name(c"main")
                    .set_layouts(set_layouts)
                    .push_constant_ranges(push_constant_ranges)
            })
            .collect_vec();

        let shaders = unsafe { device.shader_object().create_shaders(&create_infos, None) }
            .map_err(|e| anyhow::anyhow!("failed to create shader objects {debug_name}: {:?}", e))?;
        for (stage, shader) in stage_flags.iter().zip(shaders.iter()) {
            device.set_object_debug_name(*shader, format!("GfxShaderObject::{debug_name}-{:?}", stage));
        }
        log::debug!("shader objects {} created: {:?}", debug_name, stage_flags);

        Ok(Self {
            stages: stage_flags,
            shaders,
            device,
        })
    }

    pub fn destroy(self) {
        for shader in &self.shaders {
            unsafe { self.device.shader_object().destroy_shader(*shader, None) };
        }
    }
}

// tools
impl GfxShaderObjects {
    #[inline]
    pub fn stages(&self) -> &[vk::ShaderStageFlags] {
        &self.stages
    }

    pub fn bind(&self, cmd: &GfxCommandBuffer) {
        let (stages, shaders) = bind_list(&self.stages, &self.shaders);
        cmd.cmd_bind_shaders(&stages, &shaders);
    }
}

/// 在 vertex -> geometry -> fragment 的顺序中，`stage` 之后实际存在的下一个 stage
fn next_stage(stage: vk::ShaderStageFlags, present: &[vk::ShaderStageFlags]) -> vk::ShaderStageFlags {
    match stage {
        vk::ShaderStageFlags::VERTEX if present.contains(&vk::ShaderStageFlags::GEOMETRY) => {
            vk::ShaderStageFlags::GEOMETRY
        }
        vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::GEOMETRY => vk::ShaderStageFlags::FRAGMENT,
        _ => vk::ShaderStageFlags::empty(),
    }
}

/// 需要绑定的 (stages, shaders)，缺失的 geometry stage 绑定 null
fn bind_list(
    stages: &[vk::ShaderStageFlags],
    shaders: &[vk::ShaderEXT],
) -> (Vec<vk::ShaderStageFlags>, Vec<vk::ShaderEXT>) {
    let mut bind_stages = stages.to_vec();
    let mut bind_shaders = shaders.to_vec();
    if !stages.contains(&vk::ShaderStageFlags::GEOMETRY) {
        bind_stages.push(vk::ShaderStageFlags::GEOMETRY);
        bind_shaders.push(vk::ShaderEXT::null());
    }
    (bind_stages, bind_shaders)
}

#[cfg(test)]
mod tests {
    use ash::vk::Handle;

    use super::*;

    const VS: vk::ShaderStageFlags = vk::ShaderStageFlags::VERTEX;
    const GS: vk::ShaderStageFlags = vk::ShaderStageFlags::GEOMETRY;
    const FS: vk::ShaderStageFlags = vk::ShaderStageFlags::FRAGMENT;

    #[test]
    fn test_next_stage_skips_missing_geometry() {
        assert_eq!(next_stage(VS, &[VS, FS]), FS);
        assert_eq!(next_stage(VS, &[VS, GS, FS]), GS);
        assert_eq!(next_stage(GS, &[VS, GS, FS]), FS);
        assert_eq!(next_stage(FS, &[VS, GS, FS]), vk::ShaderStageFlags::empty());
    }

    #[test]
    fn test_bind_list_adds_null_geometry() {
        let shaders = [vk::ShaderEXT::from_raw(1), vk::ShaderEXT::from_raw(2)];
        let (stages, bound) = bind_list(&[VS, FS], &shaders);
        assert_eq!(stages, vec![VS, FS, GS]);
        assert!(bound[2].is_null());

        let shaders = [vk::ShaderEXT::from_raw(1), vk::ShaderEXT::from_raw(2), vk::ShaderEXT::from_raw(3)];
        let (stages, bound) = bind_list(&[VS, GS, FS], &shaders);
        assert_eq!(stages.len(), 3);
        assert!(bound.iter().all(|s| !s.is_null()));
    }
}
