use std::rc::Rc;

use anyhow::Context;
use ash::vk;
use kestrel_gfx::commands::command_buffer::GfxCommandBuffer;
use kestrel_gfx::foundation::device::GfxDevice;
use kestrel_gfx::pipelines::binding_layout::GfxShaderBindingLayout;
use kestrel_gfx::pipelines::shader_object::GfxShaderObjects;

use crate::shader::{ShaderSourceParams, ShaderStage};
use crate::vulkan::conversions;
use crate::vulkan::shader_compiler::ShaderCompiler;

/// 编译完成、尚未创建 shader object 的一组 SPIR-V
#[derive(Debug, Default)]
pub struct CompiledShaderProgram {
    pub vertex: Vec<u32>,
    pub geometry: Option<Vec<u32>>,
    pub fragment: Vec<u32>,
}

impl CompiledShaderProgram {
    /// 按管线顺序排列的 (stage, spirv)
    pub fn stages(&self) -> Vec<(ShaderStage, &[u32])> {
        let mut stages = vec![(ShaderStage::Vertex, self.vertex.as_slice())];
        if let Some(geometry) = &self.geometry {
            stages.push((ShaderStage::Geometry, geometry.as_slice()));
        }
        stages.push((ShaderStage::Fragment, self.fragment.as_slice()));
        stages
    }
}

/// vertex 与 fragment 必须存在，geometry 可选
pub fn compile_program(
    compiler: &dyn ShaderCompiler,
    params: &ShaderSourceParams,
) -> anyhow::Result<CompiledShaderProgram> {
    let compile = |stage: ShaderStage, source: &str| -> anyhow::Result<Vec<u32>> {
        if source.trim().is_empty() {
            anyhow::bail!("{} shader source is empty", stage.name());
        }
        compiler.compile(stage, source).with_context(|| format!("failed to compile {} shader", stage.name()))
    };

    Ok(CompiledShaderProgram {
        vertex: compile(ShaderStage::Vertex, &params.vertex)?,
        geometry: params
            .geometry
            .as_deref()
            .map(|source| compile(ShaderStage::Geometry, source))
            .transpose()?,
        fragment: compile(ShaderStage::Fragment, &params.fragment)?,
    })
}

/// 一个 RHI shader：链接在一起的 shader objects
pub struct ShaderVulkan {
    objects: GfxShaderObjects,
    has_geometry: bool,
}

impl ShaderVulkan {
    pub fn new(
        device: Rc<GfxDevice>,
        binding_layout: &GfxShaderBindingLayout,
        program: &CompiledShaderProgram,
        debug_name: &str,
    ) -> anyhow::Result<Self> {
        let stages = program
            .stages()
            .into_iter()
            .map(|(stage, spirv)| (conversions::shader_stage(stage), spirv))
            .collect::<Vec<_>>();
        let objects = GfxShaderObjects::new_linked(
            device,
            &stages,
            std::slice::from_ref(&binding_layout.set_layout()),
            std::slice::from_ref(&binding_layout.push_constant_range()),
            debug_name,
        )?;
        Ok(Self {
            objects,
            has_geometry: program.geometry.is_some(),
        })
    }

    pub fn destroy(self) {
        self.objects.destroy();
    }

    #[inline]
    pub fn has_geometry(&self) -> bool {
        self.has_geometry
    }

    #[inline]
    pub fn stages(&self) -> &[vk::ShaderStageFlags] {
        self.objects.stages()
    }

    /// 绑定所有 stage；没有 geometry 时在 geometry stage 上绑定 null
    pub fn bind(&self, cmd: &GfxCommandBuffer) {
        self.objects.bind(cmd);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    /// 把源码长度编码进 SPIR-V 的假编译器
    #[derive(Default)]
    struct FakeCompiler {
        calls: RefCell<Vec<ShaderStage>>,
        fail_on: Option<ShaderStage>,
    }

    impl ShaderCompiler for FakeCompiler {
        fn compile(&self, stage: ShaderStage, source: &str) -> anyhow::Result<Vec<u32>> {
            self.calls.borrow_mut().push(stage);
            if self.fail_on == Some(stage) {
                anyhow::bail!("<stdin>:3: error: 'gl_Position' : undeclared identifier");
            }
            Ok(vec![crate::vulkan::shader_compiler::SPIRV_MAGIC, source.len() as u32])
        }
    }

    fn params(geometry: Option<&str>) -> ShaderSourceParams {
        ShaderSourceParams {
            vertex: "void main() {}".to_string(),
            geometry: geometry.map(str::to_string),
            fragment: "void main() { }".to_string(),
        }
    }

    #[test]
    fn test_geometry_is_optional() {
        let compiler = FakeCompiler::default();
        let program = compile_program(&compiler, &params(None)).unwrap();
        assert!(program.geometry.is_none());
        assert_eq!(*compiler.calls.borrow(), vec![ShaderStage::Vertex, ShaderStage::Fragment]);
        let stages = program.stages().into_iter().map(|(stage, _)| stage).collect::<Vec<_>>();
        assert_eq!(stages, vec![ShaderStage::Vertex, ShaderStage::Fragment]);
    }

    #[test]
    fn test_geometry_in_pipeline_order() {
        let compiler = FakeCompiler::default();
        let program = compile_program(&compiler, &params(Some("void main() {  }"))).unwrap();
        let stages = program.stages();
        assert_eq!(stages.len(), 3);
        assert_eq!(stages[1].0, ShaderStage::Geometry);
        assert_eq!(stages[1].1[1], 16);
    }

    #[test]
    fn test_mandatory_stages() {
        let compiler = FakeCompiler::default();
        let mut no_vertex = params(None);
        no_vertex.vertex = "  \n".to_string();
        let err = compile_program(&compiler, &no_vertex).unwrap_err();
        assert!(err.to_string().contains("vert"));

        let mut no_fragment = params(None);
        no_fragment.fragment.clear();
        assert!(compile_program(&compiler, &no_fragment).is_err());
    }

    #[test]
    fn test_diagnostics_are_kept() {
        let compiler = FakeCompiler {
            fail_on: Some(ShaderStage::Fragment),
            ..Default::default()
        };
        let err = compile_program(&compiler, &params(None)).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("failed to compile frag shader"));
        assert!(message.contains("undeclared identifier"));
    }
}
