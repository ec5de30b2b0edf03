//! GLSL -> SPIR-V 的编译
//!
//! 运行时调用 glslc（来自 Vulkan SDK），源码从 stdin 输入，SPIR-V 从 stdout 读出

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::Context;

use crate::shader::ShaderStage;

/// SPIR-V 文件的 magic number
#[cfg(test)]
pub(crate) const SPIRV_MAGIC: u32 = 0x0723_0203;

pub trait ShaderCompiler {
    /// 编译失败时返回的错误包含编译器的诊断信息
    fn compile(&self, stage: ShaderStage, source: &str) -> anyhow::Result<Vec<u32>>;
}

/// 使用 glslc 编译 GLSL
#[derive(Debug, Clone)]
pub struct GlslcCompiler {
    executable: PathBuf,
}

impl Default for GlslcCompiler {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("glslc"),
        }
    }
}

impl GlslcCompiler {
    /// # param
    /// * executable - None 表示使用 PATH 中的 glslc
    pub fn new(executable: Option<PathBuf>) -> Self {
        executable.map(|executable| Self { executable }).unwrap_or_default()
    }

    fn args(stage: ShaderStage) -> [String; 5] {
        [
            format!("-fshader-stage={}", stage.name()),
            "--target-env=vulkan1.3".to_string(),
            "-o".to_string(),
            "-".to_string(),
            "-".to_string(),
        ]
    }

    /// 根据 cmd 执行的结果，处理输出信息
    fn process_cmd_output(stage: ShaderStage, output: std::process::Output) -> anyhow::Result<Vec<u32>> {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            anyhow::bail!("glslc failed to compile {} shader ({}):\n{}", stage.name(), output.status, stderr.trim());
        }
        if !stderr.trim().is_empty() {
            log::warn!("glslc {}: {}", stage.name(), stderr.trim());
        }
        spirv_words(&output.stdout)
    }
}

impl ShaderCompiler for GlslcCompiler {
    fn compile(&self, stage: ShaderStage, source: &str) -> anyhow::Result<Vec<u32>> {
        let mut child = Command::new(&self.executable)
            .args(Self::args(stage))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to execute {}", self.executable.display()))?;

        {
            let mut stdin = child.stdin.take().context("glslc stdin is not piped")?;
            stdin.write_all(source.as_bytes()).context("failed to write shader source to glslc")?;
            // stdin 在这里关闭，glslc 才会开始编译
        }

        let output = child.wait_with_output().context("failed to wait for glslc")?;
        Self::process_cmd_output(stage, output)
    }
}

/// 将 glslc 输出的字节流转换为 SPIR-V words，长度与 magic number 都会检查
pub fn spirv_words(bytes: &[u8]) -> anyhow::Result<Vec<u32>> {
    ash::util::read_spv(&mut std::io::Cursor::new(bytes)).context("invalid spirv from glslc")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spirv_words() {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0x0001_0600u32.to_le_bytes());
        assert_eq!(spirv_words(&bytes).unwrap(), vec![SPIRV_MAGIC, 0x0001_0600]);
    }

    #[test]
    fn test_spirv_words_rejects_garbage() {
        assert!(spirv_words(&[]).is_err());
        assert!(spirv_words(&[3, 2, 35]).is_err());
        assert!(spirv_words(&[0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_spirv_words_accepts_big_endian() {
        let mut bytes = SPIRV_MAGIC.to_be_bytes().to_vec();
        bytes.extend_from_slice(&0x0001_0600u32.to_be_bytes());
        assert_eq!(spirv_words(&bytes).unwrap(), vec![SPIRV_MAGIC, 0x0001_0600]);
    }

    #[test]
    fn test_glslc_args() {
        let args = GlslcCompiler::args(ShaderStage::Geometry);
        assert_eq!(args[0], "-fshader-stage=geom");
        assert!(args.contains(&"--target-env=vulkan1.3".to_string()));
    }

    #[test]
    fn test_missing_executable_is_an_error() {
        let compiler = GlslcCompiler::new(Some(PathBuf::from("/definitely/not/glslc")));
        let err = compiler.compile(ShaderStage::Vertex, "#version 450\nvoid main() {}").unwrap_err();
        assert!(format!("{err:#}").contains("/definitely/not/glslc"));
    }
}
