use std::path::{Path, PathBuf};

use anyhow::Context;
use bitflags::bitflags;

/// set 0 上可以通过 push descriptor 绑定的 uniform buffer 数量
pub const MAX_UNIFORM_BINDINGS: u32 = 8;
/// 所有设备都保证支持的 push constant 大小
pub const MAX_PUSH_CONSTANT_SIZE: u32 = 128;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Geometry,
    Fragment,
}

impl ShaderStage {
    pub const ALL: [Self; 3] = [Self::Vertex, Self::Geometry, Self::Fragment];

    pub fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vert",
            Self::Geometry => "geom",
            Self::Fragment => "frag",
        }
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u8 {
        const VERTEX = 1 << 0;
        const GEOMETRY = 1 << 1;
        const FRAGMENT = 1 << 2;

        const ALL_GRAPHICS = Self::VERTEX.bits() | Self::GEOMETRY.bits() | Self::FRAGMENT.bits();
    }
}

impl From<ShaderStage> for ShaderStageFlags {
    fn from(stage: ShaderStage) -> Self {
        match stage {
            ShaderStage::Vertex => Self::VERTEX,
            ShaderStage::Geometry => Self::GEOMETRY,
            ShaderStage::Fragment => Self::FRAGMENT,
        }
    }
}

/// GLSL 源码，geometry 可选
#[derive(Clone, Debug, Default)]
pub struct ShaderSourceParams {
    pub vertex: String,
    pub geometry: Option<String>,
    pub fragment: String,
}

/// GLSL 文件路径，geometry 可选
#[derive(Clone, Debug, Default)]
pub struct ShaderFileParams {
    pub vertex: PathBuf,
    pub geometry: Option<PathBuf>,
    pub fragment: PathBuf,
}

impl ShaderFileParams {
    /// 读取所有文件；任何一个文件读取失败都会返回错误
    pub fn load(&self) -> anyhow::Result<ShaderSourceParams> {
        fn read(path: &Path) -> anyhow::Result<String> {
            std::fs::read_to_string(path).with_context(|| format!("failed to read shader file {}", path.display()))
        }

        Ok(ShaderSourceParams {
            vertex: read(&self.vertex)?,
            geometry: self.geometry.as_deref().map(read).transpose()?,
            fragment: read(&self.fragment)?,
        })
    }

    /// 用于 debug name
    pub fn display_name(&self) -> String {
        self.vertex.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "shader".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_flags_from_stage() {
        let all = ShaderStage::ALL.into_iter().fold(ShaderStageFlags::empty(), |acc, s| acc | ShaderStageFlags::from(s));
        assert_eq!(all, ShaderStageFlags::ALL_GRAPHICS);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let params = ShaderFileParams {
            vertex: PathBuf::from("/definitely/not/here.vert"),
            geometry: None,
            fragment: PathBuf::from("/definitely/not/here.frag"),
        };
        let err = params.load().unwrap_err();
        assert!(err.to_string().contains("here.vert"));
    }

    #[test]
    fn test_load_files() {
        let dir = std::env::temp_dir().join(format!("kestrel-shader-load-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let vert = dir.join("tri.vert");
        let frag = dir.join("tri.frag");
        std::fs::write(&vert, "void main() {}").unwrap();
        std::fs::write(&frag, "void main() { }").unwrap();

        let params = ShaderFileParams {
            vertex: vert,
            geometry: None,
            fragment: frag,
        };
        let sources = params.load().unwrap();
        assert_eq!(sources.vertex, "void main() {}");
        assert!(sources.geometry.is_none());
        assert_eq!(params.display_name(), "tri");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
