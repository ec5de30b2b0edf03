use std::path::{Path, PathBuf};

/// 工作区内的资源路径
///
/// 所有路径基于工作区根目录（通过 `CARGO_MANIFEST_DIR` 推导），避免依赖运行时的工作目录。
pub struct KestrelPath;
impl KestrelPath {
    /// 工作区根目录
    pub fn workspace_path() -> PathBuf {
        // kestrel-crate-tools 位于工作区根目录下
        Path::new(env!("CARGO_MANIFEST_DIR")).parent().map(Path::to_path_buf).unwrap_or_default()
    }

    /// `shader/` 目录，存放 GLSL 源码
    pub fn shader_root_path() -> PathBuf {
        Self::workspace_path().join("shader")
    }

    /// `shader/` 目录下的某个文件
    pub fn shader_path(filename: impl AsRef<Path>) -> PathBuf {
        Self::shader_root_path().join(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_path_under_workspace() {
        let path = KestrelPath::shader_path("triangle/triangle.vert");
        assert!(path.starts_with(KestrelPath::workspace_path()));
        assert!(path.ends_with("shader/triangle/triangle.vert"));
    }
}
