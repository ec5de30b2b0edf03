use std::fmt;
use std::path::PathBuf;

use raw_window_handle::RawWindowHandle;

use crate::texture::TextureFormat;

/// 返回当前 framebuffer 的 (width, height)，单位是像素
pub type FramebufferSizeFn = Box<dyn Fn() -> (u32, u32)>;

/// (原始 instance 句柄, 输出的原始 surface 句柄) -> 是否成功
///
/// 对于 Vulkan，两个值分别是 `VkInstance` 与 `VkSurfaceKHR`
pub type CreateSurfaceFn = Box<dyn Fn(u64, &mut u64) -> bool>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Version {
    pub variant: u32,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            variant: 0,
            major,
            minor,
            patch,
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

/// 平台层提供给 RHI 的全部信息，RHI 不会直接调用窗口系统
pub struct PlatformContext {
    pub app_name: String,
    pub app_version: Version,
    pub engine_name: String,
    pub engine_version: Version,

    pub window_handle: Option<RawWindowHandle>,
    pub required_instance_extensions: Vec<String>,

    pub framebuffer_size: FramebufferSizeFn,
    pub create_surface: CreateSurfaceFn,
}

impl Default for PlatformContext {
    fn default() -> Self {
        Self {
            app_name: "kestrel_app".to_string(),
            app_version: Version::default(),
            engine_name: "kestrel_engine".to_string(),
            engine_version: Version::default(),
            window_handle: None,
            required_instance_extensions: Vec::new(),
            framebuffer_size: Box::new(|| (0, 0)),
            create_surface: Box::new(|_, _| false),
        }
    }
}

impl fmt::Debug for PlatformContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformContext")
            .field("app_name", &self.app_name)
            .field("app_version", &self.app_version)
            .field("engine_name", &self.engine_name)
            .field("engine_version", &self.engine_version)
            .field("window_handle", &self.window_handle)
            .field("required_instance_extensions", &self.required_instance_extensions)
            .finish_non_exhaustive()
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum RhiBackend {
    /// Linux 与 Windows 上使用 Vulkan
    #[default]
    Auto,
    Vulkan,
    OpenGL,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum PresentMode {
    Immediate,
    Mailbox,
    #[default]
    Fifo,
    FifoRelaxed,
}

impl PresentMode {
    pub const ALL: [Self; 4] = [Self::Immediate, Self::Mailbox, Self::Fifo, Self::FifoRelaxed];
}

/// 设备创建时的可配置项
#[derive(Clone, Debug)]
pub struct DeviceSettings {
    /// 不支持时依次回退到 Mailbox、Fifo
    pub preferred_present_mode: PresentMode,
    /// 颜色空间固定为 sRGB nonlinear；不支持时使用 surface 报告的第一个格式
    pub preferred_surface_format: TextureFormat,
    pub enable_validation: bool,
    /// glslc 的路径，None 表示从 PATH 中查找
    pub shader_compiler: Option<PathBuf>,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            preferred_present_mode: PresentMode::Fifo,
            preferred_surface_format: TextureFormat::Bgra8Srgb,
            enable_validation: cfg!(debug_assertions),
            shader_compiler: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct RhiInitParams {
    pub backend: RhiBackend,
    pub context: PlatformContext,
    pub settings: DeviceSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_context_defaults() {
        let context = PlatformContext::default();
        assert_eq!(context.app_name, "kestrel_app");
        assert_eq!(context.engine_name, "kestrel_engine");
        assert_eq!(context.engine_version, Version::new(1, 0, 0));
        assert_eq!((context.framebuffer_size)(), (0, 0));

        let mut surface = 0;
        assert!(!(context.create_surface)(1, &mut surface));
        assert_eq!(surface, 0);
    }

    #[test]
    fn test_settings_defaults() {
        let settings = DeviceSettings::default();
        assert_eq!(settings.preferred_present_mode, PresentMode::Fifo);
        assert_eq!(settings.preferred_surface_format, TextureFormat::Bgra8Srgb);
        assert!(settings.shader_compiler.is_none());
    }

    #[test]
    fn test_debug_skips_callbacks() {
        let text = format!("{:?}", PlatformContext::default());
        assert!(text.contains("kestrel_app"));
        assert!(text.contains(".."));
    }
}
