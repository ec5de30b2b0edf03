//! Kestrel 的渲染硬件接口（RHI）
//!
//! 应用层只接触这里的描述符、句柄和 [`RhiDeviceApi`]，不直接使用任何 Vulkan 类型。
//! 资源由设备持有，应用层拿到的是带代数的句柄；过期的句柄会被检测到并忽略。
//!
//! 一帧的流程：
//! ```text
//! begin_frame → begin_render_pass → set_graphics_state / bind_* / draw* → end_render_pass
//!             → submit_and_present_frame
//! ```

pub mod barrier;
pub mod buffer;
pub mod device;
pub mod frame;
pub mod handle;
pub mod pipeline_state;
pub mod platform;
pub mod render_pass;
pub mod resource_pool;
pub mod shader;
pub mod texture;
pub mod types;
pub mod vulkan;

pub use device::{RhiDevice, RhiDeviceApi};
pub use frame::{FrameContext, PresentStatus};
pub use handle::{BufferHandle, ShaderHandle, TextureHandle};
pub use platform::{DeviceSettings, PlatformContext, RhiBackend, RhiInitParams, Version};

use crate::vulkan::device::RhiDeviceVulkan;

/// 确定实际使用的后端
pub fn resolve_backend(backend: RhiBackend) -> anyhow::Result<RhiBackend> {
    match backend {
        RhiBackend::Auto => {
            if cfg!(any(target_os = "linux", target_os = "windows")) {
                Ok(RhiBackend::Vulkan)
            } else {
                anyhow::bail!("no rhi backend available on {}", std::env::consts::OS)
            }
        }
        RhiBackend::Vulkan => Ok(RhiBackend::Vulkan),
        RhiBackend::OpenGL => anyhow::bail!("only vulkan is currently supported"),
    }
}

/// 创建 RHI 设备
///
/// 只有后端不可用时才返回 Err；设备初始化失败时返回的设备 `is_valid()` 为 false
pub fn create_rhi_device(params: RhiInitParams) -> anyhow::Result<RhiDevice> {
    match resolve_backend(params.backend)? {
        RhiBackend::Vulkan => Ok(RhiDevice::Vulkan(RhiDeviceVulkan::new(&params))),
        backend => anyhow::bail!("backend {:?} cannot be created directly", backend),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opengl_is_rejected() {
        let err = resolve_backend(RhiBackend::OpenGL).unwrap_err();
        assert_eq!(err.to_string(), "only vulkan is currently supported");

        let params = RhiInitParams {
            backend: RhiBackend::OpenGL,
            ..Default::default()
        };
        assert!(create_rhi_device(params).is_err());
    }

    #[test]
    fn test_explicit_vulkan_is_kept() {
        assert_eq!(resolve_backend(RhiBackend::Vulkan).unwrap(), RhiBackend::Vulkan);
    }

    #[test]
    #[cfg(any(target_os = "linux", target_os = "windows"))]
    fn test_auto_resolves_to_vulkan() {
        assert_eq!(resolve_backend(RhiBackend::Auto).unwrap(), RhiBackend::Vulkan);
    }

    #[test]
    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    fn test_auto_fails_elsewhere() {
        assert!(resolve_backend(RhiBackend::Auto).is_err());
    }
}
