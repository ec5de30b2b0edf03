use std::cell::Cell;
use std::{
    ffi::{CStr, CString},
    ops::Deref,
};

use anyhow::Context;
use ash::vk;
use itertools::Itertools;

use crate::foundation::debug_messenger::DebugType;

/// Vulkan 逻辑设备封装
///
/// 包含核心设备 API 以及各种扩展的函数指针。
/// 这些函数指针在设备生命周期中保持不变，可以通过 `Rc` 安全共享。
///
/// # 扩展支持
/// - Swapchain (KHR)
/// - Shader Object (EXT)，以及它依赖的动态状态扩展
/// - Push Descriptor (KHR)
/// - Debug Utils (EXT)
pub struct GfxDevice {
    /// 核心 Vulkan 设备 API
    pub(crate) device: ash::Device,
    /// 交换链扩展 API
    pub(crate) swapchain: ash::khr::swapchain::Device,
    /// shader object 扩展 API，同时提供 extended dynamic state 3 的命令
    pub(crate) shader_object: ash::ext::shader_object::Device,
    /// 推送描述符扩展 API
    pub(crate) push_descriptor: ash::khr::push_descriptor::Device,
    /// 调试工具扩展 API
    pub(crate) debug_utils: ash::ext::debug_utils::Device,

    #[cfg(debug_assertions)]
    destroyed: Cell<bool>,
}

// 创建与销毁
impl GfxDevice {
    /// 在 `queue_family_index` 上创建一个 queue
    pub fn new(instance: &ash::Instance, pdevice: vk::PhysicalDevice, queue_family_index: u32) -> anyhow::Result<Self> {
        // device 所需的所有 extension
        let device_exts = Self::basic_device_exts().iter().map(|e| e.as_ptr()).collect_vec();
        log::info!(
            "device exts: {}",
            Self::basic_device_exts().iter().map(|ext| format!("\n\t{:?}", ext)).join("")
        );

        // device 所需的所有 features
        let mut vk13_features = vk::PhysicalDeviceVulkan13Features::default()
            .dynamic_rendering(true)
            .synchronization2(true);
        let mut shader_object_features = vk::PhysicalDeviceShaderObjectFeaturesEXT::default().shader_object(true);
        let mut all_features = vk::PhysicalDeviceFeatures2::default()
            .features(Self::physical_device_basic_features())
            .push_next(&mut vk13_features)
            .push_next(&mut shader_object_features);

        let queue_priorities = [1.0];
        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family_index)
            .queue_priorities(&queue_priorities)];

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&device_exts)
            .push_next(&mut all_features);

        let device = unsafe { instance.create_device(pdevice, &device_create_info, None) }
            .context("failed to create logical device")?;
        log::trace!("logical device created");

        Ok(Self {
            swapchain: ash::khr::swapchain::Device::new(instance, &device),
            shader_object: ash::ext::shader_object::Device::new(instance, &device),
            push_descriptor: ash::khr::push_descriptor::Device::new(instance, &device),
            debug_utils: ash::ext::debug_utils::Device::new(instance, &device),
            device,

            #[cfg(debug_assertions)]
            destroyed: Cell::new(false),
        })
    }

    pub fn destroy(&self) {
        log::info!("destroying device");

        #[cfg(debug_assertions)]
        self.destroyed.set(true);

        unsafe {
            self.device.destroy_device(None);
        }
    }
}

// 创建过程的辅助函数
impl GfxDevice {
    /// 必要的 physical device core features
    ///
    /// geometry shader 是硬性要求，调用方需要在创建之前检查
    fn physical_device_basic_features() -> vk::PhysicalDeviceFeatures {
        vk::PhysicalDeviceFeatures::default().geometry_shader(true)
    }

    /// 必要的 device extensions
    pub fn basic_device_exts() -> Vec<&'static CStr> {
        vec![
            ash::khr::swapchain::NAME,
            ash::ext::shader_object::NAME,
            // shader object 的所有状态都是动态的
            ash::ext::vertex_input_dynamic_state::NAME,
            ash::ext::extended_dynamic_state3::NAME,
            // uniform buffer 通过 push descriptor 绑定，无需 descriptor pool
            ash::khr::push_descriptor::NAME,
        ]
    }
}

// getters
impl GfxDevice {
    #[inline]
    pub fn vk_handle(&self) -> vk::Device {
        self.device.handle()
    }
    #[inline]
    pub fn swapchain(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain
    }
    #[inline]
    pub fn shader_object(&self) -> &ash::ext::shader_object::Device {
        &self.shader_object
    }
    #[inline]
    pub fn push_descriptor(&self) -> &ash::khr::push_descriptor::Device {
        &self.push_descriptor
    }
}

// tools
impl GfxDevice {
    /// debug name 只是辅助信息，设置失败时不影响运行
    pub fn set_object_debug_name<T: vk::Handle>(&self, handle: T, name: impl AsRef<str>) {
        let Ok(name) = CString::new(name.as_ref()) else {
            log::warn!("debug name contains a nul byte: {}", name.as_ref());
            return;
        };
        let result =
            unsafe { self.debug_utils.set_debug_utils_object_name(&object_name_info(handle, name.as_c_str())) };
        if let Err(e) = result {
            log::warn!("failed to set debug name {:?}: {:?}", name, e);
        }
    }

    pub fn set_debug_name<T: DebugType>(&self, handle: &T, name: impl AsRef<str>) {
        self.set_object_debug_name(handle.vk_handle(), format!("{}::{}", T::debug_type_name(), name.as_ref()));
    }

    #[inline]
    pub fn wait_idle(&self) {
        if let Err(e) = unsafe { self.device.device_wait_idle() } {
            log::error!("failed to wait device idle: {:?}", e);
        }
    }
}

fn object_name_info<T: vk::Handle>(handle: T, name: &CStr) -> vk::DebugUtilsObjectNameInfoEXT<'_> {
    vk::DebugUtilsObjectNameInfoEXT::default().object_name(name).object_handle(handle)
}

impl Deref for GfxDevice {
    type Target = ash::Device;
    fn deref(&self) -> &Self::Target {
        &self.device
    }
}
impl Drop for GfxDevice {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        debug_assert!(self.destroyed.get(), "GfxDevice must be destroyed before being dropped.");
    }
}
impl DebugType for GfxDevice {
    fn debug_type_name() -> &'static str {
        "GfxDevice"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.device.handle()
    }
}

#[cfg(test)]
mod tests {
    use ash::vk::Handle;

    use super::*;

    #[test]
    fn test_device_exts_include_shader_object_stack() {
        let exts = GfxDevice::basic_device_exts();
        assert!(exts.contains(&ash::khr::swapchain::NAME));
        assert!(exts.contains(&ash::ext::shader_object::NAME));
        assert!(exts.contains(&ash::khr::push_descriptor::NAME));
        assert_eq!(exts.iter().unique().count(), exts.len());
    }

    struct FakeFence(u64);

    impl DebugType for FakeFence {
        fn debug_type_name() -> &'static str {
            "FakeFence"
        }
        fn vk_handle(&self) -> impl vk::Handle {
            vk::Fence::from_raw(self.0)
        }
    }

    #[test]
    fn test_object_name_info_from_debug_type() {
        let fence = FakeFence(42);
        let name = c"GfxFence::frame-0";
        let info = object_name_info(fence.vk_handle(), name);
        assert_eq!(info.object_type, vk::ObjectType::FENCE);
        assert_eq!(info.object_handle, 42);
        assert_eq!(FakeFence::debug_type_name(), "FakeFence");
    }

    #[test]
    fn test_basic_features_require_geometry_shader() {
        assert_eq!(GfxDevice::physical_device_basic_features().geometry_shader, vk::TRUE);
    }
}
