use ash::prelude::VkResult;
use ash::vk;

use crate::foundation::debug_messenger::DebugType;

/// 窗口系统创建的 surface
///
/// surface 本身由外部（窗口层）创建，这里只负责查询与销毁
pub struct GfxSurface {
    pub(crate) handle: vk::SurfaceKHR,
    pub(crate) pf: ash::khr::surface::Instance,
}

// 创建与销毁
impl GfxSurface {
    /// 接管一个外部创建的 surface
    pub fn from_raw(vk_entry: &ash::Entry, instance: &ash::Instance, handle: vk::SurfaceKHR) -> Self {
        Self {
            handle,
            pf: ash::khr::surface::Instance::new(vk_entry, instance),
        }
    }

    pub fn destroy(self) {
        log::info!("destroying GfxSurface");
        unsafe { self.pf.destroy_surface(self.handle, None) }
    }
}

// getters
impl GfxSurface {
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    pub fn get_support(&self, pdevice: vk::PhysicalDevice, queue_family_index: u32) -> VkResult<bool> {
        unsafe { self.pf.get_physical_device_surface_support(pdevice, queue_family_index, self.handle) }
    }

    pub fn get_capabilities(&self, pdevice: vk::PhysicalDevice) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        unsafe { self.pf.get_physical_device_surface_capabilities(pdevice, self.handle) }
    }

    pub fn get_formats(&self, pdevice: vk::PhysicalDevice) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe { self.pf.get_physical_device_surface_formats(pdevice, self.handle) }
    }

    pub fn get_present_modes(&self, pdevice: vk::PhysicalDevice) -> VkResult<Vec<vk::PresentModeKHR>> {
        unsafe { self.pf.get_physical_device_surface_present_modes(pdevice, self.handle) }
    }
}

impl DebugType for GfxSurface {
    fn debug_type_name() -> &'static str {
        "GfxSurface"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
