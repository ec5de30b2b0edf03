use std::rc::Rc;

use anyhow::Context;
use ash::prelude::VkResult;
use ash::vk;
use ash::vk::Handle;

use crate::{foundation::device::GfxDevice, swapchain::surface::GfxSurface};

/// 创建 swapchain 时的偏好设置，不满足时会自动回退
#[derive(Copy, Clone, Debug)]
pub struct GfxSwapchainPreference {
    pub present_mode: vk::PresentModeKHR,
    pub surface_format: vk::SurfaceFormatKHR,
}

pub struct GfxSwapchain {
    swapchain_handle: vk::SwapchainKHR,
    device: Rc<GfxDevice>,

    swapchain_images: Vec<vk::Image>,

    surface_format: vk::SurfaceFormatKHR,
    swapchain_extent: vk::Extent2D,
}

// 创建
impl GfxSwapchain {
    /// # param
    /// * window_physical_extent - 只有当 surface 的 current extent 为 0xFFFFFFFF 时才会使用
    pub fn new(
        device: Rc<GfxDevice>,
        surface: &GfxSurface,
        pdevice: vk::PhysicalDevice,
        preference: GfxSwapchainPreference,
        window_physical_extent: vk::Extent2D,
    ) -> anyhow::Result<Self> {
        let surface_capabilities =
            surface.get_capabilities(pdevice).context("failed to query surface capabilities")?;
        let surface_formats = surface.get_formats(pdevice).context("failed to query surface formats")?;
        let present_modes = surface.get_present_modes(pdevice).context("failed to query present modes")?;

        let surface_format = choose_surface_format(&surface_formats, preference.surface_format)
            .context("surface reports no supported format")?;
        let present_mode = choose_present_mode(&present_modes, preference.present_mode);
        let image_count = choose_image_count(&surface_capabilities);

        // 如果 surface_capabilities.current_extent 包含特殊值 0xFFFFFFFF，则表示可以自己设置交换链的 extent
        let extent = calculate_swapchain_extent(&surface_capabilities, window_physical_extent);
        log::info!(
            "create swapchain:
            surface current extent: {}x{}, min extent: {}x{}, max extent: {}x{}
            window physical extent: {}x{}
            final swapchain extent: {}x{}, image count: {}, present mode: {:?}, format: {:?}",
            surface_capabilities.current_extent.width,
            surface_capabilities.current_extent.height,
            surface_capabilities.min_image_extent.width,
            surface_capabilities.min_image_extent.height,
            surface_capabilities.max_image_extent.width,
            surface_capabilities.max_image_extent.height,
            window_physical_extent.width,
            window_physical_extent.height,
            extent.width,
            extent.height,
            image_count,
            present_mode,
            surface_format.format,
        );

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            // TRANSFER_DST 用于 Nsight 分析
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .pre_transform(surface_capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .clipped(true);

        let swapchain_handle =
            unsafe { device.swapchain().create_swapchain(&create_info, None) }.context("failed to create swapchain")?;
        device.set_object_debug_name(swapchain_handle, "GfxSwapchain::main");

        let swapchain_images = match unsafe { device.swapchain().get_swapchain_images(swapchain_handle) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { device.swapchain().destroy_swapchain(swapchain_handle, None) };
                return Err(e).context("failed to get swapchain images");
            }
        };
        for (idx, image) in swapchain_images.iter().enumerate() {
            device.set_object_debug_name(*image, format!("GfxSwapchain::image-{idx}"));
        }

        Ok(Self {
            swapchain_handle,
            device,
            swapchain_images,
            surface_format,
            swapchain_extent: extent,
        })
    }

    pub fn destroy(mut self) {
        log::info!("destroying GfxSwapchain");
        unsafe {
            self.device.swapchain().destroy_swapchain(self.swapchain_handle, None);
        }
        self.swapchain_handle = vk::SwapchainKHR::null();
    }
}

// getters
impl GfxSwapchain {
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain_handle
    }

    #[inline]
    pub fn images(&self) -> &[vk::Image] {
        &self.swapchain_images
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain_extent
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }
}

// update
impl GfxSwapchain {
    /// 不阻塞 CPU，image 可用时 signal `semaphore`
    ///
    /// return: (image index, is suboptimal)
    #[inline]
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> VkResult<(u32, bool)> {
        unsafe {
            self.device.swapchain().acquire_next_image(
                self.swapchain_handle,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        }
    }

    /// return: is suboptimal
    #[inline]
    pub fn present_image(&self, queue: vk::Queue, image_index: u32, wait_semaphore: vk::Semaphore) -> VkResult<bool> {
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .image_indices(&image_indices)
            .swapchains(std::slice::from_ref(&self.swapchain_handle));

        unsafe { self.device.swapchain().queue_present(queue, &present_info) }
    }
}

impl Drop for GfxSwapchain {
    fn drop(&mut self) {
        debug_assert!(self.swapchain_handle.is_null(), "GfxSwapchain must be destroyed manually.");
    }
}

/// max_image_count == 0，表示不限制 image 数量
pub fn choose_image_count(surface_capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = surface_capabilities.min_image_count + 1;
    if surface_capabilities.max_image_count == 0 {
        desired
    } else {
        u32::min(surface_capabilities.max_image_count, desired)
    }
}

/// preferred → MAILBOX → FIFO，FIFO 是所有实现都必须支持的
pub fn choose_present_mode(available: &[vk::PresentModeKHR], preferred: vk::PresentModeKHR) -> vk::PresentModeKHR {
    [preferred, vk::PresentModeKHR::MAILBOX]
        .into_iter()
        .find(|mode| available.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

pub fn choose_surface_format(
    available: &[vk::SurfaceFormatKHR],
    preferred: vk::SurfaceFormatKHR,
) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|f| f.format == preferred.format && f.color_space == preferred.color_space)
        .or_else(|| available.first())
        .copied()
}

/// 确定 window 的 extent 尺寸
///
/// 如果 surface_capabilities.current_extent 包含特殊值 0xFFFFFFFF，则表示可以自己设置交换链的 extent
pub fn calculate_swapchain_extent(
    surface_capabilities: &vk::SurfaceCapabilitiesKHR,
    window_physical_extent: vk::Extent2D,
) -> vk::Extent2D {
    let surface_extent = surface_capabilities.current_extent;
    if surface_extent.width == 0xFFFFFFFF || surface_extent.height == 0xFFFFFFFF {
        let width = window_physical_extent
            .width
            .clamp(surface_capabilities.min_image_extent.width, surface_capabilities.max_image_extent.width);
        let height = window_physical_extent
            .height
            .clamp(surface_capabilities.min_image_extent.height, surface_capabilities.max_image_extent.height);
        vk::Extent2D { width, height }
    } else {
        surface_extent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            ..Default::default()
        }
    }

    #[test]
    fn test_image_count_clamped_to_max() {
        assert_eq!(choose_image_count(&caps(2, 0)), 3);
        assert_eq!(choose_image_count(&caps(2, 8)), 3);
        assert_eq!(choose_image_count(&caps(2, 2)), 2);
    }

    #[test]
    fn test_present_mode_fallback_chain() {
        let all = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(choose_present_mode(&all, vk::PresentModeKHR::IMMEDIATE), vk::PresentModeKHR::IMMEDIATE);

        let no_immediate = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&no_immediate, vk::PresentModeKHR::IMMEDIATE), vk::PresentModeKHR::MAILBOX);

        let fifo_only = [vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&fifo_only, vk::PresentModeKHR::IMMEDIATE), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_surface_format_prefers_match_then_first() {
        let srgb = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let unorm = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };

        assert_eq!(choose_surface_format(&[unorm, srgb], srgb).unwrap().format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(choose_surface_format(&[unorm], srgb).unwrap().format, vk::Format::R8G8B8A8_UNORM);
        assert!(choose_surface_format(&[], srgb).is_none());
    }

    #[test]
    fn test_extent_uses_window_size_only_when_undefined() {
        let mut capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 1024,
                height: 1024,
            },
            ..Default::default()
        };
        let window = vk::Extent2D {
            width: 2000,
            height: 500,
        };
        assert_eq!(calculate_swapchain_extent(&capabilities, window).width, 800);

        capabilities.current_extent = vk::Extent2D {
            width: 0xFFFFFFFF,
            height: 0xFFFFFFFF,
        };
        let extent = calculate_swapchain_extent(&capabilities, window);
        assert_eq!((extent.width, extent.height), (1024, 500));
    }
}
