use std::rc::Rc;

use anyhow::Context;
use ash::vk;
use ash::vk::Handle;
use vk_mem::{Alloc, Allocation};

use crate::foundation::{debug_messenger::DebugType, device::GfxDevice, mem_allocator::GfxMemAllocator};

/// 由 vma 分配的 2D image
///
/// swapchain image 不使用这个类型，它们的生命周期归 swapchain 管理
pub struct GfxImage {
    handle: vk::Image,
    allocation: Option<Allocation>,
    allocator: Rc<GfxMemAllocator>,
}

// getters
impl GfxImage {
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }
}

// 创建与销毁
impl GfxImage {
    pub fn new(
        device: &GfxDevice,
        allocator: Rc<GfxMemAllocator>,
        image_info: &GfxImageCreateInfo,
        alloc_info: &vk_mem::AllocationCreateInfo,
        debug_name: &str,
    ) -> anyhow::Result<Self> {
        let (image, allocation) = unsafe { allocator.create_image(&image_info.as_info(), alloc_info) }
            .with_context(|| format!("failed to allocate image {debug_name}"))?;

        let image = Self {
            handle: image,
            allocation: Some(allocation),
            allocator,
        };
        device.set_debug_name(&image, debug_name);
        Ok(image)
    }

    pub fn destroy(mut self) {
        self.destroy_mut();
    }

    /// 重复调用是安全的
    pub fn destroy_mut(&mut self) {
        if let Some(mut allocation) = self.allocation.take() {
            unsafe {
                self.allocator.destroy_image(self.handle, &mut allocation);
            }
        }
        self.handle = vk::Image::null();
    }
}

impl DebugType for GfxImage {
    fn debug_type_name() -> &'static str {
        "GfxImage"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

impl Drop for GfxImage {
    fn drop(&mut self) {
        debug_assert!(self.handle.is_null(), "GfxImage must be destroyed manually.");
    }
}

#[inline]
fn extent_3d(extent: vk::Extent2D) -> vk::Extent3D {
    vk::Extent3D {
        width: extent.width,
        height: extent.height,
        depth: 1,
    }
}

pub struct GfxImageCreateInfo {
    extent: vk::Extent3D,
    format: vk::Format,
    usage: vk::ImageUsageFlags,
    samples: vk::SampleCountFlags,
    mip_levels: u32,
    array_layers: u32,
}

impl GfxImageCreateInfo {
    pub fn new_image_2d_info(extent: vk::Extent2D, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        Self {
            extent: extent_3d(extent),
            format,
            usage,
            samples: vk::SampleCountFlags::TYPE_1,
            mip_levels: 1,
            array_layers: 1,
        }
    }

    /// builder
    #[inline]
    pub fn mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels.max(1);
        self
    }

    /// builder
    #[inline]
    pub fn array_layers(mut self, array_layers: u32) -> Self {
        self.array_layers = array_layers.max(1);
        self
    }

    /// builder
    #[inline]
    pub fn samples(mut self, samples: vk::SampleCountFlags) -> Self {
        self.samples = samples;
        self
    }

    pub fn as_info(&self) -> vk::ImageCreateInfo<'_> {
        vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(self.format)
            .extent(self.extent)
            .mip_levels(self.mip_levels)
            .array_layers(self.array_layers)
            .samples(self.samples)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(self.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_2d_info_defaults() {
        let info = GfxImageCreateInfo::new_image_2d_info(
            vk::Extent2D {
                width: 16,
                height: 8,
            },
            vk::Format::D32_SFLOAT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        )
        .mip_levels(0);
        let ci = info.as_info();
        assert_eq!(ci.extent.depth, 1);
        assert_eq!(ci.mip_levels, 1);
        assert_eq!(ci.array_layers, 1);
        assert_eq!(ci.initial_layout, vk::ImageLayout::UNDEFINED);
    }
}
