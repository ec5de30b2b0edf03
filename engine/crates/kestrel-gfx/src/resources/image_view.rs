use std::rc::Rc;

use anyhow::Context;
use ash::vk;
use ash::vk::Handle;

use crate::foundation::{debug_messenger::DebugType, device::GfxDevice};

#[derive(Clone, Debug)]
pub struct GfxImageViewDesc {
    format: vk::Format,
    view_type: vk::ImageViewType,
    aspect_mask: vk::ImageAspectFlags,
    /// (base mip level, level count)
    mip: (u8, u8),
    /// (base array layer, layer count)
    layers: (u32, u32),
}

impl GfxImageViewDesc {
    #[inline]
    pub fn new_2d(format: vk::Format, aspect_mask: vk::ImageAspectFlags) -> Self {
        Self {
            format,
            view_type: vk::ImageViewType::TYPE_2D,
            aspect_mask,
            mip: (0, 1),
            layers: (0, 1),
        }
    }

    /// builder
    #[inline]
    pub fn layers(mut self, base_layer: u32, layer_count: u32) -> Self {
        self.layers = (base_layer, layer_count.max(1));
        if layer_count > 1 {
            self.view_type = vk::ImageViewType::TYPE_2D_ARRAY;
        }
        self
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn aspect_mask(&self) -> vk::ImageAspectFlags {
        self.aspect_mask
    }
}

pub struct GfxImageView {
    handle: vk::ImageView,
    desc: GfxImageViewDesc,
    device: Rc<GfxDevice>,
}

impl DebugType for GfxImageView {
    fn debug_type_name() -> &'static str {
        "GfxImageView"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

// 创建与销毁
impl GfxImageView {
    pub fn new(
        device: Rc<GfxDevice>,
        image: vk::Image,
        view_desc: GfxImageViewDesc,
        name: impl AsRef<str>,
    ) -> anyhow::Result<Self> {
        let info = vk::ImageViewCreateInfo {
            image,
            view_type: view_desc.view_type,
            format: view_desc.format,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: view_desc.aspect_mask,
                base_mip_level: view_desc.mip.0 as u32,
                level_count: view_desc.mip.1 as u32,
                base_array_layer: view_desc.layers.0,
                layer_count: view_desc.layers.1,
            },
            ..Default::default()
        };

        let handle = unsafe { device.create_image_view(&info, None) }
            .with_context(|| format!("failed to create image view {}", name.as_ref()))?;
        let image_view = Self {
            handle,
            desc: view_desc,
            device,
        };
        image_view.device.set_debug_name(&image_view, name);
        Ok(image_view)
    }

    pub fn destroy(mut self) {
        self.destroy_mut();
    }

    pub fn destroy_mut(&mut self) {
        if self.handle.is_null() {
            return;
        }
        unsafe {
            self.device.destroy_image_view(self.handle, None);
        }
        self.handle = vk::ImageView::null();
    }
}

impl Drop for GfxImageView {
    fn drop(&mut self) {
        debug_assert!(self.handle.is_null(), "GfxImageView must be destroyed manually.");
    }
}

// getters
impl GfxImageView {
    #[inline]
    pub fn handle(&self) -> vk::ImageView {
        self.handle
    }

    #[inline]
    pub fn desc(&self) -> &GfxImageViewDesc {
        &self.desc
    }
}
