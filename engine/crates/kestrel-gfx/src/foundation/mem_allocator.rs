use std::ops::Deref;

use anyhow::Context;
use ash::vk;

pub struct GfxMemAllocator {
    inner: vk_mem::Allocator,
}

impl GfxMemAllocator {
    /// vma 在创建时会拷贝 instance 以及 device 的函数指针，
    /// 但仍然要求在 allocator 销毁之前，这两个对象一直有效。
    /// 因此 allocator 需要在 device 之后创建，在 device 之前销毁。
    pub fn new(instance: &ash::Instance, pdevice: vk::PhysicalDevice, device: &ash::Device) -> anyhow::Result<Self> {
        let mut vma_ci = vk_mem::AllocatorCreateInfo::new(instance, device, pdevice);
        vma_ci.vulkan_api_version = vk::API_VERSION_1_3;

        let vma = unsafe { vk_mem::Allocator::new(vma_ci) }.context("failed to create vma allocator")?;
        log::trace!("vma allocator created");

        Ok(Self { inner: vma })
    }

    /// 通过 drop 触发销毁；外部以 `Rc` 持有时，最后一个引用释放才真正销毁
    pub fn destroy(self) {
        log::info!("destroying GfxMemAllocator");
    }
}

impl Deref for GfxMemAllocator {
    type Target = vk_mem::Allocator;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
