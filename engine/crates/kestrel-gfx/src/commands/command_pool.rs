use std::rc::Rc;

use anyhow::Context;
use ash::vk;

use crate::foundation::{debug_messenger::DebugType, device::GfxDevice};

/// command pool 是和 queue family 绑定的，而不是和 queue 绑定的
///
/// # Destroy
/// 需要手动 destroy，drop 时会检查
pub struct GfxCommandPool {
    handle: vk::CommandPool,
    queue_family_index: u32,
    device: Rc<GfxDevice>,

    valid: bool,
}

// 创建与销毁
impl GfxCommandPool {
    pub fn new(
        device: Rc<GfxDevice>,
        queue_family_index: u32,
        flags: vk::CommandPoolCreateFlags,
        debug_name: &str,
    ) -> anyhow::Result<Self> {
        let handle = unsafe {
            device.create_command_pool(
                &vk::CommandPoolCreateInfo::default().queue_family_index(queue_family_index).flags(flags),
                None,
            )
        }
        .with_context(|| format!("failed to create command pool {debug_name}"))?;

        let command_pool = Self {
            handle,
            queue_family_index,
            device,
            valid: true,
        };
        command_pool.device.set_debug_name(&command_pool, debug_name);
        Ok(command_pool)
    }

    pub fn destroy(mut self) {
        unsafe {
            self.device.destroy_command_pool(self.handle, None);
        }
        self.valid = false;
    }
}

// getters
impl GfxCommandPool {
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.handle
    }

    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    #[inline]
    pub fn device(&self) -> &Rc<GfxDevice> {
        &self.device
    }
}

// tools
impl GfxCommandPool {
    /// 释放之后，command buffer 不能再被使用
    pub fn free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]) {
        if command_buffers.is_empty() {
            return;
        }
        unsafe {
            self.device.free_command_buffers(self.handle, command_buffers);
        }
    }
}

impl DebugType for GfxCommandPool {
    fn debug_type_name() -> &'static str {
        "GfxCommandPool"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

impl Drop for GfxCommandPool {
    fn drop(&mut self) {
        debug_assert!(!self.valid, "GfxCommandPool must be destroyed manually.");
    }
}
