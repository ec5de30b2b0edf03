use std::rc::Rc;

use anyhow::Context;
use ash::vk;

use crate::foundation::{debug_messenger::DebugType, device::GfxDevice};

/// binary semaphore
///
/// # Destroy
/// 不实现 Drop，需要手动 destroy
pub struct GfxSemaphore {
    semaphore: vk::Semaphore,
    device: Rc<GfxDevice>,
}

// 创建与销毁
impl GfxSemaphore {
    pub fn new(device: Rc<GfxDevice>, debug_name: &str) -> anyhow::Result<Self> {
        let semaphore = unsafe { device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
            .with_context(|| format!("failed to create semaphore {debug_name}"))?;

        let semaphore = Self { semaphore, device };
        semaphore.device.set_debug_name(&semaphore, debug_name);
        Ok(semaphore)
    }

    #[inline]
    pub fn destroy(self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

// getters
impl GfxSemaphore {
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl DebugType for GfxSemaphore {
    fn debug_type_name() -> &'static str {
        "GfxSemaphore"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.semaphore
    }
}
