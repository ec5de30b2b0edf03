use std::rc::Rc;

use anyhow::Context;
use ash::vk;
use itertools::Itertools;

use crate::{commands::submit_info::GfxSubmitInfo, foundation::device::GfxDevice};

/// 设备上唯一的 graphics + present queue
pub struct GfxCommandQueue {
    vk_queue: vk::Queue,
    queue_family_index: u32,
    device: Rc<GfxDevice>,
}

impl GfxCommandQueue {
    /// 取得 device 创建时在 `queue_family_index` 上申请的第 0 个 queue
    pub fn new(device: Rc<GfxDevice>, queue_family_index: u32) -> Self {
        let vk_queue = unsafe { device.get_device_queue(queue_family_index, 0) };
        device.set_object_debug_name(vk_queue, "GfxCommandQueue::graphics");
        Self {
            vk_queue,
            queue_family_index,
            device,
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::Queue {
        self.vk_queue
    }

    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// # param
    /// * fence - 全部 command 执行完成后 signal，可以为 null
    pub fn submit(&self, batches: &[GfxSubmitInfo], fence: vk::Fence) -> anyhow::Result<()> {
        let submit_infos = batches.iter().map(|b| b.submit_info()).collect_vec();
        unsafe { self.device.queue_submit2(self.vk_queue, &submit_infos, fence) }.context("failed to submit queue")
    }

    pub fn wait_idle(&self) {
        if let Err(e) = unsafe { self.device.queue_wait_idle(self.vk_queue) } {
            log::error!("failed to wait queue idle: {:?}", e);
        }
    }
}
