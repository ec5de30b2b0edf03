use ash::vk;
use itertools::Itertools;

/// 对 `vk::SubmitInfo2` 的封装，自己持有各个数组
///
/// 调用 `submit_info()` 时才组装出引用内部数组的 `vk::SubmitInfo2`
#[derive(Default)]
pub struct GfxSubmitInfo {
    command_buffers: Vec<vk::CommandBufferSubmitInfo<'static>>,
    wait_infos: Vec<vk::SemaphoreSubmitInfo<'static>>,
    signal_infos: Vec<vk::SemaphoreSubmitInfo<'static>>,
}

impl GfxSubmitInfo {
    pub fn new(commands: &[vk::CommandBuffer]) -> Self {
        let command_buffers =
            commands.iter().map(|cmd| vk::CommandBufferSubmitInfo::default().command_buffer(*cmd)).collect_vec();

        Self {
            command_buffers,
            wait_infos: vec![],
            signal_infos: vec![],
        }
    }

    #[inline]
    pub fn submit_info(&self) -> vk::SubmitInfo2<'_> {
        vk::SubmitInfo2::default()
            .command_buffer_infos(&self.command_buffers)
            .wait_semaphore_infos(&self.wait_infos)
            .signal_semaphore_infos(&self.signal_infos)
    }

    /// # param
    /// * value - 只有 timeline semaphore 才需要
    #[inline]
    pub fn wait(mut self, semaphore: vk::Semaphore, stage: vk::PipelineStageFlags2, value: Option<u64>) -> Self {
        self.wait_infos.push(
            vk::SemaphoreSubmitInfo::default()
                .semaphore(semaphore)
                .stage_mask(stage)
                .value(value.unwrap_or_default()),
        );
        self
    }

    #[inline]
    pub fn signal(mut self, semaphore: vk::Semaphore, stage: vk::PipelineStageFlags2, value: Option<u64>) -> Self {
        self.signal_infos.push(
            vk::SemaphoreSubmitInfo::default()
                .semaphore(semaphore)
                .stage_mask(stage)
                .value(value.unwrap_or_default()),
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use ash::vk::Handle;

    use super::*;

    #[test]
    fn test_submit_info_counts() {
        let cmd = vk::CommandBuffer::from_raw(1);
        let info = GfxSubmitInfo::new(&[cmd])
            .wait(vk::Semaphore::from_raw(2), vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, None)
            .signal(vk::Semaphore::from_raw(3), vk::PipelineStageFlags2::ALL_COMMANDS, None);

        let submit = info.submit_info();
        assert_eq!(submit.command_buffer_info_count, 1);
        assert_eq!(submit.wait_semaphore_info_count, 1);
        assert_eq!(submit.signal_semaphore_info_count, 1);
    }

    #[test]
    fn test_wait_stage_is_recorded() {
        let info = GfxSubmitInfo::new(&[]).wait(
            vk::Semaphore::from_raw(7),
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            Some(5),
        );
        assert_eq!(info.wait_infos[0].stage_mask, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(info.wait_infos[0].value, 5);
        assert!(info.signal_infos.is_empty());
    }
}
