use crate::handle::{CommandBufferHandle, TextureHandle};

/// 同时在 GPU 上执行的帧数上限，实际值还会受 swapchain image 数量限制
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// `begin_frame` 的结果，交给 `submit_and_present_frame` 消耗
///
/// 不实现 Clone/Copy：应用层同一时间只能持有一个帧。
/// 有效的帧必须提交，直接丢弃会让 ring 停在录制状态，之后的 `begin_frame` 都返回 null
#[must_use = "a begun frame must be passed to submit_and_present_frame"]
#[derive(Debug)]
pub struct FrameContext {
    command_buffer: CommandBufferHandle,
    backbuffer: TextureHandle,
    extent: (u32, u32),

    image_index: u32,
    frame_index: u32,
}

impl FrameContext {
    pub(crate) fn new(
        command_buffer: CommandBufferHandle,
        backbuffer: TextureHandle,
        extent: (u32, u32),
        image_index: u32,
        frame_index: u32,
    ) -> Self {
        Self {
            command_buffer,
            backbuffer,
            extent,
            image_index,
            frame_index,
        }
    }

    pub fn null() -> Self {
        Self::new(CommandBufferHandle::null(), TextureHandle::null(), (0, 0), 0, 0)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.command_buffer.is_valid() && self.backbuffer.is_valid()
    }

    #[inline]
    pub fn command_buffer(&self) -> CommandBufferHandle {
        self.command_buffer
    }

    /// 当前帧的 swapchain image
    #[inline]
    pub fn backbuffer(&self) -> TextureHandle {
        self.backbuffer
    }

    /// backbuffer 的 (width, height)
    #[inline]
    pub fn extent(&self) -> (u32, u32) {
        self.extent
    }

    #[inline]
    pub(crate) fn image_index(&self) -> u32 {
        self.image_index
    }

    #[inline]
    pub(crate) fn frame_index(&self) -> u32 {
        self.frame_index
    }
}

/// 一帧提交与呈现的结果
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PresentStatus {
    Presented,
    /// 已呈现，但 swapchain 与 surface 不再完全匹配
    Suboptimal,
    /// swapchain 已失效，需要宿主重建设备
    OutOfDate,
    Failed,
}

impl PresentStatus {
    #[inline]
    pub fn needs_recreate(self) -> bool {
        matches!(self, Self::Suboptimal | Self::OutOfDate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::Handle;

    #[test]
    fn test_null_frame_is_invalid() {
        assert!(!FrameContext::null().is_valid());
    }

    #[test]
    fn test_frame_requires_both_handles() {
        let half = FrameContext::new(Handle::new(0, 0), TextureHandle::null(), (1, 1), 0, 0);
        assert!(!half.is_valid());

        let full = FrameContext::new(Handle::new(0, 0), Handle::new(2, 0), (640, 480), 2, 1);
        assert!(full.is_valid());
        assert_eq!(full.image_index(), 2);
        assert_eq!(full.frame_index(), 1);
        assert_eq!(full.extent(), (640, 480));
    }

    #[test]
    fn test_present_status_recreate() {
        assert!(PresentStatus::OutOfDate.needs_recreate());
        assert!(PresentStatus::Suboptimal.needs_recreate());
        assert!(!PresentStatus::Presented.needs_recreate());
        assert!(!PresentStatus::Failed.needs_recreate());
    }
}
