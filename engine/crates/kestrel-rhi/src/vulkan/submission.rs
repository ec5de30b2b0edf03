//! 帧的提交与同步
//!
//! 每个 frame in flight 占用 ring 中的一个 slot：一个 command buffer、一个 acquire semaphore、
//! 一个创建时就 signaled 的 fence。present semaphore 按 swapchain image 分配。

use std::rc::Rc;

use anyhow::Context;
use ash::vk;
use itertools::Itertools;
use kestrel_gfx::commands::command_buffer::GfxCommandBuffer;
use kestrel_gfx::commands::command_pool::GfxCommandPool;
use kestrel_gfx::commands::command_queue::GfxCommandQueue;
use kestrel_gfx::commands::fence::GfxFence;
use kestrel_gfx::commands::semaphore::GfxSemaphore;
use kestrel_gfx::commands::submit_info::GfxSubmitInfo;
use kestrel_gfx::foundation::device::GfxDevice;
use kestrel_gfx::swapchain::render_swapchain::GfxSwapchain;

use crate::frame::{MAX_FRAMES_IN_FLIGHT, PresentStatus};
use crate::handle::{CommandBufferHandle, CommandBufferTag};
use crate::resource_pool::ResourcePool;
use crate::types::TextureLayout;

/// ring 的长度不超过 swapchain image 的数量
pub fn frames_in_flight_for(image_count: usize) -> usize {
    MAX_FRAMES_IN_FLIGHT.min(image_count).max(1)
}

/// 已经开始录制的一帧
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BegunFrame {
    pub slot: usize,
    pub image_index: u32,
}

/// 帧循环中与 GPU 交互的每一步
///
/// `FrameRing` 只负责这些步骤的顺序，便于在没有 GPU 的情况下测试
pub trait FrameSyncOps {
    /// 阻塞，直到该 slot 上一次提交的工作完成
    fn wait_fence(&mut self, slot: usize) -> anyhow::Result<()>;
    /// image 可用时 signal 该 slot 的 acquire semaphore
    fn acquire_image(&mut self, slot: usize) -> anyhow::Result<u32>;
    fn reset_fence(&mut self, slot: usize) -> anyhow::Result<()>;
    fn begin_recording(&mut self, slot: usize) -> anyhow::Result<()>;
    fn end_recording(&mut self, slot: usize) -> anyhow::Result<()>;
    fn submit(&mut self, slot: usize, image_index: u32) -> anyhow::Result<()>;
    /// 不带 command buffer 的提交：消耗 acquire semaphore，`signal_fence` 时同时 signal fence
    ///
    /// 录制或提交失败后使用，否则下一次等待该 slot 时会永远阻塞。
    /// fence 没有 reset 成功时仍是 signaled，不能再交给提交
    fn release_acquire(&mut self, slot: usize, signal_fence: bool) -> anyhow::Result<()>;
    fn present(&mut self, slot: usize, image_index: u32) -> PresentStatus;
}

/// frame in flight 的环形调度
#[derive(Debug)]
pub struct FrameRing {
    frames_in_flight: usize,
    current_slot: usize,
    frame_counter: u64,
    open_frame: Option<BegunFrame>,
}

impl FrameRing {
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            frames_in_flight: frames_in_flight.max(1),
            current_slot: 0,
            frame_counter: 0,
            open_frame: None,
        }
    }

    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    #[inline]
    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    /// 已经完整走完提交流程的帧数
    #[inline]
    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// 正在录制的帧
    #[inline]
    pub fn open_frame(&self) -> Option<BegunFrame> {
        self.open_frame
    }

    /// wait fence → acquire → reset fence → begin recording
    ///
    /// 任何一步失败都返回 None，且不会让 slot 的 fence 停留在 unsignaled 状态
    pub fn begin(&mut self, ops: &mut impl FrameSyncOps) -> Option<BegunFrame> {
        if let Some(frame) = self.open_frame {
            log::error!("frame on slot {} is still recording, submit it before beginning a new one", frame.slot);
            return None;
        }

        let slot = self.current_slot;
        if let Err(e) = ops.wait_fence(slot) {
            log::error!("failed to wait frame fence of slot {slot}: {e:#}");
            return None;
        }

        let image_index = match ops.acquire_image(slot) {
            Ok(image_index) => image_index,
            Err(e) => {
                // fence 没有 reset，下一次 wait 直接通过
                log::warn!("failed to acquire swapchain image: {e:#}");
                return None;
            }
        };

        // acquire semaphore 此时已经(将要) signaled，之后的失败都需要 release_acquire 收尾
        if let Err(e) = ops.reset_fence(slot) {
            log::error!("failed to reset frame fence of slot {slot}: {e:#}");
            self.recover(ops, slot, false);
            return None;
        }
        if let Err(e) = ops.begin_recording(slot) {
            log::error!("failed to begin frame on slot {slot}: {e:#}");
            self.recover(ops, slot, true);
            return None;
        }

        let frame = BegunFrame { slot, image_index };
        self.open_frame = Some(frame);
        Some(frame)
    }

    /// end recording → submit → present，最后推进 ring
    ///
    /// 提交失败时跳过 present
    pub fn finish(&mut self, ops: &mut impl FrameSyncOps, frame: BegunFrame) -> PresentStatus {
        if self.open_frame != Some(frame) {
            log::error!("frame {:?} does not belong to the current ring position", frame);
            return PresentStatus::Failed;
        }
        self.open_frame = None;

        let slot = frame.slot;
        let submitted = ops
            .end_recording(slot)
            .and_then(|_| ops.submit(slot, frame.image_index));
        if let Err(e) = submitted {
            log::error!("failed to submit frame on slot {slot}: {e:#}");
            self.recover(ops, slot, true);
            self.advance();
            return PresentStatus::Failed;
        }

        let status = ops.present(slot, frame.image_index);
        self.advance();
        status
    }

    fn recover(&self, ops: &mut impl FrameSyncOps, slot: usize, fence_reset: bool) {
        if let Err(e) = ops.release_acquire(slot, fence_reset) {
            log::error!("failed to release slot {slot} after a failed frame: {e:#}");
        }
    }

    fn advance(&mut self) {
        self.current_slot = (self.current_slot + 1) % self.frames_in_flight;
        self.frame_counter += 1;
    }
}

/// 每个 swapchain image 当前所处的 layout
///
/// 第一次使用时是 Undefined，之后每一帧结束时都是 Present
#[derive(Debug)]
pub struct SwapchainImageLayouts {
    layouts: Vec<TextureLayout>,
}

impl SwapchainImageLayouts {
    pub fn new(image_count: usize) -> Self {
        Self {
            layouts: vec![TextureLayout::Undefined; image_count],
        }
    }

    #[inline]
    pub fn layout(&self, image_index: u32) -> Option<TextureLayout> {
        self.layouts.get(image_index as usize).copied()
    }

    /// 帧开始时的转换：(old, new)
    pub fn begin_frame(&mut self, image_index: u32) -> Option<(TextureLayout, TextureLayout)> {
        self.transition(image_index, TextureLayout::ColorAttachment)
    }

    /// 帧结束时的转换：(old, new)
    pub fn end_frame(&mut self, image_index: u32) -> Option<(TextureLayout, TextureLayout)> {
        self.transition(image_index, TextureLayout::Present)
    }

    /// 该帧录制的 barrier 没有被执行，image 的内容与 layout 都不再可信
    pub fn invalidate(&mut self, image_index: u32) {
        if let Some(layout) = self.layouts.get_mut(image_index as usize) {
            *layout = TextureLayout::Undefined;
        }
    }

    fn transition(&mut self, image_index: u32, new_layout: TextureLayout) -> Option<(TextureLayout, TextureLayout)> {
        let layout = self.layouts.get_mut(image_index as usize)?;
        let old_layout = std::mem::replace(layout, new_layout);
        Some((old_layout, new_layout))
    }
}

/// ring 中一个 slot 持有的同步对象
pub struct FrameSlot {
    pub command_buffer: CommandBufferHandle,
    pub in_flight_fence: GfxFence,
    pub image_available: GfxSemaphore,
}

/// 全部的帧同步对象
pub struct SubmissionContext {
    slots: Vec<FrameSlot>,
    /// 按 swapchain image 索引
    present_semaphores: Vec<GfxSemaphore>,
}

// 创建与销毁
impl SubmissionContext {
    pub fn new(
        device: &Rc<GfxDevice>,
        command_pool: &GfxCommandPool,
        command_buffers: &mut ResourcePool<CommandBufferTag, GfxCommandBuffer>,
        frames_in_flight: usize,
        swapchain_image_count: usize,
    ) -> anyhow::Result<Self> {
        let mut context = Self {
            slots: Vec::with_capacity(frames_in_flight),
            present_semaphores: Vec::with_capacity(swapchain_image_count),
        };

        // 中途失败时，已经创建的对象由 destroy 负责回收
        if let Err(e) = context.create_objects(device, command_pool, command_buffers, frames_in_flight, swapchain_image_count)
        {
            context.destroy(command_buffers);
            return Err(e);
        }
        Ok(context)
    }

    fn create_objects(
        &mut self,
        device: &Rc<GfxDevice>,
        command_pool: &GfxCommandPool,
        command_buffers: &mut ResourcePool<CommandBufferTag, GfxCommandBuffer>,
        frames_in_flight: usize,
        swapchain_image_count: usize,
    ) -> anyhow::Result<()> {
        for slot in 0..frames_in_flight {
            let command_buffer = GfxCommandBuffer::new(command_pool, &format!("frame-{slot}"))?;
            let command_buffer = command_buffers.allocate(command_buffer);
            let in_flight_fence = match GfxFence::new(device.clone(), true, &format!("frame-{slot}-in-flight")) {
                Ok(fence) => fence,
                Err(e) => {
                    command_buffers.free(command_buffer);
                    return Err(e);
                }
            };
            let image_available = match GfxSemaphore::new(device.clone(), &format!("frame-{slot}-image-available")) {
                Ok(semaphore) => semaphore,
                Err(e) => {
                    command_buffers.free(command_buffer);
                    in_flight_fence.destroy();
                    return Err(e);
                }
            };
            self.slots.push(FrameSlot {
                command_buffer,
                in_flight_fence,
                image_available,
            });
        }

        for image_index in 0..swapchain_image_count {
            self.present_semaphores
                .push(GfxSemaphore::new(device.clone(), &format!("swapchain-image-{image_index}-present"))?);
        }
        Ok(())
    }

    /// 调用前需要保证 GPU 已经 idle
    pub fn destroy(&mut self, command_buffers: &mut ResourcePool<CommandBufferTag, GfxCommandBuffer>) {
        for slot in self.slots.drain(..) {
            command_buffers.free(slot.command_buffer);
            slot.in_flight_fence.destroy();
            slot.image_available.destroy();
        }
        for semaphore in self.present_semaphores.drain(..) {
            semaphore.destroy();
        }
    }
}

// getters
impl SubmissionContext {
    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn slot(&self, slot: usize) -> &FrameSlot {
        &self.slots[slot]
    }

    pub fn command_buffer_handles(&self) -> Vec<CommandBufferHandle> {
        self.slots.iter().map(|slot| slot.command_buffer).collect_vec()
    }
}

/// `FrameSyncOps` 的 Vulkan 实现，只在一次 begin/finish 调用期间存在
pub struct VulkanFrameSync<'a> {
    pub submission: &'a SubmissionContext,
    pub command_buffers: &'a ResourcePool<CommandBufferTag, GfxCommandBuffer>,
    pub swapchain: &'a GfxSwapchain,
    pub queue: &'a GfxCommandQueue,
}

impl VulkanFrameSync<'_> {
    fn command_buffer(&self, slot: usize) -> anyhow::Result<&GfxCommandBuffer> {
        self.command_buffers
            .get(self.submission.slot(slot).command_buffer)
            .with_context(|| format!("command buffer of slot {slot} is gone"))
    }

    fn present_semaphore(&self, image_index: u32) -> anyhow::Result<&GfxSemaphore> {
        self.submission
            .present_semaphores
            .get(image_index as usize)
            .with_context(|| format!("no present semaphore for swapchain image {image_index}"))
    }
}

impl FrameSyncOps for VulkanFrameSync<'_> {
    fn wait_fence(&mut self, slot: usize) -> anyhow::Result<()> {
        self.submission.slot(slot).in_flight_fence.wait()
    }

    fn acquire_image(&mut self, slot: usize) -> anyhow::Result<u32> {
        let semaphore = self.submission.slot(slot).image_available.handle();
        match self.swapchain.acquire_next_image(semaphore) {
            Ok((image_index, suboptimal)) => {
                if suboptimal {
                    log::warn!("swapchain is suboptimal on acquire");
                }
                Ok(image_index)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => anyhow::bail!("swapchain is out of date"),
            Err(e) => Err(e).context("failed to acquire next swapchain image"),
        }
    }

    fn reset_fence(&mut self, slot: usize) -> anyhow::Result<()> {
        self.submission.slot(slot).in_flight_fence.reset()
    }

    fn begin_recording(&mut self, slot: usize) -> anyhow::Result<()> {
        self.command_buffer(slot)?
            .begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, &format!("frame-{slot}"))
    }

    fn end_recording(&mut self, slot: usize) -> anyhow::Result<()> {
        self.command_buffer(slot)?.end()
    }

    fn submit(&mut self, slot: usize, image_index: u32) -> anyhow::Result<()> {
        let frame_slot = self.submission.slot(slot);
        let submit_info = GfxSubmitInfo::new(&[self.command_buffer(slot)?.vk_handle()])
            .wait(
                frame_slot.image_available.handle(),
                vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                None,
            )
            .signal(
                self.present_semaphore(image_index)?.handle(),
                vk::PipelineStageFlags2::ALL_COMMANDS,
                None,
            );
        self.queue.submit(&[submit_info], frame_slot.in_flight_fence.handle())
    }

    fn release_acquire(&mut self, slot: usize, signal_fence: bool) -> anyhow::Result<()> {
        let frame_slot = self.submission.slot(slot);
        let submit_info = GfxSubmitInfo::new(&[]).wait(
            frame_slot.image_available.handle(),
            vk::PipelineStageFlags2::ALL_COMMANDS,
            None,
        );
        let fence = if signal_fence { frame_slot.in_flight_fence.handle() } else { vk::Fence::null() };
        self.queue.submit(&[submit_info], fence)
    }

    fn present(&mut self, _slot: usize, image_index: u32) -> PresentStatus {
        let semaphore = match self.present_semaphore(image_index) {
            Ok(semaphore) => semaphore.handle(),
            Err(e) => {
                log::error!("{e:#}");
                return PresentStatus::Failed;
            }
        };
        match self.swapchain.present_image(self.queue.handle(), image_index, semaphore) {
            Ok(false) => PresentStatus::Presented,
            Ok(true) => {
                log::warn!("swapchain is suboptimal on present");
                PresentStatus::Suboptimal
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("swapchain is out of date on present");
                PresentStatus::OutOfDate
            }
            Err(e) => {
                log::error!("failed to present swapchain image {image_index}: {:?}", e);
                PresentStatus::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 模拟 GPU：fence 记录最后一次提交到该 slot 的帧序号
    #[derive(Default)]
    struct FakeGpu {
        frames_in_flight: usize,
        /// slot -> 尚未完成的帧
        pending: Vec<Option<u64>>,
        /// 按完成顺序记录的帧序号
        completed: Vec<u64>,
        /// 每次 begin 等待 fence 时，已经完成的帧
        completed_at_wait: Vec<Vec<u64>>,
        submitted: u64,
        recording: Option<usize>,
        acquired_semaphore_pending: Vec<bool>,
        /// slot -> fence 处于 unsignaled 且还没有交给任何提交
        fence_reset: Vec<bool>,
        next_image: u32,
        image_count: u32,

        fail_acquire: bool,
        fail_reset: bool,
        fail_submit: bool,
        fail_begin: bool,
        present_status: Option<PresentStatus>,
        presented: Vec<u32>,
    }

    impl FakeGpu {
        fn new(frames_in_flight: usize, image_count: u32) -> Self {
            Self {
                frames_in_flight,
                pending: vec![None; frames_in_flight],
                acquired_semaphore_pending: vec![false; frames_in_flight],
                fence_reset: vec![false; frames_in_flight],
                image_count,
                ..Default::default()
            }
        }

        fn outstanding(&self) -> usize {
            self.pending.iter().filter(|p| p.is_some()).count()
        }
    }

    impl FrameSyncOps for FakeGpu {
        fn wait_fence(&mut self, slot: usize) -> anyhow::Result<()> {
            if let Some(frame) = self.pending[slot].take() {
                self.completed.push(frame);
            }
            self.completed_at_wait.push(self.completed.clone());
            Ok(())
        }

        fn acquire_image(&mut self, slot: usize) -> anyhow::Result<u32> {
            if self.fail_acquire {
                anyhow::bail!("out of date");
            }
            self.acquired_semaphore_pending[slot] = true;
            let image = self.next_image;
            self.next_image = (self.next_image + 1) % self.image_count;
            Ok(image)
        }

        fn reset_fence(&mut self, slot: usize) -> anyhow::Result<()> {
            if self.fail_reset {
                anyhow::bail!("reset failed");
            }
            self.fence_reset[slot] = true;
            Ok(())
        }

        fn begin_recording(&mut self, slot: usize) -> anyhow::Result<()> {
            if self.fail_begin {
                anyhow::bail!("begin failed");
            }
            assert!(self.recording.is_none());
            self.recording = Some(slot);
            Ok(())
        }

        fn end_recording(&mut self, slot: usize) -> anyhow::Result<()> {
            assert_eq!(self.recording.take(), Some(slot));
            Ok(())
        }

        fn submit(&mut self, slot: usize, _image_index: u32) -> anyhow::Result<()> {
            if self.fail_submit {
                anyhow::bail!("device lost");
            }
            assert!(self.pending[slot].is_none(), "slot reused before its fence signaled");
            assert!(std::mem::take(&mut self.fence_reset[slot]), "submitted with a signaled fence");
            self.acquired_semaphore_pending[slot] = false;
            self.pending[slot] = Some(self.submitted);
            self.submitted += 1;
            assert!(self.outstanding() <= self.frames_in_flight);
            Ok(())
        }

        fn release_acquire(&mut self, slot: usize, signal_fence: bool) -> anyhow::Result<()> {
            self.acquired_semaphore_pending[slot] = false;
            if signal_fence {
                assert!(std::mem::take(&mut self.fence_reset[slot]), "submitted with a signaled fence");
                self.pending[slot] = Some(self.submitted);
                self.submitted += 1;
            }
            Ok(())
        }

        fn present(&mut self, _slot: usize, image_index: u32) -> PresentStatus {
            self.presented.push(image_index);
            self.present_status.unwrap_or(PresentStatus::Presented)
        }
    }

    fn run_frame(ring: &mut FrameRing, gpu: &mut FakeGpu) -> PresentStatus {
        match ring.begin(gpu) {
            Some(frame) => ring.finish(gpu, frame),
            None => PresentStatus::Failed,
        }
    }

    #[test]
    fn test_frames_in_flight_bounded_by_images() {
        assert_eq!(frames_in_flight_for(3), 2);
        assert_eq!(frames_in_flight_for(2), 2);
        assert_eq!(frames_in_flight_for(1), 1);
        assert_eq!(frames_in_flight_for(0), 1);
    }

    #[test]
    fn test_frame_k_waits_for_frame_k_minus_n() {
        let n = 2;
        let mut ring = FrameRing::new(n);
        let mut gpu = FakeGpu::new(n, 3);

        for _ in 0..8 {
            assert_eq!(run_frame(&mut ring, &mut gpu), PresentStatus::Presented);
        }

        for (k, completed) in gpu.completed_at_wait.iter().enumerate() {
            if k >= n {
                assert!(completed.contains(&((k - n) as u64)), "frame {k} began before frame {} finished", k - n);
            }
            // 不需要等待更新的帧
            assert!(completed.iter().all(|&f| f + (n as u64) <= k as u64));
        }
        assert_eq!(ring.frame_counter(), 8);
        assert_eq!(gpu.presented, vec![0, 1, 2, 0, 1, 2, 0, 1]);
    }

    #[test]
    fn test_slot_rotation() {
        let mut ring = FrameRing::new(2);
        let mut gpu = FakeGpu::new(2, 2);
        let slots = (0..4)
            .map(|_| {
                let frame = ring.begin(&mut gpu).unwrap();
                ring.finish(&mut gpu, frame);
                frame.slot
            })
            .collect_vec();
        assert_eq!(slots, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_acquire_failure_keeps_slot() {
        let mut ring = FrameRing::new(2);
        let mut gpu = FakeGpu::new(2, 3);
        gpu.fail_acquire = true;

        assert!(ring.begin(&mut gpu).is_none());
        assert_eq!(ring.current_slot(), 0);
        assert_eq!(ring.frame_counter(), 0);
        assert!(ring.open_frame().is_none());

        // fence 没有被 reset，下一次 begin 不会阻塞
        gpu.fail_acquire = false;
        assert_eq!(run_frame(&mut ring, &mut gpu), PresentStatus::Presented);
    }

    #[test]
    fn test_begin_failure_signals_fence() {
        let mut ring = FrameRing::new(2);
        let mut gpu = FakeGpu::new(2, 3);
        gpu.fail_begin = true;

        assert!(ring.begin(&mut gpu).is_none());
        // acquire semaphore 已被消耗，fence 会被 signal
        assert!(!gpu.acquired_semaphore_pending[0]);
        assert!(gpu.pending[0].is_some());
        assert!(ring.open_frame().is_none());
    }

    #[test]
    fn test_reset_failure_releases_semaphore_without_fence() {
        let mut ring = FrameRing::new(2);
        let mut gpu = FakeGpu::new(2, 3);
        gpu.fail_reset = true;

        assert!(ring.begin(&mut gpu).is_none());
        assert!(!gpu.acquired_semaphore_pending[0]);
        // fence 仍是 signaled，没有任何提交引用它
        assert!(gpu.pending[0].is_none());
        assert_eq!(gpu.submitted, 0);
        assert_eq!(ring.current_slot(), 0);

        gpu.fail_reset = false;
        assert_eq!(run_frame(&mut ring, &mut gpu), PresentStatus::Presented);
    }

    #[test]
    fn test_submit_failure_skips_present_and_advances() {
        let mut ring = FrameRing::new(2);
        let mut gpu = FakeGpu::new(2, 3);
        gpu.fail_submit = true;

        assert_eq!(run_frame(&mut ring, &mut gpu), PresentStatus::Failed);
        assert!(gpu.presented.is_empty());
        assert_eq!(ring.current_slot(), 1);
        assert!(gpu.pending[0].is_some(), "fence of the failed slot must still be signaled");

        gpu.fail_submit = false;
        for _ in 0..3 {
            assert_eq!(run_frame(&mut ring, &mut gpu), PresentStatus::Presented);
        }
    }

    #[test]
    fn test_present_status_is_forwarded() {
        let mut ring = FrameRing::new(2);
        let mut gpu = FakeGpu::new(2, 2);
        gpu.present_status = Some(PresentStatus::OutOfDate);
        assert_eq!(run_frame(&mut ring, &mut gpu), PresentStatus::OutOfDate);
        assert_eq!(ring.frame_counter(), 1);
    }

    #[test]
    fn test_cannot_begin_twice_or_finish_foreign_frame() {
        let mut ring = FrameRing::new(2);
        let mut gpu = FakeGpu::new(2, 2);
        let frame = ring.begin(&mut gpu).unwrap();
        assert!(ring.begin(&mut gpu).is_none());

        let foreign = BegunFrame {
            slot: 1,
            image_index: frame.image_index,
        };
        assert_eq!(ring.finish(&mut gpu, foreign), PresentStatus::Failed);
        // 没有提交的帧会一直挡住 begin
        assert!(ring.begin(&mut gpu).is_none());
        assert_eq!(ring.finish(&mut gpu, frame), PresentStatus::Presented);
        assert!(ring.begin(&mut gpu).is_some());
    }

    #[test]
    fn test_swapchain_layouts_two_cycles() {
        let mut layouts = SwapchainImageLayouts::new(2);

        assert_eq!(
            layouts.begin_frame(0),
            Some((TextureLayout::Undefined, TextureLayout::ColorAttachment))
        );
        assert_eq!(layouts.end_frame(0), Some((TextureLayout::ColorAttachment, TextureLayout::Present)));
        assert_eq!(layouts.layout(0), Some(TextureLayout::Present));

        assert_eq!(
            layouts.begin_frame(0),
            Some((TextureLayout::Present, TextureLayout::ColorAttachment))
        );
        assert_eq!(layouts.end_frame(0), Some((TextureLayout::ColorAttachment, TextureLayout::Present)));
        assert_eq!(layouts.layout(0), Some(TextureLayout::Present));

        // 其他 image 不受影响
        assert_eq!(layouts.layout(1), Some(TextureLayout::Undefined));
        assert!(layouts.begin_frame(2).is_none());
    }

    #[test]
    fn test_swapchain_layout_invalidate() {
        let mut layouts = SwapchainImageLayouts::new(1);
        layouts.begin_frame(0);
        layouts.invalidate(0);
        assert_eq!(layouts.begin_frame(0).map(|(old, _)| old), Some(TextureLayout::Undefined));
    }
}
