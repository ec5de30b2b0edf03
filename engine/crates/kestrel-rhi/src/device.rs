use crate::barrier::{BufferBarrierDescriptor, TextureBarrierDescriptor};
use crate::buffer::BufferDescriptor;
use crate::frame::{FrameContext, PresentStatus};
use crate::handle::{BufferHandle, ShaderHandle, TextureHandle};
use crate::pipeline_state::GraphicsStateDescriptor;
use crate::render_pass::RenderPassDescriptor;
use crate::shader::{ShaderFileParams, ShaderSourceParams, ShaderStageFlags};
use crate::texture::TextureDescriptor;
use crate::types::{Scissor, Viewport};
use crate::vulkan::device::RhiDeviceVulkan;

/// 与后端无关的设备接口
///
/// 失败不会 panic：创建类接口返回 null 句柄，录制类接口记录日志后跳过
pub trait RhiDeviceApi {
    /// 初始化是否全部成功
    fn is_valid(&self) -> bool;

    // 帧
    /// 阻塞直到 ring 中当前 slot 可用；失败时返回 null 的 FrameContext
    ///
    /// 返回的帧必须交给 `submit_and_present_frame`，否则不能再开始新的帧
    #[must_use]
    fn begin_frame(&mut self) -> FrameContext;
    fn submit_and_present_frame(&mut self, frame: FrameContext) -> PresentStatus;

    // 录制
    fn begin_render_pass(&self, frame: &FrameContext, desc: &RenderPassDescriptor);
    fn end_render_pass(&self, frame: &FrameContext);
    fn texture_barrier(&self, frame: &FrameContext, desc: &TextureBarrierDescriptor);
    fn buffer_barrier(&self, frame: &FrameContext, desc: &BufferBarrierDescriptor);
    fn set_viewport(&self, frame: &FrameContext, viewport: &Viewport);
    fn set_scissor(&self, frame: &FrameContext, scissor: &Scissor);
    fn set_graphics_state(&self, frame: &FrameContext, state: &GraphicsStateDescriptor);
    fn draw(&self, frame: &FrameContext, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);
    fn draw_indexed(
        &self,
        frame: &FrameContext,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );

    // texture
    fn create_texture(&mut self, desc: &TextureDescriptor) -> TextureHandle;
    fn free_texture(&mut self, handle: TextureHandle);

    // shader
    /// 只有文件读取失败时返回 Err；编译失败返回 null 句柄
    fn create_shader_from_files(&mut self, params: &ShaderFileParams) -> anyhow::Result<ShaderHandle>;
    fn create_shader_from_source(&mut self, params: &ShaderSourceParams) -> ShaderHandle;
    fn free_shader(&mut self, handle: ShaderHandle);
    fn bind_shader(&self, frame: &FrameContext, handle: ShaderHandle);

    // buffer
    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BufferHandle;
    fn free_buffer(&mut self, handle: BufferHandle);
    /// 写入对之后的所有帧可见；帧内调用时只立即写入当前帧使用的拷贝
    fn update_buffer(&mut self, handle: BufferHandle, data: &[u8], offset: u64);
    /// 根据 usage 绑定为 vertex buffer(binding 0) 或 index buffer
    fn bind_buffer(&self, frame: &FrameContext, handle: BufferHandle);
    fn bind_uniform_buffer(&self, frame: &FrameContext, handle: BufferHandle, set: u32, binding: u32);
    fn set_push_constants(&self, frame: &FrameContext, stages: ShaderStageFlags, offset: u32, data: &[u8]);
}

/// 创建后端时选定，之后不会改变
pub enum RhiDevice {
    Vulkan(RhiDeviceVulkan),
}

macro_rules! dispatch {
    ($self:ident, $device:ident => $body:expr) => {
        match $self {
            RhiDevice::Vulkan($device) => $body,
        }
    };
}

impl RhiDeviceApi for RhiDevice {
    fn is_valid(&self) -> bool {
        dispatch!(self, d => d.is_valid())
    }

    fn begin_frame(&mut self) -> FrameContext {
        dispatch!(self, d => d.begin_frame())
    }

    fn submit_and_present_frame(&mut self, frame: FrameContext) -> PresentStatus {
        dispatch!(self, d => d.submit_and_present_frame(frame))
    }

    fn begin_render_pass(&self, frame: &FrameContext, desc: &RenderPassDescriptor) {
        dispatch!(self, d => d.begin_render_pass(frame, desc))
    }

    fn end_render_pass(&self, frame: &FrameContext) {
        dispatch!(self, d => d.end_render_pass(frame))
    }

    fn texture_barrier(&self, frame: &FrameContext, desc: &TextureBarrierDescriptor) {
        dispatch!(self, d => d.texture_barrier(frame, desc))
    }

    fn buffer_barrier(&self, frame: &FrameContext, desc: &BufferBarrierDescriptor) {
        dispatch!(self, d => d.buffer_barrier(frame, desc))
    }

    fn set_viewport(&self, frame: &FrameContext, viewport: &Viewport) {
        dispatch!(self, d => d.set_viewport(frame, viewport))
    }

    fn set_scissor(&self, frame: &FrameContext, scissor: &Scissor) {
        dispatch!(self, d => d.set_scissor(frame, scissor))
    }

    fn set_graphics_state(&self, frame: &FrameContext, state: &GraphicsStateDescriptor) {
        dispatch!(self, d => d.set_graphics_state(frame, state))
    }

    fn draw(&self, frame: &FrameContext, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        dispatch!(self, d => d.draw(frame, vertex_count, instance_count, first_vertex, first_instance))
    }

    fn draw_indexed(
        &self,
        frame: &FrameContext,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        dispatch!(self, d => d.draw_indexed(frame, index_count, instance_count, first_index, vertex_offset, first_instance))
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> TextureHandle {
        dispatch!(self, d => d.create_texture(desc))
    }

    fn free_texture(&mut self, handle: TextureHandle) {
        dispatch!(self, d => d.free_texture(handle))
    }

    fn create_shader_from_files(&mut self, params: &ShaderFileParams) -> anyhow::Result<ShaderHandle> {
        dispatch!(self, d => d.create_shader_from_files(params))
    }

    fn create_shader_from_source(&mut self, params: &ShaderSourceParams) -> ShaderHandle {
        dispatch!(self, d => d.create_shader_from_source(params))
    }

    fn free_shader(&mut self, handle: ShaderHandle) {
        dispatch!(self, d => d.free_shader(handle))
    }

    fn bind_shader(&self, frame: &FrameContext, handle: ShaderHandle) {
        dispatch!(self, d => d.bind_shader(frame, handle))
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BufferHandle {
        dispatch!(self, d => d.create_buffer(desc))
    }

    fn free_buffer(&mut self, handle: BufferHandle) {
        dispatch!(self, d => d.free_buffer(handle))
    }

    fn update_buffer(&mut self, handle: BufferHandle, data: &[u8], offset: u64) {
        dispatch!(self, d => d.update_buffer(handle, data, offset))
    }

    fn bind_buffer(&self, frame: &FrameContext, handle: BufferHandle) {
        dispatch!(self, d => d.bind_buffer(frame, handle))
    }

    fn bind_uniform_buffer(&self, frame: &FrameContext, handle: BufferHandle, set: u32, binding: u32) {
        dispatch!(self, d => d.bind_uniform_buffer(frame, handle, set, binding))
    }

    fn set_push_constants(&self, frame: &FrameContext, stages: ShaderStageFlags, offset: u32, data: &[u8]) {
        dispatch!(self, d => d.set_push_constants(frame, stages, offset, data))
    }
}
