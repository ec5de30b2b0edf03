use std::ffi::CString;
use std::rc::Rc;

use anyhow::Context;
use ash::vk;
use itertools::Itertools;

use crate::{
    commands::{
        barrier::{GfxBufferBarrier, GfxImageBarrier},
        command_pool::GfxCommandPool,
    },
    foundation::{debug_messenger::DebugType, device::GfxDevice},
};

/// 命令缓冲封装
///
/// 所有状态都是动态设置的（shader object），因此这里包含了大量 `cmd_set_*` 命令。
///
/// # 使用示例
/// ```ignore
/// let cmd = GfxCommandBuffer::new(&pool, "frame-0")?;
/// cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, "frame-0")?;
/// cmd.cmd_begin_rendering(&rendering_info);
/// // 绘制命令...
/// cmd.cmd_end_rendering();
/// cmd.end()?;
/// ```
#[derive(Clone)]
pub struct GfxCommandBuffer {
    vk_handle: vk::CommandBuffer,
    command_pool: vk::CommandPool,
    device: Rc<GfxDevice>,
}

// 创建
impl GfxCommandBuffer {
    pub fn new(command_pool: &GfxCommandPool, debug_name: &str) -> anyhow::Result<Self> {
        let device = command_pool.device().clone();
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool.handle())
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffers = unsafe { device.allocate_command_buffers(&info) }
            .with_context(|| format!("failed to allocate command buffer {debug_name}"))?;
        let vk_handle = command_buffers.first().copied().context("driver returned no command buffer")?;

        let cmd = Self {
            vk_handle,
            command_pool: command_pool.handle(),
            device,
        };
        cmd.device.set_debug_name(&cmd, debug_name);
        Ok(cmd)
    }

    /// 将 command buffer 归还给 pool
    pub fn free(self) {
        unsafe {
            self.device.free_command_buffers(self.command_pool, std::slice::from_ref(&self.vk_handle));
        }
    }
}

// Basic 命令
impl GfxCommandBuffer {
    /// 开始录制 command，并设置 debug label
    #[inline]
    pub fn begin(&self, usage_flag: vk::CommandBufferUsageFlags, debug_label_name: &str) -> anyhow::Result<()> {
        unsafe {
            self.device
                .begin_command_buffer(self.vk_handle, &vk::CommandBufferBeginInfo::default().flags(usage_flag))
        }
        .context("failed to begin command buffer")?;
        self.begin_label(debug_label_name, [0.2, 0.6, 0.9, 1.0]);
        Ok(())
    }

    /// 结束 debug label 以及 command 录制
    #[inline]
    pub fn end(&self) -> anyhow::Result<()> {
        self.end_label();
        unsafe { self.device.end_command_buffer(self.vk_handle) }.context("failed to end command buffer")
    }
}

// getters
impl GfxCommandBuffer {
    #[inline]
    pub fn vk_handle(&self) -> vk::CommandBuffer {
        self.vk_handle
    }
}

// 数据传输类型
impl GfxCommandBuffer {
    /// - command type: state
    /// - 支持的 queue: graphics, compute
    #[inline]
    pub fn cmd_push_constants(
        &self,
        pipeline_layout: vk::PipelineLayout,
        stage: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        unsafe {
            self.device.cmd_push_constants(self.vk_handle, pipeline_layout, stage, offset, data);
        }
    }

    /// 不需要 descriptor pool，描述符直接记录在 command buffer 中
    ///
    /// - command type: state
    /// - supported queue types: graphics, compute
    #[inline]
    pub fn cmd_push_descriptor_set(
        &self,
        bind_point: vk::PipelineBindPoint,
        pipeline_layout: vk::PipelineLayout,
        set: u32,
        writes: &[vk::WriteDescriptorSet],
    ) {
        unsafe {
            self.device.push_descriptor().cmd_push_descriptor_set(
                self.vk_handle,
                bind_point,
                pipeline_layout,
                set,
                writes,
            );
        }
    }
}

// 绘制类型的命令
impl GfxCommandBuffer {
    /// - command type: action, state
    /// - supported queue types: graphics
    #[inline]
    pub fn cmd_begin_rendering(&self, rendering_info: &vk::RenderingInfo) {
        unsafe {
            self.device.cmd_begin_rendering(self.vk_handle, rendering_info);
        }
    }

    /// - command type: action, state
    /// - supported queue types: graphics
    #[inline]
    pub fn cmd_end_rendering(&self) {
        unsafe {
            self.device.cmd_end_rendering(self.vk_handle);
        }
    }

    /// - command type: state
    /// - supported queue types: graphics
    #[inline]
    pub fn cmd_bind_vertex_buffers(&self, first_binding: u32, buffers: &[vk::Buffer], offsets: &[vk::DeviceSize]) {
        unsafe {
            self.device.cmd_bind_vertex_buffers(self.vk_handle, first_binding, buffers, offsets);
        }
    }

    /// - command type: state
    /// - supported queue types: graphics
    #[inline]
    pub fn cmd_bind_index_buffer(&self, buffer: vk::Buffer, offset: vk::DeviceSize, index_type: vk::IndexType) {
        unsafe {
            self.device.cmd_bind_index_buffer(self.vk_handle, buffer, offset, index_type);
        }
    }

    /// 不使用 index buffer 的绘制
    ///
    /// - command type: action
    /// - supported queue types: graphics
    #[inline]
    pub fn cmd_draw(&self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        unsafe {
            self.device.cmd_draw(self.vk_handle, vertex_count, instance_count, first_vertex, first_instance);
        }
    }

    /// - command type: action
    /// - supported queue types: graphics
    #[inline]
    pub fn cmd_draw_indexed(
        &self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        unsafe {
            self.device.cmd_draw_indexed(
                self.vk_handle,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
    }
}

// shader object
impl GfxCommandBuffer {
    /// `shaders` 中可以包含 null，表示该 stage 不使用 shader
    ///
    /// - command type: state
    /// - supported queue types: graphics, compute
    #[inline]
    pub fn cmd_bind_shaders(&self, stages: &[vk::ShaderStageFlags], shaders: &[vk::ShaderEXT]) {
        unsafe {
            self.device.shader_object().cmd_bind_shaders(self.vk_handle, stages, shaders);
        }
    }
}

// 动态状态：viewport 与 scissor
impl GfxCommandBuffer {
    /// - command type: state
    /// - supported queue types: graphics
    #[inline]
    pub fn cmd_set_viewport(&self, viewports: &[vk::Viewport]) {
        unsafe {
            self.device.cmd_set_viewport_with_count(self.vk_handle, viewports);
        }
    }

    /// - command type: state
    /// - supported queue types: graphics
    #[inline]
    pub fn cmd_set_scissor(&self, scissors: &[vk::Rect2D]) {
        unsafe {
            self.device.cmd_set_scissor_with_count(self.vk_handle, scissors);
        }
    }
}

// 动态状态：input assembly 与 rasterization
impl GfxCommandBuffer {
    #[inline]
    pub fn cmd_set_primitive_topology(&self, topology: vk::PrimitiveTopology) {
        unsafe { self.device.cmd_set_primitive_topology(self.vk_handle, topology) }
    }

    #[inline]
    pub fn cmd_set_primitive_restart_enable(&self, enable: bool) {
        unsafe { self.device.cmd_set_primitive_restart_enable(self.vk_handle, enable) }
    }

    #[inline]
    pub fn cmd_set_cull_mode(&self, cull_mode: vk::CullModeFlags) {
        unsafe { self.device.cmd_set_cull_mode(self.vk_handle, cull_mode) }
    }

    #[inline]
    pub fn cmd_set_front_face(&self, front_face: vk::FrontFace) {
        unsafe { self.device.cmd_set_front_face(self.vk_handle, front_face) }
    }

    #[inline]
    pub fn cmd_set_polygon_mode(&self, polygon_mode: vk::PolygonMode) {
        unsafe { self.device.shader_object().cmd_set_polygon_mode(self.vk_handle, polygon_mode) }
    }

    #[inline]
    pub fn cmd_set_depth_bias_enable(&self, enable: bool) {
        unsafe { self.device.cmd_set_depth_bias_enable(self.vk_handle, enable) }
    }

    #[inline]
    pub fn cmd_set_rasterizer_discard_enable(&self, enable: bool) {
        unsafe { self.device.cmd_set_rasterizer_discard_enable(self.vk_handle, enable) }
    }
}

// 动态状态：depth stencil
impl GfxCommandBuffer {
    #[inline]
    pub fn cmd_set_depth_test_enable(&self, enable: bool) {
        unsafe { self.device.cmd_set_depth_test_enable(self.vk_handle, enable) }
    }

    #[inline]
    pub fn cmd_set_depth_write_enable(&self, enable: bool) {
        unsafe { self.device.cmd_set_depth_write_enable(self.vk_handle, enable) }
    }

    #[inline]
    pub fn cmd_set_depth_compare_op(&self, compare_op: vk::CompareOp) {
        unsafe { self.device.cmd_set_depth_compare_op(self.vk_handle, compare_op) }
    }

    #[inline]
    pub fn cmd_set_depth_bounds_test_enable(&self, enable: bool) {
        unsafe { self.device.cmd_set_depth_bounds_test_enable(self.vk_handle, enable) }
    }

    #[inline]
    pub fn cmd_set_stencil_test_enable(&self, enable: bool) {
        unsafe { self.device.cmd_set_stencil_test_enable(self.vk_handle, enable) }
    }
}

// 动态状态：multisample 与 color blend
impl GfxCommandBuffer {
    #[inline]
    pub fn cmd_set_rasterization_samples(&self, samples: vk::SampleCountFlags) {
        unsafe { self.device.shader_object().cmd_set_rasterization_samples(self.vk_handle, samples) }
    }

    /// `sample_mask` 的长度需要是 ceil(samples / 32)
    #[inline]
    pub fn cmd_set_sample_mask(&self, samples: vk::SampleCountFlags, sample_mask: &[vk::SampleMask]) {
        unsafe { self.device.shader_object().cmd_set_sample_mask(self.vk_handle, samples, sample_mask) }
    }

    #[inline]
    pub fn cmd_set_alpha_to_coverage_enable(&self, enable: bool) {
        unsafe { self.device.shader_object().cmd_set_alpha_to_coverage_enable(self.vk_handle, enable) }
    }

    #[inline]
    pub fn cmd_set_color_blend_enable(&self, first_attachment: u32, enables: &[bool]) {
        let enables = enables.iter().map(|e| vk::Bool32::from(*e)).collect_vec();
        unsafe { self.device.shader_object().cmd_set_color_blend_enable(self.vk_handle, first_attachment, &enables) }
    }

    #[inline]
    pub fn cmd_set_color_blend_equation(&self, first_attachment: u32, equations: &[vk::ColorBlendEquationEXT]) {
        unsafe {
            self.device.shader_object().cmd_set_color_blend_equation(self.vk_handle, first_attachment, equations)
        }
    }

    #[inline]
    pub fn cmd_set_color_write_mask(&self, first_attachment: u32, masks: &[vk::ColorComponentFlags]) {
        unsafe { self.device.shader_object().cmd_set_color_write_mask(self.vk_handle, first_attachment, masks) }
    }

    #[inline]
    pub fn cmd_set_vertex_input(
        &self,
        bindings: &[vk::VertexInputBindingDescription2EXT],
        attributes: &[vk::VertexInputAttributeDescription2EXT],
    ) {
        unsafe { self.device.shader_object().cmd_set_vertex_input(self.vk_handle, bindings, attributes) }
    }
}

// 同步命令
impl GfxCommandBuffer {
    /// - command type: synchronize
    /// - supported queue types: transfer, graphics, compute
    #[inline]
    pub fn image_memory_barrier(&self, dependency_flags: vk::DependencyFlags, barriers: &[GfxImageBarrier]) {
        let barriers = barriers.iter().map(|b| *b.inner()).collect_vec();
        let dependency_info =
            vk::DependencyInfo::default().image_memory_barriers(&barriers).dependency_flags(dependency_flags);
        unsafe {
            self.device.cmd_pipeline_barrier2(self.vk_handle, &dependency_info);
        }
    }

    /// - command type: synchronize
    /// - supported queue types: transfer, graphics, compute
    #[inline]
    pub fn buffer_memory_barrier(&self, dependency_flags: vk::DependencyFlags, barriers: &[GfxBufferBarrier]) {
        let barriers = barriers.iter().map(|b| *b.inner()).collect_vec();
        let dependency_info =
            vk::DependencyInfo::default().buffer_memory_barriers(&barriers).dependency_flags(dependency_flags);
        unsafe {
            self.device.cmd_pipeline_barrier2(self.vk_handle, &dependency_info);
        }
    }
}

// debug 类型的命令
impl GfxCommandBuffer {
    #[inline]
    pub fn begin_label(&self, label_name: &str, label_color: [f32; 4]) {
        let Ok(name) = CString::new(label_name) else {
            return;
        };
        unsafe {
            self.device.debug_utils.cmd_begin_debug_utils_label(
                self.vk_handle,
                &vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color(label_color),
            );
        }
    }

    #[inline]
    pub fn end_label(&self) {
        unsafe {
            self.device.debug_utils.cmd_end_debug_utils_label(self.vk_handle);
        }
    }
}

impl DebugType for GfxCommandBuffer {
    fn debug_type_name() -> &'static str {
        "GfxCommandBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_handle
    }
}
