//! Vulkan 后端
//!
//! 初始化分为几个阶段，每个阶段持有自己创建的对象并负责销毁：
//! core(instance, surface, 物理设备) → gpu(device, allocator) → swapchain → frames(command pool, 同步对象)
//! → binding layout。任何一步失败时，之前的阶段按逆序销毁，设备保持 invalid。

use std::rc::Rc;

use anyhow::Context;
use ash::vk;
use ash::vk::Handle;
use itertools::Itertools;
use kestrel_gfx::commands::barrier::{GfxBufferBarrier, GfxImageBarrier};
use kestrel_gfx::commands::command_buffer::GfxCommandBuffer;
use kestrel_gfx::commands::command_pool::GfxCommandPool;
use kestrel_gfx::commands::command_queue::GfxCommandQueue;
use kestrel_gfx::foundation::debug_messenger::GfxDebugMsger;
use kestrel_gfx::foundation::device::GfxDevice;
use kestrel_gfx::foundation::instance::{GfxAppInfo, GfxInstance};
use kestrel_gfx::foundation::mem_allocator::GfxMemAllocator;
use kestrel_gfx::foundation::physical_device::{GfxPhysicalDevice, GfxPhysicalDevices};
use kestrel_gfx::pipelines::binding_layout::GfxShaderBindingLayout;
use kestrel_gfx::resources::image_view::{GfxImageView, GfxImageViewDesc};
use kestrel_gfx::swapchain::render_swapchain::{GfxSwapchain, GfxSwapchainPreference};
use kestrel_gfx::swapchain::surface::GfxSurface;

use crate::barrier::{BufferBarrierDescriptor, QueueFamilyTransfer, TextureBarrierDescriptor};
use crate::buffer::{BufferDescriptor, BufferUsage};
use crate::device::RhiDeviceApi;
use crate::frame::{FrameContext, PresentStatus};
use crate::handle::{BufferHandle, BufferTag, CommandBufferTag, ShaderHandle, ShaderTag, TextureHandle, TextureTag};
use crate::pipeline_state::GraphicsStateDescriptor;
use crate::platform::{DeviceSettings, PlatformContext, RhiInitParams, Version};
use crate::render_pass::{AttachmentDescriptor, MAX_COLOR_ATTACHMENTS, RenderPassDescriptor};
use crate::resource_pool::ResourcePool;
use crate::shader::{MAX_PUSH_CONSTANT_SIZE, MAX_UNIFORM_BINDINGS, ShaderFileParams, ShaderSourceParams, ShaderStageFlags};
use crate::texture::TextureDescriptor;
use crate::types::{Scissor, Viewport};
use crate::vulkan::conversions;
use crate::vulkan::resources::{self, BufferVulkan, TextureVulkan};
use crate::vulkan::shader::{ShaderVulkan, compile_program};
use crate::vulkan::shader_compiler::GlslcCompiler;
use crate::vulkan::submission::{
    BegunFrame, FrameRing, SubmissionContext, SwapchainImageLayouts, VulkanFrameSync, frames_in_flight_for,
};

#[inline]
fn vk_version(version: Version) -> u32 {
    vk::make_api_version(version.variant, version.major, version.minor, version.patch)
}

/// instance、debug messenger、surface 以及选中的物理设备
struct VulkanCore {
    /// 需要比 instance 活得更久
    _entry: ash::Entry,
    instance: GfxInstance,
    debug_msger: GfxDebugMsger,
    surface: GfxSurface,
    pdevice: GfxPhysicalDevice,
    queue_family_index: u32,
}

impl VulkanCore {
    fn new(context: &PlatformContext, settings: &DeviceSettings) -> anyhow::Result<Self> {
        let entry = unsafe { ash::Entry::load() }.context("failed to load vulkan library")?;
        let app_info = GfxAppInfo {
            app_name: &context.app_name,
            app_version: vk_version(context.app_version),
            engine_name: &context.engine_name,
            engine_version: vk_version(context.engine_version),
        };
        let instance = GfxInstance::new(
            &entry,
            &app_info,
            &context.required_instance_extensions,
            settings.enable_validation,
        )?;

        let debug_msger = match GfxDebugMsger::new(&entry, instance.ash_instance()) {
            Ok(debug_msger) => debug_msger,
            Err(e) => {
                instance.destroy();
                return Err(e);
            }
        };

        let surface = match Self::create_surface(&entry, &instance, context) {
            Ok(surface) => surface,
            Err(e) => {
                debug_msger.destroy();
                instance.destroy();
                return Err(e);
            }
        };

        let (pdevice, queue_family_index) = match Self::select_physical_device(&instance, &surface) {
            Ok(selected) => selected,
            Err(e) => {
                surface.destroy();
                debug_msger.destroy();
                instance.destroy();
                return Err(e);
            }
        };

        Ok(Self {
            _entry: entry,
            instance,
            debug_msger,
            surface,
            pdevice,
            queue_family_index,
        })
    }

    /// surface 由平台层通过回调创建
    fn create_surface(
        entry: &ash::Entry,
        instance: &GfxInstance,
        context: &PlatformContext,
    ) -> anyhow::Result<GfxSurface> {
        let mut raw_surface = 0u64;
        if !(context.create_surface)(instance.vk_instance().as_raw(), &mut raw_surface) || raw_surface == 0 {
            anyhow::bail!("platform failed to create a window surface");
        }
        log::trace!("window surface created");
        Ok(GfxSurface::from_raw(entry, instance.ash_instance(), vk::SurfaceKHR::from_raw(raw_surface)))
    }

    fn select_physical_device(
        instance: &GfxInstance,
        surface: &GfxSurface,
    ) -> anyhow::Result<(GfxPhysicalDevice, u32)> {
        let mut pdevices = GfxPhysicalDevices::init(instance.ash_instance(), surface)?;
        if !pdevices.select_device(vk::QueueFlags::GRAPHICS, true) {
            anyhow::bail!("no physical device with a graphics queue that can present to the surface");
        }
        let pdevice = pdevices.selected_device().cloned().context("selected physical device is missing")?;
        let queue_family_index = pdevices.selected_queue_family().context("selected queue family is missing")?;
        Ok((pdevice, queue_family_index))
    }

    fn destroy(self) {
        self.surface.destroy();
        self.debug_msger.destroy();
        self.instance.destroy();
    }
}

/// 逻辑设备与内存分配器
struct GpuObjects {
    device: Rc<GfxDevice>,
    allocator: Rc<GfxMemAllocator>,
}

impl GpuObjects {
    fn new(core: &VulkanCore) -> anyhow::Result<Self> {
        if !core.pdevice.supports_geometry_shader() {
            log::error!(
                "gpu {:?} does not support geometry shaders, which kestrel requires",
                core.pdevice.properties.device_name_as_c_str().unwrap_or(c"unknown")
            );
            std::process::exit(1);
        }

        let device = Rc::new(GfxDevice::new(
            core.instance.ash_instance(),
            core.pdevice.vk_handle,
            core.queue_family_index,
        )?);
        let allocator = match GfxMemAllocator::new(core.instance.ash_instance(), core.pdevice.vk_handle, &device) {
            Ok(allocator) => Rc::new(allocator),
            Err(e) => {
                device.destroy();
                return Err(e);
            }
        };
        Ok(Self { device, allocator })
    }

    fn destroy(self) {
        // 所有 buffer 与 image 都已销毁，allocator 应该只剩这一个引用
        match Rc::try_unwrap(self.allocator) {
            Ok(allocator) => allocator.destroy(),
            Err(allocator) => {
                log::error!("memory allocator still has {} owners at teardown", Rc::strong_count(&allocator));
            }
        }
        self.device.destroy();
    }
}

/// 所有 RHI 句柄背后的资源表
struct ResourcePools {
    textures: ResourcePool<TextureTag, TextureVulkan>,
    buffers: ResourcePool<BufferTag, BufferVulkan>,
    shaders: ResourcePool<ShaderTag, ShaderVulkan>,
    command_buffers: ResourcePool<CommandBufferTag, GfxCommandBuffer>,
}

impl ResourcePools {
    fn new() -> Self {
        Self {
            textures: ResourcePool::new(TextureVulkan::destroy),
            buffers: ResourcePool::new(BufferVulkan::destroy),
            shaders: ResourcePool::new(ShaderVulkan::destroy),
            command_buffers: ResourcePool::new(GfxCommandBuffer::free),
        }
    }

    /// 用户创建的资源
    fn destroy_user_resources(&mut self) {
        self.shaders.destroy_all();
        self.buffers.destroy_all();
        self.textures.destroy_all();
    }
}

/// swapchain、每张 image 的 view，以及它们在 texture pool 中的登记
struct SwapchainObjects {
    swapchain: GfxSwapchain,
    views: Vec<GfxImageView>,
    textures: Vec<TextureHandle>,
    layouts: SwapchainImageLayouts,
}

impl SwapchainObjects {
    fn new(
        core: &VulkanCore,
        device: &Rc<GfxDevice>,
        settings: &DeviceSettings,
        window_extent: (u32, u32),
        texture_pool: &mut ResourcePool<TextureTag, TextureVulkan>,
    ) -> anyhow::Result<Self> {
        let preference = GfxSwapchainPreference {
            present_mode: conversions::present_mode(settings.preferred_present_mode),
            surface_format: vk::SurfaceFormatKHR {
                format: conversions::texture_format(settings.preferred_surface_format),
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        };
        let swapchain = GfxSwapchain::new(
            device.clone(),
            &core.surface,
            core.pdevice.vk_handle,
            preference,
            vk::Extent2D {
                width: window_extent.0,
                height: window_extent.1,
            },
        )?;

        let mut views = Vec::with_capacity(swapchain.images().len());
        for (idx, image) in swapchain.images().iter().enumerate() {
            let desc = GfxImageViewDesc::new_2d(swapchain.format(), vk::ImageAspectFlags::COLOR);
            match GfxImageView::new(device.clone(), *image, desc, format!("swapchain-{idx}")) {
                Ok(view) => views.push(view),
                Err(e) => {
                    views.into_iter().for_each(GfxImageView::destroy);
                    swapchain.destroy();
                    return Err(e);
                }
            }
        }

        let textures = swapchain
            .images()
            .iter()
            .zip(views.iter())
            .map(|(image, view)| {
                texture_pool.allocate(TextureVulkan::from_swapchain(*image, view.handle(), swapchain.extent()))
            })
            .collect_vec();

        Ok(Self {
            layouts: SwapchainImageLayouts::new(textures.len()),
            swapchain,
            views,
            textures,
        })
    }

    #[inline]
    fn image_count(&self) -> usize {
        self.textures.len()
    }

    fn destroy(self, texture_pool: &mut ResourcePool<TextureTag, TextureVulkan>) {
        for texture in self.textures {
            texture_pool.free(texture);
        }
        self.views.into_iter().for_each(GfxImageView::destroy);
        self.swapchain.destroy();
    }
}

/// command pool、帧同步对象与 queue
struct FrameObjects {
    command_pool: GfxCommandPool,
    submission: SubmissionContext,
    ring: FrameRing,
    queue: GfxCommandQueue,
}

impl FrameObjects {
    fn new(
        device: &Rc<GfxDevice>,
        queue_family_index: u32,
        command_buffers: &mut ResourcePool<CommandBufferTag, GfxCommandBuffer>,
        swapchain_image_count: usize,
    ) -> anyhow::Result<Self> {
        let command_pool = GfxCommandPool::new(
            device.clone(),
            queue_family_index,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            "frame-commands",
        )?;

        let frames_in_flight = frames_in_flight_for(swapchain_image_count);
        let submission = match SubmissionContext::new(
            device,
            &command_pool,
            command_buffers,
            frames_in_flight,
            swapchain_image_count,
        ) {
            Ok(submission) => submission,
            Err(e) => {
                command_pool.destroy();
                return Err(e);
            }
        };
        log::info!("frames in flight: {}, swapchain images: {}", frames_in_flight, swapchain_image_count);

        Ok(Self {
            command_pool,
            submission,
            ring: FrameRing::new(frames_in_flight),
            queue: GfxCommandQueue::new(device.clone(), queue_family_index),
        })
    }

    fn destroy(mut self, command_buffers: &mut ResourcePool<CommandBufferTag, GfxCommandBuffer>) {
        self.submission.destroy(command_buffers);
        self.command_pool.destroy();
    }
}

/// 初始化成功后的全部状态
struct VulkanBackend {
    core: VulkanCore,
    gpu: GpuObjects,
    pools: ResourcePools,
    swapchain: SwapchainObjects,
    frames: FrameObjects,
    binding_layout: GfxShaderBindingLayout,
    compiler: GlslcCompiler,
}

// 创建与销毁
impl VulkanBackend {
    fn new(params: &RhiInitParams) -> anyhow::Result<Self> {
        let core = VulkanCore::new(&params.context, &params.settings)?;

        let gpu = match GpuObjects::new(&core) {
            Ok(gpu) => gpu,
            Err(e) => {
                core.destroy();
                return Err(e);
            }
        };

        let mut pools = ResourcePools::new();
        let window_extent = (params.context.framebuffer_size)();
        let swapchain =
            match SwapchainObjects::new(&core, &gpu.device, &params.settings, window_extent, &mut pools.textures) {
                Ok(swapchain) => swapchain,
                Err(e) => {
                    gpu.destroy();
                    core.destroy();
                    return Err(e);
                }
            };

        let frames = match FrameObjects::new(
            &gpu.device,
            core.queue_family_index,
            &mut pools.command_buffers,
            swapchain.image_count(),
        ) {
            Ok(frames) => frames,
            Err(e) => {
                swapchain.destroy(&mut pools.textures);
                gpu.destroy();
                core.destroy();
                return Err(e);
            }
        };

        let binding_layout = match GfxShaderBindingLayout::new(
            gpu.device.clone(),
            MAX_UNIFORM_BINDINGS,
            MAX_PUSH_CONSTANT_SIZE,
            "shared",
        ) {
            Ok(layout) => layout,
            Err(e) => {
                frames.destroy(&mut pools.command_buffers);
                swapchain.destroy(&mut pools.textures);
                gpu.destroy();
                core.destroy();
                return Err(e);
            }
        };

        Ok(Self {
            core,
            gpu,
            pools,
            swapchain,
            frames,
            binding_layout,
            compiler: GlslcCompiler::new(params.settings.shader_compiler.clone()),
        })
    }

    fn destroy(self) {
        let Self {
            core,
            gpu,
            mut pools,
            swapchain,
            frames,
            binding_layout,
            compiler: _,
        } = self;

        frames.queue.wait_idle();

        pools.destroy_user_resources();
        binding_layout.destroy();
        frames.destroy(&mut pools.command_buffers);
        swapchain.destroy(&mut pools.textures);
        drop(pools);

        gpu.destroy();
        core.destroy();
    }
}

// 帧
impl VulkanBackend {
    fn begin_frame(&mut self) -> FrameContext {
        let mut sync = frame_sync(&self.frames.submission, &self.frames.queue, &self.pools, &self.swapchain);
        let Some(frame) = self.frames.ring.begin(&mut sync) else {
            return FrameContext::null();
        };

        // slot 的 fence 已经等待过，GPU 不再读取这个 slot 的拷贝
        for (handle, buffer) in self.pools.buffers.iter_mut() {
            if let Err(e) = buffer.sync_slot(frame.slot) {
                log::error!("failed to sync buffer {:?} for slot {}: {e:#}", handle, frame.slot);
            }
        }

        let command_buffer = self.frames.submission.slot(frame.slot).command_buffer;
        let Some(backbuffer) = self.swapchain.textures.get(frame.image_index as usize).copied() else {
            log::error!("swapchain returned an unknown image index {}", frame.image_index);
            // 已经开始录制，仍然需要走完提交流程
            let mut sync = frame_sync(&self.frames.submission, &self.frames.queue, &self.pools, &self.swapchain);
            self.frames.ring.finish(&mut sync, frame);
            return FrameContext::null();
        };

        if let (Some((old_layout, new_layout)), Some(cmd), Some(texture)) = (
            self.swapchain.layouts.begin_frame(frame.image_index),
            self.pools.command_buffers.get(command_buffer),
            self.pools.textures.get(backbuffer),
        ) {
            let barrier = GfxImageBarrier::new()
                .image(texture.image())
                .image_aspect_flag(vk::ImageAspectFlags::COLOR)
                .layout_transfer(conversions::texture_layout(old_layout), conversions::texture_layout(new_layout))
                // acquire semaphore 在 color attachment output 阶段等待
                .src_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, vk::AccessFlags2::NONE)
                .dst_mask(
                    vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                    vk::AccessFlags2::COLOR_ATTACHMENT_READ | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                );
            cmd.image_memory_barrier(vk::DependencyFlags::empty(), &[barrier]);
        }

        let extent = self.swapchain.swapchain.extent();
        FrameContext::new(
            command_buffer,
            backbuffer,
            (extent.width, extent.height),
            frame.image_index,
            frame.slot as u32,
        )
    }

    fn submit_and_present_frame(&mut self, frame: FrameContext) -> PresentStatus {
        if !frame.is_valid() {
            log::error!("cannot submit a null frame");
            return PresentStatus::Failed;
        }
        let begun = BegunFrame {
            slot: frame.frame_index() as usize,
            image_index: frame.image_index(),
        };

        if let (Some((old_layout, new_layout)), Some(cmd), Some(texture)) = (
            self.swapchain.layouts.end_frame(begun.image_index),
            self.pools.command_buffers.get(frame.command_buffer()),
            self.pools.textures.get(frame.backbuffer()),
        ) {
            let barrier = GfxImageBarrier::new()
                .image(texture.image())
                .image_aspect_flag(vk::ImageAspectFlags::COLOR)
                .layout_transfer(conversions::texture_layout(old_layout), conversions::texture_layout(new_layout))
                .src_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE)
                .dst_mask(vk::PipelineStageFlags2::BOTTOM_OF_PIPE, vk::AccessFlags2::NONE);
            cmd.image_memory_barrier(vk::DependencyFlags::empty(), &[barrier]);
        }

        let mut sync = frame_sync(&self.frames.submission, &self.frames.queue, &self.pools, &self.swapchain);
        let status = self.frames.ring.finish(&mut sync, begun);
        if status == PresentStatus::Failed {
            // 录制的 barrier 可能没有执行，下次按 Undefined 处理
            self.swapchain.layouts.invalidate(begun.image_index);
        }
        status
    }
}

// 录制
impl VulkanBackend {
    /// 帧对应的 command buffer；null 帧或者过期的句柄返回 None
    fn recording_cmd(&self, frame: &FrameContext, op: &str) -> Option<&GfxCommandBuffer> {
        if !frame.is_valid() {
            log::error!("{op}: frame context is null");
            return None;
        }
        let cmd = self.pools.command_buffers.get(frame.command_buffer());
        if cmd.is_none() {
            log::error!("{op}: stale command buffer handle {:?}", frame.command_buffer());
        }
        cmd
    }

    fn texture(&self, handle: TextureHandle, op: &str) -> Option<&TextureVulkan> {
        let texture = self.pools.textures.get(handle);
        if texture.is_none() {
            log::error!("{op}: invalid texture handle {:?}", handle);
        }
        texture
    }

    fn buffer(&self, handle: BufferHandle, op: &str) -> Option<&BufferVulkan> {
        let buffer = self.pools.buffers.get(handle);
        if buffer.is_none() {
            log::error!("{op}: invalid buffer handle {:?}", handle);
        }
        buffer
    }

    fn attachment_info(
        &self,
        attachment: &AttachmentDescriptor,
        clear_value: vk::ClearValue,
    ) -> Option<vk::RenderingAttachmentInfo<'static>> {
        let texture = self.texture(attachment.texture, "begin_render_pass")?;
        Some(
            vk::RenderingAttachmentInfo::default()
                .image_view(texture.view())
                .image_layout(conversions::texture_layout(attachment.layout))
                .load_op(conversions::load_op(attachment.load))
                .store_op(conversions::store_op(attachment.store))
                .clear_value(clear_value),
        )
    }

    fn begin_render_pass(&self, frame: &FrameContext, desc: &RenderPassDescriptor) {
        let Some(cmd) = self.recording_cmd(frame, "begin_render_pass") else {
            return;
        };

        if desc.color_attachments.len() > MAX_COLOR_ATTACHMENTS {
            log::warn!(
                "render pass has {} color attachments, only the first {} are used",
                desc.color_attachments.len(),
                MAX_COLOR_ATTACHMENTS
            );
        }
        let color_attachments = desc
            .color_attachments
            .iter()
            .take(MAX_COLOR_ATTACHMENTS)
            .filter_map(|attachment| self.attachment_info(attachment, conversions::color_clear_value(&attachment.clear)))
            .collect_vec();
        let depth_attachment = desc.depth_attachment.as_ref().and_then(|attachment| {
            self.attachment_info(attachment, conversions::depth_stencil_clear_value(&attachment.clear))
        });
        let stencil_attachment = desc.stencil_attachment.as_ref().and_then(|attachment| {
            self.attachment_info(attachment, conversions::depth_stencil_clear_value(&attachment.clear))
        });

        // render area 为空时覆盖整个 backbuffer
        let render_area = if desc.render_area.width == 0 || desc.render_area.height == 0 {
            let (width, height) = frame.extent();
            vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: vk::Extent2D { width, height },
            }
        } else {
            conversions::rect_2d(&desc.render_area)
        };

        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(render_area)
            .layer_count(desc.layer_count.max(1))
            .color_attachments(&color_attachments);
        if let Some(depth_attachment) = depth_attachment.as_ref() {
            rendering_info = rendering_info.depth_attachment(depth_attachment);
        }
        if let Some(stencil_attachment) = stencil_attachment.as_ref() {
            rendering_info = rendering_info.stencil_attachment(stencil_attachment);
        }
        cmd.cmd_begin_rendering(&rendering_info);
    }

    fn end_render_pass(&self, frame: &FrameContext) {
        if let Some(cmd) = self.recording_cmd(frame, "end_render_pass") {
            cmd.cmd_end_rendering();
        }
    }

    fn texture_barrier(&self, frame: &FrameContext, desc: &TextureBarrierDescriptor) {
        let Some(cmd) = self.recording_cmd(frame, "texture_barrier") else {
            return;
        };
        let Some(texture) = self.texture(desc.texture, "texture_barrier") else {
            return;
        };

        let mut barrier = GfxImageBarrier::new()
            .image(texture.image())
            .layout_transfer(conversions::texture_layout(desc.old_layout), conversions::texture_layout(desc.new_layout))
            .src_mask(conversions::pipeline_stages(desc.src_stage), conversions::access_flags(desc.src_access))
            .dst_mask(conversions::pipeline_stages(desc.dst_stage), conversions::access_flags(desc.dst_access))
            .subresource_range(conversions::subresource_range(&desc.subresource_range));
        if let Some(QueueFamilyTransfer {
            src_queue_family,
            dst_queue_family,
        }) = desc.queue_family_transfer
        {
            barrier = barrier.queue_family_transfer(src_queue_family, dst_queue_family);
        }
        cmd.image_memory_barrier(vk::DependencyFlags::empty(), &[barrier]);
    }

    fn buffer_barrier(&self, frame: &FrameContext, desc: &BufferBarrierDescriptor) {
        let Some(cmd) = self.recording_cmd(frame, "buffer_barrier") else {
            return;
        };
        let Some(buffer) = self.buffer(desc.buffer, "buffer_barrier") else {
            return;
        };

        let mut barrier = GfxBufferBarrier::new()
            .buffer(
                buffer.vk_buffer(frame.frame_index() as usize),
                desc.offset,
                desc.size.unwrap_or(vk::WHOLE_SIZE),
            )
            .src_mask(conversions::pipeline_stages(desc.src_stage), conversions::access_flags(desc.src_access))
            .dst_mask(conversions::pipeline_stages(desc.dst_stage), conversions::access_flags(desc.dst_access));
        if let Some(transfer) = desc.queue_family_transfer {
            barrier = barrier.queue_family_transfer(transfer.src_queue_family, transfer.dst_queue_family);
        }
        cmd.buffer_memory_barrier(vk::DependencyFlags::empty(), &[barrier]);
    }

    fn set_viewport(&self, frame: &FrameContext, viewport: &Viewport) {
        if let Some(cmd) = self.recording_cmd(frame, "set_viewport") {
            cmd.cmd_set_viewport(&[conversions::viewport(viewport)]);
        }
    }

    fn set_scissor(&self, frame: &FrameContext, scissor: &Scissor) {
        if let Some(cmd) = self.recording_cmd(frame, "set_scissor") {
            cmd.cmd_set_scissor(&[conversions::rect_2d(scissor)]);
        }
    }

    /// shader object 没有 pipeline，所有状态都需要在 draw 之前设置
    fn set_graphics_state(&self, frame: &FrameContext, state: &GraphicsStateDescriptor) {
        let Some(cmd) = self.recording_cmd(frame, "set_graphics_state") else {
            return;
        };
        if let Err(e) = state.validate() {
            log::error!("set_graphics_state: {e:#}");
            return;
        }

        cmd.cmd_set_primitive_topology(conversions::primitive_topology(state.input_assembly.topology));
        cmd.cmd_set_primitive_restart_enable(state.input_assembly.primitive_restart_enable);

        let rasterization = &state.rasterization;
        cmd.cmd_set_cull_mode(conversions::cull_mode(rasterization.cull_mode));
        cmd.cmd_set_front_face(conversions::front_face(rasterization.front_face));
        cmd.cmd_set_polygon_mode(conversions::polygon_mode(rasterization.polygon_mode));
        cmd.cmd_set_depth_bias_enable(rasterization.depth_bias_enable);
        cmd.cmd_set_rasterizer_discard_enable(rasterization.rasterizer_discard);

        let depth_stencil = &state.depth_stencil;
        cmd.cmd_set_depth_test_enable(depth_stencil.depth_test_enable);
        cmd.cmd_set_depth_write_enable(depth_stencil.depth_write_enable);
        cmd.cmd_set_depth_compare_op(conversions::compare_op(depth_stencil.depth_compare_op));
        cmd.cmd_set_depth_bounds_test_enable(false);
        cmd.cmd_set_stencil_test_enable(depth_stencil.stencil_test_enable);

        let samples = conversions::sample_count(state.multisample.samples);
        cmd.cmd_set_rasterization_samples(samples);
        cmd.cmd_set_sample_mask(samples, &[state.multisample.sample_mask]);
        cmd.cmd_set_alpha_to_coverage_enable(state.multisample.alpha_to_coverage_enable);

        let blend_attachments = state.color_blend_attachments();
        let enables = blend_attachments.iter().map(|attachment| attachment.blend_enable).collect_vec();
        let equations = blend_attachments.iter().map(|_| standard_alpha_blend()).collect_vec();
        let write_masks = blend_attachments
            .iter()
            .map(|attachment| conversions::color_components(attachment.color_write_mask))
            .collect_vec();
        cmd.cmd_set_color_blend_enable(0, &enables);
        cmd.cmd_set_color_blend_equation(0, &equations);
        cmd.cmd_set_color_write_mask(0, &write_masks);

        let bindings = state
            .vertex_input
            .bindings
            .iter()
            .map(|binding| {
                vk::VertexInputBindingDescription2EXT::default()
                    .binding(binding.binding)
                    .stride(binding.stride)
                    .input_rate(conversions::vertex_input_rate(binding.input_rate))
                    .divisor(1)
            })
            .collect_vec();
        let attributes = state
            .vertex_input
            .attributes
            .iter()
            .map(|attribute| {
                vk::VertexInputAttributeDescription2EXT::default()
                    .location(attribute.location)
                    .binding(attribute.binding)
                    .format(conversions::vertex_format(attribute.format))
                    .offset(attribute.offset)
            })
            .collect_vec();
        cmd.cmd_set_vertex_input(&bindings, &attributes);
    }

    fn draw(&self, frame: &FrameContext, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        if let Some(cmd) = self.recording_cmd(frame, "draw") {
            cmd.cmd_draw(vertex_count, instance_count, first_vertex, first_instance);
        }
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
        if let Some(cmd) = self.recording_cmd(frame, "draw_indexed") {
            cmd.cmd_draw_indexed(index_count, instance_count, first_index, vertex_offset, first_instance);
        }
    }

    fn bind_shader(&self, frame: &FrameContext, handle: ShaderHandle) {
        let Some(cmd) = self.recording_cmd(frame, "bind_shader") else {
            return;
        };
        match self.pools.shaders.get(handle) {
            Some(shader) => shader.bind(cmd),
            None => log::error!("bind_shader: invalid shader handle {:?}", handle),
        }
    }

    fn bind_buffer(&self, frame: &FrameContext, handle: BufferHandle) {
        let Some(cmd) = self.recording_cmd(frame, "bind_buffer") else {
            return;
        };
        let Some(buffer) = self.buffer(handle, "bind_buffer") else {
            return;
        };

        let vk_buffer = buffer.vk_buffer(frame.frame_index() as usize);
        if resources::is_index_buffer(buffer.usage()) {
            cmd.cmd_bind_index_buffer(vk_buffer, 0, vk::IndexType::UINT32);
        } else if buffer.usage().contains(BufferUsage::VERTEX_BUFFER) {
            cmd.cmd_bind_vertex_buffers(0, &[vk_buffer], &[0]);
        } else {
            log::error!("bind_buffer: buffer {:?} is neither a vertex nor an index buffer", handle);
        }
    }

    fn bind_uniform_buffer(&self, frame: &FrameContext, handle: BufferHandle, set: u32, binding: u32) {
        let Some(cmd) = self.recording_cmd(frame, "bind_uniform_buffer") else {
            return;
        };
        let Some(buffer) = self.buffer(handle, "bind_uniform_buffer") else {
            return;
        };
        if set != 0 || binding >= MAX_UNIFORM_BINDINGS {
            log::error!(
                "bind_uniform_buffer: (set {}, binding {}) is outside set 0 with {} bindings",
                set,
                binding,
                MAX_UNIFORM_BINDINGS
            );
            return;
        }
        if !buffer.usage().contains(BufferUsage::UNIFORM_BUFFER) {
            log::error!("bind_uniform_buffer: buffer {:?} was not created with UNIFORM_BUFFER usage", handle);
            return;
        }

        let buffer_info = vk::DescriptorBufferInfo::default()
            .buffer(buffer.vk_buffer(frame.frame_index() as usize))
            .offset(0)
            .range(vk::WHOLE_SIZE);
        let write = vk::WriteDescriptorSet::default()
            .dst_binding(binding)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(std::slice::from_ref(&buffer_info));
        cmd.cmd_push_descriptor_set(
            vk::PipelineBindPoint::GRAPHICS,
            self.binding_layout.pipeline_layout(),
            set,
            std::slice::from_ref(&write),
        );
    }

    fn set_push_constants(&self, frame: &FrameContext, stages: ShaderStageFlags, offset: u32, data: &[u8]) {
        let Some(cmd) = self.recording_cmd(frame, "set_push_constants") else {
            return;
        };
        if let Err(e) = check_push_constant_range(stages, offset, data.len()) {
            log::error!("set_push_constants: {e:#}");
            return;
        }

        // 共享的 push constant range 覆盖所有图形 stage，vkCmdPushConstants 的 stage 必须与之一致
        let range = self.binding_layout.push_constant_range();
        cmd.cmd_push_constants(self.binding_layout.pipeline_layout(), range.stage_flags, offset, data);
    }
}

// 资源
impl VulkanBackend {
    fn create_texture(&mut self, desc: &TextureDescriptor) -> TextureHandle {
        match TextureVulkan::new(&self.gpu.device, self.gpu.allocator.clone(), desc) {
            Ok(texture) => self.pools.textures.allocate(texture),
            Err(e) => {
                log::error!("failed to create texture {}: {e:#}", desc.debug_name);
                TextureHandle::null()
            }
        }
    }

    fn free_texture(&mut self, handle: TextureHandle) {
        if self.pools.textures.get(handle).is_some_and(TextureVulkan::is_swapchain_image) {
            log::error!("free_texture: {:?} is a swapchain image and is owned by the device", handle);
            return;
        }
        self.pools.textures.free(handle);
    }

    fn create_shader(&mut self, params: &ShaderSourceParams, debug_name: &str) -> ShaderHandle {
        let shader = compile_program(&self.compiler, params).and_then(|program| {
            ShaderVulkan::new(self.gpu.device.clone(), &self.binding_layout, &program, debug_name)
        });
        match shader {
            Ok(shader) => {
                log::info!("shader {} created with stages {:?}", debug_name, shader.stages());
                self.pools.shaders.allocate(shader)
            }
            Err(e) => {
                log::error!("failed to create shader {}: {e:#}", debug_name);
                ShaderHandle::null()
            }
        }
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BufferHandle {
        let frames_in_flight = self.frames.ring.frames_in_flight();
        match BufferVulkan::new(&self.gpu.device, self.gpu.allocator.clone(), desc, frames_in_flight) {
            Ok(buffer) => self.pools.buffers.allocate(buffer),
            Err(e) => {
                log::error!("failed to create buffer {}: {e:#}", desc.debug_name);
                BufferHandle::null()
            }
        }
    }

    fn update_buffer(&mut self, handle: BufferHandle, data: &[u8], offset: u64) {
        let recording_slot = self.frames.ring.open_frame().map(|frame| frame.slot);
        let Some(buffer) = self.pools.buffers.get_mut(handle) else {
            log::error!("update_buffer: invalid buffer handle {:?}", handle);
            return;
        };
        if let Err(e) = buffer.write(recording_slot, offset, data) {
            log::error!("update_buffer: {:?}: {e:#}", handle);
        }
    }
}

/// 只借用帧同步需要的字段，这样 `FrameRing` 可以同时被可变借用
fn frame_sync<'a>(
    submission: &'a SubmissionContext,
    queue: &'a GfxCommandQueue,
    pools: &'a ResourcePools,
    swapchain: &'a SwapchainObjects,
) -> VulkanFrameSync<'a> {
    VulkanFrameSync {
        submission,
        command_buffers: &pools.command_buffers,
        swapchain: &swapchain.swapchain,
        queue,
    }
}

/// 开启混合时使用的标准 alpha 混合
fn standard_alpha_blend() -> vk::ColorBlendEquationEXT {
    vk::ColorBlendEquationEXT::default()
        .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
        .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(vk::BlendFactor::ONE)
        .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
        .alpha_blend_op(vk::BlendOp::ADD)
}

/// push constant 的 offset 与大小都需要 4 字节对齐，且不能超出共享的 range
fn check_push_constant_range(stages: ShaderStageFlags, offset: u32, len: usize) -> anyhow::Result<()> {
    if stages.is_empty() {
        anyhow::bail!("no shader stage given");
    }
    if len == 0 || offset % 4 != 0 || len % 4 != 0 {
        anyhow::bail!("offset {} and size {} must be non-zero multiples of 4", offset, len);
    }
    let end = offset as u64 + len as u64;
    if end > MAX_PUSH_CONSTANT_SIZE as u64 {
        anyhow::bail!("range [{}, {}) exceeds {} bytes", offset, end, MAX_PUSH_CONSTANT_SIZE);
    }
    Ok(())
}

/// Vulkan 设备
///
/// 初始化失败时仍然返回一个对象，但 `is_valid()` 为 false，所有操作都只会输出错误日志
pub struct RhiDeviceVulkan {
    backend: Option<VulkanBackend>,
}

impl RhiDeviceVulkan {
    pub fn new(params: &RhiInitParams) -> Self {
        log::info!("initializing vulkan device for {}", params.context.app_name);
        match VulkanBackend::new(params) {
            Ok(backend) => {
                log::info!("vulkan device ready");
                Self { backend: Some(backend) }
            }
            Err(e) => {
                log::error!("failed to initialize vulkan device: {e:#}");
                Self { backend: None }
            }
        }
    }

    /// swapchain 的 (width, height)
    pub fn swapchain_extent(&self) -> Option<(u32, u32)> {
        self.backend.as_ref().map(|backend| {
            let extent = backend.swapchain.swapchain.extent();
            (extent.width, extent.height)
        })
    }

    pub fn frames_in_flight(&self) -> usize {
        self.backend.as_ref().map_or(0, |backend| backend.frames.ring.frames_in_flight())
    }

    /// 已经提交的帧数
    pub fn frame_counter(&self) -> u64 {
        self.backend.as_ref().map_or(0, |backend| backend.frames.ring.frame_counter())
    }

    fn backend(&self, op: &str) -> Option<&VulkanBackend> {
        if self.backend.is_none() {
            log::error!("{op}: device is not valid");
        }
        self.backend.as_ref()
    }

    fn backend_mut(&mut self, op: &str) -> Option<&mut VulkanBackend> {
        if self.backend.is_none() {
            log::error!("{op}: device is not valid");
        }
        self.backend.as_mut()
    }
}

impl RhiDeviceApi for RhiDeviceVulkan {
    fn is_valid(&self) -> bool {
        self.backend.is_some()
    }

    fn begin_frame(&mut self) -> FrameContext {
        self.backend_mut("begin_frame").map_or_else(FrameContext::null, VulkanBackend::begin_frame)
    }

    fn submit_and_present_frame(&mut self, frame: FrameContext) -> PresentStatus {
        match self.backend_mut("submit_and_present_frame") {
            Some(backend) => backend.submit_and_present_frame(frame),
            None => PresentStatus::Failed,
        }
    }

    fn begin_render_pass(&self, frame: &FrameContext, desc: &RenderPassDescriptor) {
        if let Some(backend) = self.backend("begin_render_pass") {
            backend.begin_render_pass(frame, desc);
        }
    }

    fn end_render_pass(&self, frame: &FrameContext) {
        if let Some(backend) = self.backend("end_render_pass") {
            backend.end_render_pass(frame);
        }
    }

    fn texture_barrier(&self, frame: &FrameContext, desc: &TextureBarrierDescriptor) {
        if let Some(backend) = self.backend("texture_barrier") {
            backend.texture_barrier(frame, desc);
        }
    }

    fn buffer_barrier(&self, frame: &FrameContext, desc: &BufferBarrierDescriptor) {
        if let Some(backend) = self.backend("buffer_barrier") {
            backend.buffer_barrier(frame, desc);
        }
    }

    fn set_viewport(&self, frame: &FrameContext, viewport: &Viewport) {
        if let Some(backend) = self.backend("set_viewport") {
            backend.set_viewport(frame, viewport);
        }
    }

    fn set_scissor(&self, frame: &FrameContext, scissor: &Scissor) {
        if let Some(backend) = self.backend("set_scissor") {
            backend.set_scissor(frame, scissor);
        }
    }

    fn set_graphics_state(&self, frame: &FrameContext, state: &GraphicsStateDescriptor) {
        if let Some(backend) = self.backend("set_graphics_state") {
            backend.set_graphics_state(frame, state);
        }
    }

    fn draw(&self, frame: &FrameContext, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        if let Some(backend) = self.backend("draw") {
            backend.draw(frame, vertex_count, instance_count, first_vertex, first_instance);
        }
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
        if let Some(backend) = self.backend("draw_indexed") {
            backend.draw_indexed(frame, index_count, instance_count, first_index, vertex_offset, first_instance);
        }
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> TextureHandle {
        self.backend_mut("create_texture").map_or_else(TextureHandle::null, |backend| backend.create_texture(desc))
    }

    fn free_texture(&mut self, handle: TextureHandle) {
        if let Some(backend) = self.backend_mut("free_texture") {
            backend.free_texture(handle);
        }
    }

    fn create_shader_from_files(&mut self, params: &ShaderFileParams) -> anyhow::Result<ShaderHandle> {
        let sources = params.load()?;
        let name = params.display_name();
        Ok(self
            .backend_mut("create_shader_from_files")
            .map_or_else(ShaderHandle::null, |backend| backend.create_shader(&sources, &name)))
    }

    fn create_shader_from_source(&mut self, params: &ShaderSourceParams) -> ShaderHandle {
        self.backend_mut("create_shader_from_source")
            .map_or_else(ShaderHandle::null, |backend| backend.create_shader(params, "inline"))
    }

    fn free_shader(&mut self, handle: ShaderHandle) {
        if let Some(backend) = self.backend_mut("free_shader") {
            backend.pools.shaders.free(handle);
        }
    }

    fn bind_shader(&self, frame: &FrameContext, handle: ShaderHandle) {
        if let Some(backend) = self.backend("bind_shader") {
            backend.bind_shader(frame, handle);
        }
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BufferHandle {
        self.backend_mut("create_buffer").map_or_else(BufferHandle::null, |backend| backend.create_buffer(desc))
    }

    fn free_buffer(&mut self, handle: BufferHandle) {
        if let Some(backend) = self.backend_mut("free_buffer") {
            backend.pools.buffers.free(handle);
        }
    }

    fn update_buffer(&mut self, handle: BufferHandle, data: &[u8], offset: u64) {
        if let Some(backend) = self.backend_mut("update_buffer") {
            backend.update_buffer(handle, data, offset);
        }
    }

    fn bind_buffer(&self, frame: &FrameContext, handle: BufferHandle) {
        if let Some(backend) = self.backend("bind_buffer") {
            backend.bind_buffer(frame, handle);
        }
    }

    fn bind_uniform_buffer(&self, frame: &FrameContext, handle: BufferHandle, set: u32, binding: u32) {
        if let Some(backend) = self.backend("bind_uniform_buffer") {
            backend.bind_uniform_buffer(frame, handle, set, binding);
        }
    }

    fn set_push_constants(&self, frame: &FrameContext, stages: ShaderStageFlags, offset: u32, data: &[u8]) {
        if let Some(backend) = self.backend("set_push_constants") {
            backend.set_push_constants(frame, stages, offset, data);
        }
    }
}

impl Drop for RhiDeviceVulkan {
    fn drop(&mut self) {
        if let Some(backend) = self.backend.take() {
            log::info!("destroying vulkan device");
            backend.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::Handle;

    fn invalid_device() -> RhiDeviceVulkan {
        RhiDeviceVulkan { backend: None }
    }

    #[test]
    fn test_vk_version_packing() {
        let version = vk_version(Version::new(1, 2, 3));
        assert_eq!(vk::api_version_major(version), 1);
        assert_eq!(vk::api_version_minor(version), 2);
        assert_eq!(vk::api_version_patch(version), 3);
    }

    #[test]
    fn test_push_constant_range_checks() {
        assert!(check_push_constant_range(ShaderStageFlags::VERTEX, 0, 64).is_ok());
        assert!(check_push_constant_range(ShaderStageFlags::ALL_GRAPHICS, 64, 64).is_ok());
        assert!(check_push_constant_range(ShaderStageFlags::empty(), 0, 16).is_err());
        assert!(check_push_constant_range(ShaderStageFlags::FRAGMENT, 2, 16).is_err());
        assert!(check_push_constant_range(ShaderStageFlags::FRAGMENT, 0, 6).is_err());
        assert!(check_push_constant_range(ShaderStageFlags::FRAGMENT, 120, 16).is_err());
        assert!(check_push_constant_range(ShaderStageFlags::FRAGMENT, 0, 0).is_err());
    }

    #[test]
    fn test_standard_alpha_blend() {
        let equation = standard_alpha_blend();
        assert_eq!(equation.src_color_blend_factor, vk::BlendFactor::SRC_ALPHA);
        assert_eq!(equation.dst_color_blend_factor, vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
    }

    #[test]
    fn test_invalid_device_returns_sentinels() {
        let mut device = invalid_device();
        assert!(!device.is_valid());
        assert!(!device.begin_frame().is_valid());
        assert_eq!(device.submit_and_present_frame(FrameContext::null()), PresentStatus::Failed);
        assert!(device.create_texture(&TextureDescriptor::default()).is_null());
        assert!(
            device
                .create_buffer(&BufferDescriptor::new(16, BufferUsage::VERTEX_BUFFER, Default::default()))
                .is_null()
        );
        assert!(device.create_shader_from_source(&ShaderSourceParams::default()).is_null());
        assert_eq!(device.frames_in_flight(), 0);
        assert!(device.swapchain_extent().is_none());
    }

    #[test]
    fn test_invalid_device_skips_recording() {
        let mut device = invalid_device();
        let frame = FrameContext::null();
        device.set_viewport(&frame, &Viewport::from_size(1, 1));
        device.draw(&frame, 3, 1, 0, 0);
        device.bind_buffer(&frame, Handle::new(0, 0));
        device.update_buffer(Handle::new(0, 0), &[0; 4], 0);
        device.free_shader(Handle::new(0, 0));
    }

    #[test]
    fn test_shader_files_error_even_on_invalid_device() {
        let mut device = invalid_device();
        let params = ShaderFileParams {
            vertex: "/definitely/not/here.vert".into(),
            geometry: None,
            fragment: "/definitely/not/here.frag".into(),
        };
        assert!(device.create_shader_from_files(&params).is_err());
    }
}
