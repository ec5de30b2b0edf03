//! 演示用的三角形：vertex/index buffer、每帧更新的 uniform buffer 以及 push constant

use kestrel_crate_tools::resource::KestrelPath;
use kestrel_rhi::buffer::{BufferDescriptor, BufferMemoryAccess, BufferUsage, IndexBufferElement};
use kestrel_rhi::pipeline_state::{
    GraphicsStateDescriptor, VertexInputAttributeDescriptor, VertexInputBindingDescriptor, VertexInputState,
};
use kestrel_rhi::render_pass::{AttachmentDescriptor, RenderPassDescriptor};
use kestrel_rhi::shader::{ShaderFileParams, ShaderStageFlags};
use kestrel_rhi::types::{ClearValue, LoadOp, Scissor, VertexFormat, VertexInputRate, Viewport};
use kestrel_rhi::{BufferHandle, FrameContext, RhiDevice, RhiDeviceApi, ShaderHandle};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: glam::Vec3,
    color: glam::Vec3,
}

/// 与 triangle.vert 中的 `FrameUniform` 对应
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct FrameUniform {
    tint: glam::Vec4,
}

/// 与 triangle.vert 中的 `PushConstants` 对应
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct TrianglePushConstants {
    offset: glam::Vec2,
    scale: f32,
    _padding: f32,
}

/// Vulkan NDC：Y 轴向下
///
/// ```text
///           C (red)
///          / \
///         /   \
///        /     \
///       A-------B
///  (green)     (blue)
/// ```
const VERTICES: [Vertex; 3] = [
    Vertex {
        position: glam::vec3(-0.6, 0.5, 0.0),
        color: glam::vec3(0.0, 1.0, 0.0),
    },
    Vertex {
        position: glam::vec3(0.6, 0.5, 0.0),
        color: glam::vec3(0.0, 0.0, 1.0),
    },
    Vertex {
        position: glam::vec3(0.0, -0.6, 0.0),
        color: glam::vec3(1.0, 0.0, 0.0),
    },
];

const INDICES: [IndexBufferElement; 3] = [0, 1, 2];

const CLEAR_COLOR: [f32; 4] = [0.05, 0.05, 0.08, 1.0];

pub struct TriangleScene {
    shader: ShaderHandle,
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    uniform_buffer: BufferHandle,
    graphics_state: GraphicsStateDescriptor,
}

// 创建与销毁
impl TriangleScene {
    pub fn new(device: &mut RhiDevice) -> anyhow::Result<Self> {
        let shader = device.create_shader_from_files(&ShaderFileParams {
            vertex: KestrelPath::shader_path("triangle/triangle.vert"),
            geometry: None,
            fragment: KestrelPath::shader_path("triangle/triangle.frag"),
        })?;
        if shader.is_null() {
            anyhow::bail!("failed to create triangle shader");
        }

        let mut scene = Self {
            shader,
            vertex_buffer: BufferHandle::null(),
            index_buffer: BufferHandle::null(),
            uniform_buffer: BufferHandle::null(),
            graphics_state: Self::graphics_state(),
        };
        if let Err(e) = scene.create_buffers(device) {
            scene.destroy(device);
            return Err(e);
        }

        log::info!("triangle scene created");
        Ok(scene)
    }

    fn create_buffers(&mut self, device: &mut RhiDevice) -> anyhow::Result<()> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&VERTICES);
        self.vertex_buffer = device.create_buffer(
            &BufferDescriptor::new(vertex_bytes.len() as u64, BufferUsage::VERTEX_BUFFER, BufferMemoryAccess::CpuToGpu)
                .debug_name("triangle-vertices"),
        );

        let index_bytes: &[u8] = bytemuck::cast_slice(&INDICES);
        self.index_buffer = device.create_buffer(
            &BufferDescriptor::new(index_bytes.len() as u64, BufferUsage::INDEX_BUFFER, BufferMemoryAccess::CpuToGpu)
                .debug_name("triangle-indices"),
        );

        self.uniform_buffer = device.create_buffer(
            &BufferDescriptor::new(
                size_of::<FrameUniform>() as u64,
                BufferUsage::UNIFORM_BUFFER,
                BufferMemoryAccess::CpuToGpu,
            )
            .debug_name("triangle-frame-uniform"),
        );

        if self.vertex_buffer.is_null() || self.index_buffer.is_null() || self.uniform_buffer.is_null() {
            anyhow::bail!("failed to create triangle buffers");
        }

        // 不在帧内，第一帧开始时写入各自的拷贝
        device.update_buffer(self.vertex_buffer, vertex_bytes, 0);
        device.update_buffer(self.index_buffer, index_bytes, 0);
        Ok(())
    }

    fn graphics_state() -> GraphicsStateDescriptor {
        GraphicsStateDescriptor {
            vertex_input: VertexInputState {
                bindings: vec![VertexInputBindingDescriptor {
                    binding: 0,
                    stride: size_of::<Vertex>() as u32,
                    input_rate: VertexInputRate::Vertex,
                }],
                attributes: vec![
                    VertexInputAttributeDescriptor {
                        location: 0,
                        binding: 0,
                        format: VertexFormat::Float3,
                        offset: 0,
                    },
                    VertexInputAttributeDescriptor {
                        location: 1,
                        binding: 0,
                        format: VertexFormat::Float3,
                        offset: size_of::<glam::Vec3>() as u32,
                    },
                ],
            },
            ..Default::default()
        }
    }

    pub fn destroy(self, device: &mut RhiDevice) {
        device.free_buffer(self.uniform_buffer);
        device.free_buffer(self.index_buffer);
        device.free_buffer(self.vertex_buffer);
        device.free_shader(self.shader);
    }
}

// 绘制
impl TriangleScene {
    /// `elapsed` 为程序启动后经过的秒数
    pub fn record(&self, device: &mut RhiDevice, frame: &FrameContext, elapsed: f32) {
        // 帧内只写入当前 slot 的拷贝，其余拷贝在各自的帧开始时补写
        let uniform = FrameUniform {
            tint: tint_at(elapsed),
        };
        device.update_buffer(self.uniform_buffer, bytemuck::bytes_of(&uniform), 0);

        let (width, height) = frame.extent();
        device.begin_render_pass(frame, &RenderPassDescriptor {
            color_attachments: vec![AttachmentDescriptor::color(
                frame.backbuffer(),
                LoadOp::Clear,
                ClearValue::color(CLEAR_COLOR[0], CLEAR_COLOR[1], CLEAR_COLOR[2], CLEAR_COLOR[3]),
            )],
            ..Default::default()
        });

        device.set_viewport(frame, &Viewport::from_size(width, height));
        device.set_scissor(frame, &Scissor::from_size(width, height));
        device.set_graphics_state(frame, &self.graphics_state);

        device.bind_shader(frame, self.shader);
        device.bind_buffer(frame, self.vertex_buffer);
        device.bind_buffer(frame, self.index_buffer);
        device.bind_uniform_buffer(frame, self.uniform_buffer, 0, 0);

        let push_constants = TrianglePushConstants {
            offset: glam::vec2((elapsed * 0.8).sin() * 0.25, 0.0),
            scale: 1.0,
            _padding: 0.0,
        };
        device.set_push_constants(
            frame,
            ShaderStageFlags::VERTEX,
            0,
            bytemuck::bytes_of(&push_constants),
        );

        device.draw_indexed(frame, INDICES.len() as u32, 1, 0, 0, 0);
        device.end_render_pass(frame);
    }
}

/// 随时间缓慢变化的颜色，保证不会完全变暗
fn tint_at(elapsed: f32) -> glam::Vec4 {
    let wave = |phase: f32| 0.65 + 0.35 * (elapsed + phase).sin();
    glam::vec4(wave(0.0), wave(2.1), wave(4.2), 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_layouts_match_shader() {
        assert_eq!(size_of::<Vertex>(), 24);
        assert_eq!(size_of::<FrameUniform>(), 16);
        assert_eq!(size_of::<TrianglePushConstants>(), 16);
    }

    #[test]
    fn test_graphics_state_is_valid() {
        let state = TriangleScene::graphics_state();
        assert!(state.validate().is_ok());
        assert_eq!(state.vertex_input.bindings[0].stride, 24);
        assert_eq!(state.vertex_input.attributes[1].offset, 12);
    }

    #[test]
    fn test_tint_stays_bright() {
        for step in 0..64 {
            let tint = tint_at(step as f32 * 0.25);
            assert!(tint.x >= 0.3 && tint.y >= 0.3 && tint.z >= 0.3);
            assert_eq!(tint.w, 1.0);
        }
    }
}
