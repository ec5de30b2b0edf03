//! 基于 kestrel-gfx 的 Vulkan 后端

pub mod conversions;
pub mod device;
pub mod resources;
pub mod shader;
pub mod shader_compiler;
pub mod submission;
