//! Vulkan 的薄封装层
//!
//! 每个对象只负责自己的创建、销毁以及相关的命令录制，不做任何生命周期管理。
//! 所有对象都需要显式调用 `destroy`，调用顺序由上层的 RHI 设备保证。
//! 需要 device 函数指针的对象持有一份 `Rc<GfxDevice>`。

pub mod commands;
pub mod foundation;
pub mod pipelines;
pub mod resources;
pub mod swapchain;
