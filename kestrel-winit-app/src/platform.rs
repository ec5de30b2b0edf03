//! 把 winit 窗口翻译成 RHI 需要的 `PlatformContext`

use std::ffi::CStr;
use std::rc::Rc;

use ash::vk;
use ash::vk::Handle;
use kestrel_rhi::platform::{PlatformContext, Version};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use winit::window::Window;

pub const APP_NAME: &str = "kestrel-triangle";

pub fn platform_context(window: &Rc<Window>) -> anyhow::Result<PlatformContext> {
    let display_handle = window.display_handle()?.as_raw();
    let window_handle = window.window_handle()?.as_raw();

    // window system 需要的 instance extension，例如 VK_KHR_surface
    let required_instance_extensions = ash_window::enumerate_required_extensions(display_handle)?
        .iter()
        .map(|ext| unsafe { CStr::from_ptr(*ext) }.to_string_lossy().into_owned())
        .collect();

    let size_window = window.clone();
    Ok(PlatformContext {
        app_name: APP_NAME.to_string(),
        app_version: Version::new(0, 1, 0),
        window_handle: Some(window_handle),
        required_instance_extensions,
        framebuffer_size: Box::new(move || {
            let size = size_window.inner_size();
            (size.width, size.height)
        }),
        create_surface: Box::new(move |raw_instance, raw_surface| {
            match create_surface(display_handle, window_handle, raw_instance) {
                Ok(surface) => {
                    *raw_surface = surface.as_raw();
                    true
                }
                Err(e) => {
                    log::error!("failed to create window surface: {e:#}");
                    false
                }
            }
        }),
        ..Default::default()
    })
}

/// RHI 只给出 raw instance，这里重新加载一份 instance 函数表来创建 surface
fn create_surface(
    display_handle: RawDisplayHandle,
    window_handle: RawWindowHandle,
    raw_instance: u64,
) -> anyhow::Result<vk::SurfaceKHR> {
    let entry = unsafe { ash::Entry::load() }?;
    let instance = unsafe { ash::Instance::load(entry.static_fn(), vk::Instance::from_raw(raw_instance)) };
    let surface = unsafe { ash_window::create_surface(&entry, &instance, display_handle, window_handle, None) }?;
    Ok(surface)
}
