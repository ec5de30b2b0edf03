use std::rc::Rc;
use std::time::Instant;

use kestrel_rhi::{PresentStatus, RhiBackend, RhiDevice, RhiDeviceApi, RhiInitParams, create_rhi_device};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

use crate::platform::{APP_NAME, platform_context};
use crate::triangle::TriangleScene;

const WINDOW_EXTENT: [f64; 2] = [1200.0, 800.0];

/// 设备与场景，二者的生命周期一致
struct Renderer {
    device: RhiDevice,
    scene: TriangleScene,
}

impl Renderer {
    fn new(window: &Rc<Window>) -> anyhow::Result<Self> {
        let mut device = create_rhi_device(RhiInitParams {
            backend: RhiBackend::Auto,
            context: platform_context(window)?,
            settings: Default::default(),
        })?;
        if !device.is_valid() {
            anyhow::bail!("rhi device failed to initialize");
        }

        let scene = TriangleScene::new(&mut device)?;
        Ok(Self { device, scene })
    }

    fn destroy(self) {
        let Self { mut device, scene } = self;
        scene.destroy(&mut device);
        // device drop 时等待 GPU 空闲并销毁所有对象
    }

    /// 返回 false 表示 swapchain 已经不可用
    fn draw_frame(&mut self, elapsed: f32) -> bool {
        let frame = self.device.begin_frame();
        if !frame.is_valid() {
            return false;
        }

        self.scene.record(&mut self.device, &frame, elapsed);

        match self.device.submit_and_present_frame(frame) {
            PresentStatus::Presented => true,
            PresentStatus::Failed => {
                log::warn!("frame failed to submit or present");
                true
            }
            status => {
                log::info!("swapchain reported {:?}", status);
                false
            }
        }
    }
}

pub struct WinitApp {
    window: Option<Rc<Window>>,
    renderer: Option<Renderer>,
    start_time: Instant,
}

// 总的入口
impl WinitApp {
    pub fn run() -> anyhow::Result<()> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = Self {
            window: None,
            renderer: None,
            start_time: Instant::now(),
        };
        event_loop.run_app(&mut app)?;

        log::info!("end run.");
        app.destroy();
        Ok(())
    }

    fn destroy(&mut self) {
        if let Some(renderer) = self.renderer.take() {
            renderer.destroy();
        }
        // surface 已经随设备销毁，最后释放窗口
        self.window = None;
    }
}

// 渲染
impl WinitApp {
    fn is_minimized(&self) -> bool {
        self.window.as_ref().is_none_or(|window| {
            let size = window.inner_size();
            size.width == 0 || size.height == 0
        })
    }

    /// swapchain 不会原地重建，直接重新创建整个设备
    fn rebuild_renderer(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(renderer) = self.renderer.take() {
            renderer.destroy();
        }
        let Some(window) = self.window.as_ref() else {
            return;
        };
        match Renderer::new(window) {
            Ok(renderer) => self.renderer = Some(renderer),
            Err(e) => {
                log::error!("failed to rebuild renderer: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        if self.is_minimized() {
            return;
        }
        let elapsed = self.start_time.elapsed().as_secs_f32();
        let swapchain_usable = self.renderer.as_mut().is_some_and(|renderer| renderer.draw_frame(elapsed));
        if !swapchain_usable && self.renderer.is_some() {
            log::info!("rebuilding renderer for the new window size");
            self.rebuild_renderer(event_loop);
        }
    }
}

impl ApplicationHandler for WinitApp {
    // 建议在这里创建 window 和 renderer
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        log::info!("winit event: resumed");

        let window_attr = Window::default_attributes()
            .with_title(APP_NAME)
            .with_inner_size(winit::dpi::LogicalSize::new(WINDOW_EXTENT[0], WINDOW_EXTENT[1]));
        let window = match event_loop.create_window(window_attr) {
            Ok(window) => Rc::new(window),
            Err(e) => {
                log::error!("failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        match Renderer::new(&window) {
            Ok(renderer) => self.renderer = Some(renderer),
            Err(e) => {
                log::error!("failed to create renderer: {e:#}");
                event_loop.exit();
            }
        }
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                log::info!("escape pressed, exiting");
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        log::warn!("winit event: suspended");
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        log::info!("loop exiting");
    }
}
