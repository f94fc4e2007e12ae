// 应用层适配：把 winit 事件翻译成状态机 transition，并通过 softbuffer 呈现
// backbuffer。窗口与 WindowState 一对一绑定，由本结构独占持有。

use std::num::NonZeroU32;

use anyhow::anyhow;
use log::{debug, info};
use softbuffer::{Context, Surface};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{KeyCode, ModifiersState, PhysicalKey};
use winit::window::{Fullscreen, Window, WindowAttributes, WindowId};

use crate::dpi::DpiResolver;
use crate::geometry::{logical_to_physical, physical_to_logical, BASELINE_DPI};
use crate::present;
use crate::state::{RestoreGeometry, SizeTransition, StatusFlags, WindowMetrics, WindowState};

static WINDOW_TITLE: &str = "The Ray Tracer Challenge";

pub struct DisplayApp {
    state: WindowState,
    dpi: Box<dyn DpiResolver>,
    // 原始 Window Box 指针；通过 into_raw 获取，用于最终回收
    raw_window: *mut Window,
    window: Option<&'static Window>,
    surface: Option<Surface<&'static Window, &'static Window>>,
    _context: Option<Context<&'static Window>>,
    modifiers: ModifiersState,
    create_error: Option<anyhow::Error>,
    // set once destroy() has run; the window is never re-created
    torn_down: bool,
}

impl DisplayApp {
    pub fn new(dpi: Box<dyn DpiResolver>, client_size: (u32, u32)) -> Self {
        Self {
            state: WindowState::new(client_size, PhysicalPosition::new(0, 0)),
            dpi,
            raw_window: std::ptr::null_mut(),
            window: None,
            surface: None,
            _context: None,
            modifiers: ModifiersState::default(),
            create_error: None,
            torn_down: false,
        }
    }

    pub fn state(&self) -> &WindowState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut WindowState {
        &mut self.state
    }

    /// Fatal window-creation failure captured inside the event loop, if any.
    pub fn take_create_error(&mut self) -> Option<anyhow::Error> {
        self.create_error.take()
    }

    fn metrics(&self, window: &Window) -> WindowMetrics {
        WindowMetrics {
            position: window.outer_position().unwrap_or_default(),
            outer_size: window.outer_size(),
            dpi: self.dpi.monitor_dpi(window),
        }
    }

    /// Blit the backbuffer into the client area, stretching from the
    /// backbuffer's physical size to the DPI-scaled client size. With no
    /// backbuffer there is nothing to draw and the platform default stands.
    pub fn present(&mut self) {
        let Some(window) = self.window else { return };
        if !self.state.backbuffer().is_allocated() {
            return;
        }
        let dst = self.state.physical_client_size();
        let (Some(w), Some(h)) = (NonZeroU32::new(dst.width), NonZeroU32::new(dst.height)) else {
            return;
        };
        let Some(surface) = self.surface.as_mut() else { return };
        if surface.resize(w, h).is_err() {
            return;
        }
        let Ok(mut buffer) = surface.buffer_mut() else { return };
        let bb = self.state.backbuffer();
        present::stretch_blit(bb.pixels(), bb.width(), bb.height(), &mut buffer, dst.width, dst.height);
        window.pre_present_notify();
        let _ = buffer.present();
    }

    /// Alt+Enter: windowed ⇄ borderless fullscreen on the hosting monitor.
    fn toggle_fullscreen(&mut self) {
        let Some(window) = self.window else { return };
        if self.state.is_fullscreen() {
            if let Some(snap) = self.state.leave_fullscreen() {
                window.set_fullscreen(None);
                window.set_decorations(snap.decorated);
                window.set_outer_position(snap.position);
                let _ = window.request_inner_size(snap.size);
            }
        } else {
            let snap = RestoreGeometry {
                position: window.outer_position().unwrap_or_default(),
                size: window.inner_size(),
                decorated: window.is_decorated(),
            };
            self.state.enter_fullscreen(snap);
            window.set_decorations(false);
            window.set_fullscreen(Some(Fullscreen::Borderless(window.current_monitor())));
        }
    }

    // 真正资源销毁：释放 surface/context 并回收 Window Box
    pub fn destroy(&mut self) {
        self.torn_down = true;
        if self.raw_window.is_null() {
            return;
        }
        if let Some(window) = self.window.take() {
            window.set_visible(false);
        }
        if let Some(s) = self.surface.take() {
            drop(s);
        }
        if let Some(c) = self._context.take() {
            drop(c);
        }
        let raw = self.raw_window;
        self.raw_window = std::ptr::null_mut();
        unsafe {
            drop(Box::from_raw(raw));
        }
        debug!("window resources destroyed");
    }
}

impl ApplicationHandler for DisplayApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.torn_down {
            return;
        }

        // The window always starts on the primary display, centered and with
        // chrome; requested dimensions are clamped to the display size. The
        // user drags it elsewhere or toggles fullscreen with Alt+Enter.
        let (mut dim_x, mut dim_y) = self.state.client_size();
        let mut position = None;
        let monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next());
        if let Some(m) = monitor {
            let dpi = ((BASELINE_DPI as f64 * m.scale_factor()).round() as u32).max(1);
            let mon_pos = m.position();
            let mon_size = m.size();
            dim_x = dim_x.min(physical_to_logical(mon_size.width, dpi).max(1));
            dim_y = dim_y.min(physical_to_logical(mon_size.height, dpi).max(1));
            let phys_w = logical_to_physical(dim_x, dpi);
            let phys_h = logical_to_physical(dim_y, dpi);
            position = Some(PhysicalPosition::new(
                mon_pos.x + (mon_size.width.saturating_sub(phys_w) / 2) as i32,
                mon_pos.y + (mon_size.height.saturating_sub(phys_h) / 2) as i32,
            ));
        }

        let mut attrs = WindowAttributes::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size(LogicalSize::new(dim_x as f64, dim_y as f64));
        if let Some(pos) = position {
            attrs = attrs.with_position(pos);
        }

        let window = match event_loop.create_window(attrs) {
            Ok(w) => w,
            Err(e) => {
                self.create_error = Some(anyhow!("window creation failed: {e}"));
                event_loop.exit();
                return;
            }
        };
        let raw_window = Box::into_raw(Box::new(window));
        let window: &'static Window = unsafe { &*raw_window };

        let context = match Context::new(window) {
            Ok(c) => c,
            Err(e) => {
                self.create_error = Some(anyhow!("softbuffer context failed: {e}"));
                event_loop.exit();
                return;
            }
        };
        let mut surface = match Surface::new(&context, window) {
            Ok(s) => s,
            Err(e) => {
                self.create_error = Some(anyhow!("softbuffer surface failed: {e}"));
                event_loop.exit();
                return;
            }
        };

        let m = WindowMetrics {
            position: window.outer_position().unwrap_or_default(),
            outer_size: window.outer_size(),
            dpi: self.dpi.monitor_dpi(window),
        };
        let target = self.state.on_create(m);
        // reconcile the client area with the resolved DPI; decoration is
        // absorbed by the outer size
        let _ = window.request_inner_size(PhysicalSize::new(target.width.max(1), target.height.max(1)));
        if let (Some(w), Some(h)) = (
            NonZeroU32::new(target.width.max(1)),
            NonZeroU32::new(target.height.max(1)),
        ) {
            let _ = surface.resize(w, h);
        }

        self.raw_window = raw_window;
        self.window = Some(window);
        self.surface = Some(surface);
        self._context = Some(context);
        info!(
            "window created: {}x{} logical client at {:?} dpi",
            dim_x, dim_y, m.dpi
        );
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(window) = self.window else { return };
        if window.id() != window_id {
            return;
        }
        match event {
            WindowEvent::CloseRequested => {
                // hide first; actual teardown happens after the loop drains
                window.set_visible(false);
                self.state.on_close();
            }
            WindowEvent::Focused(focused) => {
                let minimized = window.is_minimized().unwrap_or(false);
                self.state.on_activate(focused, minimized);
            }
            WindowEvent::Resized(size) => {
                let minimized = window.is_minimized().unwrap_or(false)
                    || size.width == 0
                    || size.height == 0;
                let transition = if minimized {
                    SizeTransition::Minimized
                } else if !self.state.status().contains(StatusFlags::VISIBLE) {
                    SizeTransition::Restored
                } else {
                    SizeTransition::Other
                };
                let m = self.metrics(window);
                self.state.on_size(size, transition, m);
            }
            WindowEvent::Moved(position) => {
                // the window may now sit on a different monitor
                let mut m = self.metrics(window);
                m.position = position;
                self.state.on_move(m);
            }
            WindowEvent::ScaleFactorChanged {
                scale_factor,
                mut inner_size_writer,
            } => {
                let dpi = ((BASELINE_DPI as f64 * scale_factor).round() as u32).max(1);
                let suggested = window.outer_position().unwrap_or_default();
                let monitor_rect = window
                    .current_monitor()
                    .map(|m| (m.position(), m.size()))
                    .unwrap_or((suggested, window.outer_size()));
                let target =
                    self.state
                        .on_dpi_changed((dpi, dpi), suggested, window.outer_size(), monitor_rect);
                if target.width > 0 && target.height > 0 {
                    let _ = inner_size_writer
                        .request_inner_size(PhysicalSize::new(target.width, target.height));
                }
            }
            WindowEvent::Occluded(occluded) => {
                if occluded {
                    self.state.on_hidden();
                } else {
                    let m = self.metrics(window);
                    self.state.on_shown(m, window.inner_size());
                }
            }
            WindowEvent::ModifiersChanged(mods) => {
                self.modifiers = mods.state();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Enter),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } if self.modifiers.alt_key() => {
                self.toggle_fullscreen();
            }
            WindowEvent::RedrawRequested => {
                self.present();
            }
            _ => {}
        }
    }
}
