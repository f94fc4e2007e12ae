use std::thread;
use std::time::Duration;

use anyhow::Result;
use log::info;
use winit::event_loop::EventLoop;
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};

use rtc_display::app::DisplayApp;
use rtc_display::dpi;
use rtc_display::state::{EventFlags, StatusFlags};

// 每 tick 约 16ms，尽力维持 60Hz；sleep 只是节拍，不是精确帧率
const TICK: Duration = Duration::from_millis(16);

fn main() -> Result<()> {
    env_logger::init();
    info!("starting rtc-display");

    let resolver = dpi::resolve();
    // DPI awareness must be declared before any other window/graphics call.
    resolver.declare_dpi_awareness();

    let mut event_loop = EventLoop::new()?;
    let mut app = DisplayApp::new(resolver, initial_client_size());

    // Update the main window at a set interval.
    loop {
        let status = event_loop.pump_app_events(Some(Duration::ZERO), &mut app);
        if let Some(err) = app.take_create_error() {
            return Err(err);
        }
        if matches!(status, PumpStatus::Exit(_)) {
            break;
        }
        let events = app.state_mut().take_events();
        if events.contains(EventFlags::DESTROYED) {
            break;
        }
        if app.state().status().contains(StatusFlags::VISIBLE) {
            app.present();
        }
        thread::sleep(TICK);
    }

    // Tear the window down, draining any final notifications.
    app.destroy();
    let _ = event_loop.pump_app_events(Some(Duration::ZERO), &mut app);
    info!("shut down");
    Ok(())
}

// RTC_WINDOW_SIZE=WxH 覆盖默认 800x600 逻辑客户区尺寸
fn initial_client_size() -> (u32, u32) {
    if let Ok(v) = std::env::var("RTC_WINDOW_SIZE") {
        if let Some((w, h)) = v.split_once('x') {
            if let (Ok(w), Ok(h)) = (w.trim().parse::<u32>(), h.trim().parse::<u32>()) {
                if w > 0 && h > 0 {
                    return (w, h);
                }
            }
        }
    }
    (800, 600)
}
