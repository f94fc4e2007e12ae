// DPI resolution. Two implementations behind one interface: the native
// per-monitor DPI service, resolved by name from shcore.dll at startup, and a
// fallback that derives DPI from the scale factor winit reports for the
// hosting display. The rest of the crate depends only on the trait and never
// branches on which variant is active.

use log::debug;
use winit::window::Window;

use crate::geometry::BASELINE_DPI;

/// Runtime-resolved DPI capability table.
pub trait DpiResolver {
    /// Declare process DPI awareness. Must run before the event loop or any
    /// window is created.
    fn declare_dpi_awareness(&self);

    /// Effective DPI of the display hosting `window`. Always returns a usable
    /// value; baseline DPI is the last resort.
    fn monitor_dpi(&self, window: &Window) -> (u32, u32);
}

/// Select the DPI implementation for this process. A capability miss is not
/// an error; the fallback is substituted silently.
pub fn resolve() -> Box<dyn DpiResolver> {
    #[cfg(target_os = "windows")]
    if let Some(native) = native::NativeDpi::load() {
        debug!("per-monitor DPI entry points resolved from shcore.dll");
        return Box::new(native);
    }
    debug!("using scale-factor DPI fallback");
    Box::new(ScaleFactorDpi)
}

/// Fallback resolver: derives DPI from the hosting (or primary) display's
/// reported scale factor, defaulting to baseline DPI when no monitor can be
/// queried.
struct ScaleFactorDpi;

impl DpiResolver for ScaleFactorDpi {
    fn declare_dpi_awareness(&self) {
        // Legacy whole-process declaration when the per-monitor API is absent.
        #[cfg(target_os = "windows")]
        unsafe {
            let _ = windows::Win32::UI::HiDpi::SetProcessDPIAware();
        }
    }

    fn monitor_dpi(&self, window: &Window) -> (u32, u32) {
        let dpi = scale_factor_dpi(window);
        (dpi, dpi)
    }
}

fn scale_factor_dpi(window: &Window) -> u32 {
    let scale = window
        .current_monitor()
        .or_else(|| window.primary_monitor())
        .map(|m| m.scale_factor())
        .unwrap_or(1.0);
    ((BASELINE_DPI as f64 * scale).round() as u32).max(1)
}

#[cfg(target_os = "windows")]
mod native {
    use log::debug;
    use windows::core::{s, w, HRESULT};
    use windows::Win32::Foundation::{HMODULE, HWND};
    use windows::Win32::Graphics::Gdi::{MonitorFromWindow, HMONITOR, MONITOR_DEFAULTTONEAREST};
    use windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};
    use winit::raw_window_handle::{HasWindowHandle, RawWindowHandle};
    use winit::window::Window;

    use super::{scale_factor_dpi, DpiResolver};

    // shcore.dll entry points are loaded by name; hosts without the
    // per-monitor DPI service simply miss the module or the symbols.
    type SetProcessDpiAwarenessFn = unsafe extern "system" fn(value: i32) -> HRESULT;
    type GetDpiForMonitorFn =
        unsafe extern "system" fn(HMONITOR, i32, *mut u32, *mut u32) -> HRESULT;

    const MDT_EFFECTIVE_DPI: i32 = 0;
    const PROCESS_PER_MONITOR_DPI_AWARE: i32 = 2;

    pub(super) struct NativeDpi {
        set_process_dpi_awareness: SetProcessDpiAwarenessFn,
        get_dpi_for_monitor: GetDpiForMonitorFn,
        // keeps shcore.dll mapped for the process lifetime
        _module: HMODULE,
    }

    impl NativeDpi {
        pub(super) fn load() -> Option<Self> {
            let module = unsafe { LoadLibraryW(w!("shcore.dll")) }.ok()?;
            let get_dpi = unsafe { GetProcAddress(module, s!("GetDpiForMonitor")) }?;
            let set_aware = unsafe { GetProcAddress(module, s!("SetProcessDpiAwareness")) }?;
            Some(Self {
                set_process_dpi_awareness: unsafe { std::mem::transmute(set_aware) },
                get_dpi_for_monitor: unsafe { std::mem::transmute(get_dpi) },
                _module: module,
            })
        }
    }

    impl DpiResolver for NativeDpi {
        fn declare_dpi_awareness(&self) {
            let hr = unsafe { (self.set_process_dpi_awareness)(PROCESS_PER_MONITOR_DPI_AWARE) };
            if !hr.is_ok() {
                // Awareness may already be declared for the process (manifest).
                debug!("SetProcessDpiAwareness returned {hr:?}");
            }
        }

        fn monitor_dpi(&self, window: &Window) -> (u32, u32) {
            let Some(hwnd) = hwnd_of(window) else {
                return fallback(window);
            };
            let monitor = unsafe { MonitorFromWindow(hwnd, MONITOR_DEFAULTTONEAREST) };
            let mut dpi_x = 0u32;
            let mut dpi_y = 0u32;
            let hr = unsafe {
                (self.get_dpi_for_monitor)(monitor, MDT_EFFECTIVE_DPI, &mut dpi_x, &mut dpi_y)
            };
            if hr.is_ok() && dpi_x > 0 && dpi_y > 0 {
                (dpi_x, dpi_y)
            } else {
                fallback(window)
            }
        }
    }

    fn fallback(window: &Window) -> (u32, u32) {
        let dpi = scale_factor_dpi(window);
        (dpi, dpi)
    }

    fn hwnd_of(window: &Window) -> Option<HWND> {
        match window.window_handle().ok()?.as_raw() {
            RawWindowHandle::Win32(h) => Some(HWND(h.hwnd.get() as *mut _)),
            _ => None,
        }
    }
}
