// rtc-display: lifecycle of a single window surface and its backbuffer —
// creation, DPI-aware sizing, resize reconciliation, fullscreen toggling,
// visibility tracking, and per-frame software presentation. Renderer code
// obtains the pixel memory through WindowState::frame_buffer and writes into
// it between ticks.

pub mod app;
pub mod backbuffer;
pub mod dpi;
pub mod geometry;
pub mod present;
pub mod state;
