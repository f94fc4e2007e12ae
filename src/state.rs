// Window state machine. One transition handler per inbound window-system
// notification, all operating on the single WindowState owned by the
// application handler. Handlers take plain payload values (sampled from the
// real window by the adapter in app.rs) so the machine can be driven
// headlessly. Geometry bookkeeping is logical pixels except `position`,
// which is a physical desktop coordinate; the backbuffer always tracks the
// physical client size.

use bitflags::bitflags;
use log::warn;
use winit::dpi::{PhysicalPosition, PhysicalSize};

use crate::backbuffer::{Backbuffer, FrameBuffer, NoBackbuffer};
use crate::geometry::{logical_to_physical, physical_to_logical, BASELINE_DPI};

bitflags! {
    /// Persistent description of the window's current state. Cleared
    /// entirely when the window is destroyed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StatusFlags: u32 {
        /// The window has been created.
        const CREATED = 1 << 0;
        /// The window is active and has input focus.
        const ACTIVE = 1 << 1;
        /// The window is currently visible on some display output.
        const VISIBLE = 1 << 2;
        /// The window is currently in fullscreen mode.
        const FULLSCREEN = 1 << 3;
    }
}

bitflags! {
    /// Edge-triggered record of what changed since the consumer last drained
    /// the set. Handlers OR bits in; the close transition overwrites the set
    /// with exactly DESTROYED; the presentation loop drains once per tick.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EventFlags: u32 {
        const CREATED = 1 << 0;
        const DESTROYED = 1 << 1;
        const SHOWN = 1 << 2;
        const HIDDEN = 1 << 3;
        const ACTIVATED = 1 << 4;
        const DEACTIVATED = 1 << 5;
        const SIZE_CHANGED = 1 << 6;
        const POSITION_CHANGED = 1 << 7;
    }
}

/// Visibility transition carried by a size notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeTransition {
    Minimized,
    Restored,
    Other,
}

/// Windowed-mode geometry and decoration captured on entering fullscreen and
/// replayed verbatim when leaving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreGeometry {
    pub position: PhysicalPosition<i32>,
    pub size: PhysicalSize<u32>,
    pub decorated: bool,
}

/// Window geometry sampled by the adapter immediately before a transition.
#[derive(Debug, Clone, Copy)]
pub struct WindowMetrics {
    /// Upper-left corner of the window in physical desktop coordinates.
    pub position: PhysicalPosition<i32>,
    /// Outer window size (borders and chrome included), physical pixels.
    pub outer_size: PhysicalSize<u32>,
    /// Effective DPI of the hosting display.
    pub dpi: (u32, u32),
}

/// All state associated with the one window, including the backbuffer it
/// exclusively owns.
#[derive(Debug)]
pub struct WindowState {
    status: StatusFlags,
    events: EventFlags,
    position: PhysicalPosition<i32>,
    /// Outer window size in logical pixels.
    window_size: (u32, u32),
    /// Client area size in logical pixels.
    client_size: (u32, u32),
    output_dpi: (u32, u32),
    restore: Option<RestoreGeometry>,
    backbuffer: Backbuffer,
}

impl WindowState {
    /// State for a window that has not been created yet: requested logical
    /// client size and the desired position, baseline DPI until the create
    /// transition resolves the real value.
    pub fn new(client_size: (u32, u32), position: PhysicalPosition<i32>) -> Self {
        Self {
            status: StatusFlags::empty(),
            events: EventFlags::empty(),
            position,
            window_size: client_size,
            client_size,
            output_dpi: (BASELINE_DPI, BASELINE_DPI),
            restore: None,
            backbuffer: Backbuffer::default(),
        }
    }

    pub fn status(&self) -> StatusFlags {
        self.status
    }

    pub fn events(&self) -> EventFlags {
        self.events
    }

    /// Drain the accumulated event set: returns the current bits and clears
    /// storage. Called once per presentation tick.
    pub fn take_events(&mut self) -> EventFlags {
        std::mem::take(&mut self.events)
    }

    pub fn position(&self) -> PhysicalPosition<i32> {
        self.position
    }

    pub fn window_size(&self) -> (u32, u32) {
        self.window_size
    }

    pub fn client_size(&self) -> (u32, u32) {
        self.client_size
    }

    pub fn output_dpi(&self) -> (u32, u32) {
        self.output_dpi
    }

    pub fn is_fullscreen(&self) -> bool {
        self.status.contains(StatusFlags::FULLSCREEN)
    }

    pub fn backbuffer(&self) -> &Backbuffer {
        &self.backbuffer
    }

    /// The client area in physical pixels at the current DPI.
    pub fn physical_client_size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(
            logical_to_physical(self.client_size.0, self.output_dpi.0),
            logical_to_physical(self.client_size.1, self.output_dpi.1),
        )
    }

    /// Retrieve a description of the current framebuffer for renderer code.
    /// Fails only if no backbuffer has been allocated yet.
    pub fn frame_buffer(&mut self) -> Result<FrameBuffer<'_>, NoBackbuffer> {
        self.backbuffer.frame_buffer()
    }

    /// Create transition. Resolves the physical client size for the requested
    /// logical size at the hosting display's DPI, allocates the first
    /// backbuffer, and returns the physical client size the adapter should
    /// ask the window system for (the outer size then absorbs decoration).
    pub fn on_create(&mut self, metrics: WindowMetrics) -> PhysicalSize<u32> {
        let (dpi_x, dpi_y) = metrics.dpi;
        let phys_w = logical_to_physical(self.client_size.0, dpi_x);
        let phys_h = logical_to_physical(self.client_size.1, dpi_y);

        self.status = StatusFlags::CREATED;
        self.events = EventFlags::CREATED | EventFlags::SIZE_CHANGED | EventFlags::POSITION_CHANGED;
        self.output_dpi = metrics.dpi;
        self.position = metrics.position;
        self.window_size = (
            physical_to_logical(metrics.outer_size.width, dpi_x),
            physical_to_logical(metrics.outer_size.height, dpi_y),
        );
        if let Err(e) = self.backbuffer.resize(phys_w, phys_h) {
            warn!("initial backbuffer allocation failed: {e}");
        }
        PhysicalSize::new(phys_w, phys_h)
    }

    /// Close transition. The window is hidden and marked destroyed; event
    /// flags are overwritten, not merged, so a destroy observed mid-tick wins
    /// over anything accumulated earlier in the same tick.
    pub fn on_close(&mut self) {
        self.status = StatusFlags::empty();
        self.events = EventFlags::DESTROYED;
    }

    /// Activate transition: focus gained/lost, plus minimize detection.
    pub fn on_activate(&mut self, focused: bool, minimized: bool) {
        if focused {
            self.status |= StatusFlags::ACTIVE | StatusFlags::VISIBLE;
            self.events |= EventFlags::ACTIVATED;
        } else {
            self.status -= StatusFlags::ACTIVE;
            self.events |= EventFlags::DEACTIVATED;
        }
        if minimized {
            self.status -= StatusFlags::VISIBLE;
            self.events |= EventFlags::HIDDEN;
        }
    }

    /// DPI-changed transition. Windowed: the window follows the OS-suggested
    /// origin and keeps its logical client size, so the physical client size
    /// is recomputed for the new DPI. Fullscreen: a borderless window must
    /// fill the hosting monitor, not follow decorated-window suggestions, so
    /// geometry is re-derived from the monitor rectangle. Returns the
    /// physical client size the adapter should apply.
    pub fn on_dpi_changed(
        &mut self,
        dpi: (u32, u32),
        suggested: PhysicalPosition<i32>,
        outer_size: PhysicalSize<u32>,
        monitor_rect: (PhysicalPosition<i32>, PhysicalSize<u32>),
    ) -> PhysicalSize<u32> {
        let (dpi_x, dpi_y) = dpi;
        let (target, origin, outer) = if !self.is_fullscreen() {
            if suggested != self.position {
                self.events |= EventFlags::POSITION_CHANGED;
            }
            let client = PhysicalSize::new(
                logical_to_physical(self.client_size.0, dpi_x),
                logical_to_physical(self.client_size.1, dpi_y),
            );
            (client, suggested, outer_size)
        } else {
            let (mon_origin, mon_size) = monitor_rect;
            (mon_size, mon_origin, mon_size)
        };

        self.output_dpi = dpi;
        self.position = origin;
        self.window_size = (
            physical_to_logical(outer.width, dpi_x),
            physical_to_logical(outer.height, dpi_y),
        );
        self.events |= EventFlags::SIZE_CHANGED;
        if let Err(e) = self.backbuffer.resize(target.width, target.height) {
            warn!("backbuffer resize after DPI change failed: {e}");
        }
        target
    }

    /// Move transition. The window may have crossed onto another monitor, so
    /// the adapter re-resolves DPI before calling in.
    pub fn on_move(&mut self, metrics: WindowMetrics) {
        let (dpi_x, dpi_y) = metrics.dpi;
        self.events |= EventFlags::POSITION_CHANGED;
        self.position = metrics.position;
        self.window_size = (
            physical_to_logical(metrics.outer_size.width, dpi_x),
            physical_to_logical(metrics.outer_size.height, dpi_y),
        );
        self.output_dpi = metrics.dpi;
    }

    /// Size transition. Minimized (or unchanged-size) notifications update
    /// visibility status only; a visible window whose physical client size
    /// actually changed gets its backbuffer resized and full geometry
    /// bookkeeping refreshed.
    pub fn on_size(
        &mut self,
        client_px: PhysicalSize<u32>,
        transition: SizeTransition,
        metrics: WindowMetrics,
    ) {
        let (dpi_x, dpi_y) = metrics.dpi;
        let log_w = physical_to_logical(client_px.width, dpi_x);
        let log_h = physical_to_logical(client_px.height, dpi_y);

        let mut flags = EventFlags::SIZE_CHANGED;
        let mut status = self.status;
        let visible = match transition {
            SizeTransition::Minimized => {
                flags |= EventFlags::HIDDEN;
                status -= StatusFlags::VISIBLE;
                false
            }
            SizeTransition::Restored => {
                flags |= EventFlags::SHOWN;
                status |= StatusFlags::VISIBLE;
                true
            }
            SizeTransition::Other => {
                status |= StatusFlags::VISIBLE;
                true
            }
        };
        let did_size = (log_w, log_h) != self.client_size;
        if !visible || !did_size {
            self.status = status;
            return;
        }

        // The window is visible, and the size did change.
        if let Err(e) = self.backbuffer.resize(client_px.width, client_px.height) {
            warn!("backbuffer resize failed: {e}");
        }
        // mirror the fullscreen bit through the rebuilt status set
        if self.status.contains(StatusFlags::FULLSCREEN) {
            status |= StatusFlags::FULLSCREEN;
        } else {
            status -= StatusFlags::FULLSCREEN;
        }

        self.status = status;
        self.events |= flags;
        self.position = metrics.position;
        self.window_size = (
            physical_to_logical(metrics.outer_size.width, dpi_x),
            physical_to_logical(metrics.outer_size.height, dpi_y),
        );
        self.client_size = (log_w, log_h);
        self.output_dpi = metrics.dpi;
    }

    /// Show transition. Geometry and DPI are re-resolved from the current
    /// window rectangle and the backbuffer is brought in sync with the
    /// physical client size.
    pub fn on_shown(&mut self, metrics: WindowMetrics, client_px: PhysicalSize<u32>) {
        let (dpi_x, dpi_y) = metrics.dpi;
        self.status |= StatusFlags::VISIBLE;
        self.events |= EventFlags::SHOWN;
        self.position = metrics.position;
        self.window_size = (
            physical_to_logical(metrics.outer_size.width, dpi_x),
            physical_to_logical(metrics.outer_size.height, dpi_y),
        );
        self.client_size = (
            physical_to_logical(client_px.width, dpi_x),
            physical_to_logical(client_px.height, dpi_y),
        );
        self.output_dpi = metrics.dpi;
        if let Err(e) = self.backbuffer.resize(client_px.width, client_px.height) {
            warn!("backbuffer resize on show failed: {e}");
        }
    }

    /// Hide transition.
    pub fn on_hidden(&mut self) {
        self.status -= StatusFlags::VISIBLE;
        self.status -= StatusFlags::ACTIVE;
        self.events |= EventFlags::HIDDEN | EventFlags::DEACTIVATED;
    }

    /// Enter fullscreen: snapshot the windowed geometry for later
    /// restoration. The FULLSCREEN flag is set iff a snapshot is held.
    pub fn enter_fullscreen(&mut self, snapshot: RestoreGeometry) {
        self.restore = Some(snapshot);
        self.status |= StatusFlags::FULLSCREEN;
    }

    /// Leave fullscreen: hand the snapshot back for the adapter to replay.
    /// Returns None when not in fullscreen mode.
    pub fn leave_fullscreen(&mut self) -> Option<RestoreGeometry> {
        let snapshot = self.restore.take()?;
        self.status -= StatusFlags::FULLSCREEN;
        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(x: i32, y: i32, outer_w: u32, outer_h: u32, dpi: u32) -> WindowMetrics {
        WindowMetrics {
            position: PhysicalPosition::new(x, y),
            outer_size: PhysicalSize::new(outer_w, outer_h),
            dpi: (dpi, dpi),
        }
    }

    fn created_at_96() -> WindowState {
        let mut ws = WindowState::new((800, 600), PhysicalPosition::new(160, 90));
        ws.on_create(metrics(160, 90, 816, 639, 96));
        ws
    }

    #[test]
    fn create_at_baseline_dpi_allocates_exact_backbuffer() {
        let mut ws = WindowState::new((800, 600), PhysicalPosition::new(160, 90));
        let target = ws.on_create(metrics(160, 90, 816, 639, 96));
        assert_eq!(target, PhysicalSize::new(800, 600));
        assert_eq!(ws.status(), StatusFlags::CREATED);
        assert!(ws
            .events()
            .contains(EventFlags::CREATED | EventFlags::SIZE_CHANGED | EventFlags::POSITION_CHANGED));
        let fb = ws.frame_buffer().unwrap();
        assert_eq!((fb.width, fb.height, fb.stride), (800, 600, 3200));
        assert_eq!(fb.pixels.len(), 800 * 600 * 4);
    }

    #[test]
    fn dpi_change_windowed_moves_and_resizes() {
        let mut ws = created_at_96();
        ws.take_events();
        let target = ws.on_dpi_changed(
            (192, 192),
            PhysicalPosition::new(100, 100),
            PhysicalSize::new(1632, 1278),
            (PhysicalPosition::new(0, 0), PhysicalSize::new(3840, 2160)),
        );
        assert_eq!(target, PhysicalSize::new(1600, 1200));
        assert!(ws.events().contains(EventFlags::SIZE_CHANGED));
        assert!(ws.events().contains(EventFlags::POSITION_CHANGED));
        assert_eq!(ws.position(), PhysicalPosition::new(100, 100));
        assert_eq!(ws.output_dpi(), (192, 192));
        assert_eq!(ws.backbuffer().width(), 1600);
        assert_eq!(ws.backbuffer().height(), 1200);
        // logical client size is untouched by a DPI change
        assert_eq!(ws.client_size(), (800, 600));
    }

    #[test]
    fn dpi_change_same_position_sets_no_position_event() {
        let mut ws = created_at_96();
        ws.take_events();
        ws.on_dpi_changed(
            (120, 120),
            PhysicalPosition::new(160, 90),
            PhysicalSize::new(1020, 799),
            (PhysicalPosition::new(0, 0), PhysicalSize::new(1920, 1080)),
        );
        assert!(!ws.events().contains(EventFlags::POSITION_CHANGED));
        assert!(ws.events().contains(EventFlags::SIZE_CHANGED));
    }

    #[test]
    fn dpi_change_fullscreen_fills_monitor() {
        let mut ws = created_at_96();
        ws.enter_fullscreen(RestoreGeometry {
            position: PhysicalPosition::new(160, 90),
            size: PhysicalSize::new(800, 600),
            decorated: true,
        });
        let target = ws.on_dpi_changed(
            (144, 144),
            PhysicalPosition::new(50, 50),
            PhysicalSize::new(800, 600),
            (PhysicalPosition::new(1920, 0), PhysicalSize::new(2560, 1440)),
        );
        assert_eq!(target, PhysicalSize::new(2560, 1440));
        assert_eq!(ws.position(), PhysicalPosition::new(1920, 0));
        assert_eq!(ws.backbuffer().width(), 2560);
    }

    #[test]
    fn minimized_size_touches_visibility_only() {
        let mut ws = created_at_96();
        ws.on_activate(true, false);
        let before = ws.events();
        // carried dimensions must be ignored entirely while minimized
        ws.on_size(
            PhysicalSize::new(123, 45),
            SizeTransition::Minimized,
            metrics(160, 90, 816, 639, 96),
        );
        assert!(!ws.status().contains(StatusFlags::VISIBLE));
        assert_eq!(ws.events(), before);
        assert_eq!(ws.backbuffer().width(), 800);
        assert_eq!(ws.backbuffer().height(), 600);
    }

    #[test]
    fn unchanged_size_sets_no_size_event() {
        let mut ws = created_at_96();
        ws.take_events();
        ws.on_size(
            PhysicalSize::new(800, 600),
            SizeTransition::Other,
            metrics(160, 90, 816, 639, 96),
        );
        assert!(ws.status().contains(StatusFlags::VISIBLE));
        assert!(!ws.events().contains(EventFlags::SIZE_CHANGED));
    }

    #[test]
    fn visible_size_change_resizes_backbuffer() {
        let mut ws = created_at_96();
        ws.take_events();
        ws.on_size(
            PhysicalSize::new(1024, 768),
            SizeTransition::Other,
            metrics(160, 90, 1040, 807, 96),
        );
        assert!(ws.events().contains(EventFlags::SIZE_CHANGED));
        assert_eq!(ws.client_size(), (1024, 768));
        assert_eq!(ws.backbuffer().width(), 1024);
        assert_eq!(ws.backbuffer().height(), 768);
    }

    #[test]
    fn restored_size_change_marks_shown() {
        let mut ws = created_at_96();
        ws.on_size(
            PhysicalSize::new(0, 0),
            SizeTransition::Minimized,
            metrics(160, 90, 816, 639, 96),
        );
        ws.take_events();
        ws.on_size(
            PhysicalSize::new(1024, 768),
            SizeTransition::Restored,
            metrics(160, 90, 1040, 807, 96),
        );
        assert!(ws.status().contains(StatusFlags::VISIBLE));
        assert!(ws.events().contains(EventFlags::SHOWN | EventFlags::SIZE_CHANGED));
    }

    #[test]
    fn close_overwrites_pending_events() {
        let mut ws = created_at_96();
        ws.on_activate(true, false);
        assert_ne!(ws.events(), EventFlags::DESTROYED);
        ws.on_close();
        assert_eq!(ws.events(), EventFlags::DESTROYED);
        assert_eq!(ws.status(), StatusFlags::empty());
    }

    #[test]
    fn take_events_drains_the_set() {
        let mut ws = created_at_96();
        assert_ne!(ws.take_events(), EventFlags::empty());
        assert_eq!(ws.events(), EventFlags::empty());
        assert_eq!(ws.take_events(), EventFlags::empty());
    }

    #[test]
    fn activate_and_deactivate() {
        let mut ws = created_at_96();
        ws.take_events();
        ws.on_activate(true, false);
        assert!(ws.status().contains(StatusFlags::ACTIVE | StatusFlags::VISIBLE));
        assert!(ws.events().contains(EventFlags::ACTIVATED));
        ws.on_activate(false, false);
        assert!(!ws.status().contains(StatusFlags::ACTIVE));
        assert!(ws.events().contains(EventFlags::DEACTIVATED));
        ws.on_activate(false, true);
        assert!(!ws.status().contains(StatusFlags::VISIBLE));
        assert!(ws.events().contains(EventFlags::HIDDEN));
    }

    #[test]
    fn shown_resyncs_geometry_and_backbuffer() {
        let mut ws = created_at_96();
        ws.take_events();
        ws.on_shown(metrics(10, 20, 1020, 799, 120), PhysicalSize::new(1000, 750));
        assert!(ws.status().contains(StatusFlags::VISIBLE));
        assert!(ws.events().contains(EventFlags::SHOWN));
        assert_eq!(ws.client_size(), (800, 600));
        assert_eq!(ws.output_dpi(), (120, 120));
        assert_eq!(ws.backbuffer().width(), 1000);
        assert_eq!(ws.backbuffer().height(), 750);
    }

    #[test]
    fn hidden_clears_visible_and_active() {
        let mut ws = created_at_96();
        ws.on_activate(true, false);
        ws.take_events();
        ws.on_hidden();
        assert!(!ws.status().contains(StatusFlags::VISIBLE));
        assert!(!ws.status().contains(StatusFlags::ACTIVE));
        assert!(ws.events().contains(EventFlags::HIDDEN | EventFlags::DEACTIVATED));
    }

    #[test]
    fn fullscreen_round_trip_restores_snapshot_exactly() {
        let mut ws = created_at_96();
        let snapshot = RestoreGeometry {
            position: PhysicalPosition::new(-7, 42),
            size: PhysicalSize::new(811, 601),
            decorated: true,
        };
        assert!(!ws.is_fullscreen());
        ws.enter_fullscreen(snapshot);
        assert!(ws.is_fullscreen());
        let restored = ws.leave_fullscreen().unwrap();
        assert_eq!(restored, snapshot);
        assert!(!ws.is_fullscreen());
        assert!(ws.leave_fullscreen().is_none());
    }

    #[test]
    fn move_updates_position_and_dpi() {
        let mut ws = created_at_96();
        ws.take_events();
        ws.on_move(metrics(2000, 300, 1632, 1278, 192));
        assert!(ws.events().contains(EventFlags::POSITION_CHANGED));
        assert_eq!(ws.position(), PhysicalPosition::new(2000, 300));
        assert_eq!(ws.output_dpi(), (192, 192));
        assert_eq!(ws.window_size(), (816, 639));
    }
}
