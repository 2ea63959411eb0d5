//! Event Handling
//!
//! Notification queues for the output composition pipeline. Changes
//! made to an Output or an OutputViewport push events into these
//! queues in the same control-flow step that caused the change, and
//! consumers drain them with `pop_event` on their next tick.
// Austin Shafer - 2024
use crate::viewport::LayerFlags;

use std::collections::VecDeque;

/// Events generated by an Output
///
/// This is the only inbound event traffic the composition core
/// consumes: the display's hardware mode changed, or the display
/// went away entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// The output's mode, transform or content pipeline changed.
    /// Anything presented before this event is considered stale.
    ModeChanged { size: (u32, u32), refresh: i32 },
    /// The output's hardware is gone. The claiming viewport should
    /// tear itself down when it sees this.
    Destroyed,
}

/// per-Output event queue
///
/// Only the viewport claiming the output drains this, so it is a
/// simple single-consumer queue.
#[derive(Debug)]
pub struct OutputEventSystem {
    oes_queue: VecDeque<OutputEvent>,
}

impl OutputEventSystem {
    pub fn new() -> Self {
        Self {
            oes_queue: VecDeque::new(),
        }
    }

    /// Add a mode change to the queue
    ///
    /// This signifies that the size, refresh or orientation of the
    /// output changed and any cached buffers are stale.
    pub fn add_event_mode_changed(&mut self, size: (u32, u32), refresh: i32) {
        self.oes_queue
            .push_back(OutputEvent::ModeChanged { size, refresh });
    }

    /// Notify that this output has been destroyed
    ///
    /// This is not optional, it will always be delivered so that the
    /// claiming viewport can release the output.
    pub fn add_event_destroyed(&mut self) {
        self.oes_queue.push_back(OutputEvent::Destroyed);
    }

    /// Get the next currently unhandled event
    pub fn pop_event(&mut self) -> Option<OutputEvent> {
        self.oes_queue.pop_front()
    }
}

/// Events published by an OutputViewport
///
/// One event is pushed for every observable property change. Setting
/// a property to its current value pushes nothing, which is how
/// consumers can rely on "unchanged means silent".
#[derive(Debug, Clone, PartialEq)]
pub enum ViewportEvent {
    OutputChanged,
    InputChanged,
    ExtraSourceChanged,
    DevicePixelRatioChanged { ratio: f64 },
    ImplicitSizeChanged { width: f64, height: f64 },
    OffscreenChanged { offscreen: bool },
    PreserveColorContentsChanged { preserve: bool },
    LiveChanged { live: bool },
    LayerFlagsChanged { flags: LayerFlags },
    /// The buffer cache was enabled or disabled
    CacheBufferChanged { enabled: bool },
    /// A full composite finished and a fresh buffer is available
    RedrawComplete,
}

/// per-OutputViewport event queue
///
/// This is shared between the viewport, which pushes property
/// notifications, and its BufferRenderer, which pushes frame
/// completion notifications.
#[derive(Debug)]
pub struct ViewportEventSystem {
    ves_queue: VecDeque<ViewportEvent>,
}

impl ViewportEventSystem {
    pub fn new() -> Self {
        Self {
            ves_queue: VecDeque::new(),
        }
    }

    pub fn add_event_output_changed(&mut self) {
        self.ves_queue.push_back(ViewportEvent::OutputChanged);
    }

    pub fn add_event_input_changed(&mut self) {
        self.ves_queue.push_back(ViewportEvent::InputChanged);
    }

    pub fn add_event_extra_source_changed(&mut self) {
        self.ves_queue.push_back(ViewportEvent::ExtraSourceChanged);
    }

    pub fn add_event_device_pixel_ratio_changed(&mut self, ratio: f64) {
        self.ves_queue
            .push_back(ViewportEvent::DevicePixelRatioChanged { ratio });
    }

    pub fn add_event_implicit_size_changed(&mut self, width: f64, height: f64) {
        self.ves_queue
            .push_back(ViewportEvent::ImplicitSizeChanged { width, height });
    }

    pub fn add_event_offscreen_changed(&mut self, offscreen: bool) {
        self.ves_queue
            .push_back(ViewportEvent::OffscreenChanged { offscreen });
    }

    pub fn add_event_preserve_color_contents_changed(&mut self, preserve: bool) {
        self.ves_queue
            .push_back(ViewportEvent::PreserveColorContentsChanged { preserve });
    }

    pub fn add_event_live_changed(&mut self, live: bool) {
        self.ves_queue.push_back(ViewportEvent::LiveChanged { live });
    }

    pub fn add_event_layer_flags_changed(&mut self, flags: LayerFlags) {
        self.ves_queue
            .push_back(ViewportEvent::LayerFlagsChanged { flags });
    }

    pub fn add_event_cache_buffer_changed(&mut self, enabled: bool) {
        self.ves_queue
            .push_back(ViewportEvent::CacheBufferChanged { enabled });
    }

    pub fn add_event_redraw_complete(&mut self) {
        self.ves_queue.push_back(ViewportEvent::RedrawComplete);
    }

    /// Get the next currently unhandled event
    ///
    /// The app should do this in its main loop after dispatching.
    pub fn pop_event(&mut self) -> Option<ViewportEvent> {
        self.ves_queue.pop_front()
    }
}
