//! # Cirrus
//!
//! Cirrus is the output composition core of a wayland-style
//! compositor. It decides, for each display output, which set of
//! renderable sources is combined into a final buffer, when that
//! buffer is stale and must be recomposited, and how the result is
//! exposed as a texture to downstream consumers.
//!
//! The pieces fit together like this:
//! * An `Output` is one physical or virtual display with a hardware
//!   mode and a scanout transform.
//! * An `OutputViewport` claims exactly one `Output` and owns the
//!   `BufferRenderer` producing frames for it.
//! * The renderer composites an ordered `RenderSourceList` into a
//!   `RenderBuffer`, reusing its `BufferCache` when nothing changed.
//! * `BufferTextureProvider` republishes the result read-only to
//!   whatever is consuming the frames.
//!
//! The host render window drives the whole thing: it implements
//! `OutputRenderWindow`, gets `attach`/`detach` calls bracketing a
//! viewport's bound lifetime, and calls `compose` on its render
//! loop tick.
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use cirrus::{Mode, Output, OutputRenderWindow, OutputViewport, RenderSource, ViewportId};
//!
//! struct Window;
//! impl OutputRenderWindow for Window {
//!     fn attach(&mut self, _viewport: ViewportId) {}
//!     fn detach(&mut self, _viewport: ViewportId) {}
//!     fn set_output_scale(&mut self, _viewport: ViewportId, _scale: f32) {}
//!     fn rotate_output(&mut self, _viewport: ViewportId, _transform: cirrus::Transform) {}
//!     fn render(&mut self, _viewport: ViewportId, _commit: bool) {}
//! }
//!
//! let output = Output::new("DP-1", Mode::new(1920, 1080, 60_000));
//! let window = Rc::new(RefCell::new(Window));
//!
//! let mut viewport = OutputViewport::new();
//! viewport.set_render_window(window);
//! viewport.set_output(Some(output.clone()));
//! viewport.component_complete();
//!
//! let surf = RenderSource::new(0.0, 0.0, 256.0, 256.0);
//! surf.set_color((1.0, 0.0, 0.0, 1.0));
//! viewport.set_input(Some(surf));
//!
//! let buffer = viewport.compose(true).unwrap();
//! assert_eq!(buffer.size(), (1920, 1080));
//! ```
// Austin Shafer - 2024

extern crate bitflags;
extern crate cgmath;
extern crate lazy_static;
extern crate thiserror;
extern crate utils;

mod event;
mod input;
mod output;
mod renderer;
mod source;
mod viewport;
mod window;
#[cfg(test)]
mod tests;

pub use event::{OutputEvent, OutputEventSystem, ViewportEvent, ViewportEventSystem};
pub use input::{DeviceType, InputDevice, Seat, DEVICE_ID_BASE};
pub use input::{
    DEVICE_KIND_KEYBOARD, DEVICE_KIND_POINTER, DEVICE_KIND_SWITCH, DEVICE_KIND_TABLET,
    DEVICE_KIND_TABLET_PAD, DEVICE_KIND_TOUCH,
};
pub use output::{Mode, Output, Transform};
pub use renderer::{BufferCache, BufferRenderer, BufferTextureProvider, FrameParams, RenderBuffer};
pub use source::{RenderSource, RenderSourceList, SourceSlot};
pub use viewport::{LayerFlags, OutputViewport};
pub use window::OutputRenderWindow;

// Re-export some things from utils so clients can use them
pub use utils::region::Rect;
pub use utils::{anyhow, Context, Error};

use thiserror::Error as ThisError;

/// Identity of a viewport within its render window
pub type ViewportId = u64;

/// Errors the composition core can produce
///
/// Recoverable usage errors are logged and rejected at the call
/// site instead of surfacing here; these are the failures a caller
/// can actually branch on.
#[allow(non_camel_case_types)]
#[derive(ThisError, Debug, PartialEq, Eq, Copy, Clone)]
pub enum CirrusError {
    #[error("The renderer is not bound to an output")]
    NO_OUTPUT,
    #[error("The output is already claimed by another viewport")]
    OUTPUT_IN_USE,
    #[error("Invalid operation")]
    INVALID,
}

pub type Result<T> = std::result::Result<T, CirrusError>;
