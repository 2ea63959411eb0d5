//! Display Output Representation
//!
//! An Output is one physical or virtual display that buffers can be
//! presented on. It carries the current hardware mode, the scanout
//! transform, and an event queue that the claiming OutputViewport
//! drains to learn about mode changes and hardware teardown.
//!
//! At most one viewport may claim an Output at a time. The claim is
//! an enforced invariant, not a lock: a second claim is a reported,
//! recoverable error.
// Austin Shafer - 2024
use crate::event::{OutputEvent, OutputEventSystem};
use crate::{CirrusError, Result};
use utils::log;
use utils::region::Rect;

use cgmath::{Matrix2, Vector2};
use std::cell::RefCell;
use std::rc::Rc;

/// One hardware mode of a display: pixel extent plus refresh
/// rate in mHz, matching how display servers report it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Mode {
    pub m_width: u32,
    pub m_height: u32,
    pub m_refresh: i32,
}

impl Mode {
    pub fn new(width: u32, height: u32, refresh: i32) -> Mode {
        Mode {
            m_width: width,
            m_height: height,
            m_refresh: refresh,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.m_width, self.m_height)
    }
}

/// Scanout transform of an Output
///
/// This describes how composited content is rotated/mirrored onto
/// the panel, following the usual display server transform set.
#[allow(dead_code)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Transform {
    Normal,
    Rotate90,
    Rotate180,
    Rotate270,
    Flipped,
    Flipped90,
    Flipped180,
    Flipped270,
}

impl Transform {
    /// Does this transform exchange width and height?
    pub fn swaps_dimensions(&self) -> bool {
        match self.rotation() {
            90 | 270 => true,
            _ => false,
        }
    }

    fn is_flipped(&self) -> bool {
        match self {
            Transform::Flipped
            | Transform::Flipped90
            | Transform::Flipped180
            | Transform::Flipped270 => true,
            _ => false,
        }
    }

    fn rotation(&self) -> u32 {
        match self {
            Transform::Normal | Transform::Flipped => 0,
            Transform::Rotate90 | Transform::Flipped90 => 90,
            Transform::Rotate180 | Transform::Flipped180 => 180,
            Transform::Rotate270 | Transform::Flipped270 => 270,
        }
    }

    /// The size of the logical desktop area this transform produces
    /// from a hardware mode extent.
    pub fn effective_size(&self, mode: (u32, u32)) -> (u32, u32) {
        match self.swaps_dimensions() {
            true => (mode.1, mode.0),
            false => mode,
        }
    }

    /// Map a point in effective (transformed) coordinates into the
    /// hardware buffer's coordinate space.
    pub fn map_point(&self, point: (f32, f32), mode: (f32, f32)) -> (f32, f32) {
        let eff = match self.swaps_dimensions() {
            true => (mode.1, mode.0),
            false => mode,
        };

        // Mirror across the vertical axis first, then rotate
        let p = match self.is_flipped() {
            true => Vector2::new(eff.0 - point.0, point.1),
            false => Vector2::new(point.0, point.1),
        };

        let (matrix, offset) = match self.rotation() {
            0 => (
                Matrix2::new(1.0, 0.0, 0.0, 1.0),
                Vector2::new(0.0, 0.0),
            ),
            90 => (
                Matrix2::new(0.0, -1.0, 1.0, 0.0),
                Vector2::new(0.0, eff.0),
            ),
            180 => (
                Matrix2::new(-1.0, 0.0, 0.0, -1.0),
                Vector2::new(eff.0, eff.1),
            ),
            270 => (
                Matrix2::new(0.0, 1.0, -1.0, 0.0),
                Vector2::new(eff.1, 0.0),
            ),
            _ => unreachable!(),
        };

        let mapped = matrix * p + offset;
        (mapped.x, mapped.y)
    }

    /// Map a rectangle in effective coordinates into hardware buffer
    /// coordinates. The corners are mapped individually and the
    /// result re-normalized, since rotation may swap which corner is
    /// the origin.
    pub fn map_rect(&self, rect: &Rect<f32>, mode: (f32, f32)) -> Rect<f32> {
        let c0 = self.map_point((rect.r_pos.0, rect.r_pos.1), mode);
        let c1 = self.map_point(
            (
                rect.r_pos.0 + rect.r_size.0,
                rect.r_pos.1 + rect.r_size.1,
            ),
            mode,
        );

        let x = utils::partial_min(c0.0, c1.0);
        let y = utils::partial_min(c0.1, c1.1);
        let width = utils::partial_max(c0.0, c1.0) - x;
        let height = utils::partial_max(c0.1, c1.1) - y;

        Rect::new(x, y, width, height)
    }
}

pub(crate) struct OutputState {
    o_name: String,
    o_mode: Mode,
    o_scale: f32,
    o_transform: Transform,
    /// Optional per-channel multipliers applied during composition,
    /// unless the viewport asked to preserve color contents.
    o_color_adjust: Option<[f32; 3]>,
    o_events: OutputEventSystem,
    /// Whether an OutputViewport currently claims this output
    o_claimed: bool,
    o_destroyed: bool,
}

/// A handle to one display output
///
/// This is a shared reference, cloning it does not copy the output.
/// Equality is identity of the underlying display.
#[derive(Clone)]
pub struct Output {
    o_internal: Rc<RefCell<OutputState>>,
}

impl PartialEq for Output {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.o_internal, &other.o_internal)
    }
}

impl Output {
    pub fn new(name: &str, mode: Mode) -> Output {
        Output {
            o_internal: Rc::new(RefCell::new(OutputState {
                o_name: name.to_string(),
                o_mode: mode,
                o_scale: 1.0,
                o_transform: Transform::Normal,
                o_color_adjust: None,
                o_events: OutputEventSystem::new(),
                o_claimed: false,
                o_destroyed: false,
            })),
        }
    }

    pub fn name(&self) -> String {
        self.o_internal.borrow().o_name.clone()
    }

    pub fn mode(&self) -> Mode {
        self.o_internal.borrow().o_mode
    }

    pub fn transform(&self) -> Transform {
        self.o_internal.borrow().o_transform
    }

    pub fn scale(&self) -> f32 {
        self.o_internal.borrow().o_scale
    }

    pub fn color_adjust(&self) -> Option<[f32; 3]> {
        self.o_internal.borrow().o_color_adjust
    }

    /// Get the size of the logical desktop area of this output
    ///
    /// This is the mode extent with the scanout transform applied,
    /// so a rotated 1920x1080 panel reports 1080x1920.
    pub fn size(&self) -> (u32, u32) {
        let internal = self.o_internal.borrow();
        internal.o_transform.effective_size(internal.o_mode.size())
    }

    /// Switch this output to a new hardware mode
    ///
    /// Setting the current mode again is a no-op. Otherwise the
    /// claiming viewport is notified that its content is stale.
    pub fn set_mode(&self, mode: Mode) {
        let mut internal = self.o_internal.borrow_mut();
        if internal.o_mode == mode {
            return;
        }
        internal.o_mode = mode;
        self.push_mode_changed(&mut internal);
    }

    /// Set the scanout transform
    ///
    /// This changes the effective size of the output, so it is
    /// reported to the claiming viewport the same way a mode
    /// change is.
    pub fn set_transform(&self, transform: Transform) {
        let mut internal = self.o_internal.borrow_mut();
        if internal.o_transform == transform {
            return;
        }
        internal.o_transform = transform;
        self.push_mode_changed(&mut internal);
    }

    /// Set the output scale advertised to clients
    pub fn set_scale(&self, scale: f32) {
        if scale <= 0.0 {
            log::error!("Output {}: rejecting non-positive scale {}", self.name(), scale);
            return;
        }
        self.o_internal.borrow_mut().o_scale = scale;
    }

    /// Set per-channel color multipliers applied at composite time
    ///
    /// A color change makes presented content stale just like a mode
    /// change, so it is delivered through the same event.
    pub fn set_color_adjust(&self, adjust: Option<[f32; 3]>) {
        let mut internal = self.o_internal.borrow_mut();
        if internal.o_color_adjust == adjust {
            return;
        }
        internal.o_color_adjust = adjust;
        self.push_mode_changed(&mut internal);
    }

    fn push_mode_changed(&self, internal: &mut OutputState) {
        // Without a claiming viewport there is no consumer, so
        // don't queue anything
        if internal.o_claimed {
            let size = internal.o_mode.size();
            let refresh = internal.o_mode.m_refresh;
            internal.o_events.add_event_mode_changed(size, refresh);
        }
    }

    /// Signal that the display hardware this output represents is
    /// no longer available.
    ///
    /// The claiming viewport will release this output when it next
    /// dispatches events.
    pub fn destroy(&self) {
        let mut internal = self.o_internal.borrow_mut();
        if internal.o_destroyed {
            return;
        }
        internal.o_destroyed = true;
        if internal.o_claimed {
            internal.o_events.add_event_destroyed();
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.o_internal.borrow().o_destroyed
    }

    /// Claim this output for exclusive use by one viewport
    pub(crate) fn claim(&self) -> Result<()> {
        let mut internal = self.o_internal.borrow_mut();
        if internal.o_claimed || internal.o_destroyed {
            return Err(CirrusError::OUTPUT_IN_USE);
        }
        internal.o_claimed = true;
        Ok(())
    }

    /// Release a claim made with `claim`
    pub(crate) fn release(&self) {
        self.o_internal.borrow_mut().o_claimed = false;
    }

    /// Get the next currently unhandled event
    ///
    /// Only the claiming viewport should drain this queue.
    pub(crate) fn pop_event(&self) -> Option<OutputEvent> {
        self.o_internal.borrow_mut().o_events.pop_event()
    }
}
