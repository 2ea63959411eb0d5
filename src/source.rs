//! Render Sources
//!
//! A RenderSource is a region of content that can be fed into a
//! BufferRenderer. Sources carry their geometry in logical
//! coordinates along with a solid color fill; image-backed content
//! lives behind the GPU boundary and is not part of this core.
//!
//! Sources are grouped into a RenderSourceList, which is the ordered
//! "what to draw" for one viewport. Later entries composite on top
//! of earlier ones.
// Austin Shafer - 2024
use utils::region::Rect;

use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug)]
pub(crate) struct RenderSourceState {
    /// The position and size of the source, in logical coordinates
    rs_rect: Rect<f32>,
    /// For rendering the source as a constant color
    rs_color: Option<(f32, f32, f32, f32)>,
}

/// A handle to one renderable source
///
/// This is a shared reference. A viewport tracking a source does not
/// control the source's lifetime, and replacing a viewport's source
/// with the same handle is always a no-op.
#[derive(Debug, Clone)]
pub struct RenderSource {
    rs_internal: Rc<RefCell<RenderSourceState>>,
}

impl PartialEq for RenderSource {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.rs_internal, &other.rs_internal)
    }
}

impl RenderSource {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> RenderSource {
        RenderSource {
            rs_internal: Rc::new(RefCell::new(RenderSourceState {
                rs_rect: Rect::new(x, y, width, height),
                rs_color: None,
            })),
        }
    }

    pub fn rect(&self) -> Rect<f32> {
        self.rs_internal.borrow().rs_rect
    }

    pub fn set_rect(&self, rect: Rect<f32>) {
        self.rs_internal.borrow_mut().rs_rect = rect;
    }

    pub fn color(&self) -> Option<(f32, f32, f32, f32)> {
        self.rs_internal.borrow().rs_color
    }

    pub fn set_color(&self, color: (f32, f32, f32, f32)) {
        self.rs_internal.borrow_mut().rs_color = Some(color);
    }
}

/// One slot in a render source list
///
/// `WindowContents` is a placeholder slot standing in for the
/// consuming window's default background content. It is what a
/// viewport draws when no input source has been assigned.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSlot {
    WindowContents,
    Item(RenderSource),
}

/// An ordered list of sources to composite
///
/// The list is always rebuilt wholesale when a viewport's input or
/// extra source changes, never patched in place, so a render pass
/// can only ever observe a complete list.
#[derive(Debug)]
pub struct RenderSourceList {
    sl_slots: Vec<SourceSlot>,
}

impl RenderSourceList {
    pub fn new() -> Self {
        Self {
            sl_slots: Vec::new(),
        }
    }

    /// Append the window-contents placeholder
    pub fn push_window_contents(&mut self) {
        self.sl_slots.push(SourceSlot::WindowContents);
    }

    /// Append a source. It will draw above everything already in
    /// the list.
    pub fn push_item(&mut self, source: RenderSource) {
        self.sl_slots.push(SourceSlot::Item(source));
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &SourceSlot> {
        self.sl_slots.iter()
    }

    pub fn get(&self, index: usize) -> Option<&SourceSlot> {
        self.sl_slots.get(index)
    }

    pub fn len(&self) -> usize {
        self.sl_slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sl_slots.is_empty()
    }
}
