//! Buffer Rendering
//!
//! The BufferRenderer owns the render pass for one OutputViewport:
//! it tracks the source list for the viewport, composites it into a
//! buffer sized to the bound output's mode, and keeps a cache of the
//! previous result so unchanged frames are never recomposited.
//!
//! The produced buffer is republished through BufferTextureProvider
//! as a read-only handle. Consumers must not assume the contents
//! stay valid past the next render pass.
// Austin Shafer - 2024
use crate::event::ViewportEventSystem;
use crate::output::Output;
use crate::source::{RenderSourceList, SourceSlot};
use crate::{CirrusError, Result};
use utils::region::Rect;
use utils::timing::StopWatch;
use utils::{log, partial_max, partial_min};

use std::cell::RefCell;
use std::rc::Rc;

/// Per-pass parameters assembled by the owning viewport
pub struct FrameParams {
    /// The viewport's device pixel ratio. Source geometry is in
    /// logical coordinates and is scaled by this before compositing.
    pub fp_scale: f64,
    /// Fill used for the window-contents placeholder slot
    pub fp_window_color: (f32, f32, f32, f32),
    /// Per-channel multipliers applied after compositing. None when
    /// the viewport preserves color contents.
    pub fp_color_adjust: Option<[f32; 3]>,
    /// May the cached buffer satisfy this pass
    pub fp_use_cache: bool,
}

#[derive(Debug)]
pub(crate) struct RenderBufferState {
    rb_size: (u32, u32),
    rb_scale: f64,
    /// Tightly packed RGBA8. Empty for a degraded blank buffer.
    rb_pixels: Vec<u8>,
}

/// A handle to one rendered buffer
///
/// Cloning shares the same allocation, so a cached frame that is
/// reused hands back a handle equal to the previous one. The pixel
/// contents are immutable once the composite that produced them is
/// done.
#[derive(Debug, Clone)]
pub struct RenderBuffer {
    rb_internal: Rc<RefCell<RenderBufferState>>,
}

impl PartialEq for RenderBuffer {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.rb_internal, &other.rb_internal)
    }
}

impl RenderBuffer {
    fn new(size: (u32, u32), scale: f64, pixels: Vec<u8>) -> RenderBuffer {
        RenderBuffer {
            rb_internal: Rc::new(RefCell::new(RenderBufferState {
                rb_size: size,
                rb_scale: scale,
                rb_pixels: pixels,
            })),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.rb_internal.borrow().rb_size
    }

    pub fn scale(&self) -> f64 {
        self.rb_internal.borrow().rb_scale
    }

    /// A blank buffer is the degraded result of rendering a
    /// zero-area output. It has no pixel storage.
    pub fn is_blank(&self) -> bool {
        self.rb_internal.borrow().rb_pixels.is_empty()
    }

    pub fn pixels(&self) -> std::cell::Ref<[u8]> {
        std::cell::Ref::map(self.rb_internal.borrow(), |state| {
            state.rb_pixels.as_slice()
        })
    }

    /// Fetch one pixel for inspection. Returns None when out of
    /// bounds or blank.
    pub fn pixel_at(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let internal = self.rb_internal.borrow();
        if x >= internal.rb_size.0 || y >= internal.rb_size.1 {
            return None;
        }
        let idx = ((y * internal.rb_size.0 + x) * 4) as usize;
        if idx + 4 > internal.rb_pixels.len() {
            return None;
        }
        Some([
            internal.rb_pixels[idx],
            internal.rb_pixels[idx + 1],
            internal.rb_pixels[idx + 2],
            internal.rb_pixels[idx + 3],
        ])
    }
}

/// Read-only texture boundary handed to external consumers
///
/// This wraps the renderer's most recent presentable buffer. It
/// never transfers ownership and the contents may be replaced by
/// the next render pass.
#[derive(Debug, Clone)]
pub struct BufferTextureProvider {
    tp_buffer: RenderBuffer,
}

impl BufferTextureProvider {
    pub fn buffer(&self) -> &RenderBuffer {
        &self.tp_buffer
    }

    pub fn size(&self) -> (u32, u32) {
        self.tp_buffer.size()
    }

    pub fn scale(&self) -> f64 {
        self.tp_buffer.scale()
    }
}

/// Cache of the previously rendered buffer
///
/// The cache records the size and scale the buffer was produced at.
/// A request only hits if it matches both and nothing has marked the
/// cache stale in between.
#[derive(Debug)]
pub struct BufferCache {
    bc_buffer: Option<RenderBuffer>,
    bc_size: (u32, u32),
    bc_scale: f64,
    bc_valid: bool,
}

impl BufferCache {
    fn new() -> Self {
        Self {
            bc_buffer: None,
            bc_size: (0, 0),
            bc_scale: 0.0,
            bc_valid: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.bc_valid
    }

    pub fn buffer(&self) -> Option<RenderBuffer> {
        self.bc_buffer.clone()
    }

    fn invalidate(&mut self) {
        self.bc_valid = false;
    }

    fn store(&mut self, buffer: RenderBuffer, size: (u32, u32), scale: f64) {
        self.bc_buffer = Some(buffer);
        self.bc_size = size;
        self.bc_scale = scale;
        self.bc_valid = true;
    }

    /// Hand back the cached buffer if it can satisfy a request of
    /// this size and scale.
    fn matching_buffer(&self, size: (u32, u32), scale: f64) -> Option<RenderBuffer> {
        if self.bc_valid && self.bc_size == size && self.bc_scale == scale {
            return self.bc_buffer.clone();
        }
        None
    }
}

/// Orchestrates render passes for one viewport
pub struct BufferRenderer {
    /// The output this renderer currently targets
    br_output: Option<Output>,
    /// Snapshot of the sources to composite, in draw order
    br_sources: RenderSourceList,
    br_cache: BufferCache,
    /// Whether the cache may be consulted at all
    br_cache_enabled: bool,
    /// Set on every source list rebuild, cleared only once a full
    /// composite has run. While set, cached buffers are stale no
    /// matter what their metadata says.
    br_force_render: bool,
    /// The most recent composite result. This backs the texture
    /// provider and outlives cache enable/disable flips.
    br_last_buffer: Option<RenderBuffer>,
    /// The owning viewport's notification queue
    br_events: Rc<RefCell<ViewportEventSystem>>,
}

impl BufferRenderer {
    pub(crate) fn new(events: Rc<RefCell<ViewportEventSystem>>) -> Self {
        Self {
            br_output: None,
            br_sources: RenderSourceList::new(),
            br_cache: BufferCache::new(),
            br_cache_enabled: false,
            br_force_render: false,
            br_last_buffer: None,
            br_events: events,
        }
    }

    pub fn output(&self) -> Option<Output> {
        self.br_output.clone()
    }

    pub(crate) fn set_output(&mut self, output: Output) {
        self.br_output = Some(output);
    }

    pub(crate) fn clear_output(&mut self) {
        self.br_output = None;
    }

    pub fn source_list(&self) -> &RenderSourceList {
        &self.br_sources
    }

    pub fn cache(&self) -> &BufferCache {
        &self.br_cache
    }

    pub fn cache_buffer(&self) -> bool {
        self.br_cache_enabled
    }

    /// Enable or disable buffer reuse
    ///
    /// Disabling does not clear an already cached buffer, it just
    /// stops it from being consulted. The texture provider keeps
    /// working off the last composite either way.
    pub fn set_cache_buffer(&mut self, enabled: bool) {
        if self.br_cache_enabled == enabled {
            return;
        }
        self.br_cache_enabled = enabled;
        self.br_events
            .borrow_mut()
            .add_event_cache_buffer_changed(enabled);
    }

    pub(crate) fn force_render_pending(&self) -> bool {
        self.br_force_render
    }

    /// Mark any cached buffer stale
    ///
    /// Called for every output mode change: even a refresh-only
    /// change invalidates, since we cannot tell what else about the
    /// scanout pipeline moved underneath us.
    pub fn invalidate_cache(&mut self) {
        self.br_cache.invalidate();
    }

    /// Atomically replace the tracked source list
    ///
    /// With `force_invalidate` the cache is marked stale even if the
    /// new list is element-wise equal to the old one. A source's
    /// content may have changed behind an unchanged handle, so
    /// identity changes are never assumed side-effect free.
    pub fn set_source_list(&mut self, sources: RenderSourceList, force_invalidate: bool) {
        self.br_sources = sources;
        if force_invalidate {
            self.br_cache.invalidate();
            self.br_force_render = true;
        }
    }

    /// Produce a buffer for the bound output
    ///
    /// Returns the cached buffer when the pass allows it and nothing
    /// invalidated it, otherwise runs a full composite. A zero-area
    /// output degrades to a blank buffer instead of failing.
    pub fn render(&mut self, params: &FrameParams) -> Result<RenderBuffer> {
        let output = self.br_output.clone().ok_or(CirrusError::NO_OUTPUT)?;
        let size = output.mode().size();

        if size.0 == 0 || size.1 == 0 {
            log::debug!(
                "BufferRenderer: output {} has no area, returning a blank buffer",
                output.name()
            );
            return Ok(RenderBuffer::new(size, params.fp_scale, Vec::new()));
        }

        if params.fp_use_cache && self.br_cache_enabled && !self.br_force_render {
            if let Some(buffer) = self.br_cache.matching_buffer(size, params.fp_scale) {
                log::debug!(
                    "BufferRenderer: reusing cached buffer for output {}",
                    output.name()
                );
                return Ok(buffer);
            }
        }

        let buffer = self.composite(&output, size, params);
        self.br_last_buffer = Some(buffer.clone());
        if self.br_cache_enabled {
            self.br_cache.store(buffer.clone(), size, params.fp_scale);
        }
        self.br_force_render = false;
        self.br_events.borrow_mut().add_event_redraw_complete();

        Ok(buffer)
    }

    /// Composite the source list into a fresh buffer
    ///
    /// The target is sized to the output's hardware mode. Sources
    /// are placed at their logical position scaled by the device
    /// pixel ratio, then mapped through the output transform into
    /// hardware coordinates.
    fn composite(&self, output: &Output, size: (u32, u32), params: &FrameParams) -> RenderBuffer {
        let mut stop = StopWatch::new();
        stop.start();

        let dims = (size.0 as usize, size.1 as usize);
        let mut pixels = vec![0u8; dims.0 * dims.1 * 4];
        let transform = output.transform();
        let mode_dims = (size.0 as f32, size.1 as f32);
        let scale = params.fp_scale as f32;

        for slot in self.br_sources.iter() {
            match slot {
                // The placeholder covers the whole target, it is the
                // window's own content so it replaces anything below
                SourceSlot::WindowContents => {
                    Self::fill_target(&mut pixels, params.fp_window_color)
                }
                SourceSlot::Item(source) => {
                    let color = match source.color() {
                        Some(c) => c,
                        None => {
                            log::error!("BufferRenderer: source has no content, skipping");
                            continue;
                        }
                    };

                    let rect = source.rect();
                    let scaled = Rect::new(
                        rect.r_pos.0 * scale,
                        rect.r_pos.1 * scale,
                        rect.r_size.0 * scale,
                        rect.r_size.1 * scale,
                    );
                    let target = transform.map_rect(&scaled, mode_dims);
                    Self::blend_rect(&mut pixels, dims, &target, color);
                }
            }
        }

        if let Some(adjust) = params.fp_color_adjust {
            Self::adjust_colors(&mut pixels, adjust);
        }

        stop.end();
        log::profiling!(
            "Composited {}x{} buffer for {} in {:?}",
            size.0,
            size.1,
            output.name(),
            stop.get_duration()
        );

        RenderBuffer::new(size, params.fp_scale, pixels)
    }

    fn fill_target(pixels: &mut [u8], color: (f32, f32, f32, f32)) {
        let texel = [
            (color.0 * 255.0) as u8,
            (color.1 * 255.0) as u8,
            (color.2 * 255.0) as u8,
            (color.3 * 255.0) as u8,
        ];
        for px in pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&texel);
        }
    }

    /// src-over blend of a constant color over a region of the target
    fn blend_rect(
        pixels: &mut [u8],
        dims: (usize, usize),
        rect: &Rect<f32>,
        color: (f32, f32, f32, f32),
    ) {
        let x0 = partial_max(0.0, rect.r_pos.0).round() as usize;
        let y0 = partial_max(0.0, rect.r_pos.1).round() as usize;
        let x1 = partial_min(dims.0 as f32, rect.r_pos.0 + rect.r_size.0).round() as usize;
        let y1 = partial_min(dims.1 as f32, rect.r_pos.1 + rect.r_size.1).round() as usize;
        if x1 <= x0 || y1 <= y0 {
            return;
        }

        let alpha = color.3;
        let src = [color.0, color.1, color.2];
        for y in y0..y1 {
            for x in x0..x1 {
                let idx = (y * dims.0 + x) * 4;
                for chan in 0..3 {
                    let dst = pixels[idx + chan] as f32 / 255.0;
                    let blended = src[chan] * alpha + dst * (1.0 - alpha);
                    pixels[idx + chan] = (blended * 255.0) as u8;
                }
                let dst_alpha = pixels[idx + 3] as f32 / 255.0;
                pixels[idx + 3] = ((alpha + dst_alpha * (1.0 - alpha)) * 255.0) as u8;
            }
        }
    }

    fn adjust_colors(pixels: &mut [u8], adjust: [f32; 3]) {
        for px in pixels.chunks_exact_mut(4) {
            for chan in 0..3 {
                px[chan] = partial_min(px[chan] as f32 * adjust[chan], 255.0) as u8;
            }
        }
    }

    /// True when this renderer holds a presentable buffer
    pub fn is_texture_provider(&self) -> bool {
        self.br_last_buffer.is_some()
    }

    /// Get a read-only provider for the most recent buffer
    pub fn texture_provider(&self) -> Option<BufferTextureProvider> {
        self.br_last_buffer
            .clone()
            .map(|buffer| BufferTextureProvider { tp_buffer: buffer })
    }
}
