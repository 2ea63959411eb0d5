//! Output Viewport
//!
//! An OutputViewport is the unit of composition bound to exactly one
//! display Output. It owns the BufferRenderer producing frames for
//! that output, holds the authoritative pair of render sources (the
//! input source plus an optional extra source), and republishes the
//! renderer's result as a texture provider to external consumers.
//!
//! A viewport starts detached. Binding an Output claims it
//! exclusively and, once setup has completed, registers the viewport
//! with its owning render window. Unbinding is idempotent and safe
//! to repeat.
// Austin Shafer - 2024
use crate::event::{OutputEvent, ViewportEvent, ViewportEventSystem};
use crate::output::{Output, Transform};
use crate::renderer::{BufferRenderer, BufferTextureProvider, FrameParams, RenderBuffer};
use crate::source::{RenderSource, RenderSourceList};
use crate::window::OutputRenderWindow;
use crate::ViewportId;
use utils::log;
use utils::{partial_min, Context, Result};

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_VIEWPORT_ID: AtomicU64 = AtomicU64::new(1);

bitflags::bitflags! {
    /// Advisory compositing role of a viewport
    ///
    /// The render window uses these to decide how a viewport's
    /// output participates in final scanout.
    pub struct LayerFlags: u32 {
        const NONE = 0x0;
        const UI_LAYER = 0x1;
        const CONTENT_LAYER = 0x2;
    }
}

/// Equality check for doubles with a relative tolerance, so ratios
/// that only differ by accumulated float error compare equal
fn fuzzy_compare(a: f64, b: f64) -> bool {
    (a - b).abs() * 1e12 <= partial_min(a.abs(), b.abs())
}

pub struct OutputViewport {
    /// Identity handed to the render window
    v_id: ViewportId,
    /// The claimed output, if any
    v_output: Option<Output>,
    /// Source compositing this viewport's main content. None means
    /// the window's own content is drawn instead.
    v_input: Option<RenderSource>,
    /// Optional source composited above the input
    v_extra_source: Option<RenderSource>,
    v_device_pixel_ratio: f64,
    /// Exclude this viewport's output from normal presentation
    v_offscreen: bool,
    /// Skip color adjustment during composition
    v_preserve_color_contents: bool,
    /// Whether continuous re-render is allowed
    v_live: bool,
    v_layer_flags: LayerFlags,
    /// Has initial setup finished
    v_completed: bool,
    /// Has attached-state setup run for the current binding
    v_attached: bool,
    v_renderer: BufferRenderer,
    /// The owning render window, once this viewport is placed in one
    v_window: Option<Rc<RefCell<dyn OutputRenderWindow>>>,
    v_events: Rc<RefCell<ViewportEventSystem>>,
}

impl OutputViewport {
    /// Create a new detached viewport
    pub fn new() -> OutputViewport {
        let events = Rc::new(RefCell::new(ViewportEventSystem::new()));

        OutputViewport {
            v_id: NEXT_VIEWPORT_ID.fetch_add(1, Ordering::Relaxed),
            v_output: None,
            v_input: None,
            v_extra_source: None,
            v_device_pixel_ratio: 1.0,
            v_offscreen: false,
            v_preserve_color_contents: false,
            v_live: true,
            v_layer_flags: LayerFlags::empty(),
            v_completed: false,
            v_attached: false,
            v_renderer: BufferRenderer::new(events.clone()),
            v_window: None,
            v_events: events,
        }
    }

    pub fn id(&self) -> ViewportId {
        self.v_id
    }

    /// Place this viewport into its owning render window
    ///
    /// This must happen before an output binding completes setup.
    pub fn set_render_window(&mut self, window: Rc<RefCell<dyn OutputRenderWindow>>) {
        self.v_window = Some(window);
    }

    pub fn output(&self) -> Option<Output> {
        self.v_output.clone()
    }

    /// Bind or clear this viewport's output
    ///
    /// A viewport already bound to an output rejects a different
    /// non-null output: the call is logged and the existing binding
    /// is preserved. Binding also claims the output, so a second
    /// viewport claiming the same output is rejected the same way.
    pub fn set_output(&mut self, output: Option<Output>) {
        if self.v_output.is_some() && output.is_some() {
            log::error!("OutputViewport: the output is non-null, not allowed to change it");
            return;
        }

        match output {
            None => {
                if self.v_output.is_none() {
                    return;
                }
                self.detach_output();
                self.v_events.borrow_mut().add_event_output_changed();
            }
            Some(new_output) => {
                if new_output.claim().is_err() {
                    log::error!(
                        "OutputViewport: output {} is already claimed by another viewport",
                        new_output.name()
                    );
                    return;
                }
                self.v_output = Some(new_output);

                if self.v_completed {
                    self.init_for_output();
                }
                self.v_events.borrow_mut().add_event_output_changed();
            }
        }
    }

    /// Finish initial setup
    ///
    /// If an output was bound before this point, its attached-state
    /// setup was deferred and runs now.
    pub fn component_complete(&mut self) {
        if self.v_completed {
            return;
        }
        self.v_completed = true;

        if self.v_output.is_some() {
            self.init_for_output();
        }
    }

    /// Attached-state setup, run exactly once per binding
    fn init_for_output(&mut self) {
        // Being used outside of a render window is a structurally
        // invalid deployment and cannot proceed
        let window = self
            .v_window
            .clone()
            .expect("OutputViewport must be used in an OutputRenderWindow");
        let output = self.v_output.clone().unwrap();

        self.update_render_buffer_source();
        self.v_renderer.set_output(output);
        window.borrow_mut().attach(self.v_id);
        self.v_attached = true;

        self.push_implicit_size();
    }

    /// Release the bound output
    ///
    /// Detaches from the render window and drops the output claim.
    /// Safe to call any number of times; only the first call while
    /// attached does anything.
    pub fn invalidate(&mut self) {
        if !self.v_attached {
            return;
        }
        self.detach_output();
    }

    fn detach_output(&mut self) {
        if self.v_attached {
            if let Some(window) = self.v_window.as_ref() {
                window.borrow_mut().detach(self.v_id);
            }
            self.v_attached = false;
        }
        if let Some(output) = self.v_output.take() {
            output.release();
        }
        self.v_renderer.clear_output();
    }

    pub fn input(&self) -> Option<RenderSource> {
        self.v_input.clone()
    }

    /// Set the source compositing this viewport's main content
    ///
    /// Setting the current source again is a complete no-op: no
    /// rebuild happens and no notification is pushed.
    pub fn set_input(&mut self, input: Option<RenderSource>) {
        if self.v_input == input {
            return;
        }
        self.v_input = input;

        if self.v_output.is_some() {
            self.update_render_buffer_source();
        }
        self.v_events.borrow_mut().add_event_input_changed();
    }

    pub fn reset_input(&mut self) {
        self.set_input(None);
    }

    pub fn extra_source(&self) -> Option<RenderSource> {
        self.v_extra_source.clone()
    }

    /// Set the source composited above the input
    pub fn set_extra_source(&mut self, source: Option<RenderSource>) {
        if self.v_extra_source == source {
            return;
        }
        self.v_extra_source = source;

        if self.v_output.is_some() {
            self.update_render_buffer_source();
        }
        self.v_events.borrow_mut().add_event_extra_source_changed();
    }

    /// Rebuild the renderer's source list from the current input and
    /// extra source
    ///
    /// The list is always `[input or window-contents] ++ [extra]`.
    /// Every rebuild forces the next render to recomposite.
    fn update_render_buffer_source(&mut self) {
        let mut sources = RenderSourceList::new();

        match self.v_input.as_ref() {
            Some(input) => sources.push_item(input.clone()),
            // The placeholder is on behalf of the window's content
            None => sources.push_window_contents(),
        }

        if let Some(extra) = self.v_extra_source.as_ref() {
            sources.push_item(extra.clone());
        }

        self.v_renderer.set_source_list(sources, true);
    }

    pub fn device_pixel_ratio(&self) -> f64 {
        self.v_device_pixel_ratio
    }

    /// Set the device pixel ratio dividing the output's size into
    /// the implicit size
    ///
    /// A numerically equal value is a no-op. Changing the ratio does
    /// not itself force a re-render: sizing is a derived property,
    /// and the cache's recorded scale will miss on the next pass
    /// anyway.
    pub fn set_device_pixel_ratio(&mut self, ratio: f64) {
        if ratio <= 0.0 {
            log::error!("OutputViewport: rejecting non-positive device pixel ratio {}", ratio);
            return;
        }
        if fuzzy_compare(self.v_device_pixel_ratio, ratio) {
            return;
        }
        self.v_device_pixel_ratio = ratio;

        if self.v_output.is_some() {
            self.push_implicit_size();
        }
        self.v_events
            .borrow_mut()
            .add_event_device_pixel_ratio_changed(ratio);
    }

    /// The output's effective width in logical units
    pub fn implicit_width(&self) -> f64 {
        match self.v_output.as_ref() {
            Some(output) => output.size().0 as f64 / self.v_device_pixel_ratio,
            None => 0.0,
        }
    }

    /// The output's effective height in logical units
    pub fn implicit_height(&self) -> f64 {
        match self.v_output.as_ref() {
            Some(output) => output.size().1 as f64 / self.v_device_pixel_ratio,
            None => 0.0,
        }
    }

    fn push_implicit_size(&mut self) {
        let width = self.implicit_width();
        let height = self.implicit_height();
        self.v_events
            .borrow_mut()
            .add_event_implicit_size_changed(width, height);
    }

    pub fn offscreen(&self) -> bool {
        self.v_offscreen
    }

    pub fn set_offscreen(&mut self, offscreen: bool) {
        if self.v_offscreen == offscreen {
            return;
        }
        self.v_offscreen = offscreen;
        self.v_events
            .borrow_mut()
            .add_event_offscreen_changed(offscreen);
    }

    pub fn preserve_color_contents(&self) -> bool {
        self.v_preserve_color_contents
    }

    pub fn set_preserve_color_contents(&mut self, preserve: bool) {
        if self.v_preserve_color_contents == preserve {
            return;
        }
        self.v_preserve_color_contents = preserve;
        self.v_events
            .borrow_mut()
            .add_event_preserve_color_contents_changed(preserve);
    }

    pub fn live(&self) -> bool {
        self.v_live
    }

    pub fn set_live(&mut self, live: bool) {
        if self.v_live == live {
            return;
        }
        self.v_live = live;
        self.v_events.borrow_mut().add_event_live_changed(live);
    }

    pub fn layer_flags(&self) -> LayerFlags {
        self.v_layer_flags
    }

    pub fn set_layer_flags(&mut self, flags: LayerFlags) {
        if self.v_layer_flags == flags {
            return;
        }
        self.v_layer_flags = flags;
        self.v_events
            .borrow_mut()
            .add_event_layer_flags_changed(flags);
    }

    pub fn cache_buffer(&self) -> bool {
        self.v_renderer.cache_buffer()
    }

    /// Enable or disable the renderer's buffer cache
    pub fn set_cache_buffer(&mut self, enabled: bool) {
        self.v_renderer.set_cache_buffer(enabled);
    }

    pub fn buffer_renderer(&self) -> &BufferRenderer {
        &self.v_renderer
    }

    /// Ask the render window to change this output's scale
    ///
    /// Silently does nothing while the viewport has no window.
    pub fn request_output_scale(&self, scale: f32) {
        if let Some(window) = self.v_window.as_ref() {
            window.borrow_mut().set_output_scale(self.v_id, scale);
        }
    }

    /// Ask the render window to rotate this output
    pub fn request_output_transform(&self, transform: Transform) {
        if let Some(window) = self.v_window.as_ref() {
            window.borrow_mut().rotate_output(self.v_id, transform);
        }
    }

    /// Ask the render window for a render pass
    pub fn request_render(&self, commit: bool) {
        if let Some(window) = self.v_window.as_ref() {
            window.borrow_mut().render(self.v_id, commit);
        }
    }

    /// Drain pending events from the bound output
    ///
    /// Mode changes recompute the implicit size and invalidate the
    /// cached buffer. A destroyed output releases the binding.
    pub fn dispatch_events(&mut self) {
        let output = match self.v_output.clone() {
            Some(output) => output,
            None => return,
        };

        while let Some(event) = output.pop_event() {
            match event {
                OutputEvent::ModeChanged { .. } => {
                    self.v_renderer.invalidate_cache();
                    self.push_implicit_size();
                }
                OutputEvent::Destroyed => {
                    log::debug!(
                        "OutputViewport: output {} was destroyed, detaching",
                        output.name()
                    );
                    self.detach_output();
                    self.v_events.borrow_mut().add_event_output_changed();
                    break;
                }
            }
        }
    }

    /// Run a render pass for this viewport
    ///
    /// This is the entry the render window drives on its tick.
    /// Pending output events are drained first so mode and source
    /// changes have converged before the renderer looks at its
    /// cache.
    pub fn compose(&mut self, use_cache: bool) -> Result<RenderBuffer> {
        self.dispatch_events();

        let window_color = match self.v_window.as_ref() {
            Some(window) => window.borrow().contents_color(),
            None => (0.0, 0.0, 0.0, 1.0),
        };
        let color_adjust = match self.v_preserve_color_contents {
            true => None,
            false => self.v_output.as_ref().and_then(|o| o.color_adjust()),
        };

        let params = FrameParams {
            fp_scale: self.v_device_pixel_ratio,
            fp_window_color: window_color,
            fp_color_adjust: color_adjust,
            fp_use_cache: use_cache,
        };

        self.v_renderer
            .render(&params)
            .context("OutputViewport: buffer composition failed")
    }

    /// True when a presentable buffer backs this viewport
    pub fn is_texture_provider(&self) -> bool {
        self.v_renderer.is_texture_provider()
    }

    /// Get a read-only provider for the current buffer, if any
    pub fn texture_provider(&self) -> Option<BufferTextureProvider> {
        self.v_renderer.texture_provider()
    }

    /// Get the next currently unhandled notification
    ///
    /// The app should do this in its main loop after dispatching.
    pub fn pop_event(&mut self) -> Option<ViewportEvent> {
        self.v_events.borrow_mut().pop_event()
    }
}

impl Drop for OutputViewport {
    fn drop(&mut self) {
        self.invalidate();
    }
}
