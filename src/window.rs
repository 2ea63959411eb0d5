//! Output Render Window boundary
//!
//! The render window is the collaborator that owns the GPU context
//! and the actual render loop. Viewports register with it for the
//! duration of their attached lifetime and forward output-level
//! requests to it; everything past this trait is outside the
//! composition core.
// Austin Shafer - 2024
use crate::output::Transform;
use crate::ViewportId;

/// The owning render window of one or more OutputViewports
///
/// `attach`/`detach` bracket a viewport's attached lifetime. The
/// request methods are pass-throughs from the viewport's public
/// surface; how the window applies them to the display hardware is
/// its own business.
pub trait OutputRenderWindow {
    /// Register a viewport whose output binding just completed
    fn attach(&mut self, viewport: ViewportId);

    /// Unregister a viewport that is releasing its output
    fn detach(&mut self, viewport: ViewportId);

    /// Request a new scale for the viewport's output
    fn set_output_scale(&mut self, viewport: ViewportId, scale: f32);

    /// Request a new scanout transform for the viewport's output
    fn rotate_output(&mut self, viewport: ViewportId, transform: Transform);

    /// Request a render pass for this viewport, optionally
    /// committing the result to the display
    fn render(&mut self, viewport: ViewportId, commit: bool);

    /// The color standing in for this window's default content.
    /// Viewports without an input source composite this.
    fn contents_color(&self) -> (f32, f32, f32, f32) {
        (0.0, 0.0, 0.0, 1.0)
    }
}
