/// Cirrus composition core tests
use crate as cirrus;
use cirrus::{
    DeviceType, InputDevice, LayerFlags, Mode, Output, OutputRenderWindow, OutputViewport,
    RenderSource, Seat, SourceSlot, Transform, ViewportEvent, ViewportId,
};
use utils::region::Rect;

use std::cell::RefCell;
use std::rc::Rc;

/// Recording render window stand-in
///
/// Records every call a viewport forwards so tests can check the
/// attach/detach bracketing and the request pass-throughs.
struct TestWindow {
    tw_attached: Vec<ViewportId>,
    tw_detached: Vec<ViewportId>,
    tw_scale_reqs: Vec<(ViewportId, f32)>,
    tw_transform_reqs: Vec<(ViewportId, Transform)>,
    tw_render_reqs: Vec<(ViewportId, bool)>,
    tw_contents_color: (f32, f32, f32, f32),
}

impl TestWindow {
    fn new() -> Self {
        Self {
            tw_attached: Vec::new(),
            tw_detached: Vec::new(),
            tw_scale_reqs: Vec::new(),
            tw_transform_reqs: Vec::new(),
            tw_render_reqs: Vec::new(),
            tw_contents_color: (0.0, 0.0, 0.0, 1.0),
        }
    }
}

impl OutputRenderWindow for TestWindow {
    fn attach(&mut self, viewport: ViewportId) {
        self.tw_attached.push(viewport);
    }

    fn detach(&mut self, viewport: ViewportId) {
        self.tw_detached.push(viewport);
    }

    fn set_output_scale(&mut self, viewport: ViewportId, scale: f32) {
        self.tw_scale_reqs.push((viewport, scale));
    }

    fn rotate_output(&mut self, viewport: ViewportId, transform: Transform) {
        self.tw_transform_reqs.push((viewport, transform));
    }

    fn render(&mut self, viewport: ViewportId, commit: bool) {
        self.tw_render_reqs.push((viewport, commit));
    }

    fn contents_color(&self) -> (f32, f32, f32, f32) {
        self.tw_contents_color
    }
}

/// Common initialization
///
/// Creates a 1920x1080 output and a completed viewport bound to it,
/// hosted in a recording window.
fn setup_viewport() -> (OutputViewport, Rc<RefCell<TestWindow>>, Output) {
    let output = Output::new("test-0", Mode::new(1920, 1080, 60_000));
    let window = Rc::new(RefCell::new(TestWindow::new()));

    let mut viewport = OutputViewport::new();
    viewport.set_render_window(window.clone());
    viewport.set_output(Some(output.clone()));
    viewport.component_complete();

    (viewport, window, output)
}

/// Throw away all pending notifications
fn drain_events(viewport: &mut OutputViewport) {
    while viewport.pop_event().is_some() {}
}

/// A red 64x64 source at the origin
fn red_source() -> RenderSource {
    let source = RenderSource::new(0.0, 0.0, 64.0, 64.0);
    source.set_color((1.0, 0.0, 0.0, 1.0));
    source
}

/// Binding a second output is rejected and the first binding survives
#[test]
fn double_bind_preserves_first_output() {
    let (mut viewport, _window, output) = setup_viewport();
    let other = Output::new("test-1", Mode::new(800, 600, 60_000));

    viewport.set_output(Some(other.clone()));

    assert!(viewport.output().unwrap() == output);
    // The rejected output was not claimed either, so another
    // viewport can still take it
    let window2 = Rc::new(RefCell::new(TestWindow::new()));
    let mut viewport2 = OutputViewport::new();
    viewport2.set_render_window(window2);
    viewport2.set_output(Some(other.clone()));
    viewport2.component_complete();
    assert!(viewport2.output().unwrap() == other);
}

/// A second viewport claiming an already claimed output is rejected
#[test]
fn second_viewport_claim_rejected() {
    let (viewport, _window, output) = setup_viewport();

    let window2 = Rc::new(RefCell::new(TestWindow::new()));
    let mut viewport2 = OutputViewport::new();
    viewport2.set_render_window(window2);
    viewport2.set_output(Some(output.clone()));

    assert!(viewport2.output().is_none());
    assert!(viewport.output().unwrap() == output);
}

/// The source list is always [input-or-placeholder] ++ [extra]?
#[test]
fn source_list_build_order() {
    let (mut viewport, _window, _output) = setup_viewport();

    // No sources set: only the window-contents placeholder
    assert_eq!(viewport.buffer_renderer().source_list().len(), 1);
    assert!(*viewport.buffer_renderer().source_list().get(0).unwrap() == SourceSlot::WindowContents);

    let input = red_source();
    let extra = RenderSource::new(8.0, 8.0, 16.0, 16.0);
    extra.set_color((0.0, 1.0, 0.0, 1.0));

    viewport.set_input(Some(input.clone()));
    viewport.set_extra_source(Some(extra.clone()));
    {
        let list = viewport.buffer_renderer().source_list();
        assert_eq!(list.len(), 2);
        assert!(*list.get(0).unwrap() == SourceSlot::Item(input.clone()));
        assert!(*list.get(1).unwrap() == SourceSlot::Item(extra.clone()));
    }

    // Clearing the input brings the placeholder back in front of
    // the extra source
    viewport.reset_input();
    {
        let list = viewport.buffer_renderer().source_list();
        assert_eq!(list.len(), 2);
        assert!(*list.get(0).unwrap() == SourceSlot::WindowContents);
        assert!(*list.get(1).unwrap() == SourceSlot::Item(extra.clone()));
    }
}

/// Setting the current input again does nothing at all
#[test]
fn same_input_is_noop() {
    let (mut viewport, _window, _output) = setup_viewport();
    let input = red_source();

    viewport.set_input(Some(input.clone()));
    viewport.set_cache_buffer(true);
    viewport.compose(true).unwrap();
    assert!(viewport.buffer_renderer().cache().is_valid());
    drain_events(&mut viewport);

    viewport.set_input(Some(input.clone()));

    assert!(viewport.pop_event().is_none());
    assert!(viewport.buffer_renderer().cache().is_valid());
    assert!(!viewport.buffer_renderer().force_render_pending());
}

/// A source list rebuild always forces the next render to
/// recomposite, cached buffer or not
#[test]
fn rebuild_forces_recomposite() {
    let (mut viewport, _window, _output) = setup_viewport();
    viewport.set_cache_buffer(true);
    viewport.set_input(Some(red_source()));

    let first = viewport.compose(true).unwrap();
    let cached = viewport.compose(true).unwrap();
    assert!(first == cached);

    viewport.set_input(Some(red_source()));
    let fresh = viewport.compose(true).unwrap();
    assert!(fresh != cached);
}

/// An unchanged scene hands back the identical cached buffer
#[test]
fn cache_returns_identical_buffer() {
    let (mut viewport, _window, _output) = setup_viewport();
    viewport.set_cache_buffer(true);
    viewport.set_input(Some(red_source()));

    let first = viewport.compose(true).unwrap();
    let second = viewport.compose(true).unwrap();
    let third = viewport.compose(true).unwrap();

    assert!(first == second);
    assert!(second == third);
}

/// A numerically equal device pixel ratio pushes no notification
#[test]
fn same_ratio_suppresses_notification() {
    let (mut viewport, _window, _output) = setup_viewport();
    drain_events(&mut viewport);

    viewport.set_device_pixel_ratio(1.0);

    assert!(viewport.pop_event().is_none());
}

/// Implicit size is always output size over device pixel ratio
#[test]
fn implicit_size_tracks_mode_and_ratio() {
    let (mut viewport, _window, output) = setup_viewport();

    assert_eq!(viewport.implicit_width(), 1920.0);
    assert_eq!(viewport.implicit_height(), 1080.0);

    output.set_mode(Mode::new(1024, 768, 60_000));
    viewport.dispatch_events();
    assert_eq!(viewport.implicit_width(), 1024.0);
    assert_eq!(viewport.implicit_height(), 768.0);

    viewport.set_device_pixel_ratio(2.0);
    assert_eq!(viewport.implicit_width(), 512.0);
    assert_eq!(viewport.implicit_height(), 384.0);
}

/// 1920x1080 at a ratio of 2.0 reports 960x540
#[test]
fn implicit_size_hidpi() {
    let (mut viewport, _window, _output) = setup_viewport();
    drain_events(&mut viewport);

    viewport.set_device_pixel_ratio(2.0);

    assert_eq!(viewport.implicit_width(), 960.0);
    assert_eq!(viewport.implicit_height(), 540.0);

    // The ratio change produced implicit size and ratio events
    let mut saw_size = false;
    while let Some(event) = viewport.pop_event() {
        if let ViewportEvent::ImplicitSizeChanged { width, height } = event {
            assert_eq!(width, 960.0);
            assert_eq!(height, 540.0);
            saw_size = true;
        }
    }
    assert!(saw_size);
}

/// Rendering a zero-area output degrades to a blank buffer
#[test]
fn zero_area_render_is_blank() {
    let output = Output::new("headless", Mode::new(0, 0, 0));
    let window = Rc::new(RefCell::new(TestWindow::new()));
    let mut viewport = OutputViewport::new();
    viewport.set_render_window(window);
    viewport.set_output(Some(output));
    viewport.component_complete();

    // With no input source the list is just the placeholder
    assert_eq!(viewport.buffer_renderer().source_list().len(), 1);
    assert!(*viewport.buffer_renderer().source_list().get(0).unwrap() == SourceSlot::WindowContents);

    let buffer = viewport.compose(true).unwrap();

    assert!(buffer.is_blank());
    assert_eq!(buffer.size(), (0, 0));
}

/// An unrecognized device kind classifies as Unknown and the device
/// stays usable
#[test]
fn unknown_device_kind_classifies_unknown() {
    let device = InputDevice::new(999, "mystery-hid");

    assert_eq!(device.device_type(), DeviceType::Unknown);

    // Still a perfectly good device otherwise
    assert_eq!(device.name(), "mystery-hid");
    let seat = Seat::new("seat0");
    seat.attach_device(&device);
    assert!(device.seat().unwrap() == seat);
    assert_eq!(seat.device_count(), 1);

    device.destroy();
    assert_eq!(seat.device_count(), 0);
}

/// invalidate() is idempotent
#[test]
fn invalidate_is_idempotent() {
    let (mut viewport, window, output) = setup_viewport();
    assert_eq!(window.borrow().tw_attached.len(), 1);

    viewport.invalidate();
    assert!(viewport.output().is_none());
    assert_eq!(window.borrow().tw_detached.len(), 1);

    viewport.invalidate();
    assert!(viewport.output().is_none());
    assert_eq!(window.borrow().tw_detached.len(), 1);

    // The released output can be claimed again
    let window2 = Rc::new(RefCell::new(TestWindow::new()));
    let mut viewport2 = OutputViewport::new();
    viewport2.set_render_window(window2);
    viewport2.set_output(Some(output.clone()));
    viewport2.component_complete();
    assert!(viewport2.output().unwrap() == output);
}

/// Identities below the reserved base never resolve to a device
#[test]
fn reserved_identity_range_never_resolves() {
    for identity in [0u64, 1, 100, 65535].iter() {
        assert!(InputDevice::from_identity(*identity).is_none());
    }

    let device = InputDevice::new(cirrus::DEVICE_KIND_POINTER, "mouse0");
    assert!(device.identity() >= cirrus::DEVICE_ID_BASE);
    assert!(InputDevice::from_identity(device.identity()).unwrap() == device);

    device.destroy();
    assert!(InputDevice::from_identity(device.identity()).is_none());
}

/// Known device kinds map onto their categories
#[test]
fn device_kind_classification() {
    let kinds = [
        (cirrus::DEVICE_KIND_KEYBOARD, DeviceType::Keyboard),
        (cirrus::DEVICE_KIND_POINTER, DeviceType::Pointer),
        (cirrus::DEVICE_KIND_TOUCH, DeviceType::Touch),
        (cirrus::DEVICE_KIND_TABLET, DeviceType::Tablet),
        (cirrus::DEVICE_KIND_TABLET_PAD, DeviceType::TabletPad),
        (cirrus::DEVICE_KIND_SWITCH, DeviceType::Switch),
    ];

    for (kind, expected) in kinds.iter() {
        let device = InputDevice::new(*kind, "dev");
        assert_eq!(device.device_type(), *expected);
        device.destroy();
    }
}

/// A rotated output swaps its effective size and the implicit size
/// follows
#[test]
fn rotate_swaps_effective_size() {
    let (mut viewport, _window, output) = setup_viewport();

    output.set_transform(Transform::Rotate90);
    viewport.dispatch_events();

    assert_eq!(output.size(), (1080, 1920));
    assert_eq!(viewport.implicit_width(), 1080.0);
    assert_eq!(viewport.implicit_height(), 1920.0);
}

/// Transform point/rect mapping into hardware coordinates
#[test]
fn transform_rect_mapping() {
    let mode = (4.0, 2.0);

    // Normal is the identity
    let rect = Rect::new(1.0, 0.0, 1.0, 1.0);
    assert_eq!(Transform::Normal.map_rect(&rect, mode), rect);

    // 90 degrees: the effective space is 2x4 and the origin corner
    // moves to the bottom left column of the buffer
    assert_eq!(Transform::Rotate90.map_point((0.0, 0.0), mode), (0.0, 2.0));
    let mapped = Transform::Rotate90.map_rect(&Rect::new(0.0, 0.0, 2.0, 2.0), mode);
    assert_eq!(mapped, Rect::new(0.0, 0.0, 2.0, 2.0));

    // 180 degrees mirrors both axes
    let mapped = Transform::Rotate180.map_rect(&Rect::new(0.0, 0.0, 1.0, 1.0), mode);
    assert_eq!(mapped, Rect::new(3.0, 1.0, 1.0, 1.0));

    // A flip only mirrors horizontally
    let mapped = Transform::Flipped.map_rect(&Rect::new(0.0, 0.0, 1.0, 1.0), mode);
    assert_eq!(mapped, Rect::new(3.0, 0.0, 1.0, 1.0));
}

/// Disabling the cache keeps the previous buffer presentable
#[test]
fn cache_disable_keeps_provider() {
    let (mut viewport, _window, _output) = setup_viewport();
    viewport.set_cache_buffer(true);
    viewport.set_input(Some(red_source()));

    let first = viewport.compose(true).unwrap();
    assert!(viewport.is_texture_provider());

    viewport.set_cache_buffer(false);
    assert!(viewport.is_texture_provider());
    assert!(*viewport.texture_provider().unwrap().buffer() == first);

    // With the cache out of consideration every pass recomposites
    let second = viewport.compose(true).unwrap();
    assert!(second != first);
    assert!(*viewport.texture_provider().unwrap().buffer() == second);
}

/// A destroyed output detaches its claiming viewport
#[test]
fn destroyed_output_detaches_viewport() {
    let (mut viewport, window, output) = setup_viewport();

    output.destroy();
    viewport.dispatch_events();

    assert!(viewport.output().is_none());
    assert_eq!(window.borrow().tw_detached.len(), 1);
}

/// Requests reach the window only while the viewport has one
#[test]
fn requests_forward_to_window() {
    // Without a window every request is a silent no-op
    let mut lone = OutputViewport::new();
    lone.request_output_scale(2.0);
    lone.request_output_transform(Transform::Rotate180);
    lone.request_render(true);
    lone.component_complete();

    let (viewport, window, _output) = setup_viewport();
    viewport.request_output_scale(2.0);
    viewport.request_output_transform(Transform::Rotate90);
    viewport.request_render(false);

    let window = window.borrow();
    assert_eq!(window.tw_scale_reqs, vec![(viewport.id(), 2.0)]);
    assert_eq!(
        window.tw_transform_reqs,
        vec![(viewport.id(), Transform::Rotate90)]
    );
    assert_eq!(window.tw_render_reqs, vec![(viewport.id(), false)]);
}

/// Even a refresh-only mode change invalidates the cached buffer
#[test]
fn refresh_change_invalidates_cache() {
    let (mut viewport, _window, output) = setup_viewport();
    viewport.set_cache_buffer(true);
    viewport.set_input(Some(red_source()));

    let first = viewport.compose(true).unwrap();
    assert!(viewport.compose(true).unwrap() == first);

    output.set_mode(Mode::new(1920, 1080, 120_000));
    let fresh = viewport.compose(true).unwrap();
    assert!(fresh != first);
}

/// Sources composite at their logical position scaled by the ratio
#[test]
fn composite_scales_sources_by_ratio() {
    let output = Output::new("small", Mode::new(4, 4, 60_000));
    let window = Rc::new(RefCell::new(TestWindow::new()));
    let mut viewport = OutputViewport::new();
    viewport.set_render_window(window);
    viewport.set_output(Some(output));
    viewport.component_complete();
    viewport.set_device_pixel_ratio(2.0);

    let source = RenderSource::new(0.0, 0.0, 1.0, 1.0);
    source.set_color((1.0, 0.0, 0.0, 1.0));
    viewport.set_input(Some(source));

    let buffer = viewport.compose(true).unwrap();

    // The 1x1 logical source covers a 2x2 pixel region
    assert_eq!(buffer.pixel_at(0, 0).unwrap(), [255, 0, 0, 255]);
    assert_eq!(buffer.pixel_at(1, 1).unwrap(), [255, 0, 0, 255]);
    // Outside the source nothing was drawn
    assert_eq!(buffer.pixel_at(2, 2).unwrap(), [0, 0, 0, 0]);
    assert_eq!(buffer.scale(), 2.0);
}

/// The placeholder slot fills the target with the window's contents
/// color
#[test]
fn placeholder_fills_window_contents() {
    let output = Output::new("small", Mode::new(2, 2, 60_000));
    let window = Rc::new(RefCell::new(TestWindow::new()));
    window.borrow_mut().tw_contents_color = (0.2, 0.4, 0.6, 1.0);

    let mut viewport = OutputViewport::new();
    viewport.set_render_window(window);
    viewport.set_output(Some(output));
    viewport.component_complete();

    let buffer = viewport.compose(true).unwrap();

    assert_eq!(buffer.pixel_at(0, 0).unwrap(), [51, 102, 153, 255]);
    assert_eq!(buffer.pixel_at(1, 1).unwrap(), [51, 102, 153, 255]);
}

/// preserve_color_contents skips the output's color adjustment
#[test]
fn color_adjust_respects_preserve() {
    let output = Output::new("small", Mode::new(2, 2, 60_000));
    let window = Rc::new(RefCell::new(TestWindow::new()));
    let mut viewport = OutputViewport::new();
    viewport.set_render_window(window);
    viewport.set_output(Some(output.clone()));
    viewport.component_complete();

    let source = RenderSource::new(0.0, 0.0, 2.0, 2.0);
    source.set_color((1.0, 1.0, 1.0, 1.0));
    viewport.set_input(Some(source));
    output.set_color_adjust(Some([0.5, 0.5, 0.5]));

    let adjusted = viewport.compose(true).unwrap();
    assert_eq!(adjusted.pixel_at(0, 0).unwrap(), [127, 127, 127, 255]);

    viewport.set_preserve_color_contents(true);
    let preserved = viewport.compose(true).unwrap();
    assert_eq!(preserved.pixel_at(0, 0).unwrap(), [255, 255, 255, 255]);
}

/// Composition without a bound output fails cleanly
#[test]
fn compose_without_output_fails() {
    let window = Rc::new(RefCell::new(TestWindow::new()));
    let mut viewport = OutputViewport::new();
    viewport.set_render_window(window);
    viewport.component_complete();

    assert!(viewport.compose(true).is_err());
}

/// Config properties notify once per actual change
#[test]
fn config_properties_notify_on_change() {
    let (mut viewport, _window, _output) = setup_viewport();
    drain_events(&mut viewport);

    viewport.set_offscreen(true);
    viewport.set_offscreen(true);
    assert_eq!(
        viewport.pop_event(),
        Some(ViewportEvent::OffscreenChanged { offscreen: true })
    );
    assert!(viewport.pop_event().is_none());

    viewport.set_live(false);
    viewport.set_live(false);
    assert_eq!(
        viewport.pop_event(),
        Some(ViewportEvent::LiveChanged { live: false })
    );
    assert!(viewport.pop_event().is_none());

    viewport.set_layer_flags(LayerFlags::UI_LAYER | LayerFlags::CONTENT_LAYER);
    viewport.set_layer_flags(LayerFlags::UI_LAYER | LayerFlags::CONTENT_LAYER);
    assert_eq!(
        viewport.pop_event(),
        Some(ViewportEvent::LayerFlagsChanged {
            flags: LayerFlags::UI_LAYER | LayerFlags::CONTENT_LAYER
        })
    );
    assert!(viewport.pop_event().is_none());

    viewport.set_cache_buffer(true);
    viewport.set_cache_buffer(true);
    assert_eq!(
        viewport.pop_event(),
        Some(ViewportEvent::CacheBufferChanged { enabled: true })
    );
    assert!(viewport.pop_event().is_none());
}

/// Binding before setup completes defers attachment until
/// completion
#[test]
fn bind_before_completion_defers_setup() {
    let output = Output::new("test-0", Mode::new(1920, 1080, 60_000));
    let window = Rc::new(RefCell::new(TestWindow::new()));

    let mut viewport = OutputViewport::new();
    viewport.set_render_window(window.clone());
    viewport.set_output(Some(output.clone()));

    // Not attached yet: setup is deferred
    assert_eq!(window.borrow().tw_attached.len(), 0);

    viewport.component_complete();
    assert_eq!(window.borrow().tw_attached.len(), 1);
    assert!(viewport.output().unwrap() == output);
}

/// Attaching with no render window present cannot proceed
#[test]
#[should_panic]
fn attach_without_window_is_fatal() {
    let output = Output::new("test-0", Mode::new(1920, 1080, 60_000));
    let mut viewport = OutputViewport::new();
    viewport.set_output(Some(output));
    viewport.component_complete();
}
