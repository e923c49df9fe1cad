//! Frame lifecycle of an output driven through the mock backend.

use novade_buffer_manager::PixelMemory;
use novade_compositor_core::{Rectangle, Region, Size};
use novade_render_helper::testing::{MockOutput, MockRenderControl, MockRenderer, MockRhi};
use novade_render_helper::{
    BackendRenderer, GraphicsApi, OutputHelper, OutputHelperError, OutputHelperEvent, RenderHelper,
    RenderHelperConfig, RendererKind,
};
use std::cell::RefCell;
use std::rc::Rc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn gles_output(output: &Rc<MockOutput>) -> (OutputHelper, Rc<RefCell<Vec<OutputHelperEvent>>>) {
    let renderer: Rc<dyn BackendRenderer> = Rc::new(MockRenderer::new(RendererKind::Gles2));
    let config = RenderHelperConfig {
        sample_count: 4,
        device_pixel_ratio: 2.0,
        ..RenderHelperConfig::default()
    };
    let render_helper = RenderHelper::new(GraphicsApi::OpenGl, renderer, &config);
    let mut helper = OutputHelper::new(output.clone(), render_helper);
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    helper.subscribe(move |event| sink.borrow_mut().push(*event));
    (helper, events)
}

#[test]
fn full_frame_cycle() {
    init_tracing();
    let output = Rc::new(MockOutput::new("eDP-1", Size::new(200, 100)));
    let (mut helper, events) = gles_output(&output);
    let rhi = Rc::new(MockRhi::new());
    let rc = MockRenderControl::rhi(GraphicsApi::OpenGl, rhi.clone());

    // Backend signals readiness and damage arrives.
    output.set_ready(true);
    helper.set_damage(&Region::from_rect(Rectangle::new(0, 0, 50, 50)));
    helper.update();
    assert_eq!(events.borrow().last(), Some(&OutputHelperEvent::RenderRequested));

    // Render into the acquired target and commit.
    let acquired = helper.acquire_render_target(&rc).expect("render target");
    assert!(helper.renderable());
    assert_eq!(acquired.target.sample_count(), 4);
    assert_eq!(acquired.target.device_pixel_ratio(), 2.0);
    assert!(acquired.target.mirror_vertically());
    assert!(acquired.target.rhi().is_some());
    helper.commit().expect("commit accepted");
    assert!(!helper.content_is_dirty());
    assert!(!helper.needs_frame());
    assert_eq!(output.commit_count(), 1);

    // Nothing dirty: readiness alone does not request a render.
    events.borrow_mut().clear();
    helper.update();
    assert!(!events.borrow().contains(&OutputHelperEvent::RenderRequested));
}

#[test]
fn swapchain_rotation_hits_cache_and_reports_age() {
    init_tracing();
    let output = Rc::new(MockOutput::new("eDP-1", Size::new(64, 64)));
    let (mut helper, _) = gles_output(&output);
    let rhi = Rc::new(MockRhi::new());
    let rc = MockRenderControl::rhi(GraphicsApi::OpenGl, rhi.clone());

    let first = helper.acquire_render_target(&rc).unwrap();
    let second = helper.acquire_render_target(&rc).unwrap();
    let third = helper.acquire_render_target(&rc).unwrap();

    assert_ne!(first.buffer, second.buffer);
    assert_eq!(first.buffer, third.buffer);
    assert_eq!(first.target, third.target);
    assert_eq!((first.buffer_age, second.buffer_age, third.buffer_age), (0, 0, 2));
    assert_eq!(helper.render_helper().cached_len(), 2);
    assert_eq!(rhi.created_count(), 8);
}

#[test]
fn mode_change_releases_swapchain_targets() {
    init_tracing();
    let output = Rc::new(MockOutput::new("DP-2", Size::new(64, 64)));
    let (mut helper, _) = gles_output(&output);
    let rhi = Rc::new(MockRhi::new());
    let rc = MockRenderControl::rhi(GraphicsApi::OpenGl, rhi.clone());

    helper.acquire_render_target(&rc).unwrap();
    helper.acquire_render_target(&rc).unwrap();
    assert_eq!(rhi.live_total(), 8);

    output.set_pixel_size(Size::new(32, 32));
    assert_eq!(rhi.live_total(), 0);
    helper.reset_state();
    assert!(!helper.renderable());

    let acquired = helper.acquire_render_target(&rc).unwrap();
    assert_eq!(acquired.target.pixel_size(), Size::new(32, 32));
    assert!(helper.renderable());
}

#[test]
fn failed_acquire_skips_the_frame() {
    init_tracing();
    let output = Rc::new(MockOutput::new("DP-3", Size::new(64, 64)));
    let (mut helper, events) = gles_output(&output);
    let rc = MockRenderControl::without_rhi(GraphicsApi::OpenGl);

    helper.set_damage(&Region::from_rect(Rectangle::new(0, 0, 64, 64)));
    assert!(helper.acquire_render_target(&rc).is_none());
    assert!(!helper.renderable());
    assert!(!events.borrow().contains(&OutputHelperEvent::RenderableChanged(true)));

    assert!(matches!(helper.commit(), Err(OutputHelperError::NothingToCommit { .. })));
    assert!(helper.content_is_dirty());
}

#[test]
fn commit_after_failed_acquire_does_not_resubmit_stale_buffer() {
    init_tracing();
    let output = Rc::new(MockOutput::new("HDMI-A-1", Size::new(16, 16)));
    let renderer = Rc::new(MockRenderer::new(RendererKind::Pixman));
    let render_helper = RenderHelper::new(GraphicsApi::Software, renderer.clone(), &RenderHelperConfig::default());
    let mut helper = OutputHelper::new(output.clone(), render_helper);
    let rc = MockRenderControl::software();

    let first = helper.acquire_render_target(&rc).expect("first frame");
    assert!(helper.renderable());

    // The next swapchain buffer cannot be imported.
    renderer.override_pixman_memory(PixelMemory::zeroed(4));
    let second = output.swapchain_buffers()[1].clone();
    assert_ne!(second, first.buffer);
    assert!(helper.acquire_render_target(&rc).is_none());
    assert!(!helper.renderable());
    assert!(helper.last_render_target().is_none());

    helper.set_damage(&Region::from_rect(Rectangle::new(0, 0, 8, 8)));
    assert!(matches!(helper.commit(), Err(OutputHelperError::NothingToCommit { .. })));
    assert_eq!(output.commit_count(), 0);
    assert!(helper.last_committed_buffer().is_none());
    assert!(helper.content_is_dirty());
    assert!(!helper.damage().is_empty());
}

#[test]
fn commit_after_missing_swapchain_buffer_is_rejected() {
    init_tracing();
    let output = Rc::new(MockOutput::new("HDMI-A-2", Size::new(16, 16)));
    let (mut helper, _) = gles_output(&output);
    let rhi = Rc::new(MockRhi::new());
    let rc = MockRenderControl::rhi(GraphicsApi::OpenGl, rhi);

    let staged = output.swapchain_buffers()[0].clone();
    helper.set_buffer(staged);
    output.set_swapchain_len(0);
    assert!(helper.acquire_render_target(&rc).is_none());

    helper.set_damage(&Region::from_rect(Rectangle::new(0, 0, 16, 16)));
    assert!(matches!(helper.commit(), Err(OutputHelperError::NothingToCommit { .. })));
    assert_eq!(output.commit_count(), 0);
}
