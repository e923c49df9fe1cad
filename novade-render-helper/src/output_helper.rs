//! Per-output frame scheduling.
//!
//! [`OutputHelper`] tracks three independent flags for one output:
//!
//! - `renderable`: a render target was acquired for the current buffer.
//! - `content_is_dirty`: damage accumulated since the last commit.
//! - `needs_frame`: the backend is ready to take a new frame.
//!
//! A render is requested when content is dirty and the backend is ready.
//! Flag changes and scheduling decisions are reported to subscribers as
//! [`OutputHelperEvent`]s, synchronously.

use crate::error::OutputHelperError;
use crate::render_helper::RenderHelper;
use crate::scene::RenderControl;
use crate::target::RenderTarget;
use novade_buffer_manager::{DisplayBuffer, WeakDisplayBuffer};
use novade_compositor_core::{Region, Size};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// A buffer taken from the output's swapchain.
#[derive(Debug, Clone)]
pub struct SwapchainBuffer {
    pub buffer: DisplayBuffer,
    /// Frames since this buffer was last presented, 0 if unknown.
    pub age: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwapchainHandle(pub u64);

/// Output transform applied by the display hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputTransform {
    #[default]
    Normal,
    Rotate90,
    Rotate180,
    Rotate270,
    Flipped,
    Flipped90,
    Flipped180,
    Flipped270,
}

/// State submitted to the backend on commit.
#[derive(Debug)]
pub struct OutputCommit<'a> {
    pub buffer: &'a DisplayBuffer,
    pub damage: &'a Region,
    pub scale: Option<f64>,
    pub transform: Option<OutputTransform>,
}

/// The display backend driving one output.
pub trait OutputBackend {
    fn name(&self) -> &str;

    /// Current mode size in physical pixels.
    fn pixel_size(&self) -> Size;

    /// Takes the next free buffer of the swapchain.
    fn acquire_swapchain_buffer(&self) -> Option<SwapchainBuffer>;

    fn swapchain(&self) -> Option<SwapchainHandle>;

    /// Whether the backend can accept a new frame now.
    fn is_ready_for_frame(&self) -> bool;

    /// Submits a frame. Returns `false` if the backend rejects it.
    fn commit(&self, commit: &OutputCommit<'_>) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputHelperEvent {
    RenderRequested,
    Damaged,
    RenderableChanged(bool),
    ContentIsDirtyChanged(bool),
    NeedsFrameChanged(bool),
    FrameDone,
}

/// Result of [`OutputHelper::acquire_render_target`].
#[derive(Debug, Clone)]
pub struct AcquiredTarget {
    pub buffer: DisplayBuffer,
    pub target: RenderTarget,
    /// Advisory, for damage tracking by the caller.
    pub buffer_age: u32,
    pub swapchain: Option<SwapchainHandle>,
}

#[derive(Default)]
struct PendingState {
    buffer: Option<DisplayBuffer>,
    scale: Option<f64>,
    transform: Option<OutputTransform>,
}

type EventListener = Box<dyn FnMut(&OutputHelperEvent)>;

/// Frame state machine of one output.
pub struct OutputHelper {
    backend: Rc<dyn OutputBackend>,
    render_helper: RenderHelper,
    renderable: bool,
    content_is_dirty: bool,
    needs_frame: bool,
    damage: Region,
    pending: PendingState,
    last_target: Option<(WeakDisplayBuffer, RenderTarget)>,
    last_committed: Option<WeakDisplayBuffer>,
    listeners: Vec<EventListener>,
}

impl fmt::Debug for OutputHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputHelper")
            .field("output", &self.backend.name())
            .field("renderable", &self.renderable)
            .field("content_is_dirty", &self.content_is_dirty)
            .field("needs_frame", &self.needs_frame)
            .field("damage", &self.damage)
            .finish_non_exhaustive()
    }
}

impl OutputHelper {
    pub fn new(backend: Rc<dyn OutputBackend>, render_helper: RenderHelper) -> Self {
        Self {
            backend,
            render_helper,
            renderable: false,
            content_is_dirty: false,
            needs_frame: false,
            damage: Region::new(),
            pending: PendingState::default(),
            last_target: None,
            last_committed: None,
            listeners: Vec::new(),
        }
    }

    pub fn output_name(&self) -> &str {
        self.backend.name()
    }

    pub fn render_helper(&self) -> &RenderHelper {
        &self.render_helper
    }

    pub fn renderable(&self) -> bool {
        self.renderable
    }

    pub fn content_is_dirty(&self) -> bool {
        self.content_is_dirty
    }

    pub fn needs_frame(&self) -> bool {
        self.needs_frame
    }

    /// Damage accumulated since the last successful commit.
    pub fn damage(&self) -> &Region {
        &self.damage
    }

    pub fn last_committed_buffer(&self) -> Option<DisplayBuffer> {
        self.last_committed.as_ref()?.upgrade()
    }

    /// Registers a callback for state change notifications.
    pub fn subscribe(&mut self, listener: impl FnMut(&OutputHelperEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Takes the next swapchain buffer and resolves its render target.
    ///
    /// On success the buffer is staged for the next commit. `renderable`
    /// reflects whether a target could be acquired.
    pub fn acquire_render_target(&mut self, rc: &dyn RenderControl) -> Option<AcquiredTarget> {
        if self.render_helper.set_working_size(self.backend.pixel_size()) {
            self.last_target = None;
        }

        let Some(SwapchainBuffer { buffer, age }) = self.backend.acquire_swapchain_buffer() else {
            warn!(output = %self.backend.name(), "No swapchain buffer available");
            self.skip_frame();
            return None;
        };

        let Some(target) = self.render_helper.acquire_render_target(rc, &buffer) else {
            debug!(output = %self.backend.name(), buffer = ?buffer.id(), "No render target, skipping frame");
            self.skip_frame();
            return None;
        };
        self.set_renderable(true);

        trace!(output = %self.backend.name(), buffer = ?buffer.id(), age, "Render target acquired");
        self.last_target = Some((buffer.downgrade(), target.clone()));
        self.pending.buffer = Some(buffer.clone());
        Some(AcquiredTarget {
            buffer,
            target,
            buffer_age: age,
            swapchain: self.backend.swapchain(),
        })
    }

    /// The buffer and target of the last successful acquire.
    pub fn last_render_target(&self) -> Option<(DisplayBuffer, RenderTarget)> {
        let (buffer, target) = self.last_target.as_ref()?;
        Some((buffer.upgrade()?, target.clone()))
    }

    /// Stages a buffer for the next commit without going through the
    /// swapchain.
    pub fn set_buffer(&mut self, buffer: DisplayBuffer) {
        self.pending.buffer = Some(buffer);
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.pending.scale = Some(scale);
        self.set_content_is_dirty(true);
    }

    pub fn set_transform(&mut self, transform: OutputTransform) {
        self.pending.transform = Some(transform);
        self.set_content_is_dirty(true);
    }

    /// Adds `region` to the pending damage.
    pub fn set_damage(&mut self, region: &Region) {
        if region.is_empty() {
            return;
        }
        self.damage.union(region);
        self.set_content_is_dirty(true);
    }

    /// Handles damage reported by the backend itself (mode change, lost
    /// contents). The whole output is damaged.
    pub fn handle_backend_damage(&mut self) {
        self.damage.union(&Region::from_size(self.backend.pixel_size()));
        self.set_content_is_dirty(true);
        self.emit(OutputHelperEvent::Damaged);
        self.update();
    }

    /// Submits the staged buffer with the accumulated damage.
    ///
    /// Fails without touching any state if nothing has been rendered. A
    /// rejected commit keeps the damage and dirty flag so the frame is
    /// retried.
    pub fn commit(&mut self) -> Result<(), OutputHelperError> {
        let output = self.backend.name().to_string();
        let Some(buffer) = self.pending.buffer.clone() else {
            debug!(%output, "Commit without a rendered buffer");
            return Err(OutputHelperError::NothingToCommit { output });
        };

        let accepted = self.backend.commit(&OutputCommit {
            buffer: &buffer,
            damage: &self.damage,
            scale: self.pending.scale,
            transform: self.pending.transform,
        });
        if !accepted {
            warn!(%output, buffer = ?buffer.id(), "Backend rejected commit");
            return Err(OutputHelperError::CommitRejected { output });
        }

        debug!(%output, buffer = ?buffer.id(), damage_rects = self.damage.rects().len(), "Frame committed");
        self.pending = PendingState::default();
        self.damage.clear();
        self.last_committed = Some(buffer.downgrade());
        self.set_content_is_dirty(false);
        self.set_needs_frame(false);
        self.emit(OutputHelperEvent::FrameDone);
        Ok(())
    }

    /// Forgets the current render target, e.g. after a mode or backend change.
    pub fn reset_state(&mut self) {
        debug!(output = %self.backend.name(), "Resetting output state");
        self.last_target = None;
        self.pending.buffer = None;
        self.set_renderable(false);
    }

    /// Re-reads backend readiness and requests a render if there is dirty
    /// content and the backend can take it.
    pub fn update(&mut self) {
        self.set_needs_frame(self.backend.is_ready_for_frame());
        if self.content_is_dirty && self.needs_frame {
            trace!(output = %self.backend.name(), "Requesting render");
            self.emit(OutputHelperEvent::RenderRequested);
        }
    }

    /// Nothing was rendered this cycle; a buffer staged by an earlier
    /// acquire must not reach the next commit.
    fn skip_frame(&mut self) {
        self.last_target = None;
        self.pending.buffer = None;
        self.set_renderable(false);
    }

    fn set_renderable(&mut self, value: bool) {
        if self.renderable != value {
            self.renderable = value;
            self.emit(OutputHelperEvent::RenderableChanged(value));
        }
    }

    fn set_content_is_dirty(&mut self, value: bool) {
        if self.content_is_dirty != value {
            self.content_is_dirty = value;
            self.emit(OutputHelperEvent::ContentIsDirtyChanged(value));
        }
    }

    fn set_needs_frame(&mut self, value: bool) {
        if self.needs_frame != value {
            self.needs_frame = value;
            self.emit(OutputHelperEvent::NeedsFrameChanged(value));
        }
    }

    fn emit(&mut self, event: OutputHelperEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderHelperConfig;
    use crate::graphics_api::GraphicsApi;
    use crate::renderer::{BackendRenderer, RendererKind};
    use crate::testing::{MockOutput, MockRenderControl, MockRenderer};
    use novade_compositor_core::Rectangle;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    fn output_helper(output: &Rc<MockOutput>) -> (OutputHelper, Rc<RefCell<Vec<OutputHelperEvent>>>) {
        let renderer: Rc<dyn BackendRenderer> = Rc::new(MockRenderer::new(RendererKind::Pixman));
        let render_helper = RenderHelper::new(GraphicsApi::Software, renderer, &RenderHelperConfig::default());
        let mut helper = OutputHelper::new(output.clone(), render_helper);
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        helper.subscribe(move |event| sink.borrow_mut().push(*event));
        (helper, events)
    }

    #[test]
    fn initial_state_is_all_false() {
        let output = Rc::new(MockOutput::new("HDMI-A-1", Size::new(64, 32)));
        let (helper, _) = output_helper(&output);
        assert!(!helper.renderable());
        assert!(!helper.content_is_dirty());
        assert!(!helper.needs_frame());
        assert!(helper.last_render_target().is_none());
        assert!(helper.last_committed_buffer().is_none());
    }

    #[test]
    fn acquire_sets_renderable_and_reports_age() {
        let output = Rc::new(MockOutput::new("HDMI-A-1", Size::new(64, 32)));
        let (mut helper, events) = output_helper(&output);
        let rc = MockRenderControl::software();

        let acquired = helper.acquire_render_target(&rc).unwrap();
        assert!(helper.renderable());
        assert_eq!(acquired.buffer_age, 0);
        assert_eq!(acquired.swapchain, Some(SwapchainHandle(1)));
        assert_eq!(helper.render_helper().size(), Size::new(64, 32));
        assert_eq!(*events.borrow(), vec![OutputHelperEvent::RenderableChanged(true)]);
    }

    #[test]
    fn exhausted_swapchain_is_not_renderable() {
        let output = Rc::new(MockOutput::new("DP-1", Size::new(16, 16)).with_swapchain_len(0));
        let (mut helper, _) = output_helper(&output);
        assert!(helper.acquire_render_target(&MockRenderControl::software()).is_none());
        assert!(!helper.renderable());
    }

    #[test]
    fn commit_before_acquire_is_rejected_and_keeps_dirty() {
        let output = Rc::new(MockOutput::new("DP-1", Size::new(16, 16)));
        let (mut helper, _) = output_helper(&output);
        helper.set_damage(&Region::from_rect(Rectangle::new(0, 0, 4, 4)));
        assert!(helper.content_is_dirty());

        assert_eq!(
            helper.commit(),
            Err(OutputHelperError::NothingToCommit { output: "DP-1".into() })
        );
        assert!(helper.content_is_dirty());
        assert_eq!(output.commit_count(), 0);
    }

    #[test]
    fn commit_submits_union_of_damage_and_clears_dirty() {
        let output = Rc::new(MockOutput::new("DP-1", Size::new(100, 100)));
        let (mut helper, events) = output_helper(&output);
        let acquired = helper.acquire_render_target(&MockRenderControl::software()).unwrap();

        let r1 = Rectangle::new(0, 0, 10, 10);
        let r2 = Rectangle::new(50, 50, 20, 20);
        helper.set_damage(&Region::from_rect(r1));
        helper.set_damage(&Region::from_rect(r2));
        helper.commit().unwrap();

        let committed = output.last_commit().unwrap();
        assert!(committed.damage.covers(r1));
        assert!(committed.damage.covers(r2));
        assert_eq!(committed.buffer, acquired.buffer.id());
        assert!(!helper.content_is_dirty());
        assert!(helper.damage().is_empty());
        assert_eq!(helper.last_committed_buffer(), Some(acquired.buffer));
        assert_eq!(events.borrow().last(), Some(&OutputHelperEvent::FrameDone));

        assert!(matches!(helper.commit(), Err(OutputHelperError::NothingToCommit { .. })));
    }

    #[test]
    fn rejected_commit_keeps_state_for_retry() {
        let output = Rc::new(MockOutput::new("DP-1", Size::new(32, 32)));
        let (mut helper, _) = output_helper(&output);
        helper.acquire_render_target(&MockRenderControl::software()).unwrap();
        helper.set_damage(&Region::from_rect(Rectangle::new(0, 0, 8, 8)));

        output.reject_commits(true);
        assert!(matches!(helper.commit(), Err(OutputHelperError::CommitRejected { .. })));
        assert!(helper.content_is_dirty());
        assert!(!helper.damage().is_empty());

        output.reject_commits(false);
        helper.commit().unwrap();
        assert!(!helper.content_is_dirty());
    }

    #[test]
    fn update_requests_render_only_when_dirty_and_ready() {
        let output = Rc::new(MockOutput::new("DP-1", Size::new(32, 32)));
        let (mut helper, events) = output_helper(&output);

        output.set_ready(true);
        helper.update();
        assert!(helper.needs_frame());
        assert!(!events.borrow().contains(&OutputHelperEvent::RenderRequested));

        helper.set_damage(&Region::from_rect(Rectangle::new(1, 1, 2, 2)));
        helper.update();
        assert_eq!(events.borrow().last(), Some(&OutputHelperEvent::RenderRequested));

        output.set_ready(false);
        events.borrow_mut().clear();
        helper.update();
        assert_eq!(*events.borrow(), vec![OutputHelperEvent::NeedsFrameChanged(false)]);
    }

    #[test]
    fn backend_damage_marks_whole_output() {
        let output = Rc::new(MockOutput::new("DP-1", Size::new(40, 30)));
        let (mut helper, events) = output_helper(&output);
        output.set_ready(true);

        helper.handle_backend_damage();
        assert!(helper.damage().covers(Rectangle::new(0, 0, 40, 30)));
        let events = events.borrow();
        assert!(events.contains(&OutputHelperEvent::Damaged));
        assert_eq!(events.last(), Some(&OutputHelperEvent::RenderRequested));
    }

    #[test]
    fn reset_state_clears_renderable_and_last_target() {
        let output = Rc::new(MockOutput::new("DP-1", Size::new(32, 32)));
        let (mut helper, _) = output_helper(&output);
        helper.acquire_render_target(&MockRenderControl::software()).unwrap();
        assert!(helper.last_render_target().is_some());

        helper.reset_state();
        assert!(!helper.renderable());
        assert!(helper.last_render_target().is_none());
        assert!(matches!(helper.commit(), Err(OutputHelperError::NothingToCommit { .. })));
    }

    #[test]
    fn pending_scale_and_transform_go_into_commit() {
        let output = Rc::new(MockOutput::new("DP-1", Size::new(32, 32)));
        let (mut helper, _) = output_helper(&output);
        helper.acquire_render_target(&MockRenderControl::software()).unwrap();
        helper.set_scale(2.0);
        helper.set_transform(OutputTransform::Rotate90);
        assert!(helper.content_is_dirty());
        helper.commit().unwrap();

        let committed = output.last_commit().unwrap();
        assert_eq!(committed.scale, Some(2.0));
        assert_eq!(committed.transform, Some(OutputTransform::Rotate90));
    }

    #[test]
    fn mode_change_invalidates_last_target() {
        let output = Rc::new(MockOutput::new("DP-1", Size::new(32, 32)));
        let (mut helper, _) = output_helper(&output);
        let rc = MockRenderControl::software();
        let first = helper.acquire_render_target(&rc).unwrap();

        output.set_pixel_size(Size::new(16, 16));
        let second = helper.acquire_render_target(&rc).unwrap();
        assert_ne!(first.target.id(), second.target.id());
        assert_eq!(second.target.pixel_size(), Size::new(16, 16));
    }
}
