//! Render target cache for display buffers.
//!
//! [`RenderHelper`] keeps one entry per display buffer it has built a render
//! target for. Entries are looked up linearly: the cache only ever holds the
//! buffers of a swapchain, two to four in practice. Entries leave the cache
//! when the working size changes or when the buffer subsystem reports the
//! buffer destroyed.

use crate::backend::{BackendAdapter, EntryResources, TargetParams};
use crate::config::RenderHelperConfig;
use crate::error::{fatal_configuration_mismatch, ConfigurationMismatch, ConstructionError, ExportError};
use crate::export::TextureExportAdapter;
use crate::graphics_api::GraphicsApi;
use crate::renderer::{BackendRenderer, RendererKind};
use crate::scene::{RenderControl, SceneTexture};
use crate::target::RenderTarget;
use novade_buffer_manager::{
    BufferDestroyListener, BufferId, DisplayBuffer, ListenerId, WeakDisplayBuffer,
};
use novade_compositor_core::Size;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::{debug, info, trace, warn};

struct BufferEntry {
    buffer: WeakDisplayBuffer,
    target: RenderTarget,
    // Released exactly once, when the entry is dropped.
    resources: EntryResources,
}

#[derive(Default)]
struct CacheState {
    size: Size,
    entries: Vec<BufferEntry>,
    /// Most recently acquired entry, by buffer identity.
    last: Option<BufferId>,
}

impl CacheState {
    fn position(&self, id: BufferId) -> Option<usize> {
        self.entries.iter().position(|e| e.buffer.id() == id)
    }

    fn remove(&mut self, id: BufferId) -> Option<BufferEntry> {
        let index = self.position(id)?;
        if self.last == Some(id) {
            self.last = None;
        }
        Some(self.entries.remove(index))
    }
}

/// Entry storage shared with the destruction listener registrations.
#[derive(Default)]
struct EntryCache {
    state: RefCell<CacheState>,
}

impl BufferDestroyListener for EntryCache {
    fn buffer_destroyed(&self, id: BufferId) {
        let removed = self.state.borrow_mut().remove(id);
        if let Some(entry) = removed {
            debug!(
                buffer = ?id,
                target = ?entry.target.id(),
                resources = entry.resources.len(),
                "Buffer destroyed, releasing its render target"
            );
        }
    }
}

/// Builds and caches render targets for display buffers, and exports
/// rendered textures as display buffers.
pub struct RenderHelper {
    api: GraphicsApi,
    renderer: Rc<dyn BackendRenderer>,
    adapter: BackendAdapter,
    exporter: TextureExportAdapter,
    cache: Rc<EntryCache>,
    listener_id: ListenerId,
    device_pixel_ratio: f64,
    sample_count: u32,
}

impl RenderHelper {
    /// Creates a helper rendering through `renderer` for graphics API `api`.
    ///
    /// The renderer must be the one [`RendererKind::for_api`] names for
    /// `api`; anything else is a fatal configuration mismatch.
    pub fn new(api: GraphicsApi, renderer: Rc<dyn BackendRenderer>, config: &RenderHelperConfig) -> Self {
        let expected =
            RendererKind::for_api(api).unwrap_or_else(|| fatal_configuration_mismatch(ConfigurationMismatch::NoAdapter(api)));
        if renderer.kind() != expected {
            fatal_configuration_mismatch(ConfigurationMismatch::RendererKind {
                api,
                expected,
                actual: renderer.kind(),
            });
        }
        let exporter = TextureExportAdapter::for_api(api).unwrap_or_else(|e| fatal_configuration_mismatch(e));
        info!(%api, renderer = expected.name(), "Render helper created");

        Self {
            api,
            renderer,
            adapter: BackendAdapter::for_renderer(expected),
            exporter,
            cache: Rc::new(EntryCache::default()),
            listener_id: ListenerId::new_unique(),
            device_pixel_ratio: config.device_pixel_ratio,
            sample_count: config.sample_count,
        }
    }

    /// Creates a helper for the process-wide graphics API.
    pub fn for_process(renderer: Rc<dyn BackendRenderer>, config: &RenderHelperConfig) -> Self {
        Self::new(config.resolve_graphics_api(), renderer, config)
    }

    pub fn graphics_api(&self) -> GraphicsApi {
        self.api
    }

    pub fn renderer(&self) -> &Rc<dyn BackendRenderer> {
        &self.renderer
    }

    pub fn size(&self) -> Size {
        self.cache.state.borrow().size
    }

    /// Adopts a new working size. Every cached entry is released when the
    /// size changes, since render targets are size specific.
    ///
    /// Returns whether the size changed.
    pub fn set_working_size(&mut self, size: Size) -> bool {
        let released = {
            let mut state = self.cache.state.borrow_mut();
            if state.size == size {
                return false;
            }
            debug!(old = %state.size, new = %size, entries = state.entries.len(), "Render target size changed");
            state.size = size;
            state.last = None;
            std::mem::take(&mut state.entries)
        };
        self.release_entries(released);
        true
    }

    /// Number of cached entries.
    pub fn cached_len(&self) -> usize {
        self.cache.state.borrow().entries.len()
    }

    pub fn is_cached(&self, id: BufferId) -> bool {
        self.cache.state.borrow().position(id).is_some()
    }

    /// Returns the render target for `buffer`, building it on first use.
    ///
    /// Returns `None` when the working size is empty or the target cannot be
    /// built; nothing is cached in that case and the caller skips the frame.
    pub fn acquire_render_target(&mut self, rc: &dyn RenderControl, buffer: &DisplayBuffer) -> Option<RenderTarget> {
        let params = self.params();
        if params.size.is_empty() {
            trace!(buffer = ?buffer.id(), "Working size is empty, no render target");
            return None;
        }

        if let Some(cached) = self.lookup(buffer.id()) {
            trace!(buffer = ?buffer.id(), target = ?cached.id(), "Render target cache hit");
            return Some(cached);
        }

        if buffer.is_destroyed() {
            debug!(buffer = ?buffer.id(), "Refusing to build a render target for a destroyed buffer");
            return None;
        }

        let (target, resources) = match self.construct(rc, buffer, &params) {
            Ok(built) => built,
            Err(err) => {
                warn!(buffer = ?buffer.id(), error = %err, "Failed to build render target");
                return None;
            }
        };

        let listener: Weak<dyn BufferDestroyListener> = Rc::downgrade(&self.cache) as Weak<dyn BufferDestroyListener>;
        buffer.subscribe_destroy(self.listener_id, listener);

        let mut state = self.cache.state.borrow_mut();
        state.entries.push(BufferEntry {
            buffer: buffer.downgrade(),
            target: target.clone(),
            resources,
        });
        state.last = Some(buffer.id());
        debug!(buffer = ?buffer.id(), target = ?target.id(), entries = state.entries.len(), "Render target created");
        Some(target)
    }

    /// The most recently acquired buffer and its render target.
    pub fn last_render_target(&self) -> Option<(DisplayBuffer, RenderTarget)> {
        let state = self.cache.state.borrow();
        let id = state.last?;
        let entry = &state.entries[state.position(id)?];
        Some((entry.buffer.upgrade()?, entry.target.clone()))
    }

    /// Exports a rendered texture. The returned buffer belongs to the caller.
    pub fn export_texture(&self, texture: &dyn SceneTexture) -> Result<DisplayBuffer, ExportError> {
        self.exporter.export(self.renderer.as_ref(), texture).map_err(|err| {
            warn!(api = %self.api, error = %err, "Texture export failed");
            err
        })
    }

    fn params(&self) -> TargetParams {
        TargetParams {
            size: self.size(),
            device_pixel_ratio: self.device_pixel_ratio,
            sample_count: self.sample_count,
        }
    }

    fn lookup(&self, id: BufferId) -> Option<RenderTarget> {
        let mut state = self.cache.state.borrow_mut();
        let index = state.position(id)?;
        state.last = Some(id);
        Some(state.entries[index].target.clone())
    }

    fn construct(
        &self,
        rc: &dyn RenderControl,
        buffer: &DisplayBuffer,
        params: &TargetParams,
    ) -> Result<(RenderTarget, EntryResources), ConstructionError> {
        let native = self.renderer.import_buffer(buffer)?;
        let mut target = self.adapter.build(&native, params)?;

        let api = rc.graphics_api();
        let resources = if api.is_rhi_based() {
            let rhi = rc.rhi().ok_or(ConstructionError::MissingRhi(api))?;
            self.adapter.materialize(rhi, &native, &mut target)?
        } else {
            EntryResources::default()
        };
        Ok((target, resources))
    }

    fn release_entries(&self, entries: Vec<BufferEntry>) {
        for entry in entries {
            if let Some(buffer) = entry.buffer.upgrade() {
                buffer.unsubscribe_destroy(self.listener_id);
            }
            trace!(
                buffer = ?entry.buffer.id(),
                target = ?entry.target.id(),
                resources = entry.resources.len(),
                "Released render target"
            );
        }
    }
}

impl Drop for RenderHelper {
    fn drop(&mut self) {
        let entries = std::mem::take(&mut self.cache.state.borrow_mut().entries);
        self.release_entries(entries);
    }
}
