pub mod message;
pub mod thread;

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::math::{Mat4, Vec3};
use crate::parser::{dot_splat, ply};
use crate::sort::{depth_axis, DepthSorter};
use crate::splat::Splat;
use crate::store::SplatStore;
use crate::texture::TextureEncoder;

pub use message::{EngineMessage, HostMessage};
pub use thread::{spawn_engine, EngineHandle};

#[derive(Debug, Clone, Copy)]
struct SortedView {
    view_proj: Mat4,
    axis: Vec3,
    count: usize,
}

/// Single-threaded engine state: store, incremental encoder, depth sorter and
/// the one-slot pending view register.
///
/// Ingestion is applied as messages arrive; views only overwrite the pending
/// slot until [`Engine::sort_pending`] consumes it.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    store: SplatStore,
    encoder: TextureEncoder,
    sorter: DepthSorter,
    pending_view: Option<Mat4>,
    last_sorted: Option<SortedView>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            store: SplatStore::new(),
            encoder: TextureEncoder::new(config.texture_width),
            sorter: DepthSorter::new(config.depth_buckets),
            pending_view: None,
            last_sorted: None,
        })
    }

    pub fn store(&self) -> &SplatStore {
        &self.store
    }

    pub fn has_pending_view(&self) -> bool {
        self.pending_view.is_some()
    }

    /// Applies one host message, pushing any immediate responses.
    pub fn handle(&mut self, message: HostMessage, outbox: &mut Vec<EngineMessage>) {
        match message {
            HostMessage::LoadStructured { bytes, save } => {
                self.load_structured(&bytes, save, outbox)
            }
            HostMessage::LoadRaw {
                bytes,
                declared_count,
            } => self.load_raw(&bytes, declared_count, outbox),
            HostMessage::SetView { view_proj } => self.set_view(view_proj),
            HostMessage::Reset => self.reset(),
        }
    }

    /// Overwrites the pending view; an unsorted older view is dropped.
    pub fn set_view(&mut self, view_proj: Mat4) {
        if self.pending_view.replace(view_proj).is_some() {
            debug!("superseded pending view before sorting");
        }
    }

    pub fn reset(&mut self) {
        self.store.clear();
        self.encoder.reset();
        self.last_sorted = None;
        debug!("scene reset");
    }

    /// Resets for an incoming scene; the last sorted view is re-queued so the
    /// new scene gets an order without waiting for camera motion.
    fn replace_scene(&mut self) {
        let last_view = self.last_sorted.map(|last| last.view_proj);
        self.reset();
        if self.pending_view.is_none() {
            self.pending_view = last_view;
        }
    }

    /// A raw buffer continues the stored scene when its declared count does
    /// not shrink the store and the first and last rows it shares with the
    /// store are the stored ones.
    fn continues_scene(&self, bytes: &[u8], declared_count: usize) -> bool {
        let stored = self.store.as_slice();
        if declared_count < stored.len() {
            return false;
        }
        let shared = dot_splat::row_count(bytes.len()).min(stored.len());
        if shared == 0 {
            return true;
        }
        dot_splat::row_matches(bytes, 0, &stored[0])
            && dot_splat::row_matches(bytes, shared - 1, &stored[shared - 1])
    }

    fn load_structured(&mut self, bytes: &[u8], save: bool, outbox: &mut Vec<EngineMessage>) {
        let splats = match ply::decode_ply(bytes) {
            Ok(splats) => splats,
            Err(err) => {
                warn!(error = %err, "rejected structured scene");
                outbox.push(EngineMessage::LoadFailed(err));
                return;
            }
        };

        self.replace_scene();
        if save {
            outbox.push(EngineMessage::ExportBytes {
                bytes: dot_splat::encode_rows(&splats),
                save,
            });
        }
        info!(splats = splats.len(), "loaded structured scene");
        self.ingest(splats, outbox);
    }

    fn load_raw(&mut self, bytes: &[u8], declared_count: usize, outbox: &mut Vec<EngineMessage>) {
        let available = dot_splat::row_count(bytes.len());
        let target = declared_count.min(available);
        let mut start = self.store.count();
        if start > 0 && !self.continues_scene(bytes, declared_count) {
            info!(
                previous = start,
                declared_count, "raw buffer starts a new scene"
            );
            self.replace_scene();
            start = 0;
        }
        if target <= start {
            debug!(
                start,
                declared_count, available, "raw buffer holds no new rows"
            );
            return;
        }

        let batch = dot_splat::decode_row_range(bytes, start, target);
        debug!(start, end = target, declared_count, "ingesting raw rows");
        self.ingest(batch, outbox);
    }

    fn ingest(&mut self, batch: Vec<Splat>, outbox: &mut Vec<EngineMessage>) {
        if batch.is_empty() {
            return;
        }
        self.store.append(batch);
        if let Some(update) = self.encoder.encode_new(self.store.as_slice()) {
            outbox.push(EngineMessage::TextureUpdate(update));
        }
        // New records need ordering even if the camera holds still.
        if self.pending_view.is_none() {
            self.pending_view = self.last_sorted.map(|last| last.view_proj);
        }
    }

    /// Sorts against the pending view, if any, and clears the slot.
    ///
    /// Returns `None` when nothing is pending or when the view axis and store
    /// are unchanged since the last delivered order.
    pub fn sort_pending(&mut self) -> Option<EngineMessage> {
        let view_proj = self.pending_view.take()?;
        let count = self.store.count();
        let axis = depth_axis(&view_proj);

        if let Some(last) = &self.last_sorted {
            if last.count == count && 1.0 - last.axis.dot(axis) < self.config.resort_epsilon {
                debug!(count, "view axis unchanged, keeping previous order");
                return None;
            }
        }

        let started = Instant::now();
        let indices = self.sorter.sort(self.store.as_slice(), &view_proj);
        debug!(
            count,
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "depth sort finished"
        );

        self.last_sorted = Some(SortedView {
            view_proj,
            axis,
            count,
        });
        Some(EngineMessage::OrderUpdate { indices, count })
    }
}
