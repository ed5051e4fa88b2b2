use moka::sync::Cache as MokaCache;

use crate::shared::frame::FrameArray;

/// Bounded per-backend cache of decoded frames keyed by frame index.
///
/// A capacity of 0 disables caching. Each backend instance builds its own
/// cache; nothing is shared between instances.
#[derive(Debug)]
pub struct FrameCache {
    capacity: usize,
    frames: Option<MokaCache<usize, FrameArray>>,
}

impl FrameCache {
    pub fn new(capacity: usize) -> Self {
        let frames = (capacity > 0).then(|| MokaCache::new(capacity as u64));
        Self { capacity, frames }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of cached frames once pending evictions have been applied.
    pub fn len(&self) -> usize {
        match &self.frames {
            Some(frames) => {
                frames.run_pending_tasks();
                frames.entry_count() as usize
            }
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, index: usize) -> bool {
        self.frames
            .as_ref()
            .is_some_and(|frames| frames.contains_key(&index))
    }

    /// Returns a copy of the cached frame.
    pub fn get(&self, index: usize) -> Option<FrameArray> {
        self.frames.as_ref()?.get(&index)
    }

    pub fn insert(&self, index: usize, frame: FrameArray) {
        if let Some(frames) = &self.frames {
            frames.insert(index, frame);
        }
    }

    pub fn clear(&self) {
        if let Some(frames) = &self.frames {
            frames.invalidate_all();
            frames.run_pending_tasks();
        }
    }
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new(crate::shared::constants::DEFAULT_FRAME_CACHE_CAPACITY)
    }
}
