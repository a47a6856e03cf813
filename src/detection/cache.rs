use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use crate::models::{DetectionRecord, ImageRef};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    path: PathBuf,
    threshold_bits: u32,
}

impl CacheKey {
    fn new(image: &ImageRef, threshold: f32) -> Self {
        Self {
            path: image.path.clone(),
            threshold_bits: threshold.to_bits(),
        }
    }
}

/// Session-lifetime memo of detection records keyed by (image, threshold).
///
/// Only ever cleared as a whole.
#[derive(Debug, Default)]
pub struct DetectionCache {
    entries: HashMap<CacheKey, DetectionRecord>,
    hits: u64,
    misses: u64,
}

impl DetectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, image: &ImageRef, threshold: f32) -> Option<&DetectionRecord> {
        self.entries.get(&CacheKey::new(image, threshold))
    }

    pub fn contains(&self, image: &ImageRef, threshold: f32) -> bool {
        self.entries.contains_key(&CacheKey::new(image, threshold))
    }

    pub fn insert(&mut self, record: DetectionRecord) {
        let key = CacheKey::new(record.image(), record.threshold());
        self.entries.insert(key, record);
    }

    /// Record a lookup outcome for the hit/miss counters
    pub(crate) fn note_lookup(&mut self, hit: bool) {
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }

    pub fn invalidate(&mut self) {
        debug!(entries = self.entries.len(), "invalidating detection cache");
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
