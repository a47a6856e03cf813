use std::ops::Range;
use std::sync::Arc;

use serde::Serialize;
use tracing::{Span, debug, info, info_span, warn};
use uuid::Uuid;

use crate::aggregate;
use crate::config::{ReviewConfig, ReviewMode, validate_threshold};
use crate::detection::{self, DetectionCache, Detector};
use crate::error::{ConfigError, ReviewError, ReviewResult};
use crate::models::{CorpusStatistics, DetectionRecord, ImageRef};
use crate::navigation::{Navigator, Position};
use crate::scanner::{self, Corpus, ScanOptions};

/// Everything the display side needs for one screen, as plain data.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewSnapshot {
    pub session_id: Uuid,
    pub confidence_threshold: f32,
    pub mode: ReviewMode,
    pub position: Position,
    pub records: Vec<DetectionRecord>,
    pub statistics: CorpusStatistics,
}

/// One review session: the scanned corpus, the shared detector, the
/// detection cache and the navigation cursor.
///
/// All mutation goes through `&mut self`, so a session has a single writer.
/// Wrap it in a `Mutex` to share it between request handlers.
pub struct Session {
    id: Uuid,
    span: Span,
    config: ReviewConfig,
    detector: Arc<dyn Detector>,
    corpus: Corpus,
    cache: DetectionCache,
    navigator: Navigator,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("detector", &self.detector.name())
            .field("images", &self.corpus.len())
            .field("cursor", &self.navigator.cursor())
            .finish()
    }
}

impl Session {
    /// Validate the config and scan the corpus. No detection runs yet.
    pub fn open(config: ReviewConfig, detector: Arc<dyn Detector>) -> ReviewResult<Self> {
        config.validate()?;

        let id = Uuid::new_v4();
        let span = info_span!("session", id = %id);

        let corpus = span.in_scope(|| {
            let corpus = scanner::scan(&config.roots, &ScanOptions::from(&config))?;
            info!(
                images = corpus.len(),
                detector = detector.name(),
                threshold = config.confidence_threshold,
                "opened review session"
            );
            Ok::<_, ReviewError>(corpus)
        })?;
        let navigator = Navigator::new(config.mode, config.page_size, corpus.len());

        Ok(Self {
            id,
            span,
            config,
            detector,
            corpus,
            cache: DetectionCache::new(),
            navigator,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn images(&self) -> &[ImageRef] {
        &self.corpus.images
    }

    pub fn threshold(&self) -> f32 {
        self.config.confidence_threshold
    }

    pub fn cursor(&self) -> usize {
        self.navigator.cursor()
    }

    pub fn position(&self) -> Position {
        self.navigator.position()
    }

    pub fn cache(&self) -> &DetectionCache {
        &self.cache
    }

    pub fn advance(&mut self) -> usize {
        self.navigator.advance()
    }

    pub fn retreat(&mut self) -> usize {
        self.navigator.retreat()
    }

    pub fn jump(&mut self, cursor: usize) -> usize {
        self.navigator.jump(cursor)
    }

    /// Drop every cached record and pick up files added or removed since
    /// the last scan. The cursor only moves if it falls out of range.
    /// A failed scan leaves the session as it was.
    pub fn refresh(&mut self) -> ReviewResult<usize> {
        let _guard = self.span.enter();
        let corpus = scanner::scan(&self.config.roots, &ScanOptions::from(&self.config))?;
        self.cache.invalidate();
        self.corpus = corpus;
        let cursor = self.navigator.resize(self.corpus.len());
        info!(images = self.corpus.len(), cursor, "refreshed session");
        Ok(cursor)
    }

    /// Replace the corpus with a fresh scan. A change in size resets the cursor.
    pub fn rescan(&mut self) -> ReviewResult<usize> {
        let _guard = self.span.enter();
        let corpus = scanner::scan(&self.config.roots, &ScanOptions::from(&self.config))?;
        self.cache.invalidate();
        self.corpus = corpus;
        let cursor = self.navigator.reset(self.corpus.len());
        info!(images = self.corpus.len(), cursor, "rescanned corpus");
        Ok(cursor)
    }

    /// Change the confidence threshold; every cached record is discarded.
    pub fn set_threshold(&mut self, threshold: f32) -> Result<(), ConfigError> {
        validate_threshold(threshold)?;
        if threshold.to_bits() != self.config.confidence_threshold.to_bits() {
            let _guard = self.span.enter();
            info!(
                from = self.config.confidence_threshold,
                to = threshold,
                "confidence threshold changed"
            );
            self.cache.invalidate();
            self.config.confidence_threshold = threshold;
        }
        Ok(())
    }

    /// Records visible at the cursor: one image, or one page.
    pub fn current(&mut self) -> Vec<&DetectionRecord> {
        let range = self.navigator.visible_range();
        self.records_in(range)
    }

    pub fn current_record(&mut self) -> Option<&DetectionRecord> {
        self.current().into_iter().next()
    }

    /// Every record in canonical order, detecting whatever is not cached.
    pub fn records(&mut self) -> Vec<&DetectionRecord> {
        self.records_in(0..self.corpus.len())
    }

    pub fn statistics(&mut self) -> CorpusStatistics {
        let policy = self.config.failure_policy;
        let stats = aggregate::aggregate_with(self.records(), policy);
        if stats.failed_images > 0 {
            let _guard = self.span.enter();
            warn!(
                failed = stats.failed_images,
                "some images could not be analyzed"
            );
        }
        stats
    }

    pub fn snapshot(&mut self) -> ReviewSnapshot {
        let statistics = self.statistics();
        let records = self.current().into_iter().cloned().collect();

        ReviewSnapshot {
            session_id: self.id,
            confidence_threshold: self.threshold(),
            mode: self.navigator.mode(),
            position: self.navigator.position(),
            records,
            statistics,
        }
    }

    fn records_in(&mut self, range: Range<usize>) -> Vec<&DetectionRecord> {
        self.ensure_detected(range.clone());
        let threshold = self.threshold();
        self.corpus.images[range]
            .iter()
            .filter_map(|image| self.cache.get(image, threshold))
            .collect()
    }

    fn ensure_detected(&mut self, range: Range<usize>) {
        let threshold = self.threshold();
        let mut pending: Vec<&ImageRef> = Vec::new();

        for image in &self.corpus.images[range] {
            let hit = self.cache.contains(image, threshold);
            self.cache.note_lookup(hit);
            if !hit {
                pending.push(image);
            }
        }
        if pending.is_empty() {
            return;
        }

        let _guard = self.span.enter();
        debug!(
            pending = pending.len(),
            parallel = self.config.parallel,
            "running detection"
        );
        let records = detection::detect_all(
            self.detector.as_ref(),
            &pending,
            threshold,
            self.config.parallel,
        );
        for record in records {
            self.cache.insert(record);
        }
    }
}
