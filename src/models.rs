use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use time::OffsetDateTime;

/// One scanned image. Never mutated after the scanner creates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRef {
    pub path: PathBuf,
    /// Parent folder name, used as the store identifier.
    pub group: String,
    #[serde(with = "time::serde::rfc3339")]
    pub modified: OffsetDateTime,
    pub size_bytes: u64,
    /// Index of the scan root this image was found under.
    pub root_index: usize,
}

impl ImageRef {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// A detected region in image pixel space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub class_id: usize,
    pub label: String,
    pub confidence: f32,
}

impl DetectionBox {
    pub fn width(&self) -> f32 {
        (self.right - self.left).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.bottom - self.top).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectionStatus {
    Detected,
    /// Detection raised an error; the image is kept but flagged for review.
    Failed { reason: String },
}

/// Normalized detection result for one image at one confidence threshold.
///
/// Built by [`crate::normalize`]; the derived fields are computed once at
/// construction so `is_compliant == (detection_count > 0)` always holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionRecord {
    image: ImageRef,
    threshold: f32,
    boxes: Vec<DetectionBox>,
    detection_count: usize,
    average_confidence: f32,
    is_compliant: bool,
    status: DetectionStatus,
}

impl DetectionRecord {
    pub(crate) fn new(
        image: ImageRef,
        threshold: f32,
        boxes: Vec<DetectionBox>,
        status: DetectionStatus,
    ) -> Self {
        let detection_count = boxes.len();
        let average_confidence = if detection_count == 0 {
            0.0
        } else {
            let sum: f64 = boxes.iter().map(|b| b.confidence as f64).sum();
            (sum / detection_count as f64) as f32
        };

        Self {
            image,
            threshold,
            boxes,
            detection_count,
            average_confidence,
            is_compliant: detection_count > 0,
            status,
        }
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn boxes(&self) -> &[DetectionBox] {
        &self.boxes
    }

    pub fn detection_count(&self) -> usize {
        self.detection_count
    }

    /// Mean box confidence, `0.0` when nothing was detected.
    pub fn average_confidence(&self) -> f32 {
        self.average_confidence
    }

    pub fn is_compliant(&self) -> bool {
        self.is_compliant
    }

    pub fn status(&self) -> &DetectionStatus {
        &self.status
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, DetectionStatus::Failed { .. })
    }

    /// True when the zero-detection verdict came from a failure rather than the model.
    pub fn needs_review(&self) -> bool {
        self.is_failed()
    }
}

/// Per-group (store) rollup.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupStatistics {
    pub images: usize,
    pub detections: usize,
    pub compliant_images: usize,
    pub failed_images: usize,
    pub compliance_rate: f64,
    pub average_confidence: f64,
}

/// Corpus-wide rollup. Recomputed on demand, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorpusStatistics {
    pub total_images: usize,
    pub total_detections: usize,
    pub total_groups: usize,
    pub compliant_images: usize,
    pub non_compliant_images: usize,
    pub failed_images: usize,
    /// Percentage in `[0, 100]`; `0` for an empty corpus.
    pub compliance_rate: f64,
    /// Mean over every individual box confidence, not a mean of per-image means.
    pub average_confidence: f64,
    pub groups: BTreeMap<String, GroupStatistics>,
}

impl CorpusStatistics {
    pub fn is_empty(&self) -> bool {
        self.total_images == 0
    }

    pub fn group(&self, key: &str) -> Option<&GroupStatistics> {
        self.groups.get(key)
    }
}
