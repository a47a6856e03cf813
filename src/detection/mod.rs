pub mod cache;
pub mod labels;
pub mod preprocessing;
pub mod yolo;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::DetectionError;
use crate::models::{DetectionRecord, ImageRef};
use crate::normalize;

pub use cache::DetectionCache;
pub use labels::LabelFileDetector;
pub use yolo::{YoloDetector, YoloParams, find_latest_weights};

/// One region as reported by the detection capability, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub class_id: usize,
    pub label: String,
    pub confidence: f32,
}

/// Uniform interface over the external detection capability.
///
/// Implementations are loaded once per session and shared read-only across
/// every call, so `detect` must not mutate instance state. Every returned
/// detection is expected to satisfy `confidence >= confidence_threshold`;
/// callers do not re-filter.
pub trait Detector: Send + Sync {
    fn detect(
        &self,
        image: &ImageRef,
        confidence_threshold: f32,
    ) -> anyhow::Result<Vec<RawDetection>>;

    /// Human-readable name for this detector (used in logs)
    fn name(&self) -> &str;
}

/// Run the detector on one image and normalize the outcome.
///
/// A detector error becomes a failed record (zero boxes, flagged for review)
/// instead of aborting the batch.
pub fn detect_record(
    detector: &dyn Detector,
    image: &ImageRef,
    confidence_threshold: f32,
) -> DetectionRecord {
    match detector.detect(image, confidence_threshold) {
        Ok(raw) => {
            debug!(
                path = %image.path.display(),
                detections = raw.len(),
                detector = detector.name(),
                "detected"
            );
            normalize::normalize(image.clone(), confidence_threshold, raw)
        }
        Err(e) => {
            let error = DetectionError {
                path: image.path.clone(),
                reason: format!("{e:#}"),
            };
            warn!(%error, "image flagged for review");
            normalize::normalize_failure(image.clone(), confidence_threshold, &error)
        }
    }
}

/// Detect every image, returning records in the same order as `images`.
pub fn detect_all(
    detector: &dyn Detector,
    images: &[&ImageRef],
    confidence_threshold: f32,
    parallel: bool,
) -> Vec<DetectionRecord> {
    if parallel {
        images
            .par_iter()
            .map(|image| detect_record(detector, image, confidence_threshold))
            .collect()
    } else {
        images
            .iter()
            .map(|image| detect_record(detector, image, confidence_threshold))
            .collect()
    }
}
