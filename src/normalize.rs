//! Raw detector output to canonical [`DetectionRecord`]s. No I/O.

use crate::detection::RawDetection;
use crate::error::DetectionError;
use crate::models::{DetectionBox, DetectionRecord, DetectionStatus, ImageRef};

/// Build the record for one image at `threshold`.
///
/// An empty `raw` is the ordinary non-compliant case.
pub fn normalize(image: ImageRef, threshold: f32, raw: Vec<RawDetection>) -> DetectionRecord {
    let boxes = raw.into_iter().map(normalize_box).collect();
    DetectionRecord::new(image, threshold, boxes, DetectionStatus::Detected)
}

/// Record for an image whose detection failed: no boxes, flagged for review.
pub fn normalize_failure(
    image: ImageRef,
    threshold: f32,
    error: &DetectionError,
) -> DetectionRecord {
    DetectionRecord::new(
        image,
        threshold,
        Vec::new(),
        DetectionStatus::Failed {
            reason: error.reason.clone(),
        },
    )
}

fn normalize_box(raw: RawDetection) -> DetectionBox {
    let confidence = if raw.confidence.is_nan() {
        0.0
    } else {
        raw.confidence.clamp(0.0, 1.0)
    };

    DetectionBox {
        left: raw.left.min(raw.right),
        top: raw.top.min(raw.bottom),
        right: raw.left.max(raw.right),
        bottom: raw.top.max(raw.bottom),
        class_id: raw.class_id,
        label: raw.label,
        confidence,
    }
}
