#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

use std::path::PathBuf;

use shelfcheck::{DetectionRecord, ImageRef, RawDetection, normalize};
use time::OffsetDateTime;

/// Builds a record without touching the filesystem.
pub fn record(group: &str, name: &str, confidences: &[f32]) -> DetectionRecord {
    let image = ImageRef {
        path: PathBuf::from(group).join(name),
        group: group.to_string(),
        modified: OffsetDateTime::UNIX_EPOCH,
        size_bytes: 1,
        root_index: 0,
    };
    let raw = confidences
        .iter()
        .map(|&confidence| RawDetection {
            left: 0.0,
            top: 0.0,
            right: 10.0,
            bottom: 10.0,
            class_id: 0,
            label: "clipstrip".to_string(),
            confidence,
        })
        .collect();
    normalize::normalize(image, 0.25, raw)
}
