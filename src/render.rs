//! Display-ready views of records and statistics.
//!
//! Everything here is a pure mapping from data to pixels or text; caching and
//! the actual display surface belong to the caller.

use std::path::{Path, PathBuf};

use anyhow::Context;
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use serde::Serialize;

use crate::models::{CorpusStatistics, DetectionBox, DetectionRecord, DetectionStatus};

pub const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const BOX_THICKNESS: u32 = 3;
/// Captions sit this many pixels above the top edge of their box
pub const CAPTION_OFFSET: i32 = 15;

/// Text to draw next to one box, anchored at its top-left corner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxCaption {
    pub text: String,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone)]
pub struct AnnotatedImage {
    pub image: RgbImage,
    pub captions: Vec<BoxCaption>,
}

/// Text that goes with one image tile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordView {
    pub file_name: String,
    pub group: String,
    pub compliant: bool,
    pub needs_review: bool,
    pub compliance_line: String,
    pub count_line: String,
    pub caption: String,
    pub box_captions: Vec<BoxCaption>,
}

pub fn caption_text(detection: &DetectionBox) -> String {
    format!("{} {:.2}", detection.label, detection.confidence)
}

pub fn box_caption(detection: &DetectionBox) -> BoxCaption {
    BoxCaption {
        text: caption_text(detection),
        x: detection.left.round() as i32,
        y: (detection.top.round() as i32).saturating_sub(CAPTION_OFFSET),
    }
}

/// Draw every box of `record` onto a copy of `source`.
pub fn annotate(source: &DynamicImage, record: &DetectionRecord) -> AnnotatedImage {
    let mut image = source.to_rgb8();
    for detection in record.boxes() {
        draw_box(&mut image, detection);
    }

    AnnotatedImage {
        image,
        captions: record.boxes().iter().map(box_caption).collect(),
    }
}

/// Load the record's image from disk and annotate it
pub fn annotate_file(record: &DetectionRecord) -> anyhow::Result<AnnotatedImage> {
    let path = &record.image().path;
    let source = image::open(path).with_context(|| format!("Failed to open image {:?}", path))?;
    Ok(annotate(&source, record))
}

fn draw_box(image: &mut RgbImage, detection: &DetectionBox) {
    // Coordinates are clamped to just past the image so offscreen edges stay
    // offscreen and the rect arithmetic stays small.
    let margin = BOX_THICKNESS as f32;
    let (w, h) = (image.width() as f32, image.height() as f32);
    let clamp_x = |v: f32| v.clamp(-margin, w + margin);
    let clamp_y = |v: f32| v.clamp(-margin, h + margin);

    let (left, right) = (clamp_x(detection.left), clamp_x(detection.right));
    let (top, bottom) = (clamp_y(detection.top), clamp_y(detection.bottom));
    let width = ((right - left).round().max(0.0) as u32).max(1);
    let height = ((bottom - top).round().max(0.0) as u32).max(1);
    let (left, top) = (left.round() as i32, top.round() as i32);

    // Thickness grows outwards so thin boxes keep their interior visible.
    for t in 0..BOX_THICKNESS {
        let rect = Rect::at(left - t as i32, top - t as i32).of_size(width + 2 * t, height + 2 * t);
        draw_hollow_rect_mut(image, rect, BOX_COLOR);
    }
}

pub fn compliance_line(record: &DetectionRecord, target_label: &str) -> String {
    match record.status() {
        DetectionStatus::Failed { reason } => format!("Needs review (detection failed: {reason})"),
        DetectionStatus::Detected if record.is_compliant() => format!(
            "Compliant ({target_label} detected, avg conf {:.2})",
            record.average_confidence()
        ),
        DetectionStatus::Detected => format!("Non-compliant (no {target_label} found)"),
    }
}

pub fn count_line(record: &DetectionRecord, target_label: &str) -> String {
    format!("{} {target_label}(s) detected", record.detection_count())
}

pub fn record_view(record: &DetectionRecord, target_label: &str) -> RecordView {
    RecordView {
        file_name: record.image().file_name(),
        group: record.image().group.clone(),
        compliant: record.is_compliant(),
        needs_review: record.needs_review(),
        compliance_line: compliance_line(record, target_label),
        count_line: count_line(record, target_label),
        caption: format!(
            "Detections: {} | Avg Conf: {:.2}",
            record.detection_count(),
            record.average_confidence()
        ),
        box_captions: record.boxes().iter().map(box_caption).collect(),
    }
}

/// `"2 compliant | 1 non-compliant | 3 clipstrips total"`
pub fn summary_line(stats: &CorpusStatistics, target_label: &str) -> String {
    let mut line = format!(
        "{} compliant | {} non-compliant | {} {target_label}s total",
        stats.compliant_images, stats.non_compliant_images, stats.total_detections
    );
    if stats.failed_images > 0 {
        line.push_str(&format!(" | {} need review", stats.failed_images));
    }
    line
}

pub fn metrics_block(stats: &CorpusStatistics, target_label: &str) -> String {
    let mut label = target_label.to_string();
    if let Some(first) = label.get_mut(0..1) {
        first.make_ascii_uppercase();
    }

    format!(
        "Stores: {}\nImages: {}\n{label}s detected: {}\nAvg confidence: {:.2}\nCompliance: {:.1}%",
        stats.total_groups,
        stats.total_images,
        stats.total_detections,
        stats.average_confidence,
        stats.compliance_rate,
    )
}

pub fn group_table(stats: &CorpusStatistics) -> String {
    let mut out = format!(
        "{:<24} {:>7} {:>10} {:>11} {:>9}\n",
        "store", "images", "detections", "compliance", "avg conf"
    );
    for (group, g) in &stats.groups {
        out.push_str(&format!(
            "{:<24} {:>7} {:>10} {:>10.1}% {:>9.2}\n",
            group, g.images, g.detections, g.compliance_rate, g.average_confidence
        ));
    }
    out
}

/// Write an annotated PNG named after the source image into `dir`.
pub fn save_annotated(dir: &Path, record: &DetectionRecord) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {:?}", dir))?;

    let annotated = annotate_file(record)?;
    let stem = record
        .image()
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let output_path = dir.join(format!("{}_{}.png", record.image().group, stem));

    annotated
        .image
        .save(&output_path)
        .map_err(|e| anyhow::anyhow!("Failed to save annotated image: {}", e))?;
    Ok(output_path)
}
