use std::path::{Component, Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use tracing::info;

use crate::detection::{Detector, RawDetection};
use crate::error::ModelLoadError;
use crate::models::ImageRef;

/// Replays predictions that an external detector already exported as YOLO
/// text files (`class cx cy w h [conf]`, coordinates normalized to `[0, 1]`).
///
/// A missing prediction file means the detector found nothing in that image.
pub struct LabelFileDetector {
    labels_dir: Option<PathBuf>,
    class_names: Vec<String>,
}

impl LabelFileDetector {
    /// `labels_dir` of `None` looks next to each image (see [`Self::prediction_path`]).
    pub fn new(labels_dir: Option<PathBuf>, class_names: Vec<String>) -> Result<Self, ModelLoadError> {
        if let Some(dir) = &labels_dir {
            if !dir.is_dir() {
                return Err(ModelLoadError::new(dir, anyhow!("prediction directory not found")));
            }
            info!(labels_dir = %dir.display(), "using exported predictions");
        }
        Ok(Self {
            labels_dir,
            class_names,
        })
    }

    /// Where the predictions for `image` are expected.
    ///
    /// With an explicit directory this is `<dir>/<store>/<stem>.txt` when that
    /// file exists, so same-named images in different stores stay apart, and
    /// `<dir>/<stem>.txt` otherwise. Without a directory the
    /// YOLO dataset layout is tried first (`.../images/<sub>/x.jpg` maps to
    /// `.../labels/<sub>/x.txt`), then a `.txt` beside the image.
    pub fn prediction_path(&self, image: &Path) -> PathBuf {
        let file_name = image.with_extension("txt");
        let file_name = file_name.file_name().map(PathBuf::from).unwrap_or_default();

        if let Some(dir) = &self.labels_dir {
            let per_store = image
                .parent()
                .and_then(|parent| parent.file_name())
                .map(|store| dir.join(store).join(&file_name));
            return match per_store {
                Some(path) if path.exists() => path,
                _ => dir.join(file_name),
            };
        }

        if let Some(sibling) = yolo_labels_path(image) {
            if sibling.exists() {
                return sibling;
            }
        }
        image.with_extension("txt")
    }

    fn class_label(&self, class_id: usize) -> String {
        self.class_names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{class_id}"))
    }
}

impl Detector for LabelFileDetector {
    fn detect(
        &self,
        image: &ImageRef,
        confidence_threshold: f32,
    ) -> anyhow::Result<Vec<RawDetection>> {
        let (width, height) = image::image_dimensions(&image.path)
            .with_context(|| format!("Failed to read image header {:?}", image.path))?;

        let path = self.prediction_path(&image.path);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read predictions {:?}", path))?;

        parse_predictions(&text, width, height, confidence_threshold, |id| {
            self.class_label(id)
        })
        .with_context(|| format!("Malformed predictions in {:?}", path))
    }

    fn name(&self) -> &str {
        "prediction-files"
    }
}

fn yolo_labels_path(image: &Path) -> Option<PathBuf> {
    let components: Vec<Component> = image.components().collect();
    let images_idx = components
        .iter()
        .rposition(|c| c.as_os_str() == "images")?;

    let mut path = PathBuf::new();
    for (i, c) in components.iter().enumerate() {
        if i == images_idx {
            path.push("labels");
        } else {
            path.push(c.as_os_str());
        }
    }
    Some(path.with_extension("txt"))
}

/// Parse YOLO prediction lines into pixel-space detections at or above the threshold.
pub(crate) fn parse_predictions(
    text: &str,
    width: u32,
    height: u32,
    confidence_threshold: f32,
    class_label: impl Fn(usize) -> String,
) -> anyhow::Result<Vec<RawDetection>> {
    let (w, h) = (width as f32, height as f32);
    let mut detections = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 5 && fields.len() != 6 {
            bail!("line {}: expected 5 or 6 fields, found {}", line_no + 1, fields.len());
        }

        let class_id: usize = fields[0]
            .parse()
            .with_context(|| format!("line {}: bad class id {:?}", line_no + 1, fields[0]))?;
        let mut values = [0f32; 5];
        for (slot, raw) in values.iter_mut().zip(&fields[1..]) {
            *slot = raw
                .parse()
                .with_context(|| format!("line {}: bad number {:?}", line_no + 1, raw))?;
            if !slot.is_finite() {
                bail!("line {}: non-finite value {:?}", line_no + 1, raw);
            }
        }
        let [cx, cy, bw, bh, _] = values;
        // Ground-truth style lines carry no confidence.
        let confidence = if fields.len() == 6 { values[4] } else { 1.0 };

        if confidence < confidence_threshold {
            continue;
        }

        detections.push(RawDetection {
            left: (cx - bw / 2.0) * w,
            top: (cy - bh / 2.0) * h,
            right: (cx + bw / 2.0) * w,
            bottom: (cy + bh / 2.0) * h,
            class_id,
            label: class_label(class_id),
            confidence,
        });
    }

    Ok(detections)
}
