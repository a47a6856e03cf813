use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::anyhow;
use rten::Model;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::detection::{Detector, RawDetection, preprocessing};
use crate::error::ModelLoadError;
use crate::models::ImageRef;

/// File name of the best checkpoint inside a training run's `weights/` folder
pub const BEST_WEIGHTS_FILE: &str = "best.rten";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoloParams {
    pub input_size: u32,        // 640 typical
    pub iou_threshold: f32,     // 0..1
    pub max_detections: usize,  // e.g. 100
    /// Class names indexed by class id
    pub class_names: Vec<String>,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            iou_threshold: 0.45,
            max_detections: 100,
            class_names: vec!["clipstrip".to_string()],
        }
    }
}

impl YoloParams {
    pub fn class_label(&self, class_id: usize) -> String {
        self.class_names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{class_id}"))
    }
}

/// YOLOv8-style single-output detector running on rten.
///
/// Expects one `[1, 3, S, S]` input and one `[1, 4 + classes, candidates]`
/// output where the first four rows are `cx, cy, w, h` in input pixels.
pub struct YoloDetector {
    model: Model,
    params: YoloParams,
    name: String,
}

impl YoloDetector {
    pub fn load(path: &Path, params: YoloParams) -> Result<Self, ModelLoadError> {
        if !path.is_file() {
            return Err(ModelLoadError::new(path, anyhow!("weights file not found")));
        }
        let model =
            Model::load_file(path).map_err(|e| ModelLoadError::new(path, anyhow!("{e}")))?;

        info!(weights = %path.display(), input_size = params.input_size, "loaded detection model");

        let name = path
            .file_stem()
            .map(|s| format!("yolo:{}", s.to_string_lossy()))
            .unwrap_or_else(|| "yolo".to_string());

        Ok(Self {
            model,
            params,
            name,
        })
    }

    pub fn params(&self) -> &YoloParams {
        &self.params
    }
}

impl Detector for YoloDetector {
    fn detect(
        &self,
        image: &ImageRef,
        confidence_threshold: f32,
    ) -> anyhow::Result<Vec<RawDetection>> {
        let rgb = preprocessing::load_rgb(&image.path)?;
        let size = self.params.input_size;
        let resized = preprocessing::resize_for_model(&rgb, size);
        let input = preprocessing::to_nchw_tensor(&resized);

        let output = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|e| anyhow!("inference failed: {e}"))?;
        let output: NdTensor<f32, 3> = output
            .try_into()
            .map_err(|e| anyhow!("unexpected model output: {e:?}"))?;

        let [_, attrs, candidates] = output.shape();
        if attrs < 5 {
            anyhow::bail!("model output has {attrs} attributes per candidate, expected at least 5");
        }

        let mut flat = Vec::with_capacity(attrs * candidates);
        for a in 0..attrs {
            for i in 0..candidates {
                flat.push(output[[0, a, i]]);
            }
        }

        let scale = (
            rgb.width() as f32 / size as f32,
            rgb.height() as f32 / size as f32,
        );
        let detections = decode_candidates(
            &flat,
            attrs,
            candidates,
            scale,
            confidence_threshold,
            &self.params,
        );

        debug!(
            path = %image.path.display(),
            candidates,
            kept = detections.len(),
            "decoded yolo output"
        );
        Ok(detections)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Decode a row-major `[attrs, candidates]` prediction matrix.
///
/// Keeps the best class per candidate when its score reaches the threshold,
/// rescales to source pixels, then applies per-class NMS.
pub(crate) fn decode_candidates(
    data: &[f32],
    attrs: usize,
    candidates: usize,
    (sx, sy): (f32, f32),
    confidence_threshold: f32,
    params: &YoloParams,
) -> Vec<RawDetection> {
    let at = |a: usize, i: usize| data[a * candidates + i];
    let mut detections = Vec::new();

    for i in 0..candidates {
        let best = (4..attrs)
            .map(|a| (a - 4, at(a, i)))
            .max_by(|(_, x), (_, y)| x.total_cmp(y));
        let Some((class_id, score)) = best else {
            continue;
        };
        if score.is_nan() || score < confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
        detections.push(RawDetection {
            left: (cx - w / 2.0) * sx,
            top: (cy - h / 2.0) * sy,
            right: (cx + w / 2.0) * sx,
            bottom: (cy + h / 2.0) * sy,
            class_id,
            label: params.class_label(class_id),
            confidence: score,
        });
    }

    non_max_suppression(detections, params.iou_threshold, params.max_detections)
}

/// Greedy NMS within each class, highest confidence first.
pub(crate) fn non_max_suppression(
    mut detections: Vec<RawDetection>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<RawDetection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<RawDetection> = Vec::new();
    for det in detections {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == det.class_id && iou(k, &det) > iou_threshold);
        if !suppressed {
            kept.push(det);
        }
    }
    kept
}

fn iou(a: &RawDetection, b: &RawDetection) -> f32 {
    let ix = (a.right.min(b.right) - a.left.max(b.left)).max(0.0);
    let iy = (a.bottom.min(b.bottom) - a.top.max(b.top)).max(0.0);
    let inter = ix * iy;
    let area = |d: &RawDetection| (d.right - d.left).max(0.0) * (d.bottom - d.top).max(0.0);
    let union = area(a) + area(b) - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

/// Newest `*/weights/best.rten` under a training runs directory.
pub fn find_latest_weights(runs_dir: &Path) -> anyhow::Result<Option<PathBuf>> {
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    for entry in std::fs::read_dir(runs_dir)? {
        let entry = entry?;
        let candidate = entry.path().join("weights").join(BEST_WEIGHTS_FILE);
        let Ok(metadata) = std::fs::metadata(&candidate) else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
            newest = Some((modified, candidate));
        }
    }

    Ok(newest.map(|(_, path)| path))
}
