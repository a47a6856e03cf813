use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{ImageBuffer, Rgb};
use shelfcheck::{Detector, ImageRef, RawDetection};

/// Writes a small solid-colour image; the format follows the file extension.
pub fn create_test_image(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create image directory");
    }
    let img = ImageBuffer::from_fn(64, 48, |_, _| Rgb([40u8, 40u8, 40u8]));
    img.save(&path).expect("Failed to save test image");
    path
}

/// Creates a temp corpus root holding the given image files.
/// Returns the temp directory (keep alive) and the root path.
pub fn create_corpus(files: &[&str]) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let root = dir.path().join("store_a");
    std::fs::create_dir_all(&root).expect("Failed to create corpus root");
    for name in files {
        create_test_image(&root, name);
    }
    (dir, root)
}

/// Detector double with per-file confidences.
///
/// Applies the threshold itself, like a real model, and counts calls.
#[derive(Default)]
pub struct ScriptedDetector {
    confidences: HashMap<String, Vec<f32>>,
    failures: HashSet<String>,
    calls: AtomicUsize,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, file_name: &str, confidences: &[f32]) -> Self {
        self.confidences
            .insert(file_name.to_string(), confidences.to_vec());
        self
    }

    pub fn failing(mut self, file_name: &str) -> Self {
        self.failures.insert(file_name.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Detector for ScriptedDetector {
    fn detect(
        &self,
        image: &ImageRef,
        confidence_threshold: f32,
    ) -> anyhow::Result<Vec<RawDetection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let name = image.file_name();
        if self.failures.contains(&name) {
            anyhow::bail!("corrupt image data");
        }

        let confidences = self.confidences.get(&name).cloned().unwrap_or_default();
        Ok(confidences
            .into_iter()
            .enumerate()
            .filter(|(_, c)| *c >= confidence_threshold)
            .map(|(i, confidence)| {
                let offset = i as f32 * 12.0;
                RawDetection {
                    left: 2.0 + offset,
                    top: 20.0,
                    right: 10.0 + offset,
                    bottom: 30.0,
                    class_id: 0,
                    label: "clipstrip".to_string(),
                    confidence,
                }
            })
            .collect())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
