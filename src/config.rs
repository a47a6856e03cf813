//! Review session configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_PAGE_SIZE: usize = 4;

/// How the navigation cursor is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewMode {
    /// Cursor is an image index
    Single,
    /// Cursor is a page index over pages of `page_size` images
    Paged,
}

/// Canonical ordering of scanned images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOrder {
    /// Ascending lexicographic path
    Path,
    /// Most recently modified first
    Recent,
}

/// What failed detections contribute to corpus statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Failed images stay in the denominator as non-compliant
    CountAsNonCompliant,
    /// Failed images are left out of every total except `failed_images`
    Exclude,
}

/// Review configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Directories to scan for images
    pub roots: Vec<PathBuf>,

    /// Minimum detector confidence for a box to count (default: 0.25)
    pub confidence_threshold: f32,

    /// Images per page in paged mode (default: 4)
    pub page_size: usize,

    /// Single-image or paged navigation (default: Single)
    pub mode: ReviewMode,

    /// Path order or most-recent-first (default: Path)
    pub order: ScanOrder,

    /// Walk subdirectories of each root (default: false)
    pub recursive: bool,

    /// Run per-image detection on the rayon pool (default: false)
    /// Results are still assembled in canonical scan order.
    pub parallel: bool,

    /// Name of the object being audited, used in report text (default: "clipstrip")
    pub target_label: String,

    /// Treatment of images whose detection failed (default: CountAsNonCompliant)
    pub failure_policy: FailurePolicy,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            page_size: DEFAULT_PAGE_SIZE,
            mode: ReviewMode::Single,
            order: ScanOrder::Path,
            recursive: false,
            parallel: false,
            target_label: "clipstrip".to_string(),
            failure_policy: FailurePolicy::CountAsNonCompliant,
        }
    }
}

impl ReviewConfig {
    pub fn with_roots<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Load from a JSON file; missing keys take their default values.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_threshold(self.confidence_threshold)?;
        if self.page_size == 0 {
            return Err(ConfigError::InvalidPageSize);
        }
        if self.roots.is_empty() {
            return Err(ConfigError::MissingRoots);
        }
        Ok(())
    }
}

pub fn validate_threshold(threshold: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold(threshold))
    }
}
