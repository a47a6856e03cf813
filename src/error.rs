use std::path::PathBuf;

use thiserror::Error;

/// Fatal to a scan attempt: none of the requested roots could be read.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("no corpus roots were given")]
    NoRoots,
    #[error("no readable corpus root among: {}", display_paths(.0))]
    NoReadableRoot(Vec<PathBuf>),
}

/// Fatal to a session: the detection capability could not be initialized.
#[derive(Debug, Error)]
#[error("could not load detection model from {}: {cause:#}", .path.display())]
pub struct ModelLoadError {
    pub path: PathBuf,
    pub cause: anyhow::Error,
}

impl ModelLoadError {
    pub fn new(path: impl Into<PathBuf>, cause: impl Into<anyhow::Error>) -> Self {
        Self {
            path: path.into(),
            cause: cause.into(),
        }
    }
}

/// Per-image, non-fatal: one image failed to decode or detect.
#[derive(Debug, Clone, Error)]
#[error("detection failed for {}: {reason}", .path.display())]
pub struct DetectionError {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("confidence threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f32),
    #[error("page size must be at least 1")]
    InvalidPageSize,
    #[error("at least one corpus root is required")]
    MissingRoots,
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type ReviewResult<T> = Result<T, ReviewError>;

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
