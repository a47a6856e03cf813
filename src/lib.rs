pub mod aggregate;
pub mod config;
pub mod detection;
pub mod error;
pub mod models;
pub mod navigation;
pub mod normalize;
pub mod render;
pub mod scanner;
pub mod session;

pub use aggregate::{aggregate, aggregate_with};
pub use config::{FailurePolicy, ReviewConfig, ReviewMode, ScanOrder};
pub use detection::{Detector, LabelFileDetector, RawDetection, YoloDetector, YoloParams};
pub use error::{ConfigError, DetectionError, ModelLoadError, ReviewError, ReviewResult, ScanError};
pub use models::{
    CorpusStatistics, DetectionBox, DetectionRecord, DetectionStatus, GroupStatistics, ImageRef,
};
pub use navigation::{Navigator, Position};
pub use scanner::{Corpus, ScanOptions, scan};
pub use session::{ReviewSnapshot, Session};
