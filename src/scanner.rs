use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{ReviewConfig, ScanOrder};
use crate::error::ScanError;
use crate::models::ImageRef;

/// Extensions accepted by the scanner, compared case-insensitively
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    pub order: ScanOrder,
    pub recursive: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            order: ScanOrder::Path,
            recursive: false,
        }
    }
}

impl From<&ReviewConfig> for ScanOptions {
    fn from(config: &ReviewConfig) -> Self {
        Self {
            order: config.order,
            recursive: config.recursive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    EmptyFile,
    Unreadable,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Result of a scan: the ordered images plus anything left out along the way.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub images: Vec<ImageRef>,
    pub skipped: Vec<SkippedFile>,
    /// Roots that were requested but could not be read
    pub missing_roots: Vec<PathBuf>,
}

impl Corpus {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// A valid scan that found no eligible images
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Enumerate eligible images under `roots` in canonical order.
///
/// Fails only when none of the roots can be read. Zero-byte and unreadable
/// files are logged and reported in [`Corpus::skipped`].
pub fn scan(roots: &[PathBuf], options: &ScanOptions) -> Result<Corpus, ScanError> {
    if roots.is_empty() {
        return Err(ScanError::NoRoots);
    }

    let mut corpus = Corpus::default();
    let mut seen = HashSet::new();
    let mut readable_roots = 0;

    for (root_index, root) in roots.iter().enumerate() {
        if !root_is_readable(root) {
            warn!(root = %root.display(), "corpus root is missing or unreadable");
            corpus.missing_roots.push(root.clone());
            continue;
        }
        readable_roots += 1;

        let max_depth = if options.recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(true);

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "skipping unreadable directory entry");
                    if let Some(path) = e.path() {
                        corpus.skipped.push(SkippedFile {
                            path: path.to_path_buf(),
                            reason: SkipReason::Unreadable,
                        });
                    }
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().is_file() || !has_image_extension(path) {
                continue;
            }
            if !seen.insert(path.to_path_buf()) {
                continue;
            }

            match inspect_file(path, root, root_index) {
                Ok(image) => corpus.images.push(image),
                Err(reason) => {
                    warn!(path = %path.display(), ?reason, "skipping image");
                    corpus.skipped.push(SkippedFile {
                        path: path.to_path_buf(),
                        reason,
                    });
                }
            }
        }
    }

    if readable_roots == 0 {
        return Err(ScanError::NoReadableRoot(roots.to_vec()));
    }

    sort_images(&mut corpus.images, options.order);

    if corpus.is_empty() {
        warn!(roots = roots.len(), "empty corpus: no eligible images found");
    } else {
        info!(
            images = corpus.images.len(),
            skipped = corpus.skipped.len(),
            "scanned image corpus"
        );
    }

    Ok(corpus)
}

pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// Sort in place according to the ordering contract
pub fn sort_images(images: &mut [ImageRef], order: ScanOrder) {
    match order {
        ScanOrder::Path => images.sort_by(|a, b| a.path.cmp(&b.path)),
        ScanOrder::Recent => images.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| a.path.cmp(&b.path))
        }),
    }
}

fn root_is_readable(root: &Path) -> bool {
    root.is_dir() && std::fs::read_dir(root).is_ok()
}

fn inspect_file(path: &Path, root: &Path, root_index: usize) -> Result<ImageRef, SkipReason> {
    let metadata = std::fs::metadata(path).map_err(|_| SkipReason::Unreadable)?;
    if metadata.len() == 0 {
        return Err(SkipReason::EmptyFile);
    }
    // Placeholder files from cloud-synced folders report a size but refuse to open.
    File::open(path).map_err(|_| SkipReason::Unreadable)?;

    let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    debug!(path = %path.display(), bytes = metadata.len(), "found image");

    Ok(ImageRef {
        path: path.to_path_buf(),
        group: group_key(path, root),
        modified: OffsetDateTime::from(modified),
        size_bytes: metadata.len(),
        root_index,
    })
}

/// Parent folder name of the image, falling back to the root's own name.
fn group_key(path: &Path, root: &Path) -> String {
    path.parent()
        .and_then(|parent| parent.file_name())
        .or_else(|| root.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string())
}
