use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use rayon::prelude::*;

use crate::assets::decode::decode_image;
use crate::assets::{ImageCache, LayerImage};
use crate::foundation::error::{VoisyncError, VoisyncResult};

/// Source of decoded layer images, chosen by the embedding application.
pub trait ImageLoader: Sync {
    /// Load and decode the image stored under `file_path`.
    fn load(&self, file_path: &str) -> VoisyncResult<LayerImage>;
}

/// Decodes image files relative to an asset root directory.
#[derive(Clone, Debug)]
pub struct FsImageLoader {
    root: PathBuf,
}

impl FsImageLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, file_path: &str) -> VoisyncResult<PathBuf> {
        let p = Path::new(file_path);
        if p.is_absolute() {
            return Ok(p.to_path_buf());
        }
        Ok(self.root.join(normalize_rel_path(file_path)?))
    }
}

impl ImageLoader for FsImageLoader {
    fn load(&self, file_path: &str) -> VoisyncResult<LayerImage> {
        let path = self.resolve(file_path)?;
        let bytes =
            std::fs::read(&path).with_context(|| format!("read image '{}'", path.display()))?;
        decode_image(&bytes)
    }
}

/// Decodes encoded image blobs already held in memory (fetched or embedded).
#[derive(Clone, Debug, Default)]
pub struct MemoryImageLoader {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file_path: impl Into<String>, encoded: Vec<u8>) {
        self.blobs.insert(file_path.into(), encoded);
    }
}

impl ImageLoader for MemoryImageLoader {
    fn load(&self, file_path: &str) -> VoisyncResult<LayerImage> {
        let bytes = self
            .blobs
            .get(file_path)
            .ok_or_else(|| VoisyncError::validation(format!("no image blob for '{file_path}'")))?;
        decode_image(bytes)
    }
}

/// Load every path concurrently. Failures are logged and left out of the cache.
pub fn load_images(loader: &dyn ImageLoader, file_paths: &[String]) -> ImageCache {
    let loaded: Vec<(String, LayerImage)> = file_paths
        .par_iter()
        .filter_map(|path| match loader.load(path) {
            Ok(img) => Some((path.clone(), img)),
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "failed to load image");
                None
            }
        })
        .collect();
    tracing::debug!(
        requested = file_paths.len(),
        loaded = loaded.len(),
        "image cache populated"
    );
    loaded.into_iter().collect()
}

/// Normalize and validate asset-root-relative paths.
///
/// The normalized result uses `/` separators, removes `.` segments, and rejects parent
/// traversals (`..`).
pub fn normalize_rel_path(source: &str) -> VoisyncResult<String> {
    let s = source.replace('\\', "/");
    if s.is_empty() {
        return Err(VoisyncError::validation("asset path must be non-empty"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(VoisyncError::validation("asset paths must not contain '..'"));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(VoisyncError::validation(
            "asset path must contain a file name",
        ));
    }

    Ok(out.join("/"))
}
