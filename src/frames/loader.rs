use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::foundation::error::{StoreshotError, StoreshotResult};
use crate::frames::catalog::FrameAssetRef;

/// Where bezel image bytes come from.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn load(&self, asset: &FrameAssetRef) -> StoreshotResult<Vec<u8>>;
}

#[async_trait]
impl<T: FrameSource + ?Sized> FrameSource for Arc<T> {
    async fn load(&self, asset: &FrameAssetRef) -> StoreshotResult<Vec<u8>> {
        (**self).load(asset).await
    }
}

/// Reads assets from a directory; asset paths are resolved relative to `root`.
#[derive(Clone, Debug)]
pub struct DirFrameSource {
    root: PathBuf,
}

impl DirFrameSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl FrameSource for DirFrameSource {
    async fn load(&self, asset: &FrameAssetRef) -> StoreshotResult<Vec<u8>> {
        let norm = normalize_rel_path(&asset.path)?;
        let p = self.root.join(Path::new(&norm));
        tokio::fs::read(&p).await.map_err(|e| {
            StoreshotError::decode(format!("failed to read frame '{}': {e}", p.display()))
        })
    }
}

/// In-memory assets keyed by path, with an optional catch-all image.
#[derive(Clone, Debug, Default)]
pub struct MemoryFrameSource {
    assets: HashMap<String, Vec<u8>>,
    fallback: Option<Vec<u8>>,
}

impl MemoryFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` for every asset without an explicit entry.
    pub fn with_fallback(bytes: Vec<u8>) -> Self {
        Self {
            assets: HashMap::new(),
            fallback: Some(bytes),
        }
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: Vec<u8>) {
        self.assets.insert(path.into(), bytes);
    }
}

#[async_trait]
impl FrameSource for MemoryFrameSource {
    async fn load(&self, asset: &FrameAssetRef) -> StoreshotResult<Vec<u8>> {
        self.assets
            .get(&asset.path)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| StoreshotError::decode(format!("frame asset '{}' not found", asset.path)))
    }
}

/// Normalize and validate asset-relative paths.
///
/// The normalized result uses `/` separators, removes `.` segments, and rejects absolute paths or
/// parent traversals (`..`).
pub fn normalize_rel_path(source: &str) -> StoreshotResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') {
        return Err(StoreshotError::validation("asset paths must be relative"));
    }
    if s.is_empty() {
        return Err(StoreshotError::validation("asset path must be non-empty"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(StoreshotError::validation(
                "asset paths must not contain '..'",
            ));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(StoreshotError::validation(
            "asset path must contain a file name",
        ));
    }

    Ok(out.join("/"))
}
