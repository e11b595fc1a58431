//! On-disk copy of the last successfully downloaded key dictionary.

use crate::error::Result;
use crate::types::KeyDictionary;
use crate::utils::write_atomic;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Flat JSON file holding one [`KeyDictionary`]
#[derive(Clone, Debug)]
pub struct KeyCache {
    path: PathBuf,
}

impl KeyCache {
    /// Cache stored at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached dictionary
    ///
    /// Missing, unreadable, malformed and empty caches all yield `None`; the
    /// reason is logged.
    pub async fn load(&self) -> Option<KeyDictionary> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no key cache file");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read key cache");
                return None;
            }
        };

        match serde_json::from_slice::<KeyDictionary>(&data) {
            Ok(keys) if !keys.is_empty() => {
                info!(path = %self.path.display(), count = keys.len(), "loaded keys from cache");
                Some(keys)
            }
            Ok(_) => {
                debug!(path = %self.path.display(), "key cache is empty");
                None
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to parse key cache");
                None
            }
        }
    }

    /// Overwrite the cache with `keys`
    pub async fn store(&self, keys: &KeyDictionary) -> Result<()> {
        let data = serde_json::to_vec_pretty(keys)?;
        write_atomic(&self.path, &data).await
    }
}
