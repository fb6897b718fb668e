//! Content-addressed cache of fetched source trees.
//!
//! Layout under the cache root:
//!
//! ```text
//! <root>/<key>/tree/        extracted source tree
//! <root>/<key>/meta.json    provider, fetch key, url, content hash
//! ```
//!
//! An entry directory only ever appears through an atomic rename of a fully
//! populated staging directory, so a present `meta.json` means the tree is
//! complete.  Fills are serialized per key inside the process; a second
//! lookup under the key lock keeps concurrent requests for the same key to a
//! single fetch.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::FetchError;

const TREE_DIR: &str = "tree";
const META_FILE: &str = "meta.json";

/// Sidecar metadata stored next to each extracted tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMeta {
    /// Provider that filled the entry.
    pub provider: String,
    /// Provider-specific key the entry was filled for (`owner/repo@sha`, url).
    pub key: String,
    /// URL the archive was downloaded from.
    pub url: String,
    /// Content hash of the fetched archive.
    pub hash: String,
}

/// A complete cache entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Extracted source tree.
    pub tree: PathBuf,
    /// Sidecar written when the entry was filled.
    pub meta: CacheMeta,
}

/// Content-addressed store of extracted archives.
///
/// Entries are filled at most once per key, even under concurrent
/// resolution: callers serialize on a per-key lock and re-check before
/// fetching.
#[derive(Debug)]
pub struct SourceCache {
    root: PathBuf,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

fn io_err(context: String) -> impl FnOnce(std::io::Error) -> FetchError {
    move |source| FetchError::Io { context, source }
}

impl SourceCache {
    /// Cache rooted at `root`; the directory is created on first fill.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Directory holding every entry.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stable directory name for `provider` + `fetch_key`.
    #[must_use]
    pub fn key(provider: &str, fetch_key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(provider.as_bytes());
        hasher.update([0]);
        hasher.update(fetch_key.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Return the entry for `key` if it is complete.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Io`] if the sidecar exists but is unreadable.
    pub fn lookup(&self, key: &str) -> Result<Option<CacheEntry>, FetchError> {
        let dir = self.root.join(key);
        let meta_path = dir.join(META_FILE);
        let text = match std::fs::read_to_string(&meta_path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(format!("reading {}", meta_path.display()))(e)),
        };
        let meta: CacheMeta = serde_json::from_str(&text).map_err(|e| FetchError::Io {
            context: format!("parsing {}", meta_path.display()),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;
        Ok(Some(CacheEntry {
            tree: dir.join(TREE_DIR),
            meta,
        }))
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    /// Return the entry for `key`, running `fill` to create it if missing.
    ///
    /// `fill` receives the tree directory to populate and returns the
    /// metadata to record.  It runs at most once per key at a time; callers
    /// blocked on the same key observe the finished entry.
    ///
    /// # Errors
    ///
    /// Returns the error from `fill`, or [`FetchError::Io`] if the staging
    /// directory cannot be prepared or renamed into place.
    pub fn get_or_fill<F>(&self, key: &str, fill: F) -> Result<CacheEntry, FetchError>
    where
        F: FnOnce(&Path) -> Result<CacheMeta, FetchError>,
    {
        if let Some(entry) = self.lookup(key)? {
            tracing::debug!(key, "cache hit");
            return Ok(entry);
        }

        let lock = self.key_lock(key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = self.lookup(key)? {
            tracing::debug!(key, "cache filled by concurrent request");
            return Ok(entry);
        }

        std::fs::create_dir_all(&self.root)
            .map_err(io_err(format!("creating {}", self.root.display())))?;
        let staging = tempfile::Builder::new()
            .prefix(&format!(".{key}.tmp-"))
            .tempdir_in(&self.root)
            .map_err(io_err(format!("creating staging dir in {}", self.root.display())))?;

        let tree = staging.path().join(TREE_DIR);
        std::fs::create_dir_all(&tree).map_err(io_err(format!("creating {}", tree.display())))?;
        let meta = fill(&tree)?;
        let meta_json = serde_json::to_string_pretty(&meta).map_err(|e| FetchError::Io {
            context: "serializing cache metadata".to_string(),
            source: std::io::Error::other(e),
        })?;
        let meta_path = staging.path().join(META_FILE);
        std::fs::write(&meta_path, meta_json)
            .map_err(io_err(format!("writing {}", meta_path.display())))?;

        let final_dir = self.root.join(key);
        if let Err(e) = std::fs::rename(staging.path(), &final_dir) {
            // Another process may have completed the same entry first.
            if let Some(entry) = self.lookup(key)? {
                return Ok(entry);
            }
            return Err(io_err(format!("moving cache entry to {}", final_dir.display()))(e));
        }
        tracing::info!(key, url = %meta.url, "cached source");
        Ok(CacheEntry {
            tree: final_dir.join(TREE_DIR),
            meta,
        })
    }
}
