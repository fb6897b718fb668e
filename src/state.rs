//! Persistent record of managed targets.
//!
//! Stored as JSON:
//!
//! ```json
//! {
//!   "version": 1,
//!   "files": {
//!     "/home/u/.bashrc": { "source_info": "file:/ws/home/.bashrc", "kind": "regular" }
//!   }
//! }
//! ```
use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use serde::{Deserialize, Serialize};

use crate::source::FileKind;

/// Current on-disk format version.
pub const STATE_VERSION: u32 = 1;

/// What was last written to a managed target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedEntry {
    /// Provenance string of the desired file that was written.
    pub source_info: String,
    /// Whether a regular file or a symlink was written.
    #[serde(default)]
    pub kind: FileKind,
}

/// Map of absolute target path to the entry that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// On-disk format version, [`STATE_VERSION`] when written by this build.
    pub version: u32,
    /// Managed targets by absolute path.
    #[serde(default)]
    pub files: BTreeMap<PathBuf, ManagedEntry>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            files: BTreeMap::new(),
        }
    }
}

impl State {
    /// Empty state at the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load state from `path`; a missing file is an empty state.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable, not valid JSON, or has a
    /// newer format version.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let state: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        if state.version > STATE_VERSION {
            bail!(
                "{} has format version {}, this build understands up to {STATE_VERSION}",
                path.display(),
                state.version
            );
        }
        Ok(state)
    }

    /// Write state to `path` through a sibling temp file and rename.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file
    /// cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        let json = serde_json::to_string_pretty(self).context("serializing state")?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("creating temp file in {}", dir.display()))?;
        tmp.write_all(json.as_bytes())
            .and_then(|()| tmp.write_all(b"\n"))
            .with_context(|| format!("writing {}", path.display()))?;
        tmp.persist(path)
            .with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }

    /// Entry recorded for `target`, if it is managed.
    #[must_use]
    pub fn get(&self, target: &Path) -> Option<&ManagedEntry> {
        self.files.get(target)
    }

    /// Record `entry` as the current owner of `target`.
    pub fn insert(&mut self, target: PathBuf, entry: ManagedEntry) {
        self.files.insert(target, entry);
    }

    /// Forget `target`, returning its previous entry.
    pub fn remove(&mut self, target: &Path) -> Option<ManagedEntry> {
        self.files.remove(target)
    }

    /// Number of managed targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether nothing is managed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
