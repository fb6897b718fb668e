//! Directory scanner: one desired file per file under a source directory.
use std::path::PathBuf;

use anyhow::Result;

use super::{DesiredFile, PipelineContext, Plugin};
use crate::modules::tree::list_files;

/// Emits every file under `source_dir`, targeted at `target_base`.
#[derive(Debug, Clone)]
pub struct Scanner {
    source_dir: PathBuf,
    target_base: PathBuf,
}

impl Scanner {
    /// Scan `source_dir`, targeting files at `target_base`.
    #[must_use]
    pub fn new(source_dir: impl Into<PathBuf>, target_base: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            target_base: target_base.into(),
        }
    }
}

impl Plugin for Scanner {
    fn name(&self) -> &str {
        "scanner"
    }

    fn process(&self, _ctx: &PipelineContext, mut files: Vec<DesiredFile>) -> Result<Vec<DesiredFile>> {
        if !self.source_dir.is_dir() {
            tracing::debug!(dir = %self.source_dir.display(), "source directory absent, nothing to scan");
            return Ok(files);
        }
        for found in list_files(&self.source_dir, &[".git"], &[])? {
            let source_info = format!("file:{}", found.source_path.display());
            let desired = match found.link_target {
                Some(link) => {
                    DesiredFile::symlink(found.rel_path, &self.target_base, source_info, link)
                }
                None => DesiredFile::from_path(
                    found.rel_path,
                    &self.target_base,
                    found.mode,
                    source_info,
                    found.source_path,
                ),
            };
            files.push(desired);
        }
        Ok(files)
    }
}
