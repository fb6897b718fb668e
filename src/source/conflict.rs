//! Strict conflict detection over final target paths.
use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;

use super::{DesiredFile, PipelineContext, Plugin};
use crate::error::PipelineError;

/// Fails the pipeline when two desired files claim the same target.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConflictResolver;

impl Plugin for ConflictResolver {
    fn name(&self) -> &str {
        "conflict"
    }

    fn process(&self, _ctx: &PipelineContext, files: Vec<DesiredFile>) -> Result<Vec<DesiredFile>> {
        let mut seen: HashMap<PathBuf, &str> = HashMap::with_capacity(files.len());
        for file in &files {
            let target = file.target_path();
            if let Some(first) = seen.get(&target) {
                return Err(PipelineError::Conflict {
                    target,
                    first: (*first).to_string(),
                    second: file.source_info().to_string(),
                }
                .into());
            }
            seen.insert(target, file.source_info());
        }
        Ok(files)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn file(rel: &str, base: &str, info: &str) -> DesiredFile {
        DesiredFile::from_bytes(rel, base, 0o644, info, Vec::new())
    }

    #[test]
    fn distinct_targets_pass() {
        let files = vec![file("a", "/h", "x"), file("b", "/h", "y"), file("a", "/o", "z")];
        let out = ConflictResolver.process(&PipelineContext::default(), files).unwrap();
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn duplicate_target_names_both_sources() {
        let files = vec![file("a", "/h", "scan:a"), file("a", "/h", "module:m:a")];
        let err = ConflictResolver
            .process(&PipelineContext::default(), files)
            .unwrap_err();
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::Conflict { target, first, second }) => {
                assert_eq!(target, &PathBuf::from("/h/a"));
                assert_eq!(first, "scan:a");
                assert_eq!(second, "module:m:a");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
