//! Dot-D fragments: `foo.dotd/*` concatenates into `foo`.
use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;

use super::{DesiredFile, FileKind, PipelineContext, Plugin};

/// Suffix marking a directory of fragments.
pub const DOTD_SUFFIX: &str = ".dotd";

/// Merges regular files directly inside a `*.dotd` directory into one
/// output named after the directory without the suffix.
///
/// Fragments are concatenated in file-name order.  The output takes the
/// mode of the first fragment.  Files that are not fragments keep their
/// relative order; merged outputs follow them.
#[derive(Debug, Default, Clone, Copy)]
pub struct DotDProcessor;

fn output_path(file: &DesiredFile) -> Option<PathBuf> {
    if file.kind() != FileKind::Regular {
        return None;
    }
    let parent = file.rel_path().parent()?;
    let dir_name = parent.file_name()?.to_str()?;
    let stem = dir_name.strip_suffix(DOTD_SUFFIX)?;
    if stem.is_empty() {
        return None;
    }
    Some(parent.with_file_name(stem))
}

impl Plugin for DotDProcessor {
    fn name(&self) -> &str {
        "dotd"
    }

    fn process(&self, _ctx: &PipelineContext, files: Vec<DesiredFile>) -> Result<Vec<DesiredFile>> {
        let mut passthrough = Vec::with_capacity(files.len());
        let mut groups: BTreeMap<(PathBuf, PathBuf), Vec<DesiredFile>> = BTreeMap::new();

        for file in files {
            match output_path(&file) {
                Some(out) => groups
                    .entry((file.target_base().to_path_buf(), out))
                    .or_default()
                    .push(file),
                None => passthrough.push(file),
            }
        }

        for ((base, rel), mut fragments) in groups {
            fragments.sort_by(|a, b| a.rel_path().cmp(b.rel_path()));
            let mode = fragments.first().map_or(0o644, DesiredFile::mode);
            let provenance = format!(
                "dotd:{}",
                fragments
                    .iter()
                    .map(DesiredFile::source_info)
                    .collect::<Vec<_>>()
                    .join(",")
            );
            tracing::debug!(
                output = %rel.display(),
                fragments = fragments.len(),
                "merged dot-d fragments"
            );
            passthrough.push(DesiredFile::concat(rel, base, mode, provenance, &fragments));
        }
        Ok(passthrough)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::path::Path;

    fn frag(rel: &str, body: &str, mode: u32) -> DesiredFile {
        DesiredFile::from_bytes(rel, "/home/u", mode, format!("file:{rel}"), body.as_bytes().to_vec())
    }

    fn run(files: Vec<DesiredFile>) -> Vec<DesiredFile> {
        DotDProcessor.process(&PipelineContext::default(), files).unwrap()
    }

    #[test]
    fn concatenates_fragments_sorted() {
        let out = run(vec![
            frag(".bashrc.dotd/20-aliases", "alias l=ls\n", 0o600),
            frag(".bashrc.dotd/10-env", "export A=1\n", 0o644),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rel_path(), Path::new(".bashrc"));
        assert_eq!(out[0].read_to_vec().unwrap(), b"export A=1\nalias l=ls\n");
        assert_eq!(out[0].mode(), 0o644);
        assert_eq!(
            out[0].source_info(),
            "dotd:file:.bashrc.dotd/10-env,file:.bashrc.dotd/20-aliases"
        );
    }

    #[test]
    fn nested_dotd_dir() {
        let out = run(vec![frag(".config/fish/config.fish.dotd/a", "a", 0o644)]);
        assert_eq!(out[0].rel_path(), Path::new(".config/fish/config.fish"));
    }

    #[test]
    fn other_files_pass_through_first() {
        let out = run(vec![
            frag("x.dotd/1", "1", 0o644),
            frag(".profile", "p", 0o644),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].rel_path(), Path::new(".profile"));
        assert_eq!(out[1].rel_path(), Path::new("x"));
    }

    #[test]
    fn plain_d_directories_are_untouched() {
        let out = run(vec![frag(".ssh/config.d/work", "Host w", 0o600)]);
        assert_eq!(out[0].rel_path(), Path::new(".ssh/config.d/work"));
    }

    #[test]
    fn deeper_files_are_not_fragments() {
        let out = run(vec![frag("x.dotd/sub/1", "1", 0o644)]);
        assert_eq!(out[0].rel_path(), Path::new("x.dotd/sub/1"));
    }

    #[test]
    fn groups_by_target_base() {
        let a = DesiredFile::from_bytes("c.dotd/1", "/one", 0o644, "a", b"a".to_vec());
        let b = DesiredFile::from_bytes("c.dotd/1", "/two", 0o644, "b", b"b".to_vec());
        let out = run(vec![a, b]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].target_path(), Path::new("/one/c"));
        assert_eq!(out[1].target_path(), Path::new("/two/c"));
    }
}
