//! Source pipeline: desired files and the plugins that produce them.
//!
//! A [`Pipeline`] is an ordered list of [`Plugin`]s.  Each plugin receives
//! the full list of [`DesiredFile`]s produced so far and returns a new list.
//! The first plugins contribute files (the directory [`scanner::Scanner`] and
//! the [`module_scanner::ModuleScanner`]); later ones rewrite them
//! ([`template::TemplateExpander`], [`dotd::DotDProcessor`]) and the last one
//! validates the result ([`conflict::ConflictResolver`]).
//!
//! [`DesiredFile`] can only be constructed inside this crate, so everything
//! that reaches the planner went through the pipeline.
pub mod conflict;
pub mod dotd;
pub mod module_scanner;
pub mod multifile;
pub mod scanner;
pub mod shim;
pub mod template;

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;

/// Provenance prefix for files sourced from an immutable, content-hashed
/// bundle.  The planner trusts such files without reading their content.
pub const BUNDLE_PREFIX: &str = "bundle:";

/// Whether a provenance string identifies an immutable bundle.
#[must_use]
pub fn is_bundle(source_info: &str) -> bool {
    source_info.starts_with(BUNDLE_PREFIX)
}

/// Filesystem type of a managed target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Regular file with content and mode.
    #[default]
    Regular,
    /// Symbolic link.
    Symlink,
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Regular => f.write_str("file"),
            Self::Symlink => f.write_str("symlink"),
        }
    }
}

/// Where the bytes of a desired file come from.
#[derive(Debug, Clone)]
enum Content {
    /// Read lazily from a file on disk.
    File(PathBuf),
    /// Held in memory (rendered templates, generated shims).
    Bytes(Arc<[u8]>),
    /// Concatenation of other contents, in order.
    Concat(Vec<Content>),
    /// A symlink pointing at the given path.
    Link(PathBuf),
}

impl Content {
    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        match self {
            Self::File(path) => Ok(Box::new(File::open(path)?)),
            Self::Bytes(bytes) => Ok(Box::new(io::Cursor::new(Arc::clone(bytes)))),
            Self::Concat(parts) => {
                let mut reader: Box<dyn Read + Send> = Box::new(io::empty());
                for part in parts {
                    reader = Box::new(reader.chain(part.open()?));
                }
                Ok(reader)
            }
            Self::Link(target) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("symlink to {} has no content", target.display()),
            )),
        }
    }
}

/// A file the pipeline wants to exist at a target path.
#[derive(Debug, Clone)]
pub struct DesiredFile {
    rel_path: PathBuf,
    target_base: PathBuf,
    mode: u32,
    source_info: String,
    content: Content,
}

impl DesiredFile {
    /// Regular file whose content is read from `path` when needed.
    #[must_use]
    pub fn from_path(
        rel_path: impl Into<PathBuf>,
        target_base: impl Into<PathBuf>,
        mode: u32,
        source_info: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            rel_path: rel_path.into(),
            target_base: target_base.into(),
            mode,
            source_info: source_info.into(),
            content: Content::File(path.into()),
        }
    }

    /// Regular file with in-memory content.
    #[must_use]
    pub fn from_bytes(
        rel_path: impl Into<PathBuf>,
        target_base: impl Into<PathBuf>,
        mode: u32,
        source_info: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            rel_path: rel_path.into(),
            target_base: target_base.into(),
            mode,
            source_info: source_info.into(),
            content: Content::Bytes(Arc::from(bytes.into())),
        }
    }

    /// Symlink pointing at `link_target`.
    #[must_use]
    pub fn symlink(
        rel_path: impl Into<PathBuf>,
        target_base: impl Into<PathBuf>,
        source_info: impl Into<String>,
        link_target: impl Into<PathBuf>,
    ) -> Self {
        Self {
            rel_path: rel_path.into(),
            target_base: target_base.into(),
            mode: 0o777,
            source_info: source_info.into(),
            content: Content::Link(link_target.into()),
        }
    }

    /// Concatenate regular files in order into one output.
    #[must_use]
    pub fn concat(
        rel_path: impl Into<PathBuf>,
        target_base: impl Into<PathBuf>,
        mode: u32,
        source_info: impl Into<String>,
        parts: &[Self],
    ) -> Self {
        Self {
            rel_path: rel_path.into(),
            target_base: target_base.into(),
            mode,
            source_info: source_info.into(),
            content: Content::Concat(parts.iter().map(|p| p.content.clone()).collect()),
        }
    }

    /// Path relative to [`Self::target_base`].
    #[must_use]
    pub fn rel_path(&self) -> &Path {
        &self.rel_path
    }

    /// Absolute directory the relative path is joined onto.
    #[must_use]
    pub fn target_base(&self) -> &Path {
        &self.target_base
    }

    /// Absolute path of the managed target.
    #[must_use]
    pub fn target_path(&self) -> PathBuf {
        self.target_base.join(&self.rel_path)
    }

    /// Permission bits to apply to regular files.
    #[must_use]
    pub const fn mode(&self) -> u32 {
        self.mode
    }

    /// Human-readable provenance.
    #[must_use]
    pub fn source_info(&self) -> &str {
        &self.source_info
    }

    /// Regular file or symlink.
    #[must_use]
    pub fn kind(&self) -> FileKind {
        match self.content {
            Content::Link(_) => FileKind::Symlink,
            _ => FileKind::Regular,
        }
    }

    /// Link destination for symlinks, `None` for regular files.
    #[must_use]
    pub fn link_target(&self) -> Option<&Path> {
        match &self.content {
            Content::Link(target) => Some(target),
            _ => None,
        }
    }

    /// Open the content for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if a backing file cannot be opened, or if this is a
    /// symlink.
    pub fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        self.content.open()
    }

    /// Read the whole content into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be read.
    pub fn read_to_vec(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.open()?.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

/// Per-run inputs shared by every plugin.
#[derive(Debug, Clone, Default)]
pub struct PipelineContext {
    /// Cancellation for the whole pass.
    pub cancel: CancelToken,
}

/// One stage of the source pipeline.
pub trait Plugin: Send + Sync {
    /// Short name used in logs and error context.
    fn name(&self) -> &str;

    /// Transform the accumulated list of desired files.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage cannot produce its output.
    fn process(&self, ctx: &PipelineContext, files: Vec<DesiredFile>) -> Result<Vec<DesiredFile>>;
}

/// Ordered list of plugins.
#[derive(Default)]
pub struct Pipeline {
    plugins: Vec<Box<dyn Plugin>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("plugins", &self.plugin_names())
            .finish()
    }
}

impl Pipeline {
    /// Pipeline without plugins.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plugin; plugins run in insertion order.
    #[must_use]
    pub fn with(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    /// Names of the registered plugins, in order.
    #[must_use]
    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Run every plugin in order, threading the file list through.
    ///
    /// # Errors
    ///
    /// Returns the first plugin failure, with the plugin name as context.
    /// Typed errors (for example [`crate::error::PipelineError`]) remain
    /// reachable through `downcast_ref`.
    pub fn run(&self, ctx: &PipelineContext) -> Result<Vec<DesiredFile>> {
        let mut files = Vec::new();
        for plugin in &self.plugins {
            if ctx.cancel.is_cancelled() {
                bail!("pipeline cancelled before {}", plugin.name());
            }
            let before = files.len();
            files = plugin
                .process(ctx, files)
                .with_context(|| format!("plugin {}", plugin.name()))?;
            tracing::debug!(
                plugin = plugin.name(),
                before,
                after = files.len(),
                "pipeline stage finished"
            );
        }
        Ok(files)
    }
}

/// Permission bits of a source file, or a default on platforms without them.
#[cfg(unix)]
pub(crate) fn file_mode(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

/// Permission bits of a source file, or a default on platforms without them.
#[cfg(not(unix))]
pub(crate) fn file_mode(meta: &std::fs::Metadata) -> u32 {
    if meta.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    struct Emit(&'static str);

    impl Plugin for Emit {
        fn name(&self) -> &str {
            "emit"
        }

        fn process(
            &self,
            _ctx: &PipelineContext,
            mut files: Vec<DesiredFile>,
        ) -> Result<Vec<DesiredFile>> {
            files.push(DesiredFile::from_bytes(
                self.0,
                "/base",
                0o644,
                format!("test:{}", self.0),
                self.0.as_bytes().to_vec(),
            ));
            Ok(files)
        }
    }

    struct Fail;

    impl Plugin for Fail {
        fn name(&self) -> &str {
            "fail"
        }

        fn process(&self, _ctx: &PipelineContext, _files: Vec<DesiredFile>) -> Result<Vec<DesiredFile>> {
            bail!("boom")
        }
    }

    #[test]
    fn plugins_run_in_order() {
        let pipeline = Pipeline::new().with(Emit("a")).with(Emit("b"));
        assert_eq!(pipeline.plugin_names(), vec!["emit", "emit"]);
        let files = pipeline.run(&PipelineContext::default()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.rel_path().to_path_buf()).collect();
        assert_eq!(names, vec![PathBuf::from("a"), PathBuf::from("b")]);
    }

    #[test]
    fn failure_names_plugin() {
        let pipeline = Pipeline::new().with(Emit("a")).with(Fail);
        let err = pipeline.run(&PipelineContext::default()).unwrap_err();
        assert_eq!(err.to_string(), "plugin fail");
        assert!(format!("{err:#}").contains("boom"));
    }

    #[test]
    fn cancelled_pipeline_stops() {
        let ctx = PipelineContext::default();
        ctx.cancel.cancel();
        let pipeline = Pipeline::new().with(Emit("a"));
        assert!(pipeline.run(&ctx).is_err());
    }

    #[test]
    fn concat_reads_parts_in_order() {
        let a = DesiredFile::from_bytes("a", "/b", 0o644, "x", b"one\n".to_vec());
        let b = DesiredFile::from_bytes("b", "/b", 0o644, "y", b"two\n".to_vec());
        let joined = DesiredFile::concat("c", "/b", 0o644, "z", &[a, b]);
        assert_eq!(joined.read_to_vec().unwrap(), b"one\ntwo\n");
        assert_eq!(joined.target_path(), PathBuf::from("/b/c"));
    }

    #[test]
    fn symlink_has_no_content() {
        let link = DesiredFile::symlink("l", "/b", "x", "/etc/hosts");
        assert_eq!(link.kind(), FileKind::Symlink);
        assert_eq!(link.link_target(), Some(Path::new("/etc/hosts")));
        assert!(link.open().is_err());
    }

    #[test]
    fn bundle_prefix_detection() {
        assert!(is_bundle("bundle:nvim@sha256:ab:init.lua"));
        assert!(!is_bundle("file:/src/init.lua"));
    }
}
