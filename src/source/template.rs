//! Template expansion with handlebars.
//!
//! Files ending in [`TEMPLATE_SUFFIX`] are rendered against the workspace
//! variables.  The suffix is stripped from the output name.  Rendered output
//! that contains multi-file blocks (see [`super::multifile`]) expands into
//! one file per block, placed next to the template.
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use handlebars::Handlebars;

use super::{DesiredFile, FileKind, PipelineContext, Plugin, multifile};

/// Suffix marking a file as a template.
pub const TEMPLATE_SUFFIX: &str = ".tmpl";

/// Renders `*.tmpl` files; everything else passes through.
pub struct TemplateExpander {
    engine: Handlebars<'static>,
    data: serde_json::Value,
}

impl std::fmt::Debug for TemplateExpander {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateExpander")
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

impl TemplateExpander {
    /// Create an expander rendering against `data`.
    ///
    /// Rendering is strict: referencing an undefined variable is an error.
    /// Output is not HTML-escaped.
    #[must_use]
    pub fn new(data: serde_json::Value) -> Self {
        let mut engine = Handlebars::new();
        engine.set_strict_mode(true);
        engine.register_escape_fn(handlebars::no_escape);
        Self { engine, data }
    }

    fn expand(&self, file: &DesiredFile) -> Result<Vec<DesiredFile>> {
        let raw = file
            .read_to_vec()
            .with_context(|| format!("reading template {}", file.source_info()))?;
        let source = String::from_utf8(raw)
            .with_context(|| format!("template {} is not UTF-8", file.source_info()))?;
        let rendered = self
            .engine
            .render_template(&source, &self.data)
            .with_context(|| format!("rendering template {}", file.source_info()))?;

        let base = file.target_base();
        let provenance = format!("template:{}", file.source_info());

        if !multifile::is_multi_file(&rendered) {
            let out = DesiredFile::from_bytes(
                strip_suffix(file.rel_path()),
                base,
                file.mode(),
                provenance,
                rendered,
            );
            return Ok(vec![out]);
        }

        let dir = file.rel_path().parent().unwrap_or_else(|| Path::new(""));
        let blocks = multifile::parse(&rendered)
            .with_context(|| format!("splitting template {}", file.source_info()))?;
        Ok(blocks
            .into_iter()
            .map(|block| {
                DesiredFile::from_bytes(
                    dir.join(&block.name),
                    base,
                    block.mode,
                    format!("{provenance}#{}", block.name.display()),
                    block.content,
                )
            })
            .collect())
    }
}

fn is_template(file: &DesiredFile) -> bool {
    file.kind() == FileKind::Regular
        && file
            .rel_path()
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.len() > TEMPLATE_SUFFIX.len() && n.ends_with(TEMPLATE_SUFFIX))
}

fn strip_suffix(rel: &Path) -> PathBuf {
    let name = rel
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_suffix(TEMPLATE_SUFFIX))
        .unwrap_or_default();
    rel.with_file_name(name)
}

impl Plugin for TemplateExpander {
    fn name(&self) -> &str {
        "template"
    }

    fn process(&self, ctx: &PipelineContext, files: Vec<DesiredFile>) -> Result<Vec<DesiredFile>> {
        let mut out = Vec::with_capacity(files.len());
        for file in files {
            if ctx.cancel.is_cancelled() {
                anyhow::bail!("cancelled");
            }
            if is_template(&file) {
                let expanded = self.expand(&file)?;
                tracing::debug!(
                    template = %file.rel_path().display(),
                    outputs = expanded.len(),
                    "rendered template"
                );
                out.extend(expanded);
            } else {
                out.push(file);
            }
        }
        Ok(out)
    }
}
