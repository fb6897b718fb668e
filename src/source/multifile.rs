//! Multi-file blocks inside rendered templates.
//!
//! A template whose rendered output contains blocks of the form
//!
//! ```text
//! <<<file:NAME:MODE>>>
//! CONTENT
//! <<<end>>>
//! ```
//!
//! expands into one file per block instead of a single output.  `NAME` is a
//! path relative to the template's directory and `MODE` is octal.  One
//! newline directly after the header is dropped so blocks can be written on
//! their own lines.  Only whitespace may appear outside blocks.
use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};

const START: &str = "<<<file:";
const HEADER_END: &str = ">>>";
const END: &str = "<<<end>>>";

/// One file declared by a multi-file block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Path relative to the template's directory.
    pub name: PathBuf,
    /// Permission bits.
    pub mode: u32,
    /// Block body.
    pub content: String,
}

/// Whether rendered output uses multi-file blocks.
#[must_use]
pub fn is_multi_file(rendered: &str) -> bool {
    rendered.contains(START)
}

/// Split rendered output into its blocks.
///
/// # Errors
///
/// Returns an error for unterminated blocks, malformed headers, invalid
/// modes, names that escape the template directory, duplicate names, and
/// non-whitespace text outside blocks.
pub fn parse(rendered: &str) -> Result<Vec<Block>> {
    let mut blocks: Vec<Block> = Vec::new();
    let mut rest = rendered;

    while let Some((before, after_start)) = rest.split_once(START) {
        if !before.trim().is_empty() {
            bail!("unexpected text outside file blocks: {:?}", before.trim());
        }
        let Some((header, body)) = after_start.split_once(HEADER_END) else {
            bail!("unterminated file block header");
        };
        let (name, mode) = parse_header(header)?;

        let body = body.strip_prefix('\n').unwrap_or(body);
        let Some((content, after)) = body.split_once(END) else {
            bail!("file block '{}' has no {END} marker", name.display());
        };
        if blocks.iter().any(|b| b.name == name) {
            bail!("file block '{}' declared twice", name.display());
        }
        blocks.push(Block {
            name,
            mode,
            content: content.to_string(),
        });
        rest = after;
    }

    if !rest.trim().is_empty() {
        bail!("unexpected text outside file blocks: {:?}", rest.trim());
    }
    Ok(blocks)
}

fn parse_header(header: &str) -> Result<(PathBuf, u32)> {
    let Some((name, mode)) = header.rsplit_once(':') else {
        bail!("file block header '{header}' must be NAME:MODE");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("file block header '{header}' has an empty name");
    }
    let mode = u32::from_str_radix(mode.trim(), 8)
        .map_err(|_| anyhow::anyhow!("file block '{name}' has invalid mode '{mode}'"))?;
    if mode > 0o7777 {
        bail!("file block '{name}' has out of range mode {mode:o}");
    }
    let path = Path::new(name);
    if !path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    {
        bail!("file block name '{name}' must stay inside the template directory");
    }
    Ok((path.to_path_buf(), mode))
}
