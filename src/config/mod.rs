//! Workspace configuration (`workspaced.toml`).
//!
//! ```toml
//! [workspaced]
//! sources = "home"          # scanned into the home directory
//! core_modules = "modules"  # root of `core:` modules
//! jobs = 8
//!
//! [vars]
//! email = "ada@example.com"
//!
//! [colors]
//! bg = "#1d2021"
//!
//! [modules.nvim]
//! source = "github:someone/nvim-config@main"
//! target = "~/.config/nvim"
//! ```
pub mod toml_loader;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::platform::{self, expand_path};

/// File name of the workspace configuration.
pub const CONFIG_FILE: &str = "workspaced.toml";

/// File name of the state file inside the state directory.
pub const STATE_FILE: &str = "state.json";

const fn default_true() -> bool {
    true
}

/// `[modules.<name>]` table.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ModuleConfig {
    /// Disabled modules are skipped entirely.
    #[serde(default = "default_true")]
    pub enable: bool,
    /// Source string, `provider:ref[@version]`.
    pub source: String,
    /// Target directory overriding the module manifest.
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Settings {
    home: Option<String>,
    sources: Option<String>,
    core_modules: Option<String>,
    cache_dir: Option<String>,
    state_file: Option<String>,
    bin_dir: Option<String>,
    jobs: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    workspaced: Settings,
    vars: toml::Table,
    colors: BTreeMap<String, String>,
    modules: BTreeMap<String, ModuleConfig>,
}

/// Fully resolved configuration with absolute paths.
#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace root holding `workspaced.toml`.
    pub root: PathBuf,
    /// Home directory files are reconciled into.
    pub home: PathBuf,
    /// Directory scanned into `home`.
    pub sources_dir: PathBuf,
    /// Directory holding `core:` modules.
    pub core_modules_dir: PathBuf,
    /// Fetch cache and log directory.
    pub cache_dir: PathBuf,
    /// JSON state file.
    pub state_file: PathBuf,
    /// Directory generated shims land in.
    pub bin_dir: PathBuf,
    /// Planner worker count; `None` uses the available parallelism.
    pub jobs: Option<usize>,
    /// Template variables from `[vars]`.
    pub vars: toml::Table,
    /// Theme palette from `[colors]`.
    pub colors: BTreeMap<String, String>,
    /// Modules by name from `[modules.<name>]`.
    pub modules: BTreeMap<String, ModuleConfig>,
}

impl Config {
    /// Load `workspaced.toml` from `root`; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or the home directory
    /// cannot be determined.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        let raw: RawConfig =
            toml_loader::load_config(&path).with_context(|| format!("loading {CONFIG_FILE}"))?;
        Self::from_raw(root, raw)
    }

    fn from_raw(root: &Path, raw: RawConfig) -> Result<Self> {
        let s = raw.workspaced;
        let home = match &s.home {
            Some(h) => expand_path(h, root)?,
            None => platform::home_dir()?,
        };
        let path_or = |value: &Option<String>, base: &Path, default: PathBuf| -> Result<PathBuf> {
            value
                .as_deref()
                .map_or(Ok(default), |v| expand_path(v, base))
        };

        Ok(Self {
            root: root.to_path_buf(),
            sources_dir: path_or(&s.sources, root, root.join("home"))?,
            core_modules_dir: path_or(&s.core_modules, root, root.join("modules"))?,
            cache_dir: path_or(&s.cache_dir, root, platform::cache_dir()?.join("sources"))?,
            state_file: path_or(&s.state_file, root, platform::state_dir()?.join(STATE_FILE))?,
            bin_dir: path_or(&s.bin_dir, &home, home.join(".local/bin"))?,
            jobs: s.jobs.filter(|j| *j > 0),
            home,
            vars: raw.vars,
            colors: raw.colors,
            modules: raw.modules,
        })
    }

    /// Data templates render against: every `[vars]` key at the top level,
    /// plus `colors`, `home` and `os`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be represented as JSON.
    pub fn template_data(&self) -> Result<serde_json::Value> {
        let mut data = match serde_json::to_value(&self.vars).context("converting [vars]")? {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        data.insert(
            "colors".to_string(),
            serde_json::to_value(&self.colors).context("converting [colors]")?,
        );
        data.insert(
            "home".to_string(),
            serde_json::Value::String(self.home.to_string_lossy().into_owned()),
        );
        data.insert(
            "os".to_string(),
            serde_json::Value::String(std::env::consts::OS.to_string()),
        );
        Ok(serde_json::Value::Object(data))
    }

    /// Enabled modules as `(name, source)` pairs, sorted by name.
    #[must_use]
    pub fn enabled_modules(&self) -> Vec<(&str, &str)> {
        self.modules
            .iter()
            .filter(|(_, m)| m.enable)
            .map(|(name, m)| (name.as_str(), m.source.as_str()))
            .collect()
    }
}
