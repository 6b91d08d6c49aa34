//! Configuration file support for the CLI.
//!
//! The file is TOML: an `[engine]` table holding an [`EngineConfig`] plus a
//! few display settings.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use quarry_common::EngineConfig;

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Engine settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Print elapsed time after queries.
    #[serde(default)]
    pub timing: bool,

    /// Print the operator tree before running a query.
    #[serde(default = "default_show_plan")]
    pub show_plan: bool,

    /// Result lines echoed after a query; 0 disables the preview.
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

fn default_show_plan() -> bool {
    true
}

fn default_preview_rows() -> usize {
    20
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            timing: false,
            show_plan: default_show_plan(),
            preview_rows: default_preview_rows(),
        }
    }
}

impl CliConfig {
    /// Loads configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        config.engine.validate()?;
        Ok(config)
    }

    /// Saves configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Loads the default configuration file.
    ///
    /// Looks in the following locations:
    /// 1. `<config_dir>/quarry/config.toml`
    /// 2. `~/.quarry/config.toml`
    /// 3. Returns defaults if neither exists
    pub fn load_default() -> Result<Self> {
        let candidates = [
            Self::default_config_path(),
            dirs::home_dir().map(|h| h.join(".quarry").join("config.toml")),
        ];
        for path in candidates.into_iter().flatten() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }
        Ok(Self::default())
    }

    /// Returns the default configuration file path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("quarry").join("config.toml"))
    }
}
