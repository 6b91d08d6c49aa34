//! Engine configuration structures.
//!
//! These structures define all configurable aspects of a Quarry engine.
//! They load from and save to TOML.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{
    index_page_bytes, DEFAULT_CATALOG_FILE, DEFAULT_INDEX_FANOUT, DEFAULT_INDEX_PAGE_SIZE,
    DEFAULT_OUTPUT_FILE, DEFAULT_PAGE_SIZE, DEFAULT_SYMMETRIC_HASH_THRESHOLD, MIN_INDEX_FANOUT,
    MIN_PAGE_SIZE,
};
use crate::error::{QuarryError, QuarryResult};

/// Main engine configuration.
///
/// # Example
///
/// ```rust
/// use quarry_common::config::EngineConfig;
///
/// let config = EngineConfig::default();
/// assert_eq!(config.storage.index_fanout, 100);
/// assert!(!config.planner.allow_hash_join);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding heap and index files.
    pub data_dir: PathBuf,

    /// Catalog file. Relative paths resolve against `data_dir`.
    pub catalog_path: PathBuf,

    /// File that query results are written to.
    pub output_path: PathBuf,

    /// Storage configuration.
    pub storage: StorageConfig,

    /// Planner configuration.
    pub planner: PlannerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            catalog_path: PathBuf::from(DEFAULT_CATALOG_FILE),
            output_path: PathBuf::from(DEFAULT_OUTPUT_FILE),
            storage: StorageConfig::default(),
            planner: PlannerConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a configuration rooted at the given data directory.
    #[must_use]
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Creates a configuration for tests: small pages and a small fanout so
    /// modest tables still produce multi-level trees and multi-page heaps.
    #[must_use]
    pub fn for_testing(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            output_path: data_dir.join(DEFAULT_OUTPUT_FILE),
            data_dir,
            catalog_path: PathBuf::from(DEFAULT_CATALOG_FILE),
            storage: StorageConfig {
                page_size: 1024,
                index_page_size: 1024,
                index_fanout: 4,
            },
            planner: PlannerConfig::default(),
        }
    }

    /// Returns the catalog path, resolved against `data_dir` when relative.
    #[must_use]
    pub fn resolved_catalog_path(&self) -> PathBuf {
        if self.catalog_path.is_absolute() {
            self.catalog_path.clone()
        } else {
            self.data_dir.join(&self.catalog_path)
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> QuarryResult<()> {
        self.storage.validate()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, is not valid TOML, or does not
    /// validate.
    pub fn from_file(path: &Path) -> QuarryResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| QuarryError::InvalidConfig {
            message: format!("{}: {e}", path.display()),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a TOML file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Fails if the configuration cannot be encoded or written.
    pub fn save(&self, path: &Path) -> QuarryResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| QuarryError::InvalidConfig {
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Heap page size in bytes.
    /// Default: 8192 (8 KB)
    pub page_size: usize,

    /// Index page size in bytes.
    /// Default: 4096 (4 KB)
    pub index_page_size: usize,

    /// Entries per leaf and children per internal index page (K).
    /// Default: 100
    pub index_fanout: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            index_page_size: DEFAULT_INDEX_PAGE_SIZE,
            index_fanout: DEFAULT_INDEX_FANOUT,
        }
    }
}

impl StorageConfig {
    /// Validates page sizes and fanout.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> QuarryResult<()> {
        if self.page_size < MIN_PAGE_SIZE {
            return Err(QuarryError::InvalidConfig {
                message: format!("page_size must be at least {MIN_PAGE_SIZE} bytes"),
            });
        }
        if self.index_fanout < MIN_INDEX_FANOUT {
            return Err(QuarryError::InvalidConfig {
                message: format!("index_fanout must be at least {MIN_INDEX_FANOUT}"),
            });
        }
        let needed = index_page_bytes(self.index_fanout);
        if needed > self.index_page_size {
            return Err(QuarryError::InvalidConfig {
                message: format!(
                    "index_fanout {} needs {needed} byte pages, index_page_size is {}",
                    self.index_fanout, self.index_page_size
                ),
            });
        }
        Ok(())
    }
}

/// Planner configuration.
///
/// Hash-based joins are off by default; equality joins then run as nested
/// loops until explicitly enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Allow hash joins for equality-only join predicates.
    /// Default: false
    pub allow_hash_join: bool,

    /// Allow symmetric hash joins when both inputs are large.
    /// Default: false
    pub allow_symmetric_hash_join: bool,

    /// Estimated rows both inputs must exceed for a symmetric hash join.
    /// Default: 1000
    pub symmetric_hash_threshold: u64,

    /// Use index range scans for `<` and `>` predicates on indexed
    /// attributes.
    /// Default: false
    pub index_range_scans: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            allow_hash_join: false,
            allow_symmetric_hash_join: false,
            symmetric_hash_threshold: DEFAULT_SYMMETRIC_HASH_THRESHOLD,
            index_range_scans: false,
        }
    }
}

impl PlannerConfig {
    /// Creates a config with every hash-based strategy enabled.
    #[must_use]
    pub fn with_hash_joins() -> Self {
        Self {
            allow_hash_join: true,
            allow_symmetric_hash_join: true,
            ..Default::default()
        }
    }
}
