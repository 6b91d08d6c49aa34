//! Catalog of tables, statistics, and index files.
//!
//! The catalog maps table names to schemas and heap files, and
//! `(table, attribute)` pairs to index files. It is persisted as pretty
//! JSON and reloaded on open. Callers hold it as an explicit context object;
//! there is no process-wide catalog.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use quarry_common::{QuarryError, QuarryResult};

use crate::heap::TableStats;
use crate::schema::Schema;

/// Metadata for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntry {
    /// Table name.
    pub name: String,
    /// Unqualified schema with statistics.
    pub schema: Schema,
    /// Heap file holding the table's tuples.
    pub data_file: PathBuf,
}

impl TableEntry {
    /// Creates a new table entry.
    pub fn new(name: impl Into<String>, schema: Schema, data_file: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            schema,
            data_file: data_file.into(),
        }
    }
}

/// A registered index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Indexed table.
    pub table: String,
    /// Indexed attribute.
    pub attribute: String,
    /// Index file.
    pub file: PathBuf,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogState {
    tables: BTreeMap<String, TableEntry>,
    #[serde(default)]
    indexes: Vec<IndexEntry>,
}

/// Table and index metadata, optionally persisted to a JSON file.
#[derive(Debug)]
pub struct Catalog {
    path: Option<PathBuf>,
    state: RwLock<CatalogState>,
}

impl Catalog {
    /// Creates a catalog that is never persisted.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: RwLock::new(CatalogState::default()),
        }
    }

    /// Opens the catalog stored at `path`, starting empty when the file does
    /// not exist yet.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or decoded.
    pub fn open(path: impl Into<PathBuf>) -> QuarryResult<Self> {
        let path = path.into();
        let state = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content).map_err(|e| QuarryError::CatalogFormat {
                path: path.clone(),
                message: e.to_string(),
            })?
        } else {
            CatalogState::default()
        };
        debug!(path = %path.display(), tables = state.tables.len(), "opened catalog");
        Ok(Self {
            path: Some(path),
            state: RwLock::new(state),
        })
    }

    /// File the catalog persists to, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Writes the catalog to its file. In-memory catalogs do nothing.
    ///
    /// # Errors
    ///
    /// Fails if the catalog cannot be encoded or written.
    pub fn save(&self) -> QuarryResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let content = {
            let state = self.state.read();
            serde_json::to_string_pretty(&*state).map_err(|e| QuarryError::CatalogFormat {
                path: path.clone(),
                message: e.to_string(),
            })?
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        info!(path = %path.display(), "saved catalog");
        Ok(())
    }

    /// Registers a new table and saves the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::TableExists`] when the name is taken.
    pub fn create_table(
        &self,
        name: &str,
        schema: Schema,
        data_file: impl Into<PathBuf>,
    ) -> QuarryResult<()> {
        {
            let mut state = self.state.write();
            if state.tables.contains_key(name) {
                return Err(QuarryError::TableExists {
                    table: name.to_string(),
                });
            }
            state
                .tables
                .insert(name.to_string(), TableEntry::new(name, schema, data_file));
        }
        self.save()
    }

    /// Removes a table and every index on it, then saves the catalog.
    ///
    /// Returns the removed entry.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::TableNotFound`] for unknown tables.
    pub fn drop_table(&self, name: &str) -> QuarryResult<TableEntry> {
        let entry = {
            let mut state = self.state.write();
            let entry = state.tables.remove(name).ok_or_else(|| QuarryError::TableNotFound {
                table: name.to_string(),
            })?;
            state.indexes.retain(|i| i.table != name);
            entry
        };
        self.save()?;
        Ok(entry)
    }

    /// Table names in sorted order.
    pub fn tables(&self) -> Vec<String> {
        self.state.read().tables.keys().cloned().collect()
    }

    /// Returns a copy of a table's entry.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::TableNotFound`] for unknown tables.
    pub fn table(&self, name: &str) -> QuarryResult<TableEntry> {
        self.state
            .read()
            .tables
            .get(name)
            .cloned()
            .ok_or_else(|| QuarryError::TableNotFound {
                table: name.to_string(),
            })
    }

    /// Returns the table's schema, with every attribute qualified by the
    /// table name.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::TableNotFound`] for unknown tables.
    pub fn resolve_schema(&self, name: &str) -> QuarryResult<Schema> {
        Ok(self.table(name)?.schema.qualified(name))
    }

    /// Returns the table's heap file.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::TableNotFound`] for unknown tables.
    pub fn resolve_data_file(&self, name: &str) -> QuarryResult<PathBuf> {
        Ok(self.table(name)?.data_file)
    }

    /// Replaces a table's statistics with freshly gathered ones and saves.
    ///
    /// # Errors
    ///
    /// Fails for unknown tables or when the statistics do not match the
    /// schema's attribute count.
    pub fn update_statistics(&self, name: &str, stats: &TableStats) -> QuarryResult<()> {
        {
            let mut state = self.state.write();
            let entry = state
                .tables
                .get_mut(name)
                .ok_or_else(|| QuarryError::TableNotFound {
                    table: name.to_string(),
                })?;
            if stats.distinct.len() != entry.schema.len() {
                return Err(QuarryError::invalid_argument(format!(
                    "statistics cover {} attributes, {name} has {}",
                    stats.distinct.len(),
                    entry.schema.len()
                )));
            }
            entry.schema.set_tuples(stats.tuples);
            for (i, distinct) in stats.distinct.iter().enumerate() {
                if let Some(attr) = entry.schema.attribute_mut(i) {
                    attr.distinct = *distinct;
                }
            }
        }
        self.save()
    }

    /// Returns true when `(table, attribute)` has a registered index.
    pub fn has_index(&self, table: &str, attribute: &str) -> bool {
        self.state
            .read()
            .indexes
            .iter()
            .any(|i| i.table == table && i.attribute == attribute)
    }

    /// Returns the index file registered for `(table, attribute)`.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::IndexNotFound`] when none is registered.
    pub fn index_file(&self, table: &str, attribute: &str) -> QuarryResult<PathBuf> {
        self.state
            .read()
            .indexes
            .iter()
            .find(|i| i.table == table && i.attribute == attribute)
            .map(|i| i.file.clone())
            .ok_or_else(|| QuarryError::IndexNotFound {
                table: table.to_string(),
                attribute: attribute.to_string(),
            })
    }

    /// Registers (or re-points) the index for `(table, attribute)` and saves.
    ///
    /// # Errors
    ///
    /// Fails if the catalog cannot be saved.
    pub fn register_index(
        &self,
        table: &str,
        attribute: &str,
        file: impl Into<PathBuf>,
    ) -> QuarryResult<()> {
        let file = file.into();
        {
            let mut state = self.state.write();
            match state
                .indexes
                .iter_mut()
                .find(|i| i.table == table && i.attribute == attribute)
            {
                Some(existing) => existing.file = file,
                None => state.indexes.push(IndexEntry {
                    table: table.to_string(),
                    attribute: attribute.to_string(),
                    file,
                }),
            }
        }
        self.save()
    }

    /// Unregisters the index for `(table, attribute)` and saves. The index
    /// file itself is left in place.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::IndexNotFound`] when none is registered, or
    /// fails if the catalog cannot be saved.
    pub fn drop_index(&self, table: &str, attribute: &str) -> QuarryResult<IndexEntry> {
        let removed = {
            let mut state = self.state.write();
            let position = state
                .indexes
                .iter()
                .position(|i| i.table == table && i.attribute == attribute)
                .ok_or_else(|| QuarryError::IndexNotFound {
                    table: table.to_string(),
                    attribute: attribute.to_string(),
                })?;
            state.indexes.remove(position)
        };
        self.save()?;
        Ok(removed)
    }

    /// Every registered index.
    pub fn indexes(&self) -> Vec<IndexEntry> {
        self.state.read().indexes.clone()
    }
}
