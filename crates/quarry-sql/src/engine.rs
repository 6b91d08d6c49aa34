//! Engine facade.
//!
//! [`Engine`] owns the configuration and the catalog and is the single entry
//! point used by the CLI: it lays out heap and index files under the data
//! directory, keeps statistics current, and compiles and runs queries.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use quarry_common::{
    EngineConfig, QuarryError, QuarryResult, HEAP_FILE_EXTENSION, INDEX_FILE_EXTENSION,
};
use quarry_storage::{BTreeIndex, Catalog, HeapFile, Schema, TableStats};

use crate::compiler::{QueryCompiler, QueryPlan};
use crate::parser::{ParsedQuery, Parser};

/// Result of running one query.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    /// Tuples written.
    pub tuples: u64,
    /// Output file.
    pub output: PathBuf,
    /// Rendered operator tree.
    pub plan: String,
    /// Compilation plus execution time.
    pub elapsed: Duration,
}

/// Catalog, storage layout, and query compilation behind one handle.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    catalog: Catalog,
}

impl Engine {
    /// Opens (or initializes) the engine rooted at `config.data_dir`.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, an uncreatable data directory, or an
    /// unreadable catalog.
    pub fn open(config: EngineConfig) -> QuarryResult<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;
        let catalog = Catalog::open(config.resolved_catalog_path())?;
        info!(
            data_dir = %config.data_dir.display(),
            tables = catalog.tables().len(),
            "opened engine"
        );
        Ok(Self { config, catalog })
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Table and index catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Registers a table from a definition such as `"a:int, b:string"` and
    /// creates its empty heap file.
    ///
    /// # Errors
    ///
    /// Fails on invalid names or definitions, existing tables, and I/O
    /// errors.
    pub fn create_table(&self, name: &str, definition: &str) -> QuarryResult<Schema> {
        check_name("table", name)?;
        let schema = Schema::parse_definition(definition)?;
        let path = self.heap_path(name);
        self.catalog.create_table(name, schema.clone(), &path)?;

        let created = HeapFile::create(&path, self.config.storage.page_size)
            .and_then(|mut heap| heap.finish());
        if let Err(e) = created {
            self.catalog.drop_table(name)?;
            return Err(e);
        }
        info!(table = name, schema = %schema, "created table");
        Ok(schema)
    }

    /// Replaces a table's contents with the `|`-delimited rows of `text`,
    /// refreshes its statistics, and rebuilds the table's indexes.
    ///
    /// # Errors
    ///
    /// Fails for unknown tables, malformed input, and I/O errors. An index
    /// that cannot be rebuilt is unregistered before the error is returned,
    /// so queries never read locations from the previous contents.
    pub fn load_table(&self, name: &str, text: impl AsRef<Path>) -> QuarryResult<TableStats> {
        let entry = self.catalog.table(name)?;
        let mut heap = HeapFile::create(&entry.data_file, self.config.storage.page_size)?;
        let stats = heap.load_text(&entry.schema, text)?;
        self.catalog.update_statistics(name, &stats)?;
        info!(table = name, tuples = stats.tuples, "loaded table");

        let indexes: Vec<_> = self
            .catalog
            .indexes()
            .into_iter()
            .filter(|i| i.table == name)
            .collect();
        for index in indexes {
            let rebuilt = BTreeIndex::build(
                &self.catalog,
                name,
                &index.attribute,
                &index.file,
                &self.config.storage,
            );
            if let Err(e) = rebuilt {
                warn!(
                    table = name,
                    attribute = %index.attribute,
                    error = %e,
                    "dropping index after failed rebuild"
                );
                self.catalog.drop_index(name, &index.attribute)?;
                return Err(e);
            }
        }
        Ok(stats)
    }

    /// Bulk-loads a B+-tree on an integer attribute into
    /// `<data_dir>/<table>.<attribute>.idx` and registers it.
    ///
    /// # Errors
    ///
    /// Fails for unknown tables or attributes, non-integer attributes, and
    /// I/O errors. The catalog is only updated after a successful build.
    pub fn build_index(&self, table: &str, attribute: &str) -> QuarryResult<BTreeIndex> {
        let schema = self.catalog.resolve_schema(table)?;
        let position = schema.resolve(attribute)?;
        let bare = schema
            .attribute(position)
            .map(|a| a.name.clone())
            .ok_or_else(|| QuarryError::attribute_not_found(attribute))?;
        let path = self
            .config
            .data_dir
            .join(format!("{table}.{bare}.{INDEX_FILE_EXTENSION}"));
        BTreeIndex::build(&self.catalog, table, &bare, path, &self.config.storage)
    }

    /// Parses and compiles `sql`.
    ///
    /// # Errors
    ///
    /// Fails on syntax errors, unsupported SQL, and compilation errors.
    pub fn compile(&self, sql: &str) -> QuarryResult<QueryPlan> {
        let query = Parser::parse_query(sql)?;
        self.compile_query(&query)
    }

    /// Compiles an already parsed query.
    ///
    /// # Errors
    ///
    /// Fails on resolution and planning errors.
    pub fn compile_query(&self, query: &ParsedQuery) -> QuarryResult<QueryPlan> {
        QueryCompiler::new(&self.catalog, &self.config).compile(query)
    }

    /// Compiles and executes `sql`, writing results to the output file.
    ///
    /// # Errors
    ///
    /// Fails on any parse, compile, or execution error.
    pub fn run(&self, sql: &str) -> QuarryResult<QueryOutcome> {
        let query = Parser::parse_query(sql)?;
        self.run_query(&query)
    }

    /// Executes an already parsed query.
    ///
    /// # Errors
    ///
    /// Fails on any compile or execution error.
    pub fn run_query(&self, query: &ParsedQuery) -> QuarryResult<QueryOutcome> {
        let start = Instant::now();
        let mut plan = self.compile_query(query)?;
        let rendered = plan.to_string();
        let tuples = plan.execute()?;
        Ok(QueryOutcome {
            tuples,
            output: plan.output().to_path_buf(),
            plan: rendered,
            elapsed: start.elapsed(),
        })
    }

    fn heap_path(&self, table: &str) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{table}.{HEAP_FILE_EXTENSION}"))
    }
}

/// Table names become file names.
fn check_name(kind: &str, name: &str) -> QuarryResult<()> {
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(QuarryError::invalid_argument(format!(
            "invalid {kind} name '{name}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_common::{PageId, RecordLocation};

    fn engine(dir: &Path) -> Engine {
        Engine::open(EngineConfig::for_testing(dir)).unwrap()
    }

    fn write_rows(dir: &Path, name: &str, rows: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, rows).unwrap();
        path
    }

    #[test]
    fn test_index_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        engine.create_table("T", "a:int, b:int").unwrap();
        let rows = write_rows(dir.path(), "t.tbl", "1|10\n2|20\n1|30\n");
        let stats = engine.load_table("T", rows).unwrap();
        assert_eq!(stats.tuples, 3);
        assert_eq!(stats.distinct, vec![2, 3]);

        let index = engine.build_index("T", "a").unwrap();
        let first = index.find(1).unwrap().unwrap();
        assert!(
            first == RecordLocation::new(PageId::new(0), 0)
                || first == RecordLocation::new(PageId::new(0), 2)
        );
        assert!(index.find(3).unwrap().is_none());
        assert!(engine.catalog().has_index("T", "a"));

        let outcome = engine.run("SELECT b FROM T WHERE a = 1").unwrap();
        assert_eq!(outcome.tuples, 2);
        assert!(outcome.plan.contains("INDEX SCAN T ON a = 1"));
        assert_eq!(std::fs::read_to_string(&outcome.output).unwrap(), "10\n30\n\n");
    }

    #[test]
    fn test_reopen_keeps_catalog_and_indexes() {
        let dir = tempfile::tempdir().unwrap();
        {
            let engine = engine(dir.path());
            engine.create_table("T", "k:int, s:string").unwrap();
            let rows = write_rows(dir.path(), "t.tbl", "5|five\n3|three\n9|nine\n");
            engine.load_table("T", rows).unwrap();
            engine.build_index("T", "T.k").unwrap();
        }

        let engine = engine(dir.path());
        assert_eq!(engine.catalog().tables(), vec!["T".to_string()]);
        assert_eq!(engine.catalog().resolve_schema("T").unwrap().tuples(), 3);
        assert!(engine.catalog().has_index("T", "k"));

        let outcome = engine.run("SELECT s FROM T WHERE k = 9").unwrap();
        assert_eq!(outcome.tuples, 1);
        assert_eq!(std::fs::read_to_string(&outcome.output).unwrap(), "nine\n\n");
    }

    #[test]
    fn test_create_table_errors() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        engine.create_table("T", "a:int").unwrap();

        assert!(matches!(
            engine.create_table("T", "a:int"),
            Err(QuarryError::TableExists { .. })
        ));
        assert!(engine.create_table("../evil", "a:int").is_err());
        assert!(engine.create_table("9lives", "a:int").is_err());
        assert!(engine.create_table("U", "a:blob").is_err());
        assert!(engine.catalog().table("U").is_err());
    }

    #[test]
    fn test_index_on_string_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        engine.create_table("T", "a:int, s:string").unwrap();
        assert!(matches!(
            engine.build_index("T", "s"),
            Err(QuarryError::UnsupportedIndex { .. })
        ));
        assert!(!engine.catalog().has_index("T", "s"));
    }

    #[test]
    fn test_reload_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        engine.create_table("T", "a:int").unwrap();
        engine
            .load_table("T", write_rows(dir.path(), "one.tbl", "1\n2\n3\n"))
            .unwrap();
        let stats = engine
            .load_table("T", write_rows(dir.path(), "two.tbl", "7\n"))
            .unwrap();
        assert_eq!(stats.tuples, 1);
        assert_eq!(engine.run("SELECT * FROM T").unwrap().tuples, 1);
    }

    #[test]
    fn test_reload_rebuilds_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        engine.create_table("T", "a:int, b:int").unwrap();
        engine
            .load_table("T", write_rows(dir.path(), "one.tbl", "1|10\n2|20\n3|30\n"))
            .unwrap();
        engine.build_index("T", "a").unwrap();

        engine
            .load_table(
                "T",
                write_rows(dir.path(), "two.tbl", "3|33\n9|90\n8|80\n7|70\n"),
            )
            .unwrap();
        assert!(engine.catalog().has_index("T", "a"));

        let indexed = engine.run("SELECT b FROM T WHERE a = 3").unwrap();
        assert!(indexed.plan.contains("INDEX SCAN T ON a = 3"));
        assert_eq!(indexed.tuples, 1);
        assert_eq!(std::fs::read_to_string(&indexed.output).unwrap(), "33\n\n");

        let scanned = engine.run("SELECT b FROM T WHERE b = 33").unwrap();
        assert!(!scanned.plan.contains("INDEX SCAN"));
        assert_eq!(scanned.tuples, indexed.tuples);
        assert_eq!(engine.run("SELECT b FROM T WHERE a = 2").unwrap().tuples, 0);
    }

    #[test]
    fn test_failed_rebuild_drops_index() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        engine.create_table("T", "a:int").unwrap();
        engine
            .load_table("T", write_rows(dir.path(), "one.tbl", "1\n2\n"))
            .unwrap();
        engine.build_index("T", "a").unwrap();

        // The index file's directory disappears, so the rebuild cannot write.
        let blocked = dir.path().join("gone");
        std::fs::create_dir(&blocked).unwrap();
        engine
            .catalog()
            .register_index("T", "a", blocked.join("T.a.idx"))
            .unwrap();
        std::fs::remove_dir(&blocked).unwrap();

        assert!(engine
            .load_table("T", write_rows(dir.path(), "two.tbl", "5\n"))
            .is_err());
        assert!(!engine.catalog().has_index("T", "a"));
        let outcome = engine.run("SELECT * FROM T WHERE a = 5").unwrap();
        assert!(!outcome.plan.contains("INDEX SCAN"));
        assert_eq!(outcome.tuples, 1);
    }

    #[test]
    fn test_empty_table_query() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        engine.create_table("T", "a:int").unwrap();
        let outcome = engine.run("SELECT SUM(a) FROM T").unwrap();
        assert_eq!(outcome.tuples, 1);
        assert_eq!(std::fs::read_to_string(&outcome.output).unwrap(), "0.00\n\n");
    }

    #[test]
    fn test_compile_leaves_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        engine.create_table("T", "a:int").unwrap();
        engine
            .load_table("T", write_rows(dir.path(), "t.tbl", "4\n6\n"))
            .unwrap();
        let outcome = engine.run("SELECT a FROM T").unwrap();
        assert_eq!(std::fs::read_to_string(&outcome.output).unwrap(), "4\n6\n\n");

        let plan = engine.compile("SELECT a FROM T WHERE a = 100").unwrap();
        assert!(plan.to_string().starts_with("OUTPUT"));
        drop(plan);
        assert_eq!(std::fs::read_to_string(&outcome.output).unwrap(), "4\n6\n\n");

        assert_eq!(engine.run("SELECT a FROM T WHERE a = 100").unwrap().tuples, 0);
        assert_eq!(std::fs::read_to_string(&outcome.output).unwrap(), "\n");
    }
}
