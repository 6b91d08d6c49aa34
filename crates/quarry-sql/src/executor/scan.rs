//! Leaf operators: heap scans and index lookups.

use std::collections::VecDeque;
use std::fmt;

use quarry_common::{QuarryResult, RecordLocation};
use quarry_storage::{BTreeIndex, HeapFile, Record, Schema};

/// Sequential scan over a table's heap file.
#[derive(Debug)]
pub struct ScanExec {
    table: String,
    heap: HeapFile,
    schema: Schema,
}

impl ScanExec {
    /// Creates a scan positioned at the first record.
    pub fn new(table: impl Into<String>, mut heap: HeapFile, schema: Schema) -> Self {
        heap.move_first();
        Self {
            table: table.into(),
            heap,
            schema,
        }
    }

    /// Scanned table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Output schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the next record in page-then-slot order.
    ///
    /// # Errors
    ///
    /// Fails if a heap page cannot be read.
    pub fn get_next(&mut self) -> QuarryResult<Option<Record>> {
        Ok(self.heap.get_next()?.map(|(record, _)| record))
    }
}

/// Keys an index scan looks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexLookup {
    /// Every entry equal to the key.
    Point(i32),
    /// Every entry in the inclusive range.
    Range(i32, i32),
}

impl fmt::Display for IndexLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexLookup::Point(key) => write!(f, "= {key}"),
            IndexLookup::Range(lo, hi) => write!(f, "in [{lo}, {hi}]"),
        }
    }
}

/// Reads matching tuples through a B+-tree index.
///
/// The lookup runs on the first pull; each later pull fetches one heap
/// record by location.
#[derive(Debug)]
pub struct IndexScanExec {
    table: String,
    attribute: String,
    lookup: IndexLookup,
    index: BTreeIndex,
    heap: HeapFile,
    schema: Schema,
    pending: Option<VecDeque<RecordLocation>>,
}

impl IndexScanExec {
    /// Creates an index scan of `table` through an index on `attribute`.
    pub fn new(
        table: impl Into<String>,
        attribute: impl Into<String>,
        lookup: IndexLookup,
        index: BTreeIndex,
        heap: HeapFile,
        schema: Schema,
    ) -> Self {
        Self {
            table: table.into(),
            attribute: attribute.into(),
            lookup,
            index,
            heap,
            schema,
            pending: None,
        }
    }

    /// Scanned table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Indexed attribute.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Key or range looked up.
    pub fn lookup(&self) -> IndexLookup {
        self.lookup
    }

    /// Output schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the next matching record.
    ///
    /// # Errors
    ///
    /// Fails if an index or heap page cannot be read.
    pub fn get_next(&mut self) -> QuarryResult<Option<Record>> {
        if self.pending.is_none() {
            let locations = match self.lookup {
                IndexLookup::Point(key) => self.index.find_all(key)?,
                IndexLookup::Range(lo, hi) => self.index.range(lo, hi)?,
            };
            self.pending = Some(locations.into());
        }
        match self.pending.as_mut().and_then(VecDeque::pop_front) {
            Some(location) => self.heap.fetch(location).map(Some),
            None => Ok(None),
        }
    }
}
