//! System-wide constants for Quarry.

// =============================================================================
// Heap Page Constants
// =============================================================================

/// Default heap page size in bytes (8 KB).
pub const DEFAULT_PAGE_SIZE: usize = 8 * 1024;

/// Minimum heap page size in bytes.
pub const MIN_PAGE_SIZE: usize = 512;

/// Size of the record count stored at the start of every heap page.
pub const PAGE_HEADER_SIZE: usize = 4;

// =============================================================================
// Index Constants
// =============================================================================

/// Default index page size in bytes (4 KB).
pub const DEFAULT_INDEX_PAGE_SIZE: usize = 4 * 1024;

/// Default number of entries per leaf and children per internal page.
pub const DEFAULT_INDEX_FANOUT: usize = 100;

/// Minimum fanout that still produces a tree.
pub const MIN_INDEX_FANOUT: usize = 2;

/// Size of one integer field in an index page.
pub const INDEX_FIELD_SIZE: usize = 4;

/// Number of integer fields before the entries of an index page
/// (kind, page id, last pointer, key count).
pub const INDEX_HEADER_FIELDS: usize = 4;

/// Integer fields per leaf entry (key, heap page, record offset).
pub const LEAF_ENTRY_FIELDS: usize = 3;

/// Integer fields per internal entry (key, child pointer).
pub const INTERNAL_ENTRY_FIELDS: usize = 2;

/// File extension used for index files.
pub const INDEX_FILE_EXTENSION: &str = "idx";

/// File extension used for heap files.
pub const HEAP_FILE_EXTENSION: &str = "heap";

// =============================================================================
// Planner Constants
// =============================================================================

/// Maximum number of tables the join-order optimizer enumerates.
pub const MAX_JOIN_TABLES: usize = 10;

/// Default row threshold above which both join inputs qualify for a
/// symmetric hash join.
pub const DEFAULT_SYMMETRIC_HASH_THRESHOLD: u64 = 1000;

/// Cap on the divisor used when estimating `<` and `>` selections.
pub const RANGE_SELECTIVITY_DIVISOR: u64 = 3;

/// Name of the aggregate output column.
pub const SUM_COLUMN: &str = "sum";

// =============================================================================
// Text Format Constants
// =============================================================================

/// Field delimiter for loaded text files and query output.
pub const FIELD_DELIMITER: char = '|';

/// Default query output file.
pub const DEFAULT_OUTPUT_FILE: &str = "output.txt";

/// Default catalog file name inside the data directory.
pub const DEFAULT_CATALOG_FILE: &str = "catalog.json";

/// Returns the largest index page layout in bytes for a given fanout.
///
/// Leaves dominate: header, `fanout` three-field entries, and the closing
/// copy of the last pointer.
#[must_use]
pub const fn index_page_bytes(fanout: usize) -> usize {
    (INDEX_HEADER_FIELDS + fanout * LEAF_ENTRY_FIELDS + 1) * INDEX_FIELD_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fanout_fits_index_page() {
        assert!(index_page_bytes(DEFAULT_INDEX_FANOUT) <= DEFAULT_INDEX_PAGE_SIZE);
        assert_eq!(index_page_bytes(100), 1220);
    }
}
