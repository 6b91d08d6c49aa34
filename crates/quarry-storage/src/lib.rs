//! # quarry-storage
//!
//! Storage layer for Quarry.
//!
//! This crate provides everything below the query compiler:
//! - Schemas and the self-describing record encoding
//! - Fixed-size pages and paged heap files with a sequential cursor
//! - A JSON-persisted catalog of tables, statistics, and index files
//! - Bulk-loaded B+-tree indexes over integer attributes

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Bulk-loaded B+-tree indexes
pub mod btree;

/// Table and index metadata
pub mod catalog;

/// Paged heap files
pub mod heap;

/// Fixed-size record pages
pub mod page;

/// Record encoding
pub mod record;

/// Schemas and attributes
pub mod schema;

pub use btree::{BTreeIndex, IndexPage, IndexPageKind};
pub use catalog::{Catalog, IndexEntry, TableEntry};
pub use heap::{HeapFile, TableStats};
pub use page::Page;
pub use record::{Record, Value};
pub use schema::{Attribute, DataType, Schema};
