//! Bulk-loaded B+-tree over a single integer attribute.
//!
//! An index is built once from a full table scan and is read-only afterwards.
//! Leaves hold `(key, heap page, slot)` triples; internal pages hold
//! separator keys and child page ids. The root page id is persisted in a
//! metadata page at file slot 0, so reopening never guesses the root.

mod page;
mod tree;

pub use page::{IndexMeta, IndexPage, IndexPageKind};
pub use tree::BTreeIndex;
