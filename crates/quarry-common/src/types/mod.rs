//! Type definitions shared across Quarry.

mod ids;

pub use ids::{PageId, RecordLocation};
