//! # quarry-common
//!
//! Common types, errors, and configuration for Quarry.
//!
//! This crate provides the foundational pieces shared by every Quarry
//! component:
//!
//! - **Types**: heap page identifiers and record locations
//! - **Errors**: unified error handling with `QuarryError`
//! - **Config**: engine, storage, and planner configuration
//! - **Constants**: page sizes, index fanout, and planner limits
//!
//! ## Example
//!
//! ```rust
//! use quarry_common::types::{PageId, RecordLocation};
//! use quarry_common::error::QuarryResult;
//!
//! fn example() -> QuarryResult<RecordLocation> {
//!     Ok(RecordLocation::new(PageId::new(3), 17))
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items at the crate root
pub use config::{EngineConfig, PlannerConfig, StorageConfig};
pub use constants::*;
pub use error::{ErrorCode, QuarryError, QuarryResult};
pub use types::{PageId, RecordLocation};
