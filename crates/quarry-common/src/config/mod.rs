//! Configuration for Quarry.
//!
//! This module provides configuration structures for storage and planning.

mod engine;

pub use engine::{EngineConfig, PlannerConfig, StorageConfig};
