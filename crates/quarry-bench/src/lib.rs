//! Quarry performance benchmarks
//!
//! - Index lookups and range scans against sequential scans
//! - Join strategies (nested loop, hash, symmetric hash) end to end
//!
//! Run benchmarks with:
//! ```bash
//! cargo bench -p quarry-bench
//! ```

pub mod utils;
