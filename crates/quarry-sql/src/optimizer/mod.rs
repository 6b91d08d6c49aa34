//! Cardinality estimation and join ordering.
//!
//! Estimates are integer heuristics over catalog statistics: per-table tuple
//! counts and per-attribute distinct-value counts. The join orderer is an
//! exhaustive dynamic program over table subsets encoded as bitmasks.
//!
//! # Example
//!
//! ```
//! use quarry_sql::optimizer::{optimize_joins, JoinGraph};
//!
//! let mut graph = JoinGraph::new(vec!["A".into(), "B".into()], vec![100, 10]);
//! graph.add_predicate(0, 1, 10);
//! let order = optimize_joins(&graph).unwrap();
//! assert_eq!(order.steps.len(), 1);
//! ```

mod cost;
mod join_order;

pub use cost::{distinct_output_estimate, estimate_selection};
pub use join_order::{optimize_joins, JoinGraph, JoinOrder, JoinStep, TableSet};
