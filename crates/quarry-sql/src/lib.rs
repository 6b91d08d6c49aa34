//! # quarry-sql
//!
//! Query compilation and execution for Quarry.
//!
//! This crate implements:
//! - A SQL front end for single-block `SELECT` queries
//! - Cardinality estimation and a bitmask dynamic-programming join orderer
//! - A compiler that assembles physical operator trees
//! - Pull-based operators, including three join strategies
//! - An [`Engine`] facade tying catalog, storage, and compiler together

#![warn(missing_docs)]
#![warn(clippy::all)]

/// SQL parsing into [`ParsedQuery`]
pub mod parser;

/// Predicates and aggregate functions bound to schemas
pub mod expr;

/// Cardinality estimation and join ordering
pub mod optimizer;

/// Physical operators
pub mod executor;

/// Operator-tree assembly
pub mod compiler;

/// Catalog, storage, and compiler facade
pub mod engine;

pub use compiler::{QueryCompiler, QueryPlan};
pub use engine::{Engine, QueryOutcome};
pub use executor::Operator;
pub use parser::{ParseError, ParsedQuery, Parser};
