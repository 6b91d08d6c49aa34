//! Compiled query plans.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::info;

use quarry_common::QuarryResult;

use crate::executor::Operator;

/// An executable operator tree rooted at a `WriteOut` sink.
#[derive(Debug)]
pub struct QueryPlan {
    root: Operator,
    output: PathBuf,
    join_cost: Option<u64>,
}

impl QueryPlan {
    pub(crate) fn new(root: Operator, output: PathBuf, join_cost: Option<u64>) -> Self {
        Self {
            root,
            output,
            join_cost,
        }
    }

    /// Root operator.
    pub fn root(&self) -> &Operator {
        &self.root
    }

    /// File the results are written to.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Estimated cost of the chosen join order, when the query joins.
    pub fn join_cost(&self) -> Option<u64> {
        self.join_cost
    }

    /// Estimated number of result tuples.
    pub fn estimated_tuples(&self) -> u64 {
        self.root.schema().tuples()
    }

    /// Pulls the plan to exhaustion and returns the number of tuples
    /// written. A plan runs once; executing it again writes nothing.
    ///
    /// # Errors
    ///
    /// Propagates operator errors. The output file may be partially written.
    pub fn execute(&mut self) -> QuarryResult<u64> {
        let mut tuples = 0u64;
        while self.root.get_next()?.is_some() {
            tuples += 1;
        }
        info!(tuples, output = %self.output.display(), "query executed");
        Ok(tuples)
    }
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}
