//! Unary operators: selection, projection, duplicate removal, aggregation,
//! and the output sink.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::debug;

use quarry_common::{QuarryError, QuarryResult};
use quarry_storage::{Record, Schema, Value};

use super::Operator;
use crate::expr::{AggregateFunction, Predicate};

/// Forwards child records that satisfy a predicate.
#[derive(Debug)]
pub struct SelectExec {
    child: Box<Operator>,
    predicate: Predicate,
    schema: Schema,
}

impl SelectExec {
    /// Creates a selection. `schema` carries the post-selection estimate.
    pub fn new(child: Operator, predicate: Predicate, schema: Schema) -> Self {
        Self {
            child: Box::new(child),
            predicate,
            schema,
        }
    }

    /// Input operator.
    pub fn child(&self) -> &Operator {
        &self.child
    }

    /// Bound predicate.
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Output schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the next record satisfying the predicate.
    ///
    /// # Errors
    ///
    /// Propagates child and evaluation errors.
    pub fn get_next(&mut self) -> QuarryResult<Option<Record>> {
        while let Some(record) = self.child.get_next()? {
            if self.predicate.matches(&record)? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }
}

/// Keeps an ordered subset of attribute positions.
#[derive(Debug)]
pub struct ProjectExec {
    child: Box<Operator>,
    positions: Vec<usize>,
    schema: Schema,
}

impl ProjectExec {
    /// Creates a projection onto `positions` of the child's output.
    pub fn new(child: Operator, positions: Vec<usize>, schema: Schema) -> Self {
        Self {
            child: Box::new(child),
            positions,
            schema,
        }
    }

    /// Input operator.
    pub fn child(&self) -> &Operator {
        &self.child
    }

    /// Kept positions, in output order.
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// Output schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the next projected record.
    ///
    /// # Errors
    ///
    /// Propagates child errors.
    pub fn get_next(&mut self) -> QuarryResult<Option<Record>> {
        self.child
            .get_next()?
            .map(|record| record.project(&self.positions))
            .transpose()
    }
}

/// Drops records whose encoding was already produced.
#[derive(Debug)]
pub struct DuplicateRemovalExec {
    child: Box<Operator>,
    seen: HashSet<Bytes>,
    schema: Schema,
}

impl DuplicateRemovalExec {
    /// Creates a duplicate-removal operator.
    pub fn new(child: Operator, schema: Schema) -> Self {
        Self {
            child: Box::new(child),
            seen: HashSet::new(),
            schema,
        }
    }

    /// Input operator.
    pub fn child(&self) -> &Operator {
        &self.child
    }

    /// Output schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the next record not seen before.
    ///
    /// # Errors
    ///
    /// Propagates child errors.
    pub fn get_next(&mut self) -> QuarryResult<Option<Record>> {
        while let Some(record) = self.child.get_next()? {
            if self.seen.insert(record.as_bytes().clone()) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }
}

/// Sums an expression over all child records; emits a single `FLOAT`.
#[derive(Debug)]
pub struct SumExec {
    child: Box<Operator>,
    function: AggregateFunction,
    schema: Schema,
    done: bool,
}

impl SumExec {
    /// Creates a sum.
    pub fn new(child: Operator, function: AggregateFunction, schema: Schema) -> Self {
        Self {
            child: Box::new(child),
            function,
            schema,
            done: false,
        }
    }

    /// Input operator.
    pub fn child(&self) -> &Operator {
        &self.child
    }

    /// Summed expression.
    pub fn function(&self) -> &AggregateFunction {
        &self.function
    }

    /// Output schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Drains the child on the first pull and returns the total; later
    /// pulls return `None`.
    ///
    /// # Errors
    ///
    /// Propagates child and evaluation errors.
    pub fn get_next(&mut self) -> QuarryResult<Option<Record>> {
        if self.done {
            return Ok(None);
        }
        let mut total = 0.0;
        while let Some(record) = self.child.get_next()? {
            total += self.function.apply(&record)?;
        }
        self.done = true;
        Ok(Some(Record::from_values(&[Value::Float(total)])))
    }
}

/// Sums an expression per group. Output is `[sum, grouping attributes...]`
/// in hash order.
#[derive(Debug)]
pub struct GroupByExec {
    child: Box<Operator>,
    grouping: Vec<usize>,
    function: AggregateFunction,
    schema: Schema,
    groups: Option<std::vec::IntoIter<Record>>,
}

impl GroupByExec {
    /// Creates a grouped sum over the child positions in `grouping`.
    pub fn new(
        child: Operator,
        grouping: Vec<usize>,
        function: AggregateFunction,
        schema: Schema,
    ) -> Self {
        Self {
            child: Box::new(child),
            grouping,
            function,
            schema,
            groups: None,
        }
    }

    /// Input operator.
    pub fn child(&self) -> &Operator {
        &self.child
    }

    /// Summed expression.
    pub fn function(&self) -> &AggregateFunction {
        &self.function
    }

    /// Output schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Drains and groups the child on the first pull, then returns one
    /// record per group.
    ///
    /// # Errors
    ///
    /// Propagates child and evaluation errors.
    pub fn get_next(&mut self) -> QuarryResult<Option<Record>> {
        if self.groups.is_none() {
            let mut sums: HashMap<Record, f64> = HashMap::new();
            while let Some(record) = self.child.get_next()? {
                let key = record.project(&self.grouping)?;
                *sums.entry(key).or_insert(0.0) += self.function.apply(&record)?;
            }
            debug!(groups = sums.len(), "grouped input");
            let rows: Vec<Record> = sums
                .into_iter()
                .map(|(key, sum)| Record::concat(&Record::from_values(&[Value::Float(sum)]), &key))
                .collect();
            self.groups = Some(rows.into_iter());
        }
        Ok(self.groups.as_mut().and_then(Iterator::next))
    }
}

/// Root of every plan: writes each child record as a `|`-delimited line and
/// passes it through. A blank line follows the last record.
///
/// The output file is created (truncated) on the first pull, so building a
/// plan without running it leaves earlier results in place.
#[derive(Debug)]
pub struct WriteOutExec {
    child: Box<Operator>,
    path: PathBuf,
    out: Option<BufWriter<File>>,
    finished: bool,
}

impl WriteOutExec {
    /// Creates a sink writing to `path`.
    pub fn new(child: Operator, path: impl AsRef<Path>) -> Self {
        Self {
            child: Box::new(child),
            path: path.as_ref().to_path_buf(),
            out: None,
            finished: false,
        }
    }

    /// Input operator.
    pub fn child(&self) -> &Operator {
        &self.child
    }

    /// Output file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Output schema (the child's).
    pub fn schema(&self) -> &Schema {
        self.child.schema()
    }

    fn open(path: &Path) -> QuarryResult<BufWriter<File>> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(BufWriter::new(File::create(path)?))
    }

    /// Writes and returns the next child record.
    ///
    /// # Errors
    ///
    /// Fails if the output file cannot be created, and propagates child
    /// errors and write failures.
    pub fn get_next(&mut self) -> QuarryResult<Option<Record>> {
        if self.finished {
            return Ok(None);
        }
        if self.out.is_none() {
            self.out = Some(Self::open(&self.path)?);
        }
        let Some(out) = self.out.as_mut() else {
            return Err(QuarryError::internal("output file not open"));
        };
        match self.child.get_next()? {
            Some(record) => {
                record.write_line(self.child.schema(), out)?;
                writeln!(out)?;
                Ok(Some(record))
            }
            None => {
                writeln!(out)?;
                out.flush()?;
                self.finished = true;
                Ok(None)
            }
        }
    }
}
