//! Join operators.
//!
//! All three produce `left ++ right` records and agree on the output
//! multiset for the same inputs and equality predicate. They differ in what
//! they materialize:
//! - [`NestedLoopJoinExec`] buffers the right input in a list and supports
//!   any predicate.
//! - [`HashJoinExec`] builds a hash table on the right input, then streams
//!   the left input.
//! - [`SymmetricHashJoinExec`] builds tables on both inputs as it reads them
//!   alternately, so output starts before either input is exhausted.

use std::collections::{HashMap, VecDeque};

use quarry_common::{QuarryError, QuarryResult};
use quarry_storage::{Record, Schema};

use super::Operator;
use crate::expr::{HashKey, JoinKeys, Predicate};

type HashTable = HashMap<HashKey, Vec<Record>>;

/// Join strategy, for plan display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Nested loops over a buffered right input.
    NestedLoop,
    /// Right input hashed, left streamed.
    Hash,
    /// Both inputs hashed incrementally.
    SymmetricHash,
}

impl std::fmt::Display for JoinKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinKind::NestedLoop => write!(f, "NESTED LOOP"),
            JoinKind::Hash => write!(f, "HASH"),
            JoinKind::SymmetricHash => write!(f, "SYMMETRIC HASH"),
        }
    }
}

/// Nested-loop join.
#[derive(Debug)]
pub struct NestedLoopJoinExec {
    left: Box<Operator>,
    right: Box<Operator>,
    predicate: Predicate,
    schema: Schema,
    inner: Option<Vec<Record>>,
    outer: Option<Record>,
    cursor: usize,
}

impl NestedLoopJoinExec {
    /// Creates a nested-loop join.
    pub fn new(left: Operator, right: Operator, predicate: Predicate, schema: Schema) -> Self {
        Self {
            left: Box::new(left),
            right: Box::new(right),
            predicate,
            schema,
            inner: None,
            outer: None,
            cursor: 0,
        }
    }

    /// Inputs, left first.
    pub fn children(&self) -> [&Operator; 2] {
        [self.left.as_ref(), self.right.as_ref()]
    }

    /// Join predicate.
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Output schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the next joined record.
    ///
    /// # Errors
    ///
    /// Propagates child and evaluation errors.
    pub fn get_next(&mut self) -> QuarryResult<Option<Record>> {
        if self.inner.is_none() {
            let mut rows = Vec::new();
            while let Some(record) = self.right.get_next()? {
                rows.push(record);
            }
            self.inner = Some(rows);
        }
        loop {
            if self.outer.is_none() {
                match self.left.get_next()? {
                    Some(record) => {
                        self.outer = Some(record);
                        self.cursor = 0;
                    }
                    None => return Ok(None),
                }
            }
            let (Some(outer), Some(inner)) = (&self.outer, &self.inner) else {
                return Err(QuarryError::internal("nested-loop join lost its state"));
            };
            while let Some(candidate) = inner.get(self.cursor) {
                self.cursor += 1;
                if self.predicate.matches_join(outer, candidate)? {
                    return Ok(Some(Record::concat(outer, candidate)));
                }
            }
            self.outer = None;
        }
    }
}

/// Hash join on equality keys; the right input is the build side.
#[derive(Debug)]
pub struct HashJoinExec {
    left: Box<Operator>,
    right: Box<Operator>,
    predicate: Predicate,
    keys: JoinKeys,
    schema: Schema,
    table: Option<HashTable>,
    outer: Option<(Record, HashKey)>,
    cursor: usize,
    left_done: bool,
}

impl HashJoinExec {
    /// Creates a hash join. `predicate` must be an equi-join.
    pub fn new(left: Operator, right: Operator, predicate: Predicate, schema: Schema) -> Self {
        let keys = predicate.join_keys();
        Self {
            left: Box::new(left),
            right: Box::new(right),
            predicate,
            keys,
            schema,
            table: None,
            outer: None,
            cursor: 0,
            left_done: false,
        }
    }

    /// Inputs, left first.
    pub fn children(&self) -> [&Operator; 2] {
        [self.left.as_ref(), self.right.as_ref()]
    }

    /// Join predicate.
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Output schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the next joined record.
    ///
    /// # Errors
    ///
    /// Propagates child and evaluation errors.
    pub fn get_next(&mut self) -> QuarryResult<Option<Record>> {
        if self.table.is_none() {
            let mut table = HashTable::new();
            while let Some(record) = self.right.get_next()? {
                let key = HashKey::extract(&record, &self.keys.right)?;
                table.entry(key).or_default().push(record);
            }
            self.table = Some(table);
        }
        loop {
            if let (Some((outer, key)), Some(table)) = (&self.outer, &self.table) {
                if let Some(bucket) = table.get(key) {
                    while let Some(candidate) = bucket.get(self.cursor) {
                        self.cursor += 1;
                        if self.predicate.matches_join(outer, candidate)? {
                            return Ok(Some(Record::concat(outer, candidate)));
                        }
                    }
                }
            }
            if self.left_done {
                return Ok(None);
            }
            match self.left.get_next()? {
                Some(record) => {
                    let key = HashKey::extract(&record, &self.keys.left)?;
                    self.outer = Some((record, key));
                    self.cursor = 0;
                }
                None => {
                    self.outer = None;
                    self.left_done = true;
                    return Ok(None);
                }
            }
        }
    }
}

/// Pipelined hash join on equality keys.
///
/// Pulls alternate between the inputs, starting with the right one. Each
/// new record probes the other input's table, buffers every match, and is
/// then inserted into its own side's table. Exhaustion of each input is
/// tracked separately; the join ends when both are exhausted and the buffer
/// is empty.
#[derive(Debug)]
pub struct SymmetricHashJoinExec {
    left: Box<Operator>,
    right: Box<Operator>,
    predicate: Predicate,
    keys: JoinKeys,
    schema: Schema,
    left_table: HashTable,
    right_table: HashTable,
    buffer: VecDeque<Record>,
    left_done: bool,
    right_done: bool,
    pull_right: bool,
}

impl SymmetricHashJoinExec {
    /// Creates a symmetric hash join. `predicate` must be an equi-join.
    pub fn new(left: Operator, right: Operator, predicate: Predicate, schema: Schema) -> Self {
        let keys = predicate.join_keys();
        Self {
            left: Box::new(left),
            right: Box::new(right),
            predicate,
            keys,
            schema,
            left_table: HashTable::new(),
            right_table: HashTable::new(),
            buffer: VecDeque::new(),
            left_done: false,
            right_done: false,
            pull_right: true,
        }
    }

    /// Inputs, left first.
    pub fn children(&self) -> [&Operator; 2] {
        [self.left.as_ref(), self.right.as_ref()]
    }

    /// Join predicate.
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Output schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the next joined record.
    ///
    /// # Errors
    ///
    /// Propagates child and evaluation errors.
    pub fn get_next(&mut self) -> QuarryResult<Option<Record>> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Ok(Some(record));
            }
            if self.left_done && self.right_done {
                return Ok(None);
            }
            let from_right = !self.right_done && (self.pull_right || self.left_done);
            self.pull_right = !from_right;
            if from_right {
                self.pull_from_right()?;
            } else {
                self.pull_from_left()?;
            }
        }
    }

    fn pull_from_right(&mut self) -> QuarryResult<()> {
        let Some(record) = self.right.get_next()? else {
            self.right_done = true;
            return Ok(());
        };
        let key = HashKey::extract(&record, &self.keys.right)?;
        if let Some(matches) = self.left_table.get(&key) {
            for outer in matches {
                if self.predicate.matches_join(outer, &record)? {
                    self.buffer.push_back(Record::concat(outer, &record));
                }
            }
        }
        self.right_table.entry(key).or_default().push(record);
        Ok(())
    }

    fn pull_from_left(&mut self) -> QuarryResult<()> {
        let Some(record) = self.left.get_next()? else {
            self.left_done = true;
            return Ok(());
        };
        let key = HashKey::extract(&record, &self.keys.left)?;
        if let Some(matches) = self.right_table.get(&key) {
            for inner in matches {
                if self.predicate.matches_join(&record, inner)? {
                    self.buffer.push_back(Record::concat(&record, inner));
                }
            }
        }
        self.left_table.entry(key).or_default().push(record);
        Ok(())
    }
}
