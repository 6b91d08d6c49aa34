//! Bitmask dynamic-programming join ordering.
//!
//! Table `i` is bit `1 << i` of a [`TableSet`]. Every connected subset is
//! solved once, from its already-solved sub-subsets, so the result is the
//! cheapest bushy join tree that never forms a cross product.

use tracing::debug;

use quarry_common::{QuarryError, QuarryResult, MAX_JOIN_TABLES};

/// A set of tables as a bitmask.
pub type TableSet = u32;

/// Tables, their estimated cardinalities, and join-predicate weights.
#[derive(Debug, Clone)]
pub struct JoinGraph {
    names: Vec<String>,
    cards: Vec<u64>,
    adjacency: Vec<Vec<u64>>,
}

impl JoinGraph {
    /// Creates a graph without edges.
    pub fn new(names: Vec<String>, cards: Vec<u64>) -> Self {
        let n = names.len();
        Self {
            names,
            cards,
            adjacency: vec![vec![0; n]; n],
        }
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true for a graph without tables.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Records a join predicate between tables `i` and `j` whose joining
    /// attributes have `distinct` values. A pair keeps the smallest weight
    /// over all its predicates, and weights are at least 1.
    pub fn add_predicate(&mut self, i: usize, j: usize, distinct: u64) {
        if i == j || i >= self.len() || j >= self.len() {
            return;
        }
        let weight = distinct.max(1);
        let current = self.adjacency[i][j];
        let merged = if current == 0 { weight } else { current.min(weight) };
        self.adjacency[i][j] = merged;
        self.adjacency[j][i] = merged;
    }

    /// Weight of the edge between `i` and `j`; 0 when there is none.
    pub fn weight(&self, i: usize, j: usize) -> u64 {
        self.adjacency
            .get(i)
            .and_then(|row| row.get(j))
            .copied()
            .unwrap_or(0)
    }

    /// Returns true when some table of `a` has a predicate with some table
    /// of `b`.
    pub fn connected(&self, a: TableSet, b: TableSet) -> bool {
        members(a).any(|i| members(b).any(|j| self.adjacency[i][j] > 0))
    }

    /// Estimated cardinality of joining every table in `set`.
    ///
    /// The smallest cardinality in the set (first table reaching it is the
    /// anchor) times the largest adjacency-row weight among the other
    /// tables of the set.
    pub fn cardinality(&self, set: TableSet) -> u64 {
        let Some((anchor, min_card)) = members(set)
            .map(|i| (i, self.cards[i]))
            .min_by_key(|&(_, card)| card)
        else {
            return 0;
        };
        let weight = members(set)
            .filter(|&j| j != anchor)
            .map(|j| self.adjacency[j].iter().copied().max().unwrap_or(0))
            .max()
            .unwrap_or(0)
            .max(1);
        min_card.saturating_mul(weight)
    }

    /// Names of the tables in `set`.
    pub fn names(&self, set: TableSet) -> Vec<String> {
        members(set).map(|i| self.names[i].clone()).collect()
    }
}

fn members(set: TableSet) -> impl Iterator<Item = usize> + Clone {
    (0..TableSet::BITS as usize).filter(move |i| set & (1 << i) != 0)
}

/// One pairwise join of two disjoint, already-built inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinStep {
    /// Outer input.
    pub left: TableSet,
    /// Inner input.
    pub right: TableSet,
    /// `left | right`.
    pub result: TableSet,
    /// Estimated output cardinality.
    pub cardinality: u64,
}

/// Join steps in post-order (inputs before the joins that consume them).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOrder {
    /// Steps; the last one produces the full table set.
    pub steps: Vec<JoinStep>,
    /// Total estimated cost.
    pub cost: u64,
}

#[derive(Debug, Clone, Copy)]
struct Best {
    cost: u64,
    split: Option<(TableSet, TableSet)>,
}

/// Finds the cheapest connected join tree.
///
/// The cost of a single table is its cardinality; the cost of a join is the
/// cost of both inputs plus the estimated cardinality of the result. Splits
/// are tried in increasing numeric order of the left sub-mask and only a
/// strictly cheaper split replaces the current one.
///
/// # Errors
///
/// Returns [`QuarryError::TooManyTables`] past the table limit and
/// [`QuarryError::MissingJoinPredicate`] when the graph is disconnected.
pub fn optimize_joins(graph: &JoinGraph) -> QuarryResult<JoinOrder> {
    let n = graph.len();
    if n == 0 {
        return Err(QuarryError::invalid_argument("no tables to join"));
    }
    if n > MAX_JOIN_TABLES {
        return Err(QuarryError::TooManyTables {
            count: n,
            max: MAX_JOIN_TABLES,
        });
    }

    let full: TableSet = (1 << n) - 1;
    let mut best: Vec<Option<Best>> = vec![None; 1 << n];
    for i in 0..n {
        best[1 << i] = Some(Best {
            cost: graph.cards[i],
            split: None,
        });
    }

    for set in 1..=full {
        if set.count_ones() < 2 {
            continue;
        }
        let card = graph.cardinality(set);
        for left in 1..set {
            if left & !set != 0 {
                continue;
            }
            let right = set ^ left;
            let (Some(l), Some(r)) = (best[left as usize], best[right as usize]) else {
                continue;
            };
            if !graph.connected(left, right) {
                continue;
            }
            let cost = l.cost.saturating_add(r.cost).saturating_add(card);
            if best[set as usize].map_or(true, |b| cost < b.cost) {
                best[set as usize] = Some(Best {
                    cost,
                    split: Some((left, right)),
                });
            }
        }
    }

    let Some(root) = best[full as usize] else {
        return Err(QuarryError::MissingJoinPredicate {
            tables: graph.names(full),
        });
    };
    let mut steps = Vec::with_capacity(n - 1);
    collect_steps(graph, &best, full, &mut steps);
    debug!(tables = n, cost = root.cost, steps = steps.len(), "join order chosen");
    Ok(JoinOrder {
        steps,
        cost: root.cost,
    })
}

fn collect_steps(graph: &JoinGraph, best: &[Option<Best>], set: TableSet, out: &mut Vec<JoinStep>) {
    let Some(Best {
        split: Some((left, right)),
        ..
    }) = best[set as usize]
    else {
        return;
    };
    collect_steps(graph, best, left, out);
    collect_steps(graph, best, right, out);
    out.push(JoinStep {
        left,
        right,
        result: set,
        cardinality: graph.cardinality(set),
    });
}
