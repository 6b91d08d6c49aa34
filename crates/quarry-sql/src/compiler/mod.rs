//! Operator-tree assembly.
//!
//! The compiler turns a [`ParsedQuery`] into a [`QueryPlan`]:
//!
//! 1. Attribute names are resolved against the tables in `FROM` and every
//!    comparison becomes either a selection on one table or a join
//!    predicate between two.
//! 2. Each table gets a scan (an index scan when an indexed integer
//!    attribute is compared to a literal) with its selections pushed
//!    directly above it, and its statistics re-estimated.
//! 3. Joins are ordered by the bitmask dynamic program in
//!    [`crate::optimizer`] and each step gets a join operator.
//! 4. Aggregation, projection, or duplicate removal is stacked on top, and
//!    the root is always a `WriteOut` sink.

mod plan;

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info};

use quarry_common::{EngineConfig, QuarryError, QuarryResult, MAX_JOIN_TABLES, SUM_COLUMN};
use quarry_storage::{Attribute, BTreeIndex, Catalog, DataType, HeapFile, Schema};

use crate::executor::{
    DuplicateRemovalExec, GroupByExec, HashJoinExec, IndexLookup, IndexScanExec, JoinKind,
    NestedLoopJoinExec, Operator, ProjectExec, ScanExec, SelectExec, SumExec,
    SymmetricHashJoinExec, WriteOutExec,
};
use crate::expr::{AggregateFunction, Predicate};
use crate::optimizer::{
    distinct_output_estimate, estimate_selection, optimize_joins, JoinGraph, TableSet,
};
use crate::parser::{CompOp, Comparison, Operand, ParsedQuery};

pub use plan::QueryPlan;

/// A base table with the selections pushed down to it.
#[derive(Debug)]
struct TableInput {
    name: String,
    schema: Schema,
    selections: Vec<Comparison>,
}

/// A comparison spanning two base tables.
#[derive(Debug)]
struct JoinPredicate {
    left: usize,
    right: usize,
    comparison: Comparison,
}

impl JoinPredicate {
    fn crosses(&self, a: TableSet, b: TableSet) -> bool {
        let (l, r): (TableSet, TableSet) = (1 << self.left, 1 << self.right);
        (a & l != 0 && b & r != 0) || (a & r != 0 && b & l != 0)
    }
}

/// Compiles parsed queries against a catalog.
#[derive(Debug, Clone, Copy)]
pub struct QueryCompiler<'a> {
    catalog: &'a Catalog,
    config: &'a EngineConfig,
}

impl<'a> QueryCompiler<'a> {
    /// Creates a compiler.
    pub fn new(catalog: &'a Catalog, config: &'a EngineConfig) -> Self {
        Self { catalog, config }
    }

    /// Builds an executable plan for `query`.
    ///
    /// Heap and index files are opened here. The output file is left alone
    /// until the plan runs.
    ///
    /// # Errors
    ///
    /// - [`QuarryError::TooManyTables`] past ten tables, and
    ///   [`QuarryError::Unsupported`] when a table is listed twice.
    /// - Resolution errors for unknown tables and attributes, or bare names
    ///   present in more than one table.
    /// - [`QuarryError::MissingJoinPredicate`] when the tables cannot be
    ///   joined without a cross product.
    /// - I/O errors opening heap or index files.
    pub fn compile(&self, query: &ParsedQuery) -> QuarryResult<QueryPlan> {
        check_tables(&query.tables)?;

        let mut inputs = query
            .tables
            .iter()
            .map(|name| {
                Ok(TableInput {
                    name: name.clone(),
                    schema: self.catalog.resolve_schema(name)?,
                    selections: Vec::new(),
                })
            })
            .collect::<QuarryResult<Vec<_>>>()?;
        let joins = classify(&query.predicate, &mut inputs)?;

        let names: Vec<String> = inputs.iter().map(|i| i.name.clone()).collect();
        let scans = inputs
            .into_iter()
            .map(|input| self.plan_table(input))
            .collect::<QuarryResult<Vec<_>>>()?;
        let (tree, join_cost) = self.plan_joins(scans, &joins, names)?;
        let tree = plan_output(tree, query)?;

        let output = self.config.output_path.clone();
        let root = Operator::WriteOut(WriteOutExec::new(tree, &output));
        info!(
            tables = query.tables.len(),
            estimated_tuples = root.schema().tuples(),
            join_cost = ?join_cost,
            "compiled query"
        );
        Ok(QueryPlan::new(root, output, join_cost))
    }

    fn plan_table(&self, input: TableInput) -> QuarryResult<Operator> {
        let mut estimated = input.schema.clone();
        for comparison in &input.selections {
            estimate_selection(&mut estimated, comparison);
        }

        let heap = HeapFile::open(
            self.catalog.resolve_data_file(&input.name)?,
            self.config.storage.page_size,
        )?;
        let scan = match self.index_lookup(&input) {
            Some((attribute, lookup)) => {
                let index = BTreeIndex::open(
                    self.catalog.index_file(&input.name, &attribute)?,
                    self.config.storage.index_page_size,
                )?;
                debug!(table = %input.name, attribute = %attribute, lookup = %lookup, "index scan");
                Operator::IndexScan(IndexScanExec::new(
                    &input.name,
                    attribute,
                    lookup,
                    index,
                    heap,
                    estimated.clone(),
                ))
            }
            None => {
                debug!(table = %input.name, "sequential scan");
                Operator::Scan(ScanExec::new(&input.name, heap, input.schema.clone()))
            }
        };

        if input.selections.is_empty() {
            return Ok(scan);
        }
        debug!(
            table = %input.name,
            before = input.schema.tuples(),
            after = estimated.tuples(),
            "estimated selection"
        );
        let predicate = Predicate::bind(&input.selections, &input.schema)?;
        Ok(Operator::Select(SelectExec::new(scan, predicate, estimated)))
    }

    /// Picks an index lookup for a table: a point lookup for `attr = int`,
    /// else, when enabled, a range for `attr < int` or `attr > int`.
    fn index_lookup(&self, input: &TableInput) -> Option<(String, IndexLookup)> {
        let normalized: Vec<Comparison> = input
            .selections
            .iter()
            .map(|c| if c.left.is_literal() { c.flipped() } else { c.clone() })
            .collect();

        for comparison in &normalized {
            if let (CompOp::Eq, Some(name), Operand::Int(key)) =
                (comparison.op, comparison.left.attribute(), &comparison.right)
            {
                if let Some(attribute) = self.indexed_attribute(input, name) {
                    return Some((attribute, IndexLookup::Point(*key)));
                }
            }
        }

        if !self.config.planner.index_range_scans {
            return None;
        }
        for comparison in &normalized {
            let (Some(name), Operand::Int(bound)) = (comparison.left.attribute(), &comparison.right)
            else {
                continue;
            };
            let range = match comparison.op {
                CompOp::Lt => bound.checked_sub(1).map(|hi| (i32::MIN, hi)),
                CompOp::Gt => bound.checked_add(1).map(|lo| (lo, i32::MAX)),
                CompOp::Eq => None,
            };
            if let (Some((lo, hi)), Some(attribute)) = (range, self.indexed_attribute(input, name)) {
                return Some((attribute, IndexLookup::Range(lo, hi)));
            }
        }
        None
    }

    /// The bare name of `name` when it is an indexed integer attribute.
    fn indexed_attribute(&self, input: &TableInput, name: &str) -> Option<String> {
        let position = input.schema.find(name).ok()??;
        let attribute = input.schema.attribute(position)?;
        (attribute.data_type == DataType::Integer
            && self.catalog.has_index(&input.name, &attribute.name))
        .then(|| attribute.name.clone())
    }

    fn plan_joins(
        &self,
        scans: Vec<Operator>,
        joins: &[JoinPredicate],
        names: Vec<String>,
    ) -> QuarryResult<(Operator, Option<u64>)> {
        let n = scans.len();
        if n == 1 {
            let scan = scans
                .into_iter()
                .next()
                .ok_or_else(|| QuarryError::internal("no table to scan"))?;
            return Ok((scan, None));
        }

        let cards = scans.iter().map(|op| op.schema().tuples()).collect();
        let mut graph = JoinGraph::new(names, cards);
        for join in joins {
            let distinct = join
                .comparison
                .attribute_names()
                .filter_map(|name| distinct_count(&scans, name))
                .min()
                .unwrap_or(0);
            graph.add_predicate(join.left, join.right, distinct);
        }
        let order = optimize_joins(&graph)?;

        let mut built: BTreeMap<TableSet, Operator> = scans
            .into_iter()
            .enumerate()
            .map(|(i, op)| (1 << i, op))
            .collect();
        for step in &order.steps {
            let (Some(left), Some(right)) = (built.remove(&step.left), built.remove(&step.right))
            else {
                return Err(QuarryError::internal(format!(
                    "join step {:#b} x {:#b} over unbuilt inputs",
                    step.left, step.right
                )));
            };
            let comparisons: Vec<Comparison> = joins
                .iter()
                .filter(|j| j.crosses(step.left, step.right))
                .map(|j| j.comparison.clone())
                .collect();
            let joined = self.plan_join(left, right, &comparisons, step.cardinality)?;
            built.insert(step.result, joined);
        }

        let full: TableSet = (1 << n) - 1;
        let root = built
            .remove(&full)
            .ok_or_else(|| QuarryError::internal("join order does not cover every table"))?;
        Ok((root, Some(order.cost)))
    }

    fn plan_join(
        &self,
        left: Operator,
        right: Operator,
        comparisons: &[Comparison],
        cardinality: u64,
    ) -> QuarryResult<Operator> {
        let predicate = Predicate::bind_join(comparisons, left.schema(), right.schema())?;
        let mut schema = Schema::join(left.schema(), right.schema());
        schema.set_tuples(cardinality);

        let planner = &self.config.planner;
        let kind = if !predicate.is_equi_join() || !planner.allow_hash_join {
            JoinKind::NestedLoop
        } else if planner.allow_symmetric_hash_join
            && left.schema().tuples() > planner.symmetric_hash_threshold
            && right.schema().tuples() > planner.symmetric_hash_threshold
        {
            JoinKind::SymmetricHash
        } else {
            JoinKind::Hash
        };
        debug!(%kind, %predicate, tuples = cardinality, "join operator chosen");

        Ok(match kind {
            JoinKind::NestedLoop => {
                Operator::NestedLoopJoin(NestedLoopJoinExec::new(left, right, predicate, schema))
            }
            JoinKind::Hash => Operator::HashJoin(HashJoinExec::new(left, right, predicate, schema)),
            JoinKind::SymmetricHash => Operator::SymmetricHashJoin(SymmetricHashJoinExec::new(
                left, right, predicate, schema,
            )),
        })
    }
}

fn check_tables(tables: &[String]) -> QuarryResult<()> {
    if tables.is_empty() {
        return Err(QuarryError::invalid_argument("query names no tables"));
    }
    if tables.len() > MAX_JOIN_TABLES {
        return Err(QuarryError::TooManyTables {
            count: tables.len(),
            max: MAX_JOIN_TABLES,
        });
    }
    let mut seen = HashSet::new();
    for table in tables {
        if !seen.insert(table.as_str()) {
            return Err(QuarryError::Unsupported {
                feature: format!("table {table} listed more than once"),
            });
        }
    }
    Ok(())
}

/// Qualifies every attribute operand and sorts comparisons into per-table
/// selections and join predicates. Comparisons between literals only are
/// attached to the first table.
fn classify(
    predicate: &[Comparison],
    inputs: &mut [TableInput],
) -> QuarryResult<Vec<JoinPredicate>> {
    let mut joins = Vec::new();
    for comparison in predicate {
        let (left, left_table) = qualify(&comparison.left, inputs)?;
        let (right, right_table) = qualify(&comparison.right, inputs)?;
        let comparison = Comparison::new(left, comparison.op, right);
        match (left_table, right_table) {
            (Some(l), Some(r)) if l != r => joins.push(JoinPredicate {
                left: l,
                right: r,
                comparison,
            }),
            (Some(t), _) | (None, Some(t)) => inputs[t].selections.push(comparison),
            (None, None) => inputs[0].selections.push(comparison),
        }
    }
    Ok(joins)
}

fn qualify(operand: &Operand, inputs: &[TableInput]) -> QuarryResult<(Operand, Option<usize>)> {
    let Some(name) = operand.attribute() else {
        return Ok((operand.clone(), None));
    };
    let mut found = None;
    for (table, input) in inputs.iter().enumerate() {
        if let Some(position) = input.schema.find(name)? {
            if found.is_some() {
                return Err(QuarryError::AmbiguousAttribute {
                    name: name.to_string(),
                });
            }
            found = Some((table, position));
        }
    }
    let (table, position) = found.ok_or_else(|| QuarryError::attribute_not_found(name))?;
    let attribute = inputs[table]
        .schema
        .attribute(position)
        .ok_or_else(|| QuarryError::attribute_not_found(name))?;
    Ok((Operand::Attribute(attribute.qualified_name()), Some(table)))
}

fn distinct_count(scans: &[Operator], name: &str) -> Option<u64> {
    scans.iter().find_map(|op| {
        let schema = op.schema();
        let position = schema.find(name).ok()??;
        schema.attribute(position).map(|a| a.distinct)
    })
}

fn resolve_all(schema: &Schema, names: &[String]) -> QuarryResult<Vec<usize>> {
    names.iter().map(|name| schema.resolve(name)).collect()
}

fn sum_attribute() -> Attribute {
    Attribute::new(SUM_COLUMN, DataType::Float).with_distinct(1)
}

fn plan_output(input: Operator, query: &ParsedQuery) -> QuarryResult<Operator> {
    if !query.grouping.is_empty() {
        let Some(aggregate) = &query.aggregate else {
            return Err(QuarryError::Unsupported {
                feature: "GROUP BY without SUM".to_string(),
            });
        };
        let positions = resolve_all(input.schema(), &query.grouping)?;
        let function = AggregateFunction::bind(aggregate, input.schema())?;
        let grouping = input.schema().project(&positions)?;
        let tuples = distinct_output_estimate(input.schema().tuples(), &grouping);
        let mut attributes = vec![sum_attribute()];
        attributes.extend(grouping.attributes().iter().cloned());
        let schema = Schema::new(attributes, tuples);
        return Ok(Operator::GroupBy(GroupByExec::new(
            input, positions, function, schema,
        )));
    }

    if let Some(aggregate) = &query.aggregate {
        let function = AggregateFunction::bind(aggregate, input.schema())?;
        let schema = Schema::new(vec![sum_attribute()], 1);
        return Ok(Operator::Sum(SumExec::new(input, function, schema)));
    }

    let mut output = input;
    if !query.projection.is_empty() {
        let positions = resolve_all(output.schema(), &query.projection)?;
        let schema = output.schema().project(&positions)?;
        output = Operator::Project(ProjectExec::new(output, positions, schema));
    }
    if query.distinct {
        let mut schema = output.schema().clone();
        let tuples = distinct_output_estimate(schema.tuples(), &schema);
        schema.set_tuples(tuples);
        output = Operator::DuplicateRemoval(DuplicateRemovalExec::new(output, schema));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::parser::ArithExpr;
    use quarry_common::PlannerConfig;
    use quarry_storage::{Record, TableStats, Value};
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        catalog: Catalog,
        config: EngineConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let config = EngineConfig::for_testing(dir.path());
            Self {
                dir,
                catalog: Catalog::in_memory(),
                config,
            }
        }

        fn table(&self, name: &str, definition: &str, rows: &[Vec<Value>]) {
            let schema = Schema::parse_definition(definition).unwrap();
            let path = self.dir.path().join(format!("{name}.heap"));
            let mut heap = HeapFile::create(&path, self.config.storage.page_size).unwrap();
            for row in rows {
                heap.append(&Record::from_values(row)).unwrap();
            }
            heap.finish().unwrap();

            let distinct = (0..schema.len())
                .map(|i| {
                    let values: HashSet<String> = rows.iter().map(|r| r[i].to_string()).collect();
                    values.len() as u64
                })
                .collect();
            self.catalog.create_table(name, schema, &path).unwrap();
            self.catalog
                .update_statistics(
                    name,
                    &TableStats {
                        tuples: rows.len() as u64,
                        distinct,
                    },
                )
                .unwrap();
        }

        /// `name(k:int, v:int)` with rows `(i, i % modulo)` for `i` in `0..n`.
        fn numbers(&self, name: &str, n: i32, modulo: i32) {
            let rows: Vec<Vec<Value>> = (0..n)
                .map(|i| vec![Value::Int(i), Value::Int(i % modulo)])
                .collect();
            self.table(name, "k:int, v:int", &rows);
        }

        fn index(&self, table: &str, attribute: &str) {
            let path = self.dir.path().join(format!("{table}.{attribute}.idx"));
            BTreeIndex::build(&self.catalog, table, attribute, path, &self.config.storage)
                .unwrap();
        }

        fn compile(&self, query: &ParsedQuery) -> QuarryResult<QueryPlan> {
            QueryCompiler::new(&self.catalog, &self.config).compile(query)
        }
    }

    fn eq_int(attribute: &str, value: i32) -> Comparison {
        Comparison::new(
            Operand::Attribute(attribute.into()),
            CompOp::Eq,
            Operand::Int(value),
        )
    }

    #[test]
    fn test_selection_pushdown() {
        let fx = Fixture::new();
        fx.numbers("T", 30, 3);
        let query = ParsedQuery::new(["T"])
            .with_comparison(eq_int("v", 1))
            .with_projection(&["k"]);

        let mut plan = fx.compile(&query).unwrap();
        let explain = plan.to_string();
        let lines: Vec<&str> = explain.lines().collect();
        assert!(lines[0].starts_with("OUTPUT"));
        assert!(lines[1].contains("PROJECT T.k"));
        assert!(lines[2].contains("SELECT T.v = 1 [2 attributes, ~10 tuples]"));
        assert!(lines[3].contains("SCAN T [2 attributes, ~30 tuples]"));
        assert_eq!(plan.join_cost(), None);

        assert_eq!(plan.execute().unwrap(), 10);
        let written = std::fs::read_to_string(plan.output()).unwrap();
        assert!(written.starts_with("1\n4\n7\n"));
        assert!(written.ends_with("28\n\n"));
    }

    #[test]
    fn test_point_index_scan() {
        let fx = Fixture::new();
        fx.numbers("T", 40, 4);
        fx.index("T", "k");

        for comparison in [eq_int("k", 7), eq_int("k", 7).flipped()] {
            let mut plan = fx.compile(&ParsedQuery::new(["T"]).with_comparison(comparison)).unwrap();
            assert!(plan.to_string().contains("INDEX SCAN T ON k = 7"));
            assert_eq!(plan.execute().unwrap(), 1);
        }

        // Not indexed: sequential scan.
        let plan = fx.compile(&ParsedQuery::new(["T"]).with_comparison(eq_int("v", 1))).unwrap();
        assert!(!plan.to_string().contains("INDEX SCAN"));
    }

    #[test]
    fn test_range_scan_requires_config() {
        let mut fx = Fixture::new();
        fx.numbers("T", 30, 3);
        fx.index("T", "k");
        let query = ParsedQuery::new(["T"]).with_comparison(Comparison::new(
            Operand::Attribute("k".into()),
            CompOp::Gt,
            Operand::Int(25),
        ));

        let mut plan = fx.compile(&query).unwrap();
        assert!(!plan.to_string().contains("INDEX SCAN"));
        assert_eq!(plan.execute().unwrap(), 4);

        fx.config.planner.index_range_scans = true;
        let mut plan = fx.compile(&query).unwrap();
        assert!(plan
            .to_string()
            .contains("INDEX SCAN T ON k in [26, 2147483647]"));
        assert_eq!(plan.execute().unwrap(), 4);
    }

    #[test]
    fn test_join_operator_choice() {
        let mut fx = Fixture::new();
        fx.numbers("L", 20, 5);
        fx.numbers("R", 10, 2);
        let equi = ParsedQuery::new(["L", "R"]).with_comparison(Comparison::attributes(
            "L.k",
            CompOp::Eq,
            "R.k",
        ));
        let theta = ParsedQuery::new(["L", "R"]).with_comparison(Comparison::attributes(
            "L.k",
            CompOp::Lt,
            "R.v",
        ));

        let mut plan = fx.compile(&equi).unwrap();
        assert!(plan.to_string().contains("JOIN NESTED LOOP ON"));
        assert!(plan.join_cost().is_some());
        assert_eq!(plan.execute().unwrap(), 10);

        fx.config.planner = PlannerConfig::with_hash_joins();
        let mut plan = fx.compile(&equi).unwrap();
        assert!(plan.to_string().contains("JOIN HASH ON"));
        assert_eq!(plan.execute().unwrap(), 10);

        let mut plan = fx.compile(&theta).unwrap();
        assert!(plan.to_string().contains("JOIN NESTED LOOP ON"));
        // R.v is 0 or 1, so only L.k = 0 qualifies, against the five R.v = 1.
        assert_eq!(plan.execute().unwrap(), 5);

        fx.config.planner.allow_symmetric_hash_join = true;
        fx.config.planner.symmetric_hash_threshold = 5;
        let mut plan = fx.compile(&equi).unwrap();
        assert!(plan.to_string().contains("JOIN SYMMETRIC HASH ON"));
        assert_eq!(plan.execute().unwrap(), 10);

        fx.config.planner.symmetric_hash_threshold = 15;
        let plan = fx.compile(&equi).unwrap();
        assert!(plan.to_string().contains("JOIN HASH ON"));
    }

    #[test]
    fn test_three_way_join() {
        let mut fx = Fixture::new();
        fx.config.planner = PlannerConfig::with_hash_joins();
        fx.numbers("A", 50, 10);
        fx.numbers("B", 20, 4);
        fx.numbers("C", 8, 2);
        let query = ParsedQuery::new(["A", "B", "C"])
            .with_comparison(Comparison::attributes("A.k", CompOp::Eq, "B.k"))
            .with_comparison(Comparison::attributes("B.k", CompOp::Eq, "C.k"))
            .with_projection(&["A.k", "C.v"]);

        let mut plan = fx.compile(&query).unwrap();
        let explain = plan.to_string();
        assert_eq!(explain.matches("JOIN HASH").count(), 2);
        assert_eq!(explain.matches("SCAN").count(), 3);
        assert_eq!(plan.execute().unwrap(), 8);
    }

    #[test]
    fn test_disconnected_join_graph() {
        let fx = Fixture::new();
        fx.numbers("A", 5, 2);
        fx.numbers("B", 5, 2);
        fx.numbers("C", 5, 2);
        let query = ParsedQuery::new(["A", "B", "C"])
            .with_comparison(Comparison::attributes("A.k", CompOp::Eq, "B.k"));
        match fx.compile(&query) {
            Err(QuarryError::MissingJoinPredicate { tables }) => assert_eq!(tables.len(), 3),
            other => panic!("expected a missing join predicate, got {other:?}"),
        }

        let cross = ParsedQuery::new(["A", "B"]);
        assert!(matches!(
            fx.compile(&cross),
            Err(QuarryError::MissingJoinPredicate { .. })
        ));
    }

    #[test]
    fn test_resolution_errors() {
        let fx = Fixture::new();
        fx.numbers("L", 5, 2);
        fx.numbers("R", 5, 2);

        assert!(matches!(
            fx.compile(&ParsedQuery::new(["missing"])),
            Err(QuarryError::TableNotFound { .. })
        ));
        assert!(matches!(
            fx.compile(&ParsedQuery::new(["L"]).with_comparison(eq_int("nope", 1))),
            Err(QuarryError::AttributeNotFound { .. })
        ));
        assert!(matches!(
            fx.compile(&ParsedQuery::new(["L", "R"]).with_comparison(eq_int("k", 1))),
            Err(QuarryError::AmbiguousAttribute { .. })
        ));
        assert!(matches!(
            fx.compile(&ParsedQuery::new(["L", "L"])),
            Err(QuarryError::Unsupported { .. })
        ));
        let many: Vec<String> = (0..11).map(|i| format!("T{i}")).collect();
        assert!(matches!(
            fx.compile(&ParsedQuery::new(many)),
            Err(QuarryError::TooManyTables { count: 11, max: 10 })
        ));
        assert!(fx.compile(&ParsedQuery::default()).is_err());
    }

    #[test]
    fn test_aggregate_stages() {
        let fx = Fixture::new();
        fx.numbers("T", 12, 3);

        let sum = ParsedQuery::new(["T"]).with_aggregate(ArithExpr::Attribute("k".into()));
        let mut plan = fx.compile(&sum).unwrap();
        assert!(plan.to_string().contains("SUM k [1 attributes, ~1 tuples]"));
        assert_eq!(plan.execute().unwrap(), 1);
        assert_eq!(std::fs::read_to_string(plan.output()).unwrap(), "66.00\n\n");

        let grouped = sum.clone().with_grouping(&["v"]);
        let mut plan = fx.compile(&grouped).unwrap();
        let schema = plan.root().schema().clone();
        assert_eq!(schema.attribute(0).unwrap().name, SUM_COLUMN);
        assert_eq!(schema.attribute(1).unwrap().qualified_name(), "T.v");
        assert_eq!(schema.tuples(), 3);
        assert!(plan.to_string().contains("GROUP BY T.v"));
        assert_eq!(plan.execute().unwrap(), 3);

        let distinct = ParsedQuery::new(["T"]).with_projection(&["v"]).with_distinct();
        let mut plan = fx.compile(&distinct).unwrap();
        assert!(plan.to_string().contains("DISTINCT [1 attributes, ~3 tuples]"));
        assert_eq!(plan.execute().unwrap(), 3);
    }
}
