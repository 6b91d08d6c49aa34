//! Pull-based physical operators.
//!
//! An operator tree is a closed [`Operator`] enum whose variants own their
//! inputs as `Box<Operator>`. Consumers pull one record at a time with
//! [`Operator::get_next`]; `Ok(None)` means exhausted. Dropping a parent
//! drops its subtree, including open heap and index files.

mod join;
mod relational;
mod scan;

use std::fmt;

use quarry_common::QuarryResult;
use quarry_storage::{Record, Schema};

pub use join::{HashJoinExec, JoinKind, NestedLoopJoinExec, SymmetricHashJoinExec};
pub use relational::{
    DuplicateRemovalExec, GroupByExec, ProjectExec, SelectExec, SumExec, WriteOutExec,
};
pub use scan::{IndexLookup, IndexScanExec, ScanExec};

/// A physical operator.
#[derive(Debug)]
pub enum Operator {
    /// Heap-file scan.
    Scan(ScanExec),
    /// B+-tree lookup.
    IndexScan(IndexScanExec),
    /// Filter.
    Select(SelectExec),
    /// Attribute subset.
    Project(ProjectExec),
    /// Nested-loop join.
    NestedLoopJoin(NestedLoopJoinExec),
    /// Hash join.
    HashJoin(HashJoinExec),
    /// Pipelined hash join.
    SymmetricHashJoin(SymmetricHashJoinExec),
    /// `DISTINCT`.
    DuplicateRemoval(DuplicateRemovalExec),
    /// `SUM` without grouping.
    Sum(SumExec),
    /// `SUM` with grouping.
    GroupBy(GroupByExec),
    /// Output sink.
    WriteOut(WriteOutExec),
}

impl Operator {
    /// Pulls the next record.
    ///
    /// # Errors
    ///
    /// Propagates I/O, decoding, and evaluation errors from the subtree.
    pub fn get_next(&mut self) -> QuarryResult<Option<Record>> {
        match self {
            Operator::Scan(op) => op.get_next(),
            Operator::IndexScan(op) => op.get_next(),
            Operator::Select(op) => op.get_next(),
            Operator::Project(op) => op.get_next(),
            Operator::NestedLoopJoin(op) => op.get_next(),
            Operator::HashJoin(op) => op.get_next(),
            Operator::SymmetricHashJoin(op) => op.get_next(),
            Operator::DuplicateRemoval(op) => op.get_next(),
            Operator::Sum(op) => op.get_next(),
            Operator::GroupBy(op) => op.get_next(),
            Operator::WriteOut(op) => op.get_next(),
        }
    }

    /// Output schema, carrying the estimated tuple count.
    pub fn schema(&self) -> &Schema {
        match self {
            Operator::Scan(op) => op.schema(),
            Operator::IndexScan(op) => op.schema(),
            Operator::Select(op) => op.schema(),
            Operator::Project(op) => op.schema(),
            Operator::NestedLoopJoin(op) => op.schema(),
            Operator::HashJoin(op) => op.schema(),
            Operator::SymmetricHashJoin(op) => op.schema(),
            Operator::DuplicateRemoval(op) => op.schema(),
            Operator::Sum(op) => op.schema(),
            Operator::GroupBy(op) => op.schema(),
            Operator::WriteOut(op) => op.schema(),
        }
    }

    /// Direct inputs, left first.
    pub fn children(&self) -> Vec<&Operator> {
        match self {
            Operator::Scan(_) | Operator::IndexScan(_) => Vec::new(),
            Operator::Select(op) => vec![op.child()],
            Operator::Project(op) => vec![op.child()],
            Operator::DuplicateRemoval(op) => vec![op.child()],
            Operator::Sum(op) => vec![op.child()],
            Operator::GroupBy(op) => vec![op.child()],
            Operator::WriteOut(op) => vec![op.child()],
            Operator::NestedLoopJoin(op) => op.children().to_vec(),
            Operator::HashJoin(op) => op.children().to_vec(),
            Operator::SymmetricHashJoin(op) => op.children().to_vec(),
        }
    }

    /// One-line description, without statistics.
    pub fn label(&self) -> String {
        let names = |schema: &Schema| {
            schema
                .attributes()
                .iter()
                .map(|a| a.qualified_name())
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self {
            Operator::Scan(op) => format!("SCAN {}", op.table()),
            Operator::IndexScan(op) => format!(
                "INDEX SCAN {} ON {} {}",
                op.table(),
                op.attribute(),
                op.lookup()
            ),
            Operator::Select(op) => format!("SELECT {}", op.predicate()),
            Operator::Project(op) => format!("PROJECT {}", names(op.schema())),
            Operator::NestedLoopJoin(op) => {
                format!("JOIN {} ON {}", JoinKind::NestedLoop, op.predicate())
            }
            Operator::HashJoin(op) => format!("JOIN {} ON {}", JoinKind::Hash, op.predicate()),
            Operator::SymmetricHashJoin(op) => {
                format!("JOIN {} ON {}", JoinKind::SymmetricHash, op.predicate())
            }
            Operator::DuplicateRemoval(_) => "DISTINCT".to_string(),
            Operator::Sum(op) => format!("SUM {}", op.function()),
            Operator::GroupBy(op) => {
                let grouping = op.schema().project(&(1..op.schema().len()).collect::<Vec<_>>());
                let grouping = grouping.map(|s| names(&s)).unwrap_or_default();
                format!("GROUP BY {grouping} SUM {}", op.function())
            }
            Operator::WriteOut(op) => format!("OUTPUT {}", op.path().display()),
        }
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        if depth > 0 {
            write!(f, "{}└────> ", "       ".repeat(depth - 1))?;
        }
        let schema = self.schema();
        writeln!(
            f,
            "{} [{} attributes, ~{} tuples]",
            self.label(),
            schema.len(),
            schema.tuples()
        )?;
        for child in self.children() {
            child.fmt_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::expr::{AggregateFunction, Predicate};
    use crate::parser::{ArithExpr, CompOp, Comparison, Operand};
    use quarry_storage::{Attribute, DataType, HeapFile, Value};

    fn table(dir: &Path, name: &str, definition: &str, rows: &[Vec<Value>]) -> Operator {
        let schema = Schema::parse_definition(definition)
            .unwrap()
            .qualified(name);
        let mut heap = HeapFile::create(dir.join(format!("{name}.heap")), 1024).unwrap();
        for row in rows {
            heap.append(&Record::from_values(row)).unwrap();
        }
        heap.finish().unwrap();
        Operator::Scan(ScanExec::new(name, heap, schema))
    }

    fn ints(dir: &Path, name: &str, keys: &[i32]) -> Operator {
        let rows: Vec<Vec<Value>> = keys.iter().map(|&k| vec![Value::Int(k)]).collect();
        table(dir, name, "k:int", &rows)
    }

    fn drain(mut op: Operator) -> Vec<Vec<String>> {
        let schema = op.schema().clone();
        let mut out = Vec::new();
        while let Some(record) = op.get_next().unwrap() {
            out.push(
                record
                    .values(&schema)
                    .unwrap()
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            );
        }
        assert!(op.get_next().unwrap().is_none());
        out.sort();
        out
    }

    fn join(kind: JoinKind, left: Operator, right: Operator, on: &[Comparison]) -> Operator {
        let predicate = Predicate::bind_join(on, left.schema(), right.schema()).unwrap();
        let schema = Schema::join(left.schema(), right.schema());
        match kind {
            JoinKind::NestedLoop => {
                Operator::NestedLoopJoin(NestedLoopJoinExec::new(left, right, predicate, schema))
            }
            JoinKind::Hash => Operator::HashJoin(HashJoinExec::new(left, right, predicate, schema)),
            JoinKind::SymmetricHash => Operator::SymmetricHashJoin(SymmetricHashJoinExec::new(
                left, right, predicate, schema,
            )),
        }
    }

    fn on_k() -> Vec<Comparison> {
        vec![Comparison::attributes("L.k", CompOp::Eq, "R.k")]
    }

    #[test]
    fn test_hash_join_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let expected = vec![
            vec!["2".to_string(), "2".to_string()],
            vec!["3".to_string(), "3".to_string()],
        ];

        let l = ints(dir.path(), "L", &[1, 2, 3]);
        let r = ints(dir.path(), "R", &[2, 3, 4]);
        assert_eq!(drain(join(JoinKind::Hash, l, r, &on_k())), expected);

        let l = ints(dir.path(), "L", &[3, 1, 2]);
        let r = ints(dir.path(), "R", &[4, 3, 2]);
        assert_eq!(drain(join(JoinKind::Hash, l, r, &on_k())), expected);
    }

    #[test]
    fn test_join_strategies_agree() {
        let dir = tempfile::tempdir().unwrap();
        let left_keys = [5, 1, 2, 2, 3, 9, 2, 7, 7];
        let right_rows: Vec<Vec<Value>> = [2.0, 7.0, 2.0, 4.0, 1.0, 7.0, 11.0]
            .iter()
            .enumerate()
            .map(|(i, &k)| vec![Value::Float(k), Value::Int(i32::try_from(i).unwrap())])
            .collect();

        let mut results = Vec::new();
        for kind in [JoinKind::NestedLoop, JoinKind::Hash, JoinKind::SymmetricHash] {
            let l = ints(dir.path(), "L", &left_keys);
            let r = table(dir.path(), "R", "k:float, id:int", &right_rows);
            results.push(drain(join(kind, l, r, &on_k())));
        }
        assert_eq!(results[0].len(), 3 * 2 + 1 + 2 * 2);
        assert_eq!(results[0], results[1]);
        assert_eq!(results[1], results[2]);
    }

    #[test]
    fn test_joins_with_empty_inputs() {
        let dir = tempfile::tempdir().unwrap();
        for kind in [JoinKind::NestedLoop, JoinKind::Hash, JoinKind::SymmetricHash] {
            let l = ints(dir.path(), "L", &[]);
            let r = ints(dir.path(), "R", &[1, 2]);
            assert!(drain(join(kind, l, r, &on_k())).is_empty());

            let l = ints(dir.path(), "L", &[1, 2]);
            let r = ints(dir.path(), "R", &[]);
            assert!(drain(join(kind, l, r, &on_k())).is_empty());
        }
    }

    /// Scan of `R` whose first page is intact and whose last page claims
    /// more records than it holds.
    fn truncated_right(dir: &Path) -> Operator {
        use std::io::Write;

        let path = dir.join("R.heap");
        if !path.exists() {
            ints(dir, "R", &[2, 3, 4]);
            let mut bad = vec![0u8; 1024];
            bad[..4].copy_from_slice(&u32::MAX.to_le_bytes());
            let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&bad).unwrap();
        }
        let heap = HeapFile::open(&path, 1024).unwrap();
        assert_eq!(heap.page_count(), 2);
        let schema = Schema::parse_definition("k:int").unwrap().qualified("R");
        Operator::Scan(ScanExec::new("R", heap, schema))
    }

    #[test]
    fn test_symmetric_join_emits_before_inputs_end() {
        let dir = tempfile::tempdir().unwrap();

        let l = ints(dir.path(), "L", &[2, 3]);
        let mut symmetric = join(JoinKind::SymmetricHash, l, truncated_right(dir.path()), &on_k());
        let first = symmetric.get_next().unwrap().unwrap();
        let values = first.values(symmetric.schema()).unwrap();
        assert_eq!(values, vec![Value::Int(2), Value::Int(2)]);
        assert!(symmetric.get_next().unwrap().is_some());
        assert!(symmetric.get_next().is_err());

        let l = ints(dir.path(), "L", &[2, 3]);
        let mut hash = join(JoinKind::Hash, l, truncated_right(dir.path()), &on_k());
        assert!(hash.get_next().is_err());
    }

    #[test]
    fn test_nested_loop_theta_join() {
        let dir = tempfile::tempdir().unwrap();
        let l = ints(dir.path(), "L", &[1, 2, 3]);
        let r = ints(dir.path(), "R", &[2, 3]);
        let on = [Comparison::attributes("L.k", CompOp::Lt, "R.k")];
        let rows = drain(join(JoinKind::NestedLoop, l, r, &on));
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_selection_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cmp = [Comparison::new(
            Operand::Attribute("T.k".into()),
            CompOp::Gt,
            Operand::Int(2),
        )];
        let keys = [1, 5, 2, 8, 3, 3];

        let select = |child: Operator| {
            let predicate = Predicate::bind(&cmp, child.schema()).unwrap();
            let schema = child.schema().clone();
            Operator::Select(SelectExec::new(child, predicate, schema))
        };
        let once = drain(select(ints(dir.path(), "T", &keys)));
        let twice = drain(select(select(ints(dir.path(), "T", &keys))));
        assert_eq!(once.len(), 4);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_projection_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![
            vec![Value::Int(1), Value::Str("a".into()), Value::Float(0.5)],
            vec![Value::Int(2), Value::Str("b".into()), Value::Float(1.5)],
        ];
        let project = |child: Operator, positions: Vec<usize>| {
            let schema = child.schema().project(&positions).unwrap();
            Operator::Project(ProjectExec::new(child, positions, schema))
        };

        let scan = table(dir.path(), "T", "x:int, s:string, f:float", &rows);
        let once = project(scan, vec![2, 0]);
        assert_eq!(once.schema().attribute(0).unwrap().name, "f");
        let once = drain(once);

        let scan = table(dir.path(), "T", "x:int, s:string, f:float", &rows);
        let twice = drain(project(project(scan, vec![2, 0]), vec![0, 1]));
        assert_eq!(once, twice);
        assert_eq!(once[0], vec!["0.50".to_string(), "1".to_string()]);
    }

    #[test]
    fn test_duplicate_removal() {
        let dir = tempfile::tempdir().unwrap();
        let scan = ints(dir.path(), "T", &[4, 1, 4, 4, 2, 1]);
        let schema = scan.schema().clone();
        let rows = drain(Operator::DuplicateRemoval(DuplicateRemovalExec::new(scan, schema)));
        assert_eq!(rows, vec![vec!["1"], vec!["2"], vec!["4"]]);
    }

    fn sum_schema() -> Schema {
        Schema::new(vec![Attribute::new("sum", DataType::Float)], 1)
    }

    #[test]
    fn test_sum() {
        let dir = tempfile::tempdir().unwrap();
        let scan = ints(dir.path(), "T", &[1, 2, 3, 4]);
        let f = AggregateFunction::bind(&ArithExpr::Attribute("k".into()), scan.schema()).unwrap();
        let rows = drain(Operator::Sum(SumExec::new(scan, f, sum_schema())));
        assert_eq!(rows, vec![vec!["10.00"]]);

        let scan = ints(dir.path(), "T", &[]);
        let f = AggregateFunction::bind(&ArithExpr::Int(1), scan.schema()).unwrap();
        let rows = drain(Operator::Sum(SumExec::new(scan, f, sum_schema())));
        assert_eq!(rows, vec![vec!["0.00"]]);
    }

    #[test]
    fn test_group_by() {
        let dir = tempfile::tempdir().unwrap();
        let rows: Vec<Vec<Value>> = [(1, "x"), (2, "y"), (3, "x"), (4, "x")]
            .iter()
            .map(|&(v, g)| vec![Value::Int(v), Value::Str(g.into())])
            .collect();
        let scan = table(dir.path(), "T", "v:int, g:string", &rows);
        let f = AggregateFunction::bind(&ArithExpr::Attribute("v".into()), scan.schema()).unwrap();
        let mut attrs = sum_schema().attributes().to_vec();
        attrs.push(scan.schema().attribute(1).unwrap().clone());
        let schema = Schema::new(attrs, 2);

        let rows = drain(Operator::GroupBy(GroupByExec::new(scan, vec![1], f, schema)));
        assert_eq!(
            rows,
            vec![
                vec!["2.00".to_string(), "y".to_string()],
                vec!["8.00".to_string(), "x".to_string()],
            ]
        );
    }

    #[test]
    fn test_write_out_and_explain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("result.txt");
        let scan = table(
            dir.path(),
            "T",
            "a:int, b:float",
            &[
                vec![Value::Int(1), Value::Float(2.5)],
                vec![Value::Int(3), Value::Float(4.0)],
            ],
        );
        let mut root = Operator::WriteOut(WriteOutExec::new(scan, &path));

        let explain = root.to_string();
        assert!(explain.starts_with("OUTPUT "));
        assert!(explain.contains("└────> SCAN T [2 attributes"));
        assert!(!path.exists());

        let mut count = 0;
        while root.get_next().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
        drop(root);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1|2.50\n3|4.00\n\n");
    }
}
