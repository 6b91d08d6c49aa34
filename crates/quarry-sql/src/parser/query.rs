//! Parsed query representation.
//!
//! This is the compiler's input. It can be produced by [`super::Parser`] or
//! deserialized from JSON.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Comparison operators allowed in predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompOp {
    /// `=`
    Eq,
    /// `<`
    Lt,
    /// `>`
    Gt,
}

impl CompOp {
    /// The operator that gives the same result with its operands swapped.
    pub fn flip(self) -> Self {
        match self {
            CompOp::Eq => CompOp::Eq,
            CompOp::Lt => CompOp::Gt,
            CompOp::Gt => CompOp::Lt,
        }
    }
}

impl fmt::Display for CompOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompOp::Eq => write!(f, "="),
            CompOp::Lt => write!(f, "<"),
            CompOp::Gt => write!(f, ">"),
        }
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// Attribute reference, bare (`a`) or qualified (`T.a`).
    Attribute(String),
    /// Integer literal.
    Int(i32),
    /// Float literal.
    Float(f64),
    /// String literal.
    Str(String),
}

impl Operand {
    /// Attribute name, if this operand is an attribute.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            Operand::Attribute(name) => Some(name),
            _ => None,
        }
    }

    /// Returns true for literals.
    pub fn is_literal(&self) -> bool {
        !matches!(self, Operand::Attribute(_))
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Attribute(name) => write!(f, "{name}"),
            Operand::Int(v) => write!(f, "{v}"),
            Operand::Float(v) => write!(f, "{v}"),
            Operand::Str(s) => write!(f, "'{s}'"),
        }
    }
}

/// `left op right`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Left operand.
    pub left: Operand,
    /// Operator.
    pub op: CompOp,
    /// Right operand.
    pub right: Operand,
}

impl Comparison {
    /// Creates a comparison.
    pub fn new(left: Operand, op: CompOp, right: Operand) -> Self {
        Self { left, op, right }
    }

    /// Shorthand for `attribute op attribute`.
    pub fn attributes(left: &str, op: CompOp, right: &str) -> Self {
        Self::new(
            Operand::Attribute(left.to_string()),
            op,
            Operand::Attribute(right.to_string()),
        )
    }

    /// The same comparison with its operands swapped.
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self::new(self.right.clone(), self.op.flip(), self.left.clone())
    }

    /// Attribute names referenced by this comparison.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.left.attribute().into_iter().chain(self.right.attribute())
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.op, self.right)
    }
}

/// Arithmetic operators in aggregate expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArithOp::Add => write!(f, "+"),
            ArithOp::Sub => write!(f, "-"),
            ArithOp::Mul => write!(f, "*"),
            ArithOp::Div => write!(f, "/"),
        }
    }
}

/// Arithmetic expression summed by `SUM(...)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArithExpr {
    /// Attribute reference.
    Attribute(String),
    /// Integer literal.
    Int(i32),
    /// Float literal.
    Float(f64),
    /// Binary operation.
    Binary {
        /// Operator.
        op: ArithOp,
        /// Left operand.
        left: Box<ArithExpr>,
        /// Right operand.
        right: Box<ArithExpr>,
    },
}

impl ArithExpr {
    /// Creates a binary expression.
    pub fn binary(op: ArithOp, left: ArithExpr, right: ArithExpr) -> Self {
        ArithExpr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

impl fmt::Display for ArithExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArithExpr::Attribute(name) => write!(f, "{name}"),
            ArithExpr::Int(v) => write!(f, "{v}"),
            ArithExpr::Float(v) => write!(f, "{v}"),
            ArithExpr::Binary { op, left, right } => write!(f, "({left} {op} {right})"),
        }
    }
}

/// A single-block query: tables, a conjunctive predicate, and one of
/// projection, `SUM`, or `SUM ... GROUP BY`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsedQuery {
    /// Tables in `FROM` order.
    pub tables: Vec<String>,
    /// Conjunction of comparisons.
    pub predicate: Vec<Comparison>,
    /// Projected attributes; empty means every attribute.
    pub projection: Vec<String>,
    /// Grouping attributes.
    pub grouping: Vec<String>,
    /// Summed expression.
    pub aggregate: Option<ArithExpr>,
    /// `SELECT DISTINCT`.
    pub distinct: bool,
}

impl ParsedQuery {
    /// Creates a query over `tables` with no predicate or output clauses.
    pub fn new(tables: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            tables: tables.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Adds a comparison to the predicate.
    #[must_use]
    pub fn with_comparison(mut self, comparison: Comparison) -> Self {
        self.predicate.push(comparison);
        self
    }

    /// Sets the projection.
    #[must_use]
    pub fn with_projection(mut self, attributes: &[&str]) -> Self {
        self.projection = attributes.iter().map(|a| (*a).to_string()).collect();
        self
    }

    /// Sets the summed expression.
    #[must_use]
    pub fn with_aggregate(mut self, aggregate: ArithExpr) -> Self {
        self.aggregate = Some(aggregate);
        self
    }

    /// Sets the grouping attributes.
    #[must_use]
    pub fn with_grouping(mut self, attributes: &[&str]) -> Self {
        self.grouping = attributes.iter().map(|a| (*a).to_string()).collect();
        self
    }

    /// Marks the projection as `DISTINCT`.
    #[must_use]
    pub fn with_distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flip() {
        let c = Comparison::new(Operand::Int(5), CompOp::Lt, Operand::Attribute("a".into()));
        let f = c.flipped();
        assert_eq!(f.op, CompOp::Gt);
        assert_eq!(f.left, Operand::Attribute("a".into()));
        assert_eq!(f.to_string(), "a > 5");
    }

    #[test]
    fn test_json_input() {
        let json = r#"{
            "tables": ["L", "R"],
            "predicate": [{"left": {"Attribute": "L.k"}, "op": "Eq", "right": {"Attribute": "R.k"}}],
            "projection": ["L.k"]
        }"#;
        let query: ParsedQuery = serde_json::from_str(json).unwrap();
        assert_eq!(query.tables, vec!["L", "R"]);
        assert_eq!(query.predicate[0], Comparison::attributes("L.k", CompOp::Eq, "R.k"));
        assert!(query.aggregate.is_none());
        assert!(!query.distinct);
    }

    #[test]
    fn test_display_arith() {
        let e = ArithExpr::binary(
            ArithOp::Mul,
            ArithExpr::Attribute("a".into()),
            ArithExpr::Float(1.5),
        );
        assert_eq!(e.to_string(), "(a * 1.5)");
    }
}
