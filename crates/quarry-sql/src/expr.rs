//! Predicates and aggregate functions bound to schemas.
//!
//! Binding resolves attribute names to record positions once, at compile
//! time, and rejects comparisons between strings and numbers. Evaluation
//! then only decodes the attributes it touches.

use std::cmp::Ordering;
use std::fmt;

use quarry_common::{QuarryError, QuarryResult};
use quarry_storage::{DataType, Record, Schema, Value};

use crate::parser::{ArithExpr, ArithOp, CompOp, Comparison, Operand};

/// Which input record a bound column reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The only input, or the left input of a join.
    Left,
    /// The right input of a join.
    Right,
}

/// A comparison operand with names resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundOperand {
    /// Attribute at `position` of the record on `side`.
    Column {
        /// Input record.
        side: Side,
        /// Attribute position.
        position: usize,
        /// Attribute type.
        data_type: DataType,
    },
    /// Constant.
    Literal(Value),
}

impl BoundOperand {
    fn data_type(&self) -> DataType {
        match self {
            BoundOperand::Column { data_type, .. } => *data_type,
            BoundOperand::Literal(value) => value.data_type(),
        }
    }

    fn value(&self, left: &Record, right: Option<&Record>) -> QuarryResult<Value> {
        match self {
            BoundOperand::Literal(value) => Ok(value.clone()),
            BoundOperand::Column {
                side,
                position,
                data_type,
            } => {
                let record = match side {
                    Side::Left => left,
                    Side::Right => right.ok_or_else(|| {
                        QuarryError::internal("join predicate evaluated without a right record")
                    })?,
                };
                record.value(*position, *data_type)
            }
        }
    }
}

/// A comparison with both operands bound.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundComparison {
    /// Left operand.
    pub left: BoundOperand,
    /// Operator.
    pub op: CompOp,
    /// Right operand.
    pub right: BoundOperand,
}

impl BoundComparison {
    fn eval(&self, left: &Record, right: Option<&Record>) -> QuarryResult<bool> {
        let a = self.left.value(left, right)?;
        let b = self.right.value(left, right)?;
        Ok(match (a.compare(&b), self.op) {
            (Some(ord), CompOp::Eq) => ord == Ordering::Equal,
            (Some(ord), CompOp::Lt) => ord == Ordering::Less,
            (Some(ord), CompOp::Gt) => ord == Ordering::Greater,
            (None, _) => false,
        })
    }

    /// For `left.x = right.y` in either operand order, the bound columns as
    /// `((left position, type), (right position, type))`.
    fn equi_columns(&self) -> Option<((usize, DataType), (usize, DataType))> {
        if self.op != CompOp::Eq {
            return None;
        }
        match (&self.left, &self.right) {
            (
                BoundOperand::Column {
                    side: a_side,
                    position: a_pos,
                    data_type: a_type,
                },
                BoundOperand::Column {
                    side: b_side,
                    position: b_pos,
                    data_type: b_type,
                },
            ) => match (a_side, b_side) {
                (Side::Left, Side::Right) => Some(((*a_pos, *a_type), (*b_pos, *b_type))),
                (Side::Right, Side::Left) => Some(((*b_pos, *b_type), (*a_pos, *a_type))),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Equality key columns of an equi-join, paired by index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinKeys {
    /// Key columns of the left input.
    pub left: Vec<(usize, DataType)>,
    /// Key columns of the right input.
    pub right: Vec<(usize, DataType)>,
}

/// A conjunction of bound comparisons.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Predicate {
    comparisons: Vec<BoundComparison>,
    text: Vec<String>,
}

impl Predicate {
    /// Binds comparisons over a single input.
    ///
    /// # Errors
    ///
    /// Fails on unknown or ambiguous attributes and on comparisons between
    /// strings and numbers.
    pub fn bind(comparisons: &[Comparison], schema: &Schema) -> QuarryResult<Self> {
        Self::bind_with(comparisons, |name| {
            let position = schema.resolve(name)?;
            Ok((Side::Left, position, attribute_type(schema, position)?))
        })
    }

    /// Binds comparisons over the two inputs of a join. Names are looked up
    /// in the left schema first.
    ///
    /// # Errors
    ///
    /// Fails on unknown or ambiguous attributes and on comparisons between
    /// strings and numbers.
    pub fn bind_join(comparisons: &[Comparison], left: &Schema, right: &Schema) -> QuarryResult<Self> {
        Self::bind_with(comparisons, |name| match left.find(name)? {
            Some(position) => Ok((Side::Left, position, attribute_type(left, position)?)),
            None => {
                let position = right.resolve(name)?;
                Ok((Side::Right, position, attribute_type(right, position)?))
            }
        })
    }

    fn bind_with(
        comparisons: &[Comparison],
        resolve: impl Fn(&str) -> QuarryResult<(Side, usize, DataType)>,
    ) -> QuarryResult<Self> {
        let bind_operand = |operand: &Operand| -> QuarryResult<BoundOperand> {
            Ok(match operand {
                Operand::Attribute(name) => {
                    let (side, position, data_type) = resolve(name)?;
                    BoundOperand::Column {
                        side,
                        position,
                        data_type,
                    }
                }
                Operand::Int(v) => BoundOperand::Literal(Value::Int(*v)),
                Operand::Float(v) => BoundOperand::Literal(Value::Float(*v)),
                Operand::Str(s) => BoundOperand::Literal(Value::Str(s.clone())),
            })
        };

        let mut predicate = Self::default();
        for comparison in comparisons {
            let left = bind_operand(&comparison.left)?;
            let right = bind_operand(&comparison.right)?;
            if left.data_type().is_numeric() != right.data_type().is_numeric() {
                return Err(QuarryError::type_mismatch(format!(
                    "cannot compare {} with {} in {comparison}",
                    left.data_type(),
                    right.data_type()
                )));
            }
            predicate.comparisons.push(BoundComparison {
                left,
                op: comparison.op,
                right,
            });
            predicate.text.push(comparison.to_string());
        }
        Ok(predicate)
    }

    /// Bound comparisons.
    pub fn comparisons(&self) -> &[BoundComparison] {
        &self.comparisons
    }

    /// Number of comparisons.
    pub fn len(&self) -> usize {
        self.comparisons.len()
    }

    /// Returns true for the always-true predicate.
    pub fn is_empty(&self) -> bool {
        self.comparisons.is_empty()
    }

    /// Evaluates the predicate against one record.
    ///
    /// # Errors
    ///
    /// Fails if a referenced attribute cannot be decoded.
    pub fn matches(&self, record: &Record) -> QuarryResult<bool> {
        for comparison in &self.comparisons {
            if !comparison.eval(record, None)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Evaluates a join predicate against a left and a right record.
    ///
    /// # Errors
    ///
    /// Fails if a referenced attribute cannot be decoded.
    pub fn matches_join(&self, left: &Record, right: &Record) -> QuarryResult<bool> {
        for comparison in &self.comparisons {
            if !comparison.eval(left, Some(right))? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Returns true when every comparison equates a left column with a
    /// right column.
    pub fn is_equi_join(&self) -> bool {
        !self.comparisons.is_empty()
            && self
                .comparisons
                .iter()
                .all(|c| c.equi_columns().is_some())
    }

    /// Key columns of an equi-join. Non-equality comparisons are skipped.
    pub fn join_keys(&self) -> JoinKeys {
        let mut keys = JoinKeys::default();
        for (left, right) in self.comparisons.iter().filter_map(BoundComparison::equi_columns) {
            keys.left.push(left);
            keys.right.push(right);
        }
        keys
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text.join(" AND "))
    }
}

fn attribute_type(schema: &Schema, position: usize) -> QuarryResult<DataType> {
    schema
        .attribute(position)
        .map(|a| a.data_type)
        .ok_or_else(|| QuarryError::internal(format!("position {position} outside schema")))
}

/// One normalized component of a hash key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Number(u64),
    Text(String),
}

/// Hashable join key. Integers and floats are both keyed by their `f64`
/// value, so `1` and `1.0` land in the same bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HashKey(Vec<KeyPart>);

impl HashKey {
    /// Extracts the key columns of `record`.
    ///
    /// # Errors
    ///
    /// Fails if a key attribute cannot be decoded.
    pub fn extract(record: &Record, columns: &[(usize, DataType)]) -> QuarryResult<Self> {
        columns
            .iter()
            .map(|&(position, data_type)| {
                Ok(match record.value(position, data_type)? {
                    Value::Str(s) => KeyPart::Text(s),
                    numeric => {
                        let v = numeric.as_f64().unwrap_or_default();
                        // -0.0 and 0.0 compare equal
                        let v = if v == 0.0 { 0.0 } else { v };
                        KeyPart::Number(v.to_bits())
                    }
                })
            })
            .collect::<QuarryResult<Vec<_>>>()
            .map(HashKey)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ArithNode {
    Column { position: usize, data_type: DataType },
    Constant(f64),
    Binary {
        op: ArithOp,
        left: Box<ArithNode>,
        right: Box<ArithNode>,
    },
}

impl ArithNode {
    fn eval(&self, record: &Record) -> QuarryResult<f64> {
        match self {
            ArithNode::Constant(v) => Ok(*v),
            ArithNode::Column {
                position,
                data_type,
            } => record
                .value(*position, *data_type)?
                .as_f64()
                .ok_or_else(|| QuarryError::type_mismatch("non-numeric value in aggregate")),
            ArithNode::Binary { op, left, right } => {
                let (a, b) = (left.eval(record)?, right.eval(record)?);
                Ok(match op {
                    ArithOp::Add => a + b,
                    ArithOp::Sub => a - b,
                    ArithOp::Mul => a * b,
                    ArithOp::Div => a / b,
                })
            }
        }
    }
}

/// An arithmetic expression bound to a schema, evaluated per record in
/// `f64`. Integer attributes and literals are promoted.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateFunction {
    root: ArithNode,
    text: String,
}

impl AggregateFunction {
    /// Binds `expr` to `schema`.
    ///
    /// # Errors
    ///
    /// Fails on unknown attributes and on string attributes.
    pub fn bind(expr: &ArithExpr, schema: &Schema) -> QuarryResult<Self> {
        Ok(Self {
            root: Self::bind_node(expr, schema)?,
            text: expr.to_string(),
        })
    }

    fn bind_node(expr: &ArithExpr, schema: &Schema) -> QuarryResult<ArithNode> {
        Ok(match expr {
            ArithExpr::Int(v) => ArithNode::Constant(f64::from(*v)),
            ArithExpr::Float(v) => ArithNode::Constant(*v),
            ArithExpr::Attribute(name) => {
                let position = schema.resolve(name)?;
                let data_type = attribute_type(schema, position)?;
                if !data_type.is_numeric() {
                    return Err(QuarryError::type_mismatch(format!(
                        "cannot sum {data_type} attribute {name}"
                    )));
                }
                ArithNode::Column {
                    position,
                    data_type,
                }
            }
            ArithExpr::Binary { op, left, right } => ArithNode::Binary {
                op: *op,
                left: Box::new(Self::bind_node(left, schema)?),
                right: Box::new(Self::bind_node(right, schema)?),
            },
        })
    }

    /// Evaluates the expression for one record.
    ///
    /// # Errors
    ///
    /// Fails if a referenced attribute cannot be decoded.
    pub fn apply(&self, record: &Record) -> QuarryResult<f64> {
        self.root.eval(record)
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}
