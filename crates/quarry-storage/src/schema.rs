//! Schemas describe the attribute layout of records.
//!
//! A schema is an ordered list of attributes plus a table-level tuple
//! estimate. Attribute order defines the record byte layout and every
//! positional reference made by operators.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use quarry_common::{QuarryError, QuarryResult};

/// Type of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 32-bit signed integer.
    Integer,
    /// 64-bit floating point.
    Float,
    /// UTF-8 string.
    String,
}

impl DataType {
    /// Returns true for `Integer` and `Float`.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "INTEGER"),
            Self::Float => write!(f, "FLOAT"),
            Self::String => write!(f, "STRING"),
        }
    }
}

impl FromStr for DataType {
    type Err = QuarryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Ok(Self::Integer),
            "float" | "double" => Ok(Self::Float),
            "string" | "str" | "text" => Ok(Self::String),
            other => Err(QuarryError::invalid_argument(format!(
                "unknown data type '{other}'"
            ))),
        }
    }
}

/// One attribute of a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Value type.
    pub data_type: DataType,
    /// Estimated number of distinct values.
    pub distinct: u64,
    /// Table the attribute came from, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
}

impl Attribute {
    /// Creates a new attribute with no distinct-value estimate.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            distinct: 0,
            table: None,
        }
    }

    /// Sets the distinct-value estimate.
    pub fn with_distinct(mut self, distinct: u64) -> Self {
        self.distinct = distinct;
        self
    }

    /// Sets the owning table.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Returns `table.name` when qualified, otherwise the bare name.
    pub fn qualified_name(&self) -> String {
        match &self.table {
            Some(table) => format!("{table}.{}", self.name),
            None => self.name.clone(),
        }
    }

    fn matches(&self, table: Option<&str>, name: &str) -> bool {
        self.name == name
            && match table {
                Some(t) => self.table.as_deref() == Some(t),
                None => true,
            }
    }
}

/// Ordered attributes plus a tuple-count estimate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    attributes: Vec<Attribute>,
    tuples: u64,
}

impl Schema {
    /// Creates a schema from attributes and a tuple estimate.
    pub fn new(attributes: Vec<Attribute>, tuples: u64) -> Self {
        Self { attributes, tuples }
    }

    /// Parses a definition such as `"a:int, b:float, name:string"`.
    ///
    /// # Errors
    ///
    /// Fails on empty definitions, malformed entries, unknown types, and
    /// duplicate attribute names.
    pub fn parse_definition(definition: &str) -> QuarryResult<Self> {
        let mut attributes: Vec<Attribute> = Vec::new();
        for part in definition.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, ty) = part.split_once(':').ok_or_else(|| {
                QuarryError::invalid_argument(format!("expected name:type, got '{part}'"))
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(QuarryError::invalid_argument("empty attribute name"));
            }
            if attributes.iter().any(|a| a.name == name) {
                return Err(QuarryError::invalid_argument(format!(
                    "duplicate attribute '{name}'"
                )));
            }
            attributes.push(Attribute::new(name, ty.parse()?));
        }
        if attributes.is_empty() {
            return Err(QuarryError::invalid_argument("schema has no attributes"));
        }
        Ok(Self::new(attributes, 0))
    }

    /// Returns the attributes in order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Returns an attribute by position.
    pub fn attribute(&self, index: usize) -> Option<&Attribute> {
        self.attributes.get(index)
    }

    /// Returns a mutable attribute by position.
    pub fn attribute_mut(&mut self, index: usize) -> Option<&mut Attribute> {
        self.attributes.get_mut(index)
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns true when the schema has no attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Estimated tuple count.
    pub fn tuples(&self) -> u64 {
        self.tuples
    }

    /// Sets the estimated tuple count.
    pub fn set_tuples(&mut self, tuples: u64) {
        self.tuples = tuples;
    }

    /// Value types in attribute order.
    pub fn types(&self) -> Vec<DataType> {
        self.attributes.iter().map(|a| a.data_type).collect()
    }

    /// Looks up an attribute by bare (`a`) or qualified (`T.a`) name.
    ///
    /// Returns `Ok(None)` when nothing matches.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::AmbiguousAttribute`] when a name matches more
    /// than one attribute.
    pub fn find(&self, name: &str) -> QuarryResult<Option<usize>> {
        let (table, bare) = split_qualified(name);
        let mut found = None;
        for (i, attr) in self.attributes.iter().enumerate() {
            if attr.matches(table, bare) {
                if found.is_some() {
                    return Err(QuarryError::AmbiguousAttribute {
                        name: name.to_string(),
                    });
                }
                found = Some(i);
            }
        }
        Ok(found)
    }

    /// Like [`Schema::find`], but a missing attribute is an error.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::AttributeNotFound`] or
    /// [`QuarryError::AmbiguousAttribute`].
    pub fn resolve(&self, name: &str) -> QuarryResult<usize> {
        self.find(name)?
            .ok_or_else(|| QuarryError::attribute_not_found(name))
    }

    /// Returns true when `name` resolves to exactly one attribute.
    pub fn contains(&self, name: &str) -> bool {
        matches!(self.find(name), Ok(Some(_)))
    }

    /// Keeps the attributes at `positions`, in the given order.
    ///
    /// The tuple estimate is preserved.
    ///
    /// # Errors
    ///
    /// Fails if a position is out of range.
    pub fn project(&self, positions: &[usize]) -> QuarryResult<Self> {
        let attributes = positions
            .iter()
            .map(|&p| {
                self.attributes.get(p).cloned().ok_or_else(|| {
                    QuarryError::invalid_argument(format!(
                        "projection position {p} out of range for {} attributes",
                        self.attributes.len()
                    ))
                })
            })
            .collect::<QuarryResult<Vec<_>>>()?;
        Ok(Self::new(attributes, self.tuples))
    }

    /// Concatenates the attributes of two schemas, left first.
    ///
    /// The tuple estimate is left at zero for the caller to set.
    pub fn join(left: &Self, right: &Self) -> Self {
        let mut attributes = left.attributes.clone();
        attributes.extend(right.attributes.iter().cloned());
        Self::new(attributes, 0)
    }

    /// Returns a copy with every attribute qualified by `table`.
    pub fn qualified(&self, table: &str) -> Self {
        let attributes = self
            .attributes
            .iter()
            .map(|a| a.clone().with_table(table))
            .collect();
        Self::new(attributes, self.tuples)
    }

    /// Product of the distinct-value estimates, saturating.
    pub fn distinct_product(&self) -> u64 {
        self.attributes
            .iter()
            .fold(1u64, |acc, a| acc.saturating_mul(a.distinct))
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, attr) in self.attributes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", attr.qualified_name(), attr.data_type)?;
        }
        write!(f, ") ~{} tuples", self.tuples)
    }
}

/// Splits `T.a` into `(Some("T"), "a")`; bare names give `(None, name)`.
pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.split_once('.') {
        Some((table, bare)) => (Some(table), bare),
        None => (None, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Schema {
        Schema::parse_definition("a:int, b:float, c:string").unwrap()
    }

    #[test]
    fn test_parse_definition() {
        let schema = sample();
        assert_eq!(schema.len(), 3);
        assert_eq!(
            schema.types(),
            vec![DataType::Integer, DataType::Float, DataType::String]
        );
        assert!(Schema::parse_definition("").is_err());
        assert!(Schema::parse_definition("a:int,a:int").is_err());
        assert!(Schema::parse_definition("a:blob").is_err());
        assert!(Schema::parse_definition("a").is_err());
    }

    #[test]
    fn test_resolve_qualified_names() {
        let left = sample().qualified("l");
        let right = Schema::parse_definition("a:int, d:int").unwrap().qualified("r");
        let joined = Schema::join(&left, &right);

        assert_eq!(joined.resolve("l.a").unwrap(), 0);
        assert_eq!(joined.resolve("r.a").unwrap(), 3);
        assert_eq!(joined.resolve("d").unwrap(), 4);
        assert!(matches!(
            joined.resolve("a"),
            Err(QuarryError::AmbiguousAttribute { .. })
        ));
        assert!(matches!(
            joined.resolve("x.a"),
            Err(QuarryError::AttributeNotFound { .. })
        ));
    }

    #[test]
    fn test_projection_is_idempotent() {
        let mut schema = sample();
        schema.set_tuples(42);
        let once = schema.project(&[2, 0]).unwrap();
        let twice = once.project(&[0, 1]).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.tuples(), 42);
        assert_eq!(once.attribute(0).unwrap().name, "c");
        assert!(schema.project(&[3]).is_err());
    }

    #[test]
    fn test_distinct_product() {
        let mut schema = sample();
        for (i, d) in [4u64, 5, 6].iter().enumerate() {
            schema.attribute_mut(i).unwrap().distinct = *d;
        }
        assert_eq!(schema.distinct_product(), 120);
    }

    #[test]
    fn test_display() {
        let schema = Schema::parse_definition("k:int").unwrap().qualified("t");
        assert_eq!(schema.to_string(), "(t.k:INTEGER) ~0 tuples");
    }
}
