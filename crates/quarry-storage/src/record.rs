//! Self-describing record encoding.
//!
//! A record is one tuple's attribute values laid out as:
//!
//! ```text
//! +-----------+----------+-----+------------+-----------------+
//! | total_len | offset_0 | ... | offset_n-1 | payload ...     |
//! +-----------+----------+-----+------------+-----------------+
//!    u32 LE      u32 LE           u32 LE
//! ```
//!
//! Offsets are absolute byte positions of each attribute inside the record,
//! so the attribute count is `offset_0 / 4 - 1`. Integers are `i32` LE,
//! floats are `f64` LE, and strings are UTF-8 followed by a NUL byte.
//! Attribute `i` spans `offset_i .. offset_{i+1}` (or the end of the record).

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::Write;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use quarry_common::{QuarryError, QuarryResult, FIELD_DELIMITER};

use crate::schema::{DataType, Schema};

const FIELD_SIZE: usize = 4;

/// A single attribute value.
#[derive(Debug, Clone)]
pub enum Value {
    /// Integer value.
    Int(i32),
    /// Floating point value.
    Float(f64),
    /// String value.
    Str(String),
}

impl Value {
    /// Returns the type of this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Int(_) => DataType::Integer,
            Value::Float(_) => DataType::Float,
            Value::Str(_) => DataType::String,
        }
    }

    /// Returns the value as `f64` when numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(f64::from(*i)),
            Value::Float(f) => Some(*f),
            Value::Str(_) => None,
        }
    }

    /// Returns the value as `i32` when it is an integer.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Parses text into a value of the given type.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::TypeMismatch`] when the text is not a valid
    /// literal of that type.
    pub fn parse(text: &str, data_type: DataType) -> QuarryResult<Self> {
        match data_type {
            DataType::Integer => text
                .trim()
                .parse::<i32>()
                .map(Value::Int)
                .map_err(|e| QuarryError::type_mismatch(format!("'{text}' as INTEGER: {e}"))),
            DataType::Float => text
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| QuarryError::type_mismatch(format!("'{text}' as FLOAT: {e}"))),
            DataType::String => {
                if text.contains('\0') {
                    return Err(QuarryError::type_mismatch("string contains a NUL byte"));
                }
                Ok(Value::Str(text.to_string()))
            }
        }
    }

    /// Compares two values, promoting integers when compared with floats.
    ///
    /// Returns `None` for string/number comparisons and NaN.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Str(_), _) | (_, Value::Str(_)) => None,
            (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        }
    }

    fn encoded_len(&self) -> usize {
        match self {
            Value::Int(_) => 4,
            Value::Float(_) => 8,
            Value::Str(s) => s.len() + 1,
        }
    }

    fn encode(&self, buf: &mut BytesMut) {
        match self {
            Value::Int(i) => buf.put_i32_le(*i),
            Value::Float(f) => buf.put_f64_le(*f),
            Value::Str(s) => {
                buf.put_slice(s.as_bytes());
                buf.put_u8(0);
            }
        }
    }

    fn decode(mut bytes: &[u8], data_type: DataType) -> QuarryResult<Self> {
        match data_type {
            DataType::Integer if bytes.len() == 4 => Ok(Value::Int(bytes.get_i32_le())),
            DataType::Float if bytes.len() == 8 => Ok(Value::Float(bytes.get_f64_le())),
            DataType::String => match bytes.split_last() {
                Some((&0, text)) => std::str::from_utf8(text)
                    .map(|s| Value::Str(s.to_string()))
                    .map_err(|e| QuarryError::corruption(format!("invalid UTF-8: {e}"))),
                _ => Err(QuarryError::corruption("string attribute is not NUL terminated")),
            },
            _ => Err(QuarryError::corruption(format!(
                "{} bytes cannot hold a {data_type} value",
                bytes.len()
            ))),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v:.2}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

/// An encoded tuple.
///
/// Cloning is cheap; the buffer is reference counted.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Record {
    data: Bytes,
}

impl Record {
    /// Encodes values into a record.
    pub fn from_values(values: &[Value]) -> Self {
        let header = FIELD_SIZE * (values.len() + 1);
        let payload: usize = values.iter().map(Value::encoded_len).sum();
        let mut buf = BytesMut::with_capacity(header + payload);

        buf.put_u32_le(to_u32(header + payload));
        let mut offset = header;
        for value in values {
            buf.put_u32_le(to_u32(offset));
            offset += value.encoded_len();
        }
        for value in values {
            value.encode(&mut buf);
        }
        Self { data: buf.freeze() }
    }

    /// Builds a record from already encoded attribute slices.
    fn from_slices<'a>(slices: impl ExactSizeIterator<Item = &'a [u8]> + Clone) -> Self {
        let header = FIELD_SIZE * (slices.len() + 1);
        let payload: usize = slices.clone().map(<[u8]>::len).sum();
        let mut buf = BytesMut::with_capacity(header + payload);

        buf.put_u32_le(to_u32(header + payload));
        let mut offset = header;
        for slice in slices.clone() {
            buf.put_u32_le(to_u32(offset));
            offset += slice.len();
        }
        for slice in slices {
            buf.put_slice(slice);
        }
        Self { data: buf.freeze() }
    }

    /// Wraps and validates an encoded record.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::Corruption`] when the header is inconsistent.
    pub fn from_bytes(data: Bytes) -> QuarryResult<Self> {
        if data.len() < FIELD_SIZE {
            return Err(QuarryError::corruption("record shorter than its header"));
        }
        let total = read_u32(&data, 0) as usize;
        if total != data.len() {
            return Err(QuarryError::corruption(format!(
                "record length field {total} does not match buffer length {}",
                data.len()
            )));
        }
        let record = Self { data };
        let count = record.num_atts();
        if FIELD_SIZE * (count + 1) > total {
            return Err(QuarryError::corruption("record offsets exceed record length"));
        }
        let mut previous = FIELD_SIZE * (count + 1);
        for i in 0..count {
            let offset = record.offset(i);
            if offset < previous || offset > total {
                return Err(QuarryError::corruption(format!(
                    "attribute {i} offset {offset} out of order"
                )));
            }
            previous = offset;
        }
        Ok(record)
    }

    /// Total encoded size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true for an empty buffer (a default record).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The encoded bytes.
    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    /// Number of attributes in the record.
    pub fn num_atts(&self) -> usize {
        if self.data.len() <= FIELD_SIZE {
            return 0;
        }
        (read_u32(&self.data, FIELD_SIZE) as usize / FIELD_SIZE).saturating_sub(1)
    }

    fn offset(&self, i: usize) -> usize {
        read_u32(&self.data, FIELD_SIZE * (i + 1)) as usize
    }

    /// Raw bytes of attribute `i`.
    pub fn attribute_bytes(&self, i: usize) -> Option<&[u8]> {
        let count = self.num_atts();
        if i >= count {
            return None;
        }
        let start = self.offset(i);
        let end = if i + 1 < count {
            self.offset(i + 1)
        } else {
            self.data.len()
        };
        self.data.get(start..end)
    }

    /// Decodes attribute `i` as a value of `data_type`.
    ///
    /// # Errors
    ///
    /// Fails if the attribute does not exist or its bytes do not decode.
    pub fn value(&self, i: usize, data_type: DataType) -> QuarryResult<Value> {
        let bytes = self.attribute_bytes(i).ok_or_else(|| {
            QuarryError::corruption(format!(
                "attribute {i} missing from record with {} attributes",
                self.num_atts()
            ))
        })?;
        Value::decode(bytes, data_type)
    }

    /// Decodes attribute `i` as an integer.
    ///
    /// # Errors
    ///
    /// Fails if the attribute is missing or not four bytes wide.
    pub fn int(&self, i: usize) -> QuarryResult<i32> {
        match self.value(i, DataType::Integer)? {
            Value::Int(v) => Ok(v),
            _ => Err(QuarryError::internal("integer decode returned non-integer")),
        }
    }

    /// Decodes every attribute using the schema's types.
    ///
    /// # Errors
    ///
    /// Fails if the record does not match the schema.
    pub fn values(&self, schema: &Schema) -> QuarryResult<Vec<Value>> {
        if self.num_atts() != schema.len() {
            return Err(QuarryError::corruption(format!(
                "record has {} attributes, schema has {}",
                self.num_atts(),
                schema.len()
            )));
        }
        schema
            .attributes()
            .iter()
            .enumerate()
            .map(|(i, attr)| self.value(i, attr.data_type))
            .collect()
    }

    /// Keeps only the attributes at `positions`, in that order.
    ///
    /// # Errors
    ///
    /// Fails if a position is out of range.
    pub fn project(&self, positions: &[usize]) -> QuarryResult<Record> {
        let slices = positions
            .iter()
            .map(|&p| {
                self.attribute_bytes(p).ok_or_else(|| {
                    QuarryError::execution(format!(
                        "projection position {p} out of range for {} attributes",
                        self.num_atts()
                    ))
                })
            })
            .collect::<QuarryResult<Vec<_>>>()?;
        Ok(Self::from_slices(slices.into_iter()))
    }

    /// Concatenates the attributes of two records, left first.
    pub fn concat(left: &Record, right: &Record) -> Record {
        let slices: Vec<&[u8]> = (0..left.num_atts())
            .filter_map(|i| left.attribute_bytes(i))
            .chain((0..right.num_atts()).filter_map(|i| right.attribute_bytes(i)))
            .collect();
        Self::from_slices(slices.into_iter())
    }

    /// Compares two records by the raw bytes of the given attribute positions.
    ///
    /// Positions are paired: `positions[k]` of `self` against
    /// `other_positions[k]` of `other`.
    pub fn compare_on(
        &self,
        positions: &[usize],
        other: &Record,
        other_positions: &[usize],
    ) -> Ordering {
        for (&a, &b) in positions.iter().zip(other_positions) {
            let ord = self.attribute_bytes(a).cmp(&other.attribute_bytes(b));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Parses one delimited text line into a record.
    ///
    /// Fields are separated by `|`; one trailing delimiter is allowed.
    ///
    /// # Errors
    ///
    /// Fails if the field count differs from the schema or a field does not
    /// parse as its attribute's type.
    pub fn parse_line(line: &str, schema: &Schema) -> QuarryResult<Record> {
        let line = line.trim_end_matches(['\r', '\n']);
        let line = line.strip_suffix(FIELD_DELIMITER).unwrap_or(line);
        let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
        if fields.len() != schema.len() {
            return Err(QuarryError::type_mismatch(format!(
                "expected {} fields, found {} in '{line}'",
                schema.len(),
                fields.len()
            )));
        }
        let values = fields
            .iter()
            .zip(schema.attributes())
            .map(|(field, attr)| Value::parse(field, attr.data_type))
            .collect::<QuarryResult<Vec<_>>>()?;
        Ok(Self::from_values(&values))
    }

    /// Writes the record as one `|`-delimited line, without the newline.
    ///
    /// # Errors
    ///
    /// Fails if the record does not match the schema or the write fails.
    pub fn write_line<W: Write>(&self, schema: &Schema, out: &mut W) -> QuarryResult<()> {
        for (i, value) in self.values(schema)?.iter().enumerate() {
            if i > 0 {
                write!(out, "{FIELD_DELIMITER}")?;
            }
            write!(out, "{value}")?;
        }
        Ok(())
    }
}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.data.hash(state);
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("atts", &self.num_atts())
            .field("len", &self.data.len())
            .finish()
    }
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    let mut field = &data[at..at + FIELD_SIZE];
    field.get_u32_le()
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::parse_definition("a:int, b:float, c:string").unwrap()
    }

    fn sample() -> Record {
        Record::from_values(&[
            Value::Int(7),
            Value::Float(2.5),
            Value::Str("seven".to_string()),
        ])
    }

    #[test]
    fn test_layout() {
        let rec = sample();
        assert_eq!(rec.num_atts(), 3);
        // header: length + 3 offsets, then 4 + 8 + 6 payload bytes
        assert_eq!(rec.len(), 16 + 18);
        assert_eq!(rec.attribute_bytes(0).unwrap(), &7i32.to_le_bytes());
        assert_eq!(rec.attribute_bytes(2).unwrap(), b"seven\0");
        assert!(rec.attribute_bytes(3).is_none());
    }

    #[test]
    fn test_decode_values() {
        let values = sample().values(&schema()).unwrap();
        assert_eq!(values[0], Value::Int(7));
        assert_eq!(values[1], Value::Float(2.5));
        assert_eq!(values[2], Value::Str("seven".to_string()));
        assert!(sample().value(0, DataType::Float).is_err());
    }

    #[test]
    fn test_project_and_concat() {
        let rec = sample();
        let projected = rec.project(&[2, 0]).unwrap();
        assert_eq!(projected.num_atts(), 2);
        assert_eq!(projected.int(1).unwrap(), 7);
        assert_eq!(projected.project(&[0, 1]).unwrap(), projected);

        let joined = Record::concat(&rec, &projected);
        assert_eq!(joined.num_atts(), 5);
        assert_eq!(joined.attribute_bytes(3).unwrap(), b"seven\0");
        assert!(rec.project(&[9]).is_err());
    }

    #[test]
    fn test_empty_record() {
        let rec = Record::from_values(&[]);
        assert_eq!(rec.num_atts(), 0);
        assert_eq!(rec.len(), 4);
        assert_eq!(Record::concat(&rec, &sample()).num_atts(), 3);
    }

    #[test]
    fn test_from_bytes_validation() {
        let rec = sample();
        assert_eq!(Record::from_bytes(rec.as_bytes().clone()).unwrap(), rec);

        let truncated = rec.as_bytes().slice(0..rec.len() - 1);
        assert!(Record::from_bytes(truncated).is_err());
        assert!(Record::from_bytes(Bytes::from_static(&[1, 0])).is_err());
    }

    #[test]
    fn test_parse_and_write_line() {
        let rec = Record::parse_line("7|2.5|seven|", &schema()).unwrap();
        assert_eq!(rec, sample());

        let mut out = Vec::new();
        rec.write_line(&schema(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "7|2.50|seven");

        assert!(Record::parse_line("7|2.5", &schema()).is_err());
        assert!(Record::parse_line("x|2.5|s", &schema()).is_err());
    }

    #[test]
    fn test_compare_on() {
        let a = Record::from_values(&[Value::Int(1), Value::Int(2)]);
        let b = Record::from_values(&[Value::Int(2), Value::Int(1)]);
        assert_eq!(a.compare_on(&[0], &b, &[1]), Ordering::Equal);
        assert_ne!(a.compare_on(&[0, 1], &b, &[0, 1]), Ordering::Equal);
    }

    #[test]
    fn test_value_compare_promotes() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert!(Value::Int(1) < Value::Float(1.5));
        assert_eq!(Value::Int(1).compare(&Value::Str("1".into())), None);
    }
}
