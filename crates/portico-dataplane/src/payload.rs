//! Application payloads and their shape classification.

use std::collections::BTreeMap;
use std::fmt;

use arrow::record_batch::RecordBatch;
use serde_json::{Number, Value};

/// A value application code hands to a component.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Table(RecordBatch),
    List(Vec<Payload>),
    Tuple(Vec<Payload>),
    Map(BTreeMap<String, Payload>),
}

/// Encoding-relevant shape of a payload, decided once per [`crate::encode`] call.
#[derive(Debug, Clone, Copy)]
pub enum PayloadShape<'a> {
    Bytes(&'a [u8]),
    /// Only mappings have their first-level values scanned for tables.
    Mapping(&'a BTreeMap<String, Payload>),
    /// Lists and tuples; never scanned.
    Sequence(&'a [Payload]),
    Tabular(&'a RecordBatch),
    Other(&'a Payload),
}

#[must_use]
pub fn classify(payload: &Payload) -> PayloadShape<'_> {
    match payload {
        Payload::Bytes(bytes) => PayloadShape::Bytes(bytes),
        Payload::Map(map) => PayloadShape::Mapping(map),
        Payload::List(items) | Payload::Tuple(items) => PayloadShape::Sequence(items),
        Payload::Table(batch) => PayloadShape::Tabular(batch),
        other => PayloadShape::Other(other),
    }
}

impl Payload {
    /// Build a mapping payload.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Payload>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Plain JSON value, or the reason this payload has none.
    ///
    /// Tables and byte buffers have no JSON form, nor do non-finite floats.
    ///
    /// # Errors
    ///
    /// Returns a short description of the first unencodable value.
    pub fn to_json(&self) -> Result<Value, String> {
        Ok(match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => Number::from_f64(*f)
                .map(Value::Number)
                .ok_or_else(|| format!("non-finite float {f}"))?,
            Self::Text(s) => Value::String(s.clone()),
            Self::Bytes(bytes) => return Err(format!("{} byte buffer", bytes.len())),
            Self::Table(batch) => return Err(format!("table with {} rows", batch.num_rows())),
            Self::List(items) | Self::Tuple(items) => {
                Value::Array(items.iter().map(Self::to_json).collect::<Result<_, _>>()?)
            }
            Self::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), v.to_json()?)))
                    .collect::<Result<_, String>>()?,
            ),
        })
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Float(n.as_f64().unwrap_or(f64::NAN)), Self::Int),
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
        }
    }
}

impl From<bool> for Payload {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Payload {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Payload {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Payload {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<RecordBatch> for Payload {
    fn from(batch: RecordBatch) -> Self {
        Self::Table(batch)
    }
}

// Literal-style rendering used as the JSON fallback.
impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) if x.is_nan() => f.write_str("nan"),
            Self::Float(x) if x.is_infinite() => {
                f.write_str(if x.is_sign_negative() { "-inf" } else { "inf" })
            }
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Text(s) => write_quoted(f, s),
            Self::Bytes(bytes) => write!(f, "b'<{} bytes>'", bytes.len()),
            Self::Table(batch) => {
                write!(f, "Table(rows={}, columns=[", batch.num_rows())?;
                for (i, field) in batch.schema().fields().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_quoted(f, field.name())?;
                }
                f.write_str("])")
            }
            Self::List(items) => {
                f.write_str("[")?;
                write_items(f, items)?;
                f.write_str("]")
            }
            Self::Tuple(items) => {
                f.write_str("(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_quoted(f, k)?;
                    write!(f, ": {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Payload]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("'")?;
    for c in s.chars() {
        match c {
            '\'' => f.write_str("\\'")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("'")
}
