//! Arguments bound to `?` placeholders.

use crate::error::DriverError;
use crate::literal::LiteralWriter;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

/// Seconds from the Unix epoch to `0001-01-01 00:00:00 UTC`, the zero timestamp.
pub const ZERO_TIMESTAMP_SECS: i64 = -62_135_596_800;

/// A typed argument for one placeholder.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    /// `None` is SQL NULL; `Some(vec![])` is a zero-length binary literal.
    Bytes(Option<Vec<u8>>),
    Text(String),
    /// Caller-rendered literal, inserted verbatim.
    Literal(Arc<dyn LiteralWriter>),
}

impl Value {
    /// The zero timestamp, encoded as `'0000-00-00'`.
    pub fn zero_timestamp() -> Self {
        Value::Timestamp(DateTime::from_timestamp(ZERO_TIMESTAMP_SECS, 0).unwrap_or(DateTime::<Utc>::MIN_UTC))
    }

    pub fn bytes(bytes: Option<Vec<u8>>) -> Self {
        Value::Bytes(bytes)
    }

    pub fn literal(writer: impl LiteralWriter + 'static) -> Self {
        Value::Literal(Arc::new(writer))
    }

    /// Short name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int64",
            Value::UInt(_) => "uint64",
            Value::Float(_) => "float64",
            Value::Bool(_) => "bool",
            Value::Timestamp(_) => "timestamp",
            Value::Bytes(_) => "bytes",
            Value::Text(_) => "string",
            Value::Literal(_) => "literal",
        }
    }
}

/// True when `ts` is the zero timestamp.
pub fn is_zero_timestamp(ts: &DateTime<Utc>) -> bool {
    ts.timestamp() == ZERO_TIMESTAMP_SECS && ts.timestamp_subsec_nanos() == 0
}

macro_rules! impl_from_int {
    ($variant:ident, $target:ty, $($t:ty),+) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v as $target)
                }
            }
        )+
    };
}

impl_from_int!(Int, i64, i8, i16, i32, i64, isize);
impl_from_int!(UInt, u64, u8, u16, u32, u64, usize);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(Some(v))
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(Some(v.to_vec()))
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Value {
    fn from(v: DateTime<Tz>) -> Self {
        Value::Timestamp(v.with_timezone(&Utc))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = DriverError;

    /// Converts JSON scalars. Arrays and objects have no literal form.
    fn try_from(v: serde_json::Value) -> Result<Self, Self::Error> {
        match v {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Ok(Value::UInt(u))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Float(f))
                } else {
                    Err(DriverError::UnsupportedArgumentType {
                        kind: format!("json number {}", n),
                    })
                }
            }
            serde_json::Value::String(s) => Ok(Value::Text(s)),
            serde_json::Value::Array(_) => Err(DriverError::UnsupportedArgumentType {
                kind: "json array".to_string(),
            }),
            serde_json::Value::Object(_) => Err(DriverError::UnsupportedArgumentType {
                kind: "json object".to_string(),
            }),
        }
    }
}

/// An argument as handed over by a generic SQL API, possibly carrying a name.
///
/// Only positional arguments are accepted; see
/// [`ParamsInterpolator::interpolate_named`](crate::interpolate::ParamsInterpolator::interpolate_named).
#[derive(Debug, Clone)]
pub struct NamedValue {
    pub name: Option<String>,
    pub value: Value,
}

impl NamedValue {
    pub fn positional(value: impl Into<Value>) -> Self {
        Self {
            name: None,
            value: value.into(),
        }
    }

    pub fn named(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: Some(name.into()),
            value: value.into(),
        }
    }
}

impl From<Value> for NamedValue {
    fn from(value: Value) -> Self {
        Self { name: None, value }
    }
}
