//! SQL literal encoding for a single argument.
//!
//! The target grammar has no boolean literal and uses backslash escapes inside
//! single-quoted strings. Everything produced here is ASCII except the bytes
//! of string arguments, which pass through unchanged apart from the escaped
//! characters, and the output of caller-supplied [`LiteralWriter`]s.

use crate::error::{BoxError, DriverError, Result};
use crate::value::{is_zero_timestamp, Value};
use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use std::fmt;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A value that renders its own SQL literal, e.g. `MAP(a,1,b,2)`.
///
/// The rendered bytes are inserted verbatim: no quoting, escaping or
/// validation. Implementations are responsible for producing safe SQL.
pub trait LiteralWriter: Send + Sync + fmt::Debug {
    fn write_literal(&self) -> std::result::Result<Vec<u8>, BoxError>;
}

/// A [`LiteralWriter`] backed by a closure.
pub struct FnLiteral<F> {
    render: F,
}

impl<F> FnLiteral<F>
where
    F: Fn() -> std::result::Result<Vec<u8>, BoxError> + Send + Sync,
{
    pub fn new(render: F) -> Self {
        Self { render }
    }
}

impl<F> fmt::Debug for FnLiteral<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnLiteral").finish_non_exhaustive()
    }
}

impl<F> LiteralWriter for FnLiteral<F>
where
    F: Fn() -> std::result::Result<Vec<u8>, BoxError> + Send + Sync,
{
    fn write_literal(&self) -> std::result::Result<Vec<u8>, BoxError> {
        (self.render)()
    }
}

/// A pre-rendered literal. The bytes are never escaped or checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLiteral(Vec<u8>);

impl RawLiteral {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }
}

impl LiteralWriter for RawLiteral {
    fn write_literal(&self) -> std::result::Result<Vec<u8>, BoxError> {
        Ok(self.0.clone())
    }
}

/// Time zone that timestamp arguments are rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Zone {
    /// The process's local zone.
    #[default]
    Local,
    Named(Tz),
}

impl Zone {
    /// Parse an IANA zone name such as `Asia/Shanghai`. `"Local"` selects the process zone.
    pub fn parse(name: &str) -> Result<Self> {
        if name.eq_ignore_ascii_case("local") {
            return Ok(Zone::Local);
        }
        name.parse::<Tz>()
            .map(Zone::Named)
            .map_err(|e| DriverError::Config {
                message: format!("unknown time zone '{}': {}", name, e),
            })
    }

    fn format(&self, ts: &DateTime<Utc>) -> String {
        match self {
            Zone::Local => ts.with_timezone(&Local).format(DATETIME_FORMAT).to_string(),
            Zone::Named(tz) => ts.with_timezone(tz).format(DATETIME_FORMAT).to_string(),
        }
    }
}

/// Encode a single value as a standalone literal.
pub fn encode_literal(value: &Value, zone: &Zone) -> Result<String> {
    let mut buf = Vec::new();
    append_literal(&mut buf, value, zone, 1)?;
    String::from_utf8(buf).map_err(|e| DriverError::ExtensibleLiteralRenderError {
        index: 1,
        source: Box::new(e),
    })
}

/// Append the literal for `value` to `buf`.
///
/// `position` is the 1-based argument index reported when a [`LiteralWriter`] fails.
pub fn append_literal(buf: &mut Vec<u8>, value: &Value, zone: &Zone, position: usize) -> Result<()> {
    match value {
        Value::Null => buf.extend_from_slice(b"NULL"),
        Value::Int(v) => buf.extend_from_slice(v.to_string().as_bytes()),
        Value::UInt(v) => buf.extend_from_slice(v.to_string().as_bytes()),
        Value::Float(v) => {
            if !v.is_finite() {
                return Err(DriverError::UnsupportedArgumentType {
                    kind: format!("non-finite float64 ({})", v),
                });
            }
            append_float(buf, *v);
        }
        Value::Bool(true) => buf.extend_from_slice(b"'true'"),
        Value::Bool(false) => buf.extend_from_slice(b"'false'"),
        Value::Timestamp(ts) => {
            if is_zero_timestamp(ts) {
                buf.extend_from_slice(b"'0000-00-00'");
            } else {
                buf.push(b'\'');
                buf.extend_from_slice(zone.format(ts).as_bytes());
                buf.push(b'\'');
            }
        }
        Value::Bytes(None) => buf.extend_from_slice(b"NULL"),
        Value::Bytes(Some(bytes)) => {
            buf.extend_from_slice(b"X'");
            append_hex(buf, bytes);
            buf.push(b'\'');
        }
        Value::Text(s) => {
            buf.push(b'\'');
            escape_string_backslash(buf, s.as_bytes());
            buf.push(b'\'');
        }
        Value::Literal(writer) => {
            let rendered = writer
                .write_literal()
                .map_err(|source| DriverError::ExtensibleLiteralRenderError {
                    index: position,
                    source,
                })?;
            if let Err(e) = std::str::from_utf8(&rendered) {
                return Err(DriverError::ExtensibleLiteralRenderError {
                    index: position,
                    source: Box::new(e),
                });
            }
            reserve_buffer(buf, rendered.len());
            buf.extend_from_slice(&rendered);
        }
    }
    Ok(())
}

/// Append the shortest decimal form of a finite `v`.
///
/// Plain notation for decimal exponents in `[-4, 21)`, exponent notation
/// (`1e300`, `2.5e-7`) outside it.
pub fn append_float(buf: &mut Vec<u8>, v: f64) {
    let scientific = format!("{:e}", v);
    let exponent = scientific
        .rsplit_once('e')
        .and_then(|(_, exp)| exp.parse::<i32>().ok())
        .unwrap_or(0);
    if v == 0.0 || (-4..21).contains(&exponent) {
        buf.extend_from_slice(v.to_string().as_bytes());
    } else {
        buf.extend_from_slice(scientific.as_bytes());
    }
}

/// Append the lowercase hex encoding of `v`.
pub fn append_hex(buf: &mut Vec<u8>, v: &[u8]) {
    reserve_buffer(buf, v.len() * 2);
    buf.extend_from_slice(hex::encode(v).as_bytes());
}

/// Append `v` with NUL, `\n`, `\r`, 0x1A, `'`, `"` and `\` backslash-escaped.
pub fn escape_string_backslash(buf: &mut Vec<u8>, v: &[u8]) {
    reserve_buffer(buf, v.len() * 2);
    for &c in v {
        let escaped = match c {
            b'\0' => b'0',
            b'\n' => b'n',
            b'\r' => b'r',
            0x1a => b'Z',
            b'\'' => b'\'',
            b'"' => b'"',
            b'\\' => b'\\',
            _ => {
                buf.push(c);
                continue;
            }
        };
        buf.push(b'\\');
        buf.push(escaped);
    }
}

/// Make room for `append_size` more bytes.
///
/// When the spare capacity is short the buffer grows to at least
/// `2 * len + append_size`, so repeated appends stay amortized linear.
pub fn reserve_buffer(buf: &mut Vec<u8>, append_size: usize) {
    if buf.capacity() - buf.len() < append_size {
        buf.reserve_exact(buf.len() + append_size);
    }
}
