//! Client-side placeholder interpolation.
//!
//! The remote protocol has no server-side parameter binding, so every `?` in a
//! template is replaced by the literal encoding of the matching argument before
//! the statement leaves the process.

use crate::error::{DriverError, Result};
use crate::literal::{append_literal, Zone};
use crate::value::{NamedValue, Value};

/// Rough per-argument size used to pre-size the output buffer.
const ARG_SIZE_HINT: usize = 15;

#[derive(Debug, Clone, Default)]
pub struct ParamsInterpolator {
    pub zone: Zone,
}

impl ParamsInterpolator {
    /// An interpolator rendering timestamps in the process's local zone.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zone(zone: Zone) -> Self {
        Self { zone }
    }

    /// Interpolate arguments that may carry names. Any name is rejected.
    pub fn interpolate_named(&self, query: &str, args: &[NamedValue]) -> Result<String> {
        let values = named_to_values(args)?;
        self.interpolate(query, &values)
    }

    /// Replace each `?` in `query` with the literal for the next argument.
    pub fn interpolate(&self, query: &str, args: &[Value]) -> Result<String> {
        let placeholders = count_placeholders(query);
        if placeholders != args.len() {
            return Err(DriverError::ArgumentCountMismatch {
                placeholders,
                arguments: args.len(),
            });
        }

        let mut buf: Vec<u8> = Vec::with_capacity(query.len() + args.len() * ARG_SIZE_HINT);
        let mut rest = query;
        let mut arg_idx = 0;
        while let Some(q) = rest.find('?') {
            buf.extend_from_slice(rest[..q].as_bytes());
            rest = &rest[q + 1..];

            let Some(arg) = args.get(arg_idx) else {
                break;
            };
            arg_idx += 1;
            append_literal(&mut buf, arg, &self.zone, arg_idx)?;
        }
        buf.extend_from_slice(rest.as_bytes());

        if arg_idx != args.len() {
            return Err(DriverError::InterpolationIncomplete {
                consumed: arg_idx,
                total: args.len(),
            });
        }

        String::from_utf8(buf).map_err(|e| DriverError::Config {
            message: format!("interpolated SQL is not valid UTF-8: {}", e),
        })
    }
}

/// Number of `?` markers in `query`.
pub fn count_placeholders(query: &str) -> usize {
    query.bytes().filter(|&b| b == b'?').count()
}

fn named_to_values(named: &[NamedValue]) -> Result<Vec<Value>> {
    named
        .iter()
        .map(|param| match &param.name {
            Some(name) if !name.is_empty() => Err(DriverError::NamedParametersUnsupported {
                name: name.clone(),
            }),
            _ => Ok(param.value.clone()),
        })
        .collect()
}
