//! Client driver for HiveServer2-style query engines.
//!
//! The engine has no server-side parameter binding, so queries are turned into
//! literal SQL on the client ([`interpolate`]), submitted on an authenticated
//! session ([`session`]), polled to completion ([`execution`]) and read back a
//! page at a time ([`cursor`]). The wire protocol is supplied by the caller
//! through the traits in [`rpc`].

pub mod auth;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod error;
pub mod execution;
pub mod interpolate;
pub mod literal;
pub mod masking;
pub mod rpc;
pub mod session;
pub mod value;

pub use config::{ConnectConfig, ConnectionOptions};
pub use connection::Connection;
pub use cursor::{Column, ResultCursor, ScanType};
pub use error::{DriverError, Result};
pub use interpolate::ParamsInterpolator;
pub use literal::{FnLiteral, LiteralWriter, RawLiteral, Zone};
pub use value::{NamedValue, Value};
