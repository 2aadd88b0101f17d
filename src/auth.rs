//! Authentication mechanisms and the transport layer each one selects.

use crate::error::{DriverError, Result};
use crate::masking::redact_optional;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::str::FromStr;

/// Buffer size of the raw transport used with `NOSASL`.
pub const BUFFERED_TRANSPORT_SIZE: usize = 4096;

/// Password sent for `NONE` when the caller gave none; the server ignores it
/// but rejects an empty one.
const PLACEHOLDER_PASSWORD: &str = "x";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMechanism {
    /// Anonymous; negotiated as SASL `PLAIN` with synthesized credentials.
    #[default]
    None,
    Plain,
    Ldap,
    Gssapi,
    /// No SASL layer at all.
    NoSasl,
}

impl FromStr for AuthMechanism {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NONE" => Ok(AuthMechanism::None),
            "PLAIN" => Ok(AuthMechanism::Plain),
            "LDAP" => Ok(AuthMechanism::Ldap),
            "GSSAPI" => Ok(AuthMechanism::Gssapi),
            "NOSASL" => Ok(AuthMechanism::NoSasl),
            _ => Err(DriverError::UnsupportedAuthMechanism {
                mechanism: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthMechanism::None => "NONE",
            AuthMechanism::Plain => "PLAIN",
            AuthMechanism::Ldap => "LDAP",
            AuthMechanism::Gssapi => "GSSAPI",
            AuthMechanism::NoSasl => "NOSASL",
        };
        f.write_str(name)
    }
}

/// SASL mechanism name handed to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaslMechanism {
    Plain,
    Ldap,
    Gssapi,
}

impl SaslMechanism {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaslMechanism::Plain => "PLAIN",
            SaslMechanism::Ldap => "LDAP",
            SaslMechanism::Gssapi => "GSSAPI",
        }
    }
}

/// How the raw socket is wrapped before the session is opened.
#[derive(Debug)]
pub enum TransportLayer {
    Buffered {
        buffer_size: usize,
    },
    Sasl {
        mechanism: SaslMechanism,
        username: String,
        password: SecretString,
        /// Maximum SASL frame length; the driver uses the row batch size.
        max_length: u32,
    },
}

/// Credentials after mechanism-specific defaults have been applied.
#[derive(Debug)]
pub struct ResolvedAuth {
    pub layer: TransportLayer,
    pub username: Option<String>,
    pub password: Option<SecretString>,
}

/// Pick the transport layer for `mechanism` and fill in `NONE` defaults.
///
/// Never performs I/O.
pub fn resolve(
    mechanism: AuthMechanism,
    username: Option<&str>,
    password: Option<&SecretString>,
    batch_size: usize,
) -> Result<ResolvedAuth> {
    let username = username.filter(|u| !u.is_empty()).map(str::to_string);
    let password = password
        .filter(|p| !p.expose_secret().is_empty())
        .map(clone_secret);
    let max_length = u32::try_from(batch_size).unwrap_or(u32::MAX);

    let resolved = match mechanism {
        AuthMechanism::NoSasl => ResolvedAuth {
            layer: TransportLayer::Buffered {
                buffer_size: BUFFERED_TRANSPORT_SIZE,
            },
            username,
            password,
        },
        AuthMechanism::Plain | AuthMechanism::Ldap | AuthMechanism::Gssapi => {
            let sasl = match mechanism {
                AuthMechanism::Ldap => SaslMechanism::Ldap,
                AuthMechanism::Gssapi => SaslMechanism::Gssapi,
                _ => SaslMechanism::Plain,
            };
            ResolvedAuth {
                layer: TransportLayer::Sasl {
                    mechanism: sasl,
                    username: username.clone().unwrap_or_default(),
                    password: password
                        .as_ref()
                        .map(clone_secret)
                        .unwrap_or_else(|| SecretString::from(String::new())),
                    max_length,
                },
                username,
                password,
            }
        }
        AuthMechanism::None => {
            let username = match username {
                Some(u) => u,
                None => current_os_username()?,
            };
            let password =
                password.unwrap_or_else(|| SecretString::from(PLACEHOLDER_PASSWORD.to_string()));
            ResolvedAuth {
                layer: TransportLayer::Sasl {
                    mechanism: SaslMechanism::Plain,
                    username: username.clone(),
                    password: clone_secret(&password),
                    max_length,
                },
                username: Some(username),
                password: Some(password),
            }
        }
    };

    tracing::debug!(
        mechanism = %mechanism,
        username = resolved.username.as_deref().unwrap_or(""),
        password = %redact_optional(resolved.password.as_ref()),
        "resolved authentication"
    );
    Ok(resolved)
}

/// The anonymous username rule: the OS user's real name with spaces removed.
pub fn synthesize_username(real_name: &str) -> Option<String> {
    let name: String = real_name.chars().filter(|c| *c != ' ').collect();
    if name.is_empty() { None } else { Some(name) }
}

fn current_os_username() -> Result<String> {
    synthesize_username(&whoami::realname())
        .or_else(|| synthesize_username(&whoami::username()))
        .ok_or_else(|| DriverError::Auth {
            message: "can't determine the username".to_string(),
        })
}

fn clone_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_string())
}
