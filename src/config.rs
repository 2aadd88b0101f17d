use crate::auth::AuthMechanism;
use crate::error::DriverError;
use crate::literal::Zone;
use crate::masking::redact_optional;
use directories::ProjectDirs;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Session configuration key selecting the initial database.
pub const USE_DATABASE_KEY: &str = "use:database";

/// Per-connection behaviour, fixed once the connection is open.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Delay between status polls of a running statement.
    pub poll_interval: Duration,
    /// Rows requested per fetch; also the SASL frame limit.
    pub batch_size: usize,
    /// Keep `table.column` names as reported; `false` strips the table prefix.
    pub qualify_column_names: bool,
    /// Upper bound on the poll wait of a single statement.
    pub query_timeout: Option<Duration>,
    /// Zone timestamp arguments are rendered in.
    pub zone: Zone,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            batch_size: DEFAULT_BATCH_SIZE,
            qualify_column_names: true,
            query_timeout: None,
            zone: Zone::Local,
        }
    }
}

/// Everything needed to open one connection.
#[derive(Debug)]
pub struct ConnectConfig {
    pub address: String,
    pub auth: AuthMechanism,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub database: Option<String>,
    /// Extra session configuration sent when opening the session.
    pub session_config: HashMap<String, String>,
    pub options: ConnectionOptions,
}

impl ConnectConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            auth: AuthMechanism::default(),
            username: None,
            password: None,
            database: None,
            session_config: HashMap::new(),
            options: ConnectionOptions::default(),
        }
    }

    pub fn with_auth(mut self, auth: AuthMechanism) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.username = Some(username.into());
        self.password = Some(password);
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// The configuration map sent with the open-session request.
    pub fn session_configuration(&self) -> HashMap<String, String> {
        let mut config = self.session_config.clone();
        if let Some(db) = self.database.as_deref().filter(|d| !d.is_empty()) {
            config.insert(USE_DATABASE_KEY.to_string(), db.to_string());
        }
        config
    }

    /// One-line description for logs; the password is always redacted.
    pub fn summary(&self) -> String {
        format!(
            "address={} auth={} username={} password={} database={}",
            self.address,
            self.auth,
            self.username.as_deref().unwrap_or("(not set)"),
            redact_optional(self.password.as_ref()),
            self.database.as_deref().unwrap_or("(not set)"),
        )
    }
}

// --- TOML config file structs ---

#[derive(Debug, Deserialize, Default)]
struct TomlConfig {
    #[serde(default)]
    defaults: TomlOptions,
    #[serde(default)]
    profiles: HashMap<String, TomlProfile>,
}

#[derive(Debug, Deserialize, Default, Clone)]
struct TomlOptions {
    poll_interval: Option<u64>,
    batch_size: Option<usize>,
    qualify_column_names: Option<bool>,
    query_timeout: Option<u64>,
    time_zone: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
struct TomlProfile {
    address: Option<String>,
    auth: Option<String>,
    username: Option<String>,
    password: Option<String>,
    password_env: Option<String>,
    database: Option<String>,
    #[serde(default)]
    session: HashMap<String, String>,
    #[serde(flatten)]
    options: TomlOptions,
}

/// Where the config file comes from.
///
/// A caller-named file must exist; the platform default may be absent.
enum ConfigSource {
    Named(PathBuf),
    PlatformDefault(PathBuf),
}

impl ConfigSource {
    /// Explicit argument > `HIVELINK_CONFIG` > `<platform config dir>/hivelink/config.toml`.
    fn locate(config_path: Option<&Path>) -> Option<Self> {
        config_path
            .map(Path::to_path_buf)
            .or_else(|| env_non_empty("HIVELINK_CONFIG").map(PathBuf::from))
            .map(ConfigSource::Named)
            .or_else(|| {
                ProjectDirs::from("", "", "hivelink").map(|dirs| {
                    ConfigSource::PlatformDefault(dirs.config_dir().join("config.toml"))
                })
            })
    }

    fn load(&self) -> Result<TomlConfig, DriverError> {
        let path = match self {
            ConfigSource::Named(path) if !path.exists() => {
                return Err(DriverError::Config {
                    message: format!("config file not found: {}", path.display()),
                });
            }
            ConfigSource::PlatformDefault(path) if !path.exists() => {
                return Ok(TomlConfig::default());
            }
            ConfigSource::Named(path) | ConfigSource::PlatformDefault(path) => path,
        };

        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| DriverError::Config {
            message: format!("invalid config file {}: {}", path.display(), e),
        })
    }
}

/// `Some` only for non-empty strings.
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Read an env var, treating empty as unset.
pub fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parsed<T>(key: &str) -> Result<Option<T>, DriverError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_non_empty(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| DriverError::Config {
                message: format!("invalid value '{}' for {}: {}", raw, key, e),
            })
        })
        .transpose()
}

/// Resolve the password: HIVELINK_PASSWORD > `password_env` indirection > inline profile value.
fn resolve_password(profile: &TomlProfile) -> Option<SecretString> {
    if let Some(val) = env_non_empty("HIVELINK_PASSWORD") {
        return Some(SecretString::from(val));
    }
    if let Some(val) = profile.password_env.as_deref().and_then(env_non_empty) {
        return Some(SecretString::from(val));
    }
    non_empty(profile.password.as_deref()).map(SecretString::from)
}

fn resolve_options(
    defaults: &TomlOptions,
    profile: &TomlOptions,
) -> Result<ConnectionOptions, DriverError> {
    let base = ConnectionOptions::default();

    let poll_interval = env_parsed::<u64>("HIVELINK_POLL_INTERVAL")?
        .or(profile.poll_interval)
        .or(defaults.poll_interval)
        .map(Duration::from_secs)
        .unwrap_or(base.poll_interval);

    let batch_size = env_parsed::<usize>("HIVELINK_BATCH_SIZE")?
        .or(profile.batch_size)
        .or(defaults.batch_size)
        .unwrap_or(base.batch_size);
    if batch_size == 0 {
        return Err(DriverError::Config {
            message: "batch_size must be greater than zero".to_string(),
        });
    }

    let qualify_column_names = env_parsed::<bool>("HIVELINK_QUALIFY_COLUMN_NAMES")?
        .or(profile.qualify_column_names)
        .or(defaults.qualify_column_names)
        .unwrap_or(base.qualify_column_names);

    let query_timeout = env_parsed::<u64>("HIVELINK_QUERY_TIMEOUT")?
        .or(profile.query_timeout)
        .or(defaults.query_timeout)
        .map(Duration::from_secs);

    let zone = match env_non_empty("HIVELINK_TIME_ZONE")
        .or_else(|| profile.time_zone.clone())
        .or_else(|| defaults.time_zone.clone())
    {
        Some(name) => Zone::parse(&name)?,
        None => base.zone,
    };

    Ok(ConnectionOptions {
        poll_interval,
        batch_size,
        qualify_column_names,
        query_timeout,
        zone,
    })
}

/// Build a [`ConnectConfig`] from env vars, an optional named profile and the config file defaults.
///
/// Each field resolves independently: `HIVELINK_*` env var > profile > `[defaults]` > built-in default.
pub fn load_profile(
    profile: Option<&str>,
    config_path: Option<&Path>,
) -> Result<ConnectConfig, DriverError> {
    let toml_config = match ConfigSource::locate(config_path) {
        Some(source) => source.load()?,
        None => TomlConfig::default(),
    };

    let profile = profile
        .map(|name| {
            toml_config
                .profiles
                .get(name)
                .cloned()
                .ok_or_else(|| DriverError::Config {
                    message: format!("profile '{}' not found in config file", name),
                })
        })
        .transpose()?
        .unwrap_or_default();

    let address = env_non_empty("HIVELINK_ADDRESS")
        .or_else(|| non_empty(profile.address.as_deref()))
        .ok_or_else(|| DriverError::Config {
            message: "no address specified; set HIVELINK_ADDRESS or configure a profile"
                .to_string(),
        })?;

    let auth = match env_non_empty("HIVELINK_AUTH").or_else(|| non_empty(profile.auth.as_deref())) {
        Some(name) => name.parse::<AuthMechanism>()?,
        None => AuthMechanism::default(),
    };

    let username =
        env_non_empty("HIVELINK_USERNAME").or_else(|| non_empty(profile.username.as_deref()));
    let password = resolve_password(&profile);
    let database =
        env_non_empty("HIVELINK_DATABASE").or_else(|| non_empty(profile.database.as_deref()));

    let options = resolve_options(&toml_config.defaults, &profile.options)?;

    Ok(ConnectConfig {
        address,
        auth,
        username,
        password,
        database,
        session_config: profile.session.clone(),
        options,
    })
}
