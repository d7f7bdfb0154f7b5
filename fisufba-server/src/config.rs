//! Application configuration
//!
//! Built once at startup from a TOML file overlaid with `FISUFBA_*`
//! environment variables, validated, then passed by reference to the
//! gateway, the provisioner and the HTTP server.
//!
//! ```toml
//! [database]
//! host = "localhost"
//! port = 5432
//! user = "fisufba"
//! password = "secret"
//! name = "fisufba"
//!
//! [server]
//! bind = "0.0.0.0:8000"
//!
//! [admin]            # optional, used by `fisufba provision`
//! cpf = "529.982.247-25"
//! password = "change-me-now"
//! display_name = "Administrador"
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::models::{Cpf, DisplayName, Email, Password};

/// File picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "fisufba.toml";

const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CONNECT_RETRIES: u32 = 3;
const DEFAULT_BIND: &str = "0.0.0.0:8000";
const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Configuration errors. Any of these stops startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("missing required setting `{key}` (set it in the config file or via {env})")]
    Missing { key: &'static str, env: &'static str },

    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Database connection and pool settings
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
    /// How long `acquire` waits for a free connection
    pub acquire_timeout: Duration,
    /// Upper bound for one transaction, enforced client and server side
    pub operation_timeout: Duration,
    /// Retries for transient connectivity failures while acquiring
    pub connect_retries: u32,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("name", &self.name)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("operation_timeout", &self.operation_timeout)
            .field("connect_retries", &self.connect_retries)
            .finish()
    }
}

/// HTTP server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,

    /// Allow any CORS origin (default: false = localhost only)
    pub cors_permissive: bool,

    /// How long in-flight requests may run after a shutdown signal
    pub drain_timeout: Duration,

    /// Per-request deadline
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            cors_permissive: false,
            drain_timeout: Duration::from_secs(DEFAULT_DRAIN_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Administrator account seeded by the provisioner
#[derive(Debug, Clone)]
pub struct AdminAccount {
    pub cpf: Cpf,
    pub password: Password,
    pub display_name: DisplayName,
    pub email: Option<Email>,
}

/// Fully validated configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub admin: Option<AdminAccount>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    database: RawDatabase,
    #[serde(default)]
    server: RawServer,
    admin: Option<RawAdmin>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDatabase {
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    name: Option<String>,
    max_connections: Option<u32>,
    acquire_timeout_secs: Option<u64>,
    operation_timeout_secs: Option<u64>,
    connect_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawServer {
    bind: Option<String>,
    cors_permissive: Option<bool>,
    drain_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAdmin {
    cpf: String,
    password: String,
    display_name: String,
    email: Option<String>,
}

impl AppConfig {
    /// Load from `path` (must exist) or from [`DEFAULT_CONFIG_FILE`] when it
    /// exists, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let raw = match path {
            Some(path) => read_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    read_file(default)?
                } else {
                    tracing::debug!("no config file, using environment only");
                    RawConfig::default()
                }
            }
        };
        Self::resolve(raw, |key| std::env::var(key).ok())
    }

    /// Parse TOML text and apply overrides from `lookup`.
    pub fn from_toml_str(
        text: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let raw = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        Self::resolve(raw, lookup)
    }

    fn resolve(
        mut raw: RawConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let db = &mut raw.database;
        override_with(&lookup, "FISUFBA_DB_HOST", &mut db.host);
        override_with(&lookup, "FISUFBA_DB_USER", &mut db.user);
        override_with(&lookup, "FISUFBA_DB_PASSWORD", &mut db.password);
        override_with(&lookup, "FISUFBA_DB_NAME", &mut db.name);
        if let Some(port) = lookup("FISUFBA_DB_PORT") {
            db.port = Some(port.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "database.port",
                reason: format!("'{}' is not a port number", port),
            })?);
        }
        override_with(&lookup, "FISUFBA_BIND", &mut raw.server.bind);

        let database = DatabaseConfig {
            host: required(raw.database.host, "database.host", "FISUFBA_DB_HOST")?,
            port: raw.database.port.unwrap_or(DEFAULT_DB_PORT),
            user: required(raw.database.user, "database.user", "FISUFBA_DB_USER")?,
            password: required(
                raw.database.password,
                "database.password",
                "FISUFBA_DB_PASSWORD",
            )?,
            name: required(raw.database.name, "database.name", "FISUFBA_DB_NAME")?,
            max_connections: positive(
                raw.database.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS),
                "database.max_connections",
            )?,
            acquire_timeout: seconds(
                raw.database
                    .acquire_timeout_secs
                    .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS),
                "database.acquire_timeout_secs",
            )?,
            operation_timeout: seconds(
                raw.database
                    .operation_timeout_secs
                    .unwrap_or(DEFAULT_OPERATION_TIMEOUT_SECS),
                "database.operation_timeout_secs",
            )?,
            connect_retries: raw.database.connect_retries.unwrap_or(DEFAULT_CONNECT_RETRIES),
        };

        let bind = raw.server.bind.unwrap_or_else(|| DEFAULT_BIND.to_owned());
        let server = ServerConfig {
            bind_addr: bind.parse().map_err(|_| ConfigError::Invalid {
                key: "server.bind",
                reason: format!("'{}' is not a socket address (host:port)", bind),
            })?,
            cors_permissive: raw.server.cors_permissive.unwrap_or(false),
            drain_timeout: seconds(
                raw.server
                    .drain_timeout_secs
                    .unwrap_or(DEFAULT_DRAIN_TIMEOUT_SECS),
                "server.drain_timeout_secs",
            )?,
            request_timeout: seconds(
                raw.server
                    .request_timeout_secs
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
                "server.request_timeout_secs",
            )?,
        };

        let admin = raw.admin.map(resolve_admin).transpose()?;

        Ok(Self {
            database,
            server,
            admin,
        })
    }
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_owned(),
        source,
    })
}

fn override_with(
    lookup: &impl Fn(&str) -> Option<String>,
    env: &str,
    slot: &mut Option<String>,
) {
    if let Some(value) = lookup(env) {
        *slot = Some(value);
    }
}

fn required(
    value: Option<String>,
    key: &'static str,
    env: &'static str,
) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing { key, env }),
    }
}

fn positive(value: u32, key: &'static str) -> Result<u32, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            key,
            reason: "must be greater than zero".into(),
        });
    }
    Ok(value)
}

fn seconds(value: u64, key: &'static str) -> Result<Duration, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            key,
            reason: "must be at least one second".into(),
        });
    }
    Ok(Duration::from_secs(value))
}

fn resolve_admin(raw: RawAdmin) -> Result<AdminAccount, ConfigError> {
    let invalid = |key: &'static str| {
        move |e: crate::models::ValidationError| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }
    };
    Ok(AdminAccount {
        cpf: Cpf::new(&raw.cpf).map_err(invalid("admin.cpf"))?,
        password: Password::new(&raw.password).map_err(invalid("admin.password"))?,
        display_name: DisplayName::new(&raw.display_name)
            .map_err(invalid("admin.display_name"))?,
        email: raw
            .email
            .as_deref()
            .map(Email::new)
            .transpose()
            .map_err(invalid("admin.email"))?,
    })
}
