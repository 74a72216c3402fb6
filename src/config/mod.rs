//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::{CacheConfig, CachePolicy, TtlClass};

pub use cli::{CliArgs, Command, DatabaseOverride, ServeArgs, ServeOverrides, VersionArgs};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "trove";
const ENV_PREFIX: &str = "TROVE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_ADMIN_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 3000;
const DEFAULT_ADMIN_PORT: u16 = 3001;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_DB_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub admin_addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Upstream database access. `url` and `api_key` stay optional here; their
/// absence is reported when the row store is built at startup.
#[derive(Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub max_connections: NonZeroU32,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub default_ttl: Duration,
    pub version_ttl: Duration,
    pub modal_ttl: Duration,
    pub max_entries: NonZeroUsize,
    pub policy: CachePolicy,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Version(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(host) = overrides.server_admin_host.as_ref() {
            self.server.admin_host = Some(host.clone());
        }
        if let Some(port) = overrides.public_port {
            self.server.public_port = Some(port);
        }
        if let Some(port) = overrides.admin_port {
            self.server.admin_port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(seconds) = overrides.database_request_timeout_seconds {
            self.database.request_timeout_seconds = Some(seconds);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(seconds) = overrides.cache_default_ttl_seconds {
            self.cache.default_ttl_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.cache_version_ttl_seconds {
            self.cache.version_ttl_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.cache_modal_ttl_seconds {
            self.cache.modal_ttl_seconds = Some(seconds);
        }

        self.apply_database_override(&overrides.database);
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(key) = overrides.database_api_key.as_ref() {
            self.database.api_key = Some(key.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let admin_host = server
        .admin_host
        .unwrap_or_else(|| DEFAULT_ADMIN_HOST.to_string());

    let public_port = server.public_port.unwrap_or(DEFAULT_PUBLIC_PORT);
    if public_port == 0 {
        return Err(LoadError::invalid(
            "server.public_port",
            "port must be greater than zero",
        ));
    }

    let admin_port = server.admin_port.unwrap_or(DEFAULT_ADMIN_PORT);
    if admin_port == 0 {
        return Err(LoadError::invalid(
            "server.admin_port",
            "port must be greater than zero",
        ));
    }

    let public_addr = parse_socket_addr(&host, public_port)
        .map_err(|reason| LoadError::invalid("server.public_addr", reason))?;
    let admin_addr = parse_socket_addr(&admin_host, admin_port)
        .map_err(|reason| LoadError::invalid("server.admin_addr", reason))?;

    if public_addr == admin_addr {
        return Err(LoadError::invalid(
            "server.admin_port",
            format!("admin listener must not share the public address `{public_addr}`"),
        ));
    }

    Ok(ServerSettings {
        public_addr,
        admin_addr,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    let request_timeout = positive_seconds(
        database
            .request_timeout_seconds
            .unwrap_or(DEFAULT_DB_REQUEST_TIMEOUT_SECS),
        "database.request_timeout_seconds",
    )?;

    Ok(DatabaseSettings {
        url: non_blank(database.url),
        api_key: non_blank(database.api_key),
        max_connections,
        request_timeout,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let defaults = CacheConfig::default();

    let default_ttl = positive_seconds(
        cache
            .default_ttl_seconds
            .unwrap_or(defaults.default_ttl.as_secs()),
        "cache.default_ttl_seconds",
    )?;
    let version_ttl = positive_seconds(
        cache
            .version_ttl_seconds
            .unwrap_or(defaults.version_ttl.as_secs()),
        "cache.version_ttl_seconds",
    )?;
    let modal_ttl = positive_seconds(
        cache
            .modal_ttl_seconds
            .unwrap_or(defaults.modal_ttl.as_secs()),
        "cache.modal_ttl_seconds",
    )?;

    let max_entries = match cache.max_entries {
        Some(value) => usize::try_from(value).ok().and_then(NonZeroUsize::new),
        None => NonZeroUsize::new(defaults.max_entries),
    }
    .ok_or_else(|| {
        LoadError::invalid(
            "cache.max_entries",
            "must be greater than zero and fit in usize",
        )
    })?;

    let policy = CachePolicy {
        items: cache.policy.items.unwrap_or(defaults.policy.items),
        item_detail: cache.policy.item_detail.unwrap_or(defaults.policy.item_detail),
        item_relations: cache
            .policy
            .item_relations
            .unwrap_or(defaults.policy.item_relations),
        repair_economy: cache
            .policy
            .repair_economy
            .unwrap_or(defaults.policy.repair_economy),
    };

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(defaults.enabled),
        default_ttl,
        version_ttl,
        modal_ttl,
        max_entries,
        policy,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    admin_host: Option<String>,
    public_port: Option<u16>,
    admin_port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    api_key: Option<String>,
    max_connections: Option<u32>,
    request_timeout_seconds: Option<u64>,
}

impl std::fmt::Debug for RawDatabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawDatabaseSettings")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    default_ttl_seconds: Option<u64>,
    version_ttl_seconds: Option<u64>,
    modal_ttl_seconds: Option<u64>,
    max_entries: Option<u64>,
    policy: RawCachePolicy,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCachePolicy {
    items: Option<TtlClass>,
    item_detail: Option<TtlClass>,
    item_relations: Option<TtlClass>,
    repair_economy: Option<TtlClass>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn positive_seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}
