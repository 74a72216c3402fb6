use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the Trove binary.
#[derive(Debug, Parser)]
#[command(name = "trove", version, about = "Trove game-companion data service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "TROVE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the public and administrative HTTP listeners.
    Serve(Box<ServeArgs>),
    /// Print the current upstream data version and exit.
    Version(VersionArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database endpoint (https:// for the REST gateway, postgres:// for direct access).
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database access key used by the REST gateway.
    #[arg(long = "database-api-key", value_name = "KEY")]
    pub database_api_key: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct VersionArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Override the public listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the administrative listener host.
    #[arg(long = "server-admin-host", value_name = "HOST")]
    pub server_admin_host: Option<String>,

    /// Override the public listener port.
    #[arg(long = "server-public-port", value_name = "PORT")]
    pub public_port: Option<u16>,

    /// Override the administrative listener port.
    #[arg(long = "server-admin-port", value_name = "PORT")]
    pub admin_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the Postgres pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the upstream request timeout.
    #[arg(long = "database-request-timeout-seconds", value_name = "SECONDS")]
    pub database_request_timeout_seconds: Option<u64>,

    /// Enable or disable the read-through cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the DEFAULT cache TTL.
    #[arg(long = "cache-default-ttl-seconds", value_name = "SECONDS")]
    pub cache_default_ttl_seconds: Option<u64>,

    /// Override how long the data version is trusted before it is re-read.
    #[arg(long = "cache-version-ttl-seconds", value_name = "SECONDS")]
    pub cache_version_ttl_seconds: Option<u64>,

    /// Override the MODAL cache TTL.
    #[arg(long = "cache-modal-ttl-seconds", value_name = "SECONDS")]
    pub cache_modal_ttl_seconds: Option<u64>,
}
