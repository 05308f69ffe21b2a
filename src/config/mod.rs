//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;
#[cfg(test)]
mod tests;

pub use cli::*;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "toggleboard";
const ENV_PREFIX: &str = "TOGGLEBOARD";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_ADMIN_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 3000;
const DEFAULT_ADMIN_PORT: u16 = 3001;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_MEMORY_TTL_SECS: u64 = 300;
const DEFAULT_MEMORY_CAPACITY: u64 = 10_000;
const DEFAULT_BROWSER_TTL_SECS: u64 = 300;
const DEFAULT_EDGE_TTL_SECS: u64 = 3600;
const DEFAULT_EDGE_DIRECTORY: &str = "edge-cache";
const DEFAULT_EDGE_NAMESPACE: &str = "public/toggles";
const DEFAULT_CDN_TIMEOUT_SECS: u64 = 5;
const DEFAULT_TASK_QUEUE_CAPACITY: u64 = 1024;
const DEFAULT_BACKUP_OBJECT_PATH: &str = "toggles-auto-backup.json";
const DEFAULT_BACKUP_SCHEDULE: &str = "0 0 * * * *";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub edge: EdgeSettings,
    pub cdn: CdnSettings,
    pub tasks: TaskSettings,
    pub backup: BackupSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub admin_addr: SocketAddr,
    pub graceful_shutdown: Duration,
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

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub memory_ttl: Duration,
    pub memory_capacity: NonZeroUsize,
    pub browser_ttl: Duration,
    pub edge_ttl: Duration,
}

/// Where durable edge objects are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeBackend {
    Filesystem,
    Memory,
    Disabled,
}

impl FromStr for EdgeBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "filesystem" | "fs" => Ok(Self::Filesystem),
            "memory" => Ok(Self::Memory),
            "disabled" | "none" | "off" => Ok(Self::Disabled),
            other => Err(format!(
                "unknown backend `{other}` (expected filesystem|memory|disabled)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EdgeSettings {
    pub backend: EdgeBackend,
    pub directory: PathBuf,
    pub namespace: String,
    /// Base URL the CDN serves edge objects from; enables the `/cdn/toggles` redirect.
    pub public_base_url: Option<Url>,
}

#[derive(Debug, Clone)]
pub struct CdnSettings {
    pub purge_url: Option<Url>,
    pub token: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct TaskSettings {
    pub queue_capacity: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct BackupSettings {
    pub enabled: bool,
    pub object_path: String,
    pub schedule: String,
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
        Some(Command::Export(args)) => raw.apply_database_override(&args.database),
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
    edge: RawEdgeSettings,
    cdn: RawCdnSettings,
    tasks: RawTaskSettings,
    backup: RawBackupSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, cli: &ServeOverrides) {
        overlay(&mut self.server.host, &cli.server_host);
        overlay(&mut self.server.admin_host, &cli.server_admin_host);
        overlay(&mut self.server.public_port, &cli.public_port);
        overlay(&mut self.server.admin_port, &cli.admin_port);
        overlay(
            &mut self.server.graceful_shutdown_seconds,
            &cli.server_graceful_shutdown_seconds,
        );
        overlay(&mut self.logging.level, &cli.log_level);
        overlay(&mut self.logging.json, &cli.log_json);
        overlay(&mut self.database.url, &cli.database_url);
        overlay(
            &mut self.database.max_connections,
            &cli.database_max_connections,
        );
        overlay(&mut self.cache.memory_ttl_seconds, &cli.cache_memory_ttl_seconds);
        overlay(&mut self.edge.backend, &cli.edge_backend);
        overlay(&mut self.edge.directory, &cli.edge_directory);
        overlay(&mut self.cdn.purge_url, &cli.cdn_purge_url);
        overlay(&mut self.backup.enabled, &cli.backup_enabled);
    }

    fn apply_database_override(&mut self, cli: &DatabaseOverride) {
        overlay(&mut self.database.url, &cli.database_url);
    }
}

/// CLI values win over file and environment values when present.
fn overlay<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        slot.clone_from(value);
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
            edge,
            cdn,
            tasks,
            backup,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache)?,
            edge: build_edge_settings(edge)?,
            cdn: build_cdn_settings(cdn)?,
            tasks: build_task_settings(tasks)?,
            backup: build_backup_settings(backup)?,
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

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    let graceful_shutdown = non_zero_secs(graceful_secs, "server.graceful_shutdown_seconds")?;

    Ok(ServerSettings {
        public_addr,
        admin_addr,
        graceful_shutdown,
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
    let url = non_blank(database.url);
    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let memory_ttl = non_zero_secs(
        cache.memory_ttl_seconds.unwrap_or(DEFAULT_MEMORY_TTL_SECS),
        "cache.memory_ttl_seconds",
    )?;
    let memory_capacity = non_zero_usize(
        cache.memory_capacity.unwrap_or(DEFAULT_MEMORY_CAPACITY),
        "cache.memory_capacity",
    )?;
    let browser_ttl = Duration::from_secs(
        cache
            .browser_ttl_seconds
            .unwrap_or(DEFAULT_BROWSER_TTL_SECS),
    );
    let edge_ttl = Duration::from_secs(cache.edge_ttl_seconds.unwrap_or(DEFAULT_EDGE_TTL_SECS));

    Ok(CacheSettings {
        memory_ttl,
        memory_capacity,
        browser_ttl,
        edge_ttl,
    })
}

fn build_edge_settings(edge: RawEdgeSettings) -> Result<EdgeSettings, LoadError> {
    let backend = match edge.backend {
        Some(value) => EdgeBackend::from_str(&value)
            .map_err(|reason| LoadError::invalid("edge.backend", reason))?,
        None => EdgeBackend::Filesystem,
    };

    let directory = edge
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_EDGE_DIRECTORY));
    if backend == EdgeBackend::Filesystem && directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "edge.directory",
            "path must not be empty",
        ));
    }

    let namespace = edge
        .namespace
        .map(|value| value.trim().trim_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_EDGE_NAMESPACE.to_string());

    let public_base_url = parse_url(edge.public_base_url, "edge.public_base_url")?;

    Ok(EdgeSettings {
        backend,
        directory,
        namespace,
        public_base_url,
    })
}

fn build_cdn_settings(cdn: RawCdnSettings) -> Result<CdnSettings, LoadError> {
    let purge_url = parse_url(cdn.purge_url, "cdn.purge_url")?;
    let token = non_blank(cdn.token);
    let timeout = non_zero_secs(
        cdn.timeout_seconds.unwrap_or(DEFAULT_CDN_TIMEOUT_SECS),
        "cdn.timeout_seconds",
    )?;

    Ok(CdnSettings {
        purge_url,
        token,
        timeout,
    })
}

fn build_task_settings(tasks: RawTaskSettings) -> Result<TaskSettings, LoadError> {
    let queue_capacity = non_zero_usize(
        tasks.queue_capacity.unwrap_or(DEFAULT_TASK_QUEUE_CAPACITY),
        "tasks.queue_capacity",
    )?;
    Ok(TaskSettings { queue_capacity })
}

fn build_backup_settings(backup: RawBackupSettings) -> Result<BackupSettings, LoadError> {
    let object_path = non_blank(backup.object_path)
        .unwrap_or_else(|| DEFAULT_BACKUP_OBJECT_PATH.to_string());
    let schedule =
        non_blank(backup.schedule).unwrap_or_else(|| DEFAULT_BACKUP_SCHEDULE.to_string());

    Ok(BackupSettings {
        enabled: backup.enabled.unwrap_or(true),
        object_path,
        schedule,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    admin_host: Option<String>,
    public_port: Option<u16>,
    admin_port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    memory_ttl_seconds: Option<u64>,
    memory_capacity: Option<u64>,
    browser_ttl_seconds: Option<u64>,
    edge_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEdgeSettings {
    backend: Option<String>,
    directory: Option<PathBuf>,
    namespace: Option<String>,
    public_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCdnSettings {
    purge_url: Option<String>,
    token: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTaskSettings {
    queue_capacity: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBackupSettings {
    enabled: Option<bool>,
    object_path: Option<String>,
    schedule: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_url(value: Option<String>, key: &'static str) -> Result<Option<Url>, LoadError> {
    non_blank(value)
        .map(|raw| {
            Url::parse(&raw).map_err(|err| LoadError::invalid(key, format!("invalid url: {err}")))
        })
        .transpose()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn non_zero_secs(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
