//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::domain::sitemap::SiteBase;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "playshelf";
const ENV_PREFIX: &str = "PLAYSHELF";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_ADMIN_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 3000;
const DEFAULT_ADMIN_PORT: u16 = 3001;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_CATALOG_BACKEND: &str = "postgres";
const DEFAULT_CATALOG_MAX_CONNECTIONS: u32 = 4;
const DEFAULT_CATALOG_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SITEMAP_REFRESH_SECS: u64 = 60 * 60;

/// Command-line arguments for the Playshelf binary.
#[derive(Debug, Parser)]
#[command(name = "playshelf", version, about = "Playshelf sitemap server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PLAYSHELF_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the public and admin HTTP listeners.
    Serve(Box<ServeArgs>),
    /// Build the sitemap once and write it to stdout or a file.
    Render(RenderArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CatalogOverrides {
    /// Override the catalog backend (postgres|rest).
    #[arg(long = "catalog-backend", value_name = "BACKEND")]
    pub backend: Option<String>,

    /// Override the catalog database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the catalog database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub max_connections: Option<u32>,

    /// Override the hosted catalog REST endpoint.
    #[arg(long = "catalog-rest-url", value_name = "URL", value_hint = ValueHint::Url)]
    pub rest_url: Option<String>,

    /// Override the catalog request timeout.
    #[arg(long = "catalog-request-timeout-seconds", value_name = "SECONDS")]
    pub request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub catalog: CatalogOverrides,

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

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

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

    /// Override the public base URL used in sitemap locations.
    #[arg(long = "sitemap-base-url", value_name = "URL", value_hint = ValueHint::Url)]
    pub sitemap_base_url: Option<String>,

    /// Override the sitemap refresh period.
    #[arg(long = "sitemap-refresh-interval-seconds", value_name = "SECONDS")]
    pub sitemap_refresh_interval_seconds: Option<u64>,

    /// Build the sitemap before accepting requests.
    #[arg(
        long = "sitemap-warm-on-startup",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub sitemap_warm_on_startup: Option<bool>,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub catalog: CatalogOverrides,

    /// Override the public base URL used in sitemap locations.
    #[arg(long = "sitemap-base-url", value_name = "URL", value_hint = ValueHint::Url)]
    pub sitemap_base_url: Option<String>,

    /// Write the sitemap to this file instead of stdout.
    #[arg(long, short, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub catalog: CatalogSettings,
    pub sitemap: SitemapSettings,
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
pub struct CatalogSettings {
    pub source: CatalogSource,
    pub request_timeout: Duration,
}

#[derive(Clone)]
pub enum CatalogSource {
    Postgres {
        url: String,
        max_connections: NonZeroU32,
    },
    Rest {
        endpoint: String,
        api_key: String,
    },
}

// Connection strings and keys carry credentials; keep them out of logs.
impl std::fmt::Debug for CatalogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogSource::Postgres {
                max_connections, ..
            } => f
                .debug_struct("Postgres")
                .field("url", &"<redacted>")
                .field("max_connections", max_connections)
                .finish(),
            CatalogSource::Rest { endpoint, .. } => f
                .debug_struct("Rest")
                .field("endpoint", endpoint)
                .field("api_key", &"<redacted>")
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SitemapSettings {
    pub base: SiteBase,
    pub refresh_interval: Duration,
    pub warm_on_startup: bool,
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
        Some(Command::Render(args)) => raw.apply_render_overrides(args),
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
    catalog: RawCatalogSettings,
    sitemap: RawSitemapSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        overlay(&mut self.server.host, &overrides.server_host);
        overlay(&mut self.server.admin_host, &overrides.server_admin_host);
        overlay(&mut self.server.public_port, &overrides.public_port);
        overlay(&mut self.server.admin_port, &overrides.admin_port);
        overlay(
            &mut self.server.graceful_shutdown_seconds,
            &overrides.server_graceful_shutdown_seconds,
        );
        overlay(&mut self.logging.level, &overrides.log_level);
        overlay(&mut self.logging.json, &overrides.log_json);
        overlay(&mut self.sitemap.base_url, &overrides.sitemap_base_url);
        overlay(
            &mut self.sitemap.refresh_interval_seconds,
            &overrides.sitemap_refresh_interval_seconds,
        );
        overlay(
            &mut self.sitemap.warm_on_startup,
            &overrides.sitemap_warm_on_startup,
        );
        self.catalog.overlay(&overrides.catalog);
    }

    fn apply_render_overrides(&mut self, args: &RenderArgs) {
        overlay(&mut self.sitemap.base_url, &args.sitemap_base_url);
        self.catalog.overlay(&args.catalog);
    }
}

impl RawCatalogSettings {
    fn overlay(&mut self, overrides: &CatalogOverrides) {
        overlay(&mut self.backend, &overrides.backend);
        overlay(&mut self.database_url, &overrides.database_url);
        overlay(&mut self.max_connections, &overrides.max_connections);
        overlay(&mut self.rest_url, &overrides.rest_url);
        overlay(
            &mut self.request_timeout_seconds,
            &overrides.request_timeout_seconds,
        );
    }
}

/// Replace `slot` only when the CLI supplied a value.
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
            catalog,
            sitemap,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let catalog = build_catalog_settings(catalog)?;
        let sitemap = build_sitemap_settings(sitemap)?;

        Ok(Self {
            server,
            logging,
            catalog,
            sitemap,
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

    let graceful_shutdown = positive_seconds(
        "server.graceful_shutdown_seconds",
        server.graceful_shutdown_seconds,
        DEFAULT_GRACEFUL_SHUTDOWN_SECS,
    )?;

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

fn build_catalog_settings(catalog: RawCatalogSettings) -> Result<CatalogSettings, LoadError> {
    let request_timeout = positive_seconds(
        "catalog.request_timeout_seconds",
        catalog.request_timeout_seconds,
        DEFAULT_CATALOG_REQUEST_TIMEOUT_SECS,
    )?;

    let backend = non_blank(catalog.backend)
        .unwrap_or_else(|| DEFAULT_CATALOG_BACKEND.to_string())
        .to_ascii_lowercase();

    let source = match backend.as_str() {
        "postgres" => {
            let url = non_blank(catalog.database_url).ok_or_else(|| {
                LoadError::invalid(
                    "catalog.database_url",
                    "required when catalog.backend is `postgres`",
                )
            })?;
            let max_connections = NonZeroU32::new(
                catalog
                    .max_connections
                    .unwrap_or(DEFAULT_CATALOG_MAX_CONNECTIONS),
            )
            .ok_or_else(|| {
                LoadError::invalid("catalog.max_connections", "must be greater than zero")
            })?;
            CatalogSource::Postgres {
                url,
                max_connections,
            }
        }
        "rest" => {
            let endpoint = non_blank(catalog.rest_url).ok_or_else(|| {
                LoadError::invalid("catalog.rest_url", "required when catalog.backend is `rest`")
            })?;
            let parsed = Url::parse(&endpoint)
                .map_err(|err| LoadError::invalid("catalog.rest_url", err.to_string()))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(LoadError::invalid(
                    "catalog.rest_url",
                    "must use http or https",
                ));
            }
            let api_key = non_blank(catalog.rest_api_key).ok_or_else(|| {
                LoadError::invalid(
                    "catalog.rest_api_key",
                    "required when catalog.backend is `rest`",
                )
            })?;
            CatalogSource::Rest { endpoint, api_key }
        }
        other => {
            return Err(LoadError::invalid(
                "catalog.backend",
                format!("unknown backend `{other}` (expected `postgres` or `rest`)"),
            ));
        }
    };

    Ok(CatalogSettings {
        source,
        request_timeout,
    })
}

fn build_sitemap_settings(sitemap: RawSitemapSettings) -> Result<SitemapSettings, LoadError> {
    let base_url = non_blank(sitemap.base_url)
        .ok_or_else(|| LoadError::invalid("sitemap.base_url", "must be configured"))?;
    let base = SiteBase::parse(&base_url)
        .map_err(|err| LoadError::invalid("sitemap.base_url", err.to_string()))?;

    let refresh_interval = positive_seconds(
        "sitemap.refresh_interval_seconds",
        sitemap.refresh_interval_seconds,
        DEFAULT_SITEMAP_REFRESH_SECS,
    )?;

    Ok(SitemapSettings {
        base,
        refresh_interval,
        warm_on_startup: sitemap.warm_on_startup.unwrap_or(false),
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
struct RawCatalogSettings {
    backend: Option<String>,
    database_url: Option<String>,
    max_connections: Option<u32>,
    rest_url: Option<String>,
    rest_api_key: Option<String>,
    request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSitemapSettings {
    base_url: Option<String>,
    refresh_interval_seconds: Option<u64>,
    warm_on_startup: Option<bool>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn positive_seconds(
    key: &'static str,
    value: Option<u64>,
    default: u64,
) -> Result<Duration, LoadError> {
    match value.unwrap_or(default) {
        0 => Err(LoadError::invalid(key, "must be greater than zero")),
        seconds => Ok(Duration::from_secs(seconds)),
    }
}
