//! Configuration management for the Bazaar server
//!
//! Values come from `conf/application.yml` (optional), `BAZAAR_*`
//! environment variables and command line overrides, in increasing priority.

use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use bazaar_common::{CacheConfig, EvictionStrategy};

use crate::startup::LoggingConfig;

use super::constants::*;

/// Command line arguments for the server
#[derive(Debug, Parser)]
#[command(name = "bazaar-server", version, about = "Bazaar marketplace backend")]
struct Cli {
    /// Configuration file
    #[arg(short = 'c', long = "config", default_value = "conf/application.yml")]
    config_file: String,
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,
    #[arg(long = "db-url", env = "DATABASE_URL")]
    database_url: Option<String>,
    #[arg(long = "log-dir")]
    log_dir: Option<String>,
}

/// Application configuration loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    /// Load configuration using the process command line
    pub fn new() -> anyhow::Result<Self> {
        let args = Cli::parse();

        let mut builder = Config::builder()
            .add_source(File::with_name(&args.config_file).required(false))
            .add_source(
                Environment::with_prefix("BAZAAR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Some(v) = args.port {
            builder = builder.set_override(SERVER_PORT, i64::from(v))?;
        }
        if let Some(v) = args.database_url {
            builder = builder.set_override(DB_URL, v)?;
        }
        if let Some(v) = args.log_dir {
            builder = builder.set_override(LOG_DIR, v)?;
        }

        Ok(Self::from_config(builder.build()?))
    }

    pub fn from_config(config: Config) -> Self {
        Configuration { config }
    }

    // ========================================================================
    // Server Configuration
    // ========================================================================

    pub fn server_address(&self) -> String {
        self.config
            .get_string(SERVER_ADDRESS)
            .unwrap_or(DEFAULT_SERVER_ADDRESS.to_string())
    }

    pub fn server_port(&self) -> u16 {
        self.config
            .get_int(SERVER_PORT)
            .ok()
            .and_then(|v| u16::try_from(v).ok())
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    pub fn server_context_path(&self) -> String {
        let path = self
            .config
            .get_string(SERVER_CONTEXT_PATH)
            .unwrap_or(DEFAULT_CONTEXT_PATH.to_string());
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        }
    }

    /// Worker count; `None` lets actix pick one per core
    pub fn server_workers(&self) -> Option<usize> {
        self.config
            .get_int(SERVER_WORKERS)
            .ok()
            .and_then(|v| usize::try_from(v).ok())
            .filter(|v| *v > 0)
    }

    // ========================================================================
    // Database Configuration
    // ========================================================================

    pub fn database_url(&self) -> String {
        self.config
            .get_string(DB_URL)
            .unwrap_or(DEFAULT_DB_URL.to_string())
    }

    pub async fn database_connection(&self) -> anyhow::Result<DatabaseConnection> {
        let max_connections = self.config.get_int(DB_MAX_CONNECTIONS).unwrap_or(10) as u32;
        let min_connections = self.config.get_int(DB_MIN_CONNECTIONS).unwrap_or(1) as u32;
        let connect_timeout = self.config.get_int(DB_CONNECT_TIMEOUT).unwrap_or(30) as u64;
        let sqlx_logging = self.config.get_bool(DB_SQLX_LOGGING).unwrap_or(false);

        let url = self.database_url();

        let mut opt = ConnectOptions::new(url.clone());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(connect_timeout))
            .sqlx_logging(sqlx_logging)
            .sqlx_logging_level(tracing::log::LevelFilter::Debug);

        tracing::info!(
            url = %url,
            max_connections = max_connections,
            min_connections = min_connections,
            connect_timeout = connect_timeout,
            sqlx_logging = sqlx_logging,
            "Database connection pool configured"
        );

        let database_connection: DatabaseConnection = Database::connect(opt).await?;

        Ok(database_connection)
    }

    // ========================================================================
    // Auth Configuration
    // ========================================================================

    pub fn auth_enabled(&self) -> bool {
        self.config.get_bool(AUTH_ENABLED).unwrap_or(true)
    }

    pub fn token_secret_key(&self) -> String {
        self.config
            .get_string(AUTH_TOKEN_SECRET_KEY)
            .unwrap_or(DEFAULT_TOKEN_SECRET_KEY.to_string())
    }

    pub fn token_expire_seconds(&self) -> i64 {
        self.config
            .get_int(AUTH_TOKEN_EXPIRE_SECONDS)
            .unwrap_or(DEFAULT_TOKEN_EXPIRE_SECONDS)
    }

    // ========================================================================
    // Cache, WebSocket and Payment Configuration
    // ========================================================================

    pub fn cache_config(&self) -> CacheConfig {
        let defaults = CacheConfig::default();

        let ttl = self
            .config
            .get_int(CACHE_TTL_SECONDS)
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.ttl);
        let max_items = self
            .config
            .get_int(CACHE_MAX_ITEMS)
            .ok()
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(defaults.max_items);
        let strategy = match self.config.get_string(CACHE_STRATEGY) {
            Ok(v) => v.parse().unwrap_or_else(|e| {
                tracing::warn!("{}, falling back to {}", e, EvictionStrategy::default());
                EvictionStrategy::default()
            }),
            Err(_) => defaults.strategy,
        };

        CacheConfig {
            ttl,
            max_items,
            strategy,
        }
    }

    pub fn ws_heartbeat_interval(&self) -> Duration {
        Duration::from_secs(
            self.config
                .get_int(WS_HEARTBEAT_INTERVAL)
                .ok()
                .and_then(|v| u64::try_from(v).ok())
                .unwrap_or(DEFAULT_WS_HEARTBEAT_INTERVAL),
        )
    }

    pub fn ws_client_timeout(&self) -> Duration {
        Duration::from_secs(
            self.config
                .get_int(WS_CLIENT_TIMEOUT)
                .ok()
                .and_then(|v| u64::try_from(v).ok())
                .unwrap_or(DEFAULT_WS_CLIENT_TIMEOUT),
        )
    }

    pub fn payment_currency(&self) -> String {
        self.config
            .get_string(PAYMENT_CURRENCY)
            .unwrap_or(DEFAULT_PAYMENT_CURRENCY.to_string())
    }

    // ========================================================================
    // Logging Configuration
    // ========================================================================

    /// Logging settings; `BAZAAR_LOG_*` variables take effect when the
    /// configuration file has no `logs` section
    pub fn logging_config(&self) -> LoggingConfig {
        if self.config.get_table("logs").is_err() {
            return LoggingConfig::from_env();
        }

        LoggingConfig::from_config(
            self.config.get_string(LOG_DIR).ok(),
            self.config.get_bool(LOG_CONSOLE).unwrap_or(true),
            self.config.get_bool(LOG_FILE).unwrap_or(true),
            self.config
                .get_string(LOG_LEVEL)
                .unwrap_or("info".to_string()),
        )
    }
}
