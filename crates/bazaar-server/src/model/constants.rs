// Configuration keys and defaults
//
// Keys are lowercase so that `BAZAAR_SERVER__PORT` style environment
// variables map onto the same paths as conf/application.yml.

pub const SERVER_ADDRESS: &str = "server.address";
pub const SERVER_PORT: &str = "server.port";
pub const SERVER_CONTEXT_PATH: &str = "server.context_path";
pub const SERVER_WORKERS: &str = "server.workers";

pub const DEFAULT_SERVER_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_CONTEXT_PATH: &str = "/api";

pub const DB_URL: &str = "db.url";
pub const DB_MAX_CONNECTIONS: &str = "db.pool.max_connections";
pub const DB_MIN_CONNECTIONS: &str = "db.pool.min_connections";
pub const DB_CONNECT_TIMEOUT: &str = "db.pool.connect_timeout";
pub const DB_SQLX_LOGGING: &str = "db.pool.sqlx_logging";

pub const DEFAULT_DB_URL: &str = "sqlite://bazaar.db?mode=rwc";

pub const AUTH_ENABLED: &str = "auth.enabled";
pub const AUTH_TOKEN_SECRET_KEY: &str = "auth.token.secret_key";
pub const AUTH_TOKEN_EXPIRE_SECONDS: &str = "auth.token.expire_seconds";

pub const DEFAULT_TOKEN_SECRET_KEY: &str = "bazaar-development-secret-change-me";
pub const DEFAULT_TOKEN_EXPIRE_SECONDS: i64 = 18_000;

pub const CACHE_TTL_SECONDS: &str = "cache.ttl_seconds";
pub const CACHE_MAX_ITEMS: &str = "cache.max_items";
pub const CACHE_STRATEGY: &str = "cache.strategy";

pub const WS_HEARTBEAT_INTERVAL: &str = "ws.heartbeat_interval_seconds";
pub const WS_CLIENT_TIMEOUT: &str = "ws.client_timeout_seconds";

pub const DEFAULT_WS_HEARTBEAT_INTERVAL: u64 = 10;
pub const DEFAULT_WS_CLIENT_TIMEOUT: u64 = 30;

pub const LOG_DIR: &str = "logs.path";
pub const LOG_LEVEL: &str = "logs.level";
pub const LOG_CONSOLE: &str = "logs.console";
pub const LOG_FILE: &str = "logs.file";

pub const PAYMENT_CURRENCY: &str = "payment.currency";
pub const DEFAULT_PAYMENT_CURRENCY: &str = "usd";

/// Length of a paid subscription period
pub const SUBSCRIPTION_PERIOD_DAYS: i64 = 30;
