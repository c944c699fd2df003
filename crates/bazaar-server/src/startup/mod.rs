//! Application startup utilities module.
//!
//! Logging, HTTP server construction and shutdown signal handling.

mod http;
mod logging;
mod shutdown;

pub use http::{configure_routes, main_server};
pub use logging::{LogRotation, LoggingConfig, LoggingGuard, init_logging};
pub use shutdown::{ShutdownSignal, wait_for_shutdown_signal};
