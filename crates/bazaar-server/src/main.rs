//! Main entry point for the Bazaar server.

use std::sync::Arc;

use bazaar_persistence::{PersistenceService, SqlPersistService, init_schema};
use bazaar_server::{
    model::{AppState, Configuration},
    service::InMemoryPaymentGateway,
    startup,
};
use tracing::{error, info};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let configuration = Configuration::new()?;

    let logging_config = configuration.logging_config();
    let _logging_guard = startup::init_logging(&logging_config)?;

    bazaar_server::metrics::init_metrics();

    let database_url = configuration.database_url();
    info!("Connecting to database {}", database_url);
    let db = configuration.database_connection().await?;
    init_schema(&db).await?;

    let persistence: Arc<dyn PersistenceService> = Arc::new(SqlPersistService::new(db));
    let app_state = Arc::new(AppState::new(
        configuration.clone(),
        persistence,
        Arc::new(InMemoryPaymentGateway::new()),
    ));

    let address = configuration.server_address();
    let port = configuration.server_port();
    let context_path = configuration.server_context_path();
    if !configuration.auth_enabled() {
        info!("Authentication disabled, trusting identity headers");
    }

    info!("Starting Bazaar server on {}:{}{}", address, port, context_path);
    let server = startup::main_server(
        app_state.clone(),
        context_path,
        address,
        port,
        configuration.server_workers(),
    )?;
    let handle = server.handle();

    let shutdown = startup::wait_for_shutdown_signal();
    let mut shutdown_rx = shutdown.subscribe();

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = shutdown_rx.recv() => {
            info!("Stopping HTTP server...");
            handle.stop(true).await;
        }
    }

    info!(
        connections = app_state.connections.len(),
        "Bazaar server shutdown complete"
    );
    Ok(())
}
