//! HTTP server setup

use std::sync::Arc;

use actix_web::{App, HttpServer, dev::Server, middleware::Logger, web};

use crate::{api, middleware::Authentication, model::AppState, ws};

/// Register the REST API under `context_path` and the WebSocket endpoint at `/ws`
pub fn configure_routes(cfg: &mut web::ServiceConfig, context_path: &str) {
    cfg.service(ws::ws_index)
        .service(web::scope(context_path).configure(api::route::routes));
}

/// Creates and binds the main HTTP server.
pub fn main_server(
    app_state: Arc<AppState>,
    context_path: String,
    address: String,
    port: u16,
    workers: Option<usize>,
) -> Result<Server, std::io::Error> {
    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Authentication)
            .app_data(web::Data::from(app_state.clone()))
            .configure(|cfg| configure_routes(cfg, &context_path))
    })
    .disable_signals();

    if let Some(workers) = workers {
        server = server.workers(workers);
    }

    Ok(server.bind((address, port))?.run())
}
