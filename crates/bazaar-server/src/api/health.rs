//! Liveness and readiness checks

use actix_web::{HttpResponse, Responder, Scope, get, web};
use serde::Serialize;

use crate::model::{AppState, response};

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    database: Option<&'static str>,
}

#[get("/liveness")]
async fn liveness() -> impl Responder {
    response::Result::<HealthStatus>::http_success(HealthStatus {
        status: "UP",
        database: None,
    })
}

#[get("/readiness")]
async fn readiness(data: web::Data<AppState>) -> HttpResponse {
    match data.persistence().health_check().await {
        Ok(()) => response::Result::<HealthStatus>::http_success(HealthStatus {
            status: "UP",
            database: Some("UP"),
        }),
        Err(e) => {
            tracing::warn!("Readiness check failed: {}", e);
            response::Result::<HealthStatus>::http_response(
                503,
                bazaar_common::error::DATA_ACCESS_ERROR.code,
                e.to_string(),
                HealthStatus {
                    status: "DOWN",
                    database: Some("DOWN"),
                },
            )
        }
    }
}

pub fn routes() -> Scope {
    web::scope("/health").service(liveness).service(readiness)
}
