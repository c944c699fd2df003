//! Dashboard and analytics endpoints

use actix_web::{HttpResponse, get, web};

use bazaar_common::Feature;

use crate::{
    auth::model::AuthUser,
    error::AppError,
    middleware::FeatureGate,
    model::{AppState, response},
};

#[get("/dashboard")]
async fn dashboard(data: web::Data<AppState>, user: AuthUser) -> Result<HttpResponse, AppError> {
    let summary = data.dashboards.dashboard(&user.user_id).await?;
    Ok(response::Result::<serde_json::Value>::http_success(summary))
}

#[get("/analytics", wrap = "FeatureGate::require(Feature::AnalyticsDashboard)")]
async fn analytics(data: web::Data<AppState>, user: AuthUser) -> Result<HttpResponse, AppError> {
    let report = data.dashboards.analytics(&user.user_id).await?;
    Ok(response::Result::<serde_json::Value>::http_success(report))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(dashboard).service(analytics);
}
