//! Notification endpoints

use actix_web::{HttpResponse, Scope, get, put, web};
use serde::{Deserialize, Serialize};

use bazaar_common::BazaarError;
use bazaar_persistence::NotificationInfo;

use crate::{
    auth::model::AuthUser,
    error::AppError,
    model::{AppState, response},
};

const DEFAULT_NOTIFICATION_LIMIT: u64 = 50;
const MAX_NOTIFICATION_LIMIT: u64 = 200;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationQuery {
    #[serde(default)]
    unread_only: bool,
    limit: Option<u64>,
}

#[derive(Debug, Serialize)]
struct UnreadCount {
    count: u64,
}

#[get("")]
async fn list(
    data: web::Data<AppState>,
    user: AuthUser,
    params: web::Query<NotificationQuery>,
) -> Result<HttpResponse, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_NOTIFICATION_LIMIT)
        .clamp(1, MAX_NOTIFICATION_LIMIT);
    let notifications = data
        .persistence()
        .notification_list(&user.user_id, params.unread_only, limit)
        .await?;
    Ok(response::Result::<Vec<NotificationInfo>>::http_success(notifications))
}

#[get("/unread-count")]
async fn unread_count(
    data: web::Data<AppState>,
    user: AuthUser,
) -> Result<HttpResponse, AppError> {
    let count = data
        .persistence()
        .notification_unread_count(&user.user_id)
        .await?;
    Ok(response::Result::<UnreadCount>::http_success(UnreadCount { count }))
}

#[put("/read-all")]
async fn mark_all_read(
    data: web::Data<AppState>,
    user: AuthUser,
) -> Result<HttpResponse, AppError> {
    let updated = data
        .persistence()
        .notification_mark_all_read(&user.user_id)
        .await?;
    if updated > 0 {
        data.dashboards.invalidate_user(&user.user_id);
    }
    Ok(response::Result::<u64>::http_success(updated))
}

#[put("/{id}/read")]
async fn mark_read(
    data: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    if !data
        .persistence()
        .notification_mark_read(&user.user_id, id)
        .await?
    {
        return Err(BazaarError::NotFound(format!("notification {}", id)).into());
    }
    data.dashboards.invalidate_user(&user.user_id);
    Ok(response::Result::<bool>::http_success(true))
}

pub fn routes() -> Scope {
    web::scope("/notifications")
        .service(list)
        .service(unread_count)
        .service(mark_all_read)
        .service(mark_read)
}
