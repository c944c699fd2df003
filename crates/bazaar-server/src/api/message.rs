//! Direct message endpoints

use actix_web::{HttpResponse, Scope, get, post, put, web};
use serde::{Deserialize, Serialize};
use validator::Validate;

use bazaar_persistence::{ConversationSummary, MessageInfo};

use crate::{
    auth::model::AuthUser,
    error::AppError,
    model::{AppState, response},
};

const DEFAULT_THREAD_LIMIT: u64 = 50;
const MAX_THREAD_LIMIT: u64 = 200;

#[derive(Debug, Deserialize)]
struct ThreadQuery {
    limit: Option<u64>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest {
    #[validate(length(min = 1, message = "is required"))]
    receiver_id: String,
    #[validate(length(min = 1, max = 5000, message = "must be 1 to 5000 characters"))]
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageResult {
    message: MessageInfo,
    online: bool,
}

#[get("")]
async fn conversations(
    data: web::Data<AppState>,
    user: AuthUser,
) -> Result<HttpResponse, AppError> {
    let conversations = data
        .persistence()
        .message_conversations(&user.user_id)
        .await?;
    Ok(response::Result::<Vec<ConversationSummary>>::http_success(conversations))
}

#[get("/{peer_id}")]
async fn thread(
    data: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
    params: web::Query<ThreadQuery>,
) -> Result<HttpResponse, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_THREAD_LIMIT)
        .clamp(1, MAX_THREAD_LIMIT);
    let messages = data
        .persistence()
        .message_thread(&user.user_id, &path.into_inner(), limit)
        .await?;
    Ok(response::Result::<Vec<MessageInfo>>::http_success(messages))
}

#[post("")]
async fn send(
    data: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();
    request.validate()?;

    let (message, online) = data
        .messaging
        .send_message(&user.user_id, &request.receiver_id, &request.content)
        .await?;
    data.dashboards.invalidate_user(&request.receiver_id);

    Ok(response::Result::<SendMessageResult>::http_created(
        SendMessageResult { message, online },
    ))
}

#[put("/{peer_id}/read")]
async fn mark_read(
    data: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let updated = data
        .persistence()
        .message_mark_read(&user.user_id, &path.into_inner())
        .await?;
    if updated > 0 {
        data.dashboards.invalidate_user(&user.user_id);
    }
    Ok(response::Result::<u64>::http_success(updated))
}

pub fn routes() -> Scope {
    web::scope("/messages")
        .service(conversations)
        .service(send)
        .service(thread)
        .service(mark_read)
}
