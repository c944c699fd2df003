use actix_web::{HttpResponse, Scope, get, post, web};
use serde::Deserialize;
use tracing::{info, warn};
use validator::Validate;

use bazaar_common::{BazaarError, NotificationType, UserType};
use bazaar_persistence::{NewNotification, NewUser, UserInfo};

use crate::{
    auth::{
        model::{AuthUser, INVALID_CREDENTIALS_MESSAGE, LoginResult},
        service::{encode_jwt_token, hash_password, verify_password},
    },
    error::AppError,
    model::{AppState, response},
};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    #[validate(email(message = "must be a valid email address"))]
    email: String,
    #[validate(length(min = 1, max = 100, message = "must be 1 to 100 characters"))]
    name: String,
    #[validate(length(min = 8, max = 128, message = "must be 8 to 128 characters"))]
    password: String,
    #[serde(default)]
    user_type: UserType,
}

#[derive(Debug, Deserialize, Validate)]
struct LoginRequest {
    #[validate(length(min = 1, message = "is required"))]
    email: String,
    #[validate(length(min = 1, message = "is required"))]
    password: String,
}

fn login_result(data: &AppState, user: UserInfo) -> Result<LoginResult, AppError> {
    let token_ttl = data.configuration.token_expire_seconds();
    let access_token = encode_jwt_token(
        &user.id,
        &user.user_type,
        &data.configuration.token_secret_key(),
        token_ttl,
    )
    .map_err(|e| BazaarError::InternalError(format!("failed to issue token: {}", e)))?;

    Ok(LoginResult {
        access_token,
        token_ttl,
        user,
    })
}

#[post("/register")]
async fn register(
    data: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();
    request.validate()?;

    let user = data
        .persistence()
        .user_create(NewUser {
            email: request.email.trim().to_lowercase(),
            name: request.name.trim().to_string(),
            user_type: request.user_type.to_string(),
            password_hash: hash_password(&request.password)?,
        })
        .await?;

    info!(user_id = %user.id, user_type = %user.user_type, "User registered");

    if let Err(e) = data
        .messaging
        .notify(NewNotification {
            user_id: user.id.clone(),
            r#type: NotificationType::System.to_string(),
            title: "Welcome to Bazaar".to_string(),
            body: "Your account is ready. You are on the free plan.".to_string(),
            action_url: Some("/subscriptions/plans".to_string()),
        })
        .await
    {
        warn!(user_id = %user.id, "Failed to create welcome notification: {}", e);
    }

    let result = login_result(&data, user)?;
    Ok(response::Result::<LoginResult>::http_created(result))
}

#[post("/login")]
async fn login(
    data: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();
    request.validate()?;

    let email = request.email.trim().to_lowercase();
    let credentials = data.persistence().user_find_credentials(&email).await?;

    let Some(credentials) = credentials.filter(|c| verify_password(&request.password, &c.password_hash))
    else {
        warn!(email = %email, "Login failed");
        return Err(BazaarError::AuthError(INVALID_CREDENTIALS_MESSAGE.to_string()).into());
    };

    let result = login_result(&data, credentials.user)?;
    Ok(response::Result::<LoginResult>::http_success(result))
}

#[get("/me")]
async fn me(data: web::Data<AppState>, user: AuthUser) -> Result<HttpResponse, AppError> {
    let info = data
        .persistence()
        .user_find_by_id(&user.user_id)
        .await?
        .ok_or_else(|| BazaarError::NotFound(format!("user {}", user.user_id)))?;

    Ok(response::Result::<UserInfo>::http_success(info))
}

pub fn routes() -> Scope {
    web::scope("/auth").service(register).service(login).service(me)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_validation() {
        let request = RegisterRequest {
            email: "not-an-email".to_string(),
            name: "".to_string(),
            password: "short".to_string(),
            user_type: UserType::Client,
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn test_register_defaults_to_client() {
        let request: RegisterRequest = serde_json::from_str(
            r#"{"email":"a@example.com","name":"A","password":"long-enough"}"#,
        )
        .unwrap();
        assert_eq!(request.user_type, UserType::Client);
        assert!(request.validate().is_ok());
    }
}
