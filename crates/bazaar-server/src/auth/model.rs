use std::future::{Ready, ready};

use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use jsonwebtoken::errors::ErrorKind;
use serde::{Deserialize, Serialize};

use bazaar_common::{BazaarError, UserType};

use crate::error::AppError;

pub const ACCESS_TOKEN: &str = "accessToken";
pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const BEARER_PREFIX: &str = "Bearer ";
/// Identity header trusted only when authentication is disabled
pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_TYPE_HEADER: &str = "X-User-Type";

pub const INVALID_CREDENTIALS_MESSAGE: &str = "invalid email or password";

/// JWT payload; `sub` is the user id
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtPayload {
    pub sub: String,
    pub user_type: String,
    pub exp: i64,
}

/// Auth context passed through request extensions
#[derive(Debug, Default, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub user_type: UserType,
    pub jwt_error: Option<jsonwebtoken::errors::Error>,
    pub token_provided: bool,
}

impl AuthContext {
    pub fn is_authenticated(&self) -> bool {
        !self.user_id.is_empty()
    }

    pub fn jwt_error_string(&self) -> String {
        if let Some(e) = &self.jwt_error {
            match e.kind() {
                ErrorKind::ExpiredSignature => "token expired!".to_string(),
                _ => e.to_string(),
            }
        } else {
            String::default()
        }
    }

    /// Reason an unauthenticated request is rejected
    pub fn rejection(&self) -> BazaarError {
        if self.jwt_error.is_some() {
            BazaarError::AuthError(self.jwt_error_string())
        } else if self.token_provided {
            BazaarError::AuthError("invalid token".to_string())
        } else {
            BazaarError::AuthError("user not logged in".to_string())
        }
    }
}

/// Authenticated caller, extracted from the [`AuthContext`]
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub user_type: UserType,
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let result = match req.extensions().get::<AuthContext>() {
            Some(context) if context.is_authenticated() => Ok(AuthUser {
                user_id: context.user_id.clone(),
                user_type: context.user_type,
            }),
            Some(context) => Err(context.rejection().into()),
            None => Err(BazaarError::AuthError("user not logged in".to_string()).into()),
        };
        ready(result)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub access_token: String,
    pub token_ttl: i64,
    pub user: bazaar_persistence::UserInfo,
}
