// Error handling for HTTP handlers
// Maps domain errors onto HTTP status codes and the response envelope

use std::fmt::{Display, Formatter};

use actix_web::HttpResponse;

pub use bazaar_common::error::{
    ACCESS_DENIED, DATA_ACCESS_ERROR, FEATURE_NOT_AVAILABLE, ILLEGAL_STATE, PARAMETER_MISSING,
    PARAMETER_VALIDATE_ERROR, RESOURCE_CONFLICT, RESOURCE_NOT_FOUND, SERVER_ERROR,
    USAGE_LIMIT_EXCEEDED,
};
pub use bazaar_common::error::{BazaarError, ErrorCode};

use crate::model::response;

// Local wrapper so handlers can use `?` on anyhow results
// (Cannot impl foreign trait for foreign type due to orphan rules)
#[derive(Debug)]
pub struct AppError {
    inner: anyhow::Error,
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError { inner: value }
    }
}

impl From<BazaarError> for AppError {
    fn from(value: BazaarError) -> Self {
        AppError {
            inner: value.into(),
        }
    }
}

impl AppError {
    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }

    pub fn downcast_ref<E: std::error::Error + Send + Sync + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(value: validator::ValidationErrors) -> Self {
        BazaarError::IllegalArgument(validation_message(&value)).into()
    }
}

/// Flatten field errors into `field: message` pairs, sorted by field name
fn validation_message(errors: &validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| match &error.message {
                Some(message) => format!("{}: {}", field, message),
                None => format!("{}: {}", field, error.code),
            })
        })
        .collect();
    messages.sort();
    messages.join(", ")
}

/// Status and error code for a domain error
pub fn status_and_code(error: &BazaarError) -> (u16, i32) {
    match error {
        BazaarError::IllegalArgument(_) => (400, PARAMETER_VALIDATE_ERROR.code),
        BazaarError::ConfigError(_) => (400, PARAMETER_VALIDATE_ERROR.code),
        BazaarError::AuthError(_) => (401, ACCESS_DENIED.code),
        BazaarError::AccessDenied(_) => (403, ACCESS_DENIED.code),
        BazaarError::FeatureNotAvailable { .. } => (403, FEATURE_NOT_AVAILABLE.code),
        BazaarError::UsageLimitExceeded { .. } => (403, USAGE_LIMIT_EXCEEDED.code),
        BazaarError::NotFound(_) => (404, RESOURCE_NOT_FOUND.code),
        BazaarError::Conflict(_) => (409, RESOURCE_CONFLICT.code),
        BazaarError::IllegalState(_) => (409, ILLEGAL_STATE.code),
        BazaarError::DatabaseError(_) => (500, DATA_ACCESS_ERROR.code),
        BazaarError::InternalError(_) => (500, SERVER_ERROR.code),
    }
}

/// Envelope for a domain error; plan denials carry their details in `data`
pub fn domain_error_response(error: &BazaarError) -> HttpResponse {
    let (status, code) = status_and_code(error);
    match error {
        BazaarError::FeatureNotAvailable { feature, plan } => {
            response::Result::<serde_json::Value>::http_response(
                status,
                code,
                error.to_string(),
                serde_json::json!({
                    "feature": feature,
                    "plan": plan,
                }),
            )
        }
        BazaarError::UsageLimitExceeded {
            feature,
            plan,
            limit,
            used,
        } => response::Result::<serde_json::Value>::http_response(
            status,
            code,
            error.to_string(),
            serde_json::json!({
                "feature": feature,
                "plan": plan,
                "limit": limit,
                "used": used,
            }),
        ),
        _ => {
            if status >= 500 {
                tracing::error!("Request failed: {}", error);
            }
            response::Result::<String>::http_response(status, code, error.to_string(), String::new())
        }
    }
}

impl actix_web::error::ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        if let Some(e) = self.downcast_ref::<BazaarError>() {
            domain_error_response(e)
        } else if let Some(e) = self.downcast_ref::<sea_orm::DbErr>() {
            tracing::error!("Database error: {}", e);
            response::Result::<String>::http_response(
                500,
                DATA_ACCESS_ERROR.code,
                e.to_string(),
                String::new(),
            )
        } else {
            tracing::error!("Unhandled error: {:#}", self.inner);
            response::Result::<String>::http_response(
                500,
                SERVER_ERROR.code,
                self.inner.to_string(),
                String::new(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use actix_web::{ResponseError, http::StatusCode};

    #[test]
    fn test_app_error_from_anyhow() {
        let app_err = AppError::from(anyhow::anyhow!("test error"));
        assert_eq!(format!("{}", app_err), "test error");
        assert_eq!(
            app_err.error_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (BazaarError::IllegalArgument("x".into()), StatusCode::BAD_REQUEST),
            (BazaarError::AuthError("x".into()), StatusCode::UNAUTHORIZED),
            (BazaarError::AccessDenied("x".into()), StatusCode::FORBIDDEN),
            (BazaarError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (BazaarError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                BazaarError::DatabaseError("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(AppError::from(error).error_response().status(), expected);
        }
    }

    #[actix_web::test]
    async fn test_usage_denial_body() {
        let response = domain_error_response(&BazaarError::UsageLimitExceeded {
            feature: "project_posts".to_string(),
            plan: "free".to_string(),
            limit: 3,
            used: 3,
        });
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = actix_web::body::to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], USAGE_LIMIT_EXCEEDED.code);
        assert_eq!(json["data"]["plan"], "free");
        assert_eq!(json["data"]["limit"], 3);
        assert_eq!(json["data"]["used"], 3);
    }

    #[test]
    fn test_validation_errors_are_bad_requests() {
        let mut errors = validator::ValidationErrors::new();
        let mut error = validator::ValidationError::new("length");
        error.message = Some("must be at least 8 characters".into());
        errors.add("password", error);

        let app_err = AppError::from(errors);
        assert_eq!(app_err.error_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            app_err.to_string(),
            "caused: password: must be at least 8 characters"
        );
    }

    #[test]
    fn test_downcast_domain_error() {
        let err: anyhow::Error = BazaarError::NotFound("project 'p'".into()).into();
        let app_err = AppError::from(err);
        assert!(matches!(
            app_err.downcast_ref::<BazaarError>(),
            Some(BazaarError::NotFound(_))
        ));
    }
}
