// Authentication middleware for Actix-web
// Resolves the caller from a JWT and stores an AuthContext in the request extensions

use actix_service::forward_ready;
use actix_utils::future::{Ready, ok};
use actix_web::{
    Error, HttpMessage,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::Method,
    web::Data,
};

use futures::future::LocalBoxFuture;

use bazaar_common::UserType;

use crate::{
    auth::{
        model::{
            ACCESS_TOKEN, AUTHORIZATION_HEADER, AuthContext, BEARER_PREFIX, USER_ID_HEADER,
            USER_TYPE_HEADER,
        },
        service::decode_jwt_token_cached,
    },
    model::AppState,
};

// Authentication middleware transformer
pub struct Authentication;

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthenticationMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthenticationMiddleware { service })
    }
}

pub struct AuthenticationMiddleware<S> {
    service: S,
}

fn header_value(req: &ServiceRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Extract token from request using 3 sources in priority order:
/// 1. `accessToken` HTTP header
/// 2. `Authorization: Bearer <token>` header
/// 3. `accessToken` query parameter
fn extract_token(req: &ServiceRequest) -> Option<String> {
    if let Some(token) = header_value(req, ACCESS_TOKEN) {
        return Some(token);
    }

    if let Some(value) = header_value(req, AUTHORIZATION_HEADER)
        && let Some(token) = value.strip_prefix(BEARER_PREFIX)
    {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    if let Some(query) = req.uri().query() {
        for pair in query.split('&') {
            if let Some((key, value)) = pair.split_once('=')
                && key == ACCESS_TOKEN
                && !value.is_empty()
            {
                return Some(value.to_string());
            }
        }
    }

    None
}

/// Resolve the caller for one request
fn resolve_context(req: &ServiceRequest, app_state: &AppState) -> AuthContext {
    let mut auth_context = AuthContext::default();

    if let Some(token) = extract_token(req) {
        auth_context.token_provided = true;

        let secret_key = app_state.configuration.token_secret_key();
        match decode_jwt_token_cached(&token, &secret_key) {
            Ok(claims) => {
                auth_context.user_id = claims.sub;
                auth_context.user_type = claims.user_type.parse().unwrap_or_default();
            }
            Err(err) => {
                auth_context.jwt_error = Some(err);
            }
        }
        return auth_context;
    }

    // Trusted identity headers, for deployments behind an authenticating proxy
    if !app_state.configuration.auth_enabled()
        && let Some(user_id) = header_value(req, USER_ID_HEADER)
    {
        auth_context.user_id = user_id;
        auth_context.user_type = header_value(req, USER_TYPE_HEADER)
            .and_then(|v| v.parse::<UserType>().ok())
            .unwrap_or_default();
    }

    auth_context
}

impl<S, B> Service<ServiceRequest> for AuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if Method::OPTIONS != *req.method() {
            let auth_context = match req.app_data::<Data<AppState>>() {
                Some(app_state) => resolve_context(&req, app_state),
                None => {
                    tracing::error!("AppState not found in request app_data");
                    AuthContext::default()
                }
            };

            // Always insert AuthContext so extractors and the feature gate can inspect it
            req.extensions_mut().insert(auth_context);
        }

        let res = self.service.call(req);

        Box::pin(async move { res.await.map(ServiceResponse::map_into_left_body) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use actix_web::test::TestRequest;

    #[test]
    fn test_extract_token_priority() {
        let req = TestRequest::default()
            .uri("/projects?accessToken=from-query")
            .insert_header((AUTHORIZATION_HEADER, "Bearer from-bearer"))
            .insert_header((ACCESS_TOKEN, "from-header"))
            .to_srv_request();
        assert_eq!(extract_token(&req).as_deref(), Some("from-header"));

        let req = TestRequest::default()
            .uri("/projects?accessToken=from-query")
            .insert_header((AUTHORIZATION_HEADER, "Bearer from-bearer"))
            .to_srv_request();
        assert_eq!(extract_token(&req).as_deref(), Some("from-bearer"));

        let req = TestRequest::default()
            .uri("/projects?page=1&accessToken=from-query")
            .to_srv_request();
        assert_eq!(extract_token(&req).as_deref(), Some("from-query"));
    }

    #[test]
    fn test_extract_token_ignores_blank_values() {
        let req = TestRequest::default()
            .insert_header((ACCESS_TOKEN, "   "))
            .insert_header((AUTHORIZATION_HEADER, "Basic abc"))
            .uri("/projects?accessToken=")
            .to_srv_request();
        assert!(extract_token(&req).is_none());
    }
}
