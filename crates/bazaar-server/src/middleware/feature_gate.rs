// Subscription feature gate middleware
// Rejects requests whose caller's plan lacks a feature or has used up its allowance

use std::rc::Rc;

use actix_service::forward_ready;
use actix_utils::future::{Ready, ok};
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    web::Data,
};
use futures::future::LocalBoxFuture;
use tracing::{debug, warn};

use bazaar_common::{BazaarError, Feature};

use crate::{
    auth::model::AuthContext,
    error::{AppError, domain_error_response},
    metrics,
    model::AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateMode {
    /// Plan must include the feature
    Require,
    /// Plan must include the feature and one use is counted
    Usage,
}

/// Per-route plan check
///
/// `FeatureGate::usage` counts the request before the handler runs and
/// gives the use back when the handler answers with an error status.
#[derive(Debug, Clone, Copy)]
pub struct FeatureGate {
    feature: Feature,
    mode: GateMode,
}

impl FeatureGate {
    pub fn require(feature: Feature) -> Self {
        Self {
            feature,
            mode: GateMode::Require,
        }
    }

    pub fn usage(feature: Feature) -> Self {
        Self {
            feature,
            mode: GateMode::Usage,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for FeatureGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = FeatureGateMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(FeatureGateMiddleware {
            service: Rc::new(service),
            gate: *self,
        })
    }
}

pub struct FeatureGateMiddleware<S> {
    service: Rc<S>,
    gate: FeatureGate,
}

fn reject<B>(req: ServiceRequest, error: &BazaarError) -> ServiceResponse<EitherBody<B>> {
    req.into_response(domain_error_response(error))
        .map_into_right_body()
}

impl<S, B> Service<ServiceRequest> for FeatureGateMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let FeatureGate { feature, mode } = self.gate;

        Box::pin(async move {
            let caller = req
                .extensions()
                .get::<AuthContext>()
                .map(|context| {
                    if context.is_authenticated() {
                        Ok(context.user_id.clone())
                    } else {
                        Err(context.rejection())
                    }
                })
                .unwrap_or_else(|| {
                    Err(BazaarError::AuthError("user not logged in".to_string()))
                });

            let user_id = match caller {
                Ok(user_id) => user_id,
                Err(error) => return Ok(reject(req, &error)),
            };

            let Some(app_state) = req.app_data::<Data<AppState>>().cloned() else {
                tracing::error!("AppState not found in request app_data");
                let error = BazaarError::InternalError("application state missing".to_string());
                return Ok(reject(req, &error));
            };
            let subscriptions = app_state.subscriptions.clone();

            let decision = match mode {
                GateMode::Require => subscriptions
                    .require_feature(&user_id, feature)
                    .await
                    .map(|_| ()),
                GateMode::Usage => subscriptions
                    .consume_usage(&user_id, feature)
                    .await
                    .map(|_| ()),
            };

            if let Err(e) = decision {
                return match e.downcast_ref::<BazaarError>() {
                    Some(
                        error @ (BazaarError::FeatureNotAvailable { plan, .. }
                        | BazaarError::UsageLimitExceeded { plan, .. }),
                    ) => {
                        metrics::record_feature_denial(feature.as_str(), plan);
                        warn!(user_id, %feature, plan = %plan, "{}", error);
                        Ok(reject(req, error))
                    }
                    _ => {
                        let response = AppError::from(e).error_response();
                        Ok(req.into_response(response).map_into_right_body())
                    }
                };
            }

            let res = service.call(req).await?;

            let status = res.status();
            if mode == GateMode::Usage && (status.is_client_error() || status.is_server_error()) {
                debug!(user_id, %feature, %status, "Returning usage of failed request");
                if let Err(e) = subscriptions.release_usage(&user_id, feature).await {
                    warn!(user_id, %feature, "Failed to release usage: {}", e);
                }
            }

            Ok(res.map_into_left_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_modes() {
        let gate = FeatureGate::require(Feature::AnalyticsDashboard);
        assert_eq!(gate.mode, GateMode::Require);
        assert_eq!(gate.feature, Feature::AnalyticsDashboard);

        let gate = FeatureGate::usage(Feature::ProjectPosts);
        assert_eq!(gate.mode, GateMode::Usage);
    }
}
