//! Subscription plan endpoints

use actix_web::{HttpResponse, Scope, get, post, web};
use serde::{Deserialize, Serialize};

use bazaar_common::{PlanFeatures, PlanTier};
use bazaar_persistence::SubscriptionInfo;

use crate::{
    auth::model::AuthUser,
    error::AppError,
    model::{AppState, response},
    service::{PaymentIntent, UsageSummary},
};

#[derive(Debug, Deserialize)]
struct ChangePlanRequest {
    plan: PlanTier,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CurrentSubscription {
    subscription: SubscriptionInfo,
    features: PlanFeatures,
}

/// Downgrades to free apply at once; paid plans need a confirmed payment
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChangePlanResult {
    subscription: Option<SubscriptionInfo>,
    payment_intent: Option<PaymentIntent>,
}

#[get("/plans")]
async fn plans(data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let plans = data.subscriptions.plans().await?;
    Ok(response::Result::<Vec<PlanFeatures>>::http_success(plans))
}

#[get("/current")]
async fn current(data: web::Data<AppState>, user: AuthUser) -> Result<HttpResponse, AppError> {
    let subscription = data.subscriptions.subscription(&user.user_id).await?;
    let features = data.subscriptions.current_plan(&user.user_id).await?;
    Ok(response::Result::<CurrentSubscription>::http_success(
        CurrentSubscription {
            subscription,
            features,
        },
    ))
}

#[post("/change")]
async fn change(
    data: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<ChangePlanRequest>,
) -> Result<HttpResponse, AppError> {
    let result = if body.plan == PlanTier::Free {
        let subscription = data
            .subscriptions
            .change_plan(&user.user_id, PlanTier::Free)
            .await?;
        data.dashboards.invalidate_user(&user.user_id);
        ChangePlanResult {
            subscription: Some(subscription),
            payment_intent: None,
        }
    } else {
        let intent = data
            .payments
            .create_plan_intent(&user.user_id, body.plan)
            .await?;
        ChangePlanResult {
            subscription: None,
            payment_intent: Some(intent),
        }
    };

    Ok(response::Result::<ChangePlanResult>::http_success(result))
}

#[post("/cancel")]
async fn cancel(data: web::Data<AppState>, user: AuthUser) -> Result<HttpResponse, AppError> {
    let subscription = data.subscriptions.cancel(&user.user_id).await?;
    data.dashboards.invalidate_user(&user.user_id);
    Ok(response::Result::<SubscriptionInfo>::http_success(subscription))
}

#[get("/usage")]
async fn usage(data: web::Data<AppState>, user: AuthUser) -> Result<HttpResponse, AppError> {
    let usage = data.subscriptions.usage_summary(&user.user_id).await?;
    Ok(response::Result::<Vec<UsageSummary>>::http_success(usage))
}

pub fn routes() -> Scope {
    web::scope("/subscriptions")
        .service(plans)
        .service(current)
        .service(change)
        .service(cancel)
        .service(usage)
}
