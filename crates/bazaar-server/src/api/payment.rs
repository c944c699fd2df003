//! Payment intent endpoints

use actix_web::{HttpResponse, Scope, get, post, web};
use serde::Deserialize;

use bazaar_common::{BazaarError, PlanTier};

use crate::{
    auth::model::AuthUser,
    error::AppError,
    model::{AppState, response},
    service::{PaymentIntent, PaymentIntentStatus, PaymentPurpose},
};

/// Either `plan` or `projectId` with `amountCents`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateIntentRequest {
    plan: Option<PlanTier>,
    project_id: Option<String>,
    amount_cents: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmIntentRequest {
    payment_method: String,
}

#[post("/intents")]
async fn create_intent(
    data: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<CreateIntentRequest>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();
    let intent = match (request.plan, request.project_id) {
        (Some(plan), None) => data.payments.create_plan_intent(&user.user_id, plan).await?,
        (None, Some(project_id)) => {
            let amount_cents = request.amount_cents.ok_or_else(|| {
                BazaarError::IllegalArgument("amountCents is required".to_string())
            })?;
            data.payments
                .create_project_intent(&user.user_id, &project_id, amount_cents)
                .await?
        }
        _ => {
            return Err(BazaarError::IllegalArgument(
                "exactly one of plan or projectId is required".to_string(),
            )
            .into());
        }
    };

    Ok(response::Result::<PaymentIntent>::http_created(intent))
}

#[get("/intents/{id}")]
async fn get_intent(
    data: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let intent = data
        .payments
        .get_intent(&user.user_id, &path.into_inner())
        .await?;
    after_settlement(&data, &intent);
    Ok(response::Result::<PaymentIntent>::http_success(intent))
}

#[post("/intents/{id}/confirm")]
async fn confirm_intent(
    data: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<ConfirmIntentRequest>,
) -> Result<HttpResponse, AppError> {
    let intent = data
        .payments
        .confirm_intent(&user.user_id, &path.into_inner(), &body.payment_method)
        .await?;
    after_settlement(&data, &intent);
    Ok(response::Result::<PaymentIntent>::http_success(intent))
}

#[post("/intents/{id}/cancel")]
async fn cancel_intent(
    data: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let intent = data
        .payments
        .cancel_intent(&user.user_id, &path.into_inner())
        .await?;
    Ok(response::Result::<PaymentIntent>::http_success(intent))
}

fn after_settlement(data: &AppState, intent: &PaymentIntent) {
    if intent.status == PaymentIntentStatus::Succeeded
        && matches!(intent.purpose, PaymentPurpose::PlanUpgrade { .. })
    {
        data.dashboards.invalidate_user(&intent.user_id);
    }
}

pub fn routes() -> Scope {
    web::scope("/payments")
        .service(create_intent)
        .service(get_intent)
        .service(confirm_intent)
        .service(cancel_intent)
}
