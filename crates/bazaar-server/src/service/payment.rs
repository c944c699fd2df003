//! Payment intents
//!
//! The gateway only creates intents and reports their status. Card handling
//! lives with the payment provider; [`InMemoryPaymentGateway`] mimics a
//! provider in test mode using well-known payment method names.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use bazaar_common::{BazaarError, NotificationType, PlanTier};
use bazaar_persistence::{NewNotification, PersistenceService};

use super::subscription::SubscriptionService;

/// Payment method that is declined by the in-memory gateway
pub const DECLINED_PAYMENT_METHOD: &str = "pm_card_declined";
/// Payment method that settles asynchronously (processing until polled)
pub const DELAYED_PAYMENT_METHOD: &str = "pm_card_delayed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    Processing,
    Succeeded,
    Canceled,
}

impl PaymentIntentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentIntentStatus::RequiresPaymentMethod => "requires_payment_method",
            PaymentIntentStatus::Processing => "processing",
            PaymentIntentStatus::Succeeded => "succeeded",
            PaymentIntentStatus::Canceled => "canceled",
        }
    }
}

/// What an intent pays for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PaymentPurpose {
    PlanUpgrade { plan: PlanTier },
    ProjectPayment { project_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    pub user_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentIntentStatus,
    pub purpose: PaymentPurpose,
    pub last_payment_error: Option<String>,
    pub created_time: i64,
}

#[derive(Debug, Clone)]
pub struct NewPaymentIntent {
    pub user_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub purpose: PaymentPurpose,
}

/// Payment provider boundary
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, intent: NewPaymentIntent) -> anyhow::Result<PaymentIntent>;

    /// Current state of an intent; pending settlements may advance on read
    async fn retrieve_intent(&self, id: &str) -> anyhow::Result<Option<PaymentIntent>>;

    /// Stored state of an intent without polling for settlement
    async fn find_intent(&self, id: &str) -> anyhow::Result<Option<PaymentIntent>>;

    async fn confirm_intent(&self, id: &str, payment_method: &str)
    -> anyhow::Result<PaymentIntent>;

    async fn cancel_intent(&self, id: &str) -> anyhow::Result<PaymentIntent>;
}

fn intent_not_found(id: &str) -> anyhow::Error {
    BazaarError::NotFound(format!("payment intent {}", id)).into()
}

fn intent_state_error(intent: &PaymentIntent, action: &str) -> anyhow::Error {
    BazaarError::IllegalState(format!(
        "cannot {} payment intent {} in status {}",
        action,
        intent.id,
        intent.status.as_str()
    ))
    .into()
}

/// Gateway that keeps intents in memory
#[derive(Debug, Default)]
pub struct InMemoryPaymentGateway {
    intents: DashMap<String, PaymentIntent>,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_intent(&self, intent: NewPaymentIntent) -> anyhow::Result<PaymentIntent> {
        if intent.amount_cents <= 0 {
            return Err(BazaarError::IllegalArgument(
                "payment amount must be positive".to_string(),
            )
            .into());
        }

        let id = format!("pi_{}", uuid::Uuid::new_v4().simple());
        let created = PaymentIntent {
            client_secret: format!("{}_secret_{}", id, uuid::Uuid::new_v4().simple()),
            id: id.clone(),
            user_id: intent.user_id,
            amount_cents: intent.amount_cents,
            currency: intent.currency,
            status: PaymentIntentStatus::RequiresPaymentMethod,
            purpose: intent.purpose,
            last_payment_error: None,
            created_time: Utc::now().timestamp_millis(),
        };
        self.intents.insert(id, created.clone());

        Ok(created)
    }

    async fn retrieve_intent(&self, id: &str) -> anyhow::Result<Option<PaymentIntent>> {
        let Some(mut intent) = self.intents.get_mut(id) else {
            return Ok(None);
        };
        if intent.status == PaymentIntentStatus::Processing {
            intent.status = PaymentIntentStatus::Succeeded;
        }
        Ok(Some(intent.clone()))
    }

    async fn find_intent(&self, id: &str) -> anyhow::Result<Option<PaymentIntent>> {
        Ok(self.intents.get(id).map(|intent| intent.clone()))
    }

    async fn confirm_intent(
        &self,
        id: &str,
        payment_method: &str,
    ) -> anyhow::Result<PaymentIntent> {
        let mut intent = self.intents.get_mut(id).ok_or_else(|| intent_not_found(id))?;
        if intent.status != PaymentIntentStatus::RequiresPaymentMethod {
            return Err(intent_state_error(&intent, "confirm"));
        }

        match payment_method {
            DECLINED_PAYMENT_METHOD => {
                intent.last_payment_error = Some("card declined".to_string());
            }
            DELAYED_PAYMENT_METHOD => {
                intent.status = PaymentIntentStatus::Processing;
                intent.last_payment_error = None;
            }
            _ => {
                intent.status = PaymentIntentStatus::Succeeded;
                intent.last_payment_error = None;
            }
        }

        Ok(intent.clone())
    }

    async fn cancel_intent(&self, id: &str) -> anyhow::Result<PaymentIntent> {
        let mut intent = self.intents.get_mut(id).ok_or_else(|| intent_not_found(id))?;
        match intent.status {
            PaymentIntentStatus::RequiresPaymentMethod | PaymentIntentStatus::Processing => {
                intent.status = PaymentIntentStatus::Canceled;
                Ok(intent.clone())
            }
            _ => Err(intent_state_error(&intent, "cancel")),
        }
    }
}

/// Intent lifecycle on behalf of users, applying succeeded payments once
pub struct PaymentService {
    gateway: Arc<dyn PaymentGateway>,
    subscriptions: Arc<SubscriptionService>,
    persistence: Arc<dyn PersistenceService>,
    currency: String,
    fulfilled: DashMap<String, ()>,
}

impl PaymentService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        subscriptions: Arc<SubscriptionService>,
        persistence: Arc<dyn PersistenceService>,
        currency: String,
    ) -> Self {
        Self {
            gateway,
            subscriptions,
            persistence,
            currency,
            fulfilled: DashMap::new(),
        }
    }

    /// Intent for one billing period of a paid plan
    pub async fn create_plan_intent(
        &self,
        user_id: &str,
        tier: PlanTier,
    ) -> anyhow::Result<PaymentIntent> {
        let plan = self
            .persistence
            .plan_find(tier)
            .await?
            .unwrap_or_else(|| tier.features());
        if plan.monthly_price_cents <= 0 {
            return Err(BazaarError::IllegalArgument(format!(
                "plan {} does not require payment",
                tier
            ))
            .into());
        }

        let intent = self
            .gateway
            .create_intent(NewPaymentIntent {
                user_id: user_id.to_string(),
                amount_cents: plan.monthly_price_cents,
                currency: self.currency.clone(),
                purpose: PaymentPurpose::PlanUpgrade { plan: tier },
            })
            .await?;

        info!(user_id, plan = %tier, intent_id = %intent.id, "Plan payment intent created");
        Ok(intent)
    }

    /// Intent for a client paying a project
    pub async fn create_project_intent(
        &self,
        user_id: &str,
        project_id: &str,
        amount_cents: i64,
    ) -> anyhow::Result<PaymentIntent> {
        let project = self
            .persistence
            .project_find(project_id)
            .await?
            .ok_or_else(|| BazaarError::NotFound(format!("project {}", project_id)))?;
        if project.client_id != user_id {
            return Err(BazaarError::AccessDenied(
                "only the project owner can pay for a project".to_string(),
            )
            .into());
        }

        let intent = self
            .gateway
            .create_intent(NewPaymentIntent {
                user_id: user_id.to_string(),
                amount_cents,
                currency: self.currency.clone(),
                purpose: PaymentPurpose::ProjectPayment {
                    project_id: project_id.to_string(),
                },
            })
            .await?;

        info!(user_id, project_id, intent_id = %intent.id, "Project payment intent created");
        Ok(intent)
    }

    /// Poll an intent owned by `user_id`
    pub async fn get_intent(&self, user_id: &str, id: &str) -> anyhow::Result<PaymentIntent> {
        self.owned_intent(user_id, id).await?;
        let intent = self
            .gateway
            .retrieve_intent(id)
            .await?
            .ok_or_else(|| intent_not_found(id))?;
        self.fulfill(&intent).await?;
        Ok(intent)
    }

    pub async fn confirm_intent(
        &self,
        user_id: &str,
        id: &str,
        payment_method: &str,
    ) -> anyhow::Result<PaymentIntent> {
        self.owned_intent(user_id, id).await?;
        let intent = self.gateway.confirm_intent(id, payment_method).await?;
        if let Some(error) = &intent.last_payment_error {
            warn!(user_id, intent_id = id, error = %error, "Payment failed");
        }
        self.fulfill(&intent).await?;
        Ok(intent)
    }

    pub async fn cancel_intent(&self, user_id: &str, id: &str) -> anyhow::Result<PaymentIntent> {
        self.owned_intent(user_id, id).await?;
        self.gateway.cancel_intent(id).await
    }

    /// Ownership check that leaves a pending settlement untouched
    async fn owned_intent(&self, user_id: &str, id: &str) -> anyhow::Result<PaymentIntent> {
        match self.gateway.find_intent(id).await? {
            Some(intent) if intent.user_id == user_id => Ok(intent),
            _ => Err(intent_not_found(id)),
        }
    }

    /// Apply a succeeded intent's effect exactly once
    async fn fulfill(&self, intent: &PaymentIntent) -> anyhow::Result<()> {
        if intent.status != PaymentIntentStatus::Succeeded {
            return Ok(());
        }
        if self.fulfilled.insert(intent.id.clone(), ()).is_some() {
            return Ok(());
        }

        let (title, body) = match &intent.purpose {
            PaymentPurpose::PlanUpgrade { plan } => {
                if let Err(e) = self.subscriptions.change_plan(&intent.user_id, *plan).await {
                    self.fulfilled.remove(&intent.id);
                    return Err(e);
                }
                (
                    "Subscription activated".to_string(),
                    format!("Your {} plan is now active.", plan),
                )
            }
            PaymentPurpose::ProjectPayment { project_id } => (
                "Payment received".to_string(),
                format!("Payment for project {} succeeded.", project_id),
            ),
        };

        info!(user_id = %intent.user_id, intent_id = %intent.id, "Payment fulfilled");

        if let Err(e) = self
            .persistence
            .notification_create(NewNotification {
                user_id: intent.user_id.clone(),
                r#type: NotificationType::Payment.to_string(),
                title,
                body,
                action_url: None,
            })
            .await
        {
            warn!(intent_id = %intent.id, "Failed to record payment notification: {}", e);
        }

        Ok(())
    }
}
