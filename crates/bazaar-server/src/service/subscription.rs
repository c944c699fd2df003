//! Subscription plans, feature checks and usage metering

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use bazaar_common::{
    BazaarError, CacheConfig, CacheManager, Feature, Limit, PlanFeatures, PlanTier, usage_period,
};
use bazaar_persistence::{PersistenceService, SubscriptionInfo, model::SUBSCRIPTION_CANCELLED};

use crate::model::constants::SUBSCRIPTION_PERIOD_DAYS;

use super::fetch_cached;

const PLAN_CACHE: &str = "plan";

fn plan_cache_key(user_id: &str) -> String {
    format!("plan:{}", user_id)
}

/// Usage of one metered feature in the current period
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub feature: Feature,
    pub period: String,
    pub used: u32,
    /// `None` when unlimited
    pub limit: Option<u32>,
}

pub struct SubscriptionService {
    persistence: Arc<dyn PersistenceService>,
    plans: CacheManager<PlanFeatures>,
}

impl SubscriptionService {
    pub fn new(persistence: Arc<dyn PersistenceService>, cache_config: CacheConfig) -> Self {
        Self {
            persistence,
            plans: CacheManager::new(cache_config),
        }
    }

    pub async fn subscription(&self, user_id: &str) -> anyhow::Result<SubscriptionInfo> {
        Ok(self
            .persistence
            .subscription_find(user_id)
            .await?
            .unwrap_or_else(|| SubscriptionInfo::free(user_id)))
    }

    /// Features of the plan currently in effect for the user
    pub async fn current_plan(&self, user_id: &str) -> anyhow::Result<PlanFeatures> {
        let key = plan_cache_key(user_id);
        fetch_cached(PLAN_CACHE, &self.plans, &key, || async {
            let subscription = self.subscription(user_id).await?;
            let tier = subscription.effective_plan(Utc::now().timestamp_millis());
            let features = self
                .persistence
                .plan_find(tier)
                .await?
                .unwrap_or_else(|| tier.features());
            debug!(user_id, plan = %tier, "Resolved plan");
            Ok(features)
        })
        .await
    }

    pub async fn plans(&self) -> anyhow::Result<Vec<PlanFeatures>> {
        let plans = self.persistence.plan_list().await?;
        if plans.is_empty() {
            return Ok(PlanFeatures::catalogue());
        }
        Ok(plans)
    }

    /// Whether the user's plan includes `feature`
    pub async fn check_feature(&self, user_id: &str, feature: Feature) -> anyhow::Result<bool> {
        Ok(self.current_plan(user_id).await?.has_feature(feature))
    }

    /// Fail with `FeatureNotAvailable` unless the plan includes `feature`
    pub async fn require_feature(
        &self,
        user_id: &str,
        feature: Feature,
    ) -> anyhow::Result<PlanFeatures> {
        let plan = self.current_plan(user_id).await?;
        if !plan.has_feature(feature) {
            return Err(BazaarError::FeatureNotAvailable {
                feature: feature.to_string(),
                plan: plan.tier.to_string(),
            }
            .into());
        }
        Ok(plan)
    }

    /// Count one use of a metered feature, returning the new counter value.
    ///
    /// Fails with `FeatureNotAvailable` when the plan excludes the feature and
    /// with `UsageLimitExceeded` when the period's allowance is used up. A
    /// denied attempt leaves the counter unchanged.
    pub async fn consume_usage(&self, user_id: &str, feature: Feature) -> anyhow::Result<u32> {
        let plan = self.current_plan(user_id).await?;
        let limit = plan.limit(feature);
        if limit == Limit::Unavailable {
            return Err(BazaarError::FeatureNotAvailable {
                feature: feature.to_string(),
                plan: plan.tier.to_string(),
            }
            .into());
        }

        let period = usage_period(Utc::now());
        let result = self
            .persistence
            .usage_try_increment(user_id, feature.as_str(), &period, limit.ceiling())
            .await?;

        if !result.allowed {
            return Err(BazaarError::UsageLimitExceeded {
                feature: feature.to_string(),
                plan: plan.tier.to_string(),
                limit: limit.ceiling().unwrap_or_default(),
                used: result.count,
            }
            .into());
        }

        debug!(user_id, %feature, count = result.count, "Usage recorded");
        Ok(result.count)
    }

    /// Give back one use, e.g. when the gated request failed
    pub async fn release_usage(&self, user_id: &str, feature: Feature) -> anyhow::Result<()> {
        let period = usage_period(Utc::now());
        self.persistence
            .usage_release(user_id, feature.as_str(), &period)
            .await
    }

    pub async fn usage_summary(&self, user_id: &str) -> anyhow::Result<Vec<UsageSummary>> {
        let plan = self.current_plan(user_id).await?;
        let period = usage_period(Utc::now());
        let counters = self.persistence.usage_list(user_id, &period).await?;

        Ok(Feature::ALL
            .into_iter()
            .filter(|feature| feature.is_metered())
            .map(|feature| UsageSummary {
                feature,
                period: period.clone(),
                used: counters
                    .iter()
                    .find(|usage| usage.feature == feature.as_str())
                    .map(|usage| usage.count)
                    .unwrap_or(0),
                limit: match plan.limit(feature) {
                    Limit::Unlimited => None,
                    other => other.ceiling(),
                },
            })
            .collect())
    }

    /// Start a new billing period on `tier`
    pub async fn change_plan(
        &self,
        user_id: &str,
        tier: PlanTier,
    ) -> anyhow::Result<SubscriptionInfo> {
        let now = Utc::now();
        let end = now + Duration::days(SUBSCRIPTION_PERIOD_DAYS);
        let subscription = self
            .persistence
            .subscription_upsert(
                user_id,
                tier,
                now.timestamp_millis(),
                end.timestamp_millis(),
            )
            .await?;
        self.invalidate(user_id);

        info!(user_id, plan = %tier, "Subscription plan changed");
        Ok(subscription)
    }

    /// Cancel the paid subscription; the plan stays in effect until the period ends
    pub async fn cancel(&self, user_id: &str) -> anyhow::Result<SubscriptionInfo> {
        let subscription = self.subscription(user_id).await?;
        if subscription.plan == PlanTier::Free {
            return Err(BazaarError::IllegalState("no paid subscription to cancel".to_string()).into());
        }
        if subscription.status == SUBSCRIPTION_CANCELLED {
            return Err(BazaarError::IllegalState("subscription already cancelled".to_string()).into());
        }

        self.persistence
            .subscription_set_status(user_id, SUBSCRIPTION_CANCELLED)
            .await?;
        self.invalidate(user_id);

        info!(user_id, plan = %subscription.plan, "Subscription cancelled");
        self.subscription(user_id).await
    }

    pub fn invalidate(&self, user_id: &str) {
        self.plans.invalidate(&plan_cache_key(user_id));
    }

    pub fn plan_cache(&self) -> &CacheManager<PlanFeatures> {
        &self.plans
    }
}
