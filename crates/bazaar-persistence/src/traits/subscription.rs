//! Subscription, plan, and feature usage persistence trait

use async_trait::async_trait;

use bazaar_common::{PlanFeatures, PlanTier};

use crate::model::{FeatureUsageInfo, SubscriptionInfo, UsageIncrement};

#[async_trait]
pub trait SubscriptionPersistence: Send + Sync {
    // ==================== Plan Operations ====================

    /// Find the stored feature row for a plan
    async fn plan_find(&self, tier: PlanTier) -> anyhow::Result<Option<PlanFeatures>>;

    /// All stored plans, cheapest first
    async fn plan_list(&self) -> anyhow::Result<Vec<PlanFeatures>>;

    // ==================== Subscription Operations ====================

    async fn subscription_find(&self, user_id: &str) -> anyhow::Result<Option<SubscriptionInfo>>;

    /// Create or replace a user's subscription as active on `tier`
    async fn subscription_upsert(
        &self,
        user_id: &str,
        tier: PlanTier,
        period_start_millis: i64,
        period_end_millis: i64,
    ) -> anyhow::Result<SubscriptionInfo>;

    /// Set the status of an existing subscription; false if there is none
    async fn subscription_set_status(&self, user_id: &str, status: &str) -> anyhow::Result<bool>;

    // ==================== Usage Operations ====================

    /// Current counter value (0 when no row exists)
    async fn usage_get(&self, user_id: &str, feature: &str, period: &str) -> anyhow::Result<u32>;

    /// Increment the counter unless it already reached `ceiling`.
    ///
    /// `None` means unbounded. The check and the increment happen in a
    /// single conditional update.
    async fn usage_try_increment(
        &self,
        user_id: &str,
        feature: &str,
        period: &str,
        ceiling: Option<u32>,
    ) -> anyhow::Result<UsageIncrement>;

    /// Decrement the counter, saturating at zero
    async fn usage_release(&self, user_id: &str, feature: &str, period: &str)
    -> anyhow::Result<()>;

    async fn usage_list(&self, user_id: &str, period: &str)
    -> anyhow::Result<Vec<FeatureUsageInfo>>;
}
