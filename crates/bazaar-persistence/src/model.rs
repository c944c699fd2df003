//! Domain model types for the persistence abstraction layer
//!
//! These types are used as return values from the persistence traits,
//! decoupled from the SeaORM entities.

use serde::{Deserialize, Serialize};

use bazaar_common::PlanTier;

/// User record without the password hash
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub name: String,
    pub user_type: String,
    pub verification_status: String,
    pub created_time: i64,
}

/// Credentials used by login
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: UserInfo,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub user_type: String,
    pub password_hash: String,
}

/// Subscription status values
pub const SUBSCRIPTION_ACTIVE: &str = "active";
pub const SUBSCRIPTION_CANCELLED: &str = "cancelled";
pub const SUBSCRIPTION_PAST_DUE: &str = "past_due";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    pub user_id: String,
    pub plan: PlanTier,
    pub status: String,
    pub current_period_start: i64,
    pub current_period_end: i64,
}

impl SubscriptionInfo {
    /// Implicit subscription of a user with no subscription row
    pub fn free(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            plan: PlanTier::Free,
            status: SUBSCRIPTION_ACTIVE.to_string(),
            current_period_start: 0,
            current_period_end: 0,
        }
    }

    /// Plan whose features apply at `now_millis`.
    ///
    /// A cancelled subscription keeps its plan until the paid period ends;
    /// past-due subscriptions fall back to free immediately.
    pub fn effective_plan(&self, now_millis: i64) -> PlanTier {
        match self.status.as_str() {
            SUBSCRIPTION_ACTIVE => self.plan,
            SUBSCRIPTION_CANCELLED if now_millis < self.current_period_end => self.plan,
            _ => PlanTier::Free,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureUsageInfo {
    pub feature: String,
    pub period: String,
    pub count: u32,
}

/// Result of an attempted usage increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageIncrement {
    /// Whether the counter was incremented
    pub allowed: bool,
    /// Counter value after the attempt
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub id: String,
    pub client_id: String,
    pub professional_id: Option<String>,
    pub title: String,
    pub description: String,
    pub status: String,
    pub budget_min: i64,
    pub budget_max: i64,
    pub timeline_days: i32,
    pub skills: Vec<String>,
    pub created_time: i64,
    pub modified_time: i64,
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub client_id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub budget_min: i64,
    pub budget_max: i64,
    pub timeline_days: i32,
    pub skills: Vec<String>,
}

/// Project listing filter
#[derive(Debug, Clone, Default)]
pub struct ProjectQuery {
    pub status: Option<String>,
    pub client_id: Option<String>,
    pub professional_id: Option<String>,
    pub page_no: u64,
    pub page_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageInfo {
    pub id: i64,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub read: bool,
    pub created_time: i64,
}

/// Latest message and unread count for one peer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub peer_id: String,
    pub last_message: MessageInfo,
    pub unread_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationInfo {
    pub id: i64,
    pub user_id: String,
    pub r#type: String,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub action_url: Option<String>,
    pub created_time: i64,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: String,
    pub r#type: String,
    pub title: String,
    pub body: String,
    pub action_url: Option<String>,
}

/// Generic paginated result
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub total_count: u64,
    pub page_number: u64,
    pub pages_available: u64,
    pub page_items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(total_count: u64, page_number: u64, page_size: u64, page_items: Vec<T>) -> Self {
        Self {
            total_count,
            page_number,
            pages_available: if page_size > 0 {
                total_count.div_ceil(page_size)
            } else {
                0
            },
            page_items,
        }
    }

    pub fn empty() -> Self {
        Self {
            total_count: 0,
            page_number: 0,
            pages_available: 0,
            page_items: Vec::new(),
        }
    }
}
