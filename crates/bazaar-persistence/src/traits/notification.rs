//! Notification persistence trait

use async_trait::async_trait;

use crate::model::{NewNotification, NotificationInfo};

#[async_trait]
pub trait NotificationPersistence: Send + Sync {
    async fn notification_create(
        &self,
        notification: NewNotification,
    ) -> anyhow::Result<NotificationInfo>;

    /// Newest first, at most `limit`
    async fn notification_list(
        &self,
        user_id: &str,
        unread_only: bool,
        limit: u64,
    ) -> anyhow::Result<Vec<NotificationInfo>>;

    /// Mark one notification read; false if it does not belong to the user
    async fn notification_mark_read(&self, user_id: &str, id: i64) -> anyhow::Result<bool>;

    async fn notification_mark_all_read(&self, user_id: &str) -> anyhow::Result<u64>;

    async fn notification_unread_count(&self, user_id: &str) -> anyhow::Result<u64>;
}
