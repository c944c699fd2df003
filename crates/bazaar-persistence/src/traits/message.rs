//! Message persistence trait

use async_trait::async_trait;

use crate::model::{ConversationSummary, MessageInfo};

#[async_trait]
pub trait MessagePersistence: Send + Sync {
    async fn message_create(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> anyhow::Result<MessageInfo>;

    /// Messages exchanged between two users, oldest first, at most `limit`
    /// of the most recent ones
    async fn message_thread(
        &self,
        user_id: &str,
        peer_id: &str,
        limit: u64,
    ) -> anyhow::Result<Vec<MessageInfo>>;

    /// One summary per peer, most recent conversation first
    async fn message_conversations(&self, user_id: &str)
    -> anyhow::Result<Vec<ConversationSummary>>;

    /// Mark messages from `peer_id` to `user_id` as read
    async fn message_mark_read(&self, user_id: &str, peer_id: &str) -> anyhow::Result<u64>;

    async fn message_unread_count(&self, user_id: &str) -> anyhow::Result<u64>;
}
