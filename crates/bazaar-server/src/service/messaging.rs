//! Direct messages and notifications with live delivery

use std::sync::Arc;

use tracing::{debug, warn};

use bazaar_common::{BazaarError, NotificationType};
use bazaar_persistence::{MessageInfo, NewNotification, NotificationInfo, PersistenceService};

use crate::ws::{ConnectionRegistry, ServerEvent};

/// Upper bound on message content length, in characters
pub const MAX_MESSAGE_LENGTH: usize = 5000;

pub struct MessagingService {
    persistence: Arc<dyn PersistenceService>,
    connections: Arc<ConnectionRegistry>,
}

impl MessagingService {
    pub fn new(
        persistence: Arc<dyn PersistenceService>,
        connections: Arc<ConnectionRegistry>,
    ) -> Self {
        Self {
            persistence,
            connections,
        }
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Store a message and push it to the receiver if connected.
    ///
    /// Returns the stored message and whether it was delivered live. An
    /// offline receiver gets a notification instead.
    pub async fn send_message(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> anyhow::Result<(MessageInfo, bool)> {
        let content = content.trim();
        if content.is_empty() {
            return Err(BazaarError::IllegalArgument("message content is empty".to_string()).into());
        }
        if content.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(BazaarError::IllegalArgument(format!(
                "message content exceeds {} characters",
                MAX_MESSAGE_LENGTH
            ))
            .into());
        }
        if sender_id == receiver_id {
            return Err(
                BazaarError::IllegalArgument("cannot send a message to yourself".to_string()).into(),
            );
        }
        if self.persistence.user_find_by_id(receiver_id).await?.is_none() {
            return Err(BazaarError::NotFound(format!("user {}", receiver_id)).into());
        }

        let message = self
            .persistence
            .message_create(sender_id, receiver_id, content)
            .await?;

        let online = self.connections.send(receiver_id, ServerEvent::from(&message));
        debug!(message_id = message.id, sender_id, receiver_id, online, "Message sent");

        if !online
            && let Err(e) = self
                .persistence
                .notification_create(NewNotification {
                    user_id: receiver_id.to_string(),
                    r#type: NotificationType::Message.to_string(),
                    title: "New message".to_string(),
                    body: preview(content),
                    action_url: Some(format!("/messages/{}", sender_id)),
                })
                .await
        {
            warn!(message_id = message.id, "Failed to record message notification: {}", e);
        }

        Ok((message, online))
    }

    /// Relay a typing indicator; dropped when the receiver is offline
    pub fn send_typing(&self, sender_id: &str, receiver_id: &str, is_typing: bool) -> bool {
        self.connections.send(
            receiver_id,
            ServerEvent::Typing {
                sender_id: sender_id.to_string(),
                is_typing,
            },
        )
    }

    /// Store a notification and push it live when the user is connected
    pub async fn notify(&self, notification: NewNotification) -> anyhow::Result<NotificationInfo> {
        let created = self.persistence.notification_create(notification).await?;
        self.connections
            .send(&created.user_id, ServerEvent::from(&created));
        Ok(created)
    }
}

fn preview(content: &str) -> String {
    const PREVIEW_CHARS: usize = 80;
    if content.chars().count() <= PREVIEW_CHARS {
        return content.to_string();
    }
    let mut short: String = content.chars().take(PREVIEW_CHARS).collect();
    short.push_str("...");
    short
}

#[cfg(test)]
mod tests {
    use super::*;

    use bazaar_persistence::{NewUser, SqlPersistService, init_schema, sea_orm::Database};

    async fn setup() -> (MessagingService, Arc<dyn PersistenceService>, String, String) {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        init_schema(&db).await.unwrap();
        let persistence: Arc<dyn PersistenceService> = Arc::new(SqlPersistService::new(db));

        let mut ids = Vec::new();
        for email in ["a@example.com", "b@example.com"] {
            let user = persistence
                .user_create(NewUser {
                    email: email.to_string(),
                    name: email.to_string(),
                    user_type: "client".to_string(),
                    password_hash: "x".to_string(),
                })
                .await
                .unwrap();
            ids.push(user.id);
        }
        let b = ids.pop().unwrap();
        let a = ids.pop().unwrap();

        let service = MessagingService::new(persistence.clone(), Arc::new(ConnectionRegistry::new()));
        (service, persistence, a, b)
    }

    #[tokio::test]
    async fn test_online_receiver_gets_live_message() {
        let (service, persistence, a, b) = setup().await;
        let (mut rx, _) = service.connections().register(&b, 1);

        let (message, online) = service.send_message(&a, &b, " hello ").await.unwrap();
        assert!(online);
        assert_eq!(message.content, "hello");

        match rx.recv().await {
            Some(ServerEvent::Message { id, sender_id, .. }) => {
                assert_eq!(id, message.id);
                assert_eq!(sender_id, a);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(persistence.notification_unread_count(&b).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_offline_receiver_gets_notification() {
        let (service, persistence, a, b) = setup().await;
        let (_, online) = service.send_message(&a, &b, "are you there?").await.unwrap();
        assert!(!online);
        assert_eq!(persistence.notification_unread_count(&b).await.unwrap(), 1);
        assert_eq!(persistence.message_unread_count(&b).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_messages_are_rejected() {
        let (service, _, a, b) = setup().await;
        assert!(service.send_message(&a, &b, "   ").await.is_err());
        assert!(service.send_message(&a, &a, "me").await.is_err());
        assert!(service.send_message(&a, "ghost", "hi").await.is_err());

        let long = "x".repeat(MAX_MESSAGE_LENGTH + 1);
        assert!(service.send_message(&a, &b, &long).await.is_err());
    }

    #[tokio::test]
    async fn test_typing_dropped_when_offline() {
        let (service, _, a, b) = setup().await;
        assert!(!service.send_typing(&a, &b, true));

        let (mut rx, _) = service.connections().register(&b, 7);
        assert!(service.send_typing(&a, &b, true));
        assert!(matches!(rx.recv().await, Some(ServerEvent::Typing { is_typing: true, .. })));
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview("short"), "short");
        let long = "y".repeat(100);
        assert_eq!(preview(&long).chars().count(), 83);
    }
}
