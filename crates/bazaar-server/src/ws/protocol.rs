//! Realtime JSON frames
//!
//! Every frame is an object with a `type` discriminator and camelCase fields.

use serde::{Deserialize, Serialize};

use bazaar_persistence::{MessageInfo, NotificationInfo};

/// Frames sent by clients
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Bind the connection to a user. `user_id` is honored only when
    /// authentication is disabled.
    Auth {
        token: Option<String>,
        user_id: Option<String>,
    },
    Message {
        receiver_id: String,
        content: String,
    },
    Typing {
        receiver_id: String,
        #[serde(default = "default_typing")]
        is_typing: bool,
    },
}

fn default_typing() -> bool {
    true
}

/// Frames sent by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    AuthOk {
        user_id: String,
    },
    Message {
        id: i64,
        sender_id: String,
        receiver_id: String,
        content: String,
        timestamp: i64,
    },
    /// Acknowledges a sent message; `online` tells whether it was pushed live
    Delivered {
        id: i64,
        receiver_id: String,
        online: bool,
    },
    Typing {
        sender_id: String,
        is_typing: bool,
    },
    Notification {
        id: i64,
        notification_type: String,
        title: String,
        body: String,
        action_url: Option<String>,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    /// Metric label for relayed events
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::AuthOk { .. } => "auth_ok",
            ServerEvent::Message { .. } => "message",
            ServerEvent::Delivered { .. } => "delivered",
            ServerEvent::Typing { .. } => "typing",
            ServerEvent::Notification { .. } => "notification",
            ServerEvent::Error { .. } => "error",
        }
    }

    pub fn to_json(&self) -> String {
        // Frames hold only strings, integers and bools
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","message":"failed to encode event"}"#.to_string()
        })
    }
}

impl From<&MessageInfo> for ServerEvent {
    fn from(message: &MessageInfo) -> Self {
        ServerEvent::Message {
            id: message.id,
            sender_id: message.sender_id.clone(),
            receiver_id: message.receiver_id.clone(),
            content: message.content.clone(),
            timestamp: message.created_time,
        }
    }
}

impl From<&NotificationInfo> for ServerEvent {
    fn from(notification: &NotificationInfo) -> Self {
        ServerEvent::Notification {
            id: notification.id,
            notification_type: notification.r#type.clone(),
            title: notification.title.clone(),
            body: notification.body.clone(),
            action_url: notification.action_url.clone(),
        }
    }
}
