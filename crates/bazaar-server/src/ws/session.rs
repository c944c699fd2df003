//! Per-connection relay state
//!
//! A session starts anonymous, binds to a user on the first valid `auth`
//! frame and from then on relays `message` and `typing` frames.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::auth::service::decode_jwt_token_cached;
use crate::error::AppError;
use crate::model::app_state::AppState;

use super::protocol::{ClientEvent, ServerEvent};
use super::registry::EventReceiver;

pub struct RelaySession {
    state: Arc<AppState>,
    connection_id: u64,
    user_id: Option<String>,
    outbound: Option<EventReceiver>,
}

impl RelaySession {
    pub fn new(state: Arc<AppState>) -> Self {
        let connection_id = state.connections.next_connection_id();
        Self {
            state,
            connection_id,
            user_id: None,
            outbound: None,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Handle one text frame, returning the frames to send back to this client
    pub async fn handle_text(&mut self, text: &str) -> Vec<ServerEvent> {
        let event = match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => event,
            Err(e) => {
                debug!(connection_id = self.connection_id, "Invalid frame: {}", e);
                return vec![ServerEvent::error(format!("invalid frame: {}", e))];
            }
        };

        match event {
            ClientEvent::Auth { token, user_id } => vec![self.authenticate(token, user_id)],
            ClientEvent::Message {
                receiver_id,
                content,
            } => {
                let Some(sender_id) = self.user_id.clone() else {
                    return vec![ServerEvent::error("not authenticated")];
                };
                match self
                    .state
                    .messaging
                    .send_message(&sender_id, &receiver_id, &content)
                    .await
                {
                    Ok((message, online)) => {
                        self.state.dashboards.invalidate_user(&receiver_id);
                        vec![ServerEvent::Delivered {
                            id: message.id,
                            receiver_id,
                            online,
                        }]
                    }
                    Err(e) => {
                        let error = AppError::from(e);
                        warn!(sender_id, receiver_id, "Message rejected: {}", error);
                        vec![ServerEvent::error(error.to_string())]
                    }
                }
            }
            ClientEvent::Typing {
                receiver_id,
                is_typing,
            } => {
                let Some(sender_id) = self.user_id.as_deref() else {
                    return vec![ServerEvent::error("not authenticated")];
                };
                self.state
                    .messaging
                    .send_typing(sender_id, &receiver_id, is_typing);
                Vec::new()
            }
        }
    }

    fn authenticate(&mut self, token: Option<String>, user_id: Option<String>) -> ServerEvent {
        let configuration = &self.state.configuration;
        let resolved = match token {
            Some(token) => decode_jwt_token_cached(&token, &configuration.token_secret_key())
                .map(|claims| claims.sub)
                .map_err(|e| format!("authentication failed: {}", e)),
            None if !configuration.auth_enabled() => user_id
                .filter(|id| !id.is_empty())
                .ok_or_else(|| "userId required".to_string()),
            None => Err("token required".to_string()),
        };

        let user_id = match resolved {
            Ok(user_id) => user_id,
            Err(message) => {
                debug!(connection_id = self.connection_id, "{}", message);
                return ServerEvent::error(message);
            }
        };

        if let Some(previous) = self.user_id.take() {
            self.state
                .connections
                .unregister(&previous, self.connection_id);
        }
        let (receiver, replaced) = self.state.connections.register(&user_id, self.connection_id);
        if replaced {
            info!(user_id, connection_id = self.connection_id, "Replaced older connection");
        }
        self.outbound = Some(receiver);
        self.user_id = Some(user_id.clone());

        ServerEvent::AuthOk { user_id }
    }

    /// Next event relayed to this connection.
    ///
    /// Pending until authenticated; `None` once a newer connection of the same
    /// user took over.
    pub async fn next_outbound(&mut self) -> Option<ServerEvent> {
        match self.outbound.as_mut() {
            Some(receiver) => receiver.recv().await,
            None => std::future::pending().await,
        }
    }

    pub fn close(&mut self) {
        self.outbound = None;
        if let Some(user_id) = self.user_id.take() {
            self.state
                .connections
                .unregister(&user_id, self.connection_id);
        }
    }
}

impl Drop for RelaySession {
    fn drop(&mut self) {
        self.close();
    }
}
