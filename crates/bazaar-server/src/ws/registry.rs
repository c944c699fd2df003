//! Live connection registry
//!
//! Maps a user id to the outbound channel of its single live connection.
//! A newer connection for the same user replaces the older one; the older
//! session sees its channel close and shuts down.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use crate::metrics;

use super::protocol::ServerEvent;

pub type EventSender = mpsc::UnboundedSender<ServerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

#[derive(Debug)]
struct Connection {
    connection_id: u64,
    sender: EventSender,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, Connection>,
    next_connection_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_connection_id(&self) -> u64 {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Bind `user_id` to a fresh channel for `connection_id`.
    ///
    /// Returns the receiving half and whether an older connection was replaced.
    pub fn register(&self, user_id: &str, connection_id: u64) -> (EventReceiver, bool) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let replaced = self
            .connections
            .insert(
                user_id.to_string(),
                Connection {
                    connection_id,
                    sender,
                },
            )
            .is_some();

        debug!(user_id, connection_id, replaced, "Connection registered");
        metrics::set_ws_connections(self.connections.len());
        (receiver, replaced)
    }

    /// Remove the entry only if it still belongs to `connection_id`
    pub fn unregister(&self, user_id: &str, connection_id: u64) -> bool {
        let removed = self
            .connections
            .remove_if(user_id, |_, connection| {
                connection.connection_id == connection_id
            })
            .is_some();

        if removed {
            debug!(user_id, connection_id, "Connection unregistered");
            metrics::set_ws_connections(self.connections.len());
        }
        removed
    }

    /// Push an event to the user's live connection; false if offline
    pub fn send(&self, user_id: &str, event: ServerEvent) -> bool {
        let kind = event.kind();
        let delivered = self
            .connections
            .get(user_id)
            .is_some_and(|connection| connection.sender.send(event).is_ok());

        if delivered {
            metrics::record_ws_relay(kind);
        }
        delivered
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.connections.contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
