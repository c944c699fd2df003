//! Persistence traits for the storage abstraction layer
//!
//! Each trait covers one aggregate; `PersistenceService` bundles them so the
//! server can hold a single `Arc<dyn PersistenceService>`.

pub mod message;
pub mod notification;
pub mod project;
pub mod subscription;
pub mod user;

pub use message::MessagePersistence;
pub use notification::NotificationPersistence;
pub use project::ProjectPersistence;
pub use subscription::SubscriptionPersistence;
pub use user::UserPersistence;

use async_trait::async_trait;

/// Unified persistence service trait
#[async_trait]
pub trait PersistenceService:
    UserPersistence
    + SubscriptionPersistence
    + ProjectPersistence
    + MessagePersistence
    + NotificationPersistence
    + Send
    + Sync
{
    /// Health check for the storage backend
    async fn health_check(&self) -> anyhow::Result<()>;
}
