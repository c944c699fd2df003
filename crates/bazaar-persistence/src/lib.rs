//! Bazaar Persistence - Database entities and persistence layer
//!
//! This crate provides:
//! - SeaORM entity definitions
//! - Schema bootstrap and plan seeding
//! - Persistence trait abstractions and the SQL backend

pub mod entity;
pub mod model;
pub mod schema;
pub mod sql;
pub mod traits;

// Re-export sea-orm for convenience
pub use sea_orm;

// Entity aliases stay namespaced; `PlanFeatures` would clash with the catalogue type
pub use entity::prelude;

pub use schema::{init_schema, seed_plans};

pub use traits::{
    MessagePersistence, NotificationPersistence, PersistenceService, ProjectPersistence,
    SubscriptionPersistence, UserPersistence,
};

pub use sql::SqlPersistService;

pub use model::{
    ConversationSummary, FeatureUsageInfo, MessageInfo, NewNotification, NewProject, NewUser,
    NotificationInfo, Page, ProjectInfo, ProjectQuery, SUBSCRIPTION_ACTIVE,
    SUBSCRIPTION_CANCELLED, SUBSCRIPTION_PAST_DUE, SubscriptionInfo, UsageIncrement,
    UserCredentials, UserInfo,
};
