//! `SeaORM` Entity definitions

pub mod prelude;

pub mod feature_usage;
pub mod messages;
pub mod notifications;
pub mod plan_features;
pub mod projects;
pub mod subscriptions;
pub mod users;
