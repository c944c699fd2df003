//! `SeaORM` Entity prelude

pub use super::feature_usage::Entity as FeatureUsage;
pub use super::messages::Entity as Messages;
pub use super::notifications::Entity as Notifications;
pub use super::plan_features::Entity as PlanFeatures;
pub use super::projects::Entity as Projects;
pub use super::subscriptions::Entity as Subscriptions;
pub use super::users::Entity as Users;
