//! User persistence trait

use async_trait::async_trait;

use crate::model::{NewUser, UserCredentials, UserInfo};

#[async_trait]
pub trait UserPersistence: Send + Sync {
    /// Create a user; fails if the email is already registered
    async fn user_create(&self, user: NewUser) -> anyhow::Result<UserInfo>;

    async fn user_find_by_id(&self, id: &str) -> anyhow::Result<Option<UserInfo>>;

    /// Find a user with its password hash, for login
    async fn user_find_credentials(&self, email: &str) -> anyhow::Result<Option<UserCredentials>>;

    /// Update verification status, returning false if the user does not exist
    async fn user_update_verification(&self, id: &str, status: &str) -> anyhow::Result<bool>;
}
