//! Bazaar Common - Shared types, plan catalogue, and caching
//!
//! This crate provides the foundational types used across all Bazaar components:
//! - Error types and error codes
//! - The TTL + LRU/FIFO query cache
//! - The subscription plan catalogue (feature flags and usage limits)
//! - Marketplace enums shared by persistence and the server

use serde::{Deserialize, Serialize};

pub mod cache;
pub mod error;
pub mod plan;

// Re-exports for convenience
pub use cache::{CacheConfig, CacheManager, CacheStats, EvictionStrategy};
pub use error::{BazaarError, ErrorCode};
pub use plan::{Feature, Limit, PlanFeatures, PlanTier, usage_period};

/// Query parameter names
pub const USER_ID: &str = "userId";
pub const CLIENT_ID: &str = "clientId";
pub const PROFESSIONAL_ID: &str = "professionalId";

/// Default page size for list endpoints
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Maximum page size accepted by list endpoints
pub const MAX_PAGE_SIZE: u64 = 100;

/// Marketplace role of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    #[default]
    Client,
    Professional,
}

impl UserType {
    pub fn as_str(self) -> &'static str {
        match self {
            UserType::Client => "client",
            UserType::Professional => "professional",
        }
    }
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(UserType::Client),
            "professional" => Ok(UserType::Professional),
            _ => Err(format!("Invalid user type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Unverified,
    Pending,
    Verified,
}

impl VerificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationStatus::Unverified => "unverified",
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
        }
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VerificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unverified" => Ok(VerificationStatus::Unverified),
            "pending" => Ok(VerificationStatus::Pending),
            "verified" => Ok(VerificationStatus::Verified),
            _ => Err(format!("Invalid verification status: {}", s)),
        }
    }
}

/// Project lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    #[default]
    Open,
    InProgress,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    pub const ALL: [ProjectStatus; 5] = [
        ProjectStatus::Draft,
        ProjectStatus::Open,
        ProjectStatus::InProgress,
        ProjectStatus::Completed,
        ProjectStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Draft => "draft",
            ProjectStatus::Open => "open",
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Cancelled => "cancelled",
        }
    }

    /// Whether a project may move from `self` to `next`
    pub fn can_transition_to(self, next: ProjectStatus) -> bool {
        matches!(
            (self, next),
            (ProjectStatus::Draft, ProjectStatus::Open)
                | (ProjectStatus::Open, ProjectStatus::InProgress)
                | (ProjectStatus::Open, ProjectStatus::Cancelled)
                | (ProjectStatus::InProgress, ProjectStatus::Completed)
                | (ProjectStatus::InProgress, ProjectStatus::Cancelled)
        )
    }

    /// Counts against the `active_projects` limit
    pub fn is_active(self) -> bool {
        matches!(self, ProjectStatus::Open | ProjectStatus::InProgress)
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ProjectStatus::Draft),
            "open" => Ok(ProjectStatus::Open),
            "in_progress" => Ok(ProjectStatus::InProgress),
            "completed" => Ok(ProjectStatus::Completed),
            "cancelled" => Ok(ProjectStatus::Cancelled),
            _ => Err(format!("Invalid project status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Message,
    Project,
    Payment,
    #[default]
    System,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationType::Message => "message",
            NotificationType::Project => "project",
            NotificationType::Payment => "payment",
            NotificationType::System => "system",
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(NotificationType::Message),
            "project" => Ok(NotificationType::Project),
            "payment" => Ok(NotificationType::Payment),
            "system" => Ok(NotificationType::System),
            _ => Err(format!("Invalid notification type: {}", s)),
        }
    }
}
