//! Subscription plan catalogue
//!
//! Plans are static configuration: each [`PlanTier`] maps to a fixed
//! [`PlanFeatures`] row of boolean feature flags and numeric usage limits.
//! The same table seeds the `plan_features` database rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription tier, ordered from lowest to highest
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    Free,
    Professional,
    Business,
    Elite,
}

impl PlanTier {
    pub const ALL: [PlanTier; 4] = [
        PlanTier::Free,
        PlanTier::Professional,
        PlanTier::Business,
        PlanTier::Elite,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Professional => "professional",
            PlanTier::Business => "business",
            PlanTier::Elite => "elite",
        }
    }

    pub fn features(self) -> PlanFeatures {
        PlanFeatures::for_tier(self)
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(PlanTier::Free),
            "professional" => Ok(PlanTier::Professional),
            "business" => Ok(PlanTier::Business),
            "elite" => Ok(PlanTier::Elite),
            _ => Err(format!("Invalid plan: {}", s)),
        }
    }
}

/// A gated capability: either a boolean flag or a counted usage limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    FeaturedListings,
    PrioritySupport,
    AnalyticsDashboard,
    CustomBranding,
    ApiAccess,
    ProjectPosts,
    Proposals,
    ActiveProjects,
    PortfolioItems,
    TeamMembers,
}

impl Feature {
    pub const ALL: [Feature; 10] = [
        Feature::FeaturedListings,
        Feature::PrioritySupport,
        Feature::AnalyticsDashboard,
        Feature::CustomBranding,
        Feature::ApiAccess,
        Feature::ProjectPosts,
        Feature::Proposals,
        Feature::ActiveProjects,
        Feature::PortfolioItems,
        Feature::TeamMembers,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Feature::FeaturedListings => "featured_listings",
            Feature::PrioritySupport => "priority_support",
            Feature::AnalyticsDashboard => "analytics_dashboard",
            Feature::CustomBranding => "custom_branding",
            Feature::ApiAccess => "api_access",
            Feature::ProjectPosts => "project_posts",
            Feature::Proposals => "proposals",
            Feature::ActiveProjects => "active_projects",
            Feature::PortfolioItems => "portfolio_items",
            Feature::TeamMembers => "team_members",
        }
    }

    /// Whether this feature is metered by a usage counter
    pub fn is_metered(self) -> bool {
        matches!(
            self,
            Feature::ProjectPosts
                | Feature::Proposals
                | Feature::ActiveProjects
                | Feature::PortfolioItems
                | Feature::TeamMembers
        )
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("Invalid feature: {}", s))
    }
}

/// Effective limit of a feature on a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum Limit {
    Unavailable,
    Max(u32),
    Unlimited,
}

impl Limit {
    /// Whether one more use is allowed after `used` uses
    pub fn allows(self, used: u32) -> bool {
        match self {
            Limit::Unavailable => false,
            Limit::Max(max) => used < max,
            Limit::Unlimited => true,
        }
    }

    /// Numeric ceiling for counter updates (`None` means unbounded)
    pub fn ceiling(self) -> Option<u32> {
        match self {
            Limit::Unavailable => Some(0),
            Limit::Max(max) => Some(max),
            Limit::Unlimited => None,
        }
    }
}

/// Feature flags and usage limits for one plan
///
/// Limit fields use `None` for unlimited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanFeatures {
    pub tier: PlanTier,
    pub monthly_price_cents: i64,
    /// Platform commission in basis points (1500 = 15%)
    pub commission_bps: u32,
    pub featured_listings: bool,
    pub priority_support: bool,
    pub analytics_dashboard: bool,
    pub custom_branding: bool,
    pub api_access: bool,
    pub project_posts: Option<u32>,
    pub proposals: Option<u32>,
    pub active_projects: Option<u32>,
    pub portfolio_items: Option<u32>,
    pub team_members: Option<u32>,
}

impl PlanFeatures {
    pub fn for_tier(tier: PlanTier) -> Self {
        match tier {
            PlanTier::Free => PlanFeatures {
                tier,
                monthly_price_cents: 0,
                commission_bps: 2000,
                featured_listings: false,
                priority_support: false,
                analytics_dashboard: false,
                custom_branding: false,
                api_access: false,
                project_posts: Some(3),
                proposals: Some(10),
                active_projects: Some(2),
                portfolio_items: Some(5),
                team_members: Some(1),
            },
            PlanTier::Professional => PlanFeatures {
                tier,
                monthly_price_cents: 2900,
                commission_bps: 1500,
                featured_listings: true,
                priority_support: false,
                analytics_dashboard: true,
                custom_branding: false,
                api_access: false,
                project_posts: Some(20),
                proposals: Some(50),
                active_projects: Some(10),
                portfolio_items: Some(25),
                team_members: Some(1),
            },
            PlanTier::Business => PlanFeatures {
                tier,
                monthly_price_cents: 7900,
                commission_bps: 1000,
                featured_listings: true,
                priority_support: true,
                analytics_dashboard: true,
                custom_branding: true,
                api_access: false,
                project_posts: Some(100),
                proposals: Some(200),
                active_projects: Some(50),
                portfolio_items: Some(100),
                team_members: Some(10),
            },
            PlanTier::Elite => PlanFeatures {
                tier,
                monthly_price_cents: 19900,
                commission_bps: 500,
                featured_listings: true,
                priority_support: true,
                analytics_dashboard: true,
                custom_branding: true,
                api_access: true,
                project_posts: None,
                proposals: None,
                active_projects: None,
                portfolio_items: None,
                team_members: None,
            },
        }
    }

    pub fn catalogue() -> Vec<PlanFeatures> {
        PlanTier::ALL.into_iter().map(PlanFeatures::for_tier).collect()
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.limit(feature) != Limit::Unavailable
    }

    pub fn limit(&self, feature: Feature) -> Limit {
        let flag = |enabled: bool| {
            if enabled {
                Limit::Unlimited
            } else {
                Limit::Unavailable
            }
        };
        let counted = |value: Option<u32>| match value {
            None => Limit::Unlimited,
            Some(0) => Limit::Unavailable,
            Some(max) => Limit::Max(max),
        };

        match feature {
            Feature::FeaturedListings => flag(self.featured_listings),
            Feature::PrioritySupport => flag(self.priority_support),
            Feature::AnalyticsDashboard => flag(self.analytics_dashboard),
            Feature::CustomBranding => flag(self.custom_branding),
            Feature::ApiAccess => flag(self.api_access),
            Feature::ProjectPosts => counted(self.project_posts),
            Feature::Proposals => counted(self.proposals),
            Feature::ActiveProjects => counted(self.active_projects),
            Feature::PortfolioItems => counted(self.portfolio_items),
            Feature::TeamMembers => counted(self.team_members),
        }
    }

    /// Platform fee for a payout, rounded half-up to the cent
    pub fn commission_for(&self, amount_cents: i64) -> i64 {
        if amount_cents <= 0 {
            return 0;
        }
        let fee = (i128::from(amount_cents) * i128::from(self.commission_bps) + 5_000) / 10_000;
        i64::try_from(fee).unwrap_or(i64::MAX)
    }
}

/// Usage counter period (`YYYY-MM`) containing `now`
pub fn usage_period(now: DateTime<Utc>) -> String {
    now.format("%Y-%m").to_string()
}
