//! Per-user dashboard and analytics aggregates, cached until the user's data changes

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use bazaar_common::{BazaarError, CacheConfig, CacheManager, PlanFeatures, PlanTier, ProjectStatus};
use bazaar_persistence::{PersistenceService, ProjectInfo};

use super::fetch_cached;
use super::subscription::{SubscriptionService, UsageSummary};

const INSIGHT_CACHE: &str = "dashboard";

fn dashboard_key(user_id: &str) -> String {
    format!("dashboard:{}", user_id)
}

fn analytics_key(user_id: &str) -> String {
    format!("analytics:{}", user_id)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub user_id: String,
    pub user_type: String,
    pub plan: PlanTier,
    pub projects_by_status: BTreeMap<String, u64>,
    pub active_projects: u64,
    pub unread_messages: u64,
    pub unread_notifications: u64,
    pub recent_projects: Vec<ProjectInfo>,
    pub usage: Vec<UsageSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub user_id: String,
    pub plan: PlanTier,
    pub total_projects: u64,
    pub completed_projects: u64,
    pub cancelled_projects: u64,
    /// Completed over finished (completed + cancelled), 0 when nothing finished
    pub completion_rate: f64,
    pub total_budget_cents: i64,
    pub gross_earnings_cents: i64,
    pub commission_cents: i64,
    pub net_earnings_cents: i64,
    pub commission_bps: u32,
}

const RECENT_PROJECTS: usize = 5;

pub struct DashboardService {
    persistence: Arc<dyn PersistenceService>,
    subscriptions: Arc<SubscriptionService>,
    cache: CacheManager<serde_json::Value>,
}

impl DashboardService {
    pub fn new(
        persistence: Arc<dyn PersistenceService>,
        subscriptions: Arc<SubscriptionService>,
        cache_config: CacheConfig,
    ) -> Self {
        Self {
            persistence,
            subscriptions,
            cache: CacheManager::new(cache_config),
        }
    }

    pub async fn dashboard(&self, user_id: &str) -> anyhow::Result<serde_json::Value> {
        fetch_cached(INSIGHT_CACHE, &self.cache, &dashboard_key(user_id), || async {
            let summary = self.build_dashboard(user_id).await?;
            Ok(serde_json::to_value(summary)?)
        })
        .await
    }

    pub async fn analytics(&self, user_id: &str) -> anyhow::Result<serde_json::Value> {
        fetch_cached(INSIGHT_CACHE, &self.cache, &analytics_key(user_id), || async {
            let plan = self.subscriptions.current_plan(user_id).await?;
            let projects = self.persistence.project_list_for_user(user_id).await?;
            Ok(serde_json::to_value(build_analytics(user_id, &projects, &plan))?)
        })
        .await
    }

    /// Drop every cached aggregate of the user
    pub fn invalidate_user(&self, user_id: &str) -> usize {
        let pattern = format!("^(dashboard|analytics):{}$", regex::escape(user_id));
        match Regex::new(&pattern) {
            Ok(regex) => {
                let removed = self.cache.invalidate_pattern(&regex);
                debug!(user_id, removed, "Dashboard cache invalidated");
                removed
            }
            Err(_) => 0,
        }
    }

    pub fn cache(&self) -> &CacheManager<serde_json::Value> {
        &self.cache
    }

    async fn build_dashboard(&self, user_id: &str) -> anyhow::Result<DashboardSummary> {
        let user = self
            .persistence
            .user_find_by_id(user_id)
            .await?
            .ok_or_else(|| BazaarError::NotFound(format!("user {}", user_id)))?;
        let plan = self.subscriptions.current_plan(user_id).await?;
        let projects = self.persistence.project_list_for_user(user_id).await?;
        let unread_messages = self.persistence.message_unread_count(user_id).await?;
        let unread_notifications = self.persistence.notification_unread_count(user_id).await?;
        let usage = self.subscriptions.usage_summary(user_id).await?;

        let projects_by_status = count_by_status(&projects);
        let active_projects = projects
            .iter()
            .filter(|project| {
                project
                    .status
                    .parse::<ProjectStatus>()
                    .is_ok_and(ProjectStatus::is_active)
            })
            .count() as u64;

        Ok(DashboardSummary {
            user_id: user_id.to_string(),
            user_type: user.user_type,
            plan: plan.tier,
            projects_by_status,
            active_projects,
            unread_messages,
            unread_notifications,
            recent_projects: projects.into_iter().take(RECENT_PROJECTS).collect(),
            usage,
        })
    }
}

fn count_by_status(projects: &[ProjectInfo]) -> BTreeMap<String, u64> {
    let mut counts: BTreeMap<String, u64> = ProjectStatus::ALL
        .into_iter()
        .map(|status| (status.to_string(), 0))
        .collect();
    for project in projects {
        *counts.entry(project.status.clone()).or_default() += 1;
    }
    counts
}

fn saturating_total(amounts: impl Iterator<Item = i64>) -> i64 {
    amounts.fold(0i64, i64::saturating_add)
}

/// Earnings are counted on completed projects the user delivered as the
/// professional, using the upper budget bound as the agreed amount.
pub fn build_analytics(
    user_id: &str,
    projects: &[ProjectInfo],
    plan: &PlanFeatures,
) -> AnalyticsReport {
    let completed = ProjectStatus::Completed.as_str();
    let cancelled = ProjectStatus::Cancelled.as_str();

    let completed_projects = projects.iter().filter(|p| p.status == completed).count() as u64;
    let cancelled_projects = projects.iter().filter(|p| p.status == cancelled).count() as u64;
    let finished = completed_projects + cancelled_projects;

    let earned: Vec<i64> = projects
        .iter()
        .filter(|p| p.status == completed && p.professional_id.as_deref() == Some(user_id))
        .map(|p| p.budget_max)
        .collect();
    let gross_earnings_cents = saturating_total(earned.iter().copied());
    let commission_cents =
        saturating_total(earned.iter().map(|amount| plan.commission_for(*amount)));

    AnalyticsReport {
        user_id: user_id.to_string(),
        plan: plan.tier,
        total_projects: projects.len() as u64,
        completed_projects,
        cancelled_projects,
        completion_rate: if finished == 0 {
            0.0
        } else {
            completed_projects as f64 / finished as f64
        },
        total_budget_cents: saturating_total(projects.iter().map(|p| p.budget_max)),
        gross_earnings_cents,
        commission_cents,
        net_earnings_cents: gross_earnings_cents.saturating_sub(commission_cents),
        commission_bps: plan.commission_bps,
    }
}
