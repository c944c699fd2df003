//! SQL persistence backend (SQLite via SeaORM)
//!
//! Implements every persistence trait with direct SeaORM queries against a
//! single `DatabaseConnection`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sea_orm::{prelude::Expr, sea_query::OnConflict, *};

use bazaar_common::{BazaarError, PlanFeatures, PlanTier, VerificationStatus};

use crate::entity::{
    feature_usage, messages, notifications, plan_features, projects, subscriptions, users,
};
use crate::model::*;
use crate::schema::plan_from_model;
use crate::traits::*;

/// Database persistence service
pub struct SqlPersistService {
    db: DatabaseConnection,
}

impl SqlPersistService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Outcome of a conditional project update that matched no row
    async fn project_transition_missed(
        &self,
        id: &str,
        expected_status: &str,
    ) -> anyhow::Result<Option<ProjectInfo>> {
        match projects::Entity::find_by_id(id).one(&self.db).await? {
            Some(model) => Err(BazaarError::IllegalState(format!(
                "project {} is {}, expected {}",
                id, model.status, expected_status
            ))
            .into()),
            None => Ok(None),
        }
    }
}

#[inline]
fn to_millis(time: NaiveDateTime) -> i64 {
    time.and_utc().timestamp_millis()
}

#[inline]
fn from_millis(millis: i64) -> NaiveDateTime {
    chrono::DateTime::from_timestamp_millis(millis)
        .unwrap_or_default()
        .naive_utc()
}

#[inline]
fn to_count(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn user_info(m: users::Model) -> UserInfo {
    UserInfo {
        id: m.id,
        email: m.email,
        name: m.name,
        user_type: m.user_type,
        verification_status: m.verification_status,
        created_time: to_millis(m.created_at),
    }
}

fn subscription_info(m: subscriptions::Model) -> SubscriptionInfo {
    SubscriptionInfo {
        user_id: m.user_id,
        plan: m.plan.parse().unwrap_or_default(),
        status: m.status,
        current_period_start: to_millis(m.current_period_start),
        current_period_end: to_millis(m.current_period_end),
    }
}

fn project_info(m: projects::Model) -> ProjectInfo {
    ProjectInfo {
        id: m.id,
        client_id: m.client_id,
        professional_id: m.professional_id,
        title: m.title,
        description: m.description,
        status: m.status,
        budget_min: m.budget_min,
        budget_max: m.budget_max,
        timeline_days: m.timeline_days,
        skills: serde_json::from_str(&m.skills).unwrap_or_default(),
        created_time: to_millis(m.created_at),
        modified_time: to_millis(m.updated_at),
    }
}

fn message_info(m: messages::Model) -> MessageInfo {
    MessageInfo {
        id: m.id,
        sender_id: m.sender_id,
        receiver_id: m.receiver_id,
        content: m.content,
        read: m.read,
        created_time: to_millis(m.created_at),
    }
}

fn notification_info(m: notifications::Model) -> NotificationInfo {
    NotificationInfo {
        id: m.id,
        user_id: m.user_id,
        r#type: m.r#type,
        title: m.title,
        body: m.body,
        read: m.read,
        action_url: m.action_url,
        created_time: to_millis(m.created_at),
    }
}

// ============================================================================
// PersistenceService implementation
// ============================================================================

#[async_trait]
impl PersistenceService for SqlPersistService {
    async fn health_check(&self) -> anyhow::Result<()> {
        users::Entity::find()
            .select_only()
            .column_as(Expr::cust("1"), "health")
            .into_tuple::<i32>()
            .one(&self.db)
            .await?;
        Ok(())
    }
}

// ============================================================================
// UserPersistence implementation
// ============================================================================

#[async_trait]
impl UserPersistence for SqlPersistService {
    async fn user_create(&self, user: NewUser) -> anyhow::Result<UserInfo> {
        let existing = users::Entity::find()
            .filter(users::Column::Email.eq(user.email.as_str()))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(BazaarError::Conflict(format!("user {}", user.email)).into());
        }

        let now = chrono::Utc::now().naive_utc();
        let entity = users::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            email: Set(user.email),
            name: Set(user.name),
            user_type: Set(user.user_type),
            password_hash: Set(user.password_hash),
            verification_status: Set(VerificationStatus::default().as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let inserted = entity.insert(&self.db).await?;
        Ok(user_info(inserted))
    }

    async fn user_find_by_id(&self, id: &str) -> anyhow::Result<Option<UserInfo>> {
        let result = users::Entity::find_by_id(id).one(&self.db).await?;
        Ok(result.map(user_info))
    }

    async fn user_find_credentials(&self, email: &str) -> anyhow::Result<Option<UserCredentials>> {
        let result = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await?;

        Ok(result.map(|m| {
            let password_hash = m.password_hash.clone();
            UserCredentials {
                user: user_info(m),
                password_hash,
            }
        }))
    }

    async fn user_update_verification(&self, id: &str, status: &str) -> anyhow::Result<bool> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::VerificationStatus, Expr::value(status))
            .col_expr(
                users::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().naive_utc()),
            )
            .filter(users::Column::Id.eq(id))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }
}

// ============================================================================
// SubscriptionPersistence implementation
// ============================================================================

#[async_trait]
impl SubscriptionPersistence for SqlPersistService {
    async fn plan_find(&self, tier: PlanTier) -> anyhow::Result<Option<PlanFeatures>> {
        let result = plan_features::Entity::find_by_id(tier.as_str())
            .one(&self.db)
            .await?;
        Ok(result.and_then(plan_from_model))
    }

    async fn plan_list(&self) -> anyhow::Result<Vec<PlanFeatures>> {
        let models = plan_features::Entity::find()
            .order_by_asc(plan_features::Column::MonthlyPriceCents)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().filter_map(plan_from_model).collect())
    }

    async fn subscription_find(&self, user_id: &str) -> anyhow::Result<Option<SubscriptionInfo>> {
        let result = subscriptions::Entity::find()
            .filter(subscriptions::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?;
        Ok(result.map(subscription_info))
    }

    async fn subscription_upsert(
        &self,
        user_id: &str,
        tier: PlanTier,
        period_start_millis: i64,
        period_end_millis: i64,
    ) -> anyhow::Result<SubscriptionInfo> {
        let existing = subscriptions::Entity::find()
            .filter(subscriptions::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?;

        let now = chrono::Utc::now().naive_utc();

        let saved = if let Some(model) = existing {
            let mut active: subscriptions::ActiveModel = model.into();
            active.plan = Set(tier.as_str().to_string());
            active.status = Set(SUBSCRIPTION_ACTIVE.to_string());
            active.current_period_start = Set(from_millis(period_start_millis));
            active.current_period_end = Set(from_millis(period_end_millis));
            active.updated_at = Set(now);
            active.update(&self.db).await?
        } else {
            let active = subscriptions::ActiveModel {
                user_id: Set(user_id.to_string()),
                plan: Set(tier.as_str().to_string()),
                status: Set(SUBSCRIPTION_ACTIVE.to_string()),
                current_period_start: Set(from_millis(period_start_millis)),
                current_period_end: Set(from_millis(period_end_millis)),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            };
            active.insert(&self.db).await?
        };

        Ok(subscription_info(saved))
    }

    async fn subscription_set_status(&self, user_id: &str, status: &str) -> anyhow::Result<bool> {
        let result = subscriptions::Entity::update_many()
            .col_expr(subscriptions::Column::Status, Expr::value(status))
            .col_expr(
                subscriptions::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().naive_utc()),
            )
            .filter(subscriptions::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn usage_get(&self, user_id: &str, feature: &str, period: &str) -> anyhow::Result<u32> {
        let result = feature_usage::Entity::find()
            .filter(feature_usage::Column::UserId.eq(user_id))
            .filter(feature_usage::Column::Feature.eq(feature))
            .filter(feature_usage::Column::Period.eq(period))
            .one(&self.db)
            .await?;
        Ok(result.map(|m| to_count(m.count)).unwrap_or(0))
    }

    async fn usage_try_increment(
        &self,
        user_id: &str,
        feature: &str,
        period: &str,
        ceiling: Option<u32>,
    ) -> anyhow::Result<UsageIncrement> {
        let now = chrono::Utc::now().naive_utc();

        // Make sure the row exists so the conditional update has a target
        let seed = feature_usage::ActiveModel {
            user_id: Set(user_id.to_string()),
            feature: Set(feature.to_string()),
            period: Set(period.to_string()),
            count: Set(0),
            updated_at: Set(now),
            ..Default::default()
        };
        feature_usage::Entity::insert(seed)
            .on_conflict(
                OnConflict::columns([
                    feature_usage::Column::UserId,
                    feature_usage::Column::Feature,
                    feature_usage::Column::Period,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        let mut update = feature_usage::Entity::update_many()
            .col_expr(
                feature_usage::Column::Count,
                Expr::col(feature_usage::Column::Count).add(1),
            )
            .col_expr(feature_usage::Column::UpdatedAt, Expr::value(now))
            .filter(feature_usage::Column::UserId.eq(user_id))
            .filter(feature_usage::Column::Feature.eq(feature))
            .filter(feature_usage::Column::Period.eq(period));
        if let Some(ceiling) = ceiling {
            let ceiling = i32::try_from(ceiling).unwrap_or(i32::MAX);
            update = update.filter(feature_usage::Column::Count.lt(ceiling));
        }
        let result = update.exec(&self.db).await?;

        let count = self.usage_get(user_id, feature, period).await?;
        Ok(UsageIncrement {
            allowed: result.rows_affected > 0,
            count,
        })
    }

    async fn usage_release(
        &self,
        user_id: &str,
        feature: &str,
        period: &str,
    ) -> anyhow::Result<()> {
        feature_usage::Entity::update_many()
            .col_expr(
                feature_usage::Column::Count,
                Expr::col(feature_usage::Column::Count).sub(1),
            )
            .col_expr(
                feature_usage::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().naive_utc()),
            )
            .filter(feature_usage::Column::UserId.eq(user_id))
            .filter(feature_usage::Column::Feature.eq(feature))
            .filter(feature_usage::Column::Period.eq(period))
            .filter(feature_usage::Column::Count.gt(0))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn usage_list(
        &self,
        user_id: &str,
        period: &str,
    ) -> anyhow::Result<Vec<FeatureUsageInfo>> {
        let models = feature_usage::Entity::find()
            .filter(feature_usage::Column::UserId.eq(user_id))
            .filter(feature_usage::Column::Period.eq(period))
            .order_by_asc(feature_usage::Column::Feature)
            .all(&self.db)
            .await?;

        Ok(models
            .into_iter()
            .map(|m| FeatureUsageInfo {
                feature: m.feature,
                period: m.period,
                count: to_count(m.count),
            })
            .collect())
    }
}

// ============================================================================
// ProjectPersistence implementation
// ============================================================================

#[async_trait]
impl ProjectPersistence for SqlPersistService {
    async fn project_create(&self, project: NewProject) -> anyhow::Result<ProjectInfo> {
        let now = chrono::Utc::now().naive_utc();
        let entity = projects::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            client_id: Set(project.client_id),
            professional_id: Set(None),
            title: Set(project.title),
            description: Set(project.description),
            status: Set(project.status),
            budget_min: Set(project.budget_min),
            budget_max: Set(project.budget_max),
            timeline_days: Set(project.timeline_days),
            skills: Set(serde_json::to_string(&project.skills)?),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let inserted = entity.insert(&self.db).await?;
        Ok(project_info(inserted))
    }

    async fn project_find(&self, id: &str) -> anyhow::Result<Option<ProjectInfo>> {
        let result = projects::Entity::find_by_id(id).one(&self.db).await?;
        Ok(result.map(project_info))
    }

    async fn project_find_page(&self, query: &ProjectQuery) -> anyhow::Result<Page<ProjectInfo>> {
        let mut select = projects::Entity::find();
        if let Some(status) = &query.status {
            select = select.filter(projects::Column::Status.eq(status.as_str()));
        }
        if let Some(client_id) = &query.client_id {
            select = select.filter(projects::Column::ClientId.eq(client_id.as_str()));
        }
        if let Some(professional_id) = &query.professional_id {
            select = select.filter(projects::Column::ProfessionalId.eq(professional_id.as_str()));
        }

        let page_size = query.page_size.max(1);
        let page_no = query.page_no.max(1);

        let paginator = select
            .order_by_desc(projects::Column::CreatedAt)
            .order_by_desc(projects::Column::Id)
            .paginate(&self.db, page_size);
        let total_count = paginator.num_items().await?;
        if total_count == 0 {
            return Ok(Page::empty());
        }

        let items = paginator.fetch_page(page_no - 1).await?;
        Ok(Page::new(
            total_count,
            page_no,
            page_size,
            items.into_iter().map(project_info).collect(),
        ))
    }

    async fn project_list_for_user(&self, user_id: &str) -> anyhow::Result<Vec<ProjectInfo>> {
        let models = projects::Entity::find()
            .filter(
                Condition::any()
                    .add(projects::Column::ClientId.eq(user_id))
                    .add(projects::Column::ProfessionalId.eq(user_id)),
            )
            .order_by_desc(projects::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(project_info).collect())
    }

    async fn project_update_status(
        &self,
        id: &str,
        expected_status: &str,
        status: &str,
    ) -> anyhow::Result<Option<ProjectInfo>> {
        let result = projects::Entity::update_many()
            .col_expr(projects::Column::Status, Expr::value(status))
            .col_expr(
                projects::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().naive_utc()),
            )
            .filter(projects::Column::Id.eq(id))
            .filter(projects::Column::Status.eq(expected_status))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return self.project_transition_missed(id, expected_status).await;
        }
        self.project_find(id).await
    }

    async fn project_assign(
        &self,
        id: &str,
        professional_id: &str,
        expected_status: &str,
        status: &str,
    ) -> anyhow::Result<Option<ProjectInfo>> {
        let result = projects::Entity::update_many()
            .col_expr(projects::Column::ProfessionalId, Expr::value(professional_id))
            .col_expr(projects::Column::Status, Expr::value(status))
            .col_expr(
                projects::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().naive_utc()),
            )
            .filter(projects::Column::Id.eq(id))
            .filter(projects::Column::Status.eq(expected_status))
            .filter(projects::Column::ProfessionalId.is_null())
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return self.project_transition_missed(id, expected_status).await;
        }
        self.project_find(id).await
    }
}

// ============================================================================
// MessagePersistence implementation
// ============================================================================

#[async_trait]
impl MessagePersistence for SqlPersistService {
    async fn message_create(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> anyhow::Result<MessageInfo> {
        let entity = messages::ActiveModel {
            sender_id: Set(sender_id.to_string()),
            receiver_id: Set(receiver_id.to_string()),
            content: Set(content.to_string()),
            read: Set(false),
            created_at: Set(chrono::Utc::now().naive_utc()),
            ..Default::default()
        };

        let inserted = entity.insert(&self.db).await?;
        Ok(message_info(inserted))
    }

    async fn message_thread(
        &self,
        user_id: &str,
        peer_id: &str,
        limit: u64,
    ) -> anyhow::Result<Vec<MessageInfo>> {
        let mut models = messages::Entity::find()
            .filter(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(messages::Column::SenderId.eq(user_id))
                            .add(messages::Column::ReceiverId.eq(peer_id)),
                    )
                    .add(
                        Condition::all()
                            .add(messages::Column::SenderId.eq(peer_id))
                            .add(messages::Column::ReceiverId.eq(user_id)),
                    ),
            )
            .order_by_desc(messages::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?;

        models.reverse();
        Ok(models.into_iter().map(message_info).collect())
    }

    async fn message_conversations(
        &self,
        user_id: &str,
    ) -> anyhow::Result<Vec<ConversationSummary>> {
        let sent: Vec<(String, i64)> = messages::Entity::find()
            .select_only()
            .column(messages::Column::ReceiverId)
            .column_as(messages::Column::Id.max(), "latest_id")
            .filter(messages::Column::SenderId.eq(user_id))
            .group_by(messages::Column::ReceiverId)
            .into_tuple()
            .all(&self.db)
            .await?;
        let received: Vec<(String, i64)> = messages::Entity::find()
            .select_only()
            .column(messages::Column::SenderId)
            .column_as(messages::Column::Id.max(), "latest_id")
            .filter(messages::Column::ReceiverId.eq(user_id))
            .group_by(messages::Column::SenderId)
            .into_tuple()
            .all(&self.db)
            .await?;

        let mut latest: HashMap<String, i64> = HashMap::new();
        for (peer_id, id) in sent.into_iter().chain(received) {
            let entry = latest.entry(peer_id).or_insert(id);
            *entry = (*entry).max(id);
        }
        if latest.is_empty() {
            return Ok(Vec::new());
        }

        let unread: HashMap<String, i64> = messages::Entity::find()
            .select_only()
            .column(messages::Column::SenderId)
            .column_as(messages::Column::Id.count(), "unread")
            .filter(messages::Column::ReceiverId.eq(user_id))
            .filter(messages::Column::Read.eq(false))
            .group_by(messages::Column::SenderId)
            .into_tuple::<(String, i64)>()
            .all(&self.db)
            .await?
            .into_iter()
            .collect();

        // One row per peer, newest conversation first
        let models = messages::Entity::find()
            .filter(messages::Column::Id.is_in(latest.into_values()))
            .order_by_desc(messages::Column::Id)
            .all(&self.db)
            .await?;

        Ok(models
            .into_iter()
            .map(|model| {
                let peer_id = if model.sender_id == user_id {
                    model.receiver_id.clone()
                } else {
                    model.sender_id.clone()
                };
                let unread_count = unread
                    .get(&peer_id)
                    .map_or(0, |count| u64::try_from(*count).unwrap_or(0));
                ConversationSummary {
                    peer_id,
                    last_message: message_info(model),
                    unread_count,
                }
            })
            .collect())
    }

    async fn message_mark_read(&self, user_id: &str, peer_id: &str) -> anyhow::Result<u64> {
        let result = messages::Entity::update_many()
            .col_expr(messages::Column::Read, Expr::value(true))
            .filter(messages::Column::ReceiverId.eq(user_id))
            .filter(messages::Column::SenderId.eq(peer_id))
            .filter(messages::Column::Read.eq(false))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn message_unread_count(&self, user_id: &str) -> anyhow::Result<u64> {
        let count = messages::Entity::find()
            .filter(messages::Column::ReceiverId.eq(user_id))
            .filter(messages::Column::Read.eq(false))
            .count(&self.db)
            .await?;
        Ok(count)
    }
}

// ============================================================================
// NotificationPersistence implementation
// ============================================================================

#[async_trait]
impl NotificationPersistence for SqlPersistService {
    async fn notification_create(
        &self,
        notification: NewNotification,
    ) -> anyhow::Result<NotificationInfo> {
        let entity = notifications::ActiveModel {
            user_id: Set(notification.user_id),
            r#type: Set(notification.r#type),
            title: Set(notification.title),
            body: Set(notification.body),
            read: Set(false),
            action_url: Set(notification.action_url),
            created_at: Set(chrono::Utc::now().naive_utc()),
            ..Default::default()
        };

        let inserted = entity.insert(&self.db).await?;
        Ok(notification_info(inserted))
    }

    async fn notification_list(
        &self,
        user_id: &str,
        unread_only: bool,
        limit: u64,
    ) -> anyhow::Result<Vec<NotificationInfo>> {
        let mut select =
            notifications::Entity::find().filter(notifications::Column::UserId.eq(user_id));
        if unread_only {
            select = select.filter(notifications::Column::Read.eq(false));
        }

        let models = select
            .order_by_desc(notifications::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(notification_info).collect())
    }

    async fn notification_mark_read(&self, user_id: &str, id: i64) -> anyhow::Result<bool> {
        let result = notifications::Entity::update_many()
            .col_expr(notifications::Column::Read, Expr::value(true))
            .filter(notifications::Column::Id.eq(id))
            .filter(notifications::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn notification_mark_all_read(&self, user_id: &str) -> anyhow::Result<u64> {
        let result = notifications::Entity::update_many()
            .col_expr(notifications::Column::Read, Expr::value(true))
            .filter(notifications::Column::UserId.eq(user_id))
            .filter(notifications::Column::Read.eq(false))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn notification_unread_count(&self, user_id: &str) -> anyhow::Result<u64> {
        let count = notifications::Entity::find()
            .filter(notifications::Column::UserId.eq(user_id))
            .filter(notifications::Column::Read.eq(false))
            .count(&self.db)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> SqlPersistService {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        crate::schema::init_schema(&db).await.unwrap();
        SqlPersistService::new(db)
    }

    async fn create_user(service: &SqlPersistService, email: &str) -> UserInfo {
        service
            .user_create(NewUser {
                email: email.to_string(),
                name: "Test".to_string(),
                user_type: "client".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_user_create_rejects_duplicate_email() {
        let service = setup().await;
        let user = create_user(&service, "a@example.com").await;
        assert_eq!(user.verification_status, "unverified");

        let err = service
            .user_create(NewUser {
                email: "a@example.com".to_string(),
                name: "Other".to_string(),
                user_type: "professional".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BazaarError>(),
            Some(BazaarError::Conflict(_))
        ));

        let credentials = service
            .user_find_credentials("a@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(credentials.user.id, user.id);
        assert_eq!(credentials.password_hash, "hash");
    }

    #[tokio::test]
    async fn test_usage_increment_stops_at_ceiling() {
        let service = setup().await;

        for expected in 1..=2 {
            let result = service
                .usage_try_increment("u1", "project_posts", "2026-03", Some(2))
                .await
                .unwrap();
            assert!(result.allowed);
            assert_eq!(result.count, expected);
        }

        let denied = service
            .usage_try_increment("u1", "project_posts", "2026-03", Some(2))
            .await
            .unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.count, 2);

        // A new period starts from zero
        let next = service
            .usage_try_increment("u1", "project_posts", "2026-04", Some(2))
            .await
            .unwrap();
        assert!(next.allowed);
        assert_eq!(next.count, 1);

        service
            .usage_release("u1", "project_posts", "2026-03")
            .await
            .unwrap();
        assert_eq!(
            service.usage_get("u1", "project_posts", "2026-03").await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_usage_release_saturates_and_unbounded_increments() {
        let service = setup().await;
        service.usage_release("u1", "proposals", "2026-03").await.unwrap();
        assert_eq!(service.usage_get("u1", "proposals", "2026-03").await.unwrap(), 0);

        for _ in 0..5 {
            let result = service
                .usage_try_increment("u1", "proposals", "2026-03", None)
                .await
                .unwrap();
            assert!(result.allowed);
        }
        let usage = service.usage_list("u1", "2026-03").await.unwrap();
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].count, 5);
    }

    #[tokio::test]
    async fn test_subscription_upsert_and_status() {
        let service = setup().await;
        let user = create_user(&service, "b@example.com").await;
        assert!(service.subscription_find(&user.id).await.unwrap().is_none());
        assert!(!service.subscription_set_status(&user.id, SUBSCRIPTION_CANCELLED).await.unwrap());

        let sub = service
            .subscription_upsert(&user.id, PlanTier::Professional, 1_000, 2_000)
            .await
            .unwrap();
        assert_eq!(sub.plan, PlanTier::Professional);
        assert_eq!(sub.current_period_end, 2_000);

        let sub = service
            .subscription_upsert(&user.id, PlanTier::Business, 3_000, 4_000)
            .await
            .unwrap();
        assert_eq!(sub.plan, PlanTier::Business);

        assert!(service.subscription_set_status(&user.id, SUBSCRIPTION_CANCELLED).await.unwrap());
        let sub = service.subscription_find(&user.id).await.unwrap().unwrap();
        assert_eq!(sub.status, SUBSCRIPTION_CANCELLED);
        assert_eq!(sub.effective_plan(3_500), PlanTier::Business);
        assert_eq!(sub.effective_plan(4_000), PlanTier::Free);
    }

    #[tokio::test]
    async fn test_plan_list_is_price_ordered() {
        let service = setup().await;
        let plans = service.plan_list().await.unwrap();
        let tiers: Vec<PlanTier> = plans.iter().map(|p| p.tier).collect();
        assert_eq!(tiers, PlanTier::ALL.to_vec());
        assert_eq!(
            service.plan_find(PlanTier::Free).await.unwrap().unwrap(),
            PlanTier::Free.features()
        );
    }

    #[tokio::test]
    async fn test_project_page_and_assignment() {
        let service = setup().await;
        for i in 0..3 {
            service
                .project_create(NewProject {
                    client_id: "c1".to_string(),
                    title: format!("Project {}", i),
                    description: "Build it".to_string(),
                    status: "open".to_string(),
                    budget_min: 100,
                    budget_max: 500,
                    timeline_days: 14,
                    skills: vec!["rust".to_string()],
                })
                .await
                .unwrap();
        }

        let page = service
            .project_find_page(&ProjectQuery {
                client_id: Some("c1".to_string()),
                page_no: 1,
                page_size: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total_count, 3);
        assert_eq!(page.pages_available, 2);
        assert_eq!(page.page_items.len(), 2);
        assert_eq!(page.page_items[0].skills, vec!["rust".to_string()]);

        let id = page.page_items[0].id.clone();
        let assigned = service
            .project_assign(&id, "p1", "open", "in_progress")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(assigned.professional_id.as_deref(), Some("p1"));
        assert_eq!(assigned.status, "in_progress");

        // a second assignment raced on the same open snapshot
        let err = service
            .project_assign(&id, "p2", "open", "in_progress")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BazaarError>(),
            Some(BazaarError::IllegalState(_))
        ));
        let unchanged = service.project_find(&id).await.unwrap().unwrap();
        assert_eq!(unchanged.professional_id.as_deref(), Some("p1"));

        let err = service
            .project_update_status(&id, "open", "cancelled")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BazaarError>(),
            Some(BazaarError::IllegalState(_))
        ));
        let completed = service
            .project_update_status(&id, "in_progress", "completed")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(completed.status, "completed");

        let for_pro = service.project_list_for_user("p1").await.unwrap();
        assert_eq!(for_pro.len(), 1);
        assert!(
            service
                .project_update_status("missing", "draft", "open")
                .await
                .unwrap()
                .is_none()
        );

        let empty = service
            .project_find_page(&ProjectQuery {
                status: Some("completed".to_string()),
                page_no: 1,
                page_size: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(empty.total_count, 0);
    }

    #[tokio::test]
    async fn test_message_thread_and_conversations() {
        let service = setup().await;
        service.message_create("a", "b", "hi").await.unwrap();
        service.message_create("b", "a", "hello").await.unwrap();
        service.message_create("b", "a", "are you there").await.unwrap();
        service.message_create("c", "a", "ping").await.unwrap();

        let thread = service.message_thread("a", "b", 2).await.unwrap();
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].content, "hello");
        assert_eq!(thread[1].content, "are you there");

        let conversations = service.message_conversations("a").await.unwrap();
        assert_eq!(conversations.len(), 2);
        assert_eq!(conversations[0].peer_id, "c");
        assert_eq!(conversations[1].peer_id, "b");
        assert_eq!(conversations[1].unread_count, 2);

        assert_eq!(service.message_unread_count("a").await.unwrap(), 3);
        assert_eq!(service.message_mark_read("a", "b").await.unwrap(), 2);
        assert_eq!(service.message_unread_count("a").await.unwrap(), 1);

        // a reply brings the thread back to the top, already read
        service.message_create("a", "b", "yes, here").await.unwrap();
        let conversations = service.message_conversations("a").await.unwrap();
        assert_eq!(conversations.len(), 2);
        assert_eq!(conversations[0].peer_id, "b");
        assert_eq!(conversations[0].last_message.content, "yes, here");
        assert_eq!(conversations[0].unread_count, 0);
        assert_eq!(conversations[1].unread_count, 1);

        assert!(service.message_conversations("z").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_notifications_mark_read_checks_owner() {
        let service = setup().await;
        let created = service
            .notification_create(NewNotification {
                user_id: "u1".to_string(),
                r#type: "message".to_string(),
                title: "New message".to_string(),
                body: "You have a new message".to_string(),
                action_url: Some("/messages".to_string()),
            })
            .await
            .unwrap();
        service
            .notification_create(NewNotification {
                user_id: "u1".to_string(),
                r#type: "payment".to_string(),
                title: "Paid".to_string(),
                body: "Payment received".to_string(),
                action_url: None,
            })
            .await
            .unwrap();

        assert!(!service.notification_mark_read("u2", created.id).await.unwrap());
        assert!(service.notification_mark_read("u1", created.id).await.unwrap());
        assert_eq!(service.notification_unread_count("u1").await.unwrap(), 1);

        let unread = service.notification_list("u1", true, 10).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].r#type, "payment");

        assert_eq!(service.notification_mark_all_read("u1").await.unwrap(), 1);
        assert_eq!(service.notification_list("u1", false, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_health_check() {
        let service = setup().await;
        service.health_check().await.unwrap();
    }
}
