//! Schema bootstrap
//!
//! Tables are created from the entity definitions, so the schema always
//! matches the code. Every statement is `IF NOT EXISTS` and the plan rows are
//! upserted, so running the bootstrap on an existing database is a no-op
//! apart from refreshing the plan table.

use sea_orm::sea_query::{Index, OnConflict};
use sea_orm::*;
use tracing::info;

use bazaar_common::{PlanFeatures, PlanTier};

use crate::entity::{
    feature_usage, messages, notifications, plan_features, projects, subscriptions, users,
};

/// Create all tables and indexes, then seed the plan catalogue
pub async fn init_schema(db: &DatabaseConnection) -> anyhow::Result<()> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    // users must exist before subscriptions references it
    create_table(db, &schema, users::Entity).await?;
    create_table(db, &schema, subscriptions::Entity).await?;
    create_table(db, &schema, plan_features::Entity).await?;
    create_table(db, &schema, feature_usage::Entity).await?;
    create_table(db, &schema, projects::Entity).await?;
    create_table(db, &schema, messages::Entity).await?;
    create_table(db, &schema, notifications::Entity).await?;

    let usage_index = Index::create()
        .name("uk_feature_usage_user_feature_period")
        .table(feature_usage::Entity)
        .col(feature_usage::Column::UserId)
        .col(feature_usage::Column::Feature)
        .col(feature_usage::Column::Period)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&usage_index)).await?;

    let message_index = Index::create()
        .name("idx_messages_receiver_read")
        .table(messages::Entity)
        .col(messages::Column::ReceiverId)
        .col(messages::Column::Read)
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&message_index)).await?;

    let notification_index = Index::create()
        .name("idx_notifications_user")
        .table(notifications::Entity)
        .col(notifications::Column::UserId)
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&notification_index)).await?;

    let seeded = seed_plans(db).await?;
    info!("Schema ready, {} plans seeded", seeded);

    Ok(())
}

async fn create_table<E: EntityTrait>(
    db: &DatabaseConnection,
    schema: &Schema,
    entity: E,
) -> anyhow::Result<()> {
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(db.get_database_backend().build(&statement))
        .await?;
    Ok(())
}

/// Upsert one `plan_features` row per tier from the static catalogue
pub async fn seed_plans(db: &DatabaseConnection) -> anyhow::Result<usize> {
    let catalogue = PlanFeatures::catalogue();

    for plan in &catalogue {
        plan_features::Entity::insert(plan_to_active_model(plan))
            .on_conflict(
                OnConflict::column(plan_features::Column::Plan)
                    .update_columns([
                        plan_features::Column::MonthlyPriceCents,
                        plan_features::Column::CommissionBps,
                        plan_features::Column::FeaturedListings,
                        plan_features::Column::PrioritySupport,
                        plan_features::Column::AnalyticsDashboard,
                        plan_features::Column::CustomBranding,
                        plan_features::Column::ApiAccess,
                        plan_features::Column::ProjectPosts,
                        plan_features::Column::Proposals,
                        plan_features::Column::ActiveProjects,
                        plan_features::Column::PortfolioItems,
                        plan_features::Column::TeamMembers,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
    }

    Ok(catalogue.len())
}

fn limit_to_column(limit: Option<u32>) -> Option<i32> {
    limit.map(|v| i32::try_from(v).unwrap_or(i32::MAX))
}

fn limit_from_column(limit: Option<i32>) -> Option<u32> {
    limit.map(|v| u32::try_from(v).unwrap_or(0))
}

pub(crate) fn plan_to_active_model(plan: &PlanFeatures) -> plan_features::ActiveModel {
    plan_features::ActiveModel {
        plan: Set(plan.tier.as_str().to_string()),
        monthly_price_cents: Set(plan.monthly_price_cents),
        commission_bps: Set(i32::try_from(plan.commission_bps).unwrap_or(i32::MAX)),
        featured_listings: Set(plan.featured_listings),
        priority_support: Set(plan.priority_support),
        analytics_dashboard: Set(plan.analytics_dashboard),
        custom_branding: Set(plan.custom_branding),
        api_access: Set(plan.api_access),
        project_posts: Set(limit_to_column(plan.project_posts)),
        proposals: Set(limit_to_column(plan.proposals)),
        active_projects: Set(limit_to_column(plan.active_projects)),
        portfolio_items: Set(limit_to_column(plan.portfolio_items)),
        team_members: Set(limit_to_column(plan.team_members)),
    }
}

pub(crate) fn plan_from_model(model: plan_features::Model) -> Option<PlanFeatures> {
    let tier = model.plan.parse::<PlanTier>().ok()?;
    Some(PlanFeatures {
        tier,
        monthly_price_cents: model.monthly_price_cents,
        commission_bps: u32::try_from(model.commission_bps).unwrap_or(0),
        featured_listings: model.featured_listings,
        priority_support: model.priority_support,
        analytics_dashboard: model.analytics_dashboard,
        custom_branding: model.custom_branding,
        api_access: model.api_access,
        project_posts: limit_from_column(model.project_posts),
        proposals: limit_from_column(model.proposals),
        active_projects: limit_from_column(model.active_projects),
        portfolio_items: limit_from_column(model.portfolio_items),
        team_members: limit_from_column(model.team_members),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_maps_to_null() {
        assert_eq!(limit_to_column(None), None);
        assert_eq!(limit_to_column(Some(5)), Some(5));
        assert_eq!(limit_to_column(Some(u32::MAX)), Some(i32::MAX));
        assert_eq!(limit_from_column(Some(-1)), Some(0));
    }

    #[tokio::test]
    async fn test_init_schema_is_idempotent() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        init_schema(&db).await.unwrap();
        init_schema(&db).await.unwrap();

        let plans = plan_features::Entity::find().all(&db).await.unwrap();
        assert_eq!(plans.len(), PlanTier::ALL.len());

        let elite = plans
            .into_iter()
            .find(|p| p.plan == "elite")
            .and_then(plan_from_model)
            .unwrap();
        assert_eq!(elite, PlanTier::Elite.features());
    }
}
