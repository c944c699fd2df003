//! `SeaORM` Entity for plan_features table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "plan_features")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub plan: String,
    pub monthly_price_cents: i64,
    pub commission_bps: i32,
    pub featured_listings: bool,
    pub priority_support: bool,
    pub analytics_dashboard: bool,
    pub custom_branding: bool,
    pub api_access: bool,
    pub project_posts: Option<i32>,
    pub proposals: Option<i32>,
    pub active_projects: Option<i32>,
    pub portfolio_items: Option<i32>,
    pub team_members: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
