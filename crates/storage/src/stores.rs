//! Store traits and write inputs.
//!
//! The engine and the read path consume these traits; the sqlx repositories
//! in [`crate::repos`] implement them. Tests provide in-memory
//! implementations keyed by the same natural tuples.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use bi_core::{
    Counter, DirectAccount, DirectCampaign, DirectCampaignMonthly, DirectTotalsMonthly, Goal,
    MetricsAgeMonthly, MetricsMonthly, Project, Result, SeoQueryMonthly, User, UserProjectRole,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub slug: String,
    pub timezone: String,
    pub currency: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub timezone: Option<String>,
    pub currency: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCounter {
    pub project_id: i64,
    pub counter_id: i64,
    pub name: String,
    pub is_primary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGoal {
    pub counter_id: i64,
    pub goal_id: i64,
    pub name: String,
    pub is_conversion: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDirectAccount {
    pub project_id: i64,
    pub client_login: String,
    pub account_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDirectCampaign {
    pub direct_account_id: i64,
    pub campaign_id: i64,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: String,
}

/// Measures for one `metrics_monthly` row, keyed by its natural tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsMonthlyUpsert {
    pub project_id: i64,
    pub year: i32,
    pub month: i32,
    pub visits: i64,
    pub users: i64,
    pub bounce_rate: f64,
    pub avg_session_duration_sec: i64,
    pub conversions: Option<i64>,
}

/// Measures for one `metrics_age_monthly` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsAgeMonthlyUpsert {
    pub project_id: i64,
    pub year: i32,
    pub month: i32,
    pub age_bucket: String,
    pub visits: i64,
    pub users: i64,
    pub bounce_rate: f64,
    pub avg_session_duration_sec: i64,
}

/// Measures for one `direct_campaign_monthly` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignMonthlyUpsert {
    pub project_id: i64,
    pub direct_campaign_id: i64,
    pub year: i32,
    pub month: i32,
    pub impressions: i64,
    pub clicks: i64,
    pub ctr_pct: f64,
    pub cpc: f64,
    pub conversions: Option<i64>,
    pub cpa: Option<f64>,
    pub cost: f64,
}

/// Measures for one `direct_totals_monthly` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalsMonthlyUpsert {
    pub project_id: i64,
    pub year: i32,
    pub month: i32,
    pub impressions: i64,
    pub clicks: i64,
    pub ctr_pct: f64,
    pub cpc: f64,
    pub conversions: Option<i64>,
    pub cpa: Option<f64>,
    pub cost: f64,
}

/// One `seo_queries_monthly` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoQueryUpsert {
    pub project_id: i64,
    pub year: i32,
    pub month: i32,
    pub query: String,
    pub position: i32,
    pub url: Option<String>,
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn create(&self, input: NewProject) -> Result<Project>;
    async fn get(&self, id: i64) -> Result<Option<Project>>;
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Project>>;
    async fn list(&self) -> Result<Vec<Project>>;
    async fn list_active(&self) -> Result<Vec<Project>>;
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Project>>;
    async fn update(&self, id: i64, update: ProjectUpdate) -> Result<Project>;
    async fn delete(&self, id: i64) -> Result<()>;
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn create(&self, input: NewCounter) -> Result<Counter>;
    async fn get(&self, id: i64) -> Result<Option<Counter>>;
    async fn list_by_project(&self, project_id: i64) -> Result<Vec<Counter>>;
    async fn set_primary(&self, project_id: i64, id: i64) -> Result<()>;
    async fn delete(&self, id: i64) -> Result<()>;
}

#[async_trait]
pub trait GoalStore: Send + Sync {
    async fn create(&self, input: NewGoal) -> Result<Goal>;
    async fn get(&self, id: i64) -> Result<Option<Goal>>;
    async fn get_by_vendor_id(&self, counter_id: i64, goal_id: i64) -> Result<Option<Goal>>;
    async fn list_by_counter(&self, counter_id: i64) -> Result<Vec<Goal>>;
    async fn conversion_goals_for_counter(&self, counter_id: i64) -> Result<Vec<Goal>>;
    async fn delete(&self, id: i64) -> Result<()>;
}

#[async_trait]
pub trait DirectStore: Send + Sync {
    async fn create_account(&self, input: NewDirectAccount) -> Result<DirectAccount>;
    async fn get_account(&self, id: i64) -> Result<Option<DirectAccount>>;
    async fn get_account_by_login(
        &self,
        project_id: i64,
        client_login: &str,
    ) -> Result<Option<DirectAccount>>;
    async fn list_accounts(&self, project_id: i64) -> Result<Vec<DirectAccount>>;
    async fn delete_account(&self, id: i64) -> Result<()>;

    async fn create_campaign(&self, input: NewDirectCampaign) -> Result<DirectCampaign>;
    async fn get_campaign_by_vendor_id(
        &self,
        direct_account_id: i64,
        campaign_id: i64,
    ) -> Result<Option<DirectCampaign>>;
    async fn list_campaigns_by_account(&self, direct_account_id: i64)
        -> Result<Vec<DirectCampaign>>;
    async fn list_campaigns_by_project(&self, project_id: i64) -> Result<Vec<DirectCampaign>>;

    async fn upsert_campaign_month(&self, row: CampaignMonthlyUpsert) -> Result<()>;
    async fn get_campaign_month(
        &self,
        project_id: i64,
        direct_campaign_id: i64,
        year: i32,
        month: i32,
    ) -> Result<Option<DirectCampaignMonthly>>;
    async fn upsert_totals_month(&self, row: TotalsMonthlyUpsert) -> Result<()>;
    async fn get_totals_month(
        &self,
        project_id: i64,
        year: i32,
        month: i32,
    ) -> Result<Option<DirectTotalsMonthly>>;
}

#[async_trait]
pub trait MetricsStore: Send + Sync {
    async fn upsert_month(&self, row: MetricsMonthlyUpsert) -> Result<()>;
    async fn get_month(
        &self,
        project_id: i64,
        year: i32,
        month: i32,
    ) -> Result<Option<MetricsMonthly>>;
    async fn upsert_age_month(&self, row: MetricsAgeMonthlyUpsert) -> Result<()>;
    async fn list_age_months(
        &self,
        project_id: i64,
        year: i32,
        month: i32,
    ) -> Result<Vec<MetricsAgeMonthly>>;
}

#[async_trait]
pub trait SeoStore: Send + Sync {
    async fn upsert_query(&self, row: SeoQueryUpsert) -> Result<()>;
    async fn list_queries(
        &self,
        project_id: i64,
        year: i32,
        month: i32,
    ) -> Result<Vec<SeoQueryMonthly>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, input: NewUser) -> Result<User>;
    async fn get(&self, id: i64) -> Result<Option<User>>;
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn list(&self) -> Result<Vec<User>>;
    async fn update_last_login(&self, id: i64) -> Result<()>;
    async fn delete(&self, id: i64) -> Result<()>;

    async fn assign_project_role(&self, user_id: i64, project_id: i64, role: &str) -> Result<()>;
    async fn remove_project_role(&self, user_id: i64, project_id: i64) -> Result<()>;
    async fn project_role(&self, user_id: i64, project_id: i64)
        -> Result<Option<UserProjectRole>>;
    async fn list_project_users(&self, project_id: i64) -> Result<Vec<UserProjectRole>>;
    async fn list_user_projects(&self, user_id: i64) -> Result<Vec<UserProjectRole>>;
}
