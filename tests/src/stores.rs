//! In-memory store implementations keyed by the same natural tuples as the
//! MySQL repositories. Upserts preserve `created_at`, exactly like the
//! `ON DUPLICATE KEY UPDATE` contract.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use bi_core::{
    Counter, DirectAccount, DirectCampaign, DirectCampaignMonthly, DirectTotalsMonthly, Error,
    Goal, MetricsAgeMonthly, MetricsMonthly, Project, Result, SeoQueryMonthly, User,
    UserProjectRole,
};
use storage::{
    CampaignMonthlyUpsert, CounterStore, DirectStore, GoalStore, MetricsAgeMonthlyUpsert,
    MetricsMonthlyUpsert, MetricsStore, NewCounter, NewDirectAccount, NewDirectCampaign, NewGoal,
    NewProject, NewUser, ProjectStore, ProjectUpdate, SeoQueryUpsert, SeoStore,
    TotalsMonthlyUpsert, UserStore,
};

/// Fixed creation timestamp so idempotence comparisons are exact.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

#[derive(Default)]
struct State {
    next_id: i64,
    projects: HashMap<i64, Project>,
    counters: HashMap<i64, Counter>,
    goals: HashMap<i64, Goal>,
    accounts: HashMap<i64, DirectAccount>,
    campaigns: HashMap<i64, DirectCampaign>,
    users: HashMap<i64, User>,
    user_roles: HashMap<(i64, i64), UserProjectRole>,

    metrics_monthly: HashMap<(i64, i32, i32), MetricsMonthly>,
    age_monthly: HashMap<(i64, i32, i32, String), MetricsAgeMonthly>,
    campaign_monthly: HashMap<(i64, i64, i32, i32), DirectCampaignMonthly>,
    totals_monthly: HashMap<(i64, i32, i32), DirectTotalsMonthly>,
    seo_monthly: HashMap<(i64, i32, i32, String), SeoQueryMonthly>,
}

impl State {
    fn alloc_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// One shared in-memory database implementing every store trait.
#[derive(Clone, Default)]
pub struct MemoryStores {
    state: Arc<Mutex<State>>,
}

impl MemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    // Seeding helpers bypassing the create methods.

    pub fn seed_project(&self, id: i64, timezone: &str, is_active: bool) -> Project {
        let project = Project {
            id,
            name: format!("project-{id}"),
            slug: format!("project-{id}"),
            timezone: timezone.to_string(),
            currency: "RUB".to_string(),
            is_active,
            created_at: epoch(),
            updated_at: epoch(),
        };
        self.state.lock().projects.insert(id, project.clone());
        project
    }

    pub fn seed_counter(&self, id: i64, project_id: i64, counter_id: i64, is_primary: bool) -> Counter {
        let counter = Counter {
            id,
            project_id,
            counter_id,
            name: format!("counter-{counter_id}"),
            is_primary,
            created_at: epoch(),
            updated_at: epoch(),
        };
        self.state.lock().counters.insert(id, counter.clone());
        counter
    }

    pub fn seed_goal(&self, id: i64, counter_id: i64, goal_id: i64, is_conversion: bool) -> Goal {
        let goal = Goal {
            id,
            counter_id,
            goal_id,
            name: format!("goal-{goal_id}"),
            is_conversion,
            created_at: epoch(),
            updated_at: epoch(),
        };
        self.state.lock().goals.insert(id, goal.clone());
        goal
    }

    pub fn seed_account(&self, id: i64, project_id: i64, client_login: &str) -> DirectAccount {
        let account = DirectAccount {
            id,
            project_id,
            client_login: client_login.to_string(),
            account_name: client_login.to_string(),
            created_at: epoch(),
            updated_at: epoch(),
        };
        self.state.lock().accounts.insert(id, account.clone());
        account
    }

    pub fn seed_user(&self, id: i64, email: &str, role: &str, password_hash: &str) -> User {
        let user = User {
            id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            name: email.to_string(),
            role: role.to_string(),
            is_active: true,
            last_login_at: None,
            created_at: epoch(),
            updated_at: epoch(),
        };
        self.state.lock().users.insert(id, user.clone());
        user
    }

    pub fn seed_metrics_month(&self, row: MetricsMonthlyUpsert) {
        let state = &mut *self.state.lock();
        insert_metrics_month(state, row);
    }

    pub fn seed_totals_month(&self, row: TotalsMonthlyUpsert) {
        let state = &mut *self.state.lock();
        insert_totals_month(state, row);
    }

    // Snapshots for assertions.

    pub fn metrics_month(&self, project_id: i64, year: i32, month: i32) -> Option<MetricsMonthly> {
        self.state.lock().metrics_monthly.get(&(project_id, year, month)).cloned()
    }

    pub fn age_months(&self, project_id: i64, year: i32, month: i32) -> Vec<MetricsAgeMonthly> {
        let state = self.state.lock();
        let mut rows: Vec<_> = state
            .age_monthly
            .values()
            .filter(|r| r.project_id == project_id && r.year == year && r.month == month)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.age_bucket.cmp(&b.age_bucket));
        rows
    }

    pub fn totals_month(&self, project_id: i64, year: i32, month: i32) -> Option<DirectTotalsMonthly> {
        self.state.lock().totals_monthly.get(&(project_id, year, month)).cloned()
    }

    pub fn campaign_months(&self, project_id: i64) -> Vec<DirectCampaignMonthly> {
        let state = self.state.lock();
        let mut rows: Vec<_> = state
            .campaign_monthly
            .values()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.direct_campaign_id, r.year, r.month));
        rows
    }

    pub fn campaigns(&self) -> Vec<DirectCampaign> {
        let state = self.state.lock();
        let mut rows: Vec<_> = state.campaigns.values().cloned().collect();
        rows.sort_by_key(|c| c.id);
        rows
    }

    /// A comparable snapshot of every fact table, for idempotence checks.
    pub fn fact_snapshot(&self) -> String {
        let state = self.state.lock();

        let mut metrics: Vec<_> = state.metrics_monthly.values().collect();
        metrics.sort_by_key(|r| (r.project_id, r.year, r.month));
        let mut age: Vec<_> = state.age_monthly.values().collect();
        age.sort_by_key(|r| (r.project_id, r.year, r.month, r.age_bucket.clone()));
        let mut campaign: Vec<_> = state.campaign_monthly.values().collect();
        campaign.sort_by_key(|r| (r.project_id, r.direct_campaign_id, r.year, r.month));
        let mut totals: Vec<_> = state.totals_monthly.values().collect();
        totals.sort_by_key(|r| (r.project_id, r.year, r.month));

        serde_json::to_string(&(metrics, age, campaign, totals)).expect("serializable facts")
    }
}

fn insert_metrics_month(state: &mut State, row: MetricsMonthlyUpsert) {
    let key = (row.project_id, row.year, row.month);
    let created_at = state
        .metrics_monthly
        .get(&key)
        .map(|r| r.created_at)
        .unwrap_or_else(epoch);
    let id = state.metrics_monthly.get(&key).map(|r| r.id).unwrap_or_else(|| {
        state.next_id += 1;
        state.next_id
    });

    state.metrics_monthly.insert(
        key,
        MetricsMonthly {
            id,
            project_id: row.project_id,
            year: row.year,
            month: row.month,
            visits: row.visits,
            users: row.users,
            bounce_rate: row.bounce_rate,
            avg_session_duration_sec: row.avg_session_duration_sec,
            conversions: row.conversions,
            created_at,
        },
    );
}

fn insert_totals_month(state: &mut State, row: TotalsMonthlyUpsert) {
    let key = (row.project_id, row.year, row.month);
    let created_at = state
        .totals_monthly
        .get(&key)
        .map(|r| r.created_at)
        .unwrap_or_else(epoch);
    let id = state.totals_monthly.get(&key).map(|r| r.id).unwrap_or_else(|| {
        state.next_id += 1;
        state.next_id
    });

    state.totals_monthly.insert(
        key,
        DirectTotalsMonthly {
            id,
            project_id: row.project_id,
            year: row.year,
            month: row.month,
            impressions: row.impressions,
            clicks: row.clicks,
            ctr_pct: row.ctr_pct,
            cpc: row.cpc,
            conversions: row.conversions,
            cpa: row.cpa,
            cost: row.cost,
            created_at,
        },
    );
}

#[async_trait]
impl ProjectStore for MemoryStores {
    async fn create(&self, input: NewProject) -> Result<Project> {
        let mut state = self.state.lock();
        if state.projects.values().any(|p| p.slug == input.slug) {
            return Err(Error::conflict("project with this slug already exists"));
        }

        let id = state.alloc_id();
        let project = Project {
            id,
            name: input.name,
            slug: input.slug,
            timezone: input.timezone,
            currency: input.currency,
            is_active: true,
            created_at: epoch(),
            updated_at: epoch(),
        };
        state.projects.insert(id, project.clone());
        Ok(project)
    }

    async fn get(&self, id: i64) -> Result<Option<Project>> {
        Ok(self.state.lock().projects.get(&id).cloned())
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Project>> {
        Ok(self.state.lock().projects.values().find(|p| p.slug == slug).cloned())
    }

    async fn list(&self) -> Result<Vec<Project>> {
        let mut projects: Vec<_> = self.state.lock().projects.values().cloned().collect();
        projects.sort_by_key(|p| p.id);
        Ok(projects)
    }

    async fn list_active(&self) -> Result<Vec<Project>> {
        let mut projects: Vec<_> = self
            .state
            .lock()
            .projects
            .values()
            .filter(|p| p.is_active)
            .cloned()
            .collect();
        projects.sort_by_key(|p| p.id);
        Ok(projects)
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Project>> {
        let state = self.state.lock();
        let mut projects: Vec<_> = state
            .user_roles
            .values()
            .filter(|r| r.user_id == user_id)
            .filter_map(|r| state.projects.get(&r.project_id).cloned())
            .collect();
        projects.sort_by_key(|p| p.id);
        Ok(projects)
    }

    async fn update(&self, id: i64, update: ProjectUpdate) -> Result<Project> {
        let mut state = self.state.lock();
        let project = state
            .projects
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("project {id}")))?;

        if let Some(name) = update.name {
            project.name = name;
        }
        if let Some(timezone) = update.timezone {
            project.timezone = timezone;
        }
        if let Some(currency) = update.currency {
            project.currency = currency;
        }
        if let Some(is_active) = update.is_active {
            project.is_active = is_active;
        }
        Ok(project.clone())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let mut state = self.state.lock();
        state
            .projects
            .remove(&id)
            .ok_or_else(|| Error::not_found(format!("project {id}")))?;

        // cascade
        state.counters.retain(|_, c| c.project_id != id);
        state.accounts.retain(|_, a| a.project_id != id);
        state.metrics_monthly.retain(|_, r| r.project_id != id);
        state.age_monthly.retain(|_, r| r.project_id != id);
        state.campaign_monthly.retain(|_, r| r.project_id != id);
        state.totals_monthly.retain(|_, r| r.project_id != id);
        state.seo_monthly.retain(|_, r| r.project_id != id);
        Ok(())
    }
}

#[async_trait]
impl CounterStore for MemoryStores {
    async fn create(&self, input: NewCounter) -> Result<Counter> {
        let mut state = self.state.lock();
        if state
            .counters
            .values()
            .any(|c| c.project_id == input.project_id && c.counter_id == input.counter_id)
        {
            return Err(Error::conflict("counter for this project already exists"));
        }

        if input.is_primary {
            for counter in state.counters.values_mut() {
                if counter.project_id == input.project_id {
                    counter.is_primary = false;
                }
            }
        }

        let id = state.alloc_id();
        let counter = Counter {
            id,
            project_id: input.project_id,
            counter_id: input.counter_id,
            name: input.name,
            is_primary: input.is_primary,
            created_at: epoch(),
            updated_at: epoch(),
        };
        state.counters.insert(id, counter.clone());
        Ok(counter)
    }

    async fn get(&self, id: i64) -> Result<Option<Counter>> {
        Ok(self.state.lock().counters.get(&id).cloned())
    }

    async fn list_by_project(&self, project_id: i64) -> Result<Vec<Counter>> {
        let mut counters: Vec<_> = self
            .state
            .lock()
            .counters
            .values()
            .filter(|c| c.project_id == project_id)
            .cloned()
            .collect();
        counters.sort_by_key(|c| c.id);
        Ok(counters)
    }

    async fn set_primary(&self, project_id: i64, id: i64) -> Result<()> {
        let mut state = self.state.lock();
        if !state
            .counters
            .get(&id)
            .map(|c| c.project_id == project_id)
            .unwrap_or(false)
        {
            return Err(Error::not_found(format!("counter {id} in project {project_id}")));
        }

        for counter in state.counters.values_mut() {
            if counter.project_id == project_id {
                counter.is_primary = counter.id == id;
            }
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let mut state = self.state.lock();
        state
            .counters
            .remove(&id)
            .ok_or_else(|| Error::not_found(format!("counter {id}")))?;
        state.goals.retain(|_, g| g.counter_id != id);
        Ok(())
    }
}

#[async_trait]
impl GoalStore for MemoryStores {
    async fn create(&self, input: NewGoal) -> Result<Goal> {
        let mut state = self.state.lock();
        if state
            .goals
            .values()
            .any(|g| g.counter_id == input.counter_id && g.goal_id == input.goal_id)
        {
            return Err(Error::conflict("goal for this counter already exists"));
        }

        let id = state.alloc_id();
        let goal = Goal {
            id,
            counter_id: input.counter_id,
            goal_id: input.goal_id,
            name: input.name,
            is_conversion: input.is_conversion,
            created_at: epoch(),
            updated_at: epoch(),
        };
        state.goals.insert(id, goal.clone());
        Ok(goal)
    }

    async fn get(&self, id: i64) -> Result<Option<Goal>> {
        Ok(self.state.lock().goals.get(&id).cloned())
    }

    async fn get_by_vendor_id(&self, counter_id: i64, goal_id: i64) -> Result<Option<Goal>> {
        Ok(self
            .state
            .lock()
            .goals
            .values()
            .find(|g| g.counter_id == counter_id && g.goal_id == goal_id)
            .cloned())
    }

    async fn list_by_counter(&self, counter_id: i64) -> Result<Vec<Goal>> {
        let mut goals: Vec<_> = self
            .state
            .lock()
            .goals
            .values()
            .filter(|g| g.counter_id == counter_id)
            .cloned()
            .collect();
        goals.sort_by_key(|g| g.id);
        Ok(goals)
    }

    async fn conversion_goals_for_counter(&self, counter_id: i64) -> Result<Vec<Goal>> {
        let goals = self.list_by_counter(counter_id).await?;
        Ok(goals.into_iter().filter(|g| g.is_conversion).collect())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.state
            .lock()
            .goals
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("goal {id}")))
    }
}

#[async_trait]
impl DirectStore for MemoryStores {
    async fn create_account(&self, input: NewDirectAccount) -> Result<DirectAccount> {
        let mut state = self.state.lock();
        if state
            .accounts
            .values()
            .any(|a| a.project_id == input.project_id && a.client_login == input.client_login)
        {
            return Err(Error::conflict("account with this client login already exists"));
        }

        let id = state.alloc_id();
        let account = DirectAccount {
            id,
            project_id: input.project_id,
            client_login: input.client_login,
            account_name: input.account_name,
            created_at: epoch(),
            updated_at: epoch(),
        };
        state.accounts.insert(id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, id: i64) -> Result<Option<DirectAccount>> {
        Ok(self.state.lock().accounts.get(&id).cloned())
    }

    async fn get_account_by_login(
        &self,
        project_id: i64,
        client_login: &str,
    ) -> Result<Option<DirectAccount>> {
        Ok(self
            .state
            .lock()
            .accounts
            .values()
            .find(|a| a.project_id == project_id && a.client_login == client_login)
            .cloned())
    }

    async fn list_accounts(&self, project_id: i64) -> Result<Vec<DirectAccount>> {
        let mut accounts: Vec<_> = self
            .state
            .lock()
            .accounts
            .values()
            .filter(|a| a.project_id == project_id)
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    async fn delete_account(&self, id: i64) -> Result<()> {
        self.state
            .lock()
            .accounts
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("direct account {id}")))
    }

    async fn create_campaign(&self, input: NewDirectCampaign) -> Result<DirectCampaign> {
        let mut state = self.state.lock();
        if state
            .campaigns
            .values()
            .any(|c| c.direct_account_id == input.direct_account_id && c.campaign_id == input.campaign_id)
        {
            return Err(Error::conflict("campaign for this account already exists"));
        }

        let id = state.alloc_id();
        let campaign = DirectCampaign {
            id,
            direct_account_id: input.direct_account_id,
            campaign_id: input.campaign_id,
            name: input.name,
            status: input.status,
            created_at: epoch(),
            updated_at: epoch(),
        };
        state.campaigns.insert(id, campaign.clone());
        Ok(campaign)
    }

    async fn get_campaign_by_vendor_id(
        &self,
        direct_account_id: i64,
        campaign_id: i64,
    ) -> Result<Option<DirectCampaign>> {
        Ok(self
            .state
            .lock()
            .campaigns
            .values()
            .find(|c| c.direct_account_id == direct_account_id && c.campaign_id == campaign_id)
            .cloned())
    }

    async fn list_campaigns_by_account(
        &self,
        direct_account_id: i64,
    ) -> Result<Vec<DirectCampaign>> {
        let mut campaigns: Vec<_> = self
            .state
            .lock()
            .campaigns
            .values()
            .filter(|c| c.direct_account_id == direct_account_id)
            .cloned()
            .collect();
        campaigns.sort_by_key(|c| c.id);
        Ok(campaigns)
    }

    async fn list_campaigns_by_project(&self, project_id: i64) -> Result<Vec<DirectCampaign>> {
        let state = self.state.lock();
        let account_ids: Vec<i64> = state
            .accounts
            .values()
            .filter(|a| a.project_id == project_id)
            .map(|a| a.id)
            .collect();

        let mut campaigns: Vec<_> = state
            .campaigns
            .values()
            .filter(|c| account_ids.contains(&c.direct_account_id))
            .cloned()
            .collect();
        campaigns.sort_by_key(|c| c.id);
        Ok(campaigns)
    }

    async fn upsert_campaign_month(&self, row: CampaignMonthlyUpsert) -> Result<()> {
        let mut state = self.state.lock();
        let key = (row.project_id, row.direct_campaign_id, row.year, row.month);
        let created_at = state
            .campaign_monthly
            .get(&key)
            .map(|r| r.created_at)
            .unwrap_or_else(epoch);
        let id = state.campaign_monthly.get(&key).map(|r| r.id).unwrap_or_else(|| {
            state.next_id += 1;
            state.next_id
        });

        state.campaign_monthly.insert(
            key,
            DirectCampaignMonthly {
                id,
                project_id: row.project_id,
                direct_campaign_id: row.direct_campaign_id,
                year: row.year,
                month: row.month,
                impressions: row.impressions,
                clicks: row.clicks,
                ctr_pct: row.ctr_pct,
                cpc: row.cpc,
                conversions: row.conversions,
                cpa: row.cpa,
                cost: row.cost,
                created_at,
            },
        );
        Ok(())
    }

    async fn get_campaign_month(
        &self,
        project_id: i64,
        direct_campaign_id: i64,
        year: i32,
        month: i32,
    ) -> Result<Option<DirectCampaignMonthly>> {
        Ok(self
            .state
            .lock()
            .campaign_monthly
            .get(&(project_id, direct_campaign_id, year, month))
            .cloned())
    }

    async fn upsert_totals_month(&self, row: TotalsMonthlyUpsert) -> Result<()> {
        let state = &mut *self.state.lock();
        insert_totals_month(state, row);
        Ok(())
    }

    async fn get_totals_month(
        &self,
        project_id: i64,
        year: i32,
        month: i32,
    ) -> Result<Option<DirectTotalsMonthly>> {
        Ok(self.state.lock().totals_monthly.get(&(project_id, year, month)).cloned())
    }
}

#[async_trait]
impl MetricsStore for MemoryStores {
    async fn upsert_month(&self, row: MetricsMonthlyUpsert) -> Result<()> {
        let state = &mut *self.state.lock();
        insert_metrics_month(state, row);
        Ok(())
    }

    async fn get_month(
        &self,
        project_id: i64,
        year: i32,
        month: i32,
    ) -> Result<Option<MetricsMonthly>> {
        Ok(self.metrics_month(project_id, year, month))
    }

    async fn upsert_age_month(&self, row: MetricsAgeMonthlyUpsert) -> Result<()> {
        let mut state = self.state.lock();
        let key = (row.project_id, row.year, row.month, row.age_bucket.clone());
        let created_at = state
            .age_monthly
            .get(&key)
            .map(|r| r.created_at)
            .unwrap_or_else(epoch);
        let id = state.age_monthly.get(&key).map(|r| r.id).unwrap_or_else(|| {
            state.next_id += 1;
            state.next_id
        });

        state.age_monthly.insert(
            key,
            MetricsAgeMonthly {
                id,
                project_id: row.project_id,
                year: row.year,
                month: row.month,
                age_bucket: row.age_bucket,
                visits: row.visits,
                users: row.users,
                bounce_rate: row.bounce_rate,
                avg_session_duration_sec: row.avg_session_duration_sec,
                created_at,
            },
        );
        Ok(())
    }

    async fn list_age_months(
        &self,
        project_id: i64,
        year: i32,
        month: i32,
    ) -> Result<Vec<MetricsAgeMonthly>> {
        Ok(self.age_months(project_id, year, month))
    }
}

#[async_trait]
impl SeoStore for MemoryStores {
    async fn upsert_query(&self, row: SeoQueryUpsert) -> Result<()> {
        let mut state = self.state.lock();
        let key = (row.project_id, row.year, row.month, row.query.clone());
        let created_at = state
            .seo_monthly
            .get(&key)
            .map(|r| r.created_at)
            .unwrap_or_else(epoch);
        let id = state.seo_monthly.get(&key).map(|r| r.id).unwrap_or_else(|| {
            state.next_id += 1;
            state.next_id
        });

        state.seo_monthly.insert(
            key,
            SeoQueryMonthly {
                id,
                project_id: row.project_id,
                year: row.year,
                month: row.month,
                query: row.query,
                position: row.position,
                url: row.url,
                created_at,
            },
        );
        Ok(())
    }

    async fn list_queries(
        &self,
        project_id: i64,
        year: i32,
        month: i32,
    ) -> Result<Vec<SeoQueryMonthly>> {
        let state = self.state.lock();
        let mut rows: Vec<_> = state
            .seo_monthly
            .values()
            .filter(|r| r.project_id == project_id && r.year == year && r.month == month)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.position);
        Ok(rows)
    }
}

#[async_trait]
impl UserStore for MemoryStores {
    async fn create(&self, input: NewUser) -> Result<User> {
        let mut state = self.state.lock();
        if state.users.values().any(|u| u.email == input.email) {
            return Err(Error::conflict("user with this email already exists"));
        }

        let id = state.alloc_id();
        let user = User {
            id,
            email: input.email,
            password_hash: input.password_hash,
            name: input.name,
            role: input.role,
            is_active: true,
            last_login_at: None,
            created_at: epoch(),
            updated_at: epoch(),
        };
        state.users.insert(id, user.clone());
        Ok(user)
    }

    async fn get(&self, id: i64) -> Result<Option<User>> {
        Ok(self.state.lock().users.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.state.lock().users.values().find(|u| u.email == email).cloned())
    }

    async fn list(&self) -> Result<Vec<User>> {
        let mut users: Vec<_> = self.state.lock().users.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn update_last_login(&self, id: i64) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(user) = state.users.get_mut(&id) {
            user.last_login_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.state
            .lock()
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("user {id}")))
    }

    async fn assign_project_role(&self, user_id: i64, project_id: i64, role: &str) -> Result<()> {
        self.state.lock().user_roles.insert(
            (user_id, project_id),
            UserProjectRole {
                user_id,
                project_id,
                role: role.to_string(),
                created_at: epoch(),
            },
        );
        Ok(())
    }

    async fn remove_project_role(&self, user_id: i64, project_id: i64) -> Result<()> {
        self.state
            .lock()
            .user_roles
            .remove(&(user_id, project_id))
            .map(|_| ())
            .ok_or_else(|| {
                Error::not_found(format!("role for user {user_id} on project {project_id}"))
            })
    }

    async fn project_role(
        &self,
        user_id: i64,
        project_id: i64,
    ) -> Result<Option<UserProjectRole>> {
        Ok(self.state.lock().user_roles.get(&(user_id, project_id)).cloned())
    }

    async fn list_project_users(&self, project_id: i64) -> Result<Vec<UserProjectRole>> {
        let mut roles: Vec<_> = self
            .state
            .lock()
            .user_roles
            .values()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect();
        roles.sort_by_key(|r| r.user_id);
        Ok(roles)
    }

    async fn list_user_projects(&self, user_id: i64) -> Result<Vec<UserProjectRole>> {
        let mut roles: Vec<_> = self
            .state
            .lock()
            .user_roles
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        roles.sort_by_key(|r| r.project_id);
        Ok(roles)
    }
}
