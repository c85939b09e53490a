//! Per-project ingestion pipeline.
//!
//! For a target month: fetch dimensions, compute the date window in the
//! project's timezone, fan in analytics across counters and ads across
//! accounts, and upsert monthly fact rows by natural key. Running the same
//! sync any number of times converges to the same rows: all writes are
//! upserts and all ratios are recomputed from raw counters.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use bi_core::{
    AgeBucket, Counter, DirectAccount, Error, MonthRef, Project, Result,
};
use storage::{
    CampaignMonthlyUpsert, CounterStore, DirectStore, GoalStore, MetricsAgeMonthlyUpsert,
    MetricsMonthlyUpsert, MetricsStore, NewDirectCampaign, ProjectStore, TotalsMonthlyUpsert,
};
use yandex::{AdsApi, AdsApiFactory, AnalyticsApi, CampaignReportRow};

use crate::aggregate::{recompute_ratios, AdsAccumulator, TrafficAccumulator};

/// The ingestion engine: the only writer to fact tables.
pub struct SyncEngine {
    projects: Arc<dyn ProjectStore>,
    counters: Arc<dyn CounterStore>,
    goals: Arc<dyn GoalStore>,
    metrics: Arc<dyn MetricsStore>,
    direct: Arc<dyn DirectStore>,
    analytics: Arc<dyn AnalyticsApi>,
    ads: Arc<dyn AdsApiFactory>,
}

impl SyncEngine {
    pub fn new(
        projects: Arc<dyn ProjectStore>,
        counters: Arc<dyn CounterStore>,
        goals: Arc<dyn GoalStore>,
        metrics: Arc<dyn MetricsStore>,
        direct: Arc<dyn DirectStore>,
        analytics: Arc<dyn AnalyticsApi>,
        ads: Arc<dyn AdsApiFactory>,
    ) -> Self {
        Self {
            projects,
            counters,
            goals,
            metrics,
            direct,
            analytics,
            ads,
        }
    }

    async fn load_project(&self, project_id: i64) -> Result<Project> {
        self.projects
            .get(project_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("project {project_id}")))
    }

    /// Syncs both sources for the project's current month (in its timezone).
    pub async fn sync_project(&self, project_id: i64) -> Result<()> {
        let project = self.load_project(project_id).await?;
        let month = current_month_for(&project);

        self.sync_analytics_month(&project, month).await?;
        self.sync_ads_month(&project, month).await?;
        Ok(())
    }

    /// Syncs Metrika data for a specific month.
    pub async fn sync_analytics(&self, project_id: i64, year: i32, month: u32) -> Result<()> {
        let project = self.load_project(project_id).await?;
        let target = MonthRef::new(year, month)?;
        self.sync_analytics_month(&project, target).await
    }

    /// Syncs Direct data for a specific month.
    pub async fn sync_ads(&self, project_id: i64, year: i32, month: u32) -> Result<()> {
        let project = self.load_project(project_id).await?;
        let target = MonthRef::new(year, month)?;
        self.sync_ads_month(&project, target).await
    }

    async fn sync_analytics_month(&self, project: &Project, month: MonthRef) -> Result<()> {
        let (date_from, date_to) = month.date_window();

        let counters = self.counters.list_by_project(project.id).await?;
        if counters.is_empty() {
            info!(project_id = project.id, "No counters configured, skipping analytics sync");
            return Ok(());
        }

        // Deterministic: flagged primary, else the smallest internal id.
        let primary = pick_primary(&counters)
            .ok_or_else(|| Error::internal("non-empty counter list without a primary"))?
            .clone();

        let mut totals = TrafficAccumulator::default();
        let mut buckets: HashMap<AgeBucket, TrafficAccumulator> = HashMap::new();

        for counter in &counters {
            match self.fetch_counter_slice(counter, &date_from, &date_to).await {
                Ok(slice) => {
                    totals.add(
                        slice.summary.visits,
                        slice.summary.users,
                        slice.summary.bounce_rate,
                        slice.summary.avg_duration_sec,
                    );
                    for row in slice.age {
                        let bucket = AgeBucket::from_interval(&row.interval);
                        buckets.entry(bucket).or_default().add(
                            row.visits,
                            row.users,
                            row.bounce_rate,
                            row.avg_duration_sec,
                        );
                    }
                }
                Err(e) => {
                    self.check_branch_failure(&e, counter, counter.id == primary.id)?;
                    warn!(
                        project_id = project.id,
                        counter_id = counter.counter_id,
                        error = %e,
                        "Skipping counter after vendor failure"
                    );
                }
            }
        }

        let conversions = self
            .fetch_primary_conversions(project, &primary, &date_from, &date_to)
            .await?;

        self.metrics
            .upsert_month(MetricsMonthlyUpsert {
                project_id: project.id,
                year: month.year,
                month: month.month as i32,
                visits: totals.visits,
                users: totals.users,
                bounce_rate: totals.bounce_rate(),
                avg_session_duration_sec: totals.avg_duration_sec(),
                conversions,
            })
            .await?;

        for (bucket, acc) in &buckets {
            self.metrics
                .upsert_age_month(MetricsAgeMonthlyUpsert {
                    project_id: project.id,
                    year: month.year,
                    month: month.month as i32,
                    age_bucket: bucket.as_str().to_string(),
                    visits: acc.visits,
                    users: acc.users,
                    bounce_rate: acc.bounce_rate(),
                    avg_session_duration_sec: acc.avg_duration_sec(),
                })
                .await?;
        }

        info!(
            project_id = project.id,
            year = month.year,
            month = month.month,
            visits = totals.visits,
            age_buckets = buckets.len(),
            "Analytics sync completed"
        );
        Ok(())
    }

    /// Conversions come from the primary counter only, over the union of
    /// its conversion goals. A transient failure skips the branch; a
    /// permanent failure on the primary counter aborts the sync.
    async fn fetch_primary_conversions(
        &self,
        project: &Project,
        primary: &Counter,
        date_from: &str,
        date_to: &str,
    ) -> Result<Option<i64>> {
        let goal_ids: Vec<i64> = self
            .goals
            .conversion_goals_for_counter(primary.id)
            .await?
            .iter()
            .map(|g| g.goal_id)
            .collect();

        if goal_ids.is_empty() {
            return Ok(None);
        }

        match self
            .analytics
            .get_conversions(primary.counter_id, &goal_ids, date_from, date_to)
            .await
        {
            Ok(rows) => Ok(Some(rows.iter().map(|r| r.conversions).sum())),
            Err(e) if e.is_vendor_transient() => {
                warn!(
                    project_id = project.id,
                    counter_id = primary.counter_id,
                    error = %e,
                    "Skipping conversions after transient vendor failure"
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sync_ads_month(&self, project: &Project, month: MonthRef) -> Result<()> {
        let (date_from, date_to) = month.date_window();

        let accounts = self.direct.list_accounts(project.id).await?;
        if accounts.is_empty() {
            info!(project_id = project.id, "No Direct accounts configured, skipping ads sync");
            return Ok(());
        }

        let mut totals = AdsAccumulator::default();
        let mut any_account_succeeded = false;
        let mut last_transient: Option<Error> = None;

        for account in &accounts {
            let client = self.ads.for_account(&account.client_login)?;

            let rows = match client.get_campaign_report(&date_from, &date_to).await {
                Ok(rows) => rows,
                Err(e) if e.is_vendor_transient() => {
                    warn!(
                        project_id = project.id,
                        client_login = %account.client_login,
                        error = %e,
                        "Skipping Direct account after transient vendor failure"
                    );
                    last_transient = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            any_account_succeeded = true;

            let mut names: Option<HashMap<i64, String>> = None;
            for row in rows {
                let campaign_ref = self
                    .resolve_campaign(account, &row, client.as_ref(), &mut names)
                    .await?;

                let ratios = recompute_ratios(row.impressions, row.clicks, row.cost, row.conversions);
                self.direct
                    .upsert_campaign_month(CampaignMonthlyUpsert {
                        project_id: project.id,
                        direct_campaign_id: campaign_ref,
                        year: month.year,
                        month: month.month as i32,
                        impressions: row.impressions,
                        clicks: row.clicks,
                        ctr_pct: ratios.ctr_pct,
                        cpc: ratios.cpc,
                        conversions: row.conversions,
                        cpa: ratios.cpa,
                        cost: row.cost,
                    })
                    .await?;

                totals.add(row.impressions, row.clicks, row.cost, row.conversions);
            }
        }

        if !any_account_succeeded {
            // Every account failed transiently; fail the task so the queue
            // retries instead of recording a bogus zero month.
            return Err(last_transient
                .unwrap_or_else(|| Error::vendor_transient(None, "all Direct accounts failed")));
        }

        let ratios = totals.ratios();
        self.direct
            .upsert_totals_month(TotalsMonthlyUpsert {
                project_id: project.id,
                year: month.year,
                month: month.month as i32,
                impressions: totals.impressions,
                clicks: totals.clicks,
                ctr_pct: ratios.ctr_pct,
                cpc: ratios.cpc,
                conversions: totals.conversions,
                cpa: ratios.cpa,
                cost: totals.cost,
            })
            .await?;

        info!(
            project_id = project.id,
            year = month.year,
            month = month.month,
            impressions = totals.impressions,
            clicks = totals.clicks,
            "Ads sync completed"
        );
        Ok(())
    }

    async fn fetch_counter_slice(
        &self,
        counter: &Counter,
        date_from: &str,
        date_to: &str,
    ) -> Result<CounterSlice> {
        let summary = self
            .analytics
            .get_summary(counter.counter_id, date_from, date_to)
            .await?;
        let age = self
            .analytics
            .get_by_age(counter.counter_id, date_from, date_to)
            .await?;
        Ok(CounterSlice { summary, age })
    }

    /// Decides whether a per-counter failure may be skipped. Transient
    /// vendor failures always skip; a permanent vendor failure skips only
    /// on non-primary counters; anything else (storage, cancellation)
    /// aborts the sync.
    fn check_branch_failure(&self, e: &Error, _counter: &Counter, is_primary: bool) -> Result<()> {
        match e {
            Error::VendorTransient { .. } => Ok(()),
            Error::VendorPermanent { code, message } if is_primary => {
                Err(Error::vendor_permanent(*code, message.clone()))
            }
            Error::VendorPermanent { .. } => Ok(()),
            other => Err(Error::internal(format!("counter sync failed: {other}"))),
        }
    }

    /// Resolves a report row to a local campaign, creating it on first
    /// sight. The campaign list is fetched lazily, at most once per
    /// account, to name newly discovered campaigns.
    async fn resolve_campaign(
        &self,
        account: &DirectAccount,
        row: &CampaignReportRow,
        client: &dyn AdsApi,
        names: &mut Option<HashMap<i64, String>>,
    ) -> Result<i64> {
        if let Some(existing) = self
            .direct
            .get_campaign_by_vendor_id(account.id, row.campaign_id)
            .await?
        {
            return Ok(existing.id);
        }

        if names.is_none() {
            match client.list_campaigns().await {
                Ok(list) => {
                    *names = Some(list.into_iter().map(|c| (c.id, c.name)).collect());
                }
                Err(e) => {
                    warn!(
                        client_login = %account.client_login,
                        error = %e,
                        "Campaign list unavailable, naming from report row"
                    );
                    *names = Some(HashMap::new());
                }
            }
        }

        let name = names
            .as_ref()
            .and_then(|m| m.get(&row.campaign_id).cloned())
            .unwrap_or_else(|| row.campaign_name.clone());

        match self
            .direct
            .create_campaign(NewDirectCampaign {
                direct_account_id: account.id,
                campaign_id: row.campaign_id,
                name,
                status: String::new(),
            })
            .await
        {
            Ok(created) => Ok(created.id),
            // Another sync of the same project created it concurrently.
            Err(Error::Conflict(_)) => self
                .direct
                .get_campaign_by_vendor_id(account.id, row.campaign_id)
                .await?
                .map(|c| c.id)
                .ok_or_else(|| Error::internal("campaign conflict without a row")),
            Err(e) => Err(e),
        }
    }
}

struct CounterSlice {
    summary: yandex::TrafficSummary,
    age: Vec<yandex::AgeBreakdownRow>,
}

/// The current month in the project's timezone; unknown zones degrade to
/// UTC with a warning.
pub fn current_month_for(project: &Project) -> MonthRef {
    let (tz, known) = bi_core::resolve_timezone(&project.timezone);
    if !known {
        warn!(
            project_id = project.id,
            timezone = %project.timezone,
            "Unknown project timezone, using UTC"
        );
    }
    MonthRef::now_in(tz)
}

/// The counter whose goals drive conversion measurement: the flagged
/// primary, or the one with the smallest internal id.
pub fn pick_primary(counters: &[Counter]) -> Option<&Counter> {
    counters
        .iter()
        .find(|c| c.is_primary)
        .or_else(|| counters.iter().min_by_key(|c| c.id))
}
