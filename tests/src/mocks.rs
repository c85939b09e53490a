//! Scripted vendor mocks implementing the capability traits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use bi_core::{Error, Result};
use yandex::{
    AdsApi, AdsApiFactory, AgeBreakdownRow, AnalyticsApi, CampaignRef, CampaignReportRow,
    GoalConversions, GoalDefinition, TrafficSummary,
};

/// How a scripted branch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    Transient,
    Permanent,
}

impl FailureMode {
    fn to_error(self) -> Error {
        match self {
            Self::Transient => Error::vendor_transient(Some(500), "mock: internal server error"),
            Self::Permanent => Error::vendor_permanent(Some(53), "mock: invalid token"),
        }
    }
}

#[derive(Default)]
struct AnalyticsScript {
    goals: HashMap<i64, Vec<GoalDefinition>>,
    summaries: HashMap<i64, TrafficSummary>,
    age: HashMap<i64, Vec<AgeBreakdownRow>>,
    conversions: HashMap<i64, Vec<GoalConversions>>,
    /// Failure applied to summary/age calls of a counter.
    counter_failures: HashMap<i64, FailureMode>,
    /// Failure applied to conversion calls of a counter.
    conversion_failures: HashMap<i64, FailureMode>,
}

/// Scripted Metrika capability with call counting.
#[derive(Default)]
pub struct MockAnalytics {
    script: Mutex<AnalyticsScript>,
    pub summary_calls: AtomicU32,
    pub age_calls: AtomicU32,
    pub conversion_calls: AtomicU32,
    pub goal_list_calls: AtomicU32,
}

impl MockAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_summary(self, counter_id: i64, summary: TrafficSummary) -> Self {
        self.script.lock().summaries.insert(counter_id, summary);
        self
    }

    pub fn with_age(self, counter_id: i64, rows: Vec<AgeBreakdownRow>) -> Self {
        self.script.lock().age.insert(counter_id, rows);
        self
    }

    pub fn with_conversions(self, counter_id: i64, rows: Vec<GoalConversions>) -> Self {
        self.script.lock().conversions.insert(counter_id, rows);
        self
    }

    pub fn with_goals(self, counter_id: i64, goals: Vec<GoalDefinition>) -> Self {
        self.script.lock().goals.insert(counter_id, goals);
        self
    }

    pub fn with_counter_failure(self, counter_id: i64, mode: FailureMode) -> Self {
        self.script.lock().counter_failures.insert(counter_id, mode);
        self
    }

    pub fn with_conversion_failure(self, counter_id: i64, mode: FailureMode) -> Self {
        self.script.lock().conversion_failures.insert(counter_id, mode);
        self
    }
}

#[async_trait]
impl AnalyticsApi for MockAnalytics {
    async fn list_goals(&self, counter_id: i64) -> Result<Vec<GoalDefinition>> {
        self.goal_list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.script.lock().goals.get(&counter_id).cloned().unwrap_or_default())
    }

    async fn get_summary(
        &self,
        counter_id: i64,
        _date_from: &str,
        _date_to: &str,
    ) -> Result<TrafficSummary> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);

        let script = self.script.lock();
        if let Some(mode) = script.counter_failures.get(&counter_id) {
            return Err(mode.to_error());
        }
        Ok(script.summaries.get(&counter_id).copied().unwrap_or_default())
    }

    async fn get_by_age(
        &self,
        counter_id: i64,
        _date_from: &str,
        _date_to: &str,
    ) -> Result<Vec<AgeBreakdownRow>> {
        self.age_calls.fetch_add(1, Ordering::SeqCst);

        let script = self.script.lock();
        if let Some(mode) = script.counter_failures.get(&counter_id) {
            return Err(mode.to_error());
        }
        Ok(script.age.get(&counter_id).cloned().unwrap_or_default())
    }

    async fn get_conversions(
        &self,
        counter_id: i64,
        goal_ids: &[i64],
        _date_from: &str,
        _date_to: &str,
    ) -> Result<Vec<GoalConversions>> {
        // The real client short-circuits before any network activity; the
        // engine must never reach this call with an empty goal list either.
        assert!(!goal_ids.is_empty(), "engine called get_conversions with no goals");

        self.conversion_calls.fetch_add(1, Ordering::SeqCst);

        let script = self.script.lock();
        if let Some(mode) = script.conversion_failures.get(&counter_id) {
            return Err(mode.to_error());
        }
        Ok(script.conversions.get(&counter_id).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
struct AdsScript {
    campaigns: Vec<CampaignRef>,
    report: Vec<CampaignReportRow>,
    failure: Option<FailureMode>,
}

/// Scripted Direct capability for one account.
#[derive(Default)]
pub struct MockAds {
    script: Mutex<AdsScript>,
    pub report_calls: AtomicU32,
    pub list_calls: AtomicU32,
}

impl MockAds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_report(self, rows: Vec<CampaignReportRow>) -> Self {
        self.script.lock().report = rows;
        self
    }

    pub fn with_campaigns(self, campaigns: Vec<CampaignRef>) -> Self {
        self.script.lock().campaigns = campaigns;
        self
    }

    pub fn with_failure(self, mode: FailureMode) -> Self {
        self.script.lock().failure = Some(mode);
        self
    }
}

#[async_trait]
impl AdsApi for MockAds {
    async fn list_campaigns(&self) -> Result<Vec<CampaignRef>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.script.lock().campaigns.clone())
    }

    async fn get_campaign_report(
        &self,
        _date_from: &str,
        _date_to: &str,
    ) -> Result<Vec<CampaignReportRow>> {
        self.report_calls.fetch_add(1, Ordering::SeqCst);

        let script = self.script.lock();
        if let Some(mode) = script.failure {
            return Err(mode.to_error());
        }
        Ok(script.report.clone())
    }
}

/// Factory mapping client logins to scripted accounts.
#[derive(Default)]
pub struct MockAdsFactory {
    accounts: Mutex<HashMap<String, Arc<MockAds>>>,
}

impl MockAdsFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, client_login: &str, ads: Arc<MockAds>) -> Self {
        self.accounts.lock().insert(client_login.to_string(), ads);
        self
    }
}

impl AdsApiFactory for MockAdsFactory {
    fn for_account(&self, client_login: &str) -> Result<Arc<dyn AdsApi>> {
        let accounts = self.accounts.lock();
        let ads = accounts
            .get(client_login)
            .cloned()
            .unwrap_or_else(|| Arc::new(MockAds::new()));
        Ok(ads)
    }
}
