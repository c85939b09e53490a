//! Vendor capability traits.
//!
//! The engine is parametric over these small capability sets rather than
//! over concrete clients, so tests can script vendor behavior and the
//! engine stays ignorant of wire details.

use std::sync::Arc;

use async_trait::async_trait;

use bi_core::Result;

use crate::config::YandexConfig;
use crate::direct::{CampaignRef, CampaignReportRow, DirectClient};
use crate::metrika::{
    AgeBreakdownRow, GoalConversions, GoalDefinition, MetrikaClient, TrafficSummary,
};

/// Analytics-side capabilities (Metrika).
#[async_trait]
pub trait AnalyticsApi: Send + Sync {
    async fn list_goals(&self, counter_id: i64) -> Result<Vec<GoalDefinition>>;
    async fn get_summary(
        &self,
        counter_id: i64,
        date_from: &str,
        date_to: &str,
    ) -> Result<TrafficSummary>;
    async fn get_by_age(
        &self,
        counter_id: i64,
        date_from: &str,
        date_to: &str,
    ) -> Result<Vec<AgeBreakdownRow>>;
    async fn get_conversions(
        &self,
        counter_id: i64,
        goal_ids: &[i64],
        date_from: &str,
        date_to: &str,
    ) -> Result<Vec<GoalConversions>>;
}

#[async_trait]
impl AnalyticsApi for MetrikaClient {
    async fn list_goals(&self, counter_id: i64) -> Result<Vec<GoalDefinition>> {
        MetrikaClient::list_goals(self, counter_id).await
    }

    async fn get_summary(
        &self,
        counter_id: i64,
        date_from: &str,
        date_to: &str,
    ) -> Result<TrafficSummary> {
        MetrikaClient::get_summary(self, counter_id, date_from, date_to).await
    }

    async fn get_by_age(
        &self,
        counter_id: i64,
        date_from: &str,
        date_to: &str,
    ) -> Result<Vec<AgeBreakdownRow>> {
        MetrikaClient::get_by_age(self, counter_id, date_from, date_to).await
    }

    async fn get_conversions(
        &self,
        counter_id: i64,
        goal_ids: &[i64],
        date_from: &str,
        date_to: &str,
    ) -> Result<Vec<GoalConversions>> {
        MetrikaClient::get_conversions(self, counter_id, goal_ids, date_from, date_to).await
    }
}

/// Ads-side capabilities (Direct), bound to one sub-account.
#[async_trait]
pub trait AdsApi: Send + Sync {
    async fn list_campaigns(&self) -> Result<Vec<CampaignRef>>;
    async fn get_campaign_report(
        &self,
        date_from: &str,
        date_to: &str,
    ) -> Result<Vec<CampaignReportRow>>;
}

#[async_trait]
impl AdsApi for DirectClient {
    async fn list_campaigns(&self) -> Result<Vec<CampaignRef>> {
        DirectClient::list_campaigns(self).await
    }

    async fn get_campaign_report(
        &self,
        date_from: &str,
        date_to: &str,
    ) -> Result<Vec<CampaignReportRow>> {
        DirectClient::get_campaign_report(self, date_from, date_to).await
    }
}

/// Builds an [`AdsApi`] per sub-account; the ads pipeline fans out across
/// a project's accounts, each with its own `Client-Login`.
pub trait AdsApiFactory: Send + Sync {
    fn for_account(&self, client_login: &str) -> Result<Arc<dyn AdsApi>>;
}

/// Production factory over [`DirectClient`].
pub struct DirectClientFactory {
    config: YandexConfig,
}

impl DirectClientFactory {
    pub fn new(config: YandexConfig) -> Self {
        Self { config }
    }
}

impl AdsApiFactory for DirectClientFactory {
    fn for_account(&self, client_login: &str) -> Result<Arc<dyn AdsApi>> {
        Ok(Arc::new(DirectClient::new(&self.config, client_login)?))
    }
}
