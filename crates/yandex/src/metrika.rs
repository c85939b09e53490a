//! Yandex Metrika client: counter statistics and goal management.

use serde::Deserialize;
use tracing::debug;

use bi_core::{Error, Result};

use crate::config::YandexConfig;
use crate::{ensure_success, map_transport_error};

const DEFAULT_BASE_URL: &str = "https://api-metrika.yandex.net";

const SUMMARY_METRICS: &str = "ym:s:visits,ym:s:users,ym:s:bounceRate,ym:s:avgVisitDurationSeconds";
const AGE_DIMENSION: &str = "ym:s:ageIntervalName";

/// Aggregate counter traffic for a date window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrafficSummary {
    pub visits: i64,
    pub users: i64,
    pub bounce_rate: f64,
    pub avg_duration_sec: i64,
}

/// One age bucket of the age breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct AgeBreakdownRow {
    /// Vendor age-interval name, e.g. "18-24"; unmapped names are the
    /// caller's problem (they aggregate under `unknown`).
    pub interval: String,
    pub visits: i64,
    pub users: i64,
    pub bounce_rate: f64,
    pub avg_duration_sec: i64,
}

/// Per-goal conversion metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalConversions {
    pub goal_id: i64,
    pub visits: i64,
    pub conversions: i64,
}

/// A goal definition from the management API.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GoalDefinition {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub goal_type: String,
    #[serde(default)]
    pub is_retargeting: bool,
}

/// The management API returns goal lists in two shapes depending on the
/// endpoint revision: a bare array, or an object wrapping `goals`. Both are
/// legitimate; try the bare shape first, then the wrapped one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GoalsPayload {
    Bare(Vec<GoalDefinition>),
    Wrapped { goals: Vec<GoalDefinition> },
}

#[derive(Debug, Deserialize)]
struct StatResponse {
    #[serde(default)]
    data: Vec<StatRow>,
}

#[derive(Debug, Deserialize)]
struct StatRow {
    #[serde(default)]
    dimensions: Vec<DimensionValue>,
    #[serde(default)]
    metrics: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct DimensionValue {
    #[serde(default)]
    name: Option<String>,
}

/// Metrika API client.
#[derive(Clone)]
pub struct MetrikaClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
}

impl MetrikaClient {
    /// Creates a new client against the production API.
    pub fn new(config: &YandexConfig) -> Result<Self> {
        Self::with_base_url(config, DEFAULT_BASE_URL)
    }

    /// Creates a client against a custom base URL (tests).
    pub fn with_base_url(config: &YandexConfig, base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            token: config.oauth_token.clone(),
            base_url: base_url.into(),
        })
    }

    fn auth_header(&self) -> String {
        format!("OAuth {}", self.token)
    }

    async fn stat_request(&self, query: &[(&str, String)]) -> Result<StatResponse> {
        let url = format!("{}/stat/v1/data", self.base_url);

        let resp = self
            .http
            .get(&url)
            .header("Authorization", self.auth_header())
            .query(query)
            .send()
            .await
            .map_err(map_transport_error)?;

        let resp = ensure_success(resp).await?;
        resp.json::<StatResponse>()
            .await
            .map_err(|e| Error::vendor_permanent(None, format!("invalid stat response: {e}")))
    }

    /// Lists the goals defined on a counter.
    pub async fn list_goals(&self, counter_id: i64) -> Result<Vec<GoalDefinition>> {
        let url = format!("{}/management/v1/counter/{}/goals", self.base_url, counter_id);

        let resp = self
            .http
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(map_transport_error)?;

        let resp = ensure_success(resp).await?;
        let body = resp.text().await.map_err(map_transport_error)?;

        let goals = match serde_json::from_str::<GoalsPayload>(&body) {
            Ok(GoalsPayload::Bare(goals)) | Ok(GoalsPayload::Wrapped { goals }) => goals,
            Err(e) => {
                return Err(Error::vendor_permanent(
                    None,
                    format!("goal list matches neither known response shape: {e}"),
                ))
            }
        };

        debug!(counter_id, count = goals.len(), "Listed Metrika goals");
        Ok(goals)
    }

    /// Fetches the traffic summary for a counter and date window.
    ///
    /// An empty result set yields zeroed measures, not an error.
    pub async fn get_summary(
        &self,
        counter_id: i64,
        date_from: &str,
        date_to: &str,
    ) -> Result<TrafficSummary> {
        let response = self
            .stat_request(&[
                ("ids", counter_id.to_string()),
                ("date1", date_from.to_string()),
                ("date2", date_to.to_string()),
                ("metrics", SUMMARY_METRICS.to_string()),
            ])
            .await?;

        let summary = match response.data.first() {
            Some(row) => TrafficSummary {
                visits: metric_at(&row.metrics, 0) as i64,
                users: metric_at(&row.metrics, 1) as i64,
                bounce_rate: metric_at(&row.metrics, 2),
                avg_duration_sec: metric_at(&row.metrics, 3) as i64,
            },
            None => TrafficSummary::default(),
        };

        debug!(counter_id, visits = summary.visits, "Fetched Metrika summary");
        Ok(summary)
    }

    /// Fetches the traffic summary broken down by age interval.
    pub async fn get_by_age(
        &self,
        counter_id: i64,
        date_from: &str,
        date_to: &str,
    ) -> Result<Vec<AgeBreakdownRow>> {
        let response = self
            .stat_request(&[
                ("ids", counter_id.to_string()),
                ("date1", date_from.to_string()),
                ("date2", date_to.to_string()),
                ("metrics", SUMMARY_METRICS.to_string()),
                ("dimensions", AGE_DIMENSION.to_string()),
            ])
            .await?;

        let rows = response
            .data
            .into_iter()
            .map(|row| AgeBreakdownRow {
                interval: row
                    .dimensions
                    .first()
                    .and_then(|d| d.name.clone())
                    .unwrap_or_default(),
                visits: metric_at(&row.metrics, 0) as i64,
                users: metric_at(&row.metrics, 1) as i64,
                bounce_rate: metric_at(&row.metrics, 2),
                avg_duration_sec: metric_at(&row.metrics, 3) as i64,
            })
            .collect();

        Ok(rows)
    }

    /// Fetches per-goal visit and conversion counts.
    ///
    /// The metric vector is flat and positional: index `2i` is visits for
    /// goal `i`, index `2i+1` is its conversions. An empty goal list returns
    /// an empty result without a network call.
    pub async fn get_conversions(
        &self,
        counter_id: i64,
        goal_ids: &[i64],
        date_from: &str,
        date_to: &str,
    ) -> Result<Vec<GoalConversions>> {
        if goal_ids.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .stat_request(&[
                ("ids", counter_id.to_string()),
                ("date1", date_from.to_string()),
                ("date2", date_to.to_string()),
                ("metrics", conversion_metrics(goal_ids)),
            ])
            .await?;

        let row = match response.data.first() {
            Some(row) => row,
            None => return Ok(Vec::new()),
        };

        parse_conversion_vector(goal_ids, &row.metrics)
    }
}

fn metric_at(metrics: &[f64], index: usize) -> f64 {
    metrics.get(index).copied().unwrap_or(0.0)
}

/// Builds the per-goal metric name list. The vendor documents the lowercase
/// forms `goal<id>visits` / `goal<id>reaches`.
fn conversion_metrics(goal_ids: &[i64]) -> String {
    goal_ids
        .iter()
        .map(|id| format!("ym:s:goal{id}visits,ym:s:goal{id}reaches"))
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_conversion_vector(goal_ids: &[i64], metrics: &[f64]) -> Result<Vec<GoalConversions>> {
    if metrics.len() != goal_ids.len() * 2 {
        return Err(Error::vendor_permanent(
            None,
            format!(
                "conversion metric vector has {} entries, expected {} for {} goals",
                metrics.len(),
                goal_ids.len() * 2,
                goal_ids.len()
            ),
        ));
    }

    Ok(goal_ids
        .iter()
        .enumerate()
        .map(|(i, &goal_id)| GoalConversions {
            goal_id,
            visits: metrics[2 * i] as i64,
            conversions: metrics[2 * i + 1] as i64,
        })
        .collect())
}
