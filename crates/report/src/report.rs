//! Project report document: metrics, ads totals, SEO, and deltas.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use bi_core::{delta, Error, MonthRef, Project, Result};
use storage::{DirectStore, MetricsStore, ProjectStore, SeoStore};

use crate::report_months;

/// One metrics row per report period; absent months are zero-valued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsPeriodRow {
    pub period: String,
    pub visits: i64,
    pub users: i64,
    pub bounce_rate: f64,
    pub avg_session_duration_sec: i64,
    pub conversions: Option<i64>,
}

/// One ads-totals row per report period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdsTotalsPeriodRow {
    pub period: String,
    pub impressions: i64,
    pub clicks: i64,
    pub ctr_pct: f64,
    pub cpc: f64,
    pub conversions: Option<i64>,
    pub cpa: Option<f64>,
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeoRow {
    pub query: String,
    pub position: i32,
    pub url: Option<String>,
}

/// A period-over-period change for one measure.
///
/// The raw delta is direction-agnostic; `increase_is_unfavorable` annotates
/// how the sign should be read (true for cost-like measures such as CPA).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaItem {
    pub measure: String,
    pub change_pct: f64,
    pub increase_is_unfavorable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiInsights {
    pub summary: String,
}

/// The full report document for a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDoc {
    pub project_id: i64,
    /// Period labels, current month first.
    pub periods: Vec<String>,
    pub metrics: Vec<MetricsPeriodRow>,
    pub ads_totals: Vec<AdsTotalsPeriodRow>,
    /// SEO query positions for the current period.
    pub seo: Vec<SeoRow>,
    /// M vs M-1 changes.
    pub deltas: Vec<DeltaItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_insights: Option<AiInsights>,
}

/// Channel metrics series handed to the AI analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMetricsDoc {
    pub project_id: i64,
    pub periods: Vec<String>,
    pub channels: Vec<ChannelSeries>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSeries {
    pub channel: String,
    pub points: Vec<ChannelPoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelPoint {
    pub period: String,
    pub visits: i64,
    pub conversions: i64,
    pub clicks: i64,
    pub cost: f64,
}

/// Read path over monthly facts.
pub struct ReportService {
    projects: Arc<dyn ProjectStore>,
    metrics: Arc<dyn MetricsStore>,
    direct: Arc<dyn DirectStore>,
    seo: Arc<dyn SeoStore>,
}

impl ReportService {
    pub fn new(
        projects: Arc<dyn ProjectStore>,
        metrics: Arc<dyn MetricsStore>,
        direct: Arc<dyn DirectStore>,
        seo: Arc<dyn SeoStore>,
    ) -> Self {
        Self {
            projects,
            metrics,
            direct,
            seo,
        }
    }

    async fn load_project(&self, project_id: i64) -> Result<Project> {
        self.projects
            .get(project_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("project {project_id}")))
    }

    /// Builds the report document for the last three months.
    pub async fn get_report(&self, project_id: i64) -> Result<ReportDoc> {
        let project = self.load_project(project_id).await?;
        let months = report_months(&project, Utc::now());

        let mut metrics_rows = Vec::with_capacity(3);
        let mut ads_rows = Vec::with_capacity(3);

        for month in &months {
            let metrics = self
                .metrics
                .get_month(project_id, month.year, month.month as i32)
                .await?;
            metrics_rows.push(match metrics {
                Some(m) => MetricsPeriodRow {
                    period: month.label(),
                    visits: m.visits,
                    users: m.users,
                    bounce_rate: m.bounce_rate,
                    avg_session_duration_sec: m.avg_session_duration_sec,
                    conversions: m.conversions,
                },
                None => MetricsPeriodRow {
                    period: month.label(),
                    visits: 0,
                    users: 0,
                    bounce_rate: 0.0,
                    avg_session_duration_sec: 0,
                    conversions: None,
                },
            });

            let totals = self
                .direct
                .get_totals_month(project_id, month.year, month.month as i32)
                .await?;
            ads_rows.push(match totals {
                Some(t) => AdsTotalsPeriodRow {
                    period: month.label(),
                    impressions: t.impressions,
                    clicks: t.clicks,
                    ctr_pct: t.ctr_pct,
                    cpc: t.cpc,
                    conversions: t.conversions,
                    cpa: t.cpa,
                    cost: t.cost,
                },
                None => AdsTotalsPeriodRow {
                    period: month.label(),
                    impressions: 0,
                    clicks: 0,
                    ctr_pct: 0.0,
                    cpc: 0.0,
                    conversions: None,
                    cpa: None,
                    cost: 0.0,
                },
            });
        }

        let seo = self
            .seo
            .list_queries(project_id, months[0].year, months[0].month as i32)
            .await?
            .into_iter()
            .map(|q| SeoRow {
                query: q.query,
                position: q.position,
                url: q.url,
            })
            .collect();

        let deltas = compute_deltas(&metrics_rows, &ads_rows);

        debug!(project_id, periods = ?months.iter().map(|m| m.label()).collect::<Vec<_>>(), "Built report");

        Ok(ReportDoc {
            project_id,
            periods: months.iter().map(|m| m.label()).collect(),
            metrics: metrics_rows,
            ads_totals: ads_rows,
            seo,
            deltas,
            ai_insights: None,
        })
    }

    /// Metrics rows alone, for the metrics endpoint.
    pub async fn get_metrics_rows(&self, project_id: i64) -> Result<Vec<MetricsPeriodRow>> {
        let report = self.get_report(project_id).await?;
        Ok(report.metrics)
    }

    /// The per-channel series for the requested periods, for the AI
    /// analyzer. Unknown period labels are rejected.
    pub async fn get_channel_metrics(
        &self,
        project_id: i64,
        periods: &[String],
    ) -> Result<ChannelMetricsDoc> {
        self.load_project(project_id).await?;

        let mut organic = Vec::with_capacity(periods.len());
        let mut paid = Vec::with_capacity(periods.len());

        for label in periods {
            let month = MonthRef::parse_label(label)?;

            let metrics = self
                .metrics
                .get_month(project_id, month.year, month.month as i32)
                .await?;
            organic.push(ChannelPoint {
                period: label.clone(),
                visits: metrics.as_ref().map(|m| m.visits).unwrap_or(0),
                conversions: metrics.as_ref().and_then(|m| m.conversions).unwrap_or(0),
                clicks: 0,
                cost: 0.0,
            });

            let totals = self
                .direct
                .get_totals_month(project_id, month.year, month.month as i32)
                .await?;
            paid.push(ChannelPoint {
                period: label.clone(),
                visits: 0,
                conversions: totals.as_ref().and_then(|t| t.conversions).unwrap_or(0),
                clicks: totals.as_ref().map(|t| t.clicks).unwrap_or(0),
                cost: totals.as_ref().map(|t| t.cost).unwrap_or(0.0),
            });
        }

        Ok(ChannelMetricsDoc {
            project_id,
            periods: periods.to_vec(),
            channels: vec![
                ChannelSeries { channel: "organic".into(), points: organic },
                ChannelSeries { channel: "paid".into(), points: paid },
            ],
        })
    }
}

/// M vs M-1 deltas over the comparable measures.
fn compute_deltas(metrics: &[MetricsPeriodRow], ads: &[AdsTotalsPeriodRow]) -> Vec<DeltaItem> {
    let mut deltas = Vec::new();

    if let [current, previous, ..] = metrics {
        deltas.push(DeltaItem {
            measure: "visits".into(),
            change_pct: delta(current.visits as f64, previous.visits as f64),
            increase_is_unfavorable: false,
        });
        deltas.push(DeltaItem {
            measure: "users".into(),
            change_pct: delta(current.users as f64, previous.users as f64),
            increase_is_unfavorable: false,
        });
        deltas.push(DeltaItem {
            measure: "conversions".into(),
            change_pct: delta(
                current.conversions.unwrap_or(0) as f64,
                previous.conversions.unwrap_or(0) as f64,
            ),
            increase_is_unfavorable: false,
        });
    }

    if let [current, previous, ..] = ads {
        deltas.push(DeltaItem {
            measure: "clicks".into(),
            change_pct: delta(current.clicks as f64, previous.clicks as f64),
            increase_is_unfavorable: false,
        });
        deltas.push(DeltaItem {
            measure: "cost".into(),
            change_pct: delta(current.cost, previous.cost),
            increase_is_unfavorable: true,
        });
        deltas.push(DeltaItem {
            measure: "cpa".into(),
            change_pct: delta(current.cpa.unwrap_or(0.0), previous.cpa.unwrap_or(0.0)),
            increase_is_unfavorable: true,
        });
    }

    deltas
}
