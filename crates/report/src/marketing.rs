//! Marketing document: clicks and conversions sections over three months.
//!
//! Month slots are labeled by their actual `YYYY-MM` period.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use bi_core::{delta, DirectTotalsMonthly, Error, Result};
use storage::{DirectStore, ProjectStore};

use crate::report_months;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeDirection {
    Up,
    Down,
    Flat,
}

impl ChangeDirection {
    fn of(change_pct: f64) -> Self {
        if change_pct > 0.0 {
            Self::Up
        } else if change_pct < 0.0 {
            Self::Down
        } else {
            Self::Flat
        }
    }
}

/// A headline change for the section summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryItem {
    pub label: String,
    pub change_pct: f64,
    pub direction: ChangeDirection,
    /// Whether an increase of this measure is good news. False for
    /// cost-like measures (CPA).
    pub favorable_increase: bool,
}

/// One cell of a metric row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricCell {
    pub period: String,
    pub value: serde_json::Value,
}

/// A metric with its three monthly values and M vs M-1 efficiency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRow {
    pub id: u32,
    pub indicator: String,
    pub cells: Vec<MetricCell>,
    pub efficiency_pct: f64,
    pub increase_is_unfavorable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketingSection {
    pub summary: Vec<SummaryItem>,
    pub metrics: Vec<MetricRow>,
}

/// The marketing document for a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketingDoc {
    pub project_id: i64,
    pub periods: Vec<String>,
    pub clicks: MarketingSection,
    pub conversions: MarketingSection,
}

/// One campaign with its metrics over the report periods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignWithMetrics {
    pub campaign_id: i64,
    pub name: String,
    pub status: String,
    pub rows: Vec<CampaignMetricsRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignMetricsRow {
    pub period: String,
    pub impressions: i64,
    pub clicks: i64,
    pub ctr_pct: f64,
    pub cpc: f64,
    pub conversions: Option<i64>,
    pub cpa: Option<f64>,
    pub cost: f64,
}

/// A month slot with its label and (possibly missing) totals row.
struct MonthSlot {
    label: String,
    totals: Option<DirectTotalsMonthly>,
}

/// Marketing read path over ads facts.
pub struct MarketingService {
    projects: Arc<dyn ProjectStore>,
    direct: Arc<dyn DirectStore>,
}

impl MarketingService {
    pub fn new(projects: Arc<dyn ProjectStore>, direct: Arc<dyn DirectStore>) -> Self {
        Self { projects, direct }
    }

    /// Builds the marketing document for the last three months.
    pub async fn get_marketing(&self, project_id: i64) -> Result<MarketingDoc> {
        let project = self
            .projects
            .get(project_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("project {project_id}")))?;

        let months = report_months(&project, Utc::now());
        let mut slots = Vec::with_capacity(3);
        for month in &months {
            let totals = self
                .direct
                .get_totals_month(project_id, month.year, month.month as i32)
                .await?;
            slots.push(MonthSlot {
                label: month.label(),
                totals,
            });
        }

        Ok(MarketingDoc {
            project_id,
            periods: months.iter().map(|m| m.label()).collect(),
            clicks: build_clicks_section(&slots),
            conversions: build_conversions_section(&slots),
        })
    }

    /// Lists the project's campaigns with metrics over the report periods.
    pub async fn get_campaigns_with_metrics(
        &self,
        project_id: i64,
    ) -> Result<Vec<CampaignWithMetrics>> {
        let project = self
            .projects
            .get(project_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("project {project_id}")))?;

        let months = report_months(&project, Utc::now());
        let campaigns = self.direct.list_campaigns_by_project(project_id).await?;

        let mut result = Vec::with_capacity(campaigns.len());
        for campaign in campaigns {
            let mut rows = Vec::new();
            for month in &months {
                let metrics = self
                    .direct
                    .get_campaign_month(project_id, campaign.id, month.year, month.month as i32)
                    .await?;
                if let Some(m) = metrics {
                    rows.push(CampaignMetricsRow {
                        period: month.label(),
                        impressions: m.impressions,
                        clicks: m.clicks,
                        ctr_pct: m.ctr_pct,
                        cpc: m.cpc,
                        conversions: m.conversions,
                        cpa: m.cpa,
                        cost: m.cost,
                    });
                }
            }

            result.push(CampaignWithMetrics {
                campaign_id: campaign.campaign_id,
                name: campaign.name,
                status: campaign.status,
                rows,
            });
        }

        Ok(result)
    }
}

fn clicks_of(slot: &MonthSlot) -> i64 {
    slot.totals.as_ref().map(|t| t.clicks).unwrap_or(0)
}

fn ctr_of(slot: &MonthSlot) -> f64 {
    slot.totals.as_ref().map(|t| t.ctr_pct).unwrap_or(0.0)
}

fn conversions_of(slot: &MonthSlot) -> i64 {
    slot.totals.as_ref().and_then(|t| t.conversions).unwrap_or(0)
}

fn cpa_of(slot: &MonthSlot) -> f64 {
    slot.totals.as_ref().and_then(|t| t.cpa).unwrap_or(0.0)
}

fn build_clicks_section(slots: &[MonthSlot]) -> MarketingSection {
    let clicks_change = delta(clicks_of(&slots[0]) as f64, clicks_of(&slots[1]) as f64);
    let ctr_change = delta(ctr_of(&slots[0]), ctr_of(&slots[1]));

    let summary = vec![
        SummaryItem {
            label: "clicks".into(),
            change_pct: clicks_change,
            direction: ChangeDirection::of(clicks_change),
            favorable_increase: true,
        },
        SummaryItem {
            label: "ctr".into(),
            change_pct: ctr_change,
            direction: ChangeDirection::of(ctr_change),
            favorable_increase: true,
        },
    ];

    let metrics = vec![
        MetricRow {
            id: 1,
            indicator: "clicks".into(),
            cells: slots
                .iter()
                .map(|s| MetricCell {
                    period: s.label.clone(),
                    value: json!(clicks_of(s)),
                })
                .collect(),
            efficiency_pct: clicks_change,
            increase_is_unfavorable: false,
        },
        MetricRow {
            id: 2,
            indicator: "ctr_pct".into(),
            cells: slots
                .iter()
                .map(|s| MetricCell {
                    period: s.label.clone(),
                    value: json!(format!("{:.2}%", ctr_of(s))),
                })
                .collect(),
            efficiency_pct: ctr_change,
            increase_is_unfavorable: false,
        },
    ];

    MarketingSection { summary, metrics }
}

fn build_conversions_section(slots: &[MonthSlot]) -> MarketingSection {
    let conversions_change = delta(
        conversions_of(&slots[0]) as f64,
        conversions_of(&slots[1]) as f64,
    );
    let cpa_change = delta(cpa_of(&slots[0]), cpa_of(&slots[1]));

    let summary = vec![
        SummaryItem {
            label: "conversions".into(),
            change_pct: conversions_change,
            direction: ChangeDirection::of(conversions_change),
            favorable_increase: true,
        },
        SummaryItem {
            label: "cpa".into(),
            change_pct: cpa_change,
            direction: ChangeDirection::of(cpa_change),
            // CPA going up means paying more per conversion
            favorable_increase: false,
        },
    ];

    let metrics = vec![
        MetricRow {
            id: 1,
            indicator: "conversions".into(),
            cells: slots
                .iter()
                .map(|s| MetricCell {
                    period: s.label.clone(),
                    value: json!(conversions_of(s)),
                })
                .collect(),
            efficiency_pct: conversions_change,
            increase_is_unfavorable: false,
        },
        MetricRow {
            id: 2,
            indicator: "cpa".into(),
            cells: slots
                .iter()
                .map(|s| MetricCell {
                    period: s.label.clone(),
                    value: json!(cpa_of(s)),
                })
                .collect(),
            efficiency_pct: cpa_change,
            increase_is_unfavorable: true,
        },
    ];

    MarketingSection { summary, metrics }
}
