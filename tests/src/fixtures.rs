//! Fixture builders shared across the scenario suites.

use yandex::{CampaignReportRow, GoalConversions, TrafficSummary};

/// S1 summary: one counter, `{visits:1000, users:800, bounce:45.5, avg:120}`.
pub fn s1_summary() -> TrafficSummary {
    TrafficSummary {
        visits: 1000,
        users: 800,
        bounce_rate: 45.5,
        avg_duration_sec: 120,
    }
}

/// S1 conversions for goal 777: `{visits:50, conversions:10}`.
pub fn s1_conversions() -> Vec<GoalConversions> {
    vec![GoalConversions {
        goal_id: 777,
        visits: 50,
        conversions: 10,
    }]
}

/// A campaign report row with deliberately bogus vendor ratios; the engine
/// must recompute them from the raw counters.
pub fn report_row(campaign_id: i64, impressions: i64, clicks: i64, cost: f64) -> CampaignReportRow {
    CampaignReportRow {
        campaign_id,
        campaign_name: format!("campaign-{campaign_id}"),
        impressions,
        clicks,
        cost,
        ctr: 99.9,
        avg_cpc: 12345.0,
        conversions: None,
        cpa: None,
    }
}
