//! Report and marketing read path.
//!
//! Reads three consecutive months of facts in the project's timezone and
//! computes period-over-period deltas. Missing rows are zero-valued, never
//! errors; the read path never triggers ingestion.

pub mod marketing;
pub mod report;

pub use marketing::{
    CampaignWithMetrics, ChangeDirection, MarketingDoc, MarketingSection, MarketingService,
    MetricCell, MetricRow, SummaryItem,
};
pub use report::{
    AdsTotalsPeriodRow, AiInsights, ChannelMetricsDoc, ChannelPoint, ChannelSeries, DeltaItem,
    MetricsPeriodRow, ReportDoc, ReportService, SeoRow,
};

use bi_core::{MonthRef, Project};

/// The three report slots {M, M-1, M-2} for a project, resolved in its
/// timezone at the given instant.
pub fn report_months(project: &Project, now: chrono::DateTime<chrono::Utc>) -> [MonthRef; 3] {
    let (tz, _) = bi_core::resolve_timezone(&project.timezone);
    let current = MonthRef::containing(now, tz);
    [current, current.minus(1), current.minus(2)]
}
