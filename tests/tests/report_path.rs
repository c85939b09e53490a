//! Read-path behavior over seeded facts: zero-filled months, delta rules,
//! real period labels.

use std::sync::Arc;

use chrono::Utc;

use bi_core::MonthRef;
use integration_tests::stores::MemoryStores;
use report::{report_months, MarketingService, ReportService};
use storage::{MetricsMonthlyUpsert, SeoQueryUpsert, SeoStore, TotalsMonthlyUpsert};

fn seed_project_with_months(stores: &MemoryStores, project_id: i64) -> [MonthRef; 3] {
    let project = stores.seed_project(project_id, "Europe/Moscow", true);
    report_months(&project, Utc::now())
}

fn metrics_row(project_id: i64, month: MonthRef, visits: i64) -> MetricsMonthlyUpsert {
    MetricsMonthlyUpsert {
        project_id,
        year: month.year,
        month: month.month as i32,
        visits,
        users: visits / 2,
        bounce_rate: 45.0,
        avg_session_duration_sec: 100,
        conversions: Some(visits / 100),
    }
}

fn totals_row(
    project_id: i64,
    month: MonthRef,
    clicks: i64,
    cost: f64,
    conversions: Option<i64>,
) -> TotalsMonthlyUpsert {
    let cpa = conversions.filter(|c| *c > 0).map(|c| cost / c as f64);
    TotalsMonthlyUpsert {
        project_id,
        year: month.year,
        month: month.month as i32,
        impressions: clicks * 100,
        clicks,
        ctr_pct: 1.0,
        cpc: if clicks > 0 { cost / clicks as f64 } else { 0.0 },
        conversions,
        cpa,
        cost,
    }
}

#[tokio::test]
async fn report_labels_are_real_periods() {
    let stores = MemoryStores::new();
    let months = seed_project_with_months(&stores, 1);

    stores.seed_metrics_month(metrics_row(1, months[0], 1500));
    stores.seed_metrics_month(metrics_row(1, months[1], 1000));

    let service = ReportService::new(
        Arc::new(stores.clone()),
        Arc::new(stores.clone()),
        Arc::new(stores.clone()),
        Arc::new(stores.clone()),
    );

    let report = service.get_report(1).await.unwrap();

    let expected: Vec<String> = months.iter().map(|m| m.label()).collect();
    assert_eq!(report.periods, expected);
    assert_eq!(report.metrics[0].period, months[0].label());
    assert_eq!(report.metrics[2].period, months[2].label());
}

#[tokio::test]
async fn missing_months_are_zero_valued() {
    let stores = MemoryStores::new();
    let months = seed_project_with_months(&stores, 1);

    // only the current month has data
    stores.seed_metrics_month(metrics_row(1, months[0], 1500));

    let service = ReportService::new(
        Arc::new(stores.clone()),
        Arc::new(stores.clone()),
        Arc::new(stores.clone()),
        Arc::new(stores.clone()),
    );

    let report = service.get_report(1).await.unwrap();

    assert_eq!(report.metrics[0].visits, 1500);
    assert_eq!(report.metrics[1].visits, 0);
    assert_eq!(report.metrics[2].visits, 0);
    assert_eq!(report.ads_totals[0].clicks, 0);

    // M over an empty M-1: divide-by-zero sentinel says 100
    let visits_delta = report.deltas.iter().find(|d| d.measure == "visits").unwrap();
    assert_eq!(visits_delta.change_pct, 100.0);
}

#[tokio::test]
async fn deltas_follow_divide_by_zero_rules() {
    let stores = MemoryStores::new();
    stores.seed_project(1, "Europe/Moscow", true);

    let service = ReportService::new(
        Arc::new(stores.clone()),
        Arc::new(stores.clone()),
        Arc::new(stores.clone()),
        Arc::new(stores.clone()),
    );

    // nothing seeded at all: every measure is 0 → 0, so every delta is 0
    let report = service.get_report(1).await.unwrap();
    for delta in &report.deltas {
        assert_eq!(delta.change_pct, 0.0, "measure {}", delta.measure);
    }
}

#[tokio::test]
async fn cost_measures_are_marked_unfavorable() {
    let stores = MemoryStores::new();
    let months = seed_project_with_months(&stores, 1);

    stores.seed_totals_month(totals_row(1, months[0], 200, 2400.0, Some(20)));
    stores.seed_totals_month(totals_row(1, months[1], 100, 1000.0, Some(10)));

    let service = ReportService::new(
        Arc::new(stores.clone()),
        Arc::new(stores.clone()),
        Arc::new(stores.clone()),
        Arc::new(stores.clone()),
    );

    let report = service.get_report(1).await.unwrap();

    let cpa = report.deltas.iter().find(|d| d.measure == "cpa").unwrap();
    assert!(cpa.increase_is_unfavorable);
    // CPA went 100 → 120, a 20% increase
    assert!((cpa.change_pct - 20.0).abs() < 0.01);

    let clicks = report.deltas.iter().find(|d| d.measure == "clicks").unwrap();
    assert!(!clicks.increase_is_unfavorable);
}

#[tokio::test]
async fn marketing_sections_use_period_labels() {
    let stores = MemoryStores::new();
    let months = seed_project_with_months(&stores, 1);

    stores.seed_totals_month(totals_row(1, months[0], 200, 2000.0, Some(20)));
    stores.seed_totals_month(totals_row(1, months[1], 100, 1000.0, Some(10)));

    let service = MarketingService::new(Arc::new(stores.clone()), Arc::new(stores.clone()));
    let doc = service.get_marketing(1).await.unwrap();

    let expected: Vec<String> = months.iter().map(|m| m.label()).collect();
    assert_eq!(doc.periods, expected);

    let clicks_row = &doc.clicks.metrics[0];
    let cell_periods: Vec<&str> = clicks_row.cells.iter().map(|c| c.period.as_str()).collect();
    assert_eq!(cell_periods, expected.iter().map(String::as_str).collect::<Vec<_>>());

    // clicks doubled month over month
    assert!((doc.clicks.summary[0].change_pct - 100.0).abs() < 0.01);

    let cpa = doc.conversions.summary.iter().find(|s| s.label == "cpa").unwrap();
    assert!(!cpa.favorable_increase);
}

#[tokio::test]
async fn channel_metrics_cover_requested_periods() {
    let stores = MemoryStores::new();
    let months = seed_project_with_months(&stores, 1);

    stores.seed_metrics_month(metrics_row(1, months[0], 1000));
    stores.seed_totals_month(totals_row(1, months[0], 100, 500.0, Some(5)));

    let service = ReportService::new(
        Arc::new(stores.clone()),
        Arc::new(stores.clone()),
        Arc::new(stores.clone()),
        Arc::new(stores.clone()),
    );

    let periods = vec![months[0].label(), months[1].label()];
    let doc = service.get_channel_metrics(1, &periods).await.unwrap();

    assert_eq!(doc.periods, periods);
    assert_eq!(doc.channels.len(), 2);

    let organic = doc.channels.iter().find(|c| c.channel == "organic").unwrap();
    assert_eq!(organic.points[0].visits, 1000);
    assert_eq!(organic.points[1].visits, 0);

    let paid = doc.channels.iter().find(|c| c.channel == "paid").unwrap();
    assert_eq!(paid.points[0].clicks, 100);

    // malformed period labels are rejected
    assert!(service
        .get_channel_metrics(1, &["2025-13".to_string()])
        .await
        .is_err());
}

#[tokio::test]
async fn report_includes_current_month_seo_queries() {
    let stores = MemoryStores::new();
    let months = seed_project_with_months(&stores, 1);

    let row = SeoQueryUpsert {
        project_id: 1,
        year: months[0].year,
        month: months[0].month as i32,
        query: "buy widgets".into(),
        position: 3,
        url: Some("https://example.com/widgets".into()),
    };
    SeoStore::upsert_query(&stores, row.clone()).await.unwrap();

    // replaying the upsert with fresher measures keeps one row per query
    SeoStore::upsert_query(&stores, SeoQueryUpsert { position: 2, ..row })
        .await
        .unwrap();

    let service = ReportService::new(
        Arc::new(stores.clone()),
        Arc::new(stores.clone()),
        Arc::new(stores.clone()),
        Arc::new(stores.clone()),
    );

    let report = service.get_report(1).await.unwrap();
    assert_eq!(report.seo.len(), 1);
    assert_eq!(report.seo[0].query, "buy widgets");
    assert_eq!(report.seo[0].position, 2);
}

#[tokio::test]
async fn unknown_project_is_not_found() {
    let stores = MemoryStores::new();

    let service = ReportService::new(
        Arc::new(stores.clone()),
        Arc::new(stores.clone()),
        Arc::new(stores.clone()),
        Arc::new(stores.clone()),
    );

    let err = service.get_report(99).await.unwrap_err();
    assert_eq!(err.http_status(), 404);
}
