//! Wall-clock cron scheduler.
//!
//! Fires in a configured IANA zone and only enqueues: one `sync:current`
//! per active project nightly, and per-source finalization jobs for the
//! previous calendar month on the 1st. Past months beyond M-1 are never
//! targeted, which is what seals them.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tracing::{error, info, warn};

use bi_core::MonthRef;
use queue::QueueClient;
use storage::ProjectStore;

/// Daily sync at 02:00 local.
const DAILY_SYNC_CRON: &str = "0 0 2 * * *";
/// Monthly finalization at 07:00 local on the 1st.
const MONTHLY_FINALIZATION_CRON: &str = "0 0 7 1 * *";

/// Enqueue-only cron scheduler.
pub struct CronScheduler {
    tz: Tz,
    daily: Schedule,
    monthly: Schedule,
    queue: QueueClient,
    projects: Arc<dyn ProjectStore>,
}

impl CronScheduler {
    /// Creates a scheduler in the given zone. An unparseable zone falls
    /// back to UTC with a warning; the scheduler never refuses to start.
    pub fn new(zone: &str, queue: QueueClient, projects: Arc<dyn ProjectStore>) -> Self {
        let (tz, known) = bi_core::resolve_timezone(zone);
        if !known {
            warn!(zone, "Unknown scheduler timezone, falling back to UTC");
        }

        Self {
            tz,
            // cron uses 6-field format: sec min hour day month day-of-week
            daily: Schedule::from_str(DAILY_SYNC_CRON).expect("valid cron expression"),
            monthly: Schedule::from_str(MONTHLY_FINALIZATION_CRON).expect("valid cron expression"),
            queue,
            projects,
        }
    }

    /// Starts the daily-sync and monthly-finalization loops.
    pub fn start(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_daily_sync().await;
        }));

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_monthly_finalization().await;
        }));

        info!(timezone = %self.tz.name(), "Cron scheduler started");
        handles
    }

    async fn run_daily_sync(&self) {
        loop {
            if !self.sleep_until_next(&self.daily).await {
                break;
            }
            self.fire_daily_sync().await;
        }
    }

    async fn run_monthly_finalization(&self) {
        loop {
            if !self.sleep_until_next(&self.monthly).await {
                break;
            }
            self.fire_finalization().await;
        }
    }

    /// Sleeps until the next fire of `schedule` in the scheduler zone.
    /// Returns false when the schedule yields no further instants.
    async fn sleep_until_next(&self, schedule: &Schedule) -> bool {
        let now = Utc::now().with_timezone(&self.tz);
        let next = match schedule.after(&now).next() {
            Some(next) => next,
            None => return false,
        };

        let wait = (next - now).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;
        true
    }

    /// Enqueues one current-month sync per active project.
    pub async fn fire_daily_sync(&self) {
        let projects = match self.projects.list_active().await {
            Ok(projects) => projects,
            Err(e) => {
                error!("Daily sync: failed to list active projects: {}", e);
                return;
            }
        };

        let mut enqueued = 0;
        for project in &projects {
            match self.queue.enqueue_sync_current(project.id).await {
                Ok(_) => enqueued += 1,
                Err(e) => error!(project_id = project.id, "Failed to enqueue sync: {}", e),
            }
        }

        info!(projects = projects.len(), enqueued, "Daily sync fan-out complete");
    }

    /// Enqueues per-source finalization jobs targeting the previous
    /// calendar month for every active project.
    pub async fn fire_finalization(&self) {
        let target = finalization_target(Utc::now().with_timezone(&self.tz));

        let projects = match self.projects.list_active().await {
            Ok(projects) => projects,
            Err(e) => {
                error!("Finalization: failed to list active projects: {}", e);
                return;
            }
        };

        let mut enqueued = 0;
        for project in &projects {
            let analytics = self
                .queue
                .enqueue_sync_analytics(project.id, target.year, target.month)
                .await;
            let ads = self
                .queue
                .enqueue_sync_ads(project.id, target.year, target.month)
                .await;

            match (analytics, ads) {
                (Ok(_), Ok(_)) => enqueued += 1,
                (a, b) => {
                    if let Err(e) = a {
                        error!(project_id = project.id, "Failed to enqueue analytics finalization: {}", e);
                    }
                    if let Err(e) = b {
                        error!(project_id = project.id, "Failed to enqueue ads finalization: {}", e);
                    }
                }
            }
        }

        info!(
            year = target.year,
            month = target.month,
            projects = projects.len(),
            enqueued,
            "Monthly finalization fan-out complete"
        );
    }
}

/// The month a finalization fire targets: the calendar month immediately
/// preceding the local fire instant.
pub fn finalization_target(now_local: DateTime<Tz>) -> MonthRef {
    MonthRef {
        year: now_local.year(),
        month: now_local.month(),
    }
    .prev()
}
