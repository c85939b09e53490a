//! Metrika fact repository.

use async_trait::async_trait;
use sqlx::MySqlPool;

use bi_core::{MetricsAgeMonthly, MetricsMonthly, Result};

use crate::client::Storage;
use crate::stores::{MetricsAgeMonthlyUpsert, MetricsMonthlyUpsert, MetricsStore};

pub struct MetricsRepo {
    pool: MySqlPool,
}

impl MetricsRepo {
    pub fn new(storage: &Storage) -> Self {
        Self {
            pool: storage.pool().clone(),
        }
    }
}

#[async_trait]
impl MetricsStore for MetricsRepo {
    async fn upsert_month(&self, row: MetricsMonthlyUpsert) -> Result<()> {
        sqlx::query(
            "INSERT INTO metrics_monthly \
                (project_id, year, month, \
                 visits, users, bounce_rate, avg_session_duration_sec, conversions) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE \
                visits = VALUES(visits), \
                users = VALUES(users), \
                bounce_rate = VALUES(bounce_rate), \
                avg_session_duration_sec = VALUES(avg_session_duration_sec), \
                conversions = VALUES(conversions)",
        )
        .bind(row.project_id)
        .bind(row.year)
        .bind(row.month)
        .bind(row.visits)
        .bind(row.users)
        .bind(row.bounce_rate)
        .bind(row.avg_session_duration_sec)
        .bind(row.conversions)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_month(
        &self,
        project_id: i64,
        year: i32,
        month: i32,
    ) -> Result<Option<MetricsMonthly>> {
        let row = sqlx::query_as::<_, MetricsMonthly>(
            "SELECT * FROM metrics_monthly WHERE project_id = ? AND year = ? AND month = ?",
        )
        .bind(project_id)
        .bind(year)
        .bind(month)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn upsert_age_month(&self, row: MetricsAgeMonthlyUpsert) -> Result<()> {
        sqlx::query(
            "INSERT INTO metrics_age_monthly \
                (project_id, year, month, age_bucket, \
                 visits, users, bounce_rate, avg_session_duration_sec) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE \
                visits = VALUES(visits), \
                users = VALUES(users), \
                bounce_rate = VALUES(bounce_rate), \
                avg_session_duration_sec = VALUES(avg_session_duration_sec)",
        )
        .bind(row.project_id)
        .bind(row.year)
        .bind(row.month)
        .bind(&row.age_bucket)
        .bind(row.visits)
        .bind(row.users)
        .bind(row.bounce_rate)
        .bind(row.avg_session_duration_sec)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_age_months(
        &self,
        project_id: i64,
        year: i32,
        month: i32,
    ) -> Result<Vec<MetricsAgeMonthly>> {
        let rows = sqlx::query_as::<_, MetricsAgeMonthly>(
            "SELECT * FROM metrics_age_monthly \
             WHERE project_id = ? AND year = ? AND month = ? ORDER BY age_bucket",
        )
        .bind(project_id)
        .bind(year)
        .bind(month)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
