//! SEO query fact repository.

use async_trait::async_trait;
use sqlx::MySqlPool;

use bi_core::{Result, SeoQueryMonthly};

use crate::client::Storage;
use crate::stores::{SeoQueryUpsert, SeoStore};

pub struct SeoRepo {
    pool: MySqlPool,
}

impl SeoRepo {
    pub fn new(storage: &Storage) -> Self {
        Self {
            pool: storage.pool().clone(),
        }
    }
}

#[async_trait]
impl SeoStore for SeoRepo {
    async fn upsert_query(&self, row: SeoQueryUpsert) -> Result<()> {
        sqlx::query(
            "INSERT INTO seo_queries_monthly \
                (project_id, year, month, query, position, url) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE \
                position = VALUES(position), \
                url = VALUES(url)",
        )
        .bind(row.project_id)
        .bind(row.year)
        .bind(row.month)
        .bind(&row.query)
        .bind(row.position)
        .bind(&row.url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_queries(
        &self,
        project_id: i64,
        year: i32,
        month: i32,
    ) -> Result<Vec<SeoQueryMonthly>> {
        let rows = sqlx::query_as::<_, SeoQueryMonthly>(
            "SELECT * FROM seo_queries_monthly \
             WHERE project_id = ? AND year = ? AND month = ? ORDER BY position",
        )
        .bind(project_id)
        .bind(year)
        .bind(month)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
