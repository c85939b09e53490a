//! Counter repository.

use async_trait::async_trait;
use sqlx::MySqlPool;

use bi_core::{Counter, Error, Result};

use crate::client::Storage;
use crate::repos::map_insert_error;
use crate::stores::{CounterStore, NewCounter};

pub struct CounterRepo {
    pool: MySqlPool,
}

impl CounterRepo {
    pub fn new(storage: &Storage) -> Self {
        Self {
            pool: storage.pool().clone(),
        }
    }

    async fn fetch(&self, id: i64) -> Result<Option<Counter>> {
        let counter = sqlx::query_as::<_, Counter>("SELECT * FROM counters WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(counter)
    }
}

#[async_trait]
impl CounterStore for CounterRepo {
    async fn create(&self, input: NewCounter) -> Result<Counter> {
        let mut tx = self.pool.begin().await?;

        // At most one primary per project: flagging a new primary demotes
        // the current one in the same transaction.
        if input.is_primary {
            sqlx::query("UPDATE counters SET is_primary = FALSE WHERE project_id = ?")
                .bind(input.project_id)
                .execute(&mut *tx)
                .await?;
        }

        let result = sqlx::query(
            "INSERT INTO counters (project_id, counter_id, name, is_primary) VALUES (?, ?, ?, ?)",
        )
        .bind(input.project_id)
        .bind(input.counter_id)
        .bind(&input.name)
        .bind(input.is_primary)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_insert_error(e, "counter for this project"))?;

        let id = result.last_insert_id() as i64;
        tx.commit().await?;

        self.fetch(id)
            .await?
            .ok_or_else(|| Error::internal("counter vanished after insert"))
    }

    async fn get(&self, id: i64) -> Result<Option<Counter>> {
        self.fetch(id).await
    }

    async fn list_by_project(&self, project_id: i64) -> Result<Vec<Counter>> {
        let counters =
            sqlx::query_as::<_, Counter>("SELECT * FROM counters WHERE project_id = ? ORDER BY id")
                .bind(project_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(counters)
    }

    async fn set_primary(&self, project_id: i64, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE counters SET is_primary = FALSE WHERE project_id = ?")
            .bind(project_id)
            .execute(&mut *tx)
            .await?;

        let result =
            sqlx::query("UPDATE counters SET is_primary = TRUE WHERE id = ? AND project_id = ?")
                .bind(id)
                .bind(project_id)
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!(
                "counter {id} in project {project_id}"
            )));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM counters WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("counter {id}")));
        }
        Ok(())
    }
}
