//! Goal repository.

use async_trait::async_trait;
use sqlx::MySqlPool;

use bi_core::{Error, Goal, Result};

use crate::client::Storage;
use crate::repos::map_insert_error;
use crate::stores::{GoalStore, NewGoal};

pub struct GoalRepo {
    pool: MySqlPool,
}

impl GoalRepo {
    pub fn new(storage: &Storage) -> Self {
        Self {
            pool: storage.pool().clone(),
        }
    }

    async fn fetch(&self, id: i64) -> Result<Option<Goal>> {
        let goal = sqlx::query_as::<_, Goal>("SELECT * FROM goals WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(goal)
    }
}

#[async_trait]
impl GoalStore for GoalRepo {
    async fn create(&self, input: NewGoal) -> Result<Goal> {
        let result = sqlx::query(
            "INSERT INTO goals (counter_id, goal_id, name, is_conversion) VALUES (?, ?, ?, ?)",
        )
        .bind(input.counter_id)
        .bind(input.goal_id)
        .bind(&input.name)
        .bind(input.is_conversion)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "goal for this counter"))?;

        let id = result.last_insert_id() as i64;
        self.fetch(id)
            .await?
            .ok_or_else(|| Error::internal("goal vanished after insert"))
    }

    async fn get(&self, id: i64) -> Result<Option<Goal>> {
        self.fetch(id).await
    }

    async fn get_by_vendor_id(&self, counter_id: i64, goal_id: i64) -> Result<Option<Goal>> {
        let goal =
            sqlx::query_as::<_, Goal>("SELECT * FROM goals WHERE counter_id = ? AND goal_id = ?")
                .bind(counter_id)
                .bind(goal_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(goal)
    }

    async fn list_by_counter(&self, counter_id: i64) -> Result<Vec<Goal>> {
        let goals =
            sqlx::query_as::<_, Goal>("SELECT * FROM goals WHERE counter_id = ? ORDER BY id")
                .bind(counter_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(goals)
    }

    async fn conversion_goals_for_counter(&self, counter_id: i64) -> Result<Vec<Goal>> {
        let goals = sqlx::query_as::<_, Goal>(
            "SELECT * FROM goals WHERE counter_id = ? AND is_conversion = TRUE ORDER BY id",
        )
        .bind(counter_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(goals)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM goals WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("goal {id}")));
        }
        Ok(())
    }
}
