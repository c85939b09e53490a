//! Project repository.

use async_trait::async_trait;
use sqlx::MySqlPool;

use bi_core::{Error, Project, Result};

use crate::client::Storage;
use crate::repos::map_insert_error;
use crate::stores::{NewProject, ProjectStore, ProjectUpdate};

pub struct ProjectRepo {
    pool: MySqlPool,
}

impl ProjectRepo {
    pub fn new(storage: &Storage) -> Self {
        Self {
            pool: storage.pool().clone(),
        }
    }

    async fn fetch(&self, id: i64) -> Result<Option<Project>> {
        let project = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(project)
    }
}

#[async_trait]
impl ProjectStore for ProjectRepo {
    async fn create(&self, input: NewProject) -> Result<Project> {
        let result = sqlx::query(
            "INSERT INTO projects (name, slug, timezone, currency) VALUES (?, ?, ?, ?)",
        )
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.timezone)
        .bind(&input.currency)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "project with this slug"))?;

        let id = result.last_insert_id() as i64;
        self.fetch(id)
            .await?
            .ok_or_else(|| Error::internal("project vanished after insert"))
    }

    async fn get(&self, id: i64) -> Result<Option<Project>> {
        self.fetch(id).await
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Project>> {
        let project = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(project)
    }

    async fn list(&self) -> Result<Vec<Project>> {
        let projects = sqlx::query_as::<_, Project>("SELECT * FROM projects ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(projects)
    }

    async fn list_active(&self) -> Result<Vec<Project>> {
        let projects =
            sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE is_active = TRUE ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(projects)
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Project>> {
        let projects = sqlx::query_as::<_, Project>(
            "SELECT p.* FROM projects p \
             INNER JOIN user_project_roles upr ON upr.project_id = p.id \
             WHERE upr.user_id = ? ORDER BY p.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(projects)
    }

    async fn update(&self, id: i64, update: ProjectUpdate) -> Result<Project> {
        let result = sqlx::query(
            "UPDATE projects SET \
                name = COALESCE(?, name), \
                timezone = COALESCE(?, timezone), \
                currency = COALESCE(?, currency), \
                is_active = COALESCE(?, is_active) \
             WHERE id = ?",
        )
        .bind(&update.name)
        .bind(&update.timezone)
        .bind(&update.currency)
        .bind(update.is_active)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // MySQL reports 0 affected rows for no-op updates too; verify
            // existence before declaring the project missing.
            if self.fetch(id).await?.is_none() {
                return Err(Error::not_found(format!("project {id}")));
            }
        }

        self.fetch(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("project {id}")))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("project {id}")));
        }
        Ok(())
    }
}
