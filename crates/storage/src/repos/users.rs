//! User and project-role repository.

use async_trait::async_trait;
use sqlx::MySqlPool;

use bi_core::{Error, Result, User, UserProjectRole};

use crate::client::Storage;
use crate::repos::map_insert_error;
use crate::stores::{NewUser, UserStore};

pub struct UserRepo {
    pool: MySqlPool,
}

impl UserRepo {
    pub fn new(storage: &Storage) -> Self {
        Self {
            pool: storage.pool().clone(),
        }
    }

    async fn fetch(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

#[async_trait]
impl UserStore for UserRepo {
    async fn create(&self, input: NewUser) -> Result<User> {
        let result = sqlx::query(
            "INSERT INTO users (email, password_hash, name, role) VALUES (?, ?, ?, ?)",
        )
        .bind(&input.email)
        .bind(&input.password_hash)
        .bind(&input.name)
        .bind(&input.role)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "user with this email"))?;

        let id = result.last_insert_id() as i64;
        self.fetch(id)
            .await?
            .ok_or_else(|| Error::internal("user vanished after insert"))
    }

    async fn get(&self, id: i64) -> Result<Option<User>> {
        self.fetch(id).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn update_last_login(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET last_login_at = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("user {id}")));
        }
        Ok(())
    }

    async fn assign_project_role(&self, user_id: i64, project_id: i64, role: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_project_roles (user_id, project_id, role) VALUES (?, ?, ?) \
             ON DUPLICATE KEY UPDATE role = VALUES(role)",
        )
        .bind(user_id)
        .bind(project_id)
        .bind(role)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_project_role(&self, user_id: i64, project_id: i64) -> Result<()> {
        let result =
            sqlx::query("DELETE FROM user_project_roles WHERE user_id = ? AND project_id = ?")
                .bind(user_id)
                .bind(project_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!(
                "role for user {user_id} on project {project_id}"
            )));
        }
        Ok(())
    }

    async fn project_role(
        &self,
        user_id: i64,
        project_id: i64,
    ) -> Result<Option<UserProjectRole>> {
        let role = sqlx::query_as::<_, UserProjectRole>(
            "SELECT * FROM user_project_roles WHERE user_id = ? AND project_id = ?",
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }

    async fn list_project_users(&self, project_id: i64) -> Result<Vec<UserProjectRole>> {
        let roles = sqlx::query_as::<_, UserProjectRole>(
            "SELECT * FROM user_project_roles WHERE project_id = ? ORDER BY user_id",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    async fn list_user_projects(&self, user_id: i64) -> Result<Vec<UserProjectRole>> {
        let roles = sqlx::query_as::<_, UserProjectRole>(
            "SELECT * FROM user_project_roles WHERE user_id = ? ORDER BY project_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }
}
