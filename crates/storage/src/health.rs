//! Database health checks.

use crate::client::Storage;

/// Checks the database connection with a trivial query.
pub async fn check_connection(storage: &Storage) -> bool {
    sqlx::query("SELECT 1").execute(storage.pool()).await.is_ok()
}
