//! MySQL pool wrapper.

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use tracing::info;

use bi_core::{Error, Result};

use crate::config::StorageConfig;

/// Shared database handle with a bounded connection pool.
#[derive(Clone)]
pub struct Storage {
    pool: MySqlPool,
    config: StorageConfig,
}

impl Storage {
    /// Connects to MySQL and verifies the connection.
    pub async fn connect(config: StorageConfig) -> Result<Self> {
        let pool = Self::pool_options(&config)
            .connect(&config.url())
            .await
            .map_err(|e| Error::storage(format!("failed to connect to MySQL: {e}")))?;

        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            max_connections = config.max_connections,
            "Connected to MySQL"
        );

        Ok(Self { pool, config })
    }

    /// Creates the pool without connecting; connections are established on
    /// first use. Used by tests that never touch the database.
    pub fn connect_lazy(config: StorageConfig) -> Result<Self> {
        let pool = Self::pool_options(&config)
            .connect_lazy(&config.url())
            .map_err(|e| Error::storage(format!("invalid MySQL URL: {e}")))?;

        Ok(Self { pool, config })
    }

    fn pool_options(config: &StorageConfig) -> MySqlPoolOptions {
        MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .max_lifetime(config.max_lifetime())
    }

    /// Returns the inner pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Closes the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
