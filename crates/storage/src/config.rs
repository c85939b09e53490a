//! Database configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// MySQL connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_database")]
    pub database: String,
    /// Pool upper bound.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Idle connections kept warm.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection max lifetime in seconds.
    #[serde(default = "default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3306
}

fn default_username() -> String {
    "root".to_string()
}

fn default_database() -> String {
    "reports".to_string()
}

fn default_max_connections() -> u32 {
    25
}

fn default_min_connections() -> u32 {
    2
}

fn default_max_lifetime_secs() -> u64 {
    3600
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: default_username(),
            password: String::new(),
            database: default_database(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            max_lifetime_secs: default_max_lifetime_secs(),
        }
    }
}

impl StorageConfig {
    /// Builds the connection URL.
    pub fn url(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}
