//! Queue configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A named lane with a relative scheduling weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaneConfig {
    pub name: String,
    pub weight: u32,
}

/// Queue server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Redis endpoint.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub db: i64,

    /// Global worker concurrency cap.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Lanes with scheduling weights, highest priority first.
    #[serde(default = "default_lanes")]
    pub lanes: Vec<LaneConfig>,
    /// Idle poll interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Base delay for exponential retry backoff, in seconds.
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,
    /// Grace window for in-flight tasks on shutdown, in seconds.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_concurrency() -> usize {
    10
}

fn default_lanes() -> Vec<LaneConfig> {
    vec![
        LaneConfig { name: "critical".into(), weight: 6 },
        LaneConfig { name: "default".into(), weight: 3 },
        LaneConfig { name: "low".into(), weight: 1 },
    ]
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_retry_backoff_secs() -> u64 {
    5
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: String::new(),
            db: 0,
            concurrency: default_concurrency(),
            lanes: default_lanes(),
            poll_interval_ms: default_poll_interval_ms(),
            retry_backoff_secs: default_retry_backoff_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl QueueConfig {
    /// Builds the Redis connection URL.
    pub fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!("redis://:{}@{}:{}/{}", self.password, self.host, self.port, self.db)
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn lane_names(&self) -> Vec<String> {
        self.lanes.iter().map(|l| l.name.clone()).collect()
    }
}
