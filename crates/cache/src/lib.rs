//! Redis cache for reference dimensions.
//!
//! Caches dimension reads only (counters, goals, accounts, campaigns) —
//! never facts. Keys are `<prefix><parent_id>`; an admin mutation must
//! invalidate the matching prefix. A miss is a non-error and sends the
//! caller to the database.

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use bi_core::{Error, Result};

/// Cache key prefixes.
///
/// All of these hold reference data that changes only on admin actions,
/// never during sync.
pub mod keys {
    pub const COUNTERS_BY_PROJECT: &str = "counters:project:";
    pub const GOALS_BY_COUNTER: &str = "goals:counter:";
    pub const DIRECT_ACCOUNTS_BY_PROJECT: &str = "direct:accounts:project:";
    pub const DIRECT_CAMPAIGNS_BY_ACCOUNT: &str = "direct:campaigns:account:";
    pub const REPORT_BY_PROJECT: &str = "report:project:";

    /// Constructs a cache key from prefix and parent id.
    pub fn build(prefix: &str, id: i64) -> String {
        format!("{prefix}{id}")
    }
}

/// Redis cache configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub db: i64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    6379
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: String::new(),
            db: 0,
        }
    }
}

impl CacheConfig {
    /// Builds the connection URL.
    pub fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!("redis://:{}@{}:{}/{}", self.password, self.host, self.port, self.db)
        }
    }
}

/// JSON value cache over Redis.
#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
}

impl Cache {
    /// Connects to Redis and verifies the connection.
    pub async fn connect(config: &CacheConfig) -> Result<Self> {
        let client = redis::Client::open(config.url())
            .map_err(|e| Error::internal(format!("invalid Redis URL: {e}")))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| Error::internal(format!("failed to connect to Redis: {e}")))?;

        info!(host = %config.host, port = config.port, db = config.db, "Connected to Redis cache");
        Ok(Self { conn })
    }

    /// Wraps an existing connection manager (shared with the queue backend).
    pub fn with_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Retrieves and decodes a value. A missing key is `Ok(None)`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| Error::internal(format!("cache get error: {e}")))?;

        match raw {
            Some(json) => {
                let value = serde_json::from_str(&json)
                    .map_err(|e| Error::internal(format!("cache decode error: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Stores a value with a per-entry TTL.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, json, ttl.as_secs())
            .await
            .map_err(|e| Error::internal(format!("cache set error: {e}")))?;
        Ok(())
    }

    /// Removes a single key.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| Error::internal(format!("cache delete error: {e}")))?;
        Ok(())
    }

    /// Removes all keys under a prefix. Returns the number of keys dropped.
    pub async fn invalidate_prefix(&self, prefix: &str) -> Result<u64> {
        let pattern = format!("{prefix}*");
        let mut conn = self.conn.clone();

        let keys: Vec<String> = {
            let mut iter = conn
                .scan_match::<_, String>(&pattern)
                .await
                .map_err(|e| Error::internal(format!("cache scan error: {e}")))?;

            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        if keys.is_empty() {
            return Ok(0);
        }

        let dropped = keys.len() as u64;
        conn.del::<_, ()>(keys)
            .await
            .map_err(|e| Error::internal(format!("cache invalidate error: {e}")))?;

        debug!(pattern = %pattern, keys = dropped, "Cache invalidated");
        Ok(dropped)
    }
}
