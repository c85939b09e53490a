//! Queue broker backends.
//!
//! [`RedisBroker`] is the durable production backend; [`MemoryBroker`] backs
//! the test suite with the same observable contract. The reliable-queue
//! shape is the classic pending-list / active-list pair: a dequeue moves the
//! raw envelope into the active list atomically, an acknowledgement removes
//! it, and envelopes left in the active list by a crashed worker are
//! re-queued on server start.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::{HashMap, VecDeque};
use tracing::{info, warn};

use bi_core::{Error, Result};

use crate::config::QueueConfig;
use crate::task::TaskMessage;

/// Backend contract for the durable queue.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Appends a task to its lane.
    async fn enqueue(&self, task: &TaskMessage) -> Result<()>;

    /// Pops the next task, trying lanes in the given order. The task moves
    /// to the active set until acked, retried, or dead-lettered.
    async fn dequeue(&self, lanes: &[String]) -> Result<Option<TaskMessage>>;

    /// Acknowledges a completed task.
    async fn ack(&self, task: &TaskMessage) -> Result<()>;

    /// Re-queues a failed task with its retry count incremented, due at the
    /// given instant.
    async fn retry(&self, task: &TaskMessage, due: DateTime<Utc>) -> Result<()>;

    /// Moves a task to the dead-letter lane.
    async fn dead_letter(&self, task: &TaskMessage) -> Result<()>;

    /// Moves due retry tasks back to their pending lanes. Returns how many
    /// were promoted.
    async fn promote_due(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Re-queues tasks stranded in the active set by a dead worker.
    async fn recover_orphans(&self) -> Result<u64>;

    /// Number of tasks waiting in a lane.
    async fn pending_len(&self, lane: &str) -> Result<u64>;

    /// Snapshot of the dead-letter lane.
    async fn dead_letter_tasks(&self) -> Result<Vec<TaskMessage>>;
}

fn encode(task: &TaskMessage) -> Result<String> {
    Ok(serde_json::to_string(task)?)
}

fn decode(raw: &str) -> Result<TaskMessage> {
    serde_json::from_str(raw).map_err(|e| Error::internal(format!("corrupt task envelope: {e}")))
}

/// Redis-backed broker.
#[derive(Clone)]
pub struct RedisBroker {
    conn: ConnectionManager,
    namespace: String,
}

impl RedisBroker {
    /// Connects to the Redis endpoint from the queue configuration.
    pub async fn connect(config: &QueueConfig) -> Result<Self> {
        let client = redis::Client::open(config.url())
            .map_err(|e| Error::internal(format!("invalid Redis URL: {e}")))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| Error::internal(format!("failed to connect to Redis: {e}")))?;

        info!(host = %config.host, port = config.port, "Connected to Redis queue backend");
        Ok(Self::with_connection(conn))
    }

    /// Wraps an existing connection manager.
    pub fn with_connection(conn: ConnectionManager) -> Self {
        Self {
            conn,
            namespace: "tasks".to_string(),
        }
    }

    fn pending_key(&self, lane: &str) -> String {
        format!("{}:{}:pending", self.namespace, lane)
    }

    fn active_key(&self) -> String {
        format!("{}:active", self.namespace)
    }

    fn retry_key(&self) -> String {
        format!("{}:retry", self.namespace)
    }

    fn dead_key(&self) -> String {
        format!("{}:dead", self.namespace)
    }
}

fn redis_err(e: redis::RedisError) -> Error {
    Error::internal(format!("queue backend error: {e}"))
}

#[async_trait]
impl Broker for RedisBroker {
    async fn enqueue(&self, task: &TaskMessage) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(self.pending_key(&task.lane), encode(task)?)
            .await
            .map_err(redis_err)?;
        Ok(())
    }

    async fn dequeue(&self, lanes: &[String]) -> Result<Option<TaskMessage>> {
        let mut conn = self.conn.clone();
        for lane in lanes {
            // RPOPLPUSH moves the envelope into the active list atomically,
            // so a crash between pop and handling cannot lose it.
            let raw: Option<String> = redis::cmd("RPOPLPUSH")
                .arg(self.pending_key(lane))
                .arg(self.active_key())
                .query_async(&mut conn)
                .await
                .map_err(redis_err)?;

            if let Some(raw) = raw {
                return Ok(Some(decode(&raw)?));
            }
        }
        Ok(None)
    }

    async fn ack(&self, task: &TaskMessage) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.lrem::<_, _, ()>(self.active_key(), 1, encode(task)?)
            .await
            .map_err(redis_err)?;
        Ok(())
    }

    async fn retry(&self, task: &TaskMessage, due: DateTime<Utc>) -> Result<()> {
        let mut next = task.clone();
        next.retried += 1;

        let mut conn = self.conn.clone();
        conn.lrem::<_, _, ()>(self.active_key(), 1, encode(task)?)
            .await
            .map_err(redis_err)?;
        conn.zadd::<_, _, _, ()>(self.retry_key(), encode(&next)?, due.timestamp())
            .await
            .map_err(redis_err)?;
        Ok(())
    }

    async fn dead_letter(&self, task: &TaskMessage) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.lrem::<_, _, ()>(self.active_key(), 1, encode(task)?)
            .await
            .map_err(redis_err)?;
        conn.lpush::<_, _, ()>(self.dead_key(), encode(task)?)
            .await
            .map_err(redis_err)?;
        Ok(())
    }

    async fn promote_due(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut conn = self.conn.clone();
        let due: Vec<String> = conn
            .zrangebyscore(self.retry_key(), "-inf", now.timestamp())
            .await
            .map_err(redis_err)?;

        let mut promoted = 0;
        for raw in due {
            let removed: i64 = conn
                .zrem(self.retry_key(), &raw)
                .await
                .map_err(redis_err)?;
            // Another server instance may have promoted it first.
            if removed == 0 {
                continue;
            }

            match decode(&raw) {
                Ok(task) => {
                    conn.lpush::<_, _, ()>(self.pending_key(&task.lane), raw)
                        .await
                        .map_err(redis_err)?;
                    promoted += 1;
                }
                Err(e) => warn!(error = %e, "Dropping corrupt retry envelope"),
            }
        }
        Ok(promoted)
    }

    async fn recover_orphans(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        let stranded: Vec<String> = conn
            .lrange(self.active_key(), 0, -1)
            .await
            .map_err(redis_err)?;

        let mut recovered = 0;
        for raw in stranded {
            conn.lrem::<_, _, ()>(self.active_key(), 1, &raw)
                .await
                .map_err(redis_err)?;

            match decode(&raw) {
                Ok(task) => {
                    conn.lpush::<_, _, ()>(self.pending_key(&task.lane), raw)
                        .await
                        .map_err(redis_err)?;
                    recovered += 1;
                }
                Err(e) => warn!(error = %e, "Dropping corrupt active envelope"),
            }
        }

        if recovered > 0 {
            info!(count = recovered, "Re-queued orphaned tasks");
        }
        Ok(recovered)
    }

    async fn pending_len(&self, lane: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let len: u64 = conn.llen(self.pending_key(lane)).await.map_err(redis_err)?;
        Ok(len)
    }

    async fn dead_letter_tasks(&self) -> Result<Vec<TaskMessage>> {
        let mut conn = self.conn.clone();
        let raws: Vec<String> = conn.lrange(self.dead_key(), 0, -1).await.map_err(redis_err)?;
        raws.iter().map(|raw| decode(raw)).collect()
    }
}

#[derive(Default)]
struct MemoryState {
    pending: HashMap<String, VecDeque<TaskMessage>>,
    active: Vec<TaskMessage>,
    retry: Vec<(DateTime<Utc>, TaskMessage)>,
    dead: Vec<TaskMessage>,
}

/// In-memory broker with the same contract as [`RedisBroker`]. Test-only in
/// spirit, but exported so the integration suite can observe queue state.
#[derive(Default)]
pub struct MemoryBroker {
    state: Mutex<MemoryState>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn remove_active(state: &mut MemoryState, id: &str) {
        state.active.retain(|t| t.id != id);
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn enqueue(&self, task: &TaskMessage) -> Result<()> {
        let mut state = self.state.lock();
        state
            .pending
            .entry(task.lane.clone())
            .or_default()
            .push_back(task.clone());
        Ok(())
    }

    async fn dequeue(&self, lanes: &[String]) -> Result<Option<TaskMessage>> {
        let mut state = self.state.lock();
        for lane in lanes {
            if let Some(task) = state.pending.get_mut(lane).and_then(|q| q.pop_front()) {
                state.active.push(task.clone());
                return Ok(Some(task));
            }
        }
        Ok(None)
    }

    async fn ack(&self, task: &TaskMessage) -> Result<()> {
        let mut state = self.state.lock();
        Self::remove_active(&mut state, &task.id);
        Ok(())
    }

    async fn retry(&self, task: &TaskMessage, due: DateTime<Utc>) -> Result<()> {
        let mut next = task.clone();
        next.retried += 1;

        let mut state = self.state.lock();
        Self::remove_active(&mut state, &task.id);
        state.retry.push((due, next));
        Ok(())
    }

    async fn dead_letter(&self, task: &TaskMessage) -> Result<()> {
        let mut state = self.state.lock();
        Self::remove_active(&mut state, &task.id);
        state.dead.push(task.clone());
        Ok(())
    }

    async fn promote_due(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.lock();
        let (due, later): (Vec<_>, Vec<_>) =
            std::mem::take(&mut state.retry).into_iter().partition(|(at, _)| *at <= now);
        state.retry = later;

        let promoted = due.len() as u64;
        for (_, task) in due {
            state
                .pending
                .entry(task.lane.clone())
                .or_default()
                .push_back(task);
        }
        Ok(promoted)
    }

    async fn recover_orphans(&self) -> Result<u64> {
        let mut state = self.state.lock();
        let stranded = std::mem::take(&mut state.active);
        let recovered = stranded.len() as u64;
        for task in stranded {
            state
                .pending
                .entry(task.lane.clone())
                .or_default()
                .push_back(task);
        }
        Ok(recovered)
    }

    async fn pending_len(&self, lane: &str) -> Result<u64> {
        let state = self.state.lock();
        Ok(state.pending.get(lane).map(|q| q.len() as u64).unwrap_or(0))
    }

    async fn dead_letter_tasks(&self) -> Result<Vec<TaskMessage>> {
        let state = self.state.lock();
        Ok(state.dead.clone())
    }
}
