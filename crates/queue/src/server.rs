//! Queue worker server.
//!
//! Pops tasks over weighted lanes and dispatches each onto its own tokio
//! task, bounded by a global semaphore. Handlers run under the task's
//! timeout; the server alone decides between retry and dead-letter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

use bi_core::Result;

use crate::broker::Broker;
use crate::config::{LaneConfig, QueueConfig};
use crate::task::TaskMessage;

/// A task handler registered for one task type.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &TaskMessage) -> Result<()>;
}

/// Worker pool over the broker.
pub struct QueueServer {
    broker: Arc<dyn Broker>,
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
    config: QueueConfig,
    semaphore: Arc<Semaphore>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl QueueServer {
    pub fn new(broker: Arc<dyn Broker>, config: QueueConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            broker,
            handlers: HashMap::new(),
            semaphore: Arc::new(Semaphore::new(config.concurrency)),
            config,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Registers a handler for a task type.
    pub fn register(&mut self, kind: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(kind.into(), handler);
    }

    /// Starts the dispatch and retry-promotion loops.
    pub fn start(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        let server = self.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = server.broker.recover_orphans().await {
                error!("Orphan recovery failed: {}", e);
            }
            server.run_dispatch_loop().await;
        }));

        let server = self.clone();
        handles.push(tokio::spawn(async move {
            server.run_promoter_loop().await;
        }));

        info!(
            concurrency = self.config.concurrency,
            lanes = ?self.config.lane_names(),
            "Queue server started"
        );
        handles
    }

    /// Signals shutdown and waits up to the grace window for in-flight
    /// tasks. Tasks still running after the window stay in the active set
    /// and are re-queued on the next start.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);

        let all = self.config.concurrency as u32;
        match tokio::time::timeout(
            self.config.shutdown_grace(),
            self.semaphore.acquire_many(all),
        )
        .await
        {
            Ok(Ok(permits)) => {
                permits.forget();
                info!("Queue server drained");
            }
            _ => warn!("Queue server shutdown grace expired with tasks in flight"),
        }
    }

    async fn run_dispatch_loop(self: Arc<Self>) {
        let mut shutdown = self.shutdown_rx.clone();
        let mut tick: u64 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let permit = tokio::select! {
                permit = self.semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = shutdown.changed() => continue,
            };

            let order = pop_order(&self.config.lanes, tick);
            tick = tick.wrapping_add(1);

            match self.broker.dequeue(&order).await {
                Ok(Some(task)) => {
                    let server = self.clone();
                    tokio::spawn(async move {
                        server.run_task(task).await;
                        drop(permit);
                    });
                }
                Ok(None) => {
                    drop(permit);
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.poll_interval()) => {}
                        _ = shutdown.changed() => {}
                    }
                }
                Err(e) => {
                    drop(permit);
                    error!("Queue dequeue error: {}", e);
                    tokio::time::sleep(self.config.poll_interval()).await;
                }
            }
        }

        info!("Queue dispatch loop stopped");
    }

    async fn run_promoter_loop(&self) {
        let mut shutdown = self.shutdown_rx.clone();
        let interval = self.config.poll_interval().max(Duration::from_millis(100)) * 2;

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.broker.promote_due(Utc::now()).await {
                Ok(promoted) if promoted > 0 => {
                    debug!(count = promoted, "Promoted due retry tasks");
                }
                Ok(_) => {}
                Err(e) => error!("Retry promotion error: {}", e),
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {}
            }
        }
    }

    async fn run_task(&self, task: TaskMessage) {
        let handler = match self.handlers.get(&task.kind) {
            Some(handler) => handler.clone(),
            None => {
                warn!(task_id = %task.id, kind = %task.kind, "No handler for task type");
                self.dead_letter_task(&task).await;
                return;
            }
        };

        debug!(task_id = %task.id, kind = %task.kind, retried = task.retried, "Task started");

        let result = match tokio::time::timeout(task.timeout(), handler.handle(&task)).await {
            Ok(result) => result,
            Err(_) => Err(bi_core::Error::canceled(format!(
                "task exceeded its {}s timeout",
                task.timeout_secs
            ))),
        };

        match result {
            Ok(()) => {
                debug!(task_id = %task.id, kind = %task.kind, "Task completed");
                if let Err(e) = self.broker.ack(&task).await {
                    error!(task_id = %task.id, "Failed to ack task: {}", e);
                }
            }
            Err(e) if !e.is_retryable() => {
                error!(
                    task_id = %task.id,
                    kind = %task.kind,
                    error = %e,
                    "Task failed permanently, moving to dead-letter lane"
                );
                self.dead_letter_task(&task).await;
            }
            Err(e) if task.retried >= task.max_retries => {
                error!(
                    task_id = %task.id,
                    kind = %task.kind,
                    retried = task.retried,
                    error = %e,
                    "Task exhausted retries, moving to dead-letter lane"
                );
                self.dead_letter_task(&task).await;
            }
            Err(e) => {
                let delay = backoff_delay(self.config.retry_backoff(), task.retried, true);
                warn!(
                    task_id = %task.id,
                    kind = %task.kind,
                    retried = task.retried,
                    delay_secs = delay.as_secs(),
                    error = %e,
                    "Task failed, scheduling retry"
                );
                let due = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
                if let Err(e) = self.broker.retry(&task, due).await {
                    error!(task_id = %task.id, "Failed to schedule retry: {}", e);
                }
            }
        }
    }

    async fn dead_letter_task(&self, task: &TaskMessage) {
        if let Err(e) = self.broker.dead_letter(task).await {
            error!(task_id = %task.id, "Failed to dead-letter task: {}", e);
        }
    }
}

/// Picks the lane a tick should serve first. Over `total_weight` consecutive
/// ticks each lane is first exactly `weight` times.
fn lane_for_tick(lanes: &[LaneConfig], tick: u64) -> usize {
    let total: u64 = lanes.iter().map(|l| l.weight as u64).sum();
    if total == 0 {
        return 0;
    }

    let mut pos = tick % total;
    for (i, lane) in lanes.iter().enumerate() {
        if pos < lane.weight as u64 {
            return i;
        }
        pos -= lane.weight as u64;
    }
    0
}

/// Pop order for a tick: the weighted pick first, then the remaining lanes
/// in configured order so free capacity is never wasted on an empty lane.
pub(crate) fn pop_order(lanes: &[LaneConfig], tick: u64) -> Vec<String> {
    if lanes.is_empty() {
        return vec!["default".to_string()];
    }

    let first = lane_for_tick(lanes, tick);
    let mut order = Vec::with_capacity(lanes.len());
    order.push(lanes[first].name.clone());
    for (i, lane) in lanes.iter().enumerate() {
        if i != first {
            order.push(lane.name.clone());
        }
    }
    order
}

/// Exponential backoff: `base * 2^retried`, capped at one hour, with up to
/// 20% jitter to spread synchronized retries.
pub(crate) fn backoff_delay(base: Duration, retried: u32, jitter: bool) -> Duration {
    let factor = 1u64 << retried.min(10);
    let mut delay = base.saturating_mul(factor as u32).min(Duration::from_secs(3600));

    if jitter {
        let extra_ms = rand::thread_rng().gen_range(0..=delay.as_millis() as u64 / 5 + 1);
        delay += Duration::from_millis(extra_ms);
    }
    delay
}
