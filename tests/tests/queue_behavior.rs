//! Queue contract: retries, dead-letter, lanes, timeouts.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use bi_core::Error;
use queue::{
    Broker, MemoryBroker, QueueClient, QueueConfig, QueueServer, TaskHandler, TaskMessage,
    TaskOptions,
};

/// Handler failing a scripted number of times before succeeding.
struct FlakyHandler {
    calls: Arc<AtomicU32>,
    failures: u32,
    error: fn() -> Error,
}

#[async_trait]
impl TaskHandler for FlakyHandler {
    async fn handle(&self, _task: &TaskMessage) -> bi_core::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err((self.error)())
        } else {
            Ok(())
        }
    }
}

struct SleepyHandler {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl TaskHandler for SleepyHandler {
    async fn handle(&self, _task: &TaskMessage) -> bi_core::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
}

fn fast_config() -> QueueConfig {
    QueueConfig {
        concurrency: 2,
        poll_interval_ms: 10,
        retry_backoff_secs: 0,
        shutdown_grace_secs: 1,
        ..QueueConfig::default()
    }
}

fn transient_error() -> Error {
    Error::vendor_transient(Some(500), "scripted failure")
}

fn permanent_error() -> Error {
    Error::vendor_permanent(Some(53), "scripted failure")
}

/// Polls a condition until it holds or five seconds pass.
async fn wait_until<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..500 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

async fn dead_count(broker: &MemoryBroker) -> usize {
    broker.dead_letter_tasks().await.unwrap().len()
}

/// A successful task is delivered once and acknowledged.
#[tokio::test]
async fn successful_task_is_acked() {
    let broker = Arc::new(MemoryBroker::new());
    let calls = Arc::new(AtomicU32::new(0));

    let mut server = QueueServer::new(broker.clone(), fast_config());
    server.register(
        "test:ok",
        Arc::new(FlakyHandler { calls: calls.clone(), failures: 0, error: transient_error }),
    );
    let server = Arc::new(server);
    let _handles = server.clone().start();

    let client = QueueClient::new(broker.clone());
    client
        .enqueue("test:ok", &json!({}), TaskOptions::default())
        .await
        .unwrap();

    wait_until("handler call", || {
        let calls = calls.clone();
        async move { calls.load(Ordering::SeqCst) == 1 }
    })
    .await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(dead_count(&broker).await, 0);
    assert_eq!(broker.pending_len("default").await.unwrap(), 0);

    server.shutdown().await;
}

/// Property 8: a task failing `max_retries` consecutive times lands in the
/// dead-letter lane exactly once, after `max_retries + 1` attempts.
#[tokio::test]
async fn retry_bound_dead_letters_exactly_once() {
    let broker = Arc::new(MemoryBroker::new());
    let calls = Arc::new(AtomicU32::new(0));

    let mut server = QueueServer::new(broker.clone(), fast_config());
    server.register(
        "test:flaky",
        Arc::new(FlakyHandler { calls: calls.clone(), failures: u32::MAX, error: transient_error }),
    );
    let server = Arc::new(server);
    let _handles = server.clone().start();

    let client = QueueClient::new(broker.clone());
    client
        .enqueue(
            "test:flaky",
            &json!({}),
            TaskOptions { max_retries: 2, ..TaskOptions::default() },
        )
        .await
        .unwrap();

    wait_until("dead-letter delivery", || {
        let broker = broker.clone();
        async move { dead_count(&broker).await == 1 }
    })
    .await;

    // no further attempts or duplicate dead-letter entries afterwards
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(dead_count(&broker).await, 1);

    server.shutdown().await;
}

/// Non-retryable errors skip the retry ladder entirely.
#[tokio::test]
async fn permanent_error_dead_letters_immediately() {
    let broker = Arc::new(MemoryBroker::new());
    let calls = Arc::new(AtomicU32::new(0));

    let mut server = QueueServer::new(broker.clone(), fast_config());
    server.register(
        "test:permanent",
        Arc::new(FlakyHandler { calls: calls.clone(), failures: u32::MAX, error: permanent_error }),
    );
    let server = Arc::new(server);
    let _handles = server.clone().start();

    let client = QueueClient::new(broker.clone());
    client
        .enqueue(
            "test:permanent",
            &json!({}),
            TaskOptions { max_retries: 3, ..TaskOptions::default() },
        )
        .await
        .unwrap();

    wait_until("dead-letter delivery", || {
        let broker = broker.clone();
        async move { dead_count(&broker).await == 1 }
    })
    .await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    server.shutdown().await;
}

/// A retried task eventually succeeds within its retry budget.
#[tokio::test]
async fn transient_failure_recovers_within_budget() {
    let broker = Arc::new(MemoryBroker::new());
    let calls = Arc::new(AtomicU32::new(0));

    let mut server = QueueServer::new(broker.clone(), fast_config());
    server.register(
        "test:recovers",
        Arc::new(FlakyHandler { calls: calls.clone(), failures: 2, error: transient_error }),
    );
    let server = Arc::new(server);
    let _handles = server.clone().start();

    let client = QueueClient::new(broker.clone());
    client
        .enqueue(
            "test:recovers",
            &json!({}),
            TaskOptions { max_retries: 3, ..TaskOptions::default() },
        )
        .await
        .unwrap();

    wait_until("third attempt", || {
        let calls = calls.clone();
        async move { calls.load(Ordering::SeqCst) >= 3 }
    })
    .await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(dead_count(&broker).await, 0);

    server.shutdown().await;
}

/// A handler exceeding the task timeout is treated as a retryable failure.
#[tokio::test]
async fn timeout_is_retryable_failure() {
    let broker = Arc::new(MemoryBroker::new());
    let calls = Arc::new(AtomicU32::new(0));

    let mut server = QueueServer::new(broker.clone(), fast_config());
    server.register("test:sleepy", Arc::new(SleepyHandler { calls: calls.clone() }));
    let server = Arc::new(server);
    let _handles = server.clone().start();

    let client = QueueClient::new(broker.clone());
    client
        .enqueue(
            "test:sleepy",
            &json!({}),
            TaskOptions {
                max_retries: 0,
                timeout: Duration::from_millis(50),
                ..TaskOptions::default()
            },
        )
        .await
        .unwrap();

    wait_until("dead-letter after timeout", || {
        let broker = broker.clone();
        async move { dead_count(&broker).await == 1 }
    })
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    server.shutdown().await;
}

/// A task type without a handler goes straight to the dead-letter lane.
#[tokio::test]
async fn unknown_task_type_dead_letters() {
    let broker = Arc::new(MemoryBroker::new());

    let server = Arc::new(QueueServer::new(broker.clone(), fast_config()));
    let _handles = server.clone().start();

    let client = QueueClient::new(broker.clone());
    client
        .enqueue("test:nobody-home", &json!({}), TaskOptions::default())
        .await
        .unwrap();

    wait_until("dead-letter delivery", || {
        let broker = broker.clone();
        async move { dead_count(&broker).await == 1 }
    })
    .await;

    server.shutdown().await;
}

/// Tasks stranded in the active set are recovered on server start.
#[tokio::test]
async fn orphaned_tasks_are_requeued() {
    let broker = Arc::new(MemoryBroker::new());
    let client = QueueClient::new(broker.clone());

    client.enqueue_sync_current(7).await.unwrap();

    // a worker pops the task and dies without acking
    let lanes = vec!["default".to_string()];
    let _popped = broker.dequeue(&lanes).await.unwrap().unwrap();
    assert_eq!(broker.pending_len("default").await.unwrap(), 0);

    assert_eq!(broker.recover_orphans().await.unwrap(), 1);
    assert_eq!(broker.pending_len("default").await.unwrap(), 1);
}

/// Enqueue helpers carry the documented defaults.
#[tokio::test]
async fn enqueue_helpers_use_documented_defaults() {
    let broker = Arc::new(MemoryBroker::new());
    let client = QueueClient::new(broker.clone());

    client.enqueue_sync_current(1).await.unwrap();
    client.enqueue_sync_analytics(1, 2025, 2).await.unwrap();
    client.enqueue_analyze_metrics(1, vec!["2025-02".into()]).await.unwrap();

    let lanes = vec!["default".to_string(), "low".to_string()];

    let current = broker.dequeue(&lanes).await.unwrap().unwrap();
    assert_eq!(current.kind, "sync:current");
    assert_eq!(current.max_retries, 3);
    assert_eq!(current.timeout_secs, 15 * 60);
    assert_eq!(current.lane, "default");

    let analytics = broker.dequeue(&lanes).await.unwrap().unwrap();
    assert_eq!(analytics.kind, "sync:analytics");
    assert_eq!(analytics.timeout_secs, 10 * 60);

    let analyze = broker.dequeue(&lanes).await.unwrap().unwrap();
    assert_eq!(analyze.kind, "analyze:metrics");
    assert_eq!(analyze.max_retries, 2);
    assert_eq!(analyze.timeout_secs, 2 * 60);
    assert_eq!(analyze.lane, "low");
}

/// With tasks in several lanes, the configured lane order drains the
/// high-priority lane first.
#[tokio::test]
async fn critical_lane_pops_first() {
    let broker = Arc::new(MemoryBroker::new());
    let client = QueueClient::new(broker.clone());

    client
        .enqueue("t", &json!({}), TaskOptions { lane: "low".into(), ..TaskOptions::default() })
        .await
        .unwrap();
    client
        .enqueue("t", &json!({}), TaskOptions { lane: "critical".into(), ..TaskOptions::default() })
        .await
        .unwrap();

    let lanes = QueueConfig::default().lane_names();

    let first = broker.dequeue(&lanes).await.unwrap().unwrap();
    assert_eq!(first.lane, "critical");
    let second = broker.dequeue(&lanes).await.unwrap().unwrap();
    assert_eq!(second.lane, "low");
}
