// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Engine-level tests: registry semantics, per-probe serialization and the
//! failure threshold driven through real checks.

use super::*;
use crate::crd::HealthProtocol;
use crate::health::probe::{ProbeConfig, ProbeResult};
use crate::health::queue::ProbeWorkerPool;
use crate::health::{ProbeNotifier, ProbePerformer};
use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

/// Test notifier collecting results in memory.
#[derive(Default)]
struct RecordingNotifier {
    results: StdMutex<Vec<ProbeResult>>,
}

impl RecordingNotifier {
    fn results(&self) -> Vec<ProbeResult> {
        self.results.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ProbeNotifier for RecordingNotifier {
    async fn notify(&self, result: ProbeResult) -> Result<()> {
        self.results.lock().unwrap().push(result);
        Ok(())
    }
}

fn config(id: &str, port: u16, interval: Duration) -> ProbeConfig {
    ProbeConfig {
        id: id.to_string(),
        host: "127.0.0.1".to_string(),
        ip_address: None,
        path: "/".to_string(),
        port: i32::from(port),
        protocol: HealthProtocol::HTTP,
        interval,
        additional_headers: Vec::new(),
        expected_responses: vec![200, 201],
        failure_threshold: 4,
        allow_insecure_certificate: false,
    }
}

async fn closed_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

// ------------------------------------------------------------------------
// Registry semantics
// ------------------------------------------------------------------------

#[tokio::test]
async fn test_add_has_remove() {
    let pool = ProbeWorkerPool::spawn(1, 8, ProbePerformer::new().unwrap());
    let monitor = Monitor::new(pool.queue());
    let notifier = Arc::new(RecordingNotifier::default());

    assert!(!monitor.has_probe("default/a"));
    monitor.add_probe(
        config("default/a", 1, Duration::from_secs(3600)),
        notifier.clone(),
    );
    assert!(monitor.has_probe("default/a"));

    monitor.remove_probe("default/a");
    assert!(!monitor.has_probe("default/a"));

    // Removing an unknown probe is a no-op.
    monitor.remove_probe("default/a");

    monitor.shutdown().await;
    pool.shutdown(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_add_is_idempotent_upsert() {
    let pool = ProbeWorkerPool::spawn(1, 8, ProbePerformer::new().unwrap());
    let monitor = Monitor::new(pool.queue());
    let notifier = Arc::new(RecordingNotifier::default());

    monitor.add_probe(
        config("default/a", 1, Duration::from_secs(3600)),
        notifier.clone(),
    );
    monitor.add_probe(
        config("default/a", 2, Duration::from_secs(3600)),
        notifier.clone(),
    );
    assert!(monitor.has_probe("default/a"));

    let mut seen_port = 0;
    monitor.update_probe("default/a", |c| seen_port = c.port);
    assert_eq!(seen_port, 2, "add must upsert the existing entry");

    monitor.shutdown().await;
    pool.shutdown(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_update_mutates_config() {
    let pool = ProbeWorkerPool::spawn(1, 8, ProbePerformer::new().unwrap());
    let monitor = Monitor::new(pool.queue());

    monitor.add_probe(
        config("default/a", 1, Duration::from_secs(3600)),
        Arc::new(RecordingNotifier::default()),
    );
    monitor.update_probe("default/a", |c| c.port = 9999);

    let mut port = 0;
    monitor.update_probe("default/a", |c| port = c.port);
    assert_eq!(port, 9999);

    // Updating an unknown id is a no-op.
    monitor.update_probe("default/missing", |c| c.port = 1);

    monitor.shutdown().await;
    pool.shutdown(Duration::from_secs(5)).await;
}

// ------------------------------------------------------------------------
// Failure threshold (end to end through the pool)
// ------------------------------------------------------------------------

#[tokio::test]
async fn test_failure_threshold_flips_healthy_on_fourth_failure() {
    let pool = ProbeWorkerPool::spawn(2, 8, ProbePerformer::new().unwrap());
    let monitor = Monitor::new(pool.queue());
    let notifier = Arc::new(RecordingNotifier::default());

    // Nothing listens on the port: every check is a transport failure.
    let port = closed_port().await;
    monitor.add_probe(
        config("default/failing", port, Duration::from_millis(50)),
        notifier.clone(),
    );

    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    loop {
        if notifier.results().len() >= 5 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "probe results did not arrive in time"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    monitor.shutdown().await;
    pool.shutdown(Duration::from_secs(5)).await;

    let results = notifier.results();
    for (index, result) in results.iter().take(5).enumerate() {
        let failures = index as i32 + 1;
        assert_eq!(result.consecutive_failures, failures);
        assert!(result.reason.is_some());
        // Healthy until the fourth consecutive failure.
        assert_eq!(
            result.healthy,
            failures < 4,
            "check {failures} reported wrong health"
        );
    }
}

// ------------------------------------------------------------------------
// Serialization: at most one in-flight execution per probe
// ------------------------------------------------------------------------

#[tokio::test]
async fn test_probe_executions_are_serialized() {
    use axum::routing::get;
    use axum::Router;

    static IN_FLIGHT: AtomicUsize = AtomicUsize::new(0);
    static MAX_IN_FLIGHT: AtomicUsize = AtomicUsize::new(0);

    // A slow endpoint that records its own concurrency.
    let app = Router::new().route(
        "/",
        get(|| async {
            let now = IN_FLIGHT.fetch_add(1, Ordering::SeqCst) + 1;
            MAX_IN_FLIGHT.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(150)).await;
            IN_FLIGHT.fetch_sub(1, Ordering::SeqCst);
            "ok"
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let pool = ProbeWorkerPool::spawn(4, 16, ProbePerformer::new().unwrap());
    let monitor = Monitor::new(pool.queue());
    let notifier = Arc::new(RecordingNotifier::default());

    // Tick far faster than the endpoint responds; without serialization
    // the pool would overlap executions of this probe.
    monitor.add_probe(
        config("default/slow", addr.port(), Duration::from_millis(10)),
        notifier.clone(),
    );

    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    while notifier.results().len() < 4 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "probe results did not arrive in time"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    monitor.shutdown().await;
    pool.shutdown(Duration::from_secs(5)).await;

    assert_eq!(
        MAX_IN_FLIGHT.load(Ordering::SeqCst),
        1,
        "a probe must never have two executions in flight"
    );
}

// ------------------------------------------------------------------------
// Shutdown
// ------------------------------------------------------------------------

#[tokio::test]
async fn test_no_updates_after_shutdown() {
    let pool = ProbeWorkerPool::spawn(2, 8, ProbePerformer::new().unwrap());
    let monitor = Monitor::new(pool.queue());
    let notifier = Arc::new(RecordingNotifier::default());

    let port = closed_port().await;
    monitor.add_probe(
        config("default/failing", port, Duration::from_millis(50)),
        notifier.clone(),
    );

    // Let a few checks land.
    tokio::time::sleep(Duration::from_millis(300)).await;

    monitor.shutdown().await;
    let count_at_shutdown = notifier.results().len();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(
        notifier.results().len(),
        count_at_shutdown,
        "no probe update may be emitted after shutdown completes"
    );

    pool.shutdown(Duration::from_secs(5)).await;
}
