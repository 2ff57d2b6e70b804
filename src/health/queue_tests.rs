// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the probe execution queue and worker pool.

use super::*;
use crate::crd::HealthProtocol;
use crate::health::probe::ProbeConfig;
use std::time::Duration as StdDuration;
use tokio::sync::oneshot;

async fn closed_port_config() -> ProbeConfig {
    // Bind then drop to find a port with nothing listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    ProbeConfig {
        id: "default/queued-probe".to_string(),
        host: addr.ip().to_string(),
        ip_address: None,
        path: "/".to_string(),
        port: i32::from(addr.port()),
        protocol: HealthProtocol::HTTP,
        interval: StdDuration::from_secs(1),
        additional_headers: Vec::new(),
        expected_responses: vec![200, 201],
        failure_threshold: 3,
        allow_insecure_certificate: false,
    }
}

#[tokio::test]
async fn test_worker_executes_submission() {
    let pool = ProbeWorkerPool::spawn(2, 8, ProbePerformer::new().unwrap());
    let queue = pool.queue();

    let (done_tx, done_rx) = oneshot::channel();
    queue
        .submit(ProbeExecution {
            config: closed_port_config().await,
            done: done_tx,
        })
        .await
        .unwrap();

    let outcome = tokio::time::timeout(StdDuration::from_secs(10), done_rx)
        .await
        .expect("worker must report an outcome")
        .unwrap();
    assert!(matches!(outcome, CheckOutcome::Unhealthy(_)));

    pool.shutdown(StdDuration::from_secs(5)).await;
}

#[tokio::test]
async fn test_full_queue_applies_backpressure() {
    // No workers: nothing drains the queue.
    let pool = ProbeWorkerPool::spawn(0, 1, ProbePerformer::new().unwrap());
    let queue = pool.queue();
    let config = closed_port_config().await;

    let (first_tx, _first_rx) = oneshot::channel();
    queue
        .submit(ProbeExecution {
            config: config.clone(),
            done: first_tx,
        })
        .await
        .unwrap();

    // The queue is at capacity; the next submission must block, not drop.
    let (second_tx, _second_rx) = oneshot::channel();
    let blocked = tokio::time::timeout(
        StdDuration::from_millis(200),
        queue.submit(ProbeExecution {
            config,
            done: second_tx,
        }),
    )
    .await;
    assert!(blocked.is_err(), "submission into a full queue must block");

    pool.shutdown(StdDuration::from_secs(1)).await;
}

#[tokio::test]
async fn test_submission_fails_after_shutdown() {
    let pool = ProbeWorkerPool::spawn(1, 4, ProbePerformer::new().unwrap());
    let queue = pool.queue();
    pool.shutdown(StdDuration::from_secs(5)).await;

    let (done_tx, _done_rx) = oneshot::channel();
    let result = queue
        .submit(ProbeExecution {
            config: closed_port_config().await,
            done: done_tx,
        })
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_dropped_receiver_discards_outcome() {
    let pool = ProbeWorkerPool::spawn(1, 4, ProbePerformer::new().unwrap());
    let queue = pool.queue();

    // Submit and immediately drop the completion receiver, as a removed
    // probe's driver does; the worker must carry on regardless.
    let (done_tx, done_rx) = oneshot::channel();
    drop(done_rx);
    queue
        .submit(ProbeExecution {
            config: closed_port_config().await,
            done: done_tx,
        })
        .await
        .unwrap();

    // A subsequent execution still completes.
    let (done_tx, done_rx) = oneshot::channel();
    queue
        .submit(ProbeExecution {
            config: closed_port_config().await,
            done: done_tx,
        })
        .await
        .unwrap();
    let outcome = tokio::time::timeout(StdDuration::from_secs(10), done_rx)
        .await
        .expect("worker must survive a dropped receiver")
        .unwrap();
    assert!(matches!(outcome, CheckOutcome::Unhealthy(_)));

    pool.shutdown(StdDuration::from_secs(5)).await;
}
