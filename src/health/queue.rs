// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Bounded execution queue and worker pool for probe checks.
//!
//! Probe drivers submit [`ProbeExecution`]s into a bounded FIFO; a fixed
//! set of worker tasks drains it and performs the HTTP checks. A full queue
//! exerts backpressure on the drivers (submission awaits), it never drops
//! an execution.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::health::probe::{CheckOutcome, ProbeConfig, ProbePerformer};

/// One pending probe check.
pub struct ProbeExecution {
    /// Snapshot of the probe configuration at submission time.
    pub config: ProbeConfig,
    /// Completion channel back to the submitting driver. Dropped receivers
    /// (removed probes, stopped drivers) simply discard the outcome.
    pub done: oneshot::Sender<CheckOutcome>,
}

/// Submission handle onto the execution queue.
#[derive(Clone)]
pub struct ProbeQueue {
    tx: mpsc::Sender<ProbeExecution>,
}

impl ProbeQueue {
    /// Submit an execution, awaiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns an error once the pool has shut down.
    pub async fn submit(&self, execution: ProbeExecution) -> anyhow::Result<()> {
        self.tx
            .send(execution)
            .await
            .map_err(|_| anyhow::anyhow!("probe worker pool is shut down"))
    }
}

/// Fixed-size worker pool draining the execution queue.
pub struct ProbeWorkerPool {
    tx: mpsc::Sender<ProbeExecution>,
    // Keeps the channel open while workers share it through the mutex.
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<ProbeExecution>>>,
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl ProbeWorkerPool {
    /// Spawn `workers` tasks sharing a queue of the given capacity.
    #[must_use]
    pub fn spawn(workers: usize, capacity: usize, performer: ProbePerformer) -> Self {
        let (tx, rx) = mpsc::channel::<ProbeExecution>(capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let performer = Arc::new(performer);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handles = (0..workers)
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    Arc::clone(&rx),
                    Arc::clone(&performer),
                    shutdown_rx.clone(),
                ))
            })
            .collect();

        ProbeWorkerPool {
            tx,
            rx,
            shutdown_tx,
            workers: handles,
        }
    }

    /// A submission handle for probe drivers.
    #[must_use]
    pub fn queue(&self) -> ProbeQueue {
        ProbeQueue {
            tx: self.tx.clone(),
        }
    }

    /// Stop the workers, draining in-flight executions up to the deadline.
    ///
    /// Executions still running past the deadline are abandoned; their
    /// outcomes are discarded, never persisted. Probe drivers must already
    /// be stopped (see `Monitor::shutdown`) so that nothing observes the
    /// abandoned results.
    pub async fn shutdown(self, deadline: Duration) {
        let _ = self.shutdown_tx.send(true);
        drop(self.tx);
        drop(self.rx);

        for handle in self.workers {
            match tokio::time::timeout(deadline, handle).await {
                Ok(_) => {}
                Err(_) => warn!("probe worker did not finish within shutdown deadline, abandoning"),
            }
        }
        debug!("probe worker pool shut down");
    }
}

/// Worker: take the next execution, perform it, report the outcome.
async fn worker_loop(
    worker: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<ProbeExecution>>>,
    performer: Arc<ProbePerformer>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    debug!(worker, "probe worker started");
    loop {
        let execution = tokio::select! {
            _ = shutdown_rx.changed() => break,
            next = async { rx.lock().await.recv().await } => match next {
                Some(execution) => execution,
                // Channel closed and drained.
                None => break,
            },
        };

        let outcome = performer.perform(&execution.config).await;
        // The driver may have been stopped meanwhile; a dropped receiver
        // discards the outcome.
        let _ = execution.done.send(outcome);
    }
    debug!(worker, "probe worker stopped");
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod queue_tests;
