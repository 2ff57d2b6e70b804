// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Process-wide registry of live health probes.
//!
//! The [`Monitor`] maps probe identity (`namespace/name` of the declarative
//! object) to the running driver task and its shared configuration. It is
//! owned by the top-level assembly and passed explicitly to the reconcilers
//! that feed it.
//!
//! A single mutex with short critical sections guards the map; the
//! [`Monitor::update_probe`] mutation callback runs under the probe's
//! config lock and must not block.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::health::notifier::ProbeNotifier;
use crate::health::probe::{run_driver, ProbeConfig, ProbeId};
use crate::health::queue::ProbeQueue;

struct ProbeEntry {
    config: Arc<Mutex<ProbeConfig>>,
    stop: watch::Sender<bool>,
    driver: JoinHandle<()>,
}

/// Registry of live probes with their driver tasks.
pub struct Monitor {
    queue: ProbeQueue,
    probes: Mutex<HashMap<ProbeId, ProbeEntry>>,
}

impl Monitor {
    /// Create an empty registry submitting executions into `queue`.
    #[must_use]
    pub fn new(queue: ProbeQueue) -> Self {
        Monitor {
            queue,
            probes: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a probe with this identity is registered.
    #[must_use]
    pub fn has_probe(&self, id: &str) -> bool {
        self.lock_probes().contains_key(id)
    }

    /// Register a probe and start its driver.
    ///
    /// Idempotent on identity: an existing probe is replaced, its old
    /// driver stopped before the new one starts.
    pub fn add_probe(&self, config: ProbeConfig, notifier: Arc<dyn ProbeNotifier>) {
        let id = config.id.clone();
        let shared = Arc::new(Mutex::new(config));
        let (stop_tx, stop_rx) = watch::channel(false);
        let driver = tokio::spawn(run_driver(
            Arc::clone(&shared),
            stop_rx,
            self.queue.clone(),
            notifier,
        ));

        let replaced = self.lock_probes().insert(
            id.clone(),
            ProbeEntry {
                config: shared,
                stop: stop_tx,
                driver,
            },
        );
        if let Some(old) = replaced {
            let _ = old.stop.send(true);
            old.driver.abort();
            debug!(probe = %id, "replaced existing probe");
        }
        info!(probe = %id, "probe registered");
    }

    /// Mutate a registered probe's configuration in place.
    ///
    /// The callback runs under the config lock and must be side-effect
    /// light; the driver picks the change up at its next tick. Unknown ids
    /// are ignored.
    pub fn update_probe<F>(&self, id: &str, mutate: F)
    where
        F: FnOnce(&mut ProbeConfig),
    {
        let probes = self.lock_probes();
        if let Some(entry) = probes.get(id) {
            let mut config = entry
                .config
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            mutate(&mut config);
            debug!(probe = %id, "probe updated");
        }
    }

    /// Remove a probe, stopping its driver before the next tick.
    ///
    /// An in-flight execution completes in the pool with its outcome
    /// discarded. Unknown ids are a no-op.
    pub fn remove_probe(&self, id: &str) {
        let removed = self.lock_probes().remove(id);
        if let Some(entry) = removed {
            let _ = entry.stop.send(true);
            crate::metrics::forget_probe(id);
            info!(probe = %id, "probe removed");
        }
    }

    /// Stop every driver and wait for them to finish.
    ///
    /// After this returns no further probe status update is emitted.
    pub async fn shutdown(&self) {
        let entries: Vec<ProbeEntry> = {
            let mut probes = self.lock_probes();
            probes.drain().map(|(_, entry)| entry).collect()
        };
        for entry in &entries {
            let _ = entry.stop.send(true);
        }
        for entry in entries {
            let _ = entry.driver.await;
        }
        info!("probe monitor shut down");
    }

    fn lock_probes(&self) -> std::sync::MutexGuard<'_, HashMap<ProbeId, ProbeEntry>> {
        self.probes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod monitor_tests;
