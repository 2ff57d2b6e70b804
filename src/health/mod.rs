// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Health probe engine.
//!
//! The engine turns registered probe configurations into periodic HTTP(S)
//! checks and feeds the observations back to the declarative store:
//!
//! - [`monitor::Monitor`] - process-wide registry of live probes
//! - [`queue`] - bounded FIFO of pending executions drained by a worker pool
//! - [`probe`] - per-probe driver, HTTP performer and failure accounting
//! - [`notifier`] - status write-back to the `DNSHealthCheckProbe` object
//!
//! Each registered probe owns a driver task that submits one execution per
//! interval into the queue and applies the outcome to its failure state.
//! Executions of one probe are serialized; executions of distinct probes
//! share the pool with no ordering guarantee. Shutdown stops the drivers
//! first, so no status update is emitted after [`monitor::Monitor::shutdown`]
//! returns.

pub mod monitor;
pub mod notifier;
pub mod probe;
pub mod queue;

pub use monitor::Monitor;
pub use notifier::{ProbeNotifier, StatusUpdateNotifier};
pub use probe::{CheckOutcome, ProbeConfig, ProbePerformer, ProbeResult, ProbeState};
pub use queue::{ProbeQueue, ProbeWorkerPool};
