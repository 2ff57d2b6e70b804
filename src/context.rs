// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for all controllers.
//!
//! Every reconciler receives an `Arc<Context>` carrying the Kubernetes
//! client and the probe registry. The registry is process-wide state owned
//! by the top-level assembly and passed down explicitly, never reached as
//! an ambient global.

use std::sync::Arc;

use kube::Client;

use crate::health::Monitor;

/// Shared context passed to all controllers.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client for API operations
    pub client: Client,

    /// Probe registry feeding the health engine
    pub monitor: Arc<Monitor>,
}

impl Context {
    /// Assemble the context.
    #[must_use]
    pub fn new(client: Client, monitor: Arc<Monitor>) -> Self {
        Context { client, monitor }
    }
}
