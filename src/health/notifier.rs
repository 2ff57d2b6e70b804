// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Probe status write-back.
//!
//! Each driver forwards completed observations through a [`ProbeNotifier`];
//! the production implementation patches the `DNSHealthCheckProbe` status
//! subresource so observers (including the DNS policy reconciler) can react.

use anyhow::Result;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use serde_json::json;

use crate::crd::DNSHealthCheckProbe;
use crate::health::probe::ProbeResult;

/// Sink for completed probe observations.
#[async_trait::async_trait]
pub trait ProbeNotifier: Send + Sync {
    /// Publish one observation.
    ///
    /// # Errors
    ///
    /// Returns an error when the observation could not be published; the
    /// driver logs and continues.
    async fn notify(&self, result: ProbeResult) -> Result<()>;
}

/// Notifier that patches the probe object's status subresource.
pub struct StatusUpdateNotifier {
    client: Client,
    name: String,
    namespace: String,
}

impl StatusUpdateNotifier {
    /// Notifier for the probe object `namespace/name`.
    #[must_use]
    pub fn new(client: Client, name: &str, namespace: &str) -> Self {
        StatusUpdateNotifier {
            client,
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl ProbeNotifier for StatusUpdateNotifier {
    async fn notify(&self, result: ProbeResult) -> Result<()> {
        let api: Api<DNSHealthCheckProbe> =
            Api::namespaced(self.client.clone(), &self.namespace);

        let status = json!({
            "status": {
                "lastCheckedAt": result.last_checked_at.to_rfc3339(),
                "consecutiveFailures": result.consecutive_failures,
                "healthy": result.healthy,
                "reason": result.reason,
            }
        });

        match api
            .patch_status(&self.name, &PatchParams::default(), &Patch::Merge(&status))
            .await
        {
            Ok(_) => Ok(()),
            // The probe object may be deleted while a result is in flight.
            Err(kube::Error::Api(response)) if response.code == 404 => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
