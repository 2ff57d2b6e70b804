// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `DNSHealthCheckProbe` reconciliation.
//!
//! Materializes declarative probe objects into live entries of the probe
//! registry. Deletion is finalizer-gated so a probe's driver is always
//! stopped before the object disappears. The additional-headers secret is
//! resolved on every pass; header problems are reflected in the probe
//! status rather than crashing the loop, and still surface as errors so the
//! event source requeues.

use anyhow::{Context as AnyhowContext, Result};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::constants::DNS_HEALTH_CHECK_PROBE_FINALIZER;
use crate::context::Context;
use crate::crd::{AdditionalHeader, DNSHealthCheckProbe};
use crate::errors::ProbeError;
use crate::health::{ProbeConfig, StatusUpdateNotifier};
use crate::reconcilers::finalizers::{ensure_finalizer, remove_finalizer};
use crate::status_reasons::REASON_SECRET_NOT_FOUND;

/// Reconcile one `DNSHealthCheckProbe` event.
///
/// # Errors
///
/// Returns an error when the registry entry could not be brought in line
/// with the spec; the controller requeues the object.
pub async fn reconcile_probe(probe: Arc<DNSHealthCheckProbe>, ctx: Arc<Context>) -> Result<Action> {
    let namespace = probe.namespace().unwrap_or_default();
    let name = probe.name_any();
    let id = crate::health::probe::probe_id(&probe);

    if probe.metadata.deletion_timestamp.is_some() {
        info!(probe = %id, "deleting probe");
        ctx.monitor.remove_probe(&id);
        remove_finalizer(
            &ctx.client,
            probe.as_ref(),
            DNS_HEALTH_CHECK_PROBE_FINALIZER,
        )
        .await?;
        return Ok(Action::await_change());
    }

    ensure_finalizer(
        &ctx.client,
        probe.as_ref(),
        DNS_HEALTH_CHECK_PROBE_FINALIZER,
    )
    .await?;

    let additional_headers = match get_additional_headers(&ctx.client, &probe).await {
        Ok(headers) => headers,
        Err(err) => {
            // Header problems are reflected on the probe before surfacing;
            // transient API errors just propagate.
            if let Some(probe_err) = err.downcast_ref::<ProbeError>() {
                let reason = probe_error_reason(probe_err);
                mark_unhealthy(&ctx.client, &namespace, &name, &reason).await?;
            }
            return Err(err);
        }
    };

    let config = ProbeConfig::from_probe(&probe, additional_headers);
    if ctx.monitor.has_probe(&id) {
        debug!(probe = %id, "updating registered probe");
        ctx.monitor.update_probe(&id, move |current| *current = config);
    } else {
        let notifier = Arc::new(StatusUpdateNotifier::new(
            ctx.client.clone(),
            &name,
            &namespace,
        ));
        ctx.monitor.add_probe(config, notifier);
    }

    Ok(Action::await_change())
}

/// Resolve the additional request headers from the referenced secret.
///
/// # Errors
///
/// - [`ProbeError::SecretMissing`] when the referenced secret does not exist
/// - [`ProbeError::InvalidHeader`] when a data key contains whitespace
/// - the underlying API error for any other failure
pub async fn get_additional_headers(
    client: &Client,
    probe: &DNSHealthCheckProbe,
) -> Result<Vec<AdditionalHeader>> {
    let Some(secret_ref) = &probe.spec.additional_headers_ref else {
        return Ok(Vec::new());
    };
    let namespace = probe.namespace().unwrap_or_default();

    let secrets: Api<Secret> = Api::namespaced(client.clone(), &namespace);
    let secret = secrets
        .get_opt(&secret_ref.name)
        .await
        .with_context(|| {
            format!(
                "unusual error retrieving additional headers secret {namespace}/{}",
                secret_ref.name
            )
        })?
        .ok_or_else(|| ProbeError::SecretMissing {
            name: secret_ref.name.clone(),
            namespace: namespace.clone(),
        })?;

    Ok(parse_additional_headers(secret.data.unwrap_or_default())?)
}

/// Turn secret data into an ordered header list, rejecting keys that carry
/// whitespace.
pub fn parse_additional_headers(
    data: BTreeMap<String, ByteString>,
) -> Result<Vec<AdditionalHeader>, ProbeError> {
    let mut headers = Vec::new();
    for (key, value) in data {
        let trimmed = key.trim();
        if trimmed.contains([' ', '\t']) {
            return Err(ProbeError::InvalidHeader { header: key });
        }
        headers.push(AdditionalHeader {
            name: trimmed.to_string(),
            value: String::from_utf8_lossy(&value.0).to_string(),
        });
    }
    Ok(headers)
}

/// The status reason recorded for a header resolution failure.
fn probe_error_reason(err: &ProbeError) -> String {
    match err {
        ProbeError::SecretMissing { .. } => REASON_SECRET_NOT_FOUND.to_string(),
        ProbeError::InvalidHeader { header } => format!("invalid header found: {header}"),
    }
}

/// Mark a probe unhealthy with a reason, resetting its failure count.
async fn mark_unhealthy(client: &Client, namespace: &str, name: &str, reason: &str) -> Result<()> {
    let api: Api<DNSHealthCheckProbe> = Api::namespaced(client.clone(), namespace);
    let status = json!({
        "status": {
            "healthy": false,
            "consecutiveFailures": 0,
            "reason": reason,
        }
    });
    api.patch_status(name, &PatchParams::default(), &Patch::Merge(&status))
        .await
        .context("failed to update probe status")?;
    Ok(())
}

#[cfg(test)]
#[path = "probes_tests.rs"]
mod probes_tests;
