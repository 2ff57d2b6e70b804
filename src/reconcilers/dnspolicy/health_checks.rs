// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Probe object materialization for DNS policies.
//!
//! A policy carrying a `healthCheck` gets one `DNSHealthCheckProbe` per
//! (listener, address) pair of its target gateway. Wildcard listeners are
//! skipped; a wildcard hostname is not probeable. Probes whose listener or
//! address disappeared are garbage collected, and dropping the
//! `healthCheck` from the policy removes them all.

use anyhow::Result;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::constants::{
    ANNOTATION_DNSRECORD_NAME, ANNOTATION_DNSRECORD_NAMESPACE, LABEL_LISTENER_REFERENCE,
};
use crate::crd::{DNSHealthCheckProbe, DNSHealthCheckProbeSpec, DNSPolicy, HealthCheckSpec};
use crate::dns::{probe_name, MultiClusterGatewayTarget};
use crate::gateway::{is_wildcard_host, Gateway};
use crate::reconcilers::dnspolicy::{common_record_labels, dns_record_name};

/// Bring the set of probe objects in line with the policy's health check.
///
/// # Errors
///
/// Returns an error when listing, creating, updating or deleting probe
/// objects fails.
pub async fn reconcile_health_checks(
    client: &Client,
    policy: &DNSPolicy,
    gateway: &Gateway,
    target: &MultiClusterGatewayTarget,
) -> Result<()> {
    let namespace = policy.namespace().unwrap_or_default();
    let api: Api<DNSHealthCheckProbe> = Api::namespaced(client.clone(), &namespace);

    let expected = expected_probes(policy, gateway, target);

    // Remove probes for listeners and addresses that no longer exist.
    let owned = list_policy_probes(client, policy).await?;
    for probe in &owned {
        let name = probe.name_any();
        if !expected.iter().any(|p| p.name_any() == name) {
            info!(probe = %name, "removing probe for vanished listener or address");
            match api.delete(&name, &DeleteParams::default()).await {
                Ok(_) => {}
                Err(kube::Error::Api(response)) if response.code == 404 => {}
                Err(err) => return Err(err.into()),
            }
        }
    }

    for probe in expected {
        let name = probe.name_any();
        match api.get_opt(&name).await? {
            Some(current) => {
                if current.spec != probe.spec {
                    debug!(probe = %name, "updating probe spec");
                    let patch = json!({ "spec": probe.spec });
                    api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
                        .await?;
                }
            }
            None => {
                info!(probe = %name, "creating probe");
                match api.create(&PostParams::default(), &probe).await {
                    Ok(_) => {}
                    Err(kube::Error::Api(response)) if response.code == 409 => {}
                    Err(err) => return Err(err.into()),
                }
            }
        }
    }

    Ok(())
}

/// Delete every probe owned by the policy.
///
/// Used when the policy drops its health check and on policy deletion.
///
/// # Errors
///
/// Returns an error when listing or deleting probe objects fails.
pub async fn remove_health_checks(client: &Client, policy: &DNSPolicy) -> Result<()> {
    let namespace = policy.namespace().unwrap_or_default();
    let api: Api<DNSHealthCheckProbe> = Api::namespaced(client.clone(), &namespace);

    for probe in list_policy_probes(client, policy).await? {
        let name = probe.name_any();
        info!(probe = %name, "removing probe");
        match api.delete(&name, &DeleteParams::default()).await {
            Ok(_) => {}
            Err(kube::Error::Api(response)) if response.code == 404 => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

/// List the probe objects carrying the policy's back-reference labels.
///
/// # Errors
///
/// Returns an error when the list call fails.
pub async fn list_policy_probes(
    client: &Client,
    policy: &DNSPolicy,
) -> Result<Vec<DNSHealthCheckProbe>> {
    let namespace = policy.namespace().unwrap_or_default();
    let api: Api<DNSHealthCheckProbe> = Api::namespaced(client.clone(), &namespace);
    let selector = selector_string(&common_record_labels(
        policy,
        &policy.spec.target_gateway,
        &namespace,
    ));
    let probes = api.list(&ListParams::default().labels(&selector)).await?;
    Ok(probes.items)
}

/// The probe objects a policy's health check implies for a gateway.
#[must_use]
pub fn expected_probes(
    policy: &DNSPolicy,
    gateway: &Gateway,
    target: &MultiClusterGatewayTarget,
) -> Vec<DNSHealthCheckProbe> {
    let Some(health_check) = &policy.spec.health_check else {
        return Vec::new();
    };

    let namespace = policy.namespace().unwrap_or_default();
    let gateway_name = gateway.name_any();
    let mut probes = Vec::new();

    for listener in &gateway.spec.listeners {
        let Some(host) = listener.hostname.as_deref() else {
            continue;
        };
        if is_wildcard_host(host) {
            continue;
        }

        for cluster_target in &target.cluster_gateway_targets {
            for address in &cluster_target.cluster_gateway.addresses {
                let name = probe_name(
                    cluster_target.name(),
                    &gateway_name,
                    &listener.name,
                    &address.value,
                );
                let mut probe = DNSHealthCheckProbe::new(
                    &name,
                    probe_spec(health_check, host, &address.value),
                );
                probe.metadata.namespace = Some(namespace.clone());

                let mut labels = common_record_labels(policy, &gateway_name, &namespace);
                labels.insert(
                    LABEL_LISTENER_REFERENCE.to_string(),
                    listener.name.clone(),
                );
                probe.metadata.labels = Some(labels);

                let mut annotations = BTreeMap::new();
                annotations.insert(
                    ANNOTATION_DNSRECORD_NAME.to_string(),
                    dns_record_name(&gateway_name, &listener.name),
                );
                annotations.insert(
                    ANNOTATION_DNSRECORD_NAMESPACE.to_string(),
                    namespace.clone(),
                );
                probe.metadata.annotations = Some(annotations);

                probes.push(probe);
            }
        }
    }

    probes
}

/// Derive one probe spec from the policy health check.
fn probe_spec(
    health_check: &HealthCheckSpec,
    host: &str,
    address: &str,
) -> DNSHealthCheckProbeSpec {
    DNSHealthCheckProbeSpec {
        host: host.to_string(),
        address: Some(address.to_string()),
        path: health_check.endpoint.clone(),
        port: health_check.port,
        protocol: health_check.protocol,
        interval: health_check.interval.clone(),
        failure_threshold: health_check.failure_threshold,
        expected_responses: health_check.expected_responses.clone(),
        allow_insecure_certificate: health_check.allow_insecure_certificates,
        additional_headers_ref: health_check.additional_headers_ref.clone(),
    }
}

/// Render a label map as a list-params selector string.
fn selector_string(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
#[path = "health_checks_tests.rs"]
mod health_checks_tests;
