// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `DNSPolicy` reconciliation.
//!
//! The policy reconciler drives the whole DNS pipeline for one gateway:
//!
//! 1. Resolve the target gateway and its per-cluster addresses
//! 2. Materialize (or remove) the probe objects implied by the health check
//! 3. Per listener: pick the managed zone, withhold unhealthy addresses,
//!    synthesize the endpoint graph and upsert the `DNSRecord`
//! 4. Garbage collect records for listeners that no longer exist
//! 5. Publish the outcome on the policy status
//!
//! A listener without a covering managed zone is skipped with a warning and
//! reported on the policy status; every other failure requeues the policy.

pub mod dns_helper;
pub mod health_checks;

use anyhow::Result;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::{Resource, ResourceExt};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::constants::{
    DNS_POLICY_FINALIZER, LABEL_GATEWAY_NS_REFERENCE, LABEL_GATEWAY_REFERENCE,
    LABEL_LISTENER_REFERENCE, LABEL_POLICY_NS_REFERENCE, LABEL_POLICY_REFERENCE,
    POLICY_RESYNC_DURATION_SECS,
};
use crate::context::Context;
use crate::crd::{
    DNSPolicy, DNSRecord, DNSRecordSpec, ManagedZone, ManagedZoneReference, RoutingStrategy,
};
use crate::dns::MultiClusterGatewayTarget;
use crate::errors::DnsPolicyError;
use crate::gateway::{Gateway, Listener};
use crate::reconcilers::finalizers::{ensure_finalizer, remove_finalizer};
use crate::reconcilers::status::{create_condition, upsert_condition};
use crate::status_reasons::{REASON_NO_MANAGED_ZONE, REASON_READY, REASON_TARGET_NOT_FOUND};

/// Name of the `DNSRecord` synthesized for one gateway listener.
#[must_use]
pub fn dns_record_name(gateway_name: &str, listener_name: &str) -> String {
    format!("{gateway_name}-{listener_name}")
}

/// Labels linking an owned object back to its policy and gateway.
#[must_use]
pub fn common_record_labels(
    policy: &DNSPolicy,
    gateway_name: &str,
    gateway_namespace: &str,
) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_POLICY_REFERENCE.to_string(), policy.name_any());
    labels.insert(
        LABEL_POLICY_NS_REFERENCE.to_string(),
        policy.namespace().unwrap_or_default(),
    );
    labels.insert(
        LABEL_GATEWAY_REFERENCE.to_string(),
        gateway_name.to_string(),
    );
    labels.insert(
        LABEL_GATEWAY_NS_REFERENCE.to_string(),
        gateway_namespace.to_string(),
    );
    labels
}

/// Reconcile one `DNSPolicy` event.
///
/// # Errors
///
/// Returns an error when the records or probes could not be brought in
/// line with the policy; the controller requeues the object.
pub async fn reconcile_dnspolicy(policy: Arc<DNSPolicy>, ctx: Arc<Context>) -> Result<Action> {
    let namespace = policy.namespace().unwrap_or_default();
    let name = policy.name_any();

    if policy.metadata.deletion_timestamp.is_some() {
        info!(policy = %name, "deleting dns policy");
        cleanup_policy(&ctx, &policy).await?;
        remove_finalizer(&ctx.client, policy.as_ref(), DNS_POLICY_FINALIZER).await?;
        return Ok(Action::await_change());
    }

    ensure_finalizer(&ctx.client, policy.as_ref(), DNS_POLICY_FINALIZER).await?;

    let strategy = match policy.spec.routing_strategy() {
        Ok(strategy) => strategy,
        Err(err) => {
            update_policy_status(&ctx, &policy, "False", err.status_reason(), &err.to_string())
                .await?;
            return Err(err.into());
        }
    };

    let gateways: Api<Gateway> = Api::namespaced(ctx.client.clone(), &namespace);
    let Some(gateway) = gateways.get_opt(&policy.spec.target_gateway).await? else {
        warn!(
            policy = %name,
            gateway = %policy.spec.target_gateway,
            "target gateway not found"
        );
        update_policy_status(
            &ctx,
            &policy,
            "False",
            REASON_TARGET_NOT_FOUND,
            &format!("gateway '{}' not found", policy.spec.target_gateway),
        )
        .await?;
        return Ok(Action::requeue(Duration::from_secs(
            POLICY_RESYNC_DURATION_SECS,
        )));
    };

    let target =
        MultiClusterGatewayTarget::new(gateway.clone(), policy.spec.load_balancing.clone());
    if target.cluster_gateway_targets.is_empty() {
        let err = DnsPolicyError::NoAddresses {
            gateway: policy.spec.target_gateway.clone(),
        };
        update_policy_status(&ctx, &policy, "False", err.status_reason(), &err.to_string())
            .await?;
        return Ok(Action::requeue(Duration::from_secs(
            POLICY_RESYNC_DURATION_SECS,
        )));
    }

    // Probe objects first so health feedback below observes a current set.
    if policy.spec.health_check.is_some() {
        health_checks::reconcile_health_checks(&ctx.client, &policy, &gateway, &target).await?;
    } else {
        health_checks::remove_health_checks(&ctx.client, &policy).await?;
    }
    let probes = health_checks::list_policy_probes(&ctx.client, &policy).await?;

    let zones: Api<ManagedZone> = Api::namespaced(ctx.client.clone(), &namespace);
    let zone_catalog = zones.list(&ListParams::default()).await?.items;

    let mut skipped_hosts: Vec<String> = Vec::new();
    for listener in &gateway.spec.listeners {
        let Some(host) = listener.hostname.clone() else {
            continue;
        };

        let zone = match dns_helper::find_matching_managed_zone(&host, &host, &zone_catalog) {
            Ok((zone, _subdomain)) => zone,
            Err(DnsPolicyError::NoManagedZoneForHost { host }) => {
                warn!(
                    policy = %name,
                    listener = %listener.name,
                    host = %host,
                    "no managed zone for listener host, skipping"
                );
                skipped_hosts.push(host);
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        // Health feedback mutates the address set, so each listener works
        // on its own copy of the target.
        let mut listener_target = target.clone();
        if policy.spec.health_check.is_some() {
            listener_target.remove_unhealthy_addresses(&probes, listener);
        }

        let record = get_or_create_record(&ctx, &policy, &gateway, listener, zone).await?;
        set_endpoints(&ctx, &listener_target, &record, &host, strategy).await?;
    }

    remove_records_for_deleted_listeners(&ctx, &gateway).await?;

    if skipped_hosts.is_empty() {
        update_policy_status(&ctx, &policy, "True", REASON_READY, "all listeners published")
            .await?;
    } else {
        update_policy_status(
            &ctx,
            &policy,
            "False",
            REASON_NO_MANAGED_ZONE,
            &format!("no managed zone for: {}", skipped_hosts.join(", ")),
        )
        .await?;
    }

    Ok(Action::requeue(Duration::from_secs(
        POLICY_RESYNC_DURATION_SECS,
    )))
}

/// Fetch the listener's record, creating it on first synthesis.
///
/// The record carries the policy/gateway back-reference labels plus the
/// listener reference, and is controller-referenced to its managed zone so
/// zone deletion cascades.
async fn get_or_create_record(
    ctx: &Context,
    policy: &DNSPolicy,
    gateway: &Gateway,
    listener: &Listener,
    zone: &ManagedZone,
) -> Result<DNSRecord> {
    let namespace = policy.namespace().unwrap_or_default();
    let api: Api<DNSRecord> = Api::namespaced(ctx.client.clone(), &namespace);
    let gateway_name = gateway.name_any();
    let record_name = dns_record_name(&gateway_name, &listener.name);

    if let Some(existing) = api.get_opt(&record_name).await? {
        return Ok(existing);
    }

    info!(record = %record_name, listener = %listener.name, "creating dns record for listener");

    let mut record = DNSRecord::new(
        &record_name,
        DNSRecordSpec {
            managed_zone_ref: ManagedZoneReference {
                name: zone.name_any(),
            },
            endpoints: Vec::new(),
        },
    );
    record.metadata.namespace = Some(namespace.clone());

    let mut labels = common_record_labels(policy, &gateway_name, &namespace);
    labels.insert(LABEL_LISTENER_REFERENCE.to_string(), listener.name.clone());
    record.metadata.labels = Some(labels);

    if let Some(owner_ref) = zone.controller_owner_ref(&()) {
        record.metadata.owner_references = Some(vec![owner_ref]);
    }

    match api.create(&PostParams::default(), &record).await {
        Ok(created) => Ok(created),
        // Lost a create race; the record is there now.
        Err(kube::Error::Api(response)) if response.code == 409 => {
            Ok(api.get(&record_name).await?)
        }
        Err(err) => Err(err.into()),
    }
}

/// Synthesize the endpoint graph and store it when it changed.
///
/// An empty synthesis result (no usable addresses) leaves the stored
/// record untouched.
async fn set_endpoints(
    ctx: &Context,
    target: &MultiClusterGatewayTarget,
    record: &DNSRecord,
    listener_host: &str,
    strategy: RoutingStrategy,
) -> Result<()> {
    let current = dns_helper::current_endpoints_map(record);
    let endpoints = dns_helper::build_endpoints(target, listener_host, strategy, &current);

    if endpoints.is_empty() {
        debug!(record = %record.name_any(), "no usable addresses, leaving record untouched");
        return Ok(());
    }
    if endpoints == record.spec.endpoints {
        return Ok(());
    }

    let namespace = record.namespace().unwrap_or_default();
    let api: Api<DNSRecord> = Api::namespaced(ctx.client.clone(), &namespace);
    let patch = json!({ "spec": { "endpoints": endpoints } });
    api.patch(
        &record.name_any(),
        &PatchParams::default(),
        &Patch::Merge(&patch),
    )
    .await?;
    info!(record = %record.name_any(), "dns record endpoints updated");
    Ok(())
}

/// Delete records whose listener no longer exists on the gateway.
async fn remove_records_for_deleted_listeners(ctx: &Context, gateway: &Gateway) -> Result<()> {
    let namespace = gateway.namespace().unwrap_or_default();
    let api: Api<DNSRecord> = Api::namespaced(ctx.client.clone(), &namespace);
    let selector = format!("{LABEL_GATEWAY_REFERENCE}={}", gateway.name_any());
    let records = api.list(&ListParams::default().labels(&selector)).await?;

    for record in records {
        let listener_name = record
            .labels()
            .get(LABEL_LISTENER_REFERENCE)
            .cloned()
            .unwrap_or_default();
        let listener_exists = gateway
            .spec
            .listeners
            .iter()
            .any(|listener| listener.name == listener_name);
        if !listener_exists {
            info!(record = %record.name_any(), "removing dns record for deleted listener");
            match api.delete(&record.name_any(), &DeleteParams::default()).await {
                Ok(_) => {}
                Err(kube::Error::Api(response)) if response.code == 404 => {}
                Err(err) => return Err(err.into()),
            }
        }
    }
    Ok(())
}

/// Delete every record and probe the policy owns.
async fn cleanup_policy(ctx: &Context, policy: &DNSPolicy) -> Result<()> {
    let namespace = policy.namespace().unwrap_or_default();
    let api: Api<DNSRecord> = Api::namespaced(ctx.client.clone(), &namespace);
    let selector = format!(
        "{LABEL_POLICY_REFERENCE}={},{LABEL_POLICY_NS_REFERENCE}={namespace}",
        policy.name_any()
    );
    let records = api.list(&ListParams::default().labels(&selector)).await?;
    for record in records {
        match api.delete(&record.name_any(), &DeleteParams::default()).await {
            Ok(_) => {}
            Err(kube::Error::Api(response)) if response.code == 404 => {}
            Err(err) => return Err(err.into()),
        }
    }

    health_checks::remove_health_checks(&ctx.client, policy).await
}

/// Publish the reconciliation outcome on the policy's Ready condition.
async fn update_policy_status(
    ctx: &Context,
    policy: &DNSPolicy,
    status: &str,
    reason: &str,
    message: &str,
) -> Result<()> {
    let namespace = policy.namespace().unwrap_or_default();
    let api: Api<DNSPolicy> = Api::namespaced(ctx.client.clone(), &namespace);

    let mut conditions = policy
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();
    upsert_condition(
        &mut conditions,
        create_condition("Ready", status, reason, message),
    );

    let patch = json!({
        "status": {
            "conditions": conditions,
            "observedGeneration": policy.metadata.generation,
        }
    });
    match api
        .patch_status(
            &policy.name_any(),
            &PatchParams::default(),
            &Patch::Merge(&patch),
        )
        .await
    {
        Ok(_) => Ok(()),
        // Policy deleted mid-reconcile; nothing to report on.
        Err(kube::Error::Api(response)) if response.code == 404 => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
