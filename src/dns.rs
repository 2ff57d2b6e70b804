// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Multi-cluster gateway target model.
//!
//! A [`MultiClusterGatewayTarget`] pairs a gateway with the per-cluster
//! addresses it publishes and the load-balancing configuration of the
//! attached policy. The endpoint builder consumes this model: clusters are
//! grouped by geo code, each cluster resolves to a routing weight, and
//! stable short codes derived from gateway and cluster identity name the
//! intermediate tiers of the load-balanced record graph.

use kube::ResourceExt;
use sha2::{Digest, Sha224};
use std::collections::BTreeMap;

use crate::crd::{
    DNSHealthCheckProbe, LabelSelector, LabelSelectorRequirement, LoadBalancingSpec,
};
use crate::gateway::{cluster_geo_label, cluster_labels, ClusterGateway, Gateway, Listener};

/// The geo code served to resolvers that match no geo rule.
pub const WILDCARD_GEO: &str = "*";

/// Internal geo code grouping all clusters when the policy has no geo
/// dimension. Never published as a provider geo attribute.
const DEFAULT_GEO_CODE: &str = "default";

/// A geolocation code grouping clusters in the load-balanced graph.
///
/// Either a provider geo code (`IE`, `us-east-1`, ...) or the internal
/// `default` group.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GeoCode(String);

impl GeoCode {
    /// The internal `default` group.
    #[must_use]
    pub fn default_code() -> Self {
        GeoCode(DEFAULT_GEO_CODE.to_string())
    }

    /// Whether this is the internal `default` group.
    #[must_use]
    pub fn is_default_code(&self) -> bool {
        self.0 == DEFAULT_GEO_CODE
    }

    /// The code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GeoCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GeoCode {
    fn from(value: &str) -> Self {
        GeoCode(value.to_string())
    }
}

impl From<String> for GeoCode {
    fn from(value: String) -> Self {
        GeoCode(value)
    }
}

/// Hash a string into a compact base36 short code.
///
/// Used to derive stable DNS labels from gateway and cluster identity:
/// the first 8 bytes of a SHA-224 digest rendered base36 and truncated to
/// 6 characters.
#[must_use]
pub fn to_base36_hash(value: &str) -> String {
    let digest = Sha224::digest(value.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let encoded = to_base36(u64::from_be_bytes(prefix));
    encoded.chars().take(6).collect()
}

fn to_base36(mut value: u64) -> String {
    const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// One cluster's contribution to a gateway, with its resolved geo and weight.
#[derive(Clone, Debug)]
pub struct ClusterGatewayTarget {
    /// The cluster and its published addresses.
    pub cluster_gateway: ClusterGateway,
    /// Resolved geo code for this cluster.
    pub geo: GeoCode,
    /// Resolved routing weight for this cluster.
    pub weight: i32,
}

impl ClusterGatewayTarget {
    /// Cluster identity.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.cluster_gateway.cluster_name
    }

    /// Stable base36 short code of the cluster identity, used as the DNS
    /// label of the cluster's A record tier.
    #[must_use]
    pub fn short_code(&self) -> String {
        to_base36_hash(self.name())
    }
}

/// A gateway with its per-cluster targets and policy load balancing.
#[derive(Clone, Debug)]
pub struct MultiClusterGatewayTarget {
    /// The target gateway.
    pub gateway: Gateway,
    /// Per-cluster targets with resolved geo and weight.
    pub cluster_gateway_targets: Vec<ClusterGatewayTarget>,
    /// Load-balancing spec of the attached policy, when configured.
    pub load_balancing: Option<LoadBalancingSpec>,
}

impl MultiClusterGatewayTarget {
    /// Build the target model from a gateway and the policy's load-balancing
    /// spec, resolving each cluster's geo code and weight.
    #[must_use]
    pub fn new(gateway: Gateway, load_balancing: Option<LoadBalancingSpec>) -> Self {
        let gateway_labels = gateway.labels().clone();
        let default_geo = default_geo_of(load_balancing.as_ref());

        let cluster_gateway_targets = gateway
            .cluster_gateways()
            .into_iter()
            .map(|cluster_gateway| {
                let geo = resolve_geo(
                    &default_geo,
                    cluster_geo_label(&gateway_labels, &cluster_gateway.cluster_name),
                );
                let weight = resolve_weight(
                    &cluster_labels(&gateway_labels, &cluster_gateway.cluster_name),
                    load_balancing.as_ref(),
                );
                ClusterGatewayTarget {
                    cluster_gateway,
                    geo,
                    weight,
                }
            })
            .collect();

        MultiClusterGatewayTarget {
            gateway,
            cluster_gateway_targets,
            load_balancing,
        }
    }

    /// `<gateway>-<namespace>`, the identity the lb short code hashes.
    #[must_use]
    pub fn name(&self) -> String {
        format!(
            "{}-{}",
            self.gateway.name_any(),
            self.gateway.namespace().unwrap_or_default()
        )
    }

    /// Stable base36 short code of the gateway identity (the `lb-<hash>`
    /// label of the load-balanced sub-tree).
    #[must_use]
    pub fn short_code(&self) -> String {
        to_base36_hash(&self.name())
    }

    /// The policy's designated fallback geo, or the internal default group.
    #[must_use]
    pub fn default_geo(&self) -> GeoCode {
        default_geo_of(self.load_balancing.as_ref())
    }

    /// Group targets by geo code, deterministically ordered by code.
    #[must_use]
    pub fn group_targets_by_geo(&self) -> BTreeMap<GeoCode, Vec<&ClusterGatewayTarget>> {
        let mut groups: BTreeMap<GeoCode, Vec<&ClusterGatewayTarget>> = BTreeMap::new();
        for target in &self.cluster_gateway_targets {
            groups.entry(target.geo.clone()).or_default().push(target);
        }
        groups
    }

    /// Drop addresses whose probe currently reports unhealthy.
    ///
    /// Safety floor: a geo group that would lose every address keeps all of
    /// them, so an all-failing group still resolves.
    pub fn remove_unhealthy_addresses(
        &mut self,
        probes: &[DNSHealthCheckProbe],
        listener: &Listener,
    ) {
        let gateway_name = self.gateway.name_any();

        // Geo groups observed over target indexes; BTreeMap keeps the walk
        // deterministic.
        let mut groups: BTreeMap<GeoCode, Vec<usize>> = BTreeMap::new();
        for (idx, target) in self.cluster_gateway_targets.iter().enumerate() {
            groups.entry(target.geo.clone()).or_default().push(idx);
        }

        for indexes in groups.values() {
            let mut total = 0usize;
            let mut unhealthy = 0usize;
            for &idx in indexes {
                let target = &self.cluster_gateway_targets[idx];
                for address in &target.cluster_gateway.addresses {
                    total += 1;
                    if address_is_unhealthy(
                        probes,
                        target.name(),
                        &gateway_name,
                        &listener.name,
                        &address.value,
                    ) {
                        unhealthy += 1;
                    }
                }
            }

            // All addresses failing: publish the group anyway.
            if total == 0 || unhealthy == total {
                continue;
            }

            for &idx in indexes {
                let target = &mut self.cluster_gateway_targets[idx];
                let cluster = target.cluster_gateway.cluster_name.clone();
                target.cluster_gateway.addresses.retain(|address| {
                    !address_is_unhealthy(
                        probes,
                        &cluster,
                        &gateway_name,
                        &listener.name,
                        &address.value,
                    )
                });
            }
        }
    }
}

/// Deterministic name of the probe observing one published address.
#[must_use]
pub fn probe_name(cluster: &str, gateway: &str, listener: &str, address: &str) -> String {
    format!("{cluster}-{gateway}-{listener}-{address}")
}

fn address_is_unhealthy(
    probes: &[DNSHealthCheckProbe],
    cluster: &str,
    gateway: &str,
    listener: &str,
    address: &str,
) -> bool {
    let name = probe_name(cluster, gateway, listener, address);
    probes
        .iter()
        .find(|probe| probe.name_any() == name)
        .and_then(|probe| probe.status.as_ref())
        .is_some_and(|status| status.healthy == Some(false))
}

fn default_geo_of(load_balancing: Option<&LoadBalancingSpec>) -> GeoCode {
    load_balancing
        .and_then(|lb| lb.geo.as_ref())
        .map_or_else(GeoCode::default_code, |geo| {
            GeoCode::from(geo.default_geo.as_str())
        })
}

/// Resolve a cluster's geo code.
///
/// With no geo dimension on the policy every cluster lands in the internal
/// default group; otherwise the cluster label wins over the policy default.
fn resolve_geo(default_geo: &GeoCode, label: Option<String>) -> GeoCode {
    if default_geo.is_default_code() {
        return default_geo.clone();
    }
    label.map_or_else(|| default_geo.clone(), GeoCode::from)
}

/// Resolve a cluster's weight: first matching custom rule wins, then the
/// policy default.
fn resolve_weight(
    cluster_labels: &BTreeMap<String, String>,
    load_balancing: Option<&LoadBalancingSpec>,
) -> i32 {
    let Some(lb) = load_balancing else {
        return crate::constants::DEFAULT_WEIGHT;
    };
    lb.custom_weights()
        .iter()
        .find(|rule| selector_matches(&rule.selector, cluster_labels))
        .map_or_else(|| lb.default_weight(), |rule| rule.weight)
}

/// Whether a custom-weight selector accepts a cluster's converted labels.
///
/// Kubernetes selector semantics: every `matchLabels` pair must be present
/// verbatim and every `matchExpressions` requirement must hold. An empty
/// selector accepts every cluster.
fn selector_matches(selector: &LabelSelector, cluster_labels: &BTreeMap<String, String>) -> bool {
    let labels_hold = selector
        .match_labels
        .iter()
        .flatten()
        .all(|(key, value)| cluster_labels.get(key) == Some(value));

    let expressions_hold = selector
        .match_expressions
        .iter()
        .flatten()
        .all(|requirement| requirement_holds(requirement, cluster_labels));

    labels_hold && expressions_hold
}

/// Evaluate a single selector requirement against the cluster labels.
fn requirement_holds(
    requirement: &LabelSelectorRequirement,
    cluster_labels: &BTreeMap<String, String>,
) -> bool {
    let current = cluster_labels.get(&requirement.key);
    let wanted = requirement.values.as_deref().unwrap_or_default();

    match requirement.operator.as_str() {
        "In" => current.is_some_and(|value| wanted.contains(value)),
        "NotIn" => current.is_none_or(|value| !wanted.contains(value)),
        "Exists" => current.is_some(),
        "DoesNotExist" => current.is_none(),
        other => {
            // Fail closed on operators this controller does not know.
            tracing::warn!("unknown label selector operator '{other}' in custom weight rule");
            false
        }
    }
}

#[cfg(test)]
#[path = "dns_tests.rs"]
mod dns_tests;
