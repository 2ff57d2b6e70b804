// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for multi-cluster gateway DNS.
//!
//! This module defines all Kubernetes Custom Resource Definitions used by
//! dnsgate to publish DNS for multi-cluster gateways declaratively.
//!
//! # Resource Types
//!
//! ## Policy
//!
//! - [`DNSPolicy`] - Routing strategy and health checking attached to a gateway
//!
//! ## DNS
//!
//! - [`ManagedZone`] - An authoritative apex domain the controller may write into
//! - [`DNSRecord`] - The provider-neutral endpoint set for one listener
//!
//! ## Health
//!
//! - [`DNSHealthCheckProbe`] - A single HTTP(S) liveness probe against a published address
//!
//! # Example: Attaching a DNSPolicy
//!
//! ```yaml
//! apiVersion: dnsgate.firestoned.io/v1alpha1
//! kind: DNSPolicy
//! metadata:
//!   name: prod-web
//!   namespace: multi-cluster-gateways
//! spec:
//!   targetGateway: prod-web
//!   routingStrategy: loadbalanced
//!   loadBalancing:
//!     weighted:
//!       defaultWeight: 120
//!     geo:
//!       defaultGeo: IE
//!   healthCheck:
//!     endpoint: /healthz
//!     port: 443
//!     protocol: HTTPS
//!     failureThreshold: 4
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{DEFAULT_FAILURE_THRESHOLD, DEFAULT_WEIGHT};

/// Label selector to match Kubernetes resources.
///
/// A label selector is a label query over a set of labels. The result of
/// matchLabels and matchExpressions are `ANDed`. An empty label selector
/// matches everything.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Map of {key,value} pairs. All entries must be present with exact values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_labels: Option<BTreeMap<String, String>>,

    /// List of label selector requirements. All requirements must be satisfied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_expressions: Option<Vec<LabelSelectorRequirement>>,
}

/// A label selector requirement is a selector that contains values, a key,
/// and an operator that relates the key and values.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelectorRequirement {
    /// The label key that the selector applies to.
    pub key: String,

    /// Operator represents a key's relationship to a set of values.
    /// Valid operators are In, `NotIn`, Exists and `DoesNotExist`.
    pub operator: String,

    /// An array of string values. If the operator is In or `NotIn`,
    /// the values array must be non-empty. If the operator is Exists or
    /// `DoesNotExist`, the values array must be empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

/// Condition represents an observation of a resource's current state.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition. Common types include: Ready, Available, Degraded.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Reference to a Secret in the same namespace.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    /// Name of the secret.
    pub name: String,
}

// ============================================================================
// DNSPolicy
// ============================================================================

/// Routing strategy used to lay out the DNS record graph for a listener.
///
/// Stored as a free string in the CRD (matching the wire contract) and
/// parsed by [`DNSPolicySpec::routing_strategy`]; an unrecognized value
/// surfaces as [`crate::errors::DnsPolicyError::UnknownRoutingStrategy`]
/// at reconcile time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RoutingStrategy {
    /// Single tier: one A and/or CNAME endpoint carrying every cluster address.
    Simple,

    /// Multi-tier CNAME/A graph encoding geo routing and weighted balancing.
    #[default]
    LoadBalanced,
}

/// Wire value of [`RoutingStrategy::Simple`].
pub const SIMPLE_ROUTING_STRATEGY: &str = "simple";

/// Wire value of [`RoutingStrategy::LoadBalanced`].
pub const LOAD_BALANCED_ROUTING_STRATEGY: &str = "loadbalanced";

impl std::fmt::Display for RoutingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutingStrategy::Simple => write!(f, "{SIMPLE_ROUTING_STRATEGY}"),
            RoutingStrategy::LoadBalanced => write!(f, "{LOAD_BALANCED_ROUTING_STRATEGY}"),
        }
    }
}

/// A custom weight applied to clusters matched by a label selector.
///
/// Selectors are evaluated against the cluster's converted gateway labels
/// (`<prefix><cluster>_<attr>` becomes `<prefix><attr>`); the first rule
/// that matches wins.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomWeight {
    /// Label selector over the cluster's converted gateway labels.
    pub selector: LabelSelector,

    /// Weight value applied to matching clusters.
    #[schemars(range(min = 0))]
    pub weight: i32,
}

/// Weighted load-balancing dimension.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancingWeighted {
    /// Weight for clusters not matched by any custom rule.
    pub default_weight: i32,

    /// Ordered custom weight rules; first match wins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<Vec<CustomWeight>>,
}

/// Geo load-balancing dimension.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancingGeo {
    /// Geo code served to resolvers that match no geo rule.
    pub default_geo: String,
}

/// Load-balancing configuration for the `loadbalanced` routing strategy.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancingSpec {
    /// Weighted dimension; when absent all clusters share the default weight.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weighted: Option<LoadBalancingWeighted>,

    /// Geo dimension; when absent all clusters fall into one internal group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<LoadBalancingGeo>,
}

impl LoadBalancingSpec {
    /// Weight for clusters that no custom rule matches.
    #[must_use]
    pub fn default_weight(&self) -> i32 {
        self.weighted
            .as_ref()
            .map_or(DEFAULT_WEIGHT, |w| w.default_weight)
    }

    /// Ordered custom weight rules, empty when none are configured.
    #[must_use]
    pub fn custom_weights(&self) -> &[CustomWeight] {
        self.weighted
            .as_ref()
            .and_then(|w| w.custom.as_deref())
            .unwrap_or(&[])
    }
}

/// Health check configuration attached to a `DNSPolicy`.
///
/// One `DNSHealthCheckProbe` is materialized per (listener, address) pair of
/// the target gateway.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckSpec {
    /// Path probed on each address (e.g. `/healthz`).
    pub endpoint: String,

    /// Port to probe; defaults to the protocol's well-known port.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1, max = 65535))]
    pub port: Option<i32>,

    /// Protocol used for the check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<HealthProtocol>,

    /// Interval between checks as a duration string (e.g. `60s`, `5m`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    /// Consecutive failures before the probe reports unhealthy.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1))]
    pub failure_threshold: Option<i32>,

    /// Response codes counted as healthy. Defaults to 200 and 201.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_responses: Option<Vec<u16>>,

    /// Skip certificate verification for HTTPS checks.
    #[serde(default)]
    pub allow_insecure_certificates: bool,

    /// Secret whose data keys/values become additional request headers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_headers_ref: Option<SecretRef>,
}

/// `DNSPolicy` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DNSPolicyStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// `DNSPolicy` attaches DNS publication behavior to a multi-cluster gateway.
///
/// The policy selects a target gateway in its own namespace and describes how
/// the gateway's per-cluster addresses are turned into DNS records: the
/// routing strategy, the load-balancing dimensions (weights, geo) and an
/// optional health check applied to every published address.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "dnsgate.firestoned.io",
    version = "v1alpha1",
    kind = "DNSPolicy",
    namespaced,
    shortname = "dnspolicy",
    doc = "DNSPolicy describes how a multi-cluster gateway's addresses are published to DNS: routing strategy, load balancing and health checking.",
    printcolumn = r#"{"name":"Gateway","type":"string","jsonPath":".spec.targetGateway"}"#,
    printcolumn = r#"{"name":"Strategy","type":"string","jsonPath":".spec.routingStrategy"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#
)]
#[kube(status = "DNSPolicyStatus")]
#[serde(rename_all = "camelCase")]
pub struct DNSPolicySpec {
    /// Name of the gateway this policy applies to (same namespace).
    pub target_gateway: String,

    /// Routing strategy used for every listener of the target gateway:
    /// `simple` or `loadbalanced` (the default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_strategy: Option<String>,

    /// Load-balancing configuration for the `loadbalanced` strategy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancing: Option<LoadBalancingSpec>,

    /// Health check applied to each published address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheckSpec>,
}

impl DNSPolicySpec {
    /// Parse the routing strategy, defaulting to `loadbalanced`.
    ///
    /// # Errors
    ///
    /// Returns [`DnsPolicyError::UnknownRoutingStrategy`] for any other value.
    ///
    /// [`DnsPolicyError::UnknownRoutingStrategy`]: crate::errors::DnsPolicyError::UnknownRoutingStrategy
    pub fn routing_strategy(&self) -> Result<RoutingStrategy, crate::errors::DnsPolicyError> {
        match self.routing_strategy.as_deref() {
            None => Ok(RoutingStrategy::default()),
            Some(SIMPLE_ROUTING_STRATEGY) => Ok(RoutingStrategy::Simple),
            Some(LOAD_BALANCED_ROUTING_STRATEGY) => Ok(RoutingStrategy::LoadBalanced),
            Some(other) => Err(crate::errors::DnsPolicyError::UnknownRoutingStrategy {
                strategy: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// ManagedZone
// ============================================================================

/// `ManagedZone` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedZoneStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// `ManagedZone` registers an authoritative apex domain the controller may
/// create records under.
///
/// Zone selection for a hostname is by longest matching suffix, skipping an
/// exact apex match (apex records are never written).
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "dnsgate.firestoned.io",
    version = "v1alpha1",
    kind = "ManagedZone",
    namespaced,
    shortname = "mz",
    doc = "ManagedZone registers an authoritative apex domain that dnsgate may write DNS records into.",
    printcolumn = r#"{"name":"Domain","type":"string","jsonPath":".spec.domainName"}"#
)]
#[kube(status = "ManagedZoneStatus")]
#[serde(rename_all = "camelCase")]
pub struct ManagedZoneSpec {
    /// Apex domain name of the zone (e.g. `example.com`).
    pub domain_name: String,

    /// Provider-side identifier of the zone, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ============================================================================
// DNSRecord
// ============================================================================

/// DNS record types the endpoint graph is built from.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum RecordType {
    /// Address record; targets are IP literals.
    A,
    /// Canonical name record; targets are hostnames.
    CNAME,
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::CNAME => write!(f, "CNAME"),
        }
    }
}

/// A named provider-specific attribute attached to an endpoint.
///
/// The vocabulary is closed: `weight` (decimal integer string) and
/// `geo-code` (geo code or the literal `*` for the wildcard fallback).
/// Downstream provider plugins may attach additional entries (such as a
/// provider-issued health-check id) which the builder preserves.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpecificProperty {
    /// Attribute name.
    pub name: String,
    /// Attribute value.
    pub value: String,
}

/// A single DNS endpoint within a [`DNSRecord`].
///
/// Endpoint identity for reconciliation purposes is
/// `(dnsName, setIdentifier)`; see [`Endpoint::set_id`].
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Fully qualified DNS name of the endpoint.
    pub dns_name: String,

    /// Target values; IP literals for A records, hostnames for CNAMEs.
    pub targets: Vec<String>,

    /// Record type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_type: Option<RecordType>,

    /// Stable discriminator between sibling endpoints sharing a DNS name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub set_identifier: String,

    /// Record TTL in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_ttl: Option<u32>,

    /// Provider-specific attributes (`weight`, `geo-code`, ...).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provider_specific: Vec<ProviderSpecificProperty>,
}

impl Endpoint {
    /// Identity string used for sorting and carry-over matching.
    #[must_use]
    pub fn set_id(&self) -> String {
        format!("{}{}", self.dns_name, self.set_identifier)
    }

    /// Set a provider-specific attribute, replacing an existing entry with
    /// the same name. Other entries (e.g. a provider-issued health-check id)
    /// are left untouched.
    pub fn set_provider_specific(&mut self, name: &str, value: &str) {
        if let Some(existing) = self.provider_specific.iter_mut().find(|p| p.name == name) {
            existing.value = value.to_string();
        } else {
            self.provider_specific.push(ProviderSpecificProperty {
                name: name.to_string(),
                value: value.to_string(),
            });
        }
    }

    /// Look up a provider-specific attribute by name.
    #[must_use]
    pub fn get_provider_specific(&self, name: &str) -> Option<&str> {
        self.provider_specific
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

/// Reference to the `ManagedZone` that owns a record.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedZoneReference {
    /// Name of the managed zone (same namespace as the record).
    pub name: String,
}

/// `DNSRecord` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DNSRecordStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// `DNSRecord` is the provider-neutral endpoint set synthesized for one
/// gateway listener within one managed zone.
///
/// A downstream provider plugin translates the endpoints into vendor API
/// calls; dnsgate itself never speaks a DNS wire protocol.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "dnsgate.firestoned.io",
    version = "v1alpha1",
    kind = "DNSRecord",
    namespaced,
    shortname = "dnsrecord",
    doc = "DNSRecord holds the provider-neutral DNS endpoints synthesized for a single gateway listener.",
    printcolumn = r#"{"name":"Zone","type":"string","jsonPath":".spec.managedZoneRef.name"}"#
)]
#[kube(status = "DNSRecordStatus")]
#[serde(rename_all = "camelCase")]
pub struct DNSRecordSpec {
    /// The managed zone this record is written into.
    pub managed_zone_ref: ManagedZoneReference,

    /// Endpoints, sorted ascending by `dnsName + setIdentifier`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<Endpoint>,
}

// ============================================================================
// DNSHealthCheckProbe
// ============================================================================

/// Protocol for a health check request.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum HealthProtocol {
    /// Plain HTTP.
    #[default]
    HTTP,
    /// HTTP over TLS.
    HTTPS,
}

impl HealthProtocol {
    /// URL scheme for this protocol.
    #[must_use]
    pub fn scheme(self) -> &'static str {
        match self {
            HealthProtocol::HTTP => "http",
            HealthProtocol::HTTPS => "https",
        }
    }

    /// Well-known port used when the spec omits one.
    #[must_use]
    pub fn default_port(self) -> i32 {
        match self {
            HealthProtocol::HTTP => 80,
            HealthProtocol::HTTPS => 443,
        }
    }
}

/// `DNSHealthCheckProbe` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DNSHealthCheckProbeStatus {
    /// When the probe last completed a check (RFC3339).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<String>,

    /// Consecutive failed checks since the last success.
    #[serde(default)]
    pub consecutive_failures: i32,

    /// Whether the address currently counts as healthy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthy: Option<bool>,

    /// Failure reason for the most recent unhealthy observation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// `DNSHealthCheckProbe` declares a periodic HTTP(S) liveness check against
/// one published gateway address.
///
/// The probe engine drives each probe at its interval through a bounded
/// worker pool and writes observations back to the status subresource, where
/// the DNS policy reconciler picks them up to withhold unhealthy addresses.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "dnsgate.firestoned.io",
    version = "v1alpha1",
    kind = "DNSHealthCheckProbe",
    namespaced,
    shortname = "probe",
    doc = "DNSHealthCheckProbe declares a periodic HTTP(S) liveness check against a published gateway address.",
    printcolumn = r#"{"name":"Host","type":"string","jsonPath":".spec.host"}"#,
    printcolumn = r#"{"name":"Healthy","type":"boolean","jsonPath":".status.healthy"}"#,
    printcolumn = r#"{"name":"Last Checked","type":"string","jsonPath":".status.lastCheckedAt"}"#
)]
#[kube(status = "DNSHealthCheckProbeStatus")]
#[serde(rename_all = "camelCase")]
pub struct DNSHealthCheckProbeSpec {
    /// Hostname presented in the request (Host header / SNI).
    pub host: String,

    /// IP address probed instead of resolving `host`, when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Path of the check request.
    pub path: String,

    /// Port of the check request; defaults to the protocol's well-known port.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1, max = 65535))]
    pub port: Option<i32>,

    /// Protocol of the check request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<HealthProtocol>,

    /// Interval between checks as a duration string (e.g. `60s`, `5m`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    /// Consecutive failures before `status.healthy` flips to false.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1))]
    pub failure_threshold: Option<i32>,

    /// Response codes counted as healthy. Defaults to 200 and 201.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_responses: Option<Vec<u16>>,

    /// Skip certificate verification for HTTPS checks.
    #[serde(default)]
    pub allow_insecure_certificate: bool,

    /// Secret whose data keys/values become additional request headers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_headers_ref: Option<SecretRef>,
}

impl DNSHealthCheckProbeSpec {
    /// Effective protocol, defaulting to HTTP.
    #[must_use]
    pub fn protocol(&self) -> HealthProtocol {
        self.protocol.unwrap_or_default()
    }

    /// Effective port, defaulting by protocol.
    #[must_use]
    pub fn port(&self) -> i32 {
        self.port.unwrap_or_else(|| self.protocol().default_port())
    }

    /// Effective failure threshold.
    #[must_use]
    pub fn failure_threshold(&self) -> i32 {
        self.failure_threshold
            .unwrap_or(DEFAULT_FAILURE_THRESHOLD)
    }
}

/// An additional request header resolved from a secret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdditionalHeader {
    /// Header name (trimmed secret data key).
    pub name: String,
    /// Header value (secret data value).
    pub value: String,
}
