// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the dnsgate operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for all dnsgate CRDs
pub const API_GROUP: &str = "dnsgate.firestoned.io";

/// API version for all dnsgate CRDs
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "dnsgate.firestoned.io/v1alpha1";

// ============================================================================
// Cross-reference Labels and Annotations
// ============================================================================

/// Label carrying the name of the gateway a DNSRecord or probe belongs to
pub const LABEL_GATEWAY_REFERENCE: &str = "dnsgate.firestoned.io/gateway";

/// Label carrying the namespace of the gateway a DNSRecord or probe belongs to
pub const LABEL_GATEWAY_NS_REFERENCE: &str = "dnsgate.firestoned.io/gateway-namespace";

/// Label carrying the listener name a DNSRecord was synthesized for
pub const LABEL_LISTENER_REFERENCE: &str = "dnsgate.firestoned.io/listener-name";

/// Back-reference label to the owning `DNSPolicy` (name)
pub const LABEL_POLICY_REFERENCE: &str = "dnsgate.firestoned.io/dnspolicy";

/// Back-reference label to the owning `DNSPolicy` (namespace)
pub const LABEL_POLICY_NS_REFERENCE: &str = "dnsgate.firestoned.io/dnspolicy-namespace";

/// Annotation linking a probe to the DNSRecord it observes (name)
pub const ANNOTATION_DNSRECORD_NAME: &str = "dnsgate.firestoned.io/dnsrecord-name";

/// Annotation linking a probe to the DNSRecord it observes (namespace)
pub const ANNOTATION_DNSRECORD_NAMESPACE: &str = "dnsgate.firestoned.io/dnsrecord-namespace";

// ============================================================================
// Cluster-scoped Gateway Label Attributes
// ============================================================================

/// Prefix for cluster-scoped gateway labels (`<prefix><cluster>_<attribute>`)
pub const CLUSTER_LABEL_PREFIX: &str = "dnsgate.firestoned.io/";

/// Reserved cluster attribute carrying the geo code used for geo load balancing
pub const GEO_CODE_ATTRIBUTE: &str = "lb-attribute-geo-code";

// ============================================================================
// Gateway Address Types
// ============================================================================

/// Address type for `<cluster>/<ip>` multi-cluster address values
pub const MULTI_CLUSTER_IP_ADDRESS_TYPE: &str = "dnsgate.firestoned.io/MultiClusterIPAddress";

/// Address type for `<cluster>/<hostname>` multi-cluster address values
pub const MULTI_CLUSTER_HOSTNAME_ADDRESS_TYPE: &str =
    "dnsgate.firestoned.io/MultiClusterHostnameAddress";

// ============================================================================
// DNS Endpoint Constants
// ============================================================================

/// TTL for leaf A records and weighted CNAMEs (1 minute)
pub const DEFAULT_TTL: u32 = 60;

/// TTL for the geo-tier and root CNAMEs of a load-balanced graph (5 minutes)
pub const DEFAULT_CNAME_TTL: u32 = 300;

/// Provider-specific attribute carrying a weighted-routing weight
pub const PROVIDER_SPECIFIC_WEIGHT: &str = "weight";

/// Provider-specific attribute carrying a geolocation code
pub const PROVIDER_SPECIFIC_GEO_CODE: &str = "geo-code";

/// Weight applied to a cluster when the policy sets no default weight
pub const DEFAULT_WEIGHT: i32 = 120;

// ============================================================================
// Health Probe Constants
// ============================================================================

/// Number of worker tasks draining the probe execution queue
pub const PROBE_WORKERS: usize = 8;

/// Capacity of the bounded probe execution queue.
///
/// A full queue blocks probe drivers at their tick rather than dropping
/// executions.
pub const PROBE_QUEUE_CAPACITY: usize = 128;

/// Default probe interval when the spec omits one (1 minute)
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 60;

/// Upper bound on a single probe HTTP request.
///
/// The effective request timeout is min(interval, this cap).
pub const MAX_PROBE_TIMEOUT_SECS: u64 = 30;

/// Response codes treated as healthy when the spec omits `expectedResponses`
pub const DEFAULT_EXPECTED_RESPONSES: [u16; 2] = [200, 201];

/// Default consecutive-failure threshold before a probe reports unhealthy
pub const DEFAULT_FAILURE_THRESHOLD: i32 = 3;

/// Maximum time to wait for in-flight probe executions during shutdown
pub const PROBE_SHUTDOWN_DEADLINE_SECS: u64 = 10;

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer placed on `DNSPolicy` resources
pub const DNS_POLICY_FINALIZER: &str = "dnsgate.firestoned.io/dns-policy";

/// Finalizer placed on `DNSHealthCheckProbe` resources
pub const DNS_HEALTH_CHECK_PROBE_FINALIZER: &str = "dnsgate.firestoned.io/dns-health-check-probe";

// ============================================================================
// Controller Error Handling Constants
// ============================================================================

/// Requeue duration for controller errors (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Periodic resync interval for DNSPolicy reconciliation (5 minutes).
///
/// Gateway status addresses and probe health change without touching the
/// policy object itself, so the policy is re-evaluated on a timer.
pub const POLICY_RESYNC_DURATION_SECS: u64 = 300;

// ============================================================================
// Leader Election Constants
// ============================================================================

/// Default leader election lease duration (15 seconds)
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 15;

/// Default leader election retry period (2 seconds)
pub const DEFAULT_LEASE_RETRY_PERIOD_SECS: u64 = 2;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
