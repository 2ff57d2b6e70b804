// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for record naming and cross-reference labels.

use super::*;
use crate::crd::DNSPolicySpec;

fn test_policy() -> DNSPolicy {
    let mut policy = DNSPolicy::new(
        "prod-web-policy",
        DNSPolicySpec {
            target_gateway: "prod-web".to_string(),
            routing_strategy: None,
            load_balancing: None,
            health_check: None,
        },
    );
    policy.metadata.namespace = Some("multi-cluster-gateways".to_string());
    policy
}

#[test]
fn test_dns_record_name() {
    assert_eq!(dns_record_name("prod-web", "api"), "prod-web-api");
}

#[test]
fn test_common_record_labels() {
    let labels = common_record_labels(&test_policy(), "prod-web", "multi-cluster-gateways");

    assert_eq!(
        labels.get("dnsgate.firestoned.io/dnspolicy"),
        Some(&"prod-web-policy".to_string())
    );
    assert_eq!(
        labels.get("dnsgate.firestoned.io/dnspolicy-namespace"),
        Some(&"multi-cluster-gateways".to_string())
    );
    assert_eq!(
        labels.get("dnsgate.firestoned.io/gateway"),
        Some(&"prod-web".to_string())
    );
    assert_eq!(
        labels.get("dnsgate.firestoned.io/gateway-namespace"),
        Some(&"multi-cluster-gateways".to_string())
    );
}

#[test]
fn test_routing_strategy_parsing() {
    let mut policy = test_policy();
    assert_eq!(
        policy.spec.routing_strategy().unwrap(),
        RoutingStrategy::LoadBalanced
    );

    policy.spec.routing_strategy = Some("simple".to_string());
    assert_eq!(
        policy.spec.routing_strategy().unwrap(),
        RoutingStrategy::Simple
    );

    policy.spec.routing_strategy = Some("loadbalanced".to_string());
    assert_eq!(
        policy.spec.routing_strategy().unwrap(),
        RoutingStrategy::LoadBalanced
    );

    policy.spec.routing_strategy = Some("round-robin".to_string());
    assert!(matches!(
        policy.spec.routing_strategy(),
        Err(DnsPolicyError::UnknownRoutingStrategy { strategy }) if strategy == "round-robin"
    ));
}
