// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for probe object materialization.

use super::*;
use crate::constants::MULTI_CLUSTER_IP_ADDRESS_TYPE;
use crate::crd::{DNSPolicy, DNSPolicySpec, HealthProtocol, SecretRef};
use crate::gateway::{GatewaySpec, GatewayStatus, GatewayStatusAddress};

const TEST_NAMESPACE: &str = "multi-cluster-gateways";

fn health_check() -> HealthCheckSpec {
    HealthCheckSpec {
        endpoint: "/healthz".to_string(),
        port: Some(8080),
        protocol: Some(HealthProtocol::HTTP),
        interval: Some("1s".to_string()),
        failure_threshold: Some(4),
        expected_responses: Some(vec![200, 201]),
        allow_insecure_certificates: false,
        additional_headers_ref: Some(SecretRef {
            name: "probe-headers".to_string(),
        }),
    }
}

fn policy(health: Option<HealthCheckSpec>) -> DNSPolicy {
    let mut policy = DNSPolicy::new(
        "test-dns-policy",
        DNSPolicySpec {
            target_gateway: "test-gateway".to_string(),
            routing_strategy: None,
            load_balancing: None,
            health_check: health,
        },
    );
    policy.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    policy
}

fn gateway(listeners: Vec<crate::gateway::Listener>) -> Gateway {
    let mut gateway = Gateway::new(
        "test-gateway",
        GatewaySpec {
            gateway_class_name: "dnsgate".to_string(),
            listeners,
        },
    );
    gateway.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    gateway.status = Some(GatewayStatus {
        addresses: vec![
            GatewayStatusAddress {
                r#type: Some(MULTI_CLUSTER_IP_ADDRESS_TYPE.to_string()),
                value: "test-cluster-1/172.0.0.1".to_string(),
            },
            GatewayStatusAddress {
                r#type: Some(MULTI_CLUSTER_IP_ADDRESS_TYPE.to_string()),
                value: "test-cluster-2/172.0.0.2".to_string(),
            },
        ],
    });
    gateway
}

fn listener(name: &str, hostname: &str) -> crate::gateway::Listener {
    crate::gateway::Listener {
        name: name.to_string(),
        hostname: Some(hostname.to_string()),
        port: 80,
        protocol: "HTTP".to_string(),
    }
}

#[test]
fn test_one_probe_per_listener_and_address() {
    let policy = policy(Some(health_check()));
    let gateway = gateway(vec![listener("api", "api.example.com")]);
    let target = MultiClusterGatewayTarget::new(gateway.clone(), None);

    let probes = expected_probes(&policy, &gateway, &target);
    assert_eq!(probes.len(), 2);

    let names: Vec<String> = probes.iter().map(kube::ResourceExt::name_any).collect();
    assert!(names.contains(&"test-cluster-1-test-gateway-api-172.0.0.1".to_string()));
    assert!(names.contains(&"test-cluster-2-test-gateway-api-172.0.0.2".to_string()));
}

#[test]
fn test_two_listeners_double_the_probes() {
    let policy = policy(Some(health_check()));
    let gateway = gateway(vec![
        listener("api", "api.example.com"),
        listener("web", "web.example.com"),
    ]);
    let target = MultiClusterGatewayTarget::new(gateway.clone(), None);

    assert_eq!(expected_probes(&policy, &gateway, &target).len(), 4);
}

#[test]
fn test_wildcard_listeners_get_no_probes() {
    let policy = policy(Some(health_check()));
    let gateway = gateway(vec![
        listener("api", "api.example.com"),
        listener("wildcard", "*.example.com"),
    ]);
    let target = MultiClusterGatewayTarget::new(gateway.clone(), None);

    // Only the concrete listener is probeable.
    assert_eq!(expected_probes(&policy, &gateway, &target).len(), 2);
}

#[test]
fn test_no_health_check_no_probes() {
    let policy = policy(None);
    let gateway = gateway(vec![listener("api", "api.example.com")]);
    let target = MultiClusterGatewayTarget::new(gateway.clone(), None);

    assert!(expected_probes(&policy, &gateway, &target).is_empty());
}

#[test]
fn test_probe_spec_carries_health_check_fields() {
    let policy = policy(Some(health_check()));
    let gateway = gateway(vec![listener("api", "api.example.com")]);
    let target = MultiClusterGatewayTarget::new(gateway.clone(), None);

    let probes = expected_probes(&policy, &gateway, &target);
    let probe = probes
        .iter()
        .find(|p| p.spec.address.as_deref() == Some("172.0.0.1"))
        .unwrap();

    assert_eq!(probe.spec.host, "api.example.com");
    assert_eq!(probe.spec.path, "/healthz");
    assert_eq!(probe.spec.port, Some(8080));
    assert_eq!(probe.spec.protocol, Some(HealthProtocol::HTTP));
    assert_eq!(probe.spec.interval.as_deref(), Some("1s"));
    assert_eq!(probe.spec.failure_threshold, Some(4));
    assert_eq!(probe.spec.expected_responses, Some(vec![200, 201]));
    assert_eq!(
        probe.spec.additional_headers_ref.as_ref().map(|r| r.name.as_str()),
        Some("probe-headers")
    );
}

#[test]
fn test_probe_metadata_links_back() {
    let policy = policy(Some(health_check()));
    let gateway = gateway(vec![listener("api", "api.example.com")]);
    let target = MultiClusterGatewayTarget::new(gateway.clone(), None);

    let probes = expected_probes(&policy, &gateway, &target);
    let probe = &probes[0];

    let labels = probe.metadata.labels.as_ref().unwrap();
    assert_eq!(
        labels.get("dnsgate.firestoned.io/dnspolicy"),
        Some(&"test-dns-policy".to_string())
    );
    assert_eq!(
        labels.get("dnsgate.firestoned.io/gateway"),
        Some(&"test-gateway".to_string())
    );
    assert_eq!(
        labels.get("dnsgate.firestoned.io/listener-name"),
        Some(&"api".to_string())
    );

    let annotations = probe.metadata.annotations.as_ref().unwrap();
    assert_eq!(
        annotations.get("dnsgate.firestoned.io/dnsrecord-name"),
        Some(&"test-gateway-api".to_string())
    );
    assert_eq!(
        annotations.get("dnsgate.firestoned.io/dnsrecord-namespace"),
        Some(&TEST_NAMESPACE.to_string())
    );
}
