// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for gateway address and label parsing.

use super::*;
use crate::constants::{MULTI_CLUSTER_HOSTNAME_ADDRESS_TYPE, MULTI_CLUSTER_IP_ADDRESS_TYPE};

fn gateway_with_addresses(addresses: Vec<GatewayStatusAddress>) -> Gateway {
    let mut gateway = Gateway::new(
        "prod-web",
        GatewaySpec {
            gateway_class_name: "dnsgate".to_string(),
            listeners: vec![],
        },
    );
    gateway.metadata.namespace = Some("multi-cluster-gateways".to_string());
    gateway.status = Some(GatewayStatus { addresses });
    gateway
}

fn address(address_type: &str, value: &str) -> GatewayStatusAddress {
    GatewayStatusAddress {
        r#type: Some(address_type.to_string()),
        value: value.to_string(),
    }
}

#[test]
fn test_multi_cluster_addresses_group_by_cluster() {
    let gateway = gateway_with_addresses(vec![
        address(MULTI_CLUSTER_IP_ADDRESS_TYPE, "cluster-1/172.0.0.1"),
        address(MULTI_CLUSTER_IP_ADDRESS_TYPE, "cluster-2/172.0.0.2"),
        address(MULTI_CLUSTER_IP_ADDRESS_TYPE, "cluster-1/172.0.0.3"),
    ]);

    let clusters = gateway.cluster_gateways();
    assert_eq!(clusters.len(), 2);

    assert_eq!(clusters[0].cluster_name, "cluster-1");
    assert_eq!(
        clusters[0]
            .addresses
            .iter()
            .map(|a| a.value.as_str())
            .collect::<Vec<_>>(),
        vec!["172.0.0.1", "172.0.0.3"]
    );

    assert_eq!(clusters[1].cluster_name, "cluster-2");
    assert_eq!(clusters[1].addresses[0].value, "172.0.0.2");
    assert_eq!(clusters[1].addresses[0].address_type, AddressType::Ip);
}

#[test]
fn test_multi_cluster_hostname_addresses() {
    let gateway = gateway_with_addresses(vec![address(
        MULTI_CLUSTER_HOSTNAME_ADDRESS_TYPE,
        "cluster-1/lb.provider.example",
    )]);

    let clusters = gateway.cluster_gateways();
    assert_eq!(clusters.len(), 1);
    assert_eq!(
        clusters[0].addresses[0].address_type,
        AddressType::Hostname
    );
    assert_eq!(clusters[0].addresses[0].value, "lb.provider.example");
}

#[test]
fn test_single_cluster_addresses_use_gateway_name() {
    let gateway = gateway_with_addresses(vec![
        address("IPAddress", "172.0.0.1"),
        address("Hostname", "lb.provider.example"),
    ]);

    let clusters = gateway.cluster_gateways();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].cluster_name, "prod-web");
    assert_eq!(clusters[0].addresses.len(), 2);
}

#[test]
fn test_untyped_address_defaults_to_ip() {
    let mut gateway = gateway_with_addresses(vec![]);
    gateway.status = Some(GatewayStatus {
        addresses: vec![GatewayStatusAddress {
            r#type: None,
            value: "172.0.0.1".to_string(),
        }],
    });

    let clusters = gateway.cluster_gateways();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].addresses[0].address_type, AddressType::Ip);
}

#[test]
fn test_unknown_address_type_is_skipped() {
    let gateway = gateway_with_addresses(vec![
        address("NamedAddress", "something"),
        address(MULTI_CLUSTER_IP_ADDRESS_TYPE, "cluster-1/172.0.0.1"),
    ]);

    let clusters = gateway.cluster_gateways();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].cluster_name, "cluster-1");
}

#[test]
fn test_malformed_multi_cluster_value_is_skipped() {
    let gateway = gateway_with_addresses(vec![address(
        MULTI_CLUSTER_IP_ADDRESS_TYPE,
        "no-cluster-separator",
    )]);
    assert!(gateway.cluster_gateways().is_empty());
}

#[test]
fn test_no_status_yields_no_clusters() {
    let mut gateway = gateway_with_addresses(vec![]);
    gateway.status = None;
    assert!(gateway.cluster_gateways().is_empty());
}

#[test]
fn test_cluster_labels_conversion() {
    let labels: std::collections::BTreeMap<String, String> = [
        (
            "dnsgate.firestoned.io/cluster-1_lb-attribute-geo-code",
            "IE",
        ),
        ("dnsgate.firestoned.io/cluster-1_my-attr", "FOO"),
        ("dnsgate.firestoned.io/cluster-2_my-attr", "BAR"),
        ("app.kubernetes.io/name", "prod-web"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let converted = cluster_labels(&labels, "cluster-1");
    assert_eq!(converted.len(), 2);
    assert_eq!(
        converted.get("dnsgate.firestoned.io/lb-attribute-geo-code"),
        Some(&"IE".to_string())
    );
    assert_eq!(
        converted.get("dnsgate.firestoned.io/my-attr"),
        Some(&"FOO".to_string())
    );
}

#[test]
fn test_cluster_geo_label_lookup() {
    let labels: std::collections::BTreeMap<String, String> = [(
        "dnsgate.firestoned.io/cluster-1_lb-attribute-geo-code".to_string(),
        "ES".to_string(),
    )]
    .into_iter()
    .collect();

    assert_eq!(cluster_geo_label(&labels, "cluster-1"), Some("ES".to_string()));
    assert_eq!(cluster_geo_label(&labels, "cluster-2"), None);
}

#[test]
fn test_wildcard_host_detection() {
    assert!(is_wildcard_host("*.example.com"));
    assert!(!is_wildcard_host("api.example.com"));
}
