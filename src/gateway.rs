// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Gateway input contract.
//!
//! dnsgate consumes `Gateway` objects of the Gateway API
//! (`gateway.networking.k8s.io/v1`) but only needs a slice of the full
//! surface: listener names and hostnames from the spec, and addresses from
//! the status. The partial types here deserialize exactly that slice;
//! unknown fields are ignored.
//!
//! # Multi-cluster addresses
//!
//! A gateway placed on several clusters publishes one status address per
//! cluster, encoded as `<cluster>/<value>` with a custom address type
//! (`dnsgate.firestoned.io/MultiClusterIPAddress` or
//! `.../MultiClusterHostnameAddress`). Plain `IPAddress`/`Hostname` values
//! are accepted too and attributed to a synthetic cluster named after the
//! gateway, so a single-cluster gateway behaves like a one-cluster
//! placement.
//!
//! # Cluster-scoped labels
//!
//! Per-cluster overrides ride on the gateway as labels of the form
//! `<prefix><cluster>_<attribute>=<value>`. [`cluster_labels`] converts
//! them into the per-cluster view (`<prefix><attribute>=<value>`) that
//! custom-weight selectors and the geo lookup evaluate against.

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{
    CLUSTER_LABEL_PREFIX, GEO_CODE_ATTRIBUTE, MULTI_CLUSTER_HOSTNAME_ADDRESS_TYPE,
    MULTI_CLUSTER_IP_ADDRESS_TYPE,
};

/// A single listener on a gateway.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Listener {
    /// Listener name, unique within the gateway.
    pub name: String,

    /// Hostname served by this listener; may be a wildcard (`*.domain`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Listener port.
    pub port: i32,

    /// Listener protocol (HTTP, HTTPS, ...).
    pub protocol: String,
}

/// An address published in the gateway status.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatusAddress {
    /// Address type; multi-cluster values use the dnsgate custom types.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,

    /// Address value, `<cluster>/<value>` for multi-cluster types.
    pub value: String,
}

/// `Gateway` status — only the addresses are consumed.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<GatewayStatusAddress>,
}

/// Partial Gateway API `Gateway` resource.
///
/// Defined locally rather than pulled from a Gateway API binding because
/// dnsgate only reads listeners and status addresses.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1",
    kind = "Gateway",
    namespaced
)]
#[kube(status = "GatewayStatus")]
#[serde(rename_all = "camelCase")]
pub struct GatewaySpec {
    /// Name of the GatewayClass this gateway belongs to.
    pub gateway_class_name: String,

    /// Listeners exposed by this gateway.
    #[serde(default)]
    pub listeners: Vec<Listener>,
}

/// Whether an address value is an IP literal or a hostname.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressType {
    /// IPv4/IPv6 literal.
    Ip,
    /// DNS hostname.
    Hostname,
}

/// A cluster-attributed gateway address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayAddress {
    /// Address kind.
    pub address_type: AddressType,
    /// Bare value with any cluster prefix stripped.
    pub value: String,
}

/// The addresses one cluster contributes to a gateway.
#[derive(Clone, Debug)]
pub struct ClusterGateway {
    /// Cluster identity the addresses were published from.
    pub cluster_name: String,
    /// Addresses in status order.
    pub addresses: Vec<GatewayAddress>,
}

impl Gateway {
    /// Group the gateway's status addresses by cluster, preserving status
    /// order within and across clusters.
    ///
    /// Unrecognized address types are skipped.
    #[must_use]
    pub fn cluster_gateways(&self) -> Vec<ClusterGateway> {
        let mut clusters: Vec<ClusterGateway> = Vec::new();
        let addresses = self
            .status
            .as_ref()
            .map(|s| s.addresses.as_slice())
            .unwrap_or_default();

        for address in addresses {
            let Some((cluster, gateway_address)) = self.attribute_address(address) else {
                continue;
            };
            match clusters.iter_mut().find(|c| c.cluster_name == cluster) {
                Some(existing) => existing.addresses.push(gateway_address),
                None => clusters.push(ClusterGateway {
                    cluster_name: cluster,
                    addresses: vec![gateway_address],
                }),
            }
        }

        clusters
    }

    /// Split one status address into (cluster, typed address).
    fn attribute_address(&self, address: &GatewayStatusAddress) -> Option<(String, GatewayAddress)> {
        let address_type = address.r#type.as_deref().unwrap_or("IPAddress");
        match address_type {
            MULTI_CLUSTER_IP_ADDRESS_TYPE => {
                let (cluster, value) = address.value.split_once('/')?;
                Some((
                    cluster.to_string(),
                    GatewayAddress {
                        address_type: AddressType::Ip,
                        value: value.to_string(),
                    },
                ))
            }
            MULTI_CLUSTER_HOSTNAME_ADDRESS_TYPE => {
                let (cluster, value) = address.value.split_once('/')?;
                Some((
                    cluster.to_string(),
                    GatewayAddress {
                        address_type: AddressType::Hostname,
                        value: value.to_string(),
                    },
                ))
            }
            "IPAddress" => Some((
                self.name_any(),
                GatewayAddress {
                    address_type: AddressType::Ip,
                    value: address.value.clone(),
                },
            )),
            "Hostname" => Some((
                self.name_any(),
                GatewayAddress {
                    address_type: AddressType::Hostname,
                    value: address.value.clone(),
                },
            )),
            _ => None,
        }
    }
}

/// Convert the gateway's cluster-scoped labels into the view for one cluster.
///
/// A gateway label `<prefix><cluster>_<attr>=<value>` becomes
/// `<prefix><attr>=<value>` in the returned map; labels for other clusters
/// and non-prefixed labels are dropped.
#[must_use]
pub fn cluster_labels(
    gateway_labels: &BTreeMap<String, String>,
    cluster_name: &str,
) -> BTreeMap<String, String> {
    let cluster_prefix = format!("{CLUSTER_LABEL_PREFIX}{cluster_name}_");
    gateway_labels
        .iter()
        .filter_map(|(key, value)| {
            let attribute = key.strip_prefix(&cluster_prefix)?;
            Some((
                format!("{CLUSTER_LABEL_PREFIX}{attribute}"),
                value.clone(),
            ))
        })
        .collect()
}

/// Look up the geo-code attribute for one cluster, when labelled.
#[must_use]
pub fn cluster_geo_label(
    gateway_labels: &BTreeMap<String, String>,
    cluster_name: &str,
) -> Option<String> {
    gateway_labels
        .get(&format!(
            "{CLUSTER_LABEL_PREFIX}{cluster_name}_{GEO_CODE_ATTRIBUTE}"
        ))
        .cloned()
}

/// Whether a listener hostname is a wildcard (`*.domain`).
#[must_use]
pub fn is_wildcard_host(host: &str) -> bool {
    host.starts_with('*')
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod gateway_tests;
