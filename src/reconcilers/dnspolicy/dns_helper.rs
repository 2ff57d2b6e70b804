// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Managed zone resolution and DNS endpoint synthesis.
//!
//! This module contains the pure core of the DNS policy reconciler: picking
//! the authoritative [`ManagedZone`] for a listener hostname, and deriving
//! the endpoint graph a provider plugin must serve for a
//! [`MultiClusterGatewayTarget`].
//!
//! # Load-balanced graph shape
//!
//! The `loadbalanced` strategy builds a four-tier CNAME/A graph out of
//! stable DNS primitives:
//!
//! ```text
//! shop.example.com                    CNAME lb-a1b2.shop.example.com
//! lb-a1b2.shop.example.com            CNAME geolocation ireland ie.lb-a1b2.shop.example.com
//! lb-a1b2.shop.example.com            CNAME geolocation default ie.lb-a1b2.shop.example.com
//! ie.lb-a1b2.shop.example.com         CNAME weighted 120 ab1.lb-a1b2.shop.example.com
//! ie.lb-a1b2.shop.example.com         CNAME weighted 120 aws.lb.com
//! ab1.lb-a1b2.shop.example.com        A 192.22.2.1 192.22.2.5
//! ```
//!
//! Weighted tiers carry a `weight` provider attribute, geo tiers a
//! `geo-code` attribute, with the literal `*` marking the fallback served
//! when no geo rule matches.

use std::collections::HashMap;

use crate::constants::{
    DEFAULT_CNAME_TTL, DEFAULT_TTL, PROVIDER_SPECIFIC_GEO_CODE, PROVIDER_SPECIFIC_WEIGHT,
};
use crate::crd::{DNSRecord, Endpoint, ManagedZone, RecordType, RoutingStrategy};
use crate::dns::{MultiClusterGatewayTarget, WILDCARD_GEO};
use crate::errors::DnsPolicyError;
use crate::gateway::{is_wildcard_host, AddressType};

/// Find the managed zone whose domain is the longest matching suffix of
/// `host`, together with the remaining subdomain prefix.
///
/// A host equal to its own effective TLD fails immediately: public
/// suffixes (`com`, but also multi-label ones like `co.uk` or `github.io`)
/// can never be private zones, no matter what the catalog claims. An exact
/// apex match is skipped (apex records are never written); the search
/// continues on the parent domain, one label at a time, and fails with
/// [`DnsPolicyError::NoManagedZoneForHost`] once only an effective TLD
/// remains.
///
/// # Errors
///
/// Returns [`DnsPolicyError::NoManagedZoneForHost`] when the catalog is
/// empty or no zone covers the host.
pub fn find_matching_managed_zone<'a>(
    original_host: &str,
    host: &str,
    zones: &'a [ManagedZone],
) -> Result<(&'a ManagedZone, String), DnsPolicyError> {
    if zones.is_empty() {
        return Err(DnsPolicyError::NoManagedZoneForHost {
            host: original_host.to_string(),
        });
    }

    let host = host.to_lowercase();
    let original = original_host.to_lowercase();

    // The host is an effective TLD: no private zone is possible, and the
    // original host cannot have a valid zone left above it either.
    if is_effective_tld(&host) {
        return Err(DnsPolicyError::NoManagedZoneForHost {
            host: original_host.to_string(),
        });
    }

    // A single-label host has no parent a zone could live under.
    let Some((_, parent_domain)) = host.split_once('.') else {
        return Err(DnsPolicyError::NoManagedZoneForHost {
            host: original_host.to_string(),
        });
    };

    // A ManagedZone represents an apex domain, and apex records are not
    // supported, so a zone matching the original host exactly is never
    // considered. Continue with the parent domain instead.
    if host == original {
        return find_matching_managed_zone(original_host, parent_domain, zones);
    }

    if let Some(zone) = zones
        .iter()
        .find(|zone| zone.spec.domain_name.to_lowercase() == host)
    {
        let suffix = format!(".{}", zone.spec.domain_name.to_lowercase());
        let subdomain = original.replacen(&suffix, "", 1);
        return Ok((zone, subdomain));
    }

    find_matching_managed_zone(original_host, parent_domain, zones)
}

/// Whether a host is nothing but its own public suffix.
///
/// Backed by the compiled public suffix list, so registry-controlled
/// multi-label suffixes (`co.uk`) and private delegation roots
/// (`github.io`) are recognized alongside plain TLDs.
fn is_effective_tld(host: &str) -> bool {
    psl::suffix(host.as_bytes()).is_some_and(|suffix| suffix.as_bytes() == host.as_bytes())
}

/// Index a record's stored endpoints by identity for carry-over matching.
#[must_use]
pub fn current_endpoints_map(record: &DNSRecord) -> HashMap<String, Endpoint> {
    record
        .spec
        .endpoints
        .iter()
        .map(|endpoint| (endpoint.set_id(), endpoint.clone()))
        .collect()
}

/// Build the endpoint list for one listener hostname under the given
/// routing strategy.
///
/// Endpoints whose identity `(dnsName, setIdentifier)` already exists in
/// `current_endpoints` are carried over and mutated in place, preserving
/// provider-specific attributes the builder does not own (notably a
/// provider-issued health-check id). The result is sorted ascending by
/// identity so that identical inputs always produce identical output.
///
/// An empty result means no cluster produced a usable address; the caller
/// leaves the stored record untouched.
#[must_use]
pub fn build_endpoints(
    target: &MultiClusterGatewayTarget,
    listener_host: &str,
    strategy: RoutingStrategy,
    current_endpoints: &HashMap<String, Endpoint>,
) -> Vec<Endpoint> {
    let mut endpoints = match strategy {
        RoutingStrategy::Simple => simple_endpoints(target, listener_host, current_endpoints),
        RoutingStrategy::LoadBalanced => {
            load_balanced_endpoints(target, listener_host, current_endpoints)
        }
    };

    endpoints.sort_by_key(Endpoint::set_id);
    endpoints
}

/// Simple strategy: one endpoint per address type at the listener hostname.
///
/// Multiple hostname-typed addresses collapse into a single CNAME endpoint
/// with several targets. RFC-wise that is not a valid record set; the
/// behavior is kept for compatibility, and deployments with several
/// hostname addresses should use the `loadbalanced` strategy instead.
fn simple_endpoints(
    target: &MultiClusterGatewayTarget,
    hostname: &str,
    current_endpoints: &HashMap<String, Endpoint>,
) -> Vec<Endpoint> {
    let mut ip_values = Vec::new();
    let mut host_values = Vec::new();

    for cluster_target in &target.cluster_gateway_targets {
        for address in &cluster_target.cluster_gateway.addresses {
            match address.address_type {
                AddressType::Ip => ip_values.push(address.value.clone()),
                AddressType::Hostname => host_values.push(address.value.clone()),
            }
        }
    }

    let mut endpoints = Vec::new();

    if !ip_values.is_empty() {
        endpoints.push(create_or_update_endpoint(
            hostname,
            ip_values,
            RecordType::A,
            "",
            DEFAULT_TTL,
            current_endpoints,
        ));
    }

    if !host_values.is_empty() {
        endpoints.push(create_or_update_endpoint(
            hostname,
            host_values,
            RecordType::CNAME,
            "",
            DEFAULT_TTL,
            current_endpoints,
        ));
    }

    endpoints
}

/// Load-balanced strategy: the four-tier geo/weighted CNAME/A graph.
///
/// Clusters are grouped by geo code (one internal `default` group when the
/// policy has no geo dimension). Every geo group contributes its weighted
/// and A tiers plus one geo CNAME at the `lb-<hash>` root; exactly one
/// additional endpoint with set identifier `default` and `geo-code=*`
/// points at the policy's default geo group, or at the first group seen
/// when the designated default matches no cluster.
fn load_balanced_endpoints(
    target: &MultiClusterGatewayTarget,
    hostname: &str,
    current_endpoints: &HashMap<String, Endpoint>,
) -> Vec<Endpoint> {
    let cname_host = if is_wildcard_host(hostname) {
        hostname.replacen("*.", "", 1)
    } else {
        hostname.to_string()
    };

    let lb_name = format!("lb-{}.{}", target.short_code(), cname_host).to_lowercase();
    let default_geo = target.default_geo();

    let mut endpoints: Vec<Endpoint> = Vec::new();
    let mut default_endpoint: Option<Endpoint> = None;

    for (geo_code, cluster_targets) in target.group_targets_by_geo() {
        let geo_lb_name = format!("{geo_code}.{lb_name}").to_lowercase();
        let mut cluster_endpoints = Vec::new();

        for cluster_target in cluster_targets {
            let mut ip_values = Vec::new();
            let mut host_values = Vec::new();
            for address in &cluster_target.cluster_gateway.addresses {
                match address.address_type {
                    AddressType::Ip => ip_values.push(address.value.clone()),
                    AddressType::Hostname => host_values.push(address.value.clone()),
                }
            }

            if !ip_values.is_empty() {
                let cluster_lb_name =
                    format!("{}.{lb_name}", cluster_target.short_code()).to_lowercase();
                cluster_endpoints.push(create_or_update_endpoint(
                    &cluster_lb_name,
                    ip_values,
                    RecordType::A,
                    "",
                    DEFAULT_TTL,
                    current_endpoints,
                ));
                host_values.push(cluster_lb_name);
            }

            for host_value in host_values {
                let mut endpoint = create_or_update_endpoint(
                    &geo_lb_name,
                    vec![host_value.clone()],
                    RecordType::CNAME,
                    &host_value,
                    DEFAULT_TTL,
                    current_endpoints,
                );
                endpoint.set_provider_specific(
                    PROVIDER_SPECIFIC_WEIGHT,
                    &cluster_target.weight.to_string(),
                );
                cluster_endpoints.push(endpoint);
            }
        }

        if cluster_endpoints.is_empty() {
            continue;
        }
        endpoints.append(&mut cluster_endpoints);

        // lb-<hash> CNAME for this geo (lb-a1b2.shop.example.com -> ie.lb-a1b2.shop.example.com)
        let mut geo_endpoint = create_or_update_endpoint(
            &lb_name,
            vec![geo_lb_name.clone()],
            RecordType::CNAME,
            geo_code.as_str(),
            DEFAULT_CNAME_TTL,
            current_endpoints,
        );

        if geo_code.is_default_code() {
            // The internal default group becomes the wildcard fallback itself.
            default_endpoint = Some(geo_endpoint);
            continue;
        } else if geo_code == default_geo || default_endpoint.is_none() {
            // The designated default geo takes precedence, but some group
            // must always back the fallback.
            default_endpoint = Some(create_or_update_endpoint(
                &lb_name,
                vec![geo_lb_name.clone()],
                RecordType::CNAME,
                "default",
                DEFAULT_CNAME_TTL,
                current_endpoints,
            ));
        }

        geo_endpoint.set_provider_specific(PROVIDER_SPECIFIC_GEO_CODE, geo_code.as_str());
        endpoints.push(geo_endpoint);
    }

    if !endpoints.is_empty() {
        if let Some(mut fallback) = default_endpoint {
            fallback.set_provider_specific(PROVIDER_SPECIFIC_GEO_CODE, WILDCARD_GEO);
            endpoints.push(fallback);
        }

        // Root CNAME (shop.example.com -> lb-a1b2.shop.example.com)
        endpoints.push(create_or_update_endpoint(
            hostname,
            vec![lb_name],
            RecordType::CNAME,
            "",
            DEFAULT_CNAME_TTL,
            current_endpoints,
        ));
    }

    endpoints
}

/// Reuse the stored endpoint with the same identity when one exists,
/// otherwise construct a fresh one.
///
/// Reuse keeps provider-specific attributes the builder does not set.
fn create_or_update_endpoint(
    dns_name: &str,
    targets: Vec<String>,
    record_type: RecordType,
    set_identifier: &str,
    record_ttl: u32,
    current_endpoints: &HashMap<String, Endpoint>,
) -> Endpoint {
    let endpoint_id = format!("{dns_name}{set_identifier}");
    let mut endpoint = current_endpoints
        .get(&endpoint_id)
        .cloned()
        .unwrap_or_else(|| Endpoint {
            set_identifier: set_identifier.to_string(),
            ..Endpoint::default()
        });

    endpoint.dns_name = dns_name.to_string();
    endpoint.record_type = Some(record_type);
    endpoint.targets = targets;
    endpoint.record_ttl = Some(record_ttl);
    endpoint
}

#[cfg(test)]
#[path = "dns_helper_tests.rs"]
mod dns_helper_tests;
