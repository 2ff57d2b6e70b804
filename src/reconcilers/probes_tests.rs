// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for additional-header secret parsing.

use super::*;

fn secret_data(pairs: &[(&str, &str)]) -> BTreeMap<String, ByteString> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
        .collect()
}

#[test]
fn test_parse_headers() {
    let headers = parse_additional_headers(secret_data(&[
        ("Authorization", "Bearer token"),
        ("X-Probe-Source", "dnsgate"),
    ]))
    .unwrap();

    assert_eq!(headers.len(), 2);
    assert_eq!(headers[0].name, "Authorization");
    assert_eq!(headers[0].value, "Bearer token");
    assert_eq!(headers[1].name, "X-Probe-Source");
}

#[test]
fn test_parse_headers_ordered_by_key() {
    let headers = parse_additional_headers(secret_data(&[
        ("b-header", "2"),
        ("a-header", "1"),
    ]))
    .unwrap();
    assert_eq!(headers[0].name, "a-header");
    assert_eq!(headers[1].name, "b-header");
}

#[test]
fn test_parse_headers_trims_keys() {
    let headers = parse_additional_headers(secret_data(&[("  X-Token\t", "abc")])).unwrap();
    assert_eq!(headers[0].name, "X-Token");
}

#[test]
fn test_header_with_inner_space_rejected() {
    let result = parse_additional_headers(secret_data(&[("X Token", "abc")]));
    assert!(matches!(
        result,
        Err(ProbeError::InvalidHeader { header }) if header == "X Token"
    ));
}

#[test]
fn test_header_with_inner_tab_rejected() {
    let result = parse_additional_headers(secret_data(&[("X\tToken", "abc")]));
    assert!(matches!(result, Err(ProbeError::InvalidHeader { .. })));
}

#[test]
fn test_empty_data_yields_no_headers() {
    let headers = parse_additional_headers(BTreeMap::new()).unwrap();
    assert!(headers.is_empty());
}

#[test]
fn test_probe_error_reason_strings() {
    let missing = ProbeError::SecretMissing {
        name: "probe-headers".to_string(),
        namespace: "default".to_string(),
    };
    assert_eq!(
        probe_error_reason(&missing),
        "additional headers secret not found"
    );

    let invalid = ProbeError::InvalidHeader {
        header: "X Token".to_string(),
    };
    assert_eq!(probe_error_reason(&invalid), "invalid header found: X Token");
}
