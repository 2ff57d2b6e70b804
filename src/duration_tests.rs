// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for duration string parsing.

use super::*;

#[test]
fn test_parse_seconds() {
    assert_eq!(parse_duration("1s").unwrap(), Duration::from_secs(1));
    assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
    assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
}

#[test]
fn test_parse_minutes() {
    assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
    assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
}

#[test]
fn test_parse_hours() {
    assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    assert_eq!(parse_duration("24h").unwrap(), Duration::from_secs(86400));
}

#[test]
fn test_empty_string_rejected() {
    assert!(parse_duration("").is_err());
}

#[test]
fn test_missing_unit_rejected() {
    assert!(parse_duration("60").is_err());
}

#[test]
fn test_unknown_unit_rejected() {
    assert!(parse_duration("60x").is_err());
    assert!(parse_duration("2d").is_err());
}

#[test]
fn test_non_numeric_rejected() {
    assert!(parse_duration("s").is_err());
    assert!(parse_duration("abc").is_err());
}

#[test]
fn test_below_minimum_rejected() {
    assert!(parse_duration("0s").is_err());
}

#[test]
fn test_above_maximum_rejected() {
    assert!(parse_duration("25h").is_err());
    assert!(parse_duration("100000s").is_err());
}
