// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Duration parsing for Go-style duration strings.
//!
//! Probe intervals arrive as strings like "60s", "5m" or "1h" and are parsed
//! into Rust `std::time::Duration`. Bounds keep intervals inside a range the
//! probe engine can sensibly schedule.

use anyhow::{bail, Context, Result};
use std::time::Duration;

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 3600;

/// Minimum probe interval (1 second)
const MIN_INTERVAL_SECS: u64 = 1;

/// Maximum probe interval (24 hours)
const MAX_INTERVAL_SECS: u64 = 86400;

/// Parse a Go-style duration string into a Rust `Duration`.
///
/// Supported units:
/// - `s` (seconds): "30s"
/// - `m` (minutes): "5m"
/// - `h` (hours): "1h"
///
/// # Examples
///
/// ```
/// use dnsgate::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
/// assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
/// assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
///
/// // Invalid formats return errors
/// assert!(parse_duration("").is_err());
/// assert!(parse_duration("10").is_err());  // Missing unit
/// assert!(parse_duration("10x").is_err()); // Invalid unit
/// ```
///
/// # Errors
///
/// Returns an error if:
/// - The format is invalid (missing unit, non-numeric value)
/// - The duration is below the minimum (1s)
/// - The duration is above the maximum (24h)
pub fn parse_duration(duration_str: &str) -> Result<Duration> {
    if duration_str.is_empty() {
        bail!("Duration string cannot be empty");
    }

    // Find where digits end and unit begins
    let split_pos = duration_str
        .chars()
        .position(|c| !c.is_ascii_digit())
        .context("Duration must end with a unit (s, m, or h)")?;

    let (value_str, unit) = duration_str.split_at(split_pos);

    let value: u64 = value_str
        .parse()
        .context("Duration value must be a positive integer")?;

    let seconds = match unit {
        "s" => value,
        "m" => value
            .checked_mul(SECONDS_PER_MINUTE)
            .context("Duration value too large (overflow)")?,
        "h" => value
            .checked_mul(SECONDS_PER_HOUR)
            .context("Duration value too large (overflow)")?,
        _ => {
            bail!(
                "Unsupported duration unit '{unit}'. Use 's' (seconds), 'm' (minutes), or 'h' (hours)"
            )
        }
    };

    if seconds < MIN_INTERVAL_SECS {
        bail!("Duration '{duration_str}' is below minimum of {MIN_INTERVAL_SECS}s");
    }

    if seconds > MAX_INTERVAL_SECS {
        bail!("Duration '{duration_str}' exceeds maximum of 24h");
    }

    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
#[path = "duration_tests.rs"]
mod duration_tests;
