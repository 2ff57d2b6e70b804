// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers for Kubernetes resources.
//!
//! Conditions follow the standard Kubernetes format:
//! - `type`: The aspect of the resource being reported (e.g., "Ready")
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: A programmatic identifier (CamelCase)
//! - `message`: A human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp when the condition changed

use crate::crd::Condition;
use chrono::Utc;

/// Create a new Kubernetes condition with the current timestamp.
///
/// # Arguments
///
/// * `condition_type` - The type of condition (e.g., "Ready")
/// * `status` - The status: "True", "False", or "Unknown"
/// * `reason` - A programmatic identifier in `CamelCase`
/// * `message` - A human-readable explanation
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Whether two conditions differ in anything but their transition time.
#[must_use]
pub fn condition_changed(current: Option<&Condition>, next: &Condition) -> bool {
    match current {
        None => true,
        Some(current) => {
            current.status != next.status
                || current.reason != next.reason
                || current.message != next.message
        }
    }
}

/// Insert or replace the condition of the same type, preserving the
/// existing transition time when nothing but the timestamp changed.
pub fn upsert_condition(conditions: &mut Vec<Condition>, next: Condition) {
    match conditions.iter_mut().find(|c| c.r#type == next.r#type) {
        Some(existing) => {
            if condition_changed(Some(existing), &next) {
                *existing = next;
            }
        }
        None => conditions.push(next),
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
