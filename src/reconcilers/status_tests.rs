// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for status condition helpers.

use super::*;

#[test]
fn test_create_condition_fields() {
    let condition = create_condition("Ready", "True", "Ready", "all listeners published");
    assert_eq!(condition.r#type, "Ready");
    assert_eq!(condition.status, "True");
    assert_eq!(condition.reason.as_deref(), Some("Ready"));
    assert_eq!(
        condition.message.as_deref(),
        Some("all listeners published")
    );
    assert!(condition.last_transition_time.is_some());
}

#[test]
fn test_condition_changed_detects_differences() {
    let current = create_condition("Ready", "True", "Ready", "ok");

    let same = create_condition("Ready", "True", "Ready", "ok");
    assert!(!condition_changed(Some(&current), &same));

    let flipped = create_condition("Ready", "False", "ReconcileError", "boom");
    assert!(condition_changed(Some(&current), &flipped));

    assert!(condition_changed(None, &same));
}

#[test]
fn test_upsert_condition_replaces_same_type() {
    let mut conditions = vec![create_condition("Ready", "True", "Ready", "ok")];

    upsert_condition(
        &mut conditions,
        create_condition("Ready", "False", "NoManagedZoneForHost", "no zone"),
    );

    assert_eq!(conditions.len(), 1);
    assert_eq!(conditions[0].status, "False");
    assert_eq!(conditions[0].reason.as_deref(), Some("NoManagedZoneForHost"));
}

#[test]
fn test_upsert_condition_preserves_transition_time_when_unchanged() {
    let original = create_condition("Ready", "True", "Ready", "ok");
    let original_time = original.last_transition_time.clone();
    let mut conditions = vec![original];

    upsert_condition(
        &mut conditions,
        create_condition("Ready", "True", "Ready", "ok"),
    );

    assert_eq!(conditions[0].last_transition_time, original_time);
}

#[test]
fn test_upsert_condition_appends_new_type() {
    let mut conditions = vec![create_condition("Ready", "True", "Ready", "ok")];

    upsert_condition(
        &mut conditions,
        create_condition("Degraded", "False", "Healthy", "no failures"),
    );

    assert_eq!(conditions.len(), 2);
}
