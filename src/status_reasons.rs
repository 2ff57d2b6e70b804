// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Standardized status condition reasons for dnsgate resources.
//!
//! Reasons are programmatic `CamelCase` identifiers placed in status
//! conditions so that users and tooling can branch on them without parsing
//! messages.

/// Resource reconciled successfully and records are in place
pub const REASON_READY: &str = "Ready";

/// The policy's target gateway does not exist
pub const REASON_TARGET_NOT_FOUND: &str = "TargetNotFound";

/// The target gateway has not published any addresses yet
pub const REASON_NO_ADDRESSES: &str = "NoAddresses";

/// No managed zone covers one or more listener hostnames
pub const REASON_NO_MANAGED_ZONE: &str = "NoManagedZoneForHost";

/// The policy names a routing strategy the controller does not implement
pub const REASON_UNKNOWN_STRATEGY: &str = "UnknownRoutingStrategy";

/// Probe status reason set when the additional-headers secret is absent
pub const REASON_SECRET_NOT_FOUND: &str = "additional headers secret not found";
