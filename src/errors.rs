// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Typed errors for DNS policy reconciliation and probe management.
//!
//! Reconcilers use [`anyhow`] for plumbing; the enums here exist where the
//! caller has to branch on the failure kind (per-listener zone skips, probe
//! status write-back) or map it to a status condition reason.

use thiserror::Error;

use crate::status_reasons;

/// Errors raised while turning a `DNSPolicy` into DNS records.
#[derive(Error, Debug, Clone)]
pub enum DnsPolicyError {
    /// The policy names a routing strategy the controller does not implement.
    ///
    /// Surfaced to the caller and fails the reconciliation; the event source
    /// requeues the policy.
    #[error("unknown routing strategy '{strategy}'")]
    UnknownRoutingStrategy {
        /// The unrecognized strategy value from the policy spec
        strategy: String,
    },

    /// No managed zone in the catalog is a suffix of the listener hostname.
    ///
    /// Handled per listener: the listener is skipped with a warning and the
    /// condition is recorded on the policy status.
    #[error("no managed zone for host '{host}'")]
    NoManagedZoneForHost {
        /// The hostname that could not be placed in any zone
        host: String,
    },

    /// The target gateway carries no addresses for any cluster.
    #[error("gateway '{gateway}' has no addresses")]
    NoAddresses {
        /// The gateway name
        gateway: String,
    },
}

impl DnsPolicyError {
    /// Returns the status condition reason for this error.
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::UnknownRoutingStrategy { .. } => status_reasons::REASON_UNKNOWN_STRATEGY,
            Self::NoManagedZoneForHost { .. } => status_reasons::REASON_NO_MANAGED_ZONE,
            Self::NoAddresses { .. } => status_reasons::REASON_NO_ADDRESSES,
        }
    }
}

/// Errors raised while materializing a `DNSHealthCheckProbe` into the
/// probe registry.
#[derive(Error, Debug, Clone)]
pub enum ProbeError {
    /// The referenced additional-headers secret does not exist.
    ///
    /// Reflected in the probe status (`healthy=false`, reason set) before
    /// being surfaced.
    #[error("additional headers secret '{namespace}/{name}' not found")]
    SecretMissing {
        /// Secret name from `additionalHeadersRef`
        name: String,
        /// Namespace of the probe (secrets are resolved in-namespace)
        namespace: String,
    },

    /// A header name parsed from the secret contains whitespace.
    #[error("invalid header, must not contain whitespace '{header}'")]
    InvalidHeader {
        /// The offending secret data key
        header: String,
    },
}
