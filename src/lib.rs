// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # dnsgate - Multi-cluster Gateway DNS Controller for Kubernetes
//!
//! dnsgate is a Kubernetes controller written in Rust that publishes DNS for
//! multi-cluster gateways through Custom Resource Definitions (CRDs).
//!
//! ## Overview
//!
//! This library provides the core functionality for the dnsgate controller,
//! including:
//!
//! - Custom Resource Definitions (CRDs) for DNS policies, records, zones and probes
//! - Synthesis of provider-neutral DNS endpoint graphs (simple and
//!   geo/weighted load-balanced strategies)
//! - A concurrent health-probe engine with bounded worker concurrency
//! - Reconciliation logic wiring gateways, policies and probes together
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types
//! - [`gateway`] - Gateway input contract and multi-cluster address parsing
//! - [`dns`] - Multi-cluster target model: geo grouping, weights, short codes
//! - [`reconcilers`] - Reconciliation logic for each resource type
//! - [`health`] - Probe registry, scheduler, worker pool and status write-back
//!
//! ## Example
//!
//! ```rust,no_run
//! use dnsgate::crd::{DNSPolicySpec, LoadBalancingGeo, LoadBalancingSpec, LoadBalancingWeighted};
//!
//! // Policy publishing a gateway with geo + weighted load balancing
//! let spec = DNSPolicySpec {
//!     target_gateway: "prod-web".to_string(),
//!     routing_strategy: Some("loadbalanced".to_string()),
//!     load_balancing: Some(LoadBalancingSpec {
//!         weighted: Some(LoadBalancingWeighted {
//!             default_weight: 120,
//!             custom: None,
//!         }),
//!         geo: Some(LoadBalancingGeo {
//!             default_geo: "IE".to_string(),
//!         }),
//!     }),
//!     health_check: None,
//! };
//! ```
//!
//! ## Features
//!
//! - **Deterministic synthesis** - identical inputs yield byte-equal endpoint lists
//! - **Health feedback** - failing addresses are withheld, with a per-group safety floor
//! - **Bounded probing** - a fixed worker pool with backpressure, never dropped checks
//! - **Status tracking** - full status subresources on every owned object

pub mod constants;
pub mod context;
pub mod crd;
pub mod dns;
pub mod duration;
pub mod errors;
pub mod gateway;
pub mod health;
pub mod metrics;
pub mod reconcilers;
pub mod status_reasons;
