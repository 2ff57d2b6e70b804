// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-probe configuration, HTTP performer, failure accounting and the
//! driver task that ties them to the worker pool.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::{debug, warn};

use crate::constants::{
    DEFAULT_EXPECTED_RESPONSES, DEFAULT_PROBE_INTERVAL_SECS, MAX_PROBE_TIMEOUT_SECS,
};
use crate::crd::{AdditionalHeader, DNSHealthCheckProbe, HealthProtocol};
use crate::duration::parse_duration;
use crate::health::notifier::ProbeNotifier;
use crate::health::queue::{ProbeExecution, ProbeQueue};

/// Identity of a registered probe: `namespace/name` of the declarative object.
pub type ProbeId = String;

/// Effective configuration of one probe, derived from its spec.
#[derive(Clone, Debug, PartialEq)]
pub struct ProbeConfig {
    /// Registry identity (`namespace/name`).
    pub id: ProbeId,
    /// Hostname presented in the request.
    pub host: String,
    /// IP probed instead of resolving `host`, when set.
    pub ip_address: Option<String>,
    /// Request path.
    pub path: String,
    /// Request port.
    pub port: i32,
    /// Request protocol.
    pub protocol: HealthProtocol,
    /// Time between checks.
    pub interval: Duration,
    /// Extra request headers from the additional-headers secret.
    pub additional_headers: Vec<AdditionalHeader>,
    /// Response codes counted as healthy.
    pub expected_responses: Vec<u16>,
    /// Consecutive failures before the probe reports unhealthy.
    pub failure_threshold: i32,
    /// Skip certificate verification for HTTPS checks.
    pub allow_insecure_certificate: bool,
}

impl ProbeConfig {
    /// Derive the effective configuration from a probe object and its
    /// resolved additional headers.
    ///
    /// An absent or unparsable interval falls back to the default; the spec
    /// schema keeps unparsable values out of well-formed objects.
    #[must_use]
    pub fn from_probe(probe: &DNSHealthCheckProbe, additional_headers: Vec<AdditionalHeader>) -> Self {
        let spec = &probe.spec;
        let interval = spec
            .interval
            .as_deref()
            .and_then(|raw| parse_duration(raw).ok())
            .unwrap_or(Duration::from_secs(DEFAULT_PROBE_INTERVAL_SECS));

        ProbeConfig {
            id: probe_id(probe),
            host: spec.host.clone(),
            ip_address: spec.address.clone(),
            path: spec.path.clone(),
            port: spec.port(),
            protocol: spec.protocol(),
            interval,
            additional_headers,
            expected_responses: spec
                .expected_responses
                .clone()
                .unwrap_or_else(|| DEFAULT_EXPECTED_RESPONSES.to_vec()),
            failure_threshold: spec.failure_threshold(),
            allow_insecure_certificate: spec.allow_insecure_certificate,
        }
    }

    /// Request URL: `<proto>://<ip-or-host>:<port><path>`.
    #[must_use]
    pub fn url(&self) -> String {
        let authority = self.ip_address.as_deref().unwrap_or(&self.host);
        format!(
            "{}://{}:{}{}",
            self.protocol.scheme(),
            authority,
            self.port,
            self.path
        )
    }

    /// Per-request timeout: the interval, capped so one slow endpoint cannot
    /// occupy a worker indefinitely.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.interval
            .min(Duration::from_secs(MAX_PROBE_TIMEOUT_SECS))
    }

    /// Whether a response status counts as healthy.
    #[must_use]
    pub fn expects(&self, status: u16) -> bool {
        self.expected_responses.contains(&status)
    }
}

/// `namespace/name` identity of a probe object.
#[must_use]
pub fn probe_id(probe: &DNSHealthCheckProbe) -> ProbeId {
    use kube::ResourceExt;
    format!(
        "{}/{}",
        probe.namespace().unwrap_or_default(),
        probe.name_any()
    )
}

/// Raw outcome of one HTTP check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Response status was in the expected set.
    Healthy,
    /// Unexpected status or transport failure, with the reason text.
    Unhealthy(String),
}

/// Consecutive-failure accounting for one probe.
///
/// A probe stays healthy through failures below the threshold; only the
/// threshold-crossing failure flips it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeState {
    /// Whether the probe currently counts as healthy.
    pub healthy: bool,
    /// Failed checks since the last success.
    pub consecutive_failures: i32,
    /// Reason of the most recent failure.
    pub reason: Option<String>,
}

impl Default for ProbeState {
    fn default() -> Self {
        ProbeState {
            healthy: true,
            consecutive_failures: 0,
            reason: None,
        }
    }
}

impl ProbeState {
    /// Fold one check outcome into the state.
    pub fn observe(&mut self, outcome: &CheckOutcome, failure_threshold: i32) {
        match outcome {
            CheckOutcome::Healthy => {
                self.healthy = true;
                self.consecutive_failures = 0;
                self.reason = None;
            }
            CheckOutcome::Unhealthy(reason) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= failure_threshold {
                    self.healthy = false;
                }
                self.reason = Some(reason.clone());
            }
        }
    }
}

/// One completed observation, forwarded to the notifier.
#[derive(Clone, Debug)]
pub struct ProbeResult {
    /// Registry identity of the probe.
    pub id: ProbeId,
    /// Whether the probe currently counts as healthy.
    pub healthy: bool,
    /// Failed checks since the last success.
    pub consecutive_failures: i32,
    /// Reason of the most recent failure.
    pub reason: Option<String>,
    /// When the check completed.
    pub last_checked_at: DateTime<Utc>,
}

/// Executes probe HTTP requests.
///
/// Two shared connection pools: a verifying client and one that skips
/// certificate verification for probes with `allowInsecureCertificate`.
#[derive(Clone)]
pub struct ProbePerformer {
    client: reqwest::Client,
    insecure_client: reqwest::Client,
}

impl ProbePerformer {
    /// Build the performer and its HTTP clients.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new() -> anyhow::Result<Self> {
        Ok(ProbePerformer {
            client: reqwest::Client::builder().build()?,
            insecure_client: reqwest::Client::builder()
                .danger_accept_invalid_certs(true)
                .build()?,
        })
    }

    /// Perform one check and classify the response.
    ///
    /// Any transport error is an unhealthy observation carrying the error
    /// text, never a hard failure.
    pub async fn perform(&self, config: &ProbeConfig) -> CheckOutcome {
        let client = if config.allow_insecure_certificate
            && config.protocol == HealthProtocol::HTTPS
        {
            &self.insecure_client
        } else {
            &self.client
        };

        let mut request = client.get(config.url()).timeout(config.timeout());

        // Keep the logical hostname when probing an IP override.
        if config.ip_address.is_some() {
            request = request.header(reqwest::header::HOST, &config.host);
        }
        for header in &config.additional_headers {
            request = request.header(&header.name, &header.value);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                if config.expects(status) {
                    CheckOutcome::Healthy
                } else {
                    CheckOutcome::Unhealthy(format!("unexpected response status {status}"))
                }
            }
            Err(err) => CheckOutcome::Unhealthy(err.to_string()),
        }
    }
}

/// Periodic driver for one registered probe.
///
/// Submits one execution per interval into the shared queue (blocking the
/// tick when the queue is full), waits for the outcome before the next
/// submission, folds it into the failure state and notifies. Stopping the
/// probe returns before the next tick; an in-flight execution completes in
/// the pool with its outcome discarded.
pub(crate) async fn run_driver(
    config: Arc<Mutex<ProbeConfig>>,
    mut stop_rx: watch::Receiver<bool>,
    queue: ProbeQueue,
    notifier: Arc<dyn ProbeNotifier>,
) {
    let mut state = ProbeState::default();
    let mut current_interval = snapshot(&config).interval;
    let mut ticker = new_ticker(current_interval);

    loop {
        tokio::select! {
            _ = stop_rx.changed() => return,
            _ = ticker.tick() => {}
        }

        let probe = snapshot(&config);
        if probe.interval != current_interval {
            current_interval = probe.interval;
            ticker = new_ticker(current_interval);
        }

        let (done_tx, done_rx) = oneshot::channel();
        let submitted = queue
            .submit(ProbeExecution {
                config: probe.clone(),
                done: done_tx,
            })
            .await;
        if submitted.is_err() {
            // Pool shut down underneath us.
            return;
        }

        let outcome = tokio::select! {
            // Probe removed while in flight: discard the response.
            _ = stop_rx.changed() => return,
            result = done_rx => match result {
                Ok(outcome) => outcome,
                // Execution dropped during pool shutdown.
                Err(_) => return,
            }
        };

        state.observe(&outcome, probe.failure_threshold);
        crate::metrics::record_probe_check(&probe.id, state.healthy);
        debug!(
            probe = %probe.id,
            healthy = state.healthy,
            consecutive_failures = state.consecutive_failures,
            "probe check completed"
        );

        let result = ProbeResult {
            id: probe.id.clone(),
            healthy: state.healthy,
            consecutive_failures: state.consecutive_failures,
            reason: state.reason.clone(),
            last_checked_at: Utc::now(),
        };
        if let Err(err) = notifier.notify(result).await {
            warn!(probe = %probe.id, error = %err, "failed to publish probe status");
        }
    }
}

fn snapshot(config: &Arc<Mutex<ProbeConfig>>) -> ProbeConfig {
    config
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .clone()
}

fn new_ticker(interval: Duration) -> tokio::time::Interval {
    // interval_at so a freshly (re)created ticker waits one full period
    // instead of firing immediately.
    let mut ticker =
        tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker
}

#[cfg(test)]
#[path = "probe_tests.rs"]
mod probe_tests;
