// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! dnsgate controller entry point.
//!
//! Assembles the probe engine, the shared context and the controllers for
//! `DNSPolicy` and `DNSHealthCheckProbe`, with optional leader election and
//! graceful shutdown of in-flight probe executions.

use anyhow::Result;
use axum::{routing::get, Router};
use dnsgate::{
    constants::{
        DEFAULT_LEASE_DURATION_SECS, DEFAULT_LEASE_RETRY_PERIOD_SECS, ERROR_REQUEUE_DURATION_SECS,
        METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PATH, METRICS_SERVER_PORT,
        PROBE_QUEUE_CAPACITY, PROBE_SHUTDOWN_DEADLINE_SECS, PROBE_WORKERS, TOKIO_WORKER_THREADS,
    },
    context::Context,
    crd::{DNSHealthCheckProbe, DNSPolicy},
    health::{Monitor, ProbePerformer, ProbeWorkerPool},
    metrics,
    reconcilers::{reconcile_dnspolicy, reconcile_probe},
};
use futures::StreamExt;
use kube::{
    runtime::{controller::Action, watcher::Config, Controller},
    Api, Client,
};
use kube_lease_manager::LeaseManagerBuilder;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] anyhow::Error);

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("dnsgate-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

/// Initialize logging with custom format
///
/// Respects `RUST_LOG` environment variable if set, otherwise defaults to INFO level.
/// Respects `RUST_LOG_FORMAT` environment variable for output format (json or text).
fn initialize_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting multi-cluster gateway DNS controller");
}

/// Start the Prometheus metrics HTTP server
///
/// Serves metrics on the configured port and path (default: 0.0.0.0:8080/metrics)
fn start_metrics_server() -> tokio::task::JoinHandle<()> {
    info!(
        bind_address = METRICS_SERVER_BIND_ADDRESS,
        port = METRICS_SERVER_PORT,
        path = METRICS_SERVER_PATH,
        "Starting Prometheus metrics HTTP server"
    );

    tokio::spawn(async move {
        async fn metrics_handler() -> String {
            match metrics::gather_metrics() {
                Ok(metrics_text) => metrics_text,
                Err(e) => {
                    error!("Failed to gather metrics: {}", e);
                    String::from("# Error gathering metrics\n")
                }
            }
        }

        let app = Router::new().route(METRICS_SERVER_PATH, get(metrics_handler));

        let bind_addr = format!("{METRICS_SERVER_BIND_ADDRESS}:{METRICS_SERVER_PORT}");
        let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind metrics server to {bind_addr}: {e}");
                return;
            }
        };

        info!("Metrics server listening on http://{bind_addr}{METRICS_SERVER_PATH}");

        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {e}");
        }
    })
}

/// Leader election configuration
struct LeaderElectionConfig {
    enabled: bool,
    lease_name: String,
    lease_namespace: String,
    identity: String,
    lease_duration: u64,
    retry_period: u64,
}

/// Load leader election configuration from environment variables
fn load_leader_election_config() -> LeaderElectionConfig {
    let enabled = std::env::var("DNSGATE_ENABLE_LEADER_ELECTION")
        .unwrap_or_else(|_| "true".to_string())
        .parse::<bool>()
        .unwrap_or(true);

    let lease_name =
        std::env::var("DNSGATE_LEASE_NAME").unwrap_or_else(|_| "dnsgate-leader".to_string());

    let lease_namespace = std::env::var("DNSGATE_LEASE_NAMESPACE")
        .or_else(|_| std::env::var("POD_NAMESPACE"))
        .unwrap_or_else(|_| "dns-system".to_string());

    let lease_duration = std::env::var("DNSGATE_LEASE_DURATION_SECONDS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_LEASE_DURATION_SECS);

    let retry_period = std::env::var("DNSGATE_LEASE_RETRY_PERIOD_SECONDS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_LEASE_RETRY_PERIOD_SECS);

    let identity = std::env::var("POD_NAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| format!("dnsgate-{}", rand::random::<u32>()));

    LeaderElectionConfig {
        enabled,
        lease_name,
        lease_namespace,
        identity,
        lease_duration,
        retry_period,
    }
}

/// Create a semantic watcher configuration.
///
/// Only triggers on semantic changes (spec modifications), ignoring
/// status-only updates. The probe engine patches probe statuses on every
/// check; without this the probe controller would reconcile in a loop.
#[inline]
fn semantic_watcher_config() -> Config {
    Config::default().any_semantic()
}

async fn async_main() -> Result<()> {
    initialize_logging();

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;

    let _metrics_handle = start_metrics_server();

    // Probe engine: bounded worker pool + process-wide registry.
    let performer = ProbePerformer::new()?;
    let pool = ProbeWorkerPool::spawn(PROBE_WORKERS, PROBE_QUEUE_CAPACITY, performer);
    let monitor = Arc::new(Monitor::new(pool.queue()));
    let ctx = Arc::new(Context::new(client.clone(), Arc::clone(&monitor)));

    let config = load_leader_election_config();

    let run_result = if config.enabled {
        info!(
            lease_name = %config.lease_name,
            lease_namespace = %config.lease_namespace,
            identity = %config.identity,
            lease_duration_secs = config.lease_duration,
            "Leader election enabled"
        );

        let lease_manager = LeaseManagerBuilder::new(client.clone(), &config.lease_name)
            .with_namespace(&config.lease_namespace)
            .with_identity(&config.identity)
            .with_duration(config.lease_duration)
            .with_grace(config.retry_period)
            .build()
            .await?;

        let (leader_rx, _lease_handle) = lease_manager.watch().await;

        // Wait until we become leader
        info!("Starting leader election, waiting to acquire leadership...");
        let mut rx = leader_rx.clone();
        while !*rx.borrow_and_update() {
            rx.changed().await?;
        }
        info!("Leadership acquired, starting controllers");

        run_controllers(Arc::clone(&ctx), Some(leader_rx)).await
    } else {
        warn!("Leader election DISABLED - running without high availability");
        run_controllers(Arc::clone(&ctx), None).await
    };

    // Stop drivers before the pool so no probe update is emitted after
    // shutdown completes; outstanding executions past the deadline are
    // abandoned and their results discarded.
    info!("Stopping probe engine...");
    monitor.shutdown().await;
    pool.shutdown(Duration::from_secs(PROBE_SHUTDOWN_DEADLINE_SECS))
        .await;

    run_result?;
    info!("Graceful shutdown completed successfully");
    Ok(())
}

/// Monitor leadership status - returns when leadership is lost or an error occurs
async fn monitor_leadership(
    mut leader_rx: tokio::sync::watch::Receiver<bool>,
) -> Result<(), anyhow::Error> {
    loop {
        leader_rx.changed().await?;
        if !*leader_rx.borrow() {
            // Leadership lost
            return Ok(());
        }
    }
}

/// Run both controllers with signal handling and optional leadership
/// monitoring, until a shutdown condition is met.
async fn run_controllers(
    ctx: Arc<Context>,
    leader_rx: Option<tokio::sync::watch::Receiver<bool>>,
) -> Result<()> {
    let leadership = async {
        match leader_rx {
            Some(rx) => monitor_leadership(rx).await,
            // Without leader election, never trigger on leadership.
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        // Monitor for SIGINT (Ctrl+C)
        result = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            result.map_err(anyhow::Error::from)
        }

        // Monitor for SIGTERM (Kubernetes sends this when deleting pods)
        result = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate())?;
                sigterm.recv().await;
                Ok::<(), anyhow::Error>(())
            }
            #[cfg(not(unix))]
            {
                // On non-Unix platforms, just wait forever
                std::future::pending::<()>().await;
                Ok::<(), anyhow::Error>(())
            }
        } => {
            info!("Received SIGTERM (pod termination), initiating graceful shutdown...");
            result
        }

        result = leadership => {
            match result {
                Ok(()) => {
                    warn!("Leadership lost! Stopping all controllers...");
                    anyhow::bail!("Leadership lost - stepping down")
                }
                Err(e) => {
                    error!("Leadership monitor error: {:?}", e);
                    anyhow::bail!("Leadership monitoring failed: {e}")
                }
            }
        }

        result = run_dnspolicy_controller(Arc::clone(&ctx)) => {
            error!("CRITICAL: DNSPolicy controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("DNSPolicy controller exited unexpectedly without error")
        }

        result = run_probe_controller(ctx) => {
            error!("CRITICAL: DNSHealthCheckProbe controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("DNSHealthCheckProbe controller exited unexpectedly without error")
        }
    }
}

/// Run the `DNSPolicy` controller
///
/// Gateway addresses and probe health change without touching the policy
/// object, so the reconciler requeues itself periodically instead of
/// watching gateways directly.
async fn run_dnspolicy_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting DNSPolicy controller");

    let api = Api::<DNSPolicy>::all(ctx.client.clone());

    Controller::new(api, semantic_watcher_config())
        .shutdown_on_signal()
        .run(reconcile_dnspolicy_wrapper, error_policy_dnspolicy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the `DNSHealthCheckProbe` controller
async fn run_probe_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting DNSHealthCheckProbe controller");

    let api = Api::<DNSHealthCheckProbe>::all(ctx.client.clone());

    Controller::new(api, semantic_watcher_config())
        .shutdown_on_signal()
        .run(reconcile_probe_wrapper, error_policy_probe, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

async fn reconcile_dnspolicy_wrapper(
    policy: Arc<DNSPolicy>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    match reconcile_dnspolicy(policy, ctx).await {
        Ok(action) => {
            metrics::record_reconciliation("DNSPolicy", "success", start.elapsed());
            Ok(action)
        }
        Err(err) => {
            metrics::record_reconciliation("DNSPolicy", "error", start.elapsed());
            Err(ReconcileError(err))
        }
    }
}

async fn reconcile_probe_wrapper(
    probe: Arc<DNSHealthCheckProbe>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    match reconcile_probe(probe, ctx).await {
        Ok(action) => {
            metrics::record_reconciliation("DNSHealthCheckProbe", "success", start.elapsed());
            Ok(action)
        }
        Err(err) => {
            metrics::record_reconciliation("DNSHealthCheckProbe", "error", start.elapsed());
            Err(ReconcileError(err))
        }
    }
}

fn error_policy_dnspolicy(
    _policy: Arc<DNSPolicy>,
    error: &ReconcileError,
    _ctx: Arc<Context>,
) -> Action {
    warn!("DNSPolicy reconcile failed: {:?}", error);
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}

fn error_policy_probe(
    _probe: Arc<DNSHealthCheckProbe>,
    error: &ReconcileError,
    _ctx: Arc<Context>,
) -> Action {
    warn!("DNSHealthCheckProbe reconcile failed: {:?}", error);
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}
