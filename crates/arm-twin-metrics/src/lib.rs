//! ---
//! twin_section: "03-observability"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Metrics collection and export utilities."
//! twin_version: "v0.1.0"
//! twin_owner: "tbd"
//! ---
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, StatusCode};
use axum::routing::get;
use axum::{response::IntoResponse, Router};
use prometheus::{
    Gauge, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Shared registry type used across the workspace.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Spawn an HTTP server that exposes the registry at `/metrics`.
pub fn spawn_http_server(registry: SharedRegistry, addr: SocketAddr) -> Result<MetricsServer> {
    let app = Router::new().route(
        "/metrics",
        get({
            let registry = registry.clone();
            move || metrics_handler(registry.clone())
        }),
    );

    let std_listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind metrics listener {}", addr))?;
    std_listener
        .set_nonblocking(true)
        .with_context(|| "failed to configure metrics listener as non-blocking")?;
    let local_addr = std_listener
        .local_addr()
        .with_context(|| "failed to resolve metrics listener address")?;
    let listener = TcpListener::from_std(std_listener)
        .with_context(|| "failed to convert std listener into tokio listener")?;

    info!(address = %local_addr, "metrics server starting");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .context("metrics server encountered an error")?;
        Ok(())
    });

    Ok(MetricsServer {
        addr: local_addr,
        shutdown: Some(shutdown_tx),
        task: handle,
    })
}

async fn metrics_handler(registry: SharedRegistry) -> impl IntoResponse {
    let families = registry.gather();
    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&families) {
        Ok(body) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static(prometheus::TEXT_FORMAT),
            )],
            body,
        ),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"))],
                String::from("metrics encoding error"),
            )
        }
    }
}

/// Handle to the running HTTP exporter.
#[derive(Debug)]
pub struct MetricsServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl MetricsServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal shutdown and await task completion.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err),
            Err(join_err) => Err(anyhow::Error::new(join_err)),
        }
    }
}

/// Instruments recorded by the simulation engine and transport.
#[derive(Clone, Debug)]
pub struct TwinMetrics {
    registry: SharedRegistry,
    ticks_total: IntCounter,
    health: Gauge,
    state_health: Gauge,
    lifetime_health: Gauge,
    fault_severity: IntGaugeVec,
    shutdowns: IntCounterVec,
    log_entries: IntGauge,
    subscribers: IntGauge,
}

impl TwinMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let ticks_total = IntCounter::with_opts(Opts::new(
            "arm_twin_ticks_total",
            "Simulation steps executed since start",
        ))?;
        registry.register(Box::new(ticks_total.clone()))?;

        let health = Gauge::with_opts(Opts::new(
            "arm_twin_health",
            "Published health score (worse of state and lifetime health)",
        ))?;
        registry.register(Box::new(health.clone()))?;

        let state_health = Gauge::with_opts(Opts::new(
            "arm_twin_state_health",
            "Health derived from the latest frame and active faults",
        ))?;
        registry.register(Box::new(state_health.clone()))?;

        let lifetime_health = Gauge::with_opts(Opts::new(
            "arm_twin_lifetime_health",
            "Cumulative wear floor, reset only by a restart",
        ))?;
        registry.register(Box::new(lifetime_health.clone()))?;

        let fault_severity = IntGaugeVec::new(
            Opts::new(
                "arm_twin_fault_severity",
                "Fault channel severity (0 = OK, 1 = Warning, 2 = Critical)",
            ),
            &["fault"],
        )?;
        registry.register(Box::new(fault_severity.clone()))?;

        let shutdowns = IntCounterVec::new(
            Opts::new("arm_twin_shutdowns_total", "Shutdowns by trigger"),
            &["reason"],
        )?;
        registry.register(Box::new(shutdowns.clone()))?;

        let log_entries = IntGauge::with_opts(Opts::new(
            "arm_twin_maintenance_log_entries",
            "Entries currently retained in the maintenance log",
        ))?;
        registry.register(Box::new(log_entries.clone()))?;

        let subscribers = IntGauge::with_opts(Opts::new(
            "arm_twin_subscribers",
            "Connected event subscribers",
        ))?;
        registry.register(Box::new(subscribers.clone()))?;

        Ok(Self {
            registry,
            ticks_total,
            health,
            state_health,
            lifetime_health,
            fault_severity,
            shutdowns,
            log_entries,
            subscribers,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn inc_tick(&self) {
        self.ticks_total.inc();
    }

    pub fn set_health(&self, state: f64, lifetime: f64, published: f64) {
        self.state_health.set(state);
        self.lifetime_health.set(lifetime);
        self.health.set(published);
    }

    pub fn set_fault_level(&self, fault: &str, level: i64) {
        self.fault_severity.with_label_values(&[fault]).set(level);
    }

    pub fn record_shutdown(&self, reason: &str) {
        self.shutdowns.with_label_values(&[reason]).inc();
    }

    pub fn set_log_entries(&self, count: usize) {
        self.log_entries.set(count as i64);
    }

    pub fn subscriber_connected(&self) {
        self.subscribers.inc();
    }

    pub fn subscriber_disconnected(&self) {
        self.subscribers.dec();
    }
}
