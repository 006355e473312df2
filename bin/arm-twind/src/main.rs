//! ---
//! twin_section: "01-core-functionality"
//! twin_subsection: "binary"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Binary entrypoint for the arm twin daemon."
//! twin_version: "v0.1.0"
//! twin_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use arm_twin_common::config::AppConfig;
use arm_twin_common::logging::{init_tracing, LogFormat};
use arm_twin_metrics::{new_registry, spawn_http_server, TwinMetrics};
use arm_twin_net::TwinServerBuilder;
use arm_twin_sim::{SimulationClock, TwinEngine};
use clap::{Parser, ValueEnum};
use tokio::signal;
use tracing::{info, warn};

const DEFAULT_CONFIG_PATH: &str = "configs/arm-twin.toml";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(author, version, about = "Robotic arm digital twin daemon", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "ADDR", help = "Override the WebSocket/REST listen address")]
    listen: Option<SocketAddr>,

    #[arg(long, help = "Seed the telemetry generator for reproducible runs")]
    seed: Option<u64>,

    #[arg(long, value_name = "MS", help = "Override the simulation tick period")]
    tick_ms: Option<u64>,

    #[arg(long, value_enum, help = "Override the stdout log format")]
    log_format: Option<CliLogFormat>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogFormat {
    Json,
    Pretty,
}

impl From<CliLogFormat> for LogFormat {
    fn from(value: CliLogFormat) -> Self {
        match value {
            CliLogFormat::Json => LogFormat::StructuredJson,
            CliLogFormat::Pretty => LogFormat::Pretty,
        }
    }
}

impl Cli {
    fn apply_overrides(&self, config: &mut AppConfig) -> Result<()> {
        if let Some(listen) = self.listen {
            config.server.listen = listen;
        }
        if let Some(seed) = self.seed {
            config.simulation.random_seed = Some(seed);
        }
        if let Some(tick_ms) = self.tick_ms {
            config.simulation.tick_interval = Duration::from_millis(tick_ms);
        }
        if let Some(format) = self.log_format {
            config.logging.format = format.into();
        }
        config
            .validate()
            .context("configuration invalid after command-line overrides")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from(DEFAULT_CONFIG_PATH));

    let loaded = AppConfig::load_with_source(&candidates)?;
    let mut config = loaded.config;
    cli.apply_overrides(&mut config)?;
    init_tracing("arm-twind", &config.logging)?;

    match &loaded.source {
        Some(path) => info!(config_path = %path.display(), "configuration loaded"),
        None => info!("no configuration file found; running with defaults"),
    }

    run_daemon(config).await
}

async fn run_daemon(config: AppConfig) -> Result<()> {
    let (metrics, metrics_server) = if config.metrics.enabled {
        let registry = new_registry();
        let metrics = TwinMetrics::new(registry.clone())?;
        let server = spawn_http_server(registry, config.metrics.listen)?;
        info!(address = %server.addr(), "metrics exporter enabled");
        (Some(metrics), Some(server))
    } else {
        info!("metrics exporter disabled by configuration");
        (None, None)
    };

    let engine = Arc::new(TwinEngine::from_config(&config, metrics));
    if let Some(seed) = config.simulation.random_seed {
        info!(seed, "telemetry generator seeded");
    }
    let clock = SimulationClock::for_engine(&engine).spawn(engine.clone());

    let server = TwinServerBuilder::new(config.server.listen, engine.clone())
        .spawn()
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen))?;

    info!(address = %server.local_addr(), "daemon running; waiting for termination signal");
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");

    if let Err(err) = clock.stop().await {
        warn!(error = %err, "simulation clock task failed");
    }
    match tokio::time::timeout(SHUTDOWN_GRACE, server.shutdown()).await {
        Ok(result) => result?,
        Err(_) => warn!("server did not drain within the shutdown grace period"),
    }
    if let Some(server) = metrics_server {
        server.shutdown().await?;
    }

    let status = engine.status();
    info!(
        ticks = status.ticks,
        health = status.reading.health,
        is_shutdown = status.is_shutdown,
        "daemon stopped"
    );
    Ok(())
}
