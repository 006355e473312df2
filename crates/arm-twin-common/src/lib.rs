//! ---
//! twin_section: "01-core-functionality"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Shared primitives and utilities for the twin runtime."
//! twin_version: "v0.1.0"
//! twin_owner: "tbd"
//! ---
//! Core shared primitives for the arm twin workspace: configuration loading
//! and tracing setup consumed by the simulation core and the daemon.

pub mod config;
pub mod logging;

pub use config::{
    AppConfig, HealthConfig, LoadedAppConfig, LoggingConfig, MetricsConfig, ServerConfig,
    SimulationConfig,
};
pub use logging::{init_tracing, LogFormat};
