//! ---
//! twin_section: "11-simulation"
//! twin_subsection: "01-bootstrap"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Simulation runtime module exports and shared types."
//! twin_version: "v0.1.0"
//! twin_owner: "tbd"
//! ---
//! Simulation and state-management core for the robotic arm digital twin.
//!
//! [`TwinEngine`] owns the fault registry, health model, sliding window and
//! maintenance log behind a single lock; [`SimulationClock`] drives it and
//! [`EventBroadcaster`] fans its state changes out to subscribers.

pub mod clock;
pub mod engine;
pub mod error;
pub mod events;
pub mod faults;
pub mod frames;
pub mod generator;
pub mod health;
pub mod maintenance;
pub mod rules;
pub mod window;

pub use clock::{ClockHandle, SimulationClock};
pub use engine::{EngineStatus, ShutdownCause, TickOutcome, TwinEngine};
pub use error::{Result, TwinError};
pub use events::{ClientCommand, EventBroadcaster, ResetPayload, StateSnapshot, TwinEvent};
pub use faults::{FaultChannel, FaultRegistry, FaultTransition, Severity};
pub use frames::{Channel, TelemetryFrame};
pub use generator::TelemetryGenerator;
pub use health::{state_health, HealthModel, HealthReading};
pub use maintenance::{LogEntry, LogSeverity, MaintenanceLog};
pub use rules::{ChannelRule, Drift, RuleTable, SeedPattern};
pub use window::SlidingWindow;
