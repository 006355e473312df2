//! ---
//! twin_section: "11-simulation"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Owned state aggregate serialising ticks and operator commands."
//! twin_version: "v0.1.0"
//! twin_owner: "tbd"
//! ---
use std::time::Duration;

use arm_twin_common::config::{AppConfig, HealthConfig, SimulationConfig};
use arm_twin_metrics::TwinMetrics;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::error::{Result, TwinError};
use crate::events::{ClientCommand, EventBroadcaster, ResetPayload, StateSnapshot, TwinEvent};
use crate::faults::{FaultChannel, FaultRegistry, Severity};
use crate::frames::TelemetryFrame;
use crate::generator::TelemetryGenerator;
use crate::health::{HealthModel, HealthReading};
use crate::maintenance::{LogEntry, LogSeverity, MaintenanceLog};
use crate::window::SlidingWindow;

/// Why the system latched into shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCause {
    HealthDepleted,
    Manual,
}

impl ShutdownCause {
    fn log_entry(self) -> (LogSeverity, &'static str) {
        match self {
            ShutdownCause::HealthDepleted => {
                (LogSeverity::Critical, "Emergency shutdown - Health depleted")
            }
            ShutdownCause::Manual => (LogSeverity::Info, "System manually shutdown"),
        }
    }

    fn reason(self) -> &'static str {
        match self {
            ShutdownCause::HealthDepleted => "EMERGENCY SHUTDOWN: health depleted",
            ShutdownCause::Manual => "System manually shutdown",
        }
    }

    fn label(self) -> &'static str {
        match self {
            ShutdownCause::HealthDepleted => "health_depleted",
            ShutdownCause::Manual => "manual",
        }
    }
}

/// Result of one simulation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// The system is shut down; nothing was generated.
    Inert,
    /// A frame was generated and `newData`/`healthUpdate` were broadcast.
    Published(TelemetryFrame, HealthReading),
    /// Health reached zero on this step and the system latched into shutdown.
    Shutdown(TelemetryFrame, HealthReading),
}

/// Point-in-time view used by diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EngineStatus {
    pub reading: HealthReading,
    pub is_shutdown: bool,
    pub ticks: u64,
    pub window_len: usize,
    pub log_len: usize,
}

struct TwinState {
    faults: FaultRegistry,
    generator: TelemetryGenerator,
    health: HealthModel,
    window: SlidingWindow,
    log: MaintenanceLog,
    is_shutdown: bool,
    ticks: u64,
}

/// Single owner of the twin's mutable state.
///
/// Every handler runs to completion under one lock, so clock ticks, socket
/// commands and REST log edits never interleave. Events are published while
/// the lock is held, which keeps their order identical to the order of the
/// mutations; publishing never blocks.
pub struct TwinEngine {
    state: Mutex<TwinState>,
    broadcaster: EventBroadcaster,
    run_gate: watch::Sender<bool>,
    metrics: Option<TwinMetrics>,
    seed_frames: usize,
    tick_interval: Duration,
}

impl std::fmt::Debug for TwinEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwinEngine")
            .field("seed_frames", &self.seed_frames)
            .field("tick_interval", &self.tick_interval)
            .finish_non_exhaustive()
    }
}

impl TwinEngine {
    pub fn from_config(config: &AppConfig, metrics: Option<TwinMetrics>) -> Self {
        Self::new(
            &config.simulation,
            config.health,
            EventBroadcaster::new(config.server.event_buffer),
            metrics,
        )
    }

    pub fn new(
        simulation: &SimulationConfig,
        health: HealthConfig,
        broadcaster: EventBroadcaster,
        metrics: Option<TwinMetrics>,
    ) -> Self {
        let mut generator = TelemetryGenerator::new(simulation.random_seed);
        let mut window = SlidingWindow::new(simulation.window_capacity);
        let seed_frames = simulation.seed_frames.clamp(1, window.capacity());
        if seed_frames != simulation.seed_frames {
            warn!(
                requested = simulation.seed_frames,
                seed_frames,
                window_capacity = window.capacity(),
                "seed length adjusted to fit the window"
            );
        }
        window.reseed(generator.seed(seed_frames, simulation.tick_interval));
        let faults = FaultRegistry::new();
        let mut health = HealthModel::new(health);
        if let Some(latest) = window.latest() {
            health.reset(latest, &faults);
        }
        let (run_gate, _) = watch::channel(true);

        let engine = Self {
            state: Mutex::new(TwinState {
                faults,
                generator,
                health,
                window,
                log: MaintenanceLog::new(simulation.log_capacity),
                is_shutdown: false,
                ticks: 0,
            }),
            broadcaster,
            run_gate,
            metrics,
            seed_frames,
            tick_interval: simulation.tick_interval,
        };
        engine.record_state_metrics(&engine.state.lock());
        engine
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    pub fn metrics(&self) -> Option<&TwinMetrics> {
        self.metrics.as_ref()
    }

    /// Receiver that reads `true` while the clock should be producing ticks.
    pub fn run_state(&self) -> watch::Receiver<bool> {
        self.run_gate.subscribe()
    }

    /// Execute one simulation step.
    pub fn tick(&self) -> TickOutcome {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.is_shutdown {
            return TickOutcome::Inert;
        }

        let previous = self.fresh_baseline(state);
        let frame = state.generator.next(&previous, &state.faults);
        state.window.push(frame);
        let reading = state.health.tick(&frame, &state.faults);
        state.ticks += 1;

        if let Some(metrics) = &self.metrics {
            metrics.inc_tick();
            metrics.set_health(reading.state_health, reading.lifetime_health, reading.health);
        }
        debug!(
            tick = state.ticks,
            health = reading.health,
            state_health = reading.state_health,
            lifetime_health = reading.lifetime_health,
            "simulation tick"
        );

        if reading.shutdown_triggered {
            self.enter_shutdown(state, ShutdownCause::HealthDepleted);
            return TickOutcome::Shutdown(frame, reading);
        }

        self.broadcaster.publish(TwinEvent::NewData(frame));
        self.broadcaster.publish(TwinEvent::HealthUpdate(reading.health));
        TickOutcome::Published(frame, reading)
    }

    /// Advance `channel` one step through its severity cycle.
    ///
    /// While shut down the request is ignored and the unchanged severity is returned.
    pub fn toggle_fault(&self, channel: FaultChannel) -> Severity {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.is_shutdown {
            debug!(fault = %channel, "fault toggle ignored while shut down");
            return state.faults.severity(channel);
        }

        let transition = state.faults.toggle(channel);
        info!(
            fault = %channel,
            from = %transition.previous,
            to = %transition.current,
            "fault channel toggled"
        );
        if let Some(metrics) = &self.metrics {
            metrics.set_fault_level(channel.key(), transition.current.level());
        }
        if let Some((severity, message)) = transition.log_entry() {
            self.append_log(state, severity, message);
        }
        self.broadcaster
            .publish(TwinEvent::FaultUpdate(state.faults.clone()));
        transition.current
    }

    /// Bring the system back to a fresh baseline and re-arm the clock.
    pub fn restart(&self) -> HealthReading {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.is_shutdown = false;
        state.faults.reset();
        let seeded = state.generator.seed(self.seed_frames, self.tick_interval);
        state.window.reseed(seeded);
        let baseline = self.fresh_baseline(state);
        let reading = state.health.reset(&baseline, &state.faults);

        info!(health = reading.health, "system restarted");
        self.record_state_metrics(state);
        self.append_log(state, LogSeverity::Info, "System restarted successfully");
        self.broadcaster.publish(TwinEvent::SystemReset(ResetPayload {
            frames: state.window.frames(),
            health: reading.health,
            faults: state.faults.clone(),
            is_shutdown: false,
        }));
        self.run_gate.send_replace(true);
        reading
    }

    /// Operator-requested shutdown. Returns `false` when already shut down.
    pub fn shutdown(&self) -> bool {
        let mut state = self.state.lock();
        if state.is_shutdown {
            debug!("shutdown ignored; system already shut down");
            return false;
        }
        self.enter_shutdown(&mut state, ShutdownCause::Manual);
        true
    }

    pub fn handle_command(&self, command: ClientCommand) {
        match command {
            ClientCommand::ToggleFault { fault } => {
                self.toggle_fault(fault);
            }
            ClientCommand::RestartSystem => {
                self.restart();
            }
            ClientCommand::ShutdownSystem => {
                self.shutdown();
            }
        }
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.state.lock().log.entries()
    }

    /// Append an operator-supplied entry; blank messages are rejected.
    pub fn add_log(&self, severity: LogSeverity, message: &str) -> Result<LogEntry> {
        let message = message.trim();
        if message.is_empty() {
            return Err(TwinError::MissingField("message"));
        }
        let mut state = self.state.lock();
        Ok(self.append_log(&mut state, severity, message))
    }

    /// Empty the log, then record the clear itself.
    pub fn clear_logs(&self) -> LogEntry {
        let mut state = self.state.lock();
        state.log.clear();
        info!("maintenance log cleared");
        self.append_log(&mut state, LogSeverity::Info, "Logs cleared")
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let state = self.state.lock();
        Self::snapshot_of(&state)
    }

    /// Register a subscriber and capture its initial snapshot atomically, so
    /// no event falls between the two.
    pub fn subscribe(&self) -> (StateSnapshot, broadcast::Receiver<TwinEvent>) {
        let state = self.state.lock();
        let receiver = self.broadcaster.subscribe();
        (Self::snapshot_of(&state), receiver)
    }

    pub fn status(&self) -> EngineStatus {
        let state = self.state.lock();
        EngineStatus {
            reading: state.health.reading(),
            is_shutdown: state.is_shutdown,
            ticks: state.ticks,
            window_len: state.window.len(),
            log_len: state.log.len(),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.state.lock().is_shutdown
    }

    pub fn faults(&self) -> FaultRegistry {
        self.state.lock().faults.clone()
    }

    pub fn frames(&self) -> Vec<TelemetryFrame> {
        self.state.lock().window.frames()
    }

    fn snapshot_of(state: &TwinState) -> StateSnapshot {
        StateSnapshot {
            frames: state.window.frames(),
            health: state.health.health(),
            faults: state.faults.clone(),
            logs: state.log.entries(),
            is_shutdown: state.is_shutdown,
        }
    }

    fn enter_shutdown(&self, state: &mut TwinState, cause: ShutdownCause) {
        state.is_shutdown = true;
        self.run_gate.send_replace(false);
        warn!(cause = cause.label(), health = state.health.health(), "system shut down");
        if let Some(metrics) = &self.metrics {
            metrics.record_shutdown(cause.label());
        }
        let (severity, message) = cause.log_entry();
        self.append_log(state, severity, message);
        self.broadcaster
            .publish(TwinEvent::Shutdown(cause.reason().to_owned()));
    }

    fn append_log(
        &self,
        state: &mut TwinState,
        severity: LogSeverity,
        message: impl Into<String>,
    ) -> LogEntry {
        let entry = state.log.append(severity, message).clone();
        if let Some(metrics) = &self.metrics {
            metrics.set_log_entries(state.log.len());
        }
        self.broadcaster
            .publish(TwinEvent::LogUpdate(state.log.entries()));
        entry
    }

    /// Latest window frame, reseeding the window first if it is empty.
    fn fresh_baseline(&self, state: &mut TwinState) -> TelemetryFrame {
        if let Some(frame) = state.window.latest() {
            return *frame;
        }
        let seeded = state.generator.seed(self.seed_frames, self.tick_interval);
        state.window.reseed(seeded);
        match state.window.latest() {
            Some(frame) => *frame,
            None => TelemetryFrame::zeroed(chrono::Utc::now()),
        }
    }

    fn record_state_metrics(&self, state: &TwinState) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        let reading = state.health.reading();
        metrics.set_health(reading.state_health, reading.lifetime_health, reading.health);
        for (channel, severity) in state.faults.iter() {
            metrics.set_fault_level(channel.key(), severity.level());
        }
        metrics.set_log_entries(state.log.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> TwinEngine {
        let simulation = SimulationConfig {
            random_seed: Some(17),
            ..SimulationConfig::default()
        };
        TwinEngine::new(
            &simulation,
            HealthConfig::default(),
            EventBroadcaster::new(64),
            None,
        )
    }

    #[test]
    fn starts_seeded_and_healthy() {
        let engine = engine();
        let status = engine.status();
        assert_eq!(status.window_len, 20);
        assert_eq!(status.log_len, 0);
        assert!(!status.is_shutdown);
        assert_eq!(status.reading.lifetime_health, 100.0);
        assert!(*engine.run_state().borrow());
    }

    #[test]
    fn tick_keeps_window_bounded() {
        let engine = engine();
        for _ in 0..30 {
            assert!(matches!(engine.tick(), TickOutcome::Published(..)));
        }
        let status = engine.status();
        assert_eq!(status.window_len, 20);
        assert_eq!(status.ticks, 30);
    }

    #[test]
    fn shutdown_latches_until_restart() {
        let engine = engine();
        assert!(engine.shutdown());
        assert!(!engine.shutdown());
        assert!(!*engine.run_state().borrow());
        assert_eq!(engine.tick(), TickOutcome::Inert);
        assert_eq!(engine.toggle_fault(FaultChannel::Overheating), Severity::Ok);
        assert_eq!(engine.logs().len(), 1);

        engine.restart();
        assert!(!engine.is_shutdown());
        assert!(*engine.run_state().borrow());
        assert!(matches!(engine.tick(), TickOutcome::Published(..)));
    }

    #[test]
    fn add_log_rejects_blank_messages() {
        let engine = engine();
        assert_eq!(
            engine.add_log(LogSeverity::Info, "   "),
            Err(TwinError::MissingField("message"))
        );
        assert!(engine.logs().is_empty());
        let entry = engine.add_log(LogSeverity::High, "belt check").unwrap();
        assert_eq!(entry.message, "belt check");
    }

    #[test]
    fn oversized_seed_is_capped_at_window_capacity() {
        let simulation = SimulationConfig {
            window_capacity: 5,
            seed_frames: 8,
            random_seed: Some(3),
            ..SimulationConfig::default()
        };
        let engine = TwinEngine::new(
            &simulation,
            HealthConfig::default(),
            EventBroadcaster::new(16),
            None,
        );
        assert_eq!(engine.status().window_len, 5);
        let mut rx = engine.broadcaster().subscribe();

        engine.shutdown();
        engine.restart();
        assert_eq!(engine.frames().len(), 5);
        let reset = std::iter::from_fn(|| rx.try_recv().ok())
            .find_map(|event| match event {
                TwinEvent::SystemReset(payload) => Some(payload),
                _ => None,
            })
            .unwrap();
        assert_eq!(reset.frames.len(), 5);
    }

    #[test]
    fn clear_leaves_a_single_marker_entry() {
        let engine = engine();
        engine.add_log(LogSeverity::Info, "one").unwrap();
        engine.add_log(LogSeverity::Info, "two").unwrap();
        let marker = engine.clear_logs();
        let logs = engine.logs();
        assert_eq!(logs, vec![marker]);
        assert_eq!(logs[0].message, "Logs cleared");
        assert_eq!(logs[0].severity, LogSeverity::Info);
    }
}
