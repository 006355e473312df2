//! ---
//! twin_section: "11-simulation"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Composite health model: transient state health and lifetime wear."
//! twin_version: "v0.1.0"
//! twin_owner: "tbd"
//! ---
use arm_twin_common::config::HealthConfig;
use serde::{Deserialize, Serialize};

use crate::faults::{FaultRegistry, Severity};
use crate::frames::TelemetryFrame;

pub const MAX_HEALTH: f64 = 100.0;

/// Health values produced by one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthReading {
    pub state_health: f64,
    pub lifetime_health: f64,
    /// Published score: the worse of state and lifetime health.
    pub health: f64,
    pub shutdown_triggered: bool,
}

/// Health derived from one frame and the current fault severities, in `[0, 100]`.
pub fn state_health(config: &HealthConfig, frame: &TelemetryFrame, faults: &FaultRegistry) -> f64 {
    let mut health = MAX_HEALTH;
    health -= excess(frame.motor_temp, config.temp_threshold) * config.temp_penalty;
    health -= excess(frame.power, config.power_threshold) * config.power_penalty;
    health -= excess(frame.anomaly_score, config.anomaly_threshold) * config.anomaly_penalty;
    for (_, severity) in faults.iter() {
        health -= match severity {
            Severity::Ok => 0.0,
            Severity::Warning => config.warning_penalty,
            Severity::Critical => config.critical_penalty,
        };
    }
    health.clamp(0.0, MAX_HEALTH)
}

fn excess(value: f64, threshold: f64) -> f64 {
    (value - threshold).max(0.0)
}

fn published(lifetime: f64, state: f64) -> f64 {
    lifetime.min(state).clamp(0.0, MAX_HEALTH)
}

/// Tracks lifetime wear across ticks and combines it with per-frame state health.
#[derive(Debug, Clone)]
pub struct HealthModel {
    config: HealthConfig,
    state_health: f64,
    lifetime_health: f64,
    health: f64,
}

impl HealthModel {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            state_health: MAX_HEALTH,
            lifetime_health: MAX_HEALTH,
            health: MAX_HEALTH,
        }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Apply one tick of wear and score `frame`.
    ///
    /// Wear is applied unconditionally; `shutdown_triggered` is set once the
    /// published health reaches zero.
    pub fn tick(&mut self, frame: &TelemetryFrame, faults: &FaultRegistry) -> HealthReading {
        self.lifetime_health = (self.lifetime_health - self.config.wear_rate).max(0.0);
        self.evaluate(frame, faults)
    }

    /// Rescore without applying wear, e.g. after a fault toggle.
    pub fn evaluate(&mut self, frame: &TelemetryFrame, faults: &FaultRegistry) -> HealthReading {
        self.state_health = state_health(&self.config, frame, faults);
        self.health = published(self.lifetime_health, self.state_health);
        self.reading()
    }

    /// Restore full lifetime health and rescore against a fresh baseline.
    pub fn reset(&mut self, frame: &TelemetryFrame, faults: &FaultRegistry) -> HealthReading {
        self.lifetime_health = MAX_HEALTH;
        self.evaluate(frame, faults)
    }

    pub fn reading(&self) -> HealthReading {
        HealthReading {
            state_health: self.state_health,
            lifetime_health: self.lifetime_health,
            health: self.health,
            shutdown_triggered: self.health <= 0.0,
        }
    }

    pub fn health(&self) -> f64 {
        self.health
    }

    pub fn lifetime_health(&self) -> f64 {
        self.lifetime_health
    }

    #[cfg(test)]
    pub(crate) fn set_lifetime_health(&mut self, value: f64) {
        self.lifetime_health = value.clamp(0.0, MAX_HEALTH);
    }
}
