//! ---
//! twin_section: "11-simulation"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Outbound events, inbound commands and the subscriber fan-out."
//! twin_version: "v0.1.0"
//! twin_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::faults::{FaultChannel, FaultRegistry};
use crate::frames::TelemetryFrame;
use crate::maintenance::LogEntry;

/// Consolidated state sent to a subscriber when it joins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub frames: Vec<TelemetryFrame>,
    pub health: f64,
    pub faults: FaultRegistry,
    pub logs: Vec<LogEntry>,
    pub is_shutdown: bool,
}

/// State broadcast after a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPayload {
    pub frames: Vec<TelemetryFrame>,
    pub health: f64,
    pub faults: FaultRegistry,
    pub is_shutdown: bool,
}

/// Named event pushed to subscribers, encoded as `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum TwinEvent {
    InitialData(StateSnapshot),
    NewData(TelemetryFrame),
    HealthUpdate(f64),
    FaultUpdate(FaultRegistry),
    LogUpdate(Vec<LogEntry>),
    Shutdown(String),
    SystemReset(ResetPayload),
}

impl TwinEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TwinEvent::InitialData(_) => "initialData",
            TwinEvent::NewData(_) => "newData",
            TwinEvent::HealthUpdate(_) => "healthUpdate",
            TwinEvent::FaultUpdate(_) => "faultUpdate",
            TwinEvent::LogUpdate(_) => "logUpdate",
            TwinEvent::Shutdown(_) => "shutdown",
            TwinEvent::SystemReset(_) => "systemReset",
        }
    }
}

/// Fire-and-forget command sent by a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum ClientCommand {
    ToggleFault { fault: FaultChannel },
    RestartSystem,
    ShutdownSystem,
}

/// Fans events out to every live subscriber without blocking the publisher.
///
/// Each subscriber owns a bounded queue; one that falls behind loses its
/// oldest events instead of stalling the others.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<TwinEvent>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish to current subscribers and return how many were reached.
    pub fn publish(&self, event: TwinEvent) -> usize {
        let name = event.name();
        match self.tx.send(event) {
            Ok(reached) => reached,
            Err(_) => {
                trace!(event = name, "no subscribers for event");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TwinEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
