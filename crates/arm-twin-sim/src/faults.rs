//! ---
//! twin_section: "11-simulation"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Fault channels and the severity cycle driven by operators."
//! twin_version: "v0.1.0"
//! twin_owner: "tbd"
//! ---
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::TwinError;
use crate::maintenance::LogSeverity;

/// One of the six independently toggleable failure modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FaultChannel {
    Overheating,
    TorqueImbalance,
    EncoderLoss,
    PowerFluctuation,
    GripperMalfunction,
    CommDelay,
}

impl FaultChannel {
    pub const ALL: [FaultChannel; 6] = [
        FaultChannel::Overheating,
        FaultChannel::TorqueImbalance,
        FaultChannel::EncoderLoss,
        FaultChannel::PowerFluctuation,
        FaultChannel::GripperMalfunction,
        FaultChannel::CommDelay,
    ];

    pub fn key(self) -> &'static str {
        match self {
            FaultChannel::Overheating => "overheating",
            FaultChannel::TorqueImbalance => "torqueImbalance",
            FaultChannel::EncoderLoss => "encoderLoss",
            FaultChannel::PowerFluctuation => "powerFluctuation",
            FaultChannel::GripperMalfunction => "gripperMalfunction",
            FaultChannel::CommDelay => "commDelay",
        }
    }

    /// Operator-facing name used in maintenance log messages.
    pub fn display_name(self) -> &'static str {
        match self {
            FaultChannel::Overheating => "Motor Overheating",
            FaultChannel::TorqueImbalance => "Torque Imbalance",
            FaultChannel::EncoderLoss => "Encoder Signal Loss",
            FaultChannel::PowerFluctuation => "Power Fluctuation",
            FaultChannel::GripperMalfunction => "Gripper Malfunction",
            FaultChannel::CommDelay => "Communication Delay",
        }
    }
}

impl fmt::Display for FaultChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for FaultChannel {
    type Err = TwinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FaultChannel::ALL
            .into_iter()
            .find(|channel| channel.key() == s)
            .ok_or_else(|| TwinError::UnknownFault(s.to_owned()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Severity {
    #[default]
    #[serde(rename = "OK")]
    Ok,
    Warning,
    Critical,
}

impl Severity {
    /// Next step in the OK -> Warning -> Critical -> OK cycle.
    pub fn next(self) -> Self {
        match self {
            Severity::Ok => Severity::Warning,
            Severity::Warning => Severity::Critical,
            Severity::Critical => Severity::Ok,
        }
    }

    pub fn is_active(self) -> bool {
        self != Severity::Ok
    }

    /// Numeric level exported as a metric.
    pub fn level(self) -> i64 {
        match self {
            Severity::Ok => 0,
            Severity::Warning => 1,
            Severity::Critical => 2,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Ok => f.write_str("OK"),
            Severity::Warning => f.write_str("Warning"),
            Severity::Critical => f.write_str("Critical"),
        }
    }
}

/// Outcome of a single toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultTransition {
    pub channel: FaultChannel,
    pub previous: Severity,
    pub current: Severity,
}

impl FaultTransition {
    /// Log entry owed for this transition; returning to OK is silent.
    pub fn log_entry(&self) -> Option<(LogSeverity, String)> {
        let severity = match self.current {
            Severity::Ok => return None,
            Severity::Warning => LogSeverity::High,
            Severity::Critical => LogSeverity::Critical,
        };
        Some((
            severity,
            format!("{} - {}", self.channel.display_name(), self.current),
        ))
    }
}

/// Fixed set of fault channels, always holding all six keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FaultRegistry {
    channels: IndexMap<FaultChannel, Severity>,
}

impl<'de> Deserialize<'de> for FaultRegistry {
    /// Channels absent from the input are filled in as OK.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parsed = IndexMap::<FaultChannel, Severity>::deserialize(deserializer)?;
        Ok(Self {
            channels: FaultChannel::ALL
                .into_iter()
                .map(|channel| (channel, parsed.get(&channel).copied().unwrap_or_default()))
                .collect(),
        })
    }
}

impl Default for FaultRegistry {
    fn default() -> Self {
        Self {
            channels: FaultChannel::ALL
                .into_iter()
                .map(|channel| (channel, Severity::Ok))
                .collect(),
        }
    }
}

impl FaultRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn severity(&self, channel: FaultChannel) -> Severity {
        self.channels.get(&channel).copied().unwrap_or_default()
    }

    pub fn is_active(&self, channel: FaultChannel) -> bool {
        self.severity(channel).is_active()
    }

    pub fn toggle(&mut self, channel: FaultChannel) -> FaultTransition {
        let slot = self.channels.entry(channel).or_default();
        let previous = *slot;
        *slot = previous.next();
        FaultTransition {
            channel,
            previous,
            current: *slot,
        }
    }

    pub fn reset(&mut self) {
        for severity in self.channels.values_mut() {
            *severity = Severity::Ok;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (FaultChannel, Severity)> + '_ {
        self.channels.iter().map(|(channel, severity)| (*channel, *severity))
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.channels.values().filter(|s| **s == severity).count()
    }
}
