//! ---
//! twin_section: "11-simulation"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Bounded newest-first maintenance log."
//! twin_version: "v0.1.0"
//! twin_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TwinError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogSeverity {
    Info,
    High,
    Critical,
}

impl LogSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            LogSeverity::Info => "INFO",
            LogSeverity::High => "HIGH",
            LogSeverity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogSeverity {
    type Err = TwinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INFO" => Ok(LogSeverity::Info),
            "HIGH" => Ok(LogSeverity::High),
            "CRITICAL" => Ok(LogSeverity::Critical),
            _ => Err(TwinError::UnknownSeverity(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Strictly increasing across the process lifetime.
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub severity: LogSeverity,
    pub message: String,
}

/// Operational event log, newest entry first.
#[derive(Debug, Clone)]
pub struct MaintenanceLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    last_id: u64,
}

impl MaintenanceLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            last_id: 0,
        }
    }

    /// Insert at the front, evicting the oldest entry once full.
    pub fn append(&mut self, severity: LogSeverity, message: impl Into<String>) -> &LogEntry {
        let timestamp = Utc::now();
        let millis = u64::try_from(timestamp.timestamp_millis()).unwrap_or(0);
        self.last_id = millis.max(self.last_id + 1);
        self.entries.push_front(LogEntry {
            id: self.last_id,
            timestamp,
            severity,
            message: message.into(),
        });
        self.entries.truncate(self.capacity);
        &self.entries[0]
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
