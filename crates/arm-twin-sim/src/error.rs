//! ---
//! twin_section: "11-simulation"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Error types for the simulation core."
//! twin_version: "v0.1.0"
//! twin_owner: "tbd"
//! ---

/// Result alias used throughout the simulation crate.
pub type Result<T> = std::result::Result<T, TwinError>;

/// Errors surfaced by the simulation core to its callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TwinError {
    /// Fault key outside the fixed channel set.
    #[error("unknown fault channel: {0}")]
    UnknownFault(String),
    /// Log severity outside INFO/HIGH/CRITICAL.
    #[error("unknown log severity: {0}")]
    UnknownSeverity(String),
    /// A required field was absent or blank.
    #[error("missing {0}")]
    MissingField(&'static str),
}
