//! ---
//! twin_section: "05-networking-external-interfaces"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Network surfaces exposing the twin engine."
//! twin_version: "v0.1.0"
//! twin_owner: "tbd"
//! ---
//! Transport for the arm twin: a WebSocket stream at `/ws` that pushes
//! engine events and accepts fault/restart/shutdown commands, plus REST
//! endpoints for the maintenance log. Both share one axum listener.

pub mod rest;
pub mod server;
pub mod websocket;

pub use rest::{ApiError, NewLogEntry};
pub use server::{TwinServerBuilder, TwinServerHandle};
pub use websocket::INVALID_COMMAND_REPLY;
