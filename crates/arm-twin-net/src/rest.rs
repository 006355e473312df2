//! ---
//! twin_section: "05-networking-external-interfaces"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "REST surface for maintenance log management."
//! twin_version: "v0.1.0"
//! twin_owner: "tbd"
//! ---
use std::sync::Arc;

use arm_twin_sim::{LogEntry, LogSeverity, StateSnapshot, TwinEngine, TwinError};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Routes for out-of-band log tooling, served with and without the `/api` prefix.
pub fn router() -> Router<Arc<TwinEngine>> {
    Router::new()
        .route("/logs", get(get_logs).post(post_log).delete(delete_logs))
        .route("/api/logs", get(get_logs).post(post_log).delete(delete_logs))
        .route("/api/state", get(get_state))
}

/// Body accepted by `POST /logs`.
///
/// Both fields are optional at the serde level so a missing field is reported
/// as a 400 by the handler rather than rejected by the extractor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewLogEntry {
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl NewLogEntry {
    fn into_parts(self) -> Result<(LogSeverity, String), TwinError> {
        let severity = match self.severity.as_deref().map(str::trim) {
            None | Some("") => return Err(TwinError::MissingField("severity")),
            Some(raw) => raw.parse::<LogSeverity>()?,
        };
        match self.message {
            Some(message) if !message.trim().is_empty() => Ok((severity, message)),
            _ => Err(TwinError::MissingField("message")),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<TwinError> for ApiError {
    fn from(err: TwinError) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

async fn get_logs(State(engine): State<Arc<TwinEngine>>) -> Json<Vec<LogEntry>> {
    Json(engine.logs())
}

async fn post_log(
    State(engine): State<Arc<TwinEngine>>,
    payload: Result<Json<NewLogEntry>, JsonRejection>,
) -> Result<(StatusCode, Json<LogEntry>), ApiError> {
    let Json(request) = payload.inspect_err(|err| {
        warn!(error = %err, "rejected malformed log payload");
    })?;
    let (severity, message) = request.into_parts().inspect_err(|err| {
        warn!(error = %err, "rejected log entry");
    })?;
    let entry = engine.add_log(severity, &message)?;
    info!(id = entry.id, severity = %entry.severity, "log entry added over rest");
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn delete_logs(State(engine): State<Arc<TwinEngine>>) -> Json<LogEntry> {
    Json(engine.clear_logs())
}

async fn get_state(State(engine): State<Arc<TwinEngine>>) -> Json<StateSnapshot> {
    Json(engine.snapshot())
}
