//! Control-surface error taxonomy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::sink::SinkError;

#[derive(Debug, Error)]
pub enum SimulatorError {
    /// Route/stop sources unreachable or unparsable; the run never starts.
    #[error("failed to load route and stop sources: {0}")]
    SourceLoad(String),
    /// `start` while a run is active and not paused.
    #[error("simulator already running")]
    AlreadyRunning,
    /// `pause` or `stop` without an active run.
    #[error("simulator not running")]
    NotRunning,
    /// `continue` while already running.
    #[error("simulator not paused")]
    NotPaused,
    /// `continue` before any run was started.
    #[error("simulator not started")]
    NotStarted,
    /// A sink write failed; fatal for the current run.
    #[error("event dispatch failed: {0}")]
    Dispatch(#[from] SinkError),
}

pub type Result<T> = std::result::Result<T, SimulatorError>;

impl IntoResponse for SimulatorError {
    fn into_response(self) -> Response {
        let status = match &self {
            SimulatorError::AlreadyRunning
            | SimulatorError::NotRunning
            | SimulatorError::NotPaused
            | SimulatorError::NotStarted => StatusCode::CONFLICT,
            SimulatorError::SourceLoad(_) | SimulatorError::Dispatch(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}
