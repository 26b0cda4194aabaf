use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use uptime_consensus::ConsensusError;
use uptime_probe::ProbeEngineError;
use uptime_store::StoreError;

#[derive(Debug, Serialize)]
struct ProblemDetails {
    title: String,
    detail: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorWrapper {
    error: ProblemDetails,
}

/// Aggregates every subsystem's error type at the admin-API boundary and maps each
/// variant to an HTTP status, matching the `control` crate's `AppError` shape.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("check not found")]
    CheckNotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Consensus(#[from] ConsensusError),
    #[error(transparent)]
    Probe(#[from] ProbeEngineError),
    #[error("malformed raft message: {0}")]
    MalformedRaftMessage(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::CheckNotFound => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::MalformedCommand(_)) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::UnknownCommandTag(_)) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::CheckNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::SnapshotCorrupt(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Consensus(ConsensusError::NoLeader) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Consensus(ConsensusError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Consensus(ConsensusError::Transport(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Probe(ProbeEngineError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::MalformedRaftMessage(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "admin API request failed");
        }
        let body = ErrorWrapper {
            error: ProblemDetails {
                title: self.to_string(),
                detail: std::error::Error::source(&self).map(ToString::to_string),
            },
        };
        (status, Json(body)).into_response()
    }
}
