use axum::extract::State;
use axum::http::StatusCode;
use bytes::Bytes;
use protobuf::Message;
use raft::prelude::Message as RaftMessage;

use crate::error::ApiError;
use crate::state::AppState;

/// Internal replication endpoint: hands a protobuf-encoded `raft::prelude::Message` to
/// the local node. Not part of the JSON admin contract and never redirected.
pub async fn step(State(state): State<AppState>, body: Bytes) -> Result<StatusCode, ApiError> {
    let message = RaftMessage::parse_from_bytes(&body)
        .map_err(|e| ApiError::MalformedRaftMessage(e.to_string()))?;
    state.raft.step(message).await;
    Ok(StatusCode::NO_CONTENT)
}
