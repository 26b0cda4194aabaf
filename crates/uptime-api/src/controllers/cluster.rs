use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ClusterResponse {
    peers: Vec<String>,
    leader: Option<String>,
}

pub async fn cluster(State(state): State<AppState>) -> Json<ClusterResponse> {
    Json(ClusterResponse {
        peers: state.consensus.peers(),
        leader: state.consensus.leader_address(),
    })
}

/// Liveness probe for an external orchestrator, not consulted by peers.
pub async fn health_check() -> String {
    Utc::now().to_rfc3339()
}
