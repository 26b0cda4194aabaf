use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uptime_store::{Check, Command};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCheckRequest {
    id: Option<String>,
    url: String,
    method: Option<String>,
    interval_seconds: Option<u64>,
    #[serde(default)]
    webhooks: Vec<String>,
    #[serde(default)]
    emails: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ListChecksResponse {
    checks: Vec<Check>,
}

/// Lists every check after a consensus barrier, so the response reflects every write
/// acknowledged before this request arrived.
pub async fn list_checks(State(state): State<AppState>) -> Result<Json<ListChecksResponse>, ApiError> {
    state.consensus.barrier().await?;
    Ok(Json(ListChecksResponse {
        checks: state.store.list_checks(),
    }))
}

pub async fn get_check(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Check>, ApiError> {
    state.store.get_check(&id).map(Json).ok_or(ApiError::CheckNotFound)
}

pub async fn create_check(
    State(state): State<AppState>,
    Json(request): Json<CreateCheckRequest>,
) -> Result<(StatusCode, Json<Check>), ApiError> {
    let mut check = Check::new(request.id, request.url, request.method, request.interval_seconds);
    check.webhooks = request.webhooks;
    check.emails = request.emails;

    state
        .consensus
        .submit(Command::UpsertCheck(check.clone()).encode())
        .await?;
    let _ = state.check_reload_tx.send(());

    Ok((StatusCode::CREATED, Json(check)))
}

pub async fn delete_check(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.consensus.submit(Command::DeleteCheck(id).encode()).await?;
    let _ = state.check_reload_tx.send(());
    Ok(StatusCode::NO_CONTENT)
}
