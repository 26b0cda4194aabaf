use axum::extract::Query;
use axum::Json;
use serde::Deserialize;
use uptime_probe::Probe;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct PingParams {
    method: String,
    url: String,
}

/// Executes a local probe against `url` using `method` and reports the result, used by
/// peers cross-verifying a leader-observed outage.
pub async fn ping(Query(params): Query<PingParams>) -> Result<Json<Probe>, ApiError> {
    let probe = uptime_probe::probe(&params.method, &params.url).await?;
    Ok(Json(probe))
}
