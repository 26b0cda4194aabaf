use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use crate::state::AppState;

/// Redirects every write (`POST`/`DELETE`) to the elected leader's admin address before
/// the handler runs, so handlers never need to reason about their own leadership.
/// `GET`s and the internal `/_raft/step` route pass through untouched.
pub async fn redirect_writes_to_leader(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let is_write = matches!(*request.method(), Method::POST | Method::DELETE);
    if !is_write || request.uri().path() == "/_raft/step" {
        return next.run(request).await;
    }

    match state.consensus.leader_address() {
        Some(leader) if leader == state.self_api_addr => next.run(request).await,
        Some(leader) => {
            let target = format!("http://{}{}", leader, request.uri());
            Redirect::temporary(&target).into_response()
        }
        None => (StatusCode::SERVICE_UNAVAILABLE, "no leader elected").into_response(),
    }
}
