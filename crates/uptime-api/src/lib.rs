//! Admin HTTP API (C8): CRUD over checks, cluster introspection, and the peer-probe
//! endpoint, fronted by a middleware that redirects writes away from followers so every
//! handler can assume it runs on the leader.

mod controllers;
mod error;
mod middleware;
mod state;

pub use error::ApiError;
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Maximum number of admin-API requests handled concurrently.
const MAX_CONCURRENT_REQUESTS: usize = 64;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/_cluster", get(controllers::cluster::cluster))
        .route("/_healthz", get(controllers::cluster::health_check))
        .route("/_ping", get(controllers::ping::ping))
        .route(
            "/check",
            get(controllers::checks::list_checks).post(controllers::checks::create_check),
        )
        .route(
            "/check/:id",
            get(controllers::checks::get_check).delete(controllers::checks::delete_check),
        )
        .route("/_raft/step", post(controllers::raft::step))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::redirect_writes_to_leader,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;
    use tower::ServiceExt;
    use uptime_consensus::{HttpRaftTransport, RaftConsensus};
    use uptime_store::Store;

    const NODE_API_ADDR: &str = "127.0.0.1:6991";

    /// Builds a lone-voter raft cluster, drives it in the background until it wins its
    /// own election, and returns an `AppState` ready to serve writes.
    async fn leader_state() -> (AppState, tokio::task::JoinHandle<()>) {
        let mut peers = HashMap::new();
        peers.insert(1, ("127.0.0.1:7001".to_string(), NODE_API_ADDR.to_string()));
        let transport = Arc::new(HttpRaftTransport::new(reqwest::Client::new(), HashMap::new()));
        let store = Arc::new(Store::new());
        let raft = Arc::new(
            RaftConsensus::new(1, peers, Arc::clone(&store), transport, Duration::from_secs(5)).unwrap(),
        );

        let mut leader_rx = raft.leader_channel();
        let driver = tokio::spawn(Arc::clone(&raft).run(std::future::pending()));
        for _ in 0..50 {
            if *leader_rx.borrow() {
                break;
            }
            let _ = leader_rx.changed().await;
        }
        assert!(*leader_rx.borrow(), "lone node never became leader");

        let (check_reload_tx, _rx) = watch::channel(());
        let state = AppState {
            store,
            consensus: raft.clone(),
            raft,
            self_api_addr: NODE_API_ADDR.to_string(),
            check_reload_tx,
        };
        (state, driver)
    }

    #[tokio::test]
    async fn healthz_responds_without_a_leader() {
        let mut peers = HashMap::new();
        peers.insert(1, ("127.0.0.1:7002".to_string(), "127.0.0.1:6992".to_string()));
        let transport = Arc::new(HttpRaftTransport::new(reqwest::Client::new(), HashMap::new()));
        let store = Arc::new(Store::new());
        let raft = Arc::new(
            RaftConsensus::new(1, peers, Arc::clone(&store), transport, Duration::from_secs(5)).unwrap(),
        );
        let (check_reload_tx, _rx) = watch::channel(());
        let state = AppState {
            store,
            consensus: raft.clone(),
            raft,
            self_api_addr: "127.0.0.1:6992".to_string(),
            check_reload_tx,
        };

        let response = build_router(state)
            .oneshot(Request::builder().uri("/_healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn post_then_get_check_round_trips() {
        let (state, driver) = leader_state().await;
        let router = build_router(state);

        let create = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/check")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"url":"http://example.invalid/"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(create.status(), StatusCode::CREATED);
        let body = axum::body::to_bytes(create.into_body(), usize::MAX).await.unwrap();
        let created: uptime_store::Check = serde_json::from_slice(&body).unwrap();

        let fetched = router
            .oneshot(
                Request::builder()
                    .uri(format!("/check/{}", created.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(fetched.status(), StatusCode::OK);

        driver.abort();
    }

    #[tokio::test]
    async fn write_from_a_non_leader_address_is_redirected() {
        let (mut state, driver) = leader_state().await;
        state.self_api_addr = "127.0.0.1:9999".to_string();

        let response = build_router(state)
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/check/whatever")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

        driver.abort();
    }
}
