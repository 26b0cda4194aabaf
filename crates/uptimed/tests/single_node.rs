use std::time::Duration;

use serial_test::serial;
use uptimed::config::Args;

fn test_args(raft_port: u16, prefix: &str) -> Args {
    Args {
        prefix: prefix.to_string(),
        bind: format!("127.0.0.1:{raft_port}"),
        peers: String::new(),
        consensus_timeout_secs: 5,
        warmup_secs: 0,
        webhook_max_retry: 20,
        log_level: "error".to_string(),
        smtp_relay: None,
        smtp_username: None,
        smtp_password: None,
        smtp_from: None,
    }
}

/// Starts a lone-voter node end to end (store, raft adapter, both leader-only
/// schedulers, admin API), hits the admin API, then shuts it down cleanly — the
/// smallest slice of the §8 end-to-end scenarios that exercises every wired-together
/// component at once rather than one crate in isolation.
#[tokio::test]
#[serial]
async fn lone_node_serves_the_admin_api_and_shuts_down_cleanly() {
    let tmp = std::env::temp_dir().join(format!("uptimed-test-{}", uuid::Uuid::new_v4()));
    let prefix = tmp.to_string_lossy().to_string();
    let args = test_args(17601, &prefix);
    let api_addr = "127.0.0.1:17591".to_string();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let shutdown = async move {
        let _ = shutdown_rx.await;
    };

    let run_handle = tokio::spawn(uptimed::run(args, shutdown));

    let client = reqwest::Client::new();
    let mut cluster_response = None;
    for _ in 0..100 {
        match client.get(format!("http://{api_addr}/_cluster")).send().await {
            Ok(resp) if resp.status().is_success() => {
                cluster_response = Some(resp);
                break;
            }
            _ => tokio::time::sleep(Duration::from_millis(50)).await,
        }
    }
    let cluster_response = cluster_response.expect("admin API never became reachable");
    let body: serde_json::Value = cluster_response.json().await.unwrap();
    assert!(body.get("peers").is_some());

    let create = client
        .post(format!("http://{api_addr}/check"))
        .json(&serde_json::json!({ "url": "http://example.invalid/" }))
        .send()
        .await
        .unwrap();
    assert!(create.status().is_success());

    let _ = shutdown_tx.send(());
    tokio::time::timeout(Duration::from_secs(5), run_handle)
        .await
        .expect("uptimed did not shut down in time")
        .expect("task panicked")
        .expect("run() returned an error");

    let _ = std::fs::remove_dir_all(format!("{prefix}_raft"));
}

#[test]
fn topology_rejects_a_bind_address_not_present_in_its_own_peer_list() {
    // `bind` is always pushed into the candidate list before sorting in `peer_topology`,
    // so this can only fail if address parsing itself fails; covered here as a sanity
    // check that malformed addresses surface as errors rather than panics.
    let result = uptimed::config::peer_topology("not-an-address", "");
    assert!(result.is_err());
}
