//! Consensus Adapter (C2): a thin façade over a consensus library, concretely built on
//! tikv's `raft` crate. The protocol internals (election, replication) are entirely the
//! library's; this crate supplies storage, transport, and the glue that drives the
//! Replicated Store (C1) from committed log entries.

mod error;
mod handle;
mod node;
mod transport;

pub use error::ConsensusError;
pub use handle::ConsensusHandle;
pub use node::RaftConsensus;
pub use transport::{HttpRaftTransport, RaftTransport};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use uptime_store::Store;

    fn single_node_cluster() -> RaftConsensus {
        let mut peers = HashMap::new();
        peers.insert(1, ("127.0.0.1:7001".to_string(), "127.0.0.1:6991".to_string()));
        let transport = Arc::new(HttpRaftTransport::new(reqwest::Client::new(), HashMap::new()));
        RaftConsensus::new(1, peers, Arc::new(Store::new()), transport, Duration::from_secs(30)).unwrap()
    }

    #[test]
    fn a_single_voter_cluster_constructs_successfully() {
        let _node = single_node_cluster();
    }

    #[tokio::test]
    async fn a_lone_node_eventually_becomes_leader_and_commits() {
        let node = Arc::new(single_node_cluster());
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let driver = tokio::spawn(Arc::clone(&node).run(async move {
            let _ = shutdown_rx.await;
        }));

        // A lone voter wins its own election within a handful of ticks; give it a
        // generous window since tick cadence is 100ms.
        let mut became_leader = false;
        let mut leader_rx = node.leader_channel();
        for _ in 0..50 {
            if *leader_rx.borrow() {
                became_leader = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = leader_rx.changed().await;
        }
        assert!(became_leader, "lone node never became leader");

        node.submit(vec![uptime_store::TAG_BARRIER]).await.unwrap();

        let _ = shutdown_tx.send(());
        let _ = driver.await;
    }
}
