use std::collections::HashMap;

use async_trait::async_trait;
use protobuf::Message as _;
use raft::prelude::Message;

/// Outbound leg of the raft transport: fire-and-forget delivery of a single raft
/// message to a peer. Delivery failures are logged by the implementation and never
/// propagated — raft's own retransmission on the next tick is what makes this safe to
/// drop.
#[async_trait]
pub trait RaftTransport: Send + Sync {
    async fn send(&self, to: u64, message: Message);
}

/// Delivers raft messages over HTTP, one POST per message, encoded with the `raft`
/// crate's own `protobuf` wire format rather than layering a second encoding on top.
pub struct HttpRaftTransport {
    client: reqwest::Client,
    peer_addrs: HashMap<u64, String>,
}

impl HttpRaftTransport {
    pub fn new(client: reqwest::Client, peer_addrs: HashMap<u64, String>) -> Self {
        HttpRaftTransport { client, peer_addrs }
    }
}

#[async_trait]
impl RaftTransport for HttpRaftTransport {
    async fn send(&self, to: u64, message: Message) {
        let Some(addr) = self.peer_addrs.get(&to) else {
            tracing::warn!(node_id = to, "no known transport address for raft peer, dropping message");
            return;
        };

        let body = match message.write_to_bytes() {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(node_id = to, error = %err, "failed to encode raft message");
                return;
            }
        };

        let url = format!("http://{addr}/_raft/step");
        if let Err(err) = self
            .client
            .post(url)
            .header("content-type", "application/octet-stream")
            .body(body)
            .send()
            .await
        {
            tracing::warn!(node_id = to, error = %err, "failed to deliver raft message");
        }
    }
}
