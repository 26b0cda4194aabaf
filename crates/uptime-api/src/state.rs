use std::sync::Arc;

use tokio::sync::watch;
use uptime_consensus::{ConsensusHandle, RaftConsensus};
use uptime_store::Store;

/// Shared handles every controller needs: a read path into the Replicated Store and a
/// write path through the Consensus Adapter.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub consensus: Arc<dyn ConsensusHandle>,
    /// The concrete raft node, needed only by `/_raft/step` to hand off inbound
    /// replication traffic — raft-transport plumbing sits outside the generic
    /// `ConsensusHandle` façade the rest of the API depends on.
    pub raft: Arc<RaftConsensus>,
    /// This node's own admin-API address, used by the follower-redirect middleware to
    /// tell whether `consensus.leader_address()` refers to the local node.
    pub self_api_addr: String,
    /// Wakes the Check Scheduler after a `POST`/`DELETE /check` changes the check set.
    pub check_reload_tx: watch::Sender<()>,
}
