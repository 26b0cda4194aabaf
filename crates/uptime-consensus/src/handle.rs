use async_trait::async_trait;
use tokio::sync::watch;

use crate::ConsensusError;

/// Thin façade over the consensus library: submit a command, wait for quorum, observe
/// leadership changes, and enumerate the rest of the cluster. The two leader-only
/// schedulers (C5, C7) and the admin API (C8) depend only on this trait, never on the
/// concrete `raft` adapter, so the consensus implementation can be swapped or faked in
/// tests.
#[async_trait]
pub trait ConsensusHandle: Send + Sync {
    /// Proposes a tag+payload log entry and blocks until it commits locally, or the
    /// configured submit timeout elapses.
    async fn submit(&self, entry: Vec<u8>) -> Result<(), ConsensusError>;

    /// Waits until every entry preceding this call has been applied locally — a
    /// committed no-op marker entry, not a local-only check.
    async fn barrier(&self) -> Result<(), ConsensusError>;

    /// A stream of whether this peer currently believes itself to be leader.
    fn leader_channel(&self) -> watch::Receiver<bool>;

    /// The current leader's admin-API address, if known.
    fn leader_address(&self) -> Option<String>;

    /// Raft-transport addresses of every cluster member.
    fn peers(&self) -> Vec<String>;

    /// Admin-API addresses of every peer other than the current leader.
    fn peers_api(&self) -> Vec<String>;
}
