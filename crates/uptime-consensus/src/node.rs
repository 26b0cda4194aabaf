use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use raft::prelude::{Entry, Message};
use raft::storage::MemStorage;
use raft::{Config, RawNode, StateRole};
use slog::Drain;
use tokio::sync::{oneshot, watch, Mutex};
use uptime_store::{Store, TAG_BARRIER};

use crate::{ConsensusError, ConsensusHandle, RaftTransport};

/// One tick of the raft "Ready loop" every 100ms.
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Concrete Consensus Adapter (C2) over tikv's `raft` crate. Owns a `RawNode` driven by
/// a dedicated tokio task (`run`), an in-memory log store, and an HTTP transport for
/// replication traffic. `Store::snapshot`/`Store::restore` double as the raft snapshot
/// payload, so no separate snapshot codec is needed.
pub struct RaftConsensus {
    node_id: u64,
    raw_node: Mutex<RawNode<MemStorage>>,
    store: Arc<Store>,
    transport: Arc<dyn RaftTransport>,
    peer_raft_addrs: HashMap<u64, String>,
    peer_api_addrs: HashMap<u64, String>,
    self_api_addr: String,
    pending: Mutex<HashMap<u64, oneshot::Sender<()>>>,
    leader_tx: watch::Sender<bool>,
    leader_rx: watch::Receiver<bool>,
    leader_id: StdMutex<Option<u64>>,
    submit_timeout: Duration,
}

impl RaftConsensus {
    /// `peers` maps every cluster member's raft node id to its (raft-transport address,
    /// admin-API address) pair, including this node's own id.
    pub fn new(
        node_id: u64,
        peers: HashMap<u64, (String, String)>,
        store: Arc<Store>,
        transport: Arc<dyn RaftTransport>,
        submit_timeout: Duration,
    ) -> Result<Self, ConsensusError> {
        let voters: Vec<u64> = peers.keys().copied().collect();
        let storage = MemStorage::new_with_conf_state((voters, vec![]));

        let config = Config {
            id: node_id,
            election_tick: 10,
            heartbeat_tick: 3,
            ..Default::default()
        };
        config
            .validate()
            .map_err(|e| ConsensusError::Transport(e.to_string()))?;

        let logger = raft_logger();
        let raw_node = RawNode::new(&config, storage, &logger)
            .map_err(|e| ConsensusError::Transport(e.to_string()))?;

        let self_api_addr = peers
            .get(&node_id)
            .map(|(_, api)| api.clone())
            .unwrap_or_default();
        let peer_raft_addrs = peers
            .iter()
            .map(|(id, (raft_addr, _))| (*id, raft_addr.clone()))
            .collect();
        let peer_api_addrs = peers
            .iter()
            .map(|(id, (_, api_addr))| (*id, api_addr.clone()))
            .collect();

        let (leader_tx, leader_rx) = watch::channel(false);

        Ok(RaftConsensus {
            node_id,
            raw_node: Mutex::new(raw_node),
            store,
            transport,
            peer_raft_addrs,
            peer_api_addrs,
            self_api_addr,
            pending: Mutex::new(HashMap::new()),
            leader_tx,
            leader_rx,
            leader_id: StdMutex::new(None),
            submit_timeout,
        })
    }

    /// Hands an inbound message received over `/_raft/step` to the local node.
    pub async fn step(&self, message: Message) {
        if let Err(err) = self.raw_node.lock().await.step(message) {
            tracing::warn!(error = %err, "failed to step inbound raft message");
        }
    }

    /// Drives the Ready loop until `shutdown` resolves.
    pub async fn run(self: Arc<Self>, shutdown: impl std::future::Future<Output = ()>) {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(node_id = self.node_id, "raft driver shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    self.tick_once().await;
                }
            }
        }
    }

    async fn tick_once(&self) {
        let mut node = self.raw_node.lock().await;
        node.tick();
        if !node.has_ready() {
            return;
        }
        let mut ready = node.ready();

        self.send_messages(ready.take_messages()).await;

        if !ready.snapshot().is_empty() {
            let snapshot = ready.snapshot().clone();
            if let Err(err) = self.store.restore(snapshot.get_data()) {
                tracing::error!(error = %err, "failed to restore store from raft snapshot");
            }
            node.mut_store()
                .wl()
                .apply_snapshot(snapshot)
                .expect("apply_snapshot on MemStorage cannot fail");
        }

        self.complete_committed(ready.take_committed_entries()).await;

        if !ready.entries().is_empty() {
            node.mut_store()
                .wl()
                .append(ready.entries())
                .expect("append to MemStorage cannot fail");
        }

        if let Some(hs) = ready.hs() {
            node.mut_store().wl().set_hardstate(hs.clone());
        }

        self.send_messages(ready.take_persisted_messages()).await;

        let mut light_rd = node.advance(ready);
        if let Some(commit) = light_rd.commit_index() {
            node.mut_store().wl().mut_hard_state().set_commit(commit);
        }
        self.send_messages(light_rd.take_messages()).await;
        self.complete_committed(light_rd.take_committed_entries()).await;
        node.advance_apply();

        self.update_leadership(node.raft.state, node.raft.leader_id);
    }

    async fn send_messages(&self, messages: Vec<Message>) {
        if messages.is_empty() {
            return;
        }
        let sends = messages.into_iter().map(|msg| {
            let to = msg.to;
            let transport = Arc::clone(&self.transport);
            async move { transport.send(to, msg).await }
        });
        futures::future::join_all(sends).await;
    }

    async fn complete_committed(&self, entries: Vec<Entry>) {
        for entry in entries {
            if !entry.get_data().is_empty() {
                if let Err(err) = self.store.apply_bytes(entry.get_data()) {
                    tracing::error!(index = entry.index, error = %err, "failed to apply committed entry");
                }
            }
            if let Some(tx) = self.pending.lock().await.remove(&entry.index) {
                let _ = tx.send(());
            }
        }
    }

    fn update_leadership(&self, state: StateRole, leader_id: u64) {
        let is_leader = state == StateRole::Leader;
        let known_leader = if leader_id == 0 { None } else { Some(leader_id) };
        *self.leader_id.lock().expect("leader_id mutex poisoned") = known_leader;
        self.leader_tx.send_if_modified(|current| {
            if *current != is_leader {
                *current = is_leader;
                true
            } else {
                false
            }
        });
    }
}

#[async_trait]
impl ConsensusHandle for RaftConsensus {
    async fn submit(&self, entry: Vec<u8>) -> Result<(), ConsensusError> {
        let (index, rx) = {
            let mut node = self.raw_node.lock().await;
            if node.raft.state != StateRole::Leader {
                return Err(ConsensusError::NoLeader);
            }
            node.propose(vec![], entry)
                .map_err(|e| ConsensusError::Transport(e.to_string()))?;
            let index = node.raft.raft_log.last_index();
            let (tx, rx) = oneshot::channel();
            self.pending.lock().await.insert(index, tx);
            (index, rx)
        };

        match tokio::time::timeout(self.submit_timeout, rx).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(ConsensusError::Transport("apply notifier dropped".into())),
            Err(_) => {
                self.pending.lock().await.remove(&index);
                Err(ConsensusError::Timeout)
            }
        }
    }

    async fn barrier(&self) -> Result<(), ConsensusError> {
        self.submit(vec![TAG_BARRIER]).await
    }

    fn leader_channel(&self) -> watch::Receiver<bool> {
        self.leader_rx.clone()
    }

    fn leader_address(&self) -> Option<String> {
        let leader_id = (*self.leader_id.lock().expect("leader_id mutex poisoned"))?;
        if leader_id == self.node_id {
            Some(self.self_api_addr.clone())
        } else {
            self.peer_api_addrs.get(&leader_id).cloned()
        }
    }

    fn peers(&self) -> Vec<String> {
        self.peer_raft_addrs.values().cloned().collect()
    }

    fn peers_api(&self) -> Vec<String> {
        let leader_id = *self.leader_id.lock().expect("leader_id mutex poisoned");
        self.peer_api_addrs
            .iter()
            .filter(|(id, _)| Some(**id) != leader_id)
            .map(|(_, addr)| addr.clone())
            .collect()
    }
}

/// Bridges raft's internal `slog` logging into the standard `log` facade, which
/// `tracing-log` picks up so raft's own diagnostics end up in the same structured
/// log stream as the rest of the process.
fn raft_logger() -> slog::Logger {
    let drain = slog_stdlog::StdLog.fuse();
    slog::Logger::root(drain, slog::o!())
}
