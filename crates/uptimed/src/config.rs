use std::collections::HashMap;

use anyhow::{bail, Context};
use clap::Parser;

/// Process configuration, layered CLI flags over environment-variable fallback,
/// matching the rest of the teacher corpus's `clap::Parser`-with-`env` convention.
#[derive(Debug, Parser)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Prefix for this node's on-disk state directory (`{prefix}_raft/`).
    #[clap(long, env = "PREFIX")]
    pub prefix: String,

    /// This node's own raft-transport bind address, e.g. `127.0.0.1:7001`.
    #[clap(long, env = "BIND_ADDR")]
    pub bind: String,

    /// Comma-separated raft-transport addresses of the other cluster members.
    #[clap(long, env = "PEERS", default_value = "")]
    pub peers: String,

    /// Submit timeout for the Consensus Adapter, in seconds.
    #[clap(long, env = "CONSENSUS_TIMEOUT_SECS", default_value = "30")]
    pub consensus_timeout_secs: u64,

    /// Warm-up delay after a promotion to leader before the schedulers take their first
    /// tick, in seconds.
    #[clap(long, env = "WARMUP_SECS", default_value = "5")]
    pub warmup_secs: u64,

    /// Number of delivery attempts before a pending webhook is dropped.
    #[clap(long, env = "WEBHOOK_MAX_RETRY", default_value = "20")]
    pub webhook_max_retry: u32,

    /// `tracing_subscriber::EnvFilter` directive, e.g. `info` or `uptimed=debug,info`.
    #[clap(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// SMTP relay host for outage-notification email. Leaving any of the four
    /// `smtp_*` fields unset disables email delivery; notifications still fan out to
    /// webhooks and the optional publisher.
    #[clap(long, env = "SMTP_RELAY")]
    pub smtp_relay: Option<String>,
    #[clap(long, env = "SMTP_USERNAME")]
    pub smtp_username: Option<String>,
    #[clap(long, env = "SMTP_PASSWORD")]
    pub smtp_password: Option<String>,
    #[clap(long, env = "SMTP_FROM")]
    pub smtp_from: Option<String>,
}

/// This node's raft node id plus the (raft-addr, admin-api-addr) pair for every
/// cluster member, including itself.
///
/// Node ids are assigned deterministically: every raft-transport address (this node's
/// `bind` plus `peers`) is sorted lexicographically and numbered from 1, so every peer
/// started with the same `--bind`/`--peers` configuration computes an identical
/// topology without a separate id-assignment step.
pub fn peer_topology(bind: &str, peers: &str) -> anyhow::Result<(u64, HashMap<u64, (String, String)>)> {
    let mut raft_addrs: Vec<String> = peers
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    raft_addrs.push(bind.to_string());
    raft_addrs.sort();
    raft_addrs.dedup();

    let mut peers_map = HashMap::with_capacity(raft_addrs.len());
    let mut self_id = None;
    for (index, raft_addr) in raft_addrs.iter().enumerate() {
        let node_id = (index + 1) as u64;
        let api_addr = api_addr_from_raft_addr(raft_addr)
            .with_context(|| format!("deriving admin-API address for raft peer {raft_addr}"))?;
        if raft_addr == bind {
            self_id = Some(node_id);
        }
        peers_map.insert(node_id, (raft_addr.clone(), api_addr));
    }

    let self_id = self_id.context("bind address must be present in its own computed peer list")?;
    Ok((self_id, peers_map))
}

/// The admin-API port is the consensus-transport port minus 10 (matching §4.2/§6 of
/// the spec this adapter implements).
fn api_addr_from_raft_addr(addr: &str) -> anyhow::Result<String> {
    let (host, port) = addr
        .rsplit_once(':')
        .with_context(|| format!("address {addr} is not host:port"))?;
    let port: u16 = port.parse().with_context(|| format!("invalid port in {addr}"))?;
    if port < 10 {
        bail!("raft port {port} is too low to derive an admin-API port (port - 10)");
    }
    Ok(format!("{host}:{}", port - 10))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topology_assigns_ids_by_sorted_address_and_derives_api_ports() {
        let (self_id, map) = peer_topology("127.0.0.1:7002", "127.0.0.1:7001,127.0.0.1:7003").unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(&self_id).unwrap().0, "127.0.0.1:7002");
        for (raft_addr, api_addr) in map.values() {
            let raft_port: u16 = raft_addr.rsplit_once(':').unwrap().1.parse().unwrap();
            let api_port: u16 = api_addr.rsplit_once(':').unwrap().1.parse().unwrap();
            assert_eq!(api_port, raft_port - 10);
        }
    }

    #[test]
    fn topology_is_identical_regardless_of_which_node_computes_it() {
        let (_, from_a) = peer_topology("127.0.0.1:7001", "127.0.0.1:7002,127.0.0.1:7003").unwrap();
        let (_, from_b) = peer_topology("127.0.0.1:7002", "127.0.0.1:7001,127.0.0.1:7003").unwrap();
        let mut a: Vec<_> = from_a.into_values().collect();
        let mut b: Vec<_> = from_b.into_values().collect();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_peers_yields_a_lone_voter_cluster() {
        let (self_id, map) = peer_topology("127.0.0.1:7001", "").unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(self_id, 1);
    }

    #[test]
    fn low_raft_port_is_rejected() {
        assert!(peer_topology("127.0.0.1:5", "").is_err());
    }
}
