//! Peer Verification (C4): turns a single leader-observed failure into a confirmed
//! outage only when every reachable peer agrees. A single-peer view is insufficient —
//! network partitions can make a perfectly healthy target look down from one vantage
//! point — so unanimous agreement among *reachable* peers is required before declaring
//! an outage.

use thiserror::Error;
use uptime_probe::{Probe, ProbeEngineError, PROBE_TIMEOUT};
use uptime_store::{Check, ProbeError};

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("leader probe failed: {0}")]
    LeaderError(#[from] ProbeEngineError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// The leader's own probe came back up; no peer query was needed.
    ConfirmedUp,
    /// The leader saw the target down and every reachable peer agreed; carries the
    /// leader's own probe error for the caller to record as `last_error`.
    ConfirmedDown(ProbeError),
    /// The leader saw the target down but at least one peer saw it up.
    Disputed,
}

/// Runs the leader's own probe, and if it reports down, cross-checks with every peer's
/// admin API before confirming an outage.
#[tracing::instrument(skip(check, peer_api_addrs), fields(check_id = %check.id))]
pub async fn confirm_down(check: &Check, peer_api_addrs: &[String]) -> Result<Verdict, VerifyError> {
    let leader_probe = uptime_probe::probe(&check.method, &check.url).await?;
    if leader_probe.up {
        return Ok(Verdict::ConfirmedUp);
    }
    let leader_error = leader_probe
        .error
        .expect("a down Probe always carries an error");

    let client = reqwest::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .build()
        .expect("reqwest client with a fixed timeout always builds");

    let queries = peer_api_addrs
        .iter()
        .map(|addr| query_peer(&client, addr, &check.method, &check.url));
    let results = futures::future::join_all(queries).await;

    for (addr, result) in peer_api_addrs.iter().zip(results) {
        match result {
            Ok(ping) if ping.up => {
                tracing::warn!(peer = %addr, "peer disputes leader-observed outage");
                return Ok(Verdict::Disputed);
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(peer = %addr, error = %err, "peer unreachable during verification, skipping");
            }
        }
    }

    Ok(Verdict::ConfirmedDown(leader_error))
}

async fn query_peer(
    client: &reqwest::Client,
    peer_api_addr: &str,
    method: &str,
    url: &str,
) -> Result<Probe, reqwest::Error> {
    let ping_url = format!(
        "http://{}/_ping?method={}&url={}",
        peer_api_addr,
        urlencoding_method(method),
        urlencoding_method(url)
    );
    client.get(ping_url).send().await?.json::<Probe>().await
}

/// Minimal percent-encoding for query-string values; avoids pulling in a whole URL
/// crate just for this one escape.
fn urlencoding_method(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
