use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("no leader elected")]
    NoLeader,
    #[error("timed out waiting for commit")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
}
