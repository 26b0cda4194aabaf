use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("malformed consensus log entry: {0}")]
    MalformedCommand(String),

    #[error("unknown command tag {0}")]
    UnknownCommandTag(u8),

    #[error("check not found: {0}")]
    CheckNotFound(String),

    #[error("snapshot is corrupt: {0}")]
    SnapshotCorrupt(String),
}
