use serde::{Deserialize, Serialize};

use crate::check::Check;
use crate::webhook::WebHook;

/// Schema version of the snapshot payload. Reserved for future changes; current value
/// is the only one this repo knows how to restore.
pub const SNAPSHOT_SCHEMA_VERSION: u8 = 0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default = "default_version")]
    pub version: u8,
    pub checks: Vec<Check>,
    pub pending_webhooks: Vec<WebHook>,
}

fn default_version() -> u8 {
    SNAPSHOT_SCHEMA_VERSION
}
