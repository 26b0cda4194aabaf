//! The replicated state machine (C1): an in-memory index of `Check`s and pending
//! `WebHook`s, mutated only by `Store::apply` in consensus-log order, and serializable
//! to/from a JSON snapshot for bootstrapping a new peer.

mod check;
mod command;
mod error;
mod snapshot;
mod webhook;

pub use check::{
    cmp_by_next, instant_to_epoch, now_epoch, Check, ErrorKind, ProbeError, DEFAULT_INTERVAL_SECONDS,
    MIN_INTERVAL_SECONDS,
};
pub use command::{Command, TAG_BARRIER, TAG_DELETE_CHECK, TAG_DELETE_WEBHOOK, TAG_UPSERT_CHECK, TAG_UPSERT_WEBHOOK};
pub use error::StoreError;
pub use snapshot::{Snapshot, SNAPSHOT_SCHEMA_VERSION};
pub use webhook::WebHook;

use std::collections::HashMap;
use std::sync::Mutex;

/// Holds active checks and pending webhook notifications.
///
/// Mutated only by `apply`, under the single exclusive lock that also guards
/// `snapshot`/`restore` — matching the "single exclusive lock covering snapshot capture,
/// snapshot restore, and command application" invariant.
pub struct Store {
    inner: Mutex<Indices>,
}

#[derive(Default)]
struct Indices {
    checks: HashMap<String, Check>,
    pending_webhooks: HashMap<String, WebHook>,
}

impl Default for Store {
    fn default() -> Self {
        Store::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Store {
            inner: Mutex::new(Indices::default()),
        }
    }

    /// Applies a single decoded command in log order. Deterministic and total: never
    /// partially mutates the indices. `Command::Barrier` is a recognized no-op.
    pub fn apply(&self, command: Command) {
        let mut guard = self.inner.lock().expect("store mutex poisoned");
        match command {
            Command::UpsertCheck(mut check) => {
                check.rebuild_schedule();
                guard.checks.insert(check.id.clone(), check);
            }
            Command::DeleteCheck(id) => {
                guard.checks.remove(&id);
            }
            Command::UpsertWebhook(mut webhook) => {
                webhook.next = None;
                guard.pending_webhooks.insert(webhook.id.clone(), webhook);
            }
            Command::DeleteWebhook(id) => {
                guard.pending_webhooks.remove(&id);
            }
            Command::Barrier => {}
        }
    }

    /// Applies a raw tag+payload log entry, as handed to the FSM by the consensus layer.
    pub fn apply_bytes(&self, data: &[u8]) -> Result<(), StoreError> {
        let command = Command::decode(data)?;
        self.apply(command);
        Ok(())
    }

    pub fn get_check(&self, id: &str) -> Option<Check> {
        let guard = self.inner.lock().expect("store mutex poisoned");
        guard.checks.get(id).cloned()
    }

    /// A point-in-time copy of every check, in arbitrary order; callers needing a
    /// consistent read should call the Consensus Adapter's `barrier()` first.
    pub fn list_checks(&self) -> Vec<Check> {
        let guard = self.inner.lock().expect("store mutex poisoned");
        guard.checks.values().cloned().collect()
    }

    pub fn list_pending_webhooks(&self) -> Vec<WebHook> {
        let guard = self.inner.lock().expect("store mutex poisoned");
        guard.pending_webhooks.values().cloned().collect()
    }

    /// Captures the full Store as an opaque byte blob, sorted by id so that two peers
    /// with identical state always produce byte-identical snapshots.
    pub fn snapshot(&self) -> Vec<u8> {
        let guard = self.inner.lock().expect("store mutex poisoned");
        let mut checks: Vec<Check> = guard.checks.values().cloned().collect();
        checks.sort_by(|a, b| a.id.cmp(&b.id));
        let mut pending_webhooks: Vec<WebHook> = guard.pending_webhooks.values().cloned().collect();
        pending_webhooks.sort_by(|a, b| a.id.cmp(&b.id));
        let snap = Snapshot {
            version: SNAPSHOT_SCHEMA_VERSION,
            checks,
            pending_webhooks,
        };
        serde_json::to_vec(&snap).expect("Snapshot always serializes")
    }

    /// Replaces the Store contents atomically from a previously captured snapshot blob.
    pub fn restore(&self, blob: &[u8]) -> Result<(), StoreError> {
        let snap: Snapshot =
            serde_json::from_slice(blob).map_err(|e| StoreError::SnapshotCorrupt(e.to_string()))?;
        if snap.version != SNAPSHOT_SCHEMA_VERSION {
            return Err(StoreError::SnapshotCorrupt(format!(
                "unsupported snapshot schema version {}",
                snap.version
            )));
        }
        let mut checks = HashMap::with_capacity(snap.checks.len());
        for mut check in snap.checks {
            check.rebuild_schedule();
            checks.insert(check.id.clone(), check);
        }
        let mut pending_webhooks = HashMap::with_capacity(snap.pending_webhooks.len());
        for mut webhook in snap.pending_webhooks {
            webhook.next = None;
            pending_webhooks.insert(webhook.id.clone(), webhook);
        }
        let mut guard = self.inner.lock().expect("store mutex poisoned");
        guard.checks = checks;
        guard.pending_webhooks = pending_webhooks;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_then_get_round_trips() {
        let store = Store::new();
        let check = Check::new(Some("a".into()), "http://x/".into(), None, Some(30));
        store.apply(Command::UpsertCheck(check.clone()));
        let fetched = store.get_check("a").unwrap();
        assert_eq!(fetched.url, check.url);
    }

    #[test]
    fn delete_is_idempotent_on_absent_key() {
        let store = Store::new();
        store.apply(Command::DeleteCheck("nope".into()));
        assert!(store.get_check("nope").is_none());
    }

    #[test]
    fn upsert_check_defaults_missing_webhooks_to_empty() {
        let store = Store::new();
        let mut check = Check::new(Some("a".into()), "http://x/".into(), None, Some(30));
        check.webhooks = Vec::new();
        store.apply(Command::UpsertCheck(check));
        let fetched = store.get_check("a").unwrap();
        assert!(fetched.webhooks.is_empty());
    }

    #[test]
    fn upsert_check_rebuilds_prev_from_last_check() {
        let store = Store::new();
        let mut check = Check::new(Some("a".into()), "http://x/".into(), None, Some(30));
        check.last_check = 1_700_000_000;
        store.apply(Command::UpsertCheck(check));
        let fetched = store.get_check("a").unwrap();
        assert!(fetched.prev.is_some());
    }

    #[test]
    fn barrier_command_does_not_touch_indices() {
        let store = Store::new();
        store.apply(Command::Barrier);
        assert!(store.list_checks().is_empty());
        assert!(store.list_pending_webhooks().is_empty());
    }

    #[test]
    fn snapshot_round_trip_is_idempotent() {
        let store = Store::new();
        store.apply(Command::UpsertCheck(Check::new(
            Some("a".into()),
            "http://x/".into(),
            None,
            Some(30),
        )));
        store.apply(Command::UpsertWebhook(WebHook::new(
            "http://hook/".into(),
            b"payload".to_vec(),
            now_epoch(),
        )));

        let first = store.snapshot();

        let restored = Store::new();
        restored.restore(&first).unwrap();
        let second = restored.snapshot();

        assert_eq!(first, second);
    }

    #[test]
    fn restore_rejects_unsupported_schema_version() {
        let store = Store::new();
        let bad = serde_json::json!({
            "version": 7,
            "checks": [],
            "pending_webhooks": [],
        });
        let err = store.restore(&serde_json::to_vec(&bad).unwrap()).unwrap_err();
        assert!(matches!(err, StoreError::SnapshotCorrupt(_)));
    }

    #[test]
    fn pings_outages_time_down_invariants_hold_after_applies() {
        let store = Store::new();
        let mut check = Check::new(Some("a".into()), "http://x/".into(), None, Some(60));
        check.pings = 5;
        check.outages = 1;
        check.time_down_seconds = 60;
        check.recompute_uptime();
        store.apply(Command::UpsertCheck(check));

        let fetched = store.get_check("a").unwrap();
        assert!(fetched.pings >= fetched.outages);
        assert!(fetched.uptime >= 0.0 && fetched.uptime <= 1.0);
        assert!(fetched.time_down_seconds > 0);
    }
}
