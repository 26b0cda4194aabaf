//! Check Scheduler (C5) and WebHook Retry Scheduler (C7): the two leader-only,
//! time-ordered loops that drive probe execution and webhook redelivery. Both follow
//! the same shape — load, sort by due instant, arm a timer for the head, wake on
//! timer/reload/leadership-loss — kept as separate modules rather than one generic
//! loop because their per-tick bodies (probe+verify+notify vs. POST+backoff) differ
//! enough that sharing more than the timer arithmetic would obscure more than it saves.

mod check_scheduler;
mod timer;
mod webhook_scheduler;

pub use check_scheduler::CheckScheduler;
pub use webhook_scheduler::{WebhookRetryScheduler, DEFAULT_WEBHOOK_MAX_RETRY};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use httpmock::prelude::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;
    use uptime_consensus::{ConsensusError, ConsensusHandle};
    use uptime_notify::{EmailSender, NotifyError};
    use uptime_store::{Check, Command, Store};

    struct FakeConsensus {
        leader_tx: watch::Sender<bool>,
        leader_rx: watch::Receiver<bool>,
        store: Arc<Store>,
    }

    impl FakeConsensus {
        fn new_leader(store: Arc<Store>) -> Arc<Self> {
            let (leader_tx, leader_rx) = watch::channel(true);
            Arc::new(FakeConsensus { leader_tx, leader_rx, store })
        }
    }

    #[async_trait]
    impl ConsensusHandle for FakeConsensus {
        async fn submit(&self, entry: Vec<u8>) -> Result<(), ConsensusError> {
            self.store
                .apply_bytes(&entry)
                .map_err(|e| ConsensusError::Transport(e.to_string()))
        }

        async fn barrier(&self) -> Result<(), ConsensusError> {
            Ok(())
        }

        fn leader_channel(&self) -> watch::Receiver<bool> {
            self.leader_rx.clone()
        }

        fn leader_address(&self) -> Option<String> {
            Some("127.0.0.1:0".to_string())
        }

        fn peers(&self) -> Vec<String> {
            Vec::new()
        }

        fn peers_api(&self) -> Vec<String> {
            Vec::new()
        }
    }

    struct NoopEmailSender;

    #[async_trait]
    impl EmailSender for NoopEmailSender {
        async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn check_scheduler_commits_a_down_check_and_stops_on_exit() {
        let target = MockServer::start();
        target.mock(|when, then| {
            when.method(GET).path("/");
            then.status(500);
        });

        let store = Arc::new(Store::new());
        let mut check = Check::new(Some("c1".into()), target.url("/"), Some("GET".into()), Some(1));
        check.up = true;
        store.apply(Command::UpsertCheck(check));

        let consensus: Arc<dyn ConsensusHandle> = FakeConsensus::new_leader(Arc::clone(&store));
        let (webhook_reload_tx, _webhook_reload_rx) = watch::channel(());

        let scheduler = CheckScheduler::new(
            Arc::clone(&store),
            consensus,
            Arc::new(NoopEmailSender),
            None,
            reqwest::Client::new(),
            Duration::from_millis(1),
            webhook_reload_tx,
        );

        let finished = Arc::new(AtomicBool::new(false));
        let finished_clone = Arc::clone(&finished);
        let handle = tokio::spawn(async move {
            scheduler
                .run(async move {
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    finished_clone.store(true, Ordering::SeqCst);
                })
                .await;
        });

        handle.await.unwrap();
        assert!(finished.load(Ordering::SeqCst));

        let fetched = store.get_check("c1").unwrap();
        assert!(!fetched.up, "check should have been committed as down");
        assert_eq!(fetched.outages, 1);
    }
}
