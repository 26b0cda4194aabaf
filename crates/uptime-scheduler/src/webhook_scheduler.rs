use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::{watch, Mutex};
use uptime_consensus::ConsensusHandle;
use uptime_store::{Command, Store, WebHook};

use crate::timer;

/// Default cap on delivery attempts for a pending webhook before it is dropped.
pub const DEFAULT_WEBHOOK_MAX_RETRY: u32 = 20;

/// Orders pending webhooks by `next` ascending, with a zero/absent `next` sorting first —
/// a webhook just enqueued by the Check Scheduler has no `next` yet and must be treated as
/// the most overdue, not as never due.
fn cmp_webhooks_by_next(a: &WebHook, b: &WebHook) -> std::cmp::Ordering {
    match (a.next, b.next) {
        (None, None) => std::cmp::Ordering::Equal,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        (Some(x), Some(y)) => x.cmp(&y),
    }
}

/// Leader-only loop (C7) driving exponential-backoff retries of pending webhooks,
/// structurally identical to the Check Scheduler's time-ordered walk.
pub struct WebhookRetryScheduler {
    store: Arc<Store>,
    consensus: Arc<dyn ConsensusHandle>,
    http_client: reqwest::Client,
    warmup: Duration,
    max_retry: u32,
    reload_tx: watch::Sender<()>,
    reload_rx: watch::Receiver<()>,
    in_flight: Mutex<HashSet<String>>,
}

impl WebhookRetryScheduler {
    pub fn new(
        store: Arc<Store>,
        consensus: Arc<dyn ConsensusHandle>,
        http_client: reqwest::Client,
        warmup: Duration,
        max_retry: u32,
    ) -> Arc<Self> {
        let (reload_tx, reload_rx) = watch::channel(());
        Arc::new(WebhookRetryScheduler {
            store,
            consensus,
            http_client,
            warmup,
            max_retry,
            reload_tx,
            reload_rx,
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    /// A clone of this scheduler's reload trigger, handed to collaborators (the Check
    /// Scheduler, the admin API) that enqueue new pending webhooks and need to wake this
    /// loop up without waiting for its current timer to fire.
    pub fn reload_trigger(&self) -> watch::Sender<()> {
        self.reload_tx.clone()
    }

    pub fn reload(&self) {
        let _ = self.reload_tx.send(());
    }

    pub async fn run<E>(self: Arc<Self>, exit: E)
    where
        E: std::future::Future<Output = ()> + Send,
    {
        tokio::pin!(exit);
        let mut leader_rx = self.consensus.leader_channel();

        loop {
            if !*leader_rx.borrow() {
                tokio::select! {
                    _ = &mut exit => return,
                    res = leader_rx.changed() => {
                        if res.is_err() {
                            return;
                        }
                        continue;
                    }
                }
            }

            tracing::info!("promoted to leader, warming up webhook retry scheduler");
            tokio::select! {
                _ = &mut exit => return,
                _ = tokio::time::sleep(self.warmup) => {}
            }

            let mut list = self.store.list_pending_webhooks();
            list.sort_by(cmp_webhooks_by_next);
            let mut reload_rx = self.reload_rx.clone();

            loop {
                let head_next = list.first().map(|w| w.next);
                tokio::select! {
                    _ = &mut exit => return,
                    res = leader_rx.changed() => {
                        if res.is_err() {
                            return;
                        }
                        if !*leader_rx.borrow() {
                            tracing::info!("demoted, stopping webhook retry scheduler");
                            break;
                        }
                    }
                    res = reload_rx.changed() => {
                        if res.is_err() {
                            return;
                        }
                        list = self.store.list_pending_webhooks();
                        list.sort_by(cmp_webhooks_by_next);
                    }
                    _ = timer::arm(head_next) => {
                        self.fire_due(&mut list).await;
                    }
                }
            }
        }
    }

    async fn fire_due(self: &Arc<Self>, list: &mut Vec<WebHook>) {
        let now = SystemTime::now();
        // A pending webhook with no `next` yet (just enqueued, or freshly loaded from the
        // Store) is due immediately, not "never due" — it counts toward the leading due
        // prefix same as one whose `next` has already elapsed.
        let due = list.iter().take_while(|w| w.next.map_or(true, |n| n <= now)).count();

        for webhook in list.iter_mut().take(due) {
            if webhook.next.is_none() {
                webhook.compute_next(now);
            }

            {
                let mut guard = self.in_flight.lock().await;
                if !guard.insert(webhook.id.clone()) {
                    webhook.compute_next(now);
                    continue;
                }
            }

            tokio::spawn(Arc::clone(self).run_one_tick(webhook.clone()));
            webhook.compute_next(now);
        }

        list.sort_by(cmp_webhooks_by_next);
    }

    async fn run_one_tick(self: Arc<Self>, mut webhook: WebHook) {
        let delivered = self.deliver(&webhook).await;

        if delivered {
            if let Err(err) = self
                .consensus
                .submit(Command::DeleteWebhook(webhook.id.clone()).encode())
                .await
            {
                tracing::warn!(webhook_id = %webhook.id, error = %err, "failed to commit webhook delete");
            }
            self.in_flight.lock().await.remove(&webhook.id);
            self.reload();
            return;
        }

        if webhook.tries >= self.max_retry {
            tracing::warn!(webhook_id = %webhook.id, tries = webhook.tries, "webhook retry cap reached, dropping");
            if let Err(err) = self
                .consensus
                .submit(Command::DeleteWebhook(webhook.id.clone()).encode())
                .await
            {
                tracing::warn!(webhook_id = %webhook.id, error = %err, "failed to commit webhook drop");
            }
            self.in_flight.lock().await.remove(&webhook.id);
            self.reload();
            return;
        }

        webhook.tries += 1;
        if let Err(err) = self
            .consensus
            .submit(Command::UpsertWebhook(webhook.clone()).encode())
            .await
        {
            tracing::warn!(webhook_id = %webhook.id, error = %err, "failed to commit webhook retry state");
        }
        self.in_flight.lock().await.remove(&webhook.id);
    }

    async fn deliver(&self, webhook: &WebHook) -> bool {
        let result = self
            .http_client
            .post(&webhook.url)
            .header("content-type", "application/json")
            .body(webhook.payload.clone())
            .send()
            .await;

        match result {
            Ok(response) if response.status().as_u16() == 200 => true,
            Ok(response) => {
                tracing::warn!(webhook_id = %webhook.id, status = %response.status(), "webhook retry received non-200");
                false
            }
            Err(err) => {
                tracing::warn!(webhook_id = %webhook.id, error = %err, "webhook retry transport failure");
                false
            }
        }
    }
}
