use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::{watch, Mutex};
use uptime_consensus::ConsensusHandle;
use uptime_notify::{EmailSender, EventPublisher};
use uptime_store::{cmp_by_next, instant_to_epoch, now_epoch, Check, Command, Store};
use uptime_verify::Verdict;

use crate::timer;

/// Leader-only loop (C5) that drives probe execution at each Check's own interval,
/// verifies failures with peers, and commits the result back through consensus.
pub struct CheckScheduler {
    store: Arc<Store>,
    consensus: Arc<dyn ConsensusHandle>,
    email_sender: Arc<dyn EmailSender>,
    publisher: Option<Arc<dyn EventPublisher>>,
    http_client: reqwest::Client,
    warmup: Duration,
    reload_tx: watch::Sender<()>,
    reload_rx: watch::Receiver<()>,
    webhook_reload_tx: watch::Sender<()>,
    /// Check ids with a spawned tick still awaiting commit; the per-tick walk skips an
    /// id already present here rather than racing a second commit for the same check.
    in_flight: Mutex<HashSet<String>>,
}

impl CheckScheduler {
    pub fn new(
        store: Arc<Store>,
        consensus: Arc<dyn ConsensusHandle>,
        email_sender: Arc<dyn EmailSender>,
        publisher: Option<Arc<dyn EventPublisher>>,
        http_client: reqwest::Client,
        warmup: Duration,
        webhook_reload_tx: watch::Sender<()>,
    ) -> Arc<Self> {
        let (reload_tx, reload_rx) = watch::channel(());
        Arc::new(CheckScheduler {
            store,
            consensus,
            email_sender,
            publisher,
            http_client,
            warmup,
            reload_tx,
            reload_rx,
            webhook_reload_tx,
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    /// Forces the leader loop to re-read the Store and re-sort its in-memory list, used
    /// after an admin `POST`/`DELETE /check`.
    pub fn reload(&self) {
        let _ = self.reload_tx.send(());
    }

    /// A clone of this scheduler's reload trigger, handed to the admin API so a
    /// `POST`/`DELETE /check` can wake the loop without holding the scheduler itself.
    pub fn reload_trigger(&self) -> watch::Sender<()> {
        self.reload_tx.clone()
    }

    /// Runs until `exit` resolves. Starts and stops the tick loop on every leadership
    /// edge, performing a warm-up delay after each promotion.
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

            tracing::info!("promoted to leader, warming up check scheduler");
            tokio::select! {
                _ = &mut exit => return,
                _ = tokio::time::sleep(self.warmup) => {}
            }

            let mut list = self.store.list_checks();
            list.sort_by(cmp_by_next);
            let mut reload_rx = self.reload_rx.clone();

            loop {
                let head_next = list.first().map(|c| c.next);
                tokio::select! {
                    _ = &mut exit => return,
                    res = leader_rx.changed() => {
                        if res.is_err() {
                            return;
                        }
                        if !*leader_rx.borrow() {
                            tracing::info!("demoted, stopping check scheduler");
                            break;
                        }
                    }
                    res = reload_rx.changed() => {
                        if res.is_err() {
                            return;
                        }
                        list = self.store.list_checks();
                        list.sort_by(cmp_by_next);
                    }
                    _ = timer::arm(head_next) => {
                        self.fire_due(&mut list).await;
                    }
                }
            }
        }
    }

    async fn fire_due(self: &Arc<Self>, list: &mut Vec<Check>) {
        let now = SystemTime::now();
        // A Check with no `next` yet (freshly loaded from the Store, or newly created) is
        // due immediately, not "never due" — it counts toward the leading due prefix same
        // as one whose `next` has already elapsed.
        let due = list.iter().take_while(|c| c.next.map_or(true, |n| n <= now)).count();

        for check in list.iter_mut().take(due) {
            if check.next.is_some() {
                check.prev = check.next;
            }
            if check.next.is_none() {
                check.compute_next(now);
            }

            {
                let mut guard = self.in_flight.lock().await;
                if !guard.insert(check.id.clone()) {
                    check.compute_next(now);
                    continue;
                }
            }

            tokio::spawn(Arc::clone(self).run_one_tick(check.clone()));
            check.compute_next(now);
        }

        list.sort_by(cmp_by_next);
    }

    async fn run_one_tick(self: Arc<Self>, mut check: Check) {
        let old_up = check.up;
        let now = now_epoch();

        check.pings += 1;
        if check.first_check == 0 {
            check.first_check = now;
        }
        // `last_check` reflects the instant this tick was *due* for, not wall-clock time at
        // task start — `check.next` still holds that pre-advance due instant here, `fire_due`
        // only advances the copy kept in its own sorted list.
        if let Some(next) = check.next {
            check.last_check = instant_to_epoch(next);
        }

        match uptime_verify::confirm_down(&check, &self.consensus.peers_api()).await {
            Ok(Verdict::ConfirmedUp) => {
                check.up = true;
            }
            Ok(Verdict::ConfirmedDown(error)) => {
                check.up = false;
                check.last_down = now;
                check.last_error = Some(error);
                if old_up {
                    check.outages += 1;
                }
                check.time_down_seconds += check.interval_seconds;
                check.recompute_uptime();
            }
            Ok(Verdict::Disputed) => {
                tracing::warn!(check_id = %check.id, "peers disputed the outage, leaving up/down state unchanged");
            }
            Err(err) => {
                tracing::error!(check_id = %check.id, error = %err, "peer verification failed, dropping this tick");
                self.in_flight.lock().await.remove(&check.id);
                return;
            }
        }

        let status_changed = check.up != old_up;

        if let Err(err) = self.consensus.submit(Command::UpsertCheck(check.clone()).encode()).await {
            tracing::warn!(check_id = %check.id, error = %err, "failed to commit check update");
            self.in_flight.lock().await.remove(&check.id);
            return;
        }

        if status_changed {
            let outcome = uptime_notify::dispatch(
                &check,
                self.publisher.as_ref(),
                self.email_sender.as_ref(),
                &self.http_client,
            )
            .await;

            let enqueued_any = !outcome.pending_webhooks.is_empty();
            for webhook in outcome.pending_webhooks {
                if let Err(err) = self.consensus.submit(Command::UpsertWebhook(webhook).encode()).await {
                    tracing::warn!(check_id = %check.id, error = %err, "failed to commit pending webhook");
                }
            }
            if enqueued_any {
                let _ = self.webhook_reload_tx.send(());
            }
        }

        self.in_flight.lock().await.remove(&check.id);
    }
}
