//! Notification Dispatcher (C6): on a check's status transition, fans out concurrently
//! to an optional event publisher, every subscribed email address, and every subscribed
//! webhook target. Webhook deliveries that fail become pending `WebHook`s for the
//! WebHook Retry Scheduler (C7) to pick up; nothing here talks to consensus directly —
//! callers submit the returned pending webhooks themselves.

mod email;

pub use email::{EmailSender, SmtpConfig, SmtpEmailSender};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uptime_store::{now_epoch, Check, WebHook};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("email delivery failed: {0}")]
    Email(String),
}

/// An optional sink for status-change events, independent of email/webhook delivery.
/// When no publisher is configured, this leg of the fan-out is skipped entirely rather
/// than treated as an error.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, check: &Check);
}

/// The outcome of dispatching notifications for one status transition: any webhook
/// deliveries that failed and must be retried, plus the first email error encountered
/// (non-fatal; logged and otherwise ignored by the caller).
pub struct DispatchOutcome {
    pub pending_webhooks: Vec<WebHook>,
    pub email_errors: Vec<NotifyError>,
}

/// Fans a confirmed status transition out to the publisher, email recipients, and
/// webhook targets, all concurrently. `check.up` reflects the *new* state.
#[tracing::instrument(skip_all, fields(check_id = %check.id, up = check.up))]
pub async fn dispatch(
    check: &Check,
    publisher: Option<&Arc<dyn EventPublisher>>,
    email_sender: &dyn EmailSender,
    http_client: &reqwest::Client,
) -> DispatchOutcome {
    let subject = format!("{} is {}", check.url, if check.up { "up" } else { "down" });

    let publish_fut = async {
        if let Some(publisher) = publisher {
            publisher.publish(check).await;
        }
    };

    let email_fut = async {
        let mut errors = Vec::new();
        for to in &check.emails {
            if let Err(err) = email_sender.send(to, &subject, &subject).await {
                tracing::warn!(recipient = %to, error = %err, "email notification failed");
                errors.push(err);
            }
        }
        errors
    };

    let webhook_fut = async {
        let payload = serde_json::to_vec(check).expect("Check always serializes");
        let deliveries = check
            .webhooks
            .iter()
            .map(|url| deliver_webhook(http_client, url, &payload));
        futures::future::join_all(deliveries).await
    };

    let (_, email_errors, webhook_results) = futures::join!(publish_fut, email_fut, webhook_fut);

    let pending_webhooks = webhook_results
        .into_iter()
        .filter_map(|(url, delivered)| {
            if delivered {
                None
            } else {
                Some(WebHook::new(url, webhook_payload(check), now_epoch()))
            }
        })
        .collect();

    DispatchOutcome {
        pending_webhooks,
        email_errors,
    }
}

fn webhook_payload(check: &Check) -> Vec<u8> {
    serde_json::to_vec(check).expect("Check always serializes")
}

async fn deliver_webhook(client: &reqwest::Client, url: &str, payload: &[u8]) -> (String, bool) {
    let result = client
        .post(url)
        .header("content-type", "application/json")
        .body(payload.to_vec())
        .send()
        .await;

    match result {
        Ok(response) if response.status().as_u16() == 200 => (url.to_string(), true),
        Ok(response) => {
            tracing::warn!(url = %url, status = %response.status(), "webhook delivery received non-200");
            (url.to_string(), false)
        }
        Err(err) => {
            tracing::warn!(url = %url, error = %err, "webhook delivery transport failure");
            (url.to_string(), false)
        }
    }
}
