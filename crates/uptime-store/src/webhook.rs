use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// A durable record of an undelivered webhook notification awaiting retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebHook {
    pub id: String,
    pub url: String,
    pub payload: Vec<u8>,
    pub tries: u32,
    pub first_try: i64,

    #[serde(skip)]
    pub next: Option<SystemTime>,
}

impl WebHook {
    pub fn new(url: String, payload: Vec<u8>, first_try: i64) -> Self {
        WebHook {
            id: uuid::Uuid::new_v4().to_string(),
            url,
            payload,
            tries: 1,
            first_try,
            next: None,
        }
    }

    /// `(2^tries) / 2` seconds, seeded from or added to the previous `next` using the
    /// same fixed-rate rule the Check Scheduler uses. Left uncapped, matching the source
    /// (tries=20 implies a ~6 day delay; see DESIGN.md for why this is preserved as-is).
    pub fn backoff_delay(&self) -> std::time::Duration {
        let seconds = 2u64.saturating_pow(self.tries) / 2;
        std::time::Duration::from_secs(seconds.max(1))
    }

    pub fn compute_next(&mut self, now: SystemTime) {
        let delay = self.backoff_delay();
        match self.next {
            None => {
                self.next = Some(now + delay);
            }
            Some(next) => {
                if now > next {
                    self.next = Some(next + delay);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_delay_matches_formula() {
        let mut wh = WebHook::new("http://x/".into(), vec![], 0);
        wh.tries = 1;
        assert_eq!(wh.backoff_delay(), std::time::Duration::from_secs(1));
        wh.tries = 4;
        assert_eq!(wh.backoff_delay(), std::time::Duration::from_secs(8));
        wh.tries = 20;
        assert_eq!(wh.backoff_delay(), std::time::Duration::from_secs(524_288));
    }
}
