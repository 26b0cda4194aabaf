use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Minimum allowed `interval_seconds`; a zero or missing interval is clamped to this.
pub const MIN_INTERVAL_SECONDS: u64 = 1;
pub const DEFAULT_INTERVAL_SECONDS: u64 = 60;

/// Structured classification of a failed probe, attached to a `Check` as `last_error`
/// and returned verbatim in a peer's `PingResponse`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeError {
    pub status_code: Option<u16>,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Dns,
    Timeout,
    Response,
    Server,
    Unknown,
}

/// A monitored endpoint and its observed statistics.
///
/// `prev`/`next` are scheduling-only fields: never serialized into the consensus log,
/// always rebuilt from `last_check` when a Check is applied (see `Check::rebuild_schedule`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub id: String,
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    #[serde(default)]
    pub webhooks: Vec<String>,
    #[serde(default)]
    pub emails: Vec<String>,

    #[serde(default = "default_up")]
    pub up: bool,
    #[serde(default)]
    pub first_check: i64,
    #[serde(default)]
    pub last_check: i64,
    #[serde(default)]
    pub last_down: i64,
    #[serde(default)]
    pub last_error: Option<ProbeError>,
    #[serde(default)]
    pub pings: u64,
    #[serde(default)]
    pub outages: u64,
    #[serde(default)]
    pub time_down_seconds: u64,
    #[serde(default)]
    pub uptime: f64,

    #[serde(skip)]
    pub prev: Option<SystemTime>,
    #[serde(skip)]
    pub next: Option<SystemTime>,
}

fn default_method() -> String {
    "HEAD".to_string()
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECONDS
}

fn default_up() -> bool {
    true
}

impl Check {
    /// Builds a new Check from admin-supplied fields, minting an id if absent and
    /// clamping the interval to the minimum.
    pub fn new(id: Option<String>, url: String, method: Option<String>, interval_seconds: Option<u64>) -> Self {
        Check {
            id: id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            url,
            method: method.unwrap_or_else(default_method),
            interval_seconds: interval_seconds
                .unwrap_or(DEFAULT_INTERVAL_SECONDS)
                .max(MIN_INTERVAL_SECONDS),
            webhooks: Vec::new(),
            emails: Vec::new(),
            up: true,
            first_check: 0,
            last_check: 0,
            last_down: 0,
            last_error: None,
            pings: 0,
            outages: 0,
            time_down_seconds: 0,
            uptime: 0.0,
            prev: None,
            next: None,
        }
    }

    /// Re-derives `prev`/`next` from the persisted `last_check`, as required whenever a
    /// Check is applied from the log or restored from a snapshot. `prev`/`next` are never
    /// part of the wire format; this is the only place they are (re)populated.
    pub fn rebuild_schedule(&mut self) {
        self.prev = None;
        self.next = None;
        if self.last_check != 0 {
            self.prev = epoch_to_instant(self.last_check);
        }
        if self.interval_seconds == 0 {
            self.interval_seconds = MIN_INTERVAL_SECONDS;
        }
    }

    /// Advances `next` by one interval using the fixed-rate rule: if the loop is behind
    /// schedule (`now > next`), either seed `next` from `now` (first run) or add one
    /// interval to the previous `next` (catch-up, never drifts further behind).
    pub fn compute_next(&mut self, now: SystemTime) {
        let delay = std::time::Duration::from_secs(self.interval_seconds);
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

    /// `(interval * pings - time_down) / (interval * pings)`, preserved from the source
    /// for behavioral parity even though it over-counts partial-interval downtime.
    pub fn recompute_uptime(&mut self) {
        if self.time_down_seconds > 0 && self.pings > 0 {
            let total = self.interval_seconds * self.pings;
            if total > 0 {
                self.uptime = (total as f64 - self.time_down_seconds as f64) / total as f64;
            }
        }
    }
}

fn epoch_to_instant(epoch_seconds: i64) -> Option<SystemTime> {
    if epoch_seconds <= 0 {
        return None;
    }
    Some(UNIX_EPOCH + std::time::Duration::from_secs(epoch_seconds as u64))
}

/// Inverse of `epoch_to_instant`: the epoch seconds to persist for a scheduling instant,
/// used when committing `last_check` as the due instant a tick fired for.
pub fn instant_to_epoch(instant: SystemTime) -> i64 {
    instant.duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

pub fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Orders checks by `next` ascending, with a zero/absent `next` sorting first — a Check
/// freshly loaded from the Store has no `next` yet and must be treated as the most
/// overdue, not as never due.
pub fn cmp_by_next(a: &Check, b: &Check) -> std::cmp::Ordering {
    match (a.next, b.next) {
        (None, None) => std::cmp::Ordering::Equal,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        (Some(x), Some(y)) => x.cmp(&y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clamps_zero_interval() {
        let check = Check::new(None, "http://x/".into(), None, Some(0));
        assert_eq!(check.interval_seconds, MIN_INTERVAL_SECONDS);
    }

    #[test]
    fn compute_next_seeds_from_now_on_first_run() {
        let mut check = Check::new(None, "http://x/".into(), None, Some(60));
        let now = SystemTime::now();
        check.compute_next(now);
        assert_eq!(check.next, Some(now + std::time::Duration::from_secs(60)));
    }

    #[test]
    fn compute_next_is_fixed_rate_not_drifting() {
        let mut check = Check::new(None, "http://x/".into(), None, Some(60));
        let t0 = SystemTime::now();
        check.next = Some(t0);
        let very_late = t0 + std::time::Duration::from_secs(600);
        check.compute_next(very_late);
        assert_eq!(check.next, Some(t0 + std::time::Duration::from_secs(60)));
    }

    #[test]
    fn compute_next_leaves_unchanged_when_not_due() {
        let mut check = Check::new(None, "http://x/".into(), None, Some(60));
        let t0 = SystemTime::now();
        check.next = Some(t0 + std::time::Duration::from_secs(30));
        check.compute_next(t0);
        assert_eq!(check.next, Some(t0 + std::time::Duration::from_secs(30)));
    }

    #[test]
    fn uptime_is_zero_until_any_downtime_recorded() {
        let mut check = Check::new(None, "http://x/".into(), None, Some(60));
        check.pings = 10;
        check.recompute_uptime();
        assert_eq!(check.uptime, 0.0);
    }

    #[test]
    fn uptime_formula_matches_spec() {
        let mut check = Check::new(None, "http://x/".into(), None, Some(60));
        check.pings = 10;
        check.time_down_seconds = 60;
        check.recompute_uptime();
        assert!((check.uptime - (600.0 - 60.0) / 600.0).abs() < 1e-9);
    }
}
