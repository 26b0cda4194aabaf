use std::time::{Duration, SystemTime};

/// An unreachable-in-practice wakeup used when there is nothing scheduled: years away,
/// so the loop parks until a reload or stop signal arrives instead of busy-waiting.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 10);

/// Arms a `tokio::time::sleep` for the head of a time-ordered list.
///
/// The outer `Option` distinguishes an empty list (`None`, nothing to wait for: park on
/// `FAR_FUTURE`) from a non-empty list whose head carries a scheduling instant
/// (`Some(head_next)`). The inner `Option` distinguishes a head that has never been
/// scheduled (`Some(None)`, a Check/WebHook freshly loaded from the Store always starts
/// this way) — due immediately — from one with a concrete due instant (`Some(Some(due))`),
/// which sleeps for zero if `due` is already in the past.
pub fn arm(head: Option<Option<SystemTime>>) -> tokio::time::Sleep {
    let delay = match head {
        None => FAR_FUTURE,
        Some(None) => Duration::ZERO,
        Some(Some(due)) => due.duration_since(SystemTime::now()).unwrap_or(Duration::ZERO),
    };
    tokio::time::sleep(delay)
}
