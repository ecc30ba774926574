// ABOUTME: Bounded poll-until loop shared by health checking and daemon discovery.
// ABOUTME: Every wait has a fixed interval, a hard deadline, and a defined timeout failure.

use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Interval and deadline for a polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PollPolicy {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T, O> {
    /// The condition holds; polling stops with this value.
    Ready(T),
    /// Not yet; `O` is the observation kept for the timeout report.
    NotYet(O),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollError<O, E> {
    /// The deadline passed without the condition holding.
    TimedOut {
        last: Option<O>,
        attempts: u32,
        waited: Duration,
    },
    /// A check failed in a way that must not be retried.
    Failed(E),
}

/// Run `check` every `policy.interval` until it reports `Ready`, fails, or the
/// deadline passes.
///
/// Each individual check is itself bounded by the remaining time, so the whole
/// loop never runs noticeably past `policy.timeout` even if a check hangs.
pub async fn poll_until<T, O, E, F, Fut>(
    policy: &PollPolicy,
    mut check: F,
) -> Result<T, PollError<O, E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Attempt<T, O>, E>>,
{
    let started = Instant::now();
    let deadline = started + policy.timeout;
    let mut attempts = 0u32;
    let mut last = None;

    loop {
        attempts += 1;
        let remaining = deadline.saturating_duration_since(Instant::now());

        match tokio::time::timeout(remaining, check()).await {
            Ok(Ok(Attempt::Ready(value))) => return Ok(value),
            Ok(Ok(Attempt::NotYet(observation))) => last = Some(observation),
            Ok(Err(e)) => return Err(PollError::Failed(e)),
            Err(_elapsed) => break,
        }

        let now = Instant::now();
        if now >= deadline {
            break;
        }
        tokio::time::sleep(policy.interval.min(deadline - now)).await;
    }

    tracing::debug!(attempts, "poll deadline of {:?} reached", policy.timeout);

    Err(PollError::TimedOut {
        last,
        attempts,
        waited: started.elapsed(),
    })
}
