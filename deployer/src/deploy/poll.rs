//! Bounded polling with a fixed interval and a wall-clock deadline

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

/// Poll options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Delay between polls
    pub interval: Duration,

    /// Give up once this much time has passed since the first poll
    pub timeout: Duration,
}

impl PollOptions {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Result of a bounded poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The predicate accepted this value
    Ready(T),

    /// The deadline passed; carries the last value fetched
    TimedOut(T),
}

/// Fetch until `ready` accepts the value or the deadline passes.
///
/// Every iteration fetches, then evaluates, then checks the deadline, so a
/// fetch that finishes past the deadline is still consulted once. Fetch
/// errors end the poll immediately.
pub async fn poll_until<T, E, F, Fut, P>(
    options: &PollOptions,
    mut fetch: F,
    mut ready: P,
) -> Result<PollOutcome<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&T) -> bool,
{
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let value = fetch().await?;

        if ready(&value) {
            debug!("Poll satisfied after {} attempt(s)", attempt);
            return Ok(PollOutcome::Ready(value));
        }

        if started.elapsed() >= options.timeout {
            debug!(
                "Poll timed out after {} attempt(s) ({:?})",
                attempt, options.timeout
            );
            return Ok(PollOutcome::TimedOut(value));
        }

        debug!("Poll attempt {} not ready, retrying in {:?}", attempt, options.interval);
        sleep(options.interval).await;
    }
}
