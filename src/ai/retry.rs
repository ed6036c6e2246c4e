//! Retry and polling policies shared by the submitter and the poller.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Delay schedule. `delay_for(n)` is the wait after the n-th attempt (1-based).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed(Duration),
    /// `first * factor^(n-1)`
    Exponential { first: Duration, factor: f64 },
}

impl Backoff {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { first, factor } => {
                let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                first.mul_f64(factor.powi(exp))
            }
        }
    }
}

/// Bounded retry with backoff for one-shot operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Three attempts, waiting 3s then 6s (the schedule continues with 12s).
    pub fn submission() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Exponential {
                first: Duration::from_millis(3000),
                factor: 2.0,
            },
        }
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget is spent. Returns the last error and the number
    /// of attempts made.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<(T, u32), (E, u32)>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok((value, attempt)),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.backoff.delay_for(attempt);
                    warn!(
                        operation = %operation,
                        attempt,
                        remaining = max_attempts - attempt,
                        delay_ms = delay.as_millis() as u64,
                        "{} failed, retrying: {}",
                        operation,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err((e, attempt)),
            }
        }
    }
}

/// When a polling loop has to give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ceiling {
    /// Total wall-clock budget since the first status check.
    Deadline(Duration),
    /// Maximum number of status checks.
    Attempts(u32),
}

/// Polling cadence: how long to wait between status checks and when to stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollCadence {
    pub interval: Backoff,
    pub ceiling: Ceiling,
}

impl PollCadence {
    /// Every 3s, for at most 5 minutes.
    pub fn fixed() -> Self {
        Self {
            interval: Backoff::Fixed(Duration::from_secs(3)),
            ceiling: Ceiling::Deadline(Duration::from_secs(5 * 60)),
        }
    }

    /// `3s * 1.5^n` after the n-th check, at most 10 checks.
    pub fn growing() -> Self {
        Self {
            interval: Backoff::Exponential {
                first: Duration::from_millis(4500),
                factor: 1.5,
            },
            ceiling: Ceiling::Attempts(10),
        }
    }

    /// Whether polling must stop after `attempts` checks begun at `started`.
    pub fn exhausted(&self, attempts: u32, started: Instant) -> bool {
        match self.ceiling {
            Ceiling::Deadline(budget) => started.elapsed() >= budget,
            Ceiling::Attempts(max) => attempts >= max,
        }
    }

    /// The instant polling must stop by, if the ceiling is time based.
    pub fn deadline_from(&self, started: Instant) -> Option<Instant> {
        match self.ceiling {
            Ceiling::Deadline(budget) => Some(started + budget),
            Ceiling::Attempts(_) => None,
        }
    }
}

impl Default for PollCadence {
    fn default() -> Self {
        Self::fixed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[derive(Debug)]
    struct Flaky(bool);

    impl Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky(retryable={})", self.0)
        }
    }

    impl Retryable for Flaky {
        fn is_retryable(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn submission_backoff_doubles_from_three_seconds() {
        let policy = RetryPolicy::submission();
        let delays: Vec<_> = (1..=3).map(|n| policy.backoff.delay_for(n)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(3),
                Duration::from_secs(6),
                Duration::from_secs(12)
            ]
        );
        assert!(delays.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn growing_cadence_is_three_seconds_times_one_and_a_half_to_the_n() {
        let cadence = PollCadence::growing();
        for n in 1..=5 {
            let expected = Duration::from_millis(3000).mul_f64(1.5f64.powi(n as i32));
            let actual = cadence.interval.delay_for(n);
            let diff = if actual > expected {
                actual - expected
            } else {
                expected - actual
            };
            assert!(diff < Duration::from_millis(1), "n={} {:?} vs {:?}", n, actual, expected);
        }
    }

    #[test]
    fn fixed_cadence_never_grows() {
        let cadence = PollCadence::fixed();
        assert_eq!(cadence.interval.delay_for(1), Duration::from_secs(3));
        assert_eq!(cadence.interval.delay_for(40), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_ceiling_is_counted_not_timed() {
        let cadence = PollCadence::growing();
        let started = Instant::now();
        assert!(!cadence.exhausted(9, started));
        assert!(cadence.exhausted(10, started));
        assert_eq!(cadence.deadline_from(started), None);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_ceiling_tracks_elapsed_time() {
        let cadence = PollCadence::fixed();
        let started = Instant::now();
        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(!cadence.exhausted(1000, started));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cadence.exhausted(0, started));
    }

    #[tokio::test(start_paused = true)]
    async fn run_retries_transient_errors_with_backoff() {
        let calls = &AtomicU32::new(0);
        let started = Instant::now();
        let result = RetryPolicy::submission()
            .run("test op", move |_| async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Flaky(true))
                } else {
                    Ok("done")
                }
            })
            .await;

        let (value, attempts) = tokio_test::assert_ok!(result);
        assert_eq!(value, "done");
        assert_eq!(attempts, 3);
        assert_eq!(started.elapsed(), Duration::from_secs(3 + 6));
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_fatal_error() {
        let calls = &AtomicU32::new(0);
        let result: Result<((), u32), (Flaky, u32)> = RetryPolicy::submission()
            .run("test op", move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Flaky(false))
            })
            .await;

        let (_, attempts) = tokio_test::assert_err!(result);
        assert_eq!(attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let result: Result<((), u32), (Flaky, u32)> = RetryPolicy::submission()
            .run("test op", move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Flaky(true))
            })
            .await;

        let (_, attempts) = tokio_test::assert_err!(result);
        assert_eq!(attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
