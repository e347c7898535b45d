use crate::config::SweepConfig;
use crate::error::SweepError;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_MIN_WAIT: Duration = Duration::from_secs(10);

/// Where the sweep blocks while waiting out a throttle
#[allow(async_fn_in_trait)]
pub trait Pause {
    async fn pause(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPause;

impl Pause for TokioPause {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// How long and how often a throttled request may be retried.
///
/// `None` limits mean unbounded: the default policy waits out every
/// throttle and retries the same request forever.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub min_wait: Duration,
    /// Consecutive waits allowed for a single request
    pub max_attempts: Option<u32>,
    /// Cumulative wait allowed across the run
    pub max_total_wait: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unlimited(DEFAULT_MIN_WAIT)
    }
}

impl RetryPolicy {
    pub fn unlimited(min_wait: Duration) -> Self {
        Self {
            min_wait,
            max_attempts: None,
            max_total_wait: None,
        }
    }

    pub fn from_config(sweep: &SweepConfig) -> Self {
        Self {
            min_wait: sweep.min_wait(),
            max_attempts: sweep.max_rate_limit_attempts,
            max_total_wait: sweep.max_rate_limit_wait(),
        }
    }
}

/// `max(reset_at - now + 1s, min_wait)`
pub fn compute_wait(reset_at: DateTime<Utc>, now: DateTime<Utc>, min_wait: Duration) -> Duration {
    let until_reset = (reset_at - now + chrono::Duration::seconds(1))
        .to_std()
        .unwrap_or(Duration::ZERO);
    until_reset.max(min_wait)
}

/// Waits out throttling signals and enforces the retry policy
#[derive(Debug)]
pub struct RateLimiter<P = TokioPause> {
    policy: RetryPolicy,
    pause: P,
    consecutive: u32,
    total_waits: u32,
    total_waited: Duration,
}

impl<P: Pause> RateLimiter<P> {
    pub fn with_pause(policy: RetryPolicy, pause: P) -> Self {
        Self {
            policy,
            pause,
            consecutive: 0,
            total_waits: 0,
            total_waited: Duration::ZERO,
        }
    }

    /// Block until the provider's window resets, or fail if the policy's
    /// budget would be exceeded. Returns the time waited.
    pub async fn wait_out(&mut self, reset_at: DateTime<Utc>) -> Result<Duration, SweepError> {
        let wait = compute_wait(reset_at, Utc::now(), self.policy.min_wait);

        if let Some(max_attempts) = self.policy.max_attempts {
            if self.consecutive >= max_attempts {
                warn!(
                    "Still rate limited after {} consecutive waits, giving up",
                    self.consecutive
                );
                return Err(self.exhausted());
            }
        }
        if let Some(max_total) = self.policy.max_total_wait {
            if self.total_waited + wait > max_total {
                warn!(
                    "Waiting {:?} more would exceed the {:?} rate limit budget",
                    wait, max_total
                );
                return Err(self.exhausted());
            }
        }

        info!("Rate limited. Reset at {}. Waiting for {:?}", reset_at, wait);
        self.pause.pause(wait).await;

        self.consecutive += 1;
        self.total_waits += 1;
        self.total_waited += wait;
        Ok(wait)
    }

    /// Pause for the minimum wait without touching the throttle budget
    pub async fn cool_down(&self) -> Duration {
        let wait = self.policy.min_wait;
        self.pause.pause(wait).await;
        wait
    }

    /// The throttled request finally went through
    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    pub fn total_waits(&self) -> u32 {
        self.total_waits
    }

    pub fn total_waited(&self) -> Duration {
        self.total_waited
    }

    fn exhausted(&self) -> SweepError {
        SweepError::RetryBudgetExhausted {
            attempts: self.total_waits,
            waited_secs: self.total_waited.as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPause {
        waits: Mutex<Vec<Duration>>,
    }

    impl Pause for &RecordingPause {
        async fn pause(&self, duration: Duration) {
            self.waits.lock().unwrap().push(duration);
        }
    }

    #[test]
    fn test_compute_wait_short_reset_uses_minimum() {
        let now = Utc::now();
        let reset_at = now + chrono::Duration::seconds(5);
        assert_eq!(
            compute_wait(reset_at, now, DEFAULT_MIN_WAIT),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_compute_wait_long_reset_adds_one_second() {
        let now = Utc::now();
        let reset_at = now + chrono::Duration::seconds(900);
        assert_eq!(
            compute_wait(reset_at, now, DEFAULT_MIN_WAIT),
            Duration::from_secs(901)
        );
    }

    #[test]
    fn test_compute_wait_reset_in_past() {
        let now = Utc::now();
        let reset_at = now - chrono::Duration::seconds(120);
        assert_eq!(
            compute_wait(reset_at, now, DEFAULT_MIN_WAIT),
            DEFAULT_MIN_WAIT
        );
    }

    #[test]
    fn test_policy_from_config() {
        let sweep = SweepConfig {
            min_wait_secs: 15,
            max_rate_limit_attempts: Some(5),
            max_rate_limit_wait_secs: Some(600),
            ..SweepConfig::default()
        };
        let policy = RetryPolicy::from_config(&sweep);
        assert_eq!(policy.min_wait, Duration::from_secs(15));
        assert_eq!(policy.max_attempts, Some(5));
        assert_eq!(policy.max_total_wait, Some(Duration::from_secs(600)));

        assert_eq!(RetryPolicy::default(), RetryPolicy::unlimited(DEFAULT_MIN_WAIT));
    }

    #[tokio::test]
    async fn test_unlimited_policy_keeps_waiting() {
        let pause = RecordingPause::default();
        let mut limiter = RateLimiter::with_pause(RetryPolicy::default(), &pause);

        for _ in 0..50 {
            let waited = limiter.wait_out(Utc::now()).await.unwrap();
            assert_eq!(waited, DEFAULT_MIN_WAIT);
        }

        assert_eq!(limiter.total_waits(), 50);
        assert_eq!(limiter.total_waited(), Duration::from_secs(500));
        assert_eq!(pause.waits.lock().unwrap().len(), 50);
    }

    #[tokio::test]
    async fn test_max_attempts_is_per_request() {
        let pause = RecordingPause::default();
        let policy = RetryPolicy {
            max_attempts: Some(2),
            ..RetryPolicy::default()
        };
        let mut limiter = RateLimiter::with_pause(policy, &pause);

        limiter.wait_out(Utc::now()).await.unwrap();
        limiter.wait_out(Utc::now()).await.unwrap();
        let err = limiter.wait_out(Utc::now()).await.unwrap_err();
        assert!(matches!(
            err,
            SweepError::RetryBudgetExhausted {
                attempts: 2,
                waited_secs: 20
            }
        ));

        // a success clears the consecutive count
        limiter.reset();
        assert!(limiter.wait_out(Utc::now()).await.is_ok());
        assert_eq!(pause.waits.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_max_total_wait_spans_requests() {
        let pause = RecordingPause::default();
        let policy = RetryPolicy {
            max_total_wait: Some(Duration::from_secs(25)),
            ..RetryPolicy::default()
        };
        let mut limiter = RateLimiter::with_pause(policy, &pause);

        limiter.wait_out(Utc::now()).await.unwrap();
        limiter.reset();
        limiter.wait_out(Utc::now()).await.unwrap();
        limiter.reset();
        assert!(limiter.wait_out(Utc::now()).await.is_err());
        assert_eq!(limiter.total_waited(), Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_cool_down_does_not_spend_budget() {
        let pause = RecordingPause::default();
        let policy = RetryPolicy {
            max_attempts: Some(1),
            ..RetryPolicy::default()
        };
        let mut limiter = RateLimiter::with_pause(policy, &pause);

        assert_eq!(limiter.cool_down().await, DEFAULT_MIN_WAIT);
        assert_eq!(limiter.total_waits(), 0);
        assert!(limiter.wait_out(Utc::now()).await.is_ok());
    }
}
