use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls to the candidate are allowed
    Closed,
    /// The candidate is being skipped (failing fast)
    Open,
    /// Probing whether the candidate recovered
    HalfOpen,
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the candidate is skipped
    pub failure_threshold: usize,
    /// How long a skipped candidate stays skipped before a probe
    pub cooldown: Duration,
    /// Consecutive probe successes before the candidate is trusted again
    pub success_threshold: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// Per-candidate circuit breaker.
///
/// The caption invoker keeps one of these per model id. An open
/// circuit turns the candidate into a soft skip in the fallback walk;
/// it never converts a failure outcome into a different one. After the
/// cooldown a single probe call decides whether the candidate rejoins
/// the rotation.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<RwLock<Inner>>,
    config: CircuitBreakerConfig,
}

struct Inner {
    state: CircuitState,
    consecutive_failures: usize,
    probe_successes: usize,
    opened_at: Option<Instant>,
    total_trips: usize,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                probe_successes: 0,
                opened_at: None,
                total_trips: 0,
            })),
            config,
        }
    }

    /// Whether the next call to this candidate should be attempted.
    /// Transitions Open -> HalfOpen once the cooldown has elapsed.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.write();

        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled_down = inner
                    .opened_at
                    .is_some_and(|at| at.elapsed() >= self.config.cooldown);
                if cooled_down {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_successes = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.write();
        inner.consecutive_failures = 0;

        if inner.state == CircuitState::HalfOpen {
            inner.probe_successes += 1;
            if inner.probe_successes >= self.config.success_threshold {
                inner.state = CircuitState::Closed;
                inner.opened_at = None;
                inner.probe_successes = 0;
            }
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.write();
        inner.probe_successes = 0;

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    inner.total_trips += 1;
                }
            }
            CircuitState::HalfOpen => {
                // Probe failed; back to skipping for another cooldown
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.consecutive_failures = 1;
                inner.total_trips += 1;
            }
            CircuitState::Open => {
                inner.consecutive_failures += 1;
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.read().state
    }

    /// How many times this candidate has been tripped open
    pub fn total_trips(&self) -> usize {
        self.inner.read().total_trips
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failures: usize, cooldown_ms: u64, successes: usize) -> CircuitBreaker {
        CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: failures,
            cooldown: Duration::from_millis(cooldown_ms),
            success_threshold: successes,
        })
    }

    #[test]
    fn test_opens_after_consecutive_failures() {
        let b = breaker(3, 1000, 2);

        assert!(b.allow_request());
        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), CircuitState::Closed);

        b.record_failure();
        assert_eq!(b.state(), CircuitState::Open);
        assert!(!b.allow_request());
        assert_eq!(b.total_trips(), 1);
    }

    #[test]
    fn test_success_resets_the_failure_streak() {
        let b = breaker(3, 1000, 2);

        b.record_failure();
        b.record_failure();
        b.record_success();
        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[test]
    fn test_probe_after_cooldown_closes_on_success() {
        let b = breaker(2, 50, 2);

        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(80));
        assert!(b.allow_request());
        assert_eq!(b.state(), CircuitState::HalfOpen);

        b.record_success();
        assert_eq!(b.state(), CircuitState::HalfOpen);
        b.record_success();
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[test]
    fn test_failed_probe_reopens() {
        let b = breaker(2, 50, 2);

        b.record_failure();
        b.record_failure();

        std::thread::sleep(Duration::from_millis(80));
        assert!(b.allow_request());
        assert_eq!(b.state(), CircuitState::HalfOpen);

        b.record_failure();
        assert_eq!(b.state(), CircuitState::Open);
        assert!(!b.allow_request());
        assert_eq!(b.total_trips(), 2);
    }
}
