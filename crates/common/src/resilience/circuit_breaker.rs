use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Circuit breaker state machine: CLOSED → OPEN → HALF_OPEN → CLOSED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Percentage of failed calls in the window that trips the breaker.
    pub failure_rate_threshold: f64,
    /// Percentage of slow calls in the window that trips the breaker.
    pub slow_call_rate_threshold: f64,
    /// A successful call taking at least this long counts as slow.
    pub slow_call_duration: Duration,
    /// Rolling window of most recent call outcomes.
    pub sliding_window_size: usize,
    /// No evaluation happens until the window holds this many outcomes.
    pub minimum_calls: usize,
    /// How long an open breaker waits before allowing half-open probes.
    pub open_wait: Duration,
    /// Number of probe calls allowed through in half-open state. All must
    /// succeed to close the circuit; any failure reopens it.
    pub half_open_probes: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            slow_call_rate_threshold: 100.0,
            slow_call_duration: Duration::from_secs(5),
            sliding_window_size: 20,
            minimum_calls: 10,
            open_wait: Duration::from_secs(30),
            half_open_probes: 3,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CallOutcome {
    success: bool,
    slow: bool,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    window: VecDeque<CallOutcome>,
    opened_at: Option<Instant>,
    probes_issued: u32,
    probe_successes: u32,
}

/// Sliding-window circuit breaker for one resilience category.
///
/// Callers must pair every successful `try_acquire` with exactly one
/// `record_success` or `record_failure`. Validation-class errors are
/// excluded by the governor before they reach `record_failure`.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: RwLock<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: RwLock::new(BreakerInner {
                state: CircuitState::Closed,
                window: VecDeque::new(),
                opened_at: None,
                probes_issued: 0,
                probe_successes: 0,
            }),
        }
    }

    /// Ask permission to place a call. `Err(())` means the circuit is open
    /// (or the half-open probe budget is spent) and the caller must fall
    /// back without invoking the wrapped operation.
    pub async fn try_acquire(&self) -> Result<(), ()> {
        let mut inner = self.inner.write().await;

        if inner.state == CircuitState::Open {
            let waited_out = inner
                .opened_at
                .map(|at| at.elapsed() >= self.config.open_wait)
                .unwrap_or(true);
            if !waited_out {
                return Err(());
            }
            info!(breaker = %self.name, "circuit transitioning to half-open");
            inner.state = CircuitState::HalfOpen;
            inner.probes_issued = 0;
            inner.probe_successes = 0;
        }

        if inner.state == CircuitState::HalfOpen {
            if inner.probes_issued >= self.config.half_open_probes {
                return Err(());
            }
            inner.probes_issued += 1;
        }

        Ok(())
    }

    pub async fn record_success(&self, duration: Duration) {
        let mut inner = self.inner.write().await;
        match inner.state {
            CircuitState::HalfOpen => {
                inner.probe_successes += 1;
                if inner.probe_successes >= self.config.half_open_probes {
                    info!(breaker = %self.name, "circuit closed after successful probes");
                    self.close(&mut inner);
                }
            }
            _ => {
                self.push_outcome(
                    &mut inner,
                    CallOutcome {
                        success: true,
                        slow: duration >= self.config.slow_call_duration,
                    },
                );
                self.evaluate(&mut inner);
            }
        }
    }

    pub async fn record_failure(&self) {
        let mut inner = self.inner.write().await;
        match inner.state {
            CircuitState::HalfOpen => {
                warn!(breaker = %self.name, "probe failed, circuit reopening");
                self.open(&mut inner);
            }
            _ => {
                self.push_outcome(
                    &mut inner,
                    CallOutcome {
                        success: false,
                        slow: false,
                    },
                );
                self.evaluate(&mut inner);
            }
        }
    }

    /// Operator-initiated reset back to closed with a cleared window.
    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        info!(breaker = %self.name, "circuit manually reset");
        self.close(&mut inner);
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.read().await.state
    }

    fn push_outcome(&self, inner: &mut BreakerInner, outcome: CallOutcome) {
        inner.window.push_back(outcome);
        while inner.window.len() > self.config.sliding_window_size {
            inner.window.pop_front();
        }
    }

    fn evaluate(&self, inner: &mut BreakerInner) {
        if inner.window.len() < self.config.minimum_calls {
            return;
        }
        let total = inner.window.len() as f64;
        let failures = inner.window.iter().filter(|o| !o.success).count() as f64;
        let slow = inner.window.iter().filter(|o| o.slow).count() as f64;

        let failure_rate = failures / total * 100.0;
        let slow_rate = slow / total * 100.0;

        if failure_rate >= self.config.failure_rate_threshold
            || slow_rate >= self.config.slow_call_rate_threshold
        {
            warn!(
                breaker = %self.name,
                failure_rate = failure_rate,
                slow_rate = slow_rate,
                "circuit tripped"
            );
            self.open(inner);
        }
    }

    fn open(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.window.clear();
        inner.probes_issued = 0;
        inner.probe_successes = 0;
    }

    fn close(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Closed;
        inner.opened_at = None;
        inner.window.clear();
        inner.probes_issued = 0;
        inner.probe_successes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(minimum_calls: usize) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_rate_threshold: 50.0,
            minimum_calls,
            sliding_window_size: 10,
            open_wait: Duration::from_secs(60),
            half_open_probes: 2,
            ..CircuitBreakerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_trips_at_failure_rate_threshold_after_minimum_calls() {
        let breaker = CircuitBreaker::new("test", config(4));

        breaker.record_failure().await;
        breaker.record_failure().await;
        breaker.record_success(Duration::from_millis(1)).await;
        assert_eq!(breaker.state().await, CircuitState::Closed);

        breaker.record_success(Duration::from_millis(1)).await;
        // 2 failures out of 4 calls = 50%, at threshold
        assert_eq!(breaker.state().await, CircuitState::Open);
        assert!(breaker.try_acquire().await.is_err());
    }

    #[tokio::test]
    async fn test_half_open_probes_close_the_circuit() {
        let breaker = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                open_wait: Duration::ZERO,
                ..config(2)
            },
        );

        breaker.record_failure().await;
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        // Wait elapsed immediately; probes allowed through
        assert!(breaker.try_acquire().await.is_ok());
        assert_eq!(breaker.state().await, CircuitState::HalfOpen);
        assert!(breaker.try_acquire().await.is_ok());
        // Probe budget spent
        assert!(breaker.try_acquire().await.is_err());

        breaker.record_success(Duration::from_millis(1)).await;
        breaker.record_success(Duration::from_millis(1)).await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_probe_failure_reopens() {
        let breaker = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                open_wait: Duration::ZERO,
                ..config(2)
            },
        );

        breaker.record_failure().await;
        breaker.record_failure().await;
        assert!(breaker.try_acquire().await.is_ok());

        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_slow_calls_trip_the_slow_rate_threshold() {
        let breaker = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                slow_call_rate_threshold: 50.0,
                slow_call_duration: Duration::from_millis(100),
                ..config(2)
            },
        );

        breaker.record_success(Duration::from_millis(200)).await;
        breaker.record_success(Duration::from_millis(200)).await;
        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_manual_reset() {
        let breaker = CircuitBreaker::new("test", config(2));
        breaker.record_failure().await;
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        breaker.reset().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert!(breaker.try_acquire().await.is_ok());
    }
}
