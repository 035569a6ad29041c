//! Three-state circuit breaker gate (C4) — spec.md §4.4.

use crate::error::Error;
use crate::resilience::rolling_window::RollingWindow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Circuit breaker states (spec.md §4.4).
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitState {
    /// Pass all calls through.
    Closed,
    /// Reject all calls; synthesizes `CircuitOpen`.
    Open { opened_at: Instant },
    /// Admit at most `max_requests` probes.
    HalfOpen { consecutive_successes: u32, probes_admitted: u32 },
}

/// Circuit breaker configuration (spec.md §4.4).
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Window length and bucket count backing the rolling failure count.
    pub window: Duration,
    pub window_buckets: usize,
    /// Minimum samples in window before the breaker can trip.
    pub min_request_count: u64,
    /// Failure rate (0.0..=1.0) that must be exceeded to trip.
    pub expected_failure_rate: f64,
    /// Absolute failure count that must also be met to trip.
    pub failure_threshold: u64,
    /// Time to wait after opening before admitting a probe.
    pub timeout: Duration,
    /// Consecutive half-open successes required to close.
    pub success_threshold: u32,
    /// Maximum concurrent probes admitted while half-open.
    pub max_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            window_buckets: 10,
            min_request_count: 10,
            expected_failure_rate: 0.5,
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            success_threshold: 2,
            // Must be >= success_threshold: HalfOpen -> Closed needs
            // success_threshold *consecutive* successes within the admitted
            // probe budget, so a smaller budget could never close again.
            max_requests: 2,
        }
    }
}

impl CircuitBreakerConfig {
    /// Checks the `max_requests >= success_threshold` invariant that keeps a
    /// tripped breaker able to re-close (spec.md §4.4). Adapters that build a
    /// config by hand should call this before handing it to a
    /// [`CircuitBreaker`]; the built-in [`Default`] always satisfies it.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_requests < self.success_threshold {
            return Err(Error::validation(
                "circuit_breaker_config",
                format!(
                    "max_requests ({}) must be >= success_threshold ({}), or a \
                     tripped breaker could never accumulate enough half-open \
                     successes to close",
                    self.max_requests, self.success_threshold
                ),
            ));
        }
        Ok(())
    }
}

/// Metrics exposed by a breaker (spec.md §4.4).
#[derive(Debug, Clone, Default)]
struct Metrics {
    total: u64,
    successful: u64,
    failed: u64,
    timeout: u64,
    circuit_open_rejections: u64,
    last_failure: Option<Instant>,
    last_success: Option<Instant>,
    state_changes: u64,
}

/// A callback invoked on every state transition `(from, to)`.
pub type TransitionCallback = Arc<dyn Fn(&CircuitState, &CircuitState) + Send + Sync>;

/// A single named circuit breaker guarding calls to one upstream dependency.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: RwLock<CircuitState>,
    window: RollingWindow,
    metrics: Mutex<Metrics>,
    on_transition: Option<TransitionCallback>,
}

/// Public snapshot of breaker metrics (spec.md §4.4).
#[derive(Debug, Clone)]
pub struct CircuitBreakerMetrics {
    pub name: String,
    pub state: CircuitState,
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub timeout: u64,
    pub circuit_open_rejections: u64,
    pub last_failure: Option<Instant>,
    pub last_success: Option<Instant>,
    pub state_changes: u64,
    pub current_failure_rate: f64,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let window = RollingWindow::new(config.window, config.window_buckets);
        Self {
            name: name.into(),
            config,
            state: RwLock::new(CircuitState::Closed),
            window,
            metrics: Mutex::new(Metrics::default()),
            on_transition: None,
        }
    }

    #[must_use]
    pub fn with_transition_callback(mut self, cb: TransitionCallback) -> Self {
        self.on_transition = Some(cb);
        self
    }

    /// Whether the breaker currently admits a call, performing the
    /// Open->HalfOpen transition as a side effect when `Timeout` has
    /// elapsed (spec.md §4.4).
    pub fn allow(&self) -> bool {
        let mut state = self.state.write().unwrap();
        match &*state {
            CircuitState::Closed => true,
            CircuitState::Open { opened_at } => {
                if opened_at.elapsed() >= self.config.timeout {
                    let from = state.clone();
                    *state = CircuitState::HalfOpen {
                        consecutive_successes: 0,
                        probes_admitted: 1,
                    };
                    self.on_state_change(&from, &state);
                    true
                } else {
                    self.bump_rejection();
                    false
                }
            }
            CircuitState::HalfOpen { probes_admitted, .. } => {
                if *probes_admitted < self.config.max_requests {
                    if let CircuitState::HalfOpen { probes_admitted, .. } = &mut *state {
                        *probes_admitted += 1;
                    }
                    true
                } else {
                    self.bump_rejection();
                    false
                }
            }
        }
    }

    fn bump_rejection(&self) {
        self.metrics.lock().unwrap().circuit_open_rejections += 1;
    }

    /// Execute `operation` if [`allow`](Self::allow) permits, else return a
    /// synthetic `CircuitOpen` error without dispatching (spec.md invariant 4).
    pub async fn call<T, F, Fut>(&self, operation: F) -> Result<T, Error>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, Error>>,
    {
        if !self.allow() {
            return Err(Error::circuit_open(&self.name));
        }

        let result = operation().await;
        match &result {
            Ok(_) => self.record_success(),
            Err(e) => self.record_failure(e),
        }
        result
    }

    fn record_success(&self) {
        self.window.record(false);
        let mut metrics = self.metrics.lock().unwrap();
        metrics.total += 1;
        metrics.successful += 1;
        metrics.last_success = Some(Instant::now());
        drop(metrics);

        let mut state = self.state.write().unwrap();
        if let CircuitState::HalfOpen {
            consecutive_successes,
            probes_admitted,
        } = &*state
        {
            let successes = consecutive_successes + 1;
            if successes >= self.config.success_threshold {
                let from = state.clone();
                *state = CircuitState::Closed;
                self.window.reset();
                self.on_state_change(&from, &state);
                info!("circuit breaker '{}': half-open -> closed", self.name);
            } else {
                *state = CircuitState::HalfOpen {
                    consecutive_successes: successes,
                    probes_admitted: *probes_admitted,
                };
            }
        }
    }

    fn record_failure(&self, error: &Error) {
        self.window.record(true);
        let mut metrics = self.metrics.lock().unwrap();
        metrics.total += 1;
        metrics.failed += 1;
        metrics.last_failure = Some(Instant::now());
        if error.kind == crate::error::Kind::Timeout {
            metrics.timeout += 1;
        }
        drop(metrics);

        let mut state = self.state.write().unwrap();
        match &*state {
            CircuitState::Closed => {
                let samples = self.window.total_count();
                let failures = self.window.failure_count();
                let rate = self.window.failure_rate();
                let should_trip = samples >= self.config.min_request_count
                    && rate > self.config.expected_failure_rate
                    && failures >= self.config.failure_threshold;
                if should_trip {
                    let from = state.clone();
                    *state = CircuitState::Open {
                        opened_at: Instant::now(),
                    };
                    self.on_state_change(&from, &state);
                    warn!(
                        "circuit breaker '{}': closed -> open ({} failures / {} samples, rate {:.2})",
                        self.name, failures, samples, rate
                    );
                }
            }
            CircuitState::HalfOpen { .. } => {
                let from = state.clone();
                *state = CircuitState::Open {
                    opened_at: Instant::now(),
                };
                self.on_state_change(&from, &state);
                warn!("circuit breaker '{}': half-open -> open", self.name);
            }
            CircuitState::Open { .. } => {
                debug!("circuit breaker '{}': failure while already open", self.name);
            }
        }
    }

    fn on_state_change(&self, from: &CircuitState, to: &CircuitState) {
        self.metrics.lock().unwrap().state_changes += 1;
        if let Some(cb) = &self.on_transition {
            cb(from, to);
        }
    }

    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.state.read().unwrap().clone()
    }

    #[must_use]
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let state = self.state();
        let m = self.metrics.lock().unwrap().clone();
        CircuitBreakerMetrics {
            name: self.name.clone(),
            state,
            total: m.total,
            successful: m.successful,
            failed: m.failed,
            timeout: m.timeout,
            circuit_open_rejections: m.circuit_open_rejections,
            last_failure: m.last_failure,
            last_success: m.last_success,
            state_changes: m.state_changes,
            current_failure_rate: self.window.failure_rate(),
        }
    }

    /// Force the breaker back to `Closed`, discarding rolling-window data.
    pub fn reset(&self) {
        *self.state.write().unwrap() = CircuitState::Closed;
        self.window.reset();
    }
}

/// Owns one [`CircuitBreaker`] per provider name (spec.md §4.4: "A Manager
/// keyed by name owns a set of breakers").
#[derive(Default)]
pub struct CircuitBreakerManager {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    default_config: CircuitBreakerConfig,
}

impl CircuitBreakerManager {
    #[must_use]
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            default_config,
        }
    }

    /// Fetch or lazily create the breaker for `name`, using the manager's
    /// default config.
    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.read().unwrap().get(name) {
            return Arc::clone(existing);
        }
        let mut write = self.breakers.write().unwrap();
        write
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, self.default_config.clone())))
            .clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<CircuitBreakerMetrics> {
        self.breakers
            .read()
            .unwrap()
            .values()
            .map(|b| b.metrics())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread::sleep;

    fn failing_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            window: Duration::from_secs(60),
            window_buckets: 10,
            min_request_count: 3,
            expected_failure_rate: 0.5,
            failure_threshold: 3,
            timeout: Duration::from_millis(50),
            success_threshold: 2,
            max_requests: 5,
        }
    }

    async fn fail() -> Result<(), Error> {
        Err(Error::new(crate::error::Kind::Transient, "X", "boom"))
    }

    async fn succeed() -> Result<(), Error> {
        Ok(())
    }

    #[tokio::test]
    async fn closed_allows_calls_and_stays_closed_on_success() {
        let cb = CircuitBreaker::new("svc", CircuitBreakerConfig::default());
        let result = cb.call(succeed).await;
        assert!(result.is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn trips_open_only_when_all_three_conditions_hold() {
        let cb = CircuitBreaker::new("svc", failing_config());

        let _ = cb.call(fail).await;
        let _ = cb.call(fail).await;
        // Only 2 samples so far: min_request_count=3 not yet met.
        assert_eq!(cb.state(), CircuitState::Closed);

        let _ = cb.call(fail).await;
        // 3 samples, 3 failures, rate=1.0 > 0.5, failures>=3: trips.
        assert!(matches!(cb.state(), CircuitState::Open { .. }));
    }

    #[tokio::test]
    async fn open_rejects_until_timeout_then_half_opens() {
        let cb = CircuitBreaker::new("svc", failing_config());
        let _ = cb.call(fail).await;
        let _ = cb.call(fail).await;
        let _ = cb.call(fail).await;
        assert!(matches!(cb.state(), CircuitState::Open { .. }));

        assert!(!cb.allow());
        sleep(Duration::from_millis(70));
        assert!(cb.allow());
        assert!(matches!(cb.state(), CircuitState::HalfOpen { .. }));
    }

    #[tokio::test]
    async fn half_open_closes_after_success_threshold() {
        let cb = CircuitBreaker::new("svc", failing_config());
        let _ = cb.call(fail).await;
        let _ = cb.call(fail).await;
        let _ = cb.call(fail).await;
        sleep(Duration::from_millis(70));
        assert!(cb.allow()); // transitions to half-open

        let _ = cb.call(succeed).await;
        assert!(matches!(cb.state(), CircuitState::HalfOpen { .. }));
        let _ = cb.call(succeed).await;
        assert_eq!(cb.state(), CircuitState::Closed);

        // One more success afterward: still closed.
        let _ = cb.call(succeed).await;
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_reopens_on_any_failure() {
        let cb = CircuitBreaker::new("svc", failing_config());
        let _ = cb.call(fail).await;
        let _ = cb.call(fail).await;
        let _ = cb.call(fail).await;
        sleep(Duration::from_millis(70));
        assert!(cb.allow());

        let _ = cb.call(fail).await;
        assert!(matches!(cb.state(), CircuitState::Open { .. }));
    }

    #[test]
    fn default_config_satisfies_max_requests_invariant() {
        assert!(CircuitBreakerConfig::default().validate().is_ok());
    }

    #[test]
    fn config_with_max_requests_below_success_threshold_is_rejected() {
        let config = CircuitBreakerConfig {
            max_requests: 1,
            success_threshold: 2,
            ..CircuitBreakerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn half_open_can_reach_closed_with_default_config() {
        let config = CircuitBreakerConfig {
            min_request_count: 3,
            failure_threshold: 3,
            timeout: Duration::from_millis(50),
            ..CircuitBreakerConfig::default()
        };
        let cb = CircuitBreaker::new("svc", config);
        let _ = cb.call(fail).await;
        let _ = cb.call(fail).await;
        let _ = cb.call(fail).await;
        sleep(Duration::from_millis(70));

        // Default max_requests (2) admits two half-open probes, enough to
        // reach the default success_threshold (2) and close again.
        assert!(cb.allow());
        let _ = cb.call(succeed).await;
        assert!(cb.allow());
        let _ = cb.call(succeed).await;
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn manager_returns_same_breaker_instance_per_name() {
        let manager = CircuitBreakerManager::new(CircuitBreakerConfig::default());
        let a = manager.get_or_create("arxiv");
        let b = manager.get_or_create("arxiv");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn transition_callback_fires_on_state_change() {
        let count = Arc::new(AtomicU32::new(0));
        let count2 = Arc::clone(&count);
        let cb = CircuitBreaker::new("svc", failing_config())
            .with_transition_callback(Arc::new(move |_from, _to| {
                count2.fetch_add(1, Ordering::SeqCst);
            }));

        let _ = cb.call(fail).await;
        let _ = cb.call(fail).await;
        let _ = cb.call(fail).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
