//! Classified-error backoff executor (C5) — spec.md §4.5.

use crate::error::{Error, Kind};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff shape applied between attempts (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackoffKind {
    Fixed,
    Linear,
    Exponential,
}

/// Retry configuration for one class of operation (spec.md §4.5).
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff: BackoffKind,
    pub multiplier: f64,
    /// Uniform jitter fraction applied to the computed delay, e.g. `0.2` = +/-20%.
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            backoff: BackoffKind::Exponential,
            multiplier: 2.0,
            jitter_fraction: 0.2,
        }
    }
}

impl RetryConfig {
    /// Aggressive preset for latency-sensitive internal calls.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
            backoff: BackoffKind::Exponential,
            multiplier: 2.0,
            jitter_fraction: 0.1,
        }
    }

    /// Patient preset for slow, expensive upstreams.
    #[must_use]
    pub fn slow() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff: BackoffKind::Exponential,
            multiplier: 2.0,
            jitter_fraction: 0.3,
        }
    }

    /// Preset for `RateLimit` errors: longer base delay, linear growth, and
    /// `Error::retry_after` (when present) always takes precedence.
    #[must_use]
    pub fn rate_limited() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff: BackoffKind::Linear,
            multiplier: 1.0,
            jitter_fraction: 0.1,
        }
    }
}

/// Dispatches a [`RetryConfig`] by the failing error's [`Kind`] (spec.md §4.5).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub default: RetryConfig,
    pub fast: RetryConfig,
    pub slow: RetryConfig,
    pub rate_limited: RetryConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            default: RetryConfig::default(),
            fast: RetryConfig::fast(),
            slow: RetryConfig::slow(),
            rate_limited: RetryConfig::rate_limited(),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn config_for_error(&self, kind: Kind) -> &RetryConfig {
        match kind {
            Kind::RateLimit => &self.rate_limited,
            Kind::Timeout | Kind::Network => &self.fast,
            Kind::Transient => &self.slow,
            _ => &self.default,
        }
    }
}

/// Running counters describing how a [`RetryExecutor`] has behaved so far
/// (spec.md §4.5).
#[derive(Debug, Default)]
pub struct RetryStats {
    total_operations: AtomicU64,
    total_attempts: AtomicU64,
    successful_retries: AtomicU64,
    exhausted_retries: AtomicU64,
}

/// Point-in-time snapshot of [`RetryStats`].
#[derive(Debug, Clone, Copy)]
pub struct RetryStatsSnapshot {
    pub total_operations: u64,
    pub total_attempts: u64,
    pub successful_retries: u64,
    pub exhausted_retries: u64,
}

impl RetryStatsSnapshot {
    /// Mean attempts consumed per operation, or `0.0` with no operations yet.
    #[must_use]
    pub fn avg_attempts_per_operation(&self) -> f64 {
        if self.total_operations == 0 {
            0.0
        } else {
            self.total_attempts as f64 / self.total_operations as f64
        }
    }
}

impl RetryStats {
    #[must_use]
    pub fn snapshot(&self) -> RetryStatsSnapshot {
        RetryStatsSnapshot {
            total_operations: self.total_operations.load(Ordering::Relaxed),
            total_attempts: self.total_attempts.load(Ordering::Relaxed),
            successful_retries: self.successful_retries.load(Ordering::Relaxed),
            exhausted_retries: self.exhausted_retries.load(Ordering::Relaxed),
        }
    }
}

/// Executes an async operation, retrying per a classified-error policy
/// (spec.md §4.5). Stateless apart from the shared [`RetryStats`] counters.
#[derive(Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    stats: RetryStats,
}

impl RetryExecutor {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            stats: RetryStats::default(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> RetryStatsSnapshot {
        self.stats.snapshot()
    }

    /// Runs `operation`, retrying on retryable errors up to the config
    /// selected for the first observed error's [`Kind`] (spec.md §4.5: the
    /// classifying error picks the policy for the whole run, so attempts 2..N
    /// stay on the same backoff curve even if a later attempt fails
    /// differently).
    pub async fn execute<T, F, Fut>(&self, operation_name: &str, mut operation: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, Error>>,
    {
        self.stats.total_operations.fetch_add(1, Ordering::Relaxed);

        let mut attempt: u32 = 1;
        let mut config: Option<&RetryConfig> = None;

        loop {
            self.stats.total_attempts.fetch_add(1, Ordering::Relaxed);
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        self.stats.successful_retries.fetch_add(1, Ordering::Relaxed);
                        debug!(
                            "operation '{operation_name}' succeeded on attempt {attempt}"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => {
                    let cfg = config.get_or_insert_with(|| self.policy.config_for_error(error.kind));
                    let should_retry = error.retryable()
                        && error.kind.is_retryable_kind()
                        && attempt < cfg.max_attempts;

                    if !should_retry {
                        if attempt >= cfg.max_attempts {
                            self.stats.exhausted_retries.fetch_add(1, Ordering::Relaxed);
                        }
                        warn!(
                            "operation '{operation_name}' failed permanently after {attempt} attempt(s): {error}"
                        );
                        return Err(error);
                    }

                    let delay = calculate_delay(cfg, attempt, &error);
                    debug!(
                        "operation '{operation_name}' attempt {attempt} failed ({}), retrying in {:?}",
                        error.code, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Computes the delay before the next attempt. Honors `error.retry_after()`
/// verbatim when present (spec.md §4.5 rule: an explicit upstream
/// `Retry-After` always wins over the configured backoff curve); otherwise
/// applies the configured backoff shape, capped at `max_delay`, with jitter.
#[must_use]
pub fn calculate_delay(config: &RetryConfig, attempt: u32, error: &Error) -> Duration {
    if let Some(retry_after) = error.retry_after() {
        return retry_after.min(config.max_delay);
    }

    let base = config.base_delay.as_secs_f64();
    let raw = match config.backoff {
        BackoffKind::Fixed => base,
        BackoffKind::Linear => base * attempt as f64,
        BackoffKind::Exponential => base * config.multiplier.powi(attempt as i32 - 1),
    };
    let capped = raw.min(config.max_delay.as_secs_f64());
    add_jitter(capped, config.jitter_fraction)
}

fn add_jitter(seconds: f64, fraction: f64) -> Duration {
    if fraction <= 0.0 {
        return Duration::from_secs_f64(seconds.max(0.0));
    }
    let mut rng = rand::thread_rng();
    let delta = seconds * fraction;
    let jittered = seconds + rng.gen_range(-delta..=delta);
    Duration::from_secs_f64(jittered.max(0.0))
}
