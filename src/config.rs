//! Layered configuration for the federation engine and its resilience
//! substrate (spec.md §6 "Provider configuration surface", SPEC_FULL.md
//! ambient stack). Loaded defaults -> optional TOML file -> environment,
//! using the `config`/`envy`/`toml` stack the teacher crate already
//! depends on.

use crate::error::Error;
use crate::manager::ManagerConfig;
use crate::resilience::{CircuitBreakerConfig, RetryConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// One provider's externally-configurable surface (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub api_key: String,
}

const fn default_true() -> bool {
    true
}
const fn default_timeout_secs() -> u64 {
    30
}
const fn default_max_retries() -> u32 {
    3
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: String::new(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            api_key: String::new(),
        }
    }
}

impl ProviderConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validation per spec.md §6: `timeout > 0`, `max_retries >= 0` (always
    /// true for `u32`), `base_url` non-empty when enabled.
    pub fn validate(&self) -> Result<(), Error> {
        if self.timeout_secs == 0 {
            return Err(Error::validation("timeout", "must be > 0"));
        }
        if self.enabled && self.base_url.trim().is_empty() {
            return Err(Error::validation(
                "base_url",
                "must be non-empty when enabled",
            ));
        }
        Ok(())
    }
}

/// Serializable mirror of [`RetryConfig`] suitable for file/env loading;
/// durations are expressed in milliseconds since `humantime`-style duration
/// parsing is outside this crate's dependency set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfigFile {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter_fraction: f64,
}

impl From<&RetryConfig> for RetryConfigFile {
    fn from(c: &RetryConfig) -> Self {
        Self {
            max_attempts: c.max_attempts,
            base_delay_ms: c.base_delay.as_millis() as u64,
            max_delay_ms: c.max_delay.as_millis() as u64,
            multiplier: c.multiplier,
            jitter_fraction: c.jitter_fraction,
        }
    }
}

/// Top-level, layered configuration for one `ProviderManager` instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederationConfig {
    #[serde(default = "default_manager_timeout_secs")]
    pub manager_timeout_secs: u64,
    pub max_concurrency: Option<usize>,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerFile,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

const fn default_manager_timeout_secs() -> u64 {
    30
}

/// Serializable mirror of [`CircuitBreakerConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerFile {
    pub window_secs: u64,
    pub window_buckets: usize,
    pub min_request_count: u64,
    pub expected_failure_rate: f64,
    pub failure_threshold: u64,
    pub timeout_secs: u64,
    pub success_threshold: u32,
    pub max_requests: u32,
}

impl Default for CircuitBreakerFile {
    fn default() -> Self {
        let d = CircuitBreakerConfig::default();
        Self {
            window_secs: d.window.as_secs(),
            window_buckets: d.window_buckets,
            min_request_count: d.min_request_count,
            expected_failure_rate: d.expected_failure_rate,
            failure_threshold: d.failure_threshold,
            timeout_secs: d.timeout.as_secs(),
            success_threshold: d.success_threshold,
            max_requests: d.max_requests,
        }
    }
}

impl CircuitBreakerFile {
    #[must_use]
    pub fn to_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            window: Duration::from_secs(self.window_secs),
            window_buckets: self.window_buckets,
            min_request_count: self.min_request_count,
            expected_failure_rate: self.expected_failure_rate,
            failure_threshold: self.failure_threshold,
            timeout: Duration::from_secs(self.timeout_secs),
            success_threshold: self.success_threshold,
            max_requests: self.max_requests,
        }
    }
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            manager_timeout_secs: default_manager_timeout_secs(),
            max_concurrency: None,
            circuit_breaker: CircuitBreakerFile::default(),
            providers: HashMap::new(),
        }
    }
}

impl FederationConfig {
    /// Load defaults, then overlay an optional TOML file at `path` (if it
    /// exists), then overlay process environment variables prefixed
    /// `SCHOLARLY_` (e.g. `SCHOLARLY_MANAGER_TIMEOUT_SECS`), in that order —
    /// the layered precedence the teacher's `config`/`envy` dependency pair
    /// implies.
    pub fn load(path: Option<&str>) -> Result<Self, Error> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if std::path::Path::new(path).exists() {
                builder = builder.add_source(config::File::with_name(path));
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SCHOLARLY")
                .separator("__")
                .try_parsing(true),
        );

        let merged: Self = builder
            .build()
            .map_err(config_err)?
            .try_deserialize()
            .map_err(config_err)?;
        merged.validate()?;
        Ok(merged)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.manager_timeout_secs == 0 {
            return Err(Error::validation("manager_timeout_secs", "must be > 0"));
        }
        self.circuit_breaker.to_config().validate()?;
        for (name, provider) in &self.providers {
            provider
                .validate()
                .map_err(|e| e.with_detail("provider", name.clone()))?;
        }
        Ok(())
    }

    #[must_use]
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            provider_timeout: Duration::from_secs(self.manager_timeout_secs),
            max_concurrency: self.max_concurrency,
        }
    }

    #[must_use]
    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        self.circuit_breaker.to_config()
    }

    /// Builds a [`RetryPolicy`] that applies `base` to every error-kind
    /// bucket; callers wanting per-kind presets should construct
    /// [`RetryPolicy`] directly instead of going through file/env config.
    #[must_use]
    pub fn uniform_retry_policy(&self, base: RetryConfig) -> RetryPolicy {
        RetryPolicy {
            default: base.clone(),
            fast: base.clone(),
            slow: base.clone(),
            rate_limited: base,
        }
    }
}

fn config_err(e: impl std::fmt::Display) -> Error {
    Error::new(
        crate::error::Kind::Validation,
        "CONFIG_LOAD_FAILED",
        e.to_string(),
    )
}
