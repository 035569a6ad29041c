use crate::error::{Error, Kind, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

fn timeout_error(duration: Duration) -> Error {
    Error::new(
        Kind::Timeout,
        "OPERATION_TIMED_OUT",
        format!("operation timed out after {duration:?}"),
    )
    .with_detail("timeout_ms", duration.as_millis().to_string())
}

/// Timeout configuration for operations
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Default timeout for operations
    pub default_timeout: Duration,
    /// Timeout for network operations
    pub network_timeout: Duration,
    /// Timeout for file operations
    pub file_timeout: Duration,
    /// Timeout for health checks
    pub health_check_timeout: Duration,
    /// Timeout for circuit breaker operations
    pub circuit_breaker_timeout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            network_timeout: Duration::from_secs(10),
            file_timeout: Duration::from_secs(5),
            health_check_timeout: Duration::from_secs(5),
            circuit_breaker_timeout: Duration::from_secs(1),
        }
    }
}

impl TimeoutConfig {
    /// Create a fast timeout configuration for development
    pub fn fast() -> Self {
        Self {
            default_timeout: Duration::from_secs(5),
            network_timeout: Duration::from_secs(3),
            file_timeout: Duration::from_secs(2),
            health_check_timeout: Duration::from_secs(2),
            circuit_breaker_timeout: Duration::from_millis(500),
        }
    }

    /// Create a slow timeout configuration for production
    pub fn slow() -> Self {
        Self {
            default_timeout: Duration::from_secs(60),
            network_timeout: Duration::from_secs(30),
            file_timeout: Duration::from_secs(10),
            health_check_timeout: Duration::from_secs(10),
            circuit_breaker_timeout: Duration::from_secs(2),
        }
    }

    /// Get timeout for a specific operation type
    pub fn get_timeout(&self, operation_type: TimeoutType) -> Duration {
        match operation_type {
            TimeoutType::Default => self.default_timeout,
            TimeoutType::Network => self.network_timeout,
            TimeoutType::File => self.file_timeout,
            TimeoutType::HealthCheck => self.health_check_timeout,
            TimeoutType::CircuitBreaker => self.circuit_breaker_timeout,
            TimeoutType::Custom(duration) => duration,
        }
    }
}

/// Types of operations for timeout configuration
#[derive(Debug, Clone)]
pub enum TimeoutType {
    Default,
    Network,
    File,
    HealthCheck,
    CircuitBreaker,
    Custom(Duration),
}

/// Extension trait to add timeout functionality to futures
pub trait TimeoutExt<T> {
    /// Add timeout to a future with default timeout
    async fn with_timeout(self) -> Result<T>;

    /// Add timeout to a future with custom duration
    async fn with_timeout_duration(self, duration: Duration) -> Result<T>;

    /// Add timeout to a future with operation type
    async fn with_timeout_type(
        self,
        timeout_type: TimeoutType,
        config: &TimeoutConfig,
    ) -> Result<T>;
}

impl<F, T> TimeoutExt<T> for F
where
    F: Future<Output = T>,
{
    async fn with_timeout(self) -> Result<T> {
        self.with_timeout_duration(TimeoutConfig::default().default_timeout)
            .await
    }

    async fn with_timeout_duration(self, duration: Duration) -> Result<T> {
        match timeout(duration, self).await {
            Ok(result) => Ok(result),
            Err(_) => Err(timeout_error(duration)),
        }
    }

    async fn with_timeout_type(
        self,
        timeout_type: TimeoutType,
        config: &TimeoutConfig,
    ) -> Result<T> {
        let duration = config.get_timeout(timeout_type);
        self.with_timeout_duration(duration).await
    }
}

/// Timeout wrapper for operations with logging and metrics
pub struct TimeoutWrapper {
    config: TimeoutConfig,
    operation_name: String,
}

impl TimeoutWrapper {
    /// Create a new timeout wrapper
    pub fn new(operation_name: impl Into<String>, config: TimeoutConfig) -> Self {
        Self {
            config,
            operation_name: operation_name.into(),
        }
    }

    /// Execute an operation with timeout and logging
    pub async fn execute<F, Fut, T>(&self, operation: F, timeout_type: TimeoutType) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let timeout_duration = self.config.get_timeout(timeout_type.clone());
        let start_time = Instant::now();

        debug!(
            "Starting operation '{}' with timeout {:?}",
            self.operation_name, timeout_duration
        );

        let result = match timeout(timeout_duration, operation()).await {
            Ok(Ok(value)) => {
                let duration = start_time.elapsed();
                debug!(
                    "Operation '{}' completed successfully in {:?}",
                    self.operation_name, duration
                );
                Ok(value)
            }
            Ok(Err(error)) => {
                let duration = start_time.elapsed();
                debug!(
                    "Operation '{}' failed after {:?}: {}",
                    self.operation_name, duration, error
                );
                Err(error)
            }
            Err(_) => {
                warn!(
                    "Operation '{}' timed out after {:?}",
                    self.operation_name, timeout_duration
                );
                Err(timeout_error(timeout_duration))
            }
        };

        result
    }

    /// Execute an operation with custom timeout
    pub async fn execute_with_timeout<F, Fut, T>(
        &self,
        operation: F,
        custom_timeout: Duration,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute(operation, TimeoutType::Custom(custom_timeout))
            .await
    }

    /// Execute a network operation with appropriate timeout
    pub async fn execute_network<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute(operation, TimeoutType::Network).await
    }

    /// Execute a file operation with appropriate timeout
    pub async fn execute_file<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute(operation, TimeoutType::File).await
    }

    /// Execute a health check with appropriate timeout
    pub async fn execute_health_check<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute(operation, TimeoutType::HealthCheck).await
    }
}

/// Timeout manager for coordinating timeouts across the application
pub struct TimeoutManager {
    config: TimeoutConfig,
}

impl TimeoutManager {
    /// Create a new timeout manager
    pub fn new(config: TimeoutConfig) -> Self {
        Self { config }
    }

    /// Create a timeout wrapper for an operation
    pub fn wrapper(&self, operation_name: impl Into<String>) -> TimeoutWrapper {
        TimeoutWrapper::new(operation_name, self.config.clone())
    }

    /// Execute an operation with timeout
    pub async fn execute<F, Fut, T>(
        &self,
        operation_name: &str,
        operation: F,
        timeout_type: TimeoutType,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.wrapper(operation_name)
            .execute(operation, timeout_type)
            .await
    }

    /// Get the current timeout configuration
    pub fn config(&self) -> &TimeoutConfig {
        &self.config
    }

    /// Update the timeout configuration
    pub fn update_config(&mut self, config: TimeoutConfig) {
        self.config = config;
    }
}

impl Default for TimeoutManager {
    fn default() -> Self {
        Self::new(TimeoutConfig::default())
    }
}

/// Convenience functions for common timeout operations
pub mod convenience {
    use super::*;

    /// Execute a future with default timeout
    pub async fn with_default_timeout<F, T>(future: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        future.with_timeout().await
    }

    /// Execute a network operation with appropriate timeout
    pub async fn with_network_timeout<F, T>(future: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        let config = TimeoutConfig::default();
        future.with_timeout_duration(config.network_timeout).await
    }

    /// Execute a file operation with appropriate timeout
    pub async fn with_file_timeout<F, T>(future: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        let config = TimeoutConfig::default();
        future.with_timeout_duration(config.file_timeout).await
    }

    /// Execute a health check with appropriate timeout
    pub async fn with_health_check_timeout<F, T>(future: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        let config = TimeoutConfig::default();
        future
            .with_timeout_duration(config.health_check_timeout)
            .await
    }

    /// Execute an operation with custom timeout and operation name for logging
    pub async fn with_timeout_and_logging<F, T>(
        future: F,
        timeout_duration: Duration,
        operation_name: &str,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let wrapper = TimeoutWrapper::new(operation_name, TimeoutConfig::default());
        wrapper
            .execute_with_timeout(|| future, timeout_duration)
            .await
    }
}
