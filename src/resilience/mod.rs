//! Resilience substrate: rolling-window failure accounting, circuit
//! breaking, retry, timeouts, and health checks (spec.md §4.3-4.5).

pub mod circuit_breaker;
pub mod health;
pub mod retry;
pub mod rolling_window;
pub mod timeout;


pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerManager, CircuitBreakerMetrics,
    CircuitState,
};
pub use health::{
    ComponentHealth, HealthCheck, HealthCheckManager, HealthStatus, HttpHealthCheck,
    PingHealthCheck,
};
pub use retry::{calculate_delay, BackoffKind, RetryConfig, RetryExecutor, RetryPolicy, RetryStatsSnapshot};
pub use rolling_window::RollingWindow;
pub use timeout::{TimeoutConfig, TimeoutExt, TimeoutManager, TimeoutType, TimeoutWrapper};
