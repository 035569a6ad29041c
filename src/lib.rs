//! Federated scholarly-search aggregation engine.
//!
//! Fans a query out across multiple academic-literature providers
//! (`ArXiv`, `Semantic Scholar`, Exa, Tavily), normalizes their results into
//! a shared [`domain::Paper`] model, deduplicates and ranks them according
//! to a chosen [`domain::Strategy`], and wraps every provider call in a
//! resilience substrate — error classification, a rolling-window circuit
//! breaker, and a retry executor — so that one flaky upstream never takes
//! the whole search down.

pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod manager;
pub mod observability;
pub mod providers;
pub mod resilience;

pub use config::{FederationConfig, ProviderConfig};
pub use domain::{
    AggregatedResult, Author, Paper, ProviderErrorEntry, SearchFilters, SearchQuery, SearchResult,
    Strategy,
};
pub use error::{classify, Error, Kind, Result};
pub use events::{
    EventEnvelope, EventPublisher, LoggingEventPublisher, ProviderHealthEvent,
    ProviderMetricsEvent, SearchCompletedEvent,
};
pub use manager::{ManagerConfig, ProviderManager};
pub use providers::{
    ArxivAdapter, ExaAdapter, ProviderAdapter, ProviderCapabilities, ProviderMetrics,
    SemanticScholarAdapter, TavilyAdapter,
};
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerManager, CircuitBreakerMetrics,
    CircuitState, RetryConfig, RetryExecutor, RetryPolicy, RollingWindow,
};
