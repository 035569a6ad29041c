//! `ProviderAdapter` capability trait (C0) — spec.md §4.1.
//!
//! This is the minimal boundary the manager dispatches across; wire-format
//! fidelity to any one upstream is explicitly out of scope (spec.md §1).

use crate::domain::{Paper, SearchQuery};
use crate::error::Error;
use async_trait::async_trait;
use std::time::Duration;

/// Capabilities a provider declares up front, used by the manager to decide
/// eligibility for a query before dispatch (spec.md §4.1).
#[derive(Debug, Clone, Default)]
pub struct ProviderCapabilities {
    pub supports_full_text: bool,
    pub supports_doi_lookup: bool,
    pub supports_author_search: bool,
    pub max_results_per_request: u32,
}

/// Metrics a provider may report about its own call history, independent of
/// the manager's circuit-breaker/retry accounting (spec.md §4.1).
#[derive(Debug, Clone, Default)]
pub struct ProviderMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub average_latency: Duration,
}

/// A single upstream academic-literature source (spec.md §4.1). Adapters
/// translate their wire format into [`Paper`]/[`Error`] and never leak
/// transport-specific types across this boundary.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable identifier used as the key everywhere (registry, circuit
    /// breaker manager, `AggregatedResult::provider_results`).
    fn name(&self) -> &str;

    /// Whether the adapter is currently configured/enabled for dispatch.
    fn is_enabled(&self) -> bool {
        true
    }

    fn capabilities(&self) -> ProviderCapabilities;

    /// Execute `query` against the upstream, returning already-normalized
    /// [`Paper`] values. Implementations classify raw failures via
    /// [`crate::error::classify`] before returning `Err`.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Paper>, Error>;

    /// Fetch a single paper by its upstream identifier, when supported.
    async fn get_paper(&self, id: &str) -> Result<Option<Paper>, Error> {
        let _ = id;
        Ok(None)
    }

    /// Lightweight liveness probe distinct from the circuit breaker's own
    /// bookkeeping; used by an out-of-process health endpoint.
    async fn health_check(&self) -> Result<bool, Error> {
        Ok(true)
    }

    fn metrics(&self) -> ProviderMetrics {
        ProviderMetrics::default()
    }

    /// Base delay the manager should respect between consecutive calls to
    /// this provider even absent an explicit `Retry-After`.
    fn base_delay(&self) -> Duration {
        Duration::from_millis(200)
    }
}
