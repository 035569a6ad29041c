//! Event emitter interface (spec.md §6) — the in-scope boundary to an
//! out-of-scope durable message bus. The manager publishes through
//! [`EventPublisher`]; nothing downstream of that trait is this crate's
//! concern.

use crate::domain::{AggregatedResult, Strategy};
use crate::resilience::{CircuitBreakerMetrics, CircuitState};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The envelope every event payload carries onto the bus (spec.md §6:
/// "strict JSON with `type`, `id`, `timestamp_ms`, and event-specific body").
/// `id` and `timestamp_ms` are stamped once at construction, not recomputed,
/// so a publisher that retries delivery sends an identical envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub event_type: &'static str,
    pub id: String,
    pub timestamp_ms: i64,
}

impl EventEnvelope {
    #[must_use]
    pub fn new(event_type: &'static str) -> Self {
        Self {
            event_type,
            id: uuid::Uuid::new_v4().to_string(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Emitted once per completed [`crate::manager::ProviderManager::search`] call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCompletedEvent {
    #[serde(flatten)]
    pub envelope: EventEnvelope,
    pub request_id: Option<String>,
    pub query: String,
    pub strategy: Strategy,
    pub result_count: u64,
    pub successful_providers: Vec<String>,
    pub failed_providers: Vec<String>,
    pub duration_ms: u64,
}

/// Emitted on every circuit-breaker state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealthEvent {
    #[serde(flatten)]
    pub envelope: EventEnvelope,
    pub provider: String,
    pub state: String,
    pub failure_rate: f64,
}

/// Emitted periodically (or on demand) with a provider's rolling metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetricsEvent {
    #[serde(flatten)]
    pub envelope: EventEnvelope,
    pub provider: String,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
}

/// Publishes federation lifecycle events. Implementations may forward these
/// onto a durable bus; that transport is out of scope here (spec.md §1) —
/// this crate only owns the publish call site and its payload shapes.
pub trait EventPublisher: Send + Sync {
    fn publish_search_completed(&self, event: &SearchCompletedEvent);
    fn publish_provider_health(&self, event: &ProviderHealthEvent);
    fn publish_provider_metrics(&self, event: &ProviderMetricsEvent) {
        let _ = event;
    }
}

/// Default publisher: structured `tracing` events, suitable until a real
/// message bus is wired in by an embedding application.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEventPublisher;

impl EventPublisher for LoggingEventPublisher {
    fn publish_search_completed(&self, event: &SearchCompletedEvent) {
        tracing::info!(
            request_id = ?event.request_id,
            query = %event.query,
            strategy = ?event.strategy,
            result_count = event.result_count,
            successful = ?event.successful_providers,
            failed = ?event.failed_providers,
            duration_ms = event.duration_ms,
            "search completed"
        );
    }

    fn publish_provider_health(&self, event: &ProviderHealthEvent) {
        tracing::warn!(
            provider = %event.provider,
            state = %event.state,
            failure_rate = event.failure_rate,
            "provider circuit state changed"
        );
    }

    fn publish_provider_metrics(&self, event: &ProviderMetricsEvent) {
        tracing::debug!(
            provider = %event.provider,
            total = event.total_requests,
            successful = event.successful_requests,
            failed = event.failed_requests,
            "provider metrics snapshot"
        );
    }
}

impl ProviderHealthEvent {
    #[must_use]
    pub fn from_metrics(metrics: &CircuitBreakerMetrics) -> Self {
        let state = match metrics.state {
            CircuitState::Closed => "closed",
            CircuitState::Open { .. } => "open",
            CircuitState::HalfOpen { .. } => "half_open",
        };
        Self {
            envelope: EventEnvelope::new("provider.health"),
            provider: metrics.name.clone(),
            state: state.to_string(),
            failure_rate: metrics.current_failure_rate,
        }
    }
}

impl SearchCompletedEvent {
    #[must_use]
    pub fn from_result(query: &str, result: &AggregatedResult, duration: Duration) -> Self {
        Self {
            envelope: EventEnvelope::new("search.completed"),
            request_id: result.request_id.clone(),
            query: query.to_string(),
            strategy: result.aggregation_strategy,
            result_count: result.papers.len() as u64,
            successful_providers: result.successful_providers.clone(),
            failed_providers: result.failed_providers.clone(),
            duration_ms: duration.as_millis() as u64,
        }
    }
}
