//! Provider manager: concurrent fan-out, five aggregation strategies, and
//! dedup (spec.md §4.6). Grounded on the teacher's `client::meta_search`
//! (`MetaSearchClient::search`'s semaphore + `tokio::spawn` + `timeout` fan-out,
//! `deduplicate_papers`), generalized across strategies and composed with the
//! new retry/circuit-breaker substrate: every provider call runs as
//! `retry(breaker(adapter.search))`.

pub mod dedup;
pub mod registry;
pub mod strategy;

use crate::domain::{AggregatedResult, Paper, ProviderErrorEntry, SearchQuery, Strategy};
use crate::error::Error;
use crate::events::{EventPublisher, ProviderHealthEvent, SearchCompletedEvent};
use crate::providers::ProviderAdapter;
use crate::resilience::{CircuitBreakerManager, RetryExecutor, RetryPolicy};
use registry::ProviderRegistry;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Tunables for [`ProviderManager`] independent of any single provider
/// (spec.md §4.6).
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Per-provider call timeout, applied around `retry(breaker(adapter))`
    /// as a whole so a retry storm cannot outlive the query's own deadline.
    pub provider_timeout: Duration,
    /// Hard cap on concurrently in-flight provider calls. `None` means the
    /// manager fans out to every eligible provider at once (spec.md Open
    /// Question, resolved: advisory by default, only enforced when set).
    pub max_concurrency: Option<usize>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(30),
            max_concurrency: None,
        }
    }
}

/// Orchestrates a [`SearchQuery`] across the [`ProviderRegistry`] per its
/// [`Strategy`], producing a deduplicated [`AggregatedResult`].
pub struct ProviderManager {
    registry: Arc<ProviderRegistry>,
    breakers: Arc<CircuitBreakerManager>,
    retry: Arc<RetryExecutor>,
    config: ManagerConfig,
    events: Arc<dyn EventPublisher>,
    round_robin_counter: AtomicUsize,
}

impl ProviderManager {
    #[must_use]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        breakers: Arc<CircuitBreakerManager>,
        retry_policy: RetryPolicy,
        config: ManagerConfig,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            registry,
            breakers,
            retry: Arc::new(RetryExecutor::new(retry_policy)),
            config,
            events,
            round_robin_counter: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Fan a validated query out across eligible providers per its
    /// [`Strategy`] and return the merged, deduplicated result.
    pub async fn search(&self, query: &SearchQuery) -> Result<AggregatedResult, Error> {
        query.validate()?;
        let start = Instant::now();

        let providers = self.eligible_providers(query);
        if providers.is_empty() {
            return Err(Error::validation(
                "providers",
                "no enabled provider available for the requested set",
            ));
        }
        let requested: Vec<String> = providers.iter().map(|p| p.name().to_string()).collect();

        let mut result = match query.strategy {
            Strategy::Merge => self.run_merge(query, providers, requested).await,
            Strategy::First => self.run_first(query, providers).await?,
            Strategy::Fastest => self.run_fastest(query, providers, requested).await,
            Strategy::BestQuality => self.run_best_quality(query, providers, requested).await,
            Strategy::RoundRobin => self.run_round_robin(query, providers).await?,
        };

        result.total_duration = start.elapsed();
        result.request_id = query.request_id.clone();
        result.recompute_partial_failure();

        self.events.publish_search_completed(&SearchCompletedEvent::from_result(
            &query.query,
            &result,
            result.total_duration,
        ));

        Ok(result)
    }

    fn eligible_providers(&self, query: &SearchQuery) -> Vec<Arc<dyn ProviderAdapter>> {
        match &query.providers {
            Some(names) => self.registry.resolve(names),
            None => self.registry.enabled(),
        }
    }

    /// Executes one provider call through `retry(breaker(adapter.search))`,
    /// bounded by `provider_timeout`, recording the outcome against that
    /// provider's breaker either way.
    async fn call_provider(
        &self,
        provider: Arc<dyn ProviderAdapter>,
        query: SearchQuery,
    ) -> (String, Duration, Result<Vec<Paper>, Error>) {
        let name = provider.name().to_string();
        let breaker = self.breakers.get_or_create(&name);
        let retry = Arc::clone(&self.retry);
        let timeout_duration = self.config.provider_timeout;
        let started = Instant::now();

        let call = async move {
            retry
                .execute(&name, || {
                    let provider = Arc::clone(&provider);
                    let breaker = Arc::clone(&breaker);
                    let query = query.clone();
                    async move { breaker.call(|| async { provider.search(&query).await }).await }
                })
                .await
        };

        let outcome = match tokio::time::timeout(timeout_duration, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::new(
                crate::error::Kind::Timeout,
                "PROVIDER_DEADLINE_EXCEEDED",
                format!("provider '{}' exceeded its overall deadline", provider_name_for_log(&self.registry, &name)),
            )),
        };
        let elapsed = started.elapsed();

        if let Some(breaker) = self.maybe_breaker(&name) {
            self.events
                .publish_provider_health(&ProviderHealthEvent::from_metrics(&breaker.metrics()));
        }

        (name, elapsed, outcome)
    }

    fn maybe_breaker(&self, name: &str) -> Option<Arc<crate::resilience::CircuitBreaker>> {
        Some(self.breakers.get_or_create(name))
    }

    async fn run_merge(
        &self,
        query: &SearchQuery,
        providers: Vec<Arc<dyn ProviderAdapter>>,
        requested: Vec<String>,
    ) -> AggregatedResult {
        self.run_concurrent(query, providers, requested, None).await
    }

    async fn run_best_quality(
        &self,
        query: &SearchQuery,
        providers: Vec<Arc<dyn ProviderAdapter>>,
        requested: Vec<String>,
    ) -> AggregatedResult {
        self.run_concurrent(query, providers, requested, Some(query.limit as usize))
            .await
    }

    async fn run_fastest(
        &self,
        query: &SearchQuery,
        providers: Vec<Arc<dyn ProviderAdapter>>,
        requested: Vec<String>,
    ) -> AggregatedResult {
        self.run_concurrent(query, providers, requested, None).await
    }

    /// Shared dispatch for the strategies that [`strategy::fans_out_concurrently`]
    /// marks as concurrent (`Merge`, `Fastest`, `BestQuality`): fan out to
    /// every eligible provider at once, short-circuiting the rest once one
    /// succeeds when [`strategy::short_circuits`] says this strategy should
    /// (only `Fastest`, among the concurrent ones).
    async fn run_concurrent(
        &self,
        query: &SearchQuery,
        providers: Vec<Arc<dyn ProviderAdapter>>,
        requested: Vec<String>,
        rank_limit: Option<usize>,
    ) -> AggregatedResult {
        debug_assert!(strategy::fans_out_concurrently(query.strategy));
        let short_circuit = strategy::short_circuits(query.strategy);

        let cancel = short_circuit.then(CancellationToken::new);
        let outcomes = self.fan_out(query, providers, cancel).await;

        let outcomes = if short_circuit {
            // Keep only the first successful outcome (by completion order,
            // which `fan_out` preserves) plus every failure for diagnostics.
            let mut kept = Vec::new();
            let mut seen_success = false;
            for (name, elapsed, outcome) in outcomes {
                if outcome.is_ok() {
                    if seen_success {
                        continue;
                    }
                    seen_success = true;
                }
                kept.push((name, elapsed, outcome));
            }
            kept
        } else {
            outcomes
        };

        self.collect(query, requested, outcomes, rank_limit)
    }

    /// `First` attempts adapters one at a time in order, stopping at the
    /// first success. `requested`/`successful`/`failed` only ever name the
    /// adapters actually dispatched (spec.md invariant 1: requested is the
    /// disjoint union of successful and failed), and if every attempted
    /// adapter fails, the last classified error is surfaced directly
    /// (spec.md §4.6 Failure semantics, §7(v)) rather than an empty `Ok`.
    async fn run_first(
        &self,
        query: &SearchQuery,
        providers: Vec<Arc<dyn ProviderAdapter>>,
    ) -> Result<AggregatedResult, Error> {
        let mut outcomes = Vec::new();
        let mut attempted = Vec::new();
        let mut last_error = None;
        for provider in providers {
            attempted.push(provider.name().to_string());
            let (name, elapsed, outcome) = self.call_provider(provider, query.clone()).await;
            let succeeded = outcome.is_ok();
            if let Err(e) = &outcome {
                last_error = Some(e.clone());
            }
            outcomes.push((name, elapsed, outcome));
            if succeeded {
                last_error = None;
                break;
            }
        }

        if let Some(error) = last_error {
            return Err(error);
        }
        Ok(self.collect(query, attempted, outcomes, None))
    }

    /// `RoundRobin` dispatches to exactly one adapter, so `requested` names
    /// only that adapter. Returns the adapter's own classified error when it
    /// fails (spec.md §4.6 Failure semantics, §7(v)).
    async fn run_round_robin(
        &self,
        query: &SearchQuery,
        providers: Vec<Arc<dyn ProviderAdapter>>,
    ) -> Result<AggregatedResult, Error> {
        let idx = self.round_robin_counter.fetch_add(1, Ordering::Relaxed) % providers.len();
        let provider = Arc::clone(&providers[idx]);
        let attempted = vec![provider.name().to_string()];
        let (name, elapsed, outcome) = self.call_provider(provider, query.clone()).await;
        if let Err(error) = &outcome {
            return Err(error.clone());
        }
        Ok(self.collect(query, attempted, vec![(name, elapsed, outcome)], None))
    }

    /// Dispatches `providers` concurrently, respecting `max_concurrency`
    /// when set, returning each provider's outcome. When `cancel` is
    /// provided, the first successful outcome triggers cancellation of the
    /// rest (used by [`Strategy::Fastest`]).
    async fn fan_out(
        &self,
        query: &SearchQuery,
        providers: Vec<Arc<dyn ProviderAdapter>>,
        cancel: Option<CancellationToken>,
    ) -> Vec<(String, Duration, Result<Vec<Paper>, Error>)> {
        let semaphore = self
            .config
            .max_concurrency
            .map(|n| Arc::new(Semaphore::new(n.max(1))));

        let mut handles = Vec::new();
        for provider in providers {
            let semaphore = semaphore.clone();
            let query = query.clone();
            let cancel = cancel.clone();
            let manager_retry = Arc::clone(&self.retry);
            let breakers = Arc::clone(&self.breakers);
            let events = Arc::clone(&self.events);
            let timeout_duration = self.config.provider_timeout;
            let name = provider.name().to_string();

            handles.push(tokio::spawn(async move {
                let started = Instant::now();
                let _permit = match &semaphore {
                    Some(s) => Some(s.acquire_owned().await.expect("semaphore not closed")),
                    None => None,
                };

                if let Some(token) = &cancel {
                    if token.is_cancelled() {
                        return (name, started.elapsed(), Err(Error::new(
                            crate::error::Kind::Transient,
                            "CANCELLED",
                            "search cancelled after a faster provider returned",
                        )));
                    }
                }

                let breaker = breakers.get_or_create(&name);
                let call = async {
                    manager_retry
                        .execute(&name, || {
                            let provider = Arc::clone(&provider);
                            let breaker = Arc::clone(&breaker);
                            let query = query.clone();
                            async move { breaker.call(|| async { provider.search(&query).await }).await }
                        })
                        .await
                };

                let outcome = match tokio::time::timeout(timeout_duration, call).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::new(
                        crate::error::Kind::Timeout,
                        "PROVIDER_DEADLINE_EXCEEDED",
                        format!("provider '{name}' exceeded its overall deadline"),
                    )),
                };
                let elapsed = started.elapsed();

                events.publish_provider_health(&ProviderHealthEvent::from_metrics(&breaker.metrics()));

                if outcome.is_ok() {
                    if let Some(token) = &cancel {
                        token.cancel();
                    }
                }

                (name, elapsed, outcome)
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(pair) => results.push(pair),
                Err(join_err) => {
                    warn!("provider task panicked: {join_err}");
                }
            }
        }
        results
    }

    fn collect(
        &self,
        query: &SearchQuery,
        requested: Vec<String>,
        outcomes: Vec<(String, Duration, Result<Vec<Paper>, Error>)>,
        rank_limit: Option<usize>,
    ) -> AggregatedResult {
        let mut result = AggregatedResult::empty(requested, query.strategy);
        let mut all_papers = Vec::new();

        for (name, elapsed, outcome) in outcomes {
            match outcome {
                Ok(papers) => {
                    result.successful_providers.push(name.clone());
                    let mut search_result = crate::domain::SearchResult::new(name, papers.clone());
                    search_result.duration = elapsed;
                    search_result.request_id = query.request_id.clone();
                    search_result.recompute_has_more(u64::from(query.offset));
                    all_papers.extend(papers);
                    result.provider_results.insert(search_result.provider.clone(), search_result);
                }
                Err(error) => {
                    result.failed_providers.push(name.clone());
                    result.errors.push(ProviderErrorEntry {
                        provider: name,
                        kind: error.kind,
                        message: error.message.clone(),
                        retryable: error.retryable(),
                    });
                }
            }
        }

        let mut papers = dedup::deduplicate(all_papers);
        if let Some(limit) = rank_limit {
            papers = strategy::rank_and_truncate(papers, limit);
        } else {
            papers.truncate(query.limit as usize + query.offset as usize);
            if (query.offset as usize) < papers.len() {
                papers.drain(0..query.offset as usize);
            } else {
                papers.clear();
            }
        }

        result.total_count = papers.len() as u64;
        result.papers = papers;
        result.cache_hits = result
            .provider_results
            .values()
            .filter(|r| r.cache_hit)
            .count() as u64;
        info!(
            "search for '{}' completed: {} papers, {} ok, {} failed",
            query.query,
            result.papers.len(),
            result.successful_providers.len(),
            result.failed_providers.len()
        );
        result
    }
}

fn provider_name_for_log(_registry: &ProviderRegistry, name: &str) -> String {
    name.to_string()
}
