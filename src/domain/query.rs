//! Query, per-provider result, and aggregated-result types (spec.md §3, §6).

use crate::error::Kind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Aggregation strategy selected for a query (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Fan out to all requested adapters in parallel, collect within
    /// deadline, deduplicate, union the papers. Default.
    Merge,
    /// Try adapters in caller-given order sequentially; return the first
    /// success.
    First,
    /// Fan out in parallel; return the first success and cancel the rest.
    Fastest,
    /// Merge, then sort by quality score descending and truncate to limit.
    BestQuality,
    /// Pick one adapter via a per-manager rotation counter; one-shot call.
    RoundRobin,
}

impl Default for Strategy {
    fn default() -> Self {
        Self::Merge
    }
}

/// Optional filters narrowing a [`SearchQuery`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    pub author: Option<String>,
    pub journal: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    #[serde(default)]
    pub fields_of_study: Vec<String>,
    pub language: Option<String>,
}

/// A validated caller query, fanned out by the manager (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    pub request_id: Option<String>,
    /// Subset of registered providers to query; `None` means all enabled.
    pub providers: Option<Vec<String>>,
    #[serde(default)]
    pub strategy: Strategy,
}

const fn default_limit() -> u32 {
    20
}

/// Maximum accepted [`SearchQuery::limit`].
pub const MAX_LIMIT: u32 = 200;
/// Maximum accepted [`SearchQuery::query`] length, in characters.
pub const MAX_QUERY_LEN: usize = 1000;

impl SearchQuery {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            filters: SearchFilters::default(),
            limit: default_limit(),
            offset: 0,
            request_id: None,
            providers: None,
            strategy: Strategy::default(),
        }
    }

    /// Structural validation per spec.md §3/§8 boundary behaviors. Does not
    /// check provider availability — the caller's requested-provider set is
    /// validated against the registry by the manager.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.query.is_empty() || self.query.chars().count() > MAX_QUERY_LEN {
            return Err(crate::Error::validation(
                "query",
                "must be 1..=1000 characters",
            ));
        }
        if self.limit > MAX_LIMIT {
            return Err(crate::Error::validation(
                "limit",
                format!("must be <= {MAX_LIMIT}"),
            ));
        }
        if let Some(providers) = &self.providers {
            if providers.is_empty() {
                return Err(crate::Error::validation(
                    "providers",
                    "requested provider set must not be empty when specified",
                ));
            }
        }
        Ok(())
    }
}

/// Result from a single provider (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub papers: Vec<crate::domain::paper::Paper>,
    pub total_count: u64,
    pub result_count: u64,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    pub cache_hit: bool,
    pub provider: String,
    pub request_id: Option<String>,
    pub has_more: bool,
    pub success: bool,
}

impl SearchResult {
    #[must_use]
    pub fn new(provider: impl Into<String>, papers: Vec<crate::domain::paper::Paper>) -> Self {
        let result_count = papers.len() as u64;
        Self {
            papers,
            total_count: result_count,
            result_count,
            duration: Duration::ZERO,
            cache_hit: false,
            provider: provider.into(),
            request_id: None,
            has_more: false,
            success: true,
        }
    }

    /// Recompute `has_more` from `offset`/`result_count`/`total_count`.
    pub fn recompute_has_more(&mut self, offset: u64) {
        self.has_more = offset + self.result_count < self.total_count;
    }
}

/// A per-provider diagnostic error surfaced in [`AggregatedResult::errors`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderErrorEntry {
    pub provider: String,
    #[serde(rename = "type")]
    pub kind: Kind,
    pub message: String,
    pub retryable: bool,
}

/// The merged, deduplicated result of fanning a query out to providers
/// (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub papers: Vec<crate::domain::paper::Paper>,
    pub total_count: u64,
    pub provider_results: HashMap<String, SearchResult>,
    pub requested_providers: Vec<String>,
    pub successful_providers: Vec<String>,
    pub failed_providers: Vec<String>,
    #[serde(with = "duration_millis")]
    pub total_duration: Duration,
    pub cache_hits: u64,
    pub request_id: Option<String>,
    pub aggregation_strategy: Strategy,
    pub partial_failure: bool,
    pub errors: Vec<ProviderErrorEntry>,
}

impl AggregatedResult {
    #[must_use]
    pub fn empty(requested: Vec<String>, strategy: Strategy) -> Self {
        Self {
            papers: Vec::new(),
            total_count: 0,
            provider_results: HashMap::new(),
            requested_providers: requested,
            successful_providers: Vec::new(),
            failed_providers: Vec::new(),
            total_duration: Duration::ZERO,
            cache_hits: 0,
            request_id: None,
            aggregation_strategy: strategy,
            partial_failure: false,
            errors: Vec::new(),
        }
    }

    /// `partial_failure` holds iff at least one provider failed and at
    /// least one succeeded (spec.md §3 invariant 4... see Glossary).
    pub fn recompute_partial_failure(&mut self) {
        self.partial_failure = !self.failed_providers.is_empty() && !self.successful_providers.is_empty();
    }

    /// HTTP status mapping per spec.md §7: the worst classified error only
    /// when there are zero successful providers, else 200.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        if !self.successful_providers.is_empty() {
            return 200;
        }
        self.errors
            .iter()
            .map(|e| e.kind.http_status())
            .max()
            .unwrap_or(200)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u128(d.as_millis())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
