//! End-to-end federation scenarios against mocked upstreams (spec.md §9).

use scholarly_federation::manager::registry::ProviderRegistry;
use scholarly_federation::{
    ArxivAdapter, CircuitBreakerConfig, CircuitBreakerManager, ExaAdapter, LoggingEventPublisher,
    ManagerConfig, ProviderManager, RetryConfig, RetryPolicy, SearchQuery, SemanticScholarAdapter,
    Strategy, TavilyAdapter,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry_policy() -> RetryPolicy {
    let fast = RetryConfig {
        max_attempts: 2,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff: scholarly_federation::resilience::BackoffKind::Fixed,
        multiplier: 1.0,
        jitter_fraction: 0.0,
    };
    RetryPolicy {
        default: fast.clone(),
        fast: fast.clone(),
        slow: fast.clone(),
        rate_limited: fast,
    }
}

fn manager_with(registry: Arc<ProviderRegistry>) -> ProviderManager {
    ProviderManager::new(
        registry,
        Arc::new(CircuitBreakerManager::new(CircuitBreakerConfig::default())),
        fast_retry_policy(),
        ManagerConfig {
            provider_timeout: Duration::from_secs(5),
            max_concurrency: None,
        },
        Arc::new(LoggingEventPublisher),
    )
}

fn arxiv_feed(id: &str, title: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/abs/{id}</id>
    <title>{title}</title>
    <summary>An abstract.</summary>
    <author><name>Jane Doe</name></author>
  </entry>
</feed>"#
    )
}

fn semantic_scholar_body(paper_id: &str, title: &str, doi: &str, citations: u64) -> serde_json::Value {
    serde_json::json!({
        "data": [{
            "paperId": paper_id,
            "title": title,
            "abstract": "An abstract.",
            "externalIds": {"DOI": doi, "ArXiv": null},
            "authors": [{"name": "Jane Doe", "authorId": null}],
            "citationCount": citations,
            "url": "https://example.com/paper"
        }]
    })
}

/// Scenario: two providers return overlapping results that share no stable
/// identifier (neither sets DOI/ArXiv id), so they key on normalized title;
/// the merge strategy deduplicates them into one paper (spec.md §9
/// scenario 1).
#[tokio::test]
async fn two_providers_merge_and_dedup_by_title() {
    let exa_server = MockServer::start().await;
    let tavily_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{
                "id": "exa-1",
                "title": "Shared Paper",
                "url": "https://exa.example.com/shared",
                "text": "An abstract from exa.",
                "author": "Jane Doe"
            }]
        })))
        .mount(&exa_server)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{
                "title": "Shared Paper",
                "url": "https://tavily.example.com/shared",
                "content": "A richer abstract with more detail from tavily."
            }]
        })))
        .mount(&tavily_server)
        .await;

    let registry = Arc::new(ProviderRegistry::new());
    registry.register(Arc::new(ExaAdapter::with_base_url(exa_server.uri(), "key")));
    registry.register(Arc::new(TavilyAdapter::with_base_url(
        tavily_server.uri(),
        "key",
    )));

    let manager = manager_with(registry);
    let mut query = SearchQuery::new("shared paper");
    query.strategy = Strategy::Merge;

    let result = manager.search(&query).await.unwrap();
    assert_eq!(result.successful_providers.len(), 2);
    assert!(result.failed_providers.is_empty());
    assert_eq!(result.papers.len(), 1);
}

/// Scenario: every provider fails; the aggregated result reports zero
/// successes and a failure per provider, not an outright error (spec.md §9
/// scenario 5).
#[tokio::test]
async fn all_providers_fail_yields_empty_successful_set() {
    let arxiv_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&arxiv_server)
        .await;

    let registry = Arc::new(ProviderRegistry::new());
    registry.register(Arc::new(ArxivAdapter::with_base_url(arxiv_server.uri())));

    let manager = manager_with(registry);
    let query = SearchQuery::new("anything");

    let result = manager.search(&query).await.unwrap();
    assert!(result.successful_providers.is_empty());
    assert_eq!(result.failed_providers, vec!["arxiv".to_string()]);
    assert!(result.papers.is_empty());
    assert!(!result.partial_failure, "no successes means no partial failure, total failure");
}

/// Scenario: one provider succeeds and one fails; `partial_failure` is set
/// and the surviving papers still come back (spec.md §9 scenario: mixed
/// outcome).
#[tokio::test]
async fn one_provider_fails_one_succeeds_is_partial_failure() {
    let arxiv_server = MockServer::start().await;
    let semantic_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(arxiv_feed("1.1", "Solo Paper")))
        .mount(&arxiv_server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&semantic_server)
        .await;

    let registry = Arc::new(ProviderRegistry::new());
    registry.register(Arc::new(ArxivAdapter::with_base_url(arxiv_server.uri())));
    registry.register(Arc::new(SemanticScholarAdapter::with_base_url(
        semantic_server.uri(),
        None,
    )));

    let manager = manager_with(registry);
    let query = SearchQuery::new("solo paper");

    let result = manager.search(&query).await.unwrap();
    assert_eq!(result.successful_providers, vec!["arxiv".to_string()]);
    assert_eq!(result.failed_providers, vec!["semantic_scholar".to_string()]);
    assert!(result.partial_failure);
    assert_eq!(result.papers.len(), 1);
}

/// Scenario: `First` strategy stops at the first successful adapter and
/// never calls the rest (spec.md §4.6 `First`).
#[tokio::test]
async fn first_strategy_stops_after_first_success() {
    let semantic_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(semantic_scholar_body("ss1", "Found First", "10.1/first", 1)),
        )
        .mount(&semantic_server)
        .await;

    let registry = Arc::new(ProviderRegistry::new());
    registry.register(Arc::new(SemanticScholarAdapter::with_base_url(
        semantic_server.uri(),
        None,
    )));

    let manager = manager_with(registry);
    let mut query = SearchQuery::new("found first");
    query.strategy = Strategy::First;

    let result = manager.search(&query).await.unwrap();
    assert_eq!(result.successful_providers, vec!["semantic_scholar".to_string()]);
    assert_eq!(result.papers.len(), 1);
}

/// Scenario: `BestQuality` ranks the merged set by quality score rather than
/// raw arrival order (spec.md §4.6 `BestQuality`).
#[tokio::test]
async fn best_quality_ranks_above_low_citation_papers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                {
                    "paperId": "low",
                    "title": "Low Citation Paper",
                    "abstract": null,
                    "externalIds": null,
                    "authors": [],
                    "citationCount": 1,
                    "url": null
                },
                {
                    "paperId": "high",
                    "title": "High Citation Paper",
                    "abstract": "Rich abstract with detail.",
                    "externalIds": {"DOI": "10.1/high", "ArXiv": null},
                    "authors": [{"name": "Jane Doe", "authorId": null}],
                    "citationCount": 5000,
                    "url": "https://example.com/high"
                }
            ]
        })))
        .mount(&server)
        .await;

    let registry = Arc::new(ProviderRegistry::new());
    registry.register(Arc::new(SemanticScholarAdapter::with_base_url(
        server.uri(),
        None,
    )));

    let manager = manager_with(registry);
    let mut query = SearchQuery::new("citation comparison");
    query.strategy = Strategy::BestQuality;

    let result = manager.search(&query).await.unwrap();
    assert_eq!(result.papers.len(), 2);
    assert_eq!(result.papers[0].title, "High Citation Paper");
    assert_eq!(result.papers[1].title, "Low Citation Paper");
}
