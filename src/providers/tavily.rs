//! Tavily adapter — JSON REST search API, same template as
//! [`crate::providers::exa`].

use crate::domain::{Paper, SearchQuery};
use crate::error::{classify, Error, RawFailure};
use crate::providers::traits::{ProviderAdapter, ProviderCapabilities};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct TavilySearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u32,
    include_raw_content: bool,
}

#[derive(Debug, Deserialize)]
struct TavilySearchResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: Option<String>,
    url: String,
    content: Option<String>,
}

pub struct TavilyAdapter {
    client: Client,
    base_url: String,
    api_key: String,
}

impl TavilyAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent("scholarly-federation/0.1 (academic research aggregator)")
                .build()
                .expect("reqwest client config is static and valid"),
            base_url: "https://api.tavily.com/search".to_string(),
            api_key: api_key.into(),
        }
    }

    /// Builds an adapter against a custom endpoint, e.g. a `wiremock` server
    /// in tests.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::new(api_key)
        }
    }

    fn convert(result: TavilyResult) -> Option<Paper> {
        let title = result.title?;
        let source_id = result.url.clone();
        let mut paper = Paper::new("tavily", &source_id, title);
        paper.abstract_text = result.content;
        paper.source_url = Some(result.url);
        paper.finalize_quality_score();
        Some(paper)
    }
}

#[async_trait]
impl ProviderAdapter for TavilyAdapter {
    fn name(&self) -> &str {
        "tavily"
    }

    fn is_enabled(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_full_text: false,
            supports_doi_lookup: false,
            supports_author_search: false,
            max_results_per_request: 20,
        }
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Paper>, Error> {
        let body = TavilySearchRequest {
            api_key: &self.api_key,
            query: &query.query,
            max_results: query.limit.min(20),
            include_raw_content: false,
        };

        let response = self
            .client
            .post(&self.base_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify(&RawFailure::from(e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok();
            return Err(classify(&RawFailure::HttpStatus {
                status: status.as_u16(),
                body,
            }));
        }

        let parsed: TavilySearchResponse = response.json().await.map_err(|e| {
            classify(&RawFailure::Message(format!(
                "failed to parse tavily response: {e}"
            )))
        })?;

        debug!("tavily returned {} raw records", parsed.results.len());
        Ok(parsed.results.into_iter().filter_map(Self::convert).collect())
    }
}
