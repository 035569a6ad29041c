//! Exa adapter — JSON REST neural-search API, same template as
//! [`crate::providers::semantic_scholar`].

use crate::domain::{Paper, SearchQuery};
use crate::error::{classify, Error, RawFailure};
use crate::providers::traits::{ProviderAdapter, ProviderCapabilities};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct ExaSearchRequest<'a> {
    query: &'a str,
    #[serde(rename = "numResults")]
    num_results: u32,
    #[serde(rename = "type")]
    search_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ExaSearchResponse {
    #[serde(default)]
    results: Vec<ExaResult>,
}

#[derive(Debug, Deserialize)]
struct ExaResult {
    id: String,
    title: Option<String>,
    url: Option<String>,
    text: Option<String>,
    author: Option<String>,
}

pub struct ExaAdapter {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ExaAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent("scholarly-federation/0.1 (academic research aggregator)")
                .build()
                .expect("reqwest client config is static and valid"),
            base_url: "https://api.exa.ai/search".to_string(),
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

    fn convert(result: ExaResult) -> Option<Paper> {
        let title = result.title?;
        let mut paper = Paper::new("exa", &result.id, title);
        paper.abstract_text = result.text;
        paper.source_url = result.url;
        if let Some(author) = result.author {
            paper.authors = vec![crate::domain::Author::new(author)];
        }
        paper.finalize_quality_score();
        Some(paper)
    }
}

#[async_trait]
impl ProviderAdapter for ExaAdapter {
    fn name(&self) -> &str {
        "exa"
    }

    fn is_enabled(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_full_text: false,
            supports_doi_lookup: false,
            supports_author_search: false,
            max_results_per_request: 100,
        }
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Paper>, Error> {
        let body = ExaSearchRequest {
            query: &query.query,
            num_results: query.limit.min(100),
            search_type: "neural",
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
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

        let parsed: ExaSearchResponse = response.json().await.map_err(|e| {
            classify(&RawFailure::Message(format!(
                "failed to parse exa response: {e}"
            )))
        })?;

        debug!("exa returned {} raw records", parsed.results.len());
        Ok(parsed.results.into_iter().filter_map(Self::convert).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_without_api_key() {
        let adapter = ExaAdapter::new("");
        assert!(!adapter.is_enabled());
    }

    #[test]
    fn convert_drops_results_without_title() {
        let result = ExaResult {
            id: "1".into(),
            title: None,
            url: None,
            text: None,
            author: None,
        };
        assert!(ExaAdapter::convert(result).is_none());
    }

    #[test]
    fn convert_maps_single_author() {
        let result = ExaResult {
            id: "1".into(),
            title: Some("T".into()),
            url: Some("https://example.com".into()),
            text: Some("snippet".into()),
            author: Some("Jane Doe".into()),
        };
        let paper = ExaAdapter::convert(result).unwrap();
        assert_eq!(paper.authors.len(), 1);
        assert_eq!(paper.source_url.as_deref(), Some("https://example.com"));
    }
}
