//! ArXiv adapter — Atom/XML feed, grounded on the teacher's
//! `client/providers/arxiv.rs` (same `roxmltree` walk, same query-syntax
//! mapping), adapted onto [`ProviderAdapter`]/[`Paper`].

use crate::domain::{Paper, SearchQuery};
use crate::error::{classify, Error, RawFailure};
use crate::providers::traits::{ProviderAdapter, ProviderCapabilities};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub struct ArxivAdapter {
    client: Client,
    base_url: String,
}

impl ArxivAdapter {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent("scholarly-federation/0.1 (academic research aggregator)")
                .build()
                .expect("reqwest client config is static and valid"),
            base_url: "http://export.arxiv.org/api/query".to_string(),
        }
    }

    /// Builds an adapter against a custom endpoint, e.g. a `wiremock` server
    /// in tests.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::new()
        }
    }

    fn build_search_url(&self, query: &SearchQuery) -> Result<String, Error> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            Error::new(
                crate::error::Kind::Validation,
                "INVALID_BASE_URL",
                e.to_string(),
            )
        })?;

        let search_term = if let Some(author) = &query.filters.author {
            format!("au:\"{author}\"")
        } else {
            format!("all:\"{}\"", query.query)
        };

        url.query_pairs_mut()
            .append_pair("search_query", &search_term)
            .append_pair("start", &query.offset.to_string())
            .append_pair("max_results", &query.limit.to_string())
            .append_pair("sortBy", "relevance")
            .append_pair("sortOrder", "descending");

        Ok(url.to_string())
    }

    fn parse_response(&self, body: &str) -> Result<Vec<Paper>, Error> {
        use roxmltree::Document;

        let doc = Document::parse(body).map_err(|e| {
            Error::new(
                crate::error::Kind::Serialization,
                "ARXIV_XML_PARSE_FAILED",
                e.to_string(),
            )
        })?;

        let mut papers = Vec::new();
        for entry in doc.descendants().filter(|n| n.has_tag_name("entry")) {
            let mut arxiv_id = None;
            let mut title = None;
            let mut summary = None;
            let mut authors: Vec<String> = Vec::new();

            for child in entry.children().filter(|n| n.is_element()) {
                match child.tag_name().name() {
                    "id" => {
                        if let Some(id) = child.text() {
                            arxiv_id = id.rsplit('/').next().map(|s| s.to_string());
                        }
                    }
                    "title" => {
                        title = child.text().map(|t| t.trim().replace('\n', " "));
                    }
                    "summary" => {
                        summary = child.text().map(|t| t.trim().replace('\n', " "));
                    }
                    "author" => {
                        for name_elem in child.descendants().filter(|n| n.has_tag_name("name")) {
                            if let Some(name) = name_elem.text() {
                                authors.push(name.trim().to_string());
                            }
                        }
                    }
                    _ => {}
                }
            }

            let (Some(id), Some(title)) = (arxiv_id.clone(), title) else {
                continue;
            };

            let mut paper = Paper::new("arxiv", &id, title);
            paper.arxiv_id = Some(id);
            paper.abstract_text = summary;
            paper.authors = authors
                .into_iter()
                .map(crate::domain::Author::new)
                .collect();
            paper.finalize_quality_score();
            papers.push(paper);
        }

        debug!("parsed {} papers from arxiv response", papers.len());
        Ok(papers)
    }
}

impl Default for ArxivAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for ArxivAdapter {
    fn name(&self) -> &str {
        "arxiv"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_full_text: true,
            supports_doi_lookup: false,
            supports_author_search: true,
            max_results_per_request: 100,
        }
    }

    fn base_delay(&self) -> Duration {
        // arXiv's API etiquette guideline.
        Duration::from_millis(3000)
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Paper>, Error> {
        let url = self.build_search_url(query)?;
        info!("querying arxiv: {url}");

        let response = self
            .client
            .get(&url)
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

        let body = response
            .text()
            .await
            .map_err(|e| classify(&RawFailure::from(e)))?;

        self.parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_search_url_escapes_query_and_sets_pagination() {
        let adapter = ArxivAdapter::new();
        let mut query = SearchQuery::new("quantum computing");
        query.limit = 10;
        query.offset = 5;

        let url = adapter.build_search_url(&query).unwrap();
        assert!(url.contains("max_results=10"));
        assert!(url.contains("start=5"));
        assert!(url.contains("search_query="));
    }

    #[test]
    fn build_search_url_prefers_author_filter() {
        let adapter = ArxivAdapter::new();
        let mut query = SearchQuery::new("ignored");
        query.filters.author = Some("Jane Doe".to_string());

        let url = adapter.build_search_url(&query).unwrap();
        assert!(url.contains("au"));
    }

    #[test]
    fn parse_response_extracts_title_and_authors() {
        let adapter = ArxivAdapter::new();
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/abs/1234.5678v1</id>
    <title>A Paper About Things</title>
    <summary>An abstract.</summary>
    <author><name>Jane Doe</name></author>
  </entry>
</feed>"#;

        let papers = adapter.parse_response(body).unwrap();
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].title, "A Paper About Things");
        assert_eq!(papers[0].arxiv_id.as_deref(), Some("1234.5678v1"));
        assert_eq!(papers[0].authors.len(), 1);
    }

    #[test]
    fn parse_response_skips_entries_without_title() {
        let adapter = ArxivAdapter::new();
        let body = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry><id>http://arxiv.org/abs/0000.0000</id></entry>
</feed>"#;
        let papers = adapter.parse_response(body).unwrap();
        assert!(papers.is_empty());
    }
}
