//! Semantic Scholar adapter — JSON REST, grounded on the teacher's
//! `client/providers/biorxiv.rs` shape (typed `serde` response, a `convert_*`
//! mapping function, classified network errors).

use crate::domain::{Author, Paper, SearchQuery};
use crate::error::{classify, Error, RawFailure};
use crate::providers::traits::{ProviderAdapter, ProviderCapabilities};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct SemanticScholarResponse {
    #[serde(default)]
    data: Vec<SemanticScholarPaper>,
}

#[derive(Debug, Deserialize)]
struct SemanticScholarPaper {
    #[serde(rename = "paperId")]
    paper_id: String,
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(rename = "externalIds")]
    external_ids: Option<ExternalIds>,
    authors: Option<Vec<SemanticScholarAuthor>>,
    #[serde(rename = "citationCount")]
    citation_count: Option<u64>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "ArXiv")]
    arxiv: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SemanticScholarAuthor {
    name: String,
    #[serde(rename = "authorId")]
    #[allow(dead_code)]
    author_id: Option<String>,
}

pub struct SemanticScholarAdapter {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarAdapter {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent("scholarly-federation/0.1 (academic research aggregator)")
                .build()
                .expect("reqwest client config is static and valid"),
            base_url: "https://api.semanticscholar.org/graph/v1/paper/search".to_string(),
            api_key,
        }
    }

    /// Builds an adapter against a custom endpoint, e.g. a `wiremock` server
    /// in tests.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::new(api_key)
        }
    }

    fn convert(paper: SemanticScholarPaper) -> Option<Paper> {
        let title = paper.title?;
        let mut out = Paper::new("semantic_scholar", &paper.paper_id, title);
        out.abstract_text = paper.abstract_text;
        out.source_url = paper.url;
        out.citation_count = paper.citation_count.unwrap_or(0);
        if let Some(ids) = paper.external_ids {
            out.doi = ids.doi;
            out.arxiv_id = ids.arxiv;
        }
        out.authors = paper
            .authors
            .unwrap_or_default()
            .into_iter()
            .map(|a| Author::new(a.name))
            .collect();
        out.finalize_quality_score();
        Some(out)
    }
}

#[async_trait]
impl ProviderAdapter for SemanticScholarAdapter {
    fn name(&self) -> &str {
        "semantic_scholar"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_full_text: false,
            supports_doi_lookup: true,
            supports_author_search: true,
            max_results_per_request: 100,
        }
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Paper>, Error> {
        let mut request = self
            .client
            .get(&self.base_url)
            .query(&[
                ("query", query.query.as_str()),
                ("limit", &query.limit.to_string()),
                ("offset", &query.offset.to_string()),
                (
                    "fields",
                    "title,abstract,externalIds,authors,citationCount,url",
                ),
            ]);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request
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

        let parsed: SemanticScholarResponse = response.json().await.map_err(|e| {
            classify(&RawFailure::Message(format!(
                "failed to parse semantic scholar response: {e}"
            )))
        })?;

        debug!("semantic scholar returned {} raw records", parsed.data.len());
        Ok(parsed.data.into_iter().filter_map(Self::convert).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_drops_papers_without_a_title() {
        let raw = SemanticScholarPaper {
            paper_id: "1".into(),
            title: None,
            abstract_text: None,
            external_ids: None,
            authors: None,
            citation_count: None,
            url: None,
        };
        assert!(SemanticScholarAdapter::convert(raw).is_none());
    }

    #[test]
    fn convert_maps_external_ids_and_authors() {
        let raw = SemanticScholarPaper {
            paper_id: "1".into(),
            title: Some("T".into()),
            abstract_text: Some("A".into()),
            external_ids: Some(ExternalIds {
                doi: Some("10.1/x".into()),
                arxiv: None,
            }),
            authors: Some(vec![SemanticScholarAuthor {
                name: "Jane Doe".into(),
                author_id: None,
            }]),
            citation_count: Some(7),
            url: Some("https://example.com".into()),
        };
        let paper = SemanticScholarAdapter::convert(raw).unwrap();
        assert_eq!(paper.doi.as_deref(), Some("10.1/x"));
        assert_eq!(paper.citation_count, 7);
        assert_eq!(paper.authors.len(), 1);
    }
}
