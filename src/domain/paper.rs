//! Normalized paper/author/category entities shared by every provider adapter.

use serde::{Deserialize, Serialize};

/// Processing state of a [`Paper`] as it moves through the federation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingState {
    /// `completed` and `failed` are the only terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A scholarly author, identified by ORCID when present, else by normalized
/// name + affiliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub orcid: Option<String>,
    pub email: Option<String>,
    pub affiliation: Option<String>,
    pub metrics: AuthorMetrics,
}

impl Author {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            orcid: None,
            email: None,
            affiliation: None,
            metrics: AuthorMetrics::default(),
        }
    }

    /// The identity key used to collapse duplicate authors across providers:
    /// ORCID if present, else normalized `name|affiliation`.
    #[must_use]
    pub fn identity_key(&self) -> String {
        if let Some(orcid) = &self.orcid {
            return orcid.clone();
        }
        let name = self.name.trim().to_lowercase();
        let affiliation = self
            .affiliation
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_lowercase();
        format!("{name}|{affiliation}")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorMetrics {
    pub paper_count: u32,
    pub citation_count: u64,
    pub h_index: u32,
}

/// A hierarchical subject-classification label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub source: String,
    pub source_code: String,
    pub parent_id: Option<String>,
    pub level: u32,
    pub is_active: bool,
}

impl Category {
    #[must_use]
    pub fn new(source: impl Into<String>, source_code: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            source_code: source_code.into(),
            parent_id: None,
            level: 0,
            is_active: true,
        }
    }

    /// `(source, source_code)` uniquely identifies a category.
    #[must_use]
    pub fn identity_key(&self) -> (String, String) {
        (self.source.clone(), self.source_code.clone())
    }
}

/// A normalized scholarly record produced by a provider adapter on conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    /// Stable surrogate id: `"<provider>_<upstream-id>"`.
    pub id: String,
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,

    pub title: String,
    pub abstract_text: Option<String>,
    pub full_text: Option<String>,
    pub language: String,

    pub authors: Vec<Author>,
    pub categories: Vec<Category>,

    pub citation_count: u64,
    pub quality_score: f64,

    pub source_provider: String,
    pub source_id: String,
    pub source_url: Option<String>,

    pub state: ProcessingState,
}

impl Paper {
    /// Construct a new paper in `pending` state with defaulted optional
    /// fields. `title` must be non-empty (enforced by callers that build
    /// `Paper` from upstream data — an empty title is a provider bug).
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        source_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        let provider = provider.into();
        let source_id = source_id.into();
        let id = format!("{provider}_{source_id}");
        Self {
            id,
            doi: None,
            arxiv_id: None,
            title: title.into(),
            abstract_text: None,
            full_text: None,
            language: "en".to_string(),
            authors: Vec::new(),
            categories: Vec::new(),
            citation_count: 0,
            quality_score: 0.0,
            source_provider: provider,
            source_id,
            source_url: None,
            state: ProcessingState::Pending,
        }
    }

    /// Dedup key per spec: DOI if present, else ArXiv id, else normalized
    /// title (lowercased, trimmed, whitespace-collapsed).
    #[must_use]
    pub fn dedup_key(&self) -> String {
        if let Some(doi) = self.doi.as_deref().filter(|d| !d.is_empty()) {
            return format!("doi:{doi}");
        }
        if let Some(arxiv) = self.arxiv_id.as_deref().filter(|a| !a.is_empty()) {
            return format!("arxiv:{arxiv}");
        }
        format!("title:{}", normalize_title(&self.title))
    }

    /// Count of non-empty optional fields, used as the dedup tie-break.
    #[must_use]
    pub fn filled_field_count(&self) -> usize {
        let mut count = 0;
        if self.doi.as_deref().is_some_and(|s| !s.is_empty()) {
            count += 1;
        }
        if self.arxiv_id.as_deref().is_some_and(|s| !s.is_empty()) {
            count += 1;
        }
        if self.abstract_text.as_deref().is_some_and(|s| !s.is_empty()) {
            count += 1;
        }
        if self.full_text.as_deref().is_some_and(|s| !s.is_empty()) {
            count += 1;
        }
        if self.source_url.is_some() {
            count += 1;
        }
        count += usize::from(!self.authors.is_empty());
        count += usize::from(!self.categories.is_empty());
        count
    }

    /// Derived quality score in `[0, 1]` per spec.md §3, computed by the
    /// adapter on conversion from citation count (log-scaled, since raw
    /// counts span orders of magnitude) and field completeness. The core
    /// never recomputes this; it only consumes it for `BestQuality` ranking.
    #[must_use]
    pub fn derive_quality_score(&self) -> f64 {
        let citation_component = ((self.citation_count as f64) + 1.0).ln() / 10.0_f64.ln();
        let completeness_component = self.filled_field_count() as f64 / 7.0;
        (0.7 * citation_component.clamp(0.0, 1.0) + 0.3 * completeness_component.clamp(0.0, 1.0))
            .clamp(0.0, 1.0)
    }

    /// Sets `quality_score` from [`derive_quality_score`](Self::derive_quality_score).
    /// Adapters call this once after populating every other field.
    pub fn finalize_quality_score(&mut self) {
        self.quality_score = self.derive_quality_score();
    }
}

fn normalize_title(title: &str) -> String {
    title
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_prefers_doi_then_arxiv_then_title() {
        let mut p = Paper::new("arxiv", "1", "Some Title");
        assert_eq!(p.dedup_key(), "title:some title");

        p.arxiv_id = Some("2301.00001".to_string());
        assert_eq!(p.dedup_key(), "arxiv:2301.00001");

        p.doi = Some("10.1/x".to_string());
        assert_eq!(p.dedup_key(), "doi:10.1/x");
    }

    #[test]
    fn title_normalization_collapses_whitespace_and_case() {
        let p = Paper::new("a", "1", "  A   Title\nWith   Gaps  ");
        assert_eq!(p.dedup_key(), "title:a title with gaps");
    }

    #[test]
    fn filled_field_count_counts_optional_fields() {
        let mut p = Paper::new("a", "1", "T");
        assert_eq!(p.filled_field_count(), 0);
        p.abstract_text = Some("x".to_string());
        p.authors.push(Author::new("A"));
        assert_eq!(p.filled_field_count(), 2);
    }

    #[test]
    fn author_identity_key_prefers_orcid() {
        let mut a = Author::new("Jane Doe");
        a.affiliation = Some("MIT".to_string());
        assert_eq!(a.identity_key(), "jane doe|mit");

        a.orcid = Some("0000-0001".to_string());
        assert_eq!(a.identity_key(), "0000-0001");
    }

    #[test]
    fn quality_score_increases_with_citations_and_completeness() {
        let mut sparse = Paper::new("a", "1", "T");
        sparse.citation_count = 1;
        let mut rich = Paper::new("a", "2", "T");
        rich.citation_count = 1000;
        rich.abstract_text = Some("x".to_string());
        rich.authors.push(Author::new("A"));

        assert!(rich.derive_quality_score() > sparse.derive_quality_score());
        assert!(rich.derive_quality_score() <= 1.0);
        assert!(sparse.derive_quality_score() >= 0.0);
    }

    #[test]
    fn processing_state_terminal() {
        assert!(!ProcessingState::Pending.is_terminal());
        assert!(!ProcessingState::Processing.is_terminal());
        assert!(ProcessingState::Completed.is_terminal());
        assert!(ProcessingState::Failed.is_terminal());
    }
}
