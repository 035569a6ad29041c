//! Deduplication across providers (spec.md §4.6), grounded on the teacher's
//! `MetaSearchClient::deduplicate_papers` (DOI/title keying), generalized to
//! the shared `Paper::dedup_key` and a quality-aware tie-break.

use crate::domain::Paper;
use std::collections::HashMap;

/// Collapse `papers` by [`Paper::dedup_key`] in a single order-preserving
/// pass (spec.md §4.6): each key keeps the slot of its first occurrence, so
/// the surviving representatives come out in first-seen order even though
/// the representative itself may be replaced by a later, better duplicate.
#[must_use]
pub fn deduplicate(papers: Vec<Paper>) -> Vec<Paper> {
    let mut slots: Vec<Paper> = Vec::with_capacity(papers.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(papers.len());

    for paper in papers {
        let key = paper.dedup_key();
        match index.get(&key) {
            Some(&pos) => {
                let existing = std::mem::replace(&mut slots[pos], Paper::new("", "", ""));
                slots[pos] = pick_better(existing, paper);
            }
            None => {
                index.insert(key, slots.len());
                slots.push(paper);
            }
        }
    }

    slots
}

/// Tie-break per spec.md §4.6: higher citation count wins; on a tie, the
/// record with more filled optional fields wins.
fn pick_better(a: Paper, b: Paper) -> Paper {
    if b.citation_count != a.citation_count {
        return if b.citation_count > a.citation_count { b } else { a };
    }
    if b.filled_field_count() > a.filled_field_count() {
        b
    } else {
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(provider: &str, id: &str, title: &str) -> Paper {
        Paper::new(provider, id, title)
    }

    #[test]
    fn distinct_papers_both_survive() {
        let papers = vec![paper("a", "1", "Title One"), paper("b", "2", "Title Two")];
        assert_eq!(deduplicate(papers).len(), 2);
    }

    #[test]
    fn duplicate_by_doi_collapses_to_one() {
        let mut p1 = paper("a", "1", "Same Title");
        p1.doi = Some("10.1/x".to_string());
        let mut p2 = paper("b", "2", "Same Title");
        p2.doi = Some("10.1/x".to_string());

        let result = deduplicate(vec![p1, p2]);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn tie_break_prefers_higher_citation_count() {
        let mut p1 = paper("a", "1", "T");
        p1.doi = Some("10.1/x".to_string());
        p1.citation_count = 5;
        let mut p2 = paper("b", "2", "T");
        p2.doi = Some("10.1/x".to_string());
        p2.citation_count = 50;

        let result = deduplicate(vec![p1, p2]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].source_provider, "b");
    }

    #[test]
    fn tie_break_falls_back_to_filled_field_count() {
        let mut p1 = paper("a", "1", "T");
        p1.doi = Some("10.1/x".to_string());
        let mut p2 = paper("b", "2", "T");
        p2.doi = Some("10.1/x".to_string());
        p2.abstract_text = Some("richer record".to_string());

        let result = deduplicate(vec![p1, p2]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].source_provider, "b");
    }
}
