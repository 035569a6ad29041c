//! Dispatch helpers for the five aggregation strategies (spec.md §4.6).

use crate::domain::{Paper, Strategy};
use std::cmp::Ordering;

/// Whether `strategy` should cancel outstanding provider calls once one
/// candidate result is available.
#[must_use]
pub fn short_circuits(strategy: Strategy) -> bool {
    matches!(strategy, Strategy::First | Strategy::Fastest)
}

/// Whether `strategy` dispatches to every eligible provider concurrently
/// (as opposed to one-at-a-time or single-pick).
#[must_use]
pub fn fans_out_concurrently(strategy: Strategy) -> bool {
    matches!(strategy, Strategy::Merge | Strategy::Fastest | Strategy::BestQuality)
}

/// `BestQuality`: stable sort merged papers by the adapter-computed quality
/// score descending (spec.md §4.6: "the core does not recompute it but does
/// use it as a tie-break in dedup"), and truncate to `limit`. Ties keep
/// arrival order (stable sort), matching spec.md §5's ordering guarantee.
pub fn rank_and_truncate(mut papers: Vec<Paper>, limit: usize) -> Vec<Paper> {
    papers.sort_by(|a, b| {
        b.quality_score
            .partial_cmp(&a.quality_score)
            .unwrap_or(Ordering::Equal)
    });
    papers.truncate(limit);
    papers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(citations: u64) -> Paper {
        let mut p = Paper::new("a", citations.to_string(), "T");
        p.citation_count = citations;
        p.finalize_quality_score();
        p
    }

    #[test]
    fn rank_and_truncate_orders_by_quality_score_desc() {
        let papers = vec![paper(1), paper(50), paper(10)];
        let ranked = rank_and_truncate(papers, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].citation_count, 50);
        assert_eq!(ranked[1].citation_count, 10);
    }

    #[test]
    fn short_circuits_only_for_first_and_fastest() {
        assert!(short_circuits(Strategy::First));
        assert!(short_circuits(Strategy::Fastest));
        assert!(!short_circuits(Strategy::Merge));
        assert!(!short_circuits(Strategy::BestQuality));
        assert!(!short_circuits(Strategy::RoundRobin));
    }
}
