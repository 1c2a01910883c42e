//! Within-arm stochastic re-ranking
//!
//! Once the bandit has committed to an arm, always surfacing that arm's
//! single highest-similarity item would show every user the same content.
//! Instead the candidates sharing the chosen arm are sorted by similarity
//! and the final pick is drawn uniformly from the top few, adding variety
//! without touching the arm-level learning signal.

use crate::genre::Candidate;
use rand::Rng;

/// How many of the arm's best candidates stay in the draw
const TOP_N: usize = 5;

/// Re-rank within the selected candidate's arm
///
/// Returns the index (into `candidates`) of the final pick: a uniform draw
/// among the top `TOP_N` same-arm candidates by `similarity_score`. When
/// the arm has a single member, the bandit's pick stands unchanged.
pub fn rerank_within_arm(candidates: &[Candidate], selected_idx: usize) -> usize {
    let selected = match candidates.get(selected_idx) {
        Some(c) => c,
        None => return selected_idx,
    };
    let arm = selected.arm();

    let mut arm_members: Vec<(usize, f64)> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.arm() == arm)
        .map(|(i, c)| (i, c.similarity_score))
        .collect();

    if arm_members.len() <= 1 {
        return selected_idx;
    }

    arm_members.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let top = &arm_members[..arm_members.len().min(TOP_N)];

    let pick = rand::thread_rng().gen_range(0..top.len());
    top[pick].0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genre::Domain;

    fn movie(id: &str, genre: &str, similarity: f64) -> Candidate {
        Candidate::new(Domain::Movie, id, genre).with_similarity(similarity)
    }

    #[test]
    fn test_single_member_arm_keeps_bandit_pick() {
        let candidates = vec![movie("a", "Drama", 0.9), movie("b", "Comedy", 0.8)];
        assert_eq!(rerank_within_arm(&candidates, 0), 0);
    }

    #[test]
    fn test_pick_stays_within_chosen_arm() {
        let candidates = vec![
            movie("d1", "Drama", 0.9),
            movie("c1", "Comedy", 0.99),
            movie("d2", "Drama", 0.8),
            movie("d3", "Drama", 0.7),
        ];
        for _ in 0..50 {
            let idx = rerank_within_arm(&candidates, 0);
            assert_ne!(idx, 1, "picked a candidate outside the drama arm");
        }
    }

    #[test]
    fn test_draw_limited_to_top_five_by_similarity() {
        // Seven drama candidates; the two weakest must never be drawn.
        let candidates: Vec<Candidate> = (0..7)
            .map(|i| movie(&format!("d{}", i), "Drama", 1.0 - i as f64 * 0.1))
            .collect();
        for _ in 0..200 {
            let idx = rerank_within_arm(&candidates, 0);
            assert!(idx < 5, "drew a below-top-5 candidate: {}", idx);
        }
    }

    #[test]
    fn test_draw_varies_across_calls() {
        let candidates: Vec<Candidate> = (0..5)
            .map(|i| movie(&format!("d{}", i), "Drama", 0.5))
            .collect();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(rerank_within_arm(&candidates, 0));
        }
        assert!(seen.len() > 1, "re-ranking never varied its pick");
    }

    #[test]
    fn test_out_of_range_index_is_returned_unchanged() {
        let candidates = vec![movie("a", "Drama", 0.9)];
        assert_eq!(rerank_within_arm(&candidates, 9), 9);
    }
}
