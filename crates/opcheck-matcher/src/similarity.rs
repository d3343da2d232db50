//! Two-stage name similarity: a cheap prefilter (first-letter / length
//! bucket) standing in for the teacher's Postgres `pg_trgm` stage since a
//! watchlist snapshot here is a read port rather than a live table, followed
//! by `strsim::jaro_winkler` ranking on a token-set normalization, scaled to
//! `[0, 100]`.

use std::collections::BTreeSet;

/// A candidate survives the prefilter only if some token of the query shares
/// a first letter with some token of the candidate, and the overall length
/// is within a generous bound — cheap enough to run over an entire snapshot
/// before the more expensive token-set scoring below. The first-letter check
/// is per-token (not on the raw strings) so token-reordered names ("Doe
/// Jane" vs "Jane Doe") still pass; the token-set scorer below is what's
/// actually meant to catch those.
pub fn passes_prefilter(query_norm: &str, candidate_norm: &str) -> bool {
    if query_norm.is_empty() || candidate_norm.is_empty() {
        return false;
    }
    let tokens_q: Vec<&str> = query_norm.split_whitespace().collect();
    let tokens_c: Vec<&str> = candidate_norm.split_whitespace().collect();
    let shares_a_first_letter = tokens_q.iter().any(|tq| {
        tokens_c
            .iter()
            .any(|tc| tq.chars().next() == tc.chars().next())
    });
    let len_q = query_norm.chars().count() as i64;
    let len_c = candidate_norm.chars().count() as i64;
    let len_close = (len_q - len_c).abs() <= (len_q.max(len_c) / 2).max(4);
    shares_a_first_letter && len_close
}

/// Token-set similarity in `[0, 100]` (spec.md §4.5). Mirrors the
/// `fuzzywuzzy`-style token-set ratio: split both strings into unique sorted
/// token sets, score the shared-token core against each side's leftover
/// tokens and against the raw strings, and take the best of those Jaro-
/// Winkler scores. This is stable under word reordering and partial-name
/// matches ("Doe Jane" vs "Jane Doe") in a way that a plain Jaro-Winkler
/// over the raw strings is not.
pub fn token_set_score(a: &str, b: &str) -> u32 {
    let tokens_a = token_set(a);
    let tokens_b = token_set(b);

    let intersection: BTreeSet<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let only_a: BTreeSet<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let only_b: BTreeSet<&str> = tokens_b.difference(&tokens_a).copied().collect();

    let sorted_intersection = join(&intersection);
    let combined_a = join(&intersection.union(&only_a).copied().collect());
    let combined_b = join(&intersection.union(&only_b).copied().collect());

    let candidates = [
        jaro_winkler_pct(&sorted_intersection, &combined_a),
        jaro_winkler_pct(&sorted_intersection, &combined_b),
        jaro_winkler_pct(&combined_a, &combined_b),
        jaro_winkler_pct(a, b),
    ];

    candidates.into_iter().max().unwrap_or(0)
}

fn token_set(s: &str) -> BTreeSet<&str> {
    s.split_whitespace().filter(|t| !t.is_empty()).collect()
}

fn join(tokens: &BTreeSet<&str>) -> String {
    tokens.iter().copied().collect::<Vec<_>>().join(" ")
}

fn jaro_winkler_pct(a: &str, b: &str) -> u32 {
    if a.is_empty() && b.is_empty() {
        return 100;
    }
    (strsim::jaro_winkler(a, b) * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_names_score_100() {
        assert_eq!(token_set_score("jane doe", "jane doe"), 100);
    }

    #[test]
    fn reordered_tokens_score_high() {
        let score = token_set_score("jane doe", "doe jane");
        assert_eq!(score, 100);
    }

    #[test]
    fn unrelated_names_score_low() {
        let score = token_set_score("jane doe", "mohammed al rashid");
        assert!(score < 50, "expected low score, got {score}");
    }

    #[test]
    fn prefilter_rejects_different_first_letter() {
        assert!(!passes_prefilter("jane doe", "kara smith"));
    }

    #[test]
    fn prefilter_rejects_wildly_different_length() {
        assert!(!passes_prefilter("jo", "jonathan alexander worthington iii"));
    }

    #[test]
    fn prefilter_accepts_close_candidate() {
        assert!(passes_prefilter("jane doe", "jane doo"));
    }

    #[test]
    fn prefilter_accepts_reordered_tokens() {
        assert!(passes_prefilter("doe jane", "jane doe"));
    }
}
