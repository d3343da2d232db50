//! `RealMatcher`: the decisioning half of the Matcher collaborator (spec.md
//! §4.5). Runs two independent candidate passes (sanctions, PEP) over a
//! `WatchlistSource` snapshot, scores with `similarity::token_set_score`, and
//! applies the decision precedence and confidence-band rules. Deterministic
//! and free of I/O side effects given a fixed snapshot, as the contract
//! requires — the only I/O is the `WatchlistSource` read itself, wrapped in
//! a `tokio::time::timeout` per the deadline argument.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use opcheck_types::domain::{
    Confidence, DecisionRecord, DobQuery, MatchSuggestion, Regime, RiskLevel, ScreeningInput,
    ScreeningStatus,
};
use opcheck_types::error::{Result, ScreeningError};
use opcheck_types::ports::Matcher;
use rust_decimal::Decimal;

use crate::similarity::{passes_prefilter, token_set_score};
use crate::watchlist::{WatchlistRow, WatchlistSource};

/// Default decision threshold (spec.md §4.5): a candidate below this score
/// cannot decide the outcome, only contribute to the advisory top-matches
/// list. Overridable via `RealMatcher::new`'s `match_threshold` argument
/// (config's `MATCH_THRESHOLD` env var).
pub const DEFAULT_MATCH_THRESHOLD: u32 = 75;

/// Default suggestion threshold: candidates at or above this score (but
/// possibly below the match threshold) appear in `top_matches`. Overridable
/// via `RealMatcher::new`'s `suggestion_threshold` argument (config's
/// `SUGGESTION_THRESHOLD` env var).
pub const DEFAULT_SUGGESTION_THRESHOLD: u32 = 60;

/// A single pass's best decision-grade hit, if any, plus every row that
/// cleared the suggestion threshold (for the combined top-matches list).
struct PassResult {
    decision_candidate: Option<ScoredRow>,
    suggestions: Vec<ScoredRow>,
}

struct ScoredRow {
    row: WatchlistRow,
    score: u32,
}

pub struct RealMatcher {
    watchlist: Arc<dyn WatchlistSource>,
    match_threshold: u32,
    suggestion_threshold: u32,
}

impl RealMatcher {
    /// Uses the default thresholds (spec.md §4.5). Most callers that do
    /// configure thresholds should use `with_thresholds` instead.
    pub fn new(watchlist: Arc<dyn WatchlistSource>) -> Self {
        Self::with_thresholds(
            watchlist,
            DEFAULT_MATCH_THRESHOLD,
            DEFAULT_SUGGESTION_THRESHOLD,
        )
    }

    pub fn with_thresholds(
        watchlist: Arc<dyn WatchlistSource>,
        match_threshold: u32,
        suggestion_threshold: u32,
    ) -> Self {
        Self {
            watchlist,
            match_threshold,
            suggestion_threshold,
        }
    }
}

#[async_trait]
impl Matcher for RealMatcher {
    async fn decide(&self, input: &ScreeningInput, deadline: Duration) -> Result<DecisionRecord> {
        tokio::time::timeout(deadline, self.decide_inner(input))
            .await
            .map_err(|_| ScreeningError::MatcherUnavailable("watchlist read timed out".into()))?
    }
}

impl RealMatcher {
    async fn decide_inner(&self, input: &ScreeningInput) -> Result<DecisionRecord> {
        let query_norm = crate::normalize_for_matching(&input.name);

        let sanctions_rows = self
            .watchlist
            .sanctions_candidates(input.entity_type)
            .await
            .map_err(|e| ScreeningError::MatcherUnavailable(e.to_string()))?;
        let pep_rows = self
            .watchlist
            .pep_candidates(input.entity_type)
            .await
            .map_err(|e| ScreeningError::MatcherUnavailable(e.to_string()))?;

        let sanctions_pass = score_pass(
            &query_norm,
            sanctions_rows,
            &input.dob,
            self.match_threshold,
            self.suggestion_threshold,
        );
        let pep_pass = score_pass(
            &query_norm,
            pep_rows,
            &input.dob,
            self.match_threshold,
            self.suggestion_threshold,
        );

        let pep_flag = pep_pass.decision_candidate.is_some();

        let decision = if let Some(best) = &sanctions_pass.decision_candidate {
            DecisionRecord {
                status: ScreeningStatus::FailSanction,
                risk_level: RiskLevel::HighRisk,
                confidence: Confidence::from_decision_score(Decimal::from(best.score)),
                score: Decimal::from(best.score),
                uk_sanctions_flag: best.row.regime.is_uk_scoped(),
                pep_flag,
                matched_subject: Some(best.row.subject_name.clone()),
                matched_dob: best.row.dob,
                matched_regime: Some(best.row.regime),
                sources: sources_of(&sanctions_pass, &pep_pass),
                top_matches: top_matches(&sanctions_pass, &pep_pass),
            }
        } else if let Some(best) = &pep_pass.decision_candidate {
            DecisionRecord {
                status: ScreeningStatus::FailPep,
                risk_level: RiskLevel::MediumRisk,
                confidence: Confidence::from_decision_score(Decimal::from(best.score)),
                score: Decimal::from(best.score),
                uk_sanctions_flag: false,
                pep_flag: true,
                matched_subject: Some(best.row.subject_name.clone()),
                matched_dob: best.row.dob,
                matched_regime: Some(best.row.regime),
                sources: sources_of(&sanctions_pass, &pep_pass),
                top_matches: top_matches(&sanctions_pass, &pep_pass),
            }
        } else {
            DecisionRecord {
                status: ScreeningStatus::Cleared,
                risk_level: RiskLevel::Cleared,
                confidence: Confidence::VeryHigh,
                score: Decimal::ZERO,
                uk_sanctions_flag: false,
                pep_flag: false,
                matched_subject: None,
                matched_dob: None,
                matched_regime: None,
                sources: vec![],
                top_matches: top_matches(&sanctions_pass, &pep_pass),
            }
        };

        Ok(decision)
    }
}

/// Runs one pass (sanctions or PEP) over its candidate rows: prefilter,
/// score, split into the best DOB-compatible decision candidate and the
/// full suggestion set (DOB-unfiltered, per spec.md §4.5).
fn score_pass(
    query_norm: &str,
    rows: Vec<WatchlistRow>,
    dob: &DobQuery,
    match_threshold: u32,
    suggestion_threshold: u32,
) -> PassResult {
    let mut suggestions = Vec::new();
    let mut best_decision: Option<ScoredRow> = None;

    for row in rows {
        let candidate_norm = crate::normalize_for_matching(&row.subject_name);
        if !passes_prefilter(query_norm, &candidate_norm) {
            continue;
        }
        let score = token_set_score(query_norm, &candidate_norm);

        if score >= suggestion_threshold {
            suggestions.push(ScoredRow {
                row: row.clone(),
                score,
            });
        }

        if score >= match_threshold && dob_compatible(dob, row.dob) {
            let better = best_decision
                .as_ref()
                .map(|b| score > b.score)
                .unwrap_or(true);
            if better {
                best_decision = Some(ScoredRow { row, score });
            }
        }
    }

    PassResult {
        decision_candidate: best_decision,
        suggestions,
    }
}

/// A decision candidate must be DOB-compatible with the caller's query
/// (spec.md §4.5): no query DOB admits anything; a full query DOB requires
/// an exact match; a year-only query requires the candidate's year to
/// match. A candidate with no DOB on file is compatible with any query —
/// there's nothing to contradict.
fn dob_compatible(query: &DobQuery, candidate_dob: Option<chrono::NaiveDate>) -> bool {
    match (query, candidate_dob) {
        (DobQuery::None, _) => true,
        (_, None) => true,
        (DobQuery::Full(q), Some(c)) => *q == c,
        (DobQuery::YearOnly(y), Some(c)) => *y == c.format("%Y").to_string().parse().unwrap_or(0),
    }
}

fn sources_of(sanctions: &PassResult, pep: &PassResult) -> Vec<Regime> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for candidate in sanctions
        .decision_candidate
        .iter()
        .chain(pep.decision_candidate.iter())
    {
        if seen.insert(regime_sort_key(candidate.row.regime)) {
            out.push(candidate.row.regime);
        }
    }
    out
}

fn regime_sort_key(r: Regime) -> &'static str {
    r.as_str()
}

/// Combined, score-descending top-matches list across both passes
/// (deduplicated by subject id), capped at 10 — an advisory list, not the
/// decision itself.
fn top_matches(sanctions: &PassResult, pep: &PassResult) -> Vec<MatchSuggestion> {
    let mut all: Vec<&ScoredRow> = sanctions
        .suggestions
        .iter()
        .chain(pep.suggestions.iter())
        .collect();
    all.sort_by(|a, b| b.score.cmp(&a.score));

    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for scored in all {
        if !seen.insert(scored.row.subject_id.clone()) {
            continue;
        }
        out.push(MatchSuggestion {
            name: scored.row.subject_name.clone(),
            score: Decimal::from(scored.score),
            regime: Some(scored.row.regime),
        });
        if out.len() == 10 {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watchlist::StaticWatchlist;
    use opcheck_types::domain::EntityType;
    use opcheck_types::reason::ReasonForCheck;

    fn row(id: &str, name: &str, regime: Regime, dob: Option<chrono::NaiveDate>) -> WatchlistRow {
        WatchlistRow {
            subject_id: id.to_string(),
            subject_name: name.to_string(),
            entity_type: EntityType::Person,
            dob,
            regime,
        }
    }

    fn input(name: &str, dob: DobQuery) -> ScreeningInput {
        ScreeningInput {
            name: name.to_string(),
            dob,
            entity_type: EntityType::Person,
            requestor: "u1".to_string(),
            reason: ReasonForCheck::ClientOnboarding,
            business_reference: "CASE-1".to_string(),
            search_backend: None,
        }
    }

    #[tokio::test]
    async fn clears_when_no_candidate_passes_threshold() {
        let watchlist = StaticWatchlist {
            sanctions: vec![row("s1", "Zzyzx Qorvus", Regime::Ofac, None)],
            peps: vec![],
        };
        let matcher = RealMatcher::new(Arc::new(watchlist));
        let decision = matcher
            .decide(&input("Jane Doe", DobQuery::None), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(decision.status, ScreeningStatus::Cleared);
        assert_eq!(decision.risk_level, RiskLevel::Cleared);
    }

    #[tokio::test]
    async fn sanctions_take_precedence_over_pep() {
        let watchlist = StaticWatchlist {
            sanctions: vec![row("s1", "Jane Doe", Regime::Un, None)],
            peps: vec![row("p1", "Jane Doe", Regime::ConsolidatedPep, None)],
        };
        let matcher = RealMatcher::new(Arc::new(watchlist));
        let decision = matcher
            .decide(&input("Jane Doe", DobQuery::None), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(decision.status, ScreeningStatus::FailSanction);
        assert_eq!(decision.risk_level, RiskLevel::HighRisk);
        assert!(decision.pep_flag, "concurrent PEP match should still flag");
    }

    #[tokio::test]
    async fn pep_only_match_yields_fail_pep() {
        let watchlist = StaticWatchlist {
            sanctions: vec![],
            peps: vec![row("p1", "Jane Doe", Regime::ConsolidatedPep, None)],
        };
        let matcher = RealMatcher::new(Arc::new(watchlist));
        let decision = matcher
            .decide(&input("Jane Doe", DobQuery::None), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(decision.status, ScreeningStatus::FailPep);
        assert_eq!(decision.risk_level, RiskLevel::MediumRisk);
    }

    #[tokio::test]
    async fn uk_scoped_regime_sets_uk_flag() {
        let watchlist = StaticWatchlist {
            sanctions: vec![row("s1", "Jane Doe", Regime::HmTreasury, None)],
            peps: vec![],
        };
        let matcher = RealMatcher::new(Arc::new(watchlist));
        let decision = matcher
            .decide(&input("Jane Doe", DobQuery::None), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(decision.uk_sanctions_flag);
    }

    #[tokio::test]
    async fn mismatched_full_dob_excludes_from_decision_but_not_suggestions() {
        let dob = chrono::NaiveDate::from_ymd_opt(1975, 1, 1).unwrap();
        let watchlist = StaticWatchlist {
            sanctions: vec![row("s1", "Jane Doe", Regime::Un, Some(dob))],
            peps: vec![],
        };
        let matcher = RealMatcher::new(Arc::new(watchlist));
        let query_dob = DobQuery::Full(chrono::NaiveDate::from_ymd_opt(1980, 5, 1).unwrap());
        let decision = matcher
            .decide(&input("Jane Doe", query_dob), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(decision.status, ScreeningStatus::Cleared);
        assert_eq!(decision.top_matches.len(), 1, "still an advisory suggestion");
    }

    #[tokio::test]
    async fn year_only_dob_matches_candidate_year() {
        let dob = chrono::NaiveDate::from_ymd_opt(1980, 11, 3).unwrap();
        let watchlist = StaticWatchlist {
            sanctions: vec![row("s1", "Jane Doe", Regime::Un, Some(dob))],
            peps: vec![],
        };
        let matcher = RealMatcher::new(Arc::new(watchlist));
        let decision = matcher
            .decide(&input("Jane Doe", DobQuery::YearOnly(1980)), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(decision.status, ScreeningStatus::FailSanction);
    }

    #[tokio::test]
    async fn configured_thresholds_override_defaults() {
        // "Jane Doe" vs "Jane Doi" scores well above 60 but likely below the
        // default 75 match threshold; tightening it to 99 should push the
        // decision back to Cleared even though it would normally match.
        let watchlist = StaticWatchlist {
            sanctions: vec![row("s1", "Jane Doi", Regime::Un, None)],
            peps: vec![],
        };
        let matcher = RealMatcher::with_thresholds(Arc::new(watchlist), 99, 60);
        let decision = matcher
            .decide(&input("Jane Doe", DobQuery::None), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(decision.status, ScreeningStatus::Cleared);
        assert_eq!(decision.top_matches.len(), 1, "still surfaces as a suggestion");
    }

    #[tokio::test]
    async fn deadline_exceeded_maps_to_matcher_unavailable() {
        struct SlowWatchlist;
        #[async_trait]
        impl WatchlistSource for SlowWatchlist {
            async fn sanctions_candidates(
                &self,
                _entity_type: EntityType,
            ) -> Result<Vec<WatchlistRow>> {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(vec![])
            }
            async fn pep_candidates(&self, _entity_type: EntityType) -> Result<Vec<WatchlistRow>> {
                Ok(vec![])
            }
        }
        let matcher = RealMatcher::new(Arc::new(SlowWatchlist));
        let err = matcher
            .decide(&input("Jane Doe", DobQuery::None), Duration::from_millis(1))
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 503);
    }
}
