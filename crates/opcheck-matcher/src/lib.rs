//! The Matcher collaborator (spec.md §4.5): candidate filtering against a
//! watchlist snapshot, two-stage similarity scoring, and decision rules.
//! Grounded on the teacher's two-stage fuzzy search
//! (`ob-semantic-matcher::client_group_resolver`, `entity-gateway`'s tantivy
//! prefilter) generalized to "sanctions + PEP pass, decide precedence".
//!
//! Free of I/O side effects beyond the `WatchlistSource` read port; given a
//! fixed snapshot, `RealMatcher::decide` is deterministic.

pub mod decision;
pub mod similarity;
pub mod watchlist;

pub use decision::RealMatcher;
pub use watchlist::{WatchlistRow, WatchlistSource};

#[cfg(feature = "database")]
pub mod postgres_watchlist;
#[cfg(feature = "database")]
pub use postgres_watchlist::PostgresWatchlistSource;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Same fold as the EKD's `normalize_name` (NFKD, strip combining marks and
/// punctuation, collapse whitespace, lowercase) but kept local to this crate
/// rather than imported from the root binary — `opcheck-matcher` must not
/// depend back on it. Matching only needs the same fold to be *applied
/// consistently*, not to literally share code with fingerprinting.
pub(crate) fn normalize_for_matching(name: &str) -> String {
    let folded: String = name.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    let stripped: String = folded
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect();
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
