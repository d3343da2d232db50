//! Entity Key Deriver (spec.md §4.1): a pure, total function from
//! `(display_name, entity_type, dob)` to a stable 256-bit fingerprint.
//!
//! Stability is the whole point: the same logical identity must hash the
//! same way across processes and releases, regardless of whitespace,
//! capitalization, accents, or which ISO-ish date form the caller used.

use chrono::NaiveDate;
use opcheck_types::domain::{DobQuery, EntityType};
use opcheck_types::EntityFingerprint;
use sha2::{Digest, Sha256};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::{Result, ScreeningError};

/// Date forms accepted by `normalize_dob`, tried in order. Locale-agnostic:
/// no "first numeric group is the month" guessing beyond these fixed forms.
const DOB_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%Y/%m/%d", "%d/%m/%Y"];

/// Fold Unicode NFKD, strip combining marks, drop punctuation, lowercase,
/// collapse internal whitespace. Leading/trailing whitespace is removed by
/// the final `split_whitespace` join.
pub fn normalize_name(name: &str) -> String {
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

/// Render as `YYYY-MM-DD` if parseable under any recognized form, else the
/// empty string. A bare 4-digit year is accepted as year-only and rendered
/// as `YYYY` (not padded to a fake month/day — the DOB constraint in the
/// Matcher treats year-only specially, see opcheck-matcher).
pub fn normalize_dob(dob: Option<&str>) -> String {
    let Some(raw) = dob.map(str::trim).filter(|s| !s.is_empty()) else {
        return String::new();
    };

    if raw.len() == 4 && raw.chars().all(|c| c.is_ascii_digit()) {
        return raw.to_string();
    }

    for fmt in DOB_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date.format("%Y-%m-%d").to_string();
        }
    }

    String::new()
}

/// Parse a DOB string into a `NaiveDate` when it denotes a full date (not a
/// bare year). Used by the dispatcher/store to populate `EvidenceRow::date_of_birth`.
pub fn parse_full_dob(dob: Option<&str>) -> Option<NaiveDate> {
    let raw = dob.map(str::trim).filter(|s| !s.is_empty())?;
    DOB_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Parse a DOB string into the three-way `DobQuery` the Matcher's DOB
/// constraint (spec.md §4.5) needs: absent, a full date, or a bare year.
/// An unparseable, non-empty string normalizes to `DobQuery::None` — the
/// same "garbage DOB behaves like no DOB" rule `normalize_dob` applies to
/// fingerprinting.
pub fn parse_dob_query(dob: Option<&str>) -> DobQuery {
    let Some(raw) = dob.map(str::trim).filter(|s| !s.is_empty()) else {
        return DobQuery::None;
    };
    if raw.len() == 4 && raw.chars().all(|c| c.is_ascii_digit()) {
        return raw
            .parse()
            .map(DobQuery::YearOnly)
            .unwrap_or(DobQuery::None);
    }
    parse_full_dob(Some(raw))
        .map(DobQuery::Full)
        .unwrap_or(DobQuery::None)
}

/// Derive the stable fingerprint for a screening identity.
///
/// Fails with `InvalidInput` only when `display_name` is empty after
/// normalization (spec.md §4.1).
pub fn fingerprint(
    display_name: &str,
    entity_type: EntityType,
    dob: Option<&str>,
) -> Result<EntityFingerprint> {
    let normalized_name = normalize_name(display_name);
    if normalized_name.is_empty() {
        return Err(ScreeningError::invalid(
            "name",
            "display name is empty after normalization",
        ));
    }

    let normalized_dob = normalize_dob(dob);
    let material = format!(
        "{}|{}|{}",
        normalized_name,
        entity_type.as_str().to_lowercase(),
        normalized_dob
    );

    let mut hasher = Sha256::new();
    hasher.update(material.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    Ok(EntityFingerprint::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_under_whitespace_and_case() {
        let a = fingerprint("Jane Doe", EntityType::Person, Some("1980-05-01")).unwrap();
        let b = fingerprint("  jane   doe  ", EntityType::Person, Some("1980-05-01")).unwrap();
        let c = fingerprint("JANE DOE", EntityType::Person, Some("1980-05-01")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn stable_under_accent_folding() {
        let a = fingerprint("Jose Garcia", EntityType::Person, None).unwrap();
        let b = fingerprint("José García", EntityType::Person, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn stable_under_recognized_dob_forms() {
        let a = fingerprint("Jane Doe", EntityType::Person, Some("1980-05-01")).unwrap();
        let b = fingerprint("Jane Doe", EntityType::Person, Some("01-05-1980")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_entity_type_differs() {
        let a = fingerprint("Acme", EntityType::Person, None).unwrap();
        let b = fingerprint("Acme", EntityType::Organization, None).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_name_after_normalization_is_invalid() {
        let err = fingerprint("   ...   ", EntityType::Person, None).unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn unparseable_dob_normalizes_to_empty_not_an_error() {
        let with_garbage = fingerprint("Jane Doe", EntityType::Person, Some("not-a-date")).unwrap();
        let with_none = fingerprint("Jane Doe", EntityType::Person, None).unwrap();
        assert_eq!(with_garbage, with_none);
    }

    #[test]
    fn year_only_dob_is_stable_but_distinct_from_full_date() {
        let year = fingerprint("Jane Doe", EntityType::Person, Some("1980")).unwrap();
        let full = fingerprint("Jane Doe", EntityType::Person, Some("1980-05-01")).unwrap();
        assert_ne!(year, full);
        let year2 = fingerprint("Jane Doe", EntityType::Person, Some("1980")).unwrap();
        assert_eq!(year, year2);
    }

    #[test]
    fn dob_query_distinguishes_absent_year_only_and_full() {
        assert_eq!(parse_dob_query(None), DobQuery::None);
        assert_eq!(parse_dob_query(Some("garbage")), DobQuery::None);
        assert_eq!(parse_dob_query(Some("1980")), DobQuery::YearOnly(1980));
        assert_eq!(
            parse_dob_query(Some("1980-05-01")),
            DobQuery::Full(NaiveDate::from_ymd_opt(1980, 5, 1).unwrap())
        );
    }
}
