//! Experience Matcher — resolves an index into the clean document to an
//! index into the adapted document.
//!
//! Experiences carry no stable identity across the two documents, so the
//! match is a weighted field-equality score:
//! company +2, title +2, location +1 (normalized, non-empty only).
//! When nothing scores, the clean index is reused as a positional guess,
//! clamped to the adapted list.

use crate::models::resume::{Experience, ResumeDocument};

const COMPANY_WEIGHT: u32 = 2;
const TITLE_WEIGHT: u32 = 2;
const LOCATION_WEIGHT: u32 = 1;
const MIN_MATCH_SCORE: u32 = 1;

/// Lowercases, collapses every non-alphanumeric run to one space, trims.
pub fn normalize_key(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;
    for c in s.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }
    out
}

/// Similarity score between a clean experience and an adapted candidate.
pub fn match_score(source: &Experience, candidate: &Experience) -> u32 {
    let field = |a: &str, b: &str, weight: u32| {
        let a = normalize_key(a);
        if !a.is_empty() && a == normalize_key(b) {
            weight
        } else {
            0
        }
    };
    field(&candidate.company, &source.company, COMPANY_WEIGHT)
        + field(&candidate.title, &source.title, TITLE_WEIGHT)
        + field(&candidate.location, &source.location, LOCATION_WEIGHT)
}

/// Maps `clean_index` (into `clean.experience`) to the best index into
/// `adapted.experience`.
///
/// Returns `None` when the clean experience does not exist or the adapted
/// document has no experiences. Ties go to the lowest index.
pub fn match_index(
    clean_index: i64,
    clean: &ResumeDocument,
    adapted: &ResumeDocument,
) -> Option<usize> {
    let clean_index = usize::try_from(clean_index).ok()?;
    let source = clean.experience.get(clean_index)?;
    let candidates = &adapted.experience;
    if candidates.is_empty() {
        return None;
    }

    let mut best: Option<(usize, u32)> = None;
    for (j, candidate) in candidates.iter().enumerate() {
        let score = match_score(source, candidate);
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((j, score));
        }
    }

    match best {
        Some((j, score)) if score >= MIN_MATCH_SCORE => Some(j),
        _ => Some(clean_index.min(candidates.len() - 1)),
    }
}
