//! Decision Normalizer — maps the arbitrage report's `decisions` payload,
//! whatever key spelling and container shape the model chose, into one
//! fixed `NormalizedDecisions`.
//!
//! Pure and deterministic: the same report always yields the same output,
//! which keeps accept/reject flags stable across re-renders.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::fields::{first_present, index, sequence, text_field};

const KEPT_KEYS: &[&str] = &["keptExperiences", "kept_experiences", "kept"];
const REMOVED_KEYS: &[&str] = &["removedExperiences", "removed_experiences", "removed"];
const EDIT_KEYS: &[&str] = &["bulletEdits", "bullet_edits", "edits"];

const INDEX_KEYS: &[&str] = &["sourceIndex", "index", "src"];
const REASON_KEYS: &[&str] = &["reason", "why", "rationale"];
const BEFORE_KEYS: &[&str] = &["before", "from"];
const AFTER_KEYS: &[&str] = &["after", "to"];

/// A kept or removed experience. `source_index` points into the clean document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceDecision {
    pub source_index: Option<i64>,
    pub reason: String,
}

/// A single bullet rewrite proposed for the experience at `source_index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletEdit {
    pub source_index: Option<i64>,
    pub before: String,
    pub after: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedDecisions {
    pub kept: Vec<ExperienceDecision>,
    pub removed: Vec<ExperienceDecision>,
    pub edits: Vec<BulletEdit>,
}

impl NormalizedDecisions {
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty() && self.removed.is_empty() && self.edits.is_empty()
    }
}

/// Normalizes the `decisions` object of an arbitrage report.
///
/// For each list the first present alias wins; sequences and keyed
/// mappings are both accepted. Kept/removed entries with neither an index
/// nor a reason are dropped, as are edits with empty `before` and `after`.
pub fn normalize_decisions(report: &Value) -> NormalizedDecisions {
    let decisions = first_present(report, &["decisions"]).unwrap_or(&Value::Null);
    let items = |keys: &[&str]| {
        first_present(decisions, keys)
            .map(sequence)
            .unwrap_or_default()
    };

    NormalizedDecisions {
        kept: items(KEPT_KEYS)
            .into_iter()
            .filter_map(experience_decision)
            .collect(),
        removed: items(REMOVED_KEYS)
            .into_iter()
            .filter_map(experience_decision)
            .collect(),
        edits: items(EDIT_KEYS).into_iter().filter_map(bullet_edit).collect(),
    }
}

fn experience_decision(item: &Value) -> Option<ExperienceDecision> {
    let decision = match item {
        // bare index lists, e.g. `"kept": [0, 2]`
        Value::Number(_) | Value::String(_) => ExperienceDecision {
            source_index: index(item),
            reason: String::new(),
        },
        _ => ExperienceDecision {
            source_index: source_index(item),
            reason: text_field(item, REASON_KEYS),
        },
    };
    (decision.source_index.is_some() || !decision.reason.is_empty()).then_some(decision)
}

fn bullet_edit(item: &Value) -> Option<BulletEdit> {
    let edit = BulletEdit {
        source_index: source_index(item),
        before: text_field(item, BEFORE_KEYS),
        after: text_field(item, AFTER_KEYS),
        reason: text_field(item, REASON_KEYS),
    };
    (!edit.before.is_empty() || !edit.after.is_empty()).then_some(edit)
}

fn source_index(item: &Value) -> Option<i64> {
    first_present(item, INDEX_KEYS).and_then(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(decisions: Value) -> Value {
        json!({"fitScore": 80, "decisions": decisions})
    }

    #[test]
    fn test_key_variants_normalize_identically() {
        let camel = report(json!({
            "keptExperiences": [{"sourceIndex": 0, "reason": "core match"}],
            "removedExperiences": [{"sourceIndex": 2, "reason": "unrelated"}],
            "bulletEdits": [{"sourceIndex": 0, "before": "Did X", "after": "Delivered X", "reason": "impact"}]
        }));
        let snake = report(json!({
            "kept_experiences": [{"index": "0", "why": "core match"}],
            "removed_experiences": [{"src": 2, "rationale": "unrelated"}],
            "bullet_edits": [{"src": "0", "from": "Did X", "to": "Delivered X", "why": "impact"}]
        }));
        let short = report(json!({
            "kept": {"a": {"sourceIndex": 0, "reason": "core match"}},
            "removed": [{"index": 2.0, "reason": "unrelated"}],
            "edits": [{"index": 0, "before": "Did X", "after": "Delivered X", "rationale": "impact"}]
        }));

        let expected = normalize_decisions(&camel);
        assert_eq!(expected.kept.len(), 1);
        assert_eq!(expected.removed.len(), 1);
        assert_eq!(expected.edits.len(), 1);
        assert_eq!(normalize_decisions(&snake), expected);
        assert_eq!(normalize_decisions(&short), expected);
    }

    #[test]
    fn test_first_present_alias_wins() {
        let value = report(json!({
            "keptExperiences": [{"sourceIndex": 1}],
            "kept": [{"sourceIndex": 5}, {"sourceIndex": 6}]
        }));
        let normalized = normalize_decisions(&value);
        assert_eq!(normalized.kept.len(), 1);
        assert_eq!(normalized.kept[0].source_index, Some(1));
    }

    #[test]
    fn test_null_alias_falls_through() {
        let value = report(json!({"keptExperiences": null, "kept": [{"sourceIndex": 3}]}));
        assert_eq!(normalize_decisions(&value).kept[0].source_index, Some(3));
    }

    #[test]
    fn test_entries_without_index_or_reason_are_dropped() {
        let value = report(json!({
            "keptExperiences": [
                {"sourceIndex": "abc"},
                {"reason": ""},
                {"reason": "kept for leadership"},
                null,
                {"sourceIndex": 4}
            ]
        }));
        let kept = normalize_decisions(&value).kept;
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].source_index, None);
        assert_eq!(kept[0].reason, "kept for leadership");
        assert_eq!(kept[1].source_index, Some(4));
        assert!(kept.iter().all(|k| k.source_index.is_some() || !k.reason.is_empty()));
    }

    #[test]
    fn test_edits_without_text_are_dropped() {
        let value = report(json!({
            "bulletEdits": [
                {"sourceIndex": 0, "reason": "nothing"},
                {"sourceIndex": 0, "before": "", "after": "Added bullet"}
            ]
        }));
        let edits = normalize_decisions(&value).edits;
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].after, "Added bullet");
    }

    #[test]
    fn test_bare_index_lists() {
        let value = report(json!({"kept": [0, "2"], "removed": [1]}));
        let normalized = normalize_decisions(&value);
        let kept: Vec<_> = normalized.kept.iter().map(|k| k.source_index).collect();
        assert_eq!(kept, vec![Some(0), Some(2)]);
        assert_eq!(normalized.removed[0].source_index, Some(1));
    }

    #[test]
    fn test_missing_or_malformed_decisions_yield_empty() {
        assert!(normalize_decisions(&json!({})).is_empty());
        assert!(normalize_decisions(&json!(null)).is_empty());
        assert!(normalize_decisions(&report(json!("oops"))).is_empty());
        assert!(normalize_decisions(&report(json!({"kept": 3}))).is_empty());
    }

    #[test]
    fn test_deterministic() {
        let value = report(json!({
            "kept": {"b": {"index": 1}, "a": {"index": 0}},
            "edits": [{"index": "1", "before": "x", "after": "y"}]
        }));
        assert_eq!(normalize_decisions(&value), normalize_decisions(&value));
    }
}
