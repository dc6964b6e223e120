use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::fields::{first_present, non_blank, sequence, text};

/// Keyword coverage of the job description by the adapted résumé.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JdCoverage {
    pub matched_keywords: Vec<String>,
    pub missing_keywords: Vec<String>,
    pub partial_matches: Vec<String>,
}

/// Arbitrage report. `decisions` stays raw: its shape varies between model
/// runs and is only read through the decision normalizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecisionReport {
    pub fit_score: Option<f64>,
    pub jd_coverage: JdCoverage,
    pub decisions: Value,
    pub warnings: Vec<String>,
    pub narrative: Option<String>,
    pub summary: Option<String>,
}

impl DecisionReport {
    /// Reads a report from arbitrary JSON. Never fails; unknown shapes
    /// degrade to defaults.
    pub fn from_value(value: &Value) -> Self {
        let fit_score = first_present(value, &["fitScore", "fit_score"])
            .and_then(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            })
            .filter(|f| f.is_finite())
            .map(|f| f.clamp(0.0, 100.0));

        let coverage = first_present(value, &["jdCoverage", "jd_coverage"]);
        let keywords = |keys: &[&str]| -> Vec<String> {
            coverage
                .and_then(|c| first_present(c, keys))
                .map(|list| sequence(list).into_iter().filter_map(keyword_label).collect())
                .unwrap_or_default()
        };
        let jd_coverage = JdCoverage {
            matched_keywords: keywords(&["matchedKeywords", "matched_keywords"]),
            missing_keywords: keywords(&["missingKeywords", "missing_keywords"]),
            partial_matches: keywords(&["partialMatches", "partial_matches"]),
        };

        let warnings = first_present(value, &["warnings"])
            .map(|w| {
                sequence(w)
                    .into_iter()
                    .map(|item| text(item).trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        DecisionReport {
            fit_score,
            jd_coverage,
            decisions: first_present(value, &["decisions"])
                .cloned()
                .unwrap_or(Value::Null),
            warnings,
            narrative: non_blank(value, &["narrative"]),
            summary: non_blank(value, &["summary"]),
        }
    }
}

/// Keyword items come either as plain strings or as `{term|keyword}` objects.
fn keyword_label(item: &Value) -> Option<String> {
    let label = match item {
        Value::Object(_) => non_blank(item, &["term", "keyword"]).unwrap_or_default(),
        other => text(other).trim().to_string(),
    };
    (!label.is_empty()).then_some(label)
}
