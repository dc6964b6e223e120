//! Human-readable narrative for an arbitrage report.

use crate::models::report::DecisionReport;
use crate::tailoring::decisions::NormalizedDecisions;

/// The model's own narrative (or summary) when it wrote one, otherwise a
/// text assembled from the report and the normalized decisions.
pub fn build_narrative(report: &DecisionReport, decisions: &NormalizedDecisions) -> String {
    if let Some(text) = report.narrative.as_ref().or(report.summary.as_ref()) {
        return text.clone();
    }

    let mut lines = Vec::new();
    if let Some(score) = report.fit_score {
        lines.push(format!("Fit score: {}/100.", score.round() as i64));
    }
    let coverage = &report.jd_coverage;
    for (label, keywords) in [
        ("Covered keywords", &coverage.matched_keywords),
        ("Missing keywords", &coverage.missing_keywords),
        ("Partial matches", &coverage.partial_matches),
    ] {
        if !keywords.is_empty() {
            lines.push(format!("{label}: {}.", keywords.join(", ")));
        }
    }
    if !decisions.kept.is_empty() || !decisions.removed.is_empty() {
        lines.push(format!(
            "Decisions: {} experience(s) kept, {} removed.",
            decisions.kept.len(),
            decisions.removed.len()
        ));
    }
    if !decisions.edits.is_empty() {
        lines.push(format!("Bullet rewrites: {}.", decisions.edits.len()));
    }
    if !report.warnings.is_empty() {
        lines.push(format!("Warnings: {}.", report.warnings.join("; ")));
    }
    lines.join("\n")
}
