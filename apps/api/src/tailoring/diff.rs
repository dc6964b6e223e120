//! Résumé diff — what changed between two documents (typically the clean
//! document and the user's working copy).

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::models::resume::{Experience, ResumeDocument};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletChanges {
    /// Index into `before.experience`.
    pub before_index: usize,
    /// Index into `after.experience`.
    pub after_index: usize,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListChanges {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl ListChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeDiff {
    pub kept_experiences: Vec<usize>,
    pub removed_experiences: Vec<usize>,
    pub added_experiences: Vec<usize>,
    pub bullet_changes: Vec<BulletChanges>,
    pub personal: Vec<FieldChange>,
    pub summary: Option<FieldChange>,
    pub skills: ListChanges,
}

fn norm(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn signature(e: &Experience) -> String {
    [
        norm(&e.company),
        norm(&e.title),
        norm(e.start_date.as_deref().unwrap_or_default()),
        norm(e.end_date.as_deref().unwrap_or_default()),
    ]
    .join("|")
}

fn list_changes(before: &[String], after: &[String]) -> ListChanges {
    let before_set: HashSet<String> = before.iter().map(|s| norm(s)).collect();
    let after_set: HashSet<String> = after.iter().map(|s| norm(s)).collect();
    ListChanges {
        added: after
            .iter()
            .filter(|s| !before_set.contains(&norm(s)))
            .cloned()
            .collect(),
        removed: before
            .iter()
            .filter(|s| !after_set.contains(&norm(s)))
            .cloned()
            .collect(),
    }
}

/// Experiences are paired by normalized company/title/dates; everything
/// else is compared field by field, ignoring case and whitespace. Bullets
/// count as changed when their joined text differs, so a reorder shows up
/// with empty `added`/`removed`.
pub fn compute_resume_diff(before: &ResumeDocument, after: &ResumeDocument) -> ResumeDiff {
    let mut diff = ResumeDiff::default();

    // duplicate signatures resolve to the last occurrence
    let after_by_sig: HashMap<String, usize> = after
        .experience
        .iter()
        .enumerate()
        .map(|(i, e)| (signature(e), i))
        .collect();
    let before_sigs: HashSet<String> = before.experience.iter().map(signature).collect();

    for (bi, e) in before.experience.iter().enumerate() {
        match after_by_sig.get(&signature(e)) {
            Some(&ai) => {
                diff.kept_experiences.push(bi);
                let after_bullets = &after.experience[ai].bullets;
                if norm(&e.bullets.join("\n")) != norm(&after_bullets.join("\n")) {
                    let changes = list_changes(&e.bullets, after_bullets);
                    diff.bullet_changes.push(BulletChanges {
                        before_index: bi,
                        after_index: ai,
                        added: changes.added,
                        removed: changes.removed,
                    });
                }
            }
            None => diff.removed_experiences.push(bi),
        }
    }
    diff.added_experiences = after
        .experience
        .iter()
        .enumerate()
        .filter(|(_, e)| !before_sigs.contains(&signature(e)))
        .map(|(i, _)| i)
        .collect();

    let (bp, ap) = (&before.personal, &after.personal);
    diff.personal = [
        ("fullName", &bp.full_name, &ap.full_name),
        ("email", &bp.email, &ap.email),
        ("phone", &bp.phone, &ap.phone),
        ("location", &bp.location, &ap.location),
    ]
    .into_iter()
    .filter(|(_, b, a)| norm(b) != norm(a))
    .map(|(field, b, a)| FieldChange {
        field: field.to_string(),
        before: b.clone(),
        after: a.clone(),
    })
    .collect();

    if norm(&before.summary) != norm(&after.summary) {
        diff.summary = Some(FieldChange {
            field: "summary".to_string(),
            before: before.summary.clone(),
            after: after.summary.clone(),
        });
    }

    diff.skills = list_changes(&before.skills, &after.skills);
    diff
}
