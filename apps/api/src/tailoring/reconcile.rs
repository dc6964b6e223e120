//! Reconciliation Engine — applies and reverts arbitrage changes against a
//! working copy of the adapted document.
//!
//! The baseline (the untouched arbitrage output) is never mutated, so
//! "accept adapted" can always restore pristine AI text. Every operation
//! is a best-effort no-op when its target cannot be located: the caller
//! must stay interactive even when the model output is inconsistent.

use tracing::debug;

use crate::models::resume::{sanitize_bullets, ResumeDocument, MAX_EXPERIENCE_BULLETS};
use crate::tailoring::decisions::BulletEdit;
use crate::tailoring::matcher::match_index;

/// What a reconciliation call did to the working copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    AlreadyApplied,
    /// Target experience or bullet could not be located.
    Unresolved,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciler {
    baseline: ResumeDocument,
    working: ResumeDocument,
}

impl Reconciler {
    pub fn new(adapted: ResumeDocument) -> Self {
        Self {
            working: adapted.clone(),
            baseline: adapted,
        }
    }

    pub fn baseline(&self) -> &ResumeDocument {
        &self.baseline
    }

    pub fn working(&self) -> &ResumeDocument {
        &self.working
    }

    /// Discards every user toggle.
    pub fn reset(&mut self) {
        self.working = self.baseline.clone();
    }

    /// Adapted index of the experience an edit or toggle refers to.
    pub fn resolve(&self, clean_index: Option<i64>, clean: &ResumeDocument) -> Option<usize> {
        match_index(clean_index?, clean, &self.working)
    }

    /// Accepts (`before` → `after`) or rejects (`after` → `before`) one
    /// bullet rewrite. Bullets are located by trimmed text equality.
    pub fn apply_bullet_edit(
        &mut self,
        clean: &ResumeDocument,
        edit: &BulletEdit,
        accept: bool,
    ) -> Outcome {
        let Some(ri) = self.resolve(edit.source_index, clean) else {
            debug!("bullet edit for source {:?} has no target experience", edit.source_index);
            return Outcome::Unresolved;
        };
        let Some(experience) = self.working.experience.get_mut(ri) else {
            return Outcome::Unresolved;
        };

        let position = |text: &str| {
            let text = text.trim();
            experience.bullets.iter().position(|b| b.trim() == text)
        };
        let idx_before = position(&edit.before);
        let idx_after = position(&edit.after);

        let (target, replacement, already) = if accept {
            (idx_before, &edit.after, idx_after.is_some())
        } else {
            (idx_after, &edit.before, idx_before.is_some())
        };

        match target {
            Some(i) => {
                experience.bullets[i] = replacement.clone();
                Outcome::Applied
            }
            None if already => Outcome::AlreadyApplied,
            None => {
                debug!(
                    "bullet edit for adapted experience {ri} not located (accept={accept})"
                );
                Outcome::Unresolved
            }
        }
    }

    /// Accept restores the baseline experience. Reject rebuilds it from the
    /// clean experience (company, title, location, bullets when present)
    /// while keeping the baseline dates.
    pub fn apply_experience_toggle(
        &mut self,
        clean: &ResumeDocument,
        clean_index: i64,
        accept: bool,
    ) -> (Option<usize>, Outcome) {
        let Some(ri) = self.resolve(Some(clean_index), clean) else {
            debug!("experience toggle for clean index {clean_index} unresolved");
            return (None, Outcome::Unresolved);
        };
        let (Some(base), Some(current)) =
            (self.baseline.experience.get(ri), self.working.experience.get(ri))
        else {
            return (Some(ri), Outcome::Unresolved);
        };

        let next = if accept {
            base.clone()
        } else {
            let source = usize::try_from(clean_index)
                .ok()
                .and_then(|i| clean.experience.get(i));
            let mut next = current.clone();
            if let Some(source) = source {
                if !source.company.trim().is_empty() {
                    next.company = source.company.clone();
                }
                if !source.title.trim().is_empty() {
                    next.title = source.title.clone();
                }
                if !source.location.trim().is_empty() {
                    next.location = source.location.clone();
                }
                let bullets = sanitize_bullets(&source.bullets, MAX_EXPERIENCE_BULLETS);
                if !bullets.is_empty() {
                    next.bullets = bullets;
                }
            }
            next.start_date = base.start_date.clone();
            next.end_date = base.end_date.clone();
            next
        };

        let outcome = if *current == next {
            Outcome::AlreadyApplied
        } else {
            Outcome::Applied
        };
        self.working.experience[ri] = next;
        (Some(ri), outcome)
    }
}
