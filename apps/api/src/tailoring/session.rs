//! Session-scoped tailoring state.
//!
//! One `TailoringSession` holds everything the pipeline produced for one
//! user session: the clean document, the arbitrage outcome with its
//! working copy and accept/reject flags, and the cost ledger.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::cost::{CostBatch, CostEvent};
use crate::models::report::DecisionReport;
use crate::models::resume::{RawCv, ResumeDocument, StructuringResult};
use crate::tailoring::decisions::{normalize_decisions, NormalizedDecisions};
use crate::tailoring::diff::{compute_resume_diff, ResumeDiff};
use crate::tailoring::ledger::{CostSession, CostSummary};
use crate::tailoring::narrative::build_narrative;
use crate::tailoring::reconcile::{Outcome, Reconciler};
use crate::tailoring::schema::coerce_document;

/// Cost information attached to an upstream result: a single event or a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CostPayload {
    // events require `name`, so they are tried first
    Event(CostEvent),
    Batch(CostBatch),
}

/// Output of the arbitrage step, as consumed by the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageResult {
    pub result: Value,
    #[serde(default)]
    pub report: Value,
    #[serde(default)]
    pub judge: Option<Value>,
    #[serde(default)]
    pub cost: Option<CostPayload>,
}

/// Arbitrage outcome plus the user's choices over it.
#[derive(Debug, Clone)]
pub struct Arbitrage {
    reconciler: Reconciler,
    report: DecisionReport,
    decisions: NormalizedDecisions,
    judge: Option<Value>,
    edit_choices: Vec<bool>,
    experience_choices: BTreeMap<usize, bool>,
}

#[derive(Debug, Clone)]
pub struct TailoringSession {
    id: Uuid,
    clean: Option<ResumeDocument>,
    /// Bumped on every `set_clean`.
    clean_generation: u64,
    raw_cv: Option<RawCv>,
    arbitrage: Option<Arbitrage>,
    cost: CostSession,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Why a session operation could not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session has no clean CV yet")]
    NoCleanDocument,

    #[error("session has no arbitrage result yet")]
    NoArbitrage,

    #[error("edit {index} out of range ({len} edits)")]
    EditOutOfRange { index: usize, len: usize },

    #[error("clean CV changed while arbitrage was running (generation {expected}, now {current})")]
    StaleCleanDocument { expected: u64, current: u64 },
}

/// Result of a toggle, reported back to the renderer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleOutcome {
    pub adapted_index: Option<usize>,
    pub applied: bool,
    pub located: bool,
}

impl ToggleOutcome {
    fn new(adapted_index: Option<usize>, outcome: Outcome) -> Self {
        Self {
            adapted_index,
            applied: outcome == Outcome::Applied,
            located: outcome != Outcome::Unresolved,
        }
    }
}

impl TailoringSession {
    pub fn new(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            clean: None,
            clean_generation: 0,
            raw_cv: None,
            arbitrage: None,
            cost: CostSession::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn clean(&self) -> Option<&ResumeDocument> {
        self.clean.as_ref()
    }

    pub fn clean_generation(&self) -> u64 {
        self.clean_generation
    }

    pub fn arbitrage(&self) -> Option<&Arbitrage> {
        self.arbitrage.as_ref()
    }

    pub fn cost(&self) -> &CostSession {
        &self.cost
    }

    pub fn cost_mut(&mut self) -> &mut CostSession {
        self.touch();
        &mut self.cost
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Replaces the clean document. Any arbitrage built on the previous one
    /// is discarded since its indices no longer refer to it.
    pub fn set_clean(&mut self, structuring: StructuringResult) {
        let clean = coerce_document(&structuring.clean_cv);
        info!(
            "Session {}: clean CV set ({} experiences)",
            self.id,
            clean.experience.len()
        );
        self.clean = Some(clean);
        self.clean_generation += 1;
        if structuring.raw_cv.is_some() {
            self.raw_cv = structuring.raw_cv;
        }
        self.arbitrage = None;
        self.touch();
    }

    /// Installs an arbitrage result: baseline and working copy, normalized
    /// decisions, all choices accepted.
    pub fn apply_arbitrage(&mut self, result: ArbitrageResult) -> Result<(), SessionError> {
        let clean = self.clean.as_ref().ok_or(SessionError::NoCleanDocument)?;
        let adapted = coerce_document(&result.result);
        let report = DecisionReport::from_value(&result.report);
        let decisions = normalize_decisions(&result.report);
        let reconciler = Reconciler::new(adapted);
        let experience_choices = initial_experience_choices(&decisions, clean, &reconciler);

        info!(
            "Session {}: arbitrage applied (kept={}, removed={}, edits={})",
            self.id,
            decisions.kept.len(),
            decisions.removed.len(),
            decisions.edits.len()
        );

        self.arbitrage = Some(Arbitrage {
            edit_choices: vec![true; decisions.edits.len()],
            experience_choices,
            reconciler,
            report,
            decisions,
            judge: result.judge,
        });
        match result.cost {
            Some(CostPayload::Batch(batch)) => {
                self.cost.merge(batch);
            }
            Some(CostPayload::Event(event)) => {
                self.cost.append(event);
            }
            None => {}
        }
        self.touch();
        Ok(())
    }

    /// Applies a result computed from clean generation `generation`;
    /// refuses it if the clean document was replaced in the meantime.
    pub fn apply_arbitrage_from(
        &mut self,
        generation: u64,
        result: ArbitrageResult,
    ) -> Result<(), SessionError> {
        if self.clean.is_some() && generation != self.clean_generation {
            return Err(SessionError::StaleCleanDocument {
                expected: generation,
                current: self.clean_generation,
            });
        }
        self.apply_arbitrage(result)
    }

    /// Attaches a judge evaluation to the current arbitrage.
    pub fn set_judge(&mut self, judge: Value) -> Result<(), SessionError> {
        let arbitrage = self.arbitrage.as_mut().ok_or(SessionError::NoArbitrage)?;
        arbitrage.judge = Some(judge);
        self.touch();
        Ok(())
    }

    /// Accepts or rejects the edit at `index` in the normalized edit list.
    pub fn toggle_edit(&mut self, index: usize, accept: bool) -> Result<ToggleOutcome, SessionError> {
        let clean = self.clean.as_ref().ok_or(SessionError::NoCleanDocument)?;
        let arbitrage = self.arbitrage.as_mut().ok_or(SessionError::NoArbitrage)?;
        let len = arbitrage.decisions.edits.len();
        let edit = arbitrage
            .decisions
            .edits
            .get(index)
            .ok_or(SessionError::EditOutOfRange { index, len })?;

        let adapted_index = arbitrage.reconciler.resolve(edit.source_index, clean);
        let outcome = arbitrage.reconciler.apply_bullet_edit(clean, edit, accept);
        arbitrage.edit_choices[index] = accept;
        debug!("Session {}: edit {index} accept={accept} -> {outcome:?}", self.id);
        self.updated_at = Utc::now();
        Ok(ToggleOutcome::new(adapted_index, outcome))
    }

    /// Accepts (restore adapted) or rejects (revert to clean) a whole
    /// experience, addressed by its clean index.
    pub fn toggle_experience(
        &mut self,
        clean_index: i64,
        accept: bool,
    ) -> Result<ToggleOutcome, SessionError> {
        let clean = self.clean.as_ref().ok_or(SessionError::NoCleanDocument)?;
        let arbitrage = self.arbitrage.as_mut().ok_or(SessionError::NoArbitrage)?;

        let (adapted_index, outcome) =
            arbitrage
                .reconciler
                .apply_experience_toggle(clean, clean_index, accept);
        if let (Some(ri), true) = (adapted_index, outcome != Outcome::Unresolved) {
            arbitrage.experience_choices.insert(ri, accept);
        }
        debug!(
            "Session {}: experience {clean_index} accept={accept} -> {outcome:?}",
            self.id
        );
        self.updated_at = Utc::now();
        Ok(ToggleOutcome::new(adapted_index, outcome))
    }

    /// Working copy back to the arbitrage baseline, every choice accepted.
    pub fn reset_choices(&mut self) -> Result<(), SessionError> {
        let clean = self.clean.as_ref().ok_or(SessionError::NoCleanDocument)?;
        let arbitrage = self.arbitrage.as_mut().ok_or(SessionError::NoArbitrage)?;
        arbitrage.reconciler.reset();
        arbitrage.edit_choices = vec![true; arbitrage.decisions.edits.len()];
        arbitrage.experience_choices =
            initial_experience_choices(&arbitrage.decisions, clean, &arbitrage.reconciler);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Drops the arbitrage outcome; the clean document and costs stay.
    pub fn reset_arbitrage(&mut self) {
        if self.arbitrage.take().is_some() {
            info!("Session {}: arbitrage reset", self.id);
        }
        self.touch();
    }

    /// Changes between the clean document and the current working copy.
    pub fn diff(&self) -> Result<ResumeDiff, SessionError> {
        let clean = self.clean.as_ref().ok_or(SessionError::NoCleanDocument)?;
        let arbitrage = self.arbitrage.as_ref().ok_or(SessionError::NoArbitrage)?;
        Ok(compute_resume_diff(clean, arbitrage.reconciler.working()))
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            clean_cv: self.clean.clone(),
            raw_cv: self.raw_cv.clone(),
            arbitrage: self.arbitrage.as_ref().map(|a| ArbitrageView {
                document: a.reconciler.working().clone(),
                baseline: a.reconciler.baseline().clone(),
                narrative: build_narrative(&a.report, &a.decisions),
                report: a.report.clone(),
                decisions: a.decisions.clone(),
                judge: a.judge.clone(),
                edit_choices: a.edit_choices.clone(),
                experience_choices: a.experience_choices.clone(),
            }),
            cost: CostSummary::from(&self.cost),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl Arbitrage {
    pub fn working(&self) -> &ResumeDocument {
        self.reconciler.working()
    }

    pub fn decisions(&self) -> &NormalizedDecisions {
        &self.decisions
    }

    pub fn edit_choices(&self) -> &[bool] {
        &self.edit_choices
    }

    pub fn experience_choices(&self) -> &BTreeMap<usize, bool> {
        &self.experience_choices
    }
}

/// Every kept experience that resolves to an adapted index starts accepted.
fn initial_experience_choices(
    decisions: &NormalizedDecisions,
    clean: &ResumeDocument,
    reconciler: &Reconciler,
) -> BTreeMap<usize, bool> {
    decisions
        .kept
        .iter()
        .filter_map(|k| reconciler.resolve(k.source_index, clean))
        .map(|ri| (ri, true))
        .collect()
}

/// Snapshot handed to the rendering layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub clean_cv: Option<ResumeDocument>,
    pub raw_cv: Option<RawCv>,
    pub arbitrage: Option<ArbitrageView>,
    pub cost: CostSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbitrageView {
    /// The reconciled working copy.
    pub document: ResumeDocument,
    pub baseline: ResumeDocument,
    pub report: DecisionReport,
    pub decisions: NormalizedDecisions,
    pub narrative: String,
    pub judge: Option<Value>,
    pub edit_choices: Vec<bool>,
    pub experience_choices: BTreeMap<usize, bool>,
}
