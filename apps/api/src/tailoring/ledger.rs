//! Session Cost Ledger — running token/cost totals over the pipeline steps
//! of one session.
//!
//! `totals` and `total_usd` are recomputed from `steps` on every append, so
//! the aggregate can never drift from the step log.

use serde::{Deserialize, Serialize};

use crate::models::cost::{CostBatch, CostEvent, CostTotals};

pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostSession {
    steps: Vec<CostEvent>,
    totals: CostTotals,
    total_usd: f64,
    currency: Option<String>,
}

impl CostSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[CostEvent] {
        &self.steps
    }

    pub fn totals(&self) -> CostTotals {
        self.totals
    }

    pub fn total_usd(&self) -> f64 {
        self.total_usd
    }

    /// First non-empty currency seen, `USD` until one arrives.
    pub fn currency(&self) -> &str {
        self.currency.as_deref().unwrap_or(DEFAULT_CURRENCY)
    }

    /// Appends one step. Identical steps are never merged.
    ///
    /// Totals are computed over the extended log before anything is
    /// committed; token counts saturate instead of overflowing.
    pub fn append(&mut self, event: CostEvent) -> &Self {
        let (totals, total_usd) = tally(self.steps.iter().chain(std::iter::once(&event)));
        self.adopt_currency(event.currency.as_deref());
        self.steps.push(event);
        self.totals = totals;
        self.total_usd = total_usd;
        self
    }

    /// Appends every step of a batch in order.
    pub fn merge(&mut self, batch: CostBatch) -> &Self {
        self.adopt_currency(batch.currency.as_deref());
        for event in batch.steps {
            self.append(event);
        }
        self
    }

    /// Full replace with an empty ledger.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn adopt_currency(&mut self, currency: Option<&str>) {
        if self.currency.is_some() {
            return;
        }
        if let Some(c) = currency.map(str::trim).filter(|c| !c.is_empty()) {
            self.currency = Some(c.to_string());
        }
    }
}

/// Full reduction over a step log.
fn tally<'a>(steps: impl Iterator<Item = &'a CostEvent>) -> (CostTotals, f64) {
    steps.fold((CostTotals::default(), 0.0), |(acc, usd), step| {
        let totals = CostTotals {
            prompt_tokens: acc
                .prompt_tokens
                .saturating_add(step.usage.prompt_tokens.unwrap_or(0)),
            completion_tokens: acc
                .completion_tokens
                .saturating_add(step.usage.completion_tokens.unwrap_or(0)),
            total_tokens: acc.total_tokens.saturating_add(step.usage.effective_total()),
        };
        (totals, usd + step.cost_usd.unwrap_or(0.0))
    })
}

/// Wire view of a ledger, with the currency default resolved.
#[derive(Debug, Clone, Serialize)]
pub struct CostSummary {
    pub steps: Vec<CostEvent>,
    pub totals: CostTotals,
    pub total_usd: f64,
    pub currency: String,
}

impl From<&CostSession> for CostSummary {
    fn from(session: &CostSession) -> Self {
        Self {
            steps: session.steps.clone(),
            totals: session.totals,
            total_usd: session.total_usd,
            currency: session.currency().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cost::TokenUsage;

    fn event(name: &str, prompt: u64, completion: u64, cost: f64) -> CostEvent {
        CostEvent {
            name: name.to_string(),
            model: "test-model".to_string(),
            usage: TokenUsage {
                prompt_tokens: Some(prompt),
                completion_tokens: Some(completion),
                total_tokens: None,
            },
            cost_usd: Some(cost),
            currency: None,
        }
    }

    #[test]
    fn test_two_events_sum_and_default_currency() {
        let mut ledger = CostSession::new();
        ledger.append(event("structuring", 100, 20, 0.002));
        ledger.append(event("arbitrage", 300, 50, 0.0015));

        assert!((ledger.total_usd() - 0.0035).abs() < 1e-12);
        assert_eq!(ledger.currency(), "USD");
        assert_eq!(ledger.totals().prompt_tokens, 400);
        assert_eq!(ledger.totals().completion_tokens, 70);
        assert_eq!(ledger.totals().total_tokens, 470);
    }

    #[test]
    fn test_totals_always_match_step_log() {
        let mut ledger = CostSession::new();
        let mut explicit = event("judge", 10, 5, 0.01);
        explicit.usage.total_tokens = Some(100);
        for e in [
            event("a", 1, 2, 0.1),
            explicit,
            event("a", 1, 2, 0.1),
            CostEvent {
                name: "note".to_string(),
                ..Default::default()
            },
        ] {
            ledger.append(e);
            let usd: f64 = ledger.steps().iter().filter_map(|s| s.cost_usd).sum();
            let tokens: u64 = ledger.steps().iter().map(|s| s.usage.effective_total()).sum();
            assert_eq!(ledger.total_usd(), usd);
            assert_eq!(ledger.totals().total_tokens, tokens);
        }
        assert_eq!(ledger.steps().len(), 4, "identical steps accumulate");
        assert_eq!(ledger.totals().total_tokens, 3 + 100 + 3);
    }

    #[test]
    fn test_currency_is_sticky() {
        let mut ledger = CostSession::new();
        ledger.append(event("a", 0, 0, 0.0));
        let mut eur = event("b", 0, 0, 0.0);
        eur.currency = Some("EUR".to_string());
        ledger.append(eur);
        let mut gbp = event("c", 0, 0, 0.0);
        gbp.currency = Some("GBP".to_string());
        ledger.append(gbp);
        ledger.append(event("d", 0, 0, 0.0));
        assert_eq!(ledger.currency(), "EUR");
    }

    #[test]
    fn test_merge_batch_keeps_order() {
        let mut ledger = CostSession::new();
        ledger.append(event("client_extract", 0, 0, 0.0));
        ledger.merge(CostBatch {
            steps: vec![event("structuring_ai", 10, 10, 0.001), event("judge_pdf", 5, 5, 0.002)],
            currency: Some(" ".to_string()),
        });
        let names: Vec<&str> = ledger.steps().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["client_extract", "structuring_ai", "judge_pdf"]);
        assert_eq!(ledger.currency(), "USD");
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut ledger = CostSession::new();
        ledger.append(event("a", 10, 10, 0.5));
        ledger.reset();
        assert!(ledger.steps().is_empty());
        assert_eq!(ledger.totals(), CostTotals::default());
        assert_eq!(ledger.total_usd(), 0.0);
    }

    #[test]
    fn test_summary_resolves_currency() {
        let ledger = CostSession::new();
        let summary = CostSummary::from(&ledger);
        assert_eq!(summary.currency, "USD");
        assert!(summary.steps.is_empty());
    }

    #[test]
    fn test_huge_token_counts_saturate_and_stay_consistent() {
        let mut ledger = CostSession::new();
        ledger.append(event("ocr", 20, 0, 0.5));
        ledger.append(event("client", u64::MAX, 0, 1.0));

        assert_eq!(ledger.steps().len(), 2);
        assert!((ledger.total_usd() - 1.5).abs() < 1e-12, "cost must include both steps");
        assert_eq!(ledger.totals().prompt_tokens, u64::MAX);
        assert_eq!(ledger.totals().total_tokens, u64::MAX);

        ledger.append(event("judge", u64::MAX, u64::MAX, 0.25));
        assert_eq!(ledger.steps().len(), 3);
        assert_eq!(ledger.totals().completion_tokens, u64::MAX);
        assert!((ledger.total_usd() - 1.75).abs() < 1e-12);
    }
}
