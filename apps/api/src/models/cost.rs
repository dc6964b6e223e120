use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Token usage reported by one pipeline step. Missing counts read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens: Some(prompt_tokens),
            completion_tokens: Some(completion_tokens),
            total_tokens: Some(prompt_tokens.saturating_add(completion_tokens)),
        }
    }

    /// Explicit total, else prompt + completion. Saturates at `u64::MAX`.
    pub fn effective_total(&self) -> u64 {
        self.total_tokens.unwrap_or_else(|| {
            self.prompt_tokens
                .unwrap_or(0)
                .saturating_add(self.completion_tokens.unwrap_or(0))
        })
    }
}

/// One priced pipeline step (structuring, arbitrage, judge, OCR...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostEvent {
    pub name: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub usage: TokenUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// Several events reported together by one upstream call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBatch {
    #[serde(default)]
    pub steps: Vec<CostEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostTotals {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// USD per million tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub in_per_mtok: f64,
    pub out_per_mtok: f64,
}

impl ModelPricing {
    pub fn new(in_per_mtok: f64, out_per_mtok: f64) -> Self {
        Self {
            in_per_mtok,
            out_per_mtok,
        }
    }

    /// Price of a usage record, rounded to 6 decimals.
    pub fn cost_of(&self, usage: &TokenUsage) -> f64 {
        let input = usage.prompt_tokens.unwrap_or(0) as f64 * self.in_per_mtok / 1_000_000.0;
        let output = usage.completion_tokens.unwrap_or(0) as f64 * self.out_per_mtok / 1_000_000.0;
        ((input + output) * 1_000_000.0).round() / 1_000_000.0
    }

    /// Builds a priced event for a step the service ran itself.
    pub fn price_event(&self, name: &str, model: &str, usage: TokenUsage) -> CostEvent {
        CostEvent {
            name: name.to_string(),
            model: model.to_string(),
            cost_usd: Some(self.cost_of(&usage)),
            usage,
            currency: Some("USD".to_string()),
        }
    }
}

/// Per-model pricing with a default for unknown models.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PricingTable {
    pub default: ModelPricing,
    pub per_model: HashMap<String, ModelPricing>,
}

impl PricingTable {
    pub fn for_model(&self, model: &str) -> ModelPricing {
        self.per_model.get(model).copied().unwrap_or(self.default)
    }
}
