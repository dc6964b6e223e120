//! Upstream model collaborators: structuring, arbitrage and judge.
//!
//! Handlers only see the `ResumeModel` trait. `ClaudeResumeModel` is the
//! production backend; tests swap in a stub through `AppState`.

pub mod extraction;
pub mod prompts;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::errors::AppError;
use crate::llm_client::prompts::{FIDELITY_INSTRUCTION, JSON_ONLY_SYSTEM, LANGUAGE_INSTRUCTION};
use crate::llm_client::LlmClient;
use crate::models::cost::{CostEvent, PricingTable};
use crate::models::resume::ResumeDocument;
use crate::tailoring::session::{ArbitrageResult, CostPayload};

use prompts::{ARBITRAGE_PROMPT_TEMPLATE, JUDGE_PROMPT_TEMPLATE, STRUCTURE_PROMPT_TEMPLATE};

/// Raw JSON payload of one model call plus what it cost.
#[derive(Debug, Clone)]
pub struct ModelCall {
    pub payload: Value,
    pub cost: CostEvent,
}

/// The three upstream steps of the tailoring pipeline.
///
/// Carried in `AppState` as `Arc<dyn ResumeModel>`.
#[async_trait]
pub trait ResumeModel: Send + Sync {
    /// CV text → unnormalized résumé JSON.
    async fn structure(&self, cv_text: &str) -> Result<ModelCall, AppError>;

    /// Clean résumé + job description → `{result, report}`.
    async fn arbitrage(&self, clean: &ResumeDocument, jd_text: &str)
        -> Result<ModelCall, AppError>;

    /// Scores an adaptation against the job description.
    async fn judge(
        &self,
        clean: &ResumeDocument,
        adapted: &ResumeDocument,
        jd_text: &str,
    ) -> Result<ModelCall, AppError>;
}

/// Claude-backed implementation over the shared `LlmClient`.
pub struct ClaudeResumeModel {
    llm: LlmClient,
    structuring_model: String,
    arbitrage_model: String,
    judge_model: String,
    pricing: PricingTable,
}

impl ClaudeResumeModel {
    pub fn new(
        llm: LlmClient,
        structuring_model: String,
        arbitrage_model: String,
        judge_model: String,
        pricing: PricingTable,
    ) -> Self {
        Self {
            llm,
            structuring_model,
            arbitrage_model,
            judge_model,
            pricing,
        }
    }

    async fn run(&self, step: &str, model: &str, prompt: &str, system: &str) -> Result<ModelCall, AppError> {
        let (payload, usage) = self
            .llm
            .call_json::<Value>(model, prompt, system)
            .await
            .map_err(|e| AppError::Llm(format!("{step} failed: {e}")))?;
        let cost = self.pricing.for_model(model).price_event(step, model, usage);
        info!(
            "{step}: model={model} tokens={} cost_usd={:?}",
            cost.usage.effective_total(),
            cost.cost_usd
        );
        Ok(ModelCall { payload, cost })
    }
}

#[async_trait]
impl ResumeModel for ClaudeResumeModel {
    async fn structure(&self, cv_text: &str) -> Result<ModelCall, AppError> {
        let prompt = STRUCTURE_PROMPT_TEMPLATE.replace("{cv_text}", cv_text);
        let system = format!("{JSON_ONLY_SYSTEM}\n{LANGUAGE_INSTRUCTION}");
        self.run("structuring", &self.structuring_model, &prompt, &system)
            .await
    }

    async fn arbitrage(
        &self,
        clean: &ResumeDocument,
        jd_text: &str,
    ) -> Result<ModelCall, AppError> {
        let prompt = ARBITRAGE_PROMPT_TEMPLATE
            .replace("{jd_text}", jd_text)
            .replace("{clean_json}", &to_prompt_json(clean)?);
        let system = format!("{JSON_ONLY_SYSTEM}\n{LANGUAGE_INSTRUCTION}\n{FIDELITY_INSTRUCTION}");
        self.run("arbitrage", &self.arbitrage_model, &prompt, &system)
            .await
    }

    async fn judge(
        &self,
        clean: &ResumeDocument,
        adapted: &ResumeDocument,
        jd_text: &str,
    ) -> Result<ModelCall, AppError> {
        let prompt = JUDGE_PROMPT_TEMPLATE
            .replace("{jd_text}", jd_text)
            .replace("{clean_json}", &to_prompt_json(clean)?)
            .replace("{adapted_json}", &to_prompt_json(adapted)?);
        self.run("judge", &self.judge_model, &prompt, JSON_ONLY_SYSTEM)
            .await
    }
}

fn to_prompt_json(doc: &ResumeDocument) -> Result<String, AppError> {
    serde_json::to_string_pretty(doc).map_err(|e| AppError::Internal(e.into()))
}

/// Splits an arbitrage payload into the session's input shape.
///
/// Accepts `{result, report}` as well as a bare résumé with the report
/// under `report` or missing entirely.
pub fn arbitrage_result_from(call: ModelCall) -> Result<ArbitrageResult, AppError> {
    let ModelCall { mut payload, cost } = call;
    let Some(obj) = payload.as_object_mut() else {
        return Err(AppError::Llm("arbitrage returned a non-object payload".to_string()));
    };

    let report = obj.remove("report").unwrap_or(Value::Null);
    let result = match obj.remove("result") {
        Some(result) if result.is_object() => result,
        Some(_) => {
            return Err(AppError::Llm("arbitrage result is not an object".to_string()));
        }
        None if obj.contains_key("experience") => Value::Object(obj.clone()),
        None => {
            return Err(AppError::Llm("arbitrage payload has no result".to_string()));
        }
    };

    Ok(ArbitrageResult {
        result,
        report,
        judge: None,
        cost: Some(CostPayload::Event(cost)),
    })
}
