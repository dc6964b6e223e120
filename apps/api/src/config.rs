use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::DEFAULT_MODEL;
use crate::models::cost::{ModelPricing, PricingTable};

/// USD per million tokens for the default Claude Sonnet model.
const DEFAULT_IN_PER_MTOK: f64 = 3.0;
const DEFAULT_OUT_PER_MTOK: f64 = 15.0;
const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub structuring_model: String,
    pub arbitrage_model: String,
    pub judge_model: String,
    /// Run the judge after every arbitrage call.
    pub judge_enabled: bool,
    /// Idle time after which a session is evicted. `None` keeps sessions
    /// until they are deleted.
    pub session_ttl: Option<Duration>,
    pub pricing: PricingTable,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let structuring_model = optional_env("STRUCTURING_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let arbitrage_model = optional_env("ARBITRAGE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let judge_model = optional_env("JUDGE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let pricing = pricing_from(
            optional_env,
            &[&structuring_model, &arbitrage_model, &judge_model],
        )?;

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            judge_enabled: optional_env("JUDGE_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            structuring_model,
            arbitrage_model,
            judge_model,
            session_ttl: session_ttl_from(optional_env("SESSION_TTL_SECS"))?,
            pricing,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Builds the pricing table from `PRICE_DEFAULT_*` and
/// `PRICE_MODEL_<KEY>_*` variables, read through `lookup`.
fn pricing_from(
    lookup: impl Fn(&str) -> Option<String>,
    models: &[&String],
) -> Result<PricingTable> {
    let price = |key: &str| -> Result<Option<f64>> {
        lookup(key)
            .map(|v| {
                v.parse::<f64>()
                    .with_context(|| format!("'{key}' must be a number, got '{v}'"))
            })
            .transpose()
    };

    let default = ModelPricing::new(
        price("PRICE_DEFAULT_IN_PER_MTOK")?.unwrap_or(DEFAULT_IN_PER_MTOK),
        price("PRICE_DEFAULT_OUT_PER_MTOK")?.unwrap_or(DEFAULT_OUT_PER_MTOK),
    );
    let mut per_model = HashMap::new();
    for model in models {
        if per_model.contains_key(model.as_str()) {
            continue;
        }
        let key = model_env_key(model);
        let input = price(&format!("PRICE_MODEL_{key}_IN_PER_MTOK"))?;
        let output = price(&format!("PRICE_MODEL_{key}_OUT_PER_MTOK"))?;
        if input.is_some() || output.is_some() {
            per_model.insert(
                model.to_string(),
                ModelPricing::new(
                    input.unwrap_or(default.in_per_mtok),
                    output.unwrap_or(default.out_per_mtok),
                ),
            );
        }
    }
    Ok(PricingTable { default, per_model })
}

/// `SESSION_TTL_SECS`, default one day; `0` disables eviction.
fn session_ttl_from(value: Option<String>) -> Result<Option<Duration>> {
    let secs = match value {
        Some(v) => v
            .parse::<u64>()
            .with_context(|| format!("SESSION_TTL_SECS must be a number of seconds, got '{v}'"))?,
        None => DEFAULT_SESSION_TTL_SECS,
    };
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

/// `1`, `true`, `yes`, `on` (any case) enable a flag; anything else disables it.
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Model id as an env var fragment: `claude-sonnet-4-5` → `CLAUDE_SONNET_4_5`.
fn model_env_key(model: &str) -> String {
    let mut key = String::with_capacity(model.len());
    for c in model.chars() {
        if c.is_ascii_alphanumeric() {
            key.push(c.to_ascii_uppercase());
        } else if !key.ends_with('_') {
            key.push('_');
        }
    }
    key.trim_matches('_').to_string()
}
