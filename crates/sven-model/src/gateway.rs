// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Logical role a model invocation plays within a run. Each task may be
/// bound to a different provider/model so, e.g., planning can use a larger
/// reasoning model while routine tool-calling uses a faster one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LLMTask {
    Planner,
    Programmer,
    Reviewer,
    Router,
    Summarizer,
}

impl LLMTask {
    pub fn env_suffix(&self) -> &'static str {
        match self {
            LLMTask::Planner => "PLANNER",
            LLMTask::Programmer => "PROGRAMMER",
            LLMTask::Reviewer => "REVIEWER",
            LLMTask::Router => "ROUTER",
            LLMTask::Summarizer => "SUMMARIZER",
        }
    }
}

/// Fully-resolved parameters for one model invocation, after applying the
/// override → environment → built-in-default resolution order and the
/// thinking-model budget derivation.
#[derive(Debug, Clone)]
pub struct ModelLoadConfig {
    pub provider: String,
    pub model_name: String,
    pub temperature: Option<f32>,
    pub max_tokens: u32,
    pub thinking_model: bool,
    pub thinking_budget_tokens: Option<u32>,
}

const THINKING_BUDGET_TOKENS: u32 = 5_000;
const THINKING_MAX_TOKENS_MULTIPLIER: u32 = 4;

/// Providers whose model families require `temperature = 1.0` to avoid
/// degenerate repetition loops (mirrors the behaviour some reasoning-tuned
/// chat models exhibit at low temperature).
const FORCED_TEMPERATURE_ONE_PROVIDERS: &[&str] = &["openai_reasoning", "azure_reasoning"];

fn is_thinking_model(model_name: &str) -> bool {
    model_name.starts_with("o1")
        || model_name.starts_with("o3")
        || model_name.starts_with("o4")
        || model_name.contains("extended-thinking:")
}

/// Resolves the model name for `(task, provider)` using: (1) an explicit
/// per-task override from run configuration, (2) the `{PROVIDER}_{TASK}_MODEL`
/// environment variable, (3) the supplied built-in default.
pub fn resolve_model_name(
    task: LLMTask,
    provider: &str,
    overrides: &HashMap<LLMTask, String>,
    default_model: &str,
) -> String {
    if let Some(name) = overrides.get(&task) {
        return name.clone();
    }
    let env_key = format!("{}_{}_MODEL", provider.to_ascii_uppercase(), task.env_suffix());
    if let Ok(name) = std::env::var(&env_key) {
        if !name.is_empty() {
            return name;
        }
    }
    default_model.to_string()
}

/// Builds the fully-resolved load config for one invocation, applying the
/// thinking-model budget rule: a thinking model gets a fixed reasoning
/// token budget, `max_tokens` raised to 4x that budget, and no explicit
/// temperature (the provider default applies).
pub fn build_load_config(
    provider: &str,
    model_name: String,
    requested_max_tokens: u32,
    requested_temperature: Option<f32>,
) -> ModelLoadConfig {
    let thinking = is_thinking_model(&model_name);
    if thinking {
        let budget = THINKING_BUDGET_TOKENS;
        ModelLoadConfig {
            provider: provider.to_string(),
            model_name,
            temperature: None,
            max_tokens: budget * THINKING_MAX_TOKENS_MULTIPLIER,
            thinking_model: true,
            thinking_budget_tokens: Some(budget),
        }
    } else {
        let temperature = if FORCED_TEMPERATURE_ONE_PROVIDERS.contains(&provider) {
            Some(1.0)
        } else {
            requested_temperature.or(Some(0.0))
        };
        ModelLoadConfig {
            provider: provider.to_string(),
            model_name,
            temperature,
            max_tokens: requested_max_tokens,
            thinking_model: false,
            thinking_budget_tokens: None,
        }
    }
}

/// Extracts a single well-formed Base64 "thought signature" token from a
/// provider response, discarding extra concatenated signatures. Reasoning
/// providers that emit multiple signatures separated by embedded padding
/// (`=`) mid-string are detected and only the last genuine token is kept.
pub fn extract_thought_signature(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    // A legitimate single base64 token has at most one trailing padding run.
    // Concatenated signatures show `=` (or `==`) followed by more base64-alphabet
    // characters — split on that boundary and keep the final segment.
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        if c == '=' {
            // consume any further padding, then check what follows.
            while chars.peek() == Some(&'=') {
                current.push(chars.next().unwrap());
            }
            if chars.peek().is_some() {
                segments.push(std::mem::take(&mut current));
            }
        }
    }
    segments.push(current);
    segments.into_iter().filter(|s| !s.is_empty()).last()
}
