// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// `(toolName, canonicalArgsJson)` pair plus the full argument value, used
/// both for grouping and for readable diagnostics.
///
/// Equality and hashing are defined over `name`/`args_hash` only: `args_hash`
/// is already a stable digest of `full_args`, and `serde_json::Value` does
/// not implement `Hash`, so deriving it here would not compile.
#[derive(Debug, Clone)]
pub struct ToolCallSignature {
    pub name: String,
    pub args_hash: String,
    pub full_args: serde_json::Value,
}

impl ToolCallSignature {
    pub fn new(name: impl Into<String>, args: &serde_json::Value) -> Self {
        Self {
            name: name.into(),
            args_hash: canonical_hash(args),
            full_args: args.clone(),
        }
    }
}

impl PartialEq for ToolCallSignature {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.args_hash == other.args_hash
    }
}

impl Eq for ToolCallSignature {}

impl std::hash::Hash for ToolCallSignature {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.args_hash.hash(state);
    }
}

/// Stable hash over a canonicalised (key-sorted) JSON encoding, so
/// `{"a":1,"b":2}` and `{"b":2,"a":1}` hash identically.
pub fn canonical_hash(value: &serde_json::Value) -> String {
    use sha2::{Digest, Sha256};
    let canonical = canonicalize(value);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

fn canonicalize(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let parts: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{:?}:{}", k, canonicalize(&map[k])))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        serde_json::Value::Array(arr) => {
            let parts: Vec<String> = arr.iter().map(canonicalize).collect();
            format!("[{}]", parts.join(","))
        }
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopType {
    None,
    Verification,
    ErrorRetry,
    Alternating,
    ReadOnly,
    SimilarCalls,
    Frequency,
    Chanting,
    EditLoop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Continue,
    Warn,
    RequestHelp,
    ForceComplete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopReport {
    pub loop_type: LoopType,
    pub recommendation: Recommendation,
    pub repeat_count: usize,
    pub detail: String,
}

impl LoopReport {
    pub fn none() -> Self {
        Self {
            loop_type: LoopType::None,
            recommendation: Recommendation::Continue,
            repeat_count: 0,
            detail: String::new(),
        }
    }
}

/// Thresholds driving every detector. Defaults match the values specified
/// for this engine; all are overridable so tests can exercise boundary
/// behaviour without waiting through a full-size window.
#[derive(Debug, Clone)]
pub struct LoopDetectorConfig {
    pub history_window: usize,
    pub loop_threshold: u32,
    pub force_completion_threshold: u32,
    pub read_only_window: usize,
    pub read_only_ratio: f32,
    pub read_only_max_unique_files: usize,
    pub similar_calls_threshold: u32,
    pub similar_calls_read_only_threshold: u32,
    pub frequency_window: usize,
    pub frequency_threshold: u32,
    pub frequency_unique_shell_escape: usize,
    pub chanting_threshold: usize,
    pub chanting_similarity: f32,
    pub error_retry_window: usize,
    pub error_retry_ratio: f32,
    pub edit_loop_threshold: u32,
    pub exploration_unique_reads: usize,
    pub warning_escalation_threshold: u32,
    pub alternating_force_complete_length: u32,
}

impl Default for LoopDetectorConfig {
    fn default() -> Self {
        Self {
            history_window: 120,
            loop_threshold: 20,
            force_completion_threshold: 30,
            read_only_window: 10,
            read_only_ratio: 0.85,
            read_only_max_unique_files: 2,
            similar_calls_threshold: 24,
            similar_calls_read_only_threshold: 40,
            frequency_window: 80,
            frequency_threshold: 48,
            frequency_unique_shell_escape: 16,
            chanting_threshold: 12,
            chanting_similarity: 0.9,
            error_retry_window: 20,
            error_retry_ratio: 0.6,
            edit_loop_threshold: 20,
            exploration_unique_reads: 5,
            warning_escalation_threshold: 12,
            alternating_force_complete_length: 6,
        }
    }
}
