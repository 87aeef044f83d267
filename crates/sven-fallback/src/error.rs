// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("all models exhausted, last error from {model}: {source}")]
    AllModelsExhausted {
        model: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("no model configurations provided")]
    NoModels,
}

/// Classifies an error surfaced by a model provider into retryable vs. not,
/// the same way `sven_sandbox::error::SandboxError::classify` reads
/// transport-level error text for its own retry loop.
pub fn is_retryable(err: &anyhow::Error) -> bool {
    let msg = err.to_string().to_ascii_lowercase();
    let markers = [
        "timeout",
        "timed out",
        "connection reset",
        "connection refused",
        "429",
        "500",
        "502",
        "503",
        "504",
        "rate limit",
        "overloaded",
        "network",
    ];
    markers.iter().any(|m| msg.contains(m))
}
