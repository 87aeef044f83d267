// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// Error taxonomy for sandbox provider operations.
///
/// `Transient` is the only variant retry loops act on; everything else
/// propagates immediately.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("transient sandbox failure: {0}")]
    Transient(String),

    #[error("sandbox not found: {0}")]
    NotFound(String),

    #[error("sandbox in unrecoverable state: {0}")]
    Unrecoverable(String),

    #[error("sandbox operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SandboxError {
    /// Classify an arbitrary transport-level error message the way the retry
    /// loop in `retry::with_retries` expects: connection resets, DNS hiccups,
    /// and the handful of HTTP statuses cloud sandbox providers bounce
    /// requests with under load.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        let transient_markers = [
            "connection reset",
            "connection refused",
            "temporary failure",
            "socket hang up",
            "econnreset",
            "aborted",
            "timed out",
            "timeout",
            "429",
            "502",
            "503",
            "504",
            "gateway",
            "cloudfront",
        ];
        if transient_markers.iter().any(|m| lower.contains(m)) {
            SandboxError::Transient(message.to_string())
        } else if lower.contains("not found") || lower.contains("404") {
            SandboxError::NotFound(message.to_string())
        } else {
            SandboxError::Unrecoverable(message.to_string())
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, SandboxError::Transient(_))
    }
}
