// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("branch name equals base branch: {0}")]
    BranchEqualsBase(String),

    #[error("sandbox error: {0}")]
    Sandbox(#[from] sven_sandbox::SandboxError),

    #[error("model fallback exhausted: {0}")]
    Fallback(#[from] sven_fallback::FallbackError),

    #[error("thread store error: {0}")]
    Store(anyhow::Error),

    #[error("github operation error: {0}")]
    GitHub(anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
