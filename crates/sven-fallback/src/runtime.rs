// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

use sven_model::{CompletionRequest, ResponseStream};

use crate::bound_model::BoundModel;
use crate::circuit_breaker::CircuitBreaker;
use crate::error::{is_retryable, FallbackError};

const MAX_ATTEMPTS_PER_MODEL: u32 = 5;
const BASE_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Wraps an ordered list of candidate models and transparently retries the
/// same model on transient failure, then falls over to the next candidate,
/// tracking per-model health in a shared [`CircuitBreaker`].
pub struct FallbackRuntime {
    breaker: CircuitBreaker,
}

impl FallbackRuntime {
    pub fn new() -> Self {
        Self {
            breaker: CircuitBreaker::new(),
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// `req` is cloned per attempt: the bound tools and tool-choice policy
    /// live on each `BoundModel`, not on the shared `CompletionRequest`, and
    /// are spliced in here before the call.
    pub async fn invoke(
        &self,
        candidates: &[BoundModel],
        req: CompletionRequest,
    ) -> Result<ResponseStream, FallbackError> {
        if candidates.is_empty() {
            return Err(FallbackError::NoModels);
        }

        let mut last_error: Option<(String, anyhow::Error)> = None;

        for bound in candidates {
            let key = bound.key();
            if !self.breaker.allow(&key) {
                tracing::debug!(model = %key, "circuit open, skipping");
                continue;
            }

            let mut attempt_req = req.clone();
            if !bound.tools.is_empty() {
                attempt_req.tools = bound.tools.clone();
            }
            if bound.tool_choice.is_some() {
                attempt_req.tool_choice = bound.tool_choice.clone();
            }

            let mut delay = BASE_DELAY;
            let mut attempt_result = None;
            for attempt in 1..=MAX_ATTEMPTS_PER_MODEL {
                match bound.model.complete(attempt_req.clone()).await {
                    Ok(stream) => {
                        attempt_result = Some(Ok(stream));
                        break;
                    }
                    Err(e) => {
                        let retryable = is_retryable(&e);
                        tracing::warn!(model = %key, attempt, retryable, error = %e, "model call failed");
                        if retryable && attempt < MAX_ATTEMPTS_PER_MODEL {
                            tokio::time::sleep(delay).await;
                            delay = (delay * 2).min(MAX_DELAY);
                            continue;
                        }
                        attempt_result = Some(Err(e));
                        break;
                    }
                }
            }

            match attempt_result {
                Some(Ok(stream)) => {
                    self.breaker.record_success(&key);
                    return Ok(stream);
                }
                Some(Err(e)) => {
                    self.breaker.record_failure(&key);
                    last_error = Some((key, e));
                }
                None => unreachable!("loop always sets attempt_result"),
            }
        }

        match last_error {
            Some((model, source)) => Err(FallbackError::AllModelsExhausted { model, source }),
            None => Err(FallbackError::NoModels),
        }
    }
}

impl Default for FallbackRuntime {
    fn default() -> Self {
        Self::new()
    }
}
