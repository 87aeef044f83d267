// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::future::Future;
use std::time::Duration;

use crate::error::SandboxError;

/// Retries a transient-failing operation up to `max_attempts` times with
/// exponential backoff starting at `base_delay`, doubling each attempt.
/// Non-transient errors are returned immediately without retrying.
pub async fn with_retries<T, F, Fut>(
    max_attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T, SandboxError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SandboxError>>,
{
    let mut attempt = 0;
    let mut delay = base_delay;
    loop {
        attempt += 1;
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                tracing::warn!(attempt, ?delay, error = %e, "retrying transient sandbox failure");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}
