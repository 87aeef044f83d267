// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const FAILURE_THRESHOLD: u32 = 2;
const COOLDOWN: Duration = Duration::from_secs(180);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
}

#[derive(Debug, Clone)]
struct Entry {
    state: BreakerState,
    failure_count: u32,
    opened_at: Option<Instant>,
}

impl Default for Entry {
    fn default() -> Self {
        Self {
            state: BreakerState::Closed,
            failure_count: 0,
            opened_at: None,
        }
    }
}

/// Process-wide, per-model-key circuit breaker. A model trips Open after
/// `FAILURE_THRESHOLD` consecutive failures and is given a chance to recover
/// after `COOLDOWN` has elapsed since it opened; any success resets its
/// failure count to zero.
pub struct CircuitBreaker {
    entries: Mutex<HashMap<String, Entry>>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// `true` if this model key may currently be tried: either Closed, or
    /// Open but past its cooldown (a "probe" attempt).
    pub fn allow(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(key.to_string()).or_default();
        match entry.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let elapsed = entry.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                elapsed >= COOLDOWN
            }
        }
    }

    pub fn record_success(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(key.to_string()).or_default();
        entry.failure_count = 0;
        entry.state = BreakerState::Closed;
        entry.opened_at = None;
    }

    pub fn record_failure(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(key.to_string()).or_default();
        entry.failure_count += 1;
        if entry.failure_count >= FAILURE_THRESHOLD {
            entry.state = BreakerState::Open;
            // Refresh unconditionally: a failed probe after the previous
            // cooldown elapsed must start a new cooldown, not extend the old
            // (already-expired) one.
            entry.opened_at = Some(Instant::now());
        }
    }

    pub fn state(&self, key: &str) -> BreakerState {
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .map(|e| e.state)
            .unwrap_or(BreakerState::Closed)
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
