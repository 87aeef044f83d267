// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub kind: String,
    pub timestamp_ms: u64,
    pub fields: serde_json::Value,
}

impl ProgressEvent {
    pub fn new(kind: impl Into<String>, timestamp_ms: u64, fields: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            timestamp_ms,
            fields,
        }
    }
}

/// External collaborator that receives progress events as the coordinator
/// advances through phases. Kept minimal and injectable so tests and the
/// demonstration CLI can swap in a no-op or an in-memory collector instead
/// of a real event bus.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn emit(&self, event: ProgressEvent);
}

pub struct NullProgressSink;

#[async_trait]
impl ProgressSink for NullProgressSink {
    async fn emit(&self, _event: ProgressEvent) {}
}

pub struct ChannelProgressSink {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ProgressSink for ChannelProgressSink {
    async fn emit(&self, event: ProgressEvent) {
        let _ = self.tx.send(event).await;
    }
}
