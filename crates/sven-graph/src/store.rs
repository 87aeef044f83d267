// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::state::ThreadState;

/// Persists thread state across phases and runs. The real persistence
/// layer (database, object store) lives outside this engine; only the
/// interface is owned here.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    async fn load(&self, thread_id: &str) -> anyhow::Result<Option<ThreadState>>;
    async fn save(&self, state: &ThreadState) -> anyhow::Result<()>;
}

#[derive(Default)]
pub struct MemoryThreadStore {
    states: Mutex<HashMap<String, ThreadState>>,
}

impl MemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThreadStore for MemoryThreadStore {
    async fn load(&self, thread_id: &str) -> anyhow::Result<Option<ThreadState>> {
        Ok(self.states.lock().unwrap().get(thread_id).cloned())
    }

    async fn save(&self, state: &ThreadState) -> anyhow::Result<()> {
        self.states
            .lock()
            .unwrap()
            .insert(state.thread_id.clone(), state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let store = MemoryThreadStore::new();
        let state = ThreadState::new("t1", "acme", "widgets", "main");
        store.save(&state).await.unwrap();
        let loaded = store.load("t1").await.unwrap().unwrap();
        assert_eq!(loaded.thread_id, "t1");
    }

    #[tokio::test]
    async fn missing_thread_returns_none() {
        let store = MemoryThreadStore::new();
        assert!(store.load("missing").await.unwrap().is_none());
    }
}
