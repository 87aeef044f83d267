// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SandboxError;
use crate::keymanager::KeyManager;
use crate::local::LocalSandboxProvider;
use crate::provider::{Sandbox, SandboxHandle, SandboxProvider};
use crate::remote::RemoteSandboxProvider;

/// Selects which concrete backend a run talks to. `Multi` round-robins
/// across several configured accounts of the same provider family using
/// the interleaved key rotation in [`KeyManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxProviderKind {
    ContainerVm,
    MicroVm,
    Multi,
    Local,
}

/// A single configured account: base URL plus one or more comma-separated
/// API keys. With `SandboxProviderKind::Multi`, several of these are
/// combined and rotated by `SandboxRegistry`.
#[derive(Debug, Clone)]
pub struct ProviderAccount {
    pub base_url: String,
    pub api_keys: Vec<String>,
}

/// Provider-agnostic entry point: constructs the right [`SandboxProvider`]
/// for the configured kind and, in `multi` mode, spreads `create()` calls
/// across accounts via the key manager instead of always hitting the first
/// one.
pub struct SandboxRegistry {
    kind: SandboxProviderKind,
    providers: Vec<Arc<dyn SandboxProvider>>,
    /// Flat start offset of account `i`'s keys within `providers`, so a
    /// `(provider_index, key_index)` slot from the key manager can be
    /// translated back into a position in the flattened vec.
    offsets: Vec<usize>,
    key_manager: KeyManager,
}

impl SandboxRegistry {
    pub fn local(root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            kind: SandboxProviderKind::Local,
            providers: vec![Arc::new(LocalSandboxProvider::new(root))],
            offsets: vec![0],
            key_manager: KeyManager::new(&[]),
        }
    }

    pub fn container_vm(accounts: Vec<ProviderAccount>) -> Self {
        Self::remote(SandboxProviderKind::ContainerVm, accounts, RemoteSandboxProvider::container_vm)
    }

    pub fn micro_vm(accounts: Vec<ProviderAccount>) -> Self {
        Self::remote(SandboxProviderKind::MicroVm, accounts, RemoteSandboxProvider::micro_vm)
    }

    /// `multi` interleaves every key across every account, regardless of
    /// which provider family each account belongs to; the caller supplies
    /// one provider instance per key so `next_provider` can hand back the
    /// matching client for whichever slot the key manager selects.
    pub fn multi(accounts: Vec<ProviderAccount>, ctor: fn(&str, &str) -> RemoteSandboxProvider) -> Self {
        Self::remote(SandboxProviderKind::Multi, accounts, ctor)
    }

    fn remote(
        kind: SandboxProviderKind,
        accounts: Vec<ProviderAccount>,
        ctor: fn(&str, &str) -> RemoteSandboxProvider,
    ) -> Self {
        let mut providers: Vec<Arc<dyn SandboxProvider>> = Vec::new();
        let mut counts = Vec::new();
        let mut offsets = Vec::new();
        for account in &accounts {
            offsets.push(providers.len());
            counts.push(account.api_keys.len());
            for key in &account.api_keys {
                providers.push(Arc::new(ctor(&account.base_url, key)));
            }
        }
        Self {
            kind,
            key_manager: KeyManager::new(&counts),
            providers,
            offsets,
        }
    }

    pub fn kind(&self) -> SandboxProviderKind {
        self.kind
    }

    /// Picks the next provider client to use. `Local` and single-account
    /// modes always return the sole provider; `Multi` advances the key
    /// rotation.
    pub fn next_provider(&self) -> Result<Arc<dyn SandboxProvider>, SandboxError> {
        if self.providers.is_empty() {
            return Err(SandboxError::Unrecoverable(
                "no sandbox providers configured".into(),
            ));
        }
        if self.providers.len() == 1 {
            return Ok(self.providers[0].clone());
        }
        let slot = self
            .key_manager
            .next()
            .ok_or_else(|| SandboxError::Unrecoverable("key rotation exhausted".into()))?;
        let offset = self.offsets.get(slot.provider_index).copied().unwrap_or(0);
        self.providers
            .get(offset + slot.key_index)
            .cloned()
            .or_else(|| self.providers.first().cloned())
            .ok_or_else(|| SandboxError::Unrecoverable("no sandbox providers configured".into()))
    }
}

#[async_trait]
impl SandboxProvider for SandboxRegistry {
    fn provider_type(&self) -> crate::provider::ProviderType {
        self.providers[0].provider_type()
    }

    async fn create(&self) -> Result<SandboxHandle, SandboxError> {
        self.next_provider()?.create().await
    }

    async fn get(&self, id: &str) -> Result<SandboxHandle, SandboxError> {
        self.next_provider()?.get(id).await
    }

    async fn start(&self, id: &str) -> Result<SandboxHandle, SandboxError> {
        self.next_provider()?.start(id).await
    }

    async fn stop(&self, id: &str) -> Result<(), SandboxError> {
        self.next_provider()?.stop(id).await
    }

    async fn delete(&self, id: &str) -> Result<(), SandboxError> {
        self.next_provider()?.delete(id).await
    }

    async fn list(&self) -> Result<Vec<SandboxHandle>, SandboxError> {
        self.next_provider()?.list().await
    }

    async fn connect(&self, id: &str) -> Result<Box<dyn Sandbox>, SandboxError> {
        self.next_provider()?.connect(id).await
    }
}
