// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::SandboxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SandboxState {
    Creating,
    Started,
    Stopped,
    Archived,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    ContainerVm,
    MicroVm,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxHandle {
    pub id: String,
    pub state: SandboxState,
    pub provider_type: ProviderType,
}

#[derive(Debug, Clone, Default)]
pub struct ExecuteCommandOptions {
    pub workdir: Option<String>,
    pub env: HashMap<String, String>,
    pub timeout_secs: u64,
}

impl ExecuteCommandOptions {
    pub fn with_timeout(timeout_secs: u64) -> Self {
        Self {
            timeout_secs,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Capability surface exposed by a live sandbox session: shell execution
/// plus the filesystem and git primitives the graph coordinator needs to
/// clone a repository, read/write files, and push commits.
#[async_trait]
pub trait Sandbox: Send + Sync {
    fn id(&self) -> &str;

    async fn execute_command(
        &self,
        command: &str,
        options: ExecuteCommandOptions,
    ) -> Result<CommandResult, SandboxError>;

    async fn read_file(&self, path: &str) -> Result<String, SandboxError>;
    async fn write_file(&self, path: &str, content: &str) -> Result<(), SandboxError>;
    async fn exists(&self, path: &str) -> Result<bool, SandboxError>;
    async fn mkdir(&self, path: &str) -> Result<(), SandboxError>;
    async fn remove(&self, path: &str) -> Result<(), SandboxError>;
}

/// Provider-level lifecycle operations: create, look up, stop, delete, and
/// enumerate sandboxes. Each concrete provider (container-VM-like,
/// micro-VM-like, local-process) implements this against its own backend.
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    fn provider_type(&self) -> ProviderType;

    async fn create(&self) -> Result<SandboxHandle, SandboxError>;
    async fn get(&self, id: &str) -> Result<SandboxHandle, SandboxError>;
    async fn start(&self, id: &str) -> Result<SandboxHandle, SandboxError>;
    async fn stop(&self, id: &str) -> Result<(), SandboxError>;
    async fn delete(&self, id: &str) -> Result<(), SandboxError>;
    async fn list(&self) -> Result<Vec<SandboxHandle>, SandboxError>;

    /// Obtain a live capability handle for an already-Started sandbox.
    async fn connect(&self, id: &str) -> Result<Box<dyn Sandbox>, SandboxError>;

    /// Resume a possibly-stopped sandbox, recreating it if its state is
    /// unrecoverable, mirroring the resume fast-path described for the
    /// graph coordinator's `initializeSandbox` phase.
    async fn resume(&self, id: &str) -> Result<SandboxHandle, SandboxError> {
        match self.get(id).await {
            Ok(handle) if handle.state == SandboxState::Started => Ok(handle),
            Ok(handle) if handle.state == SandboxState::Stopped => self.start(id).await,
            Ok(_) | Err(SandboxError::NotFound(_)) | Err(SandboxError::Unrecoverable(_)) => {
                let _ = self.delete(id).await;
                self.create().await
            }
            Err(e) => Err(e),
        }
    }
}
