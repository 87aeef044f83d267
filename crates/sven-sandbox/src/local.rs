// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::process::Stdio;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::SandboxError;
use crate::provider::{
    CommandResult, ExecuteCommandOptions, ProviderType, Sandbox, SandboxHandle, SandboxProvider,
    SandboxState,
};

/// Executes directly against the host process, for local development and
/// tests where spinning up a real remote VM is unnecessary. Hardened the
/// same way `sven_tools::builtin::shell::ShellTool` hardens its child
/// process: no stdin, `setsid` on Unix so a runaway command can't steal the
/// controlling terminal, and `kill_on_drop` so a cancelled run doesn't leave
/// zombies behind.
pub struct LocalSandboxProvider {
    root: std::path::PathBuf,
    state: Mutex<SandboxState>,
}

impl LocalSandboxProvider {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            root: root.into(),
            state: Mutex::new(SandboxState::Unknown),
        }
    }
}

#[async_trait]
impl SandboxProvider for LocalSandboxProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Local
    }

    async fn create(&self) -> Result<SandboxHandle, SandboxError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| SandboxError::Unrecoverable(e.to_string()))?;
        *self.state.lock().unwrap() = SandboxState::Started;
        Ok(SandboxHandle {
            id: "local".to_string(),
            state: SandboxState::Started,
            provider_type: ProviderType::Local,
        })
    }

    async fn get(&self, id: &str) -> Result<SandboxHandle, SandboxError> {
        Ok(SandboxHandle {
            id: id.to_string(),
            state: *self.state.lock().unwrap(),
            provider_type: ProviderType::Local,
        })
    }

    async fn start(&self, id: &str) -> Result<SandboxHandle, SandboxError> {
        *self.state.lock().unwrap() = SandboxState::Started;
        self.get(id).await
    }

    async fn stop(&self, _id: &str) -> Result<(), SandboxError> {
        *self.state.lock().unwrap() = SandboxState::Stopped;
        Ok(())
    }

    async fn delete(&self, _id: &str) -> Result<(), SandboxError> {
        *self.state.lock().unwrap() = SandboxState::Archived;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SandboxHandle>, SandboxError> {
        Ok(vec![self.get("local").await?])
    }

    async fn connect(&self, id: &str) -> Result<Box<dyn Sandbox>, SandboxError> {
        Ok(Box::new(LocalSandbox {
            id: id.to_string(),
            root: self.root.clone(),
        }))
    }
}

pub struct LocalSandbox {
    id: String,
    root: std::path::PathBuf,
}

impl LocalSandbox {
    fn resolve(&self, path: &str) -> std::path::PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Sandbox for LocalSandbox {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute_command(
        &self,
        command: &str,
        options: ExecuteCommandOptions,
    ) -> Result<CommandResult, SandboxError> {
        let mut cmd = tokio::process::Command::new("bash");
        cmd.arg("-c").arg(command);
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        let workdir = options
            .workdir
            .map(|w| self.resolve(&w))
            .unwrap_or_else(|| self.root.clone());
        cmd.current_dir(workdir);
        for (k, v) in &options.env {
            cmd.env(k, v);
        }
        #[cfg(unix)]
        unsafe {
            use std::os::unix::process::CommandExt;
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }
        let timeout = if options.timeout_secs == 0 {
            30
        } else {
            options.timeout_secs
        };
        let output = tokio::time::timeout(
            std::time::Duration::from_secs(timeout),
            cmd.output(),
        )
        .await
        .map_err(|_| SandboxError::Transient("command timed out".into()))?
        .map_err(|e| SandboxError::Unrecoverable(e.to_string()))?;

        Ok(CommandResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    async fn read_file(&self, path: &str) -> Result<String, SandboxError> {
        tokio::fs::read_to_string(self.resolve(path))
            .await
            .map_err(|e| SandboxError::classify(&e.to_string()))
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), SandboxError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SandboxError::Unrecoverable(e.to_string()))?;
        }
        tokio::fs::write(full, content)
            .await
            .map_err(|e| SandboxError::Unrecoverable(e.to_string()))
    }

    async fn exists(&self, path: &str) -> Result<bool, SandboxError> {
        Ok(tokio::fs::metadata(self.resolve(path)).await.is_ok())
    }

    async fn mkdir(&self, path: &str) -> Result<(), SandboxError> {
        tokio::fs::create_dir_all(self.resolve(path))
            .await
            .map_err(|e| SandboxError::Unrecoverable(e.to_string()))
    }

    async fn remove(&self, path: &str) -> Result<(), SandboxError> {
        let full = self.resolve(path);
        if tokio::fs::metadata(&full)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            tokio::fs::remove_dir_all(full).await
        } else {
            tokio::fs::remove_file(full).await
        }
        .map_err(|e| SandboxError::classify(&e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_roundtrip_file() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalSandboxProvider::new(dir.path());
        let handle = provider.create().await.unwrap();
        assert_eq!(handle.state, SandboxState::Started);

        let sandbox = provider.connect(&handle.id).await.unwrap();
        sandbox.write_file("a.txt", "hello").await.unwrap();
        assert!(sandbox.exists("a.txt").await.unwrap());
        assert_eq!(sandbox.read_file("a.txt").await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn execute_command_captures_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalSandboxProvider::new(dir.path());
        provider.create().await.unwrap();
        let sandbox = provider.connect("local").await.unwrap();
        let result = sandbox
            .execute_command("exit 7", ExecuteCommandOptions::with_timeout(5))
            .await
            .unwrap();
        assert_eq!(result.exit_code, 7);
        assert!(!result.success());
    }

    #[tokio::test]
    async fn resume_recreates_unrecoverable_sandbox() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalSandboxProvider::new(dir.path());
        let handle = provider.resume("missing").await.unwrap();
        assert_eq!(handle.state, SandboxState::Started);
    }
}
