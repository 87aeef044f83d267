// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::SandboxError;
use crate::provider::{
    CommandResult, ExecuteCommandOptions, ProviderType, Sandbox, SandboxHandle, SandboxProvider,
    SandboxState,
};
use crate::retry::with_retries;

/// Shared HTTP-backed sandbox provider for the two remote cloud providers
/// this engine supports: a containerised-VM backend and a micro-VM backend.
/// Both expose the same REST shape (create/get/start/stop/delete plus an
/// exec endpoint), so a single client parameterised by base URL and
/// provider-type tag covers both — the provider-specific quirks (default
/// image, boot time) are confined to the two thin wrapper constructors below.
pub struct RemoteSandboxProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    provider_type: ProviderType,
}

impl RemoteSandboxProvider {
    pub fn container_vm(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::new(base_url, api_key, ProviderType::ContainerVm)
    }

    pub fn micro_vm(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::new(base_url, api_key, ProviderType::MicroVm)
    }

    fn new(base_url: impl Into<String>, api_key: impl Into<String>, provider_type: ProviderType) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            provider_type,
        }
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(&self.api_key)
    }

    async fn request_json<T: for<'de> Deserialize<'de>>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, SandboxError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.auth(self.client.request(method, &url));
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| SandboxError::classify(&e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(SandboxError::classify(&format!("{status}: {text}")));
        }
        resp.json::<T>()
            .await
            .map_err(|e| SandboxError::Unrecoverable(e.to_string()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RemoteHandle {
    id: String,
    state: String,
}

fn parse_state(s: &str) -> SandboxState {
    match s {
        "creating" => SandboxState::Creating,
        "started" | "running" => SandboxState::Started,
        "stopped" => SandboxState::Stopped,
        "archived" | "deleted" => SandboxState::Archived,
        _ => SandboxState::Unknown,
    }
}

#[async_trait]
impl SandboxProvider for RemoteSandboxProvider {
    fn provider_type(&self) -> ProviderType {
        self.provider_type
    }

    async fn create(&self) -> Result<SandboxHandle, SandboxError> {
        with_retries(5, Duration::from_secs(5), || async {
            let handle: RemoteHandle = self
                .request_json(reqwest::Method::POST, "/sandboxes", None)
                .await?;
            Ok(SandboxHandle {
                id: handle.id,
                state: parse_state(&handle.state),
                provider_type: self.provider_type,
            })
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<SandboxHandle, SandboxError> {
        with_retries(5, Duration::from_secs(5), || async {
            let handle: RemoteHandle = self
                .request_json(reqwest::Method::GET, &format!("/sandboxes/{id}"), None)
                .await?;
            Ok(SandboxHandle {
                id: handle.id,
                state: parse_state(&handle.state),
                provider_type: self.provider_type,
            })
        })
        .await
    }

    async fn start(&self, id: &str) -> Result<SandboxHandle, SandboxError> {
        with_retries(5, Duration::from_secs(5), || async {
            let handle: RemoteHandle = self
                .request_json(
                    reqwest::Method::POST,
                    &format!("/sandboxes/{id}/start"),
                    None,
                )
                .await?;
            Ok(SandboxHandle {
                id: handle.id,
                state: parse_state(&handle.state),
                provider_type: self.provider_type,
            })
        })
        .await
    }

    async fn stop(&self, id: &str) -> Result<(), SandboxError> {
        with_retries(5, Duration::from_secs(5), || async {
            let _: serde_json::Value = self
                .request_json(reqwest::Method::POST, &format!("/sandboxes/{id}/stop"), None)
                .await?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<(), SandboxError> {
        with_retries(5, Duration::from_secs(5), || async {
            let _: serde_json::Value = self
                .request_json(reqwest::Method::DELETE, &format!("/sandboxes/{id}"), None)
                .await?;
            Ok(())
        })
        .await
    }

    async fn list(&self) -> Result<Vec<SandboxHandle>, SandboxError> {
        let handles: Vec<RemoteHandle> = self
            .request_json(reqwest::Method::GET, "/sandboxes", None)
            .await?;
        Ok(handles
            .into_iter()
            .map(|h| SandboxHandle {
                id: h.id,
                state: parse_state(&h.state),
                provider_type: self.provider_type,
            })
            .collect())
    }

    async fn connect(&self, id: &str) -> Result<Box<dyn Sandbox>, SandboxError> {
        Ok(Box::new(RemoteSandbox {
            id: id.to_string(),
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
        }))
    }
}

pub struct RemoteSandbox {
    id: String,
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ExecResponse {
    exit_code: i32,
    stdout: String,
    stderr: String,
}

#[async_trait]
impl Sandbox for RemoteSandbox {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute_command(
        &self,
        command: &str,
        options: ExecuteCommandOptions,
    ) -> Result<CommandResult, SandboxError> {
        let timeout = if options.timeout_secs == 0 {
            30
        } else {
            options.timeout_secs
        };
        let body = serde_json::json!({
            "command": command,
            "workdir": options.workdir,
            "env": options.env,
            "timeout_secs": timeout,
        });
        with_retries(5, Duration::from_secs(5), || async {
            let url = format!("{}/sandboxes/{}/exec", self.base_url, self.id);
            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| SandboxError::classify(&e.to_string()))?;
            if !resp.status().is_success() {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                return Err(SandboxError::classify(&format!("{status}: {text}")));
            }
            let parsed: ExecResponse = resp
                .json()
                .await
                .map_err(|e| SandboxError::Unrecoverable(e.to_string()))?;
            Ok(CommandResult {
                exit_code: parsed.exit_code,
                stdout: parsed.stdout,
                stderr: parsed.stderr,
            })
        })
        .await
    }

    async fn read_file(&self, path: &str) -> Result<String, SandboxError> {
        let result = self
            .execute_command(
                &format!("cat {}", shell_escape(path)),
                ExecuteCommandOptions::with_timeout(15),
            )
            .await?;
        if result.success() {
            Ok(result.stdout)
        } else {
            Err(SandboxError::classify(&result.stderr))
        }
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), SandboxError> {
        let encoded = base64_encode(content.as_bytes());
        let command = format!(
            "mkdir -p $(dirname {path}) && echo {encoded} | base64 -d > {path}",
            path = shell_escape(path),
            encoded = shell_escape(&encoded),
        );
        let result = self
            .execute_command(&command, ExecuteCommandOptions::with_timeout(15))
            .await?;
        if result.success() {
            Ok(())
        } else {
            Err(SandboxError::classify(&result.stderr))
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, SandboxError> {
        let result = self
            .execute_command(
                &format!("test -e {}", shell_escape(path)),
                ExecuteCommandOptions::with_timeout(10),
            )
            .await?;
        Ok(result.success())
    }

    async fn mkdir(&self, path: &str) -> Result<(), SandboxError> {
        let result = self
            .execute_command(
                &format!("mkdir -p {}", shell_escape(path)),
                ExecuteCommandOptions::with_timeout(10),
            )
            .await?;
        if result.success() {
            Ok(())
        } else {
            Err(SandboxError::classify(&result.stderr))
        }
    }

    async fn remove(&self, path: &str) -> Result<(), SandboxError> {
        let result = self
            .execute_command(
                &format!("rm -rf {}", shell_escape(path)),
                ExecuteCommandOptions::with_timeout(10),
            )
            .await?;
        if result.success() {
            Ok(())
        } else {
            Err(SandboxError::classify(&result.stderr))
        }
    }
}

fn shell_escape(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
