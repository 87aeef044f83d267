// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Mutex;

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct PullRequestRef {
    pub number: u64,
    pub head_branch: String,
    pub url: String,
}

/// The effective set of GitHub operations the coordinator consumes. The
/// real REST/webhook plumbing lives outside this engine entirely; this
/// trait is the seam an external collaborator implements.
#[async_trait]
pub trait GitHubOps: Send + Sync {
    async fn branch_exists(&self, owner: &str, repo: &str, branch: &str) -> anyhow::Result<bool>;
    async fn find_existing_pull_request(
        &self,
        owner: &str,
        repo: &str,
        head_branch: &str,
    ) -> anyhow::Result<Option<PullRequestRef>>;
    async fn open_pull_request(
        &self,
        owner: &str,
        repo: &str,
        head_branch: &str,
        base_branch: &str,
        title: &str,
        draft: bool,
    ) -> anyhow::Result<PullRequestRef>;
    async fn update_pull_request(&self, owner: &str, repo: &str, number: u64, ready: bool) -> anyhow::Result<()>;
    async fn upsert_plan_comment(&self, owner: &str, repo: &str, issue_number: u64, plan_markdown: &str) -> anyhow::Result<()>;
    async fn mint_installation_token(&self, owner: &str) -> anyhow::Result<String>;
}

/// Records every call it receives and returns canned data, for tests and
/// the demonstration CLI.
#[derive(Default)]
pub struct NullGitHubOps {
    pub calls: Mutex<Vec<String>>,
}

impl NullGitHubOps {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GitHubOps for NullGitHubOps {
    async fn branch_exists(&self, _owner: &str, _repo: &str, _branch: &str) -> anyhow::Result<bool> {
        self.calls.lock().unwrap().push("branch_exists".into());
        Ok(false)
    }

    async fn find_existing_pull_request(
        &self,
        _owner: &str,
        _repo: &str,
        _head_branch: &str,
    ) -> anyhow::Result<Option<PullRequestRef>> {
        self.calls.lock().unwrap().push("find_existing_pull_request".into());
        Ok(None)
    }

    async fn open_pull_request(
        &self,
        _owner: &str,
        _repo: &str,
        head_branch: &str,
        _base_branch: &str,
        _title: &str,
        _draft: bool,
    ) -> anyhow::Result<PullRequestRef> {
        self.calls.lock().unwrap().push("open_pull_request".into());
        Ok(PullRequestRef {
            number: 1,
            head_branch: head_branch.to_string(),
            url: "https://example.invalid/pull/1".to_string(),
        })
    }

    async fn update_pull_request(&self, _owner: &str, _repo: &str, _number: u64, _ready: bool) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push("update_pull_request".into());
        Ok(())
    }

    async fn upsert_plan_comment(&self, _owner: &str, _repo: &str, _issue_number: u64, _plan_markdown: &str) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push("upsert_plan_comment".into());
        Ok(())
    }

    async fn mint_installation_token(&self, _owner: &str) -> anyhow::Result<String> {
        self.calls.lock().unwrap().push("mint_installation_token".into());
        Ok("fake-token".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_every_call() {
        let ops = NullGitHubOps::new();
        ops.branch_exists("acme", "widgets", "main").await.unwrap();
        ops.mint_installation_token("acme").await.unwrap();
        assert_eq!(*ops.calls.lock().unwrap(), vec!["branch_exists", "mint_installation_token"]);
    }
}
