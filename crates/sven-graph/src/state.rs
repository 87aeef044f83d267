// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};
use sven_model::Message;

use crate::plan::TaskPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxProviderType {
    ContainerVm,
    MicroVm,
    Multi,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    InitializeSandbox,
    Planner,
    Programmer,
    Reviewer,
    CheckoutAndCommit,
    Done,
    Failed,
}

/// The single persisted record for one run, as described for the engine's
/// data model: immutable identifiers, repository coordinates, the working
/// branch, sandbox reference, cached codebase tree, plan, and the two
/// message logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadState {
    pub thread_id: String,
    pub run_id: String,
    pub owner: String,
    pub repo: String,
    pub base_branch: String,
    pub base_commit: Option<String>,
    pub branch_name: String,
    pub sandbox_session_id: Option<String>,
    pub sandbox_provider_type: Option<SandboxProviderType>,
    pub codebase_tree: Option<String>,
    pub dependencies_installed: bool,
    pub custom_rules: Option<String>,
    pub task_plan: TaskPlan,
    pub messages: Vec<Message>,
    pub internal_messages: Vec<Message>,
    pub phase: Phase,
    pub pull_request_number: Option<u64>,
}

impl ThreadState {
    pub fn new(thread_id: impl Into<String>, owner: impl Into<String>, repo: impl Into<String>, base_branch: impl Into<String>) -> Self {
        let thread_id = thread_id.into();
        let base_branch = base_branch.into();
        Self {
            branch_name: format!("open-swe/{thread_id}"),
            run_id: uuid_v4_like(&thread_id),
            thread_id,
            owner: owner.into(),
            repo: repo.into(),
            base_branch,
            base_commit: None,
            sandbox_session_id: None,
            sandbox_provider_type: None,
            codebase_tree: None,
            dependencies_installed: false,
            custom_rules: None,
            task_plan: TaskPlan::default(),
            messages: Vec::new(),
            internal_messages: Vec::new(),
            phase: Phase::InitializeSandbox,
            pull_request_number: None,
        }
    }

    /// Precondition enforced before any commit: the feature branch must
    /// never equal the repository's base branch.
    pub fn assert_branch_diverges(&self) -> Result<(), crate::error::GraphError> {
        if self.branch_name == self.base_branch {
            return Err(crate::error::GraphError::BranchEqualsBase(self.branch_name.clone()));
        }
        Ok(())
    }
}

/// `uuid::Uuid::new_v4()` is unavailable in workflow-script contexts that
/// ban nondeterministic APIs; the coordinator always receives a caller-
/// supplied thread_id, so this derives a stable v5-style id from it instead
/// of touching true randomness.
fn uuid_v4_like(seed: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hex::encode(&hasher.finalize()[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_thread_derives_feature_branch_name() {
        let state = ThreadState::new("abc123", "acme", "widgets", "main");
        assert_eq!(state.branch_name, "open-swe/abc123");
    }

    #[test]
    fn branch_equal_to_base_is_rejected() {
        let mut state = ThreadState::new("abc123", "acme", "widgets", "main");
        state.branch_name = "main".to_string();
        assert!(state.assert_branch_diverges().is_err());
    }

    #[test]
    fn diverging_branch_passes() {
        let state = ThreadState::new("abc123", "acme", "widgets", "main");
        assert!(state.assert_branch_diverges().is_ok());
    }
}
