// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Arc;

use sven_model::LLMTask;
use sven_sandbox::{CloneRequest, ProviderType, Sandbox, SandboxProvider};

use crate::error::GraphError;
use crate::events::{ProgressEvent, ProgressSink};
use crate::github::GitHubOps;
use crate::plan::TaskPlan;
use crate::state::{Phase, SandboxProviderType, ThreadState};
use crate::tree;
use crate::turn::TurnDriver;

/// Paths never included in a commit, mirroring the exclusion list applied
/// before `checkoutBranchAndCommit` stages changes.
pub const DEFAULT_EXCLUDED_COMMIT_PATHS: &[&str] = &[".git/", "node_modules/", ".env"];

/// Process-external inputs for one run, gathered into one struct so the
/// coordinator's phases stay pure functions of `(state, config)`.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub thread_id: String,
    pub run_id: String,
    pub owner: String,
    pub repo: String,
    pub base_branch: String,
    pub base_commit: Option<String>,
    pub custom_rules: Option<String>,
    pub model_overrides: HashMap<LLMTask, String>,
    pub multi_provider_enabled: bool,
    pub sandbox_provider: SandboxProviderType,
    pub clone_url: String,
    pub clone_token: String,
    pub skip_ci: bool,
    pub excluded_commit_paths: Vec<String>,
}

impl RunConfig {
    pub fn new(thread_id: impl Into<String>, owner: impl Into<String>, repo: impl Into<String>, base_branch: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            run_id: String::new(),
            owner: owner.into(),
            repo: repo.into(),
            base_branch: base_branch.into(),
            base_commit: None,
            custom_rules: None,
            model_overrides: HashMap::new(),
            multi_provider_enabled: false,
            sandbox_provider: SandboxProviderType::Local,
            clone_url: String::new(),
            clone_token: String::new(),
            skip_ci: false,
            excluded_commit_paths: DEFAULT_EXCLUDED_COMMIT_PATHS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Base commit-message string; ` [skip ci]` is appended when the run's
/// CI-skip flag is set.
pub fn commit_message(skip_ci: bool) -> String {
    if skip_ci {
        "Apply patch [skip ci]".to_string()
    } else {
        "Apply patch".to_string()
    }
}

fn filter_excluded(paths: &[String], excludes: &[String]) -> Vec<String> {
    paths
        .iter()
        .filter(|p| !excludes.iter().any(|ex| p.starts_with(ex.as_str())))
        .cloned()
        .collect()
}

/// Thin reducer-style sequencer over the phases described for the agent
/// graph: one call to [`GraphCoordinator::step`] advances the thread by one
/// phase-node execution and returns the updated state for the caller to
/// persist via the injected [`crate::store::ThreadStore`].
pub struct GraphCoordinator {
    pub github: Arc<dyn GitHubOps>,
    pub progress: Arc<dyn ProgressSink>,
    pub turn_driver: Arc<dyn TurnDriver>,
    pub sandbox_provider: Arc<dyn SandboxProvider>,
}

impl GraphCoordinator {
    pub fn new(
        github: Arc<dyn GitHubOps>,
        progress: Arc<dyn ProgressSink>,
        turn_driver: Arc<dyn TurnDriver>,
        sandbox_provider: Arc<dyn SandboxProvider>,
    ) -> Self {
        Self {
            github,
            progress,
            turn_driver,
            sandbox_provider,
        }
    }

    async fn emit(&self, kind: &str, fields: serde_json::Value) {
        self.progress.emit(ProgressEvent::new(kind, 0, fields)).await;
    }

    pub async fn step(&self, mut state: ThreadState, config: &RunConfig) -> Result<ThreadState, GraphError> {
        match state.phase {
            Phase::InitializeSandbox => self.initialize_sandbox(&mut state, config).await?,
            Phase::Planner => self.run_turn_phase(&mut state, Phase::Planner, Phase::Programmer).await?,
            Phase::Programmer => self.run_turn_phase(&mut state, Phase::Programmer, Phase::CheckoutAndCommit).await?,
            Phase::CheckoutAndCommit => self.checkout_and_commit(&mut state, config).await?,
            Phase::Reviewer => self.run_reviewer(&mut state).await?,
            Phase::Done | Phase::Failed => {}
        }
        Ok(state)
    }

    async fn initialize_sandbox(&self, state: &mut ThreadState, config: &RunConfig) -> Result<(), GraphError> {
        self.emit("initialize_sandbox_start", serde_json::json!({"thread_id": state.thread_id})).await;

        let handle = if let Some(id) = &state.sandbox_session_id {
            self.sandbox_provider.resume(id).await?
        } else {
            self.sandbox_provider.create().await?
        };

        state.sandbox_session_id = Some(handle.id.clone());
        state.sandbox_provider_type = Some(match handle.provider_type {
            ProviderType::ContainerVm => SandboxProviderType::ContainerVm,
            ProviderType::MicroVm => SandboxProviderType::MicroVm,
            ProviderType::Local => SandboxProviderType::Local,
        });

        if !matches!(state.sandbox_provider_type, Some(SandboxProviderType::Local)) && !config.clone_url.is_empty() {
            let sandbox = self.sandbox_provider.connect(&handle.id).await?;
            clone_into_sandbox(sandbox.as_ref(), state, config).await?;
            let listing = list_tracked_files(sandbox.as_ref()).await.unwrap_or_default();
            state.codebase_tree = Some(tree::encode(&listing));
            state.custom_rules = config.custom_rules.clone();
        }

        state.phase = Phase::Planner;
        self.emit("initialize_sandbox_done", serde_json::json!({})).await;
        Ok(())
    }

    async fn run_turn_phase(&self, state: &mut ThreadState, phase: Phase, next_phase: Phase) -> Result<(), GraphError> {
        self.emit(&format!("{:?}_start", phase).to_lowercase(), serde_json::json!({})).await;

        let outcome = self.turn_driver.run_turn(state, phase).await.map_err(GraphError::Other)?;

        state.internal_messages.push(outcome.ai_message.clone());
        state.internal_messages.extend(outcome.tool_results.clone());
        state.messages.push(outcome.ai_message.clone());

        if let Some(plan) = outcome.task_plan {
            state.task_plan = plan;
        }
        if let Some(session_id) = outcome.sandbox_session_id {
            state.sandbox_session_id = Some(session_id);
        }

        if !outcome.has_tool_calls || outcome.mark_task_completed || outcome.terminate {
            state.phase = next_phase;
        }

        self.emit("action_generated", serde_json::json!({"phase": format!("{:?}", phase)})).await;
        Ok(())
    }

    async fn checkout_and_commit(&self, state: &mut ThreadState, config: &RunConfig) -> Result<(), GraphError> {
        if state.branch_name == state.base_branch {
            state.branch_name = format!("open-swe/{}", state.thread_id);
        }
        state.assert_branch_diverges()?;

        if let Some(session_id) = state.sandbox_session_id.clone() {
            let sandbox = self.sandbox_provider.connect(&session_id).await?;
            let message = commit_message(config.skip_ci);
            commit_and_push(sandbox.as_ref(), &state.branch_name, &message, &config.excluded_commit_paths).await?;
        }

        let existing = self
            .github
            .find_existing_pull_request(&state.owner, &state.repo, &state.branch_name)
            .await
            .map_err(GraphError::GitHub)?;

        let pr = match existing {
            Some(pr) => pr,
            None => self
                .github
                .open_pull_request(&state.owner, &state.repo, &state.branch_name, &state.base_branch, "Automated changes", true)
                .await
                .map_err(GraphError::GitHub)?,
        };
        state.pull_request_number = Some(pr.number);
        state.phase = Phase::Reviewer;
        self.emit("checkout_and_commit_done", serde_json::json!({"pull_request_number": pr.number})).await;
        Ok(())
    }

    async fn run_reviewer(&self, state: &mut ThreadState) -> Result<(), GraphError> {
        let outcome = self.turn_driver.run_turn(state, Phase::Reviewer).await.map_err(GraphError::Other)?;
        state.internal_messages.push(outcome.ai_message.clone());
        state.internal_messages.extend(outcome.tool_results.clone());
        state.messages.push(outcome.ai_message);

        if !outcome.has_tool_calls || outcome.mark_task_completed {
            if let Some(number) = state.pull_request_number {
                self.github
                    .update_pull_request(&state.owner, &state.repo, number, true)
                    .await
                    .map_err(GraphError::GitHub)?;
            }
            state.phase = Phase::Done;
        } else {
            state.phase = Phase::Programmer;
        }
        Ok(())
    }
}

async fn clone_into_sandbox(sandbox: &dyn Sandbox, state: &ThreadState, config: &RunConfig) -> Result<(), GraphError> {
    sven_sandbox::clone_repository(
        sandbox,
        CloneRequest {
            url: &config.clone_url,
            target_dir: "repo",
            branch: &state.branch_name,
            base_branch: &state.base_branch,
            commit: config.base_commit.as_deref(),
            token: &config.clone_token,
        },
    )
    .await?;
    Ok(())
}

async fn list_tracked_files(sandbox: &dyn Sandbox) -> Result<Vec<String>, GraphError> {
    let result = sandbox
        .execute_command("git -C repo ls-files", sven_sandbox::ExecuteCommandOptions::with_timeout(30))
        .await?;
    Ok(result.stdout.lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect())
}

async fn commit_and_push(sandbox: &dyn Sandbox, branch: &str, message: &str, excluded: &[String]) -> Result<(), GraphError> {
    let status = sandbox
        .execute_command("git -C repo status --porcelain", sven_sandbox::ExecuteCommandOptions::with_timeout(30))
        .await?;
    let changed: Vec<String> = status
        .stdout
        .lines()
        .filter_map(|line| line.get(3..).map(|s| s.to_string()))
        .collect();
    let staged = filter_excluded(&changed, excluded);
    if staged.is_empty() {
        return Ok(());
    }
    for path in &staged {
        sandbox
            .execute_command(&format!("git -C repo add -- {path}"), sven_sandbox::ExecuteCommandOptions::with_timeout(30))
            .await?;
    }
    sandbox
        .execute_command(&format!("git -C repo commit -m {message:?}"), sven_sandbox::ExecuteCommandOptions::with_timeout(30))
        .await?;
    let push = sandbox
        .execute_command(&format!("git -C repo push origin {branch}"), sven_sandbox::ExecuteCommandOptions::with_timeout(60))
        .await?;
    if !push.success() {
        sandbox
            .execute_command(&format!("git -C repo pull --rebase origin {branch}"), sven_sandbox::ExecuteCommandOptions::with_timeout(60))
            .await?;
        sandbox
            .execute_command(&format!("git -C repo push origin {branch}"), sven_sandbox::ExecuteCommandOptions::with_timeout(60))
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullProgressSink;
    use crate::github::NullGitHubOps;
    use crate::turn::TurnOutcome;
    use async_trait::async_trait;
    use sven_model::{Message, MessageContent, Role};
    use sven_sandbox::LocalSandboxProvider;

    struct StubTurnDriver {
        has_tool_calls: bool,
    }

    #[async_trait]
    impl TurnDriver for StubTurnDriver {
        async fn run_turn(&self, _state: &ThreadState, _phase: Phase) -> anyhow::Result<TurnOutcome> {
            Ok(TurnOutcome {
                ai_message: Message {
                    role: Role::Assistant,
                    content: MessageContent::Text("ok".into()),
                },
                tool_results: vec![],
                task_plan: None,
                sandbox_session_id: None,
                has_tool_calls: self.has_tool_calls,
                mark_task_completed: false,
                terminate: false,
            })
        }
    }

    fn coordinator(has_tool_calls: bool) -> GraphCoordinator {
        GraphCoordinator::new(
            Arc::new(NullGitHubOps::new()),
            Arc::new(NullProgressSink),
            Arc::new(StubTurnDriver { has_tool_calls }),
            Arc::new(LocalSandboxProvider::new(std::env::temp_dir())),
        )
    }

    #[tokio::test]
    async fn planner_advances_to_programmer_when_turn_has_no_tool_calls() {
        let coord = coordinator(false);
        let state = ThreadState::new("t1", "acme", "widgets", "main");
        let config = RunConfig::new("t1", "acme", "widgets", "main");
        let state = coord.step(state, &config).await.unwrap();
        assert_eq!(state.phase, Phase::Planner);
        let state = coord.step(state, &config).await.unwrap();
        assert_eq!(state.phase, Phase::Programmer);
    }

    #[tokio::test]
    async fn planner_stays_in_phase_while_tool_calls_continue() {
        let coord = coordinator(true);
        let mut state = ThreadState::new("t1", "acme", "widgets", "main");
        state.phase = Phase::Planner;
        let config = RunConfig::new("t1", "acme", "widgets", "main");
        let state = coord.step(state, &config).await.unwrap();
        assert_eq!(state.phase, Phase::Planner);
    }

    #[tokio::test]
    async fn checkout_forces_a_feature_branch_when_equal_to_base() {
        let coord = coordinator(false);
        let mut state = ThreadState::new("t1", "acme", "widgets", "main");
        state.phase = Phase::CheckoutAndCommit;
        state.branch_name = "main".to_string();
        let config = RunConfig::new("t1", "acme", "widgets", "main");
        let state = coord.step(state, &config).await.unwrap();
        assert_ne!(state.branch_name, state.base_branch);
        assert_eq!(state.phase, Phase::Reviewer);
    }

    #[test]
    fn commit_message_appends_skip_ci_suffix() {
        assert_eq!(commit_message(false), "Apply patch");
        assert_eq!(commit_message(true), "Apply patch [skip ci]");
    }

    #[test]
    fn filter_excluded_drops_matching_prefixes() {
        let files = vec![".git/HEAD".to_string(), "src/lib.rs".to_string(), "node_modules/x".to_string()];
        let kept = filter_excluded(&files, &DEFAULT_EXCLUDED_COMMIT_PATHS.iter().map(|s| s.to_string()).collect::<Vec<_>>());
        assert_eq!(kept, vec!["src/lib.rs".to_string()]);
    }
}
