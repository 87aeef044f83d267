// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod coordinator;
pub mod error;
pub mod events;
pub mod github;
pub mod plan;
pub mod state;
pub mod store;
pub mod tree;
pub mod turn;

pub use coordinator::{commit_message, GraphCoordinator, RunConfig, DEFAULT_EXCLUDED_COMMIT_PATHS};
pub use error::GraphError;
pub use events::{ChannelProgressSink, NullProgressSink, ProgressEvent, ProgressSink};
pub use github::{GitHubOps, NullGitHubOps, PullRequestRef};
pub use plan::{PlanItem, PlanRevision, Task, TaskPlan};
pub use state::{Phase, SandboxProviderType, ThreadState};
pub use store::{MemoryThreadStore, ThreadStore};
pub use turn::{TurnDriver, TurnOutcome};
