// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use sven_model::Message;

use crate::plan::TaskPlan;
use crate::state::Phase;

/// One agent turn's effect on thread state, as handed back to the
/// coordinator's phase loop. The turn driver itself (assembling tools,
/// invoking the fallback runtime, running the loop detector) lives in
/// `sven-core`; this crate only depends on the shape of its result so
/// that `sven-graph` never needs to depend on `sven-core`.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub ai_message: Message,
    pub tool_results: Vec<Message>,
    pub task_plan: Option<TaskPlan>,
    pub sandbox_session_id: Option<String>,
    pub has_tool_calls: bool,
    pub mark_task_completed: bool,
    pub terminate: bool,
}

/// Injected seam for C5. A turn driver produces the next turn's messages
/// for the given phase; the coordinator decides when a phase is over.
#[async_trait]
pub trait TurnDriver: Send + Sync {
    async fn run_turn(&self, state: &crate::state::ThreadState, phase: Phase) -> anyhow::Result<TurnOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use sven_model::{Message, MessageContent, Role};

    #[test]
    fn outcome_carries_termination_signal() {
        let outcome = TurnOutcome {
            ai_message: Message {
                role: Role::Assistant,
                content: MessageContent::Text("done".into()),
            },
            tool_results: vec![],
            task_plan: None,
            sandbox_session_id: None,
            has_tool_calls: false,
            mark_task_completed: false,
            terminate: true,
        };
        assert!(outcome.terminate);
        assert!(!outcome.has_tool_calls);
    }
}
