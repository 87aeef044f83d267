// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Generalises [`crate::agent::Agent`]'s single-provider
//! `stream_one_turn` into a provider-array-aware turn driver that calls
//! into the fallback runtime and loop detector instead of a single bound
//! `ModelProvider`. Implements [`sven_graph::TurnDriver`] so the graph
//! coordinator can drive planner/programmer/reviewer phases without
//! depending on this crate directly.
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;

use sven_fallback::{BoundModel, FallbackRuntime};
use sven_loopguard::{LoopDetectorConfig, Recommendation};
use sven_model::{CompletionRequest, FunctionCall, Message, MessageContent, ResponseEvent, Role, ToolResultContent};
use sven_tools::{ToolCall as ToolInvocation, ToolRegistry};

use sven_graph::{Phase, ThreadState, TurnDriver, TurnOutcome};

fn progress_event_kind(phase: Phase) -> &'static str {
    match phase {
        Phase::Planner => "planner_turn",
        Phase::Programmer => "programmer_turn",
        Phase::Reviewer => "reviewer_turn",
        _ => "turn",
    }
}

/// Synthesises the AI message the loop detector's escalation ladder asks
/// for: either a `mark_task_completed` or a `request_human_help` tool
/// call carrying a human-readable reason.
fn synthetic_escalation_message(tool_name: &str, reason: String) -> Message {
    Message {
        role: Role::Assistant,
        content: MessageContent::ToolCall {
            tool_call_id: format!("loopguard_{tool_name}"),
            function: FunctionCall {
                name: tool_name.to_string(),
                arguments: serde_json::json!({ "reason": reason }).to_string(),
            },
        },
    }
}

/// Provider-array-aware replacement for `Agent::stream_one_turn`: builds
/// the tool set and message history for the active phase, runs the loop
/// detector, and hands the request to [`FallbackRuntime`].
pub struct ProgrammerTurnDriver {
    tools: Arc<ToolRegistry>,
    candidates: Vec<BoundModel>,
    fallback: FallbackRuntime,
    loop_config: LoopDetectorConfig,
}

impl ProgrammerTurnDriver {
    pub fn new(tools: Arc<ToolRegistry>, candidates: Vec<BoundModel>, loop_config: LoopDetectorConfig) -> Self {
        Self {
            tools,
            candidates,
            fallback: FallbackRuntime::new(),
            loop_config,
        }
    }

    async fn execute_first_tool_call(&self, ai_message: &Message) -> Vec<Message> {
        let MessageContent::ToolCall { tool_call_id, function } = &ai_message.content else {
            return Vec::new();
        };
        let args: serde_json::Value = serde_json::from_str(&function.arguments).unwrap_or(serde_json::Value::Null);
        let call = ToolInvocation {
            id: tool_call_id.clone(),
            name: function.name.clone(),
            args,
        };
        let output = self.tools.execute(&call).await;
        vec![Message {
            role: Role::Tool,
            content: MessageContent::ToolResult {
                tool_call_id: output.call_id,
                content: ToolResultContent::Text(output.content),
            },
        }]
    }
}

#[async_trait]
impl TurnDriver for ProgrammerTurnDriver {
    async fn run_turn(&self, state: &ThreadState, phase: Phase) -> anyhow::Result<TurnOutcome> {
        let report = sven_loopguard::detect(&state.internal_messages, &self.loop_config);

        match report.recommendation {
            Recommendation::ForceComplete => {
                let msg = synthetic_escalation_message("mark_task_completed", report.detail.clone());
                return Ok(TurnOutcome {
                    ai_message: msg,
                    tool_results: Vec::new(),
                    task_plan: None,
                    sandbox_session_id: None,
                    has_tool_calls: true,
                    mark_task_completed: true,
                    terminate: true,
                });
            }
            Recommendation::RequestHelp => {
                let msg = synthetic_escalation_message("request_human_help", report.detail.clone());
                return Ok(TurnOutcome {
                    ai_message: msg,
                    tool_results: Vec::new(),
                    task_plan: None,
                    sandbox_session_id: None,
                    has_tool_calls: true,
                    mark_task_completed: false,
                    terminate: true,
                });
            }
            Recommendation::Warn | Recommendation::Continue => {}
        }

        let schemas = self.tools.schemas_for_mode(sven_config::AgentMode::Agent);
        let tool_schemas: Vec<sven_model::ToolSchema> = schemas
            .into_iter()
            .map(|s| sven_model::ToolSchema {
                name: s.name,
                description: s.description,
                parameters: s.parameters,
            })
            .collect();

        let mut messages = state.internal_messages.clone();
        if report.recommendation == Recommendation::Warn {
            messages.push(Message::user(format!("[loop-warning] {}", report.detail)));
        }

        let req = CompletionRequest {
            messages,
            tools: tool_schemas,
            stream: true,
            system_dynamic_suffix: None,
            cache_key: Some(state.thread_id.clone()),
            ..Default::default()
        };

        let mut stream = self.fallback.invoke(&self.candidates, req).await?;

        let mut full_text = String::new();
        let mut tool_call: Option<(String, String, String)> = None;
        while let Some(event) = stream.next().await {
            match event? {
                ResponseEvent::TextDelta(delta) => full_text.push_str(&delta),
                ResponseEvent::ToolCall { id, name, arguments, .. } => {
                    let entry = tool_call.get_or_insert_with(|| (String::new(), String::new(), String::new()));
                    if !id.is_empty() {
                        entry.0 = id;
                    }
                    if !name.is_empty() {
                        entry.1 = name;
                    }
                    entry.2.push_str(&arguments);
                }
                ResponseEvent::Done => break,
                _ => {}
            }
        }

        let (ai_message, has_tool_calls) = match tool_call {
            Some((id, name, arguments)) if !name.is_empty() => (
                Message {
                    role: Role::Assistant,
                    content: MessageContent::ToolCall {
                        tool_call_id: if id.is_empty() { format!("tc_{}", &name) } else { id },
                        function: FunctionCall { name, arguments },
                    },
                },
                true,
            ),
            _ => (Message::assistant(&full_text), false),
        };

        let tool_results = if has_tool_calls {
            self.execute_first_tool_call(&ai_message).await
        } else {
            Vec::new()
        };

        let mark_task_completed = matches!(&ai_message.content, MessageContent::ToolCall { function, .. } if function.name == "mark_task_completed");

        tracing::debug!(phase = progress_event_kind(phase), has_tool_calls, "turn completed");

        Ok(TurnOutcome {
            ai_message,
            tool_results,
            task_plan: None,
            sandbox_session_id: None,
            has_tool_calls,
            mark_task_completed,
            terminate: false,
        })
    }
}
