// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use sven_model::{ModelProvider, ToolChoice, ToolSchema};

/// A model together with the tools and call options it is currently bound
/// to. Composition methods (`with_tools`, `with_tool_choice`,
/// `without_parallel_tool_calls`) return a new `BoundModel` instead of
/// mutating hidden state, so a caller can never end up with a populated
/// `tools` vector silently dropped by an intermediate wrapper.
#[derive(Clone)]
pub struct BoundModel {
    pub model: Arc<dyn ModelProvider>,
    pub tools: Vec<ToolSchema>,
    pub tool_choice: Option<ToolChoice>,
    pub parallel_tool_calls: Option<bool>,
}

impl BoundModel {
    pub fn new(model: Arc<dyn ModelProvider>) -> Self {
        Self {
            model,
            tools: Vec::new(),
            tool_choice: None,
            parallel_tool_calls: None,
        }
    }

    pub fn with_tools(&self, tools: Vec<ToolSchema>) -> Self {
        Self {
            tools,
            ..self.clone()
        }
    }

    pub fn with_tool_choice(&self, tool_choice: ToolChoice) -> Self {
        Self {
            tool_choice: Some(tool_choice),
            ..self.clone()
        }
    }

    pub fn without_parallel_tool_calls(&self) -> Self {
        Self {
            parallel_tool_calls: Some(false),
            ..self.clone()
        }
    }

    /// Stable key used by the circuit breaker and progress logging:
    /// `"{provider}/{model}"`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.model.name(), self.model.model_name())
    }
}
