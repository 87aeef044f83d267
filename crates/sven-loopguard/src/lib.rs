// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod classify;
pub mod detect;
pub mod types;

pub use detect::detect;
pub use types::{LoopDetectorConfig, LoopReport, LoopType, Recommendation, ToolCallSignature};
