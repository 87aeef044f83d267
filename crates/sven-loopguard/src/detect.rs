// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;

use sven_model::{Message, MessageContent, Role};

use crate::classify::{extract_target_file, is_error_result, is_read_only_tool, is_write_tool, jaccard_similarity};
use crate::types::{canonical_hash, LoopDetectorConfig, LoopReport, LoopType, Recommendation, ToolCallSignature};

#[derive(Debug, Clone)]
struct ToolEvent {
    tool_call_id: String,
    name: String,
    signature: ToolCallSignature,
    target_file: Option<String>,
    read_only: bool,
    write: bool,
    is_build_command: bool,
}

fn is_build_command(name: &str, args: &serde_json::Value) -> bool {
    if name != "shell" && name != "run_terminal_command" {
        return false;
    }
    let command = args
        .get("shell_command")
        .or_else(|| args.get("command"))
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let lower = command.to_ascii_lowercase();
    ["build", "test", "lint", "check", "compile"]
        .iter()
        .any(|kw| lower.contains(kw))
}

fn extract_tool_events(messages: &[Message]) -> Vec<ToolEvent> {
    let mut events = Vec::new();
    for m in messages {
        if let MessageContent::ToolCall { tool_call_id, function } = &m.content {
            if !matches!(m.role, Role::Assistant) {
                continue;
            }
            let args: serde_json::Value =
                serde_json::from_str(&function.arguments).unwrap_or(serde_json::Value::Null);
            events.push(ToolEvent {
                tool_call_id: tool_call_id.clone(),
                name: function.name.clone(),
                signature: ToolCallSignature::new(function.name.clone(), &args),
                target_file: extract_target_file(&function.name, &args),
                read_only: is_read_only_tool(&function.name, &args),
                write: is_write_tool(&function.name, &args),
                is_build_command: is_build_command(&function.name, &args),
            });
        }
    }
    events
}

struct ToolResult {
    is_error: bool,
    output_hash: String,
}

fn extract_tool_results(messages: &[Message]) -> HashMap<String, ToolResult> {
    let mut results = HashMap::new();
    for m in messages {
        if let MessageContent::ToolResult { tool_call_id, content } = &m.content {
            let text = content.to_string();
            results.insert(
                tool_call_id.clone(),
                ToolResult {
                    is_error: is_error_result(None, &text),
                    output_hash: canonical_hash(&serde_json::Value::String(text)),
                },
            );
        }
    }
    results
}

/// Counts how many prior loop warnings have already been injected into the
/// human-authored messages in this window, used to drive the escalation
/// ladder (warn → request_help → force_complete).
fn prior_warning_count(messages: &[Message]) -> u32 {
    messages
        .iter()
        .filter(|m| matches!(m.role, Role::User))
        .filter_map(|m| m.as_text())
        .filter(|t| t.contains("[loop-detector]"))
        .count() as u32
}

fn already_requested_help(messages: &[Message], within_last: usize) -> bool {
    messages
        .iter()
        .rev()
        .take(within_last)
        .filter_map(|m| match &m.content {
            MessageContent::ToolCall { function, .. } => Some(function.name.as_str()),
            _ => None,
        })
        .any(|name| name == "request_human_help")
}

/// Length of the longest suffix of `keys` that repeats with period
/// `period` (i.e. `keys[i] == keys[i + period]` for every `i` in the
/// suffix). Returns 0 if the slice is too short to contain even one full
/// period-sized repeat.
fn periodic_suffix_len<K: PartialEq>(keys: &[K], period: usize) -> usize {
    let n = keys.len();
    if n <= period {
        return 0;
    }
    let mut len = period;
    let mut i = n - period - 1;
    loop {
        if keys[i] == keys[i + period] {
            len += 1;
            if i == 0 {
                break;
            }
            i -= 1;
        } else {
            break;
        }
    }
    len
}

/// Alternating loops: the agent keeps returning to an earlier tool call
/// instead of making new progress. Checks exact-call periods 2 (A,B,A,B)
/// and 3 (A,B,C,A,B,C) first, then falls back to a file-level period-2
/// check restricted to edits, so "oscillating edits between two files" is
/// still caught when the edit's arguments differ call to call.
/// Returns `(period, patternLength)` of the longest oscillation found.
fn detect_alternating(events: &[ToolEvent]) -> Option<(usize, usize)> {
    let sigs: Vec<&ToolCallSignature> = events.iter().map(|e| &e.signature).collect();
    for period in [2usize, 3usize] {
        let len = periodic_suffix_len(&sigs, period);
        if len >= period * 2 {
            let cycle = &sigs[sigs.len() - period..];
            let distinct: std::collections::HashSet<&&ToolCallSignature> = cycle.iter().collect();
            if distinct.len() > 1 {
                return Some((period, len));
            }
        }
    }

    let edit_targets: Vec<&str> = events
        .iter()
        .filter(|e| e.write)
        .filter_map(|e| e.target_file.as_deref())
        .collect();
    let len = periodic_suffix_len(&edit_targets, 2);
    if len >= 4 {
        let cycle = &edit_targets[edit_targets.len() - 2..];
        if cycle[0] != cycle[1] {
            return Some((2, len));
        }
    }

    None
}

fn escalate(rec: Recommendation, already_helped: bool) -> Recommendation {
    match rec {
        Recommendation::Continue => Recommendation::Warn,
        Recommendation::Warn => Recommendation::RequestHelp,
        Recommendation::RequestHelp if already_helped => Recommendation::ForceComplete,
        Recommendation::RequestHelp => Recommendation::RequestHelp,
        Recommendation::ForceComplete => Recommendation::ForceComplete,
    }
}

/// Pure, deterministic analysis of the trailing window of `messages`.
/// Never mutates, never performs IO — calling `detect` twice with the same
/// slice always returns the same report.
pub fn detect(messages: &[Message], config: &LoopDetectorConfig) -> LoopReport {
    let start = messages.len().saturating_sub(config.history_window);
    let window = &messages[start..];
    let events = extract_tool_events(window);
    let results = extract_tool_results(window);
    let already_helped = already_requested_help(window, 10);

    if events.is_empty() {
        return LoopReport::none();
    }

    // Chanting: consecutive highly-similar assistant text messages.
    let assistant_texts: Vec<&str> = window
        .iter()
        .filter(|m| matches!(m.role, Role::Assistant))
        .filter_map(|m| m.as_text())
        .collect();
    if assistant_texts.len() >= config.chanting_threshold {
        let tail = &assistant_texts[assistant_texts.len() - config.chanting_threshold..];
        let all_similar = tail
            .windows(2)
            .all(|pair| jaccard_similarity(pair[0], pair[1]) >= config.chanting_similarity);
        if all_similar {
            return LoopReport {
                loop_type: LoopType::Chanting,
                recommendation: Recommendation::ForceComplete,
                repeat_count: tail.len(),
                detail: "repeated near-identical assistant messages".into(),
            };
        }
    }

    // Build-fix-retry suppression: alternating build/test/lint shell calls
    // with edits whose content is not highly similar is legitimate work.
    let tail_n = events.len().min(config.loop_threshold as usize);
    let tail_events = &events[events.len() - tail_n..];
    if tail_n >= 4 {
        let has_build = tail_events.iter().any(|e| e.is_build_command);
        let has_edit = tail_events.iter().any(|e| e.write && !e.is_build_command);
        if has_build && has_edit {
            let edit_hashes: Vec<&str> = tail_events
                .iter()
                .filter(|e| e.write && !e.is_build_command)
                .map(|e| e.signature.args_hash.as_str())
                .collect();
            let unique_edits: std::collections::HashSet<&str> = edit_hashes.iter().copied().collect();
            if unique_edits.len() > 1 {
                return LoopReport::none();
            }
        }
    }

    // Consecutive identical rounds.
    let last_sig = &events[events.len() - 1].signature;
    let mut repeat = 0usize;
    let mut output_hashes = std::collections::HashSet::new();
    for e in events.iter().rev() {
        if &e.signature == last_sig {
            repeat += 1;
            if let Some(r) = results.get(&e.tool_call_id) {
                output_hashes.insert(r.output_hash.clone());
            }
        } else {
            break;
        }
    }
    let varying_outputs = output_hashes.len() > 1;
    let effective_repeat = if varying_outputs {
        repeat.saturating_sub(2)
    } else {
        repeat
    };

    // Error-retry loop.
    let recent_results: Vec<&ToolResult> = events
        .iter()
        .rev()
        .take(config.error_retry_window)
        .filter_map(|e| results.get(&e.tool_call_id))
        .collect();
    if recent_results.len() >= config.error_retry_window {
        let error_count = recent_results.iter().filter(|r| r.is_error).count();
        let ratio = error_count as f32 / recent_results.len() as f32;
        if ratio >= config.error_retry_ratio {
            let rec = if effective_repeat as u32 >= config.force_completion_threshold {
                escalate(Recommendation::RequestHelp, already_helped)
            } else {
                Recommendation::RequestHelp
            };
            return LoopReport {
                loop_type: LoopType::ErrorRetry,
                recommendation: rec,
                repeat_count: error_count,
                detail: format!("{error_count}/{} recent tool results are errors", recent_results.len()),
            };
        }
    }

    // Edit loop: repeated failing edits on the same file.
    if let Some(target) = &events[events.len() - 1].target_file {
        if events[events.len() - 1].write {
            let same_target_failed = events
                .iter()
                .rev()
                .take_while(|e| e.target_file.as_deref() == Some(target.as_str()) && e.write)
                .filter(|e| results.get(&e.tool_call_id).map(|r| r.is_error).unwrap_or(false))
                .count();
            if same_target_failed as u32 >= config.edit_loop_threshold {
                let rec = if already_helped {
                    Recommendation::ForceComplete
                } else {
                    Recommendation::RequestHelp
                };
                return LoopReport {
                    loop_type: LoopType::EditLoop,
                    recommendation: rec,
                    repeat_count: same_target_failed,
                    detail: format!("{same_target_failed} consecutive failed edits on {target}"),
                };
            }
        }
    }

    // Alternating: A,B,A,B / A,B,C,A,B,C oscillation, or edits alternating
    // between exactly two files.
    if let Some((_period, pattern_length)) = detect_alternating(&events) {
        let recommendation = if pattern_length as u32 >= config.alternating_force_complete_length {
            Recommendation::ForceComplete
        } else {
            Recommendation::Warn
        };
        return LoopReport {
            loop_type: LoopType::Alternating,
            recommendation,
            repeat_count: pattern_length,
            detail: format!("{pattern_length} tool calls oscillating in a repeating pattern"),
        };
    }

    // Read-only loop: mostly reads, no writes, few distinct targets.
    let ro_n = events.len().min(config.read_only_window);
    let ro_tail = &events[events.len() - ro_n..];
    if ro_n == config.read_only_window {
        let ro_count = ro_tail.iter().filter(|e| e.read_only).count();
        let write_count = ro_tail.iter().filter(|e| e.write).count();
        let unique_targets: std::collections::HashSet<&str> = ro_tail
            .iter()
            .filter_map(|e| e.target_file.as_deref())
            .collect();
        let distinct_reads: std::collections::HashSet<&str> = ro_tail
            .iter()
            .filter(|e| e.read_only)
            .filter_map(|e| e.target_file.as_deref())
            .collect();
        let exploring = distinct_reads.len() >= config.exploration_unique_reads;
        if !exploring
            && write_count == 0
            && ro_count as f32 / ro_n as f32 >= config.read_only_ratio
            && unique_targets.len() <= config.read_only_max_unique_files
        {
            return LoopReport {
                loop_type: LoopType::ReadOnly,
                recommendation: if effective_repeat as u32 >= config.force_completion_threshold {
                    escalate(Recommendation::Warn, already_helped)
                } else {
                    Recommendation::Warn
                },
                repeat_count: ro_count,
                detail: "reading the same narrow set of files repeatedly with no writes".into(),
            };
        }
    }

    // Similar calls: long run of consecutive calls on the same target file.
    if let Some(target) = &events[events.len() - 1].target_file {
        let run = events
            .iter()
            .rev()
            .take_while(|e| e.target_file.as_deref() == Some(target.as_str()))
            .count();
        let all_read_only = events
            .iter()
            .rev()
            .take(run)
            .all(|e| e.read_only);
        let threshold = if all_read_only {
            config.similar_calls_read_only_threshold
        } else {
            config.similar_calls_threshold
        };
        if run as u32 >= threshold {
            let rec = if effective_repeat as u32 >= config.force_completion_threshold {
                escalate(Recommendation::Warn, already_helped)
            } else {
                Recommendation::Warn
            };
            return LoopReport {
                loop_type: LoopType::SimilarCalls,
                recommendation: rec,
                repeat_count: run,
                detail: format!("{run} consecutive calls targeting {target}"),
            };
        }
    }

    // Frequency: same tool key repeated often within a wider window.
    let freq_n = events.len().min(config.frequency_window);
    let freq_tail = &events[events.len() - freq_n..];
    if freq_n == config.frequency_window {
        let mut counts: HashMap<&str, u32> = HashMap::new();
        for e in freq_tail {
            *counts.entry(e.signature.args_hash.as_str()).or_insert(0) += 1;
        }
        if let Some((&_key, &count)) = counts.iter().max_by_key(|(_, c)| **c) {
            let unique_shell = freq_tail
                .iter()
                .filter(|e| e.name == "shell" || e.name == "run_terminal_command")
                .map(|e| e.signature.args_hash.as_str())
                .collect::<std::collections::HashSet<_>>()
                .len();
            let legitimate_breadth = unique_shell >= config.frequency_unique_shell_escape;
            let dominant_share = count as f32 / freq_n as f32;
            if count >= config.frequency_threshold && (!legitimate_breadth || dominant_share > 0.6) {
                return LoopReport {
                    loop_type: LoopType::Frequency,
                    recommendation: if effective_repeat as u32 >= config.force_completion_threshold {
                        escalate(Recommendation::Warn, already_helped)
                    } else {
                        Recommendation::Warn
                    },
                    repeat_count: count as usize,
                    detail: format!("same call repeated {count} times in last {freq_n} tool calls"),
                };
            }
        }
    }

    // Generic identical-round loop, checked last as the catch-all.
    if repeat as u32 >= config.loop_threshold {
        let prior_warnings = prior_warning_count(window);
        let mut rec = if effective_repeat as u32 >= config.force_completion_threshold {
            Recommendation::ForceComplete
        } else if repeat as u32 >= config.loop_threshold {
            Recommendation::Warn
        } else {
            Recommendation::Continue
        };
        if prior_warnings >= config.warning_escalation_threshold {
            rec = escalate(rec, already_helped);
        }
        return LoopReport {
            loop_type: LoopType::Verification,
            recommendation: rec,
            repeat_count: repeat,
            detail: format!("{repeat} consecutive identical tool calls"),
        };
    }

    LoopReport::none()
}
