// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use regex::Regex;
use std::sync::OnceLock;

const READ_ONLY_TOOLS: &[&str] = &[
    "read_file",
    "list_dir",
    "grep",
    "find_file",
    "glob_file_search",
    "search_codebase",
    "search_knowledge",
    "web_fetch",
    "read_lints",
    "read_image",
];

const READ_ONLY_SHELL_FIRST_TOKENS: &[&str] =
    &["cat", "ls", "head", "tail", "grep", "find", "tree", "pwd", "echo", "wc"];

const WRITE_TOOLS: &[&str] = &["edit_file", "write", "apply_patch", "delete_file", "install_deps"];

const WRITE_SHELL_FIRST_TOKENS: &[&str] =
    &["npm", "yarn", "pnpm", "mkdir", "touch", "rm", "mv", "cp", "git"];

fn shell_first_token(args: &serde_json::Value) -> Option<String> {
    args.get("shell_command")
        .or_else(|| args.get("command"))
        .and_then(|v| v.as_str())
        .and_then(|s| s.split_whitespace().next())
        .map(|t| t.to_string())
}

pub fn is_read_only_tool(name: &str, args: &serde_json::Value) -> bool {
    if READ_ONLY_TOOLS.contains(&name) {
        return true;
    }
    if name == "shell" || name == "run_terminal_command" {
        if let Some(token) = shell_first_token(args) {
            return READ_ONLY_SHELL_FIRST_TOKENS.contains(&token.as_str());
        }
    }
    false
}

pub fn is_write_tool(name: &str, args: &serde_json::Value) -> bool {
    if WRITE_TOOLS.contains(&name) {
        return true;
    }
    if name == "shell" || name == "run_terminal_command" {
        if let Some(token) = shell_first_token(args) {
            return WRITE_SHELL_FIRST_TOKENS.contains(&token.as_str());
        }
    }
    false
}

fn error_patterns() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(traceback|error:|failed:|exception|panicked|exit code [1-9]|0 occurrences found|no such file|permission denied)")
            .expect("static pattern is valid")
    })
}

fn rate_limit_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)rate.?limit").expect("static pattern is valid"))
}

/// `is_error` is the tool's own error flag when known; `content` is the
/// textual tool result. Rate-limit phrasing is explicitly excluded — it is
/// a legitimate retry signal, not evidence of a stuck loop.
pub fn is_error_result(is_error: Option<bool>, content: &str) -> bool {
    if let Some(flag) = is_error {
        if flag {
            return true;
        }
    }
    if rate_limit_pattern().is_match(content) {
        return false;
    }
    error_patterns().is_match(content)
}

/// Extracts a canonical target-file path for a tool call, where applicable,
/// used by the read-only/similar-calls/edit-loop detectors to decide
/// whether repeated calls are converging on one file.
pub fn extract_target_file(name: &str, args: &serde_json::Value) -> Option<String> {
    let candidates = ["path", "file_path", "target_file", "filepath"];
    for key in candidates {
        if let Some(p) = args.get(key).and_then(|v| v.as_str()) {
            return Some(normalize_path(p));
        }
    }
    None
}

fn normalize_path(p: &str) -> String {
    p.trim_start_matches("./").to_string()
}

/// Cheap word-level Jaccard similarity, used by the chanting detector to
/// decide whether consecutive assistant messages are substantively the
/// same text repeated.
pub fn jaccard_similarity(a: &str, b: &str) -> f32 {
    let set_a: std::collections::HashSet<&str> = a.split_whitespace().collect();
    let set_b: std::collections::HashSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}
