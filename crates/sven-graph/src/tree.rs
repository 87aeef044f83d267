// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::BTreeMap;

/// Files directly contained in a directory are listed under this key;
/// every other key in a node is a subdirectory.
const FILES_KEY: &str = "_";

/// Maximum number of file entries folded into a tree encoding. Excess
/// entries are dropped (sorted order, so the drop is deterministic).
pub const MAX_TREE_FILES: usize = 8_000;

#[derive(Debug, Default)]
struct TreeNode {
    files: Vec<String>,
    children: BTreeMap<String, TreeNode>,
}

impl TreeNode {
    fn insert(&mut self, mut parts: std::str::Split<'_, char>) {
        match parts.next() {
            None => {}
            Some(last) if parts.clone().next().is_none() => {
                self.files.push(last.to_string());
            }
            Some(dir) => {
                self.children.entry(dir.to_string()).or_default().insert(parts);
            }
        }
    }

    fn to_value(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        if !self.files.is_empty() {
            let mut files = self.files.clone();
            files.sort();
            files.dedup();
            map.insert(FILES_KEY.to_string(), serde_json::json!(files));
        }
        for (name, child) in &self.children {
            map.insert(name.clone(), child.to_value());
        }
        serde_json::Value::Object(map)
    }
}

/// Folds a flat list of repo-relative paths into the nested-dict encoding:
/// `{dir:{subdir:{_:[file1,file2]}}}`. Input is deduped and sorted before
/// encoding; entries beyond `MAX_TREE_FILES` are dropped.
pub fn encode(paths: &[String]) -> String {
    let mut sorted: Vec<String> = paths.to_vec();
    sorted.sort();
    sorted.dedup();
    sorted.truncate(MAX_TREE_FILES);

    let mut root = TreeNode::default();
    for path in &sorted {
        root.insert(path.split('/'));
    }
    serde_json::to_string(&root.to_value()).unwrap_or_default()
}

/// Recovers the sorted, deduplicated, capped path list that would have
/// produced `encoded`. Returns an error if the string is not valid JSON.
pub fn decode(encoded: &str) -> anyhow::Result<Vec<String>> {
    let value: serde_json::Value = serde_json::from_str(encoded)?;
    let mut out = Vec::new();
    walk(&value, "", &mut out);
    out.sort();
    out.dedup();
    Ok(out)
}

fn walk(value: &serde_json::Value, prefix: &str, out: &mut Vec<String>) {
    let Some(obj) = value.as_object() else {
        return;
    };
    for (key, child) in obj {
        if key == FILES_KEY {
            if let Some(files) = child.as_array() {
                for f in files {
                    if let Some(name) = f.as_str() {
                        out.push(if prefix.is_empty() {
                            name.to_string()
                        } else {
                            format!("{prefix}/{name}")
                        });
                    }
                }
            }
        } else {
            let next_prefix = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}/{key}")
            };
            walk(child, &next_prefix, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_nested_paths() {
        let files = vec![
            "src/lib.rs".to_string(),
            "src/main.rs".to_string(),
            "README.md".to_string(),
            "src/util/mod.rs".to_string(),
        ];
        let encoded = encode(&files);
        let decoded = decode(&encoded).unwrap();
        let mut expected = files.clone();
        expected.sort();
        expected.dedup();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn dedupes_duplicate_entries() {
        let files = vec!["a.rs".to_string(), "a.rs".to_string(), "b.rs".to_string()];
        let decoded = decode(&encode(&files)).unwrap();
        assert_eq!(decoded, vec!["a.rs".to_string(), "b.rs".to_string()]);
    }

    #[test]
    fn caps_at_max_tree_files() {
        let files: Vec<String> = (0..MAX_TREE_FILES + 50).map(|i| format!("file{i:05}.rs")).collect();
        let decoded = decode(&encode(&files)).unwrap();
        assert_eq!(decoded.len(), MAX_TREE_FILES);
    }

    #[test]
    fn nests_subdirectories_under_directory_keys() {
        let files = vec!["src/a.rs".to_string(), "src/sub/b.rs".to_string()];
        let encoded = encode(&files);
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert!(value["src"]["_"].as_array().unwrap().iter().any(|v| v == "a.rs"));
        assert!(value["src"]["sub"]["_"].as_array().unwrap().iter().any(|v| v == "b.rs"));
    }

    #[test]
    fn empty_input_encodes_to_empty_object() {
        let encoded = encode(&[]);
        assert_eq!(encoded, "{}");
        assert!(decode(&encoded).unwrap().is_empty());
    }
}
