//! Synthesis of the `exports` field of the published package manifest.

use anyhow::{anyhow, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entry::EntryPair;

const DECLARATION_FILE: &str = "index.d.ts";
const MODULE_FILE: &str = "index.js";

/// Public import path of an output plus the relative prefix its files live under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportKey {
    pub key: String,
    pub path_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportTarget {
    pub types: String,
    pub default: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportEntry {
    pub import: ExportTarget,
}

pub type ExportMap = IndexMap<String, ExportEntry>;

/// What to do when two outputs resolve to the same export key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Later entries silently replace earlier ones.
    #[default]
    Overwrite,
    /// Any collision is an error.
    Strict,
}

pub fn derive_export_key(output: &str) -> ExportKey {
    match output.split_once('/') {
        Some((dir, _)) => ExportKey {
            key: format!("./{}", dir),
            path_prefix: format!("./{}/", dir),
        },
        None => ExportKey {
            key: ".".to_string(),
            path_prefix: "./".to_string(),
        },
    }
}

impl ExportEntry {
    fn for_prefix(path_prefix: &str) -> Self {
        Self {
            import: ExportTarget {
                types: format!("{}{}", path_prefix, DECLARATION_FILE),
                default: format!("{}{}", path_prefix, MODULE_FILE),
            },
        }
    }
}

/// Build the export map in input order. A colliding key keeps its first
/// position and takes the value of the last pair.
pub fn build_export_map(pairs: &[EntryPair]) -> ExportMap {
    let mut exports = ExportMap::new();

    for pair in pairs {
        let ExportKey { key, path_prefix } = derive_export_key(&pair.output);
        if exports
            .insert(key.clone(), ExportEntry::for_prefix(&path_prefix))
            .is_some()
        {
            tracing::debug!(key = %key, output = %pair.output, "Export key overwritten");
        }
    }

    exports
}

/// Reject pairs whose outputs share an export key, when the policy asks for it.
///
/// Sub-manifests are keyed by the same top-level directory, so passing this
/// check also rules out sub-manifest rewrites.
pub fn check_collisions(pairs: &[EntryPair], policy: CollisionPolicy) -> Result<()> {
    if policy == CollisionPolicy::Overwrite {
        return Ok(());
    }

    let mut seen: HashMap<String, &str> = HashMap::new();
    for pair in pairs {
        let key = derive_export_key(&pair.output).key;
        if let Some(first) = seen.get(&key) {
            return Err(anyhow!(
                "Export key '{}' is produced by both '{}' and '{}'",
                key,
                first,
                pair.output
            ));
        }
        seen.insert(key, &pair.output);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<EntryPair> {
        raw.iter().map(|(i, o)| EntryPair::new(*i, *o)).collect()
    }

    #[test]
    fn test_root_key() {
        for output in ["index.js", "main.mjs", "a.b.js"] {
            let key = derive_export_key(output);
            assert_eq!(key.key, ".");
            assert_eq!(key.path_prefix, "./");
        }
    }

    #[test]
    fn test_nested_key_ignores_depth() {
        for output in ["utils/index.js", "utils/deep/nested/mod.js"] {
            let key = derive_export_key(output);
            assert_eq!(key.key, "./utils");
            assert_eq!(key.path_prefix, "./utils/");
        }
    }

    #[test]
    fn test_utils_target() {
        let exports = build_export_map(&pairs(&[("utils/index.ts", "utils/index.js")]));

        assert_eq!(
            exports["./utils"],
            ExportEntry {
                import: ExportTarget {
                    types: "./utils/index.d.ts".to_string(),
                    default: "./utils/index.js".to_string(),
                },
            }
        );

        let json = serde_json::to_value(&exports).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "./utils": {
                    "import": {
                        "types": "./utils/index.d.ts",
                        "default": "./utils/index.js"
                    }
                }
            })
        );
    }

    #[test]
    fn test_root_and_subpath() {
        let exports = build_export_map(&pairs(&[
            ("index.ts", "index.js"),
            ("utils/index.ts", "utils/index.js"),
        ]));

        let keys: Vec<&str> = exports.keys().map(String::as_str).collect();
        assert_eq!(keys, vec![".", "./utils"]);
        assert_eq!(exports["."].import.default, "./index.js");
        assert_eq!(exports["."].import.types, "./index.d.ts");
    }

    #[test]
    fn test_last_write_wins() {
        let exports = build_export_map(&pairs(&[
            ("index.ts", "index.js"),
            ("a/x.ts", "a/x.js"),
            ("other.ts", "other.js"),
        ]));

        // Both root outputs land on "."; it stays first in the map.
        let keys: Vec<&str> = exports.keys().map(String::as_str).collect();
        assert_eq!(keys, vec![".", "./a"]);
    }

    #[test]
    fn test_strict_rejects_collision() {
        let colliding = pairs(&[("a/x.ts", "a/x.js"), ("a/y.ts", "a/y.js")]);

        assert!(check_collisions(&colliding, CollisionPolicy::Overwrite).is_ok());

        let err = check_collisions(&colliding, CollisionPolicy::Strict).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("./a"));
        assert!(message.contains("a/x.js"));
        assert!(message.contains("a/y.js"));
    }

    #[test]
    fn test_strict_accepts_distinct_keys() {
        let distinct = pairs(&[("index.ts", "index.js"), ("utils/index.ts", "utils/index.js")]);
        assert!(check_collisions(&distinct, CollisionPolicy::Strict).is_ok());
    }
}
