use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::entry::EntryPair;
use crate::exports::ExportMap;
use crate::target::RuntimeTarget;

pub const MANIFEST_FILE: &str = "package.json";
const MODULE_TYPE: &str = "module";

/// Manifest dropped into an output subdirectory so deep imports resolve
/// without the root manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubManifest {
    pub main: String,
    pub module: String,
    pub types: String,
    #[serde(rename = "type")]
    pub module_type: String,
}

impl SubManifest {
    pub fn for_output(output: &str) -> Self {
        let main = format!("./{}", output);

        Self {
            module: main.clone(),
            types: declaration_path(&main),
            main,
            module_type: MODULE_TYPE.to_string(),
        }
    }
}

/// Swap a bundle's extension for the matching declaration extension.
pub fn declaration_path(module_path: &str) -> String {
    let file_start = module_path.rfind('/').map_or(0, |i| i + 1);
    let (stem, extension) = match module_path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => module_path.split_at(file_start + dot),
        _ => (module_path, ""),
    };

    let declaration_extension = match extension {
        ".mjs" => ".d.mts",
        ".cjs" => ".d.cts",
        _ => ".d.ts",
    };

    format!("{}{}", stem, declaration_extension)
}

/// The package's own `package.json`, kept as an ordered JSON object so that
/// fields this tool does not know about pass through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageManifest {
    fields: Map<String, Value>,
}

impl PackageManifest {
    pub fn read(manifest_path: &Path) -> Result<Self> {
        let manifest_content = fs::read_to_string(manifest_path)
            .with_context(|| format!("Failed to read manifest from {}", manifest_path.display()))?;

        let value: Value = serde_json::from_str(&manifest_content)
            .with_context(|| format!("Failed to parse manifest JSON from {}", manifest_path.display()))?;

        Self::from_value(value)
            .with_context(|| format!("Invalid manifest at {}", manifest_path.display()))
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(anyhow!("Expected a JSON object, found {}", json_kind(&other))),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Names of runtime dependencies; these stay external to every bundle.
    pub fn dependency_names(&self) -> Vec<String> {
        match self.fields.get("dependencies") {
            Some(Value::Object(deps)) => deps.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Add the fields a published ESM package needs. An existing non-null
    /// `engines` field is left alone.
    pub fn apply_build_fields(&mut self, target: &RuntimeTarget, exports: &ExportMap) -> Result<()> {
        if matches!(self.fields.get("engines"), None | Some(Value::Null)) {
            let mut engines = Map::new();
            engines.insert("node".to_string(), Value::String(target.engines_range()));
            self.fields.insert("engines".to_string(), Value::Object(engines));
        } else {
            tracing::debug!("Keeping engines from source manifest");
        }

        self.set_str("type", MODULE_TYPE);
        self.set_str("main", "./index.js");
        self.set_str("module", "./index.js");
        self.set_str("types", "./index.d.ts");

        let exports = serde_json::to_value(exports).context("Failed to serialize export map")?;
        self.fields.insert("exports".to_string(), exports);

        Ok(())
    }

    fn set_str(&mut self, field: &str, value: &str) {
        self.fields
            .insert(field.to_string(), Value::String(value.to_string()));
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.fields).context("Failed to serialize manifest to JSON")
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Writes manifests under the build output root.
pub struct ManifestWriter {
    build_root: PathBuf,
}

impl ManifestWriter {
    pub fn new(build_root: impl AsRef<Path>) -> Self {
        Self {
            build_root: build_root.as_ref().to_path_buf(),
        }
    }

    pub fn write_root(&self, manifest: &PackageManifest) -> Result<PathBuf> {
        let manifest_path = self.build_root.join(MANIFEST_FILE);
        write_json(&manifest_path, &manifest.to_json_pretty()?)?;

        tracing::info!("Generated manifest: {}", manifest_path.display());

        Ok(manifest_path)
    }

    /// Write the sub-manifest for one pair. Root-level outputs have none.
    pub fn write_sub_manifest(&self, pair: &EntryPair) -> Result<Option<PathBuf>> {
        let Some(dir) = pair.output_dir() else {
            return Ok(None);
        };

        let manifest_path = self.build_root.join(dir).join(MANIFEST_FILE);
        let manifest_json = serde_json::to_string_pretty(&SubManifest::for_output(&pair.output))
            .context("Failed to serialize sub-manifest to JSON")?;
        write_json(&manifest_path, &manifest_json)?;

        tracing::debug!(output = %pair.output, "Wrote sub-manifest {}", manifest_path.display());

        Ok(Some(manifest_path))
    }

    pub fn write_sub_manifests(&self, pairs: &[EntryPair]) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for pair in pairs {
            if let Some(path) = self.write_sub_manifest(pair)? {
                if !written.contains(&path) {
                    written.push(path);
                }
            }
        }
        Ok(written)
    }
}

fn write_json(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create manifest directory: {}", parent.display()))?;
    }

    fs::write(path, contents)
        .with_context(|| format!("Failed to write manifest to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exports::build_export_map;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_declaration_path() {
        assert_eq!(declaration_path("./utils/index.js"), "./utils/index.d.ts");
        assert_eq!(declaration_path("./a/x.mjs"), "./a/x.d.mts");
        assert_eq!(declaration_path("./a/x.cjs"), "./a/x.d.cts");
        assert_eq!(declaration_path("./v1.2/entry"), "./v1.2/entry.d.ts");
    }

    #[test]
    fn test_sub_manifest_fields() {
        let sub = SubManifest::for_output("utils/index.js");

        assert_eq!(
            serde_json::to_value(&sub).unwrap(),
            json!({
                "main": "./utils/index.js",
                "module": "./utils/index.js",
                "types": "./utils/index.d.ts",
                "type": "module"
            })
        );
    }

    #[test]
    fn test_apply_build_fields() {
        let mut manifest = PackageManifest::from_value(json!({
            "name": "demo",
            "version": "1.0.0",
            "main": "./src/index.ts",
            "dependencies": { "left-pad": "^1.0.0", "zod": "^3.0.0" }
        }))
        .unwrap();

        let exports = build_export_map(&[EntryPair::new("index.ts", "index.js")]);
        manifest
            .apply_build_fields(&RuntimeTarget::from_node_flag(Some("20")), &exports)
            .unwrap();

        assert_eq!(manifest.get("engines"), Some(&json!({ "node": ">=20" })));
        assert_eq!(manifest.get("type"), Some(&json!("module")));
        assert_eq!(manifest.get("main"), Some(&json!("./index.js")));
        assert_eq!(manifest.get("types"), Some(&json!("./index.d.ts")));
        assert_eq!(
            manifest.get("exports"),
            Some(&json!({ ".": { "import": { "types": "./index.d.ts", "default": "./index.js" } } }))
        );
        assert_eq!(manifest.dependency_names(), vec!["left-pad", "zod"]);

        // Existing fields keep their position.
        let keys: Vec<&str> = manifest.fields.keys().map(String::as_str).collect();
        assert_eq!(keys[..3], ["name", "version", "main"]);
    }

    #[test]
    fn test_existing_engines_preserved() {
        let mut manifest = PackageManifest::from_value(json!({
            "name": "demo",
            "engines": { "node": ">=16" }
        }))
        .unwrap();

        manifest
            .apply_build_fields(&RuntimeTarget::from_node_flag(Some("22")), &ExportMap::new())
            .unwrap();

        assert_eq!(manifest.get("engines"), Some(&json!({ "node": ">=16" })));
    }

    #[test]
    fn test_null_engines_replaced() {
        let mut manifest = PackageManifest::from_value(json!({
            "name": "demo",
            "engines": null
        }))
        .unwrap();

        manifest
            .apply_build_fields(&RuntimeTarget::from_node_flag(None), &ExportMap::new())
            .unwrap();

        assert_eq!(manifest.get("engines"), Some(&json!({ "node": ">=18" })));
    }

    #[test]
    fn test_non_object_manifest_rejected() {
        let err = PackageManifest::from_value(json!(["not", "a", "manifest"])).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn test_sub_manifests_one_per_directory() {
        let temp = TempDir::new().unwrap();
        let writer = ManifestWriter::new(temp.path());

        let written = writer
            .write_sub_manifests(&[
                EntryPair::new("index.ts", "index.js"),
                EntryPair::new("utils/index.ts", "utils/index.js"),
            ])
            .unwrap();

        assert_eq!(written, vec![temp.path().join("utils").join(MANIFEST_FILE)]);
        assert!(!temp.path().join(MANIFEST_FILE).exists());
    }

    #[test]
    fn test_sub_manifest_last_pair_wins() {
        let temp = TempDir::new().unwrap();
        let writer = ManifestWriter::new(temp.path());

        let written = writer
            .write_sub_manifests(&[
                EntryPair::new("a/x.ts", "a/x.js"),
                EntryPair::new("a/y.ts", "a/y.js"),
            ])
            .unwrap();
        assert_eq!(written.len(), 1);

        let content = fs::read_to_string(&written[0]).unwrap();
        let sub: SubManifest = serde_json::from_str(&content).unwrap();
        assert_eq!(sub, SubManifest::for_output("a/y.js"));
        assert!(!content.contains("x.js"));
    }
}
