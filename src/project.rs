use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::manifest::MANIFEST_FILE;

const LICENSE_FILE: &str = "license";
const README_FILE: &str = "readme.md";
const LOCKFILE: &str = "package-lock.json";
const TSCONFIG_FILE: &str = "tsconfig.json";

/// Where a project's inputs live and where its package is built.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
    out_dir: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
struct TsConfig {
    #[serde(default, rename = "compilerOptions")]
    compiler_options: Option<CompilerOptions>,
}

#[derive(Debug, Default, Deserialize)]
struct CompilerOptions {
    #[serde(default, rename = "rootDir")]
    root_dir: Option<String>,
}

impl ProjectLayout {
    /// `out_dir` is taken relative to `root` unless absolute.
    pub fn new(root: impl AsRef<Path>, out_dir: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let out_dir = root.join(out_dir);

        Self { root, out_dir }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn tsconfig_path(&self) -> PathBuf {
        self.root.join(TSCONFIG_FILE)
    }

    /// Path of a bundle output inside the build directory.
    pub fn output_path(&self, output: &str) -> PathBuf {
        self.out_dir.join(output)
    }

    /// Remove everything from a previous build.
    pub fn clean_output(&self) -> Result<()> {
        match fs::remove_dir_all(&self.out_dir) {
            Ok(()) => {
                tracing::debug!("Removed {}", self.out_dir.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| {
                format!("Failed to remove output directory: {}", self.out_dir.display())
            }),
        }
    }

    /// Copy license, readme and (if present) lockfile into the build directory.
    pub fn copy_package_files(&self) -> Result<()> {
        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("Failed to create output directory: {}", self.out_dir.display()))?;

        self.copy_file(LICENSE_FILE)?;

        if let Err(e) = self.copy_file(LOCKFILE) {
            tracing::debug!("Skipping {}: {:#}", LOCKFILE, e);
        }

        self.copy_file(README_FILE)
    }

    fn copy_file(&self, name: &str) -> Result<()> {
        let from = self.root.join(name);
        let to = self.out_dir.join(name);

        fs::copy(&from, &to).with_context(|| {
            format!("Failed to copy {} to {}", from.display(), to.display())
        })?;

        tracing::debug!("Copied {}", name);

        Ok(())
    }

    /// `compilerOptions.rootDir` from tsconfig.json, if set.
    pub fn source_root_dir(&self) -> Result<Option<String>> {
        let tsconfig_path = self.tsconfig_path();
        let content = fs::read_to_string(&tsconfig_path)
            .with_context(|| format!("Failed to read {}", tsconfig_path.display()))?;

        let tsconfig: TsConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", tsconfig_path.display()))?;

        Ok(tsconfig
            .compiler_options
            .and_then(|options| options.root_dir)
            .filter(|dir| !dir.is_empty()))
    }

    /// Resolve an entry input, placing it under the compiler's root dir when one is configured.
    pub fn input_path(&self, input: &str, root_dir: Option<&str>) -> PathBuf {
        match root_dir {
            Some(dir) => self.root.join(dir).join(input),
            None => self.root.join(input),
        }
    }
}
