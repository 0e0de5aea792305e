use anyhow::{anyhow, Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::target::{BundleFormat, Platform};

/// One esbuild invocation: a single entry point bundled to a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EsbuildCommand {
    entry_point: PathBuf,
    outfile: PathBuf,
    format: BundleFormat,
    platform: Platform,
    external: Vec<String>,
}

impl EsbuildCommand {
    pub fn new(entry_point: impl AsRef<Path>, outfile: impl AsRef<Path>) -> Self {
        Self {
            entry_point: entry_point.as_ref().to_path_buf(),
            outfile: outfile.as_ref().to_path_buf(),
            format: BundleFormat::Esm,
            platform: Platform::Browser,
            external: Vec::new(),
        }
    }

    pub fn format(mut self, format: BundleFormat) -> Self {
        self.format = format;
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn external(mut self, external: Vec<String>) -> Self {
        self.external = external;
        self
    }

    pub fn entry_point(&self) -> &Path {
        &self.entry_point
    }

    pub fn outfile(&self) -> &Path {
        &self.outfile
    }

    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            self.entry_point.clone().into(),
            "--bundle".into(),
            "--minify".into(),
            "--allow-overwrite".into(),
            format!("--format={}", self.format.as_str()).into(),
            format!("--platform={}", self.platform.as_str()).into(),
        ];

        let mut outfile = OsString::from("--outfile=");
        outfile.push(&self.outfile);
        args.push(outfile);

        for dependency in &self.external {
            args.push(format!("--external:{}", dependency).into());
        }

        args
    }
}

/// The external tools a package build delegates to.
pub trait Toolchain {
    /// Bundle one entry point to one output file.
    fn bundle(&self, project_dir: &Path, command: &EsbuildCommand) -> Result<()>;

    /// Normalise the generated manifest (`npm pkg fix`).
    fn fix_manifest(&self, package_dir: &Path) -> Result<()>;

    /// Generate type declarations for the whole project (`npx tsc`).
    fn emit_declarations(&self, project_dir: &Path) -> Result<()>;
}

/// Toolchain backed by `esbuild`, `npm` and `npx` found on `PATH`.
#[derive(Debug, Clone)]
pub struct NodeToolchain {
    esbuild: PathBuf,
    esbuild_prefix: Vec<String>,
}

impl NodeToolchain {
    /// Prefer a global `esbuild`; otherwise run the project's copy through `npx`.
    pub fn detect() -> Self {
        match which::which("esbuild") {
            Ok(path) => {
                tracing::debug!("Using esbuild at {}", path.display());
                Self {
                    esbuild: path,
                    esbuild_prefix: Vec::new(),
                }
            }
            Err(_) => {
                tracing::debug!("esbuild not on PATH, falling back to npx");
                Self {
                    esbuild: PathBuf::from("npx"),
                    esbuild_prefix: vec!["esbuild".to_string()],
                }
            }
        }
    }
}

impl Toolchain for NodeToolchain {
    fn bundle(&self, project_dir: &Path, command: &EsbuildCommand) -> Result<()> {
        let mut cmd = Command::new(&self.esbuild);
        cmd.args(&self.esbuild_prefix)
            .args(command.args())
            .current_dir(project_dir);

        run_tool(cmd, "esbuild")
    }

    fn fix_manifest(&self, package_dir: &Path) -> Result<()> {
        let mut cmd = Command::new("npm");
        cmd.args(["pkg", "fix"]).current_dir(package_dir);

        run_tool(cmd, "npm pkg fix")
    }

    fn emit_declarations(&self, project_dir: &Path) -> Result<()> {
        let mut cmd = Command::new("npx");
        cmd.arg("tsc").current_dir(project_dir);

        run_tool(cmd, "tsc")
    }
}

fn run_tool(mut cmd: Command, tool: &str) -> Result<()> {
    tracing::debug!("Running {:?}", cmd);

    let output = cmd
        .output()
        .with_context(|| format!("Failed to execute {}", tool))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        // tsc reports diagnostics on stdout
        let details = if stderr.trim().is_empty() { stdout } else { stderr };
        return Err(anyhow!(
            "{} failed ({}): {}",
            tool,
            output.status,
            details.trim()
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_esbuild_args() {
        let command = EsbuildCommand::new("./src/index.ts", "./build/index.js")
            .platform(Platform::Node)
            .external(vec!["zod".to_string(), "@scope/pkg".to_string()]);

        let args: Vec<String> = command
            .args()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            args,
            vec![
                "./src/index.ts",
                "--bundle",
                "--minify",
                "--allow-overwrite",
                "--format=esm",
                "--platform=node",
                "--outfile=./build/index.js",
                "--external:zod",
                "--external:@scope/pkg",
            ]
        );
    }

    #[test]
    fn test_esbuild_defaults() {
        let command = EsbuildCommand::new("index.ts", "dist/index.cjs").format(BundleFormat::Cjs);
        let args: Vec<String> = command
            .args()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert!(args.contains(&"--format=cjs".to_string()));
        assert!(args.contains(&"--platform=browser".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--external")));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_tool_reports_failure() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo boom >&2; exit 3"]);

        let err = run_tool(cmd, "sh").unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("sh failed"));
        assert!(message.contains("boom"));
    }
}
