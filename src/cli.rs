use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::dist::{build_dist, DistOptions, DEFAULT_DIST_ENTRY};
use crate::entry::parse_pairs;
use crate::exports::CollisionPolicy;
use crate::logging::init_logging;
use crate::package::{build_package, PackageOptions};
use crate::project::ProjectLayout;
use crate::target::{BundleFormat, RuntimeTarget, DEFAULT_MINIMUM_NODE_VERSION};
use crate::toolchain::NodeToolchain;

#[derive(Parser)]
#[command(name = "packup")]
#[command(about = "Bundle a TypeScript package into a publishable npm package")]
#[command(version)]
pub struct Cli {
    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only show errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the package into the output directory
    Build {
        /// Entry points as <input>:<output>
        #[arg(required = true, value_name = "INPUT:OUTPUT")]
        pairs: Vec<String>,

        /// Target node instead of the browser, optionally with a minimum version
        #[arg(
            long,
            value_name = "VERSION",
            num_args = 0..=1,
            require_equals = true,
            default_missing_value = DEFAULT_MINIMUM_NODE_VERSION
        )]
        node: Option<String>,

        /// Fail when two outputs map to the same export path
        #[arg(long)]
        strict: bool,

        /// Project directory
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Output directory, relative to the project directory
        #[arg(long, default_value = "build")]
        out_dir: PathBuf,
    },

    /// Build standalone node bundles into dist/
    Dist {
        /// Entry point
        #[arg(default_value = DEFAULT_DIST_ENTRY)]
        entry: String,

        /// Emit an ES module build
        #[arg(long)]
        esm: bool,

        /// Emit a CommonJS build
        #[arg(long)]
        cjs: bool,

        /// Project directory
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// Check that the required tools are installed
    Doctor,
}

pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Build {
            pairs,
            node,
            strict,
            root,
            out_dir,
        } => build_command(pairs, node, strict, root, out_dir),
        Commands::Dist {
            entry,
            esm,
            cjs,
            root,
        } => dist_command(entry, esm, cjs, root),
        Commands::Doctor => doctor_command(),
    }
}

fn build_command(
    pairs: Vec<String>,
    node: Option<String>,
    strict: bool,
    root: PathBuf,
    out_dir: PathBuf,
) -> Result<()> {
    let options = PackageOptions {
        layout: ProjectLayout::new(root, out_dir),
        pairs: parse_pairs(&pairs).context("Failed to parse entry points")?,
        target: RuntimeTarget::from_node_flag(node.as_deref()),
        collisions: if strict {
            CollisionPolicy::Strict
        } else {
            CollisionPolicy::Overwrite
        },
    };

    let report = build_package(&options, &NodeToolchain::detect())?;

    tracing::info!(
        "Built {} bundle(s) and {} sub-manifest(s)",
        report.bundles.len(),
        report.sub_manifests.len()
    );

    // Output the package directory for tooling
    println!("{}", options.layout.out_dir().display());

    Ok(())
}

fn dist_command(entry: String, esm: bool, cjs: bool, root: PathBuf) -> Result<()> {
    tracing::debug!(entry = %entry, esm, cjs, "dist arguments");

    let mut formats = Vec::new();
    if esm {
        formats.push(BundleFormat::Esm);
    }
    if cjs {
        formats.push(BundleFormat::Cjs);
    }

    let options = DistOptions {
        root,
        entry_point: entry,
        formats,
    };

    for output in build_dist(&options, &NodeToolchain::detect())? {
        println!("{}", output.display());
    }

    Ok(())
}

fn doctor_command() -> Result<()> {
    println!("packup doctor - checking required tools...\n");

    match which::which("esbuild") {
        Ok(path) => println!("✓ esbuild found at: {}", path.display()),
        Err(_) => {
            println!("✗ esbuild not found on PATH, will run it through npx");
            println!("  Install with: npm install --save-dev esbuild");
        }
    }

    for tool in REQUIRED_TOOLS {
        let path = require_tool(tool)?;
        println!("✓ {} found at: {} ({})", tool.command, path.display(), tool.purpose);
    }

    println!("\n✓ packup doctor check complete");

    Ok(())
}

/// A tool the build shells out to and cannot work without.
struct RequiredTool {
    command: &'static str,
    purpose: &'static str,
    install_hint: &'static str,
}

const REQUIRED_TOOLS: &[RequiredTool] = &[
    RequiredTool {
        command: "npm",
        purpose: "runs `npm pkg fix` on the generated package.json",
        install_hint: "install Node.js from https://nodejs.org",
    },
    RequiredTool {
        command: "npx",
        purpose: "runs `tsc` to emit type declarations",
        install_hint: "install Node.js from https://nodejs.org (npx ships with npm)",
    },
];

fn require_tool(tool: &RequiredTool) -> Result<PathBuf> {
    which::which(tool.command).map_err(|_| {
        println!("✗ {} not found ({})", tool.command, tool.purpose);
        anyhow!(
            "{} is required to package, but it is not on PATH; {}",
            tool.command,
            tool.install_hint
        )
    })
}
