use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::target::{BundleFormat, Platform};
use crate::toolchain::{EsbuildCommand, Toolchain};

pub const DEFAULT_DIST_ENTRY: &str = "./index.ts";
const DIST_DIR: &str = "dist";

/// Standalone node builds of a single entry point into `dist/`.
#[derive(Debug, Clone)]
pub struct DistOptions {
    pub root: PathBuf,
    pub entry_point: String,
    pub formats: Vec<BundleFormat>,
}

/// `dist/mod.<ext>` for a `mod.ts` entry, `dist/index.<ext>` for anything else.
pub fn dist_outfile(entry_point: &str, format: BundleFormat) -> PathBuf {
    let stem = if entry_point.ends_with("mod.ts") { "mod" } else { "index" };

    Path::new(DIST_DIR).join(format!("{}.{}", stem, format.dist_extension()))
}

pub fn build_dist(options: &DistOptions, toolchain: &dyn Toolchain) -> Result<Vec<PathBuf>> {
    if options.formats.is_empty() {
        tracing::warn!("Neither --esm nor --cjs given, nothing to build");
        return Ok(Vec::new());
    }

    let mut outputs = Vec::new();
    for format in &options.formats {
        let outfile = options.root.join(dist_outfile(&options.entry_point, *format));
        if let Some(parent) = outfile.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let command = EsbuildCommand::new(options.root.join(&options.entry_point), &outfile)
            .format(*format)
            .platform(Platform::Node);

        toolchain
            .bundle(&options.root, &command)
            .with_context(|| format!("Failed to build {} bundle", format.as_str()))?;

        tracing::info!("Built {}", outfile.display());
        outputs.push(outfile);
    }

    Ok(outputs)
}
