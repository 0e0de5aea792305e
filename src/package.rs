//! The `build` pipeline: turns a source package into a publishable one.
//!
//! Steps run strictly in order and stop at the first error:
//!
//! 1. clean the output directory and copy license, readme and lockfile
//! 2. write the root manifest with the synthesized export map
//! 3. bundle every entry pair, writing its sub-manifest as it goes
//! 4. `npm pkg fix` in the output directory, then `tsc` over the project

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::entry::EntryPair;
use crate::exports::{build_export_map, check_collisions, CollisionPolicy};
use crate::manifest::{ManifestWriter, PackageManifest};
use crate::project::ProjectLayout;
use crate::target::RuntimeTarget;
use crate::toolchain::{EsbuildCommand, Toolchain};

#[derive(Debug, Clone)]
pub struct PackageOptions {
    pub layout: ProjectLayout,
    pub pairs: Vec<EntryPair>,
    pub target: RuntimeTarget,
    pub collisions: CollisionPolicy,
}

/// What a finished build produced.
#[derive(Debug, Clone)]
pub struct PackageReport {
    pub manifest_path: PathBuf,
    pub bundles: Vec<PathBuf>,
    pub sub_manifests: Vec<PathBuf>,
}

pub fn build_package(options: &PackageOptions, toolchain: &dyn Toolchain) -> Result<PackageReport> {
    let layout = &options.layout;

    check_collisions(&options.pairs, options.collisions)?;

    tracing::info!(
        "Packaging {} entry point(s) for {}",
        options.pairs.len(),
        options.target
    );

    layout.clean_output()?;
    layout.copy_package_files()?;

    let mut manifest = PackageManifest::read(&layout.manifest_path())?;
    let external = manifest.dependency_names();

    let exports = build_export_map(&options.pairs);
    manifest.apply_build_fields(&options.target, &exports)?;

    let writer = ManifestWriter::new(layout.out_dir());
    let manifest_path = writer.write_root(&manifest)?;

    let root_dir = layout.source_root_dir()?;
    if let Some(dir) = &root_dir {
        tracing::debug!("Resolving inputs under rootDir {}", dir);
    }

    let mut bundles = Vec::with_capacity(options.pairs.len());
    let mut sub_manifests = Vec::new();

    for pair in &options.pairs {
        let outfile = layout.output_path(&pair.output);
        if let Some(parent) = outfile.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let command = EsbuildCommand::new(layout.input_path(&pair.input, root_dir.as_deref()), &outfile)
            .platform(options.target.platform)
            .external(external.clone());

        toolchain
            .bundle(layout.root(), &command)
            .with_context(|| format!("Failed to bundle {}", pair))?;

        tracing::info!("Bundled {} -> {}", pair.input, outfile.display());
        bundles.push(outfile);

        if let Some(path) = writer.write_sub_manifest(pair)? {
            if !sub_manifests.contains(&path) {
                sub_manifests.push(path);
            }
        }
    }

    toolchain
        .fix_manifest(layout.out_dir())
        .context("Failed to fix generated manifest")?;

    toolchain
        .emit_declarations(layout.root())
        .context("Failed to generate type declarations")?;

    Ok(PackageReport {
        manifest_path,
        bundles,
        sub_manifests,
    })
}
