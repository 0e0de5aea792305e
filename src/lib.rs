pub mod target;
pub mod entry;
pub mod exports;
pub mod manifest;
pub mod project;
pub mod toolchain;
pub mod package;
pub mod dist;
pub mod logging;
pub mod cli;

pub use entry::EntryPair;
pub use exports::{build_export_map, derive_export_key, CollisionPolicy, ExportMap};
pub use manifest::{PackageManifest, SubManifest};
