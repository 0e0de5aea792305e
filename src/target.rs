use std::fmt;

pub const DEFAULT_MINIMUM_NODE_VERSION: &str = "18";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Node,
    Browser,
}

impl Platform {
    pub fn as_str(&self) -> &str {
        match self {
            Platform::Node => "node",
            Platform::Browser => "browser",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleFormat {
    Esm,
    Cjs,
}

impl BundleFormat {
    pub fn as_str(&self) -> &str {
        match self {
            BundleFormat::Esm => "esm",
            BundleFormat::Cjs => "cjs",
        }
    }

    /// Extension used for standalone `dist/` builds.
    pub fn dist_extension(&self) -> &str {
        match self {
            BundleFormat::Esm => "mjs",
            BundleFormat::Cjs => "cjs",
        }
    }
}

/// Runtime the package is built for, as selected by `--node[=<version>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeTarget {
    pub platform: Platform,
    pub minimum_node_version: String,
}

impl RuntimeTarget {
    /// `node` is `None` when `--node` was not given at all.
    pub fn from_node_flag(node: Option<&str>) -> Self {
        match node {
            Some(version) => Self {
                platform: Platform::Node,
                minimum_node_version: version.to_string(),
            },
            None => Self {
                platform: Platform::Browser,
                minimum_node_version: DEFAULT_MINIMUM_NODE_VERSION.to_string(),
            },
        }
    }

    /// Range recorded in `engines.node`.
    pub fn engines_range(&self) -> String {
        format!(">={}", self.minimum_node_version)
    }
}

impl fmt::Display for RuntimeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (node {})", self.platform.as_str(), self.engines_range())
    }
}
