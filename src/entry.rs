use anyhow::{anyhow, Result};
use indexmap::IndexMap;
use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

/// One `input:output` mapping given on the command line.
///
/// `input` is relative to the source root, `output` to the build output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPair {
    pub input: String,
    pub output: String,
}

impl EntryPair {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }

    /// First path segment of the output, if the output lives in a subdirectory.
    pub fn output_dir(&self) -> Option<&str> {
        self.output.split_once('/').map(|(dir, _)| dir)
    }
}

impl FromStr for EntryPair {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (input, output) = s
            .split_once(':')
            .ok_or_else(|| anyhow!("Invalid entry pair '{}': expected <input>:<output>", s))?;

        if input.is_empty() || output.is_empty() {
            return Err(anyhow!(
                "Invalid entry pair '{}': input and output must both be non-empty",
                s
            ));
        }

        validate_output(output)
            .map_err(|reason| anyhow!("Invalid entry pair '{}': output {}", s, reason))?;

        Ok(Self::new(input, output))
    }
}

/// Outputs must stay inside the build directory: plain relative segments only.
fn validate_output(output: &str) -> std::result::Result<(), &'static str> {
    if Path::new(output).is_absolute() || output.starts_with('/') {
        return Err("must be a relative path");
    }

    // `Path::components` folds `a//b` and interior `.` away, so check the raw segments too.
    if output.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return Err("must not contain empty, '.' or '..' segments");
    }

    if !Path::new(output)
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        return Err("must stay inside the build directory");
    }

    Ok(())
}

impl fmt::Display for EntryPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.input, self.output)
    }
}

/// Parse command-line pairs, keyed by input.
///
/// Repeating an input replaces the earlier output but keeps its position.
pub fn parse_pairs<S: AsRef<str>>(raw: &[S]) -> Result<Vec<EntryPair>> {
    let mut by_input: IndexMap<String, String> = IndexMap::new();

    for arg in raw {
        let pair: EntryPair = arg.as_ref().parse()?;
        if let Some(previous) = by_input.insert(pair.input.clone(), pair.output.clone()) {
            tracing::debug!(
                input = %pair.input,
                "Entry repeated, replacing output {} with {}",
                previous,
                pair.output
            );
        }
    }

    Ok(by_input
        .into_iter()
        .map(|(input, output)| EntryPair { input, output })
        .collect())
}
