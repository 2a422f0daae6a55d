//! Script manifest parsing.
//!
//! Each script may have a `<name>.toml` manifest next to its `<name>.rhai`
//! source, declaring metadata and the external dependencies the script needs
//! at runtime:
//!
//! ```toml
//! [script]
//! name = "greeter"
//! description = "Greets players on join"
//!
//! dependencies = ["org.example:util:1.0"]
//! ```
//!
//! A script without a manifest simply has no dependencies.

use crate::error::{ContextError, ContextResult};
use runeforge_resolver::{Coordinate, ResolutionResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Script manifest structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptManifest {
    /// Script metadata.
    #[serde(default)]
    pub script: ScriptMetadata,

    /// Declared dependency coordinates, `group:artifact:version`.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Script metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptMetadata {
    /// Human-readable name.
    #[serde(default)]
    pub name: Option<String>,

    /// Script description.
    #[serde(default)]
    pub description: Option<String>,

    /// Script author(s).
    #[serde(default)]
    pub authors: Vec<String>,
}

impl ScriptManifest {
    /// Load a manifest from a TOML file.
    pub fn from_file(path: &Path) -> ContextResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a manifest from a TOML string.
    pub fn from_str(content: &str) -> ContextResult<Self> {
        let manifest: ScriptManifest = toml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate the manifest.
    fn validate(&self) -> ContextResult<()> {
        for dependency in &self.dependencies {
            if dependency.trim().is_empty() {
                return Err(ContextError::InvalidManifest(
                    "Dependency entry cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Parse the declared dependency strings into coordinates.
    ///
    /// Malformed entries surface as `ResolutionError::MalformedCoordinate`,
    /// rejecting the script at the resolving stage.
    pub fn coordinates(&self) -> ResolutionResult<Vec<Coordinate>> {
        self.dependencies
            .iter()
            .map(|s| Coordinate::parse(s))
            .collect()
    }
}
