//! Dependency coordinates declared by scripts.
//!
//! A coordinate is a `group:artifact:version` triple, the same shape the
//! artifact repositories use for their directory layout.

use crate::error::{ResolutionError, ResolutionResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// A `(group, artifact, version)` reference to an external dependency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    /// Dotted group identifier, e.g. `org.example`.
    pub group: String,

    /// Artifact name within the group.
    pub artifact: String,

    /// Version string.
    pub version: String,
}

impl Coordinate {
    /// Create a coordinate from its parts.
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
        }
    }

    /// Parse a `group:artifact:version` string.
    ///
    /// All three segments must be non-empty; anything else is rejected.
    pub fn parse(s: &str) -> ResolutionResult<Self> {
        let mut parts = s.split(':');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(group), Some(artifact), Some(version), None)
                if !group.is_empty() && !artifact.is_empty() && !version.is_empty() =>
            {
                Ok(Self::new(group, artifact, version))
            }
            _ => Err(ResolutionError::MalformedCoordinate(s.to_string())),
        }
    }

    /// File name of the artifact this coordinate points at.
    pub fn file_name(&self) -> String {
        format!("{}-{}.rhai", self.artifact, self.version)
    }

    /// Repository-relative path of the artifact file, Maven layout: the group
    /// dots become directory separators.
    pub fn relative_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.group.replace('.', "/"),
            self.artifact,
            self.version,
            self.file_name()
        )
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
    }
}

/// Deduplicate a declared coordinate list.
///
/// Exact duplicates collapse to one entry. Two versions of the same
/// `(group, artifact)` are a conflict: the last-registered one wins and the
/// replacement is logged, never silently merged.
pub fn dedupe(coordinates: &[Coordinate]) -> Vec<Coordinate> {
    let mut out: Vec<Coordinate> = Vec::with_capacity(coordinates.len());

    for coordinate in coordinates {
        if let Some(existing) = out
            .iter_mut()
            .find(|c| c.group == coordinate.group && c.artifact == coordinate.artifact)
        {
            if existing.version != coordinate.version {
                warn!(
                    "Conflicting versions for {}:{}: replacing {} with {}",
                    coordinate.group, coordinate.artifact, existing.version, coordinate.version
                );
                existing.version = coordinate.version.clone();
            }
            continue;
        }

        out.push(coordinate.clone());
    }

    out
}
