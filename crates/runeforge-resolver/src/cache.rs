//! On-disk artifact cache.
//!
//! Layout mirrors the repository layout:
//!
//! ```text
//! <root>/org/example/util/1.0/util-1.0.rhai
//! <root>/org/example/util/1.0/util-1.0.rhai.sha256
//! ```
//!
//! Writes go to a temp file in the target directory and are renamed into
//! place, so a crash mid-download never leaves a corrupt artifact visible to
//! future lookups. A cached artifact whose bytes no longer match the recorded
//! fingerprint is treated as a miss and re-fetched.

use crate::coordinate::Coordinate;
use crate::error::ResolutionResult;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// A coordinate resolved to verified bytes on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    /// The coordinate this artifact satisfies.
    pub coordinate: Coordinate,

    /// Cache path of the artifact file.
    pub path: PathBuf,

    /// Hex SHA-256 of the artifact bytes.
    pub fingerprint: String,
}

/// Hex SHA-256 fingerprint of artifact bytes.
pub fn fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Process-wide artifact cache rooted at a directory.
///
/// Shared read-only across scripts; refreshed only by explicit resolution.
pub struct ArtifactCache {
    root: PathBuf,
}

impl ArtifactCache {
    /// Create a cache rooted at `root`. The directory is created lazily on
    /// first store.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Look up a cached artifact.
    ///
    /// Returns `None` when the artifact or its fingerprint sidecar is
    /// missing, or when the bytes on disk no longer hash to the recorded
    /// fingerprint.
    pub fn lookup(&self, coordinate: &Coordinate) -> ResolutionResult<Option<ResolvedArtifact>> {
        let path = self.artifact_file(coordinate);
        let sidecar = fingerprint_sidecar(&path);

        if !path.exists() || !sidecar.exists() {
            return Ok(None);
        }

        let recorded = fs::read_to_string(&sidecar)?.trim().to_string();
        let actual = fingerprint(&fs::read(&path)?);

        if recorded != actual {
            warn!(
                "Cached artifact {} does not match its fingerprint, discarding",
                coordinate
            );
            let _ = fs::remove_file(&path);
            let _ = fs::remove_file(&sidecar);
            return Ok(None);
        }

        Ok(Some(ResolvedArtifact {
            coordinate: coordinate.clone(),
            path,
            fingerprint: actual,
        }))
    }

    /// Store artifact bytes, atomically, and return the resolved entry.
    pub fn store(
        &self,
        coordinate: &Coordinate,
        bytes: &[u8],
    ) -> ResolutionResult<ResolvedArtifact> {
        let path = self.artifact_file(coordinate);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let digest = fingerprint(bytes);
        write_atomic(&path, bytes)?;
        write_atomic(&fingerprint_sidecar(&path), digest.as_bytes())?;

        Ok(ResolvedArtifact {
            coordinate: coordinate.clone(),
            path,
            fingerprint: digest,
        })
    }

    fn artifact_file(&self, coordinate: &Coordinate) -> PathBuf {
        self.root.join(coordinate.relative_path())
    }
}

fn fingerprint_sidecar(artifact: &Path) -> PathBuf {
    let mut name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".sha256");
    artifact.with_file_name(name)
}

/// Write bytes to a temp file in the target directory, then rename into
/// place.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_file_name(format!(
        ".{}.part",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    ));

    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    fs::rename(&tmp, path)
}
