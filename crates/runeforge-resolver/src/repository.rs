//! Artifact repositories.
//!
//! A repository serves artifact files under the Maven-style layout produced
//! by [`Coordinate::relative_path`](crate::Coordinate::relative_path), with
//! an optional `.sha256` checksum sidecar next to each artifact.

use crate::coordinate::Coordinate;
use crate::error::{ResolutionError, ResolutionResult};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Artifact bytes fetched from a repository.
#[derive(Debug, Clone)]
pub struct FetchedArtifact {
    /// Raw artifact bytes.
    pub bytes: Vec<u8>,

    /// Hex SHA-256 the repository published next to the artifact, when it
    /// has one.
    pub checksum: Option<String>,
}

/// A source of artifacts.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Repository name, for logs.
    fn name(&self) -> &str;

    /// Fetch an artifact, or `Ok(None)` when this repository does not have
    /// it.
    async fn fetch(&self, coordinate: &Coordinate) -> ResolutionResult<Option<FetchedArtifact>>;
}

/// HTTP repository.
pub struct HttpRepository {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpRepository {
    /// Create an HTTP repository rooted at `base_url`.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn artifact_url(&self, coordinate: &Coordinate) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            coordinate.relative_path()
        )
    }

    fn network_failure(&self, coordinate: &Coordinate, err: impl ToString) -> ResolutionError {
        ResolutionError::NetworkFailure {
            coordinate: coordinate.to_string(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl Repository for HttpRepository {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, coordinate: &Coordinate) -> ResolutionResult<Option<FetchedArtifact>> {
        let url = self.artifact_url(coordinate);
        debug!("Fetching {} from {}", coordinate, url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.network_failure(coordinate, e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = response
            .error_for_status()
            .map_err(|e| self.network_failure(coordinate, e))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.network_failure(coordinate, e))?
            .to_vec();

        let checksum_response = self
            .client
            .get(format!("{url}.sha256"))
            .send()
            .await
            .map_err(|e| self.network_failure(coordinate, e))?;

        let checksum = if checksum_response.status().is_success() {
            let text = checksum_response
                .text()
                .await
                .map_err(|e| self.network_failure(coordinate, e))?;
            Some(text.trim().to_lowercase())
        } else {
            None
        };

        Ok(Some(FetchedArtifact { bytes, checksum }))
    }
}

/// Repository backed by a local directory in the same layout.
///
/// Used for file-path repositories in the server config, and as the test
/// double throughout the workspace.
pub struct DirRepository {
    name: String,
    root: PathBuf,
}

impl DirRepository {
    /// Create a directory repository rooted at `root`.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    /// Repository root directory.
    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

#[async_trait]
impl Repository for DirRepository {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, coordinate: &Coordinate) -> ResolutionResult<Option<FetchedArtifact>> {
        let path = self.root.join(coordinate.relative_path());
        if !path.exists() {
            return Ok(None);
        }

        let bytes = tokio::fs::read(&path).await?;

        let sidecar = path.with_file_name(format!("{}.sha256", coordinate.file_name()));
        let checksum = if sidecar.exists() {
            Some(
                tokio::fs::read_to_string(&sidecar)
                    .await?
                    .trim()
                    .to_lowercase(),
            )
        } else {
            None
        };

        Ok(Some(FetchedArtifact { bytes, checksum }))
    }
}
