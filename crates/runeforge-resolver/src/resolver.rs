//! Fail-fast resolution of coordinate sets into loadable artifacts.

use crate::cache::{fingerprint, ArtifactCache, ResolvedArtifact};
use crate::coordinate::{dedupe, Coordinate};
use crate::error::{ResolutionError, ResolutionResult};
use crate::repository::Repository;
use std::sync::Arc;
use tracing::{debug, info};

/// Resolves declared coordinates against the cache and the configured
/// repositories.
///
/// The cache is consulted first; a hit performs zero remote fetches.
/// Repositories are tried in configuration order, and the first one that has
/// the artifact wins. Any failure aborts the whole resolution for that
/// script.
pub struct Resolver {
    cache: ArtifactCache,
    repositories: Vec<Arc<dyn Repository>>,
}

impl Resolver {
    /// Create a resolver over a cache and an ordered repository list.
    pub fn new(cache: ArtifactCache, repositories: Vec<Arc<dyn Repository>>) -> Self {
        Self {
            cache,
            repositories,
        }
    }

    /// Shared artifact cache.
    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Resolve a declared coordinate list into an ordered artifact list.
    pub async fn resolve(
        &self,
        coordinates: &[Coordinate],
    ) -> ResolutionResult<Vec<ResolvedArtifact>> {
        let coordinates = dedupe(coordinates);
        let mut resolved = Vec::with_capacity(coordinates.len());

        for coordinate in &coordinates {
            if let Some(hit) = self.cache.lookup(coordinate)? {
                debug!("Artifact cache hit for {}", coordinate);
                resolved.push(hit);
                continue;
            }

            resolved.push(self.fetch_and_store(coordinate).await?);
        }

        Ok(resolved)
    }

    async fn fetch_and_store(&self, coordinate: &Coordinate) -> ResolutionResult<ResolvedArtifact> {
        for repository in &self.repositories {
            let Some(fetched) = repository.fetch(coordinate).await? else {
                continue;
            };

            if let Some(expected) = &fetched.checksum {
                let actual = fingerprint(&fetched.bytes);
                if actual != *expected {
                    return Err(ResolutionError::ChecksumMismatch {
                        coordinate: coordinate.to_string(),
                        expected: expected.clone(),
                        actual,
                    });
                }
            }

            info!(
                "Downloaded {} from repository '{}' ({} bytes)",
                coordinate,
                repository.name(),
                fetched.bytes.len()
            );
            return self.cache.store(coordinate, &fetched.bytes);
        }

        Err(ResolutionError::NotFound(coordinate.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{DirRepository, FetchedArtifact};
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Counts fetches so tests can assert the cache-hit property.
    struct CountingRepository {
        inner: DirRepository,
        fetches: AtomicUsize,
    }

    impl CountingRepository {
        fn new(inner: DirRepository) -> Self {
            Self {
                inner,
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Repository for CountingRepository {
        fn name(&self) -> &str {
            self.inner.name()
        }

        async fn fetch(
            &self,
            coordinate: &Coordinate,
        ) -> ResolutionResult<Option<FetchedArtifact>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch(coordinate).await
        }
    }

    fn publish(root: &std::path::Path, spec: &str, body: &[u8]) -> Coordinate {
        let coordinate = Coordinate::parse(spec).unwrap();
        let path = root.join(coordinate.relative_path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        fs::write(
            path.with_file_name(format!("{}.sha256", coordinate.file_name())),
            fingerprint(body),
        )
        .unwrap();
        coordinate
    }

    #[tokio::test]
    async fn test_resolve_downloads_once_then_hits_cache() {
        let repo_dir = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let coordinate = publish(repo_dir.path(), "org.example:util:1.0", b"fn id(x) { x }");

        let repository = Arc::new(CountingRepository::new(DirRepository::new(
            "local",
            repo_dir.path(),
        )));
        let resolver = Resolver::new(
            ArtifactCache::new(cache_dir.path()),
            vec![repository.clone()],
        );

        let first = resolver.resolve(&[coordinate.clone()]).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(repository.fetches.load(Ordering::SeqCst), 1);

        let second = resolver.resolve(&[coordinate]).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(
            repository.fetches.load(Ordering::SeqCst),
            1,
            "second resolution must perform zero remote fetches"
        );
    }

    #[tokio::test]
    async fn test_resolve_not_found() {
        let repo_dir = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let resolver = Resolver::new(
            ArtifactCache::new(cache_dir.path()),
            vec![Arc::new(DirRepository::new("local", repo_dir.path()))],
        );

        let missing = Coordinate::parse("org.example:missing:1.0").unwrap();
        let err = resolver.resolve(&[missing]).await.unwrap_err();
        assert!(matches!(err, ResolutionError::NotFound(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_resolve_checksum_mismatch_is_fatal() {
        let repo_dir = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let coordinate = publish(repo_dir.path(), "org.example:util:2.0", b"fn id(x) { x }");

        // Corrupt the published checksum.
        let sidecar = repo_dir
            .path()
            .join(coordinate.relative_path())
            .with_file_name(format!("{}.sha256", coordinate.file_name()));
        fs::write(&sidecar, "deadbeef").unwrap();

        let resolver = Resolver::new(
            ArtifactCache::new(cache_dir.path()),
            vec![Arc::new(DirRepository::new("local", repo_dir.path()))],
        );

        let err = resolver.resolve(&[coordinate.clone()]).await.unwrap_err();
        assert!(matches!(err, ResolutionError::ChecksumMismatch { .. }));
        assert!(!err.is_retryable());

        // Nothing was cached for the corrupted artifact.
        let cache = ArtifactCache::new(cache_dir.path());
        assert!(cache.lookup(&coordinate).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_fails_fast_on_any_missing_coordinate() {
        let repo_dir = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let present = publish(repo_dir.path(), "org.example:util:1.0", b"fn id(x) { x }");
        let missing = Coordinate::parse("org.example:missing:1.0").unwrap();

        let resolver = Resolver::new(
            ArtifactCache::new(cache_dir.path()),
            vec![Arc::new(DirRepository::new("local", repo_dir.path()))],
        );

        let err = resolver.resolve(&[present, missing]).await.unwrap_err();
        assert!(matches!(err, ResolutionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_repositories_tried_in_order() {
        let empty_dir = TempDir::new().unwrap();
        let stocked_dir = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let coordinate = publish(stocked_dir.path(), "org.example:util:1.0", b"fn id(x) { x }");

        let resolver = Resolver::new(
            ArtifactCache::new(cache_dir.path()),
            vec![
                Arc::new(DirRepository::new("empty", empty_dir.path())),
                Arc::new(DirRepository::new("stocked", stocked_dir.path())),
            ],
        );

        let resolved = resolver.resolve(&[coordinate]).await.unwrap();
        assert_eq!(resolved.len(), 1);
    }
}
