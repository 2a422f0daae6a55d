//! Shared fixtures for server integration tests.
//!
//! Builds a full stack against temp directories: a directory-backed artifact
//! repository, a cold cache, an empty scripts directory and a live host
//! thread.

use runeforge_host::{text_module, EventBus, HostApi, HostBridge, WorldState};
use runeforge_resolver::{fingerprint, ArtifactCache, Coordinate, DirRepository, Resolver};
use runeforge_runtime::{ContextLoader, EngineLimits};
use runeforge_server::lifecycle::LifecycleController;
use runeforge_server::registry::ScriptRegistry;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub struct Harness {
    pub controller: Arc<LifecycleController>,
    pub bridge: Arc<HostBridge>,
    pub scripts_dir: PathBuf,
    pub repo_dir: PathBuf,
    _dirs: Vec<TempDir>,
}

pub fn harness() -> Harness {
    let scripts = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();

    let bridge = HostBridge::start(64, WorldState::new());
    let resolver = Arc::new(Resolver::new(
        ArtifactCache::new(cache.path()),
        vec![Arc::new(DirRepository::new("test", repo.path()))],
    ));

    let mut loader = ContextLoader::new(EngineLimits::default());
    loader.add_base_module("text", text_module());

    let controller = Arc::new(LifecycleController::new(
        Arc::new(ScriptRegistry::new()),
        resolver,
        Arc::new(loader),
        HostApi::new(Arc::clone(&bridge), data.path()),
        Arc::new(EventBus::new()),
        scripts.path(),
        Duration::from_secs(5),
        Duration::from_secs(5),
    ));

    Harness {
        controller,
        bridge,
        scripts_dir: scripts.path().to_path_buf(),
        repo_dir: repo.path().to_path_buf(),
        _dirs: vec![scripts, repo, cache, data],
    }
}

impl Harness {
    /// Publish an artifact with a valid checksum sidecar.
    pub fn publish_artifact(&self, spec: &str, source: &str) {
        let coordinate = Coordinate::parse(spec).unwrap();
        let path = self.repo_dir.join(coordinate.relative_path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, source).unwrap();
        fs::write(
            path.with_file_name(format!("{}.sha256", coordinate.file_name())),
            fingerprint(source.as_bytes()),
        )
        .unwrap();
    }

    /// Overwrite an artifact's published checksum with garbage.
    pub fn corrupt_checksum(&self, spec: &str) {
        let coordinate = Coordinate::parse(spec).unwrap();
        let path = self.repo_dir.join(coordinate.relative_path());
        fs::write(
            path.with_file_name(format!("{}.sha256", coordinate.file_name())),
            "deadbeef",
        )
        .unwrap();
    }

    /// Delete an artifact from the repository, leaving only the cache copy.
    pub fn remove_artifact(&self, spec: &str) {
        let coordinate = Coordinate::parse(spec).unwrap();
        let path = self.repo_dir.join(coordinate.relative_path());
        fs::remove_file(&path).unwrap();
        let _ = fs::remove_file(path.with_file_name(format!("{}.sha256", coordinate.file_name())));
    }

    /// Write a script source file.
    pub fn write_script(&self, name: &str, source: &str) {
        fs::write(self.scripts_dir.join(name), source).unwrap();
    }

    /// Write a script manifest declaring dependencies. `stem` is the script
    /// name without the `.rhai` extension.
    pub fn write_manifest(&self, stem: &str, dependencies: &[&str]) {
        let list = dependencies
            .iter()
            .map(|d| format!("\"{d}\""))
            .collect::<Vec<_>>()
            .join(", ");
        fs::write(
            self.scripts_dir.join(format!("{stem}.toml")),
            format!("dependencies = [{list}]\n"),
        )
        .unwrap();
    }

    /// Snapshot of the world's chat log.
    pub async fn chat_log(&self) -> Vec<String> {
        self.bridge
            .run(|world| world.chat_log().to_vec())
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_harness_starts_empty() {
    let h = harness();
    assert!(h.controller.list().await.is_empty());
    assert!(h.chat_log().await.is_empty());
    h.bridge.shutdown();
}
