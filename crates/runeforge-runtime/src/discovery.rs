//! Script discovery from the scripts directory.
//!
//! Scripts are flat `*.rhai` files; each may have a `<name>.toml` manifest
//! next to it declaring dependencies.

use crate::error::ContextResult;
use crate::identity::ScriptIdentity;
use crate::manifest::ScriptManifest;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A discovered script: source path plus optional manifest.
#[derive(Debug, Clone)]
pub struct ScriptSource {
    /// The script's identity (its file name).
    pub identity: ScriptIdentity,

    /// Path to the `.rhai` source file.
    pub script_path: PathBuf,

    /// Path to the adjacent manifest, when one exists.
    pub manifest_path: Option<PathBuf>,
}

impl ScriptSource {
    /// Read the script source text.
    pub fn read_source(&self) -> ContextResult<String> {
        Ok(std::fs::read_to_string(&self.script_path)?)
    }

    /// Load the script's manifest, or an empty default when it has none.
    pub fn manifest(&self) -> ContextResult<ScriptManifest> {
        match &self.manifest_path {
            Some(path) => ScriptManifest::from_file(path),
            None => Ok(ScriptManifest::default()),
        }
    }
}

/// Discover all scripts in a directory, sorted by name.
pub fn discover_scripts(dir: &Path) -> ContextResult<Vec<ScriptSource>> {
    let mut scripts = Vec::new();

    if !dir.exists() {
        warn!("Scripts directory {:?} does not exist", dir);
        return Ok(scripts);
    }

    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();

        if !path.is_file() || path.extension().map_or(true, |e| e != "rhai") {
            continue;
        }

        match script_source(&path) {
            Some(source) => {
                debug!("Discovered script {}", source.identity);
                scripts.push(source);
            }
            None => warn!("Skipping script with unusable file name: {:?}", path),
        }
    }

    scripts.sort_by(|a, b| a.identity.cmp(&b.identity));
    Ok(scripts)
}

/// Discover a single script by its source path.
pub fn discover_script(path: &Path) -> Option<ScriptSource> {
    script_source(path)
}

fn script_source(path: &Path) -> Option<ScriptSource> {
    let identity = ScriptIdentity::from_path(path)?;
    let manifest_path = path.with_extension("toml");

    Some(ScriptSource {
        identity,
        script_path: path.to_path_buf(),
        manifest_path: manifest_path.exists().then_some(manifest_path),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discover_scripts() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.rhai"), "let x = 1;").unwrap();
        fs::write(dir.path().join("a.rhai"), "let x = 2;").unwrap();
        fs::write(
            dir.path().join("a.toml"),
            r#"dependencies = ["org.example:util:1.0"]"#,
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "not a script").unwrap();

        let scripts = discover_scripts(dir.path()).unwrap();
        assert_eq!(scripts.len(), 2);
        assert_eq!(scripts[0].identity.as_str(), "a.rhai");
        assert!(scripts[0].manifest_path.is_some());
        assert_eq!(scripts[1].identity.as_str(), "b.rhai");
        assert!(scripts[1].manifest_path.is_none());

        let manifest = scripts[0].manifest().unwrap();
        assert_eq!(manifest.dependencies.len(), 1);
    }

    #[test]
    fn test_discover_missing_directory() {
        let dir = TempDir::new().unwrap();
        let scripts = discover_scripts(&dir.path().join("nope")).unwrap();
        assert!(scripts.is_empty());
    }
}
