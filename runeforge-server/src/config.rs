//! Configuration file loading and management
//!
//! This module handles loading and parsing the server configuration from
//! `$XDG_CONFIG_HOME/runeforge/config.toml`. If the configuration file
//! doesn't exist, a default configuration is created with documented
//! comments.

use anyhow::{Context, Result};
use runeforge_resolver::{DirRepository, HttpRepository, Repository};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Server-wide settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Script and artifact storage locations
    #[serde(default)]
    pub storage: StorageConfig,
    /// Artifact repositories, tried in order
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
    /// Execution limits and timeouts
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Server-wide settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Log level (trace, debug, info, warn, error)
    /// Default: "info"
    pub log_level: String,
}

/// Storage locations
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Scripts directory
    /// If None, uses XDG_DATA_HOME/runeforge/scripts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scripts_dir: Option<PathBuf>,
    /// Artifact cache directory
    /// If None, uses XDG_CACHE_HOME/runeforge/artifacts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    /// Per-script data directory
    /// If None, uses XDG_DATA_HOME/runeforge/data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

/// One artifact repository
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepositoryConfig {
    /// Repository name, for logs
    pub name: String,
    /// HTTP base URL; exactly one of `url` and `path` must be set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Local directory root; exactly one of `url` and `path` must be set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Execution limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LimitsConfig {
    /// Dependency resolution timeout in seconds
    /// Default: 30
    pub resolve_timeout_secs: u64,
    /// Context creation and evaluation timeout in seconds
    /// Default: 20
    pub load_timeout_secs: u64,
    /// Host thread submission queue capacity
    /// Default: 128
    pub host_queue_capacity: usize,
    /// Maximum script operations per evaluation; 0 disables the limit
    /// Default: 500000
    pub max_operations: u64,
    /// Maximum script call nesting depth
    /// Default: 64
    pub max_call_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            repositories: Vec::new(),
            limits: LimitsConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            resolve_timeout_secs: 30,
            load_timeout_secs: 20,
            host_queue_capacity: 128,
            max_operations: 500_000,
            max_call_depth: 64,
        }
    }
}

impl Config {
    /// Load configuration from the specified path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default XDG config location
    ///
    /// If the configuration file doesn't exist, creates a default
    /// configuration file with documented comments.
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_file(&config_path)?;
        }

        Self::load(&config_path)
    }

    /// Get the default configuration file path
    ///
    /// Returns `$XDG_CONFIG_HOME/runeforge/config.toml`
    pub fn default_config_path() -> Result<PathBuf> {
        let dirs = project_dirs()?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Create a default configuration file with documented comments
    fn create_default_file(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, Self::default_config_content())
            .with_context(|| format!("Failed to write default config file: {}", path.display()))?;

        tracing::info!("Created default configuration file at: {}", path.display());
        Ok(())
    }

    /// Generate the default configuration file content with comments
    fn default_config_content() -> String {
        r#"# Runeforge Server Configuration
# This file configures the runeforge-server behavior.

[server]
# Log level: trace, debug, info, warn, error
# Default: "info"
log_level = "info"

[storage]
# Scripts directory; scripts are flat <name>.rhai files with an optional
# <name>.toml manifest next to each declaring dependencies.
# If not specified, defaults to $XDG_DATA_HOME/runeforge/scripts
# scripts_dir = "/srv/runeforge/scripts"

# Artifact cache directory. Safe to back up externally; writes are atomic.
# If not specified, defaults to $XDG_CACHE_HOME/runeforge/artifacts
# cache_dir = "/srv/runeforge/artifacts"

# Per-script data directory.
# If not specified, defaults to $XDG_DATA_HOME/runeforge/data
# data_dir = "/srv/runeforge/data"

[limits]
# Dependency resolution timeout in seconds
resolve_timeout_secs = 30

# Context creation and evaluation timeout in seconds
load_timeout_secs = 20

# Host thread submission queue capacity
host_queue_capacity = 128

# Maximum script operations per evaluation; 0 disables the limit
max_operations = 500000

# Maximum script call nesting depth
max_call_depth = 64

# Artifact repositories, tried in order. Each needs exactly one of `url`
# (an HTTP repository) or `path` (a local directory).

# [[repositories]]
# name = "central"
# url = "https://repo.example.com/artifacts"

# [[repositories]]
# name = "local"
# path = "/srv/runeforge/repo"
"#
        .to_string()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.server.log_level.as_str()) {
            anyhow::bail!(
                "Invalid log_level: {}. Must be one of: {}",
                self.server.log_level,
                valid_log_levels.join(", ")
            );
        }

        if self.limits.resolve_timeout_secs == 0 {
            anyhow::bail!("limits.resolve_timeout_secs must be greater than 0");
        }
        if self.limits.load_timeout_secs == 0 {
            anyhow::bail!("limits.load_timeout_secs must be greater than 0");
        }
        if self.limits.host_queue_capacity == 0 {
            anyhow::bail!("limits.host_queue_capacity must be greater than 0");
        }

        for repository in &self.repositories {
            if repository.name.is_empty() {
                anyhow::bail!("Repository name cannot be empty");
            }
            match (&repository.url, &repository.path) {
                (Some(_), None) | (None, Some(_)) => {}
                _ => anyhow::bail!(
                    "Repository '{}' must set exactly one of url or path",
                    repository.name
                ),
            }
        }

        Ok(())
    }

    /// Scripts directory, configured or default
    pub fn scripts_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.storage.scripts_dir {
            return Ok(dir.clone());
        }
        Ok(project_dirs()?.data_dir().join("scripts"))
    }

    /// Artifact cache directory, configured or default
    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.storage.cache_dir {
            return Ok(dir.clone());
        }
        Ok(project_dirs()?.cache_dir().join("artifacts"))
    }

    /// Per-script data directory, configured or default
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.storage.data_dir {
            return Ok(dir.clone());
        }
        Ok(project_dirs()?.data_dir().join("data"))
    }

    /// Build the configured repository list, in order
    pub fn build_repositories(&self) -> Vec<Arc<dyn Repository>> {
        self.repositories
            .iter()
            .filter_map(|r| -> Option<Arc<dyn Repository>> {
                if let Some(url) = &r.url {
                    Some(Arc::new(HttpRepository::new(r.name.clone(), url.clone())))
                } else {
                    r.path.as_ref().map(|path| {
                        Arc::new(DirRepository::new(r.name.clone(), path.clone()))
                            as Arc<dyn Repository>
                    })
                }
            })
            .collect()
    }
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "raibid-labs", "runeforge")
        .context("Failed to determine project directories")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.limits.resolve_timeout_secs, 30);
        assert_eq!(config.limits.host_queue_capacity, 128);
        assert!(config.repositories.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[server]
log_level = "debug"

[storage]
scripts_dir = "/srv/scripts"

[limits]
resolve_timeout_secs = 10
load_timeout_secs = 5
host_queue_capacity = 32
max_operations = 100000
max_call_depth = 32

[[repositories]]
name = "central"
url = "https://repo.example.com/artifacts"

[[repositories]]
name = "local"
path = "/srv/repo"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(config_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.scripts_dir().unwrap(), PathBuf::from("/srv/scripts"));
        assert_eq!(config.limits.resolve_timeout_secs, 10);
        assert_eq!(config.repositories.len(), 2);
        assert_eq!(config.build_repositories().len(), 2);
    }

    #[test]
    fn test_load_minimal_config() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"").unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.server.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.limits.resolve_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_repository_needs_one_source() {
        let mut config = Config::default();
        config.repositories.push(RepositoryConfig {
            name: "broken".to_string(),
            url: None,
            path: None,
        });
        assert!(config.validate().is_err());

        config.repositories[0].url = Some("https://repo.example.com".to_string());
        config.repositories[0].path = Some(PathBuf::from("/srv/repo"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config_content_parses() {
        let config: Config = toml::from_str(&Config::default_config_content()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_full_config_roundtrip() {
        let mut config = Config::default();
        config.server.log_level = "debug".to_string();
        config.repositories.push(RepositoryConfig {
            name: "local".to_string(),
            url: None,
            path: Some(PathBuf::from("/srv/repo")),
        });

        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, deserialized);
    }
}
