//! Script identity keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Stable name key for one script unit.
///
/// The identity is the script's file name (e.g. `greeter.rhai`), immutable
/// once registered. One identity maps to at most one active context at any
/// time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScriptIdentity(String);

impl ScriptIdentity {
    /// Create an identity from a script file name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derive an identity from a script path's file name.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()
            .map(|n| Self(n.to_string_lossy().into_owned()))
    }

    /// The identity as a string key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Script name without the `.rhai` extension, used for data paths and
    /// manifest lookup.
    pub fn stem(&self) -> &str {
        self.0.strip_suffix(".rhai").unwrap_or(&self.0)
    }
}

impl fmt::Display for ScriptIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScriptIdentity {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}
