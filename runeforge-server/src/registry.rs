//! # Script Registry
//!
//! The single source of truth for which scripts are loaded.
//!
//! Each identity owns a gate mutex; lifecycle operations on the same
//! identity serialize on it while operations on different identities proceed
//! independently. The context slot enforces the at-most-one-active-context
//! invariant.

use crate::error::LifecycleError;
use runeforge_runtime::{ScriptContext, ScriptIdentity};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};

/// Lifecycle state of a script identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptState {
    Unloaded,
    Resolving,
    Loading,
    Active,
    Unloading,
    /// A load attempt failed; terminal until the next explicit load.
    Failed,
}

impl ScriptState {
    /// State name for operator-facing output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptState::Unloaded => "unloaded",
            ScriptState::Resolving => "resolving",
            ScriptState::Loading => "loading",
            ScriptState::Active => "active",
            ScriptState::Unloading => "unloading",
            ScriptState::Failed => "failed",
        }
    }
}

impl fmt::Display for ScriptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry entry for one script identity.
pub struct ScriptEntry {
    identity: ScriptIdentity,
    gate: Mutex<()>,
    state: std::sync::RwLock<ScriptState>,
    context: Mutex<Option<ScriptContext>>,
}

impl ScriptEntry {
    fn new(identity: ScriptIdentity) -> Self {
        Self {
            identity,
            gate: Mutex::new(()),
            state: std::sync::RwLock::new(ScriptState::Unloaded),
            context: Mutex::new(None),
        }
    }

    /// The identity this entry tracks.
    pub fn identity(&self) -> &ScriptIdentity {
        &self.identity
    }

    /// Acquire the per-identity gate. Held for the duration of a lifecycle
    /// operation.
    pub async fn lock_gate(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ScriptState {
        *self.state.read().unwrap()
    }

    /// Move to a new lifecycle state.
    pub fn set_state(&self, state: ScriptState) {
        *self.state.write().unwrap() = state;
    }

    /// Install a context.
    ///
    /// Fails with `AlreadyActive` when a context is present, unless the
    /// caller explicitly requests replace-in-place (the reload path).
    /// Returns the replaced context, which the caller must tear down.
    pub async fn install_context(
        &self,
        context: ScriptContext,
        replace: bool,
    ) -> Result<Option<ScriptContext>, LifecycleError> {
        let mut slot = self.context.lock().await;
        if slot.is_some() && !replace {
            return Err(LifecycleError::AlreadyActive(self.identity.clone()));
        }
        Ok(slot.replace(context))
    }

    /// Remove and return the context, if any.
    pub async fn take_context(&self) -> Option<ScriptContext> {
        self.context.lock().await.take()
    }

    /// Whether a context that has not been torn down is still installed.
    pub async fn has_live_context(&self) -> bool {
        self.context
            .lock()
            .await
            .as_ref()
            .map(|c| !c.is_torn_down())
            .unwrap_or(false)
    }

    /// Run a closure against the installed context, if any.
    pub async fn with_context<R>(&self, f: impl FnOnce(&mut ScriptContext) -> R) -> Option<R> {
        self.context.lock().await.as_mut().map(f)
    }

    /// Number of artifacts visible to the installed context.
    pub async fn dependency_count(&self) -> usize {
        self.context
            .lock()
            .await
            .as_ref()
            .map(|c| c.artifacts().len())
            .unwrap_or(0)
    }
}

/// Registry over all known script identities.
#[derive(Default)]
pub struct ScriptRegistry {
    entries: RwLock<HashMap<ScriptIdentity, Arc<ScriptEntry>>>,
}

impl ScriptRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the entry for an identity.
    pub async fn entry(&self, identity: &ScriptIdentity) -> Arc<ScriptEntry> {
        let mut entries = self.entries.write().await;
        Arc::clone(
            entries
                .entry(identity.clone())
                .or_insert_with(|| Arc::new(ScriptEntry::new(identity.clone()))),
        )
    }

    /// Get the entry for an identity, if it is known.
    pub async fn get(&self, identity: &ScriptIdentity) -> Option<Arc<ScriptEntry>> {
        self.entries.read().await.get(identity).cloned()
    }

    /// All known entries, sorted by identity.
    pub async fn list(&self) -> Vec<Arc<ScriptEntry>> {
        let mut entries: Vec<_> = self.entries.read().await.values().cloned().collect();
        entries.sort_by(|a, b| a.identity().cmp(b.identity()));
        entries
    }

    /// Number of identities currently active.
    pub async fn active_count(&self) -> usize {
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.state() == ScriptState::Active)
            .count()
    }
}
