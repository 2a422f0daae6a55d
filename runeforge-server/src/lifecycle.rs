//! # Lifecycle Controller
//!
//! Orchestrates script lifecycles: `load` resolves dependencies, builds an
//! isolated context, evaluates the script and activates its handlers;
//! `reload` swaps in a fresh context only after the replacement fully loads;
//! `unload` releases everything a context owns.
//!
//! Per-identity operations serialize on the registry entry's gate. A failed
//! load leaves the identity `Failed` with nothing registered; a failed
//! reload leaves the previously active context untouched.

use crate::error::{LifecycleError, LifecycleResult};
use crate::registry::{ScriptEntry, ScriptRegistry, ScriptState};
use runeforge_host::{
    EventBus, GameEvent, HandlerCollector, HostApi, RegisteredHandler, ScheduleSpec,
};
use runeforge_resolver::{ResolvedArtifact, Resolver};
use runeforge_runtime::{
    discover_script, discover_scripts, ContextError, ContextLoader, ScriptContext, ScriptIdentity,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Operator-facing summary of one script.
#[derive(Debug, Clone)]
pub struct ScriptStatus {
    pub identity: ScriptIdentity,
    pub state: ScriptState,
    pub dependencies: usize,
    pub handlers: usize,
}

/// Orchestrates load, reload and unload across the registry, resolver,
/// context loader and event bus.
pub struct LifecycleController {
    registry: Arc<ScriptRegistry>,
    resolver: Arc<Resolver>,
    loader: Arc<ContextLoader>,
    api: HostApi,
    bus: Arc<EventBus>,
    scripts_dir: PathBuf,
    resolve_timeout: Duration,
    load_timeout: Duration,
}

impl LifecycleController {
    /// Wire up a controller.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<ScriptRegistry>,
        resolver: Arc<Resolver>,
        loader: Arc<ContextLoader>,
        api: HostApi,
        bus: Arc<EventBus>,
        scripts_dir: impl Into<PathBuf>,
        resolve_timeout: Duration,
        load_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            resolver,
            loader,
            api,
            bus,
            scripts_dir: scripts_dir.into(),
            resolve_timeout,
            load_timeout,
        }
    }

    /// The script registry.
    pub fn registry(&self) -> &Arc<ScriptRegistry> {
        &self.registry
    }

    /// The event bus.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Load a script by identity.
    pub async fn load(&self, identity: &ScriptIdentity) -> LifecycleResult<()> {
        let entry = self.registry.entry(identity).await;
        let _gate = entry.lock_gate().await;

        if entry.state() == ScriptState::Active {
            return Err(LifecycleError::AlreadyActive(identity.clone()));
        }

        match self.load_locked(&entry, identity, false).await {
            Ok(()) => Ok(()),
            Err(e) => {
                entry.set_state(ScriptState::Failed);
                warn!("Failed to load {}: {}", identity, e);
                Err(e)
            }
        }
    }

    /// Reload a script, atomically: the old context stays active and
    /// untouched unless the replacement fully loads.
    pub async fn reload(&self, identity: &ScriptIdentity) -> LifecycleResult<()> {
        let entry = self
            .registry
            .get(identity)
            .await
            .ok_or_else(|| LifecycleError::NotFound(identity.clone()))?;
        let _gate = entry.lock_gate().await;

        let state = entry.state();
        if state != ScriptState::Active {
            return Err(LifecycleError::InvalidTransition {
                identity: identity.clone(),
                state: state.as_str(),
                operation: "reload",
            });
        }

        match self.load_locked(&entry, identity, true).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // The old context was never disturbed; restore its state.
                entry.set_state(ScriptState::Active);
                warn!("Failed to reload {}, previous version stays active: {}", identity, e);
                Err(e)
            }
        }
    }

    /// Unload a script. Unloading an identity that is not loaded is a
    /// no-op.
    pub async fn unload(&self, identity: &ScriptIdentity) -> LifecycleResult<()> {
        let Some(entry) = self.registry.get(identity).await else {
            return Ok(());
        };
        let _gate = entry.lock_gate().await;

        match entry.state() {
            ScriptState::Unloaded => Ok(()),
            ScriptState::Active | ScriptState::Failed => {
                self.unload_locked(&entry, identity).await;
                Ok(())
            }
            state => Err(LifecycleError::InvalidTransition {
                identity: identity.clone(),
                state: state.as_str(),
                operation: "unload",
            }),
        }
    }

    /// Load every script found in the scripts directory. Returns how many
    /// loaded; individual failures are logged and skipped.
    pub async fn load_all(&self) -> LifecycleResult<usize> {
        info!("Loading scripts...");
        let start = Instant::now();
        let mut loaded = 0;

        for source in discover_scripts(&self.scripts_dir).map_err(LifecycleError::Context)? {
            match self.load(&source.identity).await {
                Ok(()) => loaded += 1,
                Err(e) => warn!("Skipping {}: {}", source.identity, e),
            }
        }

        info!(
            "Loaded {} script(s) in {}ms",
            loaded,
            start.elapsed().as_millis()
        );
        Ok(loaded)
    }

    /// Unload every loaded script, for host shutdown.
    pub async fn unload_all(&self) {
        for entry in self.registry.list().await {
            let identity = entry.identity().clone();
            if let Err(e) = self.unload(&identity).await {
                error!("Failed to unload {}: {}", identity, e);
            }
        }
    }

    /// Dispatch an event to every bound handler, priority order. Returns
    /// the number of handlers that ran.
    pub async fn fire_event(&self, event: GameEvent) -> usize {
        let mut invoked = 0;

        for handler in self.bus.handlers_for(event.kind()) {
            let Some(entry) = self.registry.get(&handler.identity).await else {
                continue;
            };

            let payload = event.payload();
            let result = entry
                .with_context(|context| context.call_fn(&handler.function, (payload,)))
                .await;

            match result {
                Some(Ok(_)) => invoked += 1,
                Some(Err(e)) => warn!(
                    "Handler {} in {} failed: {}",
                    handler.function, handler.identity, e
                ),
                None => {}
            }
        }

        invoked
    }

    /// Status of every known script, sorted by identity.
    pub async fn list(&self) -> Vec<ScriptStatus> {
        let mut statuses = Vec::new();
        for entry in self.registry.list().await {
            statuses.push(ScriptStatus {
                identity: entry.identity().clone(),
                state: entry.state(),
                dependencies: entry.dependency_count().await,
                handlers: self.bus.script_handler_count(entry.identity()),
            });
        }
        statuses
    }

    /// The load pipeline, called with the entry's gate held. `replace`
    /// selects the reload swap path.
    async fn load_locked(
        &self,
        entry: &Arc<ScriptEntry>,
        identity: &ScriptIdentity,
        replace: bool,
    ) -> LifecycleResult<()> {
        entry.set_state(ScriptState::Resolving);

        let script_path = self.scripts_dir.join(identity.as_str());
        if !script_path.is_file() {
            return Err(LifecycleError::NotFound(identity.clone()));
        }
        let source = discover_script(&script_path)
            .ok_or_else(|| LifecycleError::NotFound(identity.clone()))?;

        let manifest = source.manifest().map_err(LifecycleError::Context)?;
        let coordinates = manifest.coordinates().map_err(LifecycleError::Resolution)?;

        let artifacts = tokio::time::timeout(self.resolve_timeout, self.resolver.resolve(&coordinates))
            .await
            .map_err(|_| LifecycleError::Timeout {
                identity: identity.clone(),
                stage: "resolving dependencies for",
            })?
            .map_err(LifecycleError::Resolution)?;

        entry.set_state(ScriptState::Loading);

        // A lingering live context from an earlier attempt means teardown
        // never completed; never build a second context next to it. The
        // reload path intentionally keeps the old context live until the
        // swap.
        if !replace && entry.has_live_context().await {
            return Err(ContextError::TeardownConflict(identity.to_string()).into());
        }

        let collector = HandlerCollector::new();
        let context = match self
            .build_context(identity, artifacts, source.script_path.clone(), &collector)
            .await
        {
            Ok(context) => context,
            Err(e) => {
                collector.close();
                return Err(e);
            }
        };
        let (handlers, schedules) = collector.close();

        if replace {
            self.bus.unregister_script(identity);
        }

        let old = entry.install_context(context, replace).await?;
        if let Some(mut old_context) = old {
            if let Err(e) = old_context.call_optional_fn("on_unload") {
                error!("Failed to deinitialize {}: {}", identity, e);
            }
            old_context.teardown();
        }

        for pending in handlers {
            self.bus.register(RegisteredHandler {
                identity: identity.clone(),
                kind: pending.kind,
                priority: pending.priority,
                function: pending.function,
            });
        }

        for spec in schedules {
            self.spawn_schedule(identity, entry, spec).await;
        }

        entry.set_state(ScriptState::Active);
        info!(
            "Loaded script {} ({} handler(s), {} dependency(ies))",
            identity,
            self.bus.script_handler_count(identity),
            entry.dependency_count().await
        );
        Ok(())
    }

    /// Build and evaluate a context on the blocking pool, bounded by the
    /// load timeout.
    async fn build_context(
        &self,
        identity: &ScriptIdentity,
        artifacts: Vec<ResolvedArtifact>,
        script_path: PathBuf,
        collector: &HandlerCollector,
    ) -> LifecycleResult<ScriptContext> {
        let loader = Arc::clone(&self.loader);
        let api = self.api.clone();
        let identity_owned = identity.clone();
        let collector = collector.clone();

        let task = tokio::task::spawn_blocking(move || {
            let source = std::fs::read_to_string(&script_path)?;

            let mut context = loader.create_context(identity_owned.clone(), &artifacts, None)?;
            let module = api.module_for(&identity_owned, context.cancellation(), &collector);
            context.engine_mut().register_global_module(module.into());

            context.eval(&source)?;
            context.call_optional_fn("on_load")?;
            Ok::<_, ContextError>(context)
        });

        match tokio::time::timeout(self.load_timeout, task).await {
            Err(_) => Err(LifecycleError::Timeout {
                identity: identity.clone(),
                stage: "creating context for",
            }),
            Ok(Err(join_error)) => Err(ContextError::Script {
                identity: identity.to_string(),
                message: join_error.to_string(),
            }
            .into()),
            Ok(Ok(result)) => result.map_err(Into::into),
        }
    }

    /// Spawn a repeating task owned by the script's context.
    async fn spawn_schedule(
        &self,
        identity: &ScriptIdentity,
        entry: &Arc<ScriptEntry>,
        spec: ScheduleSpec,
    ) {
        let task_entry = Arc::clone(entry);
        let task_identity = identity.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(spec.period_ms));
            interval.tick().await;
            loop {
                interval.tick().await;

                let ran = task_entry
                    .with_context(|context| {
                        if context.is_torn_down() {
                            return false;
                        }
                        if let Err(e) = context.call_fn(&spec.function, ()) {
                            warn!(
                                "Scheduled task '{}' in {} failed: {}",
                                spec.function, task_identity, e
                            );
                        }
                        true
                    })
                    .await
                    .unwrap_or(false);

                if !ran {
                    break;
                }
            }
        });

        entry.with_context(|context| context.add_task(handle)).await;
    }

    /// Teardown pipeline, called with the entry's gate held.
    async fn unload_locked(&self, entry: &Arc<ScriptEntry>, identity: &ScriptIdentity) {
        entry.set_state(ScriptState::Unloading);

        let removed = self.bus.unregister_script(identity);
        if let Some(mut context) = entry.take_context().await {
            if let Err(e) = context.call_optional_fn("on_unload") {
                error!("Failed to deinitialize {}: {}", identity, e);
            }
            context.teardown();
        }

        entry.set_state(ScriptState::Unloaded);
        info!("Unloaded script {} ({} handler(s) removed)", identity, removed);
    }
}
