//! The host surface scripts program against.
//!
//! Scripts see an explicit set of host operations, never the host's object
//! graph. Every world-touching function is marshaled through the bridge
//! with the owning context's cancellation flag, and handler registration is
//! only open while the script is loading.

use crate::bridge::HostBridge;
use crate::error::EventError;
use crate::event::{EventKind, EventPriority};
use rhai::{Array, EvalAltResult, Module};
use runeforge_runtime::ScriptIdentity;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

/// A handler registration gathered during script load.
#[derive(Debug, Clone)]
pub struct PendingHandler {
    /// Event kind to bind.
    pub kind: EventKind,

    /// Dispatch priority.
    pub priority: EventPriority,

    /// Script function to call.
    pub function: String,
}

/// A repeating-task registration gathered during script load.
#[derive(Debug, Clone)]
pub struct ScheduleSpec {
    /// Period between invocations, milliseconds.
    pub period_ms: u64,

    /// Script function to call each period.
    pub function: String,
}

#[derive(Default)]
struct CollectorInner {
    open: bool,
    handlers: Vec<PendingHandler>,
    schedules: Vec<ScheduleSpec>,
}

/// Gathers registrations while a script's top-level and `on_load` code run.
///
/// The collector is open only for the duration of the load. Registration
/// attempts from a live event callback are rejected, so a running script
/// cannot grow new bindings after activation.
#[derive(Clone)]
pub struct HandlerCollector {
    inner: Arc<Mutex<CollectorInner>>,
}

impl HandlerCollector {
    /// Create an open collector for one load attempt.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(CollectorInner {
                open: true,
                handlers: Vec::new(),
                schedules: Vec::new(),
            })),
        }
    }

    /// Record an event handler binding.
    pub fn register_handler(
        &self,
        kind: &str,
        priority: &str,
        function: &str,
    ) -> Result<(), EventError> {
        let kind = EventKind::parse(kind)?;
        let priority = EventPriority::parse(priority)?;

        let mut inner = self.inner.lock().unwrap();
        if !inner.open {
            return Err(EventError::RegistrationClosed);
        }
        inner.handlers.push(PendingHandler {
            kind,
            priority,
            function: function.to_string(),
        });
        Ok(())
    }

    /// Record a repeating task.
    pub fn register_schedule(&self, period_ms: i64, function: &str) -> Result<(), EventError> {
        if period_ms <= 0 {
            return Err(EventError::InvalidPeriod);
        }

        let mut inner = self.inner.lock().unwrap();
        if !inner.open {
            return Err(EventError::RegistrationClosed);
        }
        inner.schedules.push(ScheduleSpec {
            period_ms: period_ms as u64,
            function: function.to_string(),
        });
        Ok(())
    }

    /// Close the registration window and take everything gathered.
    pub fn close(&self) -> (Vec<PendingHandler>, Vec<ScheduleSpec>) {
        let mut inner = self.inner.lock().unwrap();
        inner.open = false;
        (
            std::mem::take(&mut inner.handlers),
            std::mem::take(&mut inner.schedules),
        )
    }
}

impl Default for HandlerCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the per-script host API module.
#[derive(Clone)]
pub struct HostApi {
    bridge: Arc<HostBridge>,
    data_dir: PathBuf,
}

impl HostApi {
    /// Create the host API over a bridge and a script-data directory.
    pub fn new(bridge: Arc<HostBridge>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            bridge,
            data_dir: data_dir.into(),
        }
    }

    /// Build the module installed globally into one script's engine.
    ///
    /// Functions capture the script's identity, its cancellation flag, and
    /// the load-window collector.
    pub fn module_for(
        &self,
        identity: &ScriptIdentity,
        cancelled: Arc<AtomicBool>,
        collector: &HandlerCollector,
    ) -> Module {
        let mut module = Module::new();
        let script = identity.to_string();

        {
            let bridge = Arc::clone(&self.bridge);
            let flag = Arc::clone(&cancelled);
            module.set_native_fn("broadcast", move |message: &str| {
                let message = message.to_string();
                bridge
                    .submit_blocking(&flag, move |world| world.broadcast(message))
                    .map_err(bridge_err)?;
                Ok(())
            });
        }

        {
            let bridge = Arc::clone(&self.bridge);
            let flag = Arc::clone(&cancelled);
            module.set_native_fn("players", move || {
                let players = bridge
                    .submit_blocking(&flag, |world| world.players().to_vec())
                    .map_err(bridge_err)?;
                Ok(players.into_iter().map(Into::into).collect::<Array>())
            });
        }

        {
            let bridge = Arc::clone(&self.bridge);
            let flag = Arc::clone(&cancelled);
            module.set_native_fn("player_count", move || {
                let count = bridge
                    .submit_blocking(&flag, |world| world.player_count())
                    .map_err(bridge_err)?;
                Ok(count as i64)
            });
        }

        {
            let bridge = Arc::clone(&self.bridge);
            let flag = Arc::clone(&cancelled);
            module.set_native_fn("world_tick", move || {
                let tick = bridge
                    .submit_blocking(&flag, |world| world.tick())
                    .map_err(bridge_err)?;
                Ok(tick as i64)
            });
        }

        {
            let script = script.clone();
            module.set_native_fn("log_info", move |message: &str| {
                tracing::info!(script = %script, "{}", message);
                Ok(())
            });
        }

        {
            let script = script.clone();
            module.set_native_fn("log_warn", move |message: &str| {
                tracing::warn!(script = %script, "{}", message);
                Ok(())
            });
        }

        {
            let path = self
                .data_dir
                .join(format!("{}.toml", identity.stem()))
                .to_string_lossy()
                .into_owned();
            module.set_native_fn("data_path", move || Ok(path.clone()));
        }

        {
            let collector = collector.clone();
            module.set_native_fn(
                "on_event",
                move |kind: &str, priority: &str, function: &str| {
                    collector
                        .register_handler(kind, priority, function)
                        .map_err(event_err)?;
                    Ok(())
                },
            );
        }

        {
            let collector = collector.clone();
            module.set_native_fn(
                "schedule_repeating",
                move |period_ms: i64, function: &str| {
                    collector
                        .register_schedule(period_ms, function)
                        .map_err(event_err)?;
                    Ok(())
                },
            );
        }

        module
    }
}

/// The shared base text module, importable by every script as `text`.
///
/// Pure helpers only; nothing here touches host state, so one copy can be
/// visible to all contexts.
pub fn text_module() -> Module {
    let mut module = Module::new();
    module.set_native_fn("upper", |s: &str| Ok(s.to_uppercase()));
    module.set_native_fn("lower", |s: &str| Ok(s.to_lowercase()));
    module.set_native_fn("repeat", |s: &str, n: i64| Ok(s.repeat(n.max(0) as usize)));
    module
}

fn bridge_err(err: crate::error::BridgeError) -> Box<EvalAltResult> {
    err.to_string().into()
}

fn event_err(err: EventError) -> Box<EvalAltResult> {
    err.to_string().into()
}
