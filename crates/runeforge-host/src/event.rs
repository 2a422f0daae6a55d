//! Host events and the script handler registry.
//!
//! Scripts bind named functions to event kinds with a priority; bindings are
//! owned by the script's context and removed when that context is torn down.

use crate::error::EventError;
use rhai::Dynamic;
use runeforge_runtime::ScriptIdentity;
use std::sync::RwLock;

/// An event emitted by the host.
#[derive(Debug, Clone)]
pub enum GameEvent {
    /// A player joined the server.
    PlayerJoin { player: String },

    /// A player left the server.
    PlayerQuit { player: String },

    /// A player sent a chat message.
    ChatMessage { player: String, message: String },

    /// The world clock advanced.
    WorldTick { tick: u64 },
}

impl GameEvent {
    /// The kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::PlayerJoin { .. } => EventKind::PlayerJoin,
            GameEvent::PlayerQuit { .. } => EventKind::PlayerQuit,
            GameEvent::ChatMessage { .. } => EventKind::ChatMessage,
            GameEvent::WorldTick { .. } => EventKind::WorldTick,
        }
    }

    /// The event payload as a script-visible map.
    pub fn payload(&self) -> rhai::Map {
        let mut map = rhai::Map::new();
        map.insert("event".into(), self.kind().as_str().into());
        match self {
            GameEvent::PlayerJoin { player } | GameEvent::PlayerQuit { player } => {
                map.insert("player".into(), player.clone().into());
            }
            GameEvent::ChatMessage { player, message } => {
                map.insert("player".into(), player.clone().into());
                map.insert("message".into(), message.clone().into());
            }
            GameEvent::WorldTick { tick } => {
                map.insert("tick".into(), Dynamic::from(*tick as i64));
            }
        }
        map
    }
}

/// Event kinds scripts can bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PlayerJoin,
    PlayerQuit,
    ChatMessage,
    WorldTick,
}

impl EventKind {
    /// Parse an event kind name; dashes and case are tolerated.
    pub fn parse(s: &str) -> Result<Self, EventError> {
        match s.replace('-', "_").to_lowercase().as_str() {
            "player_join" => Ok(EventKind::PlayerJoin),
            "player_quit" => Ok(EventKind::PlayerQuit),
            "chat_message" => Ok(EventKind::ChatMessage),
            "world_tick" => Ok(EventKind::WorldTick),
            _ => Err(EventError::UnknownEvent(s.to_string())),
        }
    }

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PlayerJoin => "player_join",
            EventKind::PlayerQuit => "player_quit",
            EventKind::ChatMessage => "chat_message",
            EventKind::WorldTick => "world_tick",
        }
    }
}

/// Handler dispatch priority, lowest first; `Monitor` runs last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventPriority {
    Lowest,
    Low,
    Normal,
    High,
    Highest,
    Monitor,
}

impl EventPriority {
    /// Parse a priority name; dashes and case are tolerated.
    pub fn parse(s: &str) -> Result<Self, EventError> {
        match s.replace('-', "_").to_lowercase().as_str() {
            "lowest" => Ok(EventPriority::Lowest),
            "low" => Ok(EventPriority::Low),
            "normal" => Ok(EventPriority::Normal),
            "high" => Ok(EventPriority::High),
            "highest" => Ok(EventPriority::Highest),
            "monitor" => Ok(EventPriority::Monitor),
            _ => Err(EventError::InvalidPriority(s.to_string())),
        }
    }
}

/// A binding from an event kind to a script function.
#[derive(Debug, Clone)]
pub struct RegisteredHandler {
    /// Owning script.
    pub identity: ScriptIdentity,

    /// Event kind this handler fires on.
    pub kind: EventKind,

    /// Dispatch priority.
    pub priority: EventPriority,

    /// Name of the script function to call.
    pub function: String,
}

/// Registry of live handler bindings.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<Vec<RegisteredHandler>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler binding.
    pub fn register(&self, handler: RegisteredHandler) {
        self.handlers.write().unwrap().push(handler);
    }

    /// Remove every binding owned by a script. Returns how many were
    /// removed.
    pub fn unregister_script(&self, identity: &ScriptIdentity) -> usize {
        let mut handlers = self.handlers.write().unwrap();
        let before = handlers.len();
        handlers.retain(|h| &h.identity != identity);
        before - handlers.len()
    }

    /// Bindings for one event kind, priority order; ties keep registration
    /// order.
    pub fn handlers_for(&self, kind: EventKind) -> Vec<RegisteredHandler> {
        let mut matching: Vec<RegisteredHandler> = self
            .handlers
            .read()
            .unwrap()
            .iter()
            .filter(|h| h.kind == kind)
            .cloned()
            .collect();
        matching.sort_by_key(|h| h.priority);
        matching
    }

    /// Number of bindings owned by a script.
    pub fn script_handler_count(&self, identity: &ScriptIdentity) -> usize {
        self.handlers
            .read()
            .unwrap()
            .iter()
            .filter(|h| &h.identity == identity)
            .count()
    }

    /// Total number of bindings.
    pub fn len(&self) -> usize {
        self.handlers.read().unwrap().len()
    }

    /// Whether the bus has no bindings.
    pub fn is_empty(&self) -> bool {
        self.handlers.read().unwrap().is_empty()
    }
}
