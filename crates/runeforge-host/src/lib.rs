//! # runeforge-host
//!
//! The bridge between concurrently-running script tasks and the host's
//! single-threaded world state.
//!
//! This crate provides:
//! - The host thread and its submission queue (`HostBridge`)
//! - The live world state mutated only on that thread (`WorldState`)
//! - Host events, priorities and the handler registry (`EventBus`)
//! - The capability-style host API surface scripts program against
//!
//! ## Threading model
//!
//! Exactly one thread may mutate world state. Script code runs on worker
//! threads and marshals every world access through [`HostBridge::submit`];
//! the caller suspends until the submitted unit completes or is cancelled.

pub mod api;
pub mod bridge;
pub mod error;
pub mod event;
pub mod world;

pub use api::{text_module, HandlerCollector, HostApi, PendingHandler, ScheduleSpec};
pub use bridge::HostBridge;
pub use error::{BridgeError, BridgeResult, EventError};
pub use event::{EventBus, EventKind, EventPriority, GameEvent, RegisteredHandler};
pub use world::WorldState;
