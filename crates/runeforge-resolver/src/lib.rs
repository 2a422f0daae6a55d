//! # runeforge-resolver
//!
//! Resolves the external dependencies a script declares into loadable
//! artifacts on local disk.
//!
//! This crate provides:
//! - `group:artifact:version` coordinate parsing and deduplication
//! - A process-wide on-disk artifact cache with atomic writes
//! - Pluggable artifact repositories (HTTP and local directory)
//! - Fail-fast resolution with checksum verification
//!
//! ## Resolution model
//!
//! Resolution is all-or-nothing per script: if any single coordinate cannot
//! be fetched and verified, the whole set fails. A partially-resolved script
//! is never handed to the context loader.

pub mod cache;
pub mod coordinate;
pub mod error;
pub mod repository;
pub mod resolver;

pub use cache::{fingerprint, ArtifactCache, ResolvedArtifact};
pub use coordinate::Coordinate;
pub use error::{ResolutionError, ResolutionResult};
pub use repository::{DirRepository, FetchedArtifact, HttpRepository, Repository};
pub use resolver::Resolver;
