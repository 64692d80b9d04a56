//! Warden Store - revisioned key-value interface
//!
//! Device and lock records are the only shared mutable state in the
//! system, and they are reached exclusively through the narrow
//! [`KeyValueStore`] trait defined here: get / create / put /
//! put-if-revision / delete / paginated list. Every stored item carries a
//! revision (generation counter) so callers can do per-record optimistic
//! concurrency instead of taking a global lock.
//!
//! Two handlers ship with the crate:
//!
//! - [`MemoryStore`]: in-process map, used by tests and ephemeral setups
//! - [`FilesystemStore`]: one JSON document per key under a base
//!   directory, used by the CLI's local state directory
//!
//! A durable backend engine is an external collaborator; it plugs in by
//! implementing the same trait.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// The store trait and item/page types
pub mod kv;

/// In-process store handler
pub mod memory;

/// Filesystem-backed store handler
pub mod filesystem;

pub use filesystem::FilesystemStore;
pub use kv::{Item, KeyValueStore, Page};
pub use memory::MemoryStore;
