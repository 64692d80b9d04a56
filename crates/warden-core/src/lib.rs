//! Warden Core - foundation types
//!
//! This crate provides the foundational types shared by every other warden
//! crate. It contains only pure domain types with no I/O:
//!
//! - Identifier newtypes (`DeviceId`, `LockName`, `ClusterName`)
//! - The unified [`Error`] type and [`Result`] alias
//! - The [`Clock`] seam for testable time
//! - The [`Features`] capability object (edition/entitlement gating)
//!
//! Higher layers (store, registry, decision point, CLI) depend on this
//! crate and nothing in it depends on them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Device, lock, and cluster identifiers
pub mod identifiers;

/// Unified error handling
pub mod errors;

/// Injected clock abstraction for testable time
pub mod clock;

/// Edition/entitlement capability object
pub mod features;

pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{Error, Result};
pub use features::Features;
pub use identifiers::{ClusterName, DeviceId, LockName};
