//! Warden Devices - device trust registry and lifecycle
//!
//! Tracks known devices and moves them through the enrollment lifecycle:
//!
//! ```text
//! NOT_ENROLLED --(token issued)--> NOT_ENROLLED (token outstanding)
//!              --(token redeemed + fingerprint match)--> ENROLLED
//!              --(lock applied)--> ENROLLED + LOCKED
//! ```
//!
//! Token issuance never changes the enroll status; it only attaches an
//! ephemeral token to the record. Redemption is the only transition into
//! `Enrolled`, and it either fully completes (credential set, token
//! cleared, update time bumped) or fully fails. Locks are separate
//! resources referencing devices by ID, so lock lifecycle never mutates a
//! device record.
//!
//! All mutations go through per-record conditional writes against the
//! [`warden_store::KeyValueStore`]; unrelated devices stay fully
//! concurrent and a lost race surfaces as the retryable `CompareFailed`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Device record types and collected-data validation
pub mod device;

/// The device registry operations
pub mod registry;

/// Lock resources referencing devices
pub mod lock;

pub use device::{
    CollectedDeviceData, CreateDeviceSpec, Device, DeviceCredential, EnrollDeviceRequest,
    EnrollStatus, EnrollToken, OsType,
};
pub use lock::{CreateLockSpec, Lock, LockRegistry};
pub use registry::{DeviceRegistry, DEFAULT_ENROLL_TOKEN_TTL};
