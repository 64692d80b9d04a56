//! Device record types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::{Duration, OffsetDateTime};
use warden_core::{DeviceId, Error, Result};

/// Operating system of a registered device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsType {
    /// OS not specified; rejected on create.
    Unspecified,
    /// Linux.
    Linux,
    /// macOS.
    Macos,
    /// Windows.
    Windows,
}

impl fmt::Display for OsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OsType::Unspecified => "unspecified",
            OsType::Linux => "linux",
            OsType::Macos => "macos",
            OsType::Windows => "windows",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OsType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "linux" => Ok(OsType::Linux),
            "macos" => Ok(OsType::Macos),
            "windows" => Ok(OsType::Windows),
            other => Err(Error::bad_parameter(format!("unknown OS type {other:?}"))),
        }
    }
}

/// Enrollment status of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollStatus {
    /// Status not specified; never stored.
    Unspecified,
    /// Registered but not yet enrolled.
    NotEnrolled,
    /// Enrolled; a credential is bound.
    Enrolled,
}

impl fmt::Display for EnrollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EnrollStatus::Unspecified => "unspecified",
            EnrollStatus::NotEnrolled => "not_enrolled",
            EnrollStatus::Enrolled => "enrolled",
        };
        write!(f, "{s}")
    }
}

/// Public-key material bound to a device at enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCredential {
    /// Credential identifier chosen by the enrolling client.
    pub id: String,
    /// Opaque public key bytes.
    pub public_key: Vec<u8>,
}

/// Ephemeral enrollment token. Present on a device record only between
/// issuance and consumption; single-use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollToken {
    /// Cryptographically random, unguessable token value.
    pub token: String,
    /// When the token stops being redeemable.
    pub expire_time: OffsetDateTime,
}

impl EnrollToken {
    /// Whether the token is already expired at `now`.
    pub fn expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expire_time
    }
}

/// A registered device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Server-generated identifier.
    pub id: DeviceId,
    /// Operating system.
    pub os_type: OsType,
    /// Stable external identifier, e.g. a hardware serial. Unique per
    /// OS type within the registry.
    pub asset_tag: String,
    /// Server-assigned creation time.
    pub create_time: OffsetDateTime,
    /// Server-assigned time of the last mutation.
    pub update_time: OffsetDateTime,
    /// Enrollment status.
    pub enroll_status: EnrollStatus,
    /// Bound credential; set if and only if the device is enrolled.
    pub credential: Option<DeviceCredential>,
    /// Outstanding enrollment token, at most one at a time.
    pub enroll_token: Option<EnrollToken>,

    /// Store generation counter backing optimistic concurrency. Populated
    /// on read, never persisted inside the record itself.
    #[serde(skip)]
    pub revision: u64,
}

/// Data collected from the physical device during enrollment, checked
/// against the claimed registry record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedDeviceData {
    /// OS observed on the device.
    pub os_type: OsType,
    /// Hardware serial observed on the device; matched against the
    /// record's asset tag.
    pub serial_number: String,
    /// When the data was collected.
    pub collect_time: OffsetDateTime,
}

impl CollectedDeviceData {
    /// Validate the collected data before it is used for any lookup.
    pub fn validate(&self) -> Result<()> {
        if self.os_type == OsType::Unspecified {
            return Err(Error::bad_parameter("device OS type required"));
        }
        if self.serial_number.is_empty() {
            return Err(Error::bad_parameter("device serial number required"));
        }
        Ok(())
    }
}

/// Administrative device creation request.
#[derive(Debug, Clone)]
pub struct CreateDeviceSpec {
    /// Operating system; required.
    pub os_type: OsType,
    /// Asset tag; required.
    pub asset_tag: String,
    /// Issue an initial enrollment token atomically with the create.
    pub create_enroll_token: bool,
    /// TTL for the initial token; defaults when `None`.
    pub enroll_token_ttl: Option<Duration>,
}

/// Enrollment redemption request.
#[derive(Debug, Clone)]
pub struct EnrollDeviceRequest {
    /// Explicit target device. When absent the device is resolved from the
    /// collected serial number.
    pub device_id: Option<DeviceId>,
    /// The token being spent.
    pub token: String,
    /// Fingerprint data collected from the enrolling device.
    pub collected: CollectedDeviceData,
    /// Credential to bind on success.
    pub credential: DeviceCredential,
}
