//! Device registry operations.
//!
//! Every mutation is a read-modify-conditional-write against the record's
//! revision: the single conditional put is the commit point, so a timed
//! out or cancelled call (callers wrap operations in
//! `tokio::time::timeout`) never leaves a half-applied transition. A lost
//! race surfaces as the retryable `CompareFailed`.

use std::sync::Arc;
use subtle::ConstantTimeEq;
use time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;
use warden_core::{Clock, DeviceId, Error, Features, Result};
use warden_store::KeyValueStore;

use crate::device::{
    CollectedDeviceData, CreateDeviceSpec, Device, EnrollDeviceRequest, EnrollStatus, EnrollToken,
    OsType,
};

/// Token TTL applied when the caller does not pick one.
pub const DEFAULT_ENROLL_TOKEN_TTL: Duration = Duration::minutes(5);

pub(crate) const DEVICE_PREFIX: &str = "devices/";

// Secondary index: one entry per (os_type, asset_tag) pair, holding the
// device ID. The keyed create on this entry is the atomic uniqueness
// point for device registration.
const TAG_INDEX_PREFIX: &str = "device_tags/";

// Counter key serializing enrollments against the edition's
// enrolled-device limit.
const ENROLLED_COUNT_KEY: &str = "device_meta/enrolled_count";

// Page size for internal full scans (asset-tag lookup, enrolled count).
const SCAN_PAGE_SIZE: usize = 512;

/// The device registry.
///
/// Cheap to clone; clones share the store and clock handles.
#[derive(Clone)]
pub struct DeviceRegistry {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    features: Features,
}

impl DeviceRegistry {
    /// Create a registry over the given store.
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, features: Features) -> Self {
        Self {
            store,
            clock,
            features,
        }
    }

    /// Register a new device.
    ///
    /// Fails `AlreadyExists` when a device with the same OS type and asset
    /// tag is already registered. Optionally issues an initial enrollment
    /// token atomically with the create.
    pub async fn create_device(&self, spec: CreateDeviceSpec) -> Result<Device> {
        self.features.require_device_trust()?;
        if spec.os_type == OsType::Unspecified {
            return Err(Error::bad_parameter("device OS type required"));
        }
        if spec.asset_tag.is_empty() {
            return Err(Error::bad_parameter("device asset tag required"));
        }

        let now = self.clock.now();
        let enroll_token = if spec.create_enroll_token {
            let ttl = spec.enroll_token_ttl.unwrap_or(DEFAULT_ENROLL_TOKEN_TTL);
            Some(new_enroll_token(now, ttl)?)
        } else {
            None
        };

        let mut device = Device {
            id: DeviceId::new(),
            os_type: spec.os_type,
            asset_tag: spec.asset_tag,
            create_time: now,
            update_time: now,
            enroll_status: EnrollStatus::NotEnrolled,
            credential: None,
            enroll_token,
            revision: 0,
        };

        let value = encode_device(&device)?;

        // Uniqueness is per (os_type, asset_tag). Reserving the tag index
        // entry first makes that keyed create the commit point: of two
        // concurrent registrations for the same pair, exactly one wins.
        let tag_key = tag_key(device.os_type, &device.asset_tag);
        self.store
            .create(&tag_key, device.id.to_string().into_bytes())
            .await
            .map_err(|e| match e {
                Error::AlreadyExists { .. } => Error::already_exists("device already registered"),
                other => other,
            })?;

        match self.store.create(&device_key(device.id), value).await {
            Ok(revision) => device.revision = revision,
            Err(e) => {
                // Release the reservation so the pair stays registrable.
                if let Err(cleanup) = self.store.delete(&tag_key).await {
                    warn!(key = %tag_key, error = %cleanup, "tag index cleanup failed");
                }
                return Err(e);
            }
        }

        info!(device = %device.id, os = %device.os_type, asset_tag = %device.asset_tag,
              "device registered");
        Ok(device)
    }

    /// Look up devices by ID or asset tag, optionally filtered by OS type.
    ///
    /// Asset tags may collide across OS types, so this can legitimately
    /// return more than one device.
    pub async fn find_devices(
        &self,
        id_or_tag: &str,
        os_filter: Option<OsType>,
    ) -> Result<Vec<Device>> {
        if id_or_tag.is_empty() {
            return Err(Error::bad_parameter("param id_or_tag required"));
        }

        let mut matches = Vec::new();
        if let Ok(id) = id_or_tag.parse::<DeviceId>() {
            if let Some(device) = self.get_device(id).await? {
                matches.push(device);
            }
        }
        for device in self.scan_devices().await? {
            if device.asset_tag == id_or_tag && !matches.iter().any(|m| m.id == device.id) {
                matches.push(device);
            }
        }
        if let Some(os) = os_filter {
            matches.retain(|d| d.os_type == os);
        }
        Ok(matches)
    }

    /// Resolve exactly one device by ID or asset tag.
    ///
    /// Multiple matches are signalled as ambiguous rather than silently
    /// resolved; the caller must disambiguate by device ID (or OS filter).
    pub async fn find_one(&self, id_or_tag: &str, os_filter: Option<OsType>) -> Result<Device> {
        let mut matches = self.find_devices(id_or_tag, os_filter).await?;
        match matches.len() {
            0 => Err(Error::not_found(format!("device {id_or_tag:?} not found"))),
            1 => Ok(matches.remove(0)),
            n => Err(Error::bad_parameter(format!(
                "{n} devices match {id_or_tag:?}; disambiguate by device ID or --os"
            ))),
        }
    }

    /// List devices in key order with cursor pagination. Consistency is
    /// best-effort under concurrent inserts and deletes.
    pub async fn list_devices(
        &self,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<(Vec<Device>, Option<String>)> {
        let page = self
            .store
            .list(DEVICE_PREFIX, page_size, page_token)
            .await?;
        let mut devices = Vec::with_capacity(page.items.len());
        for item in page.items {
            devices.push(decode_device(&item.value, item.revision)?);
        }
        Ok((devices, page.next_page_token))
    }

    /// Remove a device entirely. Valid from any lifecycle state.
    pub async fn delete_device(&self, id: DeviceId) -> Result<()> {
        let device = self
            .get_device(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("device {id} not found")))?;

        self.store
            .delete(&device_key(id))
            .await
            .map_err(|e| match e {
                Error::NotFound { .. } => Error::not_found(format!("device {id} not found")),
                other => other,
            })?;

        // The record delete is the commit; index and counter upkeep are
        // follow-ups that only ever err toward stricter admission.
        let tag_key = tag_key(device.os_type, &device.asset_tag);
        match self.store.delete(&tag_key).await {
            Ok(()) | Err(Error::NotFound { .. }) => {}
            Err(e) => warn!(key = %tag_key, error = %e, "tag index cleanup failed"),
        }
        if device.enroll_status == EnrollStatus::Enrolled {
            self.release_enrolled_slot().await;
        }

        info!(device = %id, "device removed");
        Ok(())
    }

    /// Issue a fresh enrollment token for a device, invalidating any prior
    /// outstanding token. Does not change the enroll status.
    pub async fn create_enroll_token(
        &self,
        id: DeviceId,
        ttl: Option<Duration>,
    ) -> Result<EnrollToken> {
        self.features.require_device_trust()?;
        let mut device = self
            .get_device(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("device {id} not found")))?;

        let now = self.clock.now();
        let token = new_enroll_token(now, ttl.unwrap_or(DEFAULT_ENROLL_TOKEN_TTL))?;
        device.enroll_token = Some(token.clone());
        device.update_time = now;
        self.write_device(&device).await?;

        debug!(device = %id, expires = %token.expire_time, "enroll token issued");
        Ok(token)
    }

    /// Redeem an enrollment token: the only transition into `Enrolled`.
    ///
    /// Requires an unexpired token matching the outstanding one exactly
    /// (constant-time compare) and collected device data consistent with
    /// the registered OS type and asset tag. On success the credential is
    /// bound, the token cleared, and the update time bumped in a single
    /// conditional write. Every proof failure is `InvalidEnrollmentProof`
    /// and mutates nothing; the caller must request a fresh token.
    pub async fn enroll_device(&self, req: EnrollDeviceRequest) -> Result<Device> {
        self.features.require_device_trust()?;
        if req.token.is_empty() {
            return Err(Error::bad_parameter("token required"));
        }
        if req.credential.id.is_empty() {
            return Err(Error::bad_parameter("credential ID required"));
        }
        req.collected.validate()?;

        let mut device = self.resolve_enroll_target(&req).await?;
        let now = self.clock.now();

        check_enrollment_proof(&device, &req.token, &req.collected, now)?;

        let was_enrolled = device.enroll_status == EnrollStatus::Enrolled;
        device.credential = Some(req.credential);
        device.enroll_status = EnrollStatus::Enrolled;
        device.enroll_token = None;
        device.update_time = now;

        // Claim a counter slot before committing the device. The counter
        // CAS serializes concurrent enrollments, so the limit holds even
        // when the enrollments target different device records.
        if !was_enrolled {
            self.claim_enrolled_slot().await?;
        }
        if let Err(e) = self.write_device(&device).await {
            if !was_enrolled {
                self.release_enrolled_slot().await;
            }
            return Err(e);
        }

        info!(device = %device.id, asset_tag = %device.asset_tag, "device enrolled");
        Ok(device)
    }

    /// Fetch one device by ID.
    pub async fn get_device(&self, id: DeviceId) -> Result<Option<Device>> {
        match self.store.get(&device_key(id)).await? {
            Some(item) => Ok(Some(decode_device(&item.value, item.revision)?)),
            None => Ok(None),
        }
    }

    async fn resolve_enroll_target(&self, req: &EnrollDeviceRequest) -> Result<Device> {
        if let Some(id) = req.device_id {
            return self
                .get_device(id)
                .await?
                .ok_or_else(|| Error::not_found(format!("device {id} not found")));
        }
        // Resolve by collected serial across all OS types; the fingerprint
        // check decides whether the claimed OS is consistent.
        self.find_one(&req.collected.serial_number, None).await
    }

    async fn count_enrolled(&self) -> Result<usize> {
        Ok(self
            .scan_devices()
            .await?
            .iter()
            .filter(|d| d.enroll_status == EnrollStatus::Enrolled)
            .count())
    }

    // Increment the enrolled counter, enforcing the edition limit at the
    // increment. A lost race is the retryable `CompareFailed`; the caller
    // retries and sees the committed count.
    async fn claim_enrolled_slot(&self) -> Result<()> {
        match self.store.get(ENROLLED_COUNT_KEY).await? {
            Some(item) => {
                let count = decode_count(&item.value)?;
                self.check_enrolled_limit(count)?;
                self.store
                    .put_if_revision(ENROLLED_COUNT_KEY, encode_count(count + 1), item.revision)
                    .await?;
            }
            None => {
                // First tracked enrollment; seed the counter from a scan.
                // A concurrent seeder loses the keyed create.
                let count = self.count_enrolled().await? as u64;
                self.check_enrolled_limit(count)?;
                self.store
                    .create(ENROLLED_COUNT_KEY, encode_count(count + 1))
                    .await
                    .map_err(|e| match e {
                        Error::AlreadyExists { .. } => {
                            Error::compare_failed("enrolled device count changed concurrently")
                        }
                        other => other,
                    })?;
            }
        }
        Ok(())
    }

    fn check_enrolled_limit(&self, enrolled: u64) -> Result<()> {
        match self.features.max_enrolled_devices {
            Some(limit) if enrolled >= limit as u64 => Err(Error::access_denied(
                "cluster has reached its enrolled trusted device limit",
            )),
            _ => Ok(()),
        }
    }

    // Best-effort decrement. A lost race leaves the counter high, never
    // low, so the limit still holds.
    async fn release_enrolled_slot(&self) {
        match self.store.get(ENROLLED_COUNT_KEY).await {
            Ok(Some(item)) => {
                let Ok(count) = decode_count(&item.value) else {
                    return;
                };
                let next = encode_count(count.saturating_sub(1));
                if let Err(e) = self
                    .store
                    .put_if_revision(ENROLLED_COUNT_KEY, next, item.revision)
                    .await
                {
                    warn!(error = %e, "enrolled counter release failed");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "enrolled counter read failed"),
        }
    }

    async fn scan_devices(&self) -> Result<Vec<Device>> {
        let mut devices = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .store
                .list(DEVICE_PREFIX, SCAN_PAGE_SIZE, token.as_deref())
                .await?;
            for item in page.items {
                devices.push(decode_device(&item.value, item.revision)?);
            }
            match page.next_page_token {
                Some(next) => token = Some(next),
                None => return Ok(devices),
            }
        }
    }

    async fn write_device(&self, device: &Device) -> Result<()> {
        let value = encode_device(device)?;
        self.store
            .put_if_revision(&device_key(device.id), value, device.revision)
            .await?;
        Ok(())
    }
}

fn check_enrollment_proof(
    device: &Device,
    presented: &str,
    collected: &CollectedDeviceData,
    now: time::OffsetDateTime,
) -> Result<()> {
    let token = device
        .enroll_token
        .as_ref()
        .ok_or_else(|| Error::invalid_enrollment_proof("no enrollment token outstanding"))?;
    if token.expired(now) {
        return Err(Error::invalid_enrollment_proof("enrollment token expired"));
    }
    if !tokens_match(&token.token, presented) {
        return Err(Error::invalid_enrollment_proof(
            "invalid device enrollment token",
        ));
    }
    if collected.os_type != device.os_type || collected.serial_number != device.asset_tag {
        return Err(Error::invalid_enrollment_proof(
            "collected device data does not match the registered device",
        ));
    }
    Ok(())
}

// Constant-time token comparison. Length is not secret (tokens are
// fixed-format UUIDs); the content comparison must not shortcut.
fn tokens_match(stored: &str, presented: &str) -> bool {
    let (a, b) = (stored.as_bytes(), presented.as_bytes());
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

fn new_enroll_token(now: time::OffsetDateTime, ttl: Duration) -> Result<EnrollToken> {
    if ttl <= Duration::ZERO {
        return Err(Error::bad_parameter("enroll token TTL must be positive"));
    }
    Ok(EnrollToken {
        token: Uuid::new_v4().to_string(),
        expire_time: now + ttl,
    })
}

pub(crate) fn device_key(id: DeviceId) -> String {
    format!("{DEVICE_PREFIX}{id}")
}

// Asset tags are operator-supplied, so the tag lands in the key
// hex-encoded to keep separators and other key syntax out of it.
fn tag_key(os: OsType, asset_tag: &str) -> String {
    format!("{TAG_INDEX_PREFIX}{os}/{}", hex::encode(asset_tag.as_bytes()))
}

fn encode_count(count: u64) -> Vec<u8> {
    count.to_string().into_bytes()
}

fn decode_count(value: &[u8]) -> Result<u64> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::internal("corrupt enrolled device counter"))
}

fn encode_device(device: &Device) -> Result<Vec<u8>> {
    serde_json::to_vec(device).map_err(|e| Error::internal(format!("encode device: {e}")))
}

fn decode_device(value: &[u8], revision: u64) -> Result<Device> {
    let mut device: Device = serde_json::from_slice(value)
        .map_err(|e| Error::internal(format!("decode device: {e}")))?;
    device.revision = revision;
    Ok(device)
}
