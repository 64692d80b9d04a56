//! Device trust administration commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use warden_core::Error;
use warden_devices::{CreateDeviceSpec, CreateLockSpec, Device, OsType};

use crate::context::AppContext;
use crate::durations::parse_duration;
use crate::host;

const LIST_PAGE_SIZE: usize = 100;

/// `warden devices` subcommands.
#[derive(Subcommand)]
pub enum DevicesCommand {
    /// Register a device
    Add {
        /// Device OS type (linux, macos, windows)
        #[arg(long)]
        os: Option<String>,

        /// Device asset tag (e.g. hardware serial)
        #[arg(long)]
        asset_tag: Option<String>,

        /// Derive OS type and asset tag from the local host
        #[arg(long)]
        current_device: bool,

        /// Issue an enrollment token together with the registration
        #[arg(long)]
        enroll: bool,

        /// TTL for the initial enrollment token (e.g. 10m, 2h)
        #[arg(long)]
        enroll_ttl: Option<String>,
    },

    /// List registered devices
    Ls,

    /// Remove a device
    Rm {
        #[command(flatten)]
        target: DeviceTarget,
    },

    /// Issue an enrollment token for a device
    Enroll {
        #[command(flatten)]
        target: DeviceTarget,

        /// Token TTL (e.g. 10m, 2h)
        #[arg(long)]
        ttl: Option<String>,
    },

    /// Lock a device, blocking access decisions that require it
    Lock {
        #[command(flatten)]
        target: DeviceTarget,

        /// Reason shown in denials
        #[arg(long, default_value = "device locked by administrator")]
        message: String,

        /// Lock expiry as an RFC 3339 timestamp
        #[arg(long)]
        expires: Option<String>,

        /// Lock expiry as a duration from now (e.g. 2h)
        #[arg(long)]
        ttl: Option<String>,
    },
}

/// Flags identifying one device. Exactly one of `--device-id` and
/// `--asset-tag` is required; `--current-device` overrides both by
/// deriving identifiers from the local host.
#[derive(Args)]
pub struct DeviceTarget {
    /// Device ID
    #[arg(long)]
    pub device_id: Option<String>,

    /// Device asset tag
    #[arg(long)]
    pub asset_tag: Option<String>,

    /// OS type filter, for asset tags shared across platforms
    #[arg(long)]
    pub os: Option<String>,

    /// Target the local host's device record
    #[arg(long)]
    pub current_device: bool,
}

impl DeviceTarget {
    fn resolve_query(&self) -> Result<(String, Option<OsType>), Error> {
        if self.current_device {
            return Ok((host::current_asset_tag()?, Some(host::current_os_type()?)));
        }
        let os_filter = self.os.as_deref().map(str::parse).transpose()?;
        match (&self.device_id, &self.asset_tag) {
            (Some(_), Some(_)) => Err(Error::bad_parameter(
                "--device-id and --asset-tag are mutually exclusive",
            )),
            (Some(id), None) => Ok((id.clone(), os_filter)),
            (None, Some(tag)) => Ok((tag.clone(), os_filter)),
            (None, None) => Err(Error::bad_parameter(
                "one of --device-id, --asset-tag, or --current-device is required",
            )),
        }
    }

    async fn find(&self, ctx: &AppContext) -> Result<Device, Error> {
        let (query, os_filter) = self.resolve_query()?;
        ctx.devices.find_one(&query, os_filter).await
    }
}

/// Dispatch a `devices` subcommand.
pub async fn handle_devices_command(cmd: DevicesCommand, ctx: &AppContext) -> Result<()> {
    ctx.features.require_device_trust()?;
    match cmd {
        DevicesCommand::Add {
            os,
            asset_tag,
            current_device,
            enroll,
            enroll_ttl,
        } => add(ctx, os, asset_tag, current_device, enroll, enroll_ttl).await,
        DevicesCommand::Ls => ls(ctx).await,
        DevicesCommand::Rm { target } => rm(ctx, target).await,
        DevicesCommand::Enroll { target, ttl } => enroll_token(ctx, target, ttl).await,
        DevicesCommand::Lock {
            target,
            message,
            expires,
            ttl,
        } => lock(ctx, target, message, expires, ttl).await,
    }
}

async fn add(
    ctx: &AppContext,
    os: Option<String>,
    asset_tag: Option<String>,
    current_device: bool,
    enroll: bool,
    enroll_ttl: Option<String>,
) -> Result<()> {
    let (os_type, asset_tag) = if current_device {
        (host::current_os_type()?, host::current_asset_tag()?)
    } else {
        let os_type = os
            .ok_or_else(|| Error::bad_parameter("--os is required (or --current-device)"))?
            .parse()?;
        let asset_tag = asset_tag
            .ok_or_else(|| Error::bad_parameter("--asset-tag is required (or --current-device)"))?;
        (os_type, asset_tag)
    };
    let enroll_token_ttl = enroll_ttl.as_deref().map(parse_duration).transpose()?;

    let device = ctx
        .devices
        .create_device(CreateDeviceSpec {
            os_type,
            asset_tag,
            create_enroll_token: enroll,
            enroll_token_ttl,
        })
        .await?;

    println!(
        "Device {}/{} registered with ID {}",
        device.os_type, device.asset_tag, device.id
    );
    if let Some(token) = &device.enroll_token {
        print_enroll_token(&token.token, token.expire_time)?;
    }
    Ok(())
}

async fn ls(ctx: &AppContext) -> Result<()> {
    println!(
        "{:<36} {:<8} {:<24} {}",
        "ID", "OS", "ASSET TAG", "STATUS"
    );
    let mut page_token: Option<String> = None;
    loop {
        let (devices, next) = ctx
            .devices
            .list_devices(LIST_PAGE_SIZE, page_token.as_deref())
            .await?;
        for device in devices {
            // Pad on pre-rendered strings; width flags do not reach the
            // newtype Display impls.
            println!(
                "{:<36} {:<8} {:<24} {}",
                device.id.to_string(),
                device.os_type.to_string(),
                device.asset_tag,
                device.enroll_status
            );
        }
        match next {
            Some(token) => page_token = Some(token),
            None => return Ok(()),
        }
    }
}

async fn rm(ctx: &AppContext, target: DeviceTarget) -> Result<()> {
    let device = target.find(ctx).await?;
    ctx.devices.delete_device(device.id).await?;
    println!("Device {}/{} removed", device.os_type, device.asset_tag);
    Ok(())
}

async fn enroll_token(ctx: &AppContext, target: DeviceTarget, ttl: Option<String>) -> Result<()> {
    let device = target.find(ctx).await?;
    let ttl = ttl.as_deref().map(parse_duration).transpose()?;
    let token = ctx.devices.create_enroll_token(device.id, ttl).await?;
    print_enroll_token(&token.token, token.expire_time)?;
    Ok(())
}

async fn lock(
    ctx: &AppContext,
    target: DeviceTarget,
    message: String,
    expires: Option<String>,
    ttl: Option<String>,
) -> Result<()> {
    let device = target.find(ctx).await?;
    let expires = lock_expiry(ctx.clock.now(), expires, ttl)?;

    let lock = ctx
        .locks
        .create_lock(CreateLockSpec {
            target: device.id,
            message,
            expires,
        })
        .await?;
    match lock.expires {
        Some(expires) => println!(
            "Device {}/{} locked until {} (lock {})",
            device.os_type,
            device.asset_tag,
            expires.format(&Rfc3339)?,
            lock.name
        ),
        None => println!(
            "Device {}/{} locked until released (lock {})",
            device.os_type, device.asset_tag, lock.name
        ),
    }
    Ok(())
}

// Expiry flags resolve against the context clock, not wall time read
// here, so lock lifetimes line up with what the registries observe.
fn lock_expiry(
    now: OffsetDateTime,
    expires: Option<String>,
    ttl: Option<String>,
) -> Result<Option<OffsetDateTime>, Error> {
    match (expires, ttl) {
        (Some(_), Some(_)) => Err(Error::bad_parameter(
            "--expires and --ttl are mutually exclusive",
        )),
        (Some(stamp), None) => Ok(Some(OffsetDateTime::parse(&stamp, &Rfc3339).map_err(
            |e| Error::bad_parameter(format!("invalid --expires timestamp {stamp:?}: {e}")),
        )?)),
        (None, Some(ttl)) => Ok(Some(now + parse_duration(&ttl)?)),
        (None, None) => Ok(None),
    }
}

fn print_enroll_token(token: &str, expire_time: OffsetDateTime) -> Result<()> {
    println!("Enrollment token: {token}");
    println!("Expires at:       {}", expire_time.format(&Rfc3339)?);
    println!("The token is single-use and replaces any outstanding token.");
    Ok(())
}
