//! Local host identifier collection for `--current-device`.

use warden_core::{Error, Result};
use warden_devices::OsType;

/// The OS type this binary was built for.
pub fn current_os_type() -> Result<OsType> {
    if cfg!(target_os = "linux") {
        Ok(OsType::Linux)
    } else if cfg!(target_os = "macos") {
        Ok(OsType::Macos)
    } else if cfg!(target_os = "windows") {
        Ok(OsType::Windows)
    } else {
        Err(Error::bad_parameter(
            "cannot determine the local OS type; pass --os explicitly",
        ))
    }
}

/// Stable identifier for the local host, used as the asset tag when the
/// operator asks for `--current-device`.
pub fn current_asset_tag() -> Result<String> {
    match sysinfo::System::host_name() {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(Error::bad_parameter(
            "cannot determine the local host name; pass --asset-tag explicitly",
        )),
    }
}
