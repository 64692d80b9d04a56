//! Command handlers, one module per command family.

pub mod access;
pub mod devices;

pub use access::{handle_access_command, AccessCommand};
pub use devices::{handle_devices_command, DevicesCommand};
