//! Edition/entitlement capability object
//!
//! Capabilities are an explicit value built at startup and injected into
//! the registry and CLI constructors; nothing reads entitlement state
//! globally.

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Capabilities of this server edition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    /// Whether device trust (registry, enrollment, device-gated policy)
    /// is available.
    pub device_trust: bool,

    /// Upper bound on enrolled devices, when the edition imposes one.
    pub max_enrolled_devices: Option<usize>,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            device_trust: true,
            max_enrolled_devices: None,
        }
    }
}

impl Features {
    /// An edition with everything enabled and no limits.
    pub fn all() -> Self {
        Self::default()
    }

    /// Fail with a specific access-denied message when device trust is not
    /// part of this edition. Callers surface this verbatim; it must not be
    /// mistaken for a policy denial.
    pub fn require_device_trust(&self) -> Result<()> {
        if self.device_trust {
            Ok(())
        } else {
            Err(Error::access_denied(
                "device trust requires an enterprise license",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn device_trust_gating() {
        assert!(Features::all().require_device_trust().is_ok());

        let oss = Features {
            device_trust: false,
            max_enrolled_devices: None,
        };
        assert_matches!(
            oss.require_device_trust(),
            Err(Error::AccessDenied { message }) if message.contains("enterprise license")
        );
    }
}
