//! The decision outcome type.
//!
//! A decision is the result of a *successful* policy evaluation. Denials
//! are decisions, not errors; the error channel is reserved for
//! evaluations that failed to run at all (malformed input, rule store
//! unreachable). The sum type makes the exclusivity invariant structural:
//! a decision is always exactly one of permit or denial.

use serde::{Deserialize, Serialize};
use time::Duration;

/// Version string stamped on every decision, for cross-version
/// diagnostics when client and server decision points diverge.
pub const PDP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Outcome of a policy evaluation.
///
/// Immutable once returned; callers must not mutate and re-use a
/// decision as if re-evaluating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Access is granted, with the resolved connection constraints.
    Permit(PermitMetadata),
    /// Access is denied, with an operator-readable reason.
    Denial(DenialMetadata),
}

impl Decision {
    /// Build a denial carrying `message` and the current PDP version.
    pub fn denial(message: impl Into<String>) -> Self {
        Self::Denial(DenialMetadata {
            message: message.into(),
            pdp_version: PDP_VERSION.to_string(),
        })
    }

    /// Whether this decision is a permit.
    pub fn is_permit(&self) -> bool {
        matches!(self, Self::Permit(_))
    }
}

/// Constraints attached to a permit, consumed downstream by the
/// credential-minting collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitMetadata {
    /// Allowed OS logins in role order, first occurrence wins for
    /// downstream login selection. Empty for database permits.
    pub logins: Vec<String>,
    /// Maximum session lifetime. Composed as the minimum across all
    /// matching roles and the system ceiling.
    pub max_session_ttl: Duration,
    /// Whether agent forwarding is allowed.
    pub forward_agent: bool,
    /// Whether port forwarding is allowed.
    pub port_forwarding: bool,
    /// Disconnect the client after this much idle time, when set.
    pub client_idle_timeout: Option<Duration>,
    /// Whether to disconnect the session when the certificate expires.
    pub disconnect_expired_cert: bool,
    /// Version of the decision point that produced this permit.
    pub pdp_version: String,
}

/// Reason attached to a denial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenialMetadata {
    /// Human-readable reason, shown to the requesting user.
    pub message: String,
    /// Version of the decision point that produced this denial.
    pub pdp_version: String,
}
