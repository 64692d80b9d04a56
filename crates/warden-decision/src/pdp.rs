//! The policy decision point.
//!
//! Evaluation is a pure function of its input snapshot: identity, the
//! resolved roles, the target resource, and the device state gathered by
//! the facade. No I/O happens here; the rule walk is CPU-bound and never
//! blocks. Callers get back either `Ok(Decision)`, where permit and
//! denial are both successful evaluations, or an error meaning the
//! evaluation could not run at all.

use time::Duration;
use tracing::debug;
use warden_core::{Error, Result};
use warden_devices::{Device, EnrollStatus, Lock};

use crate::decision::{Decision, PermitMetadata, PDP_VERSION};
use crate::request::{Identity, Resource};
use crate::role::Role;

/// System ceiling on granted session lifetime. Role-granted TTLs compose
/// with this by minimum, never maximum.
pub const MAX_SESSION_TTL: Duration = Duration::hours(30);

/// Snapshot of the acting identity's device state at evaluation time.
///
/// Gathered by the facade before evaluation; no linearizability with
/// concurrent lock changes is claimed, but the snapshot is never torn.
#[derive(Debug, Clone)]
pub struct DeviceContext {
    /// The bound device record.
    pub device: Device,
    /// Locks in force against the device at snapshot time.
    pub locks: Vec<Lock>,
}

/// Everything an evaluation reads.
#[derive(Debug, Clone)]
pub struct EvaluationInput {
    /// Acting identity.
    pub identity: Identity,
    /// The identity's resolved roles, in resolution order.
    pub roles: Vec<Role>,
    /// Target resource.
    pub resource: Resource,
    /// Device snapshot, when the identity carries a device binding.
    pub device: Option<DeviceContext>,
}

/// The policy decision point. Stateless; safe to share across tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyDecisionPoint;

impl PolicyDecisionPoint {
    /// Create a decision point.
    pub fn new() -> Self {
        Self
    }

    /// Evaluate one request snapshot into a decision.
    pub fn evaluate(&self, input: &EvaluationInput) -> Result<Decision> {
        if input.resource.name().is_empty() {
            return Err(Error::bad_parameter("resource name required"));
        }

        // Device trust gates before any rule matching: a role demanding a
        // trusted device denies outright when the identity has no binding,
        // and an unlocked enrolled device is a precondition whenever a
        // binding is present.
        let requires_device = input.roles.iter().any(|r| r.options.require_trusted_device);
        match &input.device {
            None if requires_device => {
                return Ok(Decision::denial("device trust required"));
            }
            None => {}
            Some(ctx) => {
                if let Some(lock) = ctx.locks.first() {
                    return Ok(Decision::denial(format!(
                        "device is locked: {}",
                        lock.message
                    )));
                }
                if ctx.device.enroll_status != EnrollStatus::Enrolled {
                    return Ok(Decision::denial("device is not enrolled"));
                }
            }
        }

        let matching: Vec<&Role> = match &input.resource {
            Resource::Node { labels, .. } => input
                .roles
                .iter()
                .filter(|r| r.matches_node(labels))
                .collect(),
            Resource::Database { name, labels } => input
                .roles
                .iter()
                .filter(|r| r.matches_database(name, labels))
                .collect(),
        };

        let logins = match &input.resource {
            Resource::Node { .. } => resolve_logins(&matching, input.identity.os_login.as_deref()),
            Resource::Database { .. } => Vec::new(),
        };

        let granted = match &input.resource {
            Resource::Node { .. } => !logins.is_empty(),
            Resource::Database { .. } => !matching.is_empty(),
        };
        if !granted {
            debug!(user = %input.identity.username, resource = %input.resource.name(),
                   "no matching role grant");
            return Ok(Decision::denial(
                "access denied: no matching role grants access",
            ));
        }

        Ok(Decision::Permit(compose_permit(&matching, logins)))
    }
}

// Logins in role order, first occurrence wins; a requested login narrows
// the set to itself when granted, and to nothing when not.
fn resolve_logins(roles: &[&Role], requested: Option<&str>) -> Vec<String> {
    let mut logins: Vec<String> = Vec::new();
    for role in roles {
        for login in &role.logins {
            if !logins.contains(login) {
                logins.push(login.clone());
            }
        }
    }
    match requested {
        Some(login) if logins.iter().any(|l| l == login) => vec![login.to_string()],
        Some(_) => Vec::new(),
        None => logins,
    }
}

// Constraint composition across matching roles: TTLs and idle timeouts by
// minimum (least privilege), connection flags by any-role-grants.
fn compose_permit(roles: &[&Role], logins: Vec<String>) -> PermitMetadata {
    let max_session_ttl = roles
        .iter()
        .map(|r| r.options.max_session_ttl)
        .filter(|ttl| *ttl > Duration::ZERO)
        .min()
        .map_or(MAX_SESSION_TTL, |ttl| ttl.min(MAX_SESSION_TTL));

    let client_idle_timeout = roles
        .iter()
        .filter_map(|r| r.options.client_idle_timeout)
        .min();

    PermitMetadata {
        logins,
        max_session_ttl,
        forward_agent: roles.iter().any(|r| r.options.forward_agent),
        port_forwarding: roles.iter().any(|r| r.options.port_forwarding),
        client_idle_timeout,
        disconnect_expired_cert: roles.iter().any(|r| r.options.disconnect_expired_cert),
        pdp_version: PDP_VERSION.to_string(),
    }
}
