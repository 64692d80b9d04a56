//! Decision request types.
//!
//! A request is ephemeral and always names exactly one acting identity
//! and one target resource; batch evaluation is repeated single calls,
//! never implicit fan-out.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use warden_core::{ClusterName, DeviceId};

/// The acting identity a decision is evaluated for.
///
/// For live requests the fields come from the caller's session identity.
/// Administrative dry-run tooling synthesizes one explicitly (username,
/// role names, optional login) with the request marked `dry_run`; the
/// decision point takes no other notice of the distinction, so dry-run
/// output is bit-identical to a live evaluation with the same inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Username the evaluation acts as.
    pub username: String,
    /// Names of the roles held by the identity, resolved against the
    /// rule store at evaluation time.
    pub roles: Vec<String>,
    /// Specific OS login requested, when the caller has one in mind.
    pub os_login: Option<String>,
    /// Trusted-device binding carried by the identity, when present.
    pub device_id: Option<DeviceId>,
}

/// The resource a decision is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resource {
    /// An SSH-reachable host.
    Node {
        /// Node name.
        name: String,
        /// Node labels, matched against role label matchers.
        labels: BTreeMap<String, String>,
    },
    /// A database.
    Database {
        /// Database name.
        name: String,
        /// Database labels.
        labels: BTreeMap<String, String>,
    },
}

impl Resource {
    /// The resource's name.
    pub fn name(&self) -> &str {
        match self {
            Self::Node { name, .. } | Self::Database { name, .. } => name,
        }
    }

    /// The resource's labels.
    pub fn labels(&self) -> &BTreeMap<String, String> {
        match self {
            Self::Node { labels, .. } | Self::Database { labels, .. } => labels,
        }
    }
}

/// A single evaluation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRequest {
    /// Cluster whose authority scopes this request. The evaluator only
    /// trusts requests scoped to its own cluster.
    pub cluster: ClusterName,
    /// Acting identity.
    pub identity: Identity,
    /// Target resource.
    pub resource: Resource,
    /// When set, the evaluation runs the full rule path but commits no
    /// side effects (no audit records).
    pub dry_run: bool,
}
