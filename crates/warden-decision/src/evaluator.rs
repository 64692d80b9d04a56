//! The evaluator facade.
//!
//! Gathers everything an evaluation reads (resolved roles, the device
//! snapshot with its in-force locks) and hands the assembled input to
//! the decision point. The facade is stateless: clones share handles and
//! concurrent callers need no coordination.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;
use warden_core::{ClusterName, Error, Result};
use warden_devices::{DeviceRegistry, LockRegistry};

use crate::decision::Decision;
use crate::pdp::{DeviceContext, EvaluationInput, PolicyDecisionPoint};
use crate::provider::RoleProvider;
use crate::request::{DecisionRequest, Resource};

/// The decision evaluation capability.
///
/// One production implementation ([`LocalEvaluator`]) evaluates in
/// process; tests substitute fakes behind the same trait.
#[async_trait]
pub trait DecisionEvaluator: Send + Sync {
    /// Evaluate SSH access to a node. The request's resource must be a
    /// node, otherwise `BadParameter`.
    async fn evaluate_ssh_access(&self, request: &DecisionRequest) -> Result<Decision>;

    /// Evaluate access to a database. The request's resource must be a
    /// database, otherwise `BadParameter`.
    async fn evaluate_database_access(&self, request: &DecisionRequest) -> Result<Decision>;
}

/// Sink for committed decision records. Audit emission itself is an
/// external collaborator; this is only the seam the facade writes to.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record one evaluated decision.
    async fn record(&self, request: &DecisionRequest, decision: &Decision) -> Result<()>;
}

/// Audit sink that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

#[async_trait]
impl AuditSink for NoopAuditSink {
    async fn record(&self, _request: &DecisionRequest, _decision: &Decision) -> Result<()> {
        Ok(())
    }
}

/// In-process evaluator over the device registry and rule store.
#[derive(Clone)]
pub struct LocalEvaluator {
    cluster: ClusterName,
    roles: Arc<dyn RoleProvider>,
    devices: DeviceRegistry,
    locks: LockRegistry,
    audit: Arc<dyn AuditSink>,
    pdp: PolicyDecisionPoint,
}

impl LocalEvaluator {
    /// Create an evaluator scoped to `cluster`.
    pub fn new(
        cluster: ClusterName,
        roles: Arc<dyn RoleProvider>,
        devices: DeviceRegistry,
        locks: LockRegistry,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            cluster,
            roles,
            devices,
            locks,
            audit,
            pdp: PolicyDecisionPoint::new(),
        }
    }

    async fn evaluate(&self, request: &DecisionRequest) -> Result<Decision> {
        if request.cluster != self.cluster {
            return Err(Error::bad_parameter(format!(
                "request is scoped to cluster {:?}, this evaluator serves {:?}",
                request.cluster.as_str(),
                self.cluster.as_str()
            )));
        }

        let roles = self.roles.roles_named(&request.identity.roles).await?;

        // Snapshot the bound device and its locks before evaluation. A
        // binding to a record that no longer exists is an operational
        // failure, not a policy outcome.
        let device = match request.identity.device_id {
            Some(id) => {
                let device = self
                    .devices
                    .get_device(id)
                    .await?
                    .ok_or_else(|| Error::not_found(format!("device {id} not found")))?;
                let locks = self.locks.locks_in_force(id).await?;
                Some(DeviceContext { device, locks })
            }
            None => None,
        };

        let decision = self.pdp.evaluate(&EvaluationInput {
            identity: request.identity.clone(),
            roles,
            resource: request.resource.clone(),
            device,
        })?;

        // Dry-run commits nothing; everything above ran identically, so
        // the decision matches what a live request would get. An audit
        // write failure does not invalidate an already-made decision.
        if !request.dry_run {
            if let Err(e) = self.audit.record(request, &decision).await {
                warn!(error = %e, user = %request.identity.username, "audit record failed");
            }
        }
        Ok(decision)
    }
}

#[async_trait]
impl DecisionEvaluator for LocalEvaluator {
    async fn evaluate_ssh_access(&self, request: &DecisionRequest) -> Result<Decision> {
        match request.resource {
            Resource::Node { .. } => self.evaluate(request).await,
            Resource::Database { .. } => {
                Err(Error::bad_parameter("SSH evaluation expects a node resource"))
            }
        }
    }

    async fn evaluate_database_access(&self, request: &DecisionRequest) -> Result<Decision> {
        match request.resource {
            Resource::Database { .. } => self.evaluate(request).await,
            Resource::Node { .. } => Err(Error::bad_parameter(
                "database evaluation expects a database resource",
            )),
        }
    }
}
