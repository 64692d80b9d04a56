//! Warden Decision - policy decision point and evaluator facade
//!
//! Turns an access request into a [`Decision`]: permit with resolved
//! connection constraints, or denial with an operator-readable reason.
//! The split between outcomes and errors is the central contract here:
//!
//! - `Ok(Decision::Permit | Decision::Denial)`: the evaluation ran;
//! - `Err(_)`: the evaluation could not run (malformed input, rule
//!   store unreachable), and retryability follows the error kind.
//!
//! The [`PolicyDecisionPoint`] is pure over a pre-gathered input
//! snapshot; the [`LocalEvaluator`] facade does the gathering (role
//! resolution, device + lock snapshot) and is the seam where a fake
//! evaluator substitutes in tests. Dry-run requests follow the identical
//! evaluation path and only skip the audit sink, so administrative
//! "what-if" output is bit-identical to a live evaluation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// The decision outcome type
pub mod decision;

/// Role model and label matching
pub mod role;

/// Request and identity types
pub mod request;

/// Rule-store seam
pub mod provider;

/// The pure decision point
pub mod pdp;

/// The evaluator facade
pub mod evaluator;

/// Rendering decisions for operators
pub mod report;

pub use decision::{Decision, DenialMetadata, PermitMetadata, PDP_VERSION};
pub use evaluator::{AuditSink, DecisionEvaluator, LocalEvaluator, NoopAuditSink};
pub use pdp::{DeviceContext, EvaluationInput, PolicyDecisionPoint, MAX_SESSION_TTL};
pub use provider::{RoleProvider, StaticRoleProvider};
pub use report::DecisionReporter;
pub use request::{DecisionRequest, Identity, Resource};
pub use role::{LabelMatchers, Role, RoleOptions};
