//! Access evaluation commands.
//!
//! Both entry points print the decision to stdout and exit zero: a
//! denial is a successful evaluation. Only operational failures (bad
//! flags, unreachable store, unknown roles) become errors.

use anyhow::Result;
use clap::Subcommand;
use std::collections::BTreeMap;
use warden_core::{DeviceId, Error};
use warden_decision::{
    DecisionEvaluator, DecisionReporter, DecisionRequest, Identity, Resource,
};

use crate::context::AppContext;

/// `warden access` subcommands.
#[derive(Subcommand)]
pub enum AccessCommand {
    /// Evaluate SSH access to a node
    Ssh {
        /// Username to evaluate as
        #[arg(long)]
        user: String,

        /// Target node name
        #[arg(long)]
        node: String,

        /// Specific OS login to request
        #[arg(long)]
        login: Option<String>,

        /// Node label, `key=value`; repeatable
        #[arg(long = "label")]
        labels: Vec<String>,

        /// Device binding carried by the identity
        #[arg(long)]
        device_id: Option<String>,

        /// Synthesize the identity with these roles (comma separated);
        /// requires --dry-run
        #[arg(long)]
        roles: Option<String>,

        /// Run the full evaluation without committing side effects
        #[arg(long)]
        dry_run: bool,

        /// Print the decision as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Evaluate access to a database
    Db {
        /// Username to evaluate as
        #[arg(long)]
        user: String,

        /// Target database name
        #[arg(long)]
        database: String,

        /// Database label, `key=value`; repeatable
        #[arg(long = "label")]
        labels: Vec<String>,

        /// Device binding carried by the identity
        #[arg(long)]
        device_id: Option<String>,

        /// Synthesize the identity with these roles (comma separated);
        /// requires --dry-run
        #[arg(long)]
        roles: Option<String>,

        /// Run the full evaluation without committing side effects
        #[arg(long)]
        dry_run: bool,

        /// Print the decision as JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

/// Dispatch an `access` subcommand.
pub async fn handle_access_command(cmd: AccessCommand, ctx: &AppContext) -> Result<()> {
    match cmd {
        AccessCommand::Ssh {
            user,
            node,
            login,
            labels,
            device_id,
            roles,
            dry_run,
            json,
        } => {
            let identity = build_identity(ctx, &user, login, device_id, roles, dry_run)?;
            let request = DecisionRequest {
                cluster: ctx.cluster.clone(),
                identity,
                resource: Resource::Node {
                    name: node,
                    labels: parse_labels(&labels)?,
                },
                dry_run,
            };
            let decision = ctx.evaluator.evaluate_ssh_access(&request).await?;
            print_decision(&decision, json)
        }
        AccessCommand::Db {
            user,
            database,
            labels,
            device_id,
            roles,
            dry_run,
            json,
        } => {
            let identity = build_identity(ctx, &user, None, device_id, roles, dry_run)?;
            let request = DecisionRequest {
                cluster: ctx.cluster.clone(),
                identity,
                resource: Resource::Database {
                    name: database,
                    labels: parse_labels(&labels)?,
                },
                dry_run,
            };
            let decision = ctx.evaluator.evaluate_database_access(&request).await?;
            print_decision(&decision, json)
        }
    }
}

fn build_identity(
    ctx: &AppContext,
    user: &str,
    os_login: Option<String>,
    device_id: Option<String>,
    roles: Option<String>,
    dry_run: bool,
) -> Result<Identity, Error> {
    let role_names = match roles {
        Some(roles) if dry_run => roles.split(',').map(|r| r.trim().to_string()).collect(),
        Some(_) => {
            // Synthetic identities are dry-run-only administrative tooling.
            return Err(Error::bad_parameter("--roles requires --dry-run"));
        }
        None => ctx.users.get(user).cloned().ok_or_else(|| {
            Error::bad_parameter(format!(
                "user {user:?} is not assigned roles; define it under [users] or pass --roles with --dry-run"
            ))
        })?,
    };
    let device_id = device_id
        .as_deref()
        .map(|id| {
            id.parse::<DeviceId>()
                .map_err(|_| Error::bad_parameter(format!("invalid device ID {id:?}")))
        })
        .transpose()?;

    Ok(Identity {
        username: user.to_string(),
        roles: role_names,
        os_login,
        device_id,
    })
}

fn parse_labels(labels: &[String]) -> Result<BTreeMap<String, String>, Error> {
    labels
        .iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                Ok((key.to_string(), value.to_string()))
            }
            _ => Err(Error::bad_parameter(format!(
                "invalid label {entry:?}; expected key=value"
            ))),
        })
        .collect()
}

fn print_decision(decision: &warden_decision::Decision, json: bool) -> Result<()> {
    if json {
        println!("{}", DecisionReporter::to_json(decision)?);
    } else {
        print!("{}", DecisionReporter::render_text(decision));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn labels_parse_as_key_value() {
        let labels = parse_labels(&["env=prod".into(), "team=db".into()]).unwrap();
        assert_eq!(labels["env"], "prod");
        assert_eq!(labels["team"], "db");

        assert_matches!(
            parse_labels(&["oops".into()]),
            Err(Error::BadParameter { .. })
        );
        assert_matches!(
            parse_labels(&["=value".into()]),
            Err(Error::BadParameter { .. })
        );
    }
}
