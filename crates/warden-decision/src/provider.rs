//! The rule-store seam.

use async_trait::async_trait;
use std::collections::BTreeMap;
use warden_core::{Error, Result};

use crate::role::Role;

/// Resolves role names to role definitions.
///
/// The rule set is read-mostly: a provider may serve a cached snapshot,
/// and evaluation tolerates a stale-but-internally-consistent one. A
/// provider that cannot reach its backing store fails `Unavailable`,
/// which callers treat as retryable.
#[async_trait]
pub trait RoleProvider: Send + Sync {
    /// Resolve each named role. Fails `NotFound` when a name is unknown.
    async fn roles_named(&self, names: &[String]) -> Result<Vec<Role>>;
}

/// Config-backed role provider holding a fixed role set in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticRoleProvider {
    roles: BTreeMap<String, Role>,
}

impl StaticRoleProvider {
    /// Build a provider from a set of role definitions.
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: roles.into_iter().map(|r| (r.name.clone(), r)).collect(),
        }
    }
}

#[async_trait]
impl RoleProvider for StaticRoleProvider {
    async fn roles_named(&self, names: &[String]) -> Result<Vec<Role>> {
        names
            .iter()
            .map(|name| {
                self.roles
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::not_found(format!("role {name:?} not found")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::{LabelMatchers, RoleOptions};
    use assert_matches::assert_matches;

    fn role(name: &str) -> Role {
        Role {
            name: name.into(),
            logins: vec![],
            node_labels: LabelMatchers::default(),
            db_labels: LabelMatchers::default(),
            db_names: vec![],
            options: RoleOptions::default(),
        }
    }

    #[tokio::test]
    async fn resolves_in_request_order() {
        let provider = StaticRoleProvider::new([role("admin"), role("dev")]);
        let roles = provider
            .roles_named(&["dev".into(), "admin".into()])
            .await
            .unwrap();
        assert_eq!(roles[0].name, "dev");
        assert_eq!(roles[1].name, "admin");
    }

    #[tokio::test]
    async fn unknown_role_is_not_found() {
        let provider = StaticRoleProvider::new([role("admin")]);
        let err = provider.roles_named(&["ghost".into()]).await.unwrap_err();
        assert_matches!(err, Error::NotFound { message } if message.contains("ghost"));
    }
}
