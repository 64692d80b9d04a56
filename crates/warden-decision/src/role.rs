//! Role definitions and label matching.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::Duration;

/// Label matchers applied to a resource's labels.
///
/// Every matcher entry must be satisfied for the matcher set to match.
/// A `"*"` key matches any label; a `"*"` value matches any value of the
/// named key. An empty matcher set matches nothing: roles grant access
/// only to what they name, and `{"*": "*"}` is the explicit way to name
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelMatchers(pub BTreeMap<String, String>);

impl LabelMatchers {
    /// Matcher set that matches every resource.
    pub fn wildcard() -> Self {
        let mut matchers = BTreeMap::new();
        matchers.insert("*".to_string(), "*".to_string());
        Self(matchers)
    }

    /// Whether `labels` satisfies every matcher entry.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        if self.0.is_empty() {
            return false;
        }
        self.0.iter().all(|(key, value)| {
            if key == "*" {
                return value == "*" || labels.values().any(|v| v == value);
            }
            match labels.get(key) {
                Some(v) => value == "*" || v == value,
                None => false,
            }
        })
    }
}

impl<const N: usize> From<[(&str, &str); N]> for LabelMatchers {
    fn from(entries: [(&str, &str); N]) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

/// Connection and session constraints attached to a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleOptions {
    /// Maximum session lifetime this role is willing to grant.
    pub max_session_ttl: Duration,
    /// Whether this role allows agent forwarding.
    pub forward_agent: bool,
    /// Whether this role allows port forwarding.
    pub port_forwarding: bool,
    /// Idle timeout this role imposes, when set.
    pub client_idle_timeout: Option<Duration>,
    /// Whether this role demands disconnection on certificate expiry.
    pub disconnect_expired_cert: bool,
    /// Whether this role requires the acting identity to be bound to a
    /// trusted (enrolled, unlocked) device.
    pub require_trusted_device: bool,
}

impl Default for RoleOptions {
    fn default() -> Self {
        Self {
            max_session_ttl: Duration::hours(8),
            forward_agent: false,
            port_forwarding: false,
            client_idle_timeout: None,
            disconnect_expired_cert: false,
            require_trusted_device: false,
        }
    }
}

/// An access role: what it grants and under which constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Role name, unique within the rule store.
    pub name: String,
    /// OS logins this role grants on matching nodes, in grant order.
    pub logins: Vec<String>,
    /// Node label matchers; the role grants node access only where
    /// these match.
    pub node_labels: LabelMatchers,
    /// Database label matchers.
    pub db_labels: LabelMatchers,
    /// Database names this role grants; `"*"` grants all.
    pub db_names: Vec<String>,
    /// Session constraints.
    pub options: RoleOptions,
}

impl Role {
    /// Whether this role grants access to a node with `labels`.
    pub fn matches_node(&self, labels: &BTreeMap<String, String>) -> bool {
        self.node_labels.matches(labels)
    }

    /// Whether this role grants access to database `name` with `labels`.
    pub fn matches_database(&self, name: &str, labels: &BTreeMap<String, String>) -> bool {
        self.db_labels.matches(labels)
            && self.db_names.iter().any(|n| n == "*" || n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels<const N: usize>(entries: [(&str, &str); N]) -> BTreeMap<String, String> {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn wildcard_matches_everything() {
        let matchers = LabelMatchers::wildcard();
        assert!(matchers.matches(&labels([("env", "prod")])));
        assert!(matchers.matches(&BTreeMap::new()));
    }

    #[test]
    fn empty_matchers_match_nothing() {
        let matchers = LabelMatchers::default();
        assert!(!matchers.matches(&labels([("env", "prod")])));
        assert!(!matchers.matches(&BTreeMap::new()));
    }

    #[test]
    fn exact_key_with_wildcard_value() {
        let matchers = LabelMatchers::from([("env", "*")]);
        assert!(matchers.matches(&labels([("env", "prod")])));
        assert!(matchers.matches(&labels([("env", "staging"), ("team", "db")])));
        assert!(!matchers.matches(&labels([("team", "db")])));
    }

    #[test]
    fn all_entries_must_match() {
        let matchers = LabelMatchers::from([("env", "prod"), ("team", "db")]);
        assert!(matchers.matches(&labels([("env", "prod"), ("team", "db")])));
        assert!(!matchers.matches(&labels([("env", "prod")])));
        assert!(!matchers.matches(&labels([("env", "prod"), ("team", "web")])));
    }

    #[test]
    fn database_grant_requires_name_and_labels() {
        let role = Role {
            name: "db-reader".into(),
            logins: vec![],
            node_labels: LabelMatchers::default(),
            db_labels: LabelMatchers::wildcard(),
            db_names: vec!["orders".into()],
            options: RoleOptions::default(),
        };
        assert!(role.matches_database("orders", &BTreeMap::new()));
        assert!(!role.matches_database("billing", &BTreeMap::new()));

        let any = Role {
            db_names: vec!["*".into()],
            ..role
        };
        assert!(any.matches_database("billing", &BTreeMap::new()));
    }
}
