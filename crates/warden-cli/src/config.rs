//! CLI configuration.
//!
//! Loaded from a TOML file (`warden.toml` by default). A missing file
//! yields the defaults: in-memory state, device trust enabled, no roles
//! or users defined.

use anyhow::Context as _;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use warden_core::Features;
use warden_decision::{LabelMatchers, Role, RoleOptions};

use crate::durations::parse_duration;

/// Top-level configuration file contents.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Cluster this process serves. Decisions are scoped to it.
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,

    /// Directory for persisted device and lock records. Absent means
    /// in-memory state that does not survive the process.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Edition capabilities.
    #[serde(default)]
    pub features: FeaturesConfig,

    /// Role definitions forming the static rule store.
    #[serde(default)]
    pub roles: Vec<RoleConfig>,

    /// Username to role-name assignments.
    #[serde(default)]
    pub users: BTreeMap<String, Vec<String>>,
}

fn default_cluster_name() -> String {
    "warden".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cluster_name: default_cluster_name(),
            data_dir: None,
            features: FeaturesConfig::default(),
            roles: Vec::new(),
            users: BTreeMap::new(),
        }
    }
}

/// `[features]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeaturesConfig {
    /// Whether device trust is licensed for this edition.
    #[serde(default = "default_true")]
    pub device_trust: bool,
    /// Enrolled-device ceiling, when the edition imposes one.
    #[serde(default)]
    pub max_enrolled_devices: Option<usize>,
}

fn default_true() -> bool {
    true
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            device_trust: true,
            max_enrolled_devices: None,
        }
    }
}

impl FeaturesConfig {
    /// Convert to the injected capability object.
    pub fn to_features(&self) -> Features {
        Features {
            device_trust: self.device_trust,
            max_enrolled_devices: self.max_enrolled_devices,
        }
    }
}

/// One `[[roles]]` entry. Durations are flag-style strings (`"30m"`,
/// `"8h"`).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleConfig {
    /// Role name.
    pub name: String,
    /// OS logins granted on matching nodes.
    #[serde(default)]
    pub logins: Vec<String>,
    /// Node label matchers; `"*" = "*"` matches every node.
    #[serde(default)]
    pub node_labels: BTreeMap<String, String>,
    /// Database label matchers.
    #[serde(default)]
    pub db_labels: BTreeMap<String, String>,
    /// Database names granted; `"*"` grants all.
    #[serde(default)]
    pub db_names: Vec<String>,
    /// Maximum session lifetime.
    #[serde(default = "default_session_ttl")]
    pub max_session_ttl: String,
    /// Allow agent forwarding.
    #[serde(default)]
    pub forward_agent: bool,
    /// Allow port forwarding.
    #[serde(default)]
    pub port_forwarding: bool,
    /// Idle timeout, when set.
    #[serde(default)]
    pub client_idle_timeout: Option<String>,
    /// Disconnect sessions on certificate expiry.
    #[serde(default)]
    pub disconnect_expired_cert: bool,
    /// Require an enrolled, unlocked device binding.
    #[serde(default)]
    pub require_trusted_device: bool,
}

fn default_session_ttl() -> String {
    "8h".to_string()
}

impl RoleConfig {
    /// Convert to the domain role, parsing duration strings.
    pub fn to_role(&self) -> anyhow::Result<Role> {
        let max_session_ttl = parse_duration(&self.max_session_ttl)
            .with_context(|| format!("role {:?}: max_session_ttl", self.name))?;
        let client_idle_timeout = self
            .client_idle_timeout
            .as_deref()
            .map(parse_duration)
            .transpose()
            .with_context(|| format!("role {:?}: client_idle_timeout", self.name))?;

        Ok(Role {
            name: self.name.clone(),
            logins: self.logins.clone(),
            node_labels: LabelMatchers(self.node_labels.clone()),
            db_labels: LabelMatchers(self.db_labels.clone()),
            db_names: self.db_names.clone(),
            options: RoleOptions {
                max_session_ttl,
                forward_agent: self.forward_agent,
                port_forwarding: self.port_forwarding,
                client_idle_timeout,
                disconnect_expired_cert: self.disconnect_expired_cert,
                require_trusted_device: self.require_trusted_device,
            },
        })
    }
}

impl Config {
    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("parse config {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.cluster_name, "warden");
        assert!(config.data_dir.is_none());
        assert!(config.features.device_trust);
        assert!(config.roles.is_empty());
    }

    #[test]
    fn full_config_parses() {
        let toml = r#"
            cluster_name = "main"
            data_dir = "/var/lib/warden"

            [features]
            device_trust = true
            max_enrolled_devices = 10

            [[roles]]
            name = "dev"
            logins = ["ubuntu"]
            node_labels = { "env" = "staging" }
            max_session_ttl = "2h"
            client_idle_timeout = "15m"
            require_trusted_device = true

            [users]
            alice = ["dev"]
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.cluster_name, "main");
        assert_eq!(config.features.max_enrolled_devices, Some(10));
        assert_eq!(config.users["alice"], ["dev"]);

        let role = config.roles[0].to_role().unwrap();
        assert_eq!(role.options.max_session_ttl, Duration::hours(2));
        assert_eq!(role.options.client_idle_timeout, Some(Duration::minutes(15)));
        assert!(role.options.require_trusted_device);
    }

    #[test]
    fn bad_duration_in_role_fails() {
        let config = RoleConfig {
            name: "dev".into(),
            logins: vec![],
            node_labels: BTreeMap::new(),
            db_labels: BTreeMap::new(),
            db_names: vec![],
            max_session_ttl: "forever".into(),
            forward_agent: false,
            port_forwarding: false,
            client_idle_timeout: None,
            disconnect_expired_cert: false,
            require_trusted_device: false,
        };
        assert!(config.to_role().is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(toml::from_str::<Config>("clustername = \"typo\"").is_err());
    }
}
