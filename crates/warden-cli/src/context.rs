//! Shared command context.
//!
//! Built once at startup from the loaded configuration and handed to
//! every command handler: the store selection, the registries, and the
//! evaluator are all wired here, with capabilities injected explicitly.

use std::collections::BTreeMap;
use std::sync::Arc;
use warden_core::{Clock, ClusterName, Features, SystemClock};
use warden_decision::{LocalEvaluator, NoopAuditSink, StaticRoleProvider};
use warden_devices::{DeviceRegistry, LockRegistry};
use warden_store::{FilesystemStore, KeyValueStore, MemoryStore};

use crate::config::Config;

/// Everything a command handler needs.
pub struct AppContext {
    /// Cluster this process serves.
    pub cluster: ClusterName,
    /// Edition capabilities.
    pub features: Features,
    /// Device registry over the configured store.
    pub devices: DeviceRegistry,
    /// Lock registry over the same store.
    pub locks: LockRegistry,
    /// The production evaluator.
    pub evaluator: LocalEvaluator,
    /// Username to role-name assignments from config.
    pub users: BTreeMap<String, Vec<String>>,
    /// Time source shared with the registries.
    pub clock: Arc<dyn Clock>,
}

impl AppContext {
    /// Wire up the context from configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store: Arc<dyn KeyValueStore> = match &config.data_dir {
            Some(dir) => Arc::new(FilesystemStore::new(dir)),
            None => Arc::new(MemoryStore::new()),
        };
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let features = config.features.to_features();
        let cluster = ClusterName::from(config.cluster_name.clone());

        let devices = DeviceRegistry::new(store.clone(), clock.clone(), features.clone());
        let locks = LockRegistry::new(store, clock.clone());

        let roles = config
            .roles
            .iter()
            .map(|r| r.to_role())
            .collect::<anyhow::Result<Vec<_>>>()?;
        let evaluator = LocalEvaluator::new(
            cluster.clone(),
            Arc::new(StaticRoleProvider::new(roles)),
            devices.clone(),
            locks.clone(),
            Arc::new(NoopAuditSink),
        );

        Ok(Self {
            cluster,
            features,
            devices,
            locks,
            evaluator,
            users: config.users.clone(),
            clock,
        })
    }
}
