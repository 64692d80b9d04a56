//! End-to-end access evaluation over a live registry: device lifecycle,
//! locks, and the evaluator facade working together.

use std::collections::BTreeMap;
use std::sync::Arc;
use time::macros::datetime;
use time::Duration;
use warden_core::{Clock, ClusterName, Features, ManualClock};
use warden_decision::{
    Decision, DecisionEvaluator, DecisionRequest, Identity, LabelMatchers, LocalEvaluator,
    NoopAuditSink, Resource, Role, RoleOptions, StaticRoleProvider,
};
use warden_devices::{
    CollectedDeviceData, CreateDeviceSpec, CreateLockSpec, DeviceCredential, DeviceRegistry,
    EnrollDeviceRequest, LockRegistry, OsType,
};
use warden_store::MemoryStore;

struct Env {
    devices: DeviceRegistry,
    locks: LockRegistry,
    evaluator: LocalEvaluator,
    clock: ManualClock,
}

fn env() -> Env {
    let store = Arc::new(MemoryStore::new());
    let clock = ManualClock::new(datetime!(2025-06-01 12:00 UTC));
    let devices = DeviceRegistry::new(store.clone(), Arc::new(clock.clone()), Features::all());
    let locks = LockRegistry::new(store, Arc::new(clock.clone()));

    let trusted = Role {
        name: "trusted-dev".into(),
        logins: vec!["ubuntu".into()],
        node_labels: LabelMatchers::wildcard(),
        db_labels: LabelMatchers::default(),
        db_names: vec![],
        options: RoleOptions {
            max_session_ttl: Duration::hours(2),
            require_trusted_device: true,
            ..RoleOptions::default()
        },
    };
    let open = Role {
        name: "open-dev".into(),
        logins: vec!["ubuntu".into()],
        node_labels: LabelMatchers::wildcard(),
        db_labels: LabelMatchers::default(),
        db_names: vec![],
        options: RoleOptions::default(),
    };

    let evaluator = LocalEvaluator::new(
        ClusterName::from("main"),
        Arc::new(StaticRoleProvider::new([trusted, open])),
        devices.clone(),
        locks.clone(),
        Arc::new(NoopAuditSink),
    );
    Env {
        devices,
        locks,
        evaluator,
        clock,
    }
}

fn node_request(roles: &[&str], device_id: Option<warden_core::DeviceId>) -> DecisionRequest {
    DecisionRequest {
        cluster: ClusterName::from("main"),
        identity: Identity {
            username: "alice".into(),
            roles: roles.iter().map(|s| s.to_string()).collect(),
            os_login: None,
            device_id,
        },
        resource: Resource::Node {
            name: "web-1".into(),
            labels: BTreeMap::new(),
        },
        dry_run: false,
    }
}

async fn enroll(env: &Env) -> warden_devices::Device {
    let device = env
        .devices
        .create_device(CreateDeviceSpec {
            os_type: OsType::Macos,
            asset_tag: "SN123".into(),
            create_enroll_token: false,
            enroll_token_ttl: None,
        })
        .await
        .unwrap();
    let token = env
        .devices
        .create_enroll_token(device.id, Some(Duration::minutes(10)))
        .await
        .unwrap();
    env.devices
        .enroll_device(EnrollDeviceRequest {
            device_id: Some(device.id),
            token: token.token,
            collected: CollectedDeviceData {
                os_type: OsType::Macos,
                serial_number: "SN123".into(),
                collect_time: env.clock.now(),
            },
            credential: DeviceCredential {
                id: "cred-1".into(),
                public_key: b"pk".to_vec(),
            },
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn no_binding_required_permits_with_role_login() {
    let env = env();
    let decision = env
        .evaluator
        .evaluate_ssh_access(&node_request(&["open-dev"], None))
        .await
        .unwrap();
    match decision {
        Decision::Permit(p) => assert_eq!(p.logins, ["ubuntu"]),
        Decision::Denial(d) => panic!("unexpected denial: {}", d.message),
    }
}

#[tokio::test]
async fn trusted_role_without_binding_denies() {
    let env = env();
    let decision = env
        .evaluator
        .evaluate_ssh_access(&node_request(&["trusted-dev"], None))
        .await
        .unwrap();
    match decision {
        Decision::Denial(d) => assert_eq!(d.message, "device trust required"),
        Decision::Permit(_) => panic!("expected denial"),
    }
}

#[tokio::test]
async fn enrolled_device_satisfies_trust_until_locked() {
    let env = env();
    let device = enroll(&env).await;
    let request = node_request(&["trusted-dev"], Some(device.id));

    let decision = env.evaluator.evaluate_ssh_access(&request).await.unwrap();
    assert!(decision.is_permit());

    let lock = env
        .locks
        .create_lock(CreateLockSpec {
            target: device.id,
            message: "reported stolen".into(),
            expires: Some(env.clock.now() + Duration::hours(1)),
        })
        .await
        .unwrap();

    let decision = env.evaluator.evaluate_ssh_access(&request).await.unwrap();
    match decision {
        Decision::Denial(d) => assert_eq!(d.message, "device is locked: reported stolen"),
        Decision::Permit(_) => panic!("lock must block access"),
    }

    // Lock expiry releases the device without touching its record.
    env.clock.advance(Duration::hours(2));
    let decision = env.evaluator.evaluate_ssh_access(&request).await.unwrap();
    assert!(decision.is_permit());

    env.locks.delete_lock(lock.name).await.unwrap();
}

#[tokio::test]
async fn unenrolled_binding_denies() {
    let env = env();
    let device = env
        .devices
        .create_device(CreateDeviceSpec {
            os_type: OsType::Linux,
            asset_tag: "SN9".into(),
            create_enroll_token: false,
            enroll_token_ttl: None,
        })
        .await
        .unwrap();

    let decision = env
        .evaluator
        .evaluate_ssh_access(&node_request(&["trusted-dev"], Some(device.id)))
        .await
        .unwrap();
    match decision {
        Decision::Denial(d) => assert_eq!(d.message, "device is not enrolled"),
        Decision::Permit(_) => panic!("expected denial"),
    }
}

#[tokio::test]
async fn dry_run_matches_live_decision_exactly() {
    let env = env();
    let device = enroll(&env).await;

    let mut request = node_request(&["trusted-dev", "open-dev"], Some(device.id));
    let live = env.evaluator.evaluate_ssh_access(&request).await.unwrap();

    request.dry_run = true;
    let dry = env.evaluator.evaluate_ssh_access(&request).await.unwrap();

    assert_eq!(
        serde_json::to_vec(&live).unwrap(),
        serde_json::to_vec(&dry).unwrap()
    );
}
