// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory test doubles for the operator's seams.
//!
//! - [`FakeObjectStore`] stands in for the Kubernetes API server
//! - [`FakePlatform`] stands in for a sysinv or VIM endpoint
//! - [`FakeConnector`] hands out `FakePlatform` clients
//! - [`RecordingEventPublisher`] keeps every published event

mod events;
mod platform;
mod store;

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::config::ReconcilerConfig;
use crate::constants::{SYSTEM_ENDPOINT_NAME, SYSTEM_ENDPOINT_SECRET, SYSTEM_ENDPOINT_TYPE};
use crate::context::Context;
use crate::manager::Manager;
use crate::platform::nfv;
use crate::store::ResourceKind;

pub use events::{RecordedEvent, RecordingEventPublisher};
pub use platform::{Call, FakeConnector, FakePlatform};
pub use store::{merge_patch, FakeObjectStore};

/// Namespace used by most tests.
pub const NAMESPACE: &str = "deployment";

/// Places `object` in the test namespace.
pub fn in_namespace<K: Resource>(mut object: K) -> K {
    object.meta_mut().namespace = Some(NAMESPACE.to_string());
    object
}

/// A `system-endpoint` secret pointing at `auth_url`.
pub fn endpoint_secret(namespace: &str, auth_url: &str) -> Secret {
    let string_data: BTreeMap<String, String> = [
        ("OS_AUTH_URL", auth_url),
        ("OS_USERNAME", "admin"),
        ("OS_PASSWORD", "secret"),
        ("OS_PROJECT_NAME", "admin"),
        ("OS_REGION_NAME", "RegionOne"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    Secret {
        metadata: ObjectMeta {
            name: Some(SYSTEM_ENDPOINT_SECRET.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        string_data: Some(string_data),
        ..Default::default()
    }
}

/// A manager wired to in-memory fakes.
///
/// The namespace holds a valid endpoint secret and the sysinv fake reports
/// one all-in-one simplex system, so `connect` succeeds.
pub struct TestEnv {
    pub store: Arc<FakeObjectStore>,
    pub connector: Arc<FakeConnector>,
    pub sysinv: Arc<FakePlatform>,
    pub vim: Arc<FakePlatform>,
    pub events: Arc<RecordingEventPublisher>,
    pub manager: Arc<Manager>,
}

impl TestEnv {
    pub fn new() -> Self {
        init_tracing();
        let store = Arc::new(FakeObjectStore::new());
        store.insert(
            ResourceKind::Secret,
            &endpoint_secret(NAMESPACE, "http://keystone:5000/v3"),
        );

        let sysinv = FakePlatform::new("http://sysinv:6385/v1");
        sysinv.seed(
            "isystems",
            json!({
                "uuid": "system-uuid",
                "name": "default",
                "system_type": "All-in-one",
                "system_mode": "simplex",
                "software_version": "24.09",
                "capabilities": {"https_enabled": false, "vswitch_type": "none"}
            }),
        );
        let vim = FakePlatform::new("http://vim:4545");
        vim.on("GET", nfv::STRATEGY_PATH, Ok(json!({ "strategy": null })));

        let connector = FakeConnector::new();
        connector.register(SYSTEM_ENDPOINT_TYPE, sysinv.clone());
        connector.register("nfv", vim.clone());

        let manager = Manager::new(store.clone(), connector.clone());
        Self {
            store,
            connector,
            sysinv,
            vim,
            events: Arc::new(RecordingEventPublisher::default()),
            manager,
        }
    }

    /// Builds and registers the namespace's sysinv client.
    pub async fn connect(&self) {
        self.manager
            .build_platform_client(NAMESPACE, SYSTEM_ENDPOINT_NAME, SYSTEM_ENDPOINT_TYPE)
            .await
            .unwrap();
    }

    /// Stores `object` and returns it as the API server would.
    pub fn insert<K: Serialize + DeserializeOwned>(&self, kind: ResourceKind, object: &K) -> K {
        serde_json::from_value(self.store.insert(kind, object)).unwrap()
    }

    /// Reads back a stored object.
    pub fn get<K: DeserializeOwned>(&self, kind: ResourceKind, name: &str) -> K {
        self.store.typed(kind, NAMESPACE, name)
    }

    /// Connects and marks the namespace's System as ready.
    pub async fn ready(&self) {
        self.connect().await;
        self.manager.set_system_ready(NAMESPACE, true);
    }

    /// A controller context with the default reconciler configuration.
    pub fn context(&self) -> Arc<Context> {
        self.context_with(ReconcilerConfig::default())
    }

    /// A controller context with the given reconciler configuration.
    pub fn context_with(&self, config: ReconcilerConfig) -> Arc<Context> {
        Context::new(self.manager.clone(), config, self.events.clone())
    }
}

/// Installs a test subscriber so `tracing` output shows up in failing tests.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
