// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Process-wide coordination shared by every reconciler.
//!
//! The [`Manager`] owns the only mutable state that crosses reconciler
//! boundaries:
//!
//! - the platform-client registry, one entry per namespace holding the
//!   authenticated sysinv client, the "system ready" flag and the system type
//! - the monitor map, keyed by object UID
//! - the strategy status consumed by the update-strategy orchestrator
//!
//! The registry and the monitor map share one mutex; the strategy status has
//! its own. Neither lock is ever held across an `.await`: platform and
//! Kubernetes calls are issued after the guard is dropped.
//!
//! The manager is also the notification bus. Bumping the
//! `deployment-manager/notifications` annotation on an object makes the watch
//! cache redeliver it, which is how the System reconciler wakes its dependents
//! and how monitors hand control back to a reconciler.

pub mod factory;
pub mod monitor;
pub mod monitors;
mod notify;
mod registry;
pub mod strategy;

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::platform::{PlatformClient, PlatformConnector};
use crate::store::ObjectStore;

pub use monitor::{Monitor, MonitorBody, MonitorHandle, MonitorTarget};
pub use notify::next_count;
pub use strategy::{ResourceInfo, StrategyStatus};

/// System type reported for single-server deployments.
pub const SYSTEM_TYPE_ALL_IN_ONE: &str = "all-in-one";

/// System type reported for multi-server deployments.
pub const SYSTEM_TYPE_STANDARD: &str = "standard";

/// System mode of a single-controller deployment.
pub const SYSTEM_MODE_SIMPLEX: &str = "simplex";

/// Per-namespace registry entry.
#[derive(Default)]
struct SystemNamespace {
    client: Option<Arc<dyn PlatformClient>>,
    ready: bool,
    system_type: String,
}

#[derive(Default)]
struct Registry {
    systems: HashMap<String, SystemNamespace>,
    monitors: HashMap<String, MonitorHandle>,
}

/// Shared coordinator for reconcilers, monitors and the strategy orchestrator.
pub struct Manager {
    store: Arc<dyn ObjectStore>,
    connector: Arc<dyn PlatformConnector>,
    registry: Mutex<Registry>,
    strategy: Mutex<StrategyStatus>,
    vim_client: Mutex<Option<Arc<dyn PlatformClient>>>,
    monitor_ids: AtomicU64,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Manager {
    /// Creates a manager with an empty registry.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, connector: Arc<dyn PlatformConnector>) -> Arc<Self> {
        Arc::new(Self {
            store,
            connector,
            registry: Mutex::new(Registry::default()),
            strategy: Mutex::new(StrategyStatus::default()),
            vim_client: Mutex::new(None),
            monitor_ids: AtomicU64::new(0),
        })
    }

    /// The Kubernetes object store.
    #[must_use]
    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        guard(&self.registry)
    }

    fn strategy(&self) -> MutexGuard<'_, StrategyStatus> {
        guard(&self.strategy)
    }
}
