// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for all controllers.
//!
//! Every controller receives an `Arc<Context>` holding:
//! - the [`Manager`], which owns the platform-client registry, the monitor
//!   pool, the strategy orchestrator and the object store
//! - the reconciler configuration loaded at startup
//! - the event publisher used to surface conditions on objects
//!
//! The context also carries the single process-wide flag serialising
//! notifications of the active controller host by the PlatformNetwork and
//! AddressPool reconcilers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use tracing::{debug, info};

use crate::config::ReconcilerConfig;
use crate::events::{actions, note, reasons, EventPublisher};
use crate::manager::Manager;
use crate::store::ObjectStore;

/// Shared context passed to all controllers.
pub struct Context {
    /// Process-wide coordinator
    pub manager: Arc<Manager>,

    /// Reconciler enable flags and options
    pub config: ReconcilerConfig,

    /// Kubernetes Event sink
    pub events: Arc<dyn EventPublisher>,

    notifying_active_host: AtomicBool,
}

/// Held while the active controller host is being notified.
///
/// Dropping the guard lets the next reconciler notify.
pub struct ActiveHostNotify<'a> {
    flag: &'a AtomicBool,
}

impl Drop for ActiveHostNotify<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

fn action_for(reason: &str) -> &'static str {
    match reason {
        reasons::DELETED => actions::DELETE,
        reasons::NOTIFIED => actions::NOTIFY,
        _ => actions::RECONCILE,
    }
}

impl Context {
    /// Creates a context.
    #[must_use]
    pub fn new(
        manager: Arc<Manager>,
        config: ReconcilerConfig,
        events: Arc<dyn EventPublisher>,
    ) -> Arc<Self> {
        Arc::new(Self {
            manager,
            config,
            events,
            notifying_active_host: AtomicBool::new(false),
        })
    }

    /// The Kubernetes object store.
    #[must_use]
    pub fn store(&self) -> &dyn ObjectStore {
        self.manager.store()
    }

    /// Claims the right to notify the active controller host.
    ///
    /// Returns `None` while another reconciler holds it.
    #[must_use]
    pub fn begin_active_host_notify(&self) -> Option<ActiveHostNotify<'_>> {
        self.notifying_active_host
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ActiveHostNotify {
                flag: &self.notifying_active_host,
            })
    }

    /// Logs and publishes a Normal event on `object`.
    pub async fn normal_event<K>(&self, object: &K, reason: &str, message: impl std::fmt::Display)
    where
        K: Resource<DynamicType = ()>,
    {
        let name = object.name_any();
        info!(kind = %K::kind(&()), name = %name, reason, "{message}");
        self.events
            .publish(
                &object.object_ref(&()),
                EventType::Normal,
                reason,
                action_for(reason),
                note(&name, message),
            )
            .await;
    }

    /// Logs and publishes a Warning event on `object`.
    ///
    /// Warnings accompany a reconcile error, which carries its own log line.
    pub async fn warning_event<K>(&self, object: &K, reason: &str, message: impl std::fmt::Display)
    where
        K: Resource<DynamicType = ()>,
    {
        let name = object.name_any();
        debug!(kind = %K::kind(&()), name = %name, reason, "{message}");
        self.events
            .publish(
                &object.object_ref(&()),
                EventType::Warning,
                reason,
                action_for(reason),
                note(&name, message),
            )
            .await;
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
