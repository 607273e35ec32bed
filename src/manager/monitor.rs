// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Background polling tasks that re-trigger a reconcile.
//!
//! A reconciler that must wait for the platform (a host to unlock, a
//! filesystem resize to finish, a secret to appear) starts a [`Monitor`] and
//! returns [`ReconcileError::WaitForMonitor`]. The monitor polls its
//! [`MonitorBody`] on a fixed interval, starting immediately. When the body
//! reports completion, or fails, the monitored object is notified so that its
//! reconciler runs again. A failed notification keeps the monitor running,
//! since it is the only thing left that will wake the reconciler.
//!
//! Monitors are keyed by the UID of the monitored object. Starting a monitor
//! for an object that already has one stops the previous monitor.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kube::{Resource, ResourceExt};
use tokio::sync::watch;
use tracing::{debug, error, info};

use super::Manager;
use crate::errors::ReconcileError;
use crate::metrics;
use crate::platform::PlatformClient;
use crate::store::ResourceKind;

/// A condition polled by a monitor.
#[async_trait]
pub trait MonitorBody: Send + Sync {
    /// Short name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Polls the condition once.
    ///
    /// Returns `Ok(true)` when the condition is satisfied.
    ///
    /// # Errors
    ///
    /// Returns an error when the condition could not be evaluated.
    async fn run(
        &mut self,
        manager: &Manager,
        client: &dyn PlatformClient,
    ) -> Result<bool, ReconcileError>;

    /// Human-readable description of the last poll.
    fn state(&self) -> &str;
}

/// The object a monitor notifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorTarget {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
    pub uid: String,
}

impl MonitorTarget {
    /// Target for a typed object.
    #[must_use]
    pub fn for_object<K: Resource>(kind: ResourceKind, object: &K) -> Self {
        Self {
            kind,
            namespace: object.namespace().unwrap_or_default(),
            name: object.name_any(),
            uid: object.uid().unwrap_or_default(),
        }
    }

    /// Monitor map key.
    #[must_use]
    pub fn key(&self) -> String {
        if self.uid.is_empty() {
            "unknown".to_string()
        } else {
            self.uid.clone()
        }
    }
}

/// A monitor body bound to its target and polling interval.
pub struct Monitor {
    pub body: Box<dyn MonitorBody>,
    pub interval: Duration,
    pub target: MonitorTarget,
}

impl Monitor {
    #[must_use]
    pub fn new(
        body: impl MonitorBody + 'static,
        interval: Duration,
        target: MonitorTarget,
    ) -> Self {
        Self {
            body: Box::new(body),
            interval,
            target,
        }
    }
}

/// Handle on a running monitor.
pub struct MonitorHandle {
    id: u64,
    name: &'static str,
    stop: watch::Sender<bool>,
}

impl MonitorHandle {
    /// Signals the monitor to exit. Stopping twice is harmless.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Manager {
    /// Starts a monitor and returns the error the reconciler should report
    /// while it waits.
    ///
    /// # Arguments
    ///
    /// * `monitor` - The monitor to run
    /// * `message` - Why the reconciler is waiting
    pub fn start_monitor(
        self: &Arc<Self>,
        monitor: Monitor,
        message: impl Into<String>,
    ) -> ReconcileError {
        let key = monitor.target.key();
        let name = monitor.body.name();
        let id = self.monitor_ids.fetch_add(1, Ordering::Relaxed);
        let (stop, stopped) = watch::channel(false);

        let previous = self
            .registry()
            .monitors
            .insert(key.clone(), MonitorHandle { id, name, stop });
        if let Some(previous) = previous {
            info!(
                key = %key,
                previous = previous.name(),
                monitor = name,
                "Superseding running monitor"
            );
            previous.stop();
        }

        debug!(key = %key, monitor = name, target = %monitor.target.name, "Starting monitor");
        tokio::spawn(run_monitor(Arc::clone(self), monitor, id, stopped));

        ReconcileError::WaitForMonitor(message.into())
    }

    /// Stops the monitor watching the object with the given UID, if any.
    pub fn cancel_monitor(&self, uid: &str) {
        if let Some(handle) = self.registry().monitors.remove(uid) {
            debug!(key = uid, monitor = handle.name(), "Cancelling monitor");
            handle.stop();
        }
    }

    /// Returns true while a monitor is registered for the object with the given UID.
    #[must_use]
    pub fn has_monitor(&self, uid: &str) -> bool {
        self.registry().monitors.contains_key(uid)
    }

    async fn notify_monitored(&self, target: &MonitorTarget) -> bool {
        match self
            .notify_resource(target.kind, &target.namespace, &target.name)
            .await
        {
            Ok(()) => true,
            Err(e) if e.is_not_found() => {
                info!(
                    kind = %target.kind,
                    namespace = %target.namespace,
                    name = %target.name,
                    "Monitored resource no longer exists; stopping"
                );
                true
            }
            Err(e) => {
                error!(
                    kind = %target.kind,
                    namespace = %target.namespace,
                    name = %target.name,
                    error = %e,
                    "Failed to notify controller"
                );
                false
            }
        }
    }

    fn forget_monitor(&self, key: &str, id: u64) {
        let mut registry = self.registry();
        if registry.monitors.get(key).is_some_and(|h| h.id == id) {
            registry.monitors.remove(key);
        }
    }
}

async fn run_monitor(
    manager: Arc<Manager>,
    mut monitor: Monitor,
    id: u64,
    mut stopped: watch::Receiver<bool>,
) {
    let key = monitor.target.key();
    let name = monitor.body.name();
    metrics::record_monitor_started(name);

    let mut interval = Duration::ZERO;
    loop {
        tokio::select! {
            biased;
            _ = stopped.changed() => {
                debug!(key = %key, monitor = name, "Monitor terminated");
                break;
            }
            () = tokio::time::sleep(interval) => {}
        }
        interval = monitor.interval;

        let Some(client) = manager.get_platform_client(&monitor.target.namespace) else {
            debug!(key = %key, monitor = name, "Platform client not available");
            continue;
        };

        let result = monitor.body.run(&manager, client.as_ref()).await;
        debug!(key = %key, monitor = name, state = monitor.body.state());

        let done = match result {
            Ok(true) => {
                debug!(key = %key, monitor = name, "Monitor completed");
                true
            }
            Ok(false) => false,
            Err(e) => {
                debug!(key = %key, monitor = name, error = %e, "Monitor poll failed");
                true
            }
        };

        if done && manager.notify_monitored(&monitor.target).await {
            debug!(key = %key, monitor = name, "Monitor exiting");
            manager.forget_monitor(&key, id);
            break;
        }
    }

    metrics::record_monitor_stopped(name);
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod monitor_tests;
