// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes reconciliation controllers for StarlingX resources.
//!
//! Each reconciler watches one custom resource kind and drives the platform
//! inventory API until it matches the resource's spec.
//!
//! # Reconciliation Architecture
//!
//! Every kind runs the same ordered preamble ([`lifecycle::prepare`]):
//!
//! 1. **Load** the resource; a missing resource is done
//! 2. **Restore** shortcut when `restore-in-progress` is set
//! 3. **Scope** resolution from the last applied configuration
//! 4. **Factory install** fixup of `reconciled`
//! 5. **Config status** update (`reconcile-after-insync`, `observedGeneration`)
//! 6. **Finalizer** add, returning so the next pass does the work
//! 7. **Enabled** gate from the reconciler configuration
//!
//! Kinds that talk to the platform then pass the client and system-ready
//! gates ([`lifecycle::require_client`]) before running their body.
//!
//! # Available Reconcilers
//!
//! - [`reconcile_system`] - System attributes, DNS, NTP, PTP, certificates,
//!   licenses, storage; builds the namespace's platform client
//! - [`reconcile_host`] - Host provisioning, attributes and state
//! - [`reconcile_host_profile`] - Re-triggers hosts using a profile
//! - [`reconcile_platform_network`] - Notifies the active controller host
//! - [`reconcile_address_pool`] - Notifies the active controller host
//! - [`reconcile_data_network`] - Data networks
//! - [`reconcile_ptp_instance`] - PTP instances
//! - [`reconcile_ptp_interface`] - PTP interfaces
//!
//! Errors from any reconciler are classified by [`crate::classifier::classify`]
//! in [`run_reconcile`] and turned into a requeue decision by [`error_policy`].

pub mod active_host;
pub mod addresspool;
pub mod datanetwork;
pub mod finalizers;
pub mod host;
pub mod hostprofile;
pub mod lifecycle;
pub mod platformnetwork;
pub mod ptpinstance;
pub mod ptpinterface;
pub mod restore;
pub mod retry;
pub mod scope;
pub mod status;
pub mod system;

use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use kube::core::NamespaceResourceScope;
use kube::runtime::controller::Action;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::classifier::classify;
use crate::config::ReconcilerName;
use crate::constants::{
    ADDRESS_POOL_FINALIZER, DATA_NETWORK_FINALIZER, HOST_FINALIZER, PLATFORM_NETWORK_FINALIZER,
    PTP_INSTANCE_FINALIZER, PTP_INTERFACE_FINALIZER,
};
use crate::context::Context;
use crate::crd::{
    AddressPool, DataNetwork, Host, PlatformNetwork, PtpInstance, PtpInterface, ResourceStatus,
    System,
};
use crate::errors::ReconcileError;
use crate::manager::strategy::{
    RESOURCE_ADDRESS_POOL, RESOURCE_DATA_NETWORK, RESOURCE_HOST, RESOURCE_PLATFORM_NETWORK,
    RESOURCE_PTP_INSTANCE, RESOURCE_PTP_INTERFACE, RESOURCE_SYSTEM,
};
use crate::metrics;
use crate::store::ResourceKind;

pub use addresspool::reconcile_address_pool;
pub use datanetwork::reconcile_data_network;
pub use host::reconcile_host;
pub use hostprofile::reconcile_host_profile;
pub use platformnetwork::reconcile_platform_network;
pub use ptpinstance::reconcile_ptp_instance;
pub use ptpinterface::reconcile_ptp_interface;
pub use system::reconcile_system;

/// A custom resource kind driven through the common reconcile preamble.
pub trait ManagedResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Object store kind
    const KIND: ResourceKind;

    /// Kind-specific finalizer; `None` for kinds without platform-side cleanup
    const FINALIZER: Option<&'static str>;

    /// Reconciler name used for the enabled flag and options
    const RECONCILER: ReconcilerName;

    /// Resource type reported to the strategy orchestrator
    const STRATEGY_TYPE: &'static str;

    /// Whether `observedGeneration` is written by the body, after the active
    /// controller host has been notified, instead of by the preamble
    const DEFERS_OBSERVED_GENERATION: bool = false;

    /// The status fields shared by every kind, if a status exists.
    fn common_status(&self) -> Option<&ResourceStatus>;
}

macro_rules! managed_resource {
    ($ty:ty, $kind:expr, $finalizer:expr, $reconciler:expr, $strategy:expr) => {
        managed_resource!($ty, $kind, $finalizer, $reconciler, $strategy, false);
    };
    ($ty:ty, $kind:expr, $finalizer:expr, $reconciler:expr, $strategy:expr, $defers:expr) => {
        impl ManagedResource for $ty {
            const KIND: ResourceKind = $kind;
            const FINALIZER: Option<&'static str> = $finalizer;
            const RECONCILER: ReconcilerName = $reconciler;
            const STRATEGY_TYPE: &'static str = $strategy;
            const DEFERS_OBSERVED_GENERATION: bool = $defers;

            fn common_status(&self) -> Option<&ResourceStatus> {
                self.status.as_ref().map(|s| &s.common)
            }
        }
    };
}

managed_resource!(
    System,
    ResourceKind::System,
    None,
    ReconcilerName::System,
    RESOURCE_SYSTEM
);
managed_resource!(
    Host,
    ResourceKind::Host,
    Some(HOST_FINALIZER),
    ReconcilerName::Host,
    RESOURCE_HOST
);
managed_resource!(
    PlatformNetwork,
    ResourceKind::PlatformNetwork,
    Some(PLATFORM_NETWORK_FINALIZER),
    ReconcilerName::PlatformNetwork,
    RESOURCE_PLATFORM_NETWORK,
    true
);
managed_resource!(
    AddressPool,
    ResourceKind::AddressPool,
    Some(ADDRESS_POOL_FINALIZER),
    ReconcilerName::AddressPool,
    RESOURCE_ADDRESS_POOL,
    true
);
managed_resource!(
    DataNetwork,
    ResourceKind::DataNetwork,
    Some(DATA_NETWORK_FINALIZER),
    ReconcilerName::DataNetwork,
    RESOURCE_DATA_NETWORK
);
managed_resource!(
    PtpInstance,
    ResourceKind::PtpInstance,
    Some(PTP_INSTANCE_FINALIZER),
    ReconcilerName::PtpInstance,
    RESOURCE_PTP_INSTANCE
);
managed_resource!(
    PtpInterface,
    ResourceKind::PtpInterface,
    Some(PTP_INTERFACE_FINALIZER),
    ReconcilerName::PtpInterface,
    RESOURCE_PTP_INTERFACE
);

/// Runs one reconcile of `instance` and applies the error side effects.
///
/// On failure the error is classified; when the classification asks for it
/// and the namespace has a client, the platform client is reset so that the
/// System reconciler rebuilds it. Metrics are recorded for both outcomes.
///
/// # Arguments
///
/// * `instance` - The object delivered by the controller
/// * `ctx` - Shared controller context
/// * `body` - The kind's reconcile function
///
/// # Errors
///
/// Returns the body's error unchanged so that [`error_policy`] can pick the
/// requeue delay.
pub async fn run_reconcile<K, F, Fut>(
    instance: Arc<K>,
    ctx: Arc<Context>,
    body: F,
) -> Result<Action, ReconcileError>
where
    K: Resource<DynamicType = ()>,
    F: FnOnce(Arc<K>, Arc<Context>) -> Fut,
    Fut: Future<Output = Result<Action, ReconcileError>>,
{
    let kind = K::kind(&()).to_string();
    let namespace = instance.namespace().unwrap_or_default();
    let name = instance.name_any();
    let started = Instant::now();

    debug!(kind = %kind, namespace = %namespace, name = %name, "Reconciling");

    match body(instance, Arc::clone(&ctx)).await {
        Ok(action) => {
            metrics::record_reconciliation_success(&kind, started.elapsed());
            Ok(action)
        }
        Err(err) => {
            metrics::record_reconciliation_error(&kind, started.elapsed());
            handle_reconcile_error(&ctx, &kind, &namespace, &name, &err).await;
            Err(err)
        }
    }
}

/// Logs a reconcile error and resets the namespace's client when required.
pub async fn handle_reconcile_error(
    ctx: &Context,
    kind: &str,
    namespace: &str,
    name: &str,
    err: &ReconcileError,
) {
    let classification = classify(err);
    let policy = classification.policy.as_str();

    if classification.surface {
        error!(kind, namespace, name, policy, error = %err, "Unexpected reconcile error");
    } else if classification.policy.requeue_after().is_some() {
        warn!(kind, namespace, name, policy, error = %err, "Reconcile failed");
    } else {
        info!(kind, namespace, name, policy, "{err}");
    }

    if classification.reset_client && ctx.manager.get_platform_client(namespace).is_some() {
        info!(namespace, "Resetting platform client");
        if let Err(e) = ctx.manager.reset_platform_client(namespace).await {
            warn!(namespace, error = %e, "Failed to notify System after client reset");
        }
    }
}

/// Converts a reconcile error into a requeue decision.
///
/// Used as the controller `error_policy`; the side effects have already run
/// in [`run_reconcile`].
pub fn error_policy<K>(_instance: Arc<K>, err: &ReconcileError, _ctx: Arc<Context>) -> Action
where
    K: Resource<DynamicType = ()>,
{
    let policy = classify(err).policy;
    metrics::record_requeue(&K::kind(&()), policy.as_str());
    match policy.requeue_after() {
        Some(delay) => Action::requeue(delay),
        None => Action::await_change(),
    }
}
