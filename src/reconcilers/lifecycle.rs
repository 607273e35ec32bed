// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The reconcile preamble shared by every kind.
//!
//! A reconciler calls [`prepare`] first and only runs its body on
//! [`Preamble::Proceed`]. Kinds that talk to the platform then call
//! [`require_client`], and finish with [`complete`] so that the status and
//! events reflect the body's outcome the same way for every kind.
//!
//! # Example
//!
//! ```rust,ignore
//! let prepared = match prepare(&ctx, &network).await? {
//!     Preamble::Done(action) => return Ok(action),
//!     Preamble::Proceed(prepared) => prepared,
//! };
//! let client = require_client(&ctx, &prepared.instance).await?;
//! let result = reconcile_resource(&ctx, client.as_ref(), &prepared.instance).await;
//! complete(&ctx, &prepared.instance, result).await
//! ```

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use serde_json::json;
use tracing::{debug, info, warn};

use super::finalizers::{ensure_finalizer, is_deleting};
use super::restore::{restore_in_progress, restore_status};
use super::scope::{update_config_status, update_deployment_scope, ConfigStatusUpdate};
use super::status::{is_reconciled, patch_status, reload, sync_status};
use super::ManagedResource;
use crate::constants::{RECONCILE_AFTER_INSYNC_ANNOTATION, RESYNC_INTERVAL};
use crate::context::Context;
use crate::errors::ReconcileError;
use crate::events::reasons;
use crate::platform::PlatformClient;
use crate::store::fetch;

/// Outcome of [`prepare`].
#[derive(Debug)]
pub enum Preamble<K> {
    /// Nothing more to do in this pass
    Done(Action),
    /// Run the kind's body
    Proceed(Prepared<K>),
}

/// A resource that passed the preamble.
#[derive(Debug)]
pub struct Prepared<K> {
    /// The resource after every preamble write
    pub instance: K,
    /// The stored deployment scope changed in this pass
    pub scope_updated: bool,
    /// What the configuration status update found
    pub config: ConfigStatusUpdate,
}

/// Runs the load, restore, scope, factory, config status, finalizer and
/// enabled steps in that order.
///
/// # Arguments
///
/// * `ctx` - Controller context
/// * `instance` - The object delivered by the controller; it is re-read
///
/// # Returns
///
/// [`Preamble::Done`] when the pass ends here, otherwise the resource to
/// reconcile.
///
/// # Errors
///
/// Returns an error if a read or write fails or the deployment scope is
/// invalid.
pub async fn prepare<K: ManagedResource>(
    ctx: &Context,
    instance: &K,
) -> Result<Preamble<K>, ReconcileError> {
    let namespace = instance.namespace().unwrap_or_default();
    let name = instance.name_any();

    let Some(instance) = fetch::<K>(ctx.store(), K::KIND, &namespace, &name).await? else {
        debug!(
            kind = %K::KIND,
            namespace = %namespace,
            name = %name,
            "Resource not found; ignoring"
        );
        return Ok(Preamble::Done(Action::await_change()));
    };

    if restore_in_progress(&instance).is_some() {
        restore_status(ctx, &instance).await?;
        return Ok(Preamble::Done(Action::await_change()));
    }

    let (instance, scope_updated) = update_deployment_scope(ctx, instance).await?;
    let instance = factory_install_fixup(ctx, instance).await?;
    let (instance, config) = update_config_status(ctx, &instance).await?;

    if !is_deleting(&instance) && ensure_finalizer(ctx.store(), &instance).await? {
        return Ok(Preamble::Done(Action::await_change()));
    }

    if !ctx.config.is_enabled(K::RECONCILER) {
        debug!(kind = %K::KIND, namespace = %namespace, name = %name, "Skipping disabled kind");
        return Ok(Preamble::Done(Action::await_change()));
    }

    Ok(Preamble::Proceed(Prepared {
        instance,
        scope_updated,
        config,
    }))
}

/// Forces `reconciled=false` once per resource on a factory-installed system.
///
/// Factory installs ship with resources that look reconciled; the first
/// pass after install must treat them as day-1 again.
async fn factory_install_fixup<K: ManagedResource>(
    ctx: &Context,
    instance: K,
) -> Result<K, ReconcileError> {
    if is_deleting(&instance) {
        return Ok(instance);
    }

    let namespace = instance.namespace().unwrap_or_default();
    let name = instance.name_any();
    if !ctx.manager.get_factory_install(&namespace).await?
        || ctx
            .manager
            .get_resource_default_updated(&namespace, &name)
            .await?
    {
        return Ok(instance);
    }

    info!(
        kind = %K::KIND,
        namespace = %namespace,
        name = %name,
        "Factory install: resetting reconciled"
    );
    let instance = if is_reconciled(&instance) {
        patch_status(ctx.store(), &instance, json!({ "reconciled": false })).await?
    } else {
        instance
    };
    ctx.manager
        .set_resource_default_updated(&namespace, &name, true)
        .await?;
    Ok(instance)
}

/// Returns the namespace's platform client once the System is ready.
///
/// A Warning event explains the wait. Neither error is requeued; the System
/// reconciler notifies dependents when the client is built and the system is
/// ready.
///
/// # Errors
///
/// Returns [`ReconcileError::MissingClient`] when no client exists and
/// [`ReconcileError::SystemNotReady`] before the System's first successful
/// reconcile.
pub async fn require_client<K: ManagedResource>(
    ctx: &Context,
    instance: &K,
) -> Result<Arc<dyn PlatformClient>, ReconcileError> {
    let namespace = instance.namespace().unwrap_or_default();

    let Some(client) = ctx.manager.get_platform_client(&namespace) else {
        ctx.warning_event(instance, reasons::DEPENDENCY, "waiting for platform client creation")
            .await;
        return Err(ReconcileError::MissingClient(namespace));
    };

    if !ctx.manager.get_system_ready(&namespace) {
        ctx.warning_event(instance, reasons::DEPENDENCY, "waiting for system reconciliation")
            .await;
        return Err(ReconcileError::SystemNotReady(namespace));
    }

    Ok(client)
}

/// Kind of change a body is about to make to a reconciled resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// A platform object is about to be created
    Provision,
    /// A platform object is about to be modified
    Configure,
}

/// Blocks platform changes after the initial synchronization.
///
/// Applies when the reconciler has `stopAfterInSync` set, the resource is
/// reconciled and the `reconcile-after-insync` annotation is absent. The
/// refusal is reported as a Normal event.
///
/// # Errors
///
/// Returns [`ReconcileError::ChangeAfterReconciled`] when the change must not
/// be made.
pub async fn check_after_in_sync<K: ManagedResource>(
    ctx: &Context,
    instance: &K,
    change: Change,
) -> Result<(), ReconcileError> {
    if !ctx.config.stop_after_in_sync(K::RECONCILER) || !is_reconciled(instance) {
        return Ok(());
    }

    if instance
        .annotations()
        .contains_key(RECONCILE_AFTER_INSYNC_ANNOTATION)
    {
        info!(
            name = %instance.name_any(),
            "manual override; allowing configuration changes after initial synchronization"
        );
        return Ok(());
    }

    let message = match change {
        Change::Provision => {
            "resource provisioning ignored after initial synchronization has completed"
        }
        Change::Configure => {
            "configuration changes ignored after initial synchronization has completed"
        }
    };
    ctx.normal_event(instance, reasons::UPDATED, message).await;
    Err(ReconcileError::ChangeAfterReconciled(message.to_string()))
}

/// Records the body's outcome in the status and picks the next action.
///
/// The resource is re-read first so that status fields written by the body,
/// such as the delta, are seen. A successful body stores the platform id,
/// marks the resource in sync and is resynced periodically. A failed body
/// marks it out of sync and returns the body's error.
///
/// # Errors
///
/// Returns the body's error, or the status write error after a successful
/// body.
pub async fn complete<K: ManagedResource>(
    ctx: &Context,
    instance: &K,
    result: Result<Option<String>, ReconcileError>,
) -> Result<Action, ReconcileError> {
    match result {
        Ok(id) => {
            let latest = reload(ctx.store(), instance).await?;
            sync_status(ctx, &latest, id.as_deref(), true).await?;
            Ok(Action::requeue(RESYNC_INTERVAL))
        }
        Err(err) => {
            let latest = reload(ctx.store(), instance)
                .await
                .unwrap_or_else(|_| instance.clone());
            if let Err(e) = sync_status(ctx, &latest, None, false).await {
                warn!(
                    name = %instance.name_any(),
                    error = %e,
                    "Failed to record out-of-sync status"
                );
            }
            Err(err)
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod lifecycle_tests;
