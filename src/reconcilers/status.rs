// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status helpers shared by every reconciled kind.
//!
//! All kinds flatten [`ResourceStatus`] into their status, so a merge patch of
//! `{"status": {"inSync": true}}` has the same meaning for each of them.
//!
//! # Example
//!
//! ```rust,ignore
//! use deployment_manager::reconcilers::status::sync_status;
//!
//! let result = reconcile_body(&client, &network).await;
//! sync_status(&ctx, &network, id.as_deref(), result.is_ok()).await?;
//! ```

use kube::ResourceExt;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::ManagedResource;
use crate::constants::{SCOPE_BOOTSTRAP, SCOPE_PRINCIPAL, STRATEGY_NOT_REQUIRED};
use crate::context::Context;
use crate::crd::ResourceStatus;
use crate::errors::{ReconcileError, StoreError};
use crate::events::reasons;
use crate::store::{apply_patch, fetch, ObjectStore};

/// The previously tracked id, when `id` replaces a different one.
#[must_use]
pub(crate) fn replaced_id<'a>(previous: Option<&'a str>, id: &str) -> Option<&'a str> {
    previous.filter(|p| !p.is_empty() && *p != id)
}

/// A copy of the common status, or the default when none is recorded yet.
#[must_use]
pub fn common_status<K: ManagedResource>(instance: &K) -> ResourceStatus {
    instance.common_status().cloned().unwrap_or_default()
}

/// The stored deployment scope, defaulting to bootstrap.
#[must_use]
pub fn deployment_scope<K: ManagedResource>(instance: &K) -> &str {
    match instance.common_status().map(|s| s.deployment_scope.as_str()) {
        Some(scope) if !scope.is_empty() => scope,
        _ => SCOPE_BOOTSTRAP,
    }
}

/// Whether the resource is being managed as a day-2 change.
#[must_use]
pub fn is_principal<K: ManagedResource>(instance: &K) -> bool {
    deployment_scope(instance) == SCOPE_PRINCIPAL
}

/// Whether the resource has been in sync at least once in its current scope.
#[must_use]
pub fn is_reconciled<K: ManagedResource>(instance: &K) -> bool {
    instance.common_status().is_some_and(|s| s.reconciled)
}

/// Re-reads `instance` from the store.
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] if the object has been deleted, or the
/// read error.
pub async fn reload<K: ManagedResource>(
    store: &dyn ObjectStore,
    instance: &K,
) -> Result<K, StoreError> {
    let namespace = instance.namespace().unwrap_or_default();
    let name = instance.name_any();
    fetch::<K>(store, K::KIND, &namespace, &name)
        .await?
        .ok_or_else(|| StoreError::NotFound {
            kind: K::KIND.to_string(),
            namespace,
            name,
        })
}

/// Merge-patches the status subresource and returns the updated object.
///
/// # Arguments
///
/// * `store` - Object store
/// * `instance` - The resource whose status is written
/// * `status` - Status fields to merge
///
/// # Errors
///
/// Returns an error if the patch is rejected.
pub async fn patch_status<K: ManagedResource>(
    store: &dyn ObjectStore,
    instance: &K,
    status: Value,
) -> Result<K, StoreError> {
    let namespace = instance.namespace().unwrap_or_default();
    let name = instance.name_any();
    debug!(
        kind = %K::KIND,
        namespace = %namespace,
        name = %name,
        status = %status,
        "Updating status"
    );
    apply_patch(
        store,
        K::KIND,
        &namespace,
        &name,
        &json!({ "status": status }),
        true,
    )
    .await
}

/// Records the delta string of the most recent compare.
///
/// Nothing is written when the stored delta is already `delta`.
///
/// # Errors
///
/// Returns an error if the patch is rejected.
pub async fn record_delta<K: ManagedResource>(
    store: &dyn ObjectStore,
    instance: &K,
    delta: &str,
) -> Result<(), StoreError> {
    if instance.common_status().map_or("", |s| s.delta.as_str()) == delta {
        return Ok(());
    }
    if !delta.is_empty() {
        debug!(name = %instance.name_any(), "delta configuration:\n{delta}");
    }
    patch_status(store, instance, json!({ "delta": delta })).await?;
    Ok(())
}

/// Applies the outcome of a reconcile body to the status.
///
/// Records the platform UUID, sets `inSync`, latches `reconciled` the first
/// time the resource is in sync, and once reconciled resets
/// `configurationUpdated` and `strategyRequired`. Principal-scope resources
/// republish their strategy fact. An event is emitted whenever `inSync`
/// changes. The status is only written when something changed.
///
/// # Arguments
///
/// * `ctx` - Controller context
/// * `instance` - The resource as seen by the body
/// * `id` - Platform UUID of the realised resource, if known
/// * `in_sync` - Whether the body completed without error
///
/// # Returns
///
/// The resource after the status write.
///
/// # Errors
///
/// Returns an error if the status patch is rejected.
pub async fn sync_status<K: ManagedResource>(
    ctx: &Context,
    instance: &K,
    id: Option<&str>,
    in_sync: bool,
) -> Result<K, ReconcileError> {
    let old = common_status(instance);
    let mut new = old.clone();

    if let Some(id) = id {
        if let Some(previous) = replaced_id(old.id.as_deref(), id) {
            info!(
                name = %instance.name_any(),
                previous,
                id,
                "Platform resource was replaced; tracking new id"
            );
        }
        new.id = Some(id.to_string());
    }

    if in_sync != old.in_sync {
        ctx.normal_event(
            instance,
            reasons::UPDATED,
            format!("synchronization has changed to: {in_sync}"),
        )
        .await;
    }

    new.in_sync = in_sync;
    if in_sync {
        new.delta.clear();
    }
    if !new.reconciled {
        new.reconciled = in_sync;
    }

    if new.reconciled {
        new.configuration_updated = false;
        new.strategy_required = STRATEGY_NOT_REQUIRED.to_string();
        if is_principal(instance) {
            ctx.manager.set_resource_info(
                K::STRATEGY_TYPE,
                "",
                &instance.name_any(),
                true,
                STRATEGY_NOT_REQUIRED,
            );
        }
    }

    if new == old {
        return Ok(instance.clone());
    }

    let mut patch = serde_json::to_value(&new)?;
    if !in_sync {
        // The delta of a failed pass is recorded by the body.
        if let Some(fields) = patch.as_object_mut() {
            fields.remove("delta");
        }
    }
    let updated = patch_status(ctx.store(), instance, patch).await?;
    Ok(updated)
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
