// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management for reconciled resources.
//!
//! Every kind that owns a platform-side resource carries a kind-specific
//! finalizer so that deleting the custom resource waits until the platform
//! resource has been deleted, or observed absent.
//!
//! Finalizer lists are written with a merge patch carrying the object's
//! resource version. A concurrent writer makes the patch fail with a conflict
//! instead of silently dropping another controller's finalizer.
//!
//! # Example
//!
//! ```rust,ignore
//! use deployment_manager::reconcilers::finalizers::{ensure_finalizer, remove_finalizer};
//!
//! if ensure_finalizer(ctx.store(), &network).await? {
//!     // The update triggers another reconcile; wait for it.
//!     return Ok(Action::await_change());
//! }
//!
//! if network.metadata.deletion_timestamp.is_some() {
//!     // Delete the platform resource first...
//!     remove_finalizer(ctx.store(), &network).await?;
//! }
//! ```

use kube::ResourceExt;
use serde_json::json;
use tracing::info;

use super::ManagedResource;
use crate::errors::StoreError;
use crate::store::ObjectStore;

/// Returns true when `resource` carries its kind's finalizer.
///
/// Kinds without a finalizer never carry one.
#[must_use]
pub fn has_finalizer<K: ManagedResource>(resource: &K) -> bool {
    K::FINALIZER.is_some_and(|finalizer| resource.finalizers().iter().any(|f| f == finalizer))
}

/// Returns true once deletion of the resource has been requested.
#[must_use]
pub fn is_deleting<K: ManagedResource>(resource: &K) -> bool {
    resource.meta().deletion_timestamp.is_some()
}

async fn write_finalizers<K: ManagedResource>(
    store: &dyn ObjectStore,
    resource: &K,
    finalizers: Vec<String>,
) -> Result<(), StoreError> {
    let patch = json!({
        "metadata": {
            "resourceVersion": resource.resource_version(),
            "finalizers": finalizers,
        }
    });
    store
        .patch(
            K::KIND,
            &resource.namespace().unwrap_or_default(),
            &resource.name_any(),
            &patch,
        )
        .await?;
    Ok(())
}

/// Adds the kind's finalizer if it is not already present.
///
/// # Arguments
///
/// * `store` - Object store
/// * `resource` - The resource to protect
///
/// # Returns
///
/// `true` when the finalizer was added. The write triggers another reconcile,
/// so callers return and let that one do the work.
///
/// # Errors
///
/// Returns an error if the patch is rejected.
pub async fn ensure_finalizer<K: ManagedResource>(
    store: &dyn ObjectStore,
    resource: &K,
) -> Result<bool, StoreError> {
    let Some(finalizer) = K::FINALIZER else {
        return Ok(false);
    };
    if has_finalizer(resource) {
        return Ok(false);
    }

    info!(
        "Adding finalizer {} to {}/{} {}",
        finalizer,
        resource.namespace().unwrap_or_default(),
        resource.name_any(),
        K::kind(&())
    );

    let mut finalizers = resource.finalizers().to_vec();
    finalizers.push(finalizer.to_string());
    write_finalizers(store, resource, finalizers).await?;
    Ok(true)
}

/// Removes the kind's finalizer so that Kubernetes can complete the delete.
///
/// Removing an absent finalizer is a no-op.
///
/// # Errors
///
/// Returns an error if the patch is rejected.
pub async fn remove_finalizer<K: ManagedResource>(
    store: &dyn ObjectStore,
    resource: &K,
) -> Result<(), StoreError> {
    let Some(finalizer) = K::FINALIZER.filter(|_| has_finalizer(resource)) else {
        return Ok(());
    };

    info!(
        "Removing finalizer {} from {}/{} {}",
        finalizer,
        resource.namespace().unwrap_or_default(),
        resource.name_any(),
        K::kind(&())
    );

    let finalizers = resource
        .finalizers()
        .iter()
        .filter(|f| *f != finalizer)
        .cloned()
        .collect();
    write_finalizers(store, resource, finalizers).await
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
