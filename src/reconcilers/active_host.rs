// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hand-off of network configuration to the active controller host.
//!
//! `AddressPool` and `PlatformNetwork` resources are realised on the platform
//! by the Host reconciler of the active controller. Their own reconcilers only
//! wake that Host whenever the spec or the deployment scope changes.

use kube::{Resource, ResourceExt};
use serde_json::json;
use tracing::{info, warn};

use super::status::{common_status, patch_status};
use super::ManagedResource;
use crate::context::Context;
use crate::crd::Host;
use crate::errors::{PlatformError, ReconcileError};
use crate::events::reasons;
use crate::platform::inventory::hosts::{self, CONTROLLER_0};
use crate::platform::PlatformClient;
use crate::store::{fetch, ResourceKind};

/// Hostname of the controller running the platform services.
///
/// Falls back to controller-0 when no host reports itself active, which is
/// the case on a freshly installed simplex system.
async fn active_hostname(client: &dyn PlatformClient) -> Result<String, PlatformError> {
    Ok(hosts::active_controller(client)
        .await?
        .map_or_else(|| CONTROLLER_0.to_string(), |host| host.hostname))
}

/// Loads the `Host` resource of the active controller.
///
/// # Errors
///
/// Returns [`ReconcileError::UserData`] when the platform cannot name the
/// active controller or no `Host` resource exists for it.
pub async fn active_host(
    ctx: &Context,
    client: &dyn PlatformClient,
    namespace: &str,
) -> Result<Host, ReconcileError> {
    let hostname = match active_hostname(client).await {
        Ok(hostname) => hostname,
        Err(e) => {
            warn!(namespace, error = %e, "failed to query active controller");
            return Err(ReconcileError::UserData("failed to get active host".to_string()));
        }
    };

    fetch::<Host>(ctx.store(), ResourceKind::Host, namespace, &hostname)
        .await?
        .ok_or_else(|| ReconcileError::UserData("failed to get active host".to_string()))
}

/// Notifies the active controller host of a change to `instance`.
///
/// Nothing happens unless the generation moved past `observedGeneration` or
/// the deployment scope was just updated. `observedGeneration` is written only
/// once the host has been notified, so a failed notification is retried.
///
/// # Arguments
///
/// * `ctx` - Controller context
/// * `client` - Platform client of the namespace
/// * `instance` - The pool or network that changed
/// * `scope_updated` - Whether the preamble changed the deployment scope
/// * `reset_host` - Also mark the host out of sync and unreconciled
/// * `label` - Lower-case kind name used in the event message
///
/// # Errors
///
/// Returns an error if the host cannot be found or written.
pub async fn notify_active_host<K: ManagedResource>(
    ctx: &Context,
    client: &dyn PlatformClient,
    instance: &K,
    scope_updated: bool,
    reset_host: bool,
    label: &str,
) -> Result<(), ReconcileError> {
    let generation = instance.meta().generation.unwrap_or_default();
    if common_status(instance).observed_generation == generation && !scope_updated {
        return Ok(());
    }

    let namespace = instance.namespace().unwrap_or_default();
    let name = instance.name_any();
    let host = active_host(ctx, client, &namespace).await?;
    let hostname = host.name_any();

    if reset_host {
        patch_status(
            ctx.store(),
            &host,
            json!({ "inSync": false, "reconciled": false }),
        )
        .await
        .map_err(|e| {
            ReconcileError::ResourceConfigurationDependency(format!(
                "Failed to reset reconciled status of '{hostname}' host: {e}"
            ))
        })?;
    }

    ctx.manager
        .notify_resource(ResourceKind::Host, &namespace, &hostname)
        .await
        .map_err(|e| {
            ReconcileError::ResourceConfigurationDependency(format!(
                "Failed to notify '{hostname}' active host instance: {e}"
            ))
        })?;

    ctx.normal_event(
        &host,
        reasons::NOTIFIED,
        format!("Host has been notified due to '{name}' {label} update."),
    )
    .await;
    info!(namespace = %namespace, name = %name, host = %hostname, "Active host notified");

    patch_status(
        ctx.store(),
        instance,
        json!({ "observedGeneration": generation }),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
#[path = "active_host_tests.rs"]
mod active_host_tests;
