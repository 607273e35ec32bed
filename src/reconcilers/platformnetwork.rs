// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! PlatformNetwork reconciliation.
//!
//! Like address pools, platform networks are realised by the Host reconciler
//! of the active controller. A spec or scope change wakes that host. On
//! deletion the platform network, if any, is removed before the finalizer.

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::info;

use super::active_host::notify_active_host;
use super::finalizers::{is_deleting, remove_finalizer};
use super::lifecycle::{prepare, require_client, Preamble};
use crate::context::Context;
use crate::crd::PlatformNetwork;
use crate::errors::{PlatformError, ReconcileError};
use crate::events::reasons;
use crate::metrics;
use crate::platform::inventory::networks::{self, Network};
use crate::platform::PlatformClient;

/// Reconciles a `PlatformNetwork` resource.
///
/// # Errors
///
/// Returns an error if the preamble fails, another resource is notifying
/// the active host, or a platform call fails.
pub async fn reconcile_platform_network(
    network: Arc<PlatformNetwork>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let prepared = match prepare(&ctx, network.as_ref()).await? {
        Preamble::Done(action) => return Ok(action),
        Preamble::Proceed(prepared) => prepared,
    };
    let instance = prepared.instance;
    let client = require_client(&ctx, &instance).await?;

    if is_deleting(&instance) {
        reconcile_deleted(&ctx, client.as_ref(), &instance).await?;
        return Ok(Action::await_change());
    }

    let Some(_notifying) = ctx.begin_active_host_notify() else {
        return Err(ReconcileError::HostNotify(
            "waiting to notify active host".to_string(),
        ));
    };

    notify_active_host(
        &ctx,
        client.as_ref(),
        &instance,
        prepared.scope_updated,
        false,
        "platformnetwork",
    )
    .await?;

    Ok(Action::await_change())
}

/// Finds the platform network backing `instance`, by UUID or by name and type.
///
/// # Errors
///
/// Returns an error if the platform cannot be queried.
pub async fn find_existing(
    client: &dyn PlatformClient,
    instance: &PlatformNetwork,
) -> Result<Option<Network>, PlatformError> {
    let id = instance
        .status
        .as_ref()
        .and_then(|s| s.common.id.as_deref());
    let name = instance.name_any();

    Ok(networks::list_networks(client)
        .await?
        .into_iter()
        .find(|n| match id {
            Some(id) => n.uuid == id,
            None => n.name == name && n.network_type == instance.spec.network_type,
        }))
}

async fn reconcile_deleted(
    ctx: &Context,
    client: &dyn PlatformClient,
    instance: &PlatformNetwork,
) -> Result<(), ReconcileError> {
    if let Some(network) = find_existing(client, instance).await? {
        match networks::delete_network(client, &network.uuid).await {
            Ok(()) => {
                metrics::record_platform_change("PlatformNetwork", "delete");
                ctx.normal_event(instance, reasons::DELETED, "platform network has been deleted")
                    .await;
            }
            Err(e) if matches!(e.status(), Some(400 | 409)) => {
                info!(
                    name = %instance.name_any(),
                    error = %e,
                    "platform network is still in use; deleting local resource anyway"
                );
            }
            Err(e) => return Err(e.into()),
        }
    }

    remove_finalizer(ctx.store(), instance).await?;
    Ok(())
}

#[cfg(test)]
#[path = "platformnetwork_tests.rs"]
mod platformnetwork_tests;
