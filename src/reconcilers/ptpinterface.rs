// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! PtpInterface reconciliation.
//!
//! An interface belongs to exactly one PTP instance, which must already
//! exist on the platform. Moving it to another instance recreates it, since
//! the platform binds the two by UUID at creation time.

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{debug, info, warn};

use super::finalizers::{is_deleting, remove_finalizer};
use super::lifecycle::{check_after_in_sync, complete, prepare, require_client, Change, Preamble};
use super::status::record_delta;
use crate::context::Context;
use crate::crd::PtpInterface;
use crate::delta::{list_delta, list_delta_string};
use crate::errors::{PlatformError, ReconcileError};
use crate::events::reasons;
use crate::metrics;
use crate::platform::inventory::ptp::{self, PtpInterface as PlatformPtpInterface};
use crate::platform::PlatformClient;

/// Reconciles a `PtpInterface` resource.
///
/// # Errors
///
/// Returns an error if the preamble, a platform call or a status write
/// fails, or if the referenced PTP instance does not exist yet.
pub async fn reconcile_ptp_interface(
    ptp_interface: Arc<PtpInterface>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let instance = match prepare(&ctx, ptp_interface.as_ref()).await? {
        Preamble::Done(action) => return Ok(action),
        Preamble::Proceed(prepared) => prepared.instance,
    };
    let client = require_client(&ctx, &instance).await?;

    let existing = find_existing(client.as_ref(), &instance).await?;

    if is_deleting(&instance) {
        reconcile_deleted(&ctx, client.as_ref(), &instance, existing.as_ref()).await?;
        return Ok(Action::await_change());
    }

    let result: Result<Option<String>, ReconcileError> = async {
        let ptp_instance_uuid = ptp_instance_uuid(client.as_ref(), &instance).await?;
        let realised = match existing {
            None => reconcile_new(&ctx, client.as_ref(), &instance, &ptp_instance_uuid).await?,
            Some(current) => {
                reconcile_updated(&ctx, client.as_ref(), &instance, current, &ptp_instance_uuid)
                    .await?
            }
        };
        Ok(Some(realised.uuid))
    }
    .await;

    complete(&ctx, &instance, result).await
}

/// Finds the platform PTP interface by recorded UUID, else by name.
///
/// # Errors
///
/// Returns an error if the platform cannot be queried.
pub async fn find_existing(
    client: &dyn PlatformClient,
    instance: &PtpInterface,
) -> Result<Option<PlatformPtpInterface>, PlatformError> {
    if let Some(id) = instance.status.as_ref().and_then(|s| s.common.id.as_deref()) {
        return match ptp::get_interface(client, id).await {
            Ok(found) => Ok(Some(found)),
            Err(e) if e.is_not_found() => {
                info!(name = %instance.name_any(), id, "resource no longer exists");
                Ok(None)
            }
            Err(e) => Err(e),
        };
    }

    let found = ptp::list_interfaces(client)
        .await?
        .into_iter()
        .find(|i| i.name == instance.name_any());
    if let Some(found) = &found {
        info!(name = %found.name, uuid = %found.uuid, "found existing ptp interface");
    }
    Ok(found)
}

/// Resolves the UUID of the PTP instance the interface refers to.
async fn ptp_instance_uuid(
    client: &dyn PlatformClient,
    instance: &PtpInterface,
) -> Result<String, ReconcileError> {
    ptp::list_instances(client)
        .await?
        .into_iter()
        .find(|i| i.name == instance.spec.ptp_instance)
        .map(|i| i.uuid)
        .ok_or_else(|| {
            ReconcileError::ResourceStatusDependency(
                "PTP instance is not created, waiting for the creation".to_string(),
            )
        })
}

fn desired_parameters(instance: &PtpInterface) -> Vec<String> {
    instance.spec.interface_parameters.clone().unwrap_or_default()
}

async fn create(
    client: &dyn PlatformClient,
    instance: &PtpInterface,
    ptp_instance_uuid: &str,
) -> Result<PlatformPtpInterface, ReconcileError> {
    let name = instance.name_any();
    info!(name = %name, ptp_instance = %instance.spec.ptp_instance, "creating ptp interface");
    let mut created = ptp::create_interface(client, &name, ptp_instance_uuid).await?;

    let parameters = desired_parameters(instance);
    if !parameters.is_empty() {
        created = ptp::update_interface_parameters(client, &created.uuid, &parameters, &[]).await?;
    }
    metrics::record_platform_change("PtpInterface", "create");
    Ok(created)
}

async fn reconcile_new(
    ctx: &Context,
    client: &dyn PlatformClient,
    instance: &PtpInterface,
    ptp_instance_uuid: &str,
) -> Result<PlatformPtpInterface, ReconcileError> {
    check_after_in_sync(ctx, instance, Change::Provision).await?;

    let created = create(client, instance, ptp_instance_uuid).await?;
    ctx.normal_event(instance, reasons::CREATED, "ptp interface has been created")
        .await;
    Ok(created)
}

async fn reconcile_updated(
    ctx: &Context,
    client: &dyn PlatformClient,
    instance: &PtpInterface,
    current: PlatformPtpInterface,
    ptp_instance_uuid: &str,
) -> Result<PlatformPtpInterface, ReconcileError> {
    if current.name != instance.name_any() || current.ptp_instance_uuid != ptp_instance_uuid {
        check_after_in_sync(ctx, instance, Change::Configure).await?;

        info!(
            name = %instance.name_any(),
            from = %current.ptp_instance_name,
            to = %instance.spec.ptp_instance,
            "moving ptp interface to another ptp instance"
        );
        if let Err(e) = ptp::delete_interface(client, &current.uuid).await {
            warn!(name = %instance.name_any(), error = %e, "failed to delete ptp interface");
        }
        let replaced = create(client, instance, ptp_instance_uuid).await?;
        ctx.normal_event(instance, reasons::UPDATED, "ptp interface has been updated")
            .await;
        return Ok(replaced);
    }

    let (added, removed) = list_delta(&current.parameters, &desired_parameters(instance));
    record_delta(ctx.store(), instance, &list_delta_string(&added, &removed)).await?;
    if added.is_empty() && removed.is_empty() {
        debug!(name = %instance.name_any(), "ptp interface is in sync");
        return Ok(current);
    }

    check_after_in_sync(ctx, instance, Change::Configure).await?;

    info!(
        name = %instance.name_any(),
        added = ?added,
        removed = ?removed,
        "updating ptp interface parameters"
    );
    let updated = ptp::update_interface_parameters(client, &current.uuid, &added, &removed).await?;
    metrics::record_platform_change("PtpInterface", "update");
    ctx.normal_event(instance, reasons::UPDATED, "ptp interface has been updated")
        .await;
    Ok(updated)
}

async fn reconcile_deleted(
    ctx: &Context,
    client: &dyn PlatformClient,
    instance: &PtpInterface,
    existing: Option<&PlatformPtpInterface>,
) -> Result<(), ReconcileError> {
    if let Some(found) = existing {
        match ptp::delete_interface(client, &found.uuid).await {
            Ok(()) => metrics::record_platform_change("PtpInterface", "delete"),
            Err(e) if e.status() == Some(400) => {
                info!(
                    name = %instance.name_any(),
                    "PTP interface is still in use; deleting local resource anyway"
                );
            }
            Err(e) => return Err(e.into()),
        }
        ctx.normal_event(instance, reasons::DELETED, "PTP interface has been deleted")
            .await;
    }

    remove_finalizer(ctx.store(), instance).await?;
    Ok(())
}

#[cfg(test)]
#[path = "ptpinterface_tests.rs"]
mod ptpinterface_tests;
