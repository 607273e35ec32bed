// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! PtpInstance reconciliation.
//!
//! The platform cannot rename a PTP instance or change its service, so
//! either change deletes the instance and creates it again. Parameters are
//! attached and detached individually.

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{debug, info, warn};

use super::finalizers::{is_deleting, remove_finalizer};
use super::lifecycle::{check_after_in_sync, complete, prepare, require_client, Change, Preamble};
use super::status::record_delta;
use crate::context::Context;
use crate::crd::PtpInstance;
use crate::delta::{list_delta, list_delta_string};
use crate::errors::{PlatformError, ReconcileError};
use crate::events::reasons;
use crate::metrics;
use crate::platform::inventory::ptp::{self, PtpInstance as PlatformPtpInstance};
use crate::platform::PlatformClient;

/// Reconciles a `PtpInstance` resource.
///
/// # Errors
///
/// Returns an error if the preamble, a platform call or a status write fails.
pub async fn reconcile_ptp_instance(
    ptp_instance: Arc<PtpInstance>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let instance = match prepare(&ctx, ptp_instance.as_ref()).await? {
        Preamble::Done(action) => return Ok(action),
        Preamble::Proceed(prepared) => prepared.instance,
    };
    let client = require_client(&ctx, &instance).await?;

    let existing = find_existing(client.as_ref(), &instance).await?;

    if is_deleting(&instance) {
        reconcile_deleted(&ctx, client.as_ref(), &instance, existing.as_ref()).await?;
        return Ok(Action::await_change());
    }

    let result = match existing {
        None => reconcile_new(&ctx, client.as_ref(), &instance)
            .await
            .map(|created| Some(created.uuid)),
        Some(current) => reconcile_updated(&ctx, client.as_ref(), &instance, current)
            .await
            .map(|updated| Some(updated.uuid)),
    };

    complete(&ctx, &instance, result).await
}

/// Finds the platform PTP instance by recorded UUID, else by name and service.
///
/// # Errors
///
/// Returns an error if the platform cannot be queried.
pub async fn find_existing(
    client: &dyn PlatformClient,
    instance: &PtpInstance,
) -> Result<Option<PlatformPtpInstance>, PlatformError> {
    if let Some(id) = instance.status.as_ref().and_then(|s| s.common.id.as_deref()) {
        return match ptp::get_instance(client, id).await {
            Ok(found) => Ok(Some(found)),
            Err(e) if e.is_not_found() => {
                info!(name = %instance.name_any(), id, "resource no longer exists");
                Ok(None)
            }
            Err(e) => Err(e),
        };
    }

    let found = ptp::list_instances(client)
        .await?
        .into_iter()
        .find(|i| i.name == instance.name_any() && i.service == instance.spec.service);
    if let Some(found) = &found {
        info!(name = %found.name, uuid = %found.uuid, "found existing ptp instance");
    }
    Ok(found)
}

fn desired_parameters(instance: &PtpInstance) -> Vec<String> {
    instance.spec.instance_parameters.clone().unwrap_or_default()
}

async fn create(
    client: &dyn PlatformClient,
    instance: &PtpInstance,
) -> Result<PlatformPtpInstance, ReconcileError> {
    let name = instance.name_any();
    info!(name = %name, service = %instance.spec.service, "creating ptp instance");
    let mut created = ptp::create_instance(client, &name, &instance.spec.service).await?;

    let parameters = desired_parameters(instance);
    if !parameters.is_empty() {
        created = ptp::update_instance_parameters(client, &created.uuid, &parameters, &[]).await?;
    }
    metrics::record_platform_change("PtpInstance", "create");
    Ok(created)
}

async fn reconcile_new(
    ctx: &Context,
    client: &dyn PlatformClient,
    instance: &PtpInstance,
) -> Result<PlatformPtpInstance, ReconcileError> {
    check_after_in_sync(ctx, instance, Change::Provision).await?;

    let created = create(client, instance).await?;
    ctx.normal_event(instance, reasons::CREATED, "ptp instance has been created")
        .await;
    Ok(created)
}

async fn reconcile_updated(
    ctx: &Context,
    client: &dyn PlatformClient,
    instance: &PtpInstance,
    current: PlatformPtpInstance,
) -> Result<PlatformPtpInstance, ReconcileError> {
    if current.name != instance.name_any() || current.service != instance.spec.service {
        check_after_in_sync(ctx, instance, Change::Configure).await?;

        info!(name = %instance.name_any(), uuid = %current.uuid, "replacing ptp instance");
        if let Err(e) = ptp::delete_instance(client, &current.uuid).await {
            warn!(name = %instance.name_any(), error = %e, "failed to delete ptp instance");
        }
        let replaced = create(client, instance).await?;
        ctx.normal_event(instance, reasons::UPDATED, "ptp instance has been updated")
            .await;
        return Ok(replaced);
    }

    let (added, removed) = list_delta(&current.parameters, &desired_parameters(instance));
    record_delta(ctx.store(), instance, &list_delta_string(&added, &removed)).await?;
    if added.is_empty() && removed.is_empty() {
        debug!(name = %instance.name_any(), "ptp instance is in sync");
        return Ok(current);
    }

    check_after_in_sync(ctx, instance, Change::Configure).await?;

    info!(
        name = %instance.name_any(),
        added = ?added,
        removed = ?removed,
        "updating ptp instance parameters"
    );
    let updated = ptp::update_instance_parameters(client, &current.uuid, &added, &removed).await?;
    metrics::record_platform_change("PtpInstance", "update");
    ctx.normal_event(instance, reasons::UPDATED, "ptp instance has been updated")
        .await;
    Ok(updated)
}

async fn reconcile_deleted(
    ctx: &Context,
    client: &dyn PlatformClient,
    instance: &PtpInstance,
    existing: Option<&PlatformPtpInstance>,
) -> Result<(), ReconcileError> {
    if let Some(found) = existing {
        match ptp::delete_instance(client, &found.uuid).await {
            Ok(()) => metrics::record_platform_change("PtpInstance", "delete"),
            Err(e) if e.status() == Some(400) => {
                info!(
                    name = %instance.name_any(),
                    "PTP instance is still in use; deleting local resource anyway"
                );
            }
            Err(e) => return Err(e.into()),
        }
        ctx.normal_event(instance, reasons::DELETED, "PTP instance has been deleted")
            .await;
    }

    remove_finalizer(ctx.store(), instance).await?;
    Ok(())
}

#[cfg(test)]
#[path = "ptpinstance_tests.rs"]
mod ptpinstance_tests;
