// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! AddressPool reconciliation.
//!
//! Pools are created and updated on the platform by the Host reconciler of
//! the active controller, which needs the platform networks that use them at
//! the same time. This reconciler marks that host as out of sync and wakes it
//! whenever a pool changes. Deleting a pool only releases its finalizer.

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::debug;

use super::active_host::notify_active_host;
use super::finalizers::{is_deleting, remove_finalizer};
use super::lifecycle::{prepare, require_client, Preamble};
use crate::context::Context;
use crate::crd::AddressPool;
use crate::errors::ReconcileError;

/// Reconciles an `AddressPool` resource.
///
/// Only one pool or platform network notifies the active host at a time;
/// the others fail with [`ReconcileError::HostNotify`] and are retried
/// immediately.
///
/// # Errors
///
/// Returns an error if the preamble fails, another resource is notifying
/// the host, or the host cannot be notified.
pub async fn reconcile_address_pool(
    pool: Arc<AddressPool>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let prepared = match prepare(&ctx, pool.as_ref()).await? {
        Preamble::Done(action) => return Ok(action),
        Preamble::Proceed(prepared) => prepared,
    };
    let instance = prepared.instance;
    let client = require_client(&ctx, &instance).await?;

    if is_deleting(&instance) {
        debug!(name = %instance.name_any(), "Releasing address pool");
        remove_finalizer(ctx.store(), &instance).await?;
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
        true,
        "addresspool",
    )
    .await?;

    Ok(Action::await_change())
}

#[cfg(test)]
#[path = "addresspool_tests.rs"]
mod addresspool_tests;
