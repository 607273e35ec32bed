// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status restoration after a platform restore.
//!
//! Restore tooling re-creates the custom resources of a system that is
//! already configured and marks each with the `restore-in-progress`
//! annotation. A marked resource gets a canned, reconciled status written
//! without contacting the platform; the annotation is then removed so that
//! later passes reconcile normally.

use kube::ResourceExt;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::finalizers::has_finalizer;
use super::retry::retry_on_conflict;
use super::status::{patch_status, reload};
use super::ManagedResource;
use crate::constants::{RESTORE_IN_PROGRESS_ANNOTATION, SCOPE_BOOTSTRAP, STRATEGY_NOT_REQUIRED};
use crate::context::Context;
use crate::errors::ReconcileError;
use crate::events::reasons;
use crate::store::apply_patch;

/// Payload of the `restore-in-progress` annotation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreStatus {
    /// Value to restore for `inSync`; left unchanged when absent
    #[serde(default)]
    pub in_sync: Option<bool>,
}

/// Returns the annotation payload when a restore is in progress.
#[must_use]
pub fn restore_in_progress<K: ManagedResource>(instance: &K) -> Option<&str> {
    instance
        .annotations()
        .get(RESTORE_IN_PROGRESS_ANNOTATION)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

/// Writes the restored status, then clears the annotation.
///
/// The status records the resource as reconciled in bootstrap scope at its
/// current generation. The annotation removal also adds the kind's finalizer
/// if it is missing. An unparseable payload is logged and the status is left
/// alone, but the annotation is still cleared.
///
/// # Errors
///
/// Returns an error if either write fails.
pub async fn restore_status<K: ManagedResource>(
    ctx: &Context,
    instance: &K,
) -> Result<(), ReconcileError> {
    let name = instance.name_any();
    let payload = restore_in_progress(instance).unwrap_or_default();

    ctx.normal_event(
        instance,
        reasons::UPDATED,
        format!(
            "Restoring '{name}' {} resource status without doing actual reconciliation",
            K::KIND
        ),
    )
    .await;

    match serde_json::from_str::<RestoreStatus>(payload) {
        Ok(restore) => {
            let mut status = json!({
                "reconciled": true,
                "observedGeneration": instance.meta().generation.unwrap_or_default(),
                "deploymentScope": SCOPE_BOOTSTRAP,
                "strategyRequired": STRATEGY_NOT_REQUIRED,
            });
            if let Some(in_sync) = restore.in_sync {
                status["inSync"] = json!(in_sync);
            }
            patch_status(ctx.store(), instance, status).await?;
            info!(
                kind = %K::KIND,
                name = %name,
                in_sync = ?restore.in_sync,
                "Status updated during restore"
            );
        }
        Err(e) => {
            warn!(kind = %K::KIND, name = %name, error = %e, "Failed to parse restore status");
        }
    }

    clear_restore_in_progress(ctx, instance).await
}

async fn clear_restore_in_progress<K: ManagedResource>(
    ctx: &Context,
    instance: &K,
) -> Result<(), ReconcileError> {
    let store = ctx.store();
    let namespace = instance.namespace().unwrap_or_default();
    let name = instance.name_any();

    retry_on_conflict(
        || async {
            let current = reload(store, instance).await?;
            let mut metadata = json!({
                "resourceVersion": current.resource_version(),
                "annotations": { RESTORE_IN_PROGRESS_ANNOTATION: null },
            });
            if let Some(finalizer) = K::FINALIZER.filter(|_| !has_finalizer(&current)) {
                let mut finalizers = current.finalizers().to_vec();
                finalizers.push(finalizer.to_string());
                metadata["finalizers"] = json!(finalizers);
            }
            apply_patch::<K>(
                store,
                K::KIND,
                &namespace,
                &name,
                &json!({ "metadata": metadata }),
                false,
            )
            .await
        },
        "clear restore-in-progress",
    )
    .await?;
    Ok(())
}

#[cfg(test)]
#[path = "restore_tests.rs"]
mod restore_tests;
