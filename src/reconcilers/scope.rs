// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Deployment scope resolution and configuration status bookkeeping.
//!
//! The deployment scope of a resource is carried in the `status` block of the
//! configuration last applied with `kubectl apply`. `bootstrap` is day-1
//! provisioning; `principal` is a day-2 change that is rolled out with an
//! update strategy.

use kube::ResourceExt;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::retry::retry_on_conflict;
use super::status::{common_status, patch_status, reload};
use super::ManagedResource;
use crate::constants::{
    LAST_APPLIED_CONFIGURATION_ANNOTATION, RECONCILE_AFTER_INSYNC_ANNOTATION, SCOPE_BOOTSTRAP,
    SCOPE_PRINCIPAL, STRATEGY_NOT_REQUIRED,
};
use crate::context::Context;
use crate::errors::ReconcileError;
use crate::store::apply_patch;

/// Extracts the deployment scope from a last-applied configuration.
///
/// A missing annotation or a configuration without `status.deploymentScope`
/// means bootstrap. The value is case-insensitive.
///
/// # Errors
///
/// Returns a message when the configuration is not JSON or names an unknown
/// scope. Callers fall back to bootstrap in that case.
pub fn parse_scope(last_applied: Option<&str>) -> Result<&'static str, String> {
    let Some(config) = last_applied else {
        return Ok(SCOPE_BOOTSTRAP);
    };

    let value: Value = serde_json::from_str(config)
        .map_err(|e| format!("failed to parse {LAST_APPLIED_CONFIGURATION_ANNOTATION}: {e}"))?;

    match value.pointer("/status/deploymentScope") {
        None | Some(Value::Null) => Ok(SCOPE_BOOTSTRAP),
        Some(Value::String(scope)) => match scope.to_lowercase().as_str() {
            "" | SCOPE_BOOTSTRAP => Ok(SCOPE_BOOTSTRAP),
            SCOPE_PRINCIPAL => Ok(SCOPE_PRINCIPAL),
            _ => Err(format!("unsupported DeploymentScope: {scope}")),
        },
        Some(other) => Err(format!("unsupported DeploymentScope: {other}")),
    }
}

/// Resolves the scope and persists it when it differs from the stored one.
///
/// An invalid scope is stored as bootstrap and then reported as a validation
/// error, so the resource is not reconciled until the configuration is fixed.
///
/// # Returns
///
/// The resource after any write and whether the stored scope changed.
///
/// # Errors
///
/// Returns an error if the status write fails or the scope is invalid.
pub async fn update_deployment_scope<K: ManagedResource>(
    ctx: &Context,
    instance: K,
) -> Result<(K, bool), ReconcileError> {
    let parsed = parse_scope(
        instance
            .annotations()
            .get(LAST_APPLIED_CONFIGURATION_ANNOTATION)
            .map(String::as_str),
    );
    let scope = *parsed.as_ref().unwrap_or(&SCOPE_BOOTSTRAP);

    let current = common_status(&instance).deployment_scope;
    let mut instance = instance;
    let updated = current != scope;
    if updated {
        info!(
            name = %instance.name_any(),
            from = %current,
            to = scope,
            "Deployment scope updated"
        );
        instance = patch_status(ctx.store(), &instance, json!({ "deploymentScope": scope })).await?;
    }

    match parsed {
        Ok(_) => Ok((instance, updated)),
        Err(message) => Err(ReconcileError::Validation(message)),
    }
}

/// Outcome of [`update_config_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigStatusUpdate {
    /// `observedGeneration` differed from `generation`
    pub generation_changed: bool,
    /// A principal-scope change cleared `reconciled`
    pub reconciled_cleared: bool,
}

fn after_in_sync_patch<K: ManagedResource>(instance: &K, principal: bool) -> Option<Value> {
    let current = instance
        .annotations()
        .get(RECONCILE_AFTER_INSYNC_ANNOTATION)
        .map(String::as_str);
    let value = match (principal, current) {
        (true, Some("true")) | (false, None) => return None,
        (false, Some(v)) if v != "true" => return None,
        (true, _) => json!("true"),
        (false, _) => Value::Null,
    };
    Some(json!({
        "metadata": {
            "resourceVersion": instance.resource_version(),
            "annotations": { RECONCILE_AFTER_INSYNC_ANNOTATION: value },
        }
    }))
}

fn config_status_patch<K: ManagedResource>(instance: &K) -> (Option<Value>, ConfigStatusUpdate) {
    let status = common_status(instance);
    let generation = instance.meta().generation.unwrap_or_default();
    let principal = status.deployment_scope == SCOPE_PRINCIPAL;
    let mut outcome = ConfigStatusUpdate::default();
    let mut patch = serde_json::Map::new();

    if status.strategy_required.is_empty() {
        patch.insert("strategyRequired".to_string(), json!(STRATEGY_NOT_REQUIRED));
    }

    if status.observed_generation != generation {
        outcome.generation_changed = true;
        if status.observed_generation == 0 && status.reconciled {
            // Resource reconciled by a release that did not track generations.
            patch.insert("configurationUpdated".to_string(), json!(false));
        } else {
            patch.insert("configurationUpdated".to_string(), json!(true));
            if principal && status.reconciled {
                patch.insert("reconciled".to_string(), json!(false));
            }
            outcome.reconciled_cleared = principal;
        }
        if !K::DEFERS_OBSERVED_GENERATION {
            patch.insert("observedGeneration".to_string(), json!(generation));
        }
        patch.insert("strategyRequired".to_string(), json!(STRATEGY_NOT_REQUIRED));
    }

    let patch = (!patch.is_empty()).then_some(Value::Object(patch));
    (patch, outcome)
}

/// Brings the configuration bookkeeping up to date with the spec.
///
/// The `reconcile-after-insync` annotation is set for principal scope and
/// removed otherwise. When the generation moved, `configurationUpdated` is
/// set, and for principal scope `reconciled` is cleared, the config version
/// is bumped and a `not_required` strategy fact is published.
///
/// Both writes re-read the object and retry on conflicts.
///
/// # Returns
///
/// The resource after the writes and what changed.
///
/// # Errors
///
/// Returns an error if a write fails after conflict retries.
pub async fn update_config_status<K: ManagedResource>(
    ctx: &Context,
    instance: &K,
) -> Result<(K, ConfigStatusUpdate), ReconcileError> {
    let store = ctx.store();
    let namespace = instance.namespace().unwrap_or_default();
    let name = instance.name_any();

    let (updated, outcome) = retry_on_conflict(
        || async {
            let mut current = reload(store, instance).await?;
            let principal = common_status(&current).deployment_scope == SCOPE_PRINCIPAL;

            if let Some(patch) = after_in_sync_patch(&current, principal) {
                debug!(name = %name, principal, "Updating reconcile-after-insync annotation");
                current = apply_patch(store, K::KIND, &namespace, &name, &patch, false).await?;
            }

            let (status, outcome) = config_status_patch(&current);
            if let Some(status) = status {
                let patch = json!({
                    "metadata": { "resourceVersion": current.resource_version() },
                    "status": status,
                });
                current = apply_patch(store, K::KIND, &namespace, &name, &patch, true).await?;
            }
            Ok((current, outcome))
        },
        "update config status",
    )
    .await?;

    if outcome.reconciled_cleared {
        info!(name = %name, "Configuration updated in principal scope");
        ctx.manager.update_config_version();
        ctx.manager
            .set_resource_info(K::STRATEGY_TYPE, "", &name, false, STRATEGY_NOT_REQUIRED);
    }

    Ok((updated, outcome))
}

#[cfg(test)]
#[path = "scope_tests.rs"]
mod scope_tests;
