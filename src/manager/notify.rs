// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::Manager;
use crate::constants::NOTIFICATIONS_ANNOTATION;
use crate::errors::StoreError;
use crate::metrics;
use crate::reconcilers::retry::retry_on_conflict;
use crate::store::ResourceKind;

/// Returns the notification counter value following `current`.
///
/// A missing annotation starts the count at 1. A value that is not a number
/// is logged and treated as 0, so the count restarts at 1.
#[must_use]
pub fn next_count(current: Option<&str>) -> String {
    let count = match current {
        None | Some("") => 0,
        Some(value) => value.parse::<u64>().unwrap_or_else(|_| {
            warn!(value, "Unexpected notification annotation value, restarting count");
            0
        }),
    };
    (count + 1).to_string()
}

fn object_name(object: &Value) -> Option<&str> {
    object["metadata"]["name"].as_str()
}

/// Merge patch bumping the notification counter of `object`.
///
/// The patch carries the object's resource version so that a concurrent
/// writer makes it fail with a conflict instead of losing an increment.
fn bump_patch(object: &Value) -> Value {
    let current = object["metadata"]["annotations"][NOTIFICATIONS_ANNOTATION].as_str();
    json!({
        "metadata": {
            "resourceVersion": object["metadata"]["resourceVersion"],
            "annotations": { NOTIFICATIONS_ANNOTATION: next_count(current) },
        }
    })
}

impl Manager {
    /// Bumps the notification counter of a single object.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the object no longer exists, or the
    /// write error once conflict retries are exhausted.
    pub async fn notify_resource(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), StoreError> {
        retry_on_conflict(
            || async {
                let object = self
                    .store
                    .get(kind, namespace, name)
                    .await?
                    .ok_or_else(|| StoreError::NotFound {
                        kind: kind.to_string(),
                        namespace: namespace.to_string(),
                        name: name.to_string(),
                    })?;
                self.store
                    .patch(kind, namespace, name, &bump_patch(&object))
                    .await
            },
            "notify resource",
        )
        .await?;

        metrics::record_notification(kind.as_str());
        debug!(kind = %kind, namespace, name, "Controller has been notified");
        Ok(())
    }

    async fn notify_kind(&self, kind: ResourceKind, namespace: &str) -> Result<(), StoreError> {
        for object in self.store.list(kind, namespace).await? {
            let Some(name) = object_name(&object) else {
                continue;
            };
            self.notify_resource(kind, namespace, name).await?;
            info!(kind = %kind, namespace, name, "Controller has been notified");
        }
        Ok(())
    }

    /// Wakes every object that depends on the namespace's System.
    ///
    /// # Errors
    ///
    /// Returns the first list or write error.
    pub async fn notify_system_dependencies(&self, namespace: &str) -> Result<(), StoreError> {
        for kind in ResourceKind::DEPENDENTS {
            self.notify_kind(kind, namespace).await?;
        }
        Ok(())
    }

    /// Wakes the namespace's System reconciler.
    ///
    /// # Errors
    ///
    /// Returns the first list or write error.
    pub async fn notify_system_controller(&self, namespace: &str) -> Result<(), StoreError> {
        self.notify_kind(ResourceKind::System, namespace).await
    }

    /// Records on every System in the namespace whether a strategy is being applied.
    ///
    /// # Errors
    ///
    /// Returns the first list or write error.
    pub async fn set_strategy_applied(
        &self,
        namespace: &str,
        applied: bool,
    ) -> Result<(), StoreError> {
        let patch = json!({ "status": { "strategyApplied": applied } });
        for object in self.store.list(ResourceKind::System, namespace).await? {
            let Some(name) = object_name(&object) else {
                continue;
            };
            self.store
                .patch_status(ResourceKind::System, namespace, name, &patch)
                .await?;
            info!(namespace, name, applied, "Updated strategy applied flag on system");
        }
        Ok(())
    }
}
