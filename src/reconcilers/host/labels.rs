// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Host labels.

use std::collections::BTreeMap;

use tracing::info;

use crate::context::Context;
use crate::crd::Host;
use crate::delta::delta_string;
use crate::errors::ReconcileError;
use crate::events::reasons;
use crate::platform::inventory::hosts::{self, Label};
use crate::platform::PlatformClient;

/// Labels to add and labels to remove.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelChanges {
    /// Missing or changed labels
    pub added: Vec<(String, String)>,
    /// Stale or changed labels
    pub removed: Vec<Label>,
}

impl LabelChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compares the platform labels with the desired ones.
///
/// A label whose value changed is removed and added again.
#[must_use]
pub fn label_changes(current: &[Label], desired: &BTreeMap<String, String>) -> LabelChanges {
    let removed = current
        .iter()
        .filter(|l| desired.get(&l.key) != Some(&l.value))
        .cloned()
        .collect();
    let added = desired
        .iter()
        .filter(|(k, v)| !current.iter().any(|l| &l.key == *k && &l.value == *v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    LabelChanges { added, removed }
}

/// Renders label changes as delta lines under `labels.`.
///
/// # Errors
///
/// Returns an error if the labels cannot be serialized.
pub fn label_delta(
    current: &[Label],
    desired: &BTreeMap<String, String>,
) -> Result<String, ReconcileError> {
    let observed: BTreeMap<&str, &str> = current
        .iter()
        .map(|l| (l.key.as_str(), l.value.as_str()))
        .collect();
    Ok(delta_string(
        &serde_json::json!({ "labels": desired }),
        &serde_json::json!({ "labels": observed }),
    )?)
}

/// Applies label changes to a platform host.
///
/// # Errors
///
/// Returns an error if a label cannot be removed or created.
pub async fn apply_label_changes(
    ctx: &Context,
    client: &dyn PlatformClient,
    instance: &Host,
    host_id: &str,
    changes: &LabelChanges,
) -> Result<(), ReconcileError> {
    for label in &changes.removed {
        info!(host = %host_id, key = %label.key, "removing label");
        hosts::delete_label(client, &label.id).await?;
        ctx.normal_event(instance, reasons::UPDATED, format!("label {:?} removed", label.key))
            .await;
    }

    if !changes.added.is_empty() {
        let keys: Vec<&str> = changes.added.iter().map(|(k, _)| k.as_str()).collect();
        info!(host = %host_id, labels = ?keys, "adding labels");
        hosts::create_labels(client, host_id, &changes.added).await?;
        ctx.normal_event(
            instance,
            reasons::UPDATED,
            format!("labels {:?} added", keys.join(",")),
        )
        .await;
    }

    Ok(())
}
