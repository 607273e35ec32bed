// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hosts and host labels.

use serde::Deserialize;
use serde_json::{json, Value};

use super::{compact, create, get, list, update};
use crate::errors::PlatformError;
use crate::platform::{PatchOp, PlatformClient};

pub const ACTION_LOCK: &str = "lock";
pub const ACTION_UNLOCK: &str = "unlock";
pub const ACTION_REINSTALL: &str = "reinstall";

pub const CONTROLLER_0: &str = "controller-0";
pub const CONTROLLER_1: &str = "controller-1";
pub const ACTIVE_CONTROLLER: &str = "Controller-Active";

pub const ADMIN_LOCKED: &str = "locked";
pub const ADMIN_UNLOCKED: &str = "unlocked";
pub const OPER_ENABLED: &str = "enabled";
pub const OPER_DISABLED: &str = "disabled";
pub const AVAIL_AVAILABLE: &str = "available";
pub const AVAIL_ONLINE: &str = "online";
pub const AVAIL_OFFLINE: &str = "offline";
pub const AVAIL_DEGRADED: &str = "degraded";

pub const PERSONALITY_CONTROLLER: &str = "controller";
pub const PERSONALITY_WORKER: &str = "worker";
pub const PERSONALITY_STORAGE: &str = "storage";

/// Extra state reported in the host `capabilities` object.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct HostCapabilities {
    #[serde(rename = "Personality", default)]
    pub personality: Option<String>,
    #[serde(default)]
    pub stor_function: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Location {
    #[serde(rename = "locn", default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Host {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub subfunctions: String,
    #[serde(default)]
    pub capabilities: HostCapabilities,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub install_output: String,
    #[serde(default)]
    pub console: String,
    #[serde(rename = "mgmt_mac", default)]
    pub boot_mac: String,
    #[serde(rename = "rootfs_device", default)]
    pub root_device: String,
    #[serde(default)]
    pub boot_device: String,
    #[serde(default)]
    pub bm_type: Option<String>,
    #[serde(rename = "bm_ip", default)]
    pub bm_address: Option<String>,
    #[serde(default)]
    pub bm_username: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub asset_tag: Option<String>,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(rename = "administrative", default)]
    pub administrative_state: String,
    #[serde(rename = "operational", default)]
    pub operational_status: String,
    #[serde(rename = "availability", default)]
    pub availability_status: String,
    #[serde(default)]
    pub clock_synchronization: Option<String>,
    #[serde(rename = "max_cpu_mhz_configured", default)]
    pub max_cpu_mhz_configured: Option<String>,
    #[serde(default)]
    pub apparmor: Option<String>,
    #[serde(default)]
    pub hw_settle: Option<String>,
}

impl Host {
    /// Returns true when no operation is in progress on the host.
    #[must_use]
    pub fn idle(&self) -> bool {
        self.task.as_deref().is_none_or(str::is_empty)
    }

    #[must_use]
    pub fn is_locked_disabled(&self) -> bool {
        self.administrative_state == ADMIN_LOCKED && self.operational_status == OPER_DISABLED
    }

    #[must_use]
    pub fn is_unlocked_enabled(&self) -> bool {
        self.administrative_state == ADMIN_UNLOCKED && self.operational_status == OPER_ENABLED
    }

    #[must_use]
    pub fn is_unlocked_available(&self) -> bool {
        self.is_unlocked_enabled()
            && (self.availability_status == AVAIL_AVAILABLE
                || self.availability_status == AVAIL_DEGRADED)
    }

    /// Returns true for the controller currently running the platform services.
    #[must_use]
    pub fn is_active_controller(&self) -> bool {
        self.capabilities.personality.as_deref() == Some(ACTIVE_CONTROLLER)
    }

    /// Returns true when the host state is not changing.
    #[must_use]
    pub fn stable(&self) -> bool {
        self.idle()
            && (self.is_locked_disabled()
                || self.is_unlocked_available()
                || self.availability_status == AVAIL_ONLINE
                || self.availability_status == AVAIL_OFFLINE)
    }
}

/// Returns true when controller-0 or controller-1 is unlocked and enabled,
/// which the platform requires before other hosts can be provisioned.
#[must_use]
pub fn provisioning_allowed(hosts: &[Host]) -> bool {
    hosts.iter().any(|h| {
        (h.hostname == CONTROLLER_0 || h.hostname == CONTROLLER_1) && h.is_unlocked_enabled()
    })
}

/// Returns true when at least `required` controllers are unlocked and enabled.
#[must_use]
pub fn controllers_enabled(hosts: &[Host], required: usize) -> bool {
    hosts
        .iter()
        .filter(|h| h.personality == PERSONALITY_CONTROLLER && h.is_unlocked_enabled())
        .count()
        >= required
}

/// Returns true when at least `required` controllers are unlocked, enabled and available.
#[must_use]
pub fn controllers_available(hosts: &[Host], required: usize) -> bool {
    hosts
        .iter()
        .filter(|h| {
            h.personality == PERSONALITY_CONTROLLER
                && h.is_unlocked_enabled()
                && h.availability_status == AVAIL_AVAILABLE
        })
        .count()
        >= required
}

/// Lists hosts.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn list_hosts(client: &dyn PlatformClient) -> Result<Vec<Host>, PlatformError> {
    list(client, "ihosts", "ihosts").await
}

/// Fetches one host.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn get_host(client: &dyn PlatformClient, id: &str) -> Result<Host, PlatformError> {
    get(client, &format!("ihosts/{id}")).await
}

/// Returns the host currently acting as the active controller.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn active_controller(client: &dyn PlatformClient) -> Result<Option<Host>, PlatformError> {
    Ok(list_hosts(client)
        .await?
        .into_iter()
        .find(Host::is_active_controller))
}

/// Provisions a host.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn create_host(client: &dyn PlatformClient, body: &Value) -> Result<Host, PlatformError> {
    create(client, "ihosts", &compact(body.clone())).await
}

/// Patches host attributes.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn update_host(
    client: &dyn PlatformClient,
    id: &str,
    ops: &[PatchOp],
) -> Result<Host, PlatformError> {
    update(client, &format!("ihosts/{id}"), ops).await
}

/// Issues an administrative action such as `lock` or `unlock`.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn host_action(
    client: &dyn PlatformClient,
    id: &str,
    action: &str,
) -> Result<Host, PlatformError> {
    update_host(client, id, &[PatchOp::replace("action", action)]).await
}

/// Deletes a host.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn delete_host(client: &dyn PlatformClient, id: &str) -> Result<(), PlatformError> {
    client.delete(&format!("ihosts/{id}")).await
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Label {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(rename = "label_key")]
    pub key: String,
    #[serde(rename = "label_value", default)]
    pub value: String,
}

/// Lists the labels of a host.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn list_labels(
    client: &dyn PlatformClient,
    host_id: &str,
) -> Result<Vec<Label>, PlatformError> {
    list(client, &format!("ihosts/{host_id}/labels"), "labels").await
}

/// Assigns labels to a host.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn create_labels(
    client: &dyn PlatformClient,
    host_id: &str,
    labels: &[(String, String)],
) -> Result<(), PlatformError> {
    let body: serde_json::Map<String, Value> = labels
        .iter()
        .map(|(k, v)| (k.clone(), json!(v)))
        .collect();
    client
        .post(&format!("labels/{host_id}"), &Value::Object(body))
        .await
        .map(|_| ())
}

/// Removes one label.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn delete_label(client: &dyn PlatformClient, id: &str) -> Result<(), PlatformError> {
    client.delete(&format!("labels/{id}")).await
}
