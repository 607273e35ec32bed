// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Basic host attributes and board management credentials.
//!
//! The profile and the platform host are both reduced to [`HostOpts`], keyed
//! by the platform's attribute names, so that the difference between them is
//! directly usable as a list of patch operations.

use std::collections::BTreeSet;

use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::config::ReconcilerName;
use crate::constants::{HTTP_PREFIX, SECRET_PASSWORD_KEY, SECRET_USERNAME_KEY};
use crate::context::Context;
use crate::crd::{BmInfo, Host, HostProfileSpec};
use crate::delta::{changed_fields, FieldChanges};
use crate::errors::ReconcileError;
use crate::manager::monitors::kubernetes_secret_monitor;
use crate::platform::inventory::hosts::Host as PlatformHost;
use crate::platform::PlatformClient;
use crate::store::{get_secret, secret_string};

/// BMC type reported for hosts without board management.
pub const BM_TYPE_NONE: &str = "none";

/// Attributes the platform accepts while a host is unlocked.
const UNLOCKED_FIELDS: [&str; 4] = ["location", "bm_type", "bm_ip", "bm_username"];

/// Whether changing `field` requires the host to be locked.
#[must_use]
pub fn requires_lock(field: &str) -> bool {
    !UNLOCKED_FIELDS.contains(&field)
}

/// Host attributes under their platform names.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostOpts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subfunctions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console: Option<String>,
    #[serde(rename = "mgmt_mac", default, skip_serializing_if = "Option::is_none")]
    pub boot_mac: Option<String>,
    #[serde(rename = "rootfs_device", default, skip_serializing_if = "Option::is_none")]
    pub root_device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hw_settle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bm_type: Option<String>,
    #[serde(rename = "bm_ip", default, skip_serializing_if = "Option::is_none")]
    pub bm_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bm_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cpu_mhz_configured: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apparmor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock_synchronization: Option<String>,
}

macro_rules! overlay {
    ($top:expr, $base:expr, $($field:ident),+ $(,)?) => {
        HostOpts {
            $($field: $top.$field.or_else(|| $base.$field.clone()),)+
        }
    };
}

impl HostOpts {
    /// Attributes requested by a resolved profile.
    ///
    /// # Arguments
    ///
    /// * `hostname` - Name of the `Host` resource
    /// * `profile` - The host's effective profile
    /// * `manage_bmc` - Whether board management attributes are managed
    /// * `bm_username` - BMC user name read from the credentials secret
    #[must_use]
    pub fn desired(
        hostname: &str,
        profile: &HostProfileSpec,
        manage_bmc: bool,
        bm_username: Option<String>,
    ) -> Self {
        let mut opts = Self {
            hostname: Some(hostname.to_string()),
            personality: profile.personality.clone(),
            subfunctions: profile.sub_functions.as_ref().map(|s| s.join(",")),
            location: profile.location.as_ref().map(|l| json!({ "locn": l })),
            install_output: profile.install_output.clone(),
            console: profile.console.clone(),
            boot_mac: profile.boot_mac.as_ref().map(|m| m.to_lowercase()),
            root_device: profile.root_device.clone(),
            boot_device: profile.boot_device.clone(),
            hw_settle: profile.hw_settle.clone(),
            max_cpu_mhz_configured: profile.max_cpu_mhz_configured.clone(),
            apparmor: profile.app_armor.clone(),
            clock_synchronization: profile.clock_synchronization.clone(),
            ..Self::default()
        };

        if manage_bmc {
            match &profile.board_management {
                Some(bm) => {
                    opts.bm_type.clone_from(&bm.bm_type);
                    opts.bm_address.clone_from(&bm.address);
                    opts.bm_username = bm_username;
                }
                None => opts.bm_type = Some(BM_TYPE_NONE.to_string()),
            }
        }

        opts
    }

    /// Attributes reported by the platform.
    #[must_use]
    pub fn current(host: &PlatformHost) -> Self {
        Self {
            hostname: Some(host.hostname.clone()),
            personality: Some(host.personality.clone()),
            subfunctions: Some(host.subfunctions.clone()),
            location: Some(json!({ "locn": host.location.name.clone().unwrap_or_default() })),
            install_output: Some(host.install_output.clone()),
            console: Some(host.console.clone()),
            boot_mac: Some(host.boot_mac.to_lowercase()),
            root_device: Some(host.root_device.clone()),
            boot_device: Some(host.boot_device.clone()),
            hw_settle: host.hw_settle.clone(),
            bm_type: Some(
                host.bm_type
                    .clone()
                    .unwrap_or_else(|| BM_TYPE_NONE.to_string()),
            ),
            bm_address: host.bm_address.clone(),
            bm_username: host.bm_username.clone(),
            max_cpu_mhz_configured: host.max_cpu_mhz_configured.clone(),
            apparmor: host.apparmor.clone(),
            clock_synchronization: host.clock_synchronization.clone(),
        }
    }

    /// Fills the members left unset by the profile from `defaults`, so that
    /// removing an attribute from a profile restores its original value.
    #[must_use]
    pub fn backed_by(self, defaults: &Self) -> Self {
        overlay!(
            self,
            defaults,
            hostname,
            personality,
            subfunctions,
            location,
            install_output,
            console,
            boot_mac,
            root_device,
            boot_device,
            hw_settle,
            bm_type,
            bm_address,
            bm_username,
            max_cpu_mhz_configured,
            apparmor,
            clock_synchronization,
        )
    }
}

fn same_list(a: Option<&str>, b: Option<&str>) -> bool {
    let split = |s: Option<&str>| -> BTreeSet<String> {
        s.unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect()
    };
    split(a) == split(b)
}

/// The attributes of `desired` that differ from `current`.
///
/// Subfunctions are compared as a set.
///
/// # Errors
///
/// Returns an error if either side cannot be serialized.
pub fn attribute_changes(
    desired: &HostOpts,
    current: &HostOpts,
) -> Result<FieldChanges, ReconcileError> {
    let mut changes = changed_fields(desired, current)?;
    if same_list(desired.subfunctions.as_deref(), current.subfunctions.as_deref()) {
        changes.retain(|field| field != "subfunctions");
    }
    Ok(changes)
}

/// BMC credentials read from a Secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BmCredentials {
    pub username: String,
    pub password: String,
}

/// Reads the BMC credentials referenced by a profile.
///
/// Returns `None` when the profile has no password credentials.
///
/// # Errors
///
/// Starts a monitor and returns [`ReconcileError::WaitForMonitor`] while the
/// secret does not exist, and returns [`ReconcileError::UserData`] when it
/// lacks a required key.
pub async fn bm_credentials(
    ctx: &Context,
    instance: &Host,
    bm: Option<&BmInfo>,
) -> Result<Option<BmCredentials>, ReconcileError> {
    let Some(secret_name) = bm
        .and_then(|bm| bm.credentials.as_ref())
        .and_then(|c| c.password.as_ref())
        .map(|p| p.secret.as_str())
    else {
        return Ok(None);
    };

    let namespace = instance.namespace().unwrap_or_default();
    let Some(secret) = get_secret(ctx.store(), &namespace, secret_name).await? else {
        return Err(ctx.manager.start_monitor(
            kubernetes_secret_monitor(instance, secret_name),
            format!("waiting for BM credentials secret: {secret_name:?}"),
        ));
    };

    let read = |key: &str| {
        secret_string(&secret, key).ok_or_else(|| {
            ReconcileError::UserData(format!("missing {key:?} key within BM credential secret"))
        })
    };

    Ok(Some(BmCredentials {
        username: read(SECRET_USERNAME_KEY)?,
        password: read(SECRET_PASSWORD_KEY)?,
    }))
}

/// Refuses to send a BMC password over plain HTTP unless allowed.
///
/// # Errors
///
/// Returns [`ReconcileError::HttpsClientRequired`] when the endpoint is HTTP
/// and the `host.bmc` reconciler requires HTTPS.
pub fn check_password_transport(
    ctx: &Context,
    client: &dyn PlatformClient,
) -> Result<(), ReconcileError> {
    if !client.endpoint().starts_with(HTTP_PREFIX) {
        return Ok(());
    }
    if ctx.config.https_required(ReconcilerName::Bmc) {
        return Err(ReconcileError::HttpsClientRequired(
            "it is unsafe to configure BM credentials thru a non HTTPS URL".to_string(),
        ));
    }
    info!("allowing BMC configuration over HTTP connection");
    Ok(())
}

#[cfg(test)]
#[path = "attributes_tests.rs"]
mod attributes_tests;
