// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! PTP instances and PTP interfaces.
//!
//! Parameters are `name=value` strings attached and detached one at a time
//! with `add`/`remove` patches on `/ptp_parameters/-`.

use serde::Deserialize;
use serde_json::json;

use super::{create, get, list, update};
use crate::errors::PlatformError;
use crate::platform::{PatchOp, PlatformClient};

const PARAMETER_PATH: &str = "ptp_parameters/-";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PtpInstance {
    pub uuid: String,
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub hostnames: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PtpInterface {
    pub uuid: String,
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub ptp_instance_uuid: String,
    #[serde(default)]
    pub ptp_instance_name: String,
    #[serde(default)]
    pub hostnames: Vec<String>,
    #[serde(default)]
    pub interface_names: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<String>,
}

/// Builds the patch attaching and detaching parameters.
#[must_use]
pub fn parameter_ops(added: &[String], removed: &[String]) -> Vec<PatchOp> {
    added
        .iter()
        .map(|p| PatchOp::add(PARAMETER_PATH, p.as_str()))
        .chain(
            removed
                .iter()
                .map(|p| PatchOp::remove(PARAMETER_PATH, p.as_str())),
        )
        .collect()
}

/// Lists PTP instances.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn list_instances(
    client: &dyn PlatformClient,
) -> Result<Vec<PtpInstance>, PlatformError> {
    list(client, "ptp_instances", "ptp_instances").await
}

/// Fetches a PTP instance by UUID.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn get_instance(
    client: &dyn PlatformClient,
    uuid: &str,
) -> Result<PtpInstance, PlatformError> {
    get(client, &format!("ptp_instances/{uuid}")).await
}

/// Creates a PTP instance.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn create_instance(
    client: &dyn PlatformClient,
    name: &str,
    service: &str,
) -> Result<PtpInstance, PlatformError> {
    create(
        client,
        "ptp_instances",
        &json!({ "name": name, "service": service }),
    )
    .await
}

/// Attaches and detaches parameters on a PTP instance.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn update_instance_parameters(
    client: &dyn PlatformClient,
    uuid: &str,
    added: &[String],
    removed: &[String],
) -> Result<PtpInstance, PlatformError> {
    update(
        client,
        &format!("ptp_instances/{uuid}"),
        &parameter_ops(added, removed),
    )
    .await
}

/// Deletes a PTP instance.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn delete_instance(client: &dyn PlatformClient, uuid: &str) -> Result<(), PlatformError> {
    client.delete(&format!("ptp_instances/{uuid}")).await
}

/// Lists PTP interfaces.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn list_interfaces(
    client: &dyn PlatformClient,
) -> Result<Vec<PtpInterface>, PlatformError> {
    list(client, "ptp_interfaces", "ptp_interfaces").await
}

/// Fetches a PTP interface by UUID.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn get_interface(
    client: &dyn PlatformClient,
    uuid: &str,
) -> Result<PtpInterface, PlatformError> {
    get(client, &format!("ptp_interfaces/{uuid}")).await
}

/// Creates a PTP interface bound to an instance.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn create_interface(
    client: &dyn PlatformClient,
    name: &str,
    ptp_instance_uuid: &str,
) -> Result<PtpInterface, PlatformError> {
    create(
        client,
        "ptp_interfaces",
        &json!({ "name": name, "ptp_instance_uuid": ptp_instance_uuid }),
    )
    .await
}

/// Attaches and detaches parameters on a PTP interface.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn update_interface_parameters(
    client: &dyn PlatformClient,
    uuid: &str,
    added: &[String],
    removed: &[String],
) -> Result<PtpInterface, PlatformError> {
    update(
        client,
        &format!("ptp_interfaces/{uuid}"),
        &parameter_ops(added, removed),
    )
    .await
}

/// Deletes a PTP interface.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn delete_interface(
    client: &dyn PlatformClient,
    uuid: &str,
) -> Result<(), PlatformError> {
    client.delete(&format!("ptp_interfaces/{uuid}")).await
}
