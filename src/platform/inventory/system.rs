// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! System-level inventory resources: the system itself, DNS, NTP, PTP, DRBD,
//! service parameters, storage backends, controller filesystems, certificates
//! and the license.

use serde::Deserialize;
use serde_json::{json, Value};

use super::{compact, create, get, list, update};
use crate::errors::PlatformError;
use crate::platform::{PatchOp, PlatformClient, Upload};

/// Capabilities reported on the system object.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SystemCapabilities {
    #[serde(default)]
    pub sdn_enabled: bool,
    #[serde(default)]
    pub shared_services: Option<String>,
    #[serde(default)]
    pub https_enabled: bool,
    #[serde(default)]
    pub vswitch_type: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct System {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub latitude: String,
    #[serde(default)]
    pub longitude: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub system_type: String,
    #[serde(default)]
    pub system_mode: String,
    #[serde(default)]
    pub software_version: String,
    #[serde(default)]
    pub capabilities: SystemCapabilities,
}

/// Returns the one system managed by the endpoint.
///
/// # Errors
///
/// Returns an error if the call fails or no system is reported.
pub async fn get_default(client: &dyn PlatformClient) -> Result<System, PlatformError> {
    let systems: Vec<System> = list(client, "isystems", "isystems").await?;
    systems
        .into_iter()
        .next()
        .ok_or_else(|| PlatformError::Http {
            status: 404,
            method: "GET".to_string(),
            url: format!("{}/isystems", client.endpoint()),
            message: "no system found".to_string(),
        })
}

/// Patches system attributes.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn update_system(
    client: &dyn PlatformClient,
    id: &str,
    ops: &[PatchOp],
) -> Result<System, PlatformError> {
    update(client, &format!("isystems/{id}"), ops).await
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Dns {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(default)]
    pub nameservers: String,
}

/// Returns the system DNS configuration.
///
/// # Errors
///
/// Returns an error if the call fails or nothing is configured.
pub async fn get_dns(client: &dyn PlatformClient) -> Result<Option<Dns>, PlatformError> {
    Ok(list::<Dns>(client, "idns", "idnss").await?.into_iter().next())
}

/// Replaces the DNS server list (comma separated, `"NC"` for none).
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn update_dns(
    client: &dyn PlatformClient,
    id: &str,
    nameservers: &str,
) -> Result<Dns, PlatformError> {
    update(
        client,
        &format!("idns/{id}"),
        &[
            PatchOp::replace("nameservers", nameservers),
            PatchOp::replace("action", "apply"),
        ],
    )
    .await
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Ntp {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(default)]
    pub ntpservers: String,
}

/// Returns the system NTP configuration.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn get_ntp(client: &dyn PlatformClient) -> Result<Option<Ntp>, PlatformError> {
    Ok(list::<Ntp>(client, "intp", "intps").await?.into_iter().next())
}

/// Replaces the NTP server list (comma separated, `"NC"` for none).
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn update_ntp(
    client: &dyn PlatformClient,
    id: &str,
    servers: &str,
) -> Result<Ntp, PlatformError> {
    update(
        client,
        &format!("intp/{id}"),
        &[
            PatchOp::replace("ntpservers", servers),
            PatchOp::replace("action", "apply"),
        ],
    )
    .await
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Ptp {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub transport: String,
    #[serde(default)]
    pub mechanism: String,
}

/// Returns the system PTP configuration.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn get_ptp(client: &dyn PlatformClient) -> Result<Option<Ptp>, PlatformError> {
    Ok(list::<Ptp>(client, "ptp", "ptps").await?.into_iter().next())
}

/// Patches the system PTP configuration.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn update_ptp(
    client: &dyn PlatformClient,
    id: &str,
    ops: &[PatchOp],
) -> Result<Ptp, PlatformError> {
    update(client, &format!("ptp/{id}"), ops).await
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Drbd {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(default)]
    pub link_util: i32,
}

/// Returns the DRBD configuration.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn get_drbd(client: &dyn PlatformClient) -> Result<Option<Drbd>, PlatformError> {
    Ok(list::<Drbd>(client, "drbdconfig", "drbdconfigs")
        .await?
        .into_iter()
        .next())
}

/// Sets the DRBD link utilization.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn update_drbd(
    client: &dyn PlatformClient,
    id: &str,
    link_util: i32,
) -> Result<Drbd, PlatformError> {
    update(
        client,
        &format!("drbdconfig/{id}"),
        &[PatchOp::replace("link_util", link_util)],
    )
    .await
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ServiceParameter {
    #[serde(rename = "uuid")]
    pub id: String,
    pub service: String,
    pub section: String,
    #[serde(rename = "name")]
    pub param_name: String,
    #[serde(rename = "value", default)]
    pub param_value: String,
    #[serde(default)]
    pub personality: Option<String>,
    #[serde(default)]
    pub resource: Option<String>,
}

/// Lists service parameters.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn list_service_parameters(
    client: &dyn PlatformClient,
) -> Result<Vec<ServiceParameter>, PlatformError> {
    list(client, "service_parameter", "parameters").await
}

/// Creates a service parameter.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn create_service_parameter(
    client: &dyn PlatformClient,
    service: &str,
    section: &str,
    name: &str,
    value: &str,
    personality: Option<&str>,
    resource: Option<&str>,
) -> Result<Value, PlatformError> {
    let body = compact(json!({
        "service": service,
        "section": section,
        "parameters": { (name): value },
        "personality": personality,
        "resource": resource,
    }));
    client.post("service_parameter", &body).await
}

/// Patches a service parameter's value, personality or resource.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn update_service_parameter(
    client: &dyn PlatformClient,
    id: &str,
    ops: &[PatchOp],
) -> Result<ServiceParameter, PlatformError> {
    update(client, &format!("service_parameter/{id}"), ops).await
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct StorageBackend {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(default)]
    pub backend: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub services: Option<String>,
}

/// Lists storage backends.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn list_storage_backends(
    client: &dyn PlatformClient,
) -> Result<Vec<StorageBackend>, PlatformError> {
    list(client, "storage_backend", "storage_backends").await
}

/// Creates a storage backend.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn create_storage_backend(
    client: &dyn PlatformClient,
    body: &Value,
) -> Result<StorageBackend, PlatformError> {
    create(client, "storage_backend", &compact(body.clone())).await
}

/// Controller filesystem state while a DRBD resize is running.
pub const FS_RESIZE_IN_PROGRESS: &str = "drbd_fs_resizing_in_progress";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ControllerFileSystem {
    #[serde(rename = "uuid")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub size: i32,
    #[serde(default)]
    pub state: String,
}

/// Lists controller filesystems.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn list_controller_filesystems(
    client: &dyn PlatformClient,
) -> Result<Vec<ControllerFileSystem>, PlatformError> {
    list(client, "controller_fs", "controller_fs").await
}

/// Resizes several controller filesystems at once.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn resize_controller_filesystems(
    client: &dyn PlatformClient,
    system_id: &str,
    sizes: &[(String, i32)],
) -> Result<(), PlatformError> {
    let ops: Vec<Vec<PatchOp>> = sizes
        .iter()
        .map(|(name, size)| {
            vec![
                PatchOp::replace("name", name.as_str()),
                PatchOp::replace("size", *size),
            ]
        })
        .collect();
    let body = serde_json::to_value(ops).map_err(|e| PlatformError::Decode {
        url: client.endpoint(),
        message: e.to_string(),
    })?;
    client
        .post(&format!("isystems/{system_id}/controller_fs/update_many"), &body)
        .await
        .map(|_| ())
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Certificate {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(rename = "certtype", default)]
    pub cert_type: String,
    #[serde(default)]
    pub signature: String,
}

/// Lists installed certificates.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn list_certificates(
    client: &dyn PlatformClient,
) -> Result<Vec<Certificate>, PlatformError> {
    list(client, "certificate", "certificates").await
}

/// Installs a PEM bundle of the given certificate mode.
///
/// # Errors
///
/// Returns an error if the call fails or the platform reports an install error.
pub async fn install_certificate(
    client: &dyn PlatformClient,
    mode: &str,
    pem: Vec<u8>,
) -> Result<(), PlatformError> {
    let path = "certificate/certificate_install";
    let response = client
        .upload(
            path,
            Upload {
                file_name: format!("{mode}.pem"),
                contents: pem,
                fields: vec![("mode".to_string(), mode.to_string())],
            },
        )
        .await?;
    install_result(client, path, &response)
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct License {
    #[serde(default)]
    pub content: String,
}

/// Returns the installed license.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn get_license(client: &dyn PlatformClient) -> Result<License, PlatformError> {
    get(client, "license/get_license_file").await
}

/// Installs a license file.
///
/// # Errors
///
/// Returns an error if the call fails or the platform reports an install error.
pub async fn install_license(
    client: &dyn PlatformClient,
    contents: Vec<u8>,
) -> Result<(), PlatformError> {
    let path = "license/install_license";
    let response = client
        .upload(
            path,
            Upload {
                file_name: "license.lic".to_string(),
                contents,
                fields: Vec::new(),
            },
        )
        .await?;
    install_result(client, path, &response)
}

/// Install endpoints answer 200 with a non-empty `error` member on failure.
fn install_result(
    client: &dyn PlatformClient,
    path: &str,
    response: &Value,
) -> Result<(), PlatformError> {
    match response.get("error").and_then(Value::as_str) {
        Some(message) if !message.is_empty() => Err(PlatformError::Http {
            status: 400,
            method: "POST".to_string(),
            url: format!("{}/{path}", client.endpoint()),
            message: message.to_string(),
        }),
        _ => Ok(()),
    }
}
