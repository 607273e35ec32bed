// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Platform networks, address pools and data networks.

use serde::Deserialize;
use serde_json::Value;

use super::{compact, create, get, list, update};
use crate::errors::PlatformError;
use crate::platform::{PatchOp, PlatformClient};

pub const DATA_NETWORK_TYPE_FLAT: &str = "flat";
pub const DATA_NETWORK_TYPE_VLAN: &str = "vlan";
pub const DATA_NETWORK_TYPE_VXLAN: &str = "vxlan";
pub const DEFAULT_MTU: i32 = 1500;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Network {
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub network_type: String,
    #[serde(default)]
    pub dynamic: bool,
    #[serde(default)]
    pub pool_uuid: String,
}

/// Lists platform networks.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn list_networks(client: &dyn PlatformClient) -> Result<Vec<Network>, PlatformError> {
    list(client, "networks", "networks").await
}

/// Deletes a platform network.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn delete_network(client: &dyn PlatformClient, id: &str) -> Result<(), PlatformError> {
    client.delete(&format!("networks/{id}")).await
}

/// Creates a platform network.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn create_network(
    client: &dyn PlatformClient,
    body: &Value,
) -> Result<Network, PlatformError> {
    create(client, "networks", &compact(body.clone())).await
}

/// Patches a platform network.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn update_network(
    client: &dyn PlatformClient,
    id: &str,
    ops: &[PatchOp],
) -> Result<Network, PlatformError> {
    update(client, &format!("networks/{id}"), ops).await
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AddressPool {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub prefix: i32,
    #[serde(rename = "gateway_address", default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub floating_address: Option<String>,
    #[serde(default)]
    pub controller0_address: Option<String>,
    #[serde(default)]
    pub controller1_address: Option<String>,
    #[serde(default)]
    pub order: String,
    #[serde(default)]
    pub ranges: Vec<Vec<String>>,
}

/// Lists address pools.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn list_address_pools(
    client: &dyn PlatformClient,
) -> Result<Vec<AddressPool>, PlatformError> {
    list(client, "addrpools", "addrpools").await
}

/// Creates an address pool.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn create_address_pool(
    client: &dyn PlatformClient,
    body: &Value,
) -> Result<AddressPool, PlatformError> {
    create(client, "addrpools", &compact(body.clone())).await
}

/// Patches an address pool.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn update_address_pool(
    client: &dyn PlatformClient,
    id: &str,
    ops: &[PatchOp],
) -> Result<AddressPool, PlatformError> {
    update(client, &format!("addrpools/{id}"), ops).await
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct DataNetwork {
    #[serde(rename = "uuid")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "network_type", default)]
    pub network_type: String,
    #[serde(default)]
    pub mtu: i32,
    #[serde(default)]
    pub ttl: Option<i32>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub multicast_group: Option<String>,
    #[serde(rename = "port_num", default)]
    pub udp_port: Option<i32>,
}

/// Lists data networks.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn list_data_networks(
    client: &dyn PlatformClient,
) -> Result<Vec<DataNetwork>, PlatformError> {
    list(client, "datanetworks", "datanetworks").await
}

/// Fetches a data network by UUID.
///
/// # Errors
///
/// Returns an error if the call fails, including HTTP 404 for an unknown UUID.
pub async fn get_data_network(
    client: &dyn PlatformClient,
    id: &str,
) -> Result<DataNetwork, PlatformError> {
    get(client, &format!("datanetworks/{id}")).await
}

/// Creates a data network.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn create_data_network(
    client: &dyn PlatformClient,
    body: &Value,
) -> Result<DataNetwork, PlatformError> {
    create(client, "datanetworks", &compact(body.clone())).await
}

/// Patches a data network.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn update_data_network(
    client: &dyn PlatformClient,
    id: &str,
    ops: &[PatchOp],
) -> Result<DataNetwork, PlatformError> {
    update(client, &format!("datanetworks/{id}"), ops).await
}

/// Deletes a data network.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn delete_data_network(
    client: &dyn PlatformClient,
    id: &str,
) -> Result<(), PlatformError> {
    client.delete(&format!("datanetworks/{id}")).await
}
