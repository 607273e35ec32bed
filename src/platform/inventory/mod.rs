// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Typed operations on the StarlingX inventory (`sysinv`) API.
//!
//! Collections are returned wrapped in an object keyed by the collection name
//! (`{"datanetworks": [...]}`); single objects are returned bare. Updates are
//! JSON-Patch documents built from [`PatchOp`](super::PatchOp).

pub mod hosts;
pub mod networks;
pub mod ptp;
pub mod system;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{decode, PatchOp, PlatformClient};
use crate::errors::PlatformError;

/// Lists a collection and extracts the array stored under `key`.
pub(crate) async fn list<T: DeserializeOwned>(
    client: &dyn PlatformClient,
    path: &str,
    key: &str,
) -> Result<Vec<T>, PlatformError> {
    let mut body = client.get(path).await?;
    let items = body.get_mut(key).map(Value::take).unwrap_or(Value::Null);
    if items.is_null() {
        return Ok(Vec::new());
    }
    decode(client, path, items)
}

pub(crate) async fn get<T: DeserializeOwned>(
    client: &dyn PlatformClient,
    path: &str,
) -> Result<T, PlatformError> {
    let body = client.get(path).await?;
    decode(client, path, body)
}

pub(crate) async fn create<T: DeserializeOwned>(
    client: &dyn PlatformClient,
    path: &str,
    body: &Value,
) -> Result<T, PlatformError> {
    let response = client.post(path, body).await?;
    decode(client, path, response)
}

pub(crate) async fn update<T: DeserializeOwned>(
    client: &dyn PlatformClient,
    path: &str,
    ops: &[PatchOp],
) -> Result<T, PlatformError> {
    let response = client.patch(path, ops).await?;
    decode(client, path, response)
}

/// Drops `null` members so optional fields are omitted from create requests.
#[must_use]
pub(crate) fn compact(mut body: Value) -> Value {
    if let Some(map) = body.as_object_mut() {
        map.retain(|_, v| !v.is_null());
    }
    body
}
