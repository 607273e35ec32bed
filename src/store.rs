// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Access to Kubernetes objects.
//!
//! Reconcilers, monitors and the notification bus read and write objects
//! through the [`ObjectStore`] trait. Objects cross the trait as JSON values so
//! one implementation covers every kind; typed access is layered on top with
//! [`fetch`], [`fetch_all`] and [`apply_patch`].
//!
//! Writes are JSON merge patches. Including `metadata.resourceVersion` in a
//! patch makes the API server reject it with a conflict when the object
//! changed in the meantime.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::{Api, ApiResource, DynamicObject, ListParams, Patch, PatchParams};
use kube::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::constants::{
    KIND_ADDRESS_POOL, KIND_DATA_NETWORK, KIND_HOST, KIND_HOST_PROFILE, KIND_PLATFORM_NETWORK,
    KIND_PTP_INSTANCE, KIND_PTP_INTERFACE, KIND_SYSTEM,
};
use crate::crd::{
    AddressPool, DataNetwork, Host, HostProfile, PlatformNetwork, PtpInstance, PtpInterface,
    System,
};
use crate::errors::StoreError;

/// Kinds of objects the operator reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    System,
    Host,
    HostProfile,
    PlatformNetwork,
    AddressPool,
    DataNetwork,
    PtpInstance,
    PtpInterface,
    Secret,
    ConfigMap,
}

impl ResourceKind {
    /// Kinds woken by a broadcast notification once the System is ready.
    pub const DEPENDENTS: [ResourceKind; 5] = [
        ResourceKind::Host,
        ResourceKind::PlatformNetwork,
        ResourceKind::DataNetwork,
        ResourceKind::PtpInstance,
        ResourceKind::PtpInterface,
    ];

    /// Kubernetes kind name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => KIND_SYSTEM,
            Self::Host => KIND_HOST,
            Self::HostProfile => KIND_HOST_PROFILE,
            Self::PlatformNetwork => KIND_PLATFORM_NETWORK,
            Self::AddressPool => KIND_ADDRESS_POOL,
            Self::DataNetwork => KIND_DATA_NETWORK,
            Self::PtpInstance => KIND_PTP_INSTANCE,
            Self::PtpInterface => KIND_PTP_INTERFACE,
            Self::Secret => "Secret",
            Self::ConfigMap => "ConfigMap",
        }
    }

    /// API discovery information for the kind.
    #[must_use]
    pub fn api_resource(self) -> ApiResource {
        match self {
            Self::System => ApiResource::erase::<System>(&()),
            Self::Host => ApiResource::erase::<Host>(&()),
            Self::HostProfile => ApiResource::erase::<HostProfile>(&()),
            Self::PlatformNetwork => ApiResource::erase::<PlatformNetwork>(&()),
            Self::AddressPool => ApiResource::erase::<AddressPool>(&()),
            Self::DataNetwork => ApiResource::erase::<DataNetwork>(&()),
            Self::PtpInstance => ApiResource::erase::<PtpInstance>(&()),
            Self::PtpInterface => ApiResource::erase::<PtpInterface>(&()),
            Self::Secret => ApiResource::erase::<Secret>(&()),
            Self::ConfigMap => ApiResource::erase::<ConfigMap>(&()),
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read and write access to namespaced Kubernetes objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns the object, or `None` if it does not exist.
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Value>, StoreError>;

    /// Lists every object of a kind in a namespace.
    async fn list(&self, kind: ResourceKind, namespace: &str) -> Result<Vec<Value>, StoreError>;

    /// Applies a merge patch to the object (metadata and spec) and returns the result.
    async fn patch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<Value, StoreError>;

    /// Applies a merge patch to the status subresource and returns the result.
    async fn patch_status(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<Value, StoreError>;
}

/// [`ObjectStore`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeObjectStore {
    client: Client,
}

impl KubeObjectStore {
    /// Create a store using the given client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, kind: ResourceKind, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &kind.api_resource())
    }
}

fn not_found(kind: ResourceKind, namespace: &str, name: &str) -> StoreError {
    StoreError::NotFound {
        kind: kind.to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

fn with_context(err: kube::Error, kind: ResourceKind, namespace: &str, name: &str) -> StoreError {
    match StoreError::from(err) {
        StoreError::NotFound { .. } => not_found(kind, namespace, name),
        other => other,
    }
}

#[async_trait]
impl ObjectStore for KubeObjectStore {
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Value>, StoreError> {
        let object = self
            .api(kind, namespace)
            .get_opt(name)
            .await
            .map_err(|e| with_context(e, kind, namespace, name))?;
        object
            .map(|o| serde_json::to_value(o).map_err(StoreError::from))
            .transpose()
    }

    async fn list(&self, kind: ResourceKind, namespace: &str) -> Result<Vec<Value>, StoreError> {
        let list = self
            .api(kind, namespace)
            .list(&ListParams::default())
            .await
            .map_err(StoreError::from)?;
        list.items
            .into_iter()
            .map(|o| serde_json::to_value(o).map_err(StoreError::from))
            .collect()
    }

    async fn patch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<Value, StoreError> {
        debug!(kind = %kind, namespace, name, "Patching object");
        let object = self
            .api(kind, namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .map_err(|e| with_context(e, kind, namespace, name))?;
        Ok(serde_json::to_value(object)?)
    }

    async fn patch_status(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<Value, StoreError> {
        debug!(kind = %kind, namespace, name, "Patching object status");
        let object = self
            .api(kind, namespace)
            .patch_status(name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .map_err(|e| with_context(e, kind, namespace, name))?;
        Ok(serde_json::to_value(object)?)
    }
}

// ============================================================================
// Typed helpers
// ============================================================================

/// Fetches and decodes an object.
///
/// # Errors
///
/// Returns an error if the read fails or the object cannot be decoded.
pub async fn fetch<T: DeserializeOwned>(
    store: &dyn ObjectStore,
    kind: ResourceKind,
    namespace: &str,
    name: &str,
) -> Result<Option<T>, StoreError> {
    store
        .get(kind, namespace, name)
        .await?
        .map(|v| serde_json::from_value(v).map_err(StoreError::from))
        .transpose()
}

/// Lists and decodes every object of a kind.
///
/// # Errors
///
/// Returns an error if the list fails or an object cannot be decoded.
pub async fn fetch_all<T: DeserializeOwned>(
    store: &dyn ObjectStore,
    kind: ResourceKind,
    namespace: &str,
) -> Result<Vec<T>, StoreError> {
    store
        .list(kind, namespace)
        .await?
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(StoreError::from))
        .collect()
}

/// Applies a merge patch and decodes the result.
///
/// # Arguments
///
/// * `status` - Patch the status subresource instead of the object
///
/// # Errors
///
/// Returns an error if the patch is rejected or the result cannot be decoded.
pub async fn apply_patch<T: DeserializeOwned>(
    store: &dyn ObjectStore,
    kind: ResourceKind,
    namespace: &str,
    name: &str,
    patch: &Value,
    status: bool,
) -> Result<T, StoreError> {
    let value = if status {
        store.patch_status(kind, namespace, name, patch).await?
    } else {
        store.patch(kind, namespace, name, patch).await?
    };
    Ok(serde_json::from_value(value)?)
}

/// Fetches a Secret.
///
/// # Errors
///
/// Returns an error if the read fails.
pub async fn get_secret(
    store: &dyn ObjectStore,
    namespace: &str,
    name: &str,
) -> Result<Option<Secret>, StoreError> {
    fetch(store, ResourceKind::Secret, namespace, name).await
}

/// Fetches a ConfigMap.
///
/// # Errors
///
/// Returns an error if the read fails.
pub async fn get_config_map(
    store: &dyn ObjectStore,
    namespace: &str,
    name: &str,
) -> Result<Option<ConfigMap>, StoreError> {
    fetch(store, ResourceKind::ConfigMap, namespace, name).await
}

/// Returns a Secret data value decoded as UTF-8.
#[must_use]
pub fn secret_string(secret: &Secret, key: &str) -> Option<String> {
    if let Some(value) = secret.data.as_ref().and_then(|d| d.get(key)) {
        return String::from_utf8(value.0.clone()).ok();
    }
    secret
        .string_data
        .as_ref()
        .and_then(|d| d.get(key))
        .cloned()
}
