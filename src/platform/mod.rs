// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Platform API access.
//!
//! The operator talks to two StarlingX services: the inventory service
//! (`sysinv`, type `platform`) and the VIM orchestration service (`vim`, type
//! `nfv`). Both are plain REST endpoints located through the Keystone service
//! catalog, so a single [`PlatformClient`] abstraction covers them. Typed
//! operations live in [`inventory`] and [`nfv`] and are written against the
//! trait, which lets tests swap in an in-memory platform.
//!
//! # Example
//!
//! ```rust,no_run
//! use deployment_manager::platform::{inventory, PlatformClient};
//!
//! # async fn example(client: &dyn PlatformClient) -> Result<(), Box<dyn std::error::Error>> {
//! let system = inventory::system::get_default(client).await?;
//! println!("{} is a {} system", system.name, system.system_type);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod inventory;
pub mod keystone;
pub mod nfv;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::HTTPS_PREFIX;
use crate::errors::PlatformError;

pub use auth::{AuthOptions, ClientSettings, EndpointOptions};

/// Installs the ring crypto provider as the process-wide rustls default.
///
/// Both the Kubernetes client and the platform clients negotiate TLS through
/// rustls, which refuses to pick a provider on its own when more than one is
/// compiled in. Returns false when a default was already installed.
pub fn install_crypto_provider() -> bool {
    rustls::crypto::ring::default_provider()
        .install_default()
        .is_ok()
}

/// One JSON-Patch operation as accepted by the inventory API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOp {
    /// `replace`, `add` or `remove`
    pub op: String,
    /// Attribute path, for example `/mtu`
    pub path: String,
    /// New value; absent for `remove`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOp {
    /// Replaces the attribute at `/<field>`.
    #[must_use]
    pub fn replace(field: &str, value: impl Into<Value>) -> Self {
        Self {
            op: "replace".to_string(),
            path: format!("/{field}"),
            value: Some(value.into()),
        }
    }

    /// Adds a value at `/<field>`.
    #[must_use]
    pub fn add(field: &str, value: impl Into<Value>) -> Self {
        Self {
            op: "add".to_string(),
            path: format!("/{field}"),
            value: Some(value.into()),
        }
    }

    /// Removes a value at `/<field>`.
    #[must_use]
    pub fn remove(field: &str, value: impl Into<Value>) -> Self {
        Self {
            op: "remove".to_string(),
            path: format!("/{field}"),
            value: Some(value.into()),
        }
    }
}

/// A file uploaded as `multipart/form-data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// File name reported to the server
    pub file_name: String,
    /// File contents
    pub contents: Vec<u8>,
    /// Extra form fields sent with the file
    pub fields: Vec<(String, String)>,
}

/// Authenticated access to one platform service endpoint.
///
/// Paths are relative to the endpoint URL (for example `datanetworks` or
/// `ihosts/<uuid>`).
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Base URL of the service endpoint.
    fn endpoint(&self) -> String;

    /// Returns true when the endpoint is reached over TLS.
    fn is_https(&self) -> bool {
        self.endpoint().starts_with(HTTPS_PREFIX)
    }

    /// Issues a GET and returns the decoded body.
    async fn get(&self, path: &str) -> Result<Value, PlatformError>;

    /// Issues a POST with a JSON body and returns the decoded response.
    async fn post(&self, path: &str, body: &Value) -> Result<Value, PlatformError>;

    /// Issues a PATCH with a JSON-Patch body and returns the decoded response.
    async fn patch(&self, path: &str, ops: &[PatchOp]) -> Result<Value, PlatformError>;

    /// Issues a DELETE.
    async fn delete(&self, path: &str) -> Result<(), PlatformError>;

    /// Uploads a file as `multipart/form-data` under the form field `file`.
    async fn upload(&self, path: &str, upload: Upload) -> Result<Value, PlatformError>;
}

/// Builds authenticated clients.
#[async_trait]
pub trait PlatformConnector: Send + Sync {
    /// Authenticates with `auth` and returns a client for the endpoint described by `endpoint`.
    async fn connect(
        &self,
        auth: &AuthOptions,
        endpoint: &EndpointOptions,
    ) -> Result<Arc<dyn PlatformClient>, PlatformError>;
}

/// Decodes a response value into a typed result, mapping failures to [`PlatformError::Decode`].
///
/// # Errors
///
/// Returns an error if the value does not match `T`.
pub fn decode<T: serde::de::DeserializeOwned>(
    client: &dyn PlatformClient,
    path: &str,
    value: Value,
) -> Result<T, PlatformError> {
    serde_json::from_value(value).map_err(|e| PlatformError::Decode {
        url: format!("{}/{}", client.endpoint().trim_end_matches('/'), path),
        message: e.to_string(),
    })
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
