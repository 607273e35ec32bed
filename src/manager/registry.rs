// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use tracing::{error, info, warn};

use super::Manager;
use crate::constants::{
    HTTPS_PREFIX, HTTP_PREFIX, SYSTEM_ENDPOINT_NAME, SYSTEM_ENDPOINT_SECRET, VIM_ENDPOINT_NAME,
};
use crate::errors::{PlatformError, ReconcileError, StoreError};
use crate::metrics;
use crate::platform::auth::settings_from_secret;
use crate::platform::{inventory, nfv, AuthOptions, EndpointOptions, PlatformClient};
use crate::store::get_secret;

impl Manager {
    /// Returns the namespace's platform client, if one has been built.
    #[must_use]
    pub fn get_platform_client(&self, namespace: &str) -> Option<Arc<dyn PlatformClient>> {
        self.registry()
            .systems
            .get(namespace)
            .and_then(|entry| entry.client.clone())
    }

    /// Discards the namespace's platform client and wakes the System reconciler
    /// so that it builds a new one.
    ///
    /// Resetting a namespace without a client is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the System could not be notified.
    pub async fn reset_platform_client(&self, namespace: &str) -> Result<(), StoreError> {
        {
            let mut registry = self.registry();
            match registry.systems.get_mut(namespace) {
                Some(entry) if entry.client.is_some() => entry.client = None,
                _ => return Ok(()),
            }
        }

        metrics::record_client_reset(namespace);
        info!(namespace, "Platform client has been reset");

        self.notify_system_controller(namespace).await
    }

    async fn authenticate(
        &self,
        options: &[AuthOptions],
        endpoint: &EndpointOptions,
    ) -> Result<Arc<dyn PlatformClient>, PlatformError> {
        let mut last_error =
            PlatformError::InvalidOptions("no auth URL options available".to_string());

        for option in options {
            let mut attempt = option.clone();
            let mut swapped = false;

            loop {
                match self.connector.connect(&attempt, endpoint).await {
                    Ok(client) => return Ok(client),
                    Err(err) => {
                        let swap = !swapped
                            && match &err {
                                PlatformError::Eof { .. } => {
                                    attempt.identity_endpoint.starts_with(HTTP_PREFIX)
                                }
                                PlatformError::HttpsNotEnabled { .. } => {
                                    attempt.identity_endpoint.starts_with(HTTPS_PREFIX)
                                }
                                _ => false,
                            };
                        if let Some(next) = swap.then(|| attempt.with_swapped_scheme()).flatten() {
                            info!(
                                url = %next.identity_endpoint,
                                "Retrying authentication request with the other URL scheme"
                            );
                            attempt = next;
                            swapped = true;
                            continue;
                        }

                        error!(
                            url = %attempt.identity_endpoint,
                            options = ?attempt,
                            error = %err,
                            "Failed to authenticate client"
                        );
                        last_error = err;
                        break;
                    }
                }
            }
        }

        Err(last_error)
    }

    /// Builds an authenticated client for a platform endpoint of the namespace.
    ///
    /// Credentials come from the namespace's `system-endpoint` secret. Every
    /// auth URL listed there is tried in turn; an EOF on `http://` or an
    /// "HTTP response to HTTPS client" on `https://` retries the same URL once
    /// with the other scheme. The new client is smoke-tested before use. A
    /// sysinv client is stored in the registry under the namespace.
    ///
    /// # Arguments
    ///
    /// * `namespace` - Namespace owning the secret
    /// * `endpoint_name` - Catalog service name (`sysinv` or `vim`)
    /// * `endpoint_type` - Catalog service type (`platform` or `nfv`)
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is missing or invalid, if no auth URL
    /// accepts the credentials, or if the smoke test fails.
    pub async fn build_platform_client(
        &self,
        namespace: &str,
        endpoint_name: &str,
        endpoint_type: &str,
    ) -> Result<Arc<dyn PlatformClient>, ReconcileError> {
        let secret = get_secret(self.store.as_ref(), namespace, SYSTEM_ENDPOINT_SECRET)
            .await?
            .ok_or_else(|| {
                ReconcileError::MissingKubernetesResource(format!(
                    "failed to find system endpoint secret {namespace}/{SYSTEM_ENDPOINT_SECRET}"
                ))
            })?;

        let settings = settings_from_secret(&secret)?;
        let endpoint = settings.endpoint(endpoint_name, endpoint_type);

        let client = self
            .authenticate(&settings.options, &endpoint)
            .await
            .inspect_err(|_| {
                warn!(
                    namespace,
                    "Failed to authenticate against all available auth URL options"
                );
            })?;

        if endpoint_name == SYSTEM_ENDPOINT_NAME {
            inventory::system::get_default(client.as_ref()).await?;

            self.registry()
                .systems
                .entry(namespace.to_string())
                .or_default()
                .client = Some(client.clone());

            let mut strategy = self.strategy();
            if strategy.namespace.is_empty() {
                strategy.namespace = namespace.to_string();
            }
        } else if endpoint_name == VIM_ENDPOINT_NAME {
            nfv::show(client.as_ref()).await?;
        }

        info!(
            namespace,
            endpoint = %client.endpoint(),
            service = endpoint_name,
            "Platform client created"
        );
        Ok(client)
    }

    /// Marks whether the namespace's System has completed its first reconcile.
    pub fn set_system_ready(&self, namespace: &str, ready: bool) {
        self.registry()
            .systems
            .entry(namespace.to_string())
            .or_default()
            .ready = ready;
    }

    /// Returns whether the namespace's System has completed its first reconcile.
    #[must_use]
    pub fn get_system_ready(&self, namespace: &str) -> bool {
        self.registry()
            .systems
            .get(namespace)
            .is_some_and(|entry| entry.ready)
    }

    /// Records the namespace's system type (`all-in-one` or `standard`).
    pub fn set_system_type(&self, namespace: &str, system_type: &str) {
        let mut registry = self.registry();
        let entry = registry.systems.entry(namespace.to_string()).or_default();
        if entry.system_type != system_type {
            info!(namespace, system_type, "System type has been set");
            entry.system_type = system_type.to_string();
        }
    }

    /// Returns the namespace's system type, or an empty string when unknown.
    #[must_use]
    pub fn get_system_type(&self, namespace: &str) -> String {
        self.registry()
            .systems
            .get(namespace)
            .map(|entry| entry.system_type.clone())
            .unwrap_or_default()
    }
}
