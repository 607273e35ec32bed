// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Factory-install gate.
//!
//! A system installed at the factory ships with a `factory-install` config
//! map. While `factory-installed` is true and `factory-config-finalized` is
//! not, every resource is treated as not yet reconciled exactly once, so that
//! the site configuration is pushed over the factory defaults. The
//! `<name>-default-updated` keys record which resources have been forced.

use k8s_openapi::api::core::v1::ConfigMap;
use serde_json::json;
use tracing::{debug, info};

use super::Manager;
use crate::constants::{
    FACTORY_CONFIG_FINALIZED_KEY, FACTORY_DEFAULT_UPDATED_SUFFIX, FACTORY_INSTALLED_KEY,
    FACTORY_INSTALL_CONFIG_MAP,
};
use crate::errors::{ReconcileError, StoreError};
use crate::store::{get_config_map, ResourceKind};

/// Parses a boolean the way the platform tooling writes it.
///
/// Accepts `1`, `t`, `T`, `TRUE`, `true`, `True` and their false counterparts.
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn data<'a>(config_map: &'a ConfigMap, key: &str) -> Option<&'a str> {
    config_map
        .data
        .as_ref()
        .and_then(|d| d.get(key))
        .map(String::as_str)
}

fn default_updated_key(name: &str) -> String {
    format!("{name}{FACTORY_DEFAULT_UPDATED_SUFFIX}")
}

/// Returns true when the config map puts its namespace in factory mode.
///
/// Used to filter config map events: only a factory-mode `factory-install`
/// map in the watched namespace re-triggers reconciliation. Unparseable
/// values never enable factory mode here.
#[must_use]
pub fn factory_reconfig_allowed(namespace: &str, config_map: &ConfigMap) -> bool {
    if config_map.metadata.name.as_deref() != Some(FACTORY_INSTALL_CONFIG_MAP)
        || config_map.metadata.namespace.as_deref() != Some(namespace)
    {
        return false;
    }

    let installed = data(config_map, FACTORY_INSTALLED_KEY).and_then(parse_bool);
    if installed != Some(true) {
        return false;
    }

    match data(config_map, FACTORY_CONFIG_FINALIZED_KEY) {
        None => true,
        Some(value) => parse_bool(value) == Some(false),
    }
}

impl Manager {
    async fn factory_config_map(&self, namespace: &str) -> Result<Option<ConfigMap>, StoreError> {
        let config_map = get_config_map(self.store(), namespace, FACTORY_INSTALL_CONFIG_MAP).await?;
        if config_map.is_none() {
            debug!(namespace, "Factory install configmap not found");
        }
        Ok(config_map)
    }

    /// Returns whether the namespace is being configured after a factory install.
    ///
    /// A missing config map or `factory-installed` key means no. Once
    /// installed, the namespace stays in factory mode until
    /// `factory-config-finalized` parses as true; an unparseable finalized
    /// value keeps factory mode on.
    ///
    /// # Errors
    ///
    /// Returns an error if the config map cannot be read or
    /// `factory-installed` is not a boolean.
    pub async fn get_factory_install(&self, namespace: &str) -> Result<bool, ReconcileError> {
        let Some(config_map) = self.factory_config_map(namespace).await? else {
            return Ok(false);
        };

        let Some(installed) = data(&config_map, FACTORY_INSTALLED_KEY) else {
            return Ok(false);
        };
        debug!(namespace, value = installed, "Data factory-installed in configmap");

        let installed = parse_bool(installed).ok_or_else(|| {
            ReconcileError::Validation(format!(
                "invalid {FACTORY_INSTALLED_KEY} value {installed:?} in {namespace}/{FACTORY_INSTALL_CONFIG_MAP}"
            ))
        })?;
        if !installed {
            return Ok(false);
        }

        Ok(match data(&config_map, FACTORY_CONFIG_FINALIZED_KEY) {
            None => true,
            Some(value) => parse_bool(value).is_none_or(|finalized| !finalized),
        })
    }

    async fn set_factory_key(
        &self,
        namespace: &str,
        key: &str,
        value: bool,
    ) -> Result<bool, StoreError> {
        if self.factory_config_map(namespace).await?.is_none() {
            return Ok(false);
        }
        let patch = json!({ "data": { (key): value.to_string() } });
        self.store()
            .patch(ResourceKind::ConfigMap, namespace, FACTORY_INSTALL_CONFIG_MAP, &patch)
            .await?;
        Ok(true)
    }

    /// Records whether the factory configuration has been finalized.
    ///
    /// Does nothing when the namespace has no factory install config map.
    ///
    /// # Errors
    ///
    /// Returns an error if the config map cannot be read or written.
    pub async fn set_factory_config_finalized(
        &self,
        namespace: &str,
        finalized: bool,
    ) -> Result<(), StoreError> {
        if self
            .set_factory_key(namespace, FACTORY_CONFIG_FINALIZED_KEY, finalized)
            .await?
        {
            info!(namespace, finalized, "Factory config has been finalized");
        }
        Ok(())
    }

    /// Records that a resource's factory defaults have been overridden.
    ///
    /// Does nothing when the namespace has no factory install config map.
    ///
    /// # Errors
    ///
    /// Returns an error if the config map cannot be read or written.
    pub async fn set_resource_default_updated(
        &self,
        namespace: &str,
        name: &str,
        updated: bool,
    ) -> Result<(), StoreError> {
        let key = default_updated_key(name);
        if self.set_factory_key(namespace, &key, updated).await? {
            debug!(namespace, key = %key, "Resource defaults updated");
        }
        Ok(())
    }

    /// Returns whether a resource's factory defaults have been overridden.
    ///
    /// # Errors
    ///
    /// Returns an error if the config map cannot be read or the recorded
    /// value is not a boolean.
    pub async fn get_resource_default_updated(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<bool, ReconcileError> {
        let Some(config_map) = self.factory_config_map(namespace).await? else {
            return Ok(false);
        };

        let key = default_updated_key(name);
        let Some(value) = data(&config_map, &key) else {
            debug!(namespace, key = %key, "Default updated info not found");
            return Ok(false);
        };

        parse_bool(value).ok_or_else(|| {
            ReconcileError::Validation(format!(
                "invalid {key} value {value:?} in {namespace}/{FACTORY_INSTALL_CONFIG_MAP}"
            ))
        })
    }
}

#[cfg(test)]
#[path = "factory_tests.rs"]
mod factory_tests;
