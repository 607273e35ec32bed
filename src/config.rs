// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciler configuration.
//!
//! Reconcilers and sub-reconcilers can be switched off, and some of them take
//! options, through a YAML file rooted at `reconcilers`:
//!
//! ```yaml
//! reconcilers:
//!   dataNetwork:
//!     enabled: true
//!     stopAfterInSync: false
//!   system:
//!     certificate:
//!       httpsRequired: false
//! ```
//!
//! A missing file yields the built-in defaults.

use std::path::Path;

use serde_yaml::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::constants::RECONCILER_CONFIG_PREFIX;

/// Errors raised while loading the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: serde_yaml::Error,
    },
}

/// Dotted path naming a reconciler or sub-reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcilerName {
    DataNetwork,
    Host,
    Bmc,
    HostPlatformNetwork,
    HostProfile,
    PlatformNetwork,
    AddressPool,
    System,
    Certificate,
    Dns,
    Drbd,
    SystemFileSystems,
    License,
    Ntp,
    Ptp,
    Backends,
    ServiceParameters,
    PtpInstance,
    PtpInterface,
}

impl ReconcilerName {
    /// Returns the configuration path below the `reconcilers` prefix.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DataNetwork => "dataNetwork",
            Self::Host => "host",
            Self::Bmc => "host.bmc",
            Self::HostPlatformNetwork => "host.platformNetwork",
            Self::HostProfile => "hostProfile",
            Self::PlatformNetwork => "platformNetwork",
            Self::AddressPool => "addressPool",
            Self::System => "system",
            Self::Certificate => "system.certificate",
            Self::Dns => "system.dns",
            Self::Drbd => "system.drbd",
            Self::SystemFileSystems => "system.filesystems",
            Self::License => "system.license",
            Self::Ntp => "system.ntp",
            Self::Ptp => "system.ptp",
            Self::Backends => "system.storage.backend",
            Self::ServiceParameters => "system.serviceParameters",
            Self::PtpInstance => "ptpInstance",
            Self::PtpInterface => "ptpInterface",
        }
    }
}

impl std::fmt::Display for ReconcilerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named option of a reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilerOption {
    /// Refuse to push secrets over plain HTTP
    HttpsRequired,
    /// Ignore spec changes once the resource has reconciled
    StopAfterInSync,
}

impl ReconcilerOption {
    /// Returns the option key as written in the file.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HttpsRequired => "httpsRequired",
            Self::StopAfterInSync => "stopAfterInSync",
        }
    }
}

fn option_default(name: ReconcilerName, option: ReconcilerOption) -> Option<bool> {
    use ReconcilerName as N;
    use ReconcilerOption as O;

    match (name, option) {
        (N::Certificate | N::Bmc, O::HttpsRequired) => Some(true),
        (
            N::DataNetwork
            | N::PtpInterface
            | N::PtpInstance
            | N::Host
            | N::PlatformNetwork
            | N::System,
            O::StopAfterInSync,
        ) => Some(true),
        _ => None,
    }
}

/// Parsed reconciler configuration.
#[derive(Debug, Clone, Default)]
pub struct ReconcilerConfig {
    root: Value,
}

impl ReconcilerConfig {
    /// Builds a configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid YAML.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        let root: Value = serde_yaml::from_str(text)?;
        Ok(Self { root })
    }

    /// Loads the configuration file, falling back to defaults when it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(path = %path.display(), "No manager config file found, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let config = Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        info!(path = %path.display(), "Manager config loaded from file");
        Ok(config)
    }

    fn lookup(&self, name: ReconcilerName, key: &str) -> Option<&Value> {
        let mut node = self.root.get(RECONCILER_CONFIG_PREFIX)?;
        for part in name.as_str().split('.') {
            node = node.get(part)?;
        }
        node.get(key)
    }

    /// Returns whether a reconciler is enabled. Every reconciler is enabled by default.
    #[must_use]
    pub fn is_enabled(&self, name: ReconcilerName) -> bool {
        let enabled = match self.lookup(name, "enabled") {
            Some(Value::Bool(value)) => *value,
            Some(other) => {
                warn!(reconciler = %name, value = ?other, "Unexpected type for enabled flag");
                true
            }
            None => true,
        };

        if !enabled {
            info!(reconciler = %name, "Reconciler is disabled");
        }

        enabled
    }

    /// Returns a boolean option, using the built-in default when it is not set.
    ///
    /// # Arguments
    ///
    /// * `name` - Reconciler the option belongs to
    /// * `option` - Option to read
    /// * `fallback` - Value used when neither the file nor the defaults define it
    #[must_use]
    pub fn option_bool(
        &self,
        name: ReconcilerName,
        option: ReconcilerOption,
        fallback: bool,
    ) -> bool {
        match self.lookup(name, option.as_str()) {
            Some(Value::Bool(value)) => *value,
            Some(other) => {
                warn!(
                    reconciler = %name,
                    option = option.as_str(),
                    value = ?other,
                    "Unexpected option type"
                );
                option_default(name, option).unwrap_or(fallback)
            }
            None => option_default(name, option).unwrap_or(fallback),
        }
    }

    /// Whether spec changes are ignored once the resource has reconciled.
    #[must_use]
    pub fn stop_after_in_sync(&self, name: ReconcilerName) -> bool {
        self.option_bool(name, ReconcilerOption::StopAfterInSync, false)
    }

    /// Whether secrets may only be sent to the platform over HTTPS.
    #[must_use]
    pub fn https_required(&self, name: ReconcilerName) -> bool {
        self.option_bool(name, ReconcilerOption::HttpsRequired, true)
    }
}
