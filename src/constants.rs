// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the deployment manager operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

use std::time::Duration;

// ============================================================================
// API Constants
// ============================================================================

/// API group for all deployment manager CRDs
pub const API_GROUP: &str = "starlingx.windriver.com";

/// Kind name for `System` resource
pub const KIND_SYSTEM: &str = "System";

/// Kind name for `Host` resource
pub const KIND_HOST: &str = "Host";

/// Kind name for `HostProfile` resource
pub const KIND_HOST_PROFILE: &str = "HostProfile";

/// Kind name for `PlatformNetwork` resource
pub const KIND_PLATFORM_NETWORK: &str = "PlatformNetwork";

/// Kind name for `AddressPool` resource
pub const KIND_ADDRESS_POOL: &str = "AddressPool";

/// Kind name for `DataNetwork` resource
pub const KIND_DATA_NETWORK: &str = "DataNetwork";

/// Kind name for `PtpInstance` resource
pub const KIND_PTP_INSTANCE: &str = "PtpInstance";

/// Kind name for `PtpInterface` resource
pub const KIND_PTP_INTERFACE: &str = "PtpInterface";

/// Name reported as the controller on Kubernetes events
pub const CONTROLLER_NAME: &str = "deployment-manager";

// ============================================================================
// Annotations
// ============================================================================

/// Annotation written by `kubectl apply`; the source for the deployment scope
pub const LAST_APPLIED_CONFIGURATION_ANNOTATION: &str =
    "kubectl.kubernetes.io/last-applied-configuration";

/// Integer counter bumped to force the watch cache to redeliver an object
pub const NOTIFICATIONS_ANNOTATION: &str = "deployment-manager/notifications";

/// Present with value "true" when day-2 changes are allowed after the first sync
pub const RECONCILE_AFTER_INSYNC_ANNOTATION: &str = "deployment-manager/reconcile-after-insync";

/// JSON payload `{"inSync": bool}` written by the restore tooling
pub const RESTORE_IN_PROGRESS_ANNOTATION: &str = "restore-in-progress";

/// Prefix of the per-profile annotation stamped on hosts by the profile reconciler
pub const PROFILE_ANNOTATION_PREFIX: &str = "profile/";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer for `Host` resources
pub const HOST_FINALIZER: &str = "host.finalizers.windriver.com";

/// Finalizer for `DataNetwork` resources
pub const DATA_NETWORK_FINALIZER: &str = "datanetwork.finalizers.windriver.com";

/// Finalizer for `PlatformNetwork` resources
pub const PLATFORM_NETWORK_FINALIZER: &str = "platformnetwork.finalizers.windriver.com";

/// Finalizer for `AddressPool` resources
pub const ADDRESS_POOL_FINALIZER: &str = "addresspool.finalizers.windriver.com";

/// Finalizer for `PtpInstance` resources
pub const PTP_INSTANCE_FINALIZER: &str = "ptpinstance.finalizers.windriver.com";

/// Finalizer for `PtpInterface` resources
pub const PTP_INTERFACE_FINALIZER: &str = "ptpinterface.finalizers.windriver.com";

// ============================================================================
// Well-known Kubernetes objects
// ============================================================================

/// Secret holding the platform credentials for a namespace
pub const SYSTEM_ENDPOINT_SECRET: &str = "system-endpoint";

/// Config map describing the factory install state of a namespace
pub const FACTORY_INSTALL_CONFIG_MAP: &str = "factory-install";

/// Key set to "true" once the factory image has been installed
pub const FACTORY_INSTALLED_KEY: &str = "factory-installed";

/// Key set to "true" once the factory configuration has been finalized
pub const FACTORY_CONFIG_FINALIZED_KEY: &str = "factory-config-finalized";

/// Suffix of the per-resource key recording that the factory default was applied
pub const FACTORY_DEFAULT_UPDATED_SUFFIX: &str = "-default-updated";

/// Secret data key holding a PEM certificate
pub const SECRET_CERT_KEY: &str = "tls.crt";

/// Secret data key holding a PEM private key
pub const SECRET_PRIVATE_KEY_KEY: &str = "tls.key";

/// Secret data key holding license file contents
pub const SECRET_LICENSE_CONTENT_KEY: &str = "content";

/// Secret data key holding a BMC username
pub const SECRET_USERNAME_KEY: &str = "username";

/// Secret data key holding a BMC password
pub const SECRET_PASSWORD_KEY: &str = "password";

// ============================================================================
// Platform endpoints
// ============================================================================

/// Service name of the system inventory endpoint
pub const SYSTEM_ENDPOINT_NAME: &str = "sysinv";

/// Service type of the system inventory endpoint
pub const SYSTEM_ENDPOINT_TYPE: &str = "platform";

/// Service name of the VIM endpoint
pub const VIM_ENDPOINT_NAME: &str = "vim";

/// Service type of the VIM endpoint
pub const VIM_ENDPOINT_TYPE: &str = "nfv";

/// Default endpoint availability when `OS_INTERFACE` is unset
pub const DEFAULT_ENDPOINT_INTERFACE: &str = "public";

/// URL scheme prefix for plain HTTP endpoints
pub const HTTP_PREFIX: &str = "http://";

/// URL scheme prefix for TLS endpoints
pub const HTTPS_PREFIX: &str = "https://";

/// Value the platform expects for an empty list of DNS servers
pub const NO_CONTENT: &str = "NC";

// ============================================================================
// Deployment scope and strategy values
// ============================================================================

/// Day-1 provisioning scope
pub const SCOPE_BOOTSTRAP: &str = "bootstrap";

/// Day-2 update scope
pub const SCOPE_PRINCIPAL: &str = "principal";

/// No strategy is needed for the resource
pub const STRATEGY_NOT_REQUIRED: &str = "not_required";

/// The resource needs its host locked before changes apply
pub const STRATEGY_LOCK_REQUIRED: &str = "lock_required";

/// The resource needs its host unlocked before changes apply
pub const STRATEGY_UNLOCK_REQUIRED: &str = "unlock_required";

// ============================================================================
// Retry intervals
// ============================================================================

/// Requeue delay for conflicts and host notification races
pub const RETRY_IMMEDIATE: Duration = Duration::from_secs(1);

/// Requeue delay for transient dependency errors
pub const RETRY_TRANSIENT: Duration = Duration::from_secs(20);

/// Requeue delay for errors that need user intervention
pub const RETRY_USER_ERROR: Duration = Duration::from_secs(60);

/// Requeue delay for platform server errors
pub const RETRY_SERVER_ERROR: Duration = Duration::from_secs(60);

/// Requeue delay for DNS resolution failures
pub const RETRY_RESOLUTION_ERROR: Duration = Duration::from_secs(300);

/// Requeue delay for other network failures
pub const RETRY_NETWORK_ERROR: Duration = Duration::from_secs(15);

/// Periodic resync for resources that reconciled successfully
pub const RESYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Maximum attempts when resolving optimistic concurrency conflicts
pub const MAX_CONFLICT_RETRIES: u32 = 5;

// ============================================================================
// Strategy orchestrator
// ============================================================================

/// Interval between strategy orchestrator ticks
pub const STRATEGY_MONITOR_INTERVAL: Duration = Duration::from_secs(15);

/// Maximum create/apply attempts before the orchestrator gives up
pub const DEFAULT_MAX_STRATEGY_RETRY_COUNT: u32 = 120;

// ============================================================================
// Monitor intervals
// ============================================================================

/// Interval for host state monitors
pub const STATE_MONITOR_INTERVAL: Duration = Duration::from_secs(30);

/// Interval for the host state change monitor
pub const STATE_CHANGE_MONITOR_INTERVAL: Duration = Duration::from_secs(120);

/// Interval for the enabled controller monitor
pub const ENABLED_CONTROLLER_MONITOR_INTERVAL: Duration = Duration::from_secs(30);

/// Interval for the available controller monitor
pub const AVAILABLE_CONTROLLER_MONITOR_INTERVAL: Duration = Duration::from_secs(60);

/// Interval for the provisioning allowed monitor
pub const PROVISIONING_ALLOWED_MONITOR_INTERVAL: Duration = Duration::from_secs(30);

/// Interval for the dynamic host monitor
pub const DYNAMIC_HOST_MONITOR_INTERVAL: Duration = Duration::from_secs(30);

/// Interval for the Kubernetes resource monitor
pub const KUBERNETES_RESOURCE_MONITOR_INTERVAL: Duration = Duration::from_secs(30);

/// Interval for the filesystem resize monitor
pub const FILESYSTEM_RESIZE_MONITOR_INTERVAL: Duration = Duration::from_secs(15);

// ============================================================================
// Configuration
// ============================================================================

/// Default location of the reconciler configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/manager/config.yaml";

/// Top-level key of the reconciler configuration tree
pub const RECONCILER_CONFIG_PREFIX: &str = "reconcilers";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for the Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Port for the metrics and health endpoint
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path of the Prometheus scrape endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for the metrics and health endpoint
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";

