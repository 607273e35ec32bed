// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for StarlingX deployment management.
//!
//! Every kind lives in the `starlingx.windriver.com/v1` API group and is
//! namespaced. One namespace describes one StarlingX system.
//!
//! # Resource Types
//!
//! - [`System`] - System-wide settings; one per namespace
//! - [`Host`] - A single node, built from a [`HostProfile`] plus overrides
//! - [`HostProfile`] - Reusable host template with optional base profile
//! - [`PlatformNetwork`] - A platform network (oam, mgmt, admin, ...)
//! - [`AddressPool`] - An IP address pool used by platform networks
//! - [`DataNetwork`] - A tenant data network (flat, vlan, vxlan)
//! - [`PtpInstance`] - A PTP service instance
//! - [`PtpInterface`] - A PTP interface bound to an instance
//!
//! # Example: Creating a data network
//!
//! ```rust,no_run
//! use deployment_manager::crd::{DataNetwork, DataNetworkSpec};
//!
//! let spec = DataNetworkSpec {
//!     network_type: "flat".to_string(),
//!     description: Some("sample".to_string()),
//!     mtu: Some(1500),
//!     vxlan: None,
//! };
//! let network = DataNetwork::new("foo", spec);
//! ```

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ============================================================================
// Common status
// ============================================================================

/// Status fields shared by every reconciled kind.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    /// Platform UUID of the realised resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Whether the most recent compare found no difference.
    #[serde(default)]
    pub in_sync: bool,

    /// Whether the resource has ever been in sync in its current scope.
    #[serde(default)]
    pub reconciled: bool,

    /// Generation processed by the most recent reconcile.
    #[serde(default)]
    pub observed_generation: i64,

    /// Set when the spec changed since the last processed generation.
    #[serde(default)]
    pub configuration_updated: bool,

    /// `bootstrap` or `principal`.
    #[serde(default)]
    pub deployment_scope: String,

    /// `not_required`, `lock_required` or `unlock_required`.
    #[serde(default)]
    pub strategy_required: String,

    /// Human-readable diff from the most recent mismatch.
    #[serde(default)]
    pub delta: String,
}

// ============================================================================
// System
// ============================================================================

/// Certificate installed on the platform from a TLS secret.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateInfo {
    /// Certificate type (`ssl`, `ssl_ca`, `openstack`, `openstack_ca`, `docker_registry`, `tpm_mode`).
    #[serde(rename = "type")]
    pub cert_type: String,

    /// Name of the secret holding `tls.crt`, `tls.key` and optionally `ca.crt`.
    pub secret: String,
}

impl CertificateInfo {
    /// CA certificates are installed without a private key.
    #[must_use]
    pub fn private_key_expected(&self) -> bool {
        self.cert_type != "ssl_ca" && self.cert_type != "openstack_ca"
    }
}

/// License installed from a secret.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct LicenseInfo {
    /// Name of the secret holding the license file under `content`.
    pub secret: String,
}

/// A single platform service parameter.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ServiceParameterInfo {
    /// Service name
    pub service: String,
    /// Section within the service
    pub section: String,
    /// Parameter name
    #[serde(rename = "paramname")]
    pub param_name: String,
    /// Parameter value
    #[serde(rename = "paramvalue")]
    pub param_value: String,
    /// Optional personality restriction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    /// Optional resource name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

/// A storage backend.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageBackend {
    /// Backend name
    pub name: String,
    /// Backend type (`file`, `lvm`, `ceph`, `ceph-rook`)
    #[serde(rename = "type")]
    pub backend_type: String,
    /// Services enabled on the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<String>>,
    /// Replication factor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_factor: Option<i32>,
    /// Partition size in GiB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_size: Option<i32>,
    /// Network used by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

/// DRBD settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DrbdConfiguration {
    /// Link utilization percentage
    pub link_utilization: i32,
}

/// A controller filesystem.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ControllerFileSystemInfo {
    /// Filesystem name
    pub name: String,
    /// Size in GiB
    pub size: i32,
}

/// System storage settings.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
pub struct SystemStorageInfo {
    /// Storage backends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backends: Option<Vec<StorageBackend>>,
    /// DRBD settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drbd: Option<DrbdConfiguration>,
    /// Controller filesystems
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystems: Option<Vec<ControllerFileSystemInfo>>,
}

/// System PTP settings.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
pub struct PtpInfo {
    /// PTP mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// PTP transport
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    /// PTP delay mechanism
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<String>,
}

/// Desired system-wide configuration.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[kube(
    group = "starlingx.windriver.com",
    version = "v1",
    kind = "System",
    namespaced,
    shortname = "sys",
    doc = "System defines the system-wide attributes of a StarlingX deployment. Exactly one System exists per namespace and it must reconcile before any other resource in the namespace.",
    printcolumn = r#"{"name":"Mode","type":"string","jsonPath":".status.systemMode"}"#,
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".status.systemType"}"#,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".status.softwareVersion"}"#,
    printcolumn = r#"{"name":"InSync","type":"boolean","jsonPath":".status.inSync"}"#,
    printcolumn = r#"{"name":"Reconciled","type":"boolean","jsonPath":".status.reconciled"}"#
)]
#[kube(status = "SystemStatus")]
#[serde(rename_all = "camelCase")]
pub struct SystemSpec {
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Physical location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Latitude in decimal degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<String>,

    /// Longitude in decimal degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<String>,

    /// Administrative contact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,

    /// DNS nameservers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_servers: Option<Vec<String>>,

    /// NTP servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ntp_servers: Option<Vec<String>>,

    /// PTP settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ptp: Option<PtpInfo>,

    /// Certificates to install.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificates: Option<Vec<CertificateInfo>>,

    /// License to install.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<LicenseInfo>,

    /// Service parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_parameters: Option<Vec<ServiceParameterInfo>>,

    /// Storage settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<SystemStorageInfo>,

    /// Virtual switch type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vswitch_type: Option<String>,
}

impl SystemSpec {
    /// HTTPS is enabled on the platform whenever a platform or TPM certificate is configured.
    #[must_use]
    pub fn https_enabled(&self) -> bool {
        self.certificates.as_ref().is_some_and(|certs| {
            certs
                .iter()
                .any(|c| c.cert_type == "ssl" || c.cert_type == "tpm_mode")
        })
    }
}

/// Observed state of a [`System`].
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    /// Common status fields
    #[serde(flatten)]
    pub common: ResourceStatus,

    /// `all-in-one` or `standard`
    #[serde(default)]
    pub system_type: String,

    /// `simplex`, `duplex` or `duplex-direct`
    #[serde(default)]
    pub system_mode: String,

    /// Platform software version
    #[serde(default)]
    pub software_version: String,

    /// Factory defaults captured on the first reconcile, as JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<String>,

    /// Set while an update strategy is being applied
    #[serde(default)]
    pub strategy_applied: bool,

    /// Strategy create/apply attempts so far
    #[serde(default)]
    pub strategy_retry_count: i32,
}

// ============================================================================
// HostProfile
// ============================================================================

/// Reference to the secret holding BMC credentials.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct BmPasswordInfo {
    /// Secret name with `username` and `password` keys
    pub secret: String,
}

/// BMC credentials.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
pub struct BmCredentials {
    /// Password secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<BmPasswordInfo>,
}

/// Board management controller settings.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
pub struct BmInfo {
    /// BMC type (`bmc`, `dynamic`, `ipmi`, `redfish`)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub bm_type: Option<String>,
    /// BMC address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// BMC credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<BmCredentials>,
}

/// Cores reserved for a function.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ProcessorFunctionInfo {
    /// Function name
    pub function: String,
    /// Number of cores
    pub count: i32,
}

/// Per-NUMA-node processor settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ProcessorInfo {
    /// NUMA node
    pub node: i32,
    /// Function allocations
    #[serde(default)]
    pub functions: Vec<ProcessorFunctionInfo>,
}

/// Huge pages reserved for a function.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemoryFunctionInfo {
    /// Function name
    pub function: String,
    /// Page size
    pub page_size: String,
    /// Page count
    pub page_count: i32,
}

/// Per-NUMA-node memory settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct MemoryNodeInfo {
    /// NUMA node
    pub node: i32,
    /// Function allocations
    #[serde(default)]
    pub functions: Vec<MemoryFunctionInfo>,
}

/// Host filesystem.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct FileSystemInfo {
    /// Filesystem name
    pub name: String,
    /// Size in GiB
    pub size: i32,
}

/// Host storage settings.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStorageInfo {
    /// Host filesystems
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystems: Option<Vec<FileSystemInfo>>,
    /// OSDs, kept as raw objects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<Vec<BTreeMap<String, serde_json::Value>>>")]
    pub osds: Option<Vec<serde_json::Value>>,
    /// Volume groups, kept as raw objects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<Vec<BTreeMap<String, serde_json::Value>>>")]
    pub volume_groups: Option<Vec<serde_json::Value>>,
}

/// Common interface attributes.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceInfo {
    /// Interface name
    pub name: String,
    /// Interface class (`platform`, `data`, `pci-sriov`, `none`)
    #[serde(default)]
    pub class: String,
    /// MTU
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<i32>,
    /// Platform networks attached to the interface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_networks: Option<Vec<String>>,
    /// Data networks attached to the interface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_networks: Option<Vec<String>>,
    /// PTP interfaces attached to the interface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ptp_interfaces: Option<Vec<String>>,
    /// Remaining type-specific attributes
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Interfaces grouped by type.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
pub struct InterfaceList {
    /// Ethernet interfaces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ethernet: Option<Vec<InterfaceInfo>>,
    /// VLAN interfaces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<Vec<InterfaceInfo>>,
    /// Bond interfaces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bond: Option<Vec<InterfaceInfo>>,
    /// SR-IOV virtual function interfaces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vf: Option<Vec<InterfaceInfo>>,
}

/// Static address on an interface.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct AddressInfo {
    /// Interface name
    pub interface: String,
    /// IP address
    pub address: String,
    /// Prefix length
    pub prefix: i32,
}

/// Static route on an interface.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct RouteInfo {
    /// Interface name
    pub interface: String,
    /// Destination subnet
    #[serde(rename = "subnet")]
    pub network: String,
    /// Prefix length
    pub prefix: i32,
    /// Next hop
    pub gateway: String,
    /// Route metric
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<i32>,
}

/// Reusable host template.
///
/// Profiles form a chain through `base`. The effective profile for a host is
/// computed by merging each profile over its base and then applying the host's
/// own overrides.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[kube(
    group = "starlingx.windriver.com",
    version = "v1",
    kind = "HostProfile",
    namespaced,
    shortname = "hp",
    doc = "HostProfile is a reusable template of host attributes. Hosts reference a profile by name and profiles may inherit from a base profile.",
    printcolumn = r#"{"name":"Base","type":"string","jsonPath":".spec.base"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct HostProfileSpec {
    /// Parent profile whose attributes this profile extends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,

    /// `controller`, `worker` or `storage`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,

    /// `locked` or `unlocked`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub administrative_state: Option<String>,

    /// Subfunctions to provision.
    #[serde(rename = "subfunctions", default, skip_serializing_if = "Option::is_none")]
    pub sub_functions: Option<Vec<String>>,

    /// Physical location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Host labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,

    /// Installer output type (`text` or `graphical`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_output: Option<String>,

    /// Console device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console: Option<String>,

    /// Boot device path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_device: Option<String>,

    /// Whether to power on the host once provisioned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_on: Option<bool>,

    /// `static` or `dynamic`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_mode: Option<String>,

    /// Boot MAC address.
    #[serde(rename = "bootMAC", default, skip_serializing_if = "Option::is_none")]
    pub boot_mac: Option<String>,

    /// PTP instances bound to the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ptp_instances: Option<Vec<String>>,

    /// Root filesystem device path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_device: Option<String>,

    /// `ntp` or `ptp`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock_synchronization: Option<String>,

    /// Maximum CPU frequency in MHz.
    #[serde(
        rename = "maxCPUMhzConfigured",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub max_cpu_mhz_configured: Option<String>,

    /// `enabled` or `disabled`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_armor: Option<String>,

    /// Hardware settle time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hw_settle: Option<String>,

    /// Board management controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_management: Option<BmInfo>,

    /// Processor allocations per NUMA node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processors: Option<Vec<ProcessorInfo>>,

    /// Memory allocations per NUMA node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<Vec<MemoryNodeInfo>>,

    /// Storage settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<ProfileStorageInfo>,

    /// Network interfaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interfaces: Option<InterfaceList>,

    /// Static addresses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<AddressInfo>>,

    /// Static routes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<RouteInfo>>,
}

impl HostProfileSpec {
    /// Whether the profile provisions worker functionality.
    #[must_use]
    pub fn has_worker_sub_function(&self) -> bool {
        self.personality.as_deref() == Some("worker")
            || self
                .sub_functions
                .as_ref()
                .is_some_and(|s| s.iter().any(|f| f == "worker"))
    }
}

// ============================================================================
// Host
// ============================================================================

/// BMC attributes used to match a host.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
pub struct MatchBmInfo {
    /// BMC address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// BMC type
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub bm_type: Option<String>,
}

/// DMI attributes used to match a host.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchDmiInfo {
    /// System serial number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    /// Asset tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_tag: Option<String>,
}

/// Criteria used to find an existing platform host.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchInfo {
    /// Boot MAC address
    #[serde(rename = "bootMAC", default, skip_serializing_if = "Option::is_none")]
    pub boot_mac: Option<String>,
    /// BMC attributes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_management: Option<MatchBmInfo>,
    /// DMI attributes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dmi: Option<MatchDmiInfo>,
}

/// Desired state of a single node.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[kube(
    group = "starlingx.windriver.com",
    version = "v1",
    kind = "Host",
    namespaced,
    doc = "Host defines a single StarlingX node. Its attributes come from the referenced HostProfile with per-host overrides applied on top.",
    printcolumn = r#"{"name":"Administrative","type":"string","jsonPath":".status.administrativeState"}"#,
    printcolumn = r#"{"name":"Operational","type":"string","jsonPath":".status.operationalStatus"}"#,
    printcolumn = r#"{"name":"Availability","type":"string","jsonPath":".status.availabilityStatus"}"#,
    printcolumn = r#"{"name":"Profile","type":"string","jsonPath":".spec.profile"}"#,
    printcolumn = r#"{"name":"InSync","type":"boolean","jsonPath":".status.inSync"}"#,
    printcolumn = r#"{"name":"Reconciled","type":"boolean","jsonPath":".status.reconciled"}"#
)]
#[kube(status = "HostStatus")]
#[serde(rename_all = "camelCase")]
pub struct HostSpec {
    /// Name of the HostProfile supplying the host's attributes.
    pub profile: String,

    /// Criteria used to find the host on the platform.
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub match_info: Option<MatchInfo>,

    /// Per-host values overriding the profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<HostProfileSpec>,
}

/// Observed state of a [`Host`].
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HostStatus {
    /// Common status fields
    #[serde(flatten)]
    pub common: ResourceStatus,

    /// Platform administrative state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub administrative_state: Option<String>,

    /// Platform operational status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operational_status: Option<String>,

    /// Platform availability status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_status: Option<String>,

    /// Defaults captured on the first reconcile, as JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<String>,
}

// ============================================================================
// Networking
// ============================================================================

/// A range of allocatable addresses.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct AllocationRange {
    /// First address
    pub start: String,
    /// Last address
    pub end: String,
}

/// Address allocation settings.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
pub struct AllocationInfo {
    /// `static` or `dynamic`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub allocation_type: Option<String>,
    /// `random` or `sequential`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    /// Allocatable ranges
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranges: Option<Vec<AllocationRange>>,
}

/// A platform network.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[kube(
    group = "starlingx.windriver.com",
    version = "v1",
    kind = "PlatformNetwork",
    namespaced,
    shortname = "pn",
    doc = "PlatformNetwork defines a platform network (oam, mgmt, admin, cluster-host, pxeboot, ...). The network is realised on the platform by the Host reconciler of the active controller.",
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.type"}"#,
    printcolumn = r#"{"name":"InSync","type":"boolean","jsonPath":".status.inSync"}"#,
    printcolumn = r#"{"name":"Reconciled","type":"boolean","jsonPath":".status.reconciled"}"#
)]
#[kube(status = "PlatformNetworkStatus")]
#[serde(rename_all = "camelCase")]
pub struct PlatformNetworkSpec {
    /// Network type.
    #[serde(rename = "type")]
    pub network_type: String,

    /// Whether addresses are allocated dynamically.
    #[serde(default)]
    pub dynamic: bool,

    /// Names of the AddressPool resources associated with the network; the first is primary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_address_pools: Option<Vec<String>>,

    /// Inline pool subnet; creates an implicit pool named after the network.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,

    /// Inline pool prefix length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<i32>,

    /// Inline pool gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,

    /// Inline pool allocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation: Option<AllocationInfo>,
}

/// Observed state of a [`PlatformNetwork`].
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlatformNetworkStatus {
    /// Common status fields
    #[serde(flatten)]
    pub common: ResourceStatus,
}

/// An IP address pool.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[kube(
    group = "starlingx.windriver.com",
    version = "v1",
    kind = "AddressPool",
    namespaced,
    shortname = "ap",
    doc = "AddressPool defines an IP address pool. Pools are realised on the platform by the Host reconciler of the active controller.",
    printcolumn = r#"{"name":"Subnet","type":"string","jsonPath":".spec.subnet"}"#,
    printcolumn = r#"{"name":"Prefix","type":"integer","jsonPath":".spec.prefix"}"#,
    printcolumn = r#"{"name":"InSync","type":"boolean","jsonPath":".status.inSync"}"#,
    printcolumn = r#"{"name":"Reconciled","type":"boolean","jsonPath":".status.reconciled"}"#
)]
#[kube(status = "AddressPoolStatus")]
#[serde(rename_all = "camelCase")]
pub struct AddressPoolSpec {
    /// Network address.
    pub subnet: String,

    /// Prefix length.
    pub prefix: i32,

    /// Gateway address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,

    /// Floating address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floating_address: Option<String>,

    /// Address of controller-0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller0_address: Option<String>,

    /// Address of controller-1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller1_address: Option<String>,

    /// Allocation settings.
    #[serde(default)]
    pub allocation: AllocationInfo,
}

/// Observed state of an [`AddressPool`].
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddressPoolStatus {
    /// Common status fields
    #[serde(flatten)]
    pub common: ResourceStatus,
}

/// VXLAN-specific settings.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VxlanInfo {
    /// Multicast group (dynamic mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multicast_group: Option<String>,
    /// Destination UDP port
    #[serde(rename = "udpPortNumber", default, skip_serializing_if = "Option::is_none")]
    pub udp_port: Option<i32>,
    /// Time to live
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i32>,
    /// `dynamic` or `static`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_mode: Option<String>,
}

/// A tenant data network.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[kube(
    group = "starlingx.windriver.com",
    version = "v1",
    kind = "DataNetwork",
    namespaced,
    shortname = "dn",
    doc = "DataNetwork defines a tenant data network of type flat, vlan or vxlan.",
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.type"}"#,
    printcolumn = r#"{"name":"InSync","type":"boolean","jsonPath":".status.inSync"}"#,
    printcolumn = r#"{"name":"Reconciled","type":"boolean","jsonPath":".status.reconciled"}"#
)]
#[kube(status = "DataNetworkStatus")]
#[serde(rename_all = "camelCase")]
pub struct DataNetworkSpec {
    /// `flat`, `vlan` or `vxlan`.
    #[serde(rename = "type")]
    pub network_type: String,

    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// MTU.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<i32>,

    /// VXLAN settings; only valid for type `vxlan`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vxlan: Option<VxlanInfo>,
}

/// Observed state of a [`DataNetwork`].
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataNetworkStatus {
    /// Common status fields
    #[serde(flatten)]
    pub common: ResourceStatus,
}

// ============================================================================
// PTP
// ============================================================================

/// A PTP service instance.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[kube(
    group = "starlingx.windriver.com",
    version = "v1",
    kind = "PtpInstance",
    namespaced,
    doc = "PtpInstance defines a PTP service instance (ptp4l, phc2sys, ts2phc, clock).",
    printcolumn = r#"{"name":"Service","type":"string","jsonPath":".spec.service"}"#,
    printcolumn = r#"{"name":"InSync","type":"boolean","jsonPath":".status.inSync"}"#,
    printcolumn = r#"{"name":"Reconciled","type":"boolean","jsonPath":".status.reconciled"}"#
)]
#[kube(status = "PtpInstanceStatus")]
#[serde(rename_all = "camelCase")]
pub struct PtpInstanceSpec {
    /// Service type.
    pub service: String,

    /// Instance parameters as `key=value` strings.
    #[serde(rename = "parameters", default, skip_serializing_if = "Option::is_none")]
    pub instance_parameters: Option<Vec<String>>,
}

/// Observed state of a [`PtpInstance`].
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PtpInstanceStatus {
    /// Common status fields
    #[serde(flatten)]
    pub common: ResourceStatus,
}

/// A PTP interface.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[kube(
    group = "starlingx.windriver.com",
    version = "v1",
    kind = "PtpInterface",
    namespaced,
    doc = "PtpInterface binds a set of PTP parameters to a PtpInstance.",
    printcolumn = r#"{"name":"Instance","type":"string","jsonPath":".spec.ptpinstance"}"#,
    printcolumn = r#"{"name":"InSync","type":"boolean","jsonPath":".status.inSync"}"#,
    printcolumn = r#"{"name":"Reconciled","type":"boolean","jsonPath":".status.reconciled"}"#
)]
#[kube(status = "PtpInterfaceStatus")]
#[serde(rename_all = "camelCase")]
pub struct PtpInterfaceSpec {
    /// Name of the PtpInstance this interface belongs to.
    #[serde(rename = "ptpinstance")]
    pub ptp_instance: String,

    /// Interface parameters as `key=value` strings.
    #[serde(rename = "parameters", default, skip_serializing_if = "Option::is_none")]
    pub interface_parameters: Option<Vec<String>>,
}

/// Observed state of a [`PtpInterface`].
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PtpInterfaceStatus {
    /// Common status fields
    #[serde(flatten)]
    pub common: ResourceStatus,
}
