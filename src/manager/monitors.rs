// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Monitor bodies used by the Host and System reconcilers.

use async_trait::async_trait;

use super::{Manager, Monitor, MonitorBody, MonitorTarget};
use crate::constants::{
    AVAILABLE_CONTROLLER_MONITOR_INTERVAL, DYNAMIC_HOST_MONITOR_INTERVAL,
    ENABLED_CONTROLLER_MONITOR_INTERVAL, FILESYSTEM_RESIZE_MONITOR_INTERVAL,
    KUBERNETES_RESOURCE_MONITOR_INTERVAL, PROVISIONING_ALLOWED_MONITOR_INTERVAL,
    STATE_CHANGE_MONITOR_INTERVAL, STATE_MONITOR_INTERVAL,
};
use crate::crd::{Host, MatchInfo, System};
use crate::errors::ReconcileError;
use crate::platform::inventory::hosts::{
    self, controllers_available, controllers_enabled, provisioning_allowed, ADMIN_LOCKED,
    ADMIN_UNLOCKED, AVAIL_AVAILABLE, OPER_DISABLED, OPER_ENABLED,
};
use crate::platform::inventory::system::{list_controller_filesystems, FS_RESIZE_IN_PROGRESS};
use crate::platform::PlatformClient;
use crate::reconcilers::host::find_existing_host;
use crate::store::ResourceKind;

fn host_target(host: &Host) -> MonitorTarget {
    MonitorTarget::for_object(ResourceKind::Host, host)
}

fn system_target(system: &System) -> MonitorTarget {
    MonitorTarget::for_object(ResourceKind::System, system)
}

// ============================================================================
// Host state
// ============================================================================

/// Waits for a host to become idle and, optionally, reach a given state.
pub struct StateMonitor {
    host_id: String,
    administrative: Option<&'static str>,
    operational: Option<&'static str>,
    availability: Option<&'static str>,
    state: String,
}

impl StateMonitor {
    fn desired(&self) -> String {
        format!(
            "{}/{}/{}",
            self.administrative.unwrap_or("*"),
            self.operational.unwrap_or("*"),
            self.availability.unwrap_or("*")
        )
    }

    fn stable_only(&self) -> bool {
        self.administrative.is_none() && self.operational.is_none() && self.availability.is_none()
    }
}

#[async_trait]
impl MonitorBody for StateMonitor {
    fn name(&self) -> &'static str {
        "host-state"
    }

    async fn run(
        &mut self,
        _manager: &Manager,
        client: &dyn PlatformClient,
    ) -> Result<bool, ReconcileError> {
        let host = match hosts::get_host(client, &self.host_id).await {
            Ok(host) => host,
            Err(e) => {
                self.state = format!("failed to get host {:?}: {e}", self.host_id);
                return Err(e.into());
            }
        };

        let current = format!(
            "{}/{}/{}/{}",
            host.administrative_state,
            host.operational_status,
            host.availability_status,
            host.task.as_deref().filter(|t| !t.is_empty()).unwrap_or("-")
        );

        let reached = host.idle()
            && self
                .administrative
                .is_none_or(|s| host.administrative_state == s)
            && self.operational.is_none_or(|s| host.operational_status == s)
            && self
                .availability
                .is_none_or(|s| host.availability_status == s);

        self.state = if reached {
            format!("desired state has been reached: {}", self.desired())
        } else if !host.idle() {
            format!("waiting for host to reach stable state: {current}")
        } else if self.stable_only() {
            format!("waiting for stable state; current: {current}")
        } else {
            format!("waiting for state: {}; current: {current}", self.desired())
        };

        Ok(reached)
    }

    fn state(&self) -> &str {
        &self.state
    }
}

fn state_monitor(
    host: &Host,
    host_id: &str,
    administrative: Option<&'static str>,
    operational: Option<&'static str>,
    availability: Option<&'static str>,
) -> Monitor {
    Monitor::new(
        StateMonitor {
            host_id: host_id.to_string(),
            administrative,
            operational,
            availability,
            state: String::new(),
        },
        STATE_MONITOR_INTERVAL,
        host_target(host),
    )
}

/// Waits for a host to be idle, whatever its state.
#[must_use]
pub fn stable_host_monitor(host: &Host, host_id: &str) -> Monitor {
    state_monitor(host, host_id, None, None, None)
}

/// Waits for a host to be locked and disabled.
#[must_use]
pub fn locked_disabled_host_monitor(host: &Host, host_id: &str) -> Monitor {
    state_monitor(host, host_id, Some(ADMIN_LOCKED), Some(OPER_DISABLED), None)
}

/// Waits for a host to be unlocked, enabled and available.
#[must_use]
pub fn unlocked_available_host_monitor(host: &Host, host_id: &str) -> Monitor {
    state_monitor(
        host,
        host_id,
        Some(ADMIN_UNLOCKED),
        Some(OPER_ENABLED),
        Some(AVAIL_AVAILABLE),
    )
}

/// Fires when a host's state changes after it was first observed.
pub struct StateChangeMonitor {
    host_id: String,
    last: Option<String>,
    state: String,
}

#[async_trait]
impl MonitorBody for StateChangeMonitor {
    fn name(&self) -> &'static str {
        "host-state-change"
    }

    async fn run(
        &mut self,
        _manager: &Manager,
        client: &dyn PlatformClient,
    ) -> Result<bool, ReconcileError> {
        let host = match hosts::get_host(client, &self.host_id).await {
            Ok(host) => host,
            Err(e) => {
                self.state = format!("failed to get host {:?}: {e}", self.host_id);
                return Err(e.into());
            }
        };

        let current = format!(
            "{}/{}/{}",
            host.administrative_state, host.operational_status, host.availability_status
        );

        match self.last.replace(current.clone()) {
            Some(previous) if previous != current => {
                self.state = format!("state changed from {previous} to {current}");
                Ok(true)
            }
            _ => {
                self.state = "monitoring for state changes".to_string();
                Ok(false)
            }
        }
    }

    fn state(&self) -> &str {
        &self.state
    }
}

/// Re-triggers the host reconciler whenever the platform reports a new host state.
#[must_use]
pub fn state_change_monitor(host: &Host, host_id: &str) -> Monitor {
    Monitor::new(
        StateChangeMonitor {
            host_id: host_id.to_string(),
            last: None,
            state: String::new(),
        },
        STATE_CHANGE_MONITOR_INTERVAL,
        host_target(host),
    )
}

// ============================================================================
// Controller counts
// ============================================================================

/// Waits for a number of controllers to be unlocked and enabled.
pub struct EnabledControllersMonitor {
    required: usize,
    state: String,
}

#[async_trait]
impl MonitorBody for EnabledControllersMonitor {
    fn name(&self) -> &'static str {
        "enabled-controllers"
    }

    async fn run(
        &mut self,
        _manager: &Manager,
        client: &dyn PlatformClient,
    ) -> Result<bool, ReconcileError> {
        let hosts = hosts::list_hosts(client).await.inspect_err(|e| {
            self.state = format!("failed to query host list: {e}");
        })?;

        if controllers_enabled(&hosts, self.required) {
            self.state = format!("required number of controllers are enabled: {}", self.required);
            return Ok(true);
        }
        self.state = format!("waiting for {} controller(s) to be enabled", self.required);
        Ok(false)
    }

    fn state(&self) -> &str {
        &self.state
    }
}

#[must_use]
pub fn enabled_controllers_monitor(host: &Host, required: usize) -> Monitor {
    Monitor::new(
        EnabledControllersMonitor {
            required,
            state: String::new(),
        },
        ENABLED_CONTROLLER_MONITOR_INTERVAL,
        host_target(host),
    )
}

/// Waits for a number of controllers to be unlocked, enabled and available.
pub struct AvailableControllersMonitor {
    required: usize,
    state: String,
}

#[async_trait]
impl MonitorBody for AvailableControllersMonitor {
    fn name(&self) -> &'static str {
        "available-controllers"
    }

    async fn run(
        &mut self,
        _manager: &Manager,
        client: &dyn PlatformClient,
    ) -> Result<bool, ReconcileError> {
        let hosts = hosts::list_hosts(client).await.inspect_err(|e| {
            self.state = format!("failed to query host list: {e}");
        })?;

        if controllers_available(&hosts, self.required) {
            self.state = "required number of controllers are available".to_string();
            return Ok(true);
        }
        self.state = format!("waiting for {} controller(s) to be available", self.required);
        Ok(false)
    }

    fn state(&self) -> &str {
        &self.state
    }
}

#[must_use]
pub fn available_controllers_monitor(system: &System, required: usize) -> Monitor {
    Monitor::new(
        AvailableControllersMonitor {
            required,
            state: String::new(),
        },
        AVAILABLE_CONTROLLER_MONITOR_INTERVAL,
        system_target(system),
    )
}

// ============================================================================
// Provisioning
// ============================================================================

/// Waits for the first controller to allow host provisioning.
pub struct ProvisioningAllowedMonitor {
    state: String,
}

#[async_trait]
impl MonitorBody for ProvisioningAllowedMonitor {
    fn name(&self) -> &'static str {
        "provisioning-allowed"
    }

    async fn run(
        &mut self,
        _manager: &Manager,
        client: &dyn PlatformClient,
    ) -> Result<bool, ReconcileError> {
        let hosts = hosts::list_hosts(client).await.inspect_err(|e| {
            self.state = format!("failed to query host list: {e}");
        })?;

        if provisioning_allowed(&hosts) {
            self.state = "host provisioning is now allowed".to_string();
            return Ok(true);
        }
        self.state = "waiting for host provisioning to be allowed".to_string();
        Ok(false)
    }

    fn state(&self) -> &str {
        &self.state
    }
}

#[must_use]
pub fn provisioning_allowed_monitor(host: &Host) -> Monitor {
    Monitor::new(
        ProvisioningAllowedMonitor {
            state: String::new(),
        },
        PROVISIONING_ALLOWED_MONITOR_INTERVAL,
        host_target(host),
    )
}

/// Waits for a dynamically provisioned host to appear in inventory.
pub struct DynamicHostMonitor {
    hostname: String,
    criteria: Option<MatchInfo>,
    boot_mac: Option<String>,
    state: String,
}

#[async_trait]
impl MonitorBody for DynamicHostMonitor {
    fn name(&self) -> &'static str {
        "dynamic-host"
    }

    async fn run(
        &mut self,
        _manager: &Manager,
        client: &dyn PlatformClient,
    ) -> Result<bool, ReconcileError> {
        let hosts = hosts::list_hosts(client).await.inspect_err(|e| {
            self.state = format!("failed to query host list: {e}");
        })?;

        let found = find_existing_host(
            &hosts,
            &self.hostname,
            self.criteria.as_ref(),
            self.boot_mac.as_deref(),
        );
        if found.is_some() {
            self.state = format!("host inventory record has been found for {:?}", self.hostname);
            return Ok(true);
        }
        self.state = format!("waiting for {:?} to appear in system inventory", self.hostname);
        Ok(false)
    }

    fn state(&self) -> &str {
        &self.state
    }
}

#[must_use]
pub fn dynamic_host_monitor(
    host: &Host,
    criteria: Option<MatchInfo>,
    boot_mac: Option<String>,
) -> Monitor {
    Monitor::new(
        DynamicHostMonitor {
            hostname: kube::ResourceExt::name_any(host),
            criteria,
            boot_mac,
            state: String::new(),
        },
        DYNAMIC_HOST_MONITOR_INTERVAL,
        host_target(host),
    )
}

// ============================================================================
// Kubernetes resources
// ============================================================================

/// Waits for a Kubernetes object to exist.
///
/// Read failures are not reported as errors; the monitor keeps polling.
pub struct KubernetesResourceMonitor {
    kind: ResourceKind,
    namespace: String,
    name: String,
    state: String,
}

#[async_trait]
impl MonitorBody for KubernetesResourceMonitor {
    fn name(&self) -> &'static str {
        "kubernetes-resource"
    }

    async fn run(
        &mut self,
        manager: &Manager,
        _client: &dyn PlatformClient,
    ) -> Result<bool, ReconcileError> {
        let resource = format!("{}/{}", self.namespace, self.name);
        match manager
            .store()
            .get(self.kind, &self.namespace, &self.name)
            .await
        {
            Ok(Some(_)) => {
                self.state = format!("kubernetes {} {resource} is now available", self.kind);
                Ok(true)
            }
            Ok(None) => {
                self.state = format!("waiting for kubernetes {} {resource}", self.kind);
                Ok(false)
            }
            Err(e) => {
                self.state = format!("failed to query kubernetes {} {resource}: {e}", self.kind);
                Ok(false)
            }
        }
    }

    fn state(&self) -> &str {
        &self.state
    }
}

/// Waits for a Secret in the host's namespace.
#[must_use]
pub fn kubernetes_secret_monitor(host: &Host, secret_name: &str) -> Monitor {
    let target = host_target(host);
    Monitor::new(
        KubernetesResourceMonitor {
            kind: ResourceKind::Secret,
            namespace: target.namespace.clone(),
            name: secret_name.to_string(),
            state: String::new(),
        },
        KUBERNETES_RESOURCE_MONITOR_INTERVAL,
        target,
    )
}

// ============================================================================
// Filesystems
// ============================================================================

/// Waits for every controller filesystem resize to finish.
pub struct FileSystemResizeMonitor {
    state: String,
}

#[async_trait]
impl MonitorBody for FileSystemResizeMonitor {
    fn name(&self) -> &'static str {
        "filesystem-resize"
    }

    async fn run(
        &mut self,
        _manager: &Manager,
        client: &dyn PlatformClient,
    ) -> Result<bool, ReconcileError> {
        let filesystems = list_controller_filesystems(client)
            .await
            .inspect_err(|e| self.state = format!("failed to get filesystems: {e}"))?;

        if let Some(fs) = filesystems.iter().find(|fs| fs.state == FS_RESIZE_IN_PROGRESS) {
            self.state = format!("waiting for filesystem {:?} to finish resizing", fs.name);
            return Ok(false);
        }
        self.state = "all filesystems are ready for resizing".to_string();
        Ok(true)
    }

    fn state(&self) -> &str {
        &self.state
    }
}

#[must_use]
pub fn filesystem_resize_monitor(system: &System) -> Monitor {
    Monitor::new(
        FileSystemResizeMonitor {
            state: String::new(),
        },
        FILESYSTEM_RESIZE_MONITOR_INTERVAL,
        system_target(system),
    )
}

#[cfg(test)]
#[path = "monitors_tests.rs"]
mod monitors_tests;
