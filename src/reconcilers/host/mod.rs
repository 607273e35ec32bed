// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Host reconciliation.
//!
//! A `Host` is matched to a platform host by the UUID recorded in its status,
//! by hostname, or by its match criteria. Statically provisioned hosts are
//! created by the reconciler; dynamic hosts are waited for until they appear
//! in the platform inventory.
//!
//! For an existing host the reconciler applies, in order:
//!
//! 1. basic attributes and board management settings ([`attributes`])
//! 2. labels ([`labels`])
//! 3. platform networks and address pools, on the active controller only
//!    ([`networks`])
//! 4. the administrative state
//!
//! Any step that has to wait for the host or the system to reach a state
//! starts a monitor and returns [`ReconcileError::WaitForMonitor`]. After a
//! successful pass a state change monitor keeps watching the host so that
//! transitions made outside the operator are noticed.

pub mod attributes;
pub mod labels;
pub mod networks;

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use self::attributes::{
    attribute_changes, bm_credentials, check_password_transport, requires_lock, BmCredentials,
    HostOpts,
};
use self::labels::{apply_label_changes, label_changes, label_delta, LabelChanges};
use self::networks::reconcile_platform_networks;
use super::finalizers::{is_deleting, remove_finalizer};
use super::hostprofile::{load_profiles, resolve_host_profile};
use super::lifecycle::{check_after_in_sync, complete, prepare, require_client, Change, Preamble};
use super::status::{is_principal, patch_status, record_delta};
use crate::config::ReconcilerName;
use crate::constants::STRATEGY_LOCK_REQUIRED;
use crate::context::Context;
use crate::crd::{Host, HostProfileSpec, MatchInfo};
use crate::delta::delta_string;
use crate::errors::{PlatformError, ReconcileError};
use crate::events::reasons;
use crate::manager::monitors::{
    dynamic_host_monitor, enabled_controllers_monitor, locked_disabled_host_monitor,
    provisioning_allowed_monitor, stable_host_monitor, state_change_monitor,
    unlocked_available_host_monitor,
};
use crate::manager::{strategy, Monitor};
use crate::metrics;
use crate::platform::inventory::hosts::{
    self, controllers_enabled, provisioning_allowed, Host as PlatformHost, ACTION_LOCK,
    ACTION_REINSTALL, ACTION_UNLOCK, ADMIN_LOCKED, ADMIN_UNLOCKED, CONTROLLER_0,
    PERSONALITY_CONTROLLER, PERSONALITY_STORAGE, PERSONALITY_WORKER,
};
use crate::platform::{PatchOp, PlatformClient};

/// Hosts that register themselves in the inventory when they boot.
pub const PROVISIONING_DYNAMIC: &str = "dynamic";

/// Hosts created by the operator before they boot.
pub const PROVISIONING_STATIC: &str = "static";

/// Controllers that must be enabled before a worker or storage host is unlocked.
const REQUIRED_ENABLED_CONTROLLERS: usize = 2;

/// Reconciles a `Host` resource.
///
/// # Errors
///
/// Returns an error if the preamble fails, the host has to wait for a state
/// change, or a platform or status call fails.
pub async fn reconcile_host(host: Arc<Host>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    let instance = match prepare(&ctx, host.as_ref()).await? {
        Preamble::Done(action) => return Ok(action),
        Preamble::Proceed(prepared) => prepared.instance,
    };
    let client = require_client(&ctx, &instance).await?;

    let profile = effective_profile(&ctx, &instance).await;
    let boot_mac = profile.as_ref().ok().and_then(|p| p.boot_mac.clone());

    let platform_hosts = hosts::list_hosts(client.as_ref()).await?;
    let existing =
        find_platform_host(client.as_ref(), &instance, &platform_hosts, boot_mac.as_deref())
            .await?;

    if is_deleting(&instance) {
        reconcile_deleted(&ctx, client.as_ref(), &instance, existing.as_ref()).await?;
        return Ok(Action::await_change());
    }

    let result = match profile {
        Err(e) => Err(e),
        Ok(profile) => match existing {
            None => {
                reconcile_new(&ctx, client.as_ref(), &instance, &profile, &platform_hosts).await
            }
            Some(current) => {
                reconcile_existing(
                    &ctx,
                    client.as_ref(),
                    &instance,
                    &profile,
                    &current,
                    &platform_hosts,
                )
                .await
            }
        },
    };

    let host_id = result.as_ref().ok().cloned();
    let action = complete(&ctx, &instance, result.map(Some)).await?;

    if let (Some(host_id), Some(uid)) = (host_id, instance.uid()) {
        if !ctx.manager.has_monitor(&uid) {
            // Nothing waits on this monitor; it only triggers reconciles.
            let _ = ctx.manager.start_monitor(
                state_change_monitor(&instance, &host_id),
                "watching for host state changes",
            );
        }
    }

    Ok(action)
}

/// Resolves the host's profile chain and overrides.
async fn effective_profile(
    ctx: &Context,
    instance: &Host,
) -> Result<HostProfileSpec, ReconcileError> {
    let namespace = instance.namespace().unwrap_or_default();
    let profiles = load_profiles(ctx.store(), &namespace).await?;
    resolve_host_profile(&profiles, instance)
}

fn same_value(wanted: Option<&str>, actual: Option<&str>) -> Option<bool> {
    wanted.map(|w| actual.is_some_and(|a| a.eq_ignore_ascii_case(w)))
}

/// Whether a host satisfies every criterion that is set, and at least one is.
fn matches_criteria(host: &PlatformHost, criteria: &MatchInfo) -> bool {
    let mut checks = Vec::new();
    checks.extend(same_value(criteria.boot_mac.as_deref(), Some(host.boot_mac.as_str())));
    if let Some(bm) = &criteria.board_management {
        checks.extend(same_value(bm.address.as_deref(), host.bm_address.as_deref()));
        checks.extend(same_value(bm.bm_type.as_deref(), host.bm_type.as_deref()));
    }
    if let Some(dmi) = &criteria.dmi {
        checks.extend(same_value(dmi.serial_number.as_deref(), host.serial_number.as_deref()));
        checks.extend(same_value(dmi.asset_tag.as_deref(), host.asset_tag.as_deref()));
    }
    !checks.is_empty() && checks.into_iter().all(|c| c)
}

/// Finds the inventory record for a host.
///
/// A host with the same hostname wins. Otherwise a host that has no hostname
/// yet is matched by the criteria, then by the profile's boot MAC.
#[must_use]
pub fn find_existing_host<'a>(
    hosts: &'a [PlatformHost],
    hostname: &str,
    criteria: Option<&MatchInfo>,
    boot_mac: Option<&str>,
) -> Option<&'a PlatformHost> {
    if let Some(host) = hosts.iter().find(|h| h.hostname == hostname) {
        return Some(host);
    }

    let unnamed = || hosts.iter().filter(|h| h.hostname.is_empty());

    if let Some(host) = criteria.and_then(|c| unnamed().find(|h| matches_criteria(h, c))) {
        return Some(host);
    }

    let boot_mac = boot_mac.filter(|m| !m.is_empty())?;
    unnamed().find(|h| h.boot_mac.eq_ignore_ascii_case(boot_mac))
}

async fn find_platform_host(
    client: &dyn PlatformClient,
    instance: &Host,
    platform_hosts: &[PlatformHost],
    boot_mac: Option<&str>,
) -> Result<Option<PlatformHost>, PlatformError> {
    let id = instance
        .status
        .as_ref()
        .and_then(|s| s.common.id.as_deref());

    if let Some(id) = id {
        match hosts::get_host(client, id).await {
            Ok(host) => return Ok(Some(host)),
            Err(e) if e.is_not_found() => {
                info!(name = %instance.name_any(), id, "resource no longer exists");
            }
            Err(e) => return Err(e),
        }
    }

    let found = find_existing_host(
        platform_hosts,
        &instance.name_any(),
        instance.spec.match_info.as_ref(),
        boot_mac,
    )
    .cloned();
    if let Some(host) = &found {
        info!(name = %instance.name_any(), uuid = %host.id, "found existing host");
    }
    Ok(found)
}

fn wait(ctx: &Context, monitor: Monitor, message: &str) -> ReconcileError {
    ctx.manager.start_monitor(monitor, message)
}

async fn reconcile_deleted(
    ctx: &Context,
    client: &dyn PlatformClient,
    instance: &Host,
    existing: Option<&PlatformHost>,
) -> Result<(), ReconcileError> {
    if let Some(current) = existing {
        if current.is_active_controller() {
            info!(name = %instance.name_any(), "not deleting the active controller");
        } else if !current.stable() {
            return Err(wait(
                ctx,
                stable_host_monitor(instance, &current.id),
                "waiting for a stable state before deleting host",
            ));
        } else if !current.is_locked_disabled() {
            if current.administrative_state != ADMIN_LOCKED {
                hosts::host_action(client, &current.id, ACTION_LOCK).await?;
                metrics::record_platform_change("Host", "lock");
                ctx.normal_event(instance, reasons::UPDATED, "host has been locked")
                    .await;
            }
            return Err(wait(
                ctx,
                locked_disabled_host_monitor(instance, &current.id),
                "waiting for host to lock before deleting it",
            ));
        } else {
            info!(name = %instance.name_any(), uuid = %current.id, "deleting host");
            match hosts::delete_host(client, &current.id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
            metrics::record_platform_change("Host", "delete");
            ctx.normal_event(instance, reasons::DELETED, "host has been deleted")
                .await;
        }
    }

    if let Some(uid) = instance.uid() {
        ctx.manager.cancel_monitor(&uid);
    }
    remove_finalizer(ctx.store(), instance).await?;
    Ok(())
}

/// Reads the BMC credentials when board management is managed.
async fn credentials(
    ctx: &Context,
    instance: &Host,
    profile: &HostProfileSpec,
    manage_bmc: bool,
) -> Result<Option<BmCredentials>, ReconcileError> {
    if !manage_bmc {
        return Ok(None);
    }
    bm_credentials(ctx, instance, profile.board_management.as_ref()).await
}

async fn reconcile_new(
    ctx: &Context,
    client: &dyn PlatformClient,
    instance: &Host,
    profile: &HostProfileSpec,
    platform_hosts: &[PlatformHost],
) -> Result<String, ReconcileError> {
    let mode = profile
        .provisioning_mode
        .as_deref()
        .unwrap_or(PROVISIONING_DYNAMIC);

    if mode != PROVISIONING_STATIC {
        return Err(wait(
            ctx,
            dynamic_host_monitor(
                instance,
                instance.spec.match_info.clone(),
                profile.boot_mac.clone(),
            ),
            "waiting for dynamic host to appear in inventory",
        ));
    }

    if !provisioning_allowed(platform_hosts) {
        return Err(wait(
            ctx,
            provisioning_allowed_monitor(instance),
            "waiting for system to allow creating static hosts",
        ));
    }

    check_after_in_sync(ctx, instance, Change::Provision).await?;

    let manage_bmc = ctx.config.is_enabled(ReconcilerName::Bmc);
    let credentials = credentials(ctx, instance, profile, manage_bmc).await?;
    let username = credentials.as_ref().map(|c| c.username.clone());
    let opts = HostOpts::desired(&instance.name_any(), profile, manage_bmc, username);

    let mut body = serde_json::to_value(&opts)?;
    if let (Some(credentials), Value::Object(fields)) = (&credentials, &mut body) {
        check_password_transport(ctx, client)?;
        fields.insert("bm_password".to_string(), json!(credentials.password));
    }

    info!(name = %instance.name_any(), "creating static host");
    let created = hosts::create_host(client, &body).await?;
    metrics::record_platform_change("Host", "create");
    ctx.normal_event(instance, reasons::CREATED, "static host has been created")
        .await;

    patch_status(ctx.store(), instance, json!({ "id": created.id })).await?;

    if profile.power_on == Some(true) && profile.board_management.is_some() {
        info!(name = %instance.name_any(), "powering on static host");
        hosts::host_action(client, &created.id, ACTION_REINSTALL).await?;
    }

    Ok(created.id)
}

/// Records the platform state and, the first time, the original attributes.
async fn capture_status(
    ctx: &Context,
    instance: &Host,
    current: &PlatformHost,
) -> Result<Host, ReconcileError> {
    let status = instance.status.clone().unwrap_or_default();
    let mut patch = Map::new();

    if status.common.id.as_deref() != Some(current.id.as_str()) {
        patch.insert("id".to_string(), json!(current.id));
    }
    let states = [
        ("administrativeState", &status.administrative_state, &current.administrative_state),
        ("operationalStatus", &status.operational_status, &current.operational_status),
        ("availabilityStatus", &status.availability_status, &current.availability_status),
    ];
    for (field, recorded, observed) in states {
        if recorded.as_deref() != Some(observed.as_str()) {
            patch.insert(field.to_string(), json!(observed));
        }
    }
    if status.defaults.is_none() {
        let defaults = serde_json::to_string(&HostOpts::current(current))?;
        patch.insert("defaults".to_string(), json!(defaults));
    }

    if patch.is_empty() {
        return Ok(instance.clone());
    }
    Ok(patch_status(ctx.store(), instance, Value::Object(patch)).await?)
}

fn recorded_defaults(instance: &Host) -> Result<HostOpts, ReconcileError> {
    match instance.status.as_ref().and_then(|s| s.defaults.as_deref()) {
        Some(defaults) => Ok(serde_json::from_str(defaults)?),
        None => Ok(HostOpts::default()),
    }
}

/// Personality under which the strategy orchestrator tracks a host.
fn strategy_personality(current: &PlatformHost, profile: &HostProfileSpec) -> &'static str {
    match current.personality.as_str() {
        PERSONALITY_CONTROLLER if profile.has_worker_sub_function() => {
            strategy::PERSONALITY_CONTROLLER_WORKER
        }
        PERSONALITY_CONTROLLER => strategy::PERSONALITY_CONTROLLER,
        PERSONALITY_STORAGE => strategy::PERSONALITY_STORAGE,
        _ => strategy::PERSONALITY_WORKER,
    }
}

fn state_delta(
    profile: &HostProfileSpec,
    current: &PlatformHost,
) -> Result<String, ReconcileError> {
    let Some(desired) = profile.administrative_state.as_deref() else {
        return Ok(String::new());
    };
    Ok(delta_string(
        &json!({ "administrativeState": desired }),
        &json!({ "administrativeState": current.administrative_state }),
    )?)
}

fn join_deltas(parts: &[String]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether this host realises the platform networks of the namespace.
fn realises_networks(current: &PlatformHost, platform_hosts: &[PlatformHost]) -> bool {
    if platform_hosts.iter().any(PlatformHost::is_active_controller) {
        current.is_active_controller()
    } else {
        current.hostname == CONTROLLER_0
    }
}

async fn reconcile_existing(
    ctx: &Context,
    client: &dyn PlatformClient,
    instance: &Host,
    profile: &HostProfileSpec,
    current: &PlatformHost,
    platform_hosts: &[PlatformHost],
) -> Result<String, ReconcileError> {
    if !current.stable() {
        return Err(wait(
            ctx,
            stable_host_monitor(instance, &current.id),
            "waiting for a stable state",
        ));
    }

    if current.hostname.is_empty() && !provisioning_allowed(platform_hosts) {
        return Err(wait(
            ctx,
            provisioning_allowed_monitor(instance),
            "waiting for system to allow host provisioning",
        ));
    }

    let instance = capture_status(ctx, instance, current).await?;
    let defaults = recorded_defaults(&instance)?;
    let name = instance.name_any();

    let manage_bmc = ctx.config.is_enabled(ReconcilerName::Bmc);
    let credentials = credentials(ctx, &instance, profile, manage_bmc).await?;
    let username = credentials.as_ref().map(|c| c.username.clone());

    let desired = HostOpts::desired(&name, profile, manage_bmc, username).backed_by(&defaults);
    let mut changes = attribute_changes(&desired, &HostOpts::current(current))?;
    if !manage_bmc {
        changes.retain(|field| !field.starts_with("bm_"));
    }

    let mut locked_fields: Vec<String> = Vec::new();
    if !changes.is_empty() && !current.is_locked_disabled() {
        locked_fields = changes
            .desired
            .keys()
            .filter(|f| requires_lock(f))
            .cloned()
            .collect();
    }

    let (labels, labels_delta) = match &profile.labels {
        Some(desired_labels) => {
            let current_labels = hosts::list_labels(client, &current.id).await?;
            (
                label_changes(&current_labels, desired_labels),
                label_delta(&current_labels, desired_labels)?,
            )
        }
        None => (LabelChanges::default(), String::new()),
    };

    let delta = join_deltas(&[changes.delta()?, labels_delta, state_delta(profile, current)?]);
    record_delta(ctx.store(), &instance, &delta).await?;

    let state_differs = profile
        .administrative_state
        .as_deref()
        .is_some_and(|s| s != current.administrative_state);
    if !changes.is_empty() || !labels.is_empty() || state_differs {
        check_after_in_sync(ctx, &instance, Change::Configure).await?;
    }

    if !locked_fields.is_empty() && is_principal(&instance) {
        let personality = strategy_personality(current, profile);
        info!(
            name = %name,
            fields = ?locked_fields,
            personality,
            "host must be locked to apply changes"
        );
        ctx.manager.set_resource_info(
            strategy::RESOURCE_HOST,
            personality,
            &name,
            false,
            STRATEGY_LOCK_REQUIRED,
        );
        patch_status(
            ctx.store(),
            &instance,
            json!({ "strategyRequired": STRATEGY_LOCK_REQUIRED }),
        )
        .await?;
        return Err(wait(
            ctx,
            locked_disabled_host_monitor(&instance, &current.id),
            "waiting for host to be locked by the update strategy",
        ));
    }

    // Bootstrap changes that need a lock are applied once the host is locked.
    changes.retain(|field| !locked_fields.iter().any(|f| f == field));

    if !changes.is_empty() {
        let mut ops = changes.patch_ops();
        let bmc_changed = ["bm_type", "bm_ip", "bm_username"]
            .iter()
            .any(|f| changes.contains(f));
        if let Some(credentials) = credentials.as_ref().filter(|_| bmc_changed) {
            check_password_transport(ctx, client)?;
            ops.push(PatchOp::replace(
                "bm_password",
                credentials.password.clone(),
            ));
        }

        info!(
            name = %name,
            fields = ?changes.desired.keys().collect::<Vec<_>>(),
            "updating host attributes"
        );
        hosts::update_host(client, &current.id, &ops).await?;
        metrics::record_platform_change("Host", "update");
        ctx.normal_event(&instance, reasons::UPDATED, "attributes have been updated")
            .await;
    }

    if !labels.is_empty() {
        apply_label_changes(ctx, client, &instance, &current.id, &labels).await?;
    }

    if realises_networks(current, platform_hosts) {
        let namespace = instance.namespace().unwrap_or_default();
        reconcile_platform_networks(ctx, client, &namespace).await?;
    }

    if !locked_fields.is_empty() {
        return Err(ReconcileError::ResourceStatusDependency(format!(
            "host must be locked to change: {}",
            locked_fields.join(",")
        )));
    }

    reconcile_state(ctx, client, &instance, profile, current, platform_hosts).await?;

    Ok(current.id.clone())
}

/// Drives the host to the administrative state of its profile.
async fn reconcile_state(
    ctx: &Context,
    client: &dyn PlatformClient,
    instance: &Host,
    profile: &HostProfileSpec,
    current: &PlatformHost,
    platform_hosts: &[PlatformHost],
) -> Result<(), ReconcileError> {
    let Some(desired) = profile.administrative_state.as_deref() else {
        return Ok(());
    };

    match desired {
        ADMIN_LOCKED if current.administrative_state == ADMIN_LOCKED => Ok(()),
        ADMIN_LOCKED => {
            info!(name = %instance.name_any(), "locking host");
            hosts::host_action(client, &current.id, ACTION_LOCK).await?;
            metrics::record_platform_change("Host", "lock");
            ctx.normal_event(instance, reasons::UPDATED, "host has been locked")
                .await;
            Err(wait(
                ctx,
                locked_disabled_host_monitor(instance, &current.id),
                "waiting for host to lock",
            ))
        }
        ADMIN_UNLOCKED if current.administrative_state == ADMIN_UNLOCKED => {
            if current.is_unlocked_available() {
                debug!(name = %instance.name_any(), "host is unlocked and available");
                return Ok(());
            }
            Err(wait(
                ctx,
                unlocked_available_host_monitor(instance, &current.id),
                "waiting for host to become available",
            ))
        }
        ADMIN_UNLOCKED => {
            if !current.is_locked_disabled() {
                return Err(wait(
                    ctx,
                    locked_disabled_host_monitor(instance, &current.id),
                    "waiting for host to be locked and disabled before unlocking it",
                ));
            }

            let needs_controllers = matches!(
                current.personality.as_str(),
                PERSONALITY_WORKER | PERSONALITY_STORAGE
            );
            if needs_controllers
                && !controllers_enabled(platform_hosts, REQUIRED_ENABLED_CONTROLLERS)
            {
                return Err(wait(
                    ctx,
                    enabled_controllers_monitor(instance, REQUIRED_ENABLED_CONTROLLERS),
                    "waiting for controllers to be enabled before unlocking host",
                ));
            }

            info!(name = %instance.name_any(), "unlocking host");
            hosts::host_action(client, &current.id, ACTION_UNLOCK).await?;
            metrics::record_platform_change("Host", "unlock");
            ctx.normal_event(instance, reasons::UPDATED, "host has been unlocked")
                .await;
            Err(wait(
                ctx,
                unlocked_available_host_monitor(instance, &current.id),
                "waiting for host to become available",
            ))
        }
        other => {
            warn!(name = %instance.name_any(), state = other, "unsupported administrative state");
            Err(ReconcileError::Validation(format!(
                "unsupported administrative state: {other:?}"
            )))
        }
    }
}
