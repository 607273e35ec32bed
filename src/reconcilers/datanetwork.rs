// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DataNetwork reconciliation.
//!
//! A `DataNetwork` maps one-to-one onto a platform data network. The
//! platform object is found by the UUID recorded in the status, or by name
//! and type for resources that have not been realised yet.

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use serde::Serialize;
use tracing::{debug, info};

use super::finalizers::{is_deleting, remove_finalizer};
use super::lifecycle::{check_after_in_sync, complete, prepare, require_client, Change, Preamble};
use super::status::record_delta;
use crate::context::Context;
use crate::crd::DataNetwork;
use crate::delta::delta_string;
use crate::errors::{PlatformError, ReconcileError};
use crate::events::reasons;
use crate::metrics;
use crate::platform::inventory::networks::{
    self, DataNetwork as PlatformDataNetwork, DATA_NETWORK_TYPE_VXLAN,
};
use crate::platform::{PatchOp, PlatformClient};

/// Reconciles a `DataNetwork` resource.
///
/// # Errors
///
/// Returns an error if the preamble, a platform call or a status write fails.
pub async fn reconcile_data_network(
    network: Arc<DataNetwork>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let instance = match prepare(&ctx, network.as_ref()).await? {
        Preamble::Done(action) => return Ok(action),
        Preamble::Proceed(prepared) => prepared.instance,
    };
    let client = require_client(&ctx, &instance).await?;

    let existing = find_existing(client.as_ref(), &instance).await?;

    if is_deleting(&instance) {
        reconcile_deleted(&ctx, client.as_ref(), &instance, existing.as_ref()).await?;
        return Ok(Action::await_change());
    }

    let result = match existing {
        None => reconcile_new(&ctx, client.as_ref(), &instance)
            .await
            .map(|created| Some(created.id)),
        Some(current) => reconcile_updated(&ctx, client.as_ref(), &instance, &current)
            .await
            .map(|()| Some(current.id)),
    };

    complete(&ctx, &instance, result).await
}

/// Finds the platform data network backing `instance`.
///
/// A recorded UUID that no longer exists yields `None` so that the network
/// is created again.
///
/// # Errors
///
/// Returns an error if the platform cannot be queried.
pub async fn find_existing(
    client: &dyn PlatformClient,
    instance: &DataNetwork,
) -> Result<Option<PlatformDataNetwork>, PlatformError> {
    let id = instance
        .status
        .as_ref()
        .and_then(|s| s.common.id.as_deref());

    if let Some(id) = id {
        return match networks::get_data_network(client, id).await {
            Ok(network) => Ok(Some(network)),
            Err(e) if e.is_not_found() => {
                info!(name = %instance.name_any(), id, "resource no longer exists");
                Ok(None)
            }
            Err(e) => Err(e),
        };
    }

    let found = networks::list_data_networks(client)
        .await?
        .into_iter()
        .find(|n| n.name == instance.name_any() && n.network_type == instance.spec.network_type);
    if let Some(network) = &found {
        info!(name = %network.name, uuid = %network.id, "found existing data network");
    }
    Ok(found)
}

/// Fields of a data network as sent to and compared with the platform.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
struct DataNetworkOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "network_type", skip_serializing_if = "Option::is_none")]
    network_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mtu: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    multicast_group: Option<String>,
    #[serde(rename = "port_num", skip_serializing_if = "Option::is_none")]
    udp_port: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl: Option<i32>,
}

impl DataNetworkOpts {
    fn patch_ops(&self) -> Vec<PatchOp> {
        let Ok(serde_json::Value::Object(fields)) = serde_json::to_value(self) else {
            return Vec::new();
        };
        fields
            .into_iter()
            .map(|(field, value)| PatchOp::replace(&field, value))
            .collect()
    }

    /// The fields of `self` laid over `base`.
    fn overlay(&self, base: &Self) -> Self {
        Self {
            name: self.name.clone().or_else(|| base.name.clone()),
            network_type: self.network_type.clone().or_else(|| base.network_type.clone()),
            description: self.description.clone().or_else(|| base.description.clone()),
            mtu: self.mtu.or(base.mtu),
            mode: self.mode.clone().or_else(|| base.mode.clone()),
            multicast_group: self
                .multicast_group
                .clone()
                .or_else(|| base.multicast_group.clone()),
            udp_port: self.udp_port.or(base.udp_port),
            ttl: self.ttl.or(base.ttl),
        }
    }
}

fn create_opts(instance: &DataNetwork) -> DataNetworkOpts {
    let spec = &instance.spec;
    let mut opts = DataNetworkOpts {
        name: Some(instance.name_any()),
        network_type: Some(spec.network_type.clone()),
        description: spec.description.clone(),
        mtu: spec.mtu,
        ..Default::default()
    };
    if spec.network_type == DATA_NETWORK_TYPE_VXLAN {
        if let Some(vxlan) = &spec.vxlan {
            opts.mode = vxlan.endpoint_mode.clone();
            opts.multicast_group = vxlan.multicast_group.clone();
            opts.udp_port = vxlan.udp_port;
            opts.ttl = vxlan.ttl;
        }
    }
    opts
}

/// Keeps `desired` when both sides are set and differ.
fn changed<T: PartialEq + Clone>(desired: Option<&T>, current: Option<&T>) -> Option<T> {
    match (desired, current) {
        (Some(d), Some(c)) if d != c => Some(d.clone()),
        _ => None,
    }
}

/// Builds the update needed to bring `current` in line with the spec.
///
/// Returns `None` when the platform already matches. VXLAN attributes are
/// only compared when the platform reports them.
fn update_opts(instance: &DataNetwork, current: &PlatformDataNetwork) -> Option<DataNetworkOpts> {
    let spec = &instance.spec;
    let mut opts = DataNetworkOpts::default();

    if spec.network_type != current.network_type {
        opts.network_type = Some(spec.network_type.clone());
    }
    opts.mtu = spec.mtu.filter(|mtu| *mtu != current.mtu);
    opts.description = spec
        .description
        .clone()
        .filter(|d| *d != current.description);

    if spec.network_type == DATA_NETWORK_TYPE_VXLAN {
        if let Some(vxlan) = &spec.vxlan {
            opts.mode = changed(vxlan.endpoint_mode.as_ref(), current.mode.as_ref());
            opts.udp_port = changed(vxlan.udp_port.as_ref(), current.udp_port.as_ref());
            opts.ttl = changed(vxlan.ttl.as_ref(), current.ttl.as_ref());
            opts.multicast_group =
                changed(vxlan.multicast_group.as_ref(), current.multicast_group.as_ref());
        }
    }

    (opts != DataNetworkOpts::default()).then_some(opts)
}

fn current_opts(current: &PlatformDataNetwork) -> DataNetworkOpts {
    DataNetworkOpts {
        name: Some(current.name.clone()),
        network_type: Some(current.network_type.clone()),
        description: Some(current.description.clone()),
        mtu: Some(current.mtu),
        mode: current.mode.clone(),
        multicast_group: current.multicast_group.clone(),
        udp_port: current.udp_port,
        ttl: current.ttl,
    }
}

async fn reconcile_new(
    ctx: &Context,
    client: &dyn PlatformClient,
    instance: &DataNetwork,
) -> Result<PlatformDataNetwork, ReconcileError> {
    check_after_in_sync(ctx, instance, Change::Provision).await?;

    let opts = create_opts(instance);
    info!(name = %instance.name_any(), opts = ?opts, "creating data network");
    let created = networks::create_data_network(client, &serde_json::to_value(&opts)?).await?;
    metrics::record_platform_change("DataNetwork", "create");

    ctx.normal_event(instance, reasons::CREATED, "data network has been created")
        .await;
    Ok(created)
}

async fn reconcile_updated(
    ctx: &Context,
    client: &dyn PlatformClient,
    instance: &DataNetwork,
    current: &PlatformDataNetwork,
) -> Result<(), ReconcileError> {
    let Some(opts) = update_opts(instance, current) else {
        debug!(name = %instance.name_any(), "data network is in sync");
        return Ok(());
    };

    let observed = current_opts(current);
    let delta = delta_string(&opts.overlay(&observed), &observed)?;
    record_delta(ctx.store(), instance, &delta).await?;

    check_after_in_sync(ctx, instance, Change::Configure).await?;

    info!(name = %instance.name_any(), uuid = %current.id, opts = ?opts, "updating data network");
    networks::update_data_network(client, &current.id, &opts.patch_ops()).await?;
    metrics::record_platform_change("DataNetwork", "update");

    ctx.normal_event(instance, reasons::UPDATED, "data network has been updated")
        .await;
    Ok(())
}

async fn reconcile_deleted(
    ctx: &Context,
    client: &dyn PlatformClient,
    instance: &DataNetwork,
    existing: Option<&PlatformDataNetwork>,
) -> Result<(), ReconcileError> {
    if let Some(network) = existing {
        match networks::delete_data_network(client, &network.id).await {
            Ok(()) => {}
            Err(e) if e.status() == Some(400) => {
                info!(
                    name = %instance.name_any(),
                    "data network is still in use; deleting local resource anyway"
                );
            }
            Err(e) => return Err(e.into()),
        }
        metrics::record_platform_change("DataNetwork", "delete");
        ctx.normal_event(instance, reasons::DELETED, "data network has been deleted")
            .await;
    }

    remove_finalizer(ctx.store(), instance).await?;
    Ok(())
}

#[cfg(test)]
#[path = "datanetwork_tests.rs"]
mod datanetwork_tests;
