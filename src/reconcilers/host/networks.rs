// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Platform networks and address pools.
//!
//! These are realised by the Host reconciler of the active controller. Each
//! `PlatformNetwork` is processed together with its address pools: the pools
//! first, so that a new network can be created with its primary pool, then
//! the network itself. A network without associated pools but with an inline
//! subnet uses an implicit pool named after the network.
//!
//! Pools have no deployment scope of their own; changes to them are guarded
//! by the after-in-sync rule of the network they belong to.

use std::net::IpAddr;

use kube::ResourceExt;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::super::finalizers::is_deleting;
use super::super::lifecycle::{check_after_in_sync, Change};
use super::super::platformnetwork::find_existing as find_existing_network;
use super::super::status::{record_delta, reload, sync_status};
use crate::config::ReconcilerName;
use crate::context::Context;
use crate::crd::{AddressPool, AddressPoolSpec, PlatformNetwork};
use crate::delta::changed_fields;
use crate::errors::ReconcileError;
use crate::events::reasons;
use crate::metrics;
use crate::platform::inventory::networks::{self, AddressPool as PlatformPool, Network};
use crate::platform::PlatformClient;
use crate::store::{fetch, fetch_all, ResourceKind};

/// Returns an address in canonical form so that `fd00::0001` equals `fd00::1`.
#[must_use]
pub fn canonical_address(address: &str) -> String {
    address
        .parse::<IpAddr>()
        .map_or_else(|_| address.to_lowercase(), |ip| ip.to_string())
}

fn canonical_ranges(ranges: &[Vec<String>]) -> Vec<Vec<String>> {
    let mut result: Vec<Vec<String>> = ranges
        .iter()
        .map(|pair| pair.iter().map(|a| canonical_address(a)).collect())
        .collect();
    result.sort();
    result
}

/// Address pool attributes under their platform names.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct PoolOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<i32>,
    #[serde(rename = "gateway_address", skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floating_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller0_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller1_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranges: Option<Vec<Vec<String>>>,
}

impl PoolOpts {
    /// Attributes requested by a pool spec.
    #[must_use]
    pub fn desired(name: &str, spec: &AddressPoolSpec) -> Self {
        let canonical = |a: &Option<String>| a.as_deref().map(canonical_address);
        let ranges: Vec<Vec<String>> = spec
            .allocation
            .ranges
            .iter()
            .flatten()
            .map(|r| vec![r.start.clone(), r.end.clone()])
            .collect();
        Self {
            name: Some(name.to_string()),
            network: Some(canonical_address(&spec.subnet)),
            prefix: Some(spec.prefix),
            gateway: canonical(&spec.gateway),
            floating_address: canonical(&spec.floating_address),
            controller0_address: canonical(&spec.controller0_address),
            controller1_address: canonical(&spec.controller1_address),
            order: spec.allocation.order.clone(),
            ranges: (!ranges.is_empty()).then(|| canonical_ranges(&ranges)),
        }
    }

    /// Attributes reported by the platform.
    #[must_use]
    pub fn current(pool: &PlatformPool) -> Self {
        let canonical = |a: &Option<String>| {
            a.as_deref()
                .filter(|a| !a.is_empty())
                .map(canonical_address)
        };
        Self {
            name: Some(pool.name.clone()),
            network: Some(canonical_address(&pool.network)),
            prefix: Some(pool.prefix),
            gateway: canonical(&pool.gateway),
            floating_address: canonical(&pool.floating_address),
            controller0_address: canonical(&pool.controller0_address),
            controller1_address: canonical(&pool.controller1_address),
            order: Some(pool.order.clone()),
            ranges: Some(canonical_ranges(&pool.ranges)),
        }
    }
}

/// Platform network attributes under their platform names.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
struct NetworkOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    network_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dynamic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pool_uuid: Option<String>,
}

impl NetworkOpts {
    fn desired(network: &PlatformNetwork) -> Self {
        Self {
            name: Some(network.name_any()),
            network_type: Some(network.spec.network_type.clone()),
            dynamic: Some(network.spec.dynamic),
            pool_uuid: None,
        }
    }

    fn current(network: &Network) -> Self {
        Self {
            name: Some(network.name.clone()),
            network_type: Some(network.network_type.clone()),
            dynamic: Some(network.dynamic),
            pool_uuid: None,
        }
    }
}

/// A pool used by a network: an `AddressPool` resource or the inline subnet
/// of the network.
struct PoolSource {
    name: String,
    spec: AddressPoolSpec,
    resource: Option<AddressPool>,
}

async fn pool_sources(
    ctx: &Context,
    namespace: &str,
    network: &PlatformNetwork,
) -> Result<Vec<PoolSource>, ReconcileError> {
    let names = network
        .spec
        .associated_address_pools
        .clone()
        .unwrap_or_default();

    if names.is_empty() {
        let Some(subnet) = network.spec.subnet.clone() else {
            return Err(ReconcileError::UserData(format!(
                "platform network {:?} has no address pool",
                network.name_any()
            )));
        };
        return Ok(vec![PoolSource {
            name: network.name_any(),
            spec: AddressPoolSpec {
                subnet,
                prefix: network.spec.prefix.unwrap_or_default(),
                gateway: network.spec.gateway.clone(),
                allocation: network.spec.allocation.clone().unwrap_or_default(),
                ..AddressPoolSpec::default()
            },
            resource: None,
        }]);
    }

    let mut sources = Vec::with_capacity(names.len());
    for name in names {
        let pool = fetch::<AddressPool>(ctx.store(), ResourceKind::AddressPool, namespace, &name)
            .await?
            .ok_or_else(|| {
                ReconcileError::MissingKubernetesResource(format!(
                    "address pool {name:?} does not exist"
                ))
            })?;
        sources.push(PoolSource {
            name,
            spec: pool.spec.clone(),
            resource: Some(pool),
        });
    }
    Ok(sources)
}

fn find_pool<'a>(
    pools: &'a [PlatformPool],
    source: &PoolSource,
) -> Option<&'a PlatformPool> {
    let id = source
        .resource
        .as_ref()
        .and_then(|p| p.status.as_ref())
        .and_then(|s| s.common.id.as_deref());
    id.and_then(|id| pools.iter().find(|p| p.id == id))
        .or_else(|| pools.iter().find(|p| p.name == source.name))
}

async fn reconcile_pool(
    ctx: &Context,
    client: &dyn PlatformClient,
    network: &PlatformNetwork,
    source: &PoolSource,
    pools: &[PlatformPool],
) -> Result<PlatformPool, ReconcileError> {
    let desired = PoolOpts::desired(&source.name, &source.spec);

    let Some(current) = find_pool(pools, source) else {
        check_after_in_sync(ctx, network, Change::Provision).await?;
        info!(pool = %source.name, "creating address pool");
        let created =
            networks::create_address_pool(client, &serde_json::to_value(&desired)?).await?;
        metrics::record_platform_change("AddressPool", "create");
        if let Some(pool) = &source.resource {
            ctx.normal_event(pool, reasons::CREATED, "address pool has been created")
                .await;
        }
        return Ok(created);
    };

    let changes = changed_fields(&desired, &PoolOpts::current(current))?;
    if let Some(pool) = &source.resource {
        record_delta(ctx.store(), pool, &changes.delta()?).await?;
    }
    if changes.is_empty() {
        debug!(pool = %source.name, "address pool is in sync");
        return Ok(current.clone());
    }

    check_after_in_sync(ctx, network, Change::Configure).await?;
    info!(
        pool = %source.name,
        fields = ?changes.desired.keys().collect::<Vec<_>>(),
        "updating address pool"
    );
    let updated = networks::update_address_pool(client, &current.id, &changes.patch_ops()).await?;
    metrics::record_platform_change("AddressPool", "update");
    if let Some(pool) = &source.resource {
        ctx.normal_event(pool, reasons::UPDATED, "address pool has been updated")
            .await;
    }
    Ok(updated)
}

async fn reconcile_network_resource(
    ctx: &Context,
    client: &dyn PlatformClient,
    network: &PlatformNetwork,
    primary_pool: &PlatformPool,
) -> Result<Network, ReconcileError> {
    let desired = NetworkOpts::desired(network);

    let Some(current) = find_existing_network(client, network).await? else {
        check_after_in_sync(ctx, network, Change::Provision).await?;
        info!(
            network = %network.name_any(),
            pool = %primary_pool.name,
            "creating platform network"
        );
        let body = NetworkOpts {
            pool_uuid: Some(primary_pool.id.clone()),
            ..desired
        };
        let created = networks::create_network(client, &serde_json::to_value(&body)?).await?;
        metrics::record_platform_change("PlatformNetwork", "create");
        ctx.normal_event(network, reasons::CREATED, "platform network has been created")
            .await;
        return Ok(created);
    };

    let changes = changed_fields(&desired, &NetworkOpts::current(&current))?;
    record_delta(ctx.store(), network, &changes.delta()?).await?;
    if changes.is_empty() {
        debug!(network = %network.name_any(), "platform network is in sync");
        return Ok(current);
    }

    check_after_in_sync(ctx, network, Change::Configure).await?;
    info!(network = %network.name_any(), "updating platform network");
    let updated = networks::update_network(client, &current.uuid, &changes.patch_ops()).await?;
    metrics::record_platform_change("PlatformNetwork", "update");
    ctx.normal_event(network, reasons::UPDATED, "platform network has been updated")
        .await;
    Ok(updated)
}

/// Realises one network and its pools, then records their statuses.
async fn reconcile_network(
    ctx: &Context,
    client: &dyn PlatformClient,
    namespace: &str,
    network: &PlatformNetwork,
) -> Result<(), ReconcileError> {
    let result: Result<String, ReconcileError> = async {
        let sources = pool_sources(ctx, namespace, network).await?;
        let pools = networks::list_address_pools(client).await?;

        let mut primary: Option<PlatformPool> = None;
        for source in &sources {
            let realised = reconcile_pool(ctx, client, network, source, &pools).await;
            if let Some(pool) = &source.resource {
                let latest = reload(ctx.store(), pool).await?;
                let id = realised.as_ref().ok().map(|p| p.id.as_str());
                sync_status(ctx, &latest, id, realised.is_ok()).await?;
            }
            let realised = realised?;
            primary.get_or_insert(realised);
        }

        let Some(primary) = primary else {
            return Err(ReconcileError::Internal(
                "no primary address pool".to_string(),
            ));
        };
        let realised = reconcile_network_resource(ctx, client, network, &primary).await?;
        Ok(realised.uuid)
    }
    .await;

    let latest = reload(ctx.store(), network).await?;
    sync_status(ctx, &latest, result.as_deref().ok(), result.is_ok()).await?;
    result.map(|_| ())
}

/// Realises every `PlatformNetwork` of the namespace and its address pools.
///
/// All networks are processed even when one fails. Changes refused after
/// the initial synchronization leave the network out of sync without
/// failing the host.
///
/// # Errors
///
/// Returns the first other error encountered.
pub async fn reconcile_platform_networks(
    ctx: &Context,
    client: &dyn PlatformClient,
    namespace: &str,
) -> Result<(), ReconcileError> {
    if !ctx.config.is_enabled(ReconcilerName::HostPlatformNetwork) {
        return Ok(());
    }

    let platform_networks: Vec<PlatformNetwork> =
        fetch_all(ctx.store(), ResourceKind::PlatformNetwork, namespace).await?;

    let mut first_error = None;
    for network in platform_networks.iter().filter(|n| !is_deleting(*n)) {
        match reconcile_network(ctx, client, namespace, network).await {
            Ok(()) | Err(ReconcileError::ChangeAfterReconciled(_)) => {}
            Err(e) => {
                warn!(
                    network = %network.name_any(),
                    error = %e,
                    "failed to reconcile platform network"
                );
                first_error.get_or_insert(e);
            }
        }
    }

    first_error.map_or(Ok(()), Err)
}

#[cfg(test)]
#[path = "networks_tests.rs"]
mod networks_tests;
