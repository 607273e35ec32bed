// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HostProfile reconciliation and profile resolution.
//!
//! A profile has no platform counterpart. When one changes, every Host that
//! uses it, directly or through a chain of `base` profiles, is re-annotated
//! with `profile/<name>: <resourceVersion>` so that its reconciler runs
//! against the new attributes. The annotation doubles as a record of which
//! version a host has already been told about.
//!
//! The effective profile of a host is built by merging each profile over its
//! base, root first, then the host's overrides over the result.

use std::collections::BTreeMap;
use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use serde_json::json;
use tracing::{debug, info};

use crate::config::ReconcilerName;
use crate::constants::PROFILE_ANNOTATION_PREFIX;
use crate::context::Context;
use crate::crd::{Host, HostProfile, HostProfileSpec};
use crate::errors::ReconcileError;
use crate::merge::{merge_profiles, MergeTransformer};
use crate::store::{apply_patch, fetch, fetch_all, ObjectStore, ResourceKind};

/// Profiles of one namespace, by name.
pub type ProfileMap = BTreeMap<String, HostProfileSpec>;

/// Loads every HostProfile of a namespace.
///
/// # Errors
///
/// Returns an error if the list fails.
pub async fn load_profiles(
    store: &dyn ObjectStore,
    namespace: &str,
) -> Result<ProfileMap, ReconcileError> {
    Ok(
        fetch_all::<HostProfile>(store, ResourceKind::HostProfile, namespace)
            .await?
            .into_iter()
            .map(|p| (p.name_any(), p.spec))
            .collect(),
    )
}

/// Returns `name` followed by its base profiles, nearest first.
///
/// # Errors
///
/// Returns [`ReconcileError::MissingKubernetesResource`] when a profile in the
/// chain does not exist, and [`ReconcileError::Validation`] when the chain
/// loops.
pub fn profile_chain(profiles: &ProfileMap, name: &str) -> Result<Vec<String>, ReconcileError> {
    let mut chain: Vec<String> = Vec::new();
    let mut next = Some(name.to_string());

    while let Some(current) = next {
        if chain.contains(&current) {
            chain.push(current);
            return Err(ReconcileError::Validation(format!(
                "host profile inheritance loop: {}",
                chain.join(" -> ")
            )));
        }
        let spec = profiles.get(&current).ok_or_else(|| {
            ReconcileError::MissingKubernetesResource(format!(
                "host profile {current:?} does not exist"
            ))
        })?;
        next = spec.base.clone().filter(|b| !b.is_empty());
        chain.push(current);
    }

    Ok(chain)
}

/// Builds the effective profile `name` by merging it over its bases.
///
/// # Errors
///
/// Returns the [`profile_chain`] errors, or a decode error from the merge.
pub fn resolve_profile(
    profiles: &ProfileMap,
    name: &str,
) -> Result<HostProfileSpec, ReconcileError> {
    let chain = profile_chain(profiles, name)?;
    let mut resolved = HostProfileSpec::default();
    for link in chain.iter().rev() {
        if let Some(spec) = profiles.get(link) {
            resolved = merge_profiles(&resolved, spec)?;
        }
    }
    resolved.base = None;
    Ok(resolved)
}

/// Builds a host's effective profile: its profile chain plus its overrides.
///
/// # Errors
///
/// Returns the [`resolve_profile`] errors.
pub fn resolve_host_profile(
    profiles: &ProfileMap,
    host: &Host,
) -> Result<HostProfileSpec, ReconcileError> {
    let resolved = resolve_profile(profiles, &host.spec.profile)?;
    match &host.spec.overrides {
        Some(overrides) => Ok(MergeTransformer::default().merge(&resolved, overrides)?),
        None => Ok(resolved),
    }
}

/// Reconciles a `HostProfile` resource.
///
/// # Errors
///
/// Returns an error if the profile chain is invalid or a host cannot be
/// annotated.
pub async fn reconcile_host_profile(
    profile: Arc<HostProfile>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let namespace = profile.namespace().unwrap_or_default();
    let name = profile.name_any();

    let Some(profile) =
        fetch::<HostProfile>(ctx.store(), ResourceKind::HostProfile, &namespace, &name).await?
    else {
        debug!(namespace = %namespace, name = %name, "Host profile not found; ignoring");
        return Ok(Action::await_change());
    };

    if !ctx.config.is_enabled(ReconcilerName::HostProfile) {
        return Ok(Action::await_change());
    }

    let profiles = load_profiles(ctx.store(), &namespace).await?;
    profile_chain(&profiles, &name)?;

    let version = profile.resource_version().unwrap_or_default();
    let key = format!("{PROFILE_ANNOTATION_PREFIX}{name}");

    let hosts: Vec<Host> = fetch_all(ctx.store(), ResourceKind::Host, &namespace).await?;
    for host in hosts {
        // A broken chain on an unrelated host is that host's problem.
        let uses_profile = profile_chain(&profiles, &host.spec.profile)
            .is_ok_and(|chain| chain.contains(&name));
        if !uses_profile {
            continue;
        }
        if host.annotations().get(&key) == Some(&version) {
            continue;
        }

        let host_name = host.name_any();
        info!(
            namespace = %namespace,
            profile = %name,
            host = %host_name,
            "Notifying host of profile update"
        );
        apply_patch::<Host>(
            ctx.store(),
            ResourceKind::Host,
            &namespace,
            &host_name,
            &json!({ "metadata": { "annotations": { (key.as_str()): version.as_str() } } }),
            false,
        )
        .await?;
    }

    Ok(Action::await_change())
}

#[cfg(test)]
#[path = "hostprofile_tests.rs"]
mod hostprofile_tests;
