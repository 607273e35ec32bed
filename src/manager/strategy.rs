// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Update-strategy orchestrator.
//!
//! Reconcilers publish one fact per resource through
//! [`Manager::set_resource_info`]: the resource's type and personality,
//! whether it is reconciled, and whether applying its configuration needs the
//! host to be locked or unlocked. A single background task folds those facts
//! into one VIM system-config-update strategy and drives it to a final state.
//!
//! Each tick:
//!
//! 1. If the config version moved since the previous tick, catch up and wait.
//!    Bursts of principal-scope edits are absorbed this way.
//! 2. Before a strategy is sent, wait while any resource is still
//!    reconciling, finish when nothing requires a strategy, and otherwise
//!    create one. Create failures are retried up to
//!    [`DEFAULT_MAX_STRATEGY_RETRY_COUNT`] times.
//! 3. Once sent, poll the strategy: apply it when it is ready, keep polling
//!    while it is applying or aborting, delete it once it reaches any other
//!    final state.
//!
//! The retry count and the "strategy applied" flag are persisted on the
//! System so that a restarted operator resumes where it left off.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::Manager;
use crate::constants::{
    DEFAULT_MAX_STRATEGY_RETRY_COUNT, STRATEGY_MONITOR_INTERVAL, STRATEGY_NOT_REQUIRED,
    VIM_ENDPOINT_NAME, VIM_ENDPOINT_TYPE,
};
use crate::crd::System;
use crate::errors::StoreError;
use crate::metrics;
use crate::platform::nfv::{self, ApplyType, StrategyRequest};
use crate::platform::PlatformClient;
use crate::store::{fetch_all, ResourceKind};

pub const RESOURCE_SYSTEM: &str = "system";
pub const RESOURCE_HOST: &str = "host";
pub const RESOURCE_PLATFORM_NETWORK: &str = "platformnetwork";
pub const RESOURCE_ADDRESS_POOL: &str = "addresspool";
pub const RESOURCE_DATA_NETWORK: &str = "datanetwork";
pub const RESOURCE_PTP_INSTANCE: &str = "ptpinstance";
pub const RESOURCE_PTP_INTERFACE: &str = "ptpinterface";

pub const PERSONALITY_CONTROLLER: &str = "controller";
pub const PERSONALITY_WORKER: &str = "worker";
pub const PERSONALITY_STORAGE: &str = "storage";
pub const PERSONALITY_CONTROLLER_WORKER: &str = "controller-worker";

/// Strategy-required fact published by one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    pub resource_type: String,
    pub personality: String,
    pub name: String,
    pub reconciled: bool,
    pub strategy_required: String,
}

impl ResourceInfo {
    fn requires_strategy(&self) -> bool {
        self.strategy_required != STRATEGY_NOT_REQUIRED
    }
}

/// Orchestrator state shared between reconcilers and the background task.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyStatus {
    pub resource_info: BTreeMap<String, ResourceInfo>,
    pub config_version: u64,
    pub monitor_version: u64,
    pub strategy_sent: bool,
    pub namespace: String,
    pub monitor_started: bool,
}

/// Folds the fact table into a create request.
///
/// Returns `None` when no resource requires a strategy.
#[must_use]
pub fn strategy_request(facts: &BTreeMap<String, ResourceInfo>) -> Option<StrategyRequest> {
    let mut request = StrategyRequest::default();
    let mut needed = false;

    for fact in facts.values().filter(|f| f.requires_strategy()) {
        match (fact.resource_type.as_str(), fact.personality.as_str()) {
            (RESOURCE_SYSTEM, _) => {
                request.controller_apply_type = ApplyType::Serial;
                needed = true;
            }
            (RESOURCE_HOST, PERSONALITY_CONTROLLER) => {
                request.controller_apply_type = ApplyType::Serial;
                request.worker_apply_type = ApplyType::Parallel;
                needed = true;
            }
            (RESOURCE_HOST, PERSONALITY_WORKER) => {
                request.worker_apply_type = ApplyType::Parallel;
                needed = true;
            }
            (RESOURCE_HOST, PERSONALITY_STORAGE) => {
                request.storage_apply_type = ApplyType::Serial;
                needed = true;
            }
            (resource_type, personality) => {
                debug!(
                    name = %fact.name,
                    resource_type,
                    personality,
                    "Strategy requirement does not map to an apply type"
                );
            }
        }
    }

    needed.then_some(request)
}

impl Manager {
    /// Records the strategy fact of one resource.
    ///
    /// The first fact published in the process starts the orchestrator task.
    pub fn set_resource_info(
        self: &Arc<Self>,
        resource_type: &str,
        personality: &str,
        name: &str,
        reconciled: bool,
        required: &str,
    ) {
        let mut strategy = self.strategy();
        if strategy.resource_info.is_empty() {
            self.start_strategy_monitor(&mut strategy);
        }

        let fact = ResourceInfo {
            resource_type: resource_type.to_string(),
            personality: personality.to_string(),
            name: name.to_string(),
            reconciled,
            strategy_required: required.to_string(),
        };
        let action = if strategy.resource_info.contains_key(name) {
            "updated"
        } else {
            "added"
        };
        strategy.resource_info.insert(name.to_string(), fact);
        info!(
            resource_type,
            personality,
            name,
            reconciled,
            required,
            action,
            "Resource strategy info recorded"
        );
    }

    fn start_strategy_monitor(self: &Arc<Self>, strategy: &mut StrategyStatus) {
        if strategy.monitor_started {
            return;
        }
        info!("Starting strategy monitor");
        strategy.monitor_started = true;
        tokio::spawn(run_strategy_monitor(Arc::clone(self)));
    }

    /// Resumes tracking a strategy that was being applied before a restart.
    pub fn resume_strategy(self: &Arc<Self>, namespace: &str) {
        let mut strategy = self.strategy();
        if strategy.strategy_sent {
            return;
        }
        info!(namespace, "Resuming strategy tracking");
        strategy.namespace = namespace.to_string();
        strategy.strategy_sent = true;
        self.start_strategy_monitor(&mut strategy);
    }

    /// A copy of the current orchestrator state.
    #[must_use]
    pub fn strategy_status(&self) -> StrategyStatus {
        self.strategy().clone()
    }

    /// Bumps the config version, delaying the orchestrator by one tick.
    pub fn update_config_version(&self) {
        let mut strategy = self.strategy();
        let from = strategy.config_version;
        strategy.config_version += 1;
        info!(from, to = strategy.config_version, "Config version is updated");
    }

    #[must_use]
    pub fn get_config_version(&self) -> u64 {
        self.strategy().config_version
    }

    fn strategy_namespace(&self) -> String {
        self.strategy().namespace.clone()
    }

    /// Returns the persisted strategy retry count.
    ///
    /// # Errors
    ///
    /// Returns an error if the Systems cannot be read.
    pub async fn get_strategy_retry_count(&self) -> Result<i32, StoreError> {
        let namespace = self.strategy_namespace();
        let systems: Vec<System> = fetch_all(self.store(), ResourceKind::System, &namespace).await?;
        Ok(systems
            .first()
            .and_then(|s| s.status.as_ref())
            .map_or(0, |s| s.strategy_retry_count))
    }

    /// Persists the strategy retry count on every System of the namespace.
    ///
    /// # Errors
    ///
    /// Returns the first list or write error.
    pub async fn set_strategy_retry_count(&self, count: i32) -> Result<(), StoreError> {
        let namespace = self.strategy_namespace();
        let patch = serde_json::json!({ "status": { "strategyRetryCount": count } });
        let systems: Vec<System> = fetch_all(self.store(), ResourceKind::System, &namespace).await?;
        for system in systems {
            let name = kube::ResourceExt::name_any(&system);
            self.store()
                .patch_status(ResourceKind::System, &namespace, &name, &patch)
                .await?;
            debug!(
                namespace = %namespace,
                name = %name,
                count,
                "Updated strategy retry count on system"
            );
        }
        Ok(())
    }

    /// Bumps the retry count. Returns true once the budget is exhausted.
    async fn bump_strategy_retry_count(&self) -> bool {
        let count = match self.get_strategy_retry_count().await {
            Ok(count) => count + 1,
            Err(e) => {
                error!(error = %e, "Failed to read strategy retry count");
                return false;
            }
        };
        if let Err(e) = self.set_strategy_retry_count(count).await {
            error!(error = %e, "Failed to update strategy retry count");
        }
        let exhausted = u32::try_from(count).is_ok_and(|c| c >= DEFAULT_MAX_STRATEGY_RETRY_COUNT);
        if exhausted {
            warn!(count, "Strategy retry count exceeded");
        }
        exhausted
    }

    /// Forgets every fact and the sent strategy, and clears the persisted
    /// applied flag and retry count.
    ///
    /// The namespace binding and the VIM client survive the reset.
    pub async fn clear_strategy(&self) {
        let namespace = {
            let mut strategy = self.strategy();
            let namespace = std::mem::take(&mut strategy.namespace);
            *strategy = StrategyStatus {
                namespace: namespace.clone(),
                ..StrategyStatus::default()
            };
            namespace
        };

        if let Err(e) = self.set_strategy_applied(&namespace, false).await {
            error!(error = %e, "Failed to clear strategy applied flag");
        }
        if let Err(e) = self.set_strategy_retry_count(0).await {
            error!(error = %e, "Failed to clear strategy retry count");
        }
        metrics::record_strategy_transition("cleared");
        info!(namespace = %namespace, "Strategy status cleared");
    }

    /// Returns the VIM client, building it on first use.
    pub async fn get_vim_client(&self) -> Option<Arc<dyn PlatformClient>> {
        if let Some(client) = super::guard(&self.vim_client).clone() {
            return Some(client);
        }

        let namespace = self.strategy_namespace();
        if namespace.is_empty() {
            info!("No namespace yet; waiting for platform client creation");
            return None;
        }

        match self
            .build_platform_client(&namespace, VIM_ENDPOINT_NAME, VIM_ENDPOINT_TYPE)
            .await
        {
            Ok(client) => {
                *super::guard(&self.vim_client) = Some(client.clone());
                Some(client)
            }
            Err(e) => {
                error!(namespace = %namespace, error = %e, "Failed to create VIM client");
                None
            }
        }
    }

    /// Runs one orchestrator tick. Returns true when the orchestrator is done.
    pub async fn manage_strategy(&self) -> bool {
        let (facts, sent) = {
            let mut strategy = self.strategy();
            debug!(status = ?*strategy, "Managing strategy");
            if strategy.monitor_version != strategy.config_version {
                strategy.monitor_version = strategy.config_version;
                info!("Config version changed; waiting for it to settle");
                return false;
            }
            (strategy.resource_info.clone(), strategy.strategy_sent)
        };

        if sent {
            return self.monitor_strategy_state().await;
        }

        if let Some(pending) = facts.values().find(|f| !f.reconciled) {
            info!(name = %pending.name, "Waiting for resource to be reconciled");
            return false;
        }

        let Some(request) = strategy_request(&facts) else {
            info!("No strategy required");
            return true;
        };

        self.create_strategy(&request).await
    }

    async fn create_strategy(&self, request: &StrategyRequest) -> bool {
        let Some(client) = self.get_vim_client().await else {
            return false;
        };

        info!(request = ?request, "Sending strategy create request");
        match nfv::create(client.as_ref(), request).await {
            Ok(strategy) => {
                self.strategy().strategy_sent = true;
                metrics::record_strategy_transition("created");
                info!(strategy = ?strategy, "Strategy created");
                if let Err(e) = self.set_strategy_retry_count(0).await {
                    error!(error = %e, "Failed to reset strategy retry count");
                }
                false
            }
            Err(e) => {
                error!(error = %e, "Strategy creation failed");
                self.bump_strategy_retry_count().await
            }
        }
    }

    async fn delete_strategy(&self, client: &dyn PlatformClient) {
        match nfv::delete(client).await {
            Ok(()) => info!("Strategy deleted"),
            Err(e) => error!(error = %e, "Strategy delete failed"),
        }
    }

    async fn monitor_strategy_state(&self) -> bool {
        let Some(client) = self.get_vim_client().await else {
            return false;
        };

        let strategy = match nfv::show(client.as_ref()).await {
            Ok(Some(strategy)) => strategy,
            Ok(None) => {
                warn!("Strategy no longer exists");
                return true;
            }
            Err(e) => {
                error!(error = %e, "Failed to get strategy");
                return false;
            }
        };
        info!(state = %strategy.state, "Strategy state");

        match strategy.state.as_str() {
            nfv::STATE_READY_TO_APPLY => match nfv::apply_all(client.as_ref()).await {
                Ok(_) => {
                    metrics::record_strategy_transition(nfv::STATE_APPLYING);
                    let namespace = self.strategy_namespace();
                    if let Err(e) = self.set_strategy_applied(&namespace, true).await {
                        error!(error = %e, "Failed to set strategy applied flag");
                    }
                    false
                }
                Err(e) => {
                    error!(error = %e, "Strategy apply failed");
                    if self.bump_strategy_retry_count().await {
                        self.delete_strategy(client.as_ref()).await;
                        return true;
                    }
                    false
                }
            },
            nfv::STATE_INITIAL
            | nfv::STATE_BUILDING
            | nfv::STATE_APPLYING
            | nfv::STATE_ABORTING => false,
            nfv::STATE_APPLIED
            | nfv::STATE_BUILD_FAILED
            | nfv::STATE_BUILD_TIMEOUT
            | nfv::STATE_APPLY_FAILED
            | nfv::STATE_APPLY_TIMEOUT
            | nfv::STATE_ABORT_FAILED
            | nfv::STATE_ABORT_TIMEOUT
            | nfv::STATE_ABORTED => {
                metrics::record_strategy_transition(&strategy.state);
                self.delete_strategy(client.as_ref()).await;
                true
            }
            other => {
                warn!(state = other, "Unexpected strategy state");
                false
            }
        }
    }
}

async fn run_strategy_monitor(manager: Arc<Manager>) {
    info!("Strategy monitor started");
    loop {
        tokio::time::sleep(STRATEGY_MONITOR_INTERVAL).await;
        if manager.manage_strategy().await {
            manager.clear_strategy().await;
            break;
        }
    }
    info!("Strategy monitor stopped");
}

#[cfg(test)]
#[path = "strategy_tests.rs"]
mod strategy_tests;
