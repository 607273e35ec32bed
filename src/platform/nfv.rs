// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! VIM system-config-update strategy API.
//!
//! A strategy is created from per-personality apply types, built by the VIM,
//! applied with the `apply-all` action, and deleted once it reaches a final
//! state.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{decode, PlatformClient};
use crate::errors::PlatformError;

pub const STRATEGY_PATH: &str = "api/orchestration/system-config-update/strategy";
pub const STRATEGY_ACTIONS_PATH: &str = "api/orchestration/system-config-update/strategy/actions";

pub const ACTION_APPLY_ALL: &str = "apply-all";

pub const STATE_INITIAL: &str = "initial";
pub const STATE_BUILDING: &str = "building";
pub const STATE_BUILD_FAILED: &str = "build-failed";
pub const STATE_BUILD_TIMEOUT: &str = "build-timeout";
pub const STATE_READY_TO_APPLY: &str = "ready-to-apply";
pub const STATE_APPLYING: &str = "applying";
pub const STATE_APPLY_FAILED: &str = "apply-failed";
pub const STATE_APPLY_TIMEOUT: &str = "apply-timeout";
pub const STATE_APPLIED: &str = "applied";
pub const STATE_ABORTING: &str = "aborting";
pub const STATE_ABORT_FAILED: &str = "abort-failed";
pub const STATE_ABORT_TIMEOUT: &str = "abort-timeout";
pub const STATE_ABORTED: &str = "aborted";

/// How hosts of one personality are taken through the strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyType {
    Serial,
    Parallel,
    #[default]
    Ignore,
}

impl ApplyType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::Parallel => "parallel",
            Self::Ignore => "ignore",
        }
    }
}

/// Body of a strategy create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct StrategyRequest {
    pub controller_apply_type: ApplyType,
    pub storage_apply_type: ApplyType,
    pub worker_apply_type: ApplyType,
    pub default_instance_action: String,
    pub alarm_restrictions: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_parallel_worker_hosts: Option<u32>,
}

impl Default for StrategyRequest {
    fn default() -> Self {
        Self {
            controller_apply_type: ApplyType::Ignore,
            storage_apply_type: ApplyType::Ignore,
            worker_apply_type: ApplyType::Ignore,
            default_instance_action: "stop-start".to_string(),
            alarm_restrictions: "relaxed".to_string(),
            max_parallel_worker_hosts: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Strategy {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub state: String,
    #[serde(rename = "controller-apply-type", default)]
    pub controller_apply_type: String,
    #[serde(rename = "worker-apply-type", default)]
    pub worker_apply_type: String,
    #[serde(rename = "storage-apply-type", default)]
    pub storage_apply_type: String,
}

#[derive(Debug, Deserialize)]
struct StrategyBody {
    #[serde(default)]
    strategy: Option<Strategy>,
}

fn strategy_from(
    client: &dyn PlatformClient,
    path: &str,
    body: Value,
) -> Result<Option<Strategy>, PlatformError> {
    if body.is_null() {
        return Ok(None);
    }
    let body: StrategyBody = decode(client, path, body)?;
    Ok(body.strategy)
}

/// Creates a strategy.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn create(
    client: &dyn PlatformClient,
    request: &StrategyRequest,
) -> Result<Option<Strategy>, PlatformError> {
    let body = serde_json::to_value(request).map_err(|e| PlatformError::Decode {
        url: client.endpoint(),
        message: e.to_string(),
    })?;
    let response = client.post(STRATEGY_PATH, &body).await?;
    strategy_from(client, STRATEGY_PATH, response)
}

/// Returns the current strategy, if one exists.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn show(client: &dyn PlatformClient) -> Result<Option<Strategy>, PlatformError> {
    let response = client.get(STRATEGY_PATH).await?;
    strategy_from(client, STRATEGY_PATH, response)
}

/// Sends the `apply-all` action.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn apply_all(client: &dyn PlatformClient) -> Result<Option<Strategy>, PlatformError> {
    let response = client
        .post(STRATEGY_ACTIONS_PATH, &json!({ "action": ACTION_APPLY_ALL }))
        .await?;
    strategy_from(client, STRATEGY_ACTIONS_PATH, response)
}

/// Deletes the strategy.
///
/// # Errors
///
/// Returns an error if the call fails.
pub async fn delete(client: &dyn PlatformClient) -> Result<(), PlatformError> {
    client.delete(STRATEGY_PATH).await
}

#[cfg(test)]
#[path = "nfv_tests.rs"]
mod nfv_tests;
