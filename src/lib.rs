// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Deployment Manager - StarlingX Deployment Operator for Kubernetes
//!
//! The deployment manager drives a StarlingX cloud platform towards the
//! configuration declared in a set of Custom Resource Definitions. Each
//! namespace describes one platform installation: its System, the Hosts
//! that make it up, their HostProfiles, and the networking and PTP objects
//! the hosts reference.
//!
//! ## Overview
//!
//! This library provides the core functionality for the operator, including:
//!
//! - Custom Resource Definitions (CRDs) for the platform's configuration
//! - Reconciliation logic comparing each resource with the platform's
//!   inventory API and applying the difference
//! - A shared manager holding per-namespace platform clients, background
//!   monitors and the software-update strategy orchestrator
//! - Error classification into retry policies
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types
//! - [`reconcilers`] - Reconciliation logic for each resource type
//! - [`manager`] - Client registry, monitors, notifications and strategy orchestration
//! - [`platform`] - Keystone-authenticated clients for the platform's REST APIs
//! - [`context`] - Shared context handed to every reconciler
//! - [`classifier`] - Maps reconcile errors to requeue policies
//! - [`config`] - Per-reconciler configuration loaded at startup
//! - [`merge`] - Structural merge of profiles, overrides and defaults
//!
//! ## Example
//!
//! ```rust,no_run
//! use deployment_manager::crd::{SystemSpec, System};
//!
//! let system = System::new(
//!     "default",
//!     SystemSpec {
//!         description: Some("edge site".to_string()),
//!         dns_servers: Some(vec!["8.8.8.8".to_string()]),
//!         ..Default::default()
//!     },
//! );
//! assert!(!system.spec.https_enabled());
//! ```
//!
//! ## Features
//!
//! - **Ordered Provisioning** - Dependents wait for their System to be ready
//! - **Factory Install** - Initial configuration is applied once, then only tracked
//! - **Status Tracking** - In-sync, reconciled and delta reported per resource
//! - **Strategy Orchestration** - Lock and unlock changes are applied through a
//!   software-update strategy

pub mod classifier;
pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod delta;
pub mod errors;
pub mod events;
pub mod manager;
pub mod merge;
pub mod metrics;
pub mod platform;
pub mod reconcilers;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod crd_tests;
#[cfg(test)]
mod errors_tests;
