// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconcile error classification.
//!
//! Every error returned by a reconciler body is passed through [`classify`], which
//! decides how soon the object is requeued and whether the namespace's platform
//! client must be discarded and rebuilt.

use std::time::Duration;

use crate::constants::{
    RETRY_IMMEDIATE, RETRY_NETWORK_ERROR, RETRY_RESOLUTION_ERROR, RETRY_SERVER_ERROR,
    RETRY_TRANSIENT, RETRY_USER_ERROR,
};
use crate::errors::{PlatformError, ReconcileError, StoreError};

/// How a failed reconcile is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Requeue almost immediately (conflicts, notify races)
    Immediate,
    /// Dependency or unexpected errors
    Transient,
    /// Errors that need user action, retried slowly
    UserError,
    /// Platform 5xx responses
    ServerError,
    /// Name resolution failures
    Resolution,
    /// Other transport failures
    Network,
    /// Waiting for the System reconciler; woken by notification
    SystemNotReady,
    /// Waiting for a platform client; woken by notification
    MissingClient,
    /// Do not retry; a change or a monitor will re-trigger
    Never,
}

impl RetryPolicy {
    /// Returns the requeue delay, or `None` when the object waits for a change.
    #[must_use]
    pub fn requeue_after(self) -> Option<Duration> {
        match self {
            Self::Immediate => Some(RETRY_IMMEDIATE),
            Self::Transient => Some(RETRY_TRANSIENT),
            Self::UserError => Some(RETRY_USER_ERROR),
            Self::ServerError => Some(RETRY_SERVER_ERROR),
            Self::Resolution => Some(RETRY_RESOLUTION_ERROR),
            Self::Network => Some(RETRY_NETWORK_ERROR),
            Self::SystemNotReady | Self::MissingClient | Self::Never => None,
        }
    }

    /// Short label used for metrics and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Transient => "transient",
            Self::UserError => "user_error",
            Self::ServerError => "server_error",
            Self::Resolution => "resolution_error",
            Self::Network => "network_error",
            Self::SystemNotReady => "system_not_ready",
            Self::MissingClient => "missing_client",
            Self::Never => "never",
        }
    }
}

/// Result of classifying a reconcile error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// How the object is requeued
    pub policy: RetryPolicy,
    /// Whether the namespace's platform client must be reset
    pub reset_client: bool,
    /// Whether the error is unexpected and should be surfaced loudly
    pub surface: bool,
}

impl Classification {
    const fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            reset_client: false,
            surface: false,
        }
    }

    const fn with_reset(policy: RetryPolicy) -> Self {
        Self {
            policy,
            reset_client: true,
            surface: false,
        }
    }

    const fn surfaced(policy: RetryPolicy) -> Self {
        Self {
            policy,
            reset_client: false,
            surface: true,
        }
    }
}

/// Classifies a reconcile error into a retry decision.
///
/// This is a pure function; the caller performs the side effects (client reset,
/// event emission, requeue).
///
/// # Arguments
///
/// * `err` - The error returned by a reconciler body
///
/// # Returns
///
/// The retry policy and whether the platform client must be reset
#[must_use]
pub fn classify(err: &ReconcileError) -> Classification {
    match err {
        ReconcileError::Platform(e) => classify_platform(e),
        ReconcileError::Store(e) => classify_store(e),
        ReconcileError::HttpsClientRequired(_)
        | ReconcileError::ResourceStatusDependency(_)
        | ReconcileError::ResourceConfigurationDependency(_)
        | ReconcileError::SystemDependency(_) => Classification::new(RetryPolicy::Transient),
        ReconcileError::Validation(_)
        | ReconcileError::ChangeAfterReconciled(_)
        | ReconcileError::WaitForMonitor(_) => Classification::new(RetryPolicy::Never),
        ReconcileError::Client(_)
        | ReconcileError::UserData(_)
        | ReconcileError::MissingKubernetesResource(_)
        | ReconcileError::MissingSystemResource(_) => Classification::new(RetryPolicy::UserError),
        ReconcileError::HostNotify(_) => Classification::new(RetryPolicy::Immediate),
        ReconcileError::MissingClient(_) => Classification::new(RetryPolicy::MissingClient),
        ReconcileError::SystemNotReady(_) => Classification::new(RetryPolicy::SystemNotReady),
        ReconcileError::Internal(_) => Classification::surfaced(RetryPolicy::Transient),
    }
}

fn classify_platform(err: &PlatformError) -> Classification {
    match err {
        PlatformError::Http { status, .. } => match status {
            400 | 403 | 404 | 405 => Classification::new(RetryPolicy::UserError),
            500 | 503 => Classification::new(RetryPolicy::ServerError),
            _ => Classification::surfaced(RetryPolicy::Transient),
        },
        PlatformError::Resolution { .. } => Classification::with_reset(RetryPolicy::Resolution),
        e if e.is_transport() => Classification::with_reset(RetryPolicy::Network),
        PlatformError::InvalidOptions(_) | PlatformError::EndpointNotFound { .. } => {
            Classification::new(RetryPolicy::UserError)
        }
        _ => Classification::surfaced(RetryPolicy::Transient),
    }
}

fn classify_store(err: &StoreError) -> Classification {
    match err {
        StoreError::Conflict(_) => Classification::new(RetryPolicy::Immediate),
        StoreError::NotFound { .. } => Classification::new(RetryPolicy::UserError),
        StoreError::Api { .. } | StoreError::Kube(_) => Classification::new(RetryPolicy::Transient),
        StoreError::Serialization(_) => Classification::surfaced(RetryPolicy::Transient),
    }
}
