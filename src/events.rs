// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes Event recording.
//!
//! Reconcilers surface user-visible conditions as Kubernetes Events. Events are
//! fire-and-forget: a failed publish is logged and never fails a reconcile.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Trait for publishing Kubernetes Events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an Event on the given object.
    ///
    /// # Arguments
    ///
    /// * `resource_ref` - The object this event is about
    /// * `type_` - Normal or Warning
    /// * `reason` - One of the [`reasons`] constants
    /// * `action` - One of the [`actions`] constants
    /// * `note` - Human-readable message
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Publishes events through `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Create a publisher reporting as `controller_name`.
    #[must_use]
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = kube::runtime::events::Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(
                reason,
                action,
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}

/// Publisher that drops every event.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Formats an event message prefixed with the object name.
#[must_use]
pub fn note(name: &str, message: impl std::fmt::Display) -> Option<String> {
    Some(format!("{name}: {message}"))
}

/// Event reasons.
pub mod reasons {
    /// A platform resource was created
    pub const CREATED: &str = "Created";
    /// A platform resource was updated, or a change was ignored
    pub const UPDATED: &str = "Updated";
    /// A platform resource was deleted
    pub const DELETED: &str = "Deleted";
    /// The reconcile is waiting on a client, the system, or a monitor
    pub const WAIT: &str = "Wait";
    /// The reconcile is blocked on another resource
    pub const DEPENDENCY: &str = "Dependency";
    /// A dependent object was notified
    pub const NOTIFIED: &str = "Notified";
}

/// Event actions.
pub mod actions {
    /// Standard reconciliation loop
    pub const RECONCILE: &str = "Reconcile";
    /// Cleanup on deletion
    pub const DELETE: &str = "Delete";
    /// Notification of a dependent object
    pub const NOTIFY: &str = "Notify";
}
