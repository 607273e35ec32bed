// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the deployment manager.
//!
//! Three layers of errors exist:
//! - [`PlatformError`] for failures talking to the platform REST API (sysinv and VIM)
//! - [`StoreError`] for failures reading or writing Kubernetes objects
//! - [`ReconcileError`] for everything a reconciler body can report
//!
//! Reconcile errors are converted into a retry decision by
//! [`crate::classifier::classify`].

use thiserror::Error;

/// Errors returned by platform REST clients.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The platform answered with a non-success HTTP status.
    #[error("{method} {url} failed with HTTP {status}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Request method
        method: String,
        /// Request URL
        url: String,
        /// Response body or reason phrase
        message: String,
    },

    /// The endpoint host name could not be resolved.
    #[error("DNS resolution failed for {url}: {message}")]
    Resolution {
        /// Request URL
        url: String,
        /// Underlying transport message
        message: String,
    },

    /// A transport failure other than name resolution.
    #[error("network error calling {url}: {message}")]
    Network {
        /// Request URL
        url: String,
        /// Underlying transport message
        message: String,
    },

    /// The server closed the connection before a response was received.
    ///
    /// Typically seen when talking plain HTTP to an HTTPS listener.
    #[error("unexpected EOF calling {url}")]
    Eof {
        /// Request URL
        url: String,
    },

    /// The server answered a TLS handshake with plain HTTP.
    #[error("server at {url} gave HTTP response to HTTPS client")]
    HttpsNotEnabled {
        /// Request URL
        url: String,
    },

    /// A response body could not be decoded.
    #[error("failed to decode response from {url}: {message}")]
    Decode {
        /// Request URL
        url: String,
        /// Decoder message
        message: String,
    },

    /// Authentication options could not be built from the endpoint secret.
    #[error("invalid platform authentication options: {0}")]
    InvalidOptions(String),

    /// The service catalog had no matching endpoint.
    #[error("no endpoint found for service {name} of type {service_type}")]
    EndpointNotFound {
        /// Service name
        name: String,
        /// Service type
        service_type: String,
    },
}

impl PlatformError {
    /// Returns the HTTP status code if this error came from a platform response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true for HTTP 404 responses.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Returns true for errors raised below the HTTP layer.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Resolution { .. }
                | Self::Network { .. }
                | Self::Eof { .. }
                | Self::HttpsNotEnabled { .. }
        )
    }

    /// Builds a transport error from a low-level message.
    ///
    /// The HTTP stack reports connection problems as free text, so the category
    /// is recovered by inspecting the message.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL being requested
    /// * `message` - The full error chain rendered as text
    #[must_use]
    pub fn from_transport_message(url: &str, message: &str) -> Self {
        let lower = message.to_lowercase();
        let url = url.to_string();

        if lower.contains("dns error")
            || lower.contains("failed to lookup address")
            || lower.contains("name or service not known")
            || lower.contains("no such host")
        {
            return Self::Resolution {
                url,
                message: message.to_string(),
            };
        }

        if lower.contains("unexpected eof")
            || lower.contains("connection closed before message completed")
        {
            return Self::Eof { url };
        }

        if lower.contains("corrupt message")
            || lower.contains("invalidcontenttype")
            || lower.contains("http response to https client")
        {
            return Self::HttpsNotEnabled { url };
        }

        Self::Network {
            url,
            message: message.to_string(),
        }
    }
}

/// Errors returned by the Kubernetes object store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested object does not exist.
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Resource kind
        kind: String,
        /// Namespace
        namespace: String,
        /// Object name
        name: String,
    },

    /// Optimistic concurrency failure.
    #[error("operation cannot be fulfilled: the object has been modified; please apply your changes to the latest version and try again: {0}")]
    Conflict(String),

    /// Any other API server status error.
    #[error("kubernetes API error ({code}): {message}")]
    Api {
        /// HTTP status code returned by the API server
        code: u16,
        /// Status message
        message: String,
    },

    /// An object could not be converted to or from its typed form.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Client-side failure talking to the API server.
    #[error("kubernetes client error: {0}")]
    Kube(String),
}

impl StoreError {
    /// Returns true for optimistic concurrency conflicts.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns true when the object does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<kube::Error> for StoreError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) if resp.code == 409 => Self::Conflict(resp.message),
            kube::Error::Api(resp) if resp.code == 404 => Self::NotFound {
                kind: String::new(),
                namespace: String::new(),
                name: resp.message,
            },
            kube::Error::Api(resp) => Self::Api {
                code: resp.code,
                message: resp.message,
            },
            kube::Error::SerdeError(e) => Self::Serialization(e.to_string()),
            other => Self::Kube(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Errors returned by reconciler bodies.
#[derive(Error, Debug, Clone)]
pub enum ReconcileError {
    /// Failure talking to the platform API.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// Failure reading or writing Kubernetes objects.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The desired state failed a pre-flight check.
    #[error("validation error: {0}")]
    Validation(String),

    /// A change was requested after the resource completed its initial sync.
    #[error("{0}")]
    ChangeAfterReconciled(String),

    /// An operation needs a TLS connection to the platform.
    #[error("{0}")]
    HttpsClientRequired(String),

    /// Another resource has not reached the required state yet.
    #[error("{0}")]
    ResourceStatusDependency(String),

    /// Another resource is not configured the way this one needs.
    #[error("{0}")]
    ResourceConfigurationDependency(String),

    /// The system must reach a given configuration first.
    #[error("{0}")]
    SystemDependency(String),

    /// The platform client could not be built.
    #[error("client error: {0}")]
    Client(String),

    /// The user supplied data that cannot be applied.
    #[error("{0}")]
    UserData(String),

    /// A referenced Kubernetes object is missing.
    #[error("{0}")]
    MissingKubernetesResource(String),

    /// A referenced platform object is missing.
    #[error("{0}")]
    MissingSystemResource(String),

    /// A monitor has been started and will re-trigger the reconcile.
    #[error("waiting for monitor: {0}")]
    WaitForMonitor(String),

    /// Another reconciler is already notifying the active controller.
    #[error("{0}")]
    HostNotify(String),

    /// No platform client exists for the namespace.
    #[error("platform client not available for namespace {0}")]
    MissingClient(String),

    /// The namespace's System has not finished its first reconcile.
    #[error("system not ready for namespace {0}")]
    SystemNotReady(String),

    /// Anything else.
    #[error("{0}")]
    Internal(String),
}

impl ReconcileError {
    /// Returns true when the underlying cause is a missing object.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Platform(e) => e.is_not_found(),
            Self::Store(e) => e.is_not_found(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ReconcileError {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(StoreError::from(err))
    }
}

/// Convenience alias for reconciler results.
pub type Result<T, E = ReconcileError> = std::result::Result<T, E>;
