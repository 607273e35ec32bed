// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Authentication options read from the `system-endpoint` secret.
//!
//! The secret carries OpenStack-style environment variables. `OS_AUTH_URL` may
//! list several Keystone URLs separated by commas; each one becomes its own
//! [`AuthOptions`] and the registry tries them in order.

use std::fmt;

use k8s_openapi::api::core::v1::Secret;

use crate::constants::{DEFAULT_ENDPOINT_INTERFACE, HTTPS_PREFIX, HTTP_PREFIX};
use crate::errors::PlatformError;
use crate::store::secret_string;

pub const AUTH_URL_KEY: &str = "OS_AUTH_URL";
pub const USERNAME_KEY: &str = "OS_USERNAME";
pub const USER_ID_KEY: &str = "OS_USERID";
pub const PASSWORD_KEY: &str = "OS_PASSWORD";
pub const TENANT_ID_KEY: &str = "OS_TENANT_ID";
pub const TENANT_NAME_KEY: &str = "OS_TENANT_NAME";
pub const DOMAIN_ID_KEY: &str = "OS_PROJECT_DOMAIN_ID";
pub const DOMAIN_NAME_KEY: &str = "OS_PROJECT_DOMAIN_NAME";
pub const REGION_NAME_KEY: &str = "OS_REGION_NAME";
pub const KEYSTONE_REGION_NAME_KEY: &str = "OS_KEYSTONE_REGION_NAME";
pub const APPLICATION_CREDENTIAL_ID_KEY: &str = "OS_APPLICATION_CREDENTIAL_ID";
pub const APPLICATION_CREDENTIAL_NAME_KEY: &str = "OS_APPLICATION_CREDENTIAL_NAME";
pub const APPLICATION_CREDENTIAL_SECRET_KEY: &str = "OS_APPLICATION_CREDENTIAL_SECRET";
pub const PROJECT_ID_KEY: &str = "OS_PROJECT_ID";
pub const PROJECT_NAME_KEY: &str = "OS_PROJECT_NAME";
pub const INTERFACE_KEY: &str = "OS_INTERFACE";
pub const DEBUG_KEY: &str = "OS_DEBUG";

const REDACTED: &str = "***REDACTED***";

/// Credentials for one Keystone URL.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthOptions {
    pub identity_endpoint: String,
    pub user_id: String,
    pub username: String,
    pub password: String,
    pub tenant_id: String,
    pub tenant_name: String,
    pub domain_id: String,
    pub domain_name: String,
    pub application_credential_id: String,
    pub application_credential_name: String,
    pub application_credential_secret: String,
}

impl AuthOptions {
    /// Returns true when authenticating with an application credential.
    #[must_use]
    pub fn uses_application_credential(&self) -> bool {
        !self.application_credential_id.is_empty() || !self.application_credential_name.is_empty()
    }

    /// Returns a copy of the options with the URL scheme swapped between
    /// `http://` and `https://`, or `None` if the URL has neither prefix.
    #[must_use]
    pub fn with_swapped_scheme(&self) -> Option<Self> {
        let endpoint = if let Some(rest) = self.identity_endpoint.strip_prefix(HTTP_PREFIX) {
            format!("{HTTPS_PREFIX}{rest}")
        } else if let Some(rest) = self.identity_endpoint.strip_prefix(HTTPS_PREFIX) {
            format!("{HTTP_PREFIX}{rest}")
        } else {
            return None;
        };
        Some(Self {
            identity_endpoint: endpoint,
            ..self.clone()
        })
    }
}

impl fmt::Debug for AuthOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |s: &str| if s.is_empty() { "" } else { REDACTED };
        f.debug_struct("AuthOptions")
            .field("identity_endpoint", &self.identity_endpoint)
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("tenant_id", &self.tenant_id)
            .field("tenant_name", &self.tenant_name)
            .field("domain_id", &self.domain_id)
            .field("domain_name", &self.domain_name)
            .field("application_credential_id", &self.application_credential_id)
            .field(
                "application_credential_name",
                &self.application_credential_name,
            )
            .field(
                "application_credential_secret",
                &redact(&self.application_credential_secret),
            )
            .finish()
    }
}

/// Identifies a service endpoint in the Keystone catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointOptions {
    pub name: String,
    pub service_type: String,
    /// Endpoint interface: `public`, `internal` or `admin`
    pub availability: String,
    pub region: String,
    /// Log every request and response
    pub debug: bool,
}

/// Everything read from the secret that is needed to build clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// One entry per URL listed in `OS_AUTH_URL`
    pub options: Vec<AuthOptions>,
    pub region: String,
    pub keystone_region: String,
    pub interface: String,
    pub debug: bool,
}

impl ClientSettings {
    /// Endpoint lookup parameters for the named service.
    #[must_use]
    pub fn endpoint(&self, name: &str, service_type: &str) -> EndpointOptions {
        EndpointOptions {
            name: name.to_string(),
            service_type: service_type.to_string(),
            availability: self.interface.clone(),
            region: self.region.clone(),
            debug: self.debug,
        }
    }
}

fn invalid(message: &str) -> PlatformError {
    PlatformError::InvalidOptions(message.to_string())
}

/// Parses client settings from the `system-endpoint` secret.
///
/// # Errors
///
/// Returns [`PlatformError::InvalidOptions`] when a mandatory key is missing.
pub fn settings_from_secret(secret: &Secret) -> Result<ClientSettings, PlatformError> {
    let value = |key: &str| secret_string(secret, key).unwrap_or_default();

    let auth_url = value(AUTH_URL_KEY);
    let username = value(USERNAME_KEY);
    let user_id = value(USER_ID_KEY);
    let password = value(PASSWORD_KEY);
    let application_credential_id = value(APPLICATION_CREDENTIAL_ID_KEY);
    let application_credential_name = value(APPLICATION_CREDENTIAL_NAME_KEY);
    let application_credential_secret = value(APPLICATION_CREDENTIAL_SECRET_KEY);

    let mut tenant_id = value(TENANT_ID_KEY);
    let mut tenant_name = value(TENANT_NAME_KEY);
    let project_id = value(PROJECT_ID_KEY);
    let project_name = value(PROJECT_NAME_KEY);
    if !project_id.is_empty() {
        tenant_id = project_id;
    }
    if !project_name.is_empty() {
        tenant_name = project_name;
    }

    if auth_url.is_empty() {
        return Err(invalid("OS_AUTH_URL must be provided"));
    }
    if user_id.is_empty() && username.is_empty() {
        return Err(invalid("OS_USERID or OS_USERNAME must be provided"));
    }
    let application_credential =
        !application_credential_id.is_empty() || !application_credential_name.is_empty();
    if password.is_empty() && !application_credential {
        return Err(invalid("OS_PASSWORD must be provided"));
    }
    if application_credential && application_credential_secret.is_empty() {
        return Err(invalid("OS_APPLICATION_CREDENTIAL_SECRET must be provided"));
    }

    let template = AuthOptions {
        identity_endpoint: String::new(),
        user_id,
        username,
        password,
        tenant_id,
        tenant_name,
        domain_id: value(DOMAIN_ID_KEY),
        domain_name: value(DOMAIN_NAME_KEY),
        application_credential_id,
        application_credential_name,
        application_credential_secret,
    };

    let options = auth_url
        .split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(|url| AuthOptions {
            identity_endpoint: url.to_string(),
            ..template.clone()
        })
        .collect();

    let interface = value(INTERFACE_KEY);
    let debug = value(DEBUG_KEY);

    Ok(ClientSettings {
        options,
        region: value(REGION_NAME_KEY),
        keystone_region: value(KEYSTONE_REGION_NAME_KEY),
        interface: if interface.is_empty() {
            DEFAULT_ENDPOINT_INTERFACE.to_string()
        } else {
            interface
        },
        debug: debug.parse::<bool>().unwrap_or(false),
    })
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod auth_tests;
