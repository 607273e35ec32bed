// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Keystone v3 authentication and the reqwest-backed [`PlatformClient`].
//!
//! A client is built by requesting a token from `<auth-url>/auth/tokens`,
//! locating the service endpoint in the returned catalog, and then sending
//! every request with the token in `X-Auth-Token`. An expired token (HTTP 401)
//! triggers one re-authentication and a single retry of the request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use url::Url;

use super::auth::{AuthOptions, EndpointOptions};
use super::{PatchOp, PlatformClient, PlatformConnector, Upload};
use crate::errors::PlatformError;

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Service entry of a Keystone catalog.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

/// One endpoint of a catalog service.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CatalogEndpoint {
    pub interface: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub region_id: Option<String>,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    token: TokenInfo,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

/// An issued token together with the service catalog.
#[derive(Debug, Clone)]
pub struct Token {
    pub id: String,
    pub catalog: Vec<CatalogEntry>,
}

/// Returns the URL of the endpoint matching `opts`.
///
/// # Errors
///
/// Returns [`PlatformError::EndpointNotFound`] if nothing matches.
pub fn locate_endpoint(
    catalog: &[CatalogEntry],
    opts: &EndpointOptions,
) -> Result<String, PlatformError> {
    catalog
        .iter()
        .filter(|entry| entry.service_type == opts.service_type)
        .filter(|entry| opts.name.is_empty() || entry.name == opts.name)
        .flat_map(|entry| entry.endpoints.iter())
        .find(|endpoint| {
            endpoint.interface == opts.availability
                && (opts.region.is_empty()
                    || endpoint.region.as_deref() == Some(opts.region.as_str())
                    || endpoint.region_id.as_deref() == Some(opts.region.as_str()))
        })
        .map(|endpoint| endpoint.url.trim_end_matches('/').to_string())
        .ok_or_else(|| PlatformError::EndpointNotFound {
            name: opts.name.clone(),
            service_type: opts.service_type.clone(),
        })
}

fn tokens_url(identity_endpoint: &str) -> String {
    let base = identity_endpoint.trim_end_matches('/');
    if base.ends_with("/v3") {
        format!("{base}/auth/tokens")
    } else {
        format!("{base}/v3/auth/tokens")
    }
}

fn domain_ref(auth: &AuthOptions) -> Value {
    if !auth.domain_id.is_empty() {
        json!({ "id": auth.domain_id })
    } else if !auth.domain_name.is_empty() {
        json!({ "name": auth.domain_name })
    } else {
        json!({ "id": "default" })
    }
}

fn user_ref(auth: &AuthOptions) -> Value {
    if auth.user_id.is_empty() {
        json!({ "name": auth.username, "domain": domain_ref(auth) })
    } else {
        json!({ "id": auth.user_id })
    }
}

/// Builds the body of a token request.
#[must_use]
pub fn token_request(auth: &AuthOptions) -> Value {
    if auth.uses_application_credential() {
        let mut credential = json!({ "secret": auth.application_credential_secret });
        if auth.application_credential_id.is_empty() {
            credential["name"] = json!(auth.application_credential_name);
            credential["user"] = user_ref(auth);
        } else {
            credential["id"] = json!(auth.application_credential_id);
        }
        return json!({
            "auth": {
                "identity": {
                    "methods": ["application_credential"],
                    "application_credential": credential,
                }
            }
        });
    }

    let mut user = user_ref(auth);
    user["password"] = json!(auth.password);
    let mut body = json!({
        "auth": {
            "identity": {
                "methods": ["password"],
                "password": { "user": user },
            }
        }
    });

    if !auth.tenant_id.is_empty() {
        body["auth"]["scope"] = json!({ "project": { "id": auth.tenant_id } });
    } else if !auth.tenant_name.is_empty() {
        body["auth"]["scope"] = json!({
            "project": { "name": auth.tenant_name, "domain": domain_ref(auth) }
        });
    }
    body
}

fn transport_error(url: &str, err: &reqwest::Error) -> PlatformError {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    PlatformError::from_transport_message(url, &message)
}

/// Extracts the human-readable message from an error response.
///
/// The inventory API wraps its error in `error_message`, itself a JSON
/// document carrying `faultstring`.
#[must_use]
pub fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    if let Some(inner) = value.get("error_message").and_then(Value::as_str) {
        if let Ok(inner) = serde_json::from_str::<Value>(inner) {
            if let Some(fault) = inner.get("faultstring").and_then(Value::as_str) {
                return fault.to_string();
            }
        }
        return inner.to_string();
    }
    if let Some(fault) = value.get("faultstring").and_then(Value::as_str) {
        return fault.to_string();
    }
    body.trim().to_string()
}

/// Requests a token.
///
/// # Errors
///
/// Returns a transport error, or [`PlatformError::Http`] if Keystone rejects
/// the credentials.
pub async fn authenticate(http: &HttpClient, auth: &AuthOptions) -> Result<Token, PlatformError> {
    let url = tokens_url(&auth.identity_endpoint);
    debug!(url = %url, "Requesting keystone token");

    let response = http
        .post(&url)
        .json(&token_request(auth))
        .send()
        .await
        .map_err(|e| transport_error(&url, &e))?;

    let status = response.status();
    let id = response
        .headers()
        .get(SUBJECT_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let text = response
        .text()
        .await
        .map_err(|e| transport_error(&url, &e))?;

    if !status.is_success() {
        return Err(PlatformError::Http {
            status: status.as_u16(),
            method: "POST".to_string(),
            url,
            message: error_message(&text),
        });
    }

    let id = id.ok_or_else(|| PlatformError::Decode {
        url: url.clone(),
        message: format!("missing {SUBJECT_TOKEN_HEADER} header"),
    })?;
    let body: TokenBody = serde_json::from_str(&text).map_err(|e| PlatformError::Decode {
        url,
        message: e.to_string(),
    })?;

    Ok(Token {
        id,
        catalog: body.token.catalog,
    })
}

/// Builds reqwest clients authenticated against Keystone.
#[derive(Clone)]
pub struct KeystoneConnector {
    http: HttpClient,
}

impl KeystoneConnector {
    /// Create a connector with a shared HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, PlatformError> {
        super::install_crypto_provider();
        let http = HttpClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PlatformError::InvalidOptions(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl PlatformConnector for KeystoneConnector {
    async fn connect(
        &self,
        auth: &AuthOptions,
        endpoint: &EndpointOptions,
    ) -> Result<Arc<dyn PlatformClient>, PlatformError> {
        let token = authenticate(&self.http, auth).await?;
        let url = locate_endpoint(&token.catalog, endpoint)?;
        Url::parse(&url)
            .map_err(|e| PlatformError::InvalidOptions(format!("invalid endpoint {url}: {e}")))?;
        info!(
            endpoint = %url,
            service = %endpoint.name,
            "Authenticated platform client"
        );
        Ok(Arc::new(HttpPlatformClient {
            http: self.http.clone(),
            endpoint: url,
            auth: auth.clone(),
            token: RwLock::new(token.id),
            debug: endpoint.debug,
        }))
    }
}

enum Body<'a> {
    Empty,
    Json(&'a Value),
    Patch(&'a [PatchOp]),
    Upload(&'a Upload),
}

/// [`PlatformClient`] sending requests with reqwest.
pub struct HttpPlatformClient {
    http: HttpClient,
    endpoint: String,
    auth: AuthOptions,
    token: RwLock<String>,
    debug: bool,
}

impl HttpPlatformClient {
    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn build(&self, method: &Method, url: &str, token: &str, body: &Body<'_>) -> RequestBuilder {
        let request = self
            .http
            .request(method.clone(), url)
            .header(AUTH_TOKEN_HEADER, token)
            .header(reqwest::header::ACCEPT, "application/json");
        match body {
            Body::Empty => request,
            Body::Json(value) => request.json(value),
            Body::Patch(ops) => request.json(ops),
            Body::Upload(upload) => {
                let part = reqwest::multipart::Part::bytes(upload.contents.clone())
                    .file_name(upload.file_name.clone());
                let mut form = reqwest::multipart::Form::new().part("file", part);
                for (key, value) in &upload.fields {
                    form = form.text(key.clone(), value.clone());
                }
                request.multipart(form)
            }
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Body<'_>,
    ) -> Result<Value, PlatformError> {
        let url = self.url(path);
        let mut reauthenticated = false;

        loop {
            let token = self.token.read().await.clone();
            if self.debug {
                debug!(method = %method, url = %url, "Platform API request");
            }

            let response = self
                .build(&method, &url, &token, &body)
                .send()
                .await
                .map_err(|e| transport_error(&url, &e))?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED && !reauthenticated {
                info!(url = %url, "Platform token rejected, re-authenticating");
                let fresh = authenticate(&self.http, &self.auth).await?;
                *self.token.write().await = fresh.id;
                reauthenticated = true;
                continue;
            }

            let text = response
                .text()
                .await
                .map_err(|e| transport_error(&url, &e))?;

            if !status.is_success() {
                let message = error_message(&text);
                error!(
                    method = %method,
                    url = %url,
                    status = %status,
                    error = %message,
                    "Platform API request failed"
                );
                return Err(PlatformError::Http {
                    status: status.as_u16(),
                    method: method.to_string(),
                    url,
                    message,
                });
            }

            if self.debug {
                debug!(
                    method = %method,
                    url = %url,
                    status = %status,
                    body = %text,
                    "Platform API response"
                );
            }

            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&text).map_err(|e| PlatformError::Decode {
                url,
                message: e.to_string(),
            });
        }
    }
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    async fn get(&self, path: &str) -> Result<Value, PlatformError> {
        self.send(Method::GET, path, Body::Empty).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, PlatformError> {
        self.send(Method::POST, path, Body::Json(body)).await
    }

    async fn patch(&self, path: &str, ops: &[PatchOp]) -> Result<Value, PlatformError> {
        self.send(Method::PATCH, path, Body::Patch(ops)).await
    }

    async fn delete(&self, path: &str) -> Result<(), PlatformError> {
        self.send(Method::DELETE, path, Body::Empty).await.map(|_| ())
    }

    async fn upload(&self, path: &str, upload: Upload) -> Result<Value, PlatformError> {
        self.send(Method::POST, path, Body::Upload(&upload)).await
    }
}

#[cfg(test)]
#[path = "keystone_tests.rs"]
mod keystone_tests;
