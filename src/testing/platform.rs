// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::errors::PlatformError;
use crate::platform::{AuthOptions, EndpointOptions, PatchOp, PlatformClient, PlatformConnector, Upload};

/// One request seen by [`FakePlatform`].
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: String,
    pub path: String,
    pub body: Value,
}

struct Scripted {
    method: String,
    path: String,
    response: Result<Value, PlatformError>,
    once: bool,
}

#[derive(Default)]
struct PlatformState {
    collections: BTreeMap<String, Vec<Value>>,
    scripted: Vec<Scripted>,
    calls: Vec<Call>,
    next_id: u64,
}

/// In-memory platform endpoint.
///
/// Collections are stored by path. Plain CRUD on `<collection>` and
/// `<collection>/<uuid>` is served from memory; anything else must be
/// scripted with [`FakePlatform::on`] or [`FakePlatform::once`].
pub struct FakePlatform {
    endpoint: String,
    state: Mutex<PlatformState>,
}

/// Wrapper key used by the list response of a collection.
fn list_key(collection: &str) -> &str {
    match collection {
        "idns" => "idnss",
        "intp" => "intps",
        "ptp" => "ptps",
        "drbdconfig" => "drbdconfigs",
        "service_parameter" => "parameters",
        "storage_backend" => "storage_backends",
        "certificate" => "certificates",
        other => other.rsplit('/').next().unwrap_or(other),
    }
}

fn not_found(endpoint: &str, method: &str, path: &str) -> PlatformError {
    PlatformError::Http {
        status: 404,
        method: method.to_string(),
        url: format!("{endpoint}/{path}"),
        message: "not found".to_string(),
    }
}

impl FakePlatform {
    pub fn new(endpoint: &str) -> Arc<Self> {
        Arc::new(Self {
            endpoint: endpoint.to_string(),
            state: Mutex::new(PlatformState::default()),
        })
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut PlatformState) -> R) -> R {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut state)
    }

    /// Adds an object to a collection, generating a uuid when missing.
    pub fn seed(&self, collection: &str, mut object: Value) -> Value {
        self.with_state(|state| {
            if object.is_object() && object.get("uuid").is_none() {
                state.next_id += 1;
                object["uuid"] = json!(format!("{collection}-{}", state.next_id));
            }
            state
                .collections
                .entry(collection.to_string())
                .or_default()
                .push(object.clone());
            object
        })
    }

    /// Objects currently held in a collection.
    pub fn objects(&self, collection: &str) -> Vec<Value> {
        self.with_state(|state| state.collections.get(collection).cloned().unwrap_or_default())
    }

    /// Replaces fields of a stored object, as the platform would after an external change.
    pub fn modify(&self, collection: &str, uuid: &str, fields: Value) {
        self.with_state(|state| {
            if let Some(object) = state
                .collections
                .get_mut(collection)
                .and_then(|items| items.iter_mut().find(|o| o["uuid"] == uuid))
            {
                if let (Some(target), Some(fields)) = (object.as_object_mut(), fields.as_object()) {
                    for (k, v) in fields {
                        target.insert(k.clone(), v.clone());
                    }
                }
            }
        });
    }

    /// Serves `response` for every `method path` request.
    ///
    /// Pending [`FakePlatform::once`] responses take precedence, and a later
    /// `on` replaces an earlier one.
    pub fn on(&self, method: &str, path: &str, response: Result<Value, PlatformError>) {
        self.script(method, path, response, false);
    }

    /// Serves `response` for the next `method path` request only.
    pub fn once(&self, method: &str, path: &str, response: Result<Value, PlatformError>) {
        self.script(method, path, response, true);
    }

    fn script(&self, method: &str, path: &str, response: Result<Value, PlatformError>, once: bool) {
        self.with_state(|state| {
            state.scripted.push(Scripted {
                method: method.to_string(),
                path: path.to_string(),
                response,
                once,
            });
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.with_state(|state| state.calls.clone())
    }

    pub fn calls_to(&self, method: &str, path: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method && c.path == path)
            .collect()
    }

    /// Number of POST, PATCH and DELETE requests seen.
    pub fn mutations(&self) -> usize {
        self.calls().iter().filter(|c| c.method != "GET").count()
    }

    pub fn clear_calls(&self) {
        self.with_state(|state| state.calls.clear());
    }

    fn record(&self, method: &str, path: &str, body: Value) -> Option<Result<Value, PlatformError>> {
        self.with_state(|state| {
            state.calls.push(Call {
                method: method.to_string(),
                path: path.to_string(),
                body,
            });
            let matches = |s: &Scripted| s.method == method && s.path == path;
            let pos = state
                .scripted
                .iter()
                .position(|s| s.once && matches(s))
                .or_else(|| state.scripted.iter().rposition(|s| !s.once && matches(s)))?;
            if state.scripted[pos].once {
                Some(state.scripted.remove(pos).response)
            } else {
                Some(state.scripted[pos].response.clone())
            }
        })
    }

    fn split(path: &str) -> (&str, &str) {
        path.rsplit_once('/').unwrap_or((path, ""))
    }

    fn do_get(&self, path: &str) -> Result<Value, PlatformError> {
        let endpoint = self.endpoint.clone();
        self.with_state(|state| {
            if let Some(items) = state.collections.get(path) {
                return Ok(json!({ (list_key(path)): items }));
            }
            let (collection, uuid) = Self::split(path);
            if let Some(items) = state.collections.get(collection) {
                return items
                    .iter()
                    .find(|o| o["uuid"] == uuid)
                    .cloned()
                    .ok_or_else(|| not_found(&endpoint, "GET", path));
            }
            Ok(json!({ (list_key(path)): [] }))
        })
    }

    fn do_post(&self, path: &str, body: &Value) -> Result<Value, PlatformError> {
        Ok(self.seed(path, body.clone()))
    }

    fn do_patch(&self, path: &str, ops: &[PatchOp]) -> Result<Value, PlatformError> {
        let endpoint = self.endpoint.clone();
        self.with_state(|state| {
            let (collection, uuid) = Self::split(path);
            let object = state
                .collections
                .get_mut(collection)
                .and_then(|items| items.iter_mut().find(|o| o["uuid"] == uuid))
                .ok_or_else(|| not_found(&endpoint, "PATCH", path))?;
            for op in ops {
                let field = op.path.trim_start_matches('/');
                let value = op.value.clone().unwrap_or(Value::Null);
                match (op.op.as_str(), field) {
                    ("add", "ptp_parameters/-") => {
                        if !object["parameters"].is_array() {
                            object["parameters"] = json!([]);
                        }
                        if let Some(list) = object["parameters"].as_array_mut() {
                            list.push(value);
                        }
                    }
                    ("remove", "ptp_parameters/-") => {
                        if let Some(list) = object["parameters"].as_array_mut() {
                            list.retain(|p| *p != value);
                        }
                    }
                    ("remove", _) => {
                        if let Some(map) = object.as_object_mut() {
                            map.remove(field);
                        }
                    }
                    _ => object[field] = value,
                }
            }
            Ok(object.clone())
        })
    }

    fn do_delete(&self, path: &str) -> Result<(), PlatformError> {
        let endpoint = self.endpoint.clone();
        self.with_state(|state| {
            let (collection, uuid) = Self::split(path);
            let items = state
                .collections
                .get_mut(collection)
                .ok_or_else(|| not_found(&endpoint, "DELETE", path))?;
            let before = items.len();
            items.retain(|o| o["uuid"] != uuid);
            if items.len() == before {
                return Err(not_found(&endpoint, "DELETE", path));
            }
            Ok(())
        })
    }
}

#[async_trait]
impl PlatformClient for FakePlatform {
    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    async fn get(&self, path: &str) -> Result<Value, PlatformError> {
        if let Some(scripted) = self.record("GET", path, Value::Null) {
            return scripted;
        }
        self.do_get(path)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, PlatformError> {
        if let Some(scripted) = self.record("POST", path, body.clone()) {
            return scripted;
        }
        self.do_post(path, body)
    }

    async fn patch(&self, path: &str, ops: &[PatchOp]) -> Result<Value, PlatformError> {
        let body = serde_json::to_value(ops).unwrap_or(Value::Null);
        if let Some(scripted) = self.record("PATCH", path, body) {
            return scripted;
        }
        self.do_patch(path, ops)
    }

    async fn delete(&self, path: &str) -> Result<(), PlatformError> {
        if let Some(scripted) = self.record("DELETE", path, Value::Null) {
            return scripted.map(|_| ());
        }
        self.do_delete(path)
    }

    async fn upload(&self, path: &str, upload: Upload) -> Result<Value, PlatformError> {
        let body = json!({
            "file": upload.file_name,
            "size": upload.contents.len(),
            "fields": upload.fields,
        });
        if let Some(scripted) = self.record("POST", path, body) {
            return scripted;
        }
        Ok(json!({ "success": "", "error": "" }))
    }
}

/// [`PlatformConnector`] handing out fake clients.
///
/// Clients are keyed by service type (`platform`, `nfv`). Connection attempts
/// are recorded with the auth URL used, and failures can be injected per URL.
#[derive(Default)]
pub struct FakeConnector {
    clients: Mutex<HashMap<String, Arc<FakePlatform>>>,
    failures: Mutex<HashMap<String, PlatformError>>,
    attempts: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, service_type: &str, client: Arc<FakePlatform>) {
        if let Ok(mut clients) = self.clients.lock() {
            clients.insert(service_type.to_string(), client);
        }
    }

    /// Fails every connection attempt against `auth_url`.
    pub fn fail(&self, auth_url: &str, error: PlatformError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(auth_url.to_string(), error);
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.clear();
        }
    }

    /// Auth URLs tried so far, in order.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PlatformConnector for FakeConnector {
    async fn connect(
        &self,
        auth: &AuthOptions,
        endpoint: &EndpointOptions,
    ) -> Result<Arc<dyn PlatformClient>, PlatformError> {
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.push(auth.identity_endpoint.clone());
        }
        if let Some(err) = self
            .failures
            .lock()
            .ok()
            .and_then(|f| f.get(&auth.identity_endpoint).cloned())
        {
            return Err(err);
        }
        let client = self
            .clients
            .lock()
            .ok()
            .and_then(|c| c.get(&endpoint.service_type).cloned())
            .ok_or_else(|| PlatformError::EndpointNotFound {
                name: endpoint.name.clone(),
                service_type: endpoint.service_type.clone(),
            })?;
        Ok(client)
    }
}
