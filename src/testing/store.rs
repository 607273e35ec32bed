// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::errors::StoreError;
use crate::store::{ObjectStore, ResourceKind};

type Key = (ResourceKind, String, String);

/// Applies an RFC 7386 JSON merge patch.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = json!({});
    }
    if let Value::Object(target_map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else {
                merge_patch(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

#[derive(Default)]
struct StoreState {
    objects: BTreeMap<Key, Value>,
    resource_version: u64,
    uid: u64,
    failures: VecDeque<(ResourceKind, String, StoreError)>,
    patches: Vec<(ResourceKind, String, Value)>,
}

/// In-memory [`ObjectStore`] with API server semantics for merge patches,
/// resource versions, generations and finalizers.
#[derive(Default)]
pub struct FakeObjectStore {
    state: Mutex<StoreState>,
}

fn meta_str<'a>(object: &'a Value, field: &str) -> Option<&'a str> {
    object.get("metadata")?.get(field)?.as_str()
}

impl FakeObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut state)
    }

    /// Creates an object. Missing uid, generation and resourceVersion are filled in.
    pub fn insert<T: Serialize>(&self, kind: ResourceKind, object: &T) -> Value {
        let mut value = serde_json::to_value(object).unwrap();
        self.with_state(|state| {
            state.resource_version += 1;
            state.uid += 1;
            let rv = state.resource_version.to_string();
            let uid = format!("uid-{}", state.uid);
            let meta = value
                .as_object_mut()
                .unwrap()
                .entry("metadata")
                .or_insert_with(|| json!({}));
            meta["resourceVersion"] = json!(rv);
            if meta.get("uid").is_none() {
                meta["uid"] = json!(uid);
            }
            if meta.get("generation").is_none() {
                meta["generation"] = json!(1);
            }
            let namespace = meta_str(&value, "namespace").unwrap_or_default().to_string();
            let name = meta_str(&value, "name").unwrap_or_default().to_string();
            state
                .objects
                .insert((kind, namespace, name), value.clone());
            value
        })
    }

    pub fn object(&self, kind: ResourceKind, namespace: &str, name: &str) -> Option<Value> {
        self.with_state(|state| {
            state
                .objects
                .get(&(kind, namespace.to_string(), name.to_string()))
                .cloned()
        })
    }

    pub fn typed<T: DeserializeOwned>(&self, kind: ResourceKind, namespace: &str, name: &str) -> T {
        serde_json::from_value(self.object(kind, namespace, name).unwrap()).unwrap()
    }

    /// Simulates a user edit of the spec, bumping the generation.
    pub fn update_spec(&self, kind: ResourceKind, namespace: &str, name: &str, spec_patch: &Value) {
        self.with_state(|state| {
            state.resource_version += 1;
            let rv = state.resource_version.to_string();
            let object = state
                .objects
                .get_mut(&(kind, namespace.to_string(), name.to_string()))
                .unwrap();
            merge_patch(&mut object["spec"], spec_patch);
            let generation = object["metadata"]["generation"].as_i64().unwrap_or(1);
            object["metadata"]["generation"] = json!(generation + 1);
            object["metadata"]["resourceVersion"] = json!(rv);
        });
    }

    /// Simulates a user edit of the metadata (annotations, labels).
    pub fn update_metadata(&self, kind: ResourceKind, namespace: &str, name: &str, patch: &Value) {
        self.with_state(|state| {
            state.resource_version += 1;
            let rv = state.resource_version.to_string();
            let object = state
                .objects
                .get_mut(&(kind, namespace.to_string(), name.to_string()))
                .unwrap();
            merge_patch(&mut object["metadata"], patch);
            object["metadata"]["resourceVersion"] = json!(rv);
        });
    }

    /// Simulates `kubectl delete`: the object stays while finalizers remain.
    pub fn mark_deleted(&self, kind: ResourceKind, namespace: &str, name: &str) {
        self.with_state(|state| {
            let key = (kind, namespace.to_string(), name.to_string());
            let Some(object) = state.objects.get_mut(&key) else {
                return;
            };
            object["metadata"]["deletionTimestamp"] = json!("2025-01-01T00:00:00Z");
            let empty = object["metadata"]["finalizers"]
                .as_array()
                .is_none_or(Vec::is_empty);
            if empty {
                state.objects.remove(&key);
            }
        });
    }

    /// Makes the next write to the named object fail.
    pub fn fail_next(&self, kind: ResourceKind, name: &str, error: StoreError) {
        self.with_state(|state| {
            state.failures.push_back((kind, name.to_string(), error));
        });
    }

    /// Every patch applied so far, as `(kind, name, patch)`.
    pub fn patches(&self) -> Vec<(ResourceKind, String, Value)> {
        self.with_state(|state| state.patches.clone())
    }

    pub fn annotation(&self, kind: ResourceKind, namespace: &str, name: &str, key: &str) -> Option<String> {
        self.object(kind, namespace, name)?
            .get("metadata")?
            .get("annotations")?
            .get(key)?
            .as_str()
            .map(str::to_string)
    }

    fn apply(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        patch: &Value,
        status: bool,
    ) -> Result<Value, StoreError> {
        self.with_state(|state| {
            if let Some(pos) = state
                .failures
                .iter()
                .position(|(k, n, _)| *k == kind && n == name)
            {
                if let Some((_, _, err)) = state.failures.remove(pos) {
                    return Err(err);
                }
            }

            let key = (kind, namespace.to_string(), name.to_string());
            let next_rv = state.resource_version + 1;
            let object = state.objects.get_mut(&key).ok_or_else(|| StoreError::NotFound {
                kind: kind.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            })?;

            if let Some(expected) = patch
                .get("metadata")
                .and_then(|m| m.get("resourceVersion"))
                .and_then(Value::as_str)
            {
                if meta_str(object, "resourceVersion") != Some(expected) {
                    return Err(StoreError::Conflict(format!(
                        "{kind} {namespace}/{name} resourceVersion {expected} is stale"
                    )));
                }
            }

            let old_spec = object.get("spec").cloned();
            if status {
                if let Some(status_patch) = patch.get("status") {
                    merge_patch(&mut object["status"], status_patch);
                }
            } else {
                let mut body = patch.clone();
                if let Some(map) = body.as_object_mut() {
                    map.remove("status");
                }
                merge_patch(object, &body);
                if object.get("spec").cloned() != old_spec {
                    let generation = object["metadata"]["generation"].as_i64().unwrap_or(1);
                    object["metadata"]["generation"] = json!(generation + 1);
                }
            }
            object["metadata"]["resourceVersion"] = json!(next_rv.to_string());
            let result = object.clone();

            state.resource_version = next_rv;
            state.patches.push((kind, name.to_string(), patch.clone()));

            let deleting = result["metadata"].get("deletionTimestamp").is_some();
            let finalized = result["metadata"]["finalizers"]
                .as_array()
                .is_none_or(Vec::is_empty);
            if deleting && finalized {
                state.objects.remove(&key);
            }
            Ok(result)
        })
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Value>, StoreError> {
        Ok(self.object(kind, namespace, name))
    }

    async fn list(&self, kind: ResourceKind, namespace: &str) -> Result<Vec<Value>, StoreError> {
        Ok(self.with_state(|state| {
            state
                .objects
                .iter()
                .filter(|((k, ns, _), _)| *k == kind && ns == namespace)
                .map(|(_, v)| v.clone())
                .collect()
        }))
    }

    async fn patch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<Value, StoreError> {
        self.apply(kind, namespace, name, patch, false)
    }

    async fn patch_status(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<Value, StoreError> {
        self.apply(kind, namespace, name, patch, true)
    }
}
