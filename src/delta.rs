// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Human-readable differences between desired and observed state.
//!
//! Both sides are flattened to dotted member paths and compared. Each changed
//! path yields a `-` line with the observed value and a `+` line with the
//! desired value:
//!
//! ```text
//! 	- mtu: 1500
//! 	+ mtu: 1400
//! ```

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::platform::PatchOp;

fn flatten(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&path, child, out);
            }
        }
        Value::Null => {}
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

/// Renders the difference between `current` and `desired` as delta lines.
///
/// # Errors
///
/// Returns an error if either side cannot be serialized.
pub fn delta_string<D: Serialize, C: Serialize>(
    desired: &D,
    current: &C,
) -> Result<String, serde_json::Error> {
    let mut wanted = BTreeMap::new();
    let mut observed = BTreeMap::new();
    flatten("", &serde_json::to_value(desired)?, &mut wanted);
    flatten("", &serde_json::to_value(current)?, &mut observed);

    let mut lines = Vec::new();
    let mut keys: Vec<&String> = wanted.keys().chain(observed.keys()).collect();
    keys.sort();
    keys.dedup();

    for key in keys {
        let (old, new) = (observed.get(key), wanted.get(key));
        if old == new {
            continue;
        }
        if let Some(old) = old {
            lines.push(format!("\t- {key}: {old}"));
        }
        if let Some(new) = new {
            lines.push(format!("\t+ {key}: {new}"));
        }
    }

    Ok(lines.join("\n"))
}

/// Splits two string lists into the entries to add and the entries to remove.
///
/// Order follows `desired` for additions and `current` for removals;
/// duplicates are ignored.
#[must_use]
pub fn list_delta(current: &[String], desired: &[String]) -> (Vec<String>, Vec<String>) {
    let mut added: Vec<String> = Vec::new();
    for item in desired {
        if !current.contains(item) && !added.contains(item) {
            added.push(item.clone());
        }
    }
    let mut removed: Vec<String> = Vec::new();
    for item in current {
        if !desired.contains(item) && !removed.contains(item) {
            removed.push(item.clone());
        }
    }
    (added, removed)
}

/// Renders list additions and removals as delta lines.
#[must_use]
pub fn list_delta_string(added: &[String], removed: &[String]) -> String {
    added
        .iter()
        .map(|a| format!("\t+ {a}"))
        .chain(removed.iter().map(|r| format!("\t- {r}")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The members of a desired object that differ from the observed object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldChanges {
    /// Desired values of the changed members
    pub desired: Map<String, Value>,
    /// Observed values of the same members, where the observed side has one
    pub current: Map<String, Value>,
}

impl FieldChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.desired.is_empty()
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.desired.contains_key(field)
    }

    /// Keeps only the members for which `keep` returns true.
    pub fn retain(&mut self, keep: impl Fn(&str) -> bool) {
        self.desired.retain(|k, _| keep(k));
        self.current.retain(|k, _| keep(k));
    }

    /// One `replace` operation per changed member.
    #[must_use]
    pub fn patch_ops(&self) -> Vec<PatchOp> {
        self.desired
            .iter()
            .map(|(field, value)| PatchOp::replace(field, value.clone()))
            .collect()
    }

    /// The changes as delta lines.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be serialized.
    pub fn delta(&self) -> Result<String, serde_json::Error> {
        delta_string(&self.desired, &self.current)
    }
}

fn members<T: Serialize>(value: &T) -> Result<Map<String, Value>, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

/// Compares the top-level members set on `desired` with `current`.
///
/// Members that are null or absent on the desired side are not compared.
///
/// # Errors
///
/// Returns an error if either side cannot be serialized.
pub fn changed_fields<D: Serialize, C: Serialize>(
    desired: &D,
    current: &C,
) -> Result<FieldChanges, serde_json::Error> {
    let observed = members(current)?;
    let mut changes = FieldChanges::default();

    for (field, value) in members(desired)? {
        if value.is_null() {
            continue;
        }
        match observed.get(&field) {
            Some(old) if *old == value => {}
            Some(old) => {
                changes.current.insert(field.clone(), old.clone());
                changes.desired.insert(field, value);
            }
            None => {
                changes.desired.insert(field, value);
            }
        }
    }

    Ok(changes)
}

#[cfg(test)]
#[path = "delta_tests.rs"]
mod delta_tests;
