// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Deep merge of host profiles.
//!
//! A profile inherits from its base by merging the profile over the base, and a
//! host's overrides are merged over the resulting profile. The merge works on
//! the JSON form of the spec:
//!
//! - absent or `null` source members keep the destination value
//! - objects are merged member by member
//! - scalars (strings, numbers, booleans) overwrite, including zero values
//! - an empty source list clears the destination list
//! - lists whose elements have a merge key are merged element by element:
//!   matching elements are merged recursively and the rest are appended
//! - other lists are overwritten when [`MergeTransformer::overwrite_slices`]
//!   is set and kept otherwise

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::crd::HostProfileSpec;

/// Merge keys of keyed lists, by path from the spec root.
///
/// Each key is a list of dotted member paths that must all be equal for two
/// elements to be considered the same instance.
const KEYED_LISTS: &[(&str, &[&str])] = &[
    ("processors", &["node"]),
    ("processors.functions", &["function"]),
    ("memory", &["node"]),
    ("memory.functions", &["function", "pageSize"]),
    ("storage.osds", &["path"]),
    ("storage.volumeGroups", &["name"]),
    ("storage.filesystems", &["name"]),
    ("interfaces.ethernet", &["port.name"]),
    ("interfaces.vlan", &["name", "class"]),
    ("interfaces.bond", &["name", "class"]),
    ("interfaces.vf", &["name", "class"]),
    ("addresses", &["address"]),
    ("routes", &["interface", "subnet", "prefix"]),
];

/// Options controlling a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeTransformer {
    /// Overwrite lists that have no merge key instead of keeping the destination.
    pub overwrite_slices: bool,
}

impl Default for MergeTransformer {
    fn default() -> Self {
        Self {
            overwrite_slices: true,
        }
    }
}

fn key_for(path: &str) -> Option<&'static [&'static str]> {
    KEYED_LISTS
        .iter()
        .find(|(p, _)| *p == path)
        .map(|(_, key)| *key)
}

fn lookup<'a>(value: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted.split('.').try_fold(value, |v, part| v.get(part))
}

fn same_key(a: &Value, b: &Value, key: &[&str]) -> bool {
    key.iter().all(|k| lookup(a, k) == lookup(b, k))
}

fn child_path(path: &str, member: &str) -> String {
    if path.is_empty() {
        member.to_string()
    } else {
        format!("{path}.{member}")
    }
}

impl MergeTransformer {
    /// Merges `src` into `dst` in place.
    pub fn merge_value(&self, dst: &mut Value, src: &Value) {
        self.merge_at(dst, src, "");
    }

    fn merge_at(&self, dst: &mut Value, src: &Value, path: &str) {
        match (dst, src) {
            (_, Value::Null) => {}
            (Value::Object(dst_map), Value::Object(src_map)) => {
                for (member, src_value) in src_map {
                    let member_path = child_path(path, member);
                    match dst_map.get_mut(member) {
                        Some(dst_value) if !dst_value.is_null() => {
                            self.merge_at(dst_value, src_value, &member_path);
                        }
                        _ if src_value.is_null() => {}
                        _ => {
                            dst_map.insert(member.clone(), src_value.clone());
                        }
                    }
                }
            }
            (Value::Array(dst_list), Value::Array(src_list)) => {
                self.merge_list(dst_list, src_list, path);
            }
            (dst, src) => *dst = src.clone(),
        }
    }

    fn merge_list(&self, dst: &mut Vec<Value>, src: &[Value], path: &str) {
        if src.is_empty() || dst.is_empty() {
            *dst = src.to_vec();
            return;
        }

        let Some(key) = key_for(path) else {
            if self.overwrite_slices {
                *dst = src.to_vec();
            }
            return;
        };

        for element in src {
            match dst.iter_mut().find(|d| same_key(d, element, key)) {
                Some(existing) => self.merge_at(existing, element, path),
                None => dst.push(element.clone()),
            }
        }
    }

    /// Merges `src` over `dst` and returns the result as a new value of the same type.
    ///
    /// # Errors
    ///
    /// Returns an error if either value cannot be converted to or from JSON.
    pub fn merge<T: Serialize + DeserializeOwned>(
        &self,
        dst: &T,
        src: &T,
    ) -> Result<T, serde_json::Error> {
        let mut merged = serde_json::to_value(dst)?;
        self.merge_value(&mut merged, &serde_json::to_value(src)?);
        serde_json::from_value(merged)
    }
}

/// Merges a profile over its base with the default transformer.
///
/// # Errors
///
/// Returns an error if the specs cannot be converted to or from JSON.
pub fn merge_profiles(
    base: &HostProfileSpec,
    profile: &HostProfileSpec,
) -> Result<HostProfileSpec, serde_json::Error> {
    MergeTransformer::default().merge(base, profile)
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod merge_tests;
