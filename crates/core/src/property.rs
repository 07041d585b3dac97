// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Property values: the shape of resource inputs and outputs.
//!
//! A thin wrapper over JSON values that additionally tracks two bits of
//! provider-protocol metadata that plain JSON cannot express: secretness and
//! "not known until after this operation applies" (used for partial plans).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub type PropertyMap = IndexMap<String, PropertyValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<PropertyValue>),
    Object(PropertyMap),
    /// Wraps a value that must be treated as secret by collaborators.
    Secret(Box<PropertyValue>),
    /// A value whose concrete contents are not known until apply time.
    /// Carries the type's zero value so previews can still render shape.
    Computed(Box<PropertyValue>),
}

impl PropertyValue {
    pub fn string(s: impl Into<String>) -> Self {
        PropertyValue::String(s.into())
    }

    pub fn number(n: impl Into<f64>) -> Self {
        PropertyValue::Number(serde_json::Number::from_f64(n.into()).unwrap_or_else(|| 0.into()))
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, PropertyValue::Secret(_))
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, PropertyValue::Computed(_))
    }

    /// Whether this value (or anything nested inside it) contains an unknown.
    /// A plan whose goal contains any such value is necessarily partial.
    pub fn contains_unknowns(&self) -> bool {
        match self {
            PropertyValue::Computed(_) => true,
            PropertyValue::Secret(inner) => inner.contains_unknowns(),
            PropertyValue::Array(items) => items.iter().any(PropertyValue::contains_unknowns),
            PropertyValue::Object(fields) => {
                fields.values().any(PropertyValue::contains_unknowns)
            }
            _ => false,
        }
    }

    /// Unwraps secret/computed markers for deep structural comparison.
    fn peel(&self) -> &PropertyValue {
        match self {
            PropertyValue::Secret(inner) | PropertyValue::Computed(inner) => inner.peel(),
            other => other,
        }
    }

    /// Deep-equals used by the generator to decide "same" vs. needs-diff.
    /// Secret/computed wrapping is transparent to equality — only the
    /// underlying shape matters, matching provider diff semantics.
    pub fn deep_eq(&self, other: &PropertyValue) -> bool {
        match (self.peel(), other.peel()) {
            (PropertyValue::Null, PropertyValue::Null) => true,
            (PropertyValue::Bool(a), PropertyValue::Bool(b)) => a == b,
            (PropertyValue::Number(a), PropertyValue::Number(b)) => a == b,
            (PropertyValue::String(a), PropertyValue::String(b)) => a == b,
            (PropertyValue::Array(a), PropertyValue::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.deep_eq(y))
            }
            (PropertyValue::Object(a), PropertyValue::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).is_some_and(|bv| v.deep_eq(bv)))
            }
            _ => false,
        }
    }
}

impl From<serde_json::Value> for PropertyValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => PropertyValue::Null,
            serde_json::Value::Bool(b) => PropertyValue::Bool(b),
            serde_json::Value::Number(n) => PropertyValue::Number(n),
            serde_json::Value::String(s) => PropertyValue::String(s),
            serde_json::Value::Array(a) => {
                PropertyValue::Array(a.into_iter().map(PropertyValue::from).collect())
            }
            serde_json::Value::Object(o) => {
                PropertyValue::Object(o.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

/// Deep-equals two maps, ignoring keys listed in `ignore_changes`.
pub fn maps_equal_ignoring(a: &PropertyMap, b: &PropertyMap, ignore_changes: &[String]) -> bool {
    let relevant_keys: std::collections::BTreeSet<&String> = a
        .keys()
        .chain(b.keys())
        .filter(|k| !ignore_changes.iter().any(|ig| ig == *k))
        .collect();
    relevant_keys.into_iter().all(|k| match (a.get(k), b.get(k)) {
        (Some(x), Some(y)) => x.deep_eq(y),
        (None, None) => true,
        _ => false,
    })
}

#[cfg(test)]
#[path = "property_tests.rs"]
mod tests;
