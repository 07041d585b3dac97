// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::property::{PropertyMap, PropertyValue};
use crate::urn::Urn;

/// Proptest strategies for core data-model types.
pub mod strategies {
    use super::*;
    use proptest::prelude::*;

    /// A syntactically valid URN over a small alphabet, for use in graph and
    /// target-set property tests where the exact identifier doesn't matter.
    pub fn arb_urn() -> impl Strategy<Value = Urn> {
        ("[a-z]{1,6}", "[a-z]{1,6}", "[a-z]{1,6}")
            .prop_map(|(stack, project, name)| Urn::new(&stack, &project, "", "pkg:index:Widget", &name))
    }

    pub fn arb_leaf_property_value() -> impl Strategy<Value = PropertyValue> {
        prop_oneof![
            Just(PropertyValue::Null),
            any::<bool>().prop_map(PropertyValue::Bool),
            any::<i64>().prop_map(|n| PropertyValue::Number(n.into())),
            "[a-zA-Z0-9 ]{0,16}".prop_map(PropertyValue::String),
        ]
    }

    pub fn arb_property_value() -> impl Strategy<Value = PropertyValue> {
        let leaf = arb_leaf_property_value();
        leaf.prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(PropertyValue::Array),
                prop::collection::vec(("[a-z]{1,6}", inner.clone()), 0..4)
                    .prop_map(|kvs| PropertyValue::Object(kvs.into_iter().collect())),
                inner.clone().prop_map(|v| PropertyValue::Secret(Box::new(v))),
                inner.prop_map(|v| PropertyValue::Computed(Box::new(v))),
            ]
        })
    }

    pub fn arb_property_map() -> impl Strategy<Value = PropertyMap> {
        prop::collection::vec(("[a-z]{1,8}", arb_property_value()), 0..6)
            .prop_map(|kvs| kvs.into_iter().collect())
    }
}

/// A resource's provider-facing input/output pair, useful where a test only
/// cares that outputs are a superset of inputs plus one computed field.
pub fn inputs_with_extra_output(key: &str, value: PropertyValue) -> (PropertyMap, PropertyMap) {
    let mut inputs = PropertyMap::new();
    inputs.insert(key.to_string(), value.clone());
    let mut outputs = inputs.clone();
    outputs.insert("id".to_string(), PropertyValue::string("synthetic"));
    (inputs, outputs)
}
