// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! URN Target Set (§4.1): an immutable set of identifier patterns used to
//! scope a deployment to a subset of resources (`--target`).

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::urn::Urn;

/// Immutable set of literal URNs and glob patterns. The zero value (no
/// patterns) is *unconstrained*: it matches every URN.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TargetSet {
    patterns: Vec<String>,
    #[serde(skip)]
    compiled: OnceLock<Vec<Regex>>,
}

impl Clone for TargetSet {
    fn clone(&self) -> Self {
        TargetSet::new(self.patterns.clone())
    }
}

impl PartialEq for TargetSet {
    fn eq(&self, other: &Self) -> bool {
        self.patterns == other.patterns
    }
}

impl TargetSet {
    pub fn new(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        TargetSet { patterns: patterns.into_iter().map(Into::into).collect(), compiled: OnceLock::new() }
    }

    /// An unconstrained set matching every URN.
    pub fn unconstrained() -> Self {
        TargetSet::default()
    }

    pub fn is_unconstrained(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Literal (non-glob) patterns in this set, in declaration order.
    pub fn literals(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(String::as_str).filter(|p| !p.contains('*'))
    }

    /// Add a pattern, but only if the set is already non-empty — a target
    /// set is either fully unconstrained or an explicit, non-empty list.
    pub fn add_if_nonempty(&mut self, pattern: impl Into<String>) {
        if !self.patterns.is_empty() {
            self.patterns.push(pattern.into());
            self.compiled = OnceLock::new();
        }
    }

    pub fn contains(&self, urn: &Urn) -> bool {
        if self.is_unconstrained() {
            return true;
        }
        let compiled = self.compiled.get_or_init(|| self.patterns.iter().map(|p| compile_glob(p)).collect());
        compiled.iter().any(|re| re.is_match(urn.as_str()))
    }
}

/// `*` matches a run of non-`:` characters; `**` matches anything, including `:`.
fn compile_glob(pattern: &str) -> Regex {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '*' {
            if chars.peek() == Some(&'*') {
                chars.next();
                out.push_str(".*");
            } else {
                out.push_str("[^:]*");
            }
        } else {
            out.push_str(&regex::escape(&c.to_string()));
        }
    }
    out.push('$');
    // `out` is built entirely from escaped literals and the two fixed
    // wildcard substitutions above, so it is always a valid pattern.
    #[allow(clippy::unwrap_used)]
    Regex::new(&out).unwrap()
}

#[cfg(test)]
#[path = "target_tests.rs"]
mod tests;
