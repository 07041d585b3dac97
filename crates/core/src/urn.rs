// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! URN: the opaque, fully-qualified identifier of a resource within a stack.
//!
//! Format: `urn:pulumi:<stack>::<project>::<parent-type-chain>$<type>::<name>`
//! Equality is byte equality; ordering is lexicographic — both fall straight
//! out of deriving on the wrapped `String`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const PREFIX: &str = "urn:pulumi:";

/// Fully-qualified resource identifier. Cheap to clone, orders and hashes
/// like the string it wraps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Urn(String);

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum UrnError {
    #[error("urn {0:?} does not start with {PREFIX:?}")]
    MissingPrefix(String),
    #[error("urn {0:?} is missing the {1} field")]
    MissingField(String, &'static str),
}

impl Urn {
    /// Build a URN from its constituent parts. `parent_qualified_type` is the
    /// parent's own qualified type chain (empty for a root-level resource).
    pub fn new(
        stack: &str,
        project: &str,
        parent_qualified_type: &str,
        ty: &str,
        name: &str,
    ) -> Self {
        let qualified_type = if parent_qualified_type.is_empty() {
            ty.to_string()
        } else {
            format!("{parent_qualified_type}${ty}")
        };
        Urn(format!("{PREFIX}{stack}::{project}::{qualified_type}::{name}"))
    }

    pub fn parse(s: impl Into<String>) -> Result<Self, UrnError> {
        let s = s.into();
        if !s.starts_with(PREFIX) {
            return Err(UrnError::MissingPrefix(s));
        }
        let urn = Urn(s);
        // Validate field count eagerly so later accessors can't panic.
        let _ = urn.try_parts()?;
        Ok(urn)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn try_parts(&self) -> Result<(&str, &str, &str, &str), UrnError> {
        let rest = &self.0[PREFIX.len()..];
        let mut it = rest.splitn(3, "::");
        let stack = it.next().ok_or_else(|| self.missing("stack"))?;
        let project = it.next().ok_or_else(|| self.missing("project"))?;
        let qualified = it.next().ok_or_else(|| self.missing("qualified type/name"))?;
        let (qualified_type, name) =
            qualified.rsplit_once("::").ok_or_else(|| self.missing("name"))?;
        Ok((stack, project, qualified_type, name))
    }

    fn missing(&self, field: &'static str) -> UrnError {
        UrnError::MissingField(self.0.clone(), field)
    }

    pub fn stack(&self) -> &str {
        self.try_parts().map(|(s, ..)| s).unwrap_or_default()
    }

    pub fn project(&self) -> &str {
        self.try_parts().map(|(_, p, ..)| p).unwrap_or_default()
    }

    /// The `$`-joined chain of ancestor types followed by this resource's own type.
    pub fn qualified_type(&self) -> &str {
        self.try_parts().map(|(_, _, q, _)| q).unwrap_or_default()
    }

    /// This resource's own type (the last `$`-separated segment of the qualified type).
    pub fn ty(&self) -> &str {
        self.qualified_type().rsplit('$').next().unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.try_parts().map(|(.., n)| n).unwrap_or_default()
    }

    /// Whether this URN's type matches the `pulumi:providers:<pkg>` provider type shape.
    pub fn is_provider_type(&self) -> bool {
        self.ty().starts_with("pulumi:providers:")
    }

    /// The package name out of a `pulumi:providers:<pkg>` type, if this is a provider URN.
    pub fn provider_package(&self) -> Option<&str> {
        self.ty().strip_prefix("pulumi:providers:")
    }

    /// URN of the implicit root stack resource (`pulumi:pulumi:Stack`) for a stack/project pair.
    pub fn root_stack(stack: &str, project: &str) -> Self {
        Urn::new(stack, project, "", "pulumi:pulumi:Stack", stack)
    }

    pub fn is_root_stack(&self) -> bool {
        self.ty() == "pulumi:pulumi:Stack" && self.qualified_type() == "pulumi:pulumi:Stack"
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Urn {
    type Err = UrnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Urn::parse(s)
    }
}

impl From<Urn> for String {
    fn from(urn: Urn) -> Self {
        urn.0
    }
}

impl AsRef<str> for Urn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for Urn {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[path = "urn_tests.rs"]
mod tests;
