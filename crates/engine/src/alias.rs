// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alias resolution (§4.8 step 3): the transitive cross-product of a
//! resource's declared aliases against its parent's own alias candidates,
//! used to match a freshly-registered resource against an old one that used
//! to go by a different identity.

use std::collections::HashSet;

use dce_core::{Alias, Urn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AliasError {
    #[error("aliases of {urn} conflict: {candidate} is already the urn of another resource in this deployment")]
    Conflict { urn: Urn, candidate: Urn },
}

/// Outcome of resolving one resource's aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasResolution {
    /// The old resource this goal's aliases matched, if any — "first
    /// unclaimed in declaration order" per the design notes' tie-break.
    pub predecessor: Option<Urn>,
    /// Every candidate URN generated by the cross-product, deduplicated in
    /// first-seen order. Recorded so a later resource's parent-alias
    /// cross-product can include this resource's own alias history.
    pub candidate_urns: Vec<Urn>,
}

fn resolved_spec_parent_candidates<'a>(
    spec: &dce_core::AliasSpec,
    parent: Option<&'a Urn>,
    parent_candidates: &'a [Urn],
) -> Vec<Option<&'a Urn>> {
    if spec.no_parent {
        return vec![None];
    }
    if let Some(p) = spec.parent.as_ref() {
        return vec![Some(p)];
    }
    match parent {
        None => vec![None],
        Some(p) => std::iter::once(p).chain(parent_candidates.iter()).map(Some).collect(),
    }
}

/// Resolve `declared` (the goal's own alias list) against `old_urns` (URNs
/// present in the previous snapshot) and `live_urns` (URNs already assigned
/// to other resources registered so far this run).
///
/// `parent_candidates` is the parent resource's own [`AliasResolution::candidate_urns`]
/// (i.e. every identity the parent used to go by) — together with `parent`
/// itself this forms the "parent aliases ∪ self" dimension of the
/// cross-product. `claimed` tracks old URNs already matched by an earlier
/// resource in this run so the "first unclaimed" rule can be enforced
/// across the whole deployment, not just within one resource's own aliases.
pub fn resolve_aliases(
    new_urn: &Urn,
    ty: &str,
    name: &str,
    parent: Option<&Urn>,
    parent_candidates: &[Urn],
    declared: &[Alias],
    old_urns: &HashSet<Urn>,
    live_urns: &HashSet<Urn>,
    claimed: &mut HashSet<Urn>,
) -> Result<AliasResolution, AliasError> {
    let mut resolution = AliasResolution::default();
    let mut seen: HashSet<Urn> = HashSet::new();

    let mut record = |candidate: Urn,
                       resolution: &mut AliasResolution,
                       claimed: &mut HashSet<Urn>|
     -> Result<(), AliasError> {
        if candidate == *new_urn {
            return Ok(());
        }
        if seen.insert(candidate.clone()) {
            resolution.candidate_urns.push(candidate.clone());
        }
        if live_urns.contains(&candidate) {
            return Err(AliasError::Conflict { urn: new_urn.clone(), candidate });
        }
        if resolution.predecessor.is_none()
            && old_urns.contains(&candidate)
            && !claimed.contains(&candidate)
        {
            claimed.insert(candidate.clone());
            resolution.predecessor = Some(candidate);
        }
        Ok(())
    };

    for alias in declared {
        match alias {
            Alias::Urn(literal) => {
                record(literal.clone(), &mut resolution, claimed)?;
            }
            Alias::Spec(spec) => {
                let alias_ty = spec.ty.as_deref().unwrap_or(ty);
                let alias_name = spec.name.as_deref().unwrap_or(name);
                for parent_candidate in
                    resolved_spec_parent_candidates(spec, parent, parent_candidates)
                {
                    let parent_qualified_type =
                        parent_candidate.map(Urn::qualified_type).unwrap_or_default();
                    let candidate = Urn::new(
                        new_urn.stack(),
                        new_urn.project(),
                        parent_qualified_type,
                        alias_ty,
                        alias_name,
                    );
                    record(candidate, &mut resolution, claimed)?;
                }
            }
        }
    }

    Ok(resolution)
}

#[cfg(test)]
#[path = "alias_tests.rs"]
mod tests;
