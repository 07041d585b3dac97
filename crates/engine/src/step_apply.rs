// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step contracts (§4.7): `apply(previewOnly) -> (status, newState, error)`
//! for the closed set of step operations. Each variant's provider call is
//! resolved by the caller (the executor) before reaching here — this module
//! only knows the per-op semantics, not how a provider reference becomes a
//! live plug-in.

use std::sync::Arc;

use dce_core::{ProviderError, ResourceState, Step, StepOp, StepStatus};
use dce_registry::{Provider, ProviderCallError};

#[derive(Debug, thiserror::Error)]
pub enum StepApplyError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("{urn} is protected and cannot be deleted")]
    ProtectedDelete { urn: dce_core::Urn },
    #[error("provider created {urn} without returning a resource id")]
    EmptyId { urn: dce_core::Urn },
    #[error("resource {urn} does not exist at the provider")]
    DoesNotExist { urn: dce_core::Urn },
    #[error("step {op} against {urn} requires a provider but none is configured")]
    MissingProvider { op: StepOp, urn: dce_core::Urn },
    #[error("provider does not support import for {urn}")]
    ImportUnsupported { urn: dce_core::Urn },
}

fn as_provider_error(urn: &dce_core::Urn, operation: &'static str, err: ProviderCallError) -> ProviderError {
    match err {
        ProviderCallError::Failed(message) => ProviderError::new(urn.clone(), operation, message),
        ProviderCallError::InitError(init) => {
            ProviderError::new(urn.clone(), operation, init.to_string())
        }
    }
}

/// Apply one step. `provider` is `None` only for steps that never touch a
/// provider ([`StepOp::touches_provider`] is false for them); any other op
/// reaching here without one is a caller bug ([`StepApplyError::MissingProvider`]).
pub async fn apply_step(
    step: &Step,
    provider: Option<&Arc<dyn Provider>>,
    preview_only: bool,
) -> Result<(StepStatus, Option<ResourceState>), StepApplyError> {
    let urn = step.urn.clone();
    let require_provider = || {
        provider.ok_or(StepApplyError::MissingProvider { op: step.op, urn: urn.clone() })
    };

    match step.op {
        StepOp::Same => {
            // Carry over the old state verbatim; re-validating the provider
            // is loaded is the caller's job (it already resolved `provider`
            // successfully to get here).
            let old = step.old.as_deref().cloned();
            Ok((StepStatus::Ok, old))
        }

        StepOp::Create | StepOp::CreateReplacement | StepOp::ImportReplacement | StepOp::Import => {
            let provider = require_provider()?;
            let new = step.new.as_deref().cloned().unwrap_or_else(|| unreachable_new(&urn));
            if matches!(step.op, StepOp::Import | StepOp::ImportReplacement) {
                let import_id = new.import_id.as_deref().unwrap_or_default();
                let read = provider
                    .read(&urn, import_id, &new.inputs)
                    .await
                    .map_err(|e| as_provider_error(&urn, "import:read", e))?;
                if read.id.is_empty() {
                    return Err(StepApplyError::ImportUnsupported { urn });
                }
                let checked = provider
                    .check(&urn, &new.inputs, &read.outputs)
                    .await
                    .map_err(|e| as_provider_error(&urn, "import:check", e))?;
                let mut result = new.clone();
                result.id = read.id;
                result.inputs = checked.inputs;
                result.outputs = read.outputs;
                return Ok((StepStatus::Ok, Some(result)));
            }
            if preview_only {
                return Ok((StepStatus::Unknown, Some(new)));
            }
            let checked = provider
                .check(&urn, &dce_core::PropertyMap::new(), &new.inputs)
                .await
                .map_err(|e| as_provider_error(&urn, "create:check", e))?;
            let created = provider.create(&urn, &checked.inputs).await.map_err(|e| {
                let mut provider_err = as_provider_error(&urn, "create", e);
                if provider_err.looks_like_already_exists() {
                    let hint = provider_err.import_hint();
                    provider_err.message = format!("{}; {hint}", provider_err.message);
                }
                provider_err
            })?;
            if created.id.is_empty() {
                return Err(StepApplyError::EmptyId { urn });
            }
            let mut result = new;
            result.id = created.id;
            result.inputs = checked.inputs;
            result.outputs = created.outputs;
            Ok((StepStatus::Ok, Some(result)))
        }

        StepOp::Update => {
            let provider = require_provider()?;
            let old = step.old.as_deref().cloned().unwrap_or_else(|| unreachable_new(&urn));
            let new = step.new.as_deref().cloned().unwrap_or_else(|| unreachable_new(&urn));
            if preview_only {
                return Ok((StepStatus::Unknown, Some(new)));
            }
            match provider.update(&urn, &old.id, &old.inputs, &new.inputs).await {
                Ok(updated) => {
                    let mut result = new;
                    result.id = old.id;
                    result.outputs = updated.outputs;
                    Ok((StepStatus::Ok, Some(result)))
                }
                Err(ProviderCallError::InitError(init)) => {
                    // InitError is partial success: keep outputs/new state,
                    // record the reasons, but do not fail the deployment.
                    let mut result = new;
                    result.id = old.id;
                    result.init_errors = init.reasons;
                    Ok((StepStatus::PartialFailure, Some(result)))
                }
                Err(e) => Err(as_provider_error(&urn, "update", e).into()),
            }
        }

        StepOp::Delete | StepOp::DeleteReplaced => {
            let old = step.old.as_deref().cloned().unwrap_or_else(|| unreachable_new(&urn));
            if old.protect {
                return Err(StepApplyError::ProtectedDelete { urn });
            }
            if old.retain_on_delete {
                return Ok((StepStatus::Ok, None));
            }
            if preview_only {
                return Ok((StepStatus::Ok, None));
            }
            let provider = require_provider()?;
            provider
                .delete(&urn, &old.id, &old.inputs)
                .await
                .map_err(|e| as_provider_error(&urn, "delete", e))?;
            Ok((StepStatus::Ok, None))
        }

        StepOp::Refresh => {
            let old = step.old.as_deref().cloned().unwrap_or_else(|| unreachable_new(&urn));
            if preview_only {
                return Ok((StepStatus::Ok, Some(old)));
            }
            let provider = require_provider()?;
            match provider.read(&urn, &old.id, &old.inputs).await {
                Ok(read) if read.id.is_empty() => {
                    // The provider no longer has this resource: the driver's
                    // base-state rebuild (§4.8) drops it and clears any
                    // reference pointing at it.
                    Ok((StepStatus::Ok, None))
                }
                Ok(read) => {
                    let mut result = old;
                    result.outputs = read.outputs;
                    Ok((StepStatus::Ok, Some(result)))
                }
                Err(ProviderCallError::InitError(init)) => {
                    // Best-effort: record reasons, surface no error.
                    let mut result = old;
                    result.init_errors = init.reasons;
                    Ok((StepStatus::PartialFailure, Some(result)))
                }
                Err(e) => Err(as_provider_error(&urn, "refresh", e).into()),
            }
        }

        StepOp::Read | StepOp::ReadReplacement => {
            let new = step.new.as_deref().cloned().unwrap_or_else(|| unreachable_new(&urn));
            if new.id.is_empty() {
                return Ok((StepStatus::Ok, Some(new)));
            }
            let provider = require_provider()?;
            let read = provider
                .read(&urn, &new.id, &new.inputs)
                .await
                .map_err(|e| as_provider_error(&urn, "read", e))?;
            if read.id.is_empty() {
                return Err(StepApplyError::DoesNotExist { urn });
            }
            let mut result = new;
            result.id = read.id;
            result.outputs = read.outputs;
            result.external = true;
            Ok((StepStatus::Ok, Some(result)))
        }

        StepOp::ReadDiscard | StepOp::DiscardReplaced | StepOp::RemovePendingReplace => {
            // Bookkeeping only: the resource is removed from state, no
            // provider call.
            Ok((StepStatus::Ok, None))
        }

        StepOp::Replace => {
            // Logical marker only; carried between create-replacement and
            // delete-replaced, nothing to apply.
            Ok((StepStatus::Ok, step.new.as_deref().cloned()))
        }
    }
}

/// The generator never emits a step whose contract requires `new` without
/// populating it; reaching this indicates a generator bug, not a runtime
/// condition callers should handle.
fn unreachable_new(urn: &dce_core::Urn) -> ResourceState {
    unreachable!("step against {urn} is missing the state its contract requires")
}

#[cfg(test)]
#[path = "step_apply_tests.rs"]
mod tests;
