//! Filtration: turns an underwriting snapshot into execution ids to run,
//! and the processor list to consolidate.

use crate::error::{OrchestratorError, Result};
use uw_core::domain::*;
use uw_core::{format_payload_list, Registry};
use uw_storage::{ExecutionRepository, ProcessorRepository, UnderwritingRepository};

pub struct FiltrationOutcome {
    pub processor_list: Vec<UnderwritingProcessorId>,
    pub execution_list: Vec<ExecutionId>,
}

fn triggers_to_hash_map(triggers: &uw_core::Triggers) -> serde_json::Map<String, serde_json::Value> {
    let mut map = serde_json::Map::new();
    if let Some(fields) = &triggers.application_form {
        map.insert("application_form".to_string(), serde_json::json!(fields));
    }
    if let Some(kinds) = &triggers.documents_list {
        map.insert("documents_list".to_string(), serde_json::json!(kinds));
    }
    map
}

/// `generateExecution`: dedup by payload hash, optionally superseding.
pub async fn generate_execution(
    execution_repo: &dyn ExecutionRepository,
    underwriting_processor: &UnderwritingProcessor,
    payload: serde_json::Value,
    triggers: &uw_core::Triggers,
    duplicate: bool,
) -> Result<ExecutionId> {
    let hash_map = triggers_to_hash_map(triggers);
    let hash = uw_core::hashing::generate_payload_hash(&payload, &hash_map);

    let existing = execution_repo
        .find_by_payload_hash(underwriting_processor.id, &hash)
        .await?;

    match existing {
        Some(existing) if !duplicate => Ok(existing.id),
        Some(existing) => {
            let new_id = execution_repo
                .insert_pending(
                    underwriting_processor.id,
                    underwriting_processor.organization_id,
                    underwriting_processor.underwriting_id,
                    &underwriting_processor.processor,
                    payload,
                    &hash,
                )
                .await?;
            execution_repo.supersede(existing.id, new_id).await?;
            Ok(new_id)
        }
        None => {
            let new_id = execution_repo
                .insert_pending(
                    underwriting_processor.id,
                    underwriting_processor.organization_id,
                    underwriting_processor.underwriting_id,
                    &underwriting_processor.processor,
                    payload,
                    &hash,
                )
                .await?;
            Ok(new_id)
        }
    }
}

/// `prepareProcessor`. Returns `None` to mean "skip entirely" (no triggers
/// declared); `Some(vec![])` to mean "nothing new to run, still consolidate".
pub async fn prepare_processor(
    execution_repo: &dyn ExecutionRepository,
    processor_repo: &dyn ProcessorRepository,
    underwriting: &Underwriting,
    underwriting_processor: &UnderwritingProcessor,
    registry: &Registry,
    duplicate: bool,
) -> Result<Option<Vec<ExecutionId>>> {
    let processor = registry
        .get(&underwriting_processor.processor)
        .ok_or_else(|| OrchestratorError::ProcessorNotRegistered(underwriting_processor.processor.clone()))?;

    let triggers = processor.triggers();
    let payloads = match format_payload_list(processor.kind(), underwriting, &triggers) {
        None => return Ok(None),
        Some(payloads) => payloads,
    };

    let current = underwriting_processor.current_executions_list.clone();

    if payloads.is_empty() {
        if !current.is_empty() {
            processor_repo
                .update_current_executions_list(underwriting_processor.id, vec![])
                .await?;
        }
        return Ok(Some(vec![]));
    }

    let mut desired = Vec::with_capacity(payloads.len());
    for payload in payloads {
        let id = generate_execution(execution_repo, underwriting_processor, payload, &triggers, duplicate).await?;
        desired.push(id);
    }

    let current_set: std::collections::HashSet<_> = current.iter().copied().collect();
    let desired_set: std::collections::HashSet<_> = desired.iter().copied().collect();

    let new: Vec<ExecutionId> = desired.iter().copied().filter(|id| !current_set.contains(id)).collect();
    let removed: Vec<ExecutionId> = current.iter().copied().filter(|id| !desired_set.contains(id)).collect();

    if new.is_empty() && removed.is_empty() {
        return Ok(Some(vec![]));
    }

    processor_repo
        .update_current_executions_list(underwriting_processor.id, desired)
        .await?;

    Ok(Some(new))
}

/// `filtration()`: loads the underwriting, loads its auto-enabled processor
/// instances, and runs `prepare_processor` over each.
pub async fn filtration(
    underwriting_repo: &dyn UnderwritingRepository,
    processor_repo: &dyn ProcessorRepository,
    execution_repo: &dyn ExecutionRepository,
    registry: &Registry,
    underwriting_id: UnderwritingId,
) -> Result<FiltrationOutcome> {
    let underwriting = underwriting_repo
        .get_underwriting_with_details(underwriting_id)
        .await?
        .ok_or_else(|| OrchestratorError::UnderwritingNotFound(underwriting_id.to_string()))?;

    let instances = processor_repo
        .get_underwriting_processors(underwriting_id, Some(true), Some(true))
        .await?;

    let mut processor_list = Vec::new();
    let mut execution_list = Vec::new();

    for instance in &instances {
        let outcome = prepare_processor(execution_repo, processor_repo, &underwriting, instance, registry, false).await?;
        if let Some(new_ids) = outcome {
            processor_list.push(instance.id);
            execution_list.extend(new_ids);
        }
    }

    Ok(FiltrationOutcome { processor_list, execution_list })
}
