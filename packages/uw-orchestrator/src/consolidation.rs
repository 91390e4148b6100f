//! Consolidation: merges active executions' factor maps through the
//! processor's `consolidate`, then upserts the factor table.

use crate::error::{OrchestratorError, Result};
use uw_core::domain::*;
use uw_core::Registry;
use uw_storage::{ExecutionRepository, FactorRepository, ProcessorRepository};

#[derive(Debug, Clone, Default)]
pub struct ConsolidationOutcome {
    pub underwriting_processor_id: UnderwritingProcessorId,
    pub factor_count: usize,
}

/// Runs consolidation for one processor instance.
pub async fn consolidate_one(
    processor_repo: &dyn ProcessorRepository,
    execution_repo: &dyn ExecutionRepository,
    factor_repo: &dyn FactorRepository,
    registry: &Registry,
    underwriting_processor_id: UnderwritingProcessorId,
) -> Result<ConsolidationOutcome> {
    let instance = processor_repo
        .get_underwriting_processor_by_id(underwriting_processor_id)
        .await?
        .ok_or_else(|| OrchestratorError::UnderwritingProcessorNotFound(underwriting_processor_id.to_string()))?;

    let processor = registry
        .get(&instance.processor)
        .ok_or_else(|| OrchestratorError::ProcessorNotRegistered(instance.processor.clone()))?;

    let active_executions = execution_repo.get_active_executions(underwriting_processor_id).await?;

    let factors_list: Vec<serde_json::Map<String, serde_json::Value>> = active_executions
        .iter()
        .map(|e| {
            e.factors_delta
                .as_ref()
                .and_then(|delta| delta.get("factors"))
                .and_then(|f| f.as_object())
                .cloned()
                .unwrap_or_default()
        })
        .collect();

    let consolidated = processor.consolidate(&factors_list);

    if consolidated.is_empty() {
        return Ok(ConsolidationOutcome { underwriting_processor_id, factor_count: 0 });
    }

    // `get_active_executions` orders by completed_at DESC, so index 0 is the
    // most recent — used for lineage attribution when the processor's own
    // consolidate output isn't itself execution-scoped.
    let lineage_execution_id = match active_executions.first() {
        Some(e) => e.id,
        None => return Ok(ConsolidationOutcome { underwriting_processor_id, factor_count: 0 }),
    };

    let written = factor_repo
        .save_factors(
            instance.organization_id,
            instance.underwriting_id,
            underwriting_processor_id,
            lineage_execution_id,
            &consolidated,
            FactorSource::Processor,
        )
        .await?;

    Ok(ConsolidationOutcome { underwriting_processor_id, factor_count: written })
}

/// Runs consolidation for each processor in the list, continuing past
/// per-processor failures — one bad instance must not block the rest.
pub async fn consolidation(
    processor_repo: &dyn ProcessorRepository,
    execution_repo: &dyn ExecutionRepository,
    factor_repo: &dyn FactorRepository,
    registry: &Registry,
    processor_list: &[UnderwritingProcessorId],
) -> Vec<Result<ConsolidationOutcome>> {
    let mut results = Vec::with_capacity(processor_list.len());
    for id in processor_list {
        results.push(consolidate_one(processor_repo, execution_repo, factor_repo, registry, *id).await);
    }
    results
}
