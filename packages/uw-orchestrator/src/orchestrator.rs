//! The five orchestrator workflows. Each composes filtration, execution,
//! and consolidation in the order its triggering topic requires, and logs
//! each stage to the workflow log.

use crate::error::{OrchestratorError, Result};
use crate::serialization::UnderwritingLocks;
use crate::{consolidation, execution, filtration};
use serde_json::json;
use std::sync::Arc;
use uw_core::domain::*;
use uw_core::Registry;
use uw_storage::{ExecutionRepository, FactorRepository, ProcessorRepository, UnderwritingRepository, WorkflowLogRepository};

#[derive(Debug, Clone, serde::Serialize)]
pub struct WorkflowSummary {
    pub success: bool,
    pub workflow: &'static str,
    pub processors_selected: usize,
    pub executions_run: usize,
    pub executions_completed: usize,
    pub executions_failed: usize,
    pub factors_written: usize,
    pub message: Option<String>,
}

impl WorkflowSummary {
    fn empty(workflow: &'static str, message: impl Into<String>) -> Self {
        Self {
            success: true,
            workflow,
            processors_selected: 0,
            executions_run: 0,
            executions_completed: 0,
            executions_failed: 0,
            factors_written: 0,
            message: Some(message.into()),
        }
    }
}

pub struct Orchestrator {
    pub underwriting_repo: Arc<dyn UnderwritingRepository>,
    pub processor_repo: Arc<dyn ProcessorRepository>,
    pub execution_repo: Arc<dyn ExecutionRepository>,
    pub factor_repo: Arc<dyn FactorRepository>,
    pub workflow_log: Arc<dyn WorkflowLogRepository>,
    pub registry: Arc<Registry>,
    pub locks: Arc<UnderwritingLocks>,
    pub worker_pool_size: usize,
}

impl Orchestrator {
    async fn log(
        &self,
        underwriting_id: UnderwritingId,
        workflow: &str,
        stage: &str,
        status: &str,
        output: Option<serde_json::Value>,
        error: Option<String>,
    ) {
        if let Err(e) = self
            .workflow_log
            .log_stage(underwriting_id, workflow, stage, None, output, status, error, None)
            .await
        {
            tracing::warn!(error = %e, stage, "failed to write workflow log entry");
        }
    }

    /// W1: automatic execute, triggered by `underwriting.updated` / `document.analyzed`.
    pub async fn handle_workflow1(&self, underwriting_id: UnderwritingId) -> Result<WorkflowSummary> {
        let _guard = self.locks.acquire(underwriting_id).await;

        let outcome = filtration::filtration(
            self.underwriting_repo.as_ref(),
            self.processor_repo.as_ref(),
            self.execution_repo.as_ref(),
            &self.registry,
            underwriting_id,
        )
        .await?;
        self.log(underwriting_id, "workflow1", "filtration", "success", None, None).await;

        if outcome.processor_list.is_empty() {
            return Ok(WorkflowSummary::empty("workflow1", "no auto-enabled processors matched"));
        }

        let batch = execution::run_batch(
            Arc::clone(&self.execution_repo),
            Arc::clone(&self.processor_repo),
            Arc::clone(&self.registry),
            Arc::clone(&self.workflow_log),
            outcome.execution_list.clone(),
            self.worker_pool_size,
        )
        .await;
        self.log(
            underwriting_id,
            "workflow1",
            "execution",
            "success",
            Some(json!({"completed": batch.completed, "failed": batch.failed})),
            None,
        )
        .await;

        let consolidation_results = consolidation::consolidation(
            self.processor_repo.as_ref(),
            self.execution_repo.as_ref(),
            self.factor_repo.as_ref(),
            &self.registry,
            &outcome.processor_list,
        )
        .await;
        let factors_written: usize = consolidation_results.iter().filter_map(|r| r.as_ref().ok()).map(|o| o.factor_count).sum();
        self.log(underwriting_id, "workflow1", "consolidation", "success", Some(json!({"factors_written": factors_written})), None).await;

        Ok(WorkflowSummary {
            success: true,
            workflow: "workflow1",
            processors_selected: outcome.processor_list.len(),
            executions_run: outcome.execution_list.len(),
            executions_completed: batch.completed,
            executions_failed: batch.failed,
            factors_written,
            message: None,
        })
    }

    /// W2: manual execute, triggered by `underwriting.processor.execute`.
    pub async fn handle_workflow2(
        &self,
        underwriting_processor_id: UnderwritingProcessorId,
        execution_id: Option<ExecutionId>,
        duplicate: bool,
        application_form: Option<serde_json::Map<String, serde_json::Value>>,
        document_list: Option<Vec<String>>,
    ) -> Result<WorkflowSummary> {
        let instance = self
            .processor_repo
            .get_underwriting_processor_by_id(underwriting_processor_id)
            .await?
            .ok_or_else(|| OrchestratorError::UnderwritingProcessorNotFound(underwriting_processor_id.to_string()))?;

        let _guard = self.locks.acquire(instance.underwriting_id).await;

        let execution_ids: Vec<ExecutionId> = if let Some(execution_id) = execution_id {
            if duplicate {
                let existing = self
                    .execution_repo
                    .get_execution(execution_id)
                    .await?
                    .ok_or_else(|| OrchestratorError::ExecutionNotFound(execution_id.to_string()))?;
                let new_id = self
                    .execution_repo
                    .insert_pending(
                        instance.id,
                        instance.organization_id,
                        instance.underwriting_id,
                        &instance.processor,
                        existing.payload.clone(),
                        &existing.payload_hash,
                    )
                    .await?;
                self.execution_repo.supersede(execution_id, new_id).await?;
                let mut desired = instance.current_executions_list.clone();
                desired.retain(|id| *id != execution_id);
                desired.push(new_id);
                self.processor_repo.update_current_executions_list(instance.id, desired).await?;
                vec![new_id]
            } else {
                self.execution_repo.reset_to_pending(execution_id).await?;
                vec![execution_id]
            }
        } else if application_form.is_some() || document_list.is_some() {
            let registry_processor = self
                .registry
                .get(&instance.processor)
                .ok_or_else(|| OrchestratorError::ProcessorNotRegistered(instance.processor.clone()))?;
            let triggers = registry_processor.triggers();

            let mut payloads = Vec::new();
            if let Some(form) = &application_form {
                let underwriting = self
                    .underwriting_repo
                    .get_underwriting_with_details(instance.underwriting_id)
                    .await?
                    .ok_or_else(|| OrchestratorError::UnderwritingNotFound(instance.underwriting_id.to_string()))?;
                payloads.push(uw_core::build_manual_application_payload(&underwriting, form));
            }
            if let Some(docs) = &document_list {
                payloads.extend(uw_core::build_manual_document_payloads(registry_processor.kind(), docs));
            }

            let mut ids = Vec::with_capacity(payloads.len());
            for payload in payloads {
                let id = filtration::generate_execution(self.execution_repo.as_ref(), &instance, payload, &triggers, duplicate).await?;
                ids.push(id);
            }
            let mut desired = instance.current_executions_list.clone();
            for id in &ids {
                if !desired.contains(id) {
                    desired.push(*id);
                }
            }
            self.processor_repo.update_current_executions_list(instance.id, desired).await?;
            ids
        } else {
            let underwriting = self
                .underwriting_repo
                .get_underwriting_with_details(instance.underwriting_id)
                .await?
                .ok_or_else(|| OrchestratorError::UnderwritingNotFound(instance.underwriting_id.to_string()))?;
            filtration::prepare_processor(
                self.execution_repo.as_ref(),
                self.processor_repo.as_ref(),
                &underwriting,
                &instance,
                &self.registry,
                duplicate,
            )
            .await?
            .unwrap_or_default()
        };

        let batch = execution::run_batch(
            Arc::clone(&self.execution_repo),
            Arc::clone(&self.processor_repo),
            Arc::clone(&self.registry),
            Arc::clone(&self.workflow_log),
            execution_ids.clone(),
            self.worker_pool_size,
        )
        .await;

        let outcome = consolidation::consolidate_one(
            self.processor_repo.as_ref(),
            self.execution_repo.as_ref(),
            self.factor_repo.as_ref(),
            &self.registry,
            instance.id,
        )
        .await?;

        Ok(WorkflowSummary {
            success: true,
            workflow: "workflow2",
            processors_selected: 1,
            executions_run: execution_ids.len(),
            executions_completed: batch.completed,
            executions_failed: batch.failed,
            factors_written: outcome.factor_count,
            message: None,
        })
    }

    /// W3: consolidation only, triggered by `underwriting.processor.consolidation`.
    pub async fn handle_workflow3(&self, underwriting_processor_id: UnderwritingProcessorId) -> Result<WorkflowSummary> {
        let instance = self
            .processor_repo
            .get_underwriting_processor_by_id(underwriting_processor_id)
            .await?
            .ok_or_else(|| OrchestratorError::UnderwritingProcessorNotFound(underwriting_processor_id.to_string()))?;
        let _guard = self.locks.acquire(instance.underwriting_id).await;

        let outcome = consolidation::consolidate_one(
            self.processor_repo.as_ref(),
            self.execution_repo.as_ref(),
            self.factor_repo.as_ref(),
            &self.registry,
            underwriting_processor_id,
        )
        .await?;

        Ok(WorkflowSummary {
            success: true,
            workflow: "workflow3",
            processors_selected: 1,
            executions_run: 0,
            executions_completed: 0,
            executions_failed: 0,
            factors_written: outcome.factor_count,
            message: None,
        })
    }

    /// W4: activate execution, triggered by `underwriting.execution.activate`.
    /// Rollback semantics: the activated execution becomes the *sole*
    /// authoritative output for its processor instance.
    pub async fn handle_workflow4(&self, execution_id: ExecutionId) -> Result<WorkflowSummary> {
        let execution = self
            .execution_repo
            .get_execution(execution_id)
            .await?
            .ok_or_else(|| OrchestratorError::ExecutionNotFound(execution_id.to_string()))?;
        let _guard = self.locks.acquire(execution.underwriting_id).await;

        self.execution_repo.set_enabled(execution_id, true).await?;
        self.processor_repo
            .update_current_executions_list(execution.underwriting_processor_id, vec![execution_id])
            .await?;

        let outcome = consolidation::consolidate_one(
            self.processor_repo.as_ref(),
            self.execution_repo.as_ref(),
            self.factor_repo.as_ref(),
            &self.registry,
            execution.underwriting_processor_id,
        )
        .await?;

        Ok(WorkflowSummary {
            success: true,
            workflow: "workflow4",
            processors_selected: 1,
            executions_run: 0,
            executions_completed: 0,
            executions_failed: 0,
            factors_written: outcome.factor_count,
            message: None,
        })
    }

    /// W5: disable execution, triggered by `underwriting.execution.disable`.
    pub async fn handle_workflow5(&self, execution_id: ExecutionId) -> Result<WorkflowSummary> {
        let execution = self
            .execution_repo
            .get_execution(execution_id)
            .await?
            .ok_or_else(|| OrchestratorError::ExecutionNotFound(execution_id.to_string()))?;
        let _guard = self.locks.acquire(execution.underwriting_id).await;

        self.execution_repo.set_enabled(execution_id, false).await?;

        let instance = self
            .processor_repo
            .get_underwriting_processor_by_id(execution.underwriting_processor_id)
            .await?
            .ok_or_else(|| OrchestratorError::UnderwritingProcessorNotFound(execution.underwriting_processor_id.to_string()))?;
        let mut remaining = instance.current_executions_list.clone();
        remaining.retain(|id| *id != execution_id);
        self.processor_repo.update_current_executions_list(instance.id, remaining).await?;

        let deleted = self.factor_repo.mark_deleted_for_execution(execution_id).await?;
        self.log(
            execution.underwriting_id,
            "workflow5",
            "disable",
            "success",
            Some(json!({"factors_deleted": deleted})),
            None,
        )
        .await;

        let outcome = consolidation::consolidate_one(
            self.processor_repo.as_ref(),
            self.execution_repo.as_ref(),
            self.factor_repo.as_ref(),
            &self.registry,
            instance.id,
        )
        .await?;

        Ok(WorkflowSummary {
            success: true,
            workflow: "workflow5",
            processors_selected: 1,
            executions_run: 0,
            executions_completed: 0,
            executions_failed: 0,
            factors_written: outcome.factor_count,
            message: None,
        })
    }
}
