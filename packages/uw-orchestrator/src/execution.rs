//! Execution: runs pending executions in a bounded worker pool and persists
//! status transitions. A semaphore gates `tokio::spawn`'d tasks so at most
//! `pool_size` executions run concurrently.

use crate::error::Result;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Semaphore;
use uw_core::domain::*;
use uw_core::{ExecutionContext, Registry};
use uw_storage::{ExecutionRepository, ProcessorRepository, WorkflowLogRepository};

/// Records a lifecycle event for one execution, mirroring the
/// `{processor_name}.execution.{started,completed,failed}` events a
/// processor run announces before/after the pipeline body. Logging
/// failures are swallowed (best-effort) so a workflow-log outage never
/// fails an execution that otherwise succeeded.
async fn emit_event(
    workflow_log: &dyn WorkflowLogRepository,
    execution: &Execution,
    stage: &str,
    status: &str,
    output: Option<serde_json::Value>,
    error_message: Option<String>,
) {
    if let Err(e) = workflow_log
        .log_stage(
            execution.underwriting_id,
            &execution.processor,
            stage,
            None,
            output,
            status,
            error_message,
            None,
        )
        .await
    {
        tracing::warn!(error = %e, execution_id = %execution.id, stage, "failed to log execution lifecycle event");
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub execution_id: ExecutionId,
    pub completed: bool,
    pub skipped: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionBatchResult {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub runs: Vec<RunSummary>,
}

/// Runs one execution id to completion: loads the row, resolves config,
/// invokes the processor pipeline, persists the outcome. A panic inside the
/// processor surfaces as `JoinError` at the `tokio::spawn` boundary in
/// `run_batch` and is recorded there with `phase="unknown"`.
async fn run_one(
    execution_repo: Arc<dyn ExecutionRepository>,
    processor_repo: Arc<dyn ProcessorRepository>,
    registry: Arc<Registry>,
    workflow_log: Arc<dyn WorkflowLogRepository>,
    execution_id: ExecutionId,
) -> Result<RunSummary> {
    let execution = match execution_repo.get_execution(execution_id).await? {
        Some(e) => e,
        None => {
            return Ok(RunSummary {
                execution_id,
                completed: false,
                skipped: true,
                error: Some("execution row not found".into()),
            })
        }
    };

    if !execution.is_runnable() {
        return Ok(RunSummary {
            execution_id,
            completed: false,
            skipped: true,
            error: Some(format!("status {} is not runnable", execution.status.as_str())),
        });
    }

    emit_event(
        workflow_log.as_ref(),
        &execution,
        "execution.started",
        "started",
        Some(json!({"execution_id": execution.id, "underwriting_processor_id": execution.underwriting_processor_id})),
        None,
    )
    .await;

    let processor = match registry.get(&execution.processor) {
        Some(p) => p,
        None => {
            execution_repo
                .set_failed(execution_id, "processor_not_registered", &execution.processor)
                .await?;
            emit_event(
                workflow_log.as_ref(),
                &execution,
                "execution.failed",
                "failed",
                None,
                Some(format!("processor not registered: {}", execution.processor)),
            )
            .await;
            return Ok(RunSummary {
                execution_id,
                completed: false,
                skipped: false,
                error: Some(format!("processor not registered: {}", execution.processor)),
            });
        }
    };

    execution_repo.set_running(execution_id).await?;

    let instance = processor_repo
        .get_underwriting_processor_by_id(execution.underwriting_processor_id)
        .await?;
    let organization_config = match &instance {
        Some(inst) => processor_repo
            .get_organization_processor(inst.organization_processor_id)
            .await?
            .map(|op| op.config)
            .unwrap_or_default(),
        None => serde_json::Map::new(),
    };
    let instance_override = instance.map(|i| i.config_override).unwrap_or_default();
    let merged = uw_core::resolve_config(&processor.default_config(), &organization_config, &instance_override);

    let mut ctx = ExecutionContext::new(merged);
    let result = uw_core::processor::run(processor.as_ref(), &execution.payload, &mut ctx).await;

    match result.status {
        uw_core::PipelineStatus::Completed => {
            let factors_delta = result.output.unwrap_or(serde_json::json!({}));
            execution_repo
                .set_completed(execution_id, factors_delta.clone(), result.total_cost_cents)
                .await?;
            let output_keys: Vec<&String> = factors_delta.as_object().map(|m| m.keys().collect()).unwrap_or_default();
            emit_event(
                workflow_log.as_ref(),
                &execution,
                "execution.completed",
                "completed",
                Some(json!({"output_keys": output_keys})),
                None,
            )
            .await;
            Ok(RunSummary { execution_id, completed: true, skipped: false, error: None })
        }
        uw_core::PipelineStatus::Failed => {
            let phase = result.phase.map(|p| p.as_str()).unwrap_or("unknown");
            let reason = result.error_message.unwrap_or_else(|| "unknown failure".into());
            execution_repo.set_failed(execution_id, phase, &reason).await?;
            emit_event(
                workflow_log.as_ref(),
                &execution,
                "execution.failed",
                "failed",
                Some(json!({"error_phase": phase})),
                Some(reason.clone()),
            )
            .await;
            Ok(RunSummary { execution_id, completed: false, skipped: false, error: Some(reason) })
        }
    }
}

/// Submits up to `pool_size` concurrent runs (default 5) for the given
/// execution ids.
pub async fn run_batch(
    execution_repo: Arc<dyn ExecutionRepository>,
    processor_repo: Arc<dyn ProcessorRepository>,
    registry: Arc<Registry>,
    workflow_log: Arc<dyn WorkflowLogRepository>,
    execution_ids: Vec<ExecutionId>,
    pool_size: usize,
) -> ExecutionBatchResult {
    let semaphore = Arc::new(Semaphore::new(pool_size.max(1)));
    let mut handles = Vec::with_capacity(execution_ids.len());

    for id in execution_ids {
        let semaphore = Arc::clone(&semaphore);
        let execution_repo = Arc::clone(&execution_repo);
        let processor_repo = Arc::clone(&processor_repo);
        let registry = Arc::clone(&registry);
        let workflow_log = Arc::clone(&workflow_log);

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
            run_one(execution_repo, processor_repo, registry, workflow_log, id).await
        }));
    }

    let mut batch = ExecutionBatchResult::default();
    for handle in handles {
        match handle.await {
            Ok(Ok(summary)) => {
                if summary.skipped {
                    batch.skipped += 1;
                } else if summary.completed {
                    batch.completed += 1;
                } else {
                    batch.failed += 1;
                }
                batch.runs.push(summary);
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "execution run failed before producing a summary");
                batch.failed += 1;
            }
            Err(join_error) => {
                tracing::error!(error = %join_error, "execution task panicked");
                batch.failed += 1;
            }
        }
    }

    batch
}
