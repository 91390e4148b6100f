//! Data access contracts. Each trait is implemented once, against Postgres,
//! in `postgres`; orchestrator code depends only on these traits so tests
//! can substitute in-memory fakes.

pub mod postgres;

use crate::error::Result;
use async_trait::async_trait;
use uw_core::domain::*;

#[async_trait]
pub trait UnderwritingRepository: Send + Sync {
    async fn get_underwriting_with_details(&self, id: UnderwritingId) -> Result<Option<Underwriting>>;
}

#[async_trait]
pub trait ProcessorRepository: Send + Sync {
    /// UnderwritingProcessors for one underwriting, filtered by `enabled`
    /// and `auto` when `Some`.
    async fn get_underwriting_processors(
        &self,
        underwriting_id: UnderwritingId,
        enabled: Option<bool>,
        auto: Option<bool>,
    ) -> Result<Vec<UnderwritingProcessor>>;

    async fn get_underwriting_processor_by_id(
        &self,
        id: UnderwritingProcessorId,
    ) -> Result<Option<UnderwritingProcessor>>;

    async fn get_organization_processor(
        &self,
        id: OrganizationProcessorId,
    ) -> Result<Option<OrganizationProcessor>>;

    /// Overwrites `current_executions_list` wholesale — filtration always
    /// persists the full desired list, never a delta.
    async fn update_current_executions_list(
        &self,
        id: UnderwritingProcessorId,
        execution_ids: Vec<ExecutionId>,
    ) -> Result<()>;
}

#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    async fn get_execution(&self, id: ExecutionId) -> Result<Option<Execution>>;

    async fn find_by_payload_hash(
        &self,
        underwriting_processor_id: UnderwritingProcessorId,
        payload_hash: &str,
    ) -> Result<Option<Execution>>;

    async fn insert_pending(
        &self,
        underwriting_processor_id: UnderwritingProcessorId,
        organization_id: OrganizationId,
        underwriting_id: UnderwritingId,
        processor: &str,
        payload: serde_json::Value,
        payload_hash: &str,
    ) -> Result<ExecutionId>;

    /// Marks `old_id.updated_execution_id = new_id`. No-op (compare-and-set)
    /// if `old_id` was already superseded by something else.
    async fn supersede(&self, old_id: ExecutionId, new_id: ExecutionId) -> Result<()>;

    async fn set_running(&self, id: ExecutionId) -> Result<()>;

    async fn set_completed(
        &self,
        id: ExecutionId,
        factors_delta: serde_json::Value,
        run_cost_cents: i64,
    ) -> Result<()>;

    async fn set_failed(&self, id: ExecutionId, failed_code: &str, failed_reason: &str) -> Result<()>;

    /// `enabled=true AND status=completed AND id IN current_executions_list`,
    /// ordered `completed_at DESC` so index 0 is the lineage id consolidation uses.
    async fn get_active_executions(
        &self,
        underwriting_processor_id: UnderwritingProcessorId,
    ) -> Result<Vec<Execution>>;

    async fn get_executions_by_underwriting(&self, underwriting_id: UnderwritingId) -> Result<Vec<Execution>>;

    /// Walks `updated_execution_id` forward from `id` to its tip.
    async fn get_execution_chain(&self, id: ExecutionId) -> Result<Vec<Execution>>;

    async fn set_enabled(&self, id: ExecutionId, enabled: bool) -> Result<()>;

    /// Re-enqueues a completed/failed execution for another run, without
    /// changing its payload or hash.
    async fn reset_to_pending(&self, id: ExecutionId) -> Result<()>;
}

#[async_trait]
pub trait FactorRepository: Send + Sync {
    /// Upserts by `(underwriting_id, factor_key, execution_id)` per the
    /// consolidation contract: no-op on matching hash, update on differing
    /// hash, insert when absent.
    async fn save_factors(
        &self,
        organization_id: OrganizationId,
        underwriting_id: UnderwritingId,
        underwriting_processor_id: UnderwritingProcessorId,
        execution_id: ExecutionId,
        factors: &serde_json::Map<String, serde_json::Value>,
        source: FactorSource,
    ) -> Result<usize>;

    async fn mark_deleted_for_execution(&self, execution_id: ExecutionId) -> Result<usize>;

    async fn get_active_factors(&self, underwriting_id: UnderwritingId) -> Result<Vec<Factor>>;
}

#[async_trait]
pub trait WorkflowLogRepository: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn log_stage(
        &self,
        underwriting_id: UnderwritingId,
        workflow_name: &str,
        stage: &str,
        input: Option<serde_json::Value>,
        output: Option<serde_json::Value>,
        status: &str,
        error_message: Option<String>,
        execution_time_ms: Option<i64>,
    ) -> Result<()>;
}
