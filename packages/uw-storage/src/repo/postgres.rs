//! Postgres implementations of the repository traits. Runtime `sqlx::query`
//! calls (not the `query!` compile-time macros) so the crate is buildable
//! without a live `DATABASE_URL`/offline query cache. Recorded in
//! DESIGN.md.

use super::*;
use crate::error::{Result, StorageError};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row};
use uw_core::domain::*;

/// Shared handle. All five repository structs wrap the same pool; the
/// workflow context constructs one of each per dispatch, matching the
/// "explicit repository handles constructed per request" design note.
#[derive(Clone)]
pub struct PostgresUnderwritingRepository {
    pool: PgPool,
}

impl PostgresUnderwritingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnderwritingRepository for PostgresUnderwritingRepository {
    async fn get_underwriting_with_details(&self, id: UnderwritingId) -> Result<Option<Underwriting>> {
        let row = sqlx::query("SELECT * FROM underwriting WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        let row = match row {
            Some(r) => r,
            None => return Ok(None),
        };

        let owners = sqlx::query("SELECT * FROM owner WHERE underwriting_id = $1 AND enabled = true")
            .bind(id.0)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(row_to_owner)
            .collect::<Result<Vec<_>>>()?;

        let documents = sqlx::query("SELECT * FROM document WHERE underwriting_id = $1")
            .bind(id.0)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(row_to_document)
            .collect::<Result<Vec<_>>>()?;

        let merchant_address = sqlx::query("SELECT * FROM merchant_address WHERE underwriting_id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .map(|r| row_to_merchant_address(&r))
            .transpose()?;

        Ok(Some(Underwriting {
            id,
            organization_id: OrganizationId(row.try_get("organization_id")?),
            serial_number: row.try_get("serial_number")?,
            status: parse_underwriting_status(row.try_get("status")?)?,
            merchant_name: row.try_get("merchant_name")?,
            merchant_ein: row.try_get("merchant_ein")?,
            merchant_industry: row.try_get("merchant_industry")?,
            merchant_email: row.try_get("merchant_email")?,
            merchant_phone: row.try_get("merchant_phone")?,
            merchant_website: row.try_get("merchant_website")?,
            merchant_entity_type: row.try_get("merchant_entity_type")?,
            merchant_incorporation_date: row.try_get("merchant_incorporation_date")?,
            merchant_state_of_incorporation: row.try_get("merchant_state_of_incorporation")?,
            merchant_address,
            owners,
            documents,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }
}

fn row_to_owner(row: &sqlx::postgres::PgRow) -> Result<Owner> {
    Ok(Owner {
        id: OwnerId(row.try_get("id")?),
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        ssn: row.try_get("ssn")?,
        ownership_percent: row.try_get("ownership_percent")?,
        primary_owner: row.try_get("primary_owner")?,
        enabled: row.try_get("enabled")?,
    })
}

fn row_to_document(row: &sqlx::postgres::PgRow) -> Result<Document> {
    Ok(Document {
        id: DocumentId(row.try_get("id")?),
        underwriting_id: UnderwritingId(row.try_get("underwriting_id")?),
        stipulation_type: row.try_get("stipulation_type")?,
        current_revision_id: row.try_get("current_revision_id")?,
        status: row.try_get("status")?,
    })
}

fn row_to_merchant_address(row: &sqlx::postgres::PgRow) -> Result<MerchantAddress> {
    Ok(MerchantAddress {
        addr_1: row.try_get("addr_1")?,
        addr_2: row.try_get("addr_2")?,
        city: row.try_get("city")?,
        state: row.try_get("state")?,
        zip: row.try_get("zip")?,
    })
}

fn parse_underwriting_status(s: String) -> Result<UnderwritingStatus> {
    match s.as_str() {
        "created" => Ok(UnderwritingStatus::Created),
        "processing" => Ok(UnderwritingStatus::Processing),
        "passed" => Ok(UnderwritingStatus::Passed),
        "rejected" => Ok(UnderwritingStatus::Rejected),
        other => Err(StorageError::MissingColumn(format!("unknown underwriting status {other}"))),
    }
}

#[derive(Clone)]
pub struct PostgresProcessorRepository {
    pool: PgPool,
}

impl PostgresProcessorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_underwriting_processor(row: &sqlx::postgres::PgRow) -> Result<UnderwritingProcessor> {
    let current_list: Vec<uuid::Uuid> = row.try_get("current_executions_list")?;
    let config_override: Value = row.try_get("config_override")?;
    Ok(UnderwritingProcessor {
        id: UnderwritingProcessorId(row.try_get("id")?),
        organization_id: OrganizationId(row.try_get("organization_id")?),
        underwriting_id: UnderwritingId(row.try_get("underwriting_id")?),
        organization_processor_id: OrganizationProcessorId(row.try_get("organization_processor_id")?),
        processor: row.try_get("processor")?,
        name: row.try_get("name")?,
        auto: row.try_get("auto")?,
        enabled: row.try_get("enabled")?,
        config_override: config_override.as_object().cloned().unwrap_or_default(),
        current_executions_list: current_list.into_iter().map(ExecutionId).collect(),
    })
}

#[async_trait]
impl ProcessorRepository for PostgresProcessorRepository {
    async fn get_underwriting_processors(
        &self,
        underwriting_id: UnderwritingId,
        enabled: Option<bool>,
        auto: Option<bool>,
    ) -> Result<Vec<UnderwritingProcessor>> {
        let rows = sqlx::query(
            "SELECT * FROM underwriting_processors WHERE underwriting_id = $1
             AND ($2::boolean IS NULL OR enabled = $2)
             AND ($3::boolean IS NULL OR auto = $3)",
        )
        .bind(underwriting_id.0)
        .bind(enabled)
        .bind(auto)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_underwriting_processor).collect()
    }

    async fn get_underwriting_processor_by_id(
        &self,
        id: UnderwritingProcessorId,
    ) -> Result<Option<UnderwritingProcessor>> {
        let row = sqlx::query("SELECT * FROM underwriting_processors WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_underwriting_processor).transpose()
    }

    async fn get_organization_processor(&self, id: OrganizationProcessorId) -> Result<Option<OrganizationProcessor>> {
        let row = sqlx::query("SELECT * FROM organization_processors WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        let row = match row {
            Some(r) => r,
            None => return Ok(None),
        };
        let config: Value = row.try_get("config")?;
        let status: String = row.try_get("status")?;
        Ok(Some(OrganizationProcessor {
            id,
            organization_id: OrganizationId(row.try_get("organization_id")?),
            processor: row.try_get("processor")?,
            name: row.try_get("name")?,
            auto: row.try_get("auto")?,
            status: if status == "active" { SubscriptionStatus::Active } else { SubscriptionStatus::Disabled },
            config: config.as_object().cloned().unwrap_or_default(),
            price_cents: row.try_get("price_cents")?,
        }))
    }

    async fn update_current_executions_list(
        &self,
        id: UnderwritingProcessorId,
        execution_ids: Vec<ExecutionId>,
    ) -> Result<()> {
        let ids: Vec<uuid::Uuid> = execution_ids.into_iter().map(|e| e.0).collect();
        sqlx::query("UPDATE underwriting_processors SET current_executions_list = $1, updated_at = now() WHERE id = $2")
            .bind(ids)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PostgresExecutionRepository {
    pool: PgPool,
}

impl PostgresExecutionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_execution_status(s: &str) -> ExecutionStatus {
    match s {
        "pending" => ExecutionStatus::Pending,
        "running" => ExecutionStatus::Running,
        "completed" => ExecutionStatus::Completed,
        "failed" => ExecutionStatus::Failed,
        _ => ExecutionStatus::Cancelled,
    }
}

fn row_to_execution(row: &sqlx::postgres::PgRow) -> Result<Execution> {
    let status: String = row.try_get("status")?;
    let updated_execution_id: Option<uuid::Uuid> = row.try_get("updated_execution_id")?;
    Ok(Execution {
        id: ExecutionId(row.try_get("id")?),
        organization_id: OrganizationId(row.try_get("organization_id")?),
        underwriting_id: UnderwritingId(row.try_get("underwriting_id")?),
        underwriting_processor_id: UnderwritingProcessorId(row.try_get("underwriting_processor_id")?),
        processor: row.try_get("processor")?,
        status: parse_execution_status(&status),
        enabled: row.try_get("enabled")?,
        payload: row.try_get("payload")?,
        payload_hash: row.try_get("payload_hash")?,
        factors_delta: row.try_get("factors_delta")?,
        run_cost_cents: row.try_get("run_cost_cents")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        failed_code: row.try_get("failed_code")?,
        failed_reason: row.try_get("failed_reason")?,
        updated_execution_id: updated_execution_id.map(ExecutionId),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl ExecutionRepository for PostgresExecutionRepository {
    async fn get_execution(&self, id: ExecutionId) -> Result<Option<Execution>> {
        let row = sqlx::query("SELECT * FROM processor_executions WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_execution).transpose()
    }

    async fn find_by_payload_hash(
        &self,
        underwriting_processor_id: UnderwritingProcessorId,
        payload_hash: &str,
    ) -> Result<Option<Execution>> {
        let row = sqlx::query(
            "SELECT * FROM processor_executions
             WHERE underwriting_processor_id = $1 AND payload_hash = $2
             AND updated_execution_id IS NULL
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(underwriting_processor_id.0)
        .bind(payload_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_execution).transpose()
    }

    async fn insert_pending(
        &self,
        underwriting_processor_id: UnderwritingProcessorId,
        organization_id: OrganizationId,
        underwriting_id: UnderwritingId,
        processor: &str,
        payload: Value,
        payload_hash: &str,
    ) -> Result<ExecutionId> {
        let id = ExecutionId::new();
        sqlx::query(
            "INSERT INTO processor_executions
             (id, organization_id, underwriting_id, underwriting_processor_id, processor,
              status, enabled, payload, payload_hash, run_cost_cents, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, 'pending', true, $6, $7, 0, now(), now())",
        )
        .bind(id.0)
        .bind(organization_id.0)
        .bind(underwriting_id.0)
        .bind(underwriting_processor_id.0)
        .bind(processor)
        .bind(payload)
        .bind(payload_hash)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn supersede(&self, old_id: ExecutionId, new_id: ExecutionId) -> Result<()> {
        sqlx::query(
            "UPDATE processor_executions SET updated_execution_id = $1, updated_at = now()
             WHERE id = $2 AND updated_execution_id IS NULL",
        )
        .bind(new_id.0)
        .bind(old_id.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_running(&self, id: ExecutionId) -> Result<()> {
        sqlx::query("UPDATE processor_executions SET status = 'running', started_at = now(), updated_at = now() WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_completed(&self, id: ExecutionId, factors_delta: Value, run_cost_cents: i64) -> Result<()> {
        sqlx::query(
            "UPDATE processor_executions
             SET status = 'completed', factors_delta = $1, run_cost_cents = $2,
                 completed_at = now(), updated_at = now()
             WHERE id = $3",
        )
        .bind(factors_delta)
        .bind(run_cost_cents)
        .bind(id.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_failed(&self, id: ExecutionId, failed_code: &str, failed_reason: &str) -> Result<()> {
        sqlx::query(
            "UPDATE processor_executions
             SET status = 'failed', failed_code = $1, failed_reason = $2,
                 completed_at = now(), updated_at = now()
             WHERE id = $3",
        )
        .bind(failed_code)
        .bind(failed_reason)
        .bind(id.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_active_executions(
        &self,
        underwriting_processor_id: UnderwritingProcessorId,
    ) -> Result<Vec<Execution>> {
        let rows = sqlx::query(
            "SELECT pe.* FROM processor_executions pe
             JOIN underwriting_processors up ON up.id = pe.underwriting_processor_id
             WHERE pe.underwriting_processor_id = $1
               AND pe.enabled = true
               AND pe.status = 'completed'
               AND pe.id = ANY(up.current_executions_list)
             ORDER BY pe.completed_at DESC",
        )
        .bind(underwriting_processor_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_execution).collect()
    }

    async fn get_executions_by_underwriting(&self, underwriting_id: UnderwritingId) -> Result<Vec<Execution>> {
        let rows = sqlx::query("SELECT * FROM processor_executions WHERE underwriting_id = $1 ORDER BY created_at DESC")
            .bind(underwriting_id.0)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_execution).collect()
    }

    async fn get_execution_chain(&self, id: ExecutionId) -> Result<Vec<Execution>> {
        let mut chain = Vec::new();
        let mut current = self.get_execution(id).await?;
        let mut seen = std::collections::HashSet::new();
        while let Some(execution) = current {
            if !seen.insert(execution.id.0) {
                // defends against a corrupt supersession cycle; a healthy
                // store never forms one.
                break;
            }
            let next_id = execution.updated_execution_id;
            chain.push(execution);
            current = match next_id {
                Some(next_id) => self.get_execution(next_id).await?,
                None => None,
            };
        }
        Ok(chain)
    }

    async fn set_enabled(&self, id: ExecutionId, enabled: bool) -> Result<()> {
        sqlx::query("UPDATE processor_executions SET enabled = $1, updated_at = now() WHERE id = $2")
            .bind(enabled)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reset_to_pending(&self, id: ExecutionId) -> Result<()> {
        sqlx::query(
            "UPDATE processor_executions
             SET status = 'pending', started_at = NULL, completed_at = NULL,
                 failed_code = NULL, failed_reason = NULL, updated_at = now()
             WHERE id = $1",
        )
        .bind(id.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PostgresFactorRepository {
    pool: PgPool,
}

impl PostgresFactorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FactorRepository for PostgresFactorRepository {
    async fn save_factors(
        &self,
        organization_id: OrganizationId,
        underwriting_id: UnderwritingId,
        underwriting_processor_id: UnderwritingProcessorId,
        execution_id: ExecutionId,
        factors: &serde_json::Map<String, Value>,
        source: FactorSource,
    ) -> Result<usize> {
        let source_str = match source {
            FactorSource::Processor => "processor",
            FactorSource::Manual => "manual",
        };

        let mut written = 0usize;
        for (key, value) in factors {
            let factor_hash = uw_core::hashing::generate_factor_hash(key, value);

            let existing = sqlx::query(
                "SELECT id, factor_hash FROM factor
                 WHERE underwriting_id = $1 AND factor_key = $2 AND execution_id = $3 AND status = 'active'",
            )
            .bind(underwriting_id.0)
            .bind(key)
            .bind(execution_id.0)
            .fetch_optional(&self.pool)
            .await?;

            match existing {
                Some(row) => {
                    let existing_hash: String = row.try_get("factor_hash")?;
                    if existing_hash == factor_hash {
                        continue;
                    }
                    let id: uuid::Uuid = row.try_get("id")?;
                    sqlx::query("UPDATE factor SET value = $1, factor_hash = $2, updated_at = now() WHERE id = $3")
                        .bind(value)
                        .bind(&factor_hash)
                        .bind(id)
                        .execute(&self.pool)
                        .await?;
                    written += 1;
                }
                None => {
                    sqlx::query(
                        "INSERT INTO factor
                         (id, organization_id, underwriting_id, underwriting_processor_id, execution_id,
                          factor_key, value, source, status, factor_hash, created_at, updated_at)
                         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'active', $9, now(), now())",
                    )
                    .bind(FactorId::new().0)
                    .bind(organization_id.0)
                    .bind(underwriting_id.0)
                    .bind(underwriting_processor_id.0)
                    .bind(execution_id.0)
                    .bind(key)
                    .bind(value)
                    .bind(source_str)
                    .bind(&factor_hash)
                    .execute(&self.pool)
                    .await?;
                    written += 1;
                }
            }
        }
        Ok(written)
    }

    async fn mark_deleted_for_execution(&self, execution_id: ExecutionId) -> Result<usize> {
        let result = sqlx::query("UPDATE factor SET status = 'deleted', updated_at = now() WHERE execution_id = $1 AND status = 'active'")
            .bind(execution_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn get_active_factors(&self, underwriting_id: UnderwritingId) -> Result<Vec<Factor>> {
        let rows = sqlx::query("SELECT * FROM factor WHERE underwriting_id = $1 AND status = 'active'")
            .bind(underwriting_id.0)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(Factor {
                    id: FactorId(row.try_get("id")?),
                    organization_id: OrganizationId(row.try_get("organization_id")?),
                    underwriting_id,
                    underwriting_processor_id: UnderwritingProcessorId(row.try_get("underwriting_processor_id")?),
                    execution_id: ExecutionId(row.try_get("execution_id")?),
                    factor_key: row.try_get("factor_key")?,
                    value: row.try_get("value")?,
                    unit: row.try_get("unit")?,
                    source: if row.try_get::<String, _>("source")? == "processor" {
                        FactorSource::Processor
                    } else {
                        FactorSource::Manual
                    },
                    status: FactorStatus::Active,
                    factor_hash: row.try_get("factor_hash")?,
                    created_at: row.try_get("created_at")?,
                    updated_at: row.try_get("updated_at")?,
                })
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct PostgresWorkflowLogRepository {
    pool: PgPool,
}

impl PostgresWorkflowLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowLogRepository for PostgresWorkflowLogRepository {
    async fn log_stage(
        &self,
        underwriting_id: UnderwritingId,
        workflow_name: &str,
        stage: &str,
        input: Option<Value>,
        output: Option<Value>,
        status: &str,
        error_message: Option<String>,
        execution_time_ms: Option<i64>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO test_workflow
             (id, underwriting_id, workflow_name, stage, input, output, status, error_message, execution_time_ms, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now(), now())",
        )
        .bind(uuid::Uuid::new_v4())
        .bind(underwriting_id.0)
        .bind(workflow_name)
        .bind(stage)
        .bind(input)
        .bind(output)
        .bind(status)
        .bind(error_message)
        .bind(execution_time_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
