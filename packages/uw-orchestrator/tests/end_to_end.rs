//! End-to-end workflow tests against an in-memory store, exercising the
//! same `Orchestrator` code path a live Postgres deployment would use.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uw_core::domain::*;
use uw_core::Registry;
use uw_orchestrator::{Orchestrator, UnderwritingLocks};
use uw_storage::error::Result;
use uw_storage::{ExecutionRepository, FactorRepository, ProcessorRepository, UnderwritingRepository, WorkflowLogRepository};

#[derive(Default)]
struct FakeWorld {
    underwritings: HashMap<UnderwritingId, Underwriting>,
    org_processors: HashMap<OrganizationProcessorId, OrganizationProcessor>,
    underwriting_processors: HashMap<UnderwritingProcessorId, UnderwritingProcessor>,
    executions: HashMap<ExecutionId, Execution>,
    factors: HashMap<(UnderwritingId, String, ExecutionId), Factor>,
}

#[derive(Clone)]
struct FakeStore(Arc<Mutex<FakeWorld>>);

impl FakeStore {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(FakeWorld::default())))
    }
}

#[async_trait]
impl UnderwritingRepository for FakeStore {
    async fn get_underwriting_with_details(&self, id: UnderwritingId) -> Result<Option<Underwriting>> {
        Ok(self.0.lock().unwrap().underwritings.get(&id).cloned())
    }
}

#[async_trait]
impl ProcessorRepository for FakeStore {
    async fn get_underwriting_processors(
        &self,
        underwriting_id: UnderwritingId,
        enabled: Option<bool>,
        auto: Option<bool>,
    ) -> Result<Vec<UnderwritingProcessor>> {
        let world = self.0.lock().unwrap();
        Ok(world
            .underwriting_processors
            .values()
            .filter(|p| p.underwriting_id == underwriting_id)
            .filter(|p| enabled.map(|e| p.enabled == e).unwrap_or(true))
            .filter(|p| auto.map(|a| p.auto == a).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn get_underwriting_processor_by_id(&self, id: UnderwritingProcessorId) -> Result<Option<UnderwritingProcessor>> {
        Ok(self.0.lock().unwrap().underwriting_processors.get(&id).cloned())
    }

    async fn get_organization_processor(&self, id: OrganizationProcessorId) -> Result<Option<OrganizationProcessor>> {
        Ok(self.0.lock().unwrap().org_processors.get(&id).cloned())
    }

    async fn update_current_executions_list(&self, id: UnderwritingProcessorId, execution_ids: Vec<ExecutionId>) -> Result<()> {
        let mut world = self.0.lock().unwrap();
        if let Some(instance) = world.underwriting_processors.get_mut(&id) {
            instance.current_executions_list = execution_ids;
        }
        Ok(())
    }
}

#[async_trait]
impl ExecutionRepository for FakeStore {
    async fn get_execution(&self, id: ExecutionId) -> Result<Option<Execution>> {
        Ok(self.0.lock().unwrap().executions.get(&id).cloned())
    }

    async fn find_by_payload_hash(&self, underwriting_processor_id: UnderwritingProcessorId, payload_hash: &str) -> Result<Option<Execution>> {
        let world = self.0.lock().unwrap();
        Ok(world
            .executions
            .values()
            .find(|e| e.underwriting_processor_id == underwriting_processor_id && e.payload_hash == payload_hash)
            .cloned())
    }

    async fn insert_pending(
        &self,
        underwriting_processor_id: UnderwritingProcessorId,
        organization_id: OrganizationId,
        underwriting_id: UnderwritingId,
        processor: &str,
        payload: serde_json::Value,
        payload_hash: &str,
    ) -> Result<ExecutionId> {
        let id = ExecutionId::new();
        let now = Utc::now();
        let execution = Execution {
            id,
            organization_id,
            underwriting_id,
            underwriting_processor_id,
            processor: processor.to_string(),
            status: ExecutionStatus::Pending,
            enabled: true,
            payload,
            payload_hash: payload_hash.to_string(),
            factors_delta: None,
            run_cost_cents: 0,
            started_at: None,
            completed_at: None,
            failed_code: None,
            failed_reason: None,
            updated_execution_id: None,
            created_at: now,
            updated_at: now,
        };
        self.0.lock().unwrap().executions.insert(id, execution);
        Ok(id)
    }

    async fn supersede(&self, old_id: ExecutionId, new_id: ExecutionId) -> Result<()> {
        let mut world = self.0.lock().unwrap();
        if let Some(old) = world.executions.get_mut(&old_id) {
            if old.updated_execution_id.is_none() {
                old.updated_execution_id = Some(new_id);
            }
        }
        Ok(())
    }

    async fn set_running(&self, id: ExecutionId) -> Result<()> {
        let mut world = self.0.lock().unwrap();
        if let Some(e) = world.executions.get_mut(&id) {
            e.status = ExecutionStatus::Running;
            e.started_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn set_completed(&self, id: ExecutionId, factors_delta: serde_json::Value, run_cost_cents: i64) -> Result<()> {
        let mut world = self.0.lock().unwrap();
        if let Some(e) = world.executions.get_mut(&id) {
            e.status = ExecutionStatus::Completed;
            e.factors_delta = Some(factors_delta);
            e.run_cost_cents = run_cost_cents;
            e.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn set_failed(&self, id: ExecutionId, failed_code: &str, failed_reason: &str) -> Result<()> {
        let mut world = self.0.lock().unwrap();
        if let Some(e) = world.executions.get_mut(&id) {
            e.status = ExecutionStatus::Failed;
            e.failed_code = Some(failed_code.to_string());
            e.failed_reason = Some(failed_reason.to_string());
        }
        Ok(())
    }

    async fn get_active_executions(&self, underwriting_processor_id: UnderwritingProcessorId) -> Result<Vec<Execution>> {
        let world = self.0.lock().unwrap();
        let current = world
            .underwriting_processors
            .get(&underwriting_processor_id)
            .map(|p| p.current_executions_list.clone())
            .unwrap_or_default();

        let mut active: Vec<Execution> = current
            .iter()
            .filter_map(|id| world.executions.get(id))
            .filter(|e| e.enabled && e.status == ExecutionStatus::Completed)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(active)
    }

    async fn get_executions_by_underwriting(&self, underwriting_id: UnderwritingId) -> Result<Vec<Execution>> {
        let world = self.0.lock().unwrap();
        Ok(world.executions.values().filter(|e| e.underwriting_id == underwriting_id).cloned().collect())
    }

    async fn get_execution_chain(&self, id: ExecutionId) -> Result<Vec<Execution>> {
        let world = self.0.lock().unwrap();
        let mut chain = Vec::new();
        let mut current = world.executions.get(&id).cloned();
        let mut seen = std::collections::HashSet::new();
        while let Some(execution) = current {
            if !seen.insert(execution.id.0) {
                break;
            }
            let next_id = execution.updated_execution_id;
            chain.push(execution);
            current = next_id.and_then(|n| world.executions.get(&n).cloned());
        }
        Ok(chain)
    }

    async fn set_enabled(&self, id: ExecutionId, enabled: bool) -> Result<()> {
        let mut world = self.0.lock().unwrap();
        if let Some(e) = world.executions.get_mut(&id) {
            e.enabled = enabled;
        }
        Ok(())
    }

    async fn reset_to_pending(&self, id: ExecutionId) -> Result<()> {
        let mut world = self.0.lock().unwrap();
        if let Some(e) = world.executions.get_mut(&id) {
            e.status = ExecutionStatus::Pending;
        }
        Ok(())
    }
}

#[async_trait]
impl FactorRepository for FakeStore {
    async fn save_factors(
        &self,
        organization_id: OrganizationId,
        underwriting_id: UnderwritingId,
        underwriting_processor_id: UnderwritingProcessorId,
        execution_id: ExecutionId,
        factors: &serde_json::Map<String, serde_json::Value>,
        source: FactorSource,
    ) -> Result<usize> {
        let mut world = self.0.lock().unwrap();
        let now = Utc::now();
        let mut written = 0;
        for (key, value) in factors {
            let hash = uw_core::hashing::generate_factor_hash(key, value);
            let entry_key = (underwriting_id, key.clone(), execution_id);
            let unchanged = world
                .factors
                .get(&entry_key)
                .map(|f| f.factor_hash == hash && f.status == FactorStatus::Active)
                .unwrap_or(false);
            if unchanged {
                continue;
            }
            world.factors.insert(
                entry_key,
                Factor {
                    id: FactorId::new(),
                    organization_id,
                    underwriting_id,
                    underwriting_processor_id,
                    execution_id,
                    factor_key: key.clone(),
                    value: value.clone(),
                    unit: None,
                    source,
                    status: FactorStatus::Active,
                    factor_hash: hash,
                    created_at: now,
                    updated_at: now,
                },
            );
            written += 1;
        }
        Ok(written)
    }

    async fn mark_deleted_for_execution(&self, execution_id: ExecutionId) -> Result<usize> {
        let mut world = self.0.lock().unwrap();
        let mut count = 0;
        for factor in world.factors.values_mut() {
            if factor.execution_id == execution_id && factor.status == FactorStatus::Active {
                factor.status = FactorStatus::Deleted;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn get_active_factors(&self, underwriting_id: UnderwritingId) -> Result<Vec<Factor>> {
        let world = self.0.lock().unwrap();
        Ok(world
            .factors
            .values()
            .filter(|f| f.underwriting_id == underwriting_id && f.status == FactorStatus::Active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl WorkflowLogRepository for FakeStore {
    async fn log_stage(
        &self,
        _underwriting_id: UnderwritingId,
        _workflow_name: &str,
        _stage: &str,
        _input: Option<serde_json::Value>,
        _output: Option<serde_json::Value>,
        _status: &str,
        _error_message: Option<String>,
        _execution_time_ms: Option<i64>,
    ) -> Result<()> {
        Ok(())
    }
}

fn sample_underwriting() -> Underwriting {
    let now = Utc::now();
    Underwriting {
        id: UnderwritingId::new(),
        organization_id: OrganizationId::new(),
        serial_number: "UW-1001".into(),
        status: UnderwritingStatus::Processing,
        merchant_name: Some("Acme Payments".into()),
        merchant_ein: Some("98-7654321".into()),
        merchant_industry: None,
        merchant_email: None,
        merchant_phone: None,
        merchant_website: None,
        merchant_entity_type: None,
        merchant_incorporation_date: None,
        merchant_state_of_incorporation: None,
        merchant_address: None,
        owners: vec![],
        documents: vec![],
        created_at: now,
        updated_at: now,
    }
}

fn build_orchestrator(store: &FakeStore) -> Orchestrator {
    Orchestrator {
        underwriting_repo: Arc::new(store.clone()),
        processor_repo: Arc::new(store.clone()),
        execution_repo: Arc::new(store.clone()),
        factor_repo: Arc::new(store.clone()),
        workflow_log: Arc::new(store.clone()),
        registry: Arc::new(Registry::from_constructors(uw_processors::ALL_PROCESSORS)),
        locks: Arc::new(UnderwritingLocks::new()),
        worker_pool_size: 5,
    }
}

fn seed_application_processor(store: &FakeStore, underwriting: &Underwriting) -> UnderwritingProcessorId {
    let org_processor_id = OrganizationProcessorId::new();
    let instance_id = UnderwritingProcessorId::new();
    let mut world = store.0.lock().unwrap();
    world.org_processors.insert(
        org_processor_id,
        OrganizationProcessor {
            id: org_processor_id,
            organization_id: underwriting.organization_id,
            processor: "test_application_processor".into(),
            name: "Application Verification".into(),
            auto: true,
            status: SubscriptionStatus::Active,
            config: serde_json::Map::new(),
            price_cents: Some(500),
        },
    );
    world.underwriting_processors.insert(
        instance_id,
        UnderwritingProcessor {
            id: instance_id,
            organization_id: underwriting.organization_id,
            underwriting_id: underwriting.id,
            organization_processor_id: org_processor_id,
            processor: "test_application_processor".into(),
            name: "Application Verification".into(),
            auto: true,
            enabled: true,
            config_override: serde_json::Map::new(),
            current_executions_list: vec![],
        },
    );
    instance_id
}

#[tokio::test]
async fn workflow1_happy_path_runs_and_writes_factors() {
    let store = FakeStore::new();
    let underwriting = sample_underwriting();
    seed_application_processor(&store, &underwriting);
    store.0.lock().unwrap().underwritings.insert(underwriting.id, underwriting.clone());

    let orchestrator = build_orchestrator(&store);
    let summary = orchestrator.handle_workflow1(underwriting.id).await.unwrap();

    assert_eq!(summary.processors_selected, 1);
    assert_eq!(summary.executions_run, 1);
    assert_eq!(summary.executions_completed, 1);
    assert!(summary.factors_written > 0);

    let factors = store.get_active_factors(underwriting.id).await.unwrap();
    assert!(factors.iter().any(|f| f.factor_key == "f_merchant_name"));
}

#[tokio::test]
async fn workflow1_replay_is_a_no_op_when_nothing_changed() {
    let store = FakeStore::new();
    let underwriting = sample_underwriting();
    seed_application_processor(&store, &underwriting);
    store.0.lock().unwrap().underwritings.insert(underwriting.id, underwriting.clone());

    let orchestrator = build_orchestrator(&store);
    orchestrator.handle_workflow1(underwriting.id).await.unwrap();
    let second = orchestrator.handle_workflow1(underwriting.id).await.unwrap();

    assert_eq!(second.executions_run, 0);
}

#[tokio::test]
async fn workflow2_duplicate_supersedes_and_reruns() {
    let store = FakeStore::new();
    let underwriting = sample_underwriting();
    let instance_id = seed_application_processor(&store, &underwriting);
    store.0.lock().unwrap().underwritings.insert(underwriting.id, underwriting.clone());

    let orchestrator = build_orchestrator(&store);
    orchestrator.handle_workflow1(underwriting.id).await.unwrap();

    let original_execution_id = {
        let world = store.0.lock().unwrap();
        world.underwriting_processors.get(&instance_id).unwrap().current_executions_list[0]
    };

    let summary = orchestrator
        .handle_workflow2(instance_id, Some(original_execution_id), true, None, None)
        .await
        .unwrap();

    assert_eq!(summary.executions_run, 1);
    let world = store.0.lock().unwrap();
    let original = world.executions.get(&original_execution_id).unwrap();
    assert!(original.updated_execution_id.is_some());
    let new_id = original.updated_execution_id.unwrap();
    assert_ne!(new_id, original_execution_id);
    assert!(world.underwriting_processors.get(&instance_id).unwrap().current_executions_list.contains(&new_id));
}

#[tokio::test]
async fn workflow5_then_workflow4_disables_then_restores_factors() {
    let store = FakeStore::new();
    let underwriting = sample_underwriting();
    seed_application_processor(&store, &underwriting);
    store.0.lock().unwrap().underwritings.insert(underwriting.id, underwriting.clone());

    let orchestrator = build_orchestrator(&store);
    orchestrator.handle_workflow1(underwriting.id).await.unwrap();

    let execution_id = store.get_executions_by_underwriting(underwriting.id).await.unwrap()[0].id;

    let disabled = orchestrator.handle_workflow5(execution_id).await.unwrap();
    assert_eq!(disabled.factors_written, 0);
    let active_after_disable = store.get_active_factors(underwriting.id).await.unwrap();
    assert!(active_after_disable.is_empty());

    let restored = orchestrator.handle_workflow4(execution_id).await.unwrap();
    assert!(restored.factors_written > 0);
    let active_after_restore = store.get_active_factors(underwriting.id).await.unwrap();
    assert!(!active_after_restore.is_empty());
}
