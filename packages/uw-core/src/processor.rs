//! The Processor abstraction: a non-overridable three-phase pipeline driven
//! by a small trait, matching the interface-plus-free-function shape called
//! for in lieu of an abstract-base template method.

use crate::domain::ProcessorKind;
use crate::error::{Phase, ProcessorError, Result};
use crate::payload::Triggers;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Per-execution mutable state threaded through the pipeline. Replaces
/// per-processor instance fields: a fresh context is created for every
/// execution, so no processor implementation holds mutable state across runs.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    pub config: serde_json::Map<String, Value>,
    cost_breakdown: HashMap<String, i64>,
    document_revision_ids: Vec<String>,
    document_ids_hash: Option<String>,
}

impl ExecutionContext {
    pub fn new(config: serde_json::Map<String, Value>) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn add_cost(&mut self, category: &str, cents: i64) {
        *self.cost_breakdown.entry(category.to_string()).or_insert(0) += cents;
    }

    pub fn add_document_revision_id(&mut self, id: impl Into<String>) {
        self.document_revision_ids.push(id.into());
    }

    pub fn set_document_ids_hash(&mut self, hash: impl Into<String>) {
        self.document_ids_hash = Some(hash.into());
    }

    pub fn total_cost_cents(&self) -> i64 {
        self.cost_breakdown.values().sum()
    }

    pub fn cost_breakdown(&self) -> &HashMap<String, i64> {
        &self.cost_breakdown
    }

    pub fn document_revision_ids(&self) -> &[String] {
        &self.document_revision_ids
    }
}

/// Outcome of `should_execute`.
pub struct Eligibility {
    pub eligible: bool,
    pub reason: Option<String>,
}

impl Eligibility {
    pub fn yes() -> Self {
        Self { eligible: true, reason: None }
    }

    pub fn no(reason: impl Into<String>) -> Self {
        Self { eligible: false, reason: Some(reason.into()) }
    }
}

/// A deterministic analytical unit. Implementations provide the four
/// required phase methods; `prevalidate`, `should_execute`, and
/// `consolidate` have sensible pass-through defaults so a simple processor
/// only needs to implement the four required methods.
#[async_trait]
pub trait Processor: Send + Sync {
    fn name(&self) -> &'static str;
    fn kind(&self) -> ProcessorKind;
    fn triggers(&self) -> Triggers;
    fn default_config(&self) -> HashMap<String, Value> {
        HashMap::new()
    }

    /// Cheap document-presence checks run before `transform_input`.
    async fn prevalidate(&self, _payload: &Value, _ctx: &ExecutionContext) -> Result<()> {
        Ok(())
    }

    /// Gates eligibility (e.g. "need >= N documents").
    fn should_execute(&self, _payload: &Value, _ctx: &ExecutionContext) -> Eligibility {
        Eligibility::yes()
    }

    async fn transform_input(&self, payload: &Value, ctx: &mut ExecutionContext) -> Result<Value>;

    async fn validate_input(&self, transformed: &Value, ctx: &ExecutionContext) -> Result<()>;

    async fn extract(&self, validated: &Value, ctx: &mut ExecutionContext) -> Result<Value>;

    async fn validate_output(&self, output: &Value, ctx: &ExecutionContext) -> Result<()>;

    /// Merges the outputs of the processor's active executions. Default:
    /// the last element of whatever order the caller passes. Callers build
    /// `factors_list` from `completed_at DESC`, so the default picks the
    /// oldest of the active set unless a processor overrides this method.
    fn consolidate(&self, factors_list: &[serde_json::Map<String, Value>]) -> serde_json::Map<String, Value> {
        factors_list.last().cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Completed,
    Failed,
}

/// The envelope a pipeline run produces for persistence and logging.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub status: PipelineStatus,
    pub phase: Option<Phase>,
    pub error_message: Option<String>,
    pub output: Option<Value>,
    pub total_cost_cents: i64,
    pub cost_breakdown: HashMap<String, i64>,
    pub document_revision_ids: Vec<String>,
}

/// The non-overridable pipeline. Runs phases in order with atomic
/// short-circuiting; no partial success is possible. A panic inside a
/// processor method is not caught here — the execution worker boundary in
/// `uw-orchestrator` is responsible for `phase="unknown"` attribution of
/// panics observed through `tokio::spawn`'s `JoinError`.
pub async fn run(processor: &dyn Processor, payload: &Value, ctx: &mut ExecutionContext) -> PipelineResult {
    let eligibility = processor.should_execute(payload, ctx);
    if !eligibility.eligible {
        return PipelineResult {
            status: PipelineStatus::Failed,
            phase: Some(Phase::PreExtraction),
            error_message: eligibility.reason.or_else(|| Some("processor declined execution".into())),
            output: None,
            total_cost_cents: 0,
            cost_breakdown: HashMap::new(),
            document_revision_ids: vec![],
        };
    }

    let result = run_phases(processor, payload, ctx).await;

    match result {
        Ok(output) => PipelineResult {
            status: PipelineStatus::Completed,
            phase: None,
            error_message: None,
            output: Some(output),
            total_cost_cents: ctx.total_cost_cents(),
            cost_breakdown: ctx.cost_breakdown().clone(),
            document_revision_ids: ctx.document_revision_ids().to_vec(),
        },
        Err(e) => PipelineResult {
            status: PipelineStatus::Failed,
            phase: Some(e.phase()),
            error_message: Some(e.to_string()),
            output: None,
            total_cost_cents: ctx.total_cost_cents(),
            cost_breakdown: ctx.cost_breakdown().clone(),
            document_revision_ids: ctx.document_revision_ids().to_vec(),
        },
    }
}

async fn run_phases(processor: &dyn Processor, payload: &Value, ctx: &mut ExecutionContext) -> Result<Value> {
    processor.prevalidate(payload, ctx).await?;
    let transformed = processor.transform_input(payload, ctx).await?;
    processor.validate_input(&transformed, ctx).await?;

    let output = processor.extract(&transformed, ctx).await?;
    processor.validate_output(&output, ctx).await?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct AlwaysOk;

    #[async_trait]
    impl Processor for AlwaysOk {
        fn name(&self) -> &'static str {
            "test_always_ok"
        }
        fn kind(&self) -> ProcessorKind {
            ProcessorKind::Application
        }
        fn triggers(&self) -> Triggers {
            Triggers::default()
        }
        async fn transform_input(&self, payload: &Value, _ctx: &mut ExecutionContext) -> Result<Value> {
            Ok(payload.clone())
        }
        async fn validate_input(&self, _t: &Value, _ctx: &ExecutionContext) -> Result<()> {
            Ok(())
        }
        async fn extract(&self, _v: &Value, ctx: &mut ExecutionContext) -> Result<Value> {
            ctx.add_cost("bureau_lookup", 150);
            Ok(json!({"factors": {"f_x": 1}}))
        }
        async fn validate_output(&self, _o: &Value, _ctx: &ExecutionContext) -> Result<()> {
            Ok(())
        }
    }

    struct FailsAtExtraction;

    #[async_trait]
    impl Processor for FailsAtExtraction {
        fn name(&self) -> &'static str {
            "test_fails"
        }
        fn kind(&self) -> ProcessorKind {
            ProcessorKind::Stipulation
        }
        fn triggers(&self) -> Triggers {
            Triggers::default()
        }
        async fn transform_input(&self, payload: &Value, _ctx: &mut ExecutionContext) -> Result<Value> {
            Ok(payload.clone())
        }
        async fn validate_input(&self, _t: &Value, _ctx: &ExecutionContext) -> Result<()> {
            Ok(())
        }
        async fn extract(&self, _v: &Value, _ctx: &mut ExecutionContext) -> Result<Value> {
            Err(ProcessorError::FactorExtraction("bureau unreachable".into()))
        }
        async fn validate_output(&self, _o: &Value, _ctx: &ExecutionContext) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn successful_pipeline_carries_cost_forward() {
        let mut ctx = ExecutionContext::default();
        let result = run(&AlwaysOk, &json!({}), &mut ctx).await;
        assert_eq!(result.status, PipelineStatus::Completed);
        assert_eq!(result.total_cost_cents, 150);
    }

    #[tokio::test]
    async fn failure_at_extraction_reports_extraction_phase() {
        let mut ctx = ExecutionContext::default();
        let result = run(&FailsAtExtraction, &json!({}), &mut ctx).await;
        assert_eq!(result.status, PipelineStatus::Failed);
        assert_eq!(result.phase, Some(Phase::Extraction));
    }

    #[tokio::test]
    async fn should_execute_false_short_circuits_before_extraction() {
        struct Gated;
        #[async_trait]
        impl Processor for Gated {
            fn name(&self) -> &'static str {
                "test_gated"
            }
            fn kind(&self) -> ProcessorKind {
                ProcessorKind::Stipulation
            }
            fn triggers(&self) -> Triggers {
                Triggers::default()
            }
            fn should_execute(&self, _payload: &Value, _ctx: &ExecutionContext) -> Eligibility {
                Eligibility::no("need 3 documents, have 2")
            }
            async fn transform_input(&self, p: &Value, _ctx: &mut ExecutionContext) -> Result<Value> {
                Ok(p.clone())
            }
            async fn validate_input(&self, _t: &Value, _ctx: &ExecutionContext) -> Result<()> {
                Ok(())
            }
            async fn extract(&self, _v: &Value, _ctx: &mut ExecutionContext) -> Result<Value> {
                panic!("must not run")
            }
            async fn validate_output(&self, _o: &Value, _ctx: &ExecutionContext) -> Result<()> {
                Ok(())
            }
        }
        let mut ctx = ExecutionContext::default();
        let result = run(&Gated, &json!({}), &mut ctx).await;
        assert_eq!(result.status, PipelineStatus::Failed);
        assert_eq!(result.phase, Some(Phase::PreExtraction));
    }
}
