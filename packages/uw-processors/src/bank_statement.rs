use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use uw_core::domain::ProcessorKind;
use uw_core::error::Result;
use uw_core::{Eligibility, ExecutionContext, Processor, ProcessorError, Triggers};

/// Requires at least `minimum_document` bank statements before running;
/// with fewer, fails at pre-extraction so consolidation still runs but
/// produces no new factors.
pub struct TestBankStatementProcessor;

#[async_trait]
impl Processor for TestBankStatementProcessor {
    fn name(&self) -> &'static str {
        "test_bank_statement_processor"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Stipulation
    }

    fn triggers(&self) -> Triggers {
        Triggers {
            application_form: None,
            documents_list: Some(vec!["s_bank_statement".into()]),
        }
    }

    fn default_config(&self) -> HashMap<String, Value> {
        let mut config = HashMap::new();
        config.insert("minimum_document".to_string(), json!(3));
        config
    }

    fn should_execute(&self, payload: &Value, ctx: &ExecutionContext) -> Eligibility {
        let minimum = ctx.config.get("minimum_document").and_then(|v| v.as_u64()).unwrap_or(3) as usize;
        let count = payload
            .get("documents_list")
            .and_then(|v| v.as_array())
            .map(|a| a.len())
            .unwrap_or(0);
        if count < minimum {
            Eligibility::no(format!("need {minimum} bank statements, have {count}"))
        } else {
            Eligibility::yes()
        }
    }

    async fn transform_input(&self, payload: &Value, _ctx: &mut ExecutionContext) -> Result<Value> {
        Ok(payload.clone())
    }

    async fn validate_input(&self, transformed: &Value, _ctx: &ExecutionContext) -> Result<()> {
        if transformed.get("revision_id").is_none() {
            return Err(ProcessorError::InputValidation("missing revision_id".into()));
        }
        Ok(())
    }

    async fn extract(&self, validated: &Value, ctx: &mut ExecutionContext) -> Result<Value> {
        let revision_ids = validated
            .get("revision_id")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        for id in &revision_ids {
            if let Some(s) = id.as_str() {
                ctx.add_document_revision_id(s);
            }
        }
        ctx.add_cost("statement_analysis", 50 * revision_ids.len() as i64);

        let factors = serde_json::json!({
            "f_bank_statement_count": revision_ids.len(),
            "f_bank_statement_verified": true,
        });

        Ok(json!({ "factors": factors }))
    }

    async fn validate_output(&self, output: &Value, _ctx: &ExecutionContext) -> Result<()> {
        if output.get("factors").and_then(|f| f.as_object()).is_none() {
            return Err(ProcessorError::ResultValidation("output missing factors map".into()));
        }
        Ok(())
    }
}
