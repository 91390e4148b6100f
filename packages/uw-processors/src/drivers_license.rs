use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use uw_core::domain::ProcessorKind;
use uw_core::error::Result;
use uw_core::{ExecutionContext, Processor, ProcessorError, Triggers};

/// One execution per drivers license document; emits a verification factor
/// per revision.
pub struct TestDriversLicenseProcessor;

#[async_trait]
impl Processor for TestDriversLicenseProcessor {
    fn name(&self) -> &'static str {
        "test_drivers_license_processor"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Document
    }

    fn triggers(&self) -> Triggers {
        Triggers {
            application_form: None,
            documents_list: Some(vec!["s_drivers_license".into()]),
        }
    }

    fn default_config(&self) -> HashMap<String, Value> {
        HashMap::new()
    }

    async fn transform_input(&self, payload: &Value, _ctx: &mut ExecutionContext) -> Result<Value> {
        Ok(payload.clone())
    }

    async fn validate_input(&self, transformed: &Value, _ctx: &ExecutionContext) -> Result<()> {
        if transformed.get("revision_id").and_then(|v| v.as_str()).is_none() {
            return Err(ProcessorError::InputValidation("missing revision_id".into()));
        }
        Ok(())
    }

    async fn extract(&self, validated: &Value, ctx: &mut ExecutionContext) -> Result<Value> {
        let revision_id = validated
            .get("revision_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProcessorError::FactorExtraction("revision_id missing at extraction".into()))?;

        ctx.add_document_revision_id(revision_id);
        ctx.add_cost("id_verification", 75);

        let factors = json!({
            "f_drivers_license_verified": true,
            "f_drivers_license_revision": revision_id,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extracts_verification_factor() {
        let processor = TestDriversLicenseProcessor;
        let payload = json!({"revision_id": "rev-1", "documents_list": ["rev-1"]});
        let mut ctx = ExecutionContext::default();
        let result = uw_core::processor::run(&processor, &payload, &mut ctx).await;
        assert_eq!(result.status, uw_core::PipelineStatus::Completed);
        assert_eq!(result.output.unwrap()["factors"]["f_drivers_license_verified"], json!(true));
    }
}
