use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use uw_core::domain::ProcessorKind;
use uw_core::error::Result;
use uw_core::{ExecutionContext, Processor, ProcessorError, Triggers};

/// Reads `merchant.name`/`merchant.ein` off the application form and emits
/// a name factor plus a coarse verification flag.
pub struct TestApplicationProcessor;

#[async_trait]
impl Processor for TestApplicationProcessor {
    fn name(&self) -> &'static str {
        "test_application_processor"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Application
    }

    fn triggers(&self) -> Triggers {
        Triggers {
            application_form: Some(vec!["merchant.name".into(), "merchant.ein".into()]),
            documents_list: None,
        }
    }

    fn default_config(&self) -> HashMap<String, Value> {
        HashMap::new()
    }

    async fn transform_input(&self, payload: &Value, _ctx: &mut ExecutionContext) -> Result<Value> {
        Ok(payload.clone())
    }

    async fn validate_input(&self, transformed: &Value, _ctx: &ExecutionContext) -> Result<()> {
        if transformed.get("application_form").is_none() {
            return Err(ProcessorError::InputValidation("missing application_form".into()));
        }
        Ok(())
    }

    async fn extract(&self, validated: &Value, ctx: &mut ExecutionContext) -> Result<Value> {
        let form = validated
            .get("application_form")
            .and_then(|v| v.as_object())
            .ok_or_else(|| ProcessorError::FactorExtraction("application_form missing at extraction".into()))?;

        ctx.add_cost("name_lookup", 25);

        let mut factors = serde_json::Map::new();
        if let Some(name) = form.get("merchant.name") {
            factors.insert("f_merchant_name".into(), name.clone());
        }
        let verified = form.get("merchant.ein").map(|v| !v.is_null()).unwrap_or(false);
        factors.insert("f_merchant_verified".into(), json!(verified));

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
    async fn extracts_name_and_verified_flag() {
        let processor = TestApplicationProcessor;
        let payload = json!({
            "application_form": {"merchant.name": "Test Merchant Inc", "merchant.ein": "12-3456789"},
            "owners_list": [],
        });
        let mut ctx = ExecutionContext::default();
        let result = uw_core::processor::run(&processor, &payload, &mut ctx).await;
        assert_eq!(result.status, uw_core::PipelineStatus::Completed);
        let output = result.output.unwrap();
        assert_eq!(output["factors"]["f_merchant_name"], json!("Test Merchant Inc"));
        assert_eq!(output["factors"]["f_merchant_verified"], json!(true));
    }
}
