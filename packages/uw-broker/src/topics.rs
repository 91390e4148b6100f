//! Topic names and payload shapes. A single source of truth for both the
//! subscriber here and any future HTTP trigger facade.

pub const UNDERWRITING_UPDATED: &str = "underwriting.updated";
pub const DOCUMENT_ANALYZED: &str = "document.analyzed";
pub const UNDERWRITING_PROCESSOR_EXECUTE: &str = "underwriting.processor.execute";
pub const UNDERWRITING_PROCESSOR_CONSOLIDATION: &str = "underwriting.processor.consolidation";
pub const UNDERWRITING_EXECUTION_ACTIVATE: &str = "underwriting.execution.activate";
pub const UNDERWRITING_EXECUTION_DISABLE: &str = "underwriting.execution.disable";

use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct UnderwritingUpdatedPayload {
    pub underwriting_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ProcessorExecutePayload {
    pub underwriting_processor_id: Uuid,
    pub execution_id: Option<Uuid>,
    #[serde(default)]
    pub duplicate: bool,
    pub application_form: Option<serde_json::Map<String, serde_json::Value>>,
    pub document_list: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ProcessorConsolidationPayload {
    pub underwriting_processor_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ExecutionActivatePayload {
    pub execution_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ExecutionDisablePayload {
    pub execution_id: Uuid,
}
