//! Entities shared by storage, orchestration, and processor crates.
//!
//! These are plain data types; persistence mapping lives in `uw-storage`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(u: Uuid) -> Self {
                Self(u)
            }
        }
    };
}

uuid_id!(OrganizationId);
uuid_id!(UnderwritingId);
uuid_id!(OrganizationProcessorId);
uuid_id!(UnderwritingProcessorId);
uuid_id!(ExecutionId);
uuid_id!(FactorId);
uuid_id!(OwnerId);
uuid_id!(DocumentId);

/// Which category of payload a processor reads. Drives `format_payload_list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorKind {
    Application,
    Stipulation,
    Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnderwritingStatus {
    Created,
    Processing,
    Passed,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantAddress {
    pub addr_1: String,
    pub addr_2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub id: OwnerId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub ssn: Option<String>,
    pub ownership_percent: Option<f64>,
    pub primary_owner: bool,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub underwriting_id: UnderwritingId,
    pub stipulation_type: String,
    pub current_revision_id: Option<Uuid>,
    pub status: String,
}

/// Flat merchant fields plus nested owners/addresses/documents, the single
/// aggregate filtration reads from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Underwriting {
    pub id: UnderwritingId,
    pub organization_id: OrganizationId,
    pub serial_number: String,
    pub status: UnderwritingStatus,
    pub merchant_name: Option<String>,
    pub merchant_ein: Option<String>,
    pub merchant_industry: Option<String>,
    pub merchant_email: Option<String>,
    pub merchant_phone: Option<String>,
    pub merchant_website: Option<String>,
    pub merchant_entity_type: Option<String>,
    pub merchant_incorporation_date: Option<String>,
    pub merchant_state_of_incorporation: Option<String>,
    pub merchant_address: Option<MerchantAddress>,
    pub owners: Vec<Owner>,
    pub documents: Vec<Document>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A tenant's subscription to a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationProcessor {
    pub id: OrganizationProcessorId,
    pub organization_id: OrganizationId,
    pub processor: String,
    pub name: String,
    pub auto: bool,
    pub status: SubscriptionStatus,
    pub config: serde_json::Map<String, serde_json::Value>,
    pub price_cents: Option<i64>,
}

/// The binding of a subscription to one underwriting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnderwritingProcessor {
    pub id: UnderwritingProcessorId,
    pub organization_id: OrganizationId,
    pub underwriting_id: UnderwritingId,
    pub organization_processor_id: OrganizationProcessorId,
    pub processor: String,
    pub name: String,
    pub auto: bool,
    pub enabled: bool,
    pub config_override: serde_json::Map<String, serde_json::Value>,
    /// Ordered set of execution ids presently authoritative for this processor
    /// instance on this case.
    pub current_executions_list: Vec<ExecutionId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub organization_id: OrganizationId,
    pub underwriting_id: UnderwritingId,
    pub underwriting_processor_id: UnderwritingProcessorId,
    pub processor: String,
    pub status: ExecutionStatus,
    pub enabled: bool,
    pub payload: serde_json::Value,
    pub payload_hash: String,
    pub factors_delta: Option<serde_json::Value>,
    pub run_cost_cents: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_code: Option<String>,
    pub failed_reason: Option<String>,
    pub updated_execution_id: Option<ExecutionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Execution {
    pub fn is_runnable(&self) -> bool {
        matches!(self.status, ExecutionStatus::Pending | ExecutionStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorSource {
    Processor,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorStatus {
    Active,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Factor {
    pub id: FactorId,
    pub organization_id: OrganizationId,
    pub underwriting_id: UnderwritingId,
    pub underwriting_processor_id: UnderwritingProcessorId,
    pub execution_id: ExecutionId,
    pub factor_key: String,
    pub value: serde_json::Value,
    pub unit: Option<String>,
    pub source: FactorSource,
    pub status: FactorStatus,
    pub factor_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowLogEntry {
    pub id: Uuid,
    pub underwriting_id: UnderwritingId,
    pub workflow_name: String,
    pub stage: String,
    pub payload: Option<serde_json::Value>,
    pub input: Option<serde_json::Value>,
    pub payload_hash: Option<String>,
    pub output: Option<serde_json::Value>,
    pub status: String,
    pub error_message: Option<String>,
    pub execution_time_ms: Option<i64>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// A flat merge of `default_config <- organization_processor.config <-
/// underwriting_processor.config_override`, right-wins, shallow-by-key.
pub fn resolve_config(
    default_config: &HashMap<String, serde_json::Value>,
    organization_config: &serde_json::Map<String, serde_json::Value>,
    instance_override: &serde_json::Map<String, serde_json::Value>,
) -> serde_json::Map<String, serde_json::Value> {
    let mut merged: serde_json::Map<String, serde_json::Value> =
        default_config.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    for (k, v) in organization_config {
        merged.insert(k.clone(), v.clone());
    }
    for (k, v) in instance_override {
        merged.insert(k.clone(), v.clone());
    }
    merged
}
