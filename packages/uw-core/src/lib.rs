//! Domain model, processor abstraction, hashing, and payload formatting for
//! the underwriting processing engine.

pub mod domain;
pub mod error;
pub mod hashing;
pub mod payload;
pub mod processor;
pub mod registry;

pub use domain::*;
pub use error::{ErrorCategory, Phase, ProcessorError, Result};
pub use payload::{build_manual_application_payload, build_manual_document_payloads, format_payload_list, Triggers};
pub use processor::{ExecutionContext, Eligibility, PipelineResult, PipelineStatus, Processor};
pub use registry::{ProcessorConstructor, Registry};
