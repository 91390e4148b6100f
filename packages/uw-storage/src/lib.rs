//! Repository contracts and Postgres implementation for the underwriting
//! processing engine.

pub mod config;
pub mod error;
pub mod pool;
pub mod repo;

pub use config::{BrokerConfig, DatabaseConfig, ExecutionConfig};
pub use error::{Result, StorageError};
pub use repo::postgres::{
    PostgresExecutionRepository, PostgresFactorRepository, PostgresProcessorRepository,
    PostgresUnderwritingRepository, PostgresWorkflowLogRepository,
};
pub use repo::{ExecutionRepository, FactorRepository, ProcessorRepository, UnderwritingRepository, WorkflowLogRepository};
