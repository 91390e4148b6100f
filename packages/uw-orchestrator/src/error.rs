use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("storage error: {0}")]
    Storage(#[from] uw_storage::StorageError),

    #[error("processor not registered: {0}")]
    ProcessorNotRegistered(String),

    #[error("underwriting not found: {0}")]
    UnderwritingNotFound(String),

    #[error("underwriting processor not found: {0}")]
    UnderwritingProcessorNotFound(String),

    #[error("execution not found: {0}")]
    ExecutionNotFound(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OrchestratorError {
    /// Substring classification for the broker's ack/nack policy, delegating
    /// to the shared category enum so both layers agree on wording.
    pub fn category(&self) -> uw_core::ErrorCategory {
        uw_core::ErrorCategory::classify(&self.to_string())
    }
}
