use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessorError>;

/// The pipeline phase a failure belongs to, per the three-phase contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    PreExtraction,
    Extraction,
    PostExtraction,
    Unknown,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::PreExtraction => "pre-extraction",
            Phase::Extraction => "extraction",
            Phase::PostExtraction => "post-extraction",
            Phase::Unknown => "unknown",
        }
    }
}

/// Error kinds a processor pipeline can fail with. Variant identity, not
/// message text, drives phase attribution in `uw_core::pipeline::run`.
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("prevalidation failed: {0}")]
    Prevalidation(String),

    #[error("transformation failed: {0}")]
    Transformation(String),

    #[error("input validation failed: {0}")]
    InputValidation(String),

    #[error("factor extraction failed: {0}")]
    FactorExtraction(String),

    #[error("data transformation failed: {0}")]
    DataTransformation(String),

    #[error("api call to {api_name} failed with status {status_code}: {message}")]
    Api {
        api_name: String,
        status_code: u16,
        is_retryable: bool,
        message: String,
    },

    #[error("result validation failed: {0}")]
    ResultValidation(String),

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ProcessorError {
    /// Maps an error variant to the phase the pipeline should record for it.
    /// `Api`/`DataTransformation`/`FactorExtraction` all occur during
    /// `extract`, hence all map to `Extraction`.
    pub fn phase(&self) -> Phase {
        match self {
            ProcessorError::Prevalidation(_)
            | ProcessorError::Transformation(_)
            | ProcessorError::InputValidation(_) => Phase::PreExtraction,
            ProcessorError::FactorExtraction(_)
            | ProcessorError::DataTransformation(_)
            | ProcessorError::Api { .. } => Phase::Extraction,
            ProcessorError::ResultValidation(_) => Phase::PostExtraction,
            ProcessorError::Persistence(_) | ProcessorError::Configuration(_) => Phase::Unknown,
        }
    }
}

/// Error category for broker retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorCategory {
    /// Retry automatically (connection, timeout, network).
    Transient,
    /// Don't retry (invalid input, parse error).
    Permanent,
    /// Alert ops (disk full, OOM-adjacent failures).
    Infrastructure,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transient => "transient",
            ErrorCategory::Permanent => "permanent",
            ErrorCategory::Infrastructure => "infrastructure",
        }
    }

    /// Substring match against a fixed transient-word list, used by the
    /// broker's ack/nack policy.
    pub fn classify(message: &str) -> Self {
        const TRANSIENT_MARKERS: [&str; 5] = [
            "connection",
            "timeout",
            "network",
            "temporarily unavailable",
            "resource temporarily unavailable",
        ];
        let lower = message.to_lowercase();
        if TRANSIENT_MARKERS.iter().any(|m| lower.contains(m)) {
            ErrorCategory::Transient
        } else {
            ErrorCategory::Permanent
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
