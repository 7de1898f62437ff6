use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error taxonomy for the inbound pipeline.
///
/// Classification drives the acknowledgment and resilience layers:
/// validation-class errors are terminal and never retried, transient errors
/// are retried with backoff and tracked by circuit breakers, and terminal
/// errors are captured in the dead-letter stream.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Required mapping rule unmatched for target field: {0}")]
    RequiredRuleUnmatched(String),

    #[error("Interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("Interface is inactive: {0}")]
    InterfaceInactive(String),

    #[error("Stored payload not found: {0}")]
    PayloadNotFound(String),

    #[error("Malformed XML document: {0}")]
    XmlProcessing(String),

    #[error("Envelope already routed to lane: {0}")]
    AlreadyRouted(String),

    #[error("Accumulator at capacity")]
    AccumulatorFull,

    #[error("Circuit open for category: {0}")]
    CircuitOpen(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Terminal processing failure: {0}")]
    Terminal(String),

    #[error("Repository error: {0}")]
    Repository(#[from] anyhow::Error),
}

impl From<crate::xml::XmlError> for PipelineError {
    fn from(error: crate::xml::XmlError) -> Self {
        PipelineError::XmlProcessing(error.to_string())
    }
}

impl PipelineError {
    /// Errors caused by the document or its configuration. Retrying cannot
    /// succeed and they never count toward circuit breaker failure rates.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PipelineError::Validation(_)
                | PipelineError::RequiredRuleUnmatched(_)
                | PipelineError::InterfaceNotFound(_)
                | PipelineError::InterfaceInactive(_)
                | PipelineError::PayloadNotFound(_)
                | PipelineError::XmlProcessing(_)
                | PipelineError::AlreadyRouted(_)
        )
    }

    /// Stable label used in dead-letter headers and structured logs.
    pub fn kind(&self) -> &'static str {
        if self.is_validation() {
            return "validation";
        }
        match self {
            PipelineError::CircuitOpen(_) => "circuit-open",
            PipelineError::Terminal(_) => "terminal",
            _ => "transient",
        }
    }

    /// Errors expected to clear on their own (I/O timeouts, transient data
    /// access). Eligible for backoff retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PipelineError::Transient(_)
                | PipelineError::Repository(_)
                | PipelineError::AccumulatorFull
        )
    }
}
