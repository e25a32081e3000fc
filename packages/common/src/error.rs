use thiserror::Error;

/// A business-rule violation raised by an event processor.
///
/// Processing errors are retryable up to the record's max attempts, after
/// which the event is quarantined. They never crash the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ProcessingError(pub String);

impl ProcessingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProcessingError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}
