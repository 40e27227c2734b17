use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ProcessorError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid charge request: {0}")]
    InvalidInput(String),
    #[error("The processor rejected our credentials. Error {status}.")]
    Unauthorized { status: u16 },
    #[error("The processor is unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("The processor did not return a PIX code for payment {0}")]
    MissingQrCode(String),
}

impl ProcessorError {
    /// Transient errors are worth retrying. Everything else will fail the same way on the next attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable(_) | Self::JsonError(_))
    }
}
