use pix_processor::ProcessorError;
use thiserror::Error;

use crate::db::traits::StoreError;

#[derive(Debug, Clone, Error)]
pub enum PaymentFlowError {
    #[error("Invalid payment request: {0}")]
    InvalidInput(String),
    #[error("{0}")]
    Processor(ProcessorError),
    #[error("{0}")]
    Store(#[from] StoreError),
}

impl From<ProcessorError> for PaymentFlowError {
    fn from(e: ProcessorError) -> Self {
        match e {
            ProcessorError::InvalidInput(s) => Self::InvalidInput(s),
            e => Self::Processor(e),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum SimulationError {
    #[error("'{0}' is not a simulated payment id")]
    InvalidId(String),
    #[error("Simulated payment {0} does not exist")]
    NotFound(String),
    #[error("Invalid simulated payment: {0}")]
    InvalidInput(String),
}
