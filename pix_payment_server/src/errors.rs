use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use pix_payment_engine::{ForwardError, PaymentFlowError, SimulationError, StoreError};
use pix_processor::ProcessorError;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Invalid request. {0}")]
    InvalidInput(String),
    #[error("The payment processor rejected the server's credentials. Check the access token and environment.")]
    Unauthorized,
    #[error("Forbidden. {0}")]
    Forbidden(String),
    #[error("The data was not found. {0}")]
    NotFound(String),
    #[error("{0} is not configured on the server")]
    ConfigurationMissing(String),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("Upstream error. Status {status}")]
    UpstreamRejected { status: u16, detail: String },
    #[error("Payment processor error")]
    ProcessorError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
}

impl ServerError {
    fn body(&self) -> Value {
        match self {
            Self::UpstreamRejected { status, detail } => {
                json!({ "error": self.to_string(), "status": status, "detail": detail })
            },
            Self::ProcessorError(detail) => json!({ "error": self.to_string(), "detail": detail }),
            _ => json!({ "error": self.to_string() }),
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::ConfigurationMissing(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UpstreamRejected { .. } => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ProcessorError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).insert_header(ContentType::json()).body(self.body().to_string())
    }
}

impl From<ProcessorError> for ServerError {
    fn from(e: ProcessorError) -> Self {
        match e {
            ProcessorError::InvalidInput(s) => Self::InvalidInput(s),
            ProcessorError::Unauthorized { .. } => Self::Unauthorized,
            ProcessorError::QueryError { status: 400, message } => Self::InvalidInput(message),
            e => Self::ProcessorError(e.to_string()),
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        Self::BackendError(e.to_string())
    }
}

impl From<PaymentFlowError> for ServerError {
    fn from(e: PaymentFlowError) -> Self {
        match e {
            PaymentFlowError::InvalidInput(s) => Self::InvalidInput(s),
            PaymentFlowError::Processor(e) => e.into(),
            PaymentFlowError::Store(e) => e.into(),
        }
    }
}

impl From<SimulationError> for ServerError {
    fn from(e: SimulationError) -> Self {
        match e {
            SimulationError::InvalidId(_) => Self::InvalidInput(e.to_string()),
            SimulationError::InvalidInput(_) => Self::InvalidInput(e.to_string()),
            SimulationError::NotFound(_) => Self::NotFound(e.to_string()),
        }
    }
}

impl From<ForwardError> for ServerError {
    fn from(e: ForwardError) -> Self {
        match e {
            ForwardError::NotConfigured => Self::ConfigurationMissing("The print webhook".into()),
            ForwardError::Rejected { status, body } => Self::UpstreamRejected { status, detail: body },
            ForwardError::Unreachable(s) => Self::UpstreamRejected { status: 502, detail: s },
            ForwardError::Initialization(s) => Self::InitializeError(s),
        }
    }
}
