use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("quote must contain at least one item")]
    EmptyQuote,
    #[error("invalid quantity {quantity} for service `{service_id}`")]
    InvalidQuantity { service_id: String, quantity: i64 },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Ways an accepted chat turn can fail, before they are given a transport
/// shape. Tool and persistence failures inside a turn never get here.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("model provider failure: {0}")]
    ModelProvider(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

/// What a caller of the HTTP surface is told. Details stay in logs, keyed by
/// the correlation id.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("bad gateway: {message}")]
    BadGateway { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::BadGateway { .. } => 502,
            Self::ServiceUnavailable { .. } => 503,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::BadGateway { .. } => {
                "The concierge is temporarily unavailable. Please try again in a moment."
            }
            Self::ServiceUnavailable { .. } => "The concierge is not configured to chat yet.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::BadGateway { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        match self {
            Self::ModelProvider(message) => InterfaceError::BadGateway { message, correlation_id },
            // Without a model key the service is up but cannot chat.
            Self::Configuration(message) => {
                InterfaceError::ServiceUnavailable { message, correlation_id }
            }
        }
    }
}
