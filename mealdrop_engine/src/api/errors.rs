use thiserror::Error;

use crate::{gateway::GatewayError, helpers::OtpError, traits::StorageError};

/// The error taxonomy every engine operation reports through. Each variant maps onto one stable
/// category the caller can branch on; the HTTP layer translates them to status codes.
#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    /// Malformed or out-of-range input. Nothing was mutated.
    #[error("Invalid request. {0}")]
    Validation(String),
    /// A valid identity attempted an operation its role or ownership does not permit.
    #[error("Not permitted. {0}")]
    Forbidden(String),
    /// The entity does not exist, or is deliberately masked from this caller.
    #[error("{0} could not be found")]
    NotFound(String),
    /// An illegal state transition, including stale-state races.
    #[error("Conflicting order state. {0}")]
    Conflict(String),
    /// OTP verification failures; a conflict with finer structure for the caller.
    #[error(transparent)]
    Otp(#[from] OtpError),
    /// The supplied payment signature failed verification. The order was not mutated.
    #[error("The payment signature was rejected")]
    SignatureRejected,
    /// No gateway credentials are configured. Expected when running COD-only.
    #[error("The payment gateway is not available")]
    GatewayUnavailable,
    /// The notification collaborator could not deliver the OTP.
    #[error("Could not dispatch the delivery OTP. {0}")]
    DispatchFailed(String),
    /// Storage-layer failure, logged with context and surfaced generically.
    #[error("A backend error occurred. {0}")]
    Database(String),
}

impl From<GatewayError> for OrderFlowError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Unavailable => OrderFlowError::GatewayUnavailable,
            GatewayError::InvalidSignature => OrderFlowError::SignatureRejected,
            GatewayError::MalformedSignature(m) => OrderFlowError::Validation(m),
            GatewayError::InvalidAmount(m) => OrderFlowError::Validation(m),
        }
    }
}

impl From<StorageError> for OrderFlowError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(what) => OrderFlowError::NotFound(what),
            StorageError::StaleTransition(oid) => {
                OrderFlowError::Conflict(format!("order {oid} changed state concurrently"))
            },
            StorageError::Database(m) => OrderFlowError::Database(m),
        }
    }
}
