//! crates/marketplace_core/src/error.rs
//!
//! The error taxonomy returned by the domain services. The HTTP layer only needs
//! `ServiceError::kind()` to choose a status code.

use crate::domain::InvalidTransition;
use crate::ports::PortError;

/// Coarse classification of a failure, one per client-visible status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    Unauthenticated,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
    Timeout,
}

impl ErrorKind {
    /// The machine code placed in the `error` field of a response body.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
            ErrorKind::Timeout => "timeout",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Authentication required")]
    Unauthenticated,

    /// Wrong password and unknown email are deliberately the same error.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Session expired or revoked")]
    SessionNotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Email already registered")]
    EmailExists,

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    /// A row references another row that the store no longer has.
    #[error("Store inconsistent: {0}")]
    StoreInconsistent(String),

    #[error("Request deadline exceeded")]
    Timeout,

    #[error(transparent)]
    Port(#[from] PortError),

    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ServiceError::Unauthenticated
            | ServiceError::InvalidCredentials
            | ServiceError::InvalidToken
            | ServiceError::SessionNotFound => ErrorKind::Unauthenticated,
            ServiceError::Forbidden => ErrorKind::Forbidden,
            ServiceError::NotFound(_) | ServiceError::Port(PortError::NotFound(_)) => {
                ErrorKind::NotFound
            }
            ServiceError::EmailExists
            | ServiceError::InvalidTransition(_)
            | ServiceError::Port(PortError::Conflict(_)) => ErrorKind::Conflict,
            ServiceError::StoreInconsistent(_)
            | ServiceError::Internal(_)
            | ServiceError::Port(PortError::Unexpected(_)) => ErrorKind::Internal,
            ServiceError::Timeout => ErrorKind::Timeout,
        }
    }

    /// True for the store's "no such row" outcome.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
