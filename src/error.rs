// Error handling module
// Defines the client error taxonomy and the transport failure record

use std::fmt;

use thiserror::Error;

use crate::http_client::ApiRequest;

/// Status code that marks a refresh-eligible failure
pub const UNAUTHORIZED: u16 = 401;

/// Failure raised by a transport
///
/// Carries the status code (absent for network-level errors) and the request
/// that produced it, so the pipeline can replay it.
#[derive(Debug, Clone)]
pub struct TransportFailure {
    pub status: Option<u16>,
    pub message: String,
    pub request: ApiRequest,
}

impl TransportFailure {
    pub fn new(status: Option<u16>, message: impl Into<String>, request: ApiRequest) -> Self {
        Self {
            status,
            message: message.into(),
            request,
        }
    }

    /// Whether the failure indicates an expired or invalid access credential
    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(UNAUTHORIZED)
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "{} {} returned {}: {}",
                self.request.method, self.request.path, status, self.message
            ),
            None => write!(
                f,
                "{} {} failed: {}",
                self.request.method, self.request.path, self.message
            ),
        }
    }
}

impl std::error::Error for TransportFailure {}

/// Errors surfaced by the catalog client
#[derive(Error, Debug)]
pub enum ApiError {
    /// Bad credentials at sign-in or profile fetch
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Refresh attempted without a refresh token
    #[error("No refresh token available")]
    NoRefreshToken,

    /// Refresh token rejected by the auth service
    #[error("Token refresh failed: {0}")]
    Refresh(String),

    /// Session was signed out or replaced while a refresh was in flight
    #[error("Session changed during refresh")]
    SessionChanged,

    /// Failure reported by the transport (network error or non-2xx status)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportFailure),

    /// Response body did not match the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// HTTP status attached to the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Transport(failure) => failure.status,
            _ => None,
        }
    }

    /// Whether this error is an unauthorized transport failure
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Transport(failure) if failure.is_unauthorized())
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ApiError>;
