//! Error types for calls against the ledger service.

use thiserror::Error;

/// Coarse classification of a failed call, as seen by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The transport could not obtain or keep a connection
    /// (refused, reset, pool saturated).
    ConnectionExhausted,
    
    /// Anything else: non-2xx status, timeout, malformed body.
    Other,
}

/// Errors returned by a [`WalletService`](crate::WalletService) call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Connection could not be established or was torn down mid-request
    #[error("Connection exhausted: {0}")]
    ConnectionExhausted(String),
    
    /// Request did not complete in time
    #[error("Timeout after {0}ms")]
    Timeout(u64),
    
    /// Service answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    
    /// Response body could not be decoded
    #[error("Malformed response: {0}")]
    Malformed(String),
    
    /// Request failed for another transport reason
    #[error("Request error: {0}")]
    Request(String),
    
    /// Operation rejected by an injected fault (simulation only)
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    /// Creates a connection-exhaustion error.
    pub fn exhausted(msg: impl Into<String>) -> Self {
        Self::ConnectionExhausted(msg.into())
    }
    
    /// Creates a malformed-response error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
    
    /// Creates an unavailable error.
    pub fn unavailable(msg: impl std::fmt::Display) -> Self {
        Self::Unavailable(msg.to_string())
    }
    
    /// Returns the retry classification of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ConnectionExhausted(_) => FailureKind::ConnectionExhausted,
            _ => FailureKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_only_connection_errors_are_exhaustion() {
        assert_eq!(ServiceError::exhausted("reset").kind(), FailureKind::ConnectionExhausted);
        assert_eq!(ServiceError::Timeout(30_000).kind(), FailureKind::Other);
        assert_eq!(
            ServiceError::Status { status: 503, body: String::new() }.kind(),
            FailureKind::Other
        );
        assert_eq!(ServiceError::malformed("no id").kind(), FailureKind::Other);
        assert_eq!(ServiceError::unavailable("injected").kind(), FailureKind::Other);
    }
    
    #[test]
    fn test_status_display() {
        let err = ServiceError::Status { status: 409, body: "conflict".into() };
        assert_eq!(err.to_string(), "HTTP 409: conflict");
    }
}
