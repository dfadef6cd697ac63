//! Error types for the messaging client.

use thiserror::Error;

/// Messaging client error type.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// Message content missing or blank on send/reply.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    /// Send attempted with no bound user identity.
    #[error("no authenticated user is bound to the chat session")]
    NotAuthenticated,
    /// The state container received blank content.
    #[error("message is empty")]
    EmptyMessage,
    /// The remote API does not implement the requested endpoint (HTTP 404).
    ///
    /// Absorbed by the fallback transport; never surfaced above it.
    #[error("endpoint not found: {0}")]
    EndpointNotFound(String),
    /// The requested conversation does not exist in the active store.
    #[error("conversation not found: {0}")]
    NotFound(String),
    /// The persisted fallback database changed since it was loaded.
    #[error("fallback store revision conflict: loaded {loaded}, persisted {persisted}")]
    Conflict {
        /// Revision observed when the database was loaded.
        loaded: u64,
        /// Revision found in storage at save time.
        persisted: u64,
    },
    /// The remote API answered with a non-success status.
    #[error("remote API returned HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },
    /// The remote API answered `success: false`.
    #[error("remote API rejected the request: {0}")]
    Rejected(String),
    /// Network, timeout or decoding failure.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// URL parse error.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A blocking store task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl MessagingError {
    /// Whether this error means the remote endpoint is not implemented.
    #[must_use]
    pub const fn is_endpoint_not_found(&self) -> bool {
        matches!(self, Self::EndpointNotFound(_))
    }

    /// Whether this error is a genuine transport failure (network, server, auth).
    #[must_use]
    pub const fn is_transport_failure(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::Rejected(_) | Self::Request(_))
    }

    /// Whether this error was raised by input validation, before any I/O.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidPayload(_) | Self::NotAuthenticated | Self::EmptyMessage
        )
    }
}

/// Convenience result alias for messaging operations.
pub type MessagingResult<T> = Result<T, MessagingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_helpers() {
        assert!(MessagingError::EndpointNotFound("send_message".into()).is_endpoint_not_found());
        assert!(!MessagingError::NotFound("conv_x".into()).is_endpoint_not_found());

        let server = MessagingError::Http {
            status: 500,
            message: "boom".into(),
        };
        assert!(server.is_transport_failure());
        assert!(!server.is_endpoint_not_found());

        assert!(MessagingError::NotAuthenticated.is_validation());
        assert!(MessagingError::InvalidPayload("content".into()).is_validation());
        assert!(!MessagingError::NotFound("conv_x".into()).is_validation());
    }
}
