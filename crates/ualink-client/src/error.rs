// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client error types.
//!
//! Errors fall into three categories, mirroring how they are handled:
//!
//! ```text
//! ClientError
//! ├── Transport - socket-level faults; the channel is torn down
//! ├── Protocol  - malformed or unexpected wire data; the channel may be
//! │               compromised
//! └── Usage     - invalid arguments or calls in the wrong state; never
//!                 affect connection state
//! ```
//!
//! Service-level failures are *not* errors: they travel as a
//! [`StatusCode`] inside the response header, delivered verbatim to the
//! caller. Every error variant maps onto the status code that pending
//! requests or synthetic responses carry via [`ClientError::status_code`].

use std::io;
use std::time::Duration;

use thiserror::Error;
use ualink_types::{CodecError, StatusCode};

/// Convenience alias for results produced by the client.
pub type ClientResult<T> = Result<T, ClientError>;

// =============================================================================
// ClientError
// =============================================================================

/// The top-level error type for client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Socket-level faults.
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// Malformed or unexpected wire data.
    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    /// Invalid arguments or calls in the wrong state.
    #[error("{0}")]
    Usage(#[from] UsageError),
}

impl ClientError {
    /// The status code pending requests are failed with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Transport(e) => e.status_code(),
            Self::Protocol(e) => e.status_code(),
            Self::Usage(e) => e.status_code(),
        }
    }

    /// Returns `true` if the error invalidates the connection.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Protocol(e) => e.is_fatal(),
            Self::Usage(_) => false,
        }
    }
}

impl From<CodecError> for ClientError {
    fn from(error: CodecError) -> Self {
        Self::Protocol(ProtocolError::Decoding(error))
    }
}

// =============================================================================
// TransportError
// =============================================================================

/// Socket-level faults. Any of these tears the connection down.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint refused the connection.
    #[error("connection refused to '{endpoint}'")]
    Refused {
        /// Target endpoint.
        endpoint: String,
        /// Underlying error.
        #[source]
        source: Option<io::Error>,
    },

    /// Connecting or waiting timed out.
    #[error("timed out after {duration:?} while {operation}")]
    TimedOut {
        /// What was being waited for.
        operation: &'static str,
        /// How long was waited.
        duration: Duration,
    },

    /// The endpoint url could not be parsed.
    #[error("invalid endpoint url '{url}': {reason}")]
    InvalidEndpoint {
        /// The rejected url.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,

    /// An operation requires an open connection.
    #[error("not connected")]
    NotConnected,

    /// Any other I/O failure.
    #[error("i/o error while {operation}")]
    Io {
        /// What was being done.
        operation: &'static str,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    /// Creates a connection-refused error.
    pub fn refused(endpoint: impl Into<String>, source: Option<io::Error>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timed_out(operation: &'static str, duration: Duration) -> Self {
        Self::TimedOut {
            operation,
            duration,
        }
    }

    /// Creates an invalid-endpoint error.
    pub fn invalid_endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an I/O error.
    pub fn io(operation: &'static str, source: io::Error) -> Self {
        Self::Io { operation, source }
    }

    /// The status code this fault maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::TimedOut { .. } => StatusCode::BAD_TIMEOUT,
            Self::InvalidEndpoint { .. } => StatusCode::BAD_TCP_ENDPOINT_URL_INVALID,
            Self::NotConnected => StatusCode::BAD_SERVER_NOT_CONNECTED,
            Self::Closed => StatusCode::BAD_CONNECTION_CLOSED,
            Self::Refused { .. } | Self::Io { .. } => StatusCode::BAD_COMMUNICATION_ERROR,
        }
    }
}

// =============================================================================
// ProtocolError
// =============================================================================

/// Malformed or unexpected wire data.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A frame or body failed to decode.
    #[error("decoding failed: {0}")]
    Decoding(#[from] CodecError),

    /// A message of an unexpected kind arrived.
    #[error("unexpected message: expected {expected}, got {got}")]
    UnexpectedMessage {
        /// What was expected.
        expected: &'static str,
        /// What arrived.
        got: String,
    },

    /// The peer's sequence numbers are out of order.
    #[error("sequence number mismatch: expected {expected}, got {got}")]
    SequenceMismatch {
        /// Expected sequence number.
        expected: u32,
        /// Received sequence number.
        got: u32,
    },

    /// A message referenced the wrong secure channel.
    #[error("secure channel id mismatch: expected {expected}, got {got}")]
    ChannelIdMismatch {
        /// Our channel id.
        expected: u32,
        /// The id in the message.
        got: u32,
    },

    /// A message carried an unknown security token.
    #[error("unknown security token {token_id}")]
    TokenUnknown {
        /// The offending token id.
        token_id: u32,
    },

    /// A message exceeded the negotiated size limits.
    #[error("message of {size} bytes exceeds the limit of {limit}")]
    MessageTooLarge {
        /// Actual size.
        size: usize,
        /// Negotiated limit.
        limit: usize,
    },

    /// A message used more chunks than negotiated.
    #[error("message exceeded the chunk limit of {limit}")]
    ChunkLimitExceeded {
        /// Negotiated limit.
        limit: u32,
    },

    /// The peer sent a connection-level error message.
    #[error("peer reported {status}: {reason}")]
    PeerError {
        /// The status the peer reported.
        status: StatusCode,
        /// The peer's reason text.
        reason: String,
    },

    /// A lifecycle service failed.
    #[error("{operation} failed with {status}")]
    ServiceFailed {
        /// The failing operation.
        operation: &'static str,
        /// The status the server returned.
        status: StatusCode,
    },
}

impl ProtocolError {
    /// The status code this fault maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Decoding(_) => StatusCode::BAD_DECODING_ERROR,
            Self::UnexpectedMessage { .. } => StatusCode::BAD_UNKNOWN_RESPONSE,
            Self::SequenceMismatch { .. } => StatusCode::BAD_SEQUENCE_NUMBER_INVALID,
            Self::ChannelIdMismatch { .. } => StatusCode::BAD_SECURE_CHANNEL_ID_INVALID,
            Self::TokenUnknown { .. } => StatusCode::BAD_SECURE_CHANNEL_TOKEN_UNKNOWN,
            Self::MessageTooLarge { .. } => StatusCode::BAD_TCP_MESSAGE_TOO_LARGE,
            Self::ChunkLimitExceeded { .. } => StatusCode::BAD_ENCODING_LIMITS_EXCEEDED,
            Self::PeerError { status, .. } => *status,
            Self::ServiceFailed { status, .. } => *status,
        }
    }

    /// Returns `true` if the channel can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::ServiceFailed { .. })
    }
}

// =============================================================================
// UsageError
// =============================================================================

/// Invalid arguments or calls in the wrong state. These never affect
/// connection state.
#[derive(Debug, Error)]
pub enum UsageError {
    /// A repeated-callback interval below the minimum.
    #[error("interval {interval:?} is below the 5 ms minimum")]
    IntervalTooShort {
        /// The rejected interval.
        interval: Duration,
    },

    /// An unknown repeated-callback id.
    #[error("no repeated callback with id {id}")]
    UnknownCallback {
        /// The unknown id.
        id: u64,
    },

    /// The outstanding-request cap would be exceeded.
    #[error("too many outstanding requests ({outstanding} of {limit})")]
    TooManyRequests {
        /// Requests currently outstanding.
        outstanding: usize,
        /// The configured cap.
        limit: u32,
    },

    /// Sync service calls nested too deeply.
    #[error("service call nesting exceeded the limit of {limit}")]
    NestingLimit {
        /// The configured limit.
        limit: u8,
    },

    /// The operation is not valid in the current state.
    #[error("invalid state for {operation}: {state}")]
    InvalidState {
        /// The attempted operation.
        operation: &'static str,
        /// The state it was attempted in.
        state: String,
    },

    /// A configuration value was rejected.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Why the value was rejected.
        reason: String,
    },
}

impl UsageError {
    /// Creates an invalid-state error.
    pub fn invalid_state(operation: &'static str, state: impl ToString) -> Self {
        Self::InvalidState {
            operation,
            state: state.to_string(),
        }
    }

    /// Creates an invalid-configuration error.
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// The status code this fault maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::IntervalTooShort { .. } => StatusCode::BAD_INVALID_ARGUMENT,
            Self::UnknownCallback { .. } => StatusCode::BAD_INVALID_ARGUMENT,
            Self::TooManyRequests { .. } => StatusCode::BAD_TOO_MANY_OPERATIONS,
            Self::NestingLimit { .. } => StatusCode::BAD_INTERNAL_ERROR,
            Self::InvalidState { .. } => StatusCode::BAD_INVALID_STATE,
            Self::InvalidConfiguration { .. } => StatusCode::BAD_INVALID_ARGUMENT,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let error = ClientError::from(TransportError::Closed);
        assert_eq!(error.status_code(), StatusCode::BAD_CONNECTION_CLOSED);
        assert!(error.is_fatal());

        let error = ClientError::from(UsageError::IntervalTooShort {
            interval: Duration::from_millis(4),
        });
        assert_eq!(error.status_code(), StatusCode::BAD_INVALID_ARGUMENT);
        assert!(!error.is_fatal());

        let error = ClientError::from(UsageError::NestingLimit { limit: 4 });
        assert_eq!(error.status_code(), StatusCode::BAD_INTERNAL_ERROR);
    }

    #[test]
    fn test_service_failure_is_not_fatal() {
        let error = ProtocolError::ServiceFailed {
            operation: "CreateSession",
            status: StatusCode::BAD_IDENTITY_TOKEN_REJECTED,
        };
        assert!(!error.is_fatal());
        assert_eq!(
            error.status_code(),
            StatusCode::BAD_IDENTITY_TOKEN_REJECTED
        );
    }
}
