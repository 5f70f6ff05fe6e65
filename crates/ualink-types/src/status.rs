// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA status codes.
//!
//! A [`StatusCode`] is a 32-bit value whose top two bits encode the severity
//! (`00` good, `01` uncertain, `10` bad). Every service response carries one
//! in its header, and the client core manufactures them for synthetic
//! failures (timeout, shutdown, channel loss).

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// StatusCode
// =============================================================================

/// A 32-bit OPC UA status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub u32);

macro_rules! status_codes {
    ( $( $(#[$meta:meta])* $konst:ident = $value:expr, $name:literal; )* ) => {
        impl StatusCode {
            $(
                $(#[$meta])*
                pub const $konst: StatusCode = StatusCode($value);
            )*

            /// Returns the symbolic name, or `"Unknown"` for unlisted codes.
            pub const fn name(&self) -> &'static str {
                match self.0 {
                    $( $value => $name, )*
                    _ => "Unknown",
                }
            }
        }
    };
}

status_codes! {
    /// The operation succeeded.
    GOOD = 0x0000_0000, "Good";
    /// An unexpected error occurred.
    BAD_UNEXPECTED_ERROR = 0x8001_0000, "BadUnexpectedError";
    /// An internal error occurred as a result of a programming or configuration error.
    BAD_INTERNAL_ERROR = 0x8002_0000, "BadInternalError";
    /// Not enough memory to complete the operation.
    BAD_OUT_OF_MEMORY = 0x8003_0000, "BadOutOfMemory";
    /// An operating system resource is not available.
    BAD_RESOURCE_UNAVAILABLE = 0x8004_0000, "BadResourceUnavailable";
    /// A low level communication error occurred.
    BAD_COMMUNICATION_ERROR = 0x8005_0000, "BadCommunicationError";
    /// Encoding halted because of invalid data in the objects being serialized.
    BAD_ENCODING_ERROR = 0x8006_0000, "BadEncodingError";
    /// Decoding halted because of invalid data in the stream.
    BAD_DECODING_ERROR = 0x8007_0000, "BadDecodingError";
    /// The message encoding/decoding limits imposed by the stack have been exceeded.
    BAD_ENCODING_LIMITS_EXCEEDED = 0x8008_0000, "BadEncodingLimitsExceeded";
    /// An unrecognized response was received from the server.
    BAD_UNKNOWN_RESPONSE = 0x8009_0000, "BadUnknownResponse";
    /// The operation timed out.
    BAD_TIMEOUT = 0x800A_0000, "BadTimeout";
    /// The server does not support the requested service.
    BAD_SERVICE_UNSUPPORTED = 0x800B_0000, "BadServiceUnsupported";
    /// The operation was cancelled because the application is shutting down.
    BAD_SHUTDOWN = 0x800C_0000, "BadShutdown";
    /// The operation could not complete because the client is not connected to the server.
    BAD_SERVER_NOT_CONNECTED = 0x800D_0000, "BadServerNotConnected";
    /// The server has stopped and cannot process any requests.
    BAD_SERVER_HALTED = 0x800E_0000, "BadServerHalted";
    /// No processing could be done because there was nothing to do.
    BAD_NOTHING_TO_DO = 0x800F_0000, "BadNothingToDo";
    /// The request could not be processed because it specified too many operations.
    BAD_TOO_MANY_OPERATIONS = 0x8010_0000, "BadTooManyOperations";
    /// An error occurred verifying security.
    BAD_SECURITY_CHECKS_FAILED = 0x8013_0000, "BadSecurityChecksFailed";
    /// User does not have permission to perform the requested operation.
    BAD_USER_ACCESS_DENIED = 0x801F_0000, "BadUserAccessDenied";
    /// The user identity token is not valid.
    BAD_IDENTITY_TOKEN_INVALID = 0x8020_0000, "BadIdentityTokenInvalid";
    /// The user identity token is valid but the server has rejected it.
    BAD_IDENTITY_TOKEN_REJECTED = 0x8021_0000, "BadIdentityTokenRejected";
    /// The specified secure channel is no longer valid.
    BAD_SECURE_CHANNEL_ID_INVALID = 0x8022_0000, "BadSecureChannelIdInvalid";
    /// The nonce does appear to be not a random value or it is not the correct length.
    BAD_NONCE_INVALID = 0x8024_0000, "BadNonceInvalid";
    /// The session id is not valid.
    BAD_SESSION_ID_INVALID = 0x8025_0000, "BadSessionIdInvalid";
    /// The session was closed by the client.
    BAD_SESSION_CLOSED = 0x8026_0000, "BadSessionClosed";
    /// The session cannot be used because ActivateSession has not been called.
    BAD_SESSION_NOT_ACTIVATED = 0x8027_0000, "BadSessionNotActivated";
    /// The subscription id is not valid.
    BAD_SUBSCRIPTION_ID_INVALID = 0x8028_0000, "BadSubscriptionIdInvalid";
    /// The header for the request is missing or invalid.
    BAD_REQUEST_HEADER_INVALID = 0x802A_0000, "BadRequestHeaderInvalid";
    /// The request was cancelled by the client.
    BAD_REQUEST_CANCELLED_BY_CLIENT = 0x802C_0000, "BadRequestCancelledByClient";
    /// The attribute is not supported for the specified node.
    BAD_ATTRIBUTE_ID_INVALID = 0x8035_0000, "BadAttributeIdInvalid";
    /// The node id refers to a node that does not exist in the server address space.
    BAD_NODE_ID_UNKNOWN = 0x8034_0000, "BadNodeIdUnknown";
    /// There are too many publish requests queued for the session.
    BAD_TOO_MANY_PUBLISH_REQUESTS = 0x8078_0000, "BadTooManyPublishRequests";
    /// There is no subscription available for this session.
    BAD_NO_SUBSCRIPTION = 0x8079_0000, "BadNoSubscription";
    /// The sequence number is unknown to the server.
    BAD_SEQUENCE_NUMBER_UNKNOWN = 0x807A_0000, "BadSequenceNumberUnknown";
    /// The type of the message specified in the header is invalid.
    BAD_TCP_MESSAGE_TYPE_INVALID = 0x807E_0000, "BadTcpMessageTypeInvalid";
    /// The secure channel id is unknown to the server.
    BAD_TCP_SECURE_CHANNEL_UNKNOWN = 0x807F_0000, "BadTcpSecureChannelUnknown";
    /// The size of the message specified in the header is too large.
    BAD_TCP_MESSAGE_TOO_LARGE = 0x8080_0000, "BadTcpMessageTooLarge";
    /// The server does not recognize the endpoint url specified.
    BAD_TCP_ENDPOINT_URL_INVALID = 0x8083_0000, "BadTcpEndpointUrlInvalid";
    /// The request could not be sent because of a network interruption.
    BAD_REQUEST_INTERRUPTED = 0x8084_0000, "BadRequestInterrupted";
    /// Timeout occurred while processing the request.
    BAD_REQUEST_TIMEOUT = 0x8085_0000, "BadRequestTimeout";
    /// The secure channel has been closed.
    BAD_SECURE_CHANNEL_CLOSED = 0x8086_0000, "BadSecureChannelClosed";
    /// The token has expired or is not recognized.
    BAD_SECURE_CHANNEL_TOKEN_UNKNOWN = 0x8087_0000, "BadSecureChannelTokenUnknown";
    /// The sequence number is not valid.
    BAD_SEQUENCE_NUMBER_INVALID = 0x8088_0000, "BadSequenceNumberInvalid";
    /// One or more arguments are invalid.
    BAD_INVALID_ARGUMENT = 0x80AB_0000, "BadInvalidArgument";
    /// The network connection has been closed.
    BAD_CONNECTION_CLOSED = 0x80AE_0000, "BadConnectionClosed";
    /// The operation cannot be completed because the object is closed, uninitialized or in some other invalid state.
    BAD_INVALID_STATE = 0x80AF_0000, "BadInvalidState";
    /// The request message size exceeds limits set by the server.
    BAD_REQUEST_TOO_LARGE = 0x80B8_0000, "BadRequestTooLarge";
    /// The response message size exceeds limits set by the client.
    BAD_RESPONSE_TOO_LARGE = 0x80B9_0000, "BadResponseTooLarge";
}

impl StatusCode {
    /// Returns `true` if the severity is good.
    #[inline]
    pub const fn is_good(&self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    /// Returns `true` if the severity is uncertain.
    #[inline]
    pub const fn is_uncertain(&self) -> bool {
        self.0 & 0xC000_0000 == 0x4000_0000
    }

    /// Returns `true` if the severity is bad.
    #[inline]
    pub const fn is_bad(&self) -> bool {
        self.0 & 0x8000_0000 != 0
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X} ({})", self.0, self.name())
    }
}

impl From<u32> for StatusCode {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<StatusCode> for u32 {
    fn from(value: StatusCode) -> Self {
        value.0
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity() {
        assert!(StatusCode::GOOD.is_good());
        assert!(!StatusCode::GOOD.is_bad());
        assert!(StatusCode::BAD_TIMEOUT.is_bad());
        assert!(!StatusCode::BAD_TIMEOUT.is_good());
        assert!(StatusCode(0x4000_0000).is_uncertain());
    }

    #[test]
    fn test_names() {
        assert_eq!(StatusCode::GOOD.name(), "Good");
        assert_eq!(StatusCode::BAD_SHUTDOWN.name(), "BadShutdown");
        assert_eq!(StatusCode::BAD_SECURE_CHANNEL_CLOSED.name(), "BadSecureChannelClosed");
        assert_eq!(StatusCode(0xDEAD_BEEF).name(), "Unknown");
    }

    #[test]
    fn test_display() {
        assert_eq!(
            StatusCode::BAD_TIMEOUT.to_string(),
            "0x800A0000 (BadTimeout)"
        );
    }
}
