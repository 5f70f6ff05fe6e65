// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Secure-channel and transport-level messages.
//!
//! `Hello`/`Acknowledge`/`ErrorMessage` are connection-protocol bodies that
//! travel outside any secure channel; the OpenSecureChannel and
//! CloseSecureChannel pairs are regular services.

use crate::codec::{ua_struct, ByteString};
use crate::messages::{ua_enum, ua_service, MessageSecurityMode, RequestHeader, ResponseHeader};
use crate::status::StatusCode;
use crate::time::UaDateTime;

// =============================================================================
// Connection protocol bodies
// =============================================================================

ua_struct! {
    /// First message a client sends on a fresh TCP connection.
    pub struct Hello {
        /// Connection protocol version; 0 for this stack.
        pub protocol_version: u32,
        /// Largest chunk the client is willing to receive.
        pub receive_buffer_size: u32,
        /// Largest chunk the client will send.
        pub send_buffer_size: u32,
        /// Largest assembled message the client accepts (0 = no limit).
        pub max_message_size: u32,
        /// Largest chunk count per message the client accepts (0 = no limit).
        pub max_chunk_count: u32,
        /// The endpoint url the client is connecting to.
        pub endpoint_url: String,
    }
}

ua_struct! {
    /// The server's reply to [`Hello`], fixing the negotiated limits.
    pub struct Acknowledge {
        /// Connection protocol version the server selected.
        pub protocol_version: u32,
        /// Largest chunk the server is willing to receive.
        pub receive_buffer_size: u32,
        /// Largest chunk the server will send.
        pub send_buffer_size: u32,
        /// Largest assembled message the server accepts (0 = no limit).
        pub max_message_size: u32,
        /// Largest chunk count per message the server accepts (0 = no limit).
        pub max_chunk_count: u32,
    }
}

ua_struct! {
    /// A fatal connection-level error sent before closing the socket.
    pub struct ErrorMessage {
        /// The error status.
        pub error: StatusCode,
        /// Human-readable reason.
        pub reason: String,
    }
}

// =============================================================================
// OpenSecureChannel
// =============================================================================

ua_enum! {
    /// Whether an OpenSecureChannel issues a fresh token or renews one.
    pub enum SecurityTokenRequestType {
        /// Open a new channel.
        Issue = 0,
        /// Renew the token of an existing channel.
        Renew = 1,
    }
}

impl Default for SecurityTokenRequestType {
    fn default() -> Self {
        Self::Issue
    }
}

ua_struct! {
    /// Opens or renews a secure channel.
    pub struct OpenSecureChannelRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// Connection protocol version.
        pub client_protocol_version: u32,
        /// Issue or renew.
        pub request_type: SecurityTokenRequestType,
        /// Requested message protection.
        pub security_mode: MessageSecurityMode,
        /// Client nonce for key derivation (unused under policy None).
        pub client_nonce: ByteString,
        /// Requested token lifetime in milliseconds.
        pub requested_lifetime: u32,
    }
}

ua_struct! {
    /// The security token a server grants for a channel.
    pub struct ChannelSecurityToken {
        /// Server-assigned channel id.
        pub channel_id: u32,
        /// Token id; changes on every renewal.
        pub token_id: u32,
        /// When the token was created (server clock).
        pub created_at: UaDateTime,
        /// Granted lifetime in milliseconds.
        pub revised_lifetime: u32,
    }
}

ua_struct! {
    /// The server's answer to [`OpenSecureChannelRequest`].
    pub struct OpenSecureChannelResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// Connection protocol version.
        pub server_protocol_version: u32,
        /// The granted token.
        pub security_token: ChannelSecurityToken,
        /// Server nonce for key derivation.
        pub server_nonce: ByteString,
    }
}

ua_service!(OpenSecureChannelRequest => OpenSecureChannelResponse, 446, 449);

// =============================================================================
// CloseSecureChannel
// =============================================================================

ua_struct! {
    /// Gracefully closes a secure channel. The server does not respond.
    pub struct CloseSecureChannelRequest {
        /// Common request header.
        pub request_header: RequestHeader,
    }
}

ua_struct! {
    /// Nominal response type for channel close; never sent on the wire.
    pub struct CloseSecureChannelResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
    }
}

ua_service!(CloseSecureChannelRequest => CloseSecureChannelResponse, 452, 455);

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DecodeCursor, UaDecode, UaEncode};
    use crate::messages::{UaMessage, UaResponse};

    #[test]
    fn test_hello_round_trip() {
        let hello = Hello {
            protocol_version: 0,
            receive_buffer_size: 65_535,
            send_buffer_size: 65_535,
            max_message_size: 0,
            max_chunk_count: 0,
            endpoint_url: "opc.tcp://localhost:4840".to_string(),
        };
        let mut wire = Vec::new();
        hello.encode(&mut wire);
        let mut cur = DecodeCursor::new(&wire);
        assert_eq!(Hello::decode(&mut cur).unwrap(), hello);
    }

    #[test]
    fn test_open_channel_type_ids() {
        assert_eq!(OpenSecureChannelRequest::TYPE_ID, 446);
        assert_eq!(OpenSecureChannelResponse::TYPE_ID, 449);
    }

    #[test]
    fn test_open_channel_round_trip() {
        let request = OpenSecureChannelRequest {
            request_type: SecurityTokenRequestType::Renew,
            security_mode: MessageSecurityMode::None,
            requested_lifetime: 600_000,
            ..Default::default()
        };
        let mut wire = Vec::new();
        request.encode(&mut wire);
        let mut cur = DecodeCursor::new(&wire);
        assert_eq!(OpenSecureChannelRequest::decode(&mut cur).unwrap(), request);
    }

    #[test]
    fn test_synthetic_response() {
        let response =
            OpenSecureChannelResponse::from_status(StatusCode::BAD_SECURE_CHANNEL_CLOSED);
        assert_eq!(
            response.service_result(),
            StatusCode::BAD_SECURE_CHANNEL_CLOSED
        );
        assert_eq!(response.security_token.channel_id, 0);
    }
}
