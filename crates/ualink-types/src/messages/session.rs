// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session service set: CreateSession, ActivateSession, CloseSession, and
//! the identity tokens carried inside ActivateSession.

use crate::codec::{ua_struct, ByteString};
use crate::messages::{
    ua_service, ApplicationDescription, EndpointDescription, RequestHeader, ResponseHeader,
    SignatureData, SignedSoftwareCertificate, UaMessage,
};
use crate::node_id::NodeId;
use crate::status::StatusCode;
use crate::variant::{DiagnosticInfo, ExtensionObject};

// =============================================================================
// CreateSession
// =============================================================================

ua_struct! {
    /// Creates a session on top of an open secure channel.
    pub struct CreateSessionRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// Description of this client application.
        pub client_description: ApplicationDescription,
        /// URI of the server the client expects to reach.
        pub server_uri: String,
        /// The endpoint url used for the underlying channel.
        pub endpoint_url: String,
        /// Human-readable session name.
        pub session_name: String,
        /// Client nonce; at least 32 bytes.
        pub client_nonce: ByteString,
        /// DER client certificate (empty without security).
        pub client_certificate: ByteString,
        /// Requested session lifetime in milliseconds.
        pub requested_session_timeout: f64,
        /// Largest response the client accepts (0 = no limit).
        pub max_response_message_size: u32,
    }
}

ua_struct! {
    /// The server's answer to [`CreateSessionRequest`].
    pub struct CreateSessionResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// Server-assigned session id.
        pub session_id: NodeId,
        /// Token authenticating all requests within the session.
        pub authentication_token: NodeId,
        /// Granted session lifetime in milliseconds.
        pub revised_session_timeout: f64,
        /// Server nonce to sign in ActivateSession.
        pub server_nonce: ByteString,
        /// DER server certificate.
        pub server_certificate: ByteString,
        /// Endpoints of the server, for policy selection.
        pub server_endpoints: Vec<EndpointDescription>,
        /// Obsolete; always empty.
        pub server_software_certificates: Vec<SignedSoftwareCertificate>,
        /// Server's signature over client certificate and nonce.
        pub server_signature: SignatureData,
        /// Largest request the server accepts (0 = no limit).
        pub max_request_message_size: u32,
    }
}

ua_service!(CreateSessionRequest => CreateSessionResponse, 461, 464);

// =============================================================================
// ActivateSession
// =============================================================================

ua_struct! {
    /// Activates a created session with a user identity.
    pub struct ActivateSessionRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// Client's signature over server certificate and nonce.
        pub client_signature: SignatureData,
        /// Obsolete; always empty.
        pub client_software_certificates: Vec<SignedSoftwareCertificate>,
        /// Preferred locales, most preferred first.
        pub locale_ids: Vec<String>,
        /// The identity token, wrapped as an extension object.
        pub user_identity_token: ExtensionObject,
        /// Signature over the identity token, when required.
        pub user_token_signature: SignatureData,
    }
}

ua_struct! {
    /// The server's answer to [`ActivateSessionRequest`].
    pub struct ActivateSessionResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// Fresh server nonce for the next activation.
        pub server_nonce: ByteString,
        /// Per-certificate validation results.
        pub results: Vec<StatusCode>,
        /// Per-certificate diagnostics.
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_service!(ActivateSessionRequest => ActivateSessionResponse, 467, 470);

// =============================================================================
// CloseSession
// =============================================================================

ua_struct! {
    /// Closes a session.
    pub struct CloseSessionRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// Also delete the session's subscriptions.
        pub delete_subscriptions: bool,
    }
}

ua_struct! {
    /// The server's answer to [`CloseSessionRequest`].
    pub struct CloseSessionResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
    }
}

ua_service!(CloseSessionRequest => CloseSessionResponse, 473, 476);

// =============================================================================
// Identity tokens
// =============================================================================

ua_struct! {
    /// Identity token for anonymous access.
    pub struct AnonymousIdentityToken {
        /// Policy id selected from the endpoint's token policies.
        pub policy_id: String,
    }
}

impl UaMessage for AnonymousIdentityToken {
    const TYPE_ID: u32 = 321;
}

ua_struct! {
    /// Identity token carrying a username and password.
    pub struct UserNameIdentityToken {
        /// Policy id selected from the endpoint's token policies.
        pub policy_id: String,
        /// The user name.
        pub user_name: String,
        /// The password, encrypted per the token policy (plaintext under
        /// policy None).
        pub password: ByteString,
        /// URI of the password encryption algorithm; empty for none.
        pub encryption_algorithm: String,
    }
}

impl UaMessage for UserNameIdentityToken {
    const TYPE_ID: u32 = 324;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DecodeCursor, UaDecode, UaEncode};

    #[test]
    fn test_create_session_round_trip() {
        let request = CreateSessionRequest {
            endpoint_url: "opc.tcp://localhost:4840".to_string(),
            session_name: "ualink".to_string(),
            client_nonce: ByteString::new(vec![7u8; 32]),
            requested_session_timeout: 1_200_000.0,
            ..Default::default()
        };
        let mut wire = Vec::new();
        request.encode(&mut wire);
        let mut cur = DecodeCursor::new(&wire);
        assert_eq!(CreateSessionRequest::decode(&mut cur).unwrap(), request);
        assert!(cur.is_empty());
    }

    #[test]
    fn test_identity_token_wrapping() {
        let token = UserNameIdentityToken {
            policy_id: "username".to_string(),
            user_name: "operator".to_string(),
            password: ByteString::new(b"secret".to_vec()),
            encryption_algorithm: String::new(),
        };
        let wrapped = ExtensionObject::from_message(&token);
        assert_eq!(wrapped.type_id, NodeId::numeric(0, 324));
        let unwrapped: UserNameIdentityToken = wrapped.decode_as().unwrap();
        assert_eq!(unwrapped, token);
    }

    #[test]
    fn test_wrong_token_type_rejected() {
        let token = AnonymousIdentityToken {
            policy_id: "anonymous".to_string(),
        };
        let wrapped = ExtensionObject::from_message(&token);
        assert!(wrapped.decode_as::<UserNameIdentityToken>().is_err());
    }
}
