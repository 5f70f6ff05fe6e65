// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Service request and response messages.
//!
//! Every service pair is linked through the [`UaRequest`]/[`UaResponse`]
//! traits so that the client core can frame, dispatch and decode all of them
//! through one generic path. The `TYPE_ID` constants are the numeric node
//! ids of each type's binary encoding in namespace 0.
//!
//! Message structs carry the fields the client touches; deliberately
//! unsupported detail (populated diagnostics, multi-dimensional arrays) is
//! rejected at decode time rather than silently dropped.

use std::fmt;

use crate::codec::{ua_struct, ByteString, UaDecode, UaEncode};
use crate::node_id::{LocalizedText, NodeId};
use crate::status::StatusCode;
use crate::time::UaDateTime;
use crate::variant::{DiagnosticInfo, ExtensionObject};

pub mod attribute;
pub mod discovery;
pub mod method;
pub mod node_management;
pub mod query;
pub mod secure;
pub mod session;
pub mod subscription;
pub mod view;

pub use attribute::*;
pub use discovery::*;
pub use method::*;
pub use node_management::*;
pub use query::*;
pub use secure::*;
pub use session::*;
pub use subscription::*;
pub use view::*;

// =============================================================================
// Message traits
// =============================================================================

/// A message (or any structured type) with a registered binary encoding.
///
/// This is the client's *type descriptor*: the numeric encoding id plus the
/// ability to encode, decode and default-initialize a value. Dropping the
/// value releases it, so no explicit `clear` exists.
pub trait UaMessage: UaEncode + UaDecode + Default + fmt::Debug + 'static {
    /// Numeric node id (ns=0) of the type's binary encoding.
    const TYPE_ID: u32;

    /// The encoding id as a [`NodeId`].
    fn type_node_id() -> NodeId {
        NodeId::numeric(0, Self::TYPE_ID)
    }
}

/// A service request, linked to its response type.
pub trait UaRequest: UaMessage {
    /// The response message answering this request.
    type Response: UaResponse;

    /// The common request header.
    fn request_header(&self) -> &RequestHeader;

    /// Mutable access for header stamping.
    fn request_header_mut(&mut self) -> &mut RequestHeader;
}

/// A service response.
pub trait UaResponse: UaMessage {
    /// The common response header.
    fn response_header(&self) -> &ResponseHeader;

    /// Mutable access for synthesizing failures.
    fn response_header_mut(&mut self) -> &mut ResponseHeader;

    /// The service result carried in the header.
    fn service_result(&self) -> StatusCode {
        self.response_header().service_result
    }

    /// A zero-initialized response whose header carries `status`.
    fn from_status(status: StatusCode) -> Self {
        let mut response = Self::default();
        response.response_header_mut().service_result = status;
        response
    }
}

/// Links a request/response pair to the message traits.
macro_rules! ua_service {
    ($req:ty => $resp:ty, $req_id:expr, $resp_id:expr) => {
        impl $crate::messages::UaMessage for $req {
            const TYPE_ID: u32 = $req_id;
        }

        impl $crate::messages::UaMessage for $resp {
            const TYPE_ID: u32 = $resp_id;
        }

        impl $crate::messages::UaRequest for $req {
            type Response = $resp;

            fn request_header(&self) -> &$crate::messages::RequestHeader {
                &self.request_header
            }

            fn request_header_mut(&mut self) -> &mut $crate::messages::RequestHeader {
                &mut self.request_header
            }
        }

        impl $crate::messages::UaResponse for $resp {
            fn response_header(&self) -> &$crate::messages::ResponseHeader {
                &self.response_header
            }

            fn response_header_mut(&mut self) -> &mut $crate::messages::ResponseHeader {
                &mut self.response_header
            }
        }
    };
}

pub(crate) use ua_service;

/// Defines a u32-encoded enumeration.
macro_rules! ua_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:expr ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $value, )*
        }

        impl $crate::codec::UaEncode for $name {
            fn encode(&self, out: &mut Vec<u8>) {
                (*self as u32).encode(out);
            }
        }

        impl $crate::codec::UaDecode for $name {
            fn decode(
                cur: &mut $crate::codec::DecodeCursor<'_>,
            ) -> Result<Self, $crate::codec::CodecError> {
                match cur.read_u32()? {
                    $( $value => Ok(Self::$variant), )*
                    other => Err($crate::codec::CodecError::invalid(
                        stringify!($name),
                        format!("unknown value {other}"),
                    )),
                }
            }
        }
    };
}

pub(crate) use ua_enum;

// =============================================================================
// Headers
// =============================================================================

ua_struct! {
    /// The header carried by every service request.
    pub struct RequestHeader {
        /// Session authentication token; null outside a session.
        pub authentication_token: NodeId,
        /// When the client sent the request.
        pub timestamp: UaDateTime,
        /// Caller-chosen handle echoed back in the response.
        pub request_handle: u32,
        /// Diagnostics mask; the client always requests none.
        pub return_diagnostics: u32,
        /// Audit entry id; unused by this client.
        pub audit_entry_id: String,
        /// Hint for the server-side timeout in milliseconds.
        pub timeout_hint: u32,
        /// Reserved extension point.
        pub additional_header: ExtensionObject,
    }
}

ua_struct! {
    /// The header carried by every service response.
    pub struct ResponseHeader {
        /// When the server sent the response.
        pub timestamp: UaDateTime,
        /// Echo of the request handle.
        pub request_handle: u32,
        /// Overall outcome of the service call.
        pub service_result: StatusCode,
        /// Service-level diagnostics (always empty here).
        pub service_diagnostics: DiagnosticInfo,
        /// String table for diagnostics.
        pub string_table: Vec<String>,
        /// Reserved extension point.
        pub additional_header: ExtensionObject,
    }
}

ua_struct! {
    /// The body a server returns when a service fails outright.
    pub struct ServiceFault {
        /// Header carrying the failure status.
        pub response_header: ResponseHeader,
    }
}

impl UaMessage for ServiceFault {
    const TYPE_ID: u32 = 397;
}

impl UaResponse for ServiceFault {
    fn response_header(&self) -> &ResponseHeader {
        &self.response_header
    }

    fn response_header_mut(&mut self) -> &mut ResponseHeader {
        &mut self.response_header
    }
}

// =============================================================================
// Shared enums
// =============================================================================

ua_enum! {
    /// How messages on a secure channel are protected.
    pub enum MessageSecurityMode {
        /// Sentinel for an unset mode.
        Invalid = 0,
        /// Neither signed nor encrypted.
        None = 1,
        /// Signed but not encrypted.
        Sign = 2,
        /// Signed and encrypted.
        SignAndEncrypt = 3,
    }
}

impl Default for MessageSecurityMode {
    fn default() -> Self {
        Self::None
    }
}

ua_enum! {
    /// The kind of application an `ApplicationDescription` describes.
    pub enum ApplicationType {
        /// A server.
        Server = 0,
        /// A client.
        Client = 1,
        /// Both client and server.
        ClientAndServer = 2,
        /// A discovery server.
        DiscoveryServer = 3,
    }
}

impl Default for ApplicationType {
    fn default() -> Self {
        Self::Client
    }
}

ua_enum! {
    /// The identity token kinds a server endpoint can accept.
    pub enum UserTokenKind {
        /// No identity.
        Anonymous = 0,
        /// Username and password.
        UserName = 1,
        /// X.509 certificate.
        Certificate = 2,
        /// Externally issued token.
        IssuedToken = 3,
    }
}

impl Default for UserTokenKind {
    fn default() -> Self {
        Self::Anonymous
    }
}

ua_enum! {
    /// Which timestamps the server should attach to values.
    pub enum TimestampsToReturn {
        /// Source timestamp only.
        Source = 0,
        /// Server timestamp only.
        Server = 1,
        /// Both timestamps.
        Both = 2,
        /// No timestamps.
        Neither = 3,
    }
}

impl Default for TimestampsToReturn {
    fn default() -> Self {
        Self::Neither
    }
}

// =============================================================================
// Shared structures
// =============================================================================

ua_struct! {
    /// Describes an application participating in discovery.
    pub struct ApplicationDescription {
        /// Globally unique application URI.
        pub application_uri: String,
        /// URI of the product.
        pub product_uri: String,
        /// Human-readable name.
        pub application_name: LocalizedText,
        /// Kind of application.
        pub application_type: ApplicationType,
        /// Gateway the application is reached through, if any.
        pub gateway_server_uri: String,
        /// Discovery profile supported.
        pub discovery_profile_uri: String,
        /// URLs the application can be discovered at.
        pub discovery_urls: Vec<String>,
    }
}

ua_struct! {
    /// An identity token policy advertised by an endpoint.
    pub struct UserTokenPolicy {
        /// Identifier the client echoes in its identity token.
        pub policy_id: String,
        /// Kind of token the policy accepts.
        pub token_type: UserTokenKind,
        /// Token type URI for issued tokens.
        pub issued_token_type: String,
        /// Endpoint to obtain issued tokens from.
        pub issuer_endpoint_url: String,
        /// Security policy protecting the token; empty inherits the channel's.
        pub security_policy_uri: String,
    }
}

ua_struct! {
    /// One endpoint a server exposes.
    pub struct EndpointDescription {
        /// URL of the endpoint.
        pub endpoint_url: String,
        /// The server behind the endpoint.
        pub server: ApplicationDescription,
        /// DER certificate of the server.
        pub server_certificate: ByteString,
        /// Message protection on this endpoint.
        pub security_mode: MessageSecurityMode,
        /// Security policy URI of this endpoint.
        pub security_policy_uri: String,
        /// Identity token policies the endpoint accepts.
        pub user_identity_tokens: Vec<UserTokenPolicy>,
        /// Transport profile URI.
        pub transport_profile_uri: String,
        /// Relative security strength (higher is stronger).
        pub security_level: u8,
    }
}

ua_struct! {
    /// A signature created with a certificate's private key.
    pub struct SignatureData {
        /// URI of the signature algorithm.
        pub algorithm: String,
        /// The signature bytes.
        pub signature: ByteString,
    }
}

ua_struct! {
    /// A software certificate signed by an authority.
    pub struct SignedSoftwareCertificate {
        /// The certificate data.
        pub certificate_data: ByteString,
        /// Signature over the data.
        pub signature: ByteString,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DecodeCursor;

    fn round_trip<T: UaEncode + UaDecode + PartialEq + fmt::Debug>(value: T) {
        let mut wire = Vec::new();
        value.encode(&mut wire);
        let mut cur = DecodeCursor::new(&wire);
        assert_eq!(T::decode(&mut cur).unwrap(), value);
        assert!(cur.is_empty());
    }

    #[test]
    fn test_headers() {
        round_trip(RequestHeader {
            authentication_token: NodeId::opaque(0, vec![1, 2, 3]),
            timestamp: UaDateTime(116_444_736_000_000_000),
            request_handle: 7,
            return_diagnostics: 0,
            audit_entry_id: String::new(),
            timeout_hint: 5000,
            additional_header: ExtensionObject::null(),
        });
        round_trip(ResponseHeader {
            timestamp: UaDateTime(1),
            request_handle: 7,
            service_result: StatusCode::BAD_TIMEOUT,
            ..Default::default()
        });
    }

    #[test]
    fn test_from_status() {
        let fault = ServiceFault::from_status(StatusCode::BAD_SHUTDOWN);
        assert_eq!(fault.service_result(), StatusCode::BAD_SHUTDOWN);
    }

    #[test]
    fn test_enum_rejects_unknown() {
        let mut wire = Vec::new();
        99u32.encode(&mut wire);
        let mut cur = DecodeCursor::new(&wire);
        assert!(MessageSecurityMode::decode(&mut cur).is_err());
    }

    #[test]
    fn test_endpoint_description() {
        round_trip(EndpointDescription {
            endpoint_url: "opc.tcp://localhost:4840".to_string(),
            security_mode: MessageSecurityMode::None,
            security_policy_uri: "http://opcfoundation.org/UA/SecurityPolicy#None".to_string(),
            user_identity_tokens: vec![UserTokenPolicy {
                policy_id: "anonymous".to_string(),
                token_type: UserTokenKind::Anonymous,
                ..Default::default()
            }],
            ..Default::default()
        });
    }
}
