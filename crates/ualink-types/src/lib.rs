// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA data model and binary codec for the ualink client.
//!
//! This crate provides the protocol-level building blocks consumed by
//! `ualink-client`:
//!
//! - **StatusCode**: the 32-bit status codes carried in every response header
//! - **NodeId**: all four OPC UA node identifier types with parsing and validation
//! - **Variant / DataValue**: the self-describing value containers
//! - **Binary codec**: little-endian encoding and bounds-checked decoding
//!   per OPC UA Part 6
//! - **Service messages**: request/response pairs for every service set the
//!   client issues, linked through the [`UaRequest`]/[`UaResponse`] traits
//! - **Type registry**: custom extension-object codecs addressable by their
//!   binary type id
//!
//! # Example
//!
//! ```
//! use ualink_types::{NodeId, Variant};
//! use ualink_types::codec::{UaDecode, UaEncode, DecodeCursor};
//!
//! let node = NodeId::numeric(0, 2258);
//! let mut wire = Vec::new();
//! node.encode(&mut wire);
//!
//! let mut cursor = DecodeCursor::new(&wire);
//! assert_eq!(NodeId::decode(&mut cursor).unwrap(), node);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod codec;
pub mod messages;
pub mod node_id;
pub mod registry;
pub mod status;
pub mod time;
pub mod variant;

pub use codec::{ByteString, CodecError, DecodeCursor, UaDecode, UaEncode};
pub use messages::{
    RequestHeader, ResponseHeader, ServiceFault, UaMessage, UaRequest, UaResponse,
};
pub use node_id::{ExpandedNodeId, LocalizedText, NodeId, NodeIdentifier, QualifiedName};
pub use registry::{CustomTypeCodec, TypeRegistry};
pub use status::StatusCode;
pub use time::UaDateTime;
pub use variant::{DataValue, DiagnosticInfo, ExtensionObject, Variant};
