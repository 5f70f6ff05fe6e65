// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA node identifiers and the name types built on them.
//!
//! A [`NodeId`] uniquely identifies a node within a server. It consists of a
//! namespace index and an identifier which can be numeric, string, GUID, or
//! opaque (byte string). The binary encoding picks the most compact of the
//! standard formats automatically.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::{ua_struct, ByteString, CodecError, DecodeCursor, UaDecode, UaEncode};

// =============================================================================
// NodeId
// =============================================================================

/// An OPC UA node identifier.
///
/// # Examples
///
/// ```
/// use ualink_types::NodeId;
///
/// let numeric = NodeId::numeric(2, 1001);
/// let parsed: NodeId = "ns=2;s=Device.Temperature".parse().unwrap();
/// assert_eq!(parsed.to_string(), "ns=2;s=Device.Temperature");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Namespace index (0 = OPC UA standard namespace).
    pub namespace_index: u16,

    /// The node identifier.
    pub identifier: NodeIdentifier,
}

/// The four identifier kinds defined by the OPC UA specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum NodeIdentifier {
    /// Numeric identifier (most compact, used for standard nodes).
    Numeric(u32),

    /// String identifier (human-readable, used for custom nodes).
    String(String),

    /// GUID identifier (globally unique).
    Guid(Uuid),

    /// Opaque identifier (application-specific byte array).
    Opaque(Vec<u8>),
}

impl NodeId {
    /// Creates a numeric node id.
    #[inline]
    pub const fn numeric(namespace_index: u16, value: u32) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Numeric(value),
        }
    }

    /// Creates a string node id.
    #[inline]
    pub fn string(namespace_index: u16, value: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::String(value.into()),
        }
    }

    /// Creates a GUID node id.
    #[inline]
    pub const fn guid(namespace_index: u16, value: Uuid) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Guid(value),
        }
    }

    /// Creates an opaque (byte string) node id.
    #[inline]
    pub fn opaque(namespace_index: u16, value: Vec<u8>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Opaque(value),
        }
    }

    /// The null node id (ns=0, i=0).
    #[inline]
    pub const fn null() -> Self {
        Self::numeric(0, 0)
    }

    /// Returns `true` if this is the null node id.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.namespace_index == 0 && matches!(self.identifier, NodeIdentifier::Numeric(0))
    }

    /// Returns the numeric value if this is a numeric identifier.
    #[inline]
    pub fn as_numeric(&self) -> Option<u32> {
        match &self.identifier {
            NodeIdentifier::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string value if this is a string identifier.
    #[inline]
    pub fn as_string(&self) -> Option<&str> {
        match &self.identifier {
            NodeIdentifier::String(v) => Some(v),
            _ => None,
        }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_index != 0 {
            write!(f, "ns={};", self.namespace_index)?;
        }
        match &self.identifier {
            NodeIdentifier::Numeric(v) => write!(f, "i={v}"),
            NodeIdentifier::String(v) => write!(f, "s={v}"),
            NodeIdentifier::Guid(v) => write!(f, "g={v}"),
            NodeIdentifier::Opaque(v) => write!(f, "b={}", BASE64.encode(v)),
        }
    }
}

/// Error returned when parsing a node id from its string form fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid node id '{input}': {reason}")]
pub struct ParseNodeIdError {
    /// The rejected input.
    pub input: String,
    /// Why it was rejected.
    pub reason: String,
}

impl ParseNodeIdError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

impl FromStr for NodeId {
    type Err = ParseNodeIdError;

    /// Parses the `ns=<namespace>;{i|s|g|b}=<identifier>` format.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        let (namespace_index, identifier_part) = match trimmed.strip_prefix("ns=") {
            Some(rest) => {
                let (ns_str, id_part) = rest
                    .split_once(';')
                    .ok_or_else(|| ParseNodeIdError::new(s, "missing identifier after namespace"))?;
                let ns = ns_str
                    .parse::<u16>()
                    .map_err(|_| ParseNodeIdError::new(s, "invalid namespace index"))?;
                (ns, id_part)
            }
            None => (0, trimmed),
        };

        let identifier = if let Some(id) = identifier_part.strip_prefix("i=") {
            let value = id
                .parse::<u32>()
                .map_err(|_| ParseNodeIdError::new(s, "invalid numeric identifier"))?;
            NodeIdentifier::Numeric(value)
        } else if let Some(id) = identifier_part.strip_prefix("s=") {
            NodeIdentifier::String(id.to_string())
        } else if let Some(id) = identifier_part.strip_prefix("g=") {
            let uuid = Uuid::parse_str(id)
                .map_err(|e| ParseNodeIdError::new(s, format!("invalid GUID: {e}")))?;
            NodeIdentifier::Guid(uuid)
        } else if let Some(id) = identifier_part.strip_prefix("b=") {
            let bytes = BASE64
                .decode(id)
                .map_err(|e| ParseNodeIdError::new(s, format!("invalid base64: {e}")))?;
            NodeIdentifier::Opaque(bytes)
        } else {
            return Err(ParseNodeIdError::new(
                s,
                "unknown identifier type, expected i=, s=, g= or b=",
            ));
        };

        Ok(Self {
            namespace_index,
            identifier,
        })
    }
}

// Wire encoding byte for the identifier formats of Part 6.
const FORMAT_TWO_BYTE: u8 = 0x00;
const FORMAT_FOUR_BYTE: u8 = 0x01;
const FORMAT_NUMERIC: u8 = 0x02;
const FORMAT_STRING: u8 = 0x03;
const FORMAT_GUID: u8 = 0x04;
const FORMAT_OPAQUE: u8 = 0x05;

pub(crate) fn encode_guid(guid: &Uuid, out: &mut Vec<u8>) {
    let (d1, d2, d3, d4) = guid.as_fields();
    d1.encode(out);
    d2.encode(out);
    d3.encode(out);
    out.extend_from_slice(d4);
}

pub(crate) fn decode_guid(cur: &mut DecodeCursor<'_>) -> Result<Uuid, CodecError> {
    let d1 = cur.read_u32()?;
    let d2 = cur.read_u16()?;
    let d3 = cur.read_u16()?;
    let d4 = cur.read_array::<8>()?;
    Ok(Uuid::from_fields(d1, d2, d3, &d4))
}

impl UaEncode for NodeId {
    fn encode(&self, out: &mut Vec<u8>) {
        match &self.identifier {
            NodeIdentifier::Numeric(v) if self.namespace_index == 0 && *v <= 0xFF => {
                out.push(FORMAT_TWO_BYTE);
                out.push(*v as u8);
            }
            NodeIdentifier::Numeric(v) if self.namespace_index <= 0xFF && *v <= 0xFFFF => {
                out.push(FORMAT_FOUR_BYTE);
                out.push(self.namespace_index as u8);
                (*v as u16).encode(out);
            }
            NodeIdentifier::Numeric(v) => {
                out.push(FORMAT_NUMERIC);
                self.namespace_index.encode(out);
                v.encode(out);
            }
            NodeIdentifier::String(v) => {
                out.push(FORMAT_STRING);
                self.namespace_index.encode(out);
                v.encode(out);
            }
            NodeIdentifier::Guid(v) => {
                out.push(FORMAT_GUID);
                self.namespace_index.encode(out);
                encode_guid(v, out);
            }
            NodeIdentifier::Opaque(v) => {
                out.push(FORMAT_OPAQUE);
                self.namespace_index.encode(out);
                ByteString(v.clone()).encode(out);
            }
        }
    }
}

impl UaDecode for NodeId {
    fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, CodecError> {
        // High bits of the format byte belong to ExpandedNodeId; reject here.
        let format = cur.read_u8()?;
        decode_node_id_body(format & 0x0F, cur).and_then(|id| {
            if format & 0xC0 != 0 {
                Err(CodecError::invalid(
                    "NodeId",
                    "expanded node id flags on a plain node id",
                ))
            } else {
                Ok(id)
            }
        })
    }
}

fn decode_node_id_body(format: u8, cur: &mut DecodeCursor<'_>) -> Result<NodeId, CodecError> {
    match format {
        FORMAT_TWO_BYTE => Ok(NodeId::numeric(0, cur.read_u8()? as u32)),
        FORMAT_FOUR_BYTE => {
            let ns = cur.read_u8()? as u16;
            let id = cur.read_u16()? as u32;
            Ok(NodeId::numeric(ns, id))
        }
        FORMAT_NUMERIC => {
            let ns = cur.read_u16()?;
            let id = cur.read_u32()?;
            Ok(NodeId::numeric(ns, id))
        }
        FORMAT_STRING => {
            let ns = cur.read_u16()?;
            let id = String::decode(cur)?;
            Ok(NodeId::string(ns, id))
        }
        FORMAT_GUID => {
            let ns = cur.read_u16()?;
            Ok(NodeId::guid(ns, decode_guid(cur)?))
        }
        FORMAT_OPAQUE => {
            let ns = cur.read_u16()?;
            Ok(NodeId::opaque(ns, ByteString::decode(cur)?.0))
        }
        other => Err(CodecError::invalid(
            "NodeId",
            format!("unknown identifier format {other:#04x}"),
        )),
    }
}

// =============================================================================
// ExpandedNodeId
// =============================================================================

/// A node id extended with an optional namespace URI and server index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpandedNodeId {
    /// The embedded node id.
    pub node_id: NodeId,

    /// Namespace URI; empty means the namespace index applies.
    pub namespace_uri: String,

    /// Index into the server table; 0 means the local server.
    pub server_index: u32,
}

impl ExpandedNodeId {
    /// Wraps a local node id.
    pub fn local(node_id: NodeId) -> Self {
        Self {
            node_id,
            namespace_uri: String::new(),
            server_index: 0,
        }
    }
}

impl From<NodeId> for ExpandedNodeId {
    fn from(node_id: NodeId) -> Self {
        Self::local(node_id)
    }
}

const FLAG_NAMESPACE_URI: u8 = 0x80;
const FLAG_SERVER_INDEX: u8 = 0x40;

impl UaEncode for ExpandedNodeId {
    fn encode(&self, out: &mut Vec<u8>) {
        let mark = out.len();
        self.node_id.encode(out);
        let mut flags = 0u8;
        if !self.namespace_uri.is_empty() {
            flags |= FLAG_NAMESPACE_URI;
        }
        if self.server_index != 0 {
            flags |= FLAG_SERVER_INDEX;
        }
        out[mark] |= flags;
        if !self.namespace_uri.is_empty() {
            self.namespace_uri.encode(out);
        }
        if self.server_index != 0 {
            self.server_index.encode(out);
        }
    }
}

impl UaDecode for ExpandedNodeId {
    fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, CodecError> {
        let format = cur.read_u8()?;
        let node_id = decode_node_id_body(format & 0x0F, cur)?;
        let namespace_uri = if format & FLAG_NAMESPACE_URI != 0 {
            String::decode(cur)?
        } else {
            String::new()
        };
        let server_index = if format & FLAG_SERVER_INDEX != 0 {
            cur.read_u32()?
        } else {
            0
        };
        Ok(Self {
            node_id,
            namespace_uri,
            server_index,
        })
    }
}

impl fmt::Display for ExpandedNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.server_index != 0 {
            write!(f, "svr={};", self.server_index)?;
        }
        if !self.namespace_uri.is_empty() {
            write!(f, "nsu={};", self.namespace_uri)?;
        }
        write!(f, "{}", self.node_id)
    }
}

// =============================================================================
// QualifiedName / LocalizedText
// =============================================================================

ua_struct! {
    /// A name qualified by a namespace index.
    pub struct QualifiedName {
        /// Namespace index of the name.
        pub namespace_index: u16,
        /// The unqualified name.
        pub name: String,
    }
}

impl QualifiedName {
    /// Creates a qualified name.
    pub fn new(namespace_index: u16, name: impl Into<String>) -> Self {
        Self {
            namespace_index,
            name: name.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_index != 0 {
            write!(f, "{}:{}", self.namespace_index, self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// Human-readable text with an optional locale tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalizedText {
    /// Locale tag, e.g. `en-US`; may be empty.
    pub locale: String,

    /// The text itself.
    pub text: String,
}

impl LocalizedText {
    /// Creates text without a locale.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            locale: String::new(),
            text: text.into(),
        }
    }
}

impl fmt::Display for LocalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

const TEXT_FLAG_LOCALE: u8 = 0x01;
const TEXT_FLAG_TEXT: u8 = 0x02;

impl UaEncode for LocalizedText {
    fn encode(&self, out: &mut Vec<u8>) {
        let mut flags = 0u8;
        if !self.locale.is_empty() {
            flags |= TEXT_FLAG_LOCALE;
        }
        if !self.text.is_empty() {
            flags |= TEXT_FLAG_TEXT;
        }
        out.push(flags);
        if flags & TEXT_FLAG_LOCALE != 0 {
            self.locale.encode(out);
        }
        if flags & TEXT_FLAG_TEXT != 0 {
            self.text.encode(out);
        }
    }
}

impl UaDecode for LocalizedText {
    fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, CodecError> {
        let flags = cur.read_u8()?;
        let locale = if flags & TEXT_FLAG_LOCALE != 0 {
            String::decode(cur)?
        } else {
            String::new()
        };
        let text = if flags & TEXT_FLAG_TEXT != 0 {
            String::decode(cur)?
        } else {
            String::new()
        };
        Ok(Self { locale, text })
    }
}

// =============================================================================
// Tests
// =============================================================================
