// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Self-describing value containers.
//!
//! A [`Variant`] tags a value with its built-in type id so that it can travel
//! inside attributes, method arguments and notifications. A [`DataValue`]
//! wraps a variant with a status code and timestamps. [`ExtensionObject`]
//! carries a structured value as an opaque binary body identified by its
//! encoding node id; the [`crate::registry::TypeRegistry`] turns those bodies
//! back into typed values.

use std::fmt;

use uuid::Uuid;

use crate::codec::{ByteString, CodecError, DecodeCursor, UaDecode, UaEncode};
use crate::node_id::{decode_guid, encode_guid};
use crate::node_id::{LocalizedText, NodeId, QualifiedName};
use crate::status::StatusCode;
use crate::time::UaDateTime;

// =============================================================================
// Variant
// =============================================================================

/// A value tagged with its OPC UA built-in type.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    /// The empty variant.
    #[default]
    Null,

    /// Boolean value.
    Boolean(bool),

    /// Signed byte.
    SByte(i8),

    /// Unsigned byte.
    Byte(u8),

    /// 16-bit signed integer.
    Int16(i16),

    /// 16-bit unsigned integer.
    UInt16(u16),

    /// 32-bit signed integer.
    Int32(i32),

    /// 32-bit unsigned integer.
    UInt32(u32),

    /// 64-bit signed integer.
    Int64(i64),

    /// 64-bit unsigned integer.
    UInt64(u64),

    /// 32-bit float.
    Float(f32),

    /// 64-bit double.
    Double(f64),

    /// UTF-8 string.
    String(String),

    /// Timestamp.
    DateTime(UaDateTime),

    /// GUID.
    Guid(Uuid),

    /// Raw bytes.
    ByteString(ByteString),

    /// Node identifier.
    NodeId(NodeId),

    /// Status code.
    StatusCode(StatusCode),

    /// Qualified name.
    QualifiedName(QualifiedName),

    /// Localized text.
    LocalizedText(LocalizedText),

    /// Structured value carried as an extension object.
    ExtensionObject(ExtensionObject),

    /// One-dimensional array of variants sharing one element type.
    Array(u8, Vec<Variant>),
}

// Built-in type ids of Part 6 §5.1.2.
const TYPE_BOOLEAN: u8 = 1;
const TYPE_SBYTE: u8 = 2;
const TYPE_BYTE: u8 = 3;
const TYPE_INT16: u8 = 4;
const TYPE_UINT16: u8 = 5;
const TYPE_INT32: u8 = 6;
const TYPE_UINT32: u8 = 7;
const TYPE_INT64: u8 = 8;
const TYPE_UINT64: u8 = 9;
const TYPE_FLOAT: u8 = 10;
const TYPE_DOUBLE: u8 = 11;
const TYPE_STRING: u8 = 12;
const TYPE_DATETIME: u8 = 13;
const TYPE_GUID: u8 = 14;
const TYPE_BYTESTRING: u8 = 15;
const TYPE_NODEID: u8 = 17;
const TYPE_STATUSCODE: u8 = 19;
const TYPE_QUALIFIEDNAME: u8 = 20;
const TYPE_LOCALIZEDTEXT: u8 = 21;
const TYPE_EXTENSIONOBJECT: u8 = 22;

const ARRAY_FLAG: u8 = 0x80;

impl Variant {
    /// The built-in type id, or 0 for the null variant.
    pub fn type_id(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Boolean(_) => TYPE_BOOLEAN,
            Self::SByte(_) => TYPE_SBYTE,
            Self::Byte(_) => TYPE_BYTE,
            Self::Int16(_) => TYPE_INT16,
            Self::UInt16(_) => TYPE_UINT16,
            Self::Int32(_) => TYPE_INT32,
            Self::UInt32(_) => TYPE_UINT32,
            Self::Int64(_) => TYPE_INT64,
            Self::UInt64(_) => TYPE_UINT64,
            Self::Float(_) => TYPE_FLOAT,
            Self::Double(_) => TYPE_DOUBLE,
            Self::String(_) => TYPE_STRING,
            Self::DateTime(_) => TYPE_DATETIME,
            Self::Guid(_) => TYPE_GUID,
            Self::ByteString(_) => TYPE_BYTESTRING,
            Self::NodeId(_) => TYPE_NODEID,
            Self::StatusCode(_) => TYPE_STATUSCODE,
            Self::QualifiedName(_) => TYPE_QUALIFIEDNAME,
            Self::LocalizedText(_) => TYPE_LOCALIZEDTEXT,
            Self::ExtensionObject(_) => TYPE_EXTENSIONOBJECT,
            Self::Array(elem, _) => *elem,
        }
    }

    /// Returns `true` for the null variant.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Attempts to read the value as an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Boolean(v) => Some(i64::from(*v)),
            Self::SByte(v) => Some(i64::from(*v)),
            Self::Byte(v) => Some(i64::from(*v)),
            Self::Int16(v) => Some(i64::from(*v)),
            Self::UInt16(v) => Some(i64::from(*v)),
            Self::Int32(v) => Some(i64::from(*v)),
            Self::UInt32(v) => Some(i64::from(*v)),
            Self::Int64(v) => Some(*v),
            Self::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Attempts to read the value as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(f64::from(*v)),
            Self::Double(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Attempts to read the value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    fn encode_scalar(&self, out: &mut Vec<u8>) {
        match self {
            Self::Null => {}
            Self::Boolean(v) => v.encode(out),
            Self::SByte(v) => v.encode(out),
            Self::Byte(v) => v.encode(out),
            Self::Int16(v) => v.encode(out),
            Self::UInt16(v) => v.encode(out),
            Self::Int32(v) => v.encode(out),
            Self::UInt32(v) => v.encode(out),
            Self::Int64(v) => v.encode(out),
            Self::UInt64(v) => v.encode(out),
            Self::Float(v) => v.encode(out),
            Self::Double(v) => v.encode(out),
            Self::String(v) => v.encode(out),
            Self::DateTime(v) => v.encode(out),
            Self::Guid(v) => encode_guid(v, out),
            Self::ByteString(v) => v.encode(out),
            Self::NodeId(v) => v.encode(out),
            Self::StatusCode(v) => v.encode(out),
            Self::QualifiedName(v) => v.encode(out),
            Self::LocalizedText(v) => v.encode(out),
            Self::ExtensionObject(v) => v.encode(out),
            Self::Array(..) => unreachable!("arrays are encoded by the container"),
        }
    }

    fn decode_scalar(type_id: u8, cur: &mut DecodeCursor<'_>) -> Result<Self, CodecError> {
        Ok(match type_id {
            TYPE_BOOLEAN => Self::Boolean(bool::decode(cur)?),
            TYPE_SBYTE => Self::SByte(i8::decode(cur)?),
            TYPE_BYTE => Self::Byte(u8::decode(cur)?),
            TYPE_INT16 => Self::Int16(i16::decode(cur)?),
            TYPE_UINT16 => Self::UInt16(u16::decode(cur)?),
            TYPE_INT32 => Self::Int32(i32::decode(cur)?),
            TYPE_UINT32 => Self::UInt32(u32::decode(cur)?),
            TYPE_INT64 => Self::Int64(i64::decode(cur)?),
            TYPE_UINT64 => Self::UInt64(u64::decode(cur)?),
            TYPE_FLOAT => Self::Float(f32::decode(cur)?),
            TYPE_DOUBLE => Self::Double(f64::decode(cur)?),
            TYPE_STRING => Self::String(String::decode(cur)?),
            TYPE_DATETIME => Self::DateTime(UaDateTime::decode(cur)?),
            TYPE_GUID => Self::Guid(decode_guid(cur)?),
            TYPE_BYTESTRING => Self::ByteString(ByteString::decode(cur)?),
            TYPE_NODEID => Self::NodeId(NodeId::decode(cur)?),
            TYPE_STATUSCODE => Self::StatusCode(StatusCode::decode(cur)?),
            TYPE_QUALIFIEDNAME => Self::QualifiedName(QualifiedName::decode(cur)?),
            TYPE_LOCALIZEDTEXT => Self::LocalizedText(LocalizedText::decode(cur)?),
            TYPE_EXTENSIONOBJECT => Self::ExtensionObject(ExtensionObject::decode(cur)?),
            other => {
                return Err(CodecError::invalid(
                    "Variant",
                    format!("unsupported built-in type id {other}"),
                ))
            }
        })
    }
}

impl UaEncode for Variant {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Self::Null => out.push(0),
            Self::Array(elem, items) => {
                out.push(elem | ARRAY_FLAG);
                (items.len() as i32).encode(out);
                for item in items {
                    item.encode_scalar(out);
                }
            }
            scalar => {
                out.push(scalar.type_id());
                scalar.encode_scalar(out);
            }
        }
    }
}

impl UaDecode for Variant {
    fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, CodecError> {
        let encoding = cur.read_u8()?;
        if encoding == 0 {
            return Ok(Self::Null);
        }
        let type_id = encoding & 0x3F;
        if encoding & ARRAY_FLAG != 0 {
            let count = match cur.read_length()? {
                None => 0,
                Some(n) => n,
            };
            let mut items = Vec::with_capacity(count.min(cur.remaining()));
            for _ in 0..count {
                items.push(Self::decode_scalar(type_id, cur)?);
            }
            Ok(Self::Array(type_id, items))
        } else {
            Self::decode_scalar(type_id, cur)
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::SByte(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::DateTime(v) => write!(f, "{v}"),
            Self::Guid(v) => write!(f, "{v}"),
            Self::ByteString(v) => write!(f, "<{} bytes>", v.0.len()),
            Self::NodeId(v) => write!(f, "{v}"),
            Self::StatusCode(v) => write!(f, "{v}"),
            Self::QualifiedName(v) => write!(f, "{v}"),
            Self::LocalizedText(v) => write!(f, "{v}"),
            Self::ExtensionObject(v) => write!(f, "ext({})", v.type_id),
            Self::Array(_, items) => write!(f, "[{} items]", items.len()),
        }
    }
}

// =============================================================================
// ExtensionObject
// =============================================================================

/// A structured value carried as an opaque binary body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionObject {
    /// Node id of the value's binary encoding.
    pub type_id: NodeId,

    /// The encoded body, if any.
    pub body: Option<ByteString>,
}

impl ExtensionObject {
    /// The empty extension object.
    pub fn null() -> Self {
        Self::default()
    }

    /// Wraps an already-encoded body.
    pub fn from_body(type_id: NodeId, body: Vec<u8>) -> Self {
        Self {
            type_id,
            body: Some(ByteString(body)),
        }
    }

    /// Encodes `value` into an extension object tagged with its type id.
    pub fn from_message<T: crate::messages::UaMessage>(value: &T) -> Self {
        let mut body = Vec::new();
        value.encode(&mut body);
        Self::from_body(NodeId::numeric(0, T::TYPE_ID), body)
    }

    /// Decodes the body as `T`, checking the type id.
    pub fn decode_as<T: crate::messages::UaMessage>(&self) -> Result<T, CodecError> {
        if self.type_id != NodeId::numeric(0, T::TYPE_ID) {
            return Err(CodecError::invalid(
                "ExtensionObject",
                format!("type id {} does not encode the requested type", self.type_id),
            ));
        }
        let body = self.body.as_ref().ok_or_else(|| {
            CodecError::invalid("ExtensionObject", "missing body".to_string())
        })?;
        let mut cur = DecodeCursor::new(body.as_bytes());
        T::decode(&mut cur)
    }

    /// Returns `true` if there is no body.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.body.is_none()
    }
}

const EXT_ENCODING_NONE: u8 = 0x00;
const EXT_ENCODING_BYTESTRING: u8 = 0x01;

impl UaEncode for ExtensionObject {
    fn encode(&self, out: &mut Vec<u8>) {
        self.type_id.encode(out);
        match &self.body {
            None => out.push(EXT_ENCODING_NONE),
            Some(body) => {
                out.push(EXT_ENCODING_BYTESTRING);
                (body.0.len() as i32).encode(out);
                out.extend_from_slice(&body.0);
            }
        }
    }
}

impl UaDecode for ExtensionObject {
    fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, CodecError> {
        let type_id = NodeId::decode(cur)?;
        let encoding = cur.read_u8()?;
        let body = match encoding {
            EXT_ENCODING_NONE => None,
            EXT_ENCODING_BYTESTRING => {
                let len = cur.read_length()?.unwrap_or(0);
                Some(ByteString(cur.read_bytes(len)?.to_vec()))
            }
            other => {
                return Err(CodecError::invalid(
                    "ExtensionObject",
                    format!("unsupported encoding {other:#04x}"),
                ))
            }
        };
        Ok(Self { type_id, body })
    }
}

// =============================================================================
// DataValue
// =============================================================================

/// A variant with quality and timing metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataValue {
    /// The value, if present.
    pub value: Option<Variant>,

    /// Quality of the value; `None` encodes as Good.
    pub status: Option<StatusCode>,

    /// When the source produced the value.
    pub source_timestamp: Option<UaDateTime>,

    /// When the server observed the value.
    pub server_timestamp: Option<UaDateTime>,
}

impl DataValue {
    /// Creates a good-quality value stamped with the current time.
    pub fn new(value: Variant) -> Self {
        Self {
            value: Some(value),
            status: None,
            source_timestamp: Some(UaDateTime::now()),
            server_timestamp: None,
        }
    }

    /// Creates a value-less entry carrying only a status.
    pub fn from_status(status: StatusCode) -> Self {
        Self {
            value: None,
            status: Some(status),
            source_timestamp: None,
            server_timestamp: None,
        }
    }

    /// The effective status (`Good` when none was encoded).
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::GOOD)
    }
}

const DV_FLAG_VALUE: u8 = 0x01;
const DV_FLAG_STATUS: u8 = 0x02;
const DV_FLAG_SOURCE_TS: u8 = 0x04;
const DV_FLAG_SERVER_TS: u8 = 0x08;

impl UaEncode for DataValue {
    fn encode(&self, out: &mut Vec<u8>) {
        let mut flags = 0u8;
        if self.value.is_some() {
            flags |= DV_FLAG_VALUE;
        }
        if self.status.is_some() {
            flags |= DV_FLAG_STATUS;
        }
        if self.source_timestamp.is_some() {
            flags |= DV_FLAG_SOURCE_TS;
        }
        if self.server_timestamp.is_some() {
            flags |= DV_FLAG_SERVER_TS;
        }
        out.push(flags);
        if let Some(value) = &self.value {
            value.encode(out);
        }
        if let Some(status) = &self.status {
            status.encode(out);
        }
        if let Some(ts) = &self.source_timestamp {
            ts.encode(out);
        }
        if let Some(ts) = &self.server_timestamp {
            ts.encode(out);
        }
    }
}

impl UaDecode for DataValue {
    fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, CodecError> {
        let flags = cur.read_u8()?;
        let value = (flags & DV_FLAG_VALUE != 0)
            .then(|| Variant::decode(cur))
            .transpose()?;
        let status = (flags & DV_FLAG_STATUS != 0)
            .then(|| StatusCode::decode(cur))
            .transpose()?;
        let source_timestamp = (flags & DV_FLAG_SOURCE_TS != 0)
            .then(|| UaDateTime::decode(cur))
            .transpose()?;
        let server_timestamp = (flags & DV_FLAG_SERVER_TS != 0)
            .then(|| UaDateTime::decode(cur))
            .transpose()?;
        Ok(Self {
            value,
            status,
            source_timestamp,
            server_timestamp,
        })
    }
}

// =============================================================================
// DiagnosticInfo
// =============================================================================

/// Diagnostic information attached to results.
///
/// The client never requests diagnostics (`return_diagnostics = 0`), so only
/// the empty form is carried; a populated diagnostic from a misbehaving
/// server is a decoding error rather than silently mis-parsed content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticInfo;

impl UaEncode for DiagnosticInfo {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(0);
    }
}

impl UaDecode for DiagnosticInfo {
    fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, CodecError> {
        let mask = cur.read_u8()?;
        if mask != 0 {
            return Err(CodecError::invalid(
                "DiagnosticInfo",
                format!("populated diagnostics (mask {mask:#04x}) are not supported"),
            ));
        }
        Ok(Self)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T: UaEncode + UaDecode + PartialEq + fmt::Debug>(value: T) {
        let mut wire = Vec::new();
        value.encode(&mut wire);
        let mut cur = DecodeCursor::new(&wire);
        assert_eq!(T::decode(&mut cur).unwrap(), value);
        assert!(cur.is_empty());
    }

    #[test]
    fn test_variant_scalars() {
        round_trip(Variant::Null);
        round_trip(Variant::Boolean(true));
        round_trip(Variant::Int32(-42));
        round_trip(Variant::Double(2.75));
        round_trip(Variant::String("hello".to_string()));
        round_trip(Variant::NodeId(NodeId::numeric(0, 2258)));
        round_trip(Variant::StatusCode(StatusCode::BAD_TIMEOUT));
        round_trip(Variant::LocalizedText(LocalizedText::new("Server")));
    }

    #[test]
    fn test_variant_array() {
        round_trip(Variant::Array(
            TYPE_UINT32,
            vec![
                Variant::UInt32(1),
                Variant::UInt32(2),
                Variant::UInt32(3),
            ],
        ));
    }

    #[test]
    fn test_variant_accessors() {
        assert_eq!(Variant::Int16(7).as_i64(), Some(7));
        assert_eq!(Variant::Double(1.5).as_f64(), Some(1.5));
        assert_eq!(Variant::Boolean(true).as_i64(), Some(1));
        assert_eq!(Variant::String("x".into()).as_str(), Some("x"));
        assert!(Variant::Null.is_null());
    }

    #[test]
    fn test_data_value() {
        round_trip(DataValue::default());
        round_trip(DataValue {
            value: Some(Variant::Double(21.5)),
            status: Some(StatusCode::GOOD),
            source_timestamp: Some(UaDateTime(116_444_736_000_000_000)),
            server_timestamp: None,
        });
        assert_eq!(DataValue::default().status(), StatusCode::GOOD);
    }

    #[test]
    fn test_extension_object() {
        round_trip(ExtensionObject::null());
        round_trip(ExtensionObject::from_body(
            NodeId::numeric(0, 321),
            vec![0xFF, 0xFE],
        ));
    }

    #[test]
    fn test_diagnostic_info() {
        round_trip(DiagnosticInfo);
        let mut cur = DecodeCursor::new(&[0x01, 0x00]);
        assert!(DiagnosticInfo::decode(&mut cur).is_err());
    }
}
