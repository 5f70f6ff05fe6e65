// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA binary encoding and decoding.
//!
//! All wire values are little-endian. Variable-length values (strings, byte
//! strings, arrays) carry a signed 32-bit length prefix where `-1` denotes
//! null. Decoding is bounds-checked throughout: malformed input yields a
//! [`CodecError`], never a panic, and length prefixes are validated against
//! the remaining buffer before any allocation.

use std::fmt;

use thiserror::Error;

use crate::status::StatusCode;

// =============================================================================
// CodecError
// =============================================================================

/// Errors produced while decoding a binary stream.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The buffer ended before the value was complete.
    #[error("buffer exhausted: needed {needed} bytes at offset {offset}, {remaining} remaining")]
    OutOfBounds {
        /// Offset at which the read was attempted.
        offset: usize,
        /// Bytes required by the read.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// A length prefix was negative (other than the null marker) or
    /// larger than the remaining buffer.
    #[error("invalid length prefix {length} at offset {offset}")]
    InvalidLength {
        /// Offset of the length prefix.
        offset: usize,
        /// The offending length.
        length: i64,
    },

    /// A value was structurally invalid for its type.
    #[error("invalid {what}: {detail}")]
    InvalidData {
        /// What was being decoded.
        what: &'static str,
        /// Why it was rejected.
        detail: String,
    },

    /// Bytes that should have been UTF-8 were not.
    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 {
        /// Offset of the string payload.
        offset: usize,
    },
}

impl CodecError {
    /// Creates an invalid-data error.
    pub fn invalid(what: &'static str, detail: impl Into<String>) -> Self {
        Self::InvalidData {
            what,
            detail: detail.into(),
        }
    }

    /// The status code this error maps to at the service boundary.
    pub const fn status_code(&self) -> StatusCode {
        StatusCode::BAD_DECODING_ERROR
    }
}

// =============================================================================
// DecodeCursor
// =============================================================================

/// A bounds-checked reader over a byte slice.
#[derive(Debug)]
pub struct DecodeCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> DecodeCursor<'a> {
    /// Creates a cursor at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current read offset.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Returns `true` if every byte has been consumed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Reads `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::OutOfBounds {
                offset: self.pos,
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Reads a fixed-size array of bytes.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let slice = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Reads a little-endian `u16`.
    #[inline]
    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    /// Reads a little-endian `u32`.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Reads a little-endian `i32`.
    #[inline]
    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    /// Reads a little-endian `u64`.
    #[inline]
    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Reads a little-endian `i64`.
    #[inline]
    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    /// Reads a length prefix and validates it against the remaining buffer.
    ///
    /// Returns `None` for the null marker (`-1`).
    pub fn read_length(&mut self) -> Result<Option<usize>, CodecError> {
        let offset = self.pos;
        let raw = self.read_i32()?;
        if raw == -1 {
            return Ok(None);
        }
        if raw < 0 {
            return Err(CodecError::InvalidLength {
                offset,
                length: raw as i64,
            });
        }
        let len = raw as usize;
        if len > self.remaining() {
            return Err(CodecError::InvalidLength {
                offset,
                length: raw as i64,
            });
        }
        Ok(Some(len))
    }
}

// =============================================================================
// UaEncode / UaDecode
// =============================================================================

/// A value that can be written to the OPC UA binary encoding.
pub trait UaEncode {
    /// Appends the encoded form to `out`.
    fn encode(&self, out: &mut Vec<u8>);
}

/// A value that can be read from the OPC UA binary encoding.
pub trait UaDecode: Sized {
    /// Reads one value from the cursor.
    fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, CodecError>;
}

macro_rules! impl_le_codec {
    ( $( $ty:ty => $read:ident ),* $(,)? ) => {
        $(
            impl UaEncode for $ty {
                #[inline]
                fn encode(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }

            impl UaDecode for $ty {
                #[inline]
                fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, CodecError> {
                    cur.$read()
                }
            }
        )*
    };
}

impl_le_codec! {
    u16 => read_u16,
    u32 => read_u32,
    i32 => read_i32,
    u64 => read_u64,
    i64 => read_i64,
}

impl UaEncode for u8 {
    #[inline]
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(*self);
    }
}

impl UaDecode for u8 {
    #[inline]
    fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, CodecError> {
        cur.read_u8()
    }
}

impl UaEncode for i8 {
    #[inline]
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(*self as u8);
    }
}

impl UaDecode for i8 {
    #[inline]
    fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, CodecError> {
        Ok(cur.read_u8()? as i8)
    }
}

impl UaEncode for i16 {
    #[inline]
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl UaDecode for i16 {
    #[inline]
    fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, CodecError> {
        Ok(i16::from_le_bytes(cur.read_array()?))
    }
}

impl UaEncode for bool {
    #[inline]
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }
}

impl UaDecode for bool {
    #[inline]
    fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, CodecError> {
        Ok(cur.read_u8()? != 0)
    }
}

impl UaEncode for f32 {
    #[inline]
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl UaDecode for f32 {
    #[inline]
    fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, CodecError> {
        Ok(f32::from_le_bytes(cur.read_array()?))
    }
}

impl UaEncode for f64 {
    #[inline]
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl UaDecode for f64 {
    #[inline]
    fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, CodecError> {
        Ok(f64::from_le_bytes(cur.read_array()?))
    }
}

impl UaEncode for StatusCode {
    #[inline]
    fn encode(&self, out: &mut Vec<u8>) {
        self.0.encode(out);
    }
}

impl UaDecode for StatusCode {
    #[inline]
    fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, CodecError> {
        Ok(StatusCode(cur.read_u32()?))
    }
}

// A UA String is an i32 length prefix followed by UTF-8 bytes; -1 is null.
// The null and empty forms both decode to an empty `String`.
impl UaEncode for String {
    fn encode(&self, out: &mut Vec<u8>) {
        if self.is_empty() {
            (-1i32).encode(out);
        } else {
            (self.len() as i32).encode(out);
            out.extend_from_slice(self.as_bytes());
        }
    }
}

impl UaDecode for String {
    fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, CodecError> {
        let offset = cur.position();
        match cur.read_length()? {
            None => Ok(String::new()),
            Some(len) => {
                let bytes = cur.read_bytes(len)?;
                String::from_utf8(bytes.to_vec())
                    .map_err(|_| CodecError::InvalidUtf8 { offset })
            }
        }
    }
}

impl<T: UaEncode> UaEncode for Vec<T> {
    fn encode(&self, out: &mut Vec<u8>) {
        (self.len() as i32).encode(out);
        for item in self {
            item.encode(out);
        }
    }
}

impl<T: UaDecode> UaDecode for Vec<T> {
    fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, CodecError> {
        match cur.read_length()? {
            None => Ok(Vec::new()),
            Some(count) => {
                let mut items = Vec::with_capacity(count.min(cur.remaining()));
                for _ in 0..count {
                    items.push(T::decode(cur)?);
                }
                Ok(items)
            }
        }
    }
}

// =============================================================================
// ByteString
// =============================================================================

/// An OPC UA ByteString. An empty value encodes as null on the wire.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct ByteString(pub Vec<u8>);

impl ByteString {
    /// Creates a byte string from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The empty (null) byte string.
    pub const fn null() -> Self {
        Self(Vec::new())
    }

    /// Returns `true` if the byte string is null/empty.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ByteString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteString(<{} bytes>)", self.0.len())
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl UaEncode for ByteString {
    fn encode(&self, out: &mut Vec<u8>) {
        if self.0.is_empty() {
            (-1i32).encode(out);
        } else {
            (self.0.len() as i32).encode(out);
            out.extend_from_slice(&self.0);
        }
    }
}

impl UaDecode for ByteString {
    fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, CodecError> {
        match cur.read_length()? {
            None => Ok(Self::null()),
            Some(len) => Ok(Self(cur.read_bytes(len)?.to_vec())),
        }
    }
}

// =============================================================================
// Wire struct macro
// =============================================================================

/// Defines a plain wire structure whose binary form is the concatenation of
/// its fields in declaration order, deriving the usual trait set.
macro_rules! ua_struct {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( $(#[$fmeta:meta])* pub $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: $ty, )*
        }

        impl $crate::codec::UaEncode for $name {
            fn encode(&self, out: &mut Vec<u8>) {
                $( self.$field.encode(out); )*
            }
        }

        impl $crate::codec::UaDecode for $name {
            fn decode(
                cur: &mut $crate::codec::DecodeCursor<'_>,
            ) -> Result<Self, $crate::codec::CodecError> {
                Ok(Self {
                    $( $field: $crate::codec::UaDecode::decode(cur)?, )*
                })
            }
        }
    };
}

pub(crate) use ua_struct;

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
    fn test_primitives() {
        round_trip(0xABu8);
        round_trip(-2i16);
        round_trip(0xDEAD_BEEFu32);
        round_trip(-1i32);
        round_trip(u64::MAX);
        round_trip(3.5f64);
        round_trip(true);
        round_trip(StatusCode::BAD_TIMEOUT);
    }

    #[test]
    fn test_string_null_marker() {
        let mut wire = Vec::new();
        String::new().encode(&mut wire);
        assert_eq!(wire, (-1i32).to_le_bytes());

        round_trip("hello".to_string());
    }

    #[test]
    fn test_byte_string() {
        round_trip(ByteString::new(vec![1, 2, 3]));

        let mut wire = Vec::new();
        ByteString::null().encode(&mut wire);
        assert_eq!(wire, (-1i32).to_le_bytes());
    }

    #[test]
    fn test_vec() {
        round_trip(vec![1u32, 2, 3]);
        round_trip(Vec::<u32>::new());
    }

    #[test]
    fn test_truncated_input() {
        let mut wire = Vec::new();
        0xDEAD_BEEFu32.encode(&mut wire);
        let mut cur = DecodeCursor::new(&wire[..2]);
        assert!(matches!(
            u32::decode(&mut cur),
            Err(CodecError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_oversized_length_rejected() {
        // Claims 1000 bytes but carries only 2.
        let mut wire = Vec::new();
        1000i32.encode(&mut wire);
        wire.extend_from_slice(&[0, 0]);
        let mut cur = DecodeCursor::new(&wire);
        assert!(matches!(
            String::decode(&mut cur),
            Err(CodecError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_negative_length_rejected() {
        let mut wire = Vec::new();
        (-5i32).encode(&mut wire);
        let mut cur = DecodeCursor::new(&wire);
        assert!(matches!(
            ByteString::decode(&mut cur),
            Err(CodecError::InvalidLength { .. })
        ));
    }
}
