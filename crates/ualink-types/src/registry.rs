// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Extension-object type registry.
//!
//! Servers deliver structured values inside [`ExtensionObject`]s identified
//! by the node id of their binary encoding. The registry maps those ids to
//! codecs so that bodies can be turned back into typed values. A built-in
//! table covers the standard types the client consumes; applications add
//! codecs for their server-specific structures.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use crate::codec::{CodecError, DecodeCursor};
use crate::messages::subscription::DataChangeNotification;
use crate::messages::UaMessage;
use crate::node_id::NodeId;
use crate::variant::ExtensionObject;

// =============================================================================
// CustomTypeCodec
// =============================================================================

/// A codec for one extension-object type.
pub trait CustomTypeCodec {
    /// Node id of the type's binary encoding.
    fn binary_type_id(&self) -> NodeId;

    /// Decodes an extension-object body into the type's value.
    fn decode_body(&self, body: &[u8]) -> Result<Box<dyn Any>, CodecError>;

    /// Encodes a value previously produced by [`Self::decode_body`].
    ///
    /// Returns an error if `value` is not of this codec's type.
    fn encode_body(&self, value: &dyn Any, out: &mut Vec<u8>) -> Result<(), CodecError>;
}

/// Adapter exposing any [`UaMessage`] as a [`CustomTypeCodec`].
pub struct MessageCodec<T: UaMessage> {
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: UaMessage> MessageCodec<T> {
    /// Creates the codec.
    pub fn new() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T: UaMessage> Default for MessageCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: UaMessage> CustomTypeCodec for MessageCodec<T> {
    fn binary_type_id(&self) -> NodeId {
        T::type_node_id()
    }

    fn decode_body(&self, body: &[u8]) -> Result<Box<dyn Any>, CodecError> {
        let mut cur = DecodeCursor::new(body);
        Ok(Box::new(T::decode(&mut cur)?))
    }

    fn encode_body(&self, value: &dyn Any, out: &mut Vec<u8>) -> Result<(), CodecError> {
        let value = value
            .downcast_ref::<T>()
            .ok_or_else(|| CodecError::invalid("ExtensionObject", "value type mismatch"))?;
        value.encode(out);
        Ok(())
    }
}

// =============================================================================
// TypeRegistry
// =============================================================================

/// Maps binary encoding ids to codecs.
pub struct TypeRegistry {
    codecs: HashMap<NodeId, Box<dyn CustomTypeCodec>>,
}

impl TypeRegistry {
    /// Creates a registry preloaded with the built-in table.
    pub fn new() -> Self {
        let mut registry = Self {
            codecs: HashMap::new(),
        };
        registry.register(MessageCodec::<DataChangeNotification>::new());
        registry
    }

    /// Adds or replaces a codec.
    pub fn register(&mut self, codec: impl CustomTypeCodec + 'static) {
        self.register_boxed(Box::new(codec));
    }

    /// Adds or replaces an already-boxed codec.
    pub fn register_boxed(&mut self, codec: Box<dyn CustomTypeCodec>) {
        self.codecs.insert(codec.binary_type_id(), codec);
    }

    /// Looks up the codec for a binary encoding id.
    pub fn get(&self, type_id: &NodeId) -> Option<&dyn CustomTypeCodec> {
        self.codecs.get(type_id).map(|b| b.as_ref())
    }

    /// Decodes an extension object through the registered codec.
    ///
    /// Returns `None` when no codec is registered for the object's type id.
    pub fn decode_extension(
        &self,
        ext: &ExtensionObject,
    ) -> Option<Result<Box<dyn Any>, CodecError>> {
        let codec = self.get(&ext.type_id)?;
        let body = match &ext.body {
            Some(body) => body.as_bytes(),
            None => return Some(Err(CodecError::invalid("ExtensionObject", "missing body"))),
        };
        Some(codec.decode_body(body))
    }

    /// Number of registered codecs.
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    /// Returns `true` if no codecs are registered.
    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("codecs", &self.codecs.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::UaEncode;
    use crate::messages::subscription::{DataChangeNotification, MonitoredItemNotification};
    use crate::variant::{DataValue, Variant};

    #[test]
    fn test_builtin_table_decodes_data_change() {
        let registry = TypeRegistry::new();
        let notification = DataChangeNotification {
            monitored_items: vec![MonitoredItemNotification {
                client_handle: 9,
                value: DataValue {
                    value: Some(Variant::Int32(3)),
                    ..Default::default()
                },
            }],
            diagnostic_infos: Vec::new(),
        };
        let ext = ExtensionObject::from_message(&notification);

        let decoded = registry.decode_extension(&ext).unwrap().unwrap();
        let decoded = decoded.downcast_ref::<DataChangeNotification>().unwrap();
        assert_eq!(decoded, &notification);
    }

    #[test]
    fn test_unknown_type_returns_none() {
        let registry = TypeRegistry::new();
        let ext = ExtensionObject::from_body(NodeId::numeric(4, 9999), vec![1]);
        assert!(registry.decode_extension(&ext).is_none());
    }

    #[test]
    fn test_custom_codec_round_trip() {
        use crate::codec::ByteString;
        use crate::messages::session::AnonymousIdentityToken;

        let mut registry = TypeRegistry::new();
        registry.register(MessageCodec::<AnonymousIdentityToken>::new());

        let token = AnonymousIdentityToken {
            policy_id: "anonymous".to_string(),
        };
        let mut body = Vec::new();
        token.encode(&mut body);
        let ext = ExtensionObject {
            type_id: NodeId::numeric(0, 321),
            body: Some(ByteString(body)),
        };

        let decoded = registry.decode_extension(&ext).unwrap().unwrap();
        assert_eq!(
            decoded.downcast_ref::<AnonymousIdentityToken>().unwrap(),
            &token
        );
    }
}
