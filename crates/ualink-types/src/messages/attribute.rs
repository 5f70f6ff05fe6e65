// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Attribute service set: Read and Write.

use crate::codec::ua_struct;
use crate::messages::{ua_service, RequestHeader, ResponseHeader, TimestampsToReturn};
use crate::node_id::{NodeId, QualifiedName};
use crate::status::StatusCode;
use crate::variant::{DataValue, DiagnosticInfo};

/// Attribute id of the Value attribute.
pub const ATTRIBUTE_VALUE: u32 = 13;

// =============================================================================
// Read
// =============================================================================

ua_struct! {
    /// Selects one attribute of one node to read.
    pub struct ReadValueId {
        /// The node to read.
        pub node_id: NodeId,
        /// The attribute to read (13 = Value).
        pub attribute_id: u32,
        /// Numeric range within array values; empty for all.
        pub index_range: String,
        /// Requested data encoding; empty for the default.
        pub data_encoding: QualifiedName,
    }
}

impl ReadValueId {
    /// Reads the Value attribute of `node_id`.
    pub fn value_of(node_id: NodeId) -> Self {
        Self {
            node_id,
            attribute_id: ATTRIBUTE_VALUE,
            ..Default::default()
        }
    }
}

ua_struct! {
    /// Reads attributes from one or more nodes.
    pub struct ReadRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// Oldest acceptable cached value age in milliseconds.
        pub max_age: f64,
        /// Which timestamps to return.
        pub timestamps_to_return: TimestampsToReturn,
        /// The attributes to read.
        pub nodes_to_read: Vec<ReadValueId>,
    }
}

ua_struct! {
    /// The server's answer to [`ReadRequest`].
    pub struct ReadResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One value per requested attribute, in request order.
        pub results: Vec<DataValue>,
        /// Per-result diagnostics.
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_service!(ReadRequest => ReadResponse, 631, 634);

// =============================================================================
// Write
// =============================================================================

ua_struct! {
    /// One attribute write.
    pub struct WriteValue {
        /// The node to write.
        pub node_id: NodeId,
        /// The attribute to write (13 = Value).
        pub attribute_id: u32,
        /// Numeric range within array values; empty for all.
        pub index_range: String,
        /// The value to write.
        pub value: DataValue,
    }
}

impl WriteValue {
    /// Writes the Value attribute of `node_id`.
    pub fn value_of(node_id: NodeId, value: DataValue) -> Self {
        Self {
            node_id,
            attribute_id: ATTRIBUTE_VALUE,
            index_range: String::new(),
            value,
        }
    }
}

ua_struct! {
    /// Writes attributes of one or more nodes.
    pub struct WriteRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The writes to perform.
        pub nodes_to_write: Vec<WriteValue>,
    }
}

ua_struct! {
    /// The server's answer to [`WriteRequest`].
    pub struct WriteResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One status per write, in request order.
        pub results: Vec<StatusCode>,
        /// Per-result diagnostics.
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_service!(WriteRequest => WriteResponse, 673, 676);

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DecodeCursor, UaDecode, UaEncode};
    use crate::variant::Variant;

    #[test]
    fn test_read_request_round_trip() {
        let request = ReadRequest {
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: vec![ReadValueId::value_of(NodeId::numeric(0, 2258))],
            ..Default::default()
        };
        let mut wire = Vec::new();
        request.encode(&mut wire);
        let mut cur = DecodeCursor::new(&wire);
        assert_eq!(ReadRequest::decode(&mut cur).unwrap(), request);
        assert!(cur.is_empty());
    }

    #[test]
    fn test_write_response_round_trip() {
        let response = WriteResponse {
            results: vec![StatusCode::GOOD, StatusCode::BAD_NODE_ID_UNKNOWN],
            ..Default::default()
        };
        let mut wire = Vec::new();
        response.encode(&mut wire);
        let mut cur = DecodeCursor::new(&wire);
        assert_eq!(WriteResponse::decode(&mut cur).unwrap(), response);
    }

    #[test]
    fn test_write_value_helper() {
        let write = WriteValue::value_of(
            NodeId::string(2, "Setpoint"),
            DataValue::new(Variant::Double(42.0)),
        );
        assert_eq!(write.attribute_id, ATTRIBUTE_VALUE);
    }
}
