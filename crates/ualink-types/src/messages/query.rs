// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Query service set: QueryFirst and QueryNext.

use crate::codec::{ua_struct, ByteString};
use crate::messages::{ua_service, RequestHeader, ResponseHeader};
use crate::node_id::ExpandedNodeId;
use crate::status::StatusCode;
use crate::variant::{DiagnosticInfo, ExtensionObject, Variant};

use super::view::{RelativePath, ViewDescription};

// =============================================================================
// Filters
// =============================================================================

ua_struct! {
    /// One operator of a content filter.
    pub struct ContentFilterElement {
        /// Numeric filter operator.
        pub filter_operator: u32,
        /// Operands, each wrapped as an extension object.
        pub filter_operands: Vec<ExtensionObject>,
    }
}

ua_struct! {
    /// A filter over query results.
    pub struct ContentFilter {
        /// The operators, referenced by index.
        pub elements: Vec<ContentFilterElement>,
    }
}

ua_struct! {
    /// Validation result for one filter element.
    pub struct ContentFilterElementResult {
        /// Outcome for this element.
        pub status_code: StatusCode,
        /// Per-operand validation results.
        pub operand_status_codes: Vec<StatusCode>,
        /// Per-operand diagnostics.
        pub operand_diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_struct! {
    /// Validation result for a whole content filter.
    pub struct ContentFilterResult {
        /// One result per element.
        pub element_results: Vec<ContentFilterElementResult>,
        /// Per-element diagnostics.
        pub element_diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

// =============================================================================
// QueryFirst
// =============================================================================

ua_struct! {
    /// Selects one value to return from matching nodes.
    pub struct QueryDataDescription {
        /// Path from the matching node to the value.
        pub relative_path: RelativePath,
        /// Attribute to return.
        pub attribute_id: u32,
        /// Numeric range within array values; empty for all.
        pub index_range: String,
    }
}

ua_struct! {
    /// Describes one node type to match.
    pub struct NodeTypeDescription {
        /// Type definition node to match instances of.
        pub type_definition_node: ExpandedNodeId,
        /// Also match subtypes.
        pub include_sub_types: bool,
        /// Values to return for each match.
        pub data_to_return: Vec<QueryDataDescription>,
    }
}

ua_struct! {
    /// One matching node with its requested values.
    pub struct QueryDataSet {
        /// The matching node.
        pub node_id: ExpandedNodeId,
        /// Its type definition.
        pub type_definition_node: ExpandedNodeId,
        /// Requested values, in description order.
        pub values: Vec<Variant>,
    }
}

ua_struct! {
    /// Validation result for one node type description.
    pub struct ParsingResult {
        /// Outcome for this description.
        pub status_code: StatusCode,
        /// Per-data-description results.
        pub data_status_codes: Vec<StatusCode>,
        /// Per-data-description diagnostics.
        pub data_diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_struct! {
    /// Starts a query over the address space.
    pub struct QueryFirstRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The view to query.
        pub view: ViewDescription,
        /// Node types to match.
        pub node_types: Vec<NodeTypeDescription>,
        /// Filter over the matches.
        pub filter: ContentFilter,
        /// Cap on returned data sets (0 = no limit).
        pub max_data_sets_to_return: u32,
        /// Cap on returned references (0 = no limit).
        pub max_references_to_return: u32,
    }
}

ua_struct! {
    /// The server's answer to [`QueryFirstRequest`].
    pub struct QueryFirstResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// The matches found so far.
        pub query_data_sets: Vec<QueryDataSet>,
        /// Cursor for QueryNext; empty when complete.
        pub continuation_point: ByteString,
        /// One parsing result per node type description.
        pub parsing_results: Vec<ParsingResult>,
        /// Per-result diagnostics.
        pub diagnostic_infos: Vec<DiagnosticInfo>,
        /// Validation of the content filter.
        pub filter_result: ContentFilterResult,
    }
}

ua_service!(QueryFirstRequest => QueryFirstResponse, 615, 618);

// =============================================================================
// QueryNext
// =============================================================================

ua_struct! {
    /// Continues a query from a continuation point.
    pub struct QueryNextRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// Release the continuation point instead of continuing.
        pub release_continuation_point: bool,
        /// The continuation point from the previous call.
        pub continuation_point: ByteString,
    }
}

ua_struct! {
    /// The server's answer to [`QueryNextRequest`].
    pub struct QueryNextResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// The next batch of matches.
        pub query_data_sets: Vec<QueryDataSet>,
        /// Cursor for the next call; empty when complete.
        pub revised_continuation_point: ByteString,
    }
}

ua_service!(QueryNextRequest => QueryNextResponse, 621, 624);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DecodeCursor, UaDecode, UaEncode};
    use crate::messages::UaMessage;

    #[test]
    fn test_query_next_uses_its_own_descriptors() {
        // QueryNext has its own encoding ids, distinct from QueryFirst.
        assert_ne!(QueryNextRequest::TYPE_ID, QueryFirstRequest::TYPE_ID);
        assert_eq!(QueryNextRequest::TYPE_ID, 621);
        assert_eq!(QueryNextResponse::TYPE_ID, 624);
    }

    #[test]
    fn test_query_next_round_trip() {
        let request = QueryNextRequest {
            release_continuation_point: false,
            continuation_point: ByteString::new(vec![1, 2, 3]),
            ..Default::default()
        };
        let mut wire = Vec::new();
        request.encode(&mut wire);
        let mut cur = DecodeCursor::new(&wire);
        assert_eq!(QueryNextRequest::decode(&mut cur).unwrap(), request);
    }
}
