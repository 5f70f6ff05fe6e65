// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! View service set: Browse, BrowseNext, TranslateBrowsePathsToNodeIds,
//! RegisterNodes and UnregisterNodes.

use crate::codec::{ua_struct, ByteString};
use crate::messages::{ua_enum, ua_service, RequestHeader, ResponseHeader};
use crate::node_id::{ExpandedNodeId, LocalizedText, NodeId, QualifiedName};
use crate::status::StatusCode;
use crate::time::UaDateTime;
use crate::variant::DiagnosticInfo;

// =============================================================================
// Browse
// =============================================================================

ua_enum! {
    /// Direction references are followed while browsing.
    pub enum BrowseDirection {
        /// Follow references forward.
        Forward = 0,
        /// Follow references backward.
        Inverse = 1,
        /// Follow references both ways.
        Both = 2,
    }
}

impl Default for BrowseDirection {
    fn default() -> Self {
        Self::Forward
    }
}

ua_struct! {
    /// The view to browse in; the default browses the whole address space.
    pub struct ViewDescription {
        /// Node id of the view; null for the whole address space.
        pub view_id: NodeId,
        /// Server timestamp the view was sampled at.
        pub timestamp: UaDateTime,
        /// Version of the view.
        pub view_version: u32,
    }
}

ua_struct! {
    /// One node to browse.
    pub struct BrowseDescription {
        /// Starting node.
        pub node_id: NodeId,
        /// Direction to follow references.
        pub browse_direction: BrowseDirection,
        /// Reference type to follow; null for all.
        pub reference_type_id: NodeId,
        /// Also follow subtypes of the reference type.
        pub include_subtypes: bool,
        /// Node class filter mask (0 = all).
        pub node_class_mask: u32,
        /// Which result fields to return (0x3F = all).
        pub result_mask: u32,
    }
}

ua_struct! {
    /// One reference found while browsing.
    pub struct ReferenceDescription {
        /// Type of the reference.
        pub reference_type_id: NodeId,
        /// `true` if the reference is a forward reference.
        pub is_forward: bool,
        /// The target node.
        pub node_id: ExpandedNodeId,
        /// Browse name of the target.
        pub browse_name: QualifiedName,
        /// Display name of the target.
        pub display_name: LocalizedText,
        /// Node class of the target.
        pub node_class: u32,
        /// Type definition of the target, for objects and variables.
        pub type_definition: ExpandedNodeId,
    }
}

ua_struct! {
    /// Result for one browsed node.
    pub struct BrowseResult {
        /// Outcome for this node.
        pub status_code: StatusCode,
        /// Opaque cursor for BrowseNext; empty when complete.
        pub continuation_point: ByteString,
        /// The references found.
        pub references: Vec<ReferenceDescription>,
    }
}

ua_struct! {
    /// Browses the references of one or more nodes.
    pub struct BrowseRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The view to browse.
        pub view: ViewDescription,
        /// Per-node cap on returned references (0 = no limit).
        pub requested_max_references_per_node: u32,
        /// The nodes to browse.
        pub nodes_to_browse: Vec<BrowseDescription>,
    }
}

ua_struct! {
    /// The server's answer to [`BrowseRequest`].
    pub struct BrowseResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One result per browsed node.
        pub results: Vec<BrowseResult>,
        /// Per-result diagnostics.
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_service!(BrowseRequest => BrowseResponse, 527, 530);

// =============================================================================
// BrowseNext
// =============================================================================

ua_struct! {
    /// Continues a browse from saved continuation points.
    pub struct BrowseNextRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// Release the continuation points instead of browsing.
        pub release_continuation_points: bool,
        /// The continuation points to continue from.
        pub continuation_points: Vec<ByteString>,
    }
}

ua_struct! {
    /// The server's answer to [`BrowseNextRequest`].
    pub struct BrowseNextResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One result per continuation point.
        pub results: Vec<BrowseResult>,
        /// Per-result diagnostics.
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_service!(BrowseNextRequest => BrowseNextResponse, 533, 536);

// =============================================================================
// TranslateBrowsePathsToNodeIds
// =============================================================================

ua_struct! {
    /// One hop of a relative path.
    pub struct RelativePathElement {
        /// Reference type to follow.
        pub reference_type_id: NodeId,
        /// Follow the reference inversely.
        pub is_inverse: bool,
        /// Also follow subtypes of the reference type.
        pub include_subtypes: bool,
        /// Browse name of the target node.
        pub target_name: QualifiedName,
    }
}

ua_struct! {
    /// A path of browse names relative to a starting node.
    pub struct RelativePath {
        /// The hops, applied in order.
        pub elements: Vec<RelativePathElement>,
    }
}

ua_struct! {
    /// A starting node plus a relative path.
    pub struct BrowsePath {
        /// The node the path starts at.
        pub starting_node: NodeId,
        /// The path to follow.
        pub relative_path: RelativePath,
    }
}

ua_struct! {
    /// One node a browse path resolved to.
    pub struct BrowsePathTarget {
        /// The target node.
        pub target_id: ExpandedNodeId,
        /// Index of the first unprocessed path element, or `u32::MAX`.
        pub remaining_path_index: u32,
    }
}

ua_struct! {
    /// Result for one browse path.
    pub struct BrowsePathResult {
        /// Outcome for this path.
        pub status_code: StatusCode,
        /// The nodes the path resolved to.
        pub targets: Vec<BrowsePathTarget>,
    }
}

ua_struct! {
    /// Resolves browse paths to node ids.
    pub struct TranslateBrowsePathsToNodeIdsRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The paths to resolve.
        pub browse_paths: Vec<BrowsePath>,
    }
}

ua_struct! {
    /// The server's answer to [`TranslateBrowsePathsToNodeIdsRequest`].
    pub struct TranslateBrowsePathsToNodeIdsResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One result per path.
        pub results: Vec<BrowsePathResult>,
        /// Per-result diagnostics.
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_service!(
    TranslateBrowsePathsToNodeIdsRequest => TranslateBrowsePathsToNodeIdsResponse,
    554,
    557
);

// =============================================================================
// RegisterNodes / UnregisterNodes
// =============================================================================

ua_struct! {
    /// Registers frequently used nodes for faster access.
    pub struct RegisterNodesRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The nodes to register.
        pub nodes_to_register: Vec<NodeId>,
    }
}

ua_struct! {
    /// The server's answer to [`RegisterNodesRequest`].
    pub struct RegisterNodesResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// Aliases to use instead of the registered ids.
        pub registered_node_ids: Vec<NodeId>,
    }
}

ua_service!(RegisterNodesRequest => RegisterNodesResponse, 560, 563);

ua_struct! {
    /// Releases previously registered nodes.
    pub struct UnregisterNodesRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The aliases to release.
        pub nodes_to_unregister: Vec<NodeId>,
    }
}

ua_struct! {
    /// The server's answer to [`UnregisterNodesRequest`].
    pub struct UnregisterNodesResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
    }
}

ua_service!(UnregisterNodesRequest => UnregisterNodesResponse, 566, 569);

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DecodeCursor, UaDecode, UaEncode};

    #[test]
    fn test_browse_round_trip() {
        let request = BrowseRequest {
            requested_max_references_per_node: 100,
            nodes_to_browse: vec![BrowseDescription {
                node_id: NodeId::numeric(0, 85),
                browse_direction: BrowseDirection::Forward,
                include_subtypes: true,
                result_mask: 0x3F,
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut wire = Vec::new();
        request.encode(&mut wire);
        let mut cur = DecodeCursor::new(&wire);
        assert_eq!(BrowseRequest::decode(&mut cur).unwrap(), request);
        assert!(cur.is_empty());
    }

    #[test]
    fn test_browse_result_round_trip() {
        let result = BrowseResult {
            status_code: StatusCode::GOOD,
            continuation_point: ByteString::null(),
            references: vec![ReferenceDescription {
                reference_type_id: NodeId::numeric(0, 35),
                is_forward: true,
                node_id: ExpandedNodeId::local(NodeId::numeric(0, 2253)),
                browse_name: QualifiedName::new(0, "Server"),
                display_name: LocalizedText::new("Server"),
                node_class: 1,
                type_definition: ExpandedNodeId::default(),
            }],
        };
        let mut wire = Vec::new();
        result.encode(&mut wire);
        let mut cur = DecodeCursor::new(&wire);
        assert_eq!(BrowseResult::decode(&mut cur).unwrap(), result);
    }
}
