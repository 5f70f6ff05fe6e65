// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! NodeManagement service set: AddNodes, AddReferences, DeleteNodes and
//! DeleteReferences.

use crate::codec::ua_struct;
use crate::messages::{ua_service, RequestHeader, ResponseHeader};
use crate::node_id::{ExpandedNodeId, NodeId, QualifiedName};
use crate::status::StatusCode;
use crate::variant::{DiagnosticInfo, ExtensionObject};

// =============================================================================
// AddNodes
// =============================================================================

ua_struct! {
    /// One node to create.
    pub struct AddNodesItem {
        /// Parent the new node hangs off.
        pub parent_node_id: ExpandedNodeId,
        /// Reference type linking parent and new node.
        pub reference_type_id: NodeId,
        /// Requested id for the new node; null lets the server choose.
        pub requested_new_node_id: ExpandedNodeId,
        /// Browse name of the new node.
        pub browse_name: QualifiedName,
        /// Node class of the new node.
        pub node_class: u32,
        /// Class-specific attributes, wrapped as an extension object.
        pub node_attributes: ExtensionObject,
        /// Type definition for objects and variables.
        pub type_definition: ExpandedNodeId,
    }
}

ua_struct! {
    /// Result for one added node.
    pub struct AddNodesResult {
        /// Outcome for this node.
        pub status_code: StatusCode,
        /// Id of the created node.
        pub added_node_id: NodeId,
    }
}

ua_struct! {
    /// Creates nodes in the server address space.
    pub struct AddNodesRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The nodes to create.
        pub nodes_to_add: Vec<AddNodesItem>,
    }
}

ua_struct! {
    /// The server's answer to [`AddNodesRequest`].
    pub struct AddNodesResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One result per node.
        pub results: Vec<AddNodesResult>,
        /// Per-result diagnostics.
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_service!(AddNodesRequest => AddNodesResponse, 488, 491);

// =============================================================================
// AddReferences
// =============================================================================

ua_struct! {
    /// One reference to create.
    pub struct AddReferencesItem {
        /// Source node of the reference.
        pub source_node_id: NodeId,
        /// Type of the reference.
        pub reference_type_id: NodeId,
        /// `true` for a forward reference.
        pub is_forward: bool,
        /// URI of the remote server holding the target, if any.
        pub target_server_uri: String,
        /// Target node of the reference.
        pub target_node_id: ExpandedNodeId,
        /// Node class of the target.
        pub target_node_class: u32,
    }
}

ua_struct! {
    /// Creates references between nodes.
    pub struct AddReferencesRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The references to create.
        pub references_to_add: Vec<AddReferencesItem>,
    }
}

ua_struct! {
    /// The server's answer to [`AddReferencesRequest`].
    pub struct AddReferencesResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One status per reference.
        pub results: Vec<StatusCode>,
        /// Per-result diagnostics.
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_service!(AddReferencesRequest => AddReferencesResponse, 494, 497);

// =============================================================================
// DeleteNodes
// =============================================================================

ua_struct! {
    /// One node to delete.
    pub struct DeleteNodesItem {
        /// The node to delete.
        pub node_id: NodeId,
        /// Also delete references targeting the node.
        pub delete_target_references: bool,
    }
}

ua_struct! {
    /// Deletes nodes from the server address space.
    pub struct DeleteNodesRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The nodes to delete.
        pub nodes_to_delete: Vec<DeleteNodesItem>,
    }
}

ua_struct! {
    /// The server's answer to [`DeleteNodesRequest`].
    pub struct DeleteNodesResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One status per node.
        pub results: Vec<StatusCode>,
        /// Per-result diagnostics.
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_service!(DeleteNodesRequest => DeleteNodesResponse, 500, 503);

// =============================================================================
// DeleteReferences
// =============================================================================

ua_struct! {
    /// One reference to delete.
    pub struct DeleteReferencesItem {
        /// Source node of the reference.
        pub source_node_id: NodeId,
        /// Type of the reference.
        pub reference_type_id: NodeId,
        /// `true` for a forward reference.
        pub is_forward: bool,
        /// Target node of the reference.
        pub target_node_id: ExpandedNodeId,
        /// Also delete the opposite reference.
        pub delete_bidirectional: bool,
    }
}

ua_struct! {
    /// Deletes references between nodes.
    pub struct DeleteReferencesRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The references to delete.
        pub references_to_delete: Vec<DeleteReferencesItem>,
    }
}

ua_struct! {
    /// The server's answer to [`DeleteReferencesRequest`].
    pub struct DeleteReferencesResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One status per reference.
        pub results: Vec<StatusCode>,
        /// Per-result diagnostics.
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_service!(DeleteReferencesRequest => DeleteReferencesResponse, 506, 509);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DecodeCursor, UaDecode, UaEncode};

    #[test]
    fn test_delete_nodes_round_trip() {
        let request = DeleteNodesRequest {
            nodes_to_delete: vec![DeleteNodesItem {
                node_id: NodeId::string(2, "Obsolete"),
                delete_target_references: true,
            }],
            ..Default::default()
        };
        let mut wire = Vec::new();
        request.encode(&mut wire);
        let mut cur = DecodeCursor::new(&wire);
        assert_eq!(DeleteNodesRequest::decode(&mut cur).unwrap(), request);
    }
}
