// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Method service set: Call.

use crate::codec::ua_struct;
use crate::messages::{ua_service, RequestHeader, ResponseHeader};
use crate::node_id::NodeId;
use crate::status::StatusCode;
use crate::variant::{DiagnosticInfo, Variant};

ua_struct! {
    /// One method invocation.
    pub struct CallMethodRequest {
        /// Object (or object type) the method belongs to.
        pub object_id: NodeId,
        /// The method to call.
        pub method_id: NodeId,
        /// Input arguments, in signature order.
        pub input_arguments: Vec<Variant>,
    }
}

ua_struct! {
    /// Result of one method invocation.
    pub struct CallMethodResult {
        /// Outcome of the call.
        pub status_code: StatusCode,
        /// Per-argument validation results.
        pub input_argument_results: Vec<StatusCode>,
        /// Per-argument diagnostics.
        pub input_argument_diagnostic_infos: Vec<DiagnosticInfo>,
        /// Output arguments, in signature order.
        pub output_arguments: Vec<Variant>,
    }
}

ua_struct! {
    /// Calls one or more methods.
    pub struct CallRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The invocations to perform.
        pub methods_to_call: Vec<CallMethodRequest>,
    }
}

ua_struct! {
    /// The server's answer to [`CallRequest`].
    pub struct CallResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One result per invocation.
        pub results: Vec<CallMethodResult>,
        /// Per-result diagnostics.
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_service!(CallRequest => CallResponse, 712, 715);
