// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Discovery service set: GetEndpoints, FindServers and
//! FindServersOnNetwork. These are issued over a transient secure channel
//! without a session.

use crate::codec::ua_struct;
use crate::messages::{
    ua_service, ApplicationDescription, EndpointDescription, RequestHeader, ResponseHeader,
};
use crate::time::UaDateTime;

// =============================================================================
// GetEndpoints
// =============================================================================

ua_struct! {
    /// Asks a server for its endpoints.
    pub struct GetEndpointsRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The url the client used to reach the server.
        pub endpoint_url: String,
        /// Preferred locales for localized strings.
        pub locale_ids: Vec<String>,
        /// Restrict results to these transport profiles.
        pub profile_uris: Vec<String>,
    }
}

ua_struct! {
    /// The server's answer to [`GetEndpointsRequest`].
    pub struct GetEndpointsResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// The endpoints the server exposes.
        pub endpoints: Vec<EndpointDescription>,
    }
}

ua_service!(GetEndpointsRequest => GetEndpointsResponse, 428, 431);

// =============================================================================
// FindServers
// =============================================================================

ua_struct! {
    /// Asks a discovery server for the servers it knows.
    pub struct FindServersRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The url the client used to reach the discovery server.
        pub endpoint_url: String,
        /// Preferred locales for server names.
        pub locale_ids: Vec<String>,
        /// Restrict results to these server uris; empty returns all.
        pub server_uris: Vec<String>,
    }
}

ua_struct! {
    /// The server's answer to [`FindServersRequest`].
    pub struct FindServersResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// The servers found.
        pub servers: Vec<ApplicationDescription>,
    }
}

ua_service!(FindServersRequest => FindServersResponse, 422, 425);

// =============================================================================
// FindServersOnNetwork
// =============================================================================

ua_struct! {
    /// One server known to a local discovery server.
    pub struct ServerOnNetwork {
        /// Monotonic record id, usable for pagination.
        pub record_id: u32,
        /// mDNS name of the server.
        pub server_name: String,
        /// Url the server can be discovered at.
        pub discovery_url: String,
        /// Capability identifiers, e.g. "LDS".
        pub server_capabilities: Vec<String>,
    }
}

ua_struct! {
    /// Asks a local discovery server for the network-wide server list.
    pub struct FindServersOnNetworkRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// Only return records with an id at or above this.
        pub starting_record_id: u32,
        /// Cap on returned records (0 = no limit).
        pub max_records_to_return: u32,
        /// Restrict results to servers with these capabilities.
        pub server_capability_filter: Vec<String>,
    }
}

ua_struct! {
    /// The server's answer to [`FindServersOnNetworkRequest`].
    pub struct FindServersOnNetworkResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// When the record counter was last reset.
        pub last_counter_reset_time: UaDateTime,
        /// The servers found.
        pub servers: Vec<ServerOnNetwork>,
    }
}

ua_service!(FindServersOnNetworkRequest => FindServersOnNetworkResponse, 12208, 12209);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DecodeCursor, UaDecode, UaEncode};

    #[test]
    fn test_get_endpoints_round_trip() {
        let request = GetEndpointsRequest {
            endpoint_url: "opc.tcp://localhost:4840".to_string(),
            locale_ids: vec!["en".to_string()],
            ..Default::default()
        };
        let mut wire = Vec::new();
        request.encode(&mut wire);
        let mut cur = DecodeCursor::new(&wire);
        assert_eq!(GetEndpointsRequest::decode(&mut cur).unwrap(), request);
    }

    #[test]
    fn test_find_servers_on_network_round_trip() {
        let response = FindServersOnNetworkResponse {
            servers: vec![ServerOnNetwork {
                record_id: 1,
                server_name: "plc-01".to_string(),
                discovery_url: "opc.tcp://plc-01:4840".to_string(),
                server_capabilities: vec!["LDS".to_string()],
            }],
            ..Default::default()
        };
        let mut wire = Vec::new();
        response.encode(&mut wire);
        let mut cur = DecodeCursor::new(&wire);
        assert_eq!(
            FindServersOnNetworkResponse::decode(&mut cur).unwrap(),
            response
        );
    }
}
