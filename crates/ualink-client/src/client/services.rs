// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Typed service shims over the generic dispatcher.
//!
//! Each service set gets one thin wrapper per request/response pair; they
//! all route through [`Client::service`] and [`Client::async_service`], so
//! the dispatch, timeout and failure semantics are identical everywhere.
//! Discovery services additionally work from the disconnected state by
//! opening a transient secure channel without a session.

use ualink_types::messages::*;

use crate::client::{Client, ClientState};
use crate::error::{ClientResult, ProtocolError};

/// Declares one sync shim (and optionally an async twin) for a service.
macro_rules! service_shim {
    (
        $(#[$meta:meta])*
        $name:ident: $req:ty => $resp:ty
    ) => {
        $(#[$meta])*
        pub fn $name(&mut self, request: $req) -> $resp {
            self.service(request)
        }
    };
}

impl Client {
    // =========================================================================
    // Attribute service set
    // =========================================================================

    service_shim! {
        /// Reads node attributes.
        read: ReadRequest => ReadResponse
    }

    service_shim! {
        /// Writes node attributes.
        write: WriteRequest => WriteResponse
    }

    /// Reads node attributes without blocking; the callback fires from the
    /// event loop.
    pub fn read_async<F>(&mut self, request: ReadRequest, callback: F) -> ClientResult<u32>
    where
        F: FnOnce(&mut Client, u32, ReadResponse) + 'static,
    {
        self.async_service(request, callback)
    }

    /// Writes node attributes without blocking.
    pub fn write_async<F>(&mut self, request: WriteRequest, callback: F) -> ClientResult<u32>
    where
        F: FnOnce(&mut Client, u32, WriteResponse) + 'static,
    {
        self.async_service(request, callback)
    }

    // =========================================================================
    // Method service set
    // =========================================================================

    service_shim! {
        /// Calls methods on objects.
        call: CallRequest => CallResponse
    }

    /// Calls methods without blocking.
    pub fn call_async<F>(&mut self, request: CallRequest, callback: F) -> ClientResult<u32>
    where
        F: FnOnce(&mut Client, u32, CallResponse) + 'static,
    {
        self.async_service(request, callback)
    }

    // =========================================================================
    // NodeManagement service set
    // =========================================================================

    service_shim! {
        /// Creates nodes in the server address space.
        add_nodes: AddNodesRequest => AddNodesResponse
    }

    service_shim! {
        /// Creates references between nodes.
        add_references: AddReferencesRequest => AddReferencesResponse
    }

    service_shim! {
        /// Deletes nodes from the server address space.
        delete_nodes: DeleteNodesRequest => DeleteNodesResponse
    }

    service_shim! {
        /// Deletes references between nodes.
        delete_references: DeleteReferencesRequest => DeleteReferencesResponse
    }

    // =========================================================================
    // View service set
    // =========================================================================

    service_shim! {
        /// Browses node references.
        browse: BrowseRequest => BrowseResponse
    }

    service_shim! {
        /// Continues a browse from continuation points.
        browse_next: BrowseNextRequest => BrowseNextResponse
    }

    service_shim! {
        /// Resolves browse paths to node ids.
        translate_browse_paths: TranslateBrowsePathsToNodeIdsRequest => TranslateBrowsePathsToNodeIdsResponse
    }

    service_shim! {
        /// Registers frequently used nodes.
        register_nodes: RegisterNodesRequest => RegisterNodesResponse
    }

    service_shim! {
        /// Releases registered nodes.
        unregister_nodes: UnregisterNodesRequest => UnregisterNodesResponse
    }

    /// Browses node references without blocking.
    pub fn browse_async<F>(&mut self, request: BrowseRequest, callback: F) -> ClientResult<u32>
    where
        F: FnOnce(&mut Client, u32, BrowseResponse) + 'static,
    {
        self.async_service(request, callback)
    }

    // =========================================================================
    // Query service set
    // =========================================================================

    service_shim! {
        /// Starts a query over the address space.
        query_first: QueryFirstRequest => QueryFirstResponse
    }

    service_shim! {
        /// Continues a query from a continuation point.
        query_next: QueryNextRequest => QueryNextResponse
    }

    // =========================================================================
    // Subscription service set
    // =========================================================================

    /// Creates a subscription. On success the publish pump resumes and is
    /// topped up immediately.
    pub fn create_subscription(
        &mut self,
        request: CreateSubscriptionRequest,
    ) -> CreateSubscriptionResponse {
        let response = self.service(request);
        if response.service_result().is_good() {
            self.pump.resume();
            self.publish_pump_tick();
        }
        response
    }

    service_shim! {
        /// Changes the settings of a subscription.
        modify_subscription: ModifySubscriptionRequest => ModifySubscriptionResponse
    }

    service_shim! {
        /// Enables or disables publishing for subscriptions.
        set_publishing_mode: SetPublishingModeRequest => SetPublishingModeResponse
    }

    service_shim! {
        /// Deletes subscriptions.
        delete_subscriptions: DeleteSubscriptionsRequest => DeleteSubscriptionsResponse
    }

    service_shim! {
        /// Requests queued notifications once, outside the pump.
        publish: PublishRequest => PublishResponse
    }

    service_shim! {
        /// Requests retransmission of a lost notification message.
        republish: RepublishRequest => RepublishResponse
    }

    /// Requests queued notifications without blocking.
    pub fn publish_async<F>(&mut self, request: PublishRequest, callback: F) -> ClientResult<u32>
    where
        F: FnOnce(&mut Client, u32, PublishResponse) + 'static,
    {
        self.async_service(request, callback)
    }

    // =========================================================================
    // MonitoredItem service set
    // =========================================================================

    service_shim! {
        /// Creates monitored items within a subscription.
        create_monitored_items: CreateMonitoredItemsRequest => CreateMonitoredItemsResponse
    }

    service_shim! {
        /// Modifies monitored items.
        modify_monitored_items: ModifyMonitoredItemsRequest => ModifyMonitoredItemsResponse
    }

    service_shim! {
        /// Changes the monitoring mode of monitored items.
        set_monitoring_mode: SetMonitoringModeRequest => SetMonitoringModeResponse
    }

    service_shim! {
        /// Deletes monitored items.
        delete_monitored_items: DeleteMonitoredItemsRequest => DeleteMonitoredItemsResponse
    }

    // =========================================================================
    // Discovery service set
    // =========================================================================

    /// Asks a server for its endpoints. Works connected or, from the
    /// disconnected state, over a transient secure channel without a
    /// session.
    pub fn get_endpoints(
        &mut self,
        server_url: &str,
        locale_ids: Vec<String>,
        profile_uris: Vec<String>,
    ) -> ClientResult<Vec<EndpointDescription>> {
        let request = GetEndpointsRequest {
            endpoint_url: server_url.to_string(),
            locale_ids,
            profile_uris,
            ..Default::default()
        };
        self.discovery_service("GetEndpoints", server_url, request)
            .map(|response| response.endpoints)
    }

    /// Asks a discovery server for the servers it knows, optionally
    /// filtered by server uri.
    pub fn find_servers(
        &mut self,
        server_url: &str,
        server_uris: Vec<String>,
        locale_ids: Vec<String>,
    ) -> ClientResult<Vec<ApplicationDescription>> {
        let request = FindServersRequest {
            endpoint_url: server_url.to_string(),
            locale_ids,
            server_uris,
            ..Default::default()
        };
        self.discovery_service("FindServers", server_url, request)
            .map(|response| response.servers)
    }

    /// Asks a local discovery server for the network-wide server list,
    /// with pagination and capability filtering.
    pub fn find_servers_on_network(
        &mut self,
        server_url: &str,
        starting_record_id: u32,
        max_records_to_return: u32,
        server_capability_filter: Vec<String>,
    ) -> ClientResult<Vec<ServerOnNetwork>> {
        let request = FindServersOnNetworkRequest {
            starting_record_id,
            max_records_to_return,
            server_capability_filter,
            ..Default::default()
        };
        self.discovery_service("FindServersOnNetwork", server_url, request)
            .map(|response| response.servers)
    }

    fn discovery_service<R: UaRequest>(
        &mut self,
        operation: &'static str,
        server_url: &str,
        request: R,
    ) -> ClientResult<R::Response> {
        let transient = self.state() == ClientState::Disconnected;
        if transient {
            if let Err(e) = self.open_secure_channel(server_url) {
                self.handle_channel_loss(ualink_types::StatusCode::BAD_SECURE_CHANNEL_CLOSED);
                return Err(e);
            }
        }

        let response = self.service(request);

        if transient {
            let _ = self.close();
        }

        let status = response.service_result();
        if status.is_bad() {
            return Err(ProtocolError::ServiceFailed { operation, status }.into());
        }
        Ok(response)
    }
}
