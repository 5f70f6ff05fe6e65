// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! An in-process OPC UA server speaking real framed bytes.
//!
//! The server lives behind the client's connection factory: `send` feeds a
//! request into the server core, which parses frames, reassembles chunks
//! and queues encoded response frames; `receive` drains that queue. All of
//! the client's framing, chunking and codec paths are exercised end to end
//! without a socket.
//!
//! Behavior is scripted per test:
//!
//! - swallow requests by type (timeout paths)
//! - close the connection upon a request type (channel-loss paths)
//! - hold responses and release them in any order (out-of-order delivery)
//! - queue publish requests and answer them on demand (the publish pump)

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use ualink_client::{Connection, ReceiveOutcome, TransportError};
use ualink_types::codec::{ByteString, DecodeCursor, UaDecode, UaEncode};
use ualink_types::messages::*;
use ualink_types::{
    DataValue, ExtensionObject, LocalizedText, NodeId, StatusCode, UaDateTime, Variant,
};

/// Channel id the server assigns.
const CHANNEL_ID: u32 = 7;

/// Chunk header overhead of a `MSG` frame.
const SYMMETRIC_OVERHEAD: usize = 24;

// =============================================================================
// Behavior switches
// =============================================================================

#[derive(Debug, Default)]
struct Behavior {
    /// Request type ids that never get a response.
    swallow: HashSet<u32>,

    /// Request type ids that kill the connection when received.
    close_on: HashSet<u32>,

    /// Hold service responses instead of queueing them for delivery.
    hold_responses: bool,

    /// Reject the N+1st queued publish with `BadTooManyPublishRequests`.
    max_publish_queue: Option<usize>,

    /// Credentials ActivateSession must present.
    require_username: Option<(String, String)>,
}

// =============================================================================
// ServerCore
// =============================================================================

// Held responses stay unframed; sequence numbers are assigned when the
// response is actually released, as a real server sends them.
struct HeldResponse {
    request_id: u32,
    type_id: u32,
    body: Vec<u8>,
}

struct ServerCore {
    behavior: Behavior,

    /// Bytes from the client not yet framed.
    inbound: Vec<u8>,

    /// Encoded frames awaiting `receive`.
    outbox: VecDeque<u8>,

    /// Service responses held back for ordered release.
    held: Vec<HeldResponse>,

    /// Publish requests queued until a notification is triggered.
    held_publishes: VecDeque<(u32, u32)>,

    /// Chunk reassembly per request id.
    partial: HashMap<u32, Vec<u8>>,

    closed: bool,

    /// Negotiated chunk limit (the client's receive buffer).
    chunk_limit: usize,

    token_id: u32,
    send_sequence: u32,
    next_session_counter: u32,

    session_active: bool,
    subscription_ids: Vec<u32>,
    next_notification_sequence: u32,

    /// Node store backing Read and Write.
    store: HashMap<NodeId, Variant>,

    // Interaction counters, for verification.
    read_count: u32,
    write_count: u32,
    publish_count: u32,
    renew_count: u32,

    /// Acknowledgements seen in the most recent publish request.
    last_acknowledgements: Vec<SubscriptionAcknowledgement>,

    /// Writes in arrival order.
    write_log: Vec<(NodeId, DataValue)>,
}

impl ServerCore {
    fn new() -> Self {
        let mut store = HashMap::new();
        // ns=0;i=2258 is the server's CurrentTime variable.
        store.insert(
            NodeId::numeric(0, 2258),
            Variant::DateTime(UaDateTime::now()),
        );
        Self {
            behavior: Behavior::default(),
            inbound: Vec::new(),
            outbox: VecDeque::new(),
            held: Vec::new(),
            held_publishes: VecDeque::new(),
            partial: HashMap::new(),
            closed: false,
            chunk_limit: 65_535,
            token_id: 0,
            send_sequence: 1,
            next_session_counter: 1,
            session_active: false,
            subscription_ids: Vec::new(),
            next_notification_sequence: 1,
            store,
            read_count: 0,
            write_count: 0,
            publish_count: 0,
            renew_count: 0,
            last_acknowledgements: Vec::new(),
            write_log: Vec::new(),
        }
    }

    // =========================================================================
    // Framing out
    // =========================================================================

    fn frame(kind: &[u8; 3], flag: u8, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(8 + payload.len());
        frame.extend_from_slice(kind);
        frame.push(flag);
        ((8 + payload.len()) as u32).encode(&mut frame);
        frame.extend_from_slice(payload);
        frame
    }

    fn push_frame(&mut self, frame: Vec<u8>) {
        self.outbox.extend(frame);
    }

    fn secure_frames(&mut self, request_id: u32, type_id: u32, body: &[u8]) -> Vec<Vec<u8>> {
        let mut payload = Vec::with_capacity(body.len() + 8);
        NodeId::numeric(0, type_id).encode(&mut payload);
        payload.extend_from_slice(body);

        let body_limit = self.chunk_limit.saturating_sub(SYMMETRIC_OVERHEAD).max(1);
        let chunk_count = payload.len().div_ceil(body_limit).max(1);

        let mut frames = Vec::with_capacity(chunk_count);
        let mut offset = 0;
        for index in 0..chunk_count {
            let end = (offset + body_limit).min(payload.len());
            let flag = if index + 1 == chunk_count { b'F' } else { b'C' };
            let sequence = self.send_sequence;
            self.send_sequence += 1;

            let mut chunk = Vec::new();
            CHANNEL_ID.encode(&mut chunk);
            self.token_id.encode(&mut chunk);
            sequence.encode(&mut chunk);
            request_id.encode(&mut chunk);
            chunk.extend_from_slice(&payload[offset..end]);
            frames.push(Self::frame(b"MSG", flag, &chunk));
            offset = end;
        }
        frames
    }

    fn flush_response(&mut self, request_id: u32, type_id: u32, body: &[u8]) {
        let frames = self.secure_frames(request_id, type_id, body);
        for frame in frames {
            self.push_frame(frame);
        }
    }

    fn respond<T: UaMessage>(&mut self, request_id: u32, response: &T) {
        let mut body = Vec::new();
        response.encode(&mut body);
        if self.behavior.hold_responses {
            self.held.push(HeldResponse {
                request_id,
                type_id: T::TYPE_ID,
                body,
            });
        } else {
            self.flush_response(request_id, T::TYPE_ID, &body);
        }
    }

    fn respond_fault(&mut self, request_id: u32, request_handle: u32, status: StatusCode) {
        let fault = ServiceFault {
            response_header: response_header(request_handle, status),
        };
        // Faults bypass the hold switch so scripted tests always see them.
        let mut body = Vec::new();
        fault.encode(&mut body);
        self.flush_response(request_id, ServiceFault::TYPE_ID, &body);
    }

    // =========================================================================
    // Framing in
    // =========================================================================

    fn ingest(&mut self, data: &[u8]) {
        self.inbound.extend_from_slice(data);
        loop {
            if self.inbound.len() < 8 {
                return;
            }
            let size = u32::from_le_bytes([
                self.inbound[4],
                self.inbound[5],
                self.inbound[6],
                self.inbound[7],
            ]) as usize;
            if self.inbound.len() < size {
                return;
            }
            let frame: Vec<u8> = self.inbound.drain(..size).collect();
            self.handle_frame(&frame);
        }
    }

    fn handle_frame(&mut self, frame: &[u8]) {
        let kind = [frame[0], frame[1], frame[2]];
        let flag = frame[3];
        let mut cur = DecodeCursor::new(&frame[8..]);

        match &kind {
            b"HEL" => {
                let hello = Hello::decode(&mut cur).expect("well-formed hello");
                self.chunk_limit = hello.receive_buffer_size.min(65_535) as usize;
                let ack = Acknowledge {
                    protocol_version: 0,
                    receive_buffer_size: hello.receive_buffer_size,
                    send_buffer_size: hello.send_buffer_size,
                    max_message_size: hello.max_message_size,
                    max_chunk_count: hello.max_chunk_count,
                };
                let mut body = Vec::new();
                ack.encode(&mut body);
                let ack_frame = Self::frame(b"ACK", b'F', &body);
                self.push_frame(ack_frame);
            }
            b"OPN" => {
                let _channel_id = cur.read_u32().expect("channel id");
                let _policy = String::decode(&mut cur).expect("policy uri");
                let _cert = ByteString::decode(&mut cur).expect("certificate");
                let _thumb = ByteString::decode(&mut cur).expect("thumbprint");
                let _sequence = cur.read_u32().expect("sequence");
                let request_id = cur.read_u32().expect("request id");
                let _type = NodeId::decode(&mut cur).expect("type id");
                let request =
                    OpenSecureChannelRequest::decode(&mut cur).expect("open request");

                if request.request_type == SecurityTokenRequestType::Renew {
                    self.renew_count += 1;
                }
                self.token_id += 1;
                let response = OpenSecureChannelResponse {
                    response_header: response_header(
                        request.request_header.request_handle,
                        StatusCode::GOOD,
                    ),
                    server_protocol_version: 0,
                    security_token: ChannelSecurityToken {
                        channel_id: CHANNEL_ID,
                        token_id: self.token_id,
                        created_at: UaDateTime::now(),
                        revised_lifetime: request.requested_lifetime,
                    },
                    server_nonce: ByteString::null(),
                };
                let mut body = Vec::new();
                response.encode(&mut body);

                let mut payload = Vec::new();
                CHANNEL_ID.encode(&mut payload);
                "http://opcfoundation.org/UA/SecurityPolicy#None"
                    .to_string()
                    .encode(&mut payload);
                ByteString::null().encode(&mut payload);
                ByteString::null().encode(&mut payload);
                let sequence = self.send_sequence;
                self.send_sequence += 1;
                sequence.encode(&mut payload);
                request_id.encode(&mut payload);
                OpenSecureChannelResponse::type_node_id().encode(&mut payload);
                payload.extend_from_slice(&body);
                let opn = Self::frame(b"OPN", b'F', &payload);
                self.push_frame(opn);
            }
            b"MSG" => {
                let _channel_id = cur.read_u32().expect("channel id");
                let _token_id = cur.read_u32().expect("token id");
                let _sequence = cur.read_u32().expect("sequence");
                let request_id = cur.read_u32().expect("request id");
                let piece = cur.read_bytes(cur.remaining()).expect("chunk body");

                let buffer = self.partial.entry(request_id).or_default();
                buffer.extend_from_slice(piece);
                if flag != b'F' {
                    return;
                }
                let payload = self.partial.remove(&request_id).unwrap_or_default();
                let mut cur = DecodeCursor::new(&payload);
                let type_node = NodeId::decode(&mut cur).expect("service type id");
                let type_id = type_node.as_numeric().expect("numeric type id");
                let body = payload[cur.position()..].to_vec();
                self.handle_service(request_id, type_id, &body);
            }
            b"CLO" => {
                self.session_active = false;
            }
            _ => panic!("unexpected frame type {:?}", kind),
        }
    }

    // =========================================================================
    // Services
    // =========================================================================

    fn handle_service(&mut self, request_id: u32, type_id: u32, body: &[u8]) {
        if self.behavior.close_on.contains(&type_id) {
            self.closed = true;
            return;
        }
        if self.behavior.swallow.contains(&type_id) {
            return;
        }

        let mut cur = DecodeCursor::new(body);
        let handle = RequestHeader::decode(&mut cur)
            .map(|h| h.request_handle)
            .unwrap_or_default();

        match type_id {
            CreateSessionRequest::TYPE_ID => {
                let request = decode::<CreateSessionRequest>(body);
                let counter = self.next_session_counter;
                self.next_session_counter += 1;
                let response = CreateSessionResponse {
                    response_header: response_header(handle, StatusCode::GOOD),
                    session_id: NodeId::numeric(1, 5000 + counter),
                    authentication_token: NodeId::opaque(0, vec![0xAA, 0xBB, counter as u8]),
                    revised_session_timeout: request.requested_session_timeout,
                    server_nonce: ByteString::new(vec![1u8; 32]),
                    server_endpoints: server_endpoints(),
                    ..Default::default()
                };
                self.respond(request_id, &response);
            }
            ActivateSessionRequest::TYPE_ID => {
                let request = decode::<ActivateSessionRequest>(body);
                match self.check_identity(&request.user_identity_token) {
                    Ok(()) => {
                        self.session_active = true;
                        let response = ActivateSessionResponse {
                            response_header: response_header(handle, StatusCode::GOOD),
                            server_nonce: ByteString::new(vec![2u8; 32]),
                            ..Default::default()
                        };
                        self.respond(request_id, &response);
                    }
                    Err(status) => self.respond_fault(request_id, handle, status),
                }
            }
            CloseSessionRequest::TYPE_ID => {
                self.session_active = false;
                let response = CloseSessionResponse {
                    response_header: response_header(handle, StatusCode::GOOD),
                };
                self.respond(request_id, &response);
            }
            ReadRequest::TYPE_ID => {
                let request = decode::<ReadRequest>(body);
                self.read_count += 1;
                let results = request
                    .nodes_to_read
                    .iter()
                    .map(|item| match self.store.get(&item.node_id) {
                        Some(value) => DataValue {
                            value: Some(value.clone()),
                            status: None,
                            source_timestamp: Some(UaDateTime::now()),
                            server_timestamp: Some(UaDateTime::now()),
                        },
                        None => DataValue::from_status(StatusCode::BAD_NODE_ID_UNKNOWN),
                    })
                    .collect();
                let response = ReadResponse {
                    response_header: response_header(handle, StatusCode::GOOD),
                    results,
                    diagnostic_infos: Vec::new(),
                };
                self.respond(request_id, &response);
            }
            WriteRequest::TYPE_ID => {
                let request = decode::<WriteRequest>(body);
                self.write_count += 1;
                let mut results = Vec::new();
                for write in &request.nodes_to_write {
                    if let Some(value) = write.value.value.clone() {
                        self.store.insert(write.node_id.clone(), value);
                    }
                    self.write_log
                        .push((write.node_id.clone(), write.value.clone()));
                    results.push(StatusCode::GOOD);
                }
                let response = WriteResponse {
                    response_header: response_header(handle, StatusCode::GOOD),
                    results,
                    diagnostic_infos: Vec::new(),
                };
                self.respond(request_id, &response);
            }
            BrowseRequest::TYPE_ID => {
                let request = decode::<BrowseRequest>(body);
                let results = request
                    .nodes_to_browse
                    .iter()
                    .map(|_| BrowseResult {
                        status_code: StatusCode::GOOD,
                        continuation_point: ByteString::null(),
                        references: vec![reference("Server", 2253)],
                    })
                    .collect();
                let response = BrowseResponse {
                    response_header: response_header(handle, StatusCode::GOOD),
                    results,
                    diagnostic_infos: Vec::new(),
                };
                self.respond(request_id, &response);
            }
            CreateSubscriptionRequest::TYPE_ID => {
                let request = decode::<CreateSubscriptionRequest>(body);
                let subscription_id = 1000 + self.subscription_ids.len() as u32;
                self.subscription_ids.push(subscription_id);
                let response = CreateSubscriptionResponse {
                    response_header: response_header(handle, StatusCode::GOOD),
                    subscription_id,
                    revised_publishing_interval: request.requested_publishing_interval,
                    revised_lifetime_count: request.requested_lifetime_count,
                    revised_max_keep_alive_count: request.requested_max_keep_alive_count,
                };
                self.respond(request_id, &response);
            }
            PublishRequest::TYPE_ID => {
                let request = decode::<PublishRequest>(body);
                self.publish_count += 1;
                if !request.subscription_acknowledgements.is_empty() {
                    self.last_acknowledgements = request.subscription_acknowledgements.clone();
                }
                if self.subscription_ids.is_empty() {
                    self.respond_fault(request_id, handle, StatusCode::BAD_NO_SUBSCRIPTION);
                } else if self
                    .behavior
                    .max_publish_queue
                    .is_some_and(|max| self.held_publishes.len() >= max)
                {
                    self.respond_fault(
                        request_id,
                        handle,
                        StatusCode::BAD_TOO_MANY_PUBLISH_REQUESTS,
                    );
                } else {
                    self.held_publishes.push_back((request_id, handle));
                }
            }
            GetEndpointsRequest::TYPE_ID => {
                let _request = decode::<GetEndpointsRequest>(body);
                let response = GetEndpointsResponse {
                    response_header: response_header(handle, StatusCode::GOOD),
                    endpoints: server_endpoints(),
                };
                self.respond(request_id, &response);
            }
            FindServersRequest::TYPE_ID => {
                let _request = decode::<FindServersRequest>(body);
                let response = FindServersResponse {
                    response_header: response_header(handle, StatusCode::GOOD),
                    servers: vec![application_description()],
                };
                self.respond(request_id, &response);
            }
            FindServersOnNetworkRequest::TYPE_ID => {
                let _request = decode::<FindServersOnNetworkRequest>(body);
                let response = FindServersOnNetworkResponse {
                    response_header: response_header(handle, StatusCode::GOOD),
                    last_counter_reset_time: UaDateTime::now(),
                    servers: vec![ServerOnNetwork {
                        record_id: 1,
                        server_name: "mock".to_string(),
                        discovery_url: "opc.tcp://mock:4840".to_string(),
                        server_capabilities: vec!["LDS".to_string()],
                    }],
                };
                self.respond(request_id, &response);
            }
            _ => {
                self.respond_fault(request_id, handle, StatusCode::BAD_SERVICE_UNSUPPORTED);
            }
        }
    }

    fn check_identity(&self, token: &ExtensionObject) -> Result<(), StatusCode> {
        match &self.behavior.require_username {
            None => Ok(()),
            Some((user, pass)) => {
                let token: UserNameIdentityToken = token
                    .decode_as()
                    .map_err(|_| StatusCode::BAD_IDENTITY_TOKEN_INVALID)?;
                if token.user_name == *user && token.password.as_bytes() == pass.as_bytes() {
                    Ok(())
                } else {
                    Err(StatusCode::BAD_IDENTITY_TOKEN_REJECTED)
                }
            }
        }
    }

    // =========================================================================
    // Scripted publishing
    // =========================================================================

    fn answer_publish(&mut self, notification_data: Vec<ExtensionObject>) -> bool {
        let Some((request_id, handle)) = self.held_publishes.pop_front() else {
            return false;
        };
        let sequence_number = self.next_notification_sequence;
        if !notification_data.is_empty() {
            self.next_notification_sequence += 1;
        }
        let subscription_id = self.subscription_ids.first().copied().unwrap_or(0);
        let response = PublishResponse {
            response_header: response_header(handle, StatusCode::GOOD),
            subscription_id,
            available_sequence_numbers: vec![sequence_number],
            more_notifications: false,
            notification_message: NotificationMessage {
                sequence_number,
                publish_time: UaDateTime::now(),
                notification_data,
            },
            results: Vec::new(),
            diagnostic_infos: Vec::new(),
        };
        self.respond(request_id, &response);
        true
    }
}

fn decode<T: UaDecode + Default>(body: &[u8]) -> T {
    let mut cur = DecodeCursor::new(body);
    T::decode(&mut cur).expect("well-formed request")
}

fn response_header(request_handle: u32, status: StatusCode) -> ResponseHeader {
    ResponseHeader {
        timestamp: UaDateTime::now(),
        request_handle,
        service_result: status,
        ..Default::default()
    }
}

fn application_description() -> ApplicationDescription {
    ApplicationDescription {
        application_uri: "urn:mock:server".to_string(),
        product_uri: "urn:mock".to_string(),
        application_name: LocalizedText::new("Mock Server"),
        application_type: ApplicationType::Server,
        discovery_urls: vec!["opc.tcp://mock:4840".to_string()],
        ..Default::default()
    }
}

fn server_endpoints() -> Vec<EndpointDescription> {
    vec![EndpointDescription {
        endpoint_url: "opc.tcp://mock:4840".to_string(),
        server: application_description(),
        security_mode: MessageSecurityMode::None,
        security_policy_uri: "http://opcfoundation.org/UA/SecurityPolicy#None".to_string(),
        user_identity_tokens: vec![
            UserTokenPolicy {
                policy_id: "anonymous".to_string(),
                token_type: UserTokenKind::Anonymous,
                ..Default::default()
            },
            UserTokenPolicy {
                policy_id: "username-plain".to_string(),
                token_type: UserTokenKind::UserName,
                ..Default::default()
            },
        ],
        ..Default::default()
    }]
}

fn reference(name: &str, id: u32) -> ReferenceDescription {
    ReferenceDescription {
        reference_type_id: NodeId::numeric(0, 35),
        is_forward: true,
        node_id: ualink_types::ExpandedNodeId::local(NodeId::numeric(0, id)),
        browse_name: ualink_types::QualifiedName::new(0, name),
        display_name: LocalizedText::new(name),
        node_class: 1,
        type_definition: ualink_types::ExpandedNodeId::default(),
    }
}

// =============================================================================
// MockServer
// =============================================================================

/// Handle a test keeps to script the server and inspect interactions.
#[derive(Clone)]
pub struct MockServer {
    core: Arc<Mutex<ServerCore>>,
}

impl MockServer {
    /// Creates a server with an empty script and the default node store.
    pub fn new() -> Self {
        Self {
            core: Arc::new(Mutex::new(ServerCore::new())),
        }
    }

    /// A connection to this server, for the client's connection factory.
    /// Connection-scoped state is reset, as for a fresh TCP connection;
    /// interaction counters and the node store persist.
    pub fn connection(&self) -> MockConnection {
        {
            let mut core = self.core.lock();
            core.closed = false;
            core.inbound.clear();
            core.outbox.clear();
            core.partial.clear();
            core.held.clear();
            core.held_publishes.clear();
            core.send_sequence = 1;
            core.session_active = false;
            core.subscription_ids.clear();
            core.next_notification_sequence = 1;
        }
        MockConnection {
            core: Arc::clone(&self.core),
        }
    }

    // ---- scripting ---------------------------------------------------------

    /// Never respond to requests of this type.
    pub fn swallow_requests(&self, type_id: u32) {
        self.core.lock().behavior.swallow.insert(type_id);
    }

    /// Kill the connection when a request of this type arrives.
    pub fn close_on_request(&self, type_id: u32) {
        self.core.lock().behavior.close_on.insert(type_id);
    }

    /// Kill the connection now.
    pub fn kill_connection(&self) {
        self.core.lock().closed = true;
    }

    /// Hold service responses for ordered release.
    pub fn hold_responses(&self, hold: bool) {
        self.core.lock().behavior.hold_responses = hold;
    }

    /// Releases held responses in the given positional order; each index
    /// refers to the arrival order of the held requests. Indices not
    /// listed stay held.
    pub fn release_held(&self, order: &[usize]) {
        let mut core = self.core.lock();
        let mut held: Vec<Option<HeldResponse>> =
            std::mem::take(&mut core.held).into_iter().map(Some).collect();
        for &index in order {
            if let Some(response) = held.get_mut(index).and_then(Option::take) {
                core.flush_response(response.request_id, response.type_id, &response.body);
            }
        }
        core.held = held.into_iter().flatten().collect();
    }

    /// Requires this username and password in ActivateSession.
    pub fn require_username(&self, user: &str, pass: &str) {
        self.core.lock().behavior.require_username = Some((user.to_string(), pass.to_string()));
    }

    /// Rejects queued publishes beyond `max` with
    /// `BadTooManyPublishRequests`.
    pub fn limit_publish_queue(&self, max: usize) {
        self.core.lock().behavior.max_publish_queue = Some(max);
    }

    /// Answers the oldest held publish with a data change notification.
    /// Returns `false` when no publish was queued.
    pub fn publish_data_change(&self, client_handle: u32, value: Variant) -> bool {
        let notification = DataChangeNotification {
            monitored_items: vec![MonitoredItemNotification {
                client_handle,
                value: DataValue {
                    value: Some(value),
                    ..Default::default()
                },
            }],
            diagnostic_infos: Vec::new(),
        };
        self.core
            .lock()
            .answer_publish(vec![ExtensionObject::from_message(&notification)])
    }

    /// Answers the oldest held publish with a keep-alive.
    pub fn publish_keep_alive(&self) -> bool {
        self.core.lock().answer_publish(Vec::new())
    }

    // ---- inspection --------------------------------------------------------

    /// Number of publish requests currently queued unanswered.
    pub fn held_publish_count(&self) -> usize {
        self.core.lock().held_publishes.len()
    }

    /// Number of service responses currently held.
    pub fn held_response_count(&self) -> usize {
        self.core.lock().held.len()
    }

    /// Read requests served.
    pub fn read_count(&self) -> u32 {
        self.core.lock().read_count
    }

    /// Write requests served.
    pub fn write_count(&self) -> u32 {
        self.core.lock().write_count
    }

    /// Publish requests received.
    pub fn publish_count(&self) -> u32 {
        self.core.lock().publish_count
    }

    /// Secure-channel renewals served.
    pub fn renew_count(&self) -> u32 {
        self.core.lock().renew_count
    }

    /// Acknowledgements carried by the most recent publish request.
    pub fn last_acknowledgements(&self) -> Vec<SubscriptionAcknowledgement> {
        self.core.lock().last_acknowledgements.clone()
    }

    /// The value last written to a node, if any.
    pub fn stored_value(&self, node_id: &NodeId) -> Option<Variant> {
        self.core.lock().store.get(node_id).cloned()
    }

    /// Every write served, in arrival order.
    pub fn write_log(&self) -> Vec<(NodeId, DataValue)> {
        self.core.lock().write_log.clone()
    }

    /// Seeds the node store.
    pub fn set_value(&self, node_id: NodeId, value: Variant) {
        self.core.lock().store.insert(node_id, value);
    }

    /// Whether a session is currently active.
    pub fn session_active(&self) -> bool {
        self.core.lock().session_active
    }
}

impl Default for MockServer {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// MockConnection
// =============================================================================

/// The client-side handle to an in-process [`MockServer`].
pub struct MockConnection {
    core: Arc<Mutex<ServerCore>>,
}

impl Connection for MockConnection {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut core = self.core.lock();
        if core.closed {
            return Err(TransportError::Closed);
        }
        core.ingest(data);
        Ok(())
    }

    fn receive(&mut self, timeout: Duration) -> Result<ReceiveOutcome, TransportError> {
        {
            let mut core = self.core.lock();
            if !core.outbox.is_empty() {
                let bytes: Vec<u8> = core.outbox.drain(..).collect();
                return Ok(ReceiveOutcome::Data(bytes));
            }
            if core.closed {
                return Ok(ReceiveOutcome::Closed);
            }
        }
        // Nothing queued; model the socket wait without holding the lock.
        std::thread::sleep(timeout.min(Duration::from_millis(2)));
        let mut core = self.core.lock();
        if !core.outbox.is_empty() {
            let bytes: Vec<u8> = core.outbox.drain(..).collect();
            return Ok(ReceiveOutcome::Data(bytes));
        }
        if core.closed {
            return Ok(ReceiveOutcome::Closed);
        }
        Ok(ReceiveOutcome::Timeout)
    }

    fn close(&mut self) {
        self.core.lock().closed = true;
    }
}
