// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The secure channel: OPC UA connection-protocol framing on top of a
//! [`Connection`].
//!
//! Responsibilities:
//!
//! - the HEL/ACK handshake and the limits it negotiates
//! - framing and chunking of outbound requests (`OPN`, `MSG`, `CLO`)
//! - reassembly and demultiplexing of inbound chunks by request id
//! - request-id and sequence-number allocation
//! - token lifetime tracking for renewal
//!
//! Under `SecurityPolicy#None` the symmetric keys are the identity, so
//! "security" reduces to the header layout; the structure still mirrors the
//! chunked secure conversation of Part 6.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use ualink_types::codec::{ByteString, DecodeCursor, UaDecode, UaEncode};
use ualink_types::messages::{
    Acknowledge, ChannelSecurityToken, ErrorMessage, Hello, OpenSecureChannelRequest,
    OpenSecureChannelResponse, UaMessage,
};
use ualink_types::{NodeId, StatusCode};

use crate::config::TransportConfig;
use crate::connection::{Connection, ReceiveOutcome};
use crate::error::{ClientResult, ProtocolError, TransportError};

/// URI of the security policy this channel speaks.
pub const SECURITY_POLICY_NONE: &str = "http://opcfoundation.org/UA/SecurityPolicy#None";

/// Fixed part of a `MSG`/`CLO` chunk: header, channel id, token id,
/// sequence header.
const SYMMETRIC_OVERHEAD: usize = 8 + 4 + 4 + 8;

const CHUNK_INTERMEDIATE: u8 = b'C';
const CHUNK_FINAL: u8 = b'F';
const CHUNK_ABORT: u8 = b'A';

// =============================================================================
// Inbound events
// =============================================================================

/// A fully reassembled inbound unit handed to the client.
#[derive(Debug)]
pub enum InboundEvent {
    /// A service response, keyed by the request id it answers.
    ServiceMessage {
        /// The request this answers.
        request_id: u32,
        /// Binary encoding id of the body.
        type_id: u32,
        /// The encoded body.
        body: Vec<u8>,
    },

    /// An OpenSecureChannel response (issue or renew).
    OpenChannelResponse(Box<OpenSecureChannelResponse>),

    /// The peer aborted one in-flight message.
    Abort {
        /// The aborted request.
        request_id: u32,
        /// Status the peer reported.
        status: StatusCode,
        /// Reason text.
        reason: String,
    },

    /// The peer reported a fatal connection error or closed the channel.
    ChannelFault {
        /// Status the peer reported.
        status: StatusCode,
        /// Reason text.
        reason: String,
    },
}

/// Result of one poll of the socket.
#[derive(Debug, Default)]
pub struct Polled {
    /// Reassembled events, in arrival order.
    pub events: Vec<InboundEvent>,

    /// `true` if any bytes arrived, even without a complete frame.
    pub received_bytes: bool,
}

// =============================================================================
// SecureChannel
// =============================================================================

struct ChunkSet {
    body: Vec<u8>,
    chunks: u32,
}

/// A secure channel over an owned connection.
pub struct SecureChannel {
    connection: Box<dyn Connection>,
    local: TransportConfig,
    /// Limits granted by the server's Acknowledge; `None` until then.
    remote: Option<Acknowledge>,

    channel_id: u32,
    token_id: u32,
    previous_token_id: u32,
    token_created_at: Instant,
    token_lifetime: Duration,

    next_request_id: u32,
    next_sequence_number: u32,
    expected_sequence_number: Option<u32>,

    accumulator: Vec<u8>,
    chunk_sets: HashMap<u32, ChunkSet>,
}

impl SecureChannel {
    /// Wraps a fresh connection. The handshake has not run yet.
    pub fn new(connection: Box<dyn Connection>, local: TransportConfig) -> Self {
        Self {
            connection,
            local,
            remote: None,
            channel_id: 0,
            token_id: 0,
            previous_token_id: 0,
            token_created_at: Instant::now(),
            token_lifetime: Duration::ZERO,
            next_request_id: 1,
            next_sequence_number: 1,
            expected_sequence_number: None,
            accumulator: Vec::new(),
            chunk_sets: HashMap::new(),
        }
    }

    /// The server-assigned channel id; 0 before the first open.
    pub fn channel_id(&self) -> u32 {
        self.channel_id
    }

    /// The current token id.
    pub fn token_id(&self) -> u32 {
        self.token_id
    }

    /// Direct access to the underlying connection.
    pub fn connection_mut(&mut self) -> &mut dyn Connection {
        self.connection.as_mut()
    }

    /// Allocates the next request id. Wraps to 1, never issues 0.
    pub fn next_request_id(&mut self) -> u32 {
        let id = self.next_request_id;
        self.next_request_id = match self.next_request_id.checked_add(1) {
            Some(next) => next,
            None => 1,
        };
        id
    }

    fn next_sequence_number(&mut self) -> u32 {
        let seq = self.next_sequence_number;
        self.next_sequence_number = self.next_sequence_number.wrapping_add(1).max(1);
        seq
    }

    // =========================================================================
    // Renewal timing
    // =========================================================================

    /// Returns `true` once 75% of the token lifetime has elapsed.
    pub fn needs_renewal(&self) -> bool {
        !self.token_lifetime.is_zero()
            && self.token_created_at.elapsed() >= self.token_lifetime.mul_f64(0.75)
    }

    /// Cadence for the renewal check callback.
    pub fn renew_check_interval(&self) -> Duration {
        (self.token_lifetime / 4)
            .min(Duration::from_secs(60))
            .max(Duration::from_millis(5))
    }

    /// Installs a granted token, keeping the previous id valid for messages
    /// already in flight.
    pub fn install_token(&mut self, token: &ChannelSecurityToken) {
        if self.token_id != 0 {
            self.previous_token_id = self.token_id;
        }
        self.channel_id = token.channel_id;
        self.token_id = token.token_id;
        self.token_created_at = Instant::now();
        self.token_lifetime = Duration::from_millis(u64::from(token.revised_lifetime));
        tracing::debug!(
            channel_id = token.channel_id,
            token_id = token.token_id,
            lifetime_ms = token.revised_lifetime,
            "security token installed"
        );
    }

    // =========================================================================
    // Handshake
    // =========================================================================

    /// Sends the Hello message and waits for the server's Acknowledge.
    pub fn handshake(&mut self, endpoint_url: &str, deadline: Instant) -> ClientResult<()> {
        let hello = Hello {
            protocol_version: 0,
            receive_buffer_size: self.local.receive_buffer_size,
            send_buffer_size: self.local.send_buffer_size,
            max_message_size: self.local.max_message_size,
            max_chunk_count: self.local.max_chunk_count,
            endpoint_url: endpoint_url.to_string(),
        };
        let mut body = Vec::new();
        hello.encode(&mut body);
        self.send_frame(*b"HEL", CHUNK_FINAL, &body)?;

        while self.remote.is_none() {
            let now = Instant::now();
            if now >= deadline {
                return Err(TransportError::timed_out(
                    "awaiting acknowledge",
                    self.local.connect_timeout,
                )
                .into());
            }
            let polled = self.poll((deadline - now).min(Duration::from_millis(50)))?;
            for event in polled.events {
                if let InboundEvent::ChannelFault { status, reason } = event {
                    return Err(ProtocolError::PeerError { status, reason }.into());
                }
            }
        }
        Ok(())
    }

    /// Largest chunk the server accepts from us.
    fn send_chunk_limit(&self) -> usize {
        let limit = self
            .remote
            .as_ref()
            .map(|ack| ack.receive_buffer_size)
            .unwrap_or(self.local.send_buffer_size);
        limit as usize
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    fn send_frame(&mut self, kind: [u8; 3], chunk: u8, payload: &[u8]) -> ClientResult<()> {
        let mut frame = Vec::with_capacity(8 + payload.len());
        frame.extend_from_slice(&kind);
        frame.push(chunk);
        ((8 + payload.len()) as u32).encode(&mut frame);
        frame.extend_from_slice(payload);
        self.connection.send(&frame)?;
        Ok(())
    }

    /// Sends an OpenSecureChannel request (issue or renew) as one `OPN`
    /// frame with the asymmetric security header of policy None.
    pub fn send_open(&mut self, request: &OpenSecureChannelRequest) -> ClientResult<u32> {
        let request_id = self.next_request_id();
        let sequence = self.next_sequence_number();

        let mut payload = Vec::new();
        self.channel_id.encode(&mut payload);
        SECURITY_POLICY_NONE.to_string().encode(&mut payload);
        ByteString::null().encode(&mut payload); // sender certificate
        ByteString::null().encode(&mut payload); // receiver thumbprint
        sequence.encode(&mut payload);
        request_id.encode(&mut payload);
        OpenSecureChannelRequest::type_node_id().encode(&mut payload);
        request.encode(&mut payload);

        self.send_frame(*b"OPN", CHUNK_FINAL, &payload)?;
        tracing::debug!(request_id, request_type = ?request.request_type, "open secure channel sent");
        Ok(request_id)
    }

    /// Frames and sends one service message, chunking as negotiated.
    /// All chunks of the message are sent contiguously.
    pub fn send_message(
        &mut self,
        request_id: u32,
        type_id: u32,
        body: &[u8],
    ) -> ClientResult<()> {
        self.send_secure(*b"MSG", request_id, type_id, body)
    }

    /// Sends a CloseSecureChannel request. The server does not answer.
    pub fn send_close(
        &mut self,
        request_id: u32,
        type_id: u32,
        body: &[u8],
    ) -> ClientResult<()> {
        self.send_secure(*b"CLO", request_id, type_id, body)
    }

    fn send_secure(
        &mut self,
        kind: [u8; 3],
        request_id: u32,
        type_id: u32,
        body: &[u8],
    ) -> ClientResult<()> {
        let mut payload = Vec::with_capacity(body.len() + 8);
        NodeId::numeric(0, type_id).encode(&mut payload);
        payload.extend_from_slice(body);

        if let Some(ack) = &self.remote {
            if ack.max_message_size != 0 && payload.len() > ack.max_message_size as usize {
                return Err(ProtocolError::MessageTooLarge {
                    size: payload.len(),
                    limit: ack.max_message_size as usize,
                }
                .into());
            }
        }

        let chunk_body_limit = self.send_chunk_limit().saturating_sub(SYMMETRIC_OVERHEAD);
        if chunk_body_limit == 0 {
            return Err(ProtocolError::MessageTooLarge {
                size: payload.len(),
                limit: self.send_chunk_limit(),
            }
            .into());
        }

        let chunk_count = payload.len().div_ceil(chunk_body_limit).max(1);
        if let Some(ack) = &self.remote {
            if ack.max_chunk_count != 0 && chunk_count > ack.max_chunk_count as usize {
                return Err(ProtocolError::ChunkLimitExceeded {
                    limit: ack.max_chunk_count,
                }
                .into());
            }
        }

        let mut offset = 0;
        for index in 0..chunk_count {
            let end = (offset + chunk_body_limit).min(payload.len());
            let flag = if index + 1 == chunk_count {
                CHUNK_FINAL
            } else {
                CHUNK_INTERMEDIATE
            };
            let sequence = self.next_sequence_number();

            let mut chunk = Vec::with_capacity(SYMMETRIC_OVERHEAD - 8 + end - offset);
            self.channel_id.encode(&mut chunk);
            self.token_id.encode(&mut chunk);
            sequence.encode(&mut chunk);
            request_id.encode(&mut chunk);
            chunk.extend_from_slice(&payload[offset..end]);
            self.send_frame(kind, flag, &chunk)?;
            offset = end;
        }
        tracing::trace!(request_id, type_id, chunks = chunk_count, bytes = payload.len(), "message sent");
        Ok(())
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    /// Waits up to `wait` for socket data and parses whatever arrived.
    pub fn poll(&mut self, wait: Duration) -> ClientResult<Polled> {
        match self.connection.receive(wait)? {
            ReceiveOutcome::Data(bytes) => {
                let events = self.feed(&bytes)?;
                Ok(Polled {
                    events,
                    received_bytes: true,
                })
            }
            ReceiveOutcome::Timeout => Ok(Polled::default()),
            ReceiveOutcome::Closed => Err(TransportError::Closed.into()),
        }
    }

    /// Appends raw bytes and parses all complete frames.
    pub fn feed(&mut self, bytes: &[u8]) -> ClientResult<Vec<InboundEvent>> {
        self.accumulator.extend_from_slice(bytes);
        let mut events = Vec::new();

        loop {
            if self.accumulator.len() < 8 {
                break;
            }
            let size =
                u32::from_le_bytes([self.accumulator[4], self.accumulator[5], self.accumulator[6], self.accumulator[7]])
                    as usize;
            if size < 8 {
                return Err(ProtocolError::Decoding(
                    ualink_types::CodecError::invalid("frame", "size below header length"),
                )
                .into());
            }
            if self.local.receive_buffer_size != 0 && size > self.local.receive_buffer_size as usize
            {
                return Err(ProtocolError::MessageTooLarge {
                    size,
                    limit: self.local.receive_buffer_size as usize,
                }
                .into());
            }
            if self.accumulator.len() < size {
                break;
            }

            let frame: Vec<u8> = self.accumulator.drain(..size).collect();
            if let Some(event) = self.parse_frame(&frame)? {
                events.push(event);
            }
        }
        Ok(events)
    }

    fn parse_frame(&mut self, frame: &[u8]) -> ClientResult<Option<InboundEvent>> {
        let kind = &frame[..3];
        let chunk_flag = frame[3];
        let mut cur = DecodeCursor::new(&frame[8..]);

        match kind {
            b"ACK" => {
                let ack = Acknowledge::decode(&mut cur).map_err(ProtocolError::Decoding)?;
                tracing::debug!(
                    send_buffer = ack.send_buffer_size,
                    receive_buffer = ack.receive_buffer_size,
                    "acknowledge received"
                );
                self.remote = Some(ack);
                Ok(None)
            }
            b"ERR" => {
                let error = ErrorMessage::decode(&mut cur).map_err(ProtocolError::Decoding)?;
                Ok(Some(InboundEvent::ChannelFault {
                    status: error.error,
                    reason: error.reason,
                }))
            }
            b"OPN" => {
                let _channel_id = cur.read_u32().map_err(ProtocolError::Decoding)?;
                let _policy = String::decode(&mut cur).map_err(ProtocolError::Decoding)?;
                let _sender_cert = ByteString::decode(&mut cur).map_err(ProtocolError::Decoding)?;
                let _thumbprint = ByteString::decode(&mut cur).map_err(ProtocolError::Decoding)?;
                let sequence = cur.read_u32().map_err(ProtocolError::Decoding)?;
                self.check_sequence(sequence)?;
                let _request_id = cur.read_u32().map_err(ProtocolError::Decoding)?;
                let type_id = NodeId::decode(&mut cur).map_err(ProtocolError::Decoding)?;

                if type_id != OpenSecureChannelResponse::type_node_id() {
                    return Err(ProtocolError::UnexpectedMessage {
                        expected: "OpenSecureChannelResponse",
                        got: type_id.to_string(),
                    }
                    .into());
                }
                let response =
                    OpenSecureChannelResponse::decode(&mut cur).map_err(ProtocolError::Decoding)?;
                Ok(Some(InboundEvent::OpenChannelResponse(Box::new(response))))
            }
            b"MSG" => self.parse_secure_chunk(chunk_flag, &mut cur),
            b"CLO" => Ok(Some(InboundEvent::ChannelFault {
                status: StatusCode::BAD_SECURE_CHANNEL_CLOSED,
                reason: "peer closed the secure channel".to_string(),
            })),
            other => Err(ProtocolError::UnexpectedMessage {
                expected: "HEL/ACK/ERR/OPN/MSG/CLO",
                got: String::from_utf8_lossy(other).into_owned(),
            }
            .into()),
        }
    }

    fn parse_secure_chunk(
        &mut self,
        chunk_flag: u8,
        cur: &mut DecodeCursor<'_>,
    ) -> ClientResult<Option<InboundEvent>> {
        let channel_id = cur.read_u32().map_err(ProtocolError::Decoding)?;
        if self.channel_id != 0 && channel_id != self.channel_id {
            return Err(ProtocolError::ChannelIdMismatch {
                expected: self.channel_id,
                got: channel_id,
            }
            .into());
        }
        let token_id = cur.read_u32().map_err(ProtocolError::Decoding)?;
        if token_id != self.token_id && token_id != self.previous_token_id {
            return Err(ProtocolError::TokenUnknown { token_id }.into());
        }
        let sequence = cur.read_u32().map_err(ProtocolError::Decoding)?;
        self.check_sequence(sequence)?;
        let request_id = cur.read_u32().map_err(ProtocolError::Decoding)?;

        match chunk_flag {
            CHUNK_ABORT => {
                self.chunk_sets.remove(&request_id);
                let status = StatusCode(cur.read_u32().map_err(ProtocolError::Decoding)?);
                let reason = String::decode(cur).map_err(ProtocolError::Decoding)?;
                tracing::warn!(request_id, %status, "message aborted by peer");
                Ok(Some(InboundEvent::Abort {
                    request_id,
                    status,
                    reason,
                }))
            }
            CHUNK_INTERMEDIATE | CHUNK_FINAL => {
                let piece = cur.read_bytes(cur.remaining()).map_err(ProtocolError::Decoding)?;
                let set = self.chunk_sets.entry(request_id).or_insert_with(|| ChunkSet {
                    body: Vec::new(),
                    chunks: 0,
                });
                set.chunks += 1;
                set.body.extend_from_slice(piece);

                if self.local.max_message_size != 0
                    && set.body.len() > self.local.max_message_size as usize
                {
                    let size = set.body.len();
                    self.chunk_sets.remove(&request_id);
                    return Err(ProtocolError::MessageTooLarge {
                        size,
                        limit: self.local.max_message_size as usize,
                    }
                    .into());
                }
                if self.local.max_chunk_count != 0 && set.chunks > self.local.max_chunk_count {
                    self.chunk_sets.remove(&request_id);
                    return Err(ProtocolError::ChunkLimitExceeded {
                        limit: self.local.max_chunk_count,
                    }
                    .into());
                }

                if chunk_flag == CHUNK_INTERMEDIATE {
                    return Ok(None);
                }

                let set = match self.chunk_sets.remove(&request_id) {
                    Some(set) => set,
                    None => return Ok(None),
                };
                let mut body_cur = DecodeCursor::new(&set.body);
                let type_node = NodeId::decode(&mut body_cur).map_err(ProtocolError::Decoding)?;
                let type_id = type_node.as_numeric().ok_or_else(|| {
                    ProtocolError::UnexpectedMessage {
                        expected: "numeric encoding id",
                        got: type_node.to_string(),
                    }
                })?;
                let body = set.body[body_cur.position()..].to_vec();
                Ok(Some(InboundEvent::ServiceMessage {
                    request_id,
                    type_id,
                    body,
                }))
            }
            other => Err(ProtocolError::UnexpectedMessage {
                expected: "chunk flag C/F/A",
                got: (other as char).to_string(),
            }
            .into()),
        }
    }

    fn check_sequence(&mut self, sequence: u32) -> Result<(), ProtocolError> {
        if let Some(expected) = self.expected_sequence_number {
            if sequence != expected {
                return Err(ProtocolError::SequenceMismatch {
                    expected,
                    got: sequence,
                });
            }
        }
        self.expected_sequence_number = Some(sequence.wrapping_add(1).max(1));
        Ok(())
    }

    /// Closes the underlying connection.
    pub fn close_connection(&mut self) {
        self.connection.close();
    }
}

impl std::fmt::Debug for SecureChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureChannel")
            .field("channel_id", &self.channel_id)
            .field("token_id", &self.token_id)
            .field("next_request_id", &self.next_request_id)
            .field("pending_chunk_sets", &self.chunk_sets.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct NullConnection;

    impl Connection for NullConnection {
        fn send(&mut self, _data: &[u8]) -> Result<(), TransportError> {
            Ok(())
        }

        fn receive(&mut self, _timeout: Duration) -> Result<ReceiveOutcome, TransportError> {
            Ok(ReceiveOutcome::Timeout)
        }

        fn close(&mut self) {}
    }

    fn channel() -> SecureChannel {
        SecureChannel::new(Box::new(NullConnection), TransportConfig::default())
    }

    #[test]
    fn test_request_id_wraps_to_one() {
        let mut ch = channel();
        assert_eq!(ch.next_request_id(), 1);
        assert_eq!(ch.next_request_id(), 2);
        ch.next_request_id = u32::MAX;
        assert_eq!(ch.next_request_id(), u32::MAX);
        assert_eq!(ch.next_request_id(), 1);
    }

    #[test]
    fn test_renewal_threshold() {
        let mut ch = channel();
        assert!(!ch.needs_renewal());
        ch.install_token(&ChannelSecurityToken {
            channel_id: 7,
            token_id: 1,
            created_at: Default::default(),
            revised_lifetime: 100_000,
        });
        assert!(!ch.needs_renewal());
        // Pretend the token is 80% through its life.
        ch.token_created_at = Instant::now() - Duration::from_millis(80_000);
        assert!(ch.needs_renewal());
        assert_eq!(ch.renew_check_interval(), Duration::from_secs(25));
    }

    #[test]
    fn test_renew_check_interval_is_capped() {
        let mut ch = channel();
        ch.token_lifetime = Duration::from_secs(3_600);
        assert_eq!(ch.renew_check_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_sequence_check() {
        let mut ch = channel();
        assert!(ch.check_sequence(5).is_ok());
        assert!(ch.check_sequence(6).is_ok());
        let err = ch.check_sequence(9).unwrap_err();
        assert!(matches!(err, ProtocolError::SequenceMismatch { expected: 7, got: 9 }));
    }

    #[test]
    fn test_feed_waits_for_complete_frame() {
        let mut ch = channel();
        // ACK frame split across two feeds.
        let ack = Acknowledge {
            protocol_version: 0,
            receive_buffer_size: 65_535,
            send_buffer_size: 65_535,
            max_message_size: 0,
            max_chunk_count: 0,
        };
        let mut body = Vec::new();
        ack.encode(&mut body);
        let mut frame = Vec::new();
        frame.extend_from_slice(b"ACKF");
        ((8 + body.len()) as u32).encode(&mut frame);
        frame.extend_from_slice(&body);

        let (first, second) = frame.split_at(10);
        assert!(ch.feed(first).unwrap().is_empty());
        assert!(ch.remote.is_none());
        assert!(ch.feed(second).unwrap().is_empty());
        assert_eq!(ch.remote.as_ref().unwrap().receive_buffer_size, 65_535);
    }

    #[test]
    fn test_unknown_frame_type_rejected() {
        let mut ch = channel();
        let mut frame = Vec::new();
        frame.extend_from_slice(b"XXXF");
        (8u32 + 2).encode(&mut frame);
        frame.extend_from_slice(&[0, 0]);
        assert!(ch.feed(&frame).is_err());
    }

    fn secure_frame(ch: &SecureChannel, flag: u8, sequence: u32, request_id: u32, body: &[u8]) -> Vec<u8> {
        let mut payload = Vec::new();
        ch.channel_id.encode(&mut payload);
        ch.token_id.encode(&mut payload);
        sequence.encode(&mut payload);
        request_id.encode(&mut payload);
        payload.extend_from_slice(body);

        let mut frame = Vec::new();
        frame.extend_from_slice(b"MSG");
        frame.push(flag);
        ((8 + payload.len()) as u32).encode(&mut frame);
        frame.extend_from_slice(&payload);
        frame
    }

    #[test]
    fn test_abort_chunk_discards_the_set() {
        let mut ch = channel();

        // An intermediate chunk opens a set for request 9.
        let partial = secure_frame(&ch, CHUNK_INTERMEDIATE, 1, 9, &[1, 2, 3]);
        assert!(ch.feed(&partial).unwrap().is_empty());
        assert_eq!(ch.chunk_sets.len(), 1);

        // The abort chunk carries a status and reason.
        let mut abort_body = Vec::new();
        StatusCode::BAD_REQUEST_TOO_LARGE.encode(&mut abort_body);
        "request grew too large".to_string().encode(&mut abort_body);
        let abort = secure_frame(&ch, CHUNK_ABORT, 2, 9, &abort_body);

        let events = ch.feed(&abort).unwrap();
        assert_eq!(ch.chunk_sets.len(), 0);
        assert!(matches!(
            events.as_slice(),
            [InboundEvent::Abort {
                request_id: 9,
                status: StatusCode::BAD_REQUEST_TOO_LARGE,
                ..
            }]
        ));
    }

    #[test]
    fn test_error_frame_becomes_channel_fault() {
        let mut ch = channel();
        let message = ErrorMessage {
            error: StatusCode::BAD_TCP_ENDPOINT_URL_INVALID,
            reason: "unknown endpoint".to_string(),
        };
        let mut body = Vec::new();
        message.encode(&mut body);
        let mut frame = Vec::new();
        frame.extend_from_slice(b"ERRF");
        ((8 + body.len()) as u32).encode(&mut frame);
        frame.extend_from_slice(&body);

        let events = ch.feed(&frame).unwrap();
        assert!(matches!(
            events.as_slice(),
            [InboundEvent::ChannelFault {
                status: StatusCode::BAD_TCP_ENDPOINT_URL_INVALID,
                ..
            }]
        ));
    }
}
