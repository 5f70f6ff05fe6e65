// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The client: a four-layer connection lifecycle (TCP, secure channel,
//! session, renewed session) driven by a single-threaded cooperative event
//! loop.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Client                             │
//! │   connect / disconnect / service calls / run loop           │
//! └─────────────────────────────────────────────────────────────┘
//!        │                │                  │
//!        ▼                ▼                  ▼
//! ┌──────────────┐ ┌──────────────┐ ┌──────────────────┐
//! │ SecureChannel│ │ Multiplexer  │ │ TimerHeap        │
//! │ framing,     │ │ pending      │ │ repeated         │
//! │ chunking     │ │ requests     │ │ callbacks        │
//! └──────────────┘ └──────────────┘ └──────────────────┘
//! ```
//!
//! # Concurrency
//!
//! Strictly single threaded. All public operations and every callback run
//! on the thread driving [`Client::run`] or [`Client::run_iterate`]; the
//! only blocking point is the socket receive inside the loop. Synchronous
//! service calls suspend by re-entering the same loop until their request
//! id completes; nesting deeper than the configured limit fails with
//! `BadInternalError`.

use std::fmt;
use std::time::{Duration, Instant};

use rand::RngCore;
use serde::{Deserialize, Serialize};

use ualink_types::codec::{ByteString, DecodeCursor, UaDecode, UaEncode};
use ualink_types::messages::{
    ActivateSessionRequest, ApplicationDescription, ApplicationType, CloseSecureChannelRequest,
    CloseSessionRequest, CreateSessionRequest, MessageSecurityMode,
    OpenSecureChannelRequest, OpenSecureChannelResponse, RequestHeader,
    SecurityTokenRequestType, ServiceFault, UaMessage, UaRequest, UaResponse,
};
use ualink_types::registry::TypeRegistry;
use ualink_types::{LocalizedText, StatusCode, UaDateTime};

use crate::channel::{InboundEvent, SecureChannel};
use crate::config::ClientConfig;
use crate::connection::{Connection, EndpointUrl};
use crate::error::{ClientError, ClientResult, ProtocolError, TransportError, UsageError};
use crate::multiplex::{Multiplexer, MultiplexerStats, Responder, ServiceOutcome};
use crate::timers::TimerHeap;

mod services;
mod session;
mod subscription;

pub use session::SessionInfo;
pub use subscription::{NotificationHandler, PumpStats};

pub(crate) use session::Identity;
pub(crate) use subscription::PublishPump;

/// Step size for one blocking wait inside a pumping loop.
const PUMP_STEP: Duration = Duration::from_millis(50);

/// Next-timeout hint returned when no timer is armed.
const IDLE_TIMEOUT: Duration = Duration::from_millis(500);

/// Cadence of the publish-pump re-priming callback.
const PUMP_INTERVAL: Duration = Duration::from_secs(1);

// =============================================================================
// ClientState
// =============================================================================

/// Connection state of a client, one layer per variant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ClientState {
    /// No connection.
    #[default]
    Disconnected,

    /// A TCP connection to the server is open.
    Connected,

    /// A secure channel to the server is open.
    SecureChannel,

    /// A session with the server is open.
    Session,

    /// A session is open and the secure channel was renewed under it.
    SessionRenewed,
}

impl ClientState {
    /// Returns `true` once a secure channel is open.
    #[inline]
    pub fn has_channel(&self) -> bool {
        *self >= Self::SecureChannel
    }

    /// Returns `true` once a session is open.
    #[inline]
    pub fn has_session(&self) -> bool {
        *self >= Self::Session
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connected => write!(f, "Connected"),
            Self::SecureChannel => write!(f, "SecureChannel"),
            Self::Session => write!(f, "Session"),
            Self::SessionRenewed => write!(f, "SessionRenewed"),
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// An OPC UA client.
///
/// All state hangs off this value; dropping it closes the connection
/// best-effort.
pub struct Client {
    pub(crate) config: ClientConfig,
    registry: TypeRegistry,

    state: ClientState,
    pub(crate) channel: Option<SecureChannel>,
    pub(crate) session: Option<SessionInfo>,

    multiplexer: Multiplexer<Client>,
    timers: TimerHeap<Client>,
    pub(crate) pump: PublishPump,
    pub(crate) notification_handler: Option<NotificationHandler>,

    next_request_handle: u32,
    pump_depth: u8,

    renew_pending: bool,
    last_open_result: Option<StatusCode>,
    renew_timer: Option<u64>,
    pump_timer: Option<u64>,
}

impl Client {
    /// Creates a client from a configuration.
    pub fn new(mut config: ClientConfig) -> Self {
        let mut registry = TypeRegistry::new();
        for codec in config.custom_types.drain(..) {
            registry.register_boxed(codec);
        }
        let max_outstanding = config.max_outstanding_requests;
        Self {
            config,
            registry,
            state: ClientState::Disconnected,
            channel: None,
            session: None,
            multiplexer: Multiplexer::new(max_outstanding),
            timers: TimerHeap::new(),
            pump: PublishPump::default(),
            notification_handler: None,
            next_request_handle: 0,
            pump_depth: 0,
            renew_pending: false,
            last_open_result: None,
            renew_timer: None,
            pump_timer: None,
        }
    }

    /// The current connection state.
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// The established session, if any.
    pub fn session(&self) -> Option<&SessionInfo> {
        self.session.as_ref()
    }

    /// The registry resolving extension-object types.
    pub fn type_registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Multiplexer activity counters.
    pub fn request_stats(&self) -> MultiplexerStats {
        self.multiplexer.stats()
    }

    /// The underlying connection while one is open. Only valid while the
    /// client is at least `Connected`; check [`Client::state`].
    pub fn connection_mut(&mut self) -> Option<&mut dyn Connection> {
        self.channel.as_mut().map(|ch| ch.connection_mut())
    }

    /// Returns the client to its freshly-created state, closing any
    /// connection. The timer id counter is preserved so callback ids are
    /// never reused within one client.
    pub fn reset(&mut self) {
        let _ = self.close();
        self.timers.clear();
        self.multiplexer = Multiplexer::new(self.config.max_outstanding_requests);
        self.next_request_handle = 0;
        self.pump_depth = 0;
        self.last_open_result = None;
    }

    fn set_state(&mut self, new_state: ClientState) {
        if self.state == new_state {
            return;
        }
        tracing::info!(from = %self.state, to = %new_state, "client state changed");
        self.state = new_state;
        if let Some(callback) = self.config.state_callback.as_mut() {
            callback(new_state);
        }
    }

    fn channel_mut(&mut self) -> ClientResult<&mut SecureChannel> {
        self.channel
            .as_mut()
            .ok_or_else(|| TransportError::NotConnected.into())
    }

    // =========================================================================
    // Connect
    // =========================================================================

    /// Connects with an anonymous identity: opens TCP, performs the
    /// HEL/ACK handshake, opens a secure channel under policy None, then
    /// creates and activates a session.
    pub fn connect(&mut self, endpoint_url: &str) -> ClientResult<()> {
        self.connect_with_identity(endpoint_url, Identity::Anonymous)
    }

    /// Like [`Client::connect`] but activates the session with a username
    /// identity token.
    pub fn connect_username(
        &mut self,
        endpoint_url: &str,
        username: &str,
        password: &str,
    ) -> ClientResult<()> {
        self.connect_with_identity(
            endpoint_url,
            Identity::UserName {
                username: username.to_string(),
                password: password.to_string(),
            },
        )
    }

    fn connect_with_identity(
        &mut self,
        endpoint_url: &str,
        identity: Identity,
    ) -> ClientResult<()> {
        if self.state != ClientState::Disconnected {
            return Err(UsageError::invalid_state("connect", self.state).into());
        }
        tracing::info!(endpoint = endpoint_url, "connecting");
        let result = self
            .open_secure_channel(endpoint_url)
            .and_then(|_| self.establish_session(endpoint_url, identity));
        match result {
            Ok(()) => {
                self.start_publish_pump();
                Ok(())
            }
            Err(e) => {
                tracing::warn!(endpoint = endpoint_url, error = %e, "connect failed");
                self.handle_channel_loss(StatusCode::BAD_SECURE_CHANNEL_CLOSED);
                Err(e)
            }
        }
    }

    /// Opens TCP, the connection-protocol handshake and the secure
    /// channel. Used by `connect` and by sessionless discovery calls.
    pub(crate) fn open_secure_channel(&mut self, endpoint_url: &str) -> ClientResult<()> {
        let endpoint = EndpointUrl::parse(endpoint_url)?;
        let connection = (self.config.connection_factory.0)(&endpoint, &self.config.transport)?;
        self.channel = Some(SecureChannel::new(connection, self.config.transport.clone()));
        self.set_state(ClientState::Connected);

        let deadline = Instant::now() + self.config.request_timeout;
        self.channel_mut()?.handshake(endpoint_url, deadline)?;

        self.send_open_request(SecurityTokenRequestType::Issue)?;
        self.pump_until(deadline, |client| !client.renew_pending)?;
        match self.last_open_result {
            Some(status) if status.is_good() => {}
            other => {
                return Err(ProtocolError::ServiceFailed {
                    operation: "OpenSecureChannel",
                    status: other.unwrap_or(StatusCode::BAD_UNEXPECTED_ERROR),
                }
                .into());
            }
        }
        self.install_renew_timer()?;
        Ok(())
    }

    fn establish_session(&mut self, endpoint_url: &str, identity: Identity) -> ClientResult<()> {
        let mut nonce = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut nonce);

        let request = CreateSessionRequest {
            client_description: ApplicationDescription {
                application_uri: self.config.application_uri.clone(),
                application_name: LocalizedText::new(self.config.application_name.clone()),
                application_type: ApplicationType::Client,
                ..Default::default()
            },
            endpoint_url: endpoint_url.to_string(),
            session_name: self.config.session_name.clone(),
            client_nonce: ByteString(nonce),
            requested_session_timeout: self.config.session_timeout.as_millis() as f64,
            max_response_message_size: self.config.transport.max_message_size,
            ..Default::default()
        };
        let response = self.service(request);
        let status = response.service_result();
        if status.is_bad() {
            return Err(ProtocolError::ServiceFailed {
                operation: "CreateSession",
                status,
            }
            .into());
        }
        self.session = Some(SessionInfo {
            session_id: response.session_id.clone(),
            authentication_token: response.authentication_token.clone(),
            revised_timeout: Duration::from_millis(response.revised_session_timeout as u64),
        });

        let activate = ActivateSessionRequest {
            user_identity_token: identity.to_token(&response.server_endpoints),
            ..Default::default()
        };
        let response = self.service(activate);
        let status = response.service_result();
        if status.is_bad() {
            self.session = None;
            return Err(ProtocolError::ServiceFailed {
                operation: "ActivateSession",
                status,
            }
            .into());
        }
        self.set_state(ClientState::Session);
        tracing::info!("session activated");
        Ok(())
    }

    fn start_publish_pump(&mut self) {
        let target = self.config.outstanding_publish_requests;
        if target == 0 {
            return;
        }
        self.pump.start(target);
        if self.pump_timer.is_none() {
            let registered = self.timers.add(
                PUMP_INTERVAL,
                Box::new(|client: &mut Client| client.publish_pump_tick()),
                Instant::now(),
            );
            match registered {
                Ok(id) => self.pump_timer = Some(id),
                Err(e) => tracing::error!(error = %e, "publish pump callback rejected"),
            }
        }
    }

    // =========================================================================
    // Secure channel renewal
    // =========================================================================

    fn send_open_request(&mut self, request_type: SecurityTokenRequestType) -> ClientResult<()> {
        let mut request = OpenSecureChannelRequest {
            client_protocol_version: 0,
            request_type,
            security_mode: MessageSecurityMode::None,
            client_nonce: ByteString::null(),
            requested_lifetime: self.config.secure_channel_lifetime.as_millis() as u32,
            ..Default::default()
        };
        self.stamp_header(&mut request.request_header);
        self.last_open_result = None;
        self.renew_pending = true;
        let sent = self.channel_mut().and_then(|ch| ch.send_open(&request));
        if let Err(e) = sent {
            self.renew_pending = false;
            if e.is_fatal() {
                self.handle_channel_loss(StatusCode::BAD_SECURE_CHANNEL_CLOSED);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Renews the secure channel token immediately and waits for the
    /// server's answer. On success a fresh token is installed; with a
    /// session open the state moves to `SessionRenewed`.
    pub fn manually_renew_secure_channel(&mut self) -> ClientResult<()> {
        if !self.state.has_channel() {
            return Err(UsageError::invalid_state("renew secure channel", self.state).into());
        }
        let deadline = Instant::now() + self.config.request_timeout;
        self.send_open_request(SecurityTokenRequestType::Renew)?;
        self.pump_until(deadline, |client| !client.renew_pending)?;
        match self.last_open_result {
            Some(status) if status.is_good() => Ok(()),
            other => Err(ProtocolError::ServiceFailed {
                operation: "RenewSecureChannel",
                status: other.unwrap_or(StatusCode::BAD_UNEXPECTED_ERROR),
            }
            .into()),
        }
    }

    fn install_renew_timer(&mut self) -> ClientResult<()> {
        let interval = self.channel_mut()?.renew_check_interval();
        match self.renew_timer {
            Some(id) => {
                self.timers.change_interval(id, interval)?;
            }
            None => {
                let id = self.timers.add(
                    interval,
                    Box::new(|client: &mut Client| client.renewal_tick()),
                    Instant::now(),
                )?;
                self.renew_timer = Some(id);
            }
        }
        Ok(())
    }

    fn renewal_tick(&mut self) {
        let due = self
            .channel
            .as_ref()
            .map(|ch| ch.needs_renewal())
            .unwrap_or(false);
        if due && !self.renew_pending {
            tracing::info!("secure channel token at 75% of lifetime, renewing");
            if let Err(e) = self.send_open_request(SecurityTokenRequestType::Renew) {
                tracing::warn!(error = %e, "secure channel renewal failed to start");
            }
        }
    }

    fn handle_open_response(&mut self, response: OpenSecureChannelResponse) {
        self.renew_pending = false;
        let status = response.response_header.service_result;
        self.last_open_result = Some(status);

        if status.is_bad() {
            tracing::warn!(%status, "open secure channel failed");
            if self.state.has_channel() {
                // A failed renew invalidates the channel.
                self.handle_channel_loss(StatusCode::BAD_SECURE_CHANNEL_CLOSED);
            }
            return;
        }

        if let Some(channel) = self.channel.as_mut() {
            channel.install_token(&response.security_token);
        }
        match self.state {
            ClientState::Connected => self.set_state(ClientState::SecureChannel),
            ClientState::Session | ClientState::SessionRenewed => {
                self.set_state(ClientState::SessionRenewed)
            }
            _ => {}
        }
        if let Err(e) = self.install_renew_timer() {
            tracing::warn!(error = %e, "renew timer not rescheduled");
        }
    }

    // =========================================================================
    // Disconnect
    // =========================================================================

    /// Gracefully closes the session, the secure channel and the TCP
    /// connection, failing every outstanding request with `BadShutdown`.
    /// The client always ends `Disconnected`; the first teardown error is
    /// returned.
    pub fn disconnect(&mut self) -> ClientResult<()> {
        self.shutdown(true)
    }

    /// Like [`Client::disconnect`], but every teardown step is attempted
    /// regardless of earlier failures and errors are discarded.
    pub fn close(&mut self) -> ClientResult<()> {
        self.shutdown(false)
    }

    fn shutdown(&mut self, graceful: bool) -> ClientResult<()> {
        if self.state == ClientState::Disconnected {
            return Ok(());
        }
        tracing::info!(graceful, "shutting down");

        // Pending requests observe the shutdown before any teardown step.
        self.pump.reset();
        let thunks = self.multiplexer.fail_all(StatusCode::BAD_SHUTDOWN);
        for thunk in thunks {
            thunk(self);
        }

        let mut first_error: Option<ClientError> = None;

        if self.session.is_some() && self.channel.is_some() {
            let request = CloseSessionRequest {
                delete_subscriptions: true,
                ..Default::default()
            };
            let response = self.service(request);
            let status = response.service_result();
            if status.is_bad() && graceful {
                first_error = Some(
                    ProtocolError::ServiceFailed {
                        operation: "CloseSession",
                        status,
                    }
                    .into(),
                );
            }
        }
        self.session = None;

        if self.channel.is_some() {
            let mut request = CloseSecureChannelRequest::default();
            self.stamp_header(&mut request.request_header);
            let mut body = Vec::new();
            request.encode(&mut body);
            if let Ok(channel) = self.channel_mut() {
                let request_id = channel.next_request_id();
                if let Err(e) =
                    channel.send_close(request_id, CloseSecureChannelRequest::TYPE_ID, &body)
                {
                    if graceful && first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(mut channel) = self.channel.take() {
            channel.close_connection();
        }
        self.renew_pending = false;
        self.remove_internal_timers();
        self.set_state(ClientState::Disconnected);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn remove_internal_timers(&mut self) {
        if let Some(id) = self.renew_timer.take() {
            let _ = self.timers.remove(id);
        }
        if let Some(id) = self.pump_timer.take() {
            let _ = self.timers.remove(id);
        }
    }

    /// Tears everything down after a transport or protocol fault, failing
    /// every outstanding request with `status`.
    pub(crate) fn handle_channel_loss(&mut self, status: StatusCode) {
        if let Some(mut channel) = self.channel.take() {
            channel.close_connection();
        }
        self.session = None;
        self.renew_pending = false;
        self.pump.reset();
        self.remove_internal_timers();

        let thunks = self.multiplexer.fail_all(status);
        self.set_state(ClientState::Disconnected);
        for thunk in thunks {
            thunk(self);
        }
    }

    // =========================================================================
    // Event loop
    // =========================================================================

    /// Drives the client: drains the socket for up to `timeout`, fails
    /// requests past their deadline, runs due repeated callbacks, and
    /// returns how long the caller may wait before the next call.
    ///
    /// Fatal transport or protocol errors tear the connection down (every
    /// pending request is failed, the state observer sees `Disconnected`)
    /// and are then returned.
    pub fn run(&mut self, timeout: Duration) -> ClientResult<Duration> {
        let io_deadline = Instant::now() + timeout;

        // Without a connection there is no socket to block on; wait out the
        // window (bounded by the next timer) so callers can keep a plain
        // `run` loop without spinning.
        if self.channel.is_none() {
            let now = Instant::now();
            let mut wait = io_deadline.saturating_duration_since(now);
            if let Some(due) = self.timers.next_due() {
                wait = wait.min(due.saturating_duration_since(now));
            }
            if !wait.is_zero() {
                std::thread::sleep(wait);
            }
            return Ok(self.finish_iteration());
        }

        while self.channel.is_some() {
            let now = Instant::now();
            if now >= io_deadline {
                break;
            }
            let mut wait = io_deadline - now;
            if let Some(due) = self.timers.next_due() {
                if due <= now {
                    break;
                }
                wait = wait.min(due - now);
            }

            let polled = match self.channel.as_mut() {
                Some(channel) => channel.poll(wait),
                None => break,
            };
            match polled {
                Ok(polled) => {
                    let received = polled.received_bytes;
                    for event in polled.events {
                        self.dispatch_event(event);
                    }
                    if !received {
                        break;
                    }
                }
                Err(e) => {
                    if e.is_fatal() {
                        tracing::warn!(error = %e, "connection lost");
                        self.handle_channel_loss(StatusCode::BAD_SECURE_CHANNEL_CLOSED);
                    }
                    self.finish_iteration();
                    return Err(e);
                }
            }
        }
        Ok(self.finish_iteration())
    }

    /// Like [`Client::run`] without touching the socket; inbound bytes are
    /// injected with [`Client::process_binary_message`] instead.
    pub fn run_iterate(&mut self) -> ClientResult<Duration> {
        Ok(self.finish_iteration())
    }

    /// Injects bytes received out-of-band into the client, as if they had
    /// arrived on the socket. Completed messages are dispatched before
    /// returning, which may invoke asynchronous callbacks.
    pub fn process_binary_message(&mut self, message: &[u8]) -> ClientResult<()> {
        let events = match self.channel.as_mut() {
            Some(channel) => channel.feed(message),
            None => return Err(TransportError::NotConnected.into()),
        };
        match events {
            Ok(events) => {
                for event in events {
                    self.dispatch_event(event);
                }
                Ok(())
            }
            Err(e) => {
                if e.is_fatal() {
                    self.handle_channel_loss(StatusCode::BAD_SECURE_CHANNEL_CLOSED);
                }
                Err(e)
            }
        }
    }

    /// Deadline sweep and timer sweep; returns the next-timeout hint.
    fn finish_iteration(&mut self) -> Duration {
        let now = Instant::now();
        for thunk in self.multiplexer.expire(now) {
            thunk(self);
        }
        self.run_timer_sweep(now);
        self.next_timeout_hint(Instant::now())
    }

    fn run_timer_sweep(&mut self, now: Instant) {
        for id in self.timers.collect_due(now) {
            let Some(mut callback) = self.timers.take_callback(id) else {
                continue;
            };
            callback(self);
            self.timers.return_callback(id, callback);
        }
    }

    fn next_timeout_hint(&mut self, now: Instant) -> Duration {
        match self.timers.next_due() {
            Some(due) => due.saturating_duration_since(now),
            None => IDLE_TIMEOUT,
        }
    }

    /// Pumps the loop until `done` or the deadline passes.
    fn pump_until(
        &mut self,
        deadline: Instant,
        done: impl Fn(&Client) -> bool,
    ) -> ClientResult<()> {
        while !done(self) {
            let now = Instant::now();
            if now >= deadline {
                return Err(
                    TransportError::timed_out("waiting for a response", self.config.request_timeout)
                        .into(),
                );
            }
            self.run((deadline - now).min(PUMP_STEP))?;
        }
        Ok(())
    }

    fn dispatch_event(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::ServiceMessage {
                request_id,
                type_id,
                body,
            } => {
                // Any service response proves the renewed channel works.
                if self.state == ClientState::SessionRenewed {
                    self.set_state(ClientState::Session);
                }
                if !self.multiplexer.is_pending(request_id) {
                    tracing::debug!(request_id, type_id, "response for unknown request dropped");
                    return;
                }
                let thunk = self
                    .multiplexer
                    .complete(request_id, ServiceOutcome::Message { type_id, body });
                if let Some(thunk) = thunk {
                    thunk(self);
                }
            }
            InboundEvent::OpenChannelResponse(response) => {
                self.handle_open_response(*response);
            }
            InboundEvent::Abort {
                request_id,
                status,
                reason,
            } => {
                tracing::warn!(request_id, %status, reason, "request aborted by server");
                let thunk = self.multiplexer.complete(
                    request_id,
                    ServiceOutcome::Fault(StatusCode::BAD_COMMUNICATION_ERROR),
                );
                if let Some(thunk) = thunk {
                    thunk(self);
                }
            }
            InboundEvent::ChannelFault { status, reason } => {
                tracing::error!(%status, reason, "secure channel fault");
                self.handle_channel_loss(StatusCode::BAD_SECURE_CHANNEL_CLOSED);
            }
        }
    }

    // =========================================================================
    // Timers
    // =========================================================================

    /// Registers a repeated callback. The first execution happens no later
    /// than `interval` from now; subsequent executions stay on the
    /// drift-free grid `t0 + n * interval`. The minimum interval is 5 ms.
    pub fn add_repeated_callback<F>(
        &mut self,
        interval: Duration,
        callback: F,
    ) -> Result<u64, UsageError>
    where
        F: FnMut(&mut Client) + 'static,
    {
        self.timers.add(interval, Box::new(callback), Instant::now())
    }

    /// Changes a repeated callback's interval, effective after its next
    /// scheduled execution.
    pub fn change_repeated_callback_interval(
        &mut self,
        callback_id: u64,
        interval: Duration,
    ) -> Result<(), UsageError> {
        self.timers.change_interval(callback_id, interval)
    }

    /// Removes a repeated callback. Calling this from inside the callback
    /// itself cancels all future executions.
    pub fn remove_repeated_callback(&mut self, callback_id: u64) -> Result<(), UsageError> {
        self.timers.remove(callback_id)
    }

    // =========================================================================
    // Generic service dispatch
    // =========================================================================

    fn stamp_header(&mut self, header: &mut RequestHeader) {
        header.authentication_token = self
            .session
            .as_ref()
            .map(|s| s.authentication_token.clone())
            .unwrap_or_default();
        header.timestamp = UaDateTime::now();
        if header.request_handle == 0 {
            self.next_request_handle = self.next_request_handle.checked_add(1).unwrap_or(1);
            header.request_handle = self.next_request_handle;
        }
        header.timeout_hint = self.config.request_timeout.as_millis() as u32;
    }

    fn dispatch_request(
        &mut self,
        type_id: u32,
        body: Vec<u8>,
        responder: Responder<Client>,
        deadline: Instant,
    ) -> ClientResult<u32> {
        let request_id = self.channel_mut()?.next_request_id();
        self.multiplexer.register(request_id, responder, deadline)?;

        let sent = self
            .channel_mut()
            .and_then(|ch| ch.send_message(request_id, type_id, &body));
        if let Err(e) = sent {
            self.multiplexer.remove(request_id);
            if e.is_fatal() {
                self.handle_channel_loss(StatusCode::BAD_SECURE_CHANNEL_CLOSED);
            }
            return Err(e);
        }
        tracing::debug!(request_id, type_id, "request dispatched");
        Ok(request_id)
    }

    /// Issues a service request and blocks until the response arrives, the
    /// deadline passes, or the channel is lost.
    ///
    /// This never returns an error: failures come back as a
    /// zero-initialized response whose header carries the status
    /// (`BadTimeout`, `BadSecureChannelClosed`, `BadServerNotConnected`,
    /// ...). The event loop keeps running while waiting, so timers fire
    /// and other responses are delivered; calls may re-enter from
    /// callbacks up to the configured nesting limit.
    pub fn service<R: UaRequest>(&mut self, mut request: R) -> R::Response {
        if self.pump_depth >= self.config.nesting_limit {
            let error = UsageError::NestingLimit {
                limit: self.config.nesting_limit,
            };
            tracing::warn!(depth = self.pump_depth, error = %error, "service call rejected");
            return R::Response::from_status(error.status_code());
        }
        if self.channel.is_none() {
            return R::Response::from_status(StatusCode::BAD_SERVER_NOT_CONNECTED);
        }

        self.stamp_header(request.request_header_mut());
        let mut body = Vec::new();
        request.encode(&mut body);
        let deadline = Instant::now() + self.config.request_timeout;

        let request_id = match self.dispatch_request(R::TYPE_ID, body, Responder::Sync, deadline) {
            Ok(id) => id,
            Err(e) => return R::Response::from_status(e.status_code()),
        };

        loop {
            if let Some(outcome) = self.multiplexer.take_sync_outcome(request_id) {
                return decode_outcome::<R::Response>(outcome);
            }
            let now = Instant::now();
            if now >= deadline {
                // The entry leaves the table before the caller sees the
                // timeout; a late response is dropped as unknown.
                self.multiplexer.remove(request_id);
                return R::Response::from_status(StatusCode::BAD_TIMEOUT);
            }

            self.pump_depth += 1;
            let pumped = self.run((deadline - now).min(PUMP_STEP));
            self.pump_depth -= 1;
            if pumped.is_err() {
                // Channel loss has already parked a fault for this entry;
                // the next loop iteration picks it up.
                continue;
            }
        }
    }

    /// Dispatches a service request and returns its request id without
    /// waiting. The callback is invoked exactly once from the event loop:
    /// with the decoded response, or with a zero-initialized response
    /// carrying `BadTimeout`, `BadShutdown` or `BadSecureChannelClosed` if
    /// the request can no longer complete. The deadline is the configured
    /// request timeout.
    pub fn async_service<R, F>(&mut self, request: R, callback: F) -> ClientResult<u32>
    where
        R: UaRequest,
        F: FnOnce(&mut Client, u32, R::Response) + 'static,
    {
        let timeout = self.config.request_timeout;
        self.async_service_with_timeout(request, timeout, callback)
    }

    /// Like [`Client::async_service`] with an explicit per-call deadline.
    /// Publish requests issued by the pump use this with a long timeout so
    /// they can stay outstanding across publishing intervals.
    pub fn async_service_with_timeout<R, F>(
        &mut self,
        mut request: R,
        timeout: Duration,
        callback: F,
    ) -> ClientResult<u32>
    where
        R: UaRequest,
        F: FnOnce(&mut Client, u32, R::Response) + 'static,
    {
        if self.channel.is_none() {
            return Err(TransportError::NotConnected.into());
        }
        self.stamp_header(request.request_header_mut());
        let mut body = Vec::new();
        request.encode(&mut body);
        let deadline = Instant::now() + timeout;

        let responder = Responder::Async(Box::new(
            move |client: &mut Client, request_id, outcome| {
                let response = decode_outcome::<R::Response>(outcome);
                callback(client, request_id, response);
            },
        ));
        self.dispatch_request(R::TYPE_ID, body, responder, deadline)
    }

    /// Number of requests currently awaiting a response.
    pub fn outstanding_requests(&self) -> usize {
        self.multiplexer.outstanding()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if self.state != ClientState::Disconnected {
            let _ = self.close();
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state)
            .field("outstanding_requests", &self.multiplexer.outstanding())
            .field("timers", &self.timers.len())
            .finish_non_exhaustive()
    }
}

/// Decodes a completed outcome into the typed response, synthesizing a
/// response with the failure status when the body cannot be used.
fn decode_outcome<Resp: UaResponse>(outcome: ServiceOutcome) -> Resp {
    match outcome {
        ServiceOutcome::Fault(status) => Resp::from_status(status),
        ServiceOutcome::Message { type_id, body } => {
            let mut cur = DecodeCursor::new(&body);
            if type_id == Resp::TYPE_ID {
                match Resp::decode(&mut cur) {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::warn!(error = %e, "response body failed to decode");
                        Resp::from_status(StatusCode::BAD_DECODING_ERROR)
                    }
                }
            } else if type_id == ServiceFault::TYPE_ID {
                match ServiceFault::decode(&mut cur) {
                    Ok(fault) => {
                        let mut response = Resp::default();
                        *response.response_header_mut() = fault.response_header;
                        if response.response_header().service_result.is_good() {
                            response.response_header_mut().service_result =
                                StatusCode::BAD_UNEXPECTED_ERROR;
                        }
                        response
                    }
                    Err(_) => Resp::from_status(StatusCode::BAD_DECODING_ERROR),
                }
            } else {
                tracing::warn!(type_id, "response of unexpected type");
                Resp::from_status(StatusCode::BAD_UNKNOWN_RESPONSE)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_ordering() {
        assert!(ClientState::Disconnected < ClientState::Connected);
        assert!(ClientState::Connected < ClientState::SecureChannel);
        assert!(ClientState::SecureChannel < ClientState::Session);
        assert!(ClientState::Session < ClientState::SessionRenewed);
        assert!(ClientState::SessionRenewed.has_session());
        assert!(!ClientState::Connected.has_channel());
    }

    #[test]
    fn test_new_client_is_disconnected() {
        let client = Client::new(ClientConfig::default());
        assert_eq!(client.state(), ClientState::Disconnected);
        assert!(client.session().is_none());
    }

    #[test]
    fn test_service_without_connection_synthesizes_response() {
        use ualink_types::messages::ReadRequest;

        let mut client = Client::new(ClientConfig::default());
        let response = client.service(ReadRequest::default());
        assert_eq!(
            response.response_header.service_result,
            StatusCode::BAD_SERVER_NOT_CONNECTED
        );
    }

    #[test]
    fn test_async_service_without_connection_errors() {
        use ualink_types::messages::ReadRequest;

        let mut client = Client::new(ClientConfig::default());
        let result = client.async_service(
            ReadRequest::default(),
            |_client, _id, _response: ualink_types::messages::ReadResponse| {},
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_timer_interval_boundary() {
        let mut client = Client::new(ClientConfig::default());
        assert!(client
            .add_repeated_callback(Duration::from_millis(4), |_| {})
            .is_err());
        let id = client
            .add_repeated_callback(Duration::from_millis(5), |_| {})
            .unwrap();
        client.remove_repeated_callback(id).unwrap();
    }

    #[test]
    fn test_run_iterate_returns_timer_hint() {
        let mut client = Client::new(ClientConfig::default());
        client
            .add_repeated_callback(Duration::from_millis(100), |_| {})
            .unwrap();
        let hint = client.run_iterate().unwrap();
        assert!(hint <= Duration::from_millis(100));
    }

    #[test]
    fn test_decode_outcome_fault() {
        use ualink_types::messages::ReadResponse;

        let response: ReadResponse =
            decode_outcome(ServiceOutcome::Fault(StatusCode::BAD_SHUTDOWN));
        assert_eq!(
            response.response_header.service_result,
            StatusCode::BAD_SHUTDOWN
        );
        assert!(response.results.is_empty());
    }

    #[test]
    fn test_decode_outcome_service_fault_body() {
        use ualink_types::messages::{ReadResponse, ResponseHeader};

        let fault = ServiceFault {
            response_header: ResponseHeader {
                service_result: StatusCode::BAD_SESSION_ID_INVALID,
                request_handle: 9,
                ..Default::default()
            },
        };
        let mut body = Vec::new();
        fault.encode(&mut body);

        let response: ReadResponse = decode_outcome(ServiceOutcome::Message {
            type_id: ServiceFault::TYPE_ID,
            body,
        });
        assert_eq!(
            response.response_header.service_result,
            StatusCode::BAD_SESSION_ID_INVALID
        );
        assert_eq!(response.response_header.request_handle, 9);
    }
}
