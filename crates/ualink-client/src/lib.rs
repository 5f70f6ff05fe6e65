// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Single-threaded OPC UA client core.
//!
//! This crate implements the state machine that establishes and maintains a
//! layered connection to an OPC UA server (TCP transport, secure channel,
//! session) and the request/response multiplexer driving synchronous and
//! asynchronous service calls over it, together with a cooperative event
//! loop dispatching repeated callbacks and inbound messages.
//!
//! # Components
//!
//! - [`Client`]: lifecycle, service entry points, the event loop
//! - [`channel::SecureChannel`]: framing, chunking, renewal timing
//! - [`multiplex::Multiplexer`]: the outstanding-request table
//! - [`timers::TimerHeap`]: drift-free repeated callbacks
//! - the publish pump: keeps Publish requests outstanding for prompt
//!   notification delivery
//!
//! # Concurrency
//!
//! Strictly single-threaded and cooperative: no internal threads, one
//! blocking point (the socket receive inside [`Client::run`]), and all
//! callbacks delivered on the driving thread. Callers needing concurrent
//! access must serialize externally.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use ualink_client::{Client, ClientConfig};
//! use ualink_types::messages::{ReadRequest, ReadValueId};
//! use ualink_types::NodeId;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::builder()
//!     .request_timeout(Duration::from_secs(1))
//!     .build()?;
//! let mut client = Client::new(config);
//! client.connect("opc.tcp://localhost:4840")?;
//!
//! let response = client.read(ReadRequest {
//!     nodes_to_read: vec![ReadValueId::value_of(NodeId::numeric(0, 2258))],
//!     ..Default::default()
//! });
//! println!("server time: {:?}", response.results);
//!
//! client.disconnect()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod channel;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod multiplex;
pub mod timers;

pub use client::{Client, ClientState, NotificationHandler, PumpStats, SessionInfo};
pub use config::{ClientConfig, ClientConfigBuilder, ConnectionFactory, TransportConfig};
pub use connection::{Connection, EndpointUrl, ReceiveOutcome, TcpConnection};
pub use error::{ClientError, ClientResult, ProtocolError, TransportError, UsageError};
pub use multiplex::MultiplexerStats;

// The wire-level types travel through the public API; re-export the crate
// so applications depend on one name.
pub use ualink_types as types;
