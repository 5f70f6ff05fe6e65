// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The transport seam.
//!
//! The client core talks to the network through the [`Connection`] trait:
//! `send` pushes raw bytes, `receive` blocks for at most a timeout and
//! returns whatever arrived. [`TcpConnection`] is the default
//! implementation; tests substitute in-process transports through the
//! connection factory in the configuration.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::TransportConfig;
use crate::error::TransportError;

/// Default port of the `opc.tcp` scheme.
pub const DEFAULT_PORT: u16 = 4840;

// =============================================================================
// EndpointUrl
// =============================================================================

/// A parsed `opc.tcp://host:port[/path]` endpoint url.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointUrl {
    /// Host name or address.
    pub host: String,

    /// TCP port.
    pub port: u16,

    /// Path component, including the leading slash; may be empty.
    pub path: String,

    /// The url as given.
    pub raw: String,
}

impl EndpointUrl {
    /// Parses an endpoint url.
    ///
    /// Only the `opc.tcp` scheme is accepted; the port defaults to 4840.
    pub fn parse(url: &str) -> Result<Self, TransportError> {
        let rest = url.strip_prefix("opc.tcp://").ok_or_else(|| {
            TransportError::invalid_endpoint(url, "url must start with opc.tcp://")
        })?;

        let (authority, path) = match rest.find('/') {
            Some(pos) => (&rest[..pos], &rest[pos..]),
            None => (rest, ""),
        };
        if authority.is_empty() {
            return Err(TransportError::invalid_endpoint(url, "missing host"));
        }

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port_str)) => {
                let port = port_str.parse::<u16>().map_err(|_| {
                    TransportError::invalid_endpoint(url, format!("invalid port '{port_str}'"))
                })?;
                (host, port)
            }
            None => (authority, DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(TransportError::invalid_endpoint(url, "missing host"));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            path: path.to_string(),
            raw: url.to_string(),
        })
    }

    /// The `host:port` authority.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for EndpointUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

// =============================================================================
// Connection
// =============================================================================

/// What a blocking receive produced.
#[derive(Debug)]
pub enum ReceiveOutcome {
    /// Bytes arrived.
    Data(Vec<u8>),

    /// Nothing arrived within the timeout.
    Timeout,

    /// The peer closed the connection.
    Closed,
}

/// A bidirectional byte transport.
///
/// A connection is valid between a successful open and `close`; the client
/// owns it exclusively and drops it on any transition to the disconnected
/// state.
pub trait Connection {
    /// Sends the whole buffer.
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Waits up to `timeout` for inbound bytes.
    fn receive(&mut self, timeout: Duration) -> Result<ReceiveOutcome, TransportError>;

    /// Closes the connection. Further calls fail.
    fn close(&mut self);
}

// =============================================================================
// TcpConnection
// =============================================================================

/// The default [`Connection`] over a plain TCP stream.
pub struct TcpConnection {
    stream: Option<TcpStream>,
    read_buffer: Vec<u8>,
}

impl TcpConnection {
    /// Opens a TCP connection to the endpoint.
    pub fn open(
        endpoint: &EndpointUrl,
        transport: &TransportConfig,
    ) -> Result<Self, TransportError> {
        let authority = endpoint.authority();
        let addrs: Vec<_> = authority
            .to_socket_addrs()
            .map_err(|e| TransportError::refused(&endpoint.raw, Some(e)))?
            .collect();

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, transport.connect_timeout) {
                Ok(stream) => {
                    stream
                        .set_nodelay(true)
                        .map_err(|e| TransportError::io("configuring socket", e))?;
                    tracing::debug!(endpoint = %endpoint.raw, %addr, "tcp connection open");
                    return Ok(Self {
                        stream: Some(stream),
                        read_buffer: vec![0; transport.receive_buffer_size as usize],
                    });
                }
                Err(e) => last_error = Some(e),
            }
        }
        Err(TransportError::refused(&endpoint.raw, last_error))
    }

    fn stream(&mut self) -> Result<&mut TcpStream, TransportError> {
        self.stream.as_mut().ok_or(TransportError::NotConnected)
    }
}

impl Connection for TcpConnection {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.stream()?
            .write_all(data)
            .map_err(|e| TransportError::io("sending", e))
    }

    fn receive(&mut self, timeout: Duration) -> Result<ReceiveOutcome, TransportError> {
        let read_buffer = &mut self.read_buffer;
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;

        // A zero read timeout means "block forever" to the OS; clamp to the
        // smallest effective wait instead.
        let effective = timeout.max(Duration::from_millis(1));
        stream
            .set_read_timeout(Some(effective))
            .map_err(|e| TransportError::io("configuring socket", e))?;

        match stream.read(read_buffer) {
            Ok(0) => Ok(ReceiveOutcome::Closed),
            Ok(n) => Ok(ReceiveOutcome::Data(self.read_buffer[..n].to_vec())),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(ReceiveOutcome::Timeout)
            }
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                Ok(ReceiveOutcome::Closed)
            }
            Err(e) => Err(TransportError::io("receiving", e)),
        }
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
    }
}

impl std::fmt::Debug for TcpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpConnection")
            .field("open", &self.stream.is_some())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_url() {
        let url = EndpointUrl::parse("opc.tcp://plc-01:4841/uadiscovery").unwrap();
        assert_eq!(url.host, "plc-01");
        assert_eq!(url.port, 4841);
        assert_eq!(url.path, "/uadiscovery");
        assert_eq!(url.authority(), "plc-01:4841");
    }

    #[test]
    fn test_parse_default_port() {
        let url = EndpointUrl::parse("opc.tcp://127.0.0.1").unwrap();
        assert_eq!(url.port, DEFAULT_PORT);
        assert!(url.path.is_empty());
    }

    #[test]
    fn test_parse_rejects_bad_urls() {
        assert!(EndpointUrl::parse("http://localhost:4840").is_err());
        assert!(EndpointUrl::parse("opc.tcp://").is_err());
        assert!(EndpointUrl::parse("opc.tcp://host:notaport").is_err());
    }

    #[test]
    fn test_refused_connection() {
        // Port 1 on localhost is almost certainly closed.
        let url = EndpointUrl::parse("opc.tcp://127.0.0.1:1").unwrap();
        let transport = TransportConfig {
            connect_timeout: Duration::from_millis(200),
            ..Default::default()
        };
        assert!(TcpConnection::open(&url, &transport).is_err());
    }
}
