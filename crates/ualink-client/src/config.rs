// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client configuration.
//!
//! A [`ClientConfig`] is immutable once the client is created. Plain settings
//! serialize with `serde`; the connection factory, state callback and custom
//! type codecs are runtime-only and skipped.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::ClientState;
use crate::connection::{Connection, EndpointUrl, TcpConnection};
use crate::error::{TransportError, UsageError};
use ualink_types::registry::CustomTypeCodec;

/// Observer invoked synchronously on every state transition.
pub type StateCallback = Box<dyn FnMut(ClientState)>;

/// Produces a connection for an endpoint.
pub struct ConnectionFactory(
    #[allow(clippy::type_complexity)]
    pub Box<dyn Fn(&EndpointUrl, &TransportConfig) -> Result<Box<dyn Connection>, TransportError>>,
);

impl Default for ConnectionFactory {
    fn default() -> Self {
        Self(Box::new(|endpoint, transport| {
            TcpConnection::open(endpoint, transport).map(|c| Box::new(c) as Box<dyn Connection>)
        }))
    }
}

impl fmt::Debug for ConnectionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConnectionFactory")
    }
}

// =============================================================================
// TransportConfig
// =============================================================================

/// Local transport parameters announced in the Hello message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Largest chunk this client will accept.
    #[serde(default = "default_buffer_size")]
    pub receive_buffer_size: u32,

    /// Largest chunk this client will send before negotiation.
    #[serde(default = "default_buffer_size")]
    pub send_buffer_size: u32,

    /// Largest assembled message accepted (0 = no limit).
    #[serde(default)]
    pub max_message_size: u32,

    /// Largest chunk count per message accepted (0 = no limit).
    #[serde(default)]
    pub max_chunk_count: u32,

    /// TCP connect timeout.
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
}

fn default_buffer_size() -> u32 {
    65_535
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            receive_buffer_size: default_buffer_size(),
            send_buffer_size: default_buffer_size(),
            max_message_size: 0,
            max_chunk_count: 0,
            connect_timeout: default_connect_timeout(),
        }
    }
}

// =============================================================================
// ClientConfig
// =============================================================================

/// Configuration of a [`crate::Client`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use ualink_client::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .request_timeout(Duration::from_secs(1))
///     .secure_channel_lifetime(Duration::from_secs(10))
///     .outstanding_publish_requests(0)
///     .build()
///     .unwrap();
/// assert_eq!(config.request_timeout, Duration::from_secs(1));
/// ```
#[derive(Serialize, Deserialize)]
pub struct ClientConfig {
    /// Deadline for synchronous service calls.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Upper bound for the negotiated secure-channel token lifetime.
    #[serde(default = "default_channel_lifetime", with = "humantime_serde")]
    pub secure_channel_lifetime: Duration,

    /// Requested session lifetime.
    #[serde(default = "default_session_timeout", with = "humantime_serde")]
    pub session_timeout: Duration,

    /// Local transport parameters.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Publish requests kept outstanding; 0 disables the pump.
    #[serde(default = "default_outstanding_publish_requests")]
    pub outstanding_publish_requests: u16,

    /// Cap on outstanding requests (0 = no cap).
    #[serde(default)]
    pub max_outstanding_requests: u32,

    /// Depth limit for re-entrant synchronous service calls.
    #[serde(default = "default_nesting_limit")]
    pub nesting_limit: u8,

    /// Application name sent in CreateSession.
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Application URI sent in CreateSession.
    #[serde(default = "default_application_uri")]
    pub application_uri: String,

    /// Session name sent in CreateSession.
    #[serde(default = "default_session_name")]
    pub session_name: String,

    /// Produces connections; defaults to plain TCP.
    #[serde(skip)]
    pub connection_factory: ConnectionFactory,

    /// Observer for state transitions.
    #[serde(skip)]
    pub state_callback: Option<StateCallback>,

    /// Codecs for server-specific extension-object types.
    #[serde(skip)]
    pub custom_types: Vec<Box<dyn CustomTypeCodec>>,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_channel_lifetime() -> Duration {
    Duration::from_secs(600)
}

fn default_session_timeout() -> Duration {
    Duration::from_secs(1200)
}

fn default_outstanding_publish_requests() -> u16 {
    10
}

fn default_nesting_limit() -> u8 {
    4
}

fn default_application_name() -> String {
    "ualink client".to_string()
}

fn default_application_uri() -> String {
    "urn:ualink:client".to_string()
}

fn default_session_name() -> String {
    "ualink session".to_string()
}

impl ClientConfig {
    /// Creates a configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), UsageError> {
        if self.request_timeout.is_zero() {
            return Err(UsageError::invalid_configuration(
                "request timeout must be greater than zero",
            ));
        }
        if self.secure_channel_lifetime < Duration::from_secs(1) {
            return Err(UsageError::invalid_configuration(
                "secure channel lifetime must be at least one second",
            ));
        }
        if self.nesting_limit == 0 {
            return Err(UsageError::invalid_configuration(
                "nesting limit must be at least 1",
            ));
        }
        if self.transport.receive_buffer_size < 8_192 || self.transport.send_buffer_size < 8_192 {
            return Err(UsageError::invalid_configuration(
                "transport buffers must be at least 8192 bytes",
            ));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            secure_channel_lifetime: default_channel_lifetime(),
            session_timeout: default_session_timeout(),
            transport: TransportConfig::default(),
            outstanding_publish_requests: default_outstanding_publish_requests(),
            max_outstanding_requests: 0,
            nesting_limit: default_nesting_limit(),
            application_name: default_application_name(),
            application_uri: default_application_uri(),
            session_name: default_session_name(),
            connection_factory: ConnectionFactory::default(),
            state_callback: None,
            custom_types: Vec::new(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("request_timeout", &self.request_timeout)
            .field("secure_channel_lifetime", &self.secure_channel_lifetime)
            .field("session_timeout", &self.session_timeout)
            .field(
                "outstanding_publish_requests",
                &self.outstanding_publish_requests,
            )
            .field("max_outstanding_requests", &self.max_outstanding_requests)
            .field("nesting_limit", &self.nesting_limit)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// ClientConfigBuilder
// =============================================================================

/// Builder for [`ClientConfig`].
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Sets the synchronous service deadline.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Sets the secure-channel lifetime upper bound.
    pub fn secure_channel_lifetime(mut self, lifetime: Duration) -> Self {
        self.config.secure_channel_lifetime = lifetime;
        self
    }

    /// Sets the requested session lifetime.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.config.session_timeout = timeout;
        self
    }

    /// Sets the local transport parameters.
    pub fn transport(mut self, transport: TransportConfig) -> Self {
        self.config.transport = transport;
        self
    }

    /// Sets the publish-pump target; 0 disables the pump.
    pub fn outstanding_publish_requests(mut self, count: u16) -> Self {
        self.config.outstanding_publish_requests = count;
        self
    }

    /// Caps outstanding requests; 0 removes the cap.
    pub fn max_outstanding_requests(mut self, cap: u32) -> Self {
        self.config.max_outstanding_requests = cap;
        self
    }

    /// Sets the re-entrancy depth limit.
    pub fn nesting_limit(mut self, limit: u8) -> Self {
        self.config.nesting_limit = limit;
        self
    }

    /// Sets the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.config.application_name = name.into();
        self
    }

    /// Sets the application URI.
    pub fn application_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.application_uri = uri.into();
        self
    }

    /// Sets the session name.
    pub fn session_name(mut self, name: impl Into<String>) -> Self {
        self.config.session_name = name.into();
        self
    }

    /// Replaces the connection factory.
    pub fn connection_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&EndpointUrl, &TransportConfig) -> Result<Box<dyn Connection>, TransportError>
            + 'static,
    {
        self.config.connection_factory = ConnectionFactory(Box::new(factory));
        self
    }

    /// Installs the state-change observer.
    pub fn state_callback<F>(mut self, callback: F) -> Self
    where
        F: FnMut(ClientState) + 'static,
    {
        self.config.state_callback = Some(Box::new(callback));
        self
    }

    /// Registers a codec for a server-specific extension-object type.
    pub fn custom_type(mut self, codec: impl CustomTypeCodec + 'static) -> Self {
        self.config.custom_types.push(Box::new(codec));
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<ClientConfig, UsageError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.secure_channel_lifetime, Duration::from_secs(600));
        assert_eq!(config.outstanding_publish_requests, 10);
        assert_eq!(config.nesting_limit, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_rejects_zero_timeout() {
        let result = ClientConfig::builder()
            .request_timeout(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let json = serde_json::json!({
            "request_timeout": "1s",
            "secure_channel_lifetime": "10s",
            "outstanding_publish_requests": 2
        });
        let config: ClientConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(1));
        assert_eq!(config.secure_channel_lifetime, Duration::from_secs(10));
        assert_eq!(config.outstanding_publish_requests, 2);
        // Skipped fields come back as defaults.
        assert!(config.state_callback.is_none());
    }
}
