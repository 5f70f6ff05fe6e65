// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Test harness: a client wired to an in-process mock server, with a
//! recorder for state transitions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use ualink_client::{Client, ClientConfig, ClientConfigBuilder, ClientState};

use super::mock_server::MockServer;

/// Initializes tracing once for the whole test binary.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Shared record of observed state transitions.
#[derive(Clone, Default)]
pub struct StateRecorder {
    states: Arc<Mutex<Vec<ClientState>>>,
}

impl StateRecorder {
    /// Creates a recorder seeded with the initial state.
    pub fn new() -> Self {
        let recorder = Self::default();
        recorder.states.lock().push(ClientState::Disconnected);
        recorder
    }

    fn push(&self, state: ClientState) {
        self.states.lock().push(state);
    }

    /// All states observed so far, starting with `Disconnected`.
    pub fn observed(&self) -> Vec<ClientState> {
        self.states.lock().clone()
    }

    /// How many times `state` was entered.
    pub fn count_of(&self, state: ClientState) -> usize {
        self.states.lock().iter().filter(|s| **s == state).count()
    }
}

/// A client connected to a scripted mock server.
pub struct TestSetup {
    /// The client under test.
    pub client: Client,

    /// Handle scripting the server.
    pub server: MockServer,

    /// Observed state transitions.
    pub states: StateRecorder,
}

impl TestSetup {
    /// Builds a client against a fresh mock server. `configure` adjusts
    /// the configuration builder before the client is created.
    pub fn build(configure: impl FnOnce(ClientConfigBuilder) -> ClientConfigBuilder) -> Self {
        init_tracing();
        let server = MockServer::new();
        let states = StateRecorder::new();

        let factory_server = server.clone();
        let callback_states = states.clone();
        let builder = ClientConfig::builder()
            .request_timeout(Duration::from_secs(1))
            .connection_factory(move |_endpoint, _transport| {
                Ok(Box::new(factory_server.connection()) as Box<dyn ualink_client::Connection>)
            })
            .state_callback(move |state| callback_states.push(state));

        let config = configure(builder).build().expect("valid test config");
        Self {
            client: Client::new(config),
            server,
            states,
        }
    }

    /// Builds and connects with the default test configuration (publish
    /// pump disabled).
    pub fn connected() -> Self {
        let mut setup = Self::build(|b| b.outstanding_publish_requests(0));
        setup
            .client
            .connect("opc.tcp://mock:4840")
            .expect("connect to mock server");
        setup
    }

    /// Pumps the client loop for `duration`.
    pub fn run_for(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while Instant::now() < deadline {
            let _ = self.client.run(Duration::from_millis(5));
        }
    }

    /// Pumps the client loop until `done` or the deadline; panics on
    /// timeout.
    pub fn run_until(&mut self, timeout: Duration, mut done: impl FnMut(&mut Self) -> bool) {
        let deadline = Instant::now() + timeout;
        loop {
            if done(self) {
                return;
            }
            assert!(Instant::now() < deadline, "condition not reached in time");
            let _ = self.client.run(Duration::from_millis(5));
        }
    }
}
