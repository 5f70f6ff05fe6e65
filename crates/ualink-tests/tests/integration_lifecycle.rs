// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connection lifecycle integration tests: the four-layer state machine,
//! graceful and faulted teardown, renewal, and sessionless discovery.

use std::time::{Duration, Instant};

use ualink_client::{Client, ClientConfig, ClientState};
use ualink_types::messages::{BrowseDescription, BrowseRequest, ReadRequest, ReadValueId, UaMessage};
use ualink_types::{NodeId, StatusCode};

use ualink_tests::common::TestSetup;

#[test]
fn test_connect_walks_the_layer_states() {
    let mut setup = TestSetup::build(|b| {
        b.request_timeout(Duration::from_secs(1))
            .secure_channel_lifetime(Duration::from_secs(10))
            .outstanding_publish_requests(0)
    });

    setup
        .client
        .connect("opc.tcp://127.0.0.1:4840")
        .expect("connect");
    assert_eq!(setup.client.state(), ClientState::Session);

    assert_eq!(
        setup.states.observed(),
        vec![
            ClientState::Disconnected,
            ClientState::Connected,
            ClientState::SecureChannel,
            ClientState::Session,
        ]
    );
    assert!(setup.server.session_active());
}

#[test]
fn test_disconnect_reaches_disconnected() {
    let mut setup = TestSetup::connected();
    setup.client.disconnect().expect("disconnect");
    assert_eq!(setup.client.state(), ClientState::Disconnected);
    assert!(!setup.server.session_active());
    // One Disconnected transition, after the connect progression.
    assert_eq!(setup.states.count_of(ClientState::Disconnected), 2);
}

#[test]
fn test_connect_twice_is_rejected() {
    let mut setup = TestSetup::connected();
    assert!(setup.client.connect("opc.tcp://127.0.0.1:4840").is_err());
    assert_eq!(setup.client.state(), ClientState::Session);
}

#[test]
fn test_connect_unreachable_endpoint() {
    let config = ClientConfig::builder()
        .request_timeout(Duration::from_millis(500))
        .build()
        .unwrap();
    let mut client = Client::new(config);

    let started = Instant::now();
    // Port 1 on localhost refuses immediately.
    let result = client.connect("opc.tcp://127.0.0.1:1");
    assert!(result.is_err());
    assert_eq!(client.state(), ClientState::Disconnected);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_connect_invalid_url() {
    let mut setup = TestSetup::build(|b| b);
    assert!(setup.client.connect("http://localhost:4840").is_err());
    assert_eq!(setup.client.state(), ClientState::Disconnected);
}

#[test]
fn test_connect_username_accepted() {
    let mut setup = TestSetup::build(|b| b.outstanding_publish_requests(0));
    setup.server.require_username("operator", "secret");

    setup
        .client
        .connect_username("opc.tcp://127.0.0.1:4840", "operator", "secret")
        .expect("authenticated connect");
    assert_eq!(setup.client.state(), ClientState::Session);
}

#[test]
fn test_connect_username_rejected_rolls_back() {
    let mut setup = TestSetup::build(|b| b.outstanding_publish_requests(0));
    setup.server.require_username("operator", "secret");

    let result = setup
        .client
        .connect_username("opc.tcp://127.0.0.1:4840", "operator", "wrong");
    assert!(result.is_err());
    assert_eq!(setup.client.state(), ClientState::Disconnected);
    assert!(!setup.server.session_active());
}

#[test]
fn test_manual_renew_moves_to_session_renewed() {
    let mut setup = TestSetup::connected();

    setup
        .client
        .manually_renew_secure_channel()
        .expect("manual renew");
    assert_eq!(setup.client.state(), ClientState::SessionRenewed);
    assert_eq!(setup.server.renew_count(), 1);

    // The next successful service call drops back to Session.
    let response = setup.client.read(ReadRequest {
        nodes_to_read: vec![ReadValueId::value_of(NodeId::numeric(0, 2258))],
        ..Default::default()
    });
    assert!(response.response_header.service_result.is_good());
    assert_eq!(setup.client.state(), ClientState::Session);
}

#[test]
fn test_automatic_renewal_at_75_percent_of_lifetime() {
    let mut setup = TestSetup::build(|b| {
        b.outstanding_publish_requests(0)
            .secure_channel_lifetime(Duration::from_secs(2))
    });
    setup.client.connect("opc.tcp://127.0.0.1:4840").unwrap();

    // 75% of a 2 s lifetime passes within this window; the renewal check
    // runs every lifetime/4 = 500 ms.
    setup.run_for(Duration::from_millis(1900));
    assert!(setup.server.renew_count() >= 1);
    assert!(setup.client.state().has_session());
}

#[test]
fn test_channel_loss_during_sync_call() {
    let mut setup = TestSetup::connected();
    setup.server.close_on_request(BrowseRequest::TYPE_ID);

    let started = Instant::now();
    let response = setup.client.browse(BrowseRequest {
        nodes_to_browse: vec![BrowseDescription {
            node_id: NodeId::numeric(0, 85),
            ..Default::default()
        }],
        ..Default::default()
    });

    assert_eq!(
        response.response_header.service_result,
        StatusCode::BAD_SECURE_CHANNEL_CLOSED
    );
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(setup.client.state(), ClientState::Disconnected);
    assert_eq!(setup.states.count_of(ClientState::Disconnected), 2);
    assert_eq!(setup.client.outstanding_requests(), 0);
}

#[test]
fn test_close_is_best_effort() {
    let mut setup = TestSetup::connected();
    setup.server.kill_connection();
    // Teardown steps fail against the dead connection, but close still
    // lands in Disconnected.
    let _ = setup.client.close();
    assert_eq!(setup.client.state(), ClientState::Disconnected);
}

#[test]
fn test_reset_returns_to_initial_state() {
    let mut setup = TestSetup::connected();
    setup.client.reset();
    assert_eq!(setup.client.state(), ClientState::Disconnected);
    assert_eq!(setup.client.outstanding_requests(), 0);

    // The client is usable again.
    setup.client.connect("opc.tcp://127.0.0.1:4840").unwrap();
    assert_eq!(setup.client.state(), ClientState::Session);
}

#[test]
fn test_get_endpoints_over_transient_channel() {
    let mut setup = TestSetup::build(|b| b.outstanding_publish_requests(0));

    let endpoints = setup
        .client
        .get_endpoints("opc.tcp://127.0.0.1:4840", Vec::new(), Vec::new())
        .expect("get endpoints");
    assert_eq!(endpoints.len(), 1);
    assert!(!endpoints[0].user_identity_tokens.is_empty());

    // No session was created and the client is back to Disconnected.
    assert!(!setup.server.session_active());
    assert_eq!(setup.client.state(), ClientState::Disconnected);
}

#[test]
fn test_find_servers_over_transient_channel() {
    let mut setup = TestSetup::build(|b| b.outstanding_publish_requests(0));

    let servers = setup
        .client
        .find_servers("opc.tcp://127.0.0.1:4840", Vec::new(), Vec::new())
        .expect("find servers");
    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0].application_uri, "urn:mock:server");
    assert_eq!(setup.client.state(), ClientState::Disconnected);
}

#[test]
fn test_find_servers_on_network_over_transient_channel() {
    let mut setup = TestSetup::build(|b| b.outstanding_publish_requests(0));

    let records = setup
        .client
        .find_servers_on_network("opc.tcp://127.0.0.1:4840", 0, 0, Vec::new())
        .expect("find servers on network");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].server_capabilities, vec!["LDS".to_string()]);
    assert_eq!(setup.client.state(), ClientState::Disconnected);
}

#[test]
fn test_get_endpoints_works_while_connected() {
    let mut setup = TestSetup::connected();
    let endpoints = setup
        .client
        .get_endpoints("opc.tcp://127.0.0.1:4840", Vec::new(), Vec::new())
        .expect("get endpoints");
    assert_eq!(endpoints.len(), 1);
    // The established session stays up.
    assert_eq!(setup.client.state(), ClientState::Session);
}
