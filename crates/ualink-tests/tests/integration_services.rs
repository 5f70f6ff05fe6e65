// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Service call integration tests: the synchronous and asynchronous paths,
//! timeouts, out-of-order completion, backpressure, chunking and
//! re-entrancy.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use ualink_client::{Client, ClientState, TransportConfig};
use ualink_types::codec::ByteString;
use ualink_types::messages::{
    ReadRequest, ReadValueId, UaMessage, WriteRequest, WriteValue,
};
use ualink_types::{DataValue, NodeId, StatusCode, Variant};

use ualink_tests::common::TestSetup;

#[test]
fn test_read_server_time() {
    let mut setup = TestSetup::connected();

    let response = setup.client.read(ReadRequest {
        nodes_to_read: vec![ReadValueId::value_of(NodeId::numeric(0, 2258))],
        ..Default::default()
    });

    assert!(response.response_header.service_result.is_good());
    assert_eq!(response.results.len(), 1);
    let value = response.results[0].value.as_ref().expect("a value");
    assert!(matches!(value, Variant::DateTime(_)));
    assert_eq!(setup.server.read_count(), 1);
}

#[test]
fn test_request_handle_is_echoed() {
    let mut setup = TestSetup::connected();

    let mut request = ReadRequest {
        nodes_to_read: vec![ReadValueId::value_of(NodeId::numeric(0, 2258))],
        ..Default::default()
    };
    request.request_header.request_handle = 777;
    let response = setup.client.read(request);

    assert_eq!(response.response_header.request_handle, 777);
}

#[test]
fn test_write_then_read_back() {
    let mut setup = TestSetup::connected();
    let node = NodeId::string(2, "Setpoint");

    let response = setup.client.write(WriteRequest {
        nodes_to_write: vec![WriteValue::value_of(
            node.clone(),
            DataValue::new(Variant::Double(42.5)),
        )],
        ..Default::default()
    });
    assert_eq!(response.results, vec![StatusCode::GOOD]);

    let response = setup.client.read(ReadRequest {
        nodes_to_read: vec![ReadValueId::value_of(node)],
        ..Default::default()
    });
    assert_eq!(
        response.results[0].value,
        Some(Variant::Double(42.5))
    );
}

#[test]
fn test_read_unknown_node_carries_item_status() {
    let mut setup = TestSetup::connected();

    let response = setup.client.read(ReadRequest {
        nodes_to_read: vec![ReadValueId::value_of(NodeId::numeric(9, 1))],
        ..Default::default()
    });
    // The service succeeds; the item carries the failure.
    assert!(response.response_header.service_result.is_good());
    assert_eq!(
        response.results[0].status(),
        StatusCode::BAD_NODE_ID_UNKNOWN
    );
}

#[test]
fn test_sync_timeout_on_blackholed_request() {
    let mut setup = TestSetup::connected();
    setup.server.swallow_requests(ReadRequest::TYPE_ID);

    let started = Instant::now();
    let response = setup.client.read(ReadRequest {
        nodes_to_read: vec![ReadValueId::value_of(NodeId::numeric(0, 2258))],
        ..Default::default()
    });
    let elapsed = started.elapsed();

    assert_eq!(
        response.response_header.service_result,
        StatusCode::BAD_TIMEOUT
    );
    // Returned at the configured 1 s deadline, give or take scheduling.
    assert!(elapsed >= Duration::from_millis(950));
    assert!(elapsed < Duration::from_secs(3));
    // The pending entry was removed before the call returned.
    assert_eq!(setup.client.outstanding_requests(), 0);
}

#[test]
fn test_async_callbacks_fire_out_of_order_exactly_once() {
    let mut setup = TestSetup::connected();
    setup.server.hold_responses(true);

    let fired: Arc<Mutex<Vec<(u32, StatusCode)>>> = Arc::new(Mutex::new(Vec::new()));
    let mut request_ids = Vec::new();
    for n in 0..3u32 {
        let fired = Arc::clone(&fired);
        let id = setup
            .client
            .write_async(
                WriteRequest {
                    nodes_to_write: vec![WriteValue::value_of(
                        NodeId::string(2, format!("Tag{n}")),
                        DataValue::new(Variant::UInt32(n)),
                    )],
                    ..Default::default()
                },
                move |_client, request_id, response| {
                    fired
                        .lock()
                        .push((request_id, response.response_header.service_result));
                },
            )
            .expect("dispatch");
        request_ids.push(id);
    }
    assert_eq!(setup.server.held_response_count(), 3);
    assert!(fired.lock().is_empty());

    // Server answers in the order 3rd, 1st, 2nd.
    setup.server.release_held(&[2, 0, 1]);
    setup.run_until(Duration::from_secs(2), |_| fired.lock().len() == 3);

    let observed = fired.lock().clone();
    assert_eq!(
        observed.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
        vec![request_ids[2], request_ids[0], request_ids[1]]
    );
    assert!(observed.iter().all(|(_, status)| status.is_good()));
    // Nothing left pending, nothing fired twice.
    assert_eq!(setup.client.outstanding_requests(), 0);
    setup.run_for(Duration::from_millis(50));
    assert_eq!(fired.lock().len(), 3);
}

#[test]
fn test_async_requests_fail_with_bad_shutdown_on_disconnect() {
    let mut setup = TestSetup::connected();
    setup.server.hold_responses(true);

    let fired: Arc<Mutex<Vec<StatusCode>>> = Arc::new(Mutex::new(Vec::new()));
    for _ in 0..2 {
        let fired = Arc::clone(&fired);
        setup
            .client
            .read_async(ReadRequest::default(), move |_client, _id, response| {
                fired.lock().push(response.response_header.service_result);
            })
            .expect("dispatch");
    }

    setup.client.disconnect().expect("disconnect");
    assert_eq!(
        fired.lock().clone(),
        vec![StatusCode::BAD_SHUTDOWN, StatusCode::BAD_SHUTDOWN]
    );
}

#[test]
fn test_outstanding_request_cap() {
    let mut setup = TestSetup::build(|b| {
        b.outstanding_publish_requests(0)
            .max_outstanding_requests(2)
    });
    setup.client.connect("opc.tcp://127.0.0.1:4840").unwrap();
    setup.server.hold_responses(true);

    for _ in 0..2 {
        setup
            .client
            .read_async(ReadRequest::default(), |_, _, _| {})
            .expect("within cap");
    }
    let err = setup
        .client
        .read_async(ReadRequest::default(), |_, _, _| {})
        .expect_err("cap exceeded");
    assert_eq!(err.status_code(), StatusCode::BAD_TOO_MANY_OPERATIONS);

    // Draining one slot frees capacity.
    setup.server.release_held(&[0]);
    setup.run_until(Duration::from_secs(1), |s| {
        s.client.outstanding_requests() == 1
    });
    setup
        .client
        .read_async(ReadRequest::default(), |_, _, _| {})
        .expect("slot free again");
}

#[test]
fn test_large_payload_is_chunked_and_reassembled() {
    let mut setup = TestSetup::build(|b| {
        b.outstanding_publish_requests(0).transport(TransportConfig {
            receive_buffer_size: 8_192,
            send_buffer_size: 8_192,
            ..Default::default()
        })
    });
    setup.client.connect("opc.tcp://127.0.0.1:4840").unwrap();

    // Four chunks each way at an 8 KiB chunk size.
    let blob = ByteString::new(vec![0x5A; 30_000]);
    let node = NodeId::string(2, "Blob");

    let response = setup.client.write(WriteRequest {
        nodes_to_write: vec![WriteValue::value_of(
            node.clone(),
            DataValue::new(Variant::ByteString(blob.clone())),
        )],
        ..Default::default()
    });
    assert_eq!(response.results, vec![StatusCode::GOOD]);

    let response = setup.client.read(ReadRequest {
        nodes_to_read: vec![ReadValueId::value_of(node)],
        ..Default::default()
    });
    assert_eq!(
        response.results[0].value,
        Some(Variant::ByteString(blob))
    );
}

// Each level dispatches an async write whose callback issues a sync read,
// which pumps the loop and lets the next level's callback run inside it.
// The reads are blackholed, so every level stays suspended until the
// innermost one trips the nesting guard.
fn spawn_nesting_level(client: &mut Client, results: Arc<Mutex<Vec<StatusCode>>>, levels: u8) {
    if levels == 0 {
        return;
    }
    let _ = client.write_async(
        WriteRequest::default(),
        move |client, _id, _response| {
            spawn_nesting_level(client, Arc::clone(&results), levels - 1);
            let response = client.read(ReadRequest::default());
            results.lock().push(response.response_header.service_result);
        },
    );
}

#[test]
fn test_sync_nesting_limit() {
    let mut setup = TestSetup::build(|b| {
        b.outstanding_publish_requests(0)
            .request_timeout(Duration::from_millis(300))
    });
    setup.client.connect("opc.tcp://127.0.0.1:4840").unwrap();
    setup.server.swallow_requests(ReadRequest::TYPE_ID);

    let results: Arc<Mutex<Vec<StatusCode>>> = Arc::new(Mutex::new(Vec::new()));
    spawn_nesting_level(&mut setup.client, Arc::clone(&results), 5);
    setup.run_until(Duration::from_secs(5), |_| results.lock().len() == 5);

    let observed = results.lock().clone();
    // The innermost call is rejected by the depth guard; the four levels
    // above it run to their timeout.
    assert_eq!(observed[0], StatusCode::BAD_INTERNAL_ERROR);
    assert!(observed[1..]
        .iter()
        .all(|status| *status == StatusCode::BAD_TIMEOUT));
}

#[test]
fn test_service_after_disconnect_is_synthesized() {
    let mut setup = TestSetup::connected();
    setup.client.disconnect().unwrap();

    let response = setup.client.read(ReadRequest::default());
    assert_eq!(
        response.response_header.service_result,
        StatusCode::BAD_SERVER_NOT_CONNECTED
    );
    assert_eq!(setup.client.state(), ClientState::Disconnected);
}

#[test]
fn test_manual_transport_driving() {
    let mut setup = TestSetup::connected();

    let fired: Arc<Mutex<Vec<StatusCode>>> = Arc::new(Mutex::new(Vec::new()));
    let fired_in_cb = Arc::clone(&fired);
    setup
        .client
        .read_async(
            ReadRequest {
                nodes_to_read: vec![ReadValueId::value_of(NodeId::numeric(0, 2258))],
                ..Default::default()
            },
            move |_client, _id, response| {
                fired_in_cb
                    .lock()
                    .push(response.response_header.service_result);
            },
        )
        .expect("dispatch");

    // Pull the bytes off the connection by hand and inject them.
    let bytes = {
        let connection = setup.client.connection_mut().expect("connected");
        match connection.receive(Duration::from_millis(100)).unwrap() {
            ualink_client::ReceiveOutcome::Data(bytes) => bytes,
            other => panic!("expected data, got {other:?}"),
        }
    };
    setup
        .client
        .process_binary_message(&bytes)
        .expect("inject bytes");

    assert_eq!(fired.lock().clone(), vec![StatusCode::GOOD]);
    let hint = setup.client.run_iterate().expect("iterate");
    assert!(hint > Duration::ZERO);
}
