// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Publish pump integration tests: steady-state outstanding requests,
//! server backpressure, notification routing and acknowledgement echo.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use ualink_types::messages::{CreateSubscriptionRequest, UaResponse};
use ualink_types::Variant;

use ualink_tests::common::TestSetup;

fn connected_with_pump(target: u16) -> TestSetup {
    let mut setup = TestSetup::build(|b| b.outstanding_publish_requests(target));
    setup.client.connect("opc.tcp://127.0.0.1:4840").unwrap();
    setup
}

fn subscribe(setup: &mut TestSetup) -> u32 {
    let response = setup.client.create_subscription(CreateSubscriptionRequest {
        requested_publishing_interval: 100.0,
        requested_lifetime_count: 60,
        requested_max_keep_alive_count: 10,
        ..Default::default()
    });
    assert!(response.service_result().is_good());
    response.subscription_id
}

#[test]
fn test_pump_keeps_target_outstanding() {
    let mut setup = connected_with_pump(2);
    subscribe(&mut setup);

    // The pump tops up immediately after the subscription exists.
    setup.run_until(Duration::from_secs(2), |s| {
        s.server.held_publish_count() == 2
    });

    // Steady state: the count stays pinned at the target.
    for _ in 0..5 {
        setup.run_for(Duration::from_millis(100));
        assert_eq!(setup.server.held_publish_count(), 2);
        assert_eq!(setup.client.publish_requests_outstanding(), 2);
    }
}

#[test]
fn test_pump_tops_up_after_each_response() {
    let mut setup = connected_with_pump(2);
    let subscription_id = subscribe(&mut setup);

    let notifications: Arc<Mutex<Vec<(u32, u32)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&notifications);
    setup.client.set_notification_handler(move |sub_id, message| {
        sink.lock().push((sub_id, message.sequence_number));
    });

    setup.run_until(Duration::from_secs(2), |s| {
        s.server.held_publish_count() == 2
    });

    assert!(setup.server.publish_data_change(1, Variant::Int32(21)));
    setup.run_until(Duration::from_secs(2), |s| {
        !s.server.last_acknowledgements().is_empty()
    });

    // The notification reached the handler ...
    let observed = notifications.lock().clone();
    assert_eq!(observed, vec![(subscription_id, 1)]);
    // ... its sequence number was echoed in the next publish ...
    let acks = setup.server.last_acknowledgements();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].subscription_id, subscription_id);
    assert_eq!(acks[0].sequence_number, 1);
    // ... and the pump is back at its target.
    setup.run_until(Duration::from_secs(2), |s| {
        s.server.held_publish_count() == 2
    });
}

#[test]
fn test_keep_alives_are_not_acknowledged() {
    let mut setup = connected_with_pump(1);
    subscribe(&mut setup);

    setup.run_until(Duration::from_secs(2), |s| {
        s.server.held_publish_count() == 1
    });
    assert!(setup.server.publish_keep_alive());

    // The pump replaces the answered request without acknowledging the
    // keep-alive.
    setup.run_until(Duration::from_secs(2), |s| {
        s.server.held_publish_count() == 1
    });
    assert!(setup.server.last_acknowledgements().is_empty());
    assert_eq!(setup.client.publish_pump_stats().keep_alives, 1);
}

#[test]
fn test_server_backpressure_lowers_target_for_session_lifetime() {
    let mut setup = connected_with_pump(2);
    setup.server.limit_publish_queue(1);
    subscribe(&mut setup);

    // The second publish is rejected with BadTooManyPublishRequests; the
    // target drops to 1 and stays there.
    setup.run_until(Duration::from_secs(2), |s| {
        s.client.publish_pump_target() == 1
    });
    assert_eq!(setup.client.publish_pump_stats().target_reductions, 1);

    setup.run_for(Duration::from_millis(300));
    assert_eq!(setup.server.held_publish_count(), 1);
    assert_eq!(setup.client.publish_requests_outstanding(), 1);
}

#[test]
fn test_pump_halts_without_subscription() {
    let mut setup = connected_with_pump(2);

    // The pump's first cycle runs into BadNoSubscription and halts.
    setup.run_for(Duration::from_millis(1300));
    let after_halt = setup.server.publish_count();
    assert!(after_halt >= 1);
    assert_eq!(setup.server.held_publish_count(), 0);

    // No further publishes while halted.
    setup.run_for(Duration::from_millis(1300));
    assert_eq!(setup.server.publish_count(), after_halt);

    // Creating a subscription resumes the pump at once.
    subscribe(&mut setup);
    setup.run_until(Duration::from_secs(2), |s| {
        s.server.held_publish_count() == 2
    });
}

#[test]
fn test_pump_disabled_when_configured_off() {
    let mut setup = connected_with_pump(0);
    subscribe(&mut setup);

    setup.run_for(Duration::from_millis(1300));
    assert_eq!(setup.server.publish_count(), 0);
    assert_eq!(setup.client.publish_pump_target(), 0);
}

#[test]
fn test_disconnect_clears_outstanding_publishes() {
    let mut setup = connected_with_pump(2);
    subscribe(&mut setup);
    setup.run_until(Duration::from_secs(2), |s| {
        s.server.held_publish_count() == 2
    });

    setup.client.disconnect().expect("disconnect");
    assert_eq!(setup.client.outstanding_requests(), 0);
    assert_eq!(setup.client.publish_requests_outstanding(), 0);
}
