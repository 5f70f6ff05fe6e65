// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Event loop integration tests: repeated callbacks driven through
//! `Client::run`, interval semantics and cancellation.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use ualink_client::{Client, ClientConfig};

use ualink_tests::common::init_tracing;

fn timer_client() -> Client {
    init_tracing();
    Client::new(ClientConfig::builder().build().unwrap())
}

/// Drives `run` until `duration` has elapsed.
fn drive(client: &mut Client, duration: Duration) {
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        let _ = client.run(Duration::from_millis(10));
    }
}

#[test]
fn test_two_timers_fire_on_their_grids() {
    let mut client = timer_client();

    let fast = Rc::new(Cell::new(0u32));
    let slow = Rc::new(Cell::new(0u32));
    let fast_counter = Rc::clone(&fast);
    let slow_counter = Rc::clone(&slow);

    client
        .add_repeated_callback(Duration::from_millis(100), move |_| {
            fast_counter.set(fast_counter.get() + 1)
        })
        .unwrap();
    client
        .add_repeated_callback(Duration::from_millis(250), move |_| {
            slow_counter.set(slow_counter.get() + 1)
        })
        .unwrap();

    // Over one second: fires at 100..1000 and 250..1000 on the drift-free
    // grid, regardless of loop jitter.
    drive(&mut client, Duration::from_millis(1030));
    assert_eq!(fast.get(), 10);
    assert_eq!(slow.get(), 4);
}

#[test]
fn test_interval_boundary_values() {
    let mut client = timer_client();
    assert!(client
        .add_repeated_callback(Duration::from_millis(4), |_| {})
        .is_err());
    assert!(client
        .add_repeated_callback(Duration::from_millis(5), |_| {})
        .is_ok());
}

#[test]
fn test_callback_ids_are_unique_across_removal() {
    let mut client = timer_client();
    let a = client
        .add_repeated_callback(Duration::from_millis(50), |_| {})
        .unwrap();
    client.remove_repeated_callback(a).unwrap();
    let b = client
        .add_repeated_callback(Duration::from_millis(50), |_| {})
        .unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_interval_change_takes_effect_after_next_fire() {
    let mut client = timer_client();

    let count = Rc::new(Cell::new(0u32));
    let counter = Rc::clone(&count);
    let id = client
        .add_repeated_callback(Duration::from_millis(200), move |_| {
            counter.set(counter.get() + 1)
        })
        .unwrap();

    client
        .change_repeated_callback_interval(id, Duration::from_millis(50))
        .unwrap();

    // The fire already scheduled for t0+200 stays; the faster cadence
    // applies afterwards: 200, 250, 300, 350, 400 within 430 ms.
    drive(&mut client, Duration::from_millis(430));
    assert_eq!(count.get(), 5);
}

#[test]
fn test_removal_from_within_the_callback() {
    let mut client = timer_client();

    let count = Rc::new(Cell::new(0u32));
    let counter = Rc::clone(&count);
    let id_slot: Rc<Cell<u64>> = Rc::new(Cell::new(0));
    let id_in_cb = Rc::clone(&id_slot);

    let id = client
        .add_repeated_callback(Duration::from_millis(50), move |client| {
            counter.set(counter.get() + 1);
            client
                .remove_repeated_callback(id_in_cb.get())
                .expect("self-removal");
        })
        .unwrap();
    id_slot.set(id);

    drive(&mut client, Duration::from_millis(300));
    // Fired once, then never again.
    assert_eq!(count.get(), 1);
    assert!(client.remove_repeated_callback(id).is_err());
}

#[test]
fn test_callback_added_during_tick_waits_for_next_tick() {
    let mut client = timer_client();

    let log: Rc<std::cell::RefCell<Vec<&'static str>>> =
        Rc::new(std::cell::RefCell::new(Vec::new()));
    let outer_log = Rc::clone(&log);
    let spawned = Rc::new(Cell::new(false));
    let spawned_flag = Rc::clone(&spawned);

    client
        .add_repeated_callback(Duration::from_millis(50), move |client| {
            outer_log.borrow_mut().push("outer");
            if !spawned_flag.get() {
                spawned_flag.set(true);
                let inner_log = Rc::clone(&outer_log);
                client
                    .add_repeated_callback(Duration::from_millis(5), move |_| {
                        inner_log.borrow_mut().push("inner");
                    })
                    .unwrap();
            }
        })
        .unwrap();

    drive(&mut client, Duration::from_millis(70));
    let observed = log.borrow().clone();
    // The inner callback was registered mid-sweep and did not run in the
    // sweep that created it.
    assert_eq!(observed.first(), Some(&"outer"));
    assert!(observed.iter().filter(|s| **s == "inner").count() >= 1);
}

#[test]
fn test_run_returns_time_until_next_timer() {
    let mut client = timer_client();
    client
        .add_repeated_callback(Duration::from_millis(400), |_| {})
        .unwrap();

    let hint = client.run(Duration::from_millis(10)).unwrap();
    assert!(hint <= Duration::from_millis(400));
    assert!(hint > Duration::from_millis(100));
}
