//! End-to-end scenario: event fan-out order. Three handlers registered in
//! order on the same event must observe every occurrence in that same
//! registration order (I7, §8).

mod common;

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use common::MockEngine;
use enginewire::ws::MessageChannel;
use enginewire::Session;
use serde_json::json;

#[test]
fn handlers_fire_in_registration_order_per_event() {
    let engine = MockEngine::start();
    let url = engine.ws_url("/devtools/page/events");

    const EVENTS: u64 = 10;

    let emitter = thread::spawn(move || {
        let mut conn = engine.accept();
        for seq in 0..EVENTS {
            conn.send_event("Test.tick", json!({ "seq": seq }));
            thread::sleep(Duration::from_millis(5));
        }
        // Keep the connection alive long enough for the assertions below,
        // then let the test's session.close() tear it down.
        thread::sleep(Duration::from_secs(2));
    });

    let session = Session::new(Duration::from_secs(5));
    let channel = MessageChannel::connect_url(&url, Duration::from_secs(2)).expect("connect to mock engine");
    session.attach_channel(channel);

    let log: Arc<Mutex<Vec<(u8, u64)>>> = Arc::new(Mutex::new(Vec::new()));
    let mut tokens = Vec::new();
    for handler_id in 1u8..=3 {
        let log = log.clone();
        tokens.push(session.on("Test.tick", move |ev| {
            let seq = ev.params["seq"].as_u64().expect("event missing seq");
            log.lock().unwrap().push((handler_id, seq));
        }));
    }

    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if log.lock().unwrap().len() as u64 >= EVENTS * 3 || Instant::now() > deadline {
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }

    let entries = log.lock().unwrap().clone();
    assert_eq!(entries.len() as u64, EVENTS * 3, "expected every handler to see every event exactly once");
    for (seq, chunk) in entries.chunks(3).enumerate() {
        assert_eq!(
            chunk,
            &[(1u8, seq as u64), (2, seq as u64), (3, seq as u64)],
            "handlers did not fire in registration order for event {seq}"
        );
    }

    drop(tokens);
    session.close(1000, "test done");
    let _ = emitter.join();
}
