//! End-to-end scenario: concurrent request/response correlation under load.
//! Many threads hammer one `Session` concurrently; every call must come back
//! with exactly its own result, never another thread's (§8).

mod common;

use std::thread;
use std::time::Duration;

use common::MockEngine;
use enginewire::ws::MessageChannel;
use enginewire::Session;
use serde_json::json;

#[test]
fn concurrent_requests_correlate_exactly_once() {
    let engine = MockEngine::start();
    let url = engine.ws_url("/devtools/page/echo");

    let responder = thread::spawn(move || {
        let mut conn = engine.accept();
        while let Some(req) = conn.recv_json() {
            let id = common::req_id(&req);
            let marker = req["params"]["marker"].clone();
            conn.respond(id, json!({ "marker": marker }));
        }
    });

    let session = Session::new(Duration::from_secs(5));
    let channel = MessageChannel::connect_url(&url, Duration::from_secs(2)).expect("connect to mock engine");
    session.attach_channel(channel);

    const THREADS: u64 = 8;
    const PER_THREAD: u64 = 200;

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let session = session.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let marker = t * PER_THREAD + i;
                    let result = session
                        .send("Echo.ping", json!({ "marker": marker }), Duration::from_secs(5))
                        .unwrap_or_else(|e| panic!("request {marker} failed: {e}"));
                    assert_eq!(
                        result["marker"].as_u64(),
                        Some(marker),
                        "response for request {marker} carried a different marker; ids are not correlating correctly"
                    );
                }
            })
        })
        .collect();

    for h in handles {
        h.join().expect("worker thread panicked");
    }

    session.close(1000, "test done");
    responder.join().expect("mock responder thread panicked");
}
