//! End-to-end scenario: interception arbitration. Three rules registered in
//! order; the first non-`Defer` verdict wins, and nothing past it runs
//! (§4.9, §8).

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use common::MockEngine;
use enginewire::command::CommandSurface;
use enginewire::intercept::{InterceptAction, Interceptor, MockResponse};
use enginewire::ws::MessageChannel;
use enginewire::Session;
use serde_json::{json, Value};

#[test]
fn first_non_defer_rule_wins_and_later_rules_are_skipped() {
    let engine = MockEngine::start();
    let url = engine.ws_url("/devtools/page/intercept");

    let log: Arc<Mutex<Vec<(String, Value)>>> = Arc::new(Mutex::new(Vec::new()));

    let responder = thread::spawn({
        let log = log.clone();
        move || {
            let mut conn = engine.accept();
            while let Some(req) = conn.recv_json() {
                let id = common::req_id(&req);
                let method = common::req_method(&req).to_string();
                log.lock().unwrap().push((method.clone(), req["params"].clone()));
                conn.respond(id, json!({}));
                if method == "Fetch.enable" {
                    // `Interceptor::enable()` registers its `Fetch.requestPaused`
                    // handler only after this response unblocks it, so give the
                    // client a beat to finish that registration before the event
                    // is on the wire.
                    thread::sleep(Duration::from_millis(150));
                    conn.send_event(
                        "Fetch.requestPaused",
                        json!({
                            "requestId": "req-1",
                            "request": { "url": "https://example.com/api/x", "method": "GET" },
                            "resourceType": "XHR",
                        }),
                    );
                }
            }
        }
    });

    let session = Session::new(Duration::from_secs(5));
    let channel = MessageChannel::connect_url(&url, Duration::from_secs(2)).expect("connect to mock engine");
    session.attach_channel(channel);
    let surface = CommandSurface::new(session.clone(), None, Duration::from_secs(5));
    let interceptor = Interceptor::new(surface);

    let r3_invoked = Arc::new(AtomicBool::new(false));

    let _r1 = interceptor.intercept("*example.com*", None, |_req| InterceptAction::defer());
    let _r2 = interceptor.intercept("*example.com/api*", None, |_req| InterceptAction::fulfill(MockResponse::new(204, Vec::new())));
    let _r3 = interceptor.intercept("*example.com*", None, {
        let r3_invoked = r3_invoked.clone();
        move |_req| {
            r3_invoked.store(true, Ordering::SeqCst);
            InterceptAction::fail("should never be reached")
        }
    });

    interceptor.enable().expect("Fetch.enable should succeed against the mock engine");

    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if log.lock().unwrap().iter().any(|(m, _)| m == "Fetch.fulfillRequest") || Instant::now() > deadline {
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }

    let entries = log.lock().unwrap().clone();
    let fulfills: Vec<_> = entries.iter().filter(|(m, _)| m == "Fetch.fulfillRequest").collect();
    let continues: Vec<_> = entries.iter().filter(|(m, _)| m == "Fetch.continueRequest").collect();
    let fails: Vec<_> = entries.iter().filter(|(m, _)| m == "Fetch.failRequest").collect();

    assert_eq!(fulfills.len(), 1, "expected exactly one fulfillRequest call, got: {entries:?}");
    assert_eq!(fulfills[0].1["requestId"], "req-1");
    assert_eq!(fulfills[0].1["responseCode"], 204);
    assert!(continues.is_empty(), "no continueRequest call should have been made: {entries:?}");
    assert!(fails.is_empty(), "no failRequest call should have been made: {entries:?}");
    assert!(!r3_invoked.load(Ordering::SeqCst), "rule 3 must not run once rule 2 resolved the request");

    session.close(1000, "test done");
    let _ = responder.join();
}
