//! End-to-end scenario: closing a page while a navigation is still pending
//! must unblock the in-flight `navigate()` call rather than hang, and a
//! second `close()` must stay a no-op (I3, I5, §8).

mod common;

use std::thread;
use std::time::Duration;

use common::MockEngine;
use enginewire::config::BrowserConfig;
use enginewire::error::Error;
use enginewire::Browser;
use serde_json::json;

#[test]
fn close_during_pending_navigation_unblocks_cleanly() {
    let engine = MockEngine::start();
    let port = engine.host_port().1;
    let registry = engine.registry();
    let page_url = format!("ws://127.0.0.1:{port}/devtools/page/page-1");

    // One thread owns the mock engine end-to-end: it accepts the browser-level
    // connection first (spawning a sub-servicer for it), then accepts the
    // page-level connection that `Browser::new_page` opens next and services
    // it itself. Sequential `accept()` calls from a single owner avoid
    // sharing the underlying channel receiver across threads.
    let driver = thread::spawn(move || {
        let mut browser_conn = engine.accept();
        let browser_servicer = thread::spawn({
            let page_url = page_url.clone();
            move || {
                while let Some(req) = browser_conn.recv_json() {
                    let id = common::req_id(&req);
                    match common::req_method(&req) {
                        "Target.createTarget" => {
                            let url = req["params"]["url"].as_str().unwrap_or_default().to_string();
                            registry.add("page-1", &url);
                            browser_conn.respond(id, json!({ "targetId": "page-1" }));
                            browser_conn.send_event(
                                "Target.targetCreated",
                                json!({ "targetInfo": { "targetId": "page-1", "type": "page", "url": page_url } }),
                            );
                        }
                        _ => browser_conn.respond(id, json!({})),
                    }
                }
            }
        });

        let mut page_conn = engine.accept();
        // Answers Page.navigate immediately but deliberately never sends
        // Page.loadEventFired, so the pending navigate() is still blocked
        // when the test closes the page.
        while let Some(req) = page_conn.recv_json() {
            let id = common::req_id(&req);
            match common::req_method(&req) {
                "Page.navigate" => page_conn.respond(id, json!({ "frameId": "frame-1" })),
                _ => page_conn.respond(id, json!({})),
            }
        }

        let _ = browser_servicer.join();
    });

    let browser = Browser::connect("127.0.0.1", port, BrowserConfig::default()).expect("connect to mock engine");
    let page = browser.new_page("https://example.com").expect("create page target against mock engine");

    let navigate_page = page.clone();
    let navigate_thread = thread::spawn(move || navigate_page.navigate("https://example.com/slow", Duration::from_secs(5)));

    thread::sleep(Duration::from_millis(50));
    page.close();

    let result = navigate_thread.join().expect("navigate thread panicked");
    match result {
        Ok(()) => {}
        Err(Error::Closed) => {}
        Err(Error::Transport(_)) => {}
        Err(Error::Timeout(_)) => {}
        Err(other) => panic!("navigate() returned an unexpected error after the page closed mid-flight: {other}"),
    }

    assert!(page.is_closed());
    // A second close() must stay a no-op: no panic, no hang.
    page.close();
    assert!(page.is_closed());

    browser.close();
    let _ = driver.join();
}
