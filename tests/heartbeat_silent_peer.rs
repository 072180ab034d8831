//! End-to-end scenario: a peer that completes the WebSocket handshake but
//! then never answers anything. The heartbeat probe must time out enough
//! consecutive times to flip the session into `Reconnecting` (§4.4, §8).

mod common;

use std::thread;
use std::time::{Duration, Instant};

use common::MockEngine;
use enginewire::supervisor::{Supervisor, SupervisorConfig};
use enginewire::ws::MessageChannel;
use enginewire::{Session, SessionState};

#[test]
fn silent_peer_trips_heartbeat_failure_into_reconnecting() {
    let engine = MockEngine::start();
    let url = engine.ws_url("/devtools/page/silent");

    let responder = thread::spawn(move || {
        let mut conn = engine.accept();
        // Never responds to anything; just drains frames so the socket
        // doesn't back up.
        while conn.recv_json().is_some() {}
    });

    let session = Session::new(Duration::from_secs(5));
    let config = SupervisorConfig {
        heartbeat_interval: Duration::from_millis(150),
        heartbeat_timeout: Duration::from_millis(100),
        heartbeat_failure_threshold: 2,
        reconnect_initial_delay: Duration::from_secs(30),
        reconnect_max_delay: Duration::from_secs(30),
        reconnect_multiplier: 2.0,
        reconnect_max_attempts: 0,
        auto_reconnect: false, // isolate the heartbeat transition from any reconnect noise
    };

    let connector_url = url.clone();
    let supervisor = Supervisor::new(session.clone(), config, move || MessageChannel::connect_url(&connector_url, Duration::from_secs(2)));
    supervisor.set_heartbeat(|session, timeout| session.send("Heartbeat.ping", serde_json::json!({}), timeout).map(|_| ()));
    supervisor.start().expect("initial connect to mock engine");

    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if session.state() == SessionState::Reconnecting {
            break;
        }
        assert!(Instant::now() < deadline, "session never flagged the silent peer as dead within the expected window");
        thread::sleep(Duration::from_millis(20));
    }

    supervisor.shutdown(1000, "test done");
    let _ = responder.join();
}
