//! End-to-end scenario: reconnect preserves the enable set. Two domains are
//! enabled, the transport is forcibly dropped, and the supervisor must
//! reconnect and replay both `enable()` calls in the order they were
//! originally issued before any fresh command is let through (§4.4, §8).

mod common;

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use common::MockEngine;
use enginewire::command::CommandSurface;
use enginewire::domains::{network, page};
use enginewire::supervisor::{Supervisor, SupervisorConfig};
use enginewire::ws::MessageChannel;
use enginewire::{Session, SessionState};

#[test]
fn reconnect_replays_recorded_enables_in_order() {
    let engine = MockEngine::start();
    let url = engine.ws_url("/devtools/browser/root");

    let session = Session::new(Duration::from_secs(5));
    let config = SupervisorConfig {
        heartbeat_interval: Duration::from_secs(60), // not exercised here; see heartbeat_silent_peer.rs
        heartbeat_timeout: Duration::from_millis(200),
        heartbeat_failure_threshold: 2,
        reconnect_initial_delay: Duration::from_millis(50),
        reconnect_max_delay: Duration::from_millis(200),
        reconnect_multiplier: 2.0,
        reconnect_max_attempts: 0,
        auto_reconnect: true,
    };

    let connector_url = url.clone();
    let supervisor = Supervisor::new(session.clone(), config, move || MessageChannel::connect_url(&connector_url, Duration::from_secs(2)));
    supervisor.start().expect("initial connect to mock engine");

    let surface = CommandSurface::new(session.clone(), None, Duration::from_secs(5));
    supervisor.set_replay_hook({
        let surface = surface.clone();
        move |_session| surface.replay_enabled()
    });

    let mut conn1 = engine.accept();
    let log1: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let service1 = thread::spawn({
        let log1 = log1.clone();
        move || {
            for _ in 0..2 {
                let Some(req) = conn1.recv_json() else { break };
                let id = common::req_id(&req);
                log1.lock().unwrap().push(common::req_method(&req).to_string());
                conn1.respond(id, serde_json::json!({}));
            }
            conn1.close();
        }
    });

    let log2: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let service2 = thread::spawn({
        let log2 = log2.clone();
        move || {
            let mut conn2 = engine.accept();
            while let Some(req) = conn2.recv_json() {
                let id = common::req_id(&req);
                log2.lock().unwrap().push(common::req_method(&req).to_string());
                conn2.respond(id, serde_json::json!({}));
            }
        }
    });

    surface.execute_recording_enable(page::Enable {}).expect("Page.enable over the first connection");
    surface.execute_recording_enable(network::Enable {}).expect("Network.enable over the first connection");
    service1.join().expect("first mock connection servicer panicked");

    assert_eq!(*log1.lock().unwrap(), vec!["Page.enable".to_string(), "Network.enable".to_string()]);

    let deadline = Instant::now() + Duration::from_secs(3);
    while session.state() != SessionState::Connected {
        assert!(Instant::now() < deadline, "session never reconnected within the expected window");
        thread::sleep(Duration::from_millis(20));
    }

    let replay_deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if log2.lock().unwrap().len() >= 2 || Instant::now() > replay_deadline {
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(
        *log2.lock().unwrap(),
        vec!["Page.enable".to_string(), "Network.enable".to_string()],
        "replay must re-issue both enable calls, in the original order, on the new connection"
    );

    // A fresh command over the reconnected transport should go through too.
    surface.execute(network::Disable {}).expect("a fresh command should succeed on the reconnected transport");
    let fresh_deadline = Instant::now() + Duration::from_secs(1);
    loop {
        if log2.lock().unwrap().iter().any(|m| m == "Network.disable") || Instant::now() > fresh_deadline {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert!(log2.lock().unwrap().iter().any(|m| m == "Network.disable"));

    supervisor.shutdown(1000, "test done");
    let _ = service2.join();
}
