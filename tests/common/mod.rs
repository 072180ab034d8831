//! Shared mock-engine harness for the integration tests.
//!
//! A single `TcpListener` serves both the HTTP discovery endpoints
//! (`/json/version`, `/json`) and WebSocket upgrades, exactly like a
//! real engine's debugging endpoint does. It's built entirely on the
//! library's own public frame codec and handshake helper
//! (`enginewire::ws::frame`, `enginewire::ws::handshake::expected_accept`)
//! rather than a separate test-only wire implementation (§ "Test tooling" in
//! SPEC_FULL.md).

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use enginewire::ws::frame::{self, AssembledFrame, FragmentAssembler, OpCode};
use enginewire::ws::handshake::expected_accept;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
struct TargetListing {
    id: String,
    url: String,
}

/// A cloneable handle for registering targets the `/json` endpoint
/// should report, shared between the test's main thread and whatever thread
/// is servicing a mock connection.
#[derive(Clone)]
pub struct TargetRegistry {
    port: u16,
    targets: Arc<Mutex<Vec<TargetListing>>>,
}

impl TargetRegistry {
    pub fn add(&self, id: &str, url: &str) {
        self.targets.lock().unwrap().push(TargetListing { id: id.to_string(), url: url.to_string() });
    }

    fn list_json(&self) -> Value {
        let entries: Vec<Value> = self
            .targets
            .lock()
            .unwrap()
            .iter()
            .map(|t| {
                json!({
                    "id": t.id,
                    "type": "page",
                    "title": "mock page",
                    "url": t.url,
                    "webSocketDebuggerUrl": format!("ws://127.0.0.1:{}/devtools/page/{}", self.port, t.id),
                })
            })
            .collect();
        Value::Array(entries)
    }
}

/// A single in-process mock engine: HTTP discovery + WebSocket upgrade on
/// one ephemeral localhost port.
pub struct MockEngine {
    port: u16,
    conns: mpsc::Receiver<TcpStream>,
    targets: Arc<Mutex<Vec<TargetListing>>>,
}

impl MockEngine {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock engine listener");
        let port = listener.local_addr().unwrap().port();
        let targets: Arc<Mutex<Vec<TargetListing>>> = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel();

        {
            let targets = targets.clone();
            thread::spawn(move || {
                for incoming in listener.incoming() {
                    let Ok(stream) = incoming else { return };
                    let tx = tx.clone();
                    let targets = targets.clone();
                    thread::spawn(move || handle_connection(stream, port, targets, tx));
                }
            });
        }

        MockEngine { port, conns: rx, targets }
    }

    pub fn host_port(&self) -> (&'static str, u16) {
        ("127.0.0.1", self.port)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://127.0.0.1:{}{}", self.port, path)
    }

    pub fn registry(&self) -> TargetRegistry {
        TargetRegistry { port: self.port, targets: self.targets.clone() }
    }

    pub fn register_target(&self, id: &str, url: &str) {
        self.registry().add(id, url);
    }

    /// Blocks until the next client completes a WebSocket upgrade against
    /// this engine.
    pub fn accept(&self) -> ServerConn {
        let stream = self.conns.recv_timeout(Duration::from_secs(5)).expect("no client connected to mock engine");
        ServerConn { stream, assembler: FragmentAssembler::new() }
    }
}

fn handle_connection(mut stream: TcpStream, port: u16, targets: Arc<Mutex<Vec<TargetListing>>>, tx: mpsc::Sender<TcpStream>) {
    stream.set_nodelay(true).ok();
    let Some(header) = read_header(&mut stream) else { return };
    let text = String::from_utf8_lossy(&header);

    let is_upgrade = text.to_ascii_lowercase().contains("upgrade: websocket");
    if is_upgrade {
        let Some(sec_key) =
            text.lines().find_map(|l| l.strip_prefix("Sec-WebSocket-Key:").map(|v| v.trim().to_string()))
        else {
            return;
        };
        let accept = expected_accept(&sec_key);
        let response = format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {accept}\r\n\
             \r\n"
        );
        if stream.write_all(response.as_bytes()).is_ok() {
            let _ = tx.send(stream);
        }
        return;
    }

    let request_line = text.lines().next().unwrap_or("");
    let path = request_line.split_whitespace().nth(1).unwrap_or("/");
    let registry = TargetRegistry { port, targets };
    let body = match path {
        "/json/version" => json!({
            "Browser": "mockengine/1.0",
            "webSocketDebuggerUrl": format!("ws://127.0.0.1:{port}/devtools/browser/root"),
            "Protocol-Version": "1.3",
        })
        .to_string(),
        "/json" => registry.list_json().to_string(),
        _ => "[]".to_string(),
    };
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
}

fn read_header(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut buf = Vec::with_capacity(512);
    let mut byte = [0u8; 1];
    loop {
        let n = stream.read(&mut byte).ok()?;
        if n == 0 {
            return None;
        }
        buf.push(byte[0]);
        if buf.len() >= 4 && &buf[buf.len() - 4..] == b"\r\n\r\n" {
            return Some(buf);
        }
        if buf.len() > 64 * 1024 {
            return None;
        }
    }
}

/// The server side of one upgraded connection. Reads masked client frames
/// with the library's own frame codec; writes unmasked server frames by
/// hand, since `enginewire::ws::frame::encode_frame` always masks (correct
/// only for the client direction).
pub struct ServerConn {
    stream: TcpStream,
    assembler: FragmentAssembler,
}

impl ServerConn {
    /// Reads one client application message as JSON, transparently answering
    /// pings. Returns `None` once the peer closes the connection.
    pub fn recv_json(&mut self) -> Option<Value> {
        loop {
            let raw = frame::read_frame(&mut self.stream).ok()?;
            match self.assembler.push(raw).ok()? {
                Some(AssembledFrame::Message { payload, .. }) => return serde_json::from_slice(&payload).ok(),
                Some(AssembledFrame::Control { opcode, payload }) => match opcode {
                    OpCode::Ping => self.write_raw(0xA, &payload),
                    OpCode::Close => return None,
                    _ => {}
                },
                None => continue,
            }
        }
    }

    pub fn send_json(&mut self, value: &Value) {
        let bytes = serde_json::to_vec(value).expect("serialize mock message");
        self.write_raw(0x1, &bytes);
    }

    /// Answers a request envelope with `id` using `result`.
    pub fn respond(&mut self, id: u64, result: Value) {
        self.send_json(&json!({ "id": id, "result": result }));
    }

    pub fn respond_error(&mut self, id: u64, code: i32, message: &str) {
        self.send_json(&json!({ "id": id, "error": { "code": code, "message": message } }));
    }

    /// Emits an unsolicited event, optionally scoped to a flattened session.
    pub fn send_event(&mut self, method: &str, params: Value) {
        self.send_json(&json!({ "method": method, "params": params }));
    }

    pub fn close(&mut self) {
        self.write_raw(0x8, &[]);
    }

    fn write_raw(&mut self, opcode: u8, payload: &[u8]) {
        let mut buf = Vec::with_capacity(payload.len() + 10);
        buf.push(0x80 | opcode);
        let len = payload.len();
        if len < 126 {
            buf.push(len as u8);
        } else if len <= 0xFFFF {
            buf.push(126);
            buf.extend_from_slice(&(len as u16).to_be_bytes());
        } else {
            buf.push(127);
            buf.extend_from_slice(&(len as u64).to_be_bytes());
        }
        buf.extend_from_slice(payload);
        let _ = self.stream.write_all(&buf);
    }
}

/// Extracts the request id and method name from a decoded request envelope;
/// panics (failing the test loudly) if the shape is unexpected.
pub fn req_id(req: &Value) -> u64 {
    req["id"].as_u64().expect("request envelope missing numeric id")
}

pub fn req_method(req: &Value) -> &str {
    req["method"].as_str().expect("request envelope missing method")
}
