//! The Message Channel (C2): owns the TCP socket, performs the upgrade
//! handshake, and exposes `send`/`recv` of whole application messages.
//!
//! Reconnect is explicitly not this type's job (§4.2) — it surfaces a single
//! disconnection signal and leaves retrying to the supervisor (C4).

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result, TransportError};
use crate::ws::frame::{self, AssembledFrame, FragmentAssembler, OpCode};

/// One fully reassembled unit handed up to the session multiplexer.
#[derive(Debug)]
pub enum ChannelEvent {
    Message(Vec<u8>),
    Closed { code: u16, reason: String },
}

struct ReaderState {
    stream: TcpStream,
    assembler: FragmentAssembler,
}

pub struct MessageChannel {
    writer: Mutex<TcpStream>,
    reader: Mutex<ReaderState>,
    closed: AtomicBool,
}

impl MessageChannel {
    /// Connects to `host:port/path` and performs the upgrade handshake.
    pub fn connect(host: &str, port: u16, path: &str, connect_timeout: Duration) -> Result<Self> {
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| Error::Transport(TransportError::ConnectionFailed(e.to_string())))?
            .next()
            .ok_or_else(|| Error::Transport(TransportError::ConnectionFailed("no addresses resolved".into())))?;

        let mut stream = TcpStream::connect_timeout(&addr, connect_timeout)
            .map_err(|e| Error::Transport(TransportError::ConnectionFailed(e.to_string())))?;
        stream.set_nodelay(true).ok();

        crate::ws::handshake::perform_client_handshake(&mut stream, host, port, path)?;

        let writer = stream
            .try_clone()
            .map_err(|e| Error::Transport(TransportError::ConnectionFailed(e.to_string())))?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(ReaderState { stream, assembler: FragmentAssembler::new() }),
            closed: AtomicBool::new(false),
        })
    }

    /// Connects to an explicit `ws://host:port/path` debugger URL.
    pub fn connect_url(url: &str, connect_timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| Error::Argument(format!("invalid websocket url {url:?}: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::Argument(format!("url {url:?} has no host")))?
            .to_string();
        let port = parsed.port_or_known_default().unwrap_or(80);
        let mut path = parsed.path().to_string();
        if let Some(q) = parsed.query() {
            path.push('?');
            path.push_str(q);
        }
        Self::connect(&host, port, &path, connect_timeout)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Sends one application message (a JSON-serialized request envelope,
    /// almost always) as a single, unfragmented Text frame. Concurrent
    /// callers are serialized by `writer`'s mutex so frames never interleave
    /// mid-message (§4.2).
    pub fn send(&self, payload: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let mut w = self.writer.lock().unwrap();
        frame::write_frame(&mut *w, OpCode::Text, true, payload)
            .map_err(|e| Error::Transport(TransportError::ConnectionClosed(e.to_string())))
    }

    fn send_control(&self, opcode: OpCode, payload: &[u8]) {
        if let Ok(mut w) = self.writer.lock() {
            let _ = frame::write_frame(&mut *w, opcode, true, payload);
            let _ = w.flush();
        }
    }

    /// Blocks until exactly one reassembled message or a terminal close
    /// event is available. Only ever called from C3's dedicated receive
    /// thread — concurrent calls would race on fragment reassembly.
    pub fn recv(&self) -> Result<ChannelEvent> {
        let mut state = self.reader.lock().unwrap();
        loop {
            let raw = match frame::read_frame(&mut state.stream) {
                Ok(raw) => raw,
                Err(e) => {
                    self.closed.store(true, Ordering::Release);
                    self.send_control(OpCode::Close, &e.close_code().to_be_bytes());
                    return Err(Error::from(e));
                }
            };

            match state.assembler.push(raw) {
                Ok(Some(AssembledFrame::Message { payload, .. })) => return Ok(ChannelEvent::Message(payload)),
                Ok(Some(AssembledFrame::Control { opcode, payload })) => match opcode {
                    OpCode::Ping => {
                        self.send_control(OpCode::Pong, &payload);
                    }
                    OpCode::Pong => {}
                    OpCode::Close => {
                        self.closed.store(true, Ordering::Release);
                        self.send_control(OpCode::Close, &payload);
                        let (code, reason) = parse_close_payload(&payload);
                        return Ok(ChannelEvent::Closed { code, reason });
                    }
                    _ => unreachable!("only control opcodes reach this arm"),
                },
                Ok(None) => continue,
                Err(e) => {
                    self.closed.store(true, Ordering::Release);
                    self.send_control(OpCode::Close, &e.close_code().to_be_bytes());
                    return Err(Error::from(e));
                }
            }
        }
    }

    /// Sends a close frame and marks the channel closed. Idempotent.
    pub fn close(&self, code: u16, reason: &str) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut payload = Vec::with_capacity(2 + reason.len());
        payload.extend_from_slice(&code.to_be_bytes());
        payload.extend_from_slice(reason.as_bytes());
        self.send_control(OpCode::Close, &payload);
    }
}

fn parse_close_payload(payload: &[u8]) -> (u16, String) {
    if payload.len() >= 2 {
        let code = u16::from_be_bytes([payload[0], payload[1]]);
        let reason = String::from_utf8_lossy(&payload[2..]).into_owned();
        (code, reason)
    } else {
        (1005, String::new())
    }
}
