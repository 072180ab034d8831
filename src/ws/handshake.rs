//! The RFC 6455 opening handshake: a plain HTTP/1.1 Upgrade request/response
//! exchanged once before C1 framing begins.

use std::io::{self, Read, Write};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::Rng;
use sha1::{Digest, Sha1};

use crate::error::{Error, TransportError};

const GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

fn generate_sec_key() -> String {
    let mut nonce = [0u8; 16];
    rand::rng().fill(&mut nonce);
    BASE64.encode(nonce)
}

/// `base64(sha1(nonce + fixed-GUID))`, per §4.2.
pub fn expected_accept(sec_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(sec_key.as_bytes());
    hasher.update(GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

fn build_request(host: &str, port: u16, path: &str, sec_key: &str) -> Vec<u8> {
    let host_header = if (port == 80) || (port == 443) {
        host.to_string()
    } else {
        format!("{host}:{port}")
    };
    format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host_header}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {sec_key}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         \r\n"
    )
    .into_bytes()
}

/// Reads a raw stream byte-by-byte up to and including the terminating
/// `\r\n\r\n`, the way a handshake response (small, seen once) is read
/// before any frame codec is in play.
fn read_http_response<S: Read>(stream: &mut S) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(512);
    let mut byte = [0u8; 1];
    loop {
        let n = stream.read(&mut byte)?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed during handshake"));
        }
        buf.push(byte[0]);
        if buf.len() >= 4 && &buf[buf.len() - 4..] == b"\r\n\r\n" {
            return Ok(buf);
        }
        if buf.len() > 64 * 1024 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "handshake response too large"));
        }
    }
}

fn header_value<'a>(headers: &'a [httparse::Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .and_then(|h| std::str::from_utf8(h.value).ok())
}

/// Performs the client side of the upgrade handshake over an already
/// connected stream. On success the stream is ready for C1 framing.
pub fn perform_client_handshake<S: Read + Write>(
    stream: &mut S,
    host: &str,
    port: u16,
    path: &str,
) -> Result<(), Error> {
    let sec_key = generate_sec_key();
    let expected = expected_accept(&sec_key);

    let request = build_request(host, port, path, &sec_key);
    stream
        .write_all(&request)
        .map_err(|e| Error::Transport(TransportError::ConnectionFailed(e.to_string())))?;

    let response = read_http_response(stream)
        .map_err(|e| Error::Transport(TransportError::ConnectionFailed(e.to_string())))?;

    let mut headers = [httparse::EMPTY_HEADER; 32];
    let mut parsed = httparse::Response::new(&mut headers);
    match parsed.parse(&response) {
        Ok(httparse::Status::Complete(_)) => {}
        _ => {
            return Err(Error::Transport(TransportError::Protocol(
                "malformed handshake response".into(),
            )))
        }
    }

    let code = parsed.code.unwrap_or(0);
    if code != 101 {
        return Err(Error::Transport(TransportError::ConnectionFailed(format!(
            "unexpected handshake status {code}"
        ))));
    }

    let upgrade = header_value(parsed.headers, "upgrade").unwrap_or_default();
    if !upgrade.eq_ignore_ascii_case("websocket") {
        return Err(Error::Transport(TransportError::Protocol(
            "missing or invalid Upgrade header".into(),
        )));
    }

    let connection = header_value(parsed.headers, "connection").unwrap_or_default();
    if !connection.to_ascii_lowercase().contains("upgrade") {
        return Err(Error::Transport(TransportError::Protocol(
            "missing or invalid Connection header".into(),
        )));
    }

    let accept = header_value(parsed.headers, "sec-websocket-accept").unwrap_or_default();
    if accept != expected {
        return Err(Error::Transport(TransportError::Protocol(
            "Sec-WebSocket-Accept mismatch".into(),
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_key_matches_known_vector() {
        // The canonical RFC 6455 §1.3 example.
        let key = "dGhlIHNhbXBsZSBub25jZQ==";
        assert_eq!(expected_accept(key), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn request_contains_required_headers() {
        let req = build_request("example.com", 80, "/devtools/browser/abc", "somekey==");
        let text = String::from_utf8(req).unwrap();
        assert!(text.starts_with("GET /devtools/browser/abc HTTP/1.1\r\n"));
        assert!(text.contains("Host: example.com\r\n"));
        assert!(text.contains("Upgrade: websocket\r\n"));
        assert!(text.contains("Sec-WebSocket-Key: somekey==\r\n"));
    }

    #[test]
    fn non_default_port_is_included_in_host_header() {
        let req = build_request("localhost", 9222, "/x", "k");
        let text = String::from_utf8(req).unwrap();
        assert!(text.contains("Host: localhost:9222\r\n"));
    }
}
