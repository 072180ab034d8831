//! Wire-level envelope types shared between the session layer and the
//! generated/hand-written command surface.
//!
//! Nothing in this crate knows about TCP, threads, or the engine's actual
//! protocol domains. It only describes the JSON shapes that cross the wire
//! and the small set of traits a typed command/event needs to implement to
//! be usable through [`crate::Method`].

use std::borrow::Cow;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Monotonically increasing identifier assigned to an outgoing request.
///
/// Unique within the lifetime of a single session (I2): a session never
/// reuses an id, even across reconnects.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new(id: u64) -> Self {
        RequestId(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A dotted `Domain.method` identifier, e.g. `Page.navigate`.
pub trait Method {
    /// The full identifier, e.g. `Page.navigate`.
    fn identifier(&self) -> Cow<'static, str>;

    /// The domain portion, e.g. `Page`.
    fn domain_name(&self) -> Cow<'static, str> {
        self.split().0
    }

    /// The method portion, e.g. `navigate`.
    fn method_name(&self) -> Cow<'static, str> {
        self.split().1
    }

    fn split(&self) -> (Cow<'static, str>, Cow<'static, str>) {
        match self.identifier() {
            Cow::Borrowed(id) => {
                let mut iter = id.splitn(2, '.');
                (
                    iter.next().unwrap_or_default().into(),
                    iter.next().unwrap_or_default().into(),
                )
            }
            Cow::Owned(id) => {
                let mut iter = id.splitn(2, '.');
                (
                    Cow::Owned(iter.next().unwrap_or_default().to_string()),
                    Cow::Owned(iter.next().unwrap_or_default().to_string()),
                )
            }
        }
    }
}

/// A typed request: knows its own method name and the shape of its response.
pub trait Command: Serialize + Method {
    type Response: DeserializeOwned + fmt::Debug;
}

/// A typed event payload.
pub trait Event: Method + DeserializeOwned + Send + 'static {}

/// The envelope placed on the wire for an outgoing request (§3 Request envelope).
#[derive(Debug, Serialize, PartialEq)]
pub struct RequestEnvelope {
    pub id: RequestId,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub method: Cow<'static, str>,
    pub params: serde_json::Value,
}

/// An error reported inline in a response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireError {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for WireError {}

/// The envelope read back for a response (§3 Response envelope).
///
/// Exactly one of `result`/`error` is populated; this is validated by
/// [`ResponseEnvelope::into_result`].
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope {
    pub id: RequestId,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<WireError>,
}

impl ResponseEnvelope {
    /// Collapses the envelope's dual-optional shape into a single `Result`.
    pub fn into_result(self) -> Result<serde_json::Value, WireError> {
        match (self.result, self.error) {
            (Some(v), None) => Ok(v),
            (None, Some(e)) => Err(e),
            (Some(v), Some(_)) => Ok(v),
            (None, None) => Ok(serde_json::Value::Null),
        }
    }
}

/// The envelope read back for an unsolicited event (§3 Event envelope).
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    pub method: Cow<'static, str>,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
}

impl Method for EventEnvelope {
    fn identifier(&self) -> Cow<'static, str> {
        self.method.clone()
    }
}

/// Either a response or an event, as read off the wire. Distinguished solely
/// by the presence of an `id` field (§3).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireMessage {
    Response(ResponseEnvelope),
    Event(EventEnvelope),
}

/// A materialized response to a specific [`Command`].
#[derive(Debug)]
pub struct CommandResponse<T: fmt::Debug> {
    pub id: RequestId,
    pub method: Cow<'static, str>,
    pub result: T,
}

impl<T: fmt::Debug> std::ops::Deref for CommandResponse<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.result
    }
}
