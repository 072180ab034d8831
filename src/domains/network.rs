//! `Network` domain: request/response observation events.

use std::borrow::Cow;
use std::collections::HashMap;

use enginewire_types::{Command, Event, Method};
use serde::{Deserialize, Serialize};

/// `Network.enable`
#[derive(Debug, Clone, Default, Serialize)]
pub struct Enable {}

impl Method for Enable {
    fn identifier(&self) -> Cow<'static, str> {
        "Network.enable".into()
    }
}
impl Command for Enable {
    type Response = EnableResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnableResponse {}

/// `Network.disable`
#[derive(Debug, Clone, Default, Serialize)]
pub struct Disable {}

impl Method for Disable {
    fn identifier(&self) -> Cow<'static, str> {
        "Network.disable".into()
    }
}
impl Command for Disable {
    type Response = DisableResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisableResponse {}

/// `Network.requestWillBeSent` event.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestWillBeSent {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub request: RequestPayload,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestPayload {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Method for RequestWillBeSent {
    fn identifier(&self) -> Cow<'static, str> {
        "Network.requestWillBeSent".into()
    }
}
impl Event for RequestWillBeSent {}

/// `Network.responseReceived` event.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseReceived {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub response: ResponsePayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponsePayload {
    pub url: String,
    pub status: i64,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Method for ResponseReceived {
    fn identifier(&self) -> Cow<'static, str> {
        "Network.responseReceived".into()
    }
}
impl Event for ResponseReceived {}

/// `Network.loadingFailed` event.
#[derive(Debug, Clone, Deserialize)]
pub struct LoadingFailed {
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(rename = "errorText")]
    pub error_text: String,
}

impl Method for LoadingFailed {
    fn identifier(&self) -> Cow<'static, str> {
        "Network.loadingFailed".into()
    }
}
impl Event for LoadingFailed {}
