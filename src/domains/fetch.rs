//! `Fetch` domain: the request-interception primitive [`crate::intercept`]
//! is built on (§4.9). Field names follow the C++ original's
//! `NetworkInterceptor` call sites (`requestId`, `responseCode`,
//! `responseHeaders`, `errorReason`, ...).

use std::borrow::Cow;

use enginewire_types::{Command, Event, Method};
use serde::{Deserialize, Serialize};

/// Which leg of a request a pattern should pause on: before it goes out
/// (`Request`, the default) or after the response headers come back
/// (`Response`), per the real `Fetch` domain's `requestStage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequestStage {
    Request,
    Response,
}

/// One URL pattern/resource-type filter passed to `Fetch.enable`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestPattern {
    #[serde(rename = "urlPattern", skip_serializing_if = "Option::is_none")]
    pub url_pattern: Option<String>,
    #[serde(rename = "resourceType", skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(rename = "requestStage", skip_serializing_if = "Option::is_none")]
    pub stage: Option<RequestStage>,
}

/// `Fetch.enable`
#[derive(Debug, Clone, Default, Serialize)]
pub struct Enable {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<RequestPattern>,
    #[serde(rename = "handleAuthRequests", skip_serializing_if = "Option::is_none")]
    pub handle_auth_requests: Option<bool>,
}

impl Method for Enable {
    fn identifier(&self) -> Cow<'static, str> {
        "Fetch.enable".into()
    }
}
impl Command for Enable {
    type Response = EnableResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnableResponse {}

/// `Fetch.disable`
#[derive(Debug, Clone, Default, Serialize)]
pub struct Disable {}

impl Method for Disable {
    fn identifier(&self) -> Cow<'static, str> {
        "Fetch.disable".into()
    }
}
impl Command for Disable {
    type Response = DisableResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisableResponse {}

#[derive(Debug, Clone, Serialize)]
pub struct HeaderEntry {
    pub name: String,
    pub value: String,
}

/// `Fetch.continueRequest`
#[derive(Debug, Clone, Serialize)]
pub struct ContinueRequest {
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(rename = "postData", skip_serializing_if = "Option::is_none")]
    pub post_data: Option<String>,
    #[serde(rename = "headers", skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<HeaderEntry>>,
}

impl ContinueRequest {
    pub fn new(request_id: impl Into<String>) -> Self {
        ContinueRequest { request_id: request_id.into(), url: None, method: None, post_data: None, headers: None }
    }
}

impl Method for ContinueRequest {
    fn identifier(&self) -> Cow<'static, str> {
        "Fetch.continueRequest".into()
    }
}
impl Command for ContinueRequest {
    type Response = ContinueRequestResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContinueRequestResponse {}

/// `Fetch.fulfillRequest`
#[derive(Debug, Clone, Serialize)]
pub struct FulfillRequest {
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(rename = "responseCode")]
    pub response_code: u16,
    #[serde(rename = "responseHeaders", skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<Vec<HeaderEntry>>,
    /// Base64-encoded response body.
    #[serde(rename = "body", skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl Method for FulfillRequest {
    fn identifier(&self) -> Cow<'static, str> {
        "Fetch.fulfillRequest".into()
    }
}
impl Command for FulfillRequest {
    type Response = FulfillRequestResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct FulfillRequestResponse {}

/// `Fetch.failRequest`
#[derive(Debug, Clone, Serialize)]
pub struct FailRequest {
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(rename = "errorReason")]
    pub error_reason: String,
}

impl Method for FailRequest {
    fn identifier(&self) -> Cow<'static, str> {
        "Fetch.failRequest".into()
    }
}
impl Command for FailRequest {
    type Response = FailRequestResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct FailRequestResponse {}

/// `Fetch.requestPaused` event: one network request the engine is holding
/// open until the client calls continue/fulfill/fail (§4.9).
#[derive(Debug, Clone, Deserialize)]
pub struct RequestPaused {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub request: PausedRequest,
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    #[serde(rename = "networkId", default)]
    pub network_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PausedRequest {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: std::collections::HashMap<String, String>,
    #[serde(rename = "postData", default)]
    pub post_data: Option<String>,
}

impl Method for RequestPaused {
    fn identifier(&self) -> Cow<'static, str> {
        "Fetch.requestPaused".into()
    }
}
impl Event for RequestPaused {}
