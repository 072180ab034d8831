//! `Page` domain: navigation and lifecycle events.

use std::borrow::Cow;

use enginewire_types::{Command, Event, Method};
use serde::{Deserialize, Serialize};

/// `Page.enable`
#[derive(Debug, Clone, Default, Serialize)]
pub struct Enable {}

impl Method for Enable {
    fn identifier(&self) -> Cow<'static, str> {
        "Page.enable".into()
    }
}
impl Command for Enable {
    type Response = EnableResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnableResponse {}

/// `Page.disable`
#[derive(Debug, Clone, Default, Serialize)]
pub struct Disable {}

impl Method for Disable {
    fn identifier(&self) -> Cow<'static, str> {
        "Page.disable".into()
    }
}
impl Command for Disable {
    type Response = DisableResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisableResponse {}

/// `Page.navigate`
#[derive(Debug, Clone, Serialize)]
pub struct Navigate {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(rename = "transitionType", skip_serializing_if = "Option::is_none")]
    pub transition_type: Option<String>,
}

impl Navigate {
    pub fn new(url: impl Into<String>) -> Self {
        Navigate { url: url.into(), referrer: None, transition_type: None }
    }
}

impl Method for Navigate {
    fn identifier(&self) -> Cow<'static, str> {
        "Page.navigate".into()
    }
}
impl Command for Navigate {
    type Response = NavigateResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct NavigateResponse {
    #[serde(rename = "frameId")]
    pub frame_id: String,
    #[serde(rename = "loaderId", default)]
    pub loader_id: Option<String>,
    #[serde(rename = "errorText", default)]
    pub error_text: Option<String>,
}

/// `Page.reload`
#[derive(Debug, Clone, Default, Serialize)]
pub struct Reload {
    #[serde(rename = "ignoreCache", skip_serializing_if = "Option::is_none")]
    pub ignore_cache: Option<bool>,
}

impl Method for Reload {
    fn identifier(&self) -> Cow<'static, str> {
        "Page.reload".into()
    }
}
impl Command for Reload {
    type Response = ReloadResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReloadResponse {}

/// `Page.close`
#[derive(Debug, Clone, Default, Serialize)]
pub struct Close {}

impl Method for Close {
    fn identifier(&self) -> Cow<'static, str> {
        "Page.close".into()
    }
}
impl Command for Close {
    type Response = CloseResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloseResponse {}

/// `Page.bringToFront`
#[derive(Debug, Clone, Default, Serialize)]
pub struct BringToFront {}

impl Method for BringToFront {
    fn identifier(&self) -> Cow<'static, str> {
        "Page.bringToFront".into()
    }
}
impl Command for BringToFront {
    type Response = BringToFrontResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct BringToFrontResponse {}

/// `Page.captureScreenshot`
#[derive(Debug, Clone, Default, Serialize)]
pub struct CaptureScreenshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(rename = "fromSurface", skip_serializing_if = "Option::is_none")]
    pub from_surface: Option<bool>,
}

impl Method for CaptureScreenshot {
    fn identifier(&self) -> Cow<'static, str> {
        "Page.captureScreenshot".into()
    }
}
impl Command for CaptureScreenshot {
    type Response = CaptureScreenshotResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureScreenshotResponse {
    /// Base64-encoded image data.
    pub data: String,
}

/// `Page.frameNavigated` event.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameNavigated {
    pub frame: Frame,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Frame {
    pub id: String,
    #[serde(rename = "parentId", default)]
    pub parent_id: Option<String>,
    pub url: String,
}

impl Method for FrameNavigated {
    fn identifier(&self) -> Cow<'static, str> {
        "Page.frameNavigated".into()
    }
}
impl Event for FrameNavigated {}

/// `Page.loadEventFired` event.
#[derive(Debug, Clone, Deserialize)]
pub struct LoadEventFired {
    pub timestamp: f64,
}

impl Method for LoadEventFired {
    fn identifier(&self) -> Cow<'static, str> {
        "Page.loadEventFired".into()
    }
}
impl Event for LoadEventFired {}

/// `Page.javascriptDialogOpening` event.
#[derive(Debug, Clone, Deserialize)]
pub struct JavascriptDialogOpening {
    pub url: String,
    pub message: String,
    #[serde(rename = "type")]
    pub dialog_type: String,
}

impl Method for JavascriptDialogOpening {
    fn identifier(&self) -> Cow<'static, str> {
        "Page.javascriptDialogOpening".into()
    }
}
impl Event for JavascriptDialogOpening {}
