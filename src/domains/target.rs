//! `Target` domain: the browser-level registry of pages/workers/contexts
//! that [`crate::browser::Browser`] and [`crate::context::Context`] sit on
//! top of.

use std::borrow::Cow;

use enginewire_types::{Command, Event, Method};
use serde::{Deserialize, Serialize};

/// `Target.createBrowserContext`
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateBrowserContext {}

impl Method for CreateBrowserContext {
    fn identifier(&self) -> Cow<'static, str> {
        "Target.createBrowserContext".into()
    }
}
impl Command for CreateBrowserContext {
    type Response = CreateBrowserContextResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBrowserContextResponse {
    #[serde(rename = "browserContextId")]
    pub browser_context_id: String,
}

/// `Target.disposeBrowserContext`
#[derive(Debug, Clone, Serialize)]
pub struct DisposeBrowserContext {
    #[serde(rename = "browserContextId")]
    pub browser_context_id: String,
}

impl Method for DisposeBrowserContext {
    fn identifier(&self) -> Cow<'static, str> {
        "Target.disposeBrowserContext".into()
    }
}
impl Command for DisposeBrowserContext {
    type Response = DisposeBrowserContextResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisposeBrowserContextResponse {}

/// `Target.createTarget`
#[derive(Debug, Clone, Serialize)]
pub struct CreateTarget {
    pub url: String,
    #[serde(rename = "browserContextId", skip_serializing_if = "Option::is_none")]
    pub browser_context_id: Option<String>,
}

impl CreateTarget {
    pub fn new(url: impl Into<String>) -> Self {
        CreateTarget { url: url.into(), browser_context_id: None }
    }
}

impl Method for CreateTarget {
    fn identifier(&self) -> Cow<'static, str> {
        "Target.createTarget".into()
    }
}
impl Command for CreateTarget {
    type Response = CreateTargetResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTargetResponse {
    #[serde(rename = "targetId")]
    pub target_id: String,
}

/// `Target.closeTarget`
#[derive(Debug, Clone, Serialize)]
pub struct CloseTarget {
    #[serde(rename = "targetId")]
    pub target_id: String,
}

impl Method for CloseTarget {
    fn identifier(&self) -> Cow<'static, str> {
        "Target.closeTarget".into()
    }
}
impl Command for CloseTarget {
    type Response = CloseTargetResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloseTargetResponse {
    pub success: bool,
}

/// `Target.attachToTarget`
#[derive(Debug, Clone, Serialize)]
pub struct AttachToTarget {
    #[serde(rename = "targetId")]
    pub target_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flatten: Option<bool>,
}

impl AttachToTarget {
    pub fn new(target_id: impl Into<String>) -> Self {
        AttachToTarget { target_id: target_id.into(), flatten: Some(true) }
    }
}

impl Method for AttachToTarget {
    fn identifier(&self) -> Cow<'static, str> {
        "Target.attachToTarget".into()
    }
}
impl Command for AttachToTarget {
    type Response = AttachToTargetResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachToTargetResponse {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

/// `Target.detachFromTarget`
#[derive(Debug, Clone, Default, Serialize)]
pub struct DetachFromTarget {
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl Method for DetachFromTarget {
    fn identifier(&self) -> Cow<'static, str> {
        "Target.detachFromTarget".into()
    }
}
impl Command for DetachFromTarget {
    type Response = DetachFromTargetResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetachFromTargetResponse {}

/// `Target.targetCrashed` event.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetCrashed {
    #[serde(rename = "targetId")]
    pub target_id: String,
}

impl Method for TargetCrashed {
    fn identifier(&self) -> Cow<'static, str> {
        "Target.targetCrashed".into()
    }
}
impl Event for TargetCrashed {}

/// `Target.targetCreated` event: fired once the engine has actually set up
/// the new target, after `Target.createTarget`'s response (§4.8 "this is the
/// one place where event and HTTP data are joined").
#[derive(Debug, Clone, Deserialize)]
pub struct TargetCreated {
    #[serde(rename = "targetInfo")]
    pub target_info: TargetInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetInfo {
    #[serde(rename = "targetId")]
    pub target_id: String,
    #[serde(rename = "type")]
    pub target_type: String,
    pub url: String,
}

impl Method for TargetCreated {
    fn identifier(&self) -> Cow<'static, str> {
        "Target.targetCreated".into()
    }
}
impl Event for TargetCreated {}

/// `Target.targetDestroyed` event.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetDestroyed {
    #[serde(rename = "targetId")]
    pub target_id: String,
}

impl Method for TargetDestroyed {
    fn identifier(&self) -> Cow<'static, str> {
        "Target.targetDestroyed".into()
    }
}
impl Event for TargetDestroyed {}
