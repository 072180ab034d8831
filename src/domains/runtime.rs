//! `Runtime` domain: JavaScript expression evaluation.

use std::borrow::Cow;

use enginewire_types::{Command, Method};
use serde::{Deserialize, Serialize};

/// `Runtime.evaluate`
#[derive(Debug, Clone, Serialize)]
pub struct Evaluate {
    pub expression: String,
    #[serde(rename = "returnByValue", skip_serializing_if = "Option::is_none")]
    pub return_by_value: Option<bool>,
    #[serde(rename = "awaitPromise", skip_serializing_if = "Option::is_none")]
    pub await_promise: Option<bool>,
}

impl Evaluate {
    pub fn new(expression: impl Into<String>) -> Self {
        Evaluate { expression: expression.into(), return_by_value: Some(true), await_promise: Some(true) }
    }
}

impl Method for Evaluate {
    fn identifier(&self) -> Cow<'static, str> {
        "Runtime.evaluate".into()
    }
}
impl Command for Evaluate {
    type Response = EvaluateResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateResponse {
    pub result: RemoteObject,
    #[serde(rename = "exceptionDetails", default)]
    pub exception_details: Option<ExceptionDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteObject {
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(rename = "objectId", default)]
    pub object_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExceptionDetails {
    pub text: String,
    #[serde(rename = "exceptionId")]
    pub exception_id: i64,
}
