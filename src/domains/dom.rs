//! `DOM` domain: document tree access.

use std::borrow::Cow;

use enginewire_types::{Command, Method};
use serde::{Deserialize, Serialize};

/// `DOM.getDocument`
#[derive(Debug, Clone, Default, Serialize)]
pub struct GetDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<i64>,
}

impl Method for GetDocument {
    fn identifier(&self) -> Cow<'static, str> {
        "DOM.getDocument".into()
    }
}
impl Command for GetDocument {
    type Response = GetDocumentResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetDocumentResponse {
    pub root: Node,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Node {
    #[serde(rename = "nodeId")]
    pub node_id: i64,
    #[serde(rename = "nodeName")]
    pub node_name: String,
    #[serde(rename = "childNodeCount", default)]
    pub child_node_count: Option<i64>,
}

/// `DOM.querySelector`
#[derive(Debug, Clone, Serialize)]
pub struct QuerySelector {
    #[serde(rename = "nodeId")]
    pub node_id: i64,
    pub selector: String,
}

impl Method for QuerySelector {
    fn identifier(&self) -> Cow<'static, str> {
        "DOM.querySelector".into()
    }
}
impl Command for QuerySelector {
    type Response = QuerySelectorResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuerySelectorResponse {
    #[serde(rename = "nodeId")]
    pub node_id: i64,
}
