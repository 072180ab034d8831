//! HTTP discovery endpoint (`/json/version`, `/json`, `/json/new`,
//! `/json/close/{id}`): the plain HTTP side-channel the engine exposes
//! alongside its WebSocket, used to learn the browser's own debugger URL and
//! to enumerate/create targets before a [`crate::session::Session`] exists
//! for them.

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct VersionInfo {
    #[serde(rename = "Browser")]
    pub browser: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: String,
    #[serde(rename = "V8-Version", default)]
    pub v8_version: Option<String>,
    #[serde(rename = "Protocol-Version", default)]
    pub protocol_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub target_type: String,
    pub title: String,
    pub url: String,
    #[serde(rename = "webSocketDebuggerUrl", default)]
    pub web_socket_debugger_url: Option<String>,
}

fn base_url(host: &str, port: u16) -> String {
    format!("http://{host}:{port}")
}

/// `GET /json/version`: the browser-level debugger URL and version banner.
pub fn version(host: &str, port: u16) -> Result<VersionInfo> {
    let url = format!("{}/json/version", base_url(host, port));
    reqwest::blocking::get(&url)?.error_for_status()?.json::<VersionInfo>().map_err(Error::from)
}

/// `GET /json`: every currently open target (page, worker, etc.).
pub fn list_targets(host: &str, port: u16) -> Result<Vec<TargetInfo>> {
    let url = format!("{}/json", base_url(host, port));
    reqwest::blocking::get(&url)?.error_for_status()?.json::<Vec<TargetInfo>>().map_err(Error::from)
}

/// `PUT /json/new?url=...`: asks the engine to open a new top-level target.
pub fn new_target(host: &str, port: u16, url: &str) -> Result<TargetInfo> {
    let endpoint = format!("{}/json/new?{}", base_url(host, port), urlencoding_query(url));
    let client = reqwest::blocking::Client::new();
    client.put(&endpoint).send()?.error_for_status()?.json::<TargetInfo>().map_err(Error::from)
}

/// `GET /json/close/{id}`: asks the engine to close a target out-of-band.
pub fn close_target(host: &str, port: u16, id: &str) -> Result<()> {
    let endpoint = format!("{}/json/close/{}", base_url(host, port), id);
    reqwest::blocking::get(&endpoint)?.error_for_status()?;
    Ok(())
}

fn urlencoding_query(url: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
    format!("url={encoded}")
}
