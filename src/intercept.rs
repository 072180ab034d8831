//! Network Interception Engine (C9): glob-pattern rule registration,
//! ordered arbitration, and the `continue`/`fulfill`/`fail` wiring over the
//! `Fetch` domain (§4.9).
//!
//! Grounded directly in `NetworkInterceptor.cpp`'s `intercept`/`observe`/
//! `handleRequestPaused`/`patternToRegex`, reimplemented with Rust's `regex`
//! crate standing in for `std::regex` (both just need ICASE substring
//! search; no engine-specific feature of either is load-bearing here).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use regex::RegexBuilder;

use crate::command::CommandSurface;
use crate::domains::fetch;
use crate::error::Result;
use crate::session::HandlerToken;

/// A snapshot of one paused request, handed to every matching rule's
/// callback (§4.9).
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub request_id: String,
    pub url: String,
    pub method: String,
    pub resource_type: String,
    pub headers: HashMap<String, String>,
    pub post_data: Option<String>,
}

/// A response body to serve in place of the real network round-trip.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl MockResponse {
    pub fn new(status_code: u16, body: impl Into<Vec<u8>>) -> Self {
        MockResponse { status_code, headers: HashMap::new(), body: body.into() }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// What a rule's callback decided to do with a paused request. `Defer`
/// (§4.9 "arbitration") means "not my concern, ask the next rule" and is
/// also what a panicking or erroring callback is treated as.
#[derive(Debug, Clone)]
pub enum InterceptAction {
    Continue { modified_headers: HashMap<String, String> },
    Fulfill(MockResponse),
    Fail { reason: String },
    Defer,
}

impl InterceptAction {
    pub fn continue_request() -> Self {
        InterceptAction::Continue { modified_headers: HashMap::new() }
    }

    pub fn continue_with_headers(headers: HashMap<String, String>) -> Self {
        InterceptAction::Continue { modified_headers: headers }
    }

    pub fn fulfill(response: MockResponse) -> Self {
        InterceptAction::Fulfill(response)
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        InterceptAction::Fail { reason: reason.into() }
    }

    pub fn defer() -> Self {
        InterceptAction::Defer
    }
}

type InterceptCallback = dyn Fn(&InterceptedRequest) -> InterceptAction + Send + Sync;

struct Rule {
    id: u64,
    pattern: String,
    regex: regex::Regex,
    stage: Option<fetch::RequestStage>,
    callback: Arc<InterceptCallback>,
}

/// A registered rule's handle. Dropping it (or calling [`RuleHandle::remove`]
/// explicitly) removes exactly the rule it was issued for, matching the
/// original's move-only `InterceptorHandle`.
pub struct RuleHandle {
    interceptor: Arc<Inner>,
    id: u64,
    removed: bool,
}

impl RuleHandle {
    pub fn remove(mut self) {
        self.interceptor.remove_rule(self.id);
        self.removed = true;
    }
}

impl Drop for RuleHandle {
    fn drop(&mut self) {
        if !self.removed {
            self.interceptor.remove_rule(self.id);
        }
    }
}

struct Inner {
    rules: Mutex<Vec<Rule>>,
    next_rule_id: AtomicU64,
}

impl Inner {
    fn remove_rule(&self, id: u64) {
        self.rules.lock().unwrap().retain(|r| r.id != id);
    }
}

/// Compiles a glob (`*` any run, `?` any one character, everything else a
/// literal substring) into a case-insensitive, unanchored regex — a direct
/// translation of `NetworkInterceptor::patternToRegex`.
fn pattern_to_regex(pattern: &str) -> regex::Regex {
    let mut out = String::with_capacity(pattern.len() * 2);
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '.' | '+' | '^' | '$' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    RegexBuilder::new(&out).case_insensitive(true).build().expect("glob-derived regex is always valid")
}

/// The request-interception engine for one page's (or the browser's) Fetch
/// domain. Enabling installs exactly one `Fetch.requestPaused` handler that
/// fans out to every registered rule in order (§4.9 I-arbitration).
pub struct Interceptor {
    surface: CommandSurface,
    inner: Arc<Inner>,
    request_paused_token: Mutex<Option<HandlerToken>>,
}

impl Interceptor {
    pub fn new(surface: CommandSurface) -> Self {
        Interceptor {
            surface,
            inner: Arc::new(Inner { rules: Mutex::new(Vec::new()), next_rule_id: AtomicU64::new(0) }),
            request_paused_token: Mutex::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.request_paused_token.lock().unwrap().is_some()
    }

    /// `Fetch.enable` plus installing the dispatch handler. Idempotent.
    pub fn enable(&self) -> Result<()> {
        if self.is_enabled() {
            return Ok(());
        }
        self.send_enable_patterns()?;

        let inner = self.inner.clone();
        let surface = self.surface.clone();
        let token = self.surface.on("Fetch.requestPaused", move |event: fetch::RequestPaused| {
            handle_request_paused(&surface, &inner, event);
        });
        *self.request_paused_token.lock().unwrap() = Some(token);
        Ok(())
    }

    /// Sends `Fetch.enable` with the union of every currently registered
    /// rule's pattern (§4.9 "a Context or the Browser Root sends the enable
    /// fetch command with the union of registered patterns"). With no rules
    /// registered yet, falls back to matching everything so `enable()` still
    /// does something useful before the first `intercept()` call.
    fn send_enable_patterns(&self) -> Result<()> {
        let patterns = {
            let rules = self.inner.rules.lock().unwrap();
            if rules.is_empty() {
                vec![fetch::RequestPattern { url_pattern: Some("*".into()), resource_type: None, stage: None }]
            } else {
                rules
                    .iter()
                    .map(|r| fetch::RequestPattern { url_pattern: Some(r.pattern.clone()), resource_type: None, stage: r.stage })
                    .collect()
            }
        };
        self.surface.execute_recording_enable(fetch::Enable { patterns, handle_auth_requests: None }).map(|_| ())
    }

    /// `Fetch.disable` plus removing the dispatch handler.
    pub fn disable(&self) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        *self.request_paused_token.lock().unwrap() = None;
        self.surface.forget_enable("Fetch.enable");
        self.surface.execute(fetch::Disable {})?;
        Ok(())
    }

    /// Registers a rule matched against request URLs, pausing at `stage`
    /// (`None` defaults to the `Request` leg). Rules are consulted in
    /// registration order; the first non-`Defer` verdict wins (§4.9). If
    /// interception is already enabled, the new pattern is merged into the
    /// live `Fetch.enable` set immediately, preserving every pattern already
    /// registered (§4.9 "a pattern merge preserves existing patterns when an
    /// additional handler is registered for a disjoint pattern").
    pub fn intercept(
        &self,
        url_pattern: &str,
        stage: Option<fetch::RequestStage>,
        callback: impl Fn(&InterceptedRequest) -> InterceptAction + Send + Sync + 'static,
    ) -> RuleHandle {
        let regex = pattern_to_regex(url_pattern);
        let id = self.inner.next_rule_id.fetch_add(1, Ordering::Relaxed);
        self.inner.rules.lock().unwrap().push(Rule { id, pattern: url_pattern.to_string(), regex, stage, callback: Arc::new(callback) });
        if self.is_enabled() {
            if let Err(e) = self.send_enable_patterns() {
                tracing::warn!(pattern = url_pattern, error = %e, "failed to merge a newly registered pattern into the live Fetch.enable set");
            }
        }
        RuleHandle { interceptor: self.inner.clone(), id, removed: false }
    }

    /// Observes matching requests without taking responsibility for them;
    /// always defers after the callback runs.
    pub fn observe(&self, url_pattern: &str, callback: impl Fn(&InterceptedRequest) + Send + Sync + 'static) -> RuleHandle {
        self.intercept(url_pattern, None, move |req| {
            callback(req);
            InterceptAction::Defer
        })
    }

    /// Serves `response` for every request matching `url_pattern`.
    pub fn mock_request(&self, url_pattern: &str, response: MockResponse) -> RuleHandle {
        self.intercept(url_pattern, None, move |_| InterceptAction::Fulfill(response.clone()))
    }

    /// Fails every request matching `url_pattern` with `Failed`.
    pub fn block_resource(&self, url_pattern: &str) -> RuleHandle {
        self.intercept(url_pattern, None, |_| InterceptAction::Fail { reason: "Failed".into() })
    }

    /// Fails every request of a given resource type (`"Image"`, `"Stylesheet"`, ...).
    pub fn block_resource_type(&self, resource_type: &str) -> RuleHandle {
        let resource_type = resource_type.to_string();
        self.intercept("*", None, move |req| {
            if req.resource_type == resource_type {
                InterceptAction::Fail { reason: "BlockedByClient".into() }
            } else {
                InterceptAction::Defer
            }
        })
    }

    /// Adds `headers` to every request matching `url_pattern` before it
    /// continues to the network.
    pub fn modify_request_headers(&self, url_pattern: &str, headers: HashMap<String, String>) -> RuleHandle {
        self.intercept(url_pattern, None, move |_| InterceptAction::Continue { modified_headers: headers.clone() })
    }

    /// Drops every registered rule without disabling interception itself.
    pub fn clear(&self) {
        self.inner.rules.lock().unwrap().clear();
    }
}

fn handle_request_paused(surface: &CommandSurface, inner: &Arc<Inner>, event: fetch::RequestPaused) {
    let req = InterceptedRequest {
        request_id: event.request_id.clone(),
        url: event.request.url.clone(),
        method: event.request.method.clone(),
        resource_type: event.resource_type.clone(),
        headers: event.request.headers.clone(),
        post_data: event.request.post_data.clone(),
    };

    let matching: Vec<Arc<InterceptCallback>> = {
        // Snapshotting avoids holding the rules lock across arbitrary user
        // callbacks, so a callback that itself registers or drops a rule
        // doesn't deadlock.
        let rules = inner.rules.lock().unwrap();
        rules.iter().filter(|r| r.regex.is_match(&req.url)).map(|r| r.callback.clone()).collect()
    };

    let mut final_action = InterceptAction::continue_request();
    for callback in matching {
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(&req)));
        match outcome {
            Ok(InterceptAction::Defer) | Err(_) => continue,
            Ok(action) => {
                final_action = action;
                break;
            }
        }
    }

    apply_action(surface, &event.request_id, final_action);
}

fn apply_action(surface: &CommandSurface, request_id: &str, action: InterceptAction) {
    let result = match action {
        InterceptAction::Continue { modified_headers } => {
            let headers = if modified_headers.is_empty() {
                None
            } else {
                Some(modified_headers.into_iter().map(|(name, value)| fetch::HeaderEntry { name, value }).collect())
            };
            surface
                .execute(fetch::ContinueRequest { request_id: request_id.to_string(), url: None, method: None, post_data: None, headers })
                .map(|_| ())
        }
        InterceptAction::Fulfill(response) => {
            let headers: Vec<fetch::HeaderEntry> =
                response.headers.into_iter().map(|(name, value)| fetch::HeaderEntry { name, value }).collect();
            surface
                .execute(fetch::FulfillRequest {
                    request_id: request_id.to_string(),
                    response_code: response.status_code,
                    response_headers: if headers.is_empty() { None } else { Some(headers) },
                    body: Some(BASE64.encode(response.body)),
                })
                .map(|_| ())
        }
        InterceptAction::Fail { reason } => {
            surface.execute(fetch::FailRequest { request_id: request_id.to_string(), error_reason: reason }).map(|_| ())
        }
        InterceptAction::Defer => {
            surface.execute(fetch::ContinueRequest::new(request_id)).map(|_| ())
        }
    };

    if let Err(e) = result {
        tracing::warn!(request_id, error = %e, "failed to resolve an intercepted request");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_star_matches_any_run() {
        let re = pattern_to_regex("*.png");
        assert!(re.is_match("https://example.com/a/b/c.png"));
        assert!(!re.is_match("https://example.com/a/b/c.jpg"));
    }

    #[test]
    fn glob_question_mark_matches_single_char() {
        let re = pattern_to_regex("image?.png");
        assert!(re.is_match("image1.png"));
        assert!(!re.is_match("image12.png"));
    }

    #[test]
    fn special_regex_characters_are_escaped() {
        let re = pattern_to_regex("https://example.com/a+b(c).js");
        assert!(re.is_match("https://example.com/a+b(c).js"));
    }

    #[test]
    fn pattern_matching_is_case_insensitive() {
        let re = pattern_to_regex("*EXAMPLE*");
        assert!(re.is_match("https://example.com/x"));
    }
}
