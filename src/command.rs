//! Command Surface (C5): the typed `execute`/`on`/`once`/`waitFor`
//! convention every per-domain wrapper in [`crate::domains`] is built from,
//! plus the enable-set bookkeeping C4 replays after a reconnect.
//!
//! Grounded in the teacher's `Browser::execute`/`CommandMessage` shape
//! (serialize params, dispatch by method name, deserialize the typed
//! result), adapted to the blocking [`Session`] rather than a oneshot
//! channel.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use enginewire_types::{Command, EventEnvelope, Method};

use crate::error::{Error, Result};
use crate::session::{HandlerToken, Session};

/// A record of one `Domain.enable` call, replayed in order after reconnect
/// (§4.4). Stored as `(method, params)` rather than typed commands so the
/// surface doesn't need a trait object per command type.
#[derive(Debug, Clone)]
struct EnableCall {
    method: std::borrow::Cow<'static, str>,
    params: serde_json::Value,
}

/// The typed command/event surface bound to one logical target: either the
/// browser session itself (`session_id: None`) or a flattened target
/// session (`session_id: Some(..)`), per §3.
#[derive(Clone)]
pub struct CommandSurface {
    session: Session,
    session_id: Option<String>,
    default_timeout: Duration,
    enable_log: Arc<Mutex<Vec<EnableCall>>>,
}

impl CommandSurface {
    pub fn new(session: Session, session_id: Option<String>, default_timeout: Duration) -> Self {
        CommandSurface { session, session_id, default_timeout, enable_log: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Derives a surface scoped to a different target session but sharing
    /// this one's underlying transport (used when a page attaches a new
    /// target session, e.g. an out-of-process iframe).
    pub fn with_session_id(&self, session_id: impl Into<String>) -> Self {
        CommandSurface {
            session: self.session.clone(),
            session_id: Some(session_id.into()),
            default_timeout: self.default_timeout,
            enable_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Executes a typed command and decodes its typed response (§4.5
    /// "Command" calling convention). Never panics on an engine-reported
    /// error or a malformed response; both surface as `Err`.
    pub fn execute<C: Command>(&self, command: C) -> Result<C::Response> {
        self.execute_with_timeout(command, self.default_timeout)
    }

    pub fn execute_with_timeout<C: Command>(&self, command: C, timeout: Duration) -> Result<C::Response> {
        let method = command.identifier();
        let params = serde_json::to_value(&command)?;
        let result = self
            .session
            .send_scoped(method.clone(), self.session_id.clone(), params, timeout)
            .map_err(|e| e.with_context(format!("executing {method}")))?;
        serde_json::from_value(result).map_err(|e| Error::InvalidParams {
            method: method.into_owned(),
            message: format!("response did not match the expected shape: {e}"),
        })
    }

    /// Same as [`CommandSurface::execute`] but records the call so a
    /// reconnect can replay it. Domain wrappers use this for their
    /// `enable()` operation, never for anything else (§4.4).
    pub fn execute_recording_enable<C: Command>(&self, command: C) -> Result<C::Response> {
        let method = command.identifier();
        let params = serde_json::to_value(&command)?;
        self.enable_log.lock().unwrap().push(EnableCall { method: method.clone(), params: params.clone() });
        let result = self
            .session
            .send_scoped(method.clone(), self.session_id.clone(), params, self.default_timeout)
            .map_err(|e| e.with_context(format!("executing {method}")))?;
        serde_json::from_value(result).map_err(|e| Error::InvalidParams {
            method: method.into_owned(),
            message: format!("response did not match the expected shape: {e}"),
        })
    }

    /// Removes a previously recorded enable call, for domains whose
    /// `disable()` should stop it from being replayed.
    pub fn forget_enable(&self, method: &str) {
        self.enable_log.lock().unwrap().retain(|c| c.method != method);
    }

    /// Replays every recorded enable call, in the order they were issued.
    /// Wired up as the reconnect supervisor's replay hook (§4.4).
    pub fn replay_enabled(&self) {
        let calls = self.enable_log.lock().unwrap().clone();
        for call in calls {
            if let Err(e) = self.session.send_scoped(call.method.clone(), self.session_id.clone(), call.params, self.default_timeout) {
                tracing::warn!(method = %call.method, error = %e, "failed to replay enable call after reconnect");
            }
        }
    }

    /// Registers a handler for a typed event, keyed by its wire method name
    /// (§4.5 "on"). Events for a session-scoped surface are filtered to the
    /// surface's own session id so a page doesn't observe another page's
    /// events.
    pub fn on<E, F>(&self, event: impl Into<String>, callback: F) -> HandlerToken
    where
        E: serde::de::DeserializeOwned,
        F: Fn(E) + Send + Sync + 'static,
    {
        let expected_session = self.session_id.clone();
        self.session.on(event, move |envelope: &EventEnvelope| {
            if expected_session.is_some() && envelope.session_id != expected_session {
                return;
            }
            match serde_json::from_value::<E>(envelope.params.clone()) {
                Ok(typed) => callback(typed),
                Err(e) => tracing::warn!(event = %envelope.method, error = %e, "dropping event with unexpected shape"),
            }
        })
    }

    /// Blocks for a single occurrence of a typed event, with no timeout
    /// (§4.5 "once").
    pub fn once<E>(&self, event: impl Into<String>) -> Result<E>
    where
        E: serde::de::DeserializeOwned,
    {
        let raw = self.session.once(event)?;
        serde_json::from_value(raw.params).map_err(Error::from)
    }

    /// Blocks up to `timeout` for a single occurrence of a typed event,
    /// returning `Ok(None)` on timeout (§4.5 "waitFor").
    pub fn wait_for<E>(&self, event: impl Into<String>, timeout: Duration) -> Result<Option<E>>
    where
        E: serde::de::DeserializeOwned,
    {
        match self.session.wait_for(event, timeout)? {
            Some(raw) => Ok(Some(serde_json::from_value(raw.params)?)),
            None => Ok(None),
        }
    }
}
