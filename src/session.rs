//! The Session Multiplexer (C3): request/response correlation, the receive
//! loop, and event fan-out on top of a [`MessageChannel`].
//!
//! One [`Session`] models one logical connection generation; reconnect (C4)
//! replaces the underlying channel and spawns a fresh receive thread but
//! keeps the same waiter/handler bookkeeping so user-registered event
//! subscriptions survive a reconnect untouched.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::thread;
use std::time::{Duration, Instant};

use fnv::FnvHashMap;
use serde_json::Value;

use enginewire_types::{EventEnvelope, RequestEnvelope, RequestId, WireMessage};

use crate::error::{Error, Result, TargetStateError, TimeoutKind, TransportError};
use crate::ws::{ChannelEvent, MessageChannel};

/// §4.3 Session state machine: `Connecting -> Connected -> (Reconnecting <->
/// Connected)* -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

#[derive(Debug)]
enum WaiterOutcome {
    Response(Value),
    Error(Error),
}

struct Waiter {
    deadline: Instant,
    sender: mpsc::SyncSender<WaiterOutcome>,
}

/// A not-yet-awaited command result, returned by [`Session::send_async`] for
/// use from inside an event handler where a synchronous `send` would
/// deadlock the receive thread (§9 "Callbacks crossing the receive-thread
/// boundary").
pub struct PendingResponse {
    id: RequestId,
    rx: mpsc::Receiver<WaiterOutcome>,
}

impl PendingResponse {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Blocks the calling thread (NOT the receive thread, as long as this
    /// isn't called from inside a handler) until the command completes.
    pub fn wait(self) -> Result<Value> {
        match self.rx.recv() {
            Ok(WaiterOutcome::Response(v)) => Ok(v),
            Ok(WaiterOutcome::Error(e)) => Err(e),
            Err(_) => Err(Error::Closed),
        }
    }

    pub fn try_wait(&self) -> Option<Result<Value>> {
        match self.rx.try_recv() {
            Ok(WaiterOutcome::Response(v)) => Some(Ok(v)),
            Ok(WaiterOutcome::Error(e)) => Some(Err(e)),
            Err(_) => None,
        }
    }
}

struct HandlerEntry {
    token_id: u64,
    callback: Box<dyn Fn(&EventEnvelope) + Send + Sync>,
}

/// A move-only handle whose drop deregisters exactly the handler it created
/// (§3 Handler registration, §9 "Scoped event tokens").
pub struct HandlerToken {
    session: Weak<SessionInner>,
    event: String,
    token_id: u64,
}

impl Drop for HandlerToken {
    fn drop(&mut self) {
        if let Some(inner) = self.session.upgrade() {
            inner.remove_handler(&self.event, self.token_id);
        }
    }
}

impl std::fmt::Debug for HandlerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerToken").field("event", &self.event).field("token_id", &self.token_id).finish()
    }
}

pub(crate) struct SessionInner {
    next_id: AtomicU64,
    next_token_id: AtomicU64,
    waiters: Mutex<FnvHashMap<RequestId, Waiter>>,
    handlers: RwLock<FnvHashMap<String, Vec<HandlerEntry>>>,
    state: Mutex<SessionState>,
    channel: Mutex<Option<Arc<MessageChannel>>>,
    default_timeout: Duration,
    generation: AtomicU64,
}

/// The Session Multiplexer. Cheap to clone; clones share the same
/// underlying dispatcher state.
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<SessionInner>,
}

impl Session {
    /// Creates a session with no channel attached yet (state `Connecting`).
    pub fn new(default_timeout: Duration) -> Self {
        Session {
            inner: Arc::new(SessionInner {
                next_id: AtomicU64::new(0),
                next_token_id: AtomicU64::new(0),
                waiters: Mutex::new(FnvHashMap::default()),
                handlers: RwLock::new(FnvHashMap::default()),
                state: Mutex::new(SessionState::Connecting),
                channel: Mutex::new(None),
                default_timeout,
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.lock().unwrap()
    }

    pub fn default_timeout(&self) -> Duration {
        self.inner.default_timeout
    }

    /// Attaches a freshly connected channel and spawns its dedicated receive
    /// thread (§4.3 "exactly one receive task per Session"). Used both for
    /// the initial connection and for every reconnect generation.
    pub fn attach_channel(&self, channel: MessageChannel) {
        let channel = Arc::new(channel);
        *self.inner.channel.lock().unwrap() = Some(channel.clone());
        *self.inner.state.lock().unwrap() = SessionState::Connected;
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;

        let inner = self.inner.clone();
        thread::Builder::new()
            .name("session-recv".into())
            .spawn(move || receive_loop(inner, channel, generation))
            .expect("failed to spawn receive thread");
    }

    fn next_id(&self) -> RequestId {
        RequestId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn current_channel(&self) -> Result<Arc<MessageChannel>> {
        self.inner
            .channel
            .lock()
            .unwrap()
            .clone()
            .ok_or(Error::Closed)
    }

    /// Registers a waiter and writes the request to the wire without
    /// blocking for the response. `session_id` addresses a flattened target
    /// session (§3), as every [`crate::command::CommandSurface`] attached to
    /// a page or worker target supplies.
    pub fn send_async_scoped(
        &self,
        method: impl Into<std::borrow::Cow<'static, str>>,
        session_id: Option<String>,
        params: Value,
        timeout: Duration,
    ) -> Result<PendingResponse> {
        if self.state() == SessionState::Closed {
            return Err(Error::Closed);
        }
        let channel = self.current_channel()?;
        let id = self.next_id();
        let envelope = RequestEnvelope { id, session_id, method: method.into(), params };
        let bytes = serde_json::to_vec(&envelope)?;

        let (tx, rx) = mpsc::sync_channel(1);
        self.inner.waiters.lock().unwrap().insert(id, Waiter { deadline: Instant::now() + timeout, sender: tx });

        if let Err(e) = channel.send(&bytes) {
            // The waiter never got a chance to race with a response; resolve it here.
            self.inner.waiters.lock().unwrap().remove(&id);
            return Err(e);
        }

        Ok(PendingResponse { id, rx })
    }

    /// Unscoped variant of [`Session::send_async_scoped`], for requests that
    /// target the browser session itself.
    pub fn send_async(
        &self,
        method: impl Into<std::borrow::Cow<'static, str>>,
        params: Value,
        timeout: Duration,
    ) -> Result<PendingResponse> {
        self.send_async_scoped(method, None, params, timeout)
    }

    /// Blocking request dispatch (§4.3): allocates the id, sends the
    /// envelope, and blocks until response, timeout-sweep, or teardown
    /// completes the waiter (I1).
    pub fn send(
        &self,
        method: impl Into<std::borrow::Cow<'static, str>>,
        params: Value,
        timeout: Duration,
    ) -> Result<Value> {
        self.send_async(method, params, timeout)?.wait()
    }

    /// Scoped variant of [`Session::send`].
    pub fn send_scoped(
        &self,
        method: impl Into<std::borrow::Cow<'static, str>>,
        session_id: Option<String>,
        params: Value,
        timeout: Duration,
    ) -> Result<Value> {
        self.send_async_scoped(method, session_id, params, timeout)?.wait()
    }

    /// Registers a handler for `event`. Handlers for the same event fire in
    /// registration order (I7).
    pub fn on<F>(&self, event: impl Into<String>, callback: F) -> HandlerToken
    where
        F: Fn(&EventEnvelope) + Send + Sync + 'static,
    {
        let event = event.into();
        let token_id = self.inner.next_token_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .handlers
            .write()
            .unwrap()
            .entry(event.clone())
            .or_default()
            .push(HandlerEntry { token_id, callback: Box::new(callback) });

        HandlerToken { session: Arc::downgrade(&self.inner), event, token_id }
    }

    /// One-shot registration: blocks until the named event is observed.
    pub fn once(&self, event: impl Into<String>) -> Result<EventEnvelope> {
        self.wait_for(event, self.inner.default_timeout)?.ok_or(Error::Timeout(TimeoutKind::Wait))
    }

    /// Blocks for up to `timeout` waiting for a single occurrence of
    /// `event`, returning `Ok(None)` on timeout rather than an error.
    pub fn wait_for(&self, event: impl Into<String>, timeout: Duration) -> Result<Option<EventEnvelope>> {
        if self.state() == SessionState::Closed {
            return Err(Error::Closed);
        }
        let (tx, rx) = mpsc::sync_channel(1);
        let tx = Mutex::new(Some(tx));
        let token = self.on(event, move |ev| {
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send(ev.clone());
            }
        });
        let result = match rx.recv_timeout(timeout) {
            Ok(ev) => Ok(Some(ev)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(Error::Closed),
        };
        drop(token);
        result
    }

    /// Explicit shutdown: completes every outstanding waiter with a
    /// "disconnected" error, drops every handler, and marks the channel
    /// closed. Idempotent.
    pub fn close(&self, code: u16, reason: &str) {
        let mut state = self.inner.state.lock().unwrap();
        if *state == SessionState::Closed {
            return;
        }
        *state = SessionState::Closed;
        drop(state);

        if let Some(channel) = self.inner.channel.lock().unwrap().take() {
            channel.close(code, reason);
        }
        self.inner.fail_all_waiters(Error::Transport(TransportError::ConnectionClosed(reason.to_string())));
        self.inner.handlers.write().unwrap().clear();
    }

    /// Used by the reconnect supervisor to flip the state for the duration
    /// of a reconnect attempt. Only legal from `Connected`, per the §4.3
    /// state machine.
    pub(crate) fn mark_reconnecting(&self) -> bool {
        let mut state = self.inner.state.lock().unwrap();
        if *state == SessionState::Connected {
            *state = SessionState::Reconnecting;
            true
        } else {
            false
        }
    }

    pub(crate) fn mark_closed_permanently(&self) {
        *self.inner.state.lock().unwrap() = SessionState::Closed;
        self.inner.handlers.write().unwrap().clear();
    }
}

impl SessionInner {
    fn remove_handler(&self, event: &str, token_id: u64) {
        let mut handlers = self.handlers.write().unwrap();
        if let Some(list) = handlers.get_mut(event) {
            list.retain(|h| h.token_id != token_id);
        }
    }

    fn fail_all_waiters(&self, err: Error) {
        let mut waiters = self.waiters.lock().unwrap();
        for (_, waiter) in waiters.drain() {
            let _ = waiter.sender.send(WaiterOutcome::Error(clone_error(&err)));
        }
    }

    fn sweep_expired(&self) {
        let now = Instant::now();
        let mut expired = VecDeque::new();
        {
            let mut waiters = self.waiters.lock().unwrap();
            let expired_ids: Vec<RequestId> =
                waiters.iter().filter(|(_, w)| now > w.deadline).map(|(id, _)| *id).collect();
            for id in expired_ids {
                if let Some(w) = waiters.remove(&id) {
                    expired.push_back(w);
                }
            }
        }
        for waiter in expired {
            let _ = waiter.sender.send(WaiterOutcome::Error(Error::Timeout(TimeoutKind::Command)));
        }
    }

    fn dispatch_event(&self, event: EventEnvelope) {
        // Holding the read lock for the duration of dispatch gives the same
        // observable behavior as snapshotting the handler list up front
        // (§5): concurrent registration/removal only takes effect for the
        // *next* event, since a concurrent writer blocks until we release it.
        let handlers = self.handlers.read().unwrap();
        if let Some(list) = handlers.get(event.method.as_ref()) {
            for entry in list {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| (entry.callback)(&event)));
                if let Err(_panic) = result {
                    tracing::error!(event = %event.method, "event handler panicked; continuing with remaining handlers");
                }
            }
        }
    }
}

fn clone_error(err: &Error) -> Error {
    // Errors aren't `Clone` (thiserror sources usually aren't either); since
    // every waiter must receive *a* terminal outcome, re-render as a fresh
    // transport error carrying the same message.
    Error::Transport(TransportError::ConnectionClosed(err.to_string()))
}

fn receive_loop(inner: Arc<SessionInner>, channel: Arc<MessageChannel>, generation: u64) {
    let sweeper_inner = inner.clone();
    let sweeper_channel = channel.clone();
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let sweeper = thread::Builder::new()
        .name("session-timeout-sweep".into())
        .spawn(move || loop {
            if stop_rx.recv_timeout(Duration::from_millis(250)).is_ok() {
                return;
            }
            if sweeper_channel.is_closed() {
                return;
            }
            sweeper_inner.sweep_expired();
        })
        .expect("failed to spawn timeout sweep thread");

    loop {
        match channel.recv() {
            Ok(ChannelEvent::Message(bytes)) => match serde_json::from_slice::<WireMessage>(&bytes) {
                Ok(WireMessage::Response(resp)) => {
                    let waiter = inner.waiters.lock().unwrap().remove(&resp.id);
                    if let Some(waiter) = waiter {
                        let outcome = match resp.into_result() {
                            Ok(v) => WaiterOutcome::Response(v),
                            Err(e) => WaiterOutcome::Error(Error::Engine(e)),
                        };
                        let _ = waiter.sender.send(outcome);
                    }
                }
                Ok(WireMessage::Event(ev)) => inner.dispatch_event(ev),
                Err(e) => {
                    tracing::warn!(error = %e, "dropping malformed wire message");
                }
            },
            Ok(ChannelEvent::Closed { code, reason }) => {
                tracing::debug!(code, reason, "message channel closed");
                break;
            }
            Err(e) => {
                tracing::debug!(error = %e, "message channel error; treating as disconnect");
                break;
            }
        }
    }

    let _ = stop_tx.send(());
    let _ = sweeper.join();

    // Only the most recent generation's exit should drive state transitions;
    // a stale thread from a superseded reconnect attempt must not clobber a
    // newer, healthy connection.
    if inner.generation.load(Ordering::Acquire) != generation {
        return;
    }

    inner.fail_all_waiters(Error::Transport(TransportError::ConnectionClosed("disconnected".into())));

    let mut state = inner.state.lock().unwrap();
    if *state != SessionState::Closed {
        *state = SessionState::Reconnecting;
    }
}

impl Error {
    pub(crate) fn target_not_found(id: impl Into<String>) -> Error {
        Error::TargetState(TargetStateError::NotFound(id.into()))
    }

    pub(crate) fn page_closed() -> Error {
        Error::TargetState(TargetStateError::PageClosed)
    }
}
