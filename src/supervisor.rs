//! Reconnect & Heartbeat Supervisor (C4): detects a dead peer, reconnects
//! with capped exponential backoff, and replays the enable-set recorded by
//! the command surface (§4.4).
//!
//! Grounded in the teacher's [`chromiumoxide::handler::job::PeriodicJob`]
//! timing idiom, reimplemented over a blocking sleep loop instead of a
//! polled `futures_timer::Delay` since this crate's concurrency model is
//! thread-based rather than async.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::session::{Session, SessionState};
use crate::ws::MessageChannel;

/// §6 reconnect/heartbeat configuration, with the spec's stated defaults.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// How often to send a heartbeat probe. Default 15s, minimum 1s.
    pub heartbeat_interval: Duration,
    /// Timeout for a single heartbeat round-trip.
    pub heartbeat_timeout: Duration,
    /// Consecutive heartbeat failures before the connection is considered
    /// dead and reconnect is triggered. Default 2.
    pub heartbeat_failure_threshold: u32,
    /// Initial reconnect backoff delay. Default 1s.
    pub reconnect_initial_delay: Duration,
    /// Reconnect backoff ceiling. Default 30s.
    pub reconnect_max_delay: Duration,
    /// Backoff growth factor per failed attempt. Default 2.0.
    pub reconnect_multiplier: f64,
    /// Maximum reconnect attempts before giving up permanently. `0` means
    /// unbounded (the spec's default).
    pub reconnect_max_attempts: u32,
    /// Whether a dropped connection should be retried at all.
    pub auto_reconnect: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig {
            heartbeat_interval: Duration::from_secs(15),
            heartbeat_timeout: Duration::from_secs(5),
            heartbeat_failure_threshold: 2,
            reconnect_initial_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(30),
            reconnect_multiplier: 2.0,
            reconnect_max_attempts: 0,
            auto_reconnect: true,
        }
    }
}

/// Observable lifecycle events, for callers that want to log or surface
/// connection health (§6 notification hooks).
#[derive(Debug, Clone)]
pub enum ReconnectEvent {
    Disconnected,
    Reconnecting { attempt: u32, delay: Duration },
    Reconnected,
    GaveUp { attempts: u32 },
    HeartbeatFailed { consecutive: u32 },
}

type Connector = dyn Fn() -> Result<MessageChannel> + Send + Sync;
type Hook = dyn Fn(ReconnectEvent) + Send + Sync;
type HeartbeatFn = dyn Fn(&Session, Duration) -> Result<()> + Send + Sync;
type ReplayFn = dyn Fn(&Session) + Send + Sync;

/// Owns the reconnect/heartbeat threads for one [`Session`]. Dropping the
/// supervisor stops both threads on their next wakeup.
pub struct Supervisor {
    session: Session,
    config: SupervisorConfig,
    stopped: Arc<AtomicBool>,
    state: Arc<SupervisorState>,
}

struct SupervisorState {
    connector: Box<Connector>,
    hook: Mutex<Option<Box<Hook>>>,
    heartbeat_fn: Mutex<Option<Box<HeartbeatFn>>>,
    replay_fn: Mutex<Option<Box<ReplayFn>>>,
    reconnect_attempts: AtomicU32,
    reconnecting: AtomicBool,
}

impl Supervisor {
    /// `connector` re-establishes the transport (a fresh TCP connection plus
    /// handshake) from scratch; it's called once up front and again on every
    /// reconnect attempt.
    pub fn new(session: Session, config: SupervisorConfig, connector: impl Fn() -> Result<MessageChannel> + Send + Sync + 'static) -> Self {
        Supervisor {
            session,
            config,
            stopped: Arc::new(AtomicBool::new(false)),
            state: Arc::new(SupervisorState {
                connector: Box::new(connector),
                hook: Mutex::new(None),
                heartbeat_fn: Mutex::new(None),
                replay_fn: Mutex::new(None),
                reconnect_attempts: AtomicU32::new(0),
                reconnecting: AtomicBool::new(false),
            }),
        }
    }

    /// Registers a callback invoked on every lifecycle transition.
    pub fn on_event(&self, hook: impl Fn(ReconnectEvent) + Send + Sync + 'static) {
        *self.state.hook.lock().unwrap() = Some(Box::new(hook));
    }

    /// Registers the probe command used for heartbeats; defaults to treating
    /// absence of a registered probe as "always healthy" (no-op heartbeat),
    /// which a caller without a cheap no-arg command can rely on.
    pub fn set_heartbeat(&self, probe: impl Fn(&Session, Duration) -> Result<()> + Send + Sync + 'static) {
        *self.state.heartbeat_fn.lock().unwrap() = Some(Box::new(probe));
    }

    /// Registers the callback that replays the command surface's recorded
    /// enable-set after a successful reconnect (§4.4 "enable-set replay").
    pub fn set_replay_hook(&self, replay: impl Fn(&Session) + Send + Sync + 'static) {
        *self.state.replay_fn.lock().unwrap() = Some(Box::new(replay));
    }

    /// Performs the initial connection and starts the heartbeat thread.
    /// Reconnect threads are spawned lazily, only once the connection
    /// actually drops.
    pub fn start(&self) -> Result<()> {
        let channel = (self.state.connector)()?;
        self.session.attach_channel(channel);
        self.spawn_heartbeat();
        self.spawn_watchdog();
        Ok(())
    }

    fn emit(&self, event: ReconnectEvent) {
        if let Some(hook) = self.state.hook.lock().unwrap().as_ref() {
            hook(event);
        }
    }

    /// Watches the session state and kicks off reconnect whenever it settles
    /// into `Reconnecting` (set by the receive loop on an unexpected
    /// disconnect, or by heartbeat failure below).
    fn spawn_watchdog(&self) {
        let session = self.session.clone();
        let state = self.state.clone();
        let stopped = self.stopped.clone();
        let config = self.config.clone();
        let hook_owner = self.clone_for_thread();

        thread::Builder::new()
            .name("supervisor-watchdog".into())
            .spawn(move || loop {
                if stopped.load(Ordering::Acquire) {
                    return;
                }
                thread::sleep(Duration::from_millis(200));
                if session.state() == SessionState::Reconnecting && !state.reconnecting.swap(true, Ordering::AcqRel) {
                    hook_owner.emit(ReconnectEvent::Disconnected);
                    run_reconnect_loop(&session, &state, &config, &stopped);
                    state.reconnecting.store(false, Ordering::Release);
                }
                if session.state() == SessionState::Closed {
                    return;
                }
            })
            .expect("failed to spawn supervisor watchdog thread");
    }

    fn spawn_heartbeat(&self) {
        let session = self.session.clone();
        let state = self.state.clone();
        let stopped = self.stopped.clone();
        let config = self.config.clone();
        let hook_owner = self.clone_for_thread();
        let mut consecutive_failures: u32 = 0;

        thread::Builder::new()
            .name("supervisor-heartbeat".into())
            .spawn(move || loop {
                if stopped.load(Ordering::Acquire) {
                    return;
                }
                thread::sleep(config.heartbeat_interval);
                if stopped.load(Ordering::Acquire) || session.state() == SessionState::Closed {
                    return;
                }
                if session.state() != SessionState::Connected {
                    continue;
                }

                let probe = state.heartbeat_fn.lock().unwrap();
                let Some(probe) = probe.as_ref() else { continue };
                match probe(&session, config.heartbeat_timeout) {
                    Ok(()) => consecutive_failures = 0,
                    Err(_) => {
                        consecutive_failures += 1;
                        hook_owner.emit(ReconnectEvent::HeartbeatFailed { consecutive: consecutive_failures });
                        if consecutive_failures >= config.heartbeat_failure_threshold {
                            session.mark_reconnecting();
                            consecutive_failures = 0;
                        }
                    }
                }
            })
            .expect("failed to spawn heartbeat thread");
    }

    fn clone_for_thread(&self) -> SupervisorHandle {
        SupervisorHandle { state: self.state.clone() }
    }

    /// Stops both background threads on their next wakeup and closes the
    /// session.
    pub fn shutdown(&self, code: u16, reason: &str) {
        self.stopped.store(true, Ordering::Release);
        self.session.close(code, reason);
    }
}

struct SupervisorHandle {
    state: Arc<SupervisorState>,
}

impl SupervisorHandle {
    fn emit(&self, event: ReconnectEvent) {
        if let Some(hook) = self.state.hook.lock().unwrap().as_ref() {
            hook(event);
        }
    }
}

fn run_reconnect_loop(session: &Session, state: &Arc<SupervisorState>, config: &SupervisorConfig, stopped: &Arc<AtomicBool>) {
    if !config.auto_reconnect {
        session.mark_closed_permanently();
        return;
    }

    let mut delay = config.reconnect_initial_delay;
    let mut attempt: u32 = 0;

    loop {
        if stopped.load(Ordering::Acquire) {
            return;
        }

        attempt += 1;
        let emit_hook = |event: ReconnectEvent| {
            if let Some(hook) = state.hook.lock().unwrap().as_ref() {
                hook(event);
            }
        };
        emit_hook(ReconnectEvent::Reconnecting { attempt, delay });

        let started = Instant::now();
        thread::sleep(delay);
        let _ = started;

        if stopped.load(Ordering::Acquire) {
            return;
        }

        match (state.connector)() {
            Ok(channel) => {
                session.attach_channel(channel);
                state.reconnect_attempts.store(0, Ordering::Release);
                emit_hook(ReconnectEvent::Reconnected);
                if let Some(replay) = state.replay_fn.lock().unwrap().as_ref() {
                    replay(session);
                }
                return;
            }
            Err(_) => {
                if config.reconnect_max_attempts != 0 && attempt >= config.reconnect_max_attempts {
                    session.mark_closed_permanently();
                    emit_hook(ReconnectEvent::GaveUp { attempts: attempt });
                    return;
                }
                delay = Duration::from_secs_f64((delay.as_secs_f64() * config.reconnect_multiplier).min(config.reconnect_max_delay.as_secs_f64()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let cfg = SupervisorConfig::default();
        assert_eq!(cfg.heartbeat_interval, Duration::from_secs(15));
        assert_eq!(cfg.heartbeat_failure_threshold, 2);
        assert_eq!(cfg.reconnect_initial_delay, Duration::from_secs(1));
        assert_eq!(cfg.reconnect_max_delay, Duration::from_secs(30));
        assert!((cfg.reconnect_multiplier - 2.0).abs() < f64::EPSILON);
        assert_eq!(cfg.reconnect_max_attempts, 0);
    }
}
