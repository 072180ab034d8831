//! Browser Root (C8): the top-level handle owning the browser-level C2+C3
//! stack, the default Context, every isolated Context, and the target
//! directory used to discover new pages' debugger URLs (§4.8).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::{Duration, Instant};

use url::Url;

use crate::command::CommandSurface;
use crate::config::BrowserConfig;
use crate::context::{Context, ContextInner};
use crate::discovery;
use crate::domains::target;
use crate::error::{Error, Result, TimeoutKind, TransportError};
use crate::intercept::Interceptor;
use crate::page::Page;
use crate::process::{self, LaunchedProcess};
use crate::session::{HandlerToken, Session};
use crate::supervisor::Supervisor;
use crate::ws::MessageChannel;

type GlobalMirror = dyn Fn(&Interceptor) + Send + Sync;

pub(crate) struct BrowserInner {
    pub(crate) surface: CommandSurface,
    supervisor: Supervisor,
    host: String,
    port: u16,
    target_events: Arc<Mutex<HashMap<String, target::TargetInfo>>>,
    // Kept alive for the browser's whole lifetime; never explicitly removed.
    _target_created_token: HandlerToken,
    contexts: Mutex<Vec<Context>>,
    default_context: Mutex<Option<Context>>,
    global_mirror: Mutex<Option<Arc<GlobalMirror>>>,
    connect_timeout: Duration,
    command_timeout: Duration,
    launched: Mutex<Option<LaunchedProcess>>,
    closed: AtomicBool,
}

/// Top-level handle for one running engine instance (§4.8).
#[derive(Clone)]
pub struct Browser {
    inner: Arc<BrowserInner>,
}

impl Browser {
    /// Launches a fresh engine process and connects to it.
    pub fn launch(config: BrowserConfig) -> Result<Self> {
        let launched = process::launch(&config)?;
        let host = "127.0.0.1".to_string();
        let port = launched.port;
        let version = wait_for_discovery(&host, port, config.launch_timeout)?;
        Self::build(host, port, &version.web_socket_debugger_url, config, Some(launched))
    }

    /// Connects to an already-running engine's discovery endpoint.
    pub fn connect(host: &str, port: u16, config: BrowserConfig) -> Result<Self> {
        let version = discovery::version(host, port)?;
        Self::build(host.to_string(), port, &version.web_socket_debugger_url, config, None)
    }

    /// Connects directly to an explicit browser-level debugger URL.
    pub fn connect_ws(url: &str, config: BrowserConfig) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| Error::Argument(format!("invalid browser debugger url: {e}")))?;
        let host = parsed.host_str().ok_or_else(|| Error::Argument("debugger url has no host".into()))?.to_string();
        let port = parsed.port_or_known_default().unwrap_or(80);
        Self::build(host, port, url, config, None)
    }

    fn build(host: String, port: u16, ws_url: &str, config: BrowserConfig, launched: Option<LaunchedProcess>) -> Result<Self> {
        let session = Session::new(config.default_command_timeout);
        let connect_timeout = config.connect_timeout;
        let connector_url = ws_url.to_string();
        let supervisor = Supervisor::new(session.clone(), config.supervisor.clone(), move || {
            MessageChannel::connect_url(&connector_url, connect_timeout)
        });
        supervisor.start()?;

        let surface = CommandSurface::new(session.clone(), None, config.default_command_timeout);
        supervisor.set_replay_hook({
            let surface = surface.clone();
            move |_session| surface.replay_enabled()
        });

        let target_events = Arc::new(Mutex::new(HashMap::new()));
        let target_created_token = surface.on::<target::TargetCreated, _>("Target.targetCreated", {
            let target_events = target_events.clone();
            move |ev: target::TargetCreated| {
                target_events.lock().unwrap().insert(ev.target_info.target_id.clone(), ev.target_info);
            }
        });

        let inner = Arc::new(BrowserInner {
            surface,
            supervisor,
            host,
            port,
            target_events,
            _target_created_token: target_created_token,
            contexts: Mutex::new(Vec::new()),
            default_context: Mutex::new(None),
            global_mirror: Mutex::new(None),
            connect_timeout,
            command_timeout: config.default_command_timeout,
            launched: Mutex::new(launched),
            closed: AtomicBool::new(false),
        });

        let default_context = Context::new(Arc::downgrade(&inner), None);
        *inner.default_context.lock().unwrap() = Some(default_context);

        Ok(Browser { inner })
    }

    pub fn version(&self) -> Result<discovery::VersionInfo> {
        discovery::version(&self.inner.host, self.inner.port)
    }

    pub fn default_context(&self) -> Context {
        self.inner.default_context.lock().unwrap().clone().expect("default context always set after build()")
    }

    /// Creates an isolated browsing-data partition (§4.7, §4.8).
    pub fn new_context(&self) -> Result<Context> {
        let response = self
            .inner
            .surface
            .execute(target::CreateBrowserContext {})
            .map_err(|e| e.with_context("creating an isolated browsing context"))?;
        let context = Context::new(Arc::downgrade(&self.inner), Some(response.browser_context_id));

        if let Some(mirror) = self.inner.global_mirror.lock().unwrap().as_ref() {
            let mirror = mirror.clone();
            context
                .enable_fetch(move |interceptor| mirror(interceptor))
                .map_err(|e| e.with_context(format!("mirroring global interception setup into context {:?}", context.id())))?;
        }

        self.inner.contexts.lock().unwrap().push(context.clone());
        Ok(context)
    }

    /// Every context currently known to this Browser Root, default first.
    pub fn contexts(&self) -> Vec<Context> {
        let mut all = vec![self.default_context()];
        all.extend(self.inner.contexts.lock().unwrap().iter().cloned());
        all
    }

    /// Convenience: creates a page in the default context.
    pub fn new_page(&self, url: &str) -> Result<Page> {
        self.default_context().new_page(url, self.inner.connect_timeout, self.inner.command_timeout)
    }

    /// Mirrors `setup` into the default context, every existing isolated
    /// context, and every isolated context created from now on (§4.9
    /// "Enabling on the Browser Root mirrors to every existing and future
    /// Context").
    pub fn enable_fetch(&self, setup: impl Fn(&Interceptor) + Send + Sync + 'static) -> Result<()> {
        let setup: Arc<GlobalMirror> = Arc::new(setup);
        self.default_context()
            .enable_fetch({
                let setup = setup.clone();
                move |i| setup(i)
            })
            .map_err(|e| e.with_context("mirroring global interception setup into the default context"))?;
        for context in self.inner.contexts.lock().unwrap().iter() {
            context
                .enable_fetch({
                    let setup = setup.clone();
                    move |i| setup(i)
                })
                .map_err(|e| e.with_context(format!("mirroring global interception setup into context {:?}", context.id())))?;
        }
        *self.inner.global_mirror.lock().unwrap() = Some(setup);
        Ok(())
    }

    pub fn disable_fetch(&self) -> Result<()> {
        *self.inner.global_mirror.lock().unwrap() = None;
        self.default_context().disable_fetch().map_err(|e| e.with_context("disabling interception on the default context"))?;
        for context in self.inner.contexts.lock().unwrap().iter() {
            context.disable_fetch().map_err(|e| e.with_context(format!("disabling interception on context {:?}", context.id())))?;
        }
        Ok(())
    }

    /// Closes every isolated Context (LIFO), then the default Context, then
    /// disconnects the browser-level channel (I5). A second `close()` is a
    /// no-op.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let isolated = std::mem::take(&mut *self.inner.contexts.lock().unwrap());
        for context in isolated.iter().rev() {
            let _ = context.close();
        }
        if let Some(default_context) = self.inner.default_context.lock().unwrap().take() {
            let _ = default_context.close();
        }
        self.inner.supervisor.shutdown(1000, "browser closed");
        self.inner.launched.lock().unwrap().take();
    }
}

impl BrowserInner {
    /// Shared by [`Context::new_page`]: creates the target via the Browser
    /// Root's own session, joins the resulting `Target.targetCreated` event
    /// with the discovery endpoint's `webSocketDebuggerUrl`, and opens a
    /// fresh Page Session to it (§4.8).
    pub(crate) fn create_target_page(
        &self,
        context: Weak<ContextInner>,
        browser_context_id: Option<String>,
        url: &str,
        connect_timeout: Duration,
        command_timeout: Duration,
    ) -> Result<Page> {
        let created = self
            .surface
            .execute(target::CreateTarget { url: url.to_string(), browser_context_id })
            .map_err(|e| e.with_context(format!("creating a target for {url}")))?;
        let target_id = created.target_id;

        let deadline = Instant::now() + connect_timeout;
        loop {
            if self.target_events.lock().unwrap().contains_key(&target_id) {
                break;
            }
            if Instant::now() > deadline {
                return Err(Error::Timeout(TimeoutKind::Wait).with_context(format!("waiting for target {target_id} to be created")));
            }
            thread::sleep(Duration::from_millis(10));
        }

        let targets = discovery::list_targets(&self.host, self.port)
            .map_err(|e| e.with_context(format!("listing targets to find the debugger url for {target_id}")))?;
        let info = targets.into_iter().find(|t| t.id == target_id).ok_or_else(|| Error::target_not_found(target_id.clone()))?;
        let ws_url = info
            .web_socket_debugger_url
            .ok_or_else(|| Error::Transport(TransportError::Protocol("target has no debugger url".into())))?;

        Page::open(context, target_id.clone(), &ws_url, connect_timeout, command_timeout)
            .map_err(|e| e.with_context(format!("opening a page session for target {target_id}")))
    }
}

fn wait_for_discovery(host: &str, port: u16, timeout: Duration) -> Result<discovery::VersionInfo> {
    let deadline = Instant::now() + timeout;
    loop {
        match discovery::version(host, port) {
            Ok(v) => return Ok(v),
            Err(e) => {
                if Instant::now() > deadline {
                    return Err(e);
                }
                thread::sleep(Duration::from_millis(50));
            }
        }
    }
}
