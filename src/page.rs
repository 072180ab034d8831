//! Page Session (C6): one target's own Message Channel plus its typed
//! command/event surface and interception engine (§4.6).
//!
//! Grounded in the original's `ManagedPage`/`highlevel::Page`: each page
//! owns a fully independent client connection to its own target debugger
//! URL, rather than multiplexing over the browser's socket with a
//! flattened session id.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::command::CommandSurface;
use crate::context::ContextInner;
use crate::domains::{page as page_domain, runtime, target as target_domain};
use crate::error::{Error, Result};
use crate::intercept::Interceptor;
use crate::session::Session;
use crate::supervisor::Supervisor;
use crate::ws::MessageChannel;

pub(crate) struct PageInner {
    pub(crate) context: Weak<ContextInner>,
    pub(crate) target_id: String,
    session: Session,
    supervisor: Supervisor,
    surface: CommandSurface,
    interceptor: Interceptor,
    closed: AtomicBool,
}

/// A single page (or other page-like target: worker, etc.) owned by exactly
/// one [`crate::context::Context`] (I3).
#[derive(Clone)]
pub struct Page {
    pub(crate) inner: Arc<PageInner>,
}

impl Page {
    pub(crate) fn open(
        context: Weak<ContextInner>,
        target_id: String,
        debugger_url: &str,
        connect_timeout: Duration,
        command_timeout: Duration,
    ) -> Result<Self> {
        let session = Session::new(command_timeout);
        let url = debugger_url.to_string();
        let connector_url = url.clone();
        let supervisor = Supervisor::new(session.clone(), Default::default(), move || {
            MessageChannel::connect_url(&connector_url, connect_timeout)
        });
        supervisor.start()?;

        let surface = CommandSurface::new(session.clone(), None, command_timeout);
        supervisor.set_replay_hook({
            let surface = surface.clone();
            move |_session| surface.replay_enabled()
        });

        let interceptor = Interceptor::new(surface.clone());

        let inner = Arc::new(PageInner {
            context,
            target_id,
            session,
            supervisor,
            surface,
            interceptor,
            closed: AtomicBool::new(false),
        });

        Ok(Page { inner })
    }

    pub fn target_id(&self) -> &str {
        &self.inner.target_id
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn surface(&self) -> &CommandSurface {
        &self.inner.surface
    }

    pub fn interceptor(&self) -> &Interceptor {
        &self.inner.interceptor
    }

    fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::page_closed());
        }
        Ok(())
    }

    /// Navigates to `url` and waits (with `timeout`) for the corresponding
    /// load event, the way the original's `QuickPage::navigate` composes
    /// `Page.navigate` with a follow-up wait.
    pub fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        self.check_open()?;
        self.inner
            .surface
            .execute(page_domain::Navigate::new(url))
            .map_err(|e| e.with_context(format!("navigating page {} to {url}", self.inner.target_id)))?;
        match self
            .inner
            .surface
            .wait_for::<page_domain::LoadEventFired>("Page.loadEventFired", timeout)
            .map_err(|e| e.with_context(format!("waiting for page {} to finish loading {url}", self.inner.target_id)))?
        {
            Some(_) => Ok(()),
            None => Err(Error::Timeout(crate::error::TimeoutKind::Navigation)),
        }
    }

    /// Enables the `Page` domain's event stream; idempotent, recorded for
    /// reconnect replay (§4.4).
    pub fn enable_page_events(&self) -> Result<()> {
        self.check_open()?;
        self.inner
            .surface
            .execute_recording_enable(page_domain::Enable {})
            .map_err(|e| e.with_context(format!("enabling page events on {}", self.inner.target_id)))?;
        Ok(())
    }

    /// An ordinary command: raises the page to the foreground (§4.6).
    pub fn bring_to_front(&self) -> Result<()> {
        self.check_open()?;
        self.inner
            .surface
            .execute(page_domain::BringToFront {})
            .map_err(|e| e.with_context(format!("bringing page {} to front", self.inner.target_id)))?;
        Ok(())
    }

    pub fn evaluate(&self, expression: &str) -> Result<serde_json::Value> {
        self.check_open()?;
        let response = self
            .inner
            .surface
            .execute(runtime::Evaluate::new(expression))
            .map_err(|e| e.with_context(format!("evaluating an expression on page {}", self.inner.target_id)))?;
        if let Some(exception) = response.exception_details {
            return Err(Error::Evaluation(exception.text));
        }
        Ok(response.result.value.unwrap_or(serde_json::Value::Null))
    }

    /// Base64-decoded PNG/JPEG bytes.
    pub fn screenshot(&self) -> Result<Vec<u8>> {
        self.check_open()?;
        let response = self
            .inner
            .surface
            .execute(page_domain::CaptureScreenshot::default())
            .map_err(|e| e.with_context(format!("capturing a screenshot of page {}", self.inner.target_id)))?;
        BASE64.decode(response.data).map_err(|e| Error::Internal(format!("engine returned invalid base64 image data: {e}")))
    }

    /// Idempotent (§8 "close() is idempotent on Page, Context, and
    /// Browser"). Sends the browser-level close-target command via the
    /// owning Context's Browser Root, not this page's own session, then
    /// disconnects this page's channel. After this returns, every operation
    /// on the page returns a "closed" error without touching the channel.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.inner.interceptor.disable();

        if let Some(context) = self.inner.context.upgrade() {
            if let Some(browser) = context.browser.upgrade() {
                let _ = browser.surface.execute(target_domain::CloseTarget { target_id: self.inner.target_id.clone() });
            }
        }
        self.inner.supervisor.shutdown(1000, "page closed");
    }
}

impl Drop for PageInner {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.supervisor.shutdown(1000, "page dropped");
        }
    }
}
