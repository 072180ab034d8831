//! Context (C7): a browsing-data partition that owns the Page Sessions
//! created within it and mirrors its interception configuration into every
//! page attached afterward (§4.7).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crate::browser::BrowserInner;
use crate::domains::target;
use crate::error::{Error, Result};
use crate::intercept::Interceptor;
use crate::page::Page;

type InterceptionMirror = dyn Fn(&Interceptor) + Send + Sync;

pub(crate) struct ContextInner {
    pub(crate) browser: Weak<BrowserInner>,
    pub(crate) context_id: Option<String>,
    pages: Mutex<Vec<Page>>,
    interception_mirror: Mutex<Option<Arc<InterceptionMirror>>>,
    closed: AtomicBool,
}

/// A storage/cookie partition (§3 "Context"); the default context's id is
/// `None`, isolated contexts get one from `Target.createBrowserContext`.
#[derive(Clone)]
pub struct Context {
    pub(crate) inner: Arc<ContextInner>,
}

impl Context {
    pub(crate) fn new(browser: Weak<BrowserInner>, context_id: Option<String>) -> Self {
        Context {
            inner: Arc::new(ContextInner {
                browser,
                context_id,
                pages: Mutex::new(Vec::new()),
                interception_mirror: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.inner.context_id.as_deref()
    }

    pub fn is_default(&self) -> bool {
        self.inner.context_id.is_none()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Records a per-context interception setup function and applies it to
    /// every page already open in the context. Every page created
    /// afterward gets it applied at attach time, before the caller can
    /// navigate it (§4.7, §4.9 "enabling on a Context applies to every
    /// existing and future Page Session").
    pub fn enable_fetch(&self, setup: impl Fn(&Interceptor) + Send + Sync + 'static) -> Result<()> {
        if self.is_closed() {
            return Err(Error::page_closed());
        }
        let setup: Arc<InterceptionMirror> = Arc::new(setup);
        for page in self.inner.pages.lock().unwrap().iter() {
            setup(page.interceptor());
        }
        *self.inner.interception_mirror.lock().unwrap() = Some(setup);
        Ok(())
    }

    pub fn disable_fetch(&self) -> Result<()> {
        *self.inner.interception_mirror.lock().unwrap() = None;
        for page in self.inner.pages.lock().unwrap().iter() {
            page.interceptor()
                .disable()
                .map_err(|e| e.with_context(format!("disabling interception on page {}", page.target_id())))?;
        }
        Ok(())
    }

    /// Asks the Browser Root to create a target in this context, then wraps
    /// it as a Page Session, wiring in the context's interception
    /// configuration (if any) before returning it to the caller (§4.7).
    pub fn new_page(&self, url: &str, connect_timeout: Duration, command_timeout: Duration) -> Result<Page> {
        if self.is_closed() {
            return Err(Error::page_closed());
        }
        let browser = self.inner.browser.upgrade().ok_or(Error::Closed)?;
        let page = browser
            .create_target_page(Arc::downgrade(&self.inner), self.inner.context_id.clone(), url, connect_timeout, command_timeout)
            .map_err(|e| e.with_context(format!("creating a new page in context {:?} for {url}", self.inner.context_id)))?;

        if let Some(mirror) = self.inner.interception_mirror.lock().unwrap().as_ref() {
            mirror(page.interceptor());
        }

        self.inner.pages.lock().unwrap().push(page.clone());
        Ok(page)
    }

    /// Non-closed pages currently owned by this context (§4.7 "pages()").
    pub fn pages(&self) -> Vec<Page> {
        self.inner.pages.lock().unwrap().iter().filter(|p| !p.is_closed()).cloned().collect()
    }

    /// Disables interception on every owned page, closes each Page Session
    /// in LIFO order, then (if not the default context) disposes the
    /// context itself (I4, §4.7). Idempotent.
    pub fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let pages = std::mem::take(&mut *self.inner.pages.lock().unwrap());
        for page in pages.iter().rev() {
            let _ = page.interceptor().disable();
            page.close();
        }

        if let Some(context_id) = &self.inner.context_id {
            if let Some(browser) = self.inner.browser.upgrade() {
                browser
                    .surface
                    .execute(target::DisposeBrowserContext { browser_context_id: context_id.clone() })
                    .map_err(|e| e.with_context(format!("disposing context {context_id}")))?;
            }
        }
        Ok(())
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let pages = std::mem::take(&mut *self.pages.lock().unwrap());
        for page in pages.iter().rev() {
            page.close();
        }
    }
}
