//! Chromium implementation of [`FeedBrowser`].
//!
//! The session is driven over the Chrome DevTools Protocol with
//! `chromiumoxide`. Its async API is bridged to the bot's blocking workflow
//! by running every call on a tokio runtime [`Handle`]; the CDP handler
//! stream is polled by a task spawned on that runtime for the lifetime of the
//! session.
//!
//! DOM work is done by evaluating small scripts that resolve an XPath with
//! `document.evaluate` and report back an [`ElementReply`], so locators stay the same
//! XPath strings declared in [`crate::locators`].

use super::{FeedBrowser, LoadStrategy, SessionOptions};
use crate::errors::{BotError, Result};
use crate::locators::timeouts;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::Display;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

/// Result of an element script: whether the XPath matched, plus an optional value.
#[derive(Debug, Deserialize)]
struct ElementReply {
    found: bool,
    #[serde(default)]
    value: Option<String>,
}

struct Session {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Page,
    options: SessionOptions,
}

/// A Chromium session controlled through CDP.
pub struct ChromeBrowser {
    runtime: Handle,
    headless: bool,
    session: Option<Session>,
}

impl std::fmt::Debug for ChromeBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromeBrowser")
            .field("headless", &self.headless)
            .field("open", &self.session.is_some())
            .finish()
    }
}

fn browser_err(e: impl Display) -> BotError {
    BotError::Browser(e.to_string())
}

/// Quote a Rust string as a JavaScript string literal.
fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// Wrap `body` so it runs with `el` bound to the first node matching `locator`.
///
/// `body` must `return { found: true, ... }`.
fn element_script(locator: &str, body: &str) -> String {
    format!(
        "(() => {{ \
           const el = document.evaluate({xpath}, document, null, \
             XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue; \
           if (!el) {{ return {{ found: false }}; }} \
           {body} \
         }})()",
        xpath = js_string(locator),
    )
}

/// CDP messages for a script whose document went away underneath it.
const NAVIGATION_RACES: [&str; 3] = [
    "Execution context was destroyed",
    "Cannot find context with specified id",
    "Inspected target navigated or closed",
];

/// True only when `error` came from a script racing a navigation. A missing
/// session or a broken connection is not one.
fn is_navigation_race(error: &BotError) -> bool {
    match error {
        BotError::Browser(message) => NAVIGATION_RACES.iter().any(|m| message.contains(m)),
        _ => false,
    }
}

fn presence_script(locator: &str) -> String {
    format!(
        "document.evaluate({xpath}, document, null, \
           XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue !== null",
        xpath = js_string(locator),
    )
}

impl ChromeBrowser {
    /// Create an unopened browser whose CDP traffic runs on `runtime`.
    pub fn new(runtime: Handle, headless: bool) -> Self {
        ChromeBrowser {
            runtime,
            headless,
            session: None,
        }
    }

    fn session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| BotError::Browser("no open browser session".into()))
    }

    fn eval<T: DeserializeOwned>(&self, script: &str) -> Result<T> {
        let session = self.session()?;
        let limit = session.options.script;
        self.runtime.block_on(async {
            let result = tokio::time::timeout(limit, session.page.evaluate(script))
                .await
                .map_err(|_| BotError::Browser(format!("script timed out after {limit:?}")))?
                .map_err(browser_err)?;
            result.into_value::<T>().map_err(browser_err)
        })
    }

    /// Run an element script, retrying for the implicit wait while nothing matches.
    fn on_element(&mut self, locator: &str, body: &str) -> Result<String> {
        let implicit = self.session()?.options.implicit_wait;
        let script = element_script(locator, body);
        let t0 = Instant::now();
        loop {
            let reply: ElementReply = self.eval(&script)?;
            if reply.found {
                return Ok(reply.value.unwrap_or_default());
            }
            if t0.elapsed() >= implicit {
                return Err(BotError::Browser(format!("element not found: {locator}")));
            }
            std::thread::sleep(timeouts::POLL);
        }
    }

    fn settle(&self, session: &Session) -> Result<()> {
        if session.options.load_strategy == LoadStrategy::Normal {
            self.runtime
                .block_on(session.page.wait_for_navigation())
                .map_err(browser_err)?;
        }
        Ok(())
    }
}

impl FeedBrowser for ChromeBrowser {
    #[instrument(level = "info", skip(self, options), fields(strategy = ?options.load_strategy))]
    fn open(&mut self, url: &str, options: &SessionOptions) -> Result<()> {
        self.close_all()?;

        let headless = self.headless;
        let session = self.runtime.block_on(async {
            let mut builder = BrowserConfig::builder()
                .request_timeout(options.page_load)
                .window_size(1920, 1080)
                .arg("--no-first-run")
                .arg("--no-default-browser-check")
                .arg("--disable-notifications")
                .arg("--disable-infobars")
                .arg("--start-maximized");
            if !headless {
                builder = builder.with_head();
            }
            let config = builder.build().map_err(BotError::Browser)?;

            let (browser, mut handler) = Browser::launch(config).await.map_err(browser_err)?;
            let handler = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if let Err(e) = event {
                        trace!(error = %e, "CDP handler event error");
                    }
                }
                debug!("CDP handler task completed");
            });

            let page = browser.new_page(url).await.map_err(browser_err)?;
            Ok::<_, BotError>(Session {
                browser,
                handler,
                page,
                options: options.clone(),
            })
        })?;

        self.settle(&session)?;
        self.session = Some(session);
        info!(url, "Browser opened");
        Ok(())
    }

    fn close_all(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            self.runtime.block_on(async {
                if let Err(e) = session.browser.close().await {
                    warn!(error = %e, "Browser did not close cleanly");
                }
                let _ = session.browser.wait().await;
            });
            session.handler.abort();
            info!("Browser closed");
        }
        Ok(())
    }

    fn go_to(&mut self, url: &str) -> Result<()> {
        let session = self.session()?;
        self.runtime
            .block_on(session.page.goto(url))
            .map_err(browser_err)?;
        self.settle(session)?;
        debug!(url, "Navigated");
        Ok(())
    }

    fn location(&mut self) -> Result<String> {
        let session = self.session()?;
        let url = self
            .runtime
            .block_on(session.page.url())
            .map_err(browser_err)?;
        Ok(url.unwrap_or_default())
    }

    fn reload(&mut self) -> Result<()> {
        let session = self.session()?;
        self.runtime
            .block_on(session.page.reload())
            .map_err(browser_err)?;
        self.settle(session)?;
        info!("Page reloaded");
        Ok(())
    }

    fn contains(&mut self, locator: &str) -> Result<bool> {
        match self.eval::<bool>(&presence_script(locator)) {
            Ok(present) => Ok(present),
            Err(e) if is_navigation_race(&e) => {
                debug!(locator, error = %e, "Page navigated during presence check; treating as absent");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn click(&mut self, locator: &str) -> Result<()> {
        self.on_element(locator, "el.click(); return { found: true };")
            .map(|_| ())
    }

    fn input_text(&mut self, locator: &str, text: &str) -> Result<()> {
        let body = format!(
            "el.focus(); el.value = {text}; \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return {{ found: true }};",
            text = js_string(text),
        );
        self.on_element(locator, &body).map(|_| ())
    }

    fn value(&mut self, locator: &str) -> Result<String> {
        self.on_element(locator, "return { found: true, value: String(el.value ?? '') };")
    }

    fn submit_form(&mut self, locator: &str) -> Result<()> {
        self.on_element(
            locator,
            "if (el.requestSubmit) { el.requestSubmit(); } else { el.submit(); } \
             return { found: true };",
        )
        .map(|_| ())
    }

    fn select_value(&mut self, locator: &str, value: &str) -> Result<()> {
        let body = format!(
            "el.value = {value}; \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return {{ found: true }};",
            value = js_string(value),
        );
        self.on_element(locator, &body).map(|_| ())
    }

    fn selected_value(&mut self, locator: &str) -> Result<String> {
        self.value(locator)
    }

    fn scroll_into_view(&mut self, locator: &str) -> Result<()> {
        self.on_element(
            locator,
            "el.scrollIntoView({ block: 'center' }); return { found: true };",
        )
        .map(|_| ())
    }

    fn attribute(&mut self, locator: &str, name: &str) -> Result<String> {
        let body = format!(
            "const v = el[{name}] ?? el.getAttribute({name}); \
             return {{ found: true, value: v == null ? '' : String(v) }};",
            name = js_string(name),
        );
        self.on_element(locator, &body)
    }

    fn text(&mut self, locator: &str) -> Result<String> {
        self.on_element(
            locator,
            "return { found: true, value: el.innerText ?? el.textContent ?? '' };",
        )
    }
}
